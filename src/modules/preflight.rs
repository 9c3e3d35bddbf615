// Answers OPTIONS preflight requests without reaching business handlers
use super::{helpers as h, Module};
use crate::context::Context;
use crate::http::{HttpRequest, HttpResponse};

pub fn default_config() -> toml::Table {
    let mut t = toml::Table::new();
    t.insert("enabled".into(), toml::Value::Boolean(true));
    t.insert("allow_methods".into(), toml::Value::String("GET, POST, PUT, DELETE".into()));
    t.insert("max_age".into(), toml::Value::Integer(86400));
    t
}

pub fn register(ctx: &mut super::ModuleContext) {
    if !h::is_enabled(ctx.config, "preflight") { return; }
    let methods = h::config_str(ctx.config, "preflight", "allow_methods", "GET, POST, PUT, DELETE");
    let max_age = h::config_usize(ctx.config, "preflight", "max_age", 86400);
    ctx.pipeline.add(Box::new(Preflight { methods, max_age }));
}

struct Preflight {
    methods: String,
    max_age: usize,
}

impl Module for Preflight {
    fn name(&self) -> &str { "preflight" }

    fn handle(&self, r: &mut HttpRequest, _: &mut Context) -> Option<HttpResponse> {
        if r.method != "OPTIONS" { return None; }
        let mut resp = HttpResponse::new(200);
        resp.headers = vec![
            ("Access-Control-Allow-Methods".to_string(), self.methods.clone()),
            ("Access-Control-Max-Age".to_string(), self.max_age.to_string()),
            ("Content-Length".to_string(), "0".to_string()),
        ];
        Some(resp)
    }
}
