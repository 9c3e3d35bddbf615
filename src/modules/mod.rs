// Request middleware chain: stage trait, pipeline, and registration order
mod admission_gate;
mod catalog_api;
pub mod compression;
pub mod helpers;
mod metrics_exporter;
mod not_found;
mod preflight;
mod rate_limiter;
mod request_clock;
mod request_logger;

use crate::cache::ConcurrentCache;
use crate::catalog::Catalog;
use crate::config::Srv;
use crate::context::Context;
use crate::gate::AdmissionGate;
use crate::http::{HttpRequest, HttpResponse};
use crate::limiter::RateLimiter;
use std::collections::HashMap;
use std::sync::Arc;

pub trait Module: Send + Sync {
    fn name(&self) -> &str;
    /// Return Some(response) to short-circuit, None to continue.
    fn handle(&self, r: &mut HttpRequest, c: &mut Context) -> Option<HttpResponse>;
    /// Called after response is produced, in reverse pipeline order.
    fn on_response(&self, _req: &HttpRequest, _resp: &mut HttpResponse, _ctx: &mut Context) {}
}

pub struct Pipeline {
    mods: Vec<Box<dyn Module>>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Pipeline { mods: Vec::new() }
    }

    pub fn add(&mut self, m: Box<dyn Module>) {
        crate::log::module_loaded(m.name());
        self.mods.push(m);
    }

    pub fn has_module(&self, name: &str) -> bool {
        self.mods.iter().any(|m| m.name() == name)
    }

    pub fn module_names(&self) -> Vec<&str> {
        self.mods.iter().map(|m| m.name()).collect()
    }

    pub fn handle(&self, r: &mut HttpRequest, c: &mut Context) -> HttpResponse {
        let mut resp_idx = None;
        let mut resp = HttpResponse::error(500, "No handler");
        for (i, m) in self.mods.iter().enumerate() {
            if let Some(r) = m.handle(r, c) {
                resp = r;
                resp_idx = Some(i);
                break;
            }
        }
        let limit = resp_idx.map(|i| i + 1).unwrap_or(self.mods.len());
        for m in self.mods[..limit].iter().rev() {
            m.on_response(r, &mut resp, c);
        }
        resp
    }
}

/// Instances shared by every request, built once at startup.
#[derive(Clone)]
pub struct Services {
    pub gate: Arc<AdmissionGate>,
    pub limiter: Arc<RateLimiter>,
    pub catalog: Arc<Catalog>,
}

impl Services {
    pub fn new(srv: &Srv, catalog: Catalog) -> Self {
        let cache = Arc::new(ConcurrentCache::new());
        Services {
            gate: Arc::new(AdmissionGate::new(srv.admission_capacity)),
            limiter: Arc::new(RateLimiter::new(cache, srv.max_rps, srv.rate_grace())),
            catalog: Arc::new(catalog),
        }
    }
}

/// Registration context: pipeline + config + server settings + shared state.
pub struct ModuleContext<'a> {
    pub pipeline: &'a mut Pipeline,
    pub config: &'a HashMap<String, toml::Value>,
    pub server: &'a Srv,
    pub services: &'a Services,
}

/// Stages run in this order; each may answer and stop the rest.
pub fn register_all(p: &mut Pipeline, mc: &HashMap<String, toml::Value>, sc: &Srv, sv: &Services) {
    let mut ctx = ModuleContext { pipeline: p, config: mc, server: sc, services: sv };
    request_clock::register(&mut ctx);
    request_logger::register(&mut ctx);
    compression::register(&mut ctx);
    admission_gate::register(&mut ctx);
    rate_limiter::register(&mut ctx);
    preflight::register(&mut ctx);
    metrics_exporter::register(&mut ctx);
    catalog_api::register(&mut ctx);
    not_found::register(&mut ctx);
}

pub fn collect_defaults() -> HashMap<String, toml::Value> {
    let mut d = HashMap::new();
    d.insert("catalog_api".into(), toml::Value::Table(catalog_api::default_config()));
    d.insert("compression".into(), toml::Value::Table(compression::default_config()));
    d.insert("metrics_exporter".into(), toml::Value::Table(metrics_exporter::default_config()));
    d.insert("preflight".into(), toml::Value::Table(preflight::default_config()));
    d
}

/// Builds the full chain for a server configuration.
pub fn build_pipeline(mc: &HashMap<String, toml::Value>, sc: &Srv, sv: &Services) -> Pipeline {
    let mut p = Pipeline::new();
    register_all(&mut p, mc, sc, sv);
    crate::log::debug(&format!("chain: {}", p.module_names().join(" -> ")));
    if !p.has_module("catalog_api") {
        crate::log::warn("catalog_api is disabled, product routes will answer 404");
    }
    p
}
