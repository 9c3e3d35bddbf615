// Attaches a per-request log sink for the stages that follow
use super::Module;
use crate::context::Context;
use crate::http::{HttpRequest, HttpResponse};
use crate::log::RequestLogger;

pub fn register(ctx: &mut super::ModuleContext) {
    ctx.pipeline.add(Box::new(RequestLog { mode: ctx.server.mode() }));
}

struct RequestLog {
    mode: &'static str,
}

impl Module for RequestLog {
    fn name(&self) -> &str { "request_logger" }

    fn handle(&self, r: &mut HttpRequest, c: &mut Context) -> Option<HttpResponse> {
        c.put("_logger", RequestLogger::new(self.mode, r.route()));
        None
    }
}
