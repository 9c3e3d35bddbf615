// Stamps the request start time used by the rate limiter
use super::Module;
use crate::context::Context;
use crate::http::{HttpRequest, HttpResponse};
use std::time::Instant;

pub fn register(ctx: &mut super::ModuleContext) {
    ctx.pipeline.add(Box::new(RequestClock));
}

struct RequestClock;

impl Module for RequestClock {
    fn name(&self) -> &str { "request_clock" }

    fn handle(&self, _: &mut HttpRequest, c: &mut Context) -> Option<HttpResponse> {
        c.started_at = Instant::now();
        None
    }
}
