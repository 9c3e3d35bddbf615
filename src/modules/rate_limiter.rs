// Per-client request rate limiting
use super::{helpers as h, Module};
use crate::context::Context;
use crate::error::Rejection;
use crate::http::{HttpRequest, HttpResponse};
use crate::limiter::{self, RateLimiter};
use std::sync::Arc;

pub fn register(ctx: &mut super::ModuleContext) {
    let limiter = Arc::clone(&ctx.services.limiter);
    ctx.pipeline.add(Box::new(RateLimit { limiter }));
}

struct RateLimit {
    limiter: Arc<RateLimiter>,
}

impl Module for RateLimit {
    fn name(&self) -> &str { "rate_limiter" }

    fn handle(&self, r: &mut HttpRequest, c: &mut Context) -> Option<HttpResponse> {
        let id = limiter::identity(h::remote_addr(c), r.get_header("X-Forwarded-For"));
        if self.limiter.allow(&id, c.started_at) {
            return None;
        }
        crate::metrics::inc_rejected_rate();
        if let Some(l) = h::logger(c) {
            l.warn(&format!("client over {} req/s", self.limiter.max_rps()));
        }
        Some(h::reject(Rejection::RateExceeded))
    }
}
