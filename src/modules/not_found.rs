// Fallback for requests no route claimed
use super::{helpers as h, Module};
use crate::context::Context;
use crate::http::{HttpRequest, HttpResponse};

pub fn register(ctx: &mut super::ModuleContext) {
    ctx.pipeline.add(Box::new(NotFound));
}

struct NotFound;

impl Module for NotFound {
    fn name(&self) -> &str { "not_found" }

    fn handle(&self, r: &mut HttpRequest, _: &mut Context) -> Option<HttpResponse> {
        Some(h::respond(404, &r.path, None))
    }
}
