// Bounds the number of requests inside the handler pipeline
use super::{helpers as h, Module};
use crate::context::Context;
use crate::error::Rejection;
use crate::gate::AdmissionGate;
use crate::http::{HttpRequest, HttpResponse};
use std::sync::Arc;

pub fn register(ctx: &mut super::ModuleContext) {
    let gate = Arc::clone(&ctx.services.gate);
    ctx.pipeline.add(Box::new(Admission { gate }));
}

struct Admission {
    gate: Arc<AdmissionGate>,
}

impl Module for Admission {
    fn name(&self) -> &str { "admission_gate" }

    fn handle(&self, _: &mut HttpRequest, c: &mut Context) -> Option<HttpResponse> {
        match self.gate.try_permit() {
            Some(permit) => {
                // released when the request context is dropped
                c.put("_admission_permit", permit);
                None
            }
            None => {
                crate::metrics::inc_rejected_capacity();
                if let Some(l) = h::logger(c) {
                    l.warn(&format!("admission gate full ({}/{} in flight)", self.gate.in_use(), self.gate.capacity()));
                }
                Some(h::reject(Rejection::CapacityExceeded))
            }
        }
    }
}
