// Prometheus endpoint for admission and rate-limit decisions
use super::{helpers as h, Module};
use crate::context::Context;
use crate::gate::AdmissionGate;
use crate::http::{HttpRequest, HttpResponse};
use crate::limiter::RateLimiter;
use crate::metrics::{self, Exposition};
use std::sync::Arc;

pub fn default_config() -> toml::Table {
    let mut t = toml::Table::new();
    t.insert("enabled".into(), toml::Value::Boolean(true));
    t.insert("endpoint".into(), toml::Value::String("/metrics".into()));
    t
}

pub fn register(ctx: &mut super::ModuleContext) {
    if !h::is_enabled(ctx.config, "metrics_exporter") { return; }
    let endpoint = h::config_str(ctx.config, "metrics_exporter", "endpoint", "/metrics");
    ctx.pipeline.add(Box::new(MetricsExporter {
        endpoint,
        gate: Arc::clone(&ctx.services.gate),
        limiter: Arc::clone(&ctx.services.limiter),
    }));
}

struct MetricsExporter {
    endpoint: String,
    gate: Arc<AdmissionGate>,
    limiter: Arc<RateLimiter>,
}

impl MetricsExporter {
    fn render(&self) -> String {
        let s = metrics::snapshot();
        let mut e = Exposition::new("grocery");

        e.gauge("admission_capacity", "Requests the gate admits at once", self.gate.capacity());
        e.gauge("admission_in_use", "Permits currently held", self.gate.in_use());
        e.counter("admission_rejected_total", "Requests turned away by the admission gate", s.rejected_capacity);
        e.gauge("rate_limit_max_rps", "Average requests per second allowed per client", self.limiter.max_rps());
        e.gauge("rate_limit_clients", "Client identities seen by the limiter", self.limiter.tracked_clients());
        e.counter("rate_limit_rejected_total", "Requests turned away by the rate limiter", s.rejected_rate);

        e.counter("requests_total", "Requests that reached the pipeline", s.requests_total);
        e.counter("requests_ok_total", "Responses with status below 400", s.requests_ok);
        e.counter("requests_failed_total", "Responses with status 400 or above", s.requests_err);
        e.counter("connections_total", "Accepted connections", s.connections_total);
        e.gauge("connections_active", "Open connections", s.active_connections);
        e.counter("forced_closes_total", "Connections closed at the drain deadline", s.forced_closes);
        e.counter("latency_sum_ms", "Total time spent in the pipeline", s.latency_sum_ms);
        e.gauge("latency_max_ms", "Slowest request so far", s.latency_max_ms);
        e.gauge("uptime_seconds", "Seconds since start", metrics::uptime_secs());
        e.finish()
    }
}

impl Module for MetricsExporter {
    fn name(&self) -> &str { "metrics_exporter" }

    fn handle(&self, r: &mut HttpRequest, _: &mut Context) -> Option<HttpResponse> {
        if r.method != "GET" || r.route() != self.endpoint { return None; }
        let body = self.render();
        let mut resp = HttpResponse::new(200);
        resp.headers = vec![
            ("Content-Type".to_string(), "text/plain; version=0.0.4; charset=utf-8".to_string()),
            ("Content-Length".to_string(), body.len().to_string()),
        ];
        resp.body = body.into_bytes();
        Some(resp)
    }
}
