// Gzips the JSON envelope for clients that accept gzip
use super::{helpers as h, Module};
use crate::context::Context;
use crate::http::{HttpRequest, HttpResponse};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{self, Write};

pub fn default_config() -> toml::Table {
    let mut t = toml::Table::new();
    t.insert("enabled".into(), toml::Value::Boolean(true));
    t.insert("min_size".into(), toml::Value::Integer(512));
    t.insert("level".into(), toml::Value::Integer(6));
    t
}

pub fn register(ctx: &mut super::ModuleContext) {
    if !h::is_enabled(ctx.config, "compression") { return; }
    let min_size = h::config_usize(ctx.config, "compression", "min_size", 512);
    let level = h::config_usize(ctx.config, "compression", "level", 6).clamp(1, 9) as u32;
    ctx.pipeline.add(Box::new(EnvelopeGzip { min_size, level: Compression::new(level) }));
}

struct EnvelopeGzip {
    min_size: usize,
    level: Compression,
}

/// Marker left in the context when the client negotiated gzip.
struct WantsGzip;

/// True when `gzip` is listed and not refused with `q=0`.
pub fn accepts_gzip(header: &str) -> bool {
    header.split(',').any(|item| {
        let mut parts = item.split(';').map(str::trim);
        if !parts.next().is_some_and(|c| c.eq_ignore_ascii_case("gzip")) {
            return false;
        }
        !parts.any(|p| {
            p.strip_prefix("q=")
                .and_then(|q| q.parse::<f32>().ok())
                .is_some_and(|q| q <= 0.0)
        })
    })
}

fn gzip(body: &[u8], level: Compression) -> io::Result<Vec<u8>> {
    let mut enc = GzEncoder::new(Vec::with_capacity(body.len() / 2), level);
    enc.write_all(body)?;
    enc.finish()
}

impl Module for EnvelopeGzip {
    fn name(&self) -> &str { "compression" }

    fn handle(&self, r: &mut HttpRequest, c: &mut Context) -> Option<HttpResponse> {
        if r.get_header("Accept-Encoding").is_some_and(accepts_gzip) {
            c.put("_wants_gzip", WantsGzip);
        }
        None
    }

    fn on_response(&self, _: &HttpRequest, resp: &mut HttpResponse, c: &mut Context) {
        if !h::is_envelope(resp) { return; }
        resp.set_header("Vary", "Accept-Encoding");
        if c.get_state::<WantsGzip>("_wants_gzip").is_none() || resp.body.len() < self.min_size {
            return;
        }
        match gzip(&resp.body, self.level) {
            Ok(z) if z.len() < resp.body.len() => {
                resp.body = z;
                resp.set_header("Content-Encoding", "gzip");
                resp.set_header("Content-Length", &resp.body.len().to_string());
            }
            Ok(_) => {}
            Err(e) => crate::log::warn(&format!("gzip failed, sending identity: {e}")),
        }
    }
}
