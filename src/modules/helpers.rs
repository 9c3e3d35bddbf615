// Shared utilities for modules
use crate::context::Context;
use crate::error::Rejection;
use crate::http::HttpResponse;
use crate::log::RequestLogger;
use serde::Serialize;
use std::collections::HashMap;

pub const SUCCESS: &str = "Success!";
pub const ENVELOPE_TYPE: &str = "application/json";

pub fn is_enabled(c: &HashMap<String, toml::Value>, m: &str) -> bool {
    config_bool(c, m, "enabled", true)
}

pub fn config_bool(c: &HashMap<String, toml::Value>, m: &str, k: &str, d: bool) -> bool {
    c.get(m).and_then(|v| v.get(k)).and_then(|v| v.as_bool()).unwrap_or(d)
}

pub fn config_usize(c: &HashMap<String, toml::Value>, m: &str, k: &str, d: usize) -> usize {
    match c.get(m).and_then(|v| v.get(k)).and_then(|v| v.as_integer()) {
        Some(v) => usize::try_from(v).unwrap_or_else(|_| {
            crate::log::warn(&format!("{m}.{k} = {v} is out of range, using {d}"));
            d
        }),
        None => d,
    }
}

pub fn config_str(c: &HashMap<String, toml::Value>, m: &str, k: &str, d: &str) -> String {
    c.get(m).and_then(|v| v.get(k)).and_then(|v| v.as_str()).unwrap_or(d).to_string()
}

/// `ip:port` of the peer as seen by the listener.
pub fn remote_addr(c: &Context) -> &str {
    c.get("_remote_addr").unwrap_or("")
}

pub fn logger(c: &Context) -> Option<&RequestLogger> {
    c.get_state::<RequestLogger>("_logger")
}

#[derive(Serialize)]
pub struct Message<'a> {
    #[serde(skip_serializing_if = "is_zero")]
    pub code: u16,
    #[serde(skip_serializing_if = "str::is_empty")]
    pub message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

fn is_zero(c: &u16) -> bool {
    *c == 0
}

/// JSON envelope response: `{"code":..,"message":..,"data":..}`.
pub fn respond(code: u16, message: &str, data: Option<serde_json::Value>) -> HttpResponse {
    let mut resp = HttpResponse::new(code);
    if code == 204 {
        return resp;
    }
    let msg = Message { code, message, data };
    let body = match serde_json::to_vec(&msg) {
        Ok(b) => b,
        Err(e) => {
            crate::log::error(&format!("marshaling message: {e}"));
            Vec::new()
        }
    };
    resp.headers = vec![
        ("Content-Type".to_string(), ENVELOPE_TYPE.to_string()),
        ("Content-Length".to_string(), body.len().to_string()),
    ];
    resp.body = body;
    resp
}

/// An uncompressed body produced by `respond`.
pub fn is_envelope(resp: &HttpResponse) -> bool {
    resp.get_header("Content-Type") == Some(ENVELOPE_TYPE)
        && resp.get_header("Content-Encoding").is_none()
        && !resp.body.is_empty()
}

pub fn reject(why: Rejection) -> HttpResponse {
    respond(why.status(), why.message(), None)
}
