// HTTP request parsing and serialization
use super::{find_hdr_end, get_hdr};

#[derive(Clone)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub version: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpRequest {
    /// Parse a raw HTTP request. Returns None for malformed or suspicious input.
    pub fn parse(r: &[u8]) -> Option<Self> {
        let e = find_hdr_end(r)?;
        let t = std::str::from_utf8(&r[..e]).ok()?;
        let mut l = t.lines();
        let rl = l.next()?;
        let mut p = rl.split_whitespace();
        let m = p.next()?.to_string();
        let path = p.next()?.to_string();
        let v = p.next()?.to_string();

        if p.next().is_some() { return None; }

        if !matches!(m.as_str(),
            "GET" | "POST" | "PUT" | "DELETE" | "PATCH" |
            "HEAD" | "OPTIONS" | "CONNECT" | "TRACE") {
            return None;
        }

        if path.bytes().any(|b| b < 0x20 || b == 0x7F) {
            return None;
        }

        if v != "HTTP/1.0" && v != "HTTP/1.1" {
            return None;
        }

        let mut h = Vec::new();
        for ln in l {
            if ln.is_empty() { break; }
            if let Some((k, val)) = ln.split_once(':') {
                h.push((k.trim().to_string(), val.trim().to_string()));
            }
        }
        let s = e + 4;
        let cl: Option<usize> = get_hdr(&h, "Content-Length").and_then(|v| v.parse().ok());
        let b = match cl {
            Some(len) if s < r.len() => r[s..r.len().min(s + len)].to_vec(),
            _ => Vec::new(),
        };
        Some(HttpRequest { method: m, path, version: v, headers: h, body: b })
    }

    pub fn get_header(&self, n: &str) -> Option<&str> {
        get_hdr(&self.headers, n)
    }

    /// Request target without the query string.
    pub fn route(&self) -> &str {
        self.path.split_once('?').map(|(p, _)| p).unwrap_or(&self.path)
    }

    pub fn query_param(&self, name: &str) -> Option<String> {
        let (_, q) = self.path.split_once('?')?;
        url::form_urlencoded::parse(q.as_bytes())
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    }

    pub fn keep_alive(&self) -> bool {
        let conn = self.get_header("Connection").map(|v| v.to_ascii_lowercase());
        match conn.as_deref() {
            Some(v) if v.contains("close") => false,
            Some(v) if v.contains("keep-alive") => true,
            _ => self.version == "HTTP/1.1",
        }
    }
}
