// HTTP response parsing and serialization
use super::get_hdr;

#[derive(Clone)]
pub struct HttpResponse {
    pub version: String,
    pub status_code: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

pub fn reason(code: u16) -> &'static str {
    http::StatusCode::from_u16(code)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Error")
}

impl HttpResponse {
    pub fn new(code: u16) -> Self {
        HttpResponse {
            version: "HTTP/1.1".to_string(),
            status_code: code,
            status_text: reason(code).to_string(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut o = format!("{} {} {}\r\n", self.version, self.status_code, self.status_text);
        for (k, v) in &self.headers {
            o.push_str(k);
            o.push_str(": ");
            o.push_str(v);
            o.push_str("\r\n");
        }
        o.push_str("\r\n");
        let mut b = o.into_bytes();
        b.extend_from_slice(&self.body);
        b
    }

    /// Plain-text response for wire-level failures.
    pub fn error(c: u16, m: &str) -> Self {
        let mut r = HttpResponse::new(c);
        r.headers = vec![
            ("Content-Type".to_string(), "text/plain".to_string()),
            ("Content-Length".to_string(), m.len().to_string()),
        ];
        r.body = m.as_bytes().to_vec();
        r
    }

    pub fn get_header(&self, n: &str) -> Option<&str> {
        get_hdr(&self.headers, n)
    }

    pub fn set_header(&mut self, n: &str, val: &str) {
        for (k, v) in self.headers.iter_mut() {
            if k.eq_ignore_ascii_case(n) {
                *v = val.to_string();
                return;
            }
        }
        self.headers.push((n.to_string(), val.to_string()));
    }
}
