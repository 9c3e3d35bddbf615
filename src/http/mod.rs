// HTTP/1.1 message framing over async streams
mod request;
mod response;
pub use request::HttpRequest;
pub use response::HttpResponse;
use tokio::io::{AsyncRead, AsyncReadExt};

pub fn find_hdr_end(d: &[u8]) -> Option<usize> {
    if d.len() < 4 { return None; }
    for i in 0..=(d.len() - 4) {
        if &d[i..i + 4] == b"\r\n\r\n" { return Some(i); }
    }
    None
}

pub fn get_hdr<'a>(h: &'a [(String, String)], n: &str) -> Option<&'a str> {
    for (k, v) in h {
        if k.eq_ignore_ascii_case(n) { return Some(v.as_str()); }
    }
    None
}

fn raw_hdr<'a>(t: &'a str, n: &str) -> Option<&'a str> {
    for l in t.lines() {
        if let Some((k, v)) = l.split_once(':') {
            if k.trim().eq_ignore_ascii_case(n) { return Some(v.trim()); }
        }
    }
    None
}

#[derive(Clone, Copy)]
pub struct Limits {
    pub max_header_size: usize,
    pub max_body_size: usize,
    pub buffer_size: usize,
}

impl Limits {
    pub fn from_config(c: &crate::config::Srv) -> Self {
        Limits {
            max_header_size: c.max_header_size,
            max_body_size: c.max_body_size,
            buffer_size: c.buffer_size,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadError {
    HeadersTooLarge,
    BodyTooLarge,
    BadLength,
    LengthRequired,
    InvalidEncoding,
    Io(String),
}

impl ReadError {
    /// Response to send before closing, if the peer is still listening.
    pub fn response(&self) -> Option<HttpResponse> {
        match self {
            ReadError::HeadersTooLarge => Some(HttpResponse::error(431, "Request Header Fields Too Large")),
            ReadError::BodyTooLarge => Some(HttpResponse::error(413, "Payload Too Large")),
            ReadError::LengthRequired => Some(HttpResponse::error(411, "Length Required")),
            ReadError::BadLength | ReadError::InvalidEncoding => Some(HttpResponse::error(400, "Bad Request")),
            ReadError::Io(_) => None,
        }
    }
}

pub enum ReadResult {
    /// One complete message plus any bytes that already belong to the next one.
    Ok { message: Vec<u8>, rest: Vec<u8> },
    /// Peer closed before sending anything.
    Closed,
    Error(ReadError),
}

/// Reads one request, starting from bytes already received in `seed`.
pub async fn read_http_message<R>(r: &mut R, seed: Vec<u8>, limits: &Limits) -> ReadResult
where
    R: AsyncRead + Unpin,
{
    let mut d = seed;
    let mut b = vec![0u8; limits.buffer_size];
    let mut scanned = 0usize;

    let hdr_end = loop {
        if let Some(p) = find_hdr_end(&d[scanned..]) {
            break scanned + p;
        }
        scanned = d.len().saturating_sub(3);
        if d.len() > limits.max_header_size {
            return ReadResult::Error(ReadError::HeadersTooLarge);
        }
        match r.read(&mut b).await {
            Ok(0) if d.is_empty() => return ReadResult::Closed,
            Ok(0) => return ReadResult::Error(ReadError::Io("connection closed".into())),
            Ok(n) => d.extend_from_slice(&b[..n]),
            Err(e) => return ReadResult::Error(ReadError::Io(e.to_string())),
        }
    };

    if hdr_end > limits.max_header_size {
        return ReadResult::Error(ReadError::HeadersTooLarge);
    }
    let hdr_text = match std::str::from_utf8(&d[..hdr_end]) {
        Ok(t) => t,
        Err(_) => return ReadResult::Error(ReadError::InvalidEncoding),
    };
    if raw_hdr(hdr_text, "Transfer-Encoding").is_some() {
        return ReadResult::Error(ReadError::LengthRequired);
    }
    let content_len = match raw_hdr(hdr_text, "Content-Length") {
        Some(v) => match v.parse::<usize>() {
            Ok(n) => n,
            Err(_) => return ReadResult::Error(ReadError::BadLength),
        },
        None => 0,
    };
    if content_len > limits.max_body_size {
        return ReadResult::Error(ReadError::BodyTooLarge);
    }

    let end = hdr_end + 4 + content_len;
    while d.len() < end {
        match r.read(&mut b).await {
            Ok(0) => return ReadResult::Error(ReadError::Io("connection closed mid-body".into())),
            Ok(n) => d.extend_from_slice(&b[..n]),
            Err(e) => return ReadResult::Error(ReadError::Io(e.to_string())),
        }
    }
    let rest = d.split_off(end);
    ReadResult::Ok { message: d, rest }
}
