// Error types shared across the service
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("key required")]
    EmptyKey,
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("TLS configuration error: {0}")]
    TlsConfig(String),
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("server already started")]
    AlreadyStarted,
    #[error("server stopped while starting")]
    StoppedDuringStart,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("name {0:?} is not alphanumeric")]
    NotAlphanumeric(String),
    #[error("invalid product code")]
    InvalidCode,
}

/// Why the admission stages turned a request away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    CapacityExceeded,
    RateExceeded,
}

impl Rejection {
    pub fn status(self) -> u16 {
        429
    }

    pub fn message(self) -> &'static str {
        match self {
            Rejection::CapacityExceeded => "Rate limit exceeded",
            Rejection::RateExceeded => "Request rate limit exceeded",
        }
    }
}
