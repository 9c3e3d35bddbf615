// Configuration loading, validation, and default generation
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::time::Duration;

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: Srv,
    #[serde(default)]
    pub modules: HashMap<String, toml::Value>,
}

#[derive(Deserialize, Clone)]
#[serde(default)]
pub struct Srv {
    pub listen_addr: String,
    pub debug: bool,
    pub tls_cert: String,
    pub tls_key: String,
    pub admission_capacity: usize,
    pub max_connections: usize,
    pub max_rps: f64,
    pub rate_grace_ms: u64,
    pub shutdown_timeout: u64,
    pub read_timeout: u64,
    pub idle_timeout: u64,
    pub write_timeout: u64,
    pub tcp_keepalive: u64,
    pub handshake_timeout: u64,
    pub max_header_size: usize,
    pub max_body_size: usize,
    pub buffer_size: usize,
    pub log_level: String,
    pub logging: bool,
}

impl Default for Srv {
    fn default() -> Self {
        Srv {
            listen_addr: "0.0.0.0:8081".to_string(),
            debug: false,
            tls_cert: "tls/cert.pem".to_string(),
            tls_key: "tls/key.pem".to_string(),
            admission_capacity: 100,
            max_connections: 10_000,
            max_rps: 15.0,
            rate_grace_ms: 1000,
            shutdown_timeout: 5,
            read_timeout: 120,
            idle_timeout: 120,
            write_timeout: 120,
            tcp_keepalive: 30,
            handshake_timeout: 10,
            max_header_size: 1 << 20,
            max_body_size: 10 << 20,
            buffer_size: 8192,
            log_level: "info".to_string(),
            logging: true,
        }
    }
}

impl Srv {
    /// Label used in per-request log prefixes.
    pub fn mode(&self) -> &'static str {
        if self.debug { "DEBUG" } else { "TLS" }
    }

    pub fn rate_grace(&self) -> Duration {
        Duration::from_millis(self.rate_grace_ms)
    }

    pub fn drain_deadline(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout)
    }

    /// Fixes recoverable values in place; returns false on fatal problems.
    pub fn validate(&mut self) -> bool {
        let mut valid = true;

        if self.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            crate::log::error(&format!("listen_addr '{}' is not a valid address (expected ip:port)", self.listen_addr));
            valid = false;
        }

        if self.admission_capacity == 0 {
            crate::log::warn("admission_capacity is 0, using 100");
            self.admission_capacity = 100;
        }
        if self.max_connections == 0 {
            self.max_connections = 10_000;
        }
        if self.max_connections < self.admission_capacity {
            crate::log::warn(&format!(
                "max_connections ({}) < admission_capacity ({}), the gate can never fill",
                self.max_connections, self.admission_capacity
            ));
        }
        if !(self.max_rps.is_finite() && self.max_rps > 0.0) {
            crate::log::warn(&format!("max_rps invalid ({}), using 15", self.max_rps));
            self.max_rps = 15.0;
        }
        if self.shutdown_timeout == 0 {
            crate::log::warn("shutdown_timeout is 0, using 5");
            self.shutdown_timeout = 5;
        }
        for (name, v) in [
            ("read_timeout", &mut self.read_timeout),
            ("idle_timeout", &mut self.idle_timeout),
            ("write_timeout", &mut self.write_timeout),
        ] {
            if *v == 0 {
                crate::log::warn(&format!("{name} is 0, using 120"));
                *v = 120;
            }
        }
        if self.tcp_keepalive == 0 {
            self.tcp_keepalive = 30;
        }
        if self.handshake_timeout == 0 {
            self.handshake_timeout = 10;
        }
        if self.buffer_size < 1024 {
            crate::log::warn(&format!("buffer_size too small ({}), using 1024", self.buffer_size));
            self.buffer_size = 1024;
        }
        if self.max_header_size == 0 {
            self.max_header_size = 1 << 20;
        }
        if self.max_body_size == 0 {
            self.max_body_size = 10 << 20;
        }

        if !self.debug {
            if self.tls_cert.is_empty() || self.tls_key.is_empty() {
                crate::log::error("TLS mode requires both tls_cert and tls_key (or run with --debug)");
                valid = false;
            } else {
                if !std::path::Path::new(&self.tls_cert).exists() {
                    crate::log::error(&format!("tls_cert file not found: {}", self.tls_cert));
                    valid = false;
                }
                if !std::path::Path::new(&self.tls_key).exists() {
                    crate::log::error(&format!("tls_key file not found: {}", self.tls_key));
                    valid = false;
                }
            }
        }

        valid
    }
}

fn atomic_write(path: &str, content: &str) -> std::io::Result<()> {
    let tmp = format!("{path}.tmp");
    fs::write(&tmp, content)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Reads `path`, or writes a default file there when it does not exist.
/// Module sections missing from the file are filled from `module_defaults`.
pub fn load_config(path: &str, module_defaults: &HashMap<String, toml::Value>) -> Config {
    let mut cfg = match fs::read_to_string(path) {
        Ok(txt) => match toml::from_str(&txt) {
            Ok(c) => {
                crate::log::info(&format!("Loaded {path}"));
                c
            }
            Err(e) => {
                crate::log::error(&format!("Parse error {path}: {e}"));
                crate::log::warn("Using defaults");
                Config::default()
            }
        },
        Err(_) => {
            let cfg = Config { server: Srv::default(), modules: module_defaults.clone() };
            if atomic_write(path, &generate_config(&cfg)).is_ok() {
                crate::log::info(&format!("Generated {path}"));
            } else {
                crate::log::warn(&format!("No config at '{path}', using defaults"));
            }
            cfg
        }
    };
    let mut changed = false;
    for (name, value) in module_defaults {
        cfg.modules.entry(name.clone()).or_insert_with(|| {
            changed = true;
            value.clone()
        });
    }
    if changed {
        if let Err(e) = atomic_write(path, &generate_config(&cfg)) {
            crate::log::error(&format!("Failed to write config: {e}"));
        } else {
            crate::log::info("Config updated with new module defaults");
        }
    }
    cfg
}

pub fn generate_config(cfg: &Config) -> String {
    let s = &cfg.server;
    let mut srv = toml::Table::new();
    srv.insert("listen_addr".into(), toml::Value::String(s.listen_addr.clone()));
    srv.insert("debug".into(), toml::Value::Boolean(s.debug));
    srv.insert("tls_cert".into(), toml::Value::String(s.tls_cert.clone()));
    srv.insert("tls_key".into(), toml::Value::String(s.tls_key.clone()));
    srv.insert("admission_capacity".into(), toml::Value::Integer(s.admission_capacity as i64));
    srv.insert("max_connections".into(), toml::Value::Integer(s.max_connections as i64));
    srv.insert("max_rps".into(), toml::Value::Float(s.max_rps));
    srv.insert("rate_grace_ms".into(), toml::Value::Integer(s.rate_grace_ms as i64));
    srv.insert("shutdown_timeout".into(), toml::Value::Integer(s.shutdown_timeout as i64));
    srv.insert("read_timeout".into(), toml::Value::Integer(s.read_timeout as i64));
    srv.insert("idle_timeout".into(), toml::Value::Integer(s.idle_timeout as i64));
    srv.insert("write_timeout".into(), toml::Value::Integer(s.write_timeout as i64));
    srv.insert("tcp_keepalive".into(), toml::Value::Integer(s.tcp_keepalive as i64));
    srv.insert("handshake_timeout".into(), toml::Value::Integer(s.handshake_timeout as i64));
    srv.insert("max_header_size".into(), toml::Value::Integer(s.max_header_size as i64));
    srv.insert("max_body_size".into(), toml::Value::Integer(s.max_body_size as i64));
    srv.insert("buffer_size".into(), toml::Value::Integer(s.buffer_size as i64));
    srv.insert("log_level".into(), toml::Value::String(s.log_level.clone()));
    srv.insert("logging".into(), toml::Value::Boolean(s.logging));
    let mut doc = toml::Table::new();
    doc.insert("server".into(), toml::Value::Table(srv));
    let mut mods = toml::Table::new();
    for (name, value) in &cfg.modules {
        mods.insert(name.clone(), value.clone());
    }
    doc.insert("modules".into(), toml::Value::Table(mods));
    match toml::to_string_pretty(&doc) {
        Ok(s) => s,
        Err(e) => {
            crate::log::error(&format!("Config serialization failed: {e}"));
            String::new()
        }
    }
}
