// Leveled, colored logging with timestamps
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use crate::colors::*;

static ENABLED: AtomicBool = AtomicBool::new(true);
static LOG_LEVEL: AtomicU8 = AtomicU8::new(LEVEL_INFO);

const LEVEL_DEBUG: u8 = 0;
const LEVEL_INFO: u8 = 1;
const LEVEL_WARN: u8 = 2;
const LEVEL_ERROR: u8 = 3;

pub fn init(enabled: bool) {
    ENABLED.store(enabled, Ordering::Relaxed);
}

pub fn set_level(level: &str) {
    let l = match level.to_lowercase().as_str() {
        "debug" => LEVEL_DEBUG,
        "info" => LEVEL_INFO,
        "warn" | "warning" => LEVEL_WARN,
        "error" => LEVEL_ERROR,
        _ => LEVEL_INFO,
    };
    LOG_LEVEL.store(l, Ordering::Relaxed);
}

fn active() -> bool {
    ENABLED.load(Ordering::Relaxed)
}

fn above_level(level: u8) -> bool {
    level >= LOG_LEVEL.load(Ordering::Relaxed)
}

fn timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}

pub fn debug(msg: &str) {
    if !active() || !above_level(LEVEL_DEBUG) { return; }
    let ts = timestamp();
    let _ = writeln!(io::stdout(), "{DIM}{ts}{RESET} {DIM}DBG{RESET} {msg}");
}

pub fn info(msg: &str) {
    if !active() || !above_level(LEVEL_INFO) { return; }
    let ts = timestamp();
    let _ = writeln!(io::stdout(), "{DIM}{ts}{RESET} {BOLD}{CYAN}{msg}{RESET}");
}

pub fn warn(msg: &str) {
    if !active() || !above_level(LEVEL_WARN) { return; }
    let ts = timestamp();
    let _ = writeln!(io::stderr(), "{DIM}{ts}{RESET} {YELLOW}⚠ {msg}{RESET}");
}

pub fn error(msg: &str) {
    if !active() { return; }
    let ts = timestamp();
    let _ = writeln!(io::stderr(), "{DIM}{ts}{RESET} {RED}✗ {msg}{RESET}");
}

pub fn module_loaded(name: &str) {
    if !active() || !above_level(LEVEL_INFO) { return; }
    let _ = writeln!(io::stdout(), "  {GREEN}✓{RESET} {name}");
}

pub fn request(method: &str, path: &str, ip: &str) {
    if !active() || !above_level(LEVEL_INFO) { return; }
    let ts = timestamp();
    let _ = writeln!(io::stdout(), "{DIM}{ts}{RESET} {YELLOW}→{RESET} {BOLD}{method}{RESET} {path} from {ip}");
}

pub fn response(status: u16, ms: u128) {
    if !active() || !above_level(LEVEL_INFO) { return; }
    let ts = timestamp();
    let col = status_color(status);
    let _ = writeln!(io::stdout(), "{DIM}{ts}{RESET} {GREEN}←{RESET} {BOLD}{col}{status}{RESET} ({ms}ms)");
}

pub fn separator() {
    if !active() { return; }
    let _ = writeln!(io::stdout(), "{SEPARATOR}");
}

/// Log sink bound to one request; every line carries `MODE "path" `.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestLogger {
    prefix: String,
}

impl RequestLogger {
    pub fn new(mode: &str, path: &str) -> Self {
        RequestLogger { prefix: format!("{mode} \"{path}\" ") }
    }

    pub fn info(&self, msg: &str) {
        if !active() || !above_level(LEVEL_INFO) { return; }
        let ts = timestamp();
        let _ = writeln!(io::stdout(), "{DIM}{ts}{RESET} {BLUE}{}{RESET}{msg}", self.prefix);
    }

    pub fn warn(&self, msg: &str) {
        if !active() || !above_level(LEVEL_WARN) { return; }
        let ts = timestamp();
        let _ = writeln!(io::stderr(), "{DIM}{ts}{RESET} {BLUE}{}{RESET}{YELLOW}{msg}{RESET}", self.prefix);
    }
}
