mod cache;
mod catalog;
mod colors;
mod config;
mod context;
mod error;
mod gate;
mod http;
mod limiter;
mod log;
mod metrics;
mod modules;
mod server;


use clap::Parser;
use std::future::Future;
use std::time::Duration;

const EXIT_GRACE: Duration = Duration::from_millis(500);

#[derive(Parser)]
#[command(name = "grocery", about = "In-memory product catalog service")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(long, default_value = "config.toml")]
    config: String,

    /// Serve plain HTTP instead of TLS
    #[arg(long)]
    debug: bool,
}

fn main() {
    let args = Args::parse();
    metrics::init();

    let defaults = modules::collect_defaults();
    let mut c = config::load_config(&args.config, &defaults);
    if args.debug {
        c.server.debug = true;
    }
    log::init(c.server.logging);
    log::set_level(&c.server.log_level);
    if !c.server.validate() {
        log::error("Invalid configuration, exiting");
        std::process::exit(1);
    }

    let rt = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            log::error(&format!("Failed to start runtime: {e}"));
            std::process::exit(1);
        }
    };

    std::process::exit(exit_after(rt, run(c)));
}

/// Drives `fut` to completion, then gives leftover blocking work a short
/// grace before the runtime is torn down.
fn exit_after<F: Future<Output = i32>>(rt: tokio::runtime::Runtime, fut: F) -> i32 {
    let code = rt.block_on(fut);
    rt.shutdown_timeout(EXIT_GRACE);
    code
}

async fn run(c: config::Config) -> i32 {
    let seed = seed_demo_data(&c);
    let catalog = if seed { catalog::Catalog::with_demo_data() } else { catalog::Catalog::new() };

    log::separator();
    log::info("Loading modules...");
    let services = modules::Services::new(&c.server, catalog);
    let pipe = modules::build_pipeline(&c.modules, &c.server, &services);
    log::separator();

    let deadline = c.server.drain_deadline();
    let srv = server::Server::new(c.server, pipe);
    run_until(&srv, deadline, wait_for_signal()).await
}

/// Serves until `stop` resolves, then drains for at most `deadline`.
async fn run_until<F>(srv: &server::Server, deadline: Duration, stop: F) -> i32
where
    F: Future<Output = &'static str>,
{
    if let Err(e) = srv.start().await {
        log::error(&format!("could not start server [ERR:{e}]"));
        return 1;
    }

    let sig = stop.await;
    log::info(&format!("caught signal {sig}"));

    let report = srv.shutdown(deadline).await;
    if report.abandoned > 0 {
        log::warn(&format!("{} connection(s) closed before finishing", report.abandoned));
    }
    log::info("DONE");
    0
}

fn seed_demo_data(c: &config::Config) -> bool {
    modules::helpers::is_enabled(&c.modules, "catalog_api")
        && modules::helpers::config_bool(&c.modules, "catalog_api", "seed_demo_data", true)
}

#[cfg(unix)]
async fn wait_for_signal() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};

    let streams = (
        signal(SignalKind::hangup()),
        signal(SignalKind::interrupt()),
        signal(SignalKind::terminate()),
        signal(SignalKind::quit()),
    );
    match streams {
        (Ok(mut hup), Ok(mut int), Ok(mut term), Ok(mut quit)) => tokio::select! {
            _ = hup.recv() => "hangup",
            _ = int.recv() => "interrupt",
            _ = term.recv() => "terminated",
            _ = quit.recv() => "quit",
        },
        _ => {
            log::warn("signal handlers unavailable, waiting for ctrl-c");
            let _ = tokio::signal::ctrl_c().await;
            "interrupt"
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> &'static str {
    let _ = tokio::signal::ctrl_c().await;
    "interrupt"
}
