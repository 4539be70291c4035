//! `arbiter-cli` – process entry point for the behavior arbiter.
//!
//! 1. Initialises structured logging (and OTLP export when configured).
//! 2. Loads `~/.arbiter/config.toml`, writing the defaults on first run.
//! 3. Builds the event bus and the behavior control loop.
//! 4. Runs the loop until **Ctrl-C**, or until an unrecoverable error.

mod config;

use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arbiter_middleware::EventBus;
use arbiter_runtime::ControlLoop;
use colored::Colorize;
use tracing::{error, info, warn};

fn main() -> ExitCode {
    let _telemetry = arbiter_runtime::init_tracing("arbiter");

    print_banner();

    let cfg = match config::load() {
        Ok(Some(cfg)) => {
            info!(path = %config::config_path().display(), "config loaded");
            cfg
        }
        Ok(None) => first_run_config(),
        Err(e) => {
            error!(error = %e, "failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    let behavior = match cfg.to_behavior_config() {
        Ok(behavior) => behavior,
        Err(e) => {
            error!(error = %e, "invalid configuration, refusing to start");
            return ExitCode::FAILURE;
        }
    };

    // ── Shutdown flag ─────────────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_handler = Arc::clone(&shutdown);
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – stopping behavior loop …".yellow().bold());
        shutdown_handler.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "failed to install Ctrl-C handler; graceful shutdown will not be available");
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "failed to start Tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    let bus = EventBus::new(cfg.bus_capacity);
    let result = runtime.block_on(async {
        let mut control = ControlLoop::new(behavior, &bus, bus.clone());
        control.run(shutdown).await
    });

    match result {
        Ok(()) => {
            println!("{}", "  ✓ Arbiter stopped.".green());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "behavior loop terminated");
            ExitCode::FAILURE
        }
    }
}

/// Defaults plus environment overrides, saved so the operator has a file to edit.
fn first_run_config() -> config::Config {
    let mut cfg = config::Config::default();
    config::apply_env_overrides(&mut cfg);
    match config::save(&cfg) {
        Ok(()) => println!(
            "  {} Default config written to {}",
            "✓".green().bold(),
            config::config_path().display().to_string().bold()
        ),
        Err(e) => warn!(error = %e, "could not write default config; continuing with defaults"),
    }
    cfg
}

fn print_banner() {
    println!();
    println!("  {} {}",
        "Arbiter".bold().cyan(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Robot behavior arbitration loop");
    println!();
}
