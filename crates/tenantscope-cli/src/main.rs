//! tenantscope - Microsoft 365 tenant console for the terminal.
//!
//! Signs an administrator in, loads dashboard sections from Microsoft Graph
//! into a local cache and renders them as tables, CSV exports and
//! PowerShell remediation scripts.

mod app;
mod cli;
mod ui;

use std::io;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tenantscope_core::Config;

use app::App;
use cli::Cli;

/// Log file prefix; the appender adds the date.
const LOG_FILE_PREFIX: &str = "tenantscope.log";

/// Initialize the tracing subscriber for logging.
///
/// `RUST_LOG` controls the level (default `warn`). With a log directory, a
/// daily rolling file is written as well; keep the returned guard alive so
/// buffered lines are flushed on exit.
fn init_tracing(log_dir: Option<PathBuf>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) if std::fs::create_dir_all(&dir).is_ok() => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let mut config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Warning: failed to load config, using defaults: {:#}", e);
            Config::default()
        }
    };
    if let Some(ref tenant) = cli.tenant {
        config.tenant_id = Some(tenant.clone());
    }

    let log_dir = if cli.log_file || config.log_to_file {
        config.cache_dir().ok()
    } else {
        None
    };
    let _guard = init_tracing(log_dir);
    info!(version = env!("CARGO_PKG_VERSION"), "tenantscope starting");

    let mut app = App::new(config);
    let result = app.run(cli.command).await;
    app.finish().await;
    result
}
