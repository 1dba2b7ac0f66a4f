use anyhow::{Context, Result};
use portal_cli::config::{PortalConfig, resolve_config_path};
use portal_cli::run_app;
use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Log file under ~/.config/portal, or ./portal.log without a home directory
fn open_log_file() -> Result<File> {
    let log_file_path = if let Some(home) = std::env::var_os("HOME") {
        let mut path = PathBuf::from(home);
        path.push(".config");
        path.push("portal");
        std::fs::create_dir_all(&path).ok();
        path.push("portal.log");
        path
    } else {
        PathBuf::from("portal.log")
    };

    match OpenOptions::new().create(true).append(true).open(&log_file_path) {
        Ok(file) => Ok(file),
        Err(_) => {
            eprintln!(
                "Warning: Could not open log file {:?}, logging to ./portal.log",
                log_file_path
            );
            File::create("portal.log").context("Failed to create ./portal.log")
        }
    }
}

// Screens and work futures are Rc-based, so everything stays on one thread
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let log_file = open_log_file()?;

    // Default to INFO level, can be overridden with RUST_LOG env var
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(log_file).with_ansi(false))
        .init();

    // Simple argument parsing: --config <path>
    let mut args = std::env::args().skip(1);
    let mut config_path: Option<PathBuf> = None;
    while let Some(arg) = args.next() {
        if arg == "--config" || arg == "-c" {
            if let Some(path) = args.next() {
                config_path = Some(PathBuf::from(path));
            }
        }
    }

    let config_path = resolve_config_path(config_path).context(
        "No config file: pass --config <path>, set PORTAL_CONFIG, or create ~/.config/portal/config.yaml",
    )?;
    let config = PortalConfig::load_from_file(&config_path)?;
    tracing::info!("[Portal] loaded config from {}", config_path.display());

    run_app(config).await
}
