//! Subscriber setup: console on stderr plus an optional JSON log file.

use std::path::Path;

use eyre::WrapErr;
use fes_config::Logging;
use tracing_appender::rolling;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::cli::FILE_GUARD;

/// `RUST_LOG` wins over `--log-level` on the console. The file layer uses
/// `[logging].level` (default `info`).
pub fn init(console_level: &str, json: bool, cfg: &Logging) -> eyre::Result<()> {
    let console_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(console_level))
        .wrap_err_with(|| format!("invalid log level '{console_level}'"))?;
    let console = fmt::layer().with_writer(std::io::stderr).with_target(true);
    let console = if json {
        console.json().boxed()
    } else {
        console.boxed()
    };

    let file_layer = match cfg.file.as_deref() {
        Some(path) => {
            let level = cfg.level.as_deref().unwrap_or("info");
            let filter = EnvFilter::try_new(level)
                .wrap_err_with(|| format!("invalid logging.level '{level}'"))?;
            let path = Path::new(path);
            let dir = path
                .parent()
                .filter(|d| !d.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| eyre::eyre!("logging.file has no file name"))?;
            let appender = match cfg.rotation.as_deref().unwrap_or("never") {
                "daily" => rolling::daily(dir, name),
                "hourly" => rolling::hourly(dir, name),
                _ => rolling::never(dir, name),
            };
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            Some(
                fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(writer)
                    .with_filter(filter),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console.with_filter(console_filter))
        .with(file_layer)
        .try_init()
        .map_err(|e| eyre::eyre!("logging init failed: {e}"))
}
