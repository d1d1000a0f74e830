#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

mod cli;
mod error_fmt;
mod logging;
mod params;
mod run;
mod sim;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use eyre::WrapErr;
use fes_config::Config;
use fes_core::{FesError, GatewayCfg, StimulatorCfg};
use tracing::{debug, info};

use cli::{Cli, Commands, JSON_MODE, ParamsAction};
use error_fmt::{exit_code_for_error, format_error_json, humanize};

fn load_config(path: Option<&Path>) -> eyre::Result<Config> {
    let cfg = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .wrap_err_with(|| format!("reading config {}", path.display()))?;
            fes_config::load_toml(&text)
                .map_err(|e| FesError::Config(format!("{}: {e}", path.display())))?
        }
        None => Config::default(),
    };
    cfg.validate().map_err(|e| FesError::Config(e.to_string()))?;
    Ok(cfg)
}

fn emit(json: bool, value: serde_json::Value, text: String) {
    if json {
        println!("{value}");
    } else {
        println!("{text}");
    }
}

fn execute(cli: Cli, cfg: &Config) -> eyre::Result<()> {
    match cli.cmd {
        Commands::Simulate {
            body_weight,
            mese_steps,
            max_ms,
        } => {
            let script = sim::Script {
                body_weight,
                mese_steps,
                max_ms,
            };
            let summary = sim::run_session(
                script,
                GatewayCfg::from(cfg),
                StimulatorCfg::from(&cfg.stimulator),
            )?;
            emit(cli.json, summary.to_json(), summary.render_text());
        }
        Commands::Run {
            node,
            duration_ms,
            period_us,
        } => {
            let shutdown = Arc::new(AtomicBool::new(false));
            let flag = Arc::clone(&shutdown);
            ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))
                .wrap_err("installing Ctrl-C handler")?;
            let report = run::run(cfg, node, duration_ms, period_us, &shutdown)?;
            emit(cli.json, report.to_json(), report.render_text());
        }
        Commands::Params { action } => match action {
            ParamsAction::Show => {
                let view = params::show(cfg)?;
                emit(cli.json, view.to_json(), view.render_text());
            }
            ParamsAction::Reset => {
                let removed = params::reset(cfg)?;
                emit(
                    cli.json,
                    serde_json::json!({ "path": cfg.store.path, "removed": removed }),
                    format!("cleared {removed} stored values from {}", cfg.store.path),
                );
            }
        },
        Commands::SelfCheck => {
            // Parsing the store is part of the check.
            let view = params::show(cfg)?;
            debug!(stored = view.stored.len(), "parameter store readable");
            emit(
                cli.json,
                serde_json::json!({ "status": "ok", "store": view.path }),
                "OK".to_string(),
            );
        }
    }
    Ok(())
}

fn main() {
    let _ = color_eyre::install();
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    let result = load_config(cli.config.as_deref()).and_then(|cfg| {
        logging::init(&cli.log_level, cli.json, &cfg.logging)?;
        info!(version = env!("CARGO_PKG_VERSION"), "fes starting");
        execute(cli, &cfg)
    });

    if let Err(err) = result {
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", format_error_json(&err));
        } else {
            eprintln!("{}", humanize(&err));
        }
        std::process::exit(exit_code_for_error(&err));
    }
}
