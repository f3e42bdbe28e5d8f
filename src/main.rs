//! Main entry point for dossier.

use anyhow::Context;
use clap::Parser;
use dossier::cli::Cli;
use dossier::config::Settings;
use dossier::utils::{error_exit, warning};
use dossier::{logging, security, DossierError};
use tracing::debug;

#[tokio::main]
async fn main() {
    // Set up colored output for Windows
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    let cli = Cli::parse();

    let settings = match load_settings(&cli) {
        Ok(settings) => settings,
        Err(e) => error_exit(&format!("{e:#}"), 1),
    };
    logging::init(settings.log_level.as_deref());
    debug!(config = ?cli.config, data_file = ?settings.data_file, "settings loaded");

    for warn in security::check_permissions() {
        warning(&warn);
    }

    if let Err(e) = cli.execute(settings).await {
        if matches!(e, DossierError::Unauthorized) {
            warning("no owner configured; pass --owner or set DOSSIER_OWNER");
        }
        error_exit(&e.to_string(), 1);
    }
}

fn load_settings(cli: &Cli) -> anyhow::Result<Settings> {
    Settings::load(cli.config.as_deref()).context("failed to load settings")
}
