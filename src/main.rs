use std::process::ExitCode;

use clap::Parser;
use log::LevelFilter;

use grafana_backup_lib::backup::Backup;
use grafana_backup_lib::cli::Cli;
use grafana_backup_lib::config::{self, Config, ConfigError};

fn main() -> ExitCode {
    let cli = Cli::parse();

    // init logger
    let mut env_logger = env_logger::builder();
    env_logger.filter_level(LevelFilter::Info).parse_default_env();
    if let Some(level) = cli.verbose {
        env_logger.filter_level(level);
    }
    env_logger.try_init().expect("env_logger should not fail");

    let config = match Config::from_file(&cli.file) {
        Ok(config) => config,
        Err(ConfigError::NotFound(path)) => {
            log::error!("Config file {} doesn't exist, pass it with --file", path.display());
            match config::write_template(&path) {
                Ok(()) => log::info!("Wrote a config template to {}", path.display()),
                Err(e) => log::debug!("Writing a config template to {} failed: {e}", path.display()),
            }
            return ExitCode::FAILURE;
        }
        Err(e) => {
            log::error!("Loading the config file {} failed: {e}", cli.file.display());
            return ExitCode::FAILURE;
        }
    };

    let backup = match Backup::with_config(&config) {
        Ok(backup) => backup,
        Err(e) => {
            log::error!("Setting up the Grafana client failed: {e}");
            return ExitCode::FAILURE;
        }
    };

    match backup.run() {
        Ok(report) => {
            log::info!(target: "backup", "{report}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!(target: "backup", "{e}");
            ExitCode::FAILURE
        }
    }
}
