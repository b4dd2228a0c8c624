//! pitwall daemon entry point

use log::info;
use pitwall::{AppConfig, Result, Supervisor};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const DEFAULT_CONFIG_PATH: &str = "/etc/pitwall.toml";

fn main() -> Result<()> {
    let config_path = parse_config_path();
    let config = load_config(&config_path);

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .init();

    info!("pitwall starting (config: {})", config_path);

    let running = Arc::new(AtomicBool::new(true));
    let ctrlc_flag = Arc::clone(&running);
    ctrlc::set_handler(move || {
        info!("Shutdown signal received");
        ctrlc_flag.store(false, Ordering::Relaxed);
    })
    .map_err(|e| pitwall::Error::Other(format!("Failed to install signal handler: {}", e)))?;

    let mut supervisor = Supervisor::new(config, running)?;
    supervisor.run()
}

/// `pitwall [--config <path>]`, also accepting a bare positional path
fn parse_config_path() -> String {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                if let Some(path) = args.next() {
                    return path;
                }
            }
            other if !other.starts_with('-') => return other.to_string(),
            _ => {}
        }
    }
    DEFAULT_CONFIG_PATH.to_string()
}

fn load_config(path: &str) -> AppConfig {
    match AppConfig::from_file(path) {
        Ok(config) => config,
        Err(e) => {
            // Logging is not up yet at this point, so eprintln
            eprintln!("pitwall: no usable config at {} ({}), using defaults", path, e);
            AppConfig::default()
        }
    }
}
