//! Web Change Detector Agent - Entry Point
//!
//! Runs the manual checks workflow, the admin HTTP surface and the
//! background health and log retention workers for one site.

use std::collections::HashMap;
use std::env;

use wcdagent::app::diagnostic::run_diagnostic;
use wcdagent::app::options::AppOptions;
use wcdagent::app::run::run;
use wcdagent::installer::install::install;
use wcdagent::logs::{init_logging, LogOptions};
use wcdagent::storage::layout::StorageLayout;
use wcdagent::storage::settings::Settings;
use wcdagent::utils::version_info;

use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    if cli_args.contains_key("version") {
        match serde_json::to_string_pretty(&version_info()) {
            Ok(version) => println!("{}", version),
            Err(e) => eprintln!("Failed to render version: {e}"),
        }
        return;
    }

    // Run diagnostics
    if cli_args.contains_key("diagnostic") || cli_args.contains_key("diag") {
        run_diagnostic().await;
        return;
    }

    // Run the installer
    if cli_args.contains_key("install") {
        return install(&cli_args).await;
    }

    // Run the agent starting here

    let layout = match cli_args.get("home") {
        Some(home) => StorageLayout::new(home),
        None => StorageLayout::default(),
    };
    if let Err(e) = layout.setup().await {
        eprintln!("Unable to create storage directories: {e}");
        return;
    }

    // Retrieve the settings file; defaults apply until the installer ran
    let settings_file = layout.settings_file();
    let settings_missing = !settings_file.exists().await;
    let settings = match settings_file.read_json_or_default::<Settings>().await {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Unable to read settings file: {e}");
            return;
        }
    };

    // Initialize logging
    let log_options = LogOptions {
        log_level: settings.log_level,
        json_format: settings.json_logs,
        log_dir: Some(layout.agent_log_dir().path().to_path_buf()),
        ..Default::default()
    };
    let _log_guard = match init_logging(log_options) {
        Ok(guard) => guard,
        Err(e) => {
            println!("Failed to initialize logging: {e}");
            None
        }
    };
    if settings_missing {
        warn!("No settings file found, using defaults");
        warn!("Run: wcdagent --install --token=<api_token> --domain=<site domain>");
    }

    // Run the server
    let options = AppOptions::from_settings(&settings, layout);

    info!("Running Web Change Detector agent with options: {:?}", options);
    let result = run(options, await_shutdown_signal()).await;
    if let Err(e) = result {
        error!("Failed to run the agent: {e}");
    }
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => {
                        info!("SIGTERM received, shutting down...");
                    }
                    _ = sigint.recv() => {
                        info!("SIGINT received, shutting down...");
                    }
                    _ = tokio::signal::ctrl_c() => {
                        info!("Ctrl+C received, shutting down...");
                    }
                }
                return;
            }
            _ => warn!("Unable to install signal handlers, waiting for Ctrl+C only"),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {e}");
        return;
    }
    info!("Ctrl+C received, shutting down...");
}
