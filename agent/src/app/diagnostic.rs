//! `--diagnostic`: run the health checks once and print the results

use colored::Colorize;

use crate::app::options::AppOptions;
use crate::app::state::AppState;
use crate::errors::AgentError;
use crate::recovery::health::HealthStatus;
use crate::storage::layout::StorageLayout;
use crate::storage::settings::Settings;
use crate::utils::version_info;

pub async fn run_diagnostic() {
    if let Err(e) = run_diagnostic_impl().await {
        eprintln!("{} {}", "[ERROR]".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run_diagnostic_impl() -> Result<(), AgentError> {
    let version = version_info();
    println!("{}", "Web Change Detector Agent Diagnostics".bold());
    println!("Version: {} ({}, built {})", version.version, version.git_hash, version.build_time);

    let layout = StorageLayout::default();
    println!("Storage: {:?}", layout.base_dir);

    let settings: Settings = layout.settings_file().read_json_or_default().await?;
    println!("Backend: {}", settings.backend.base_url);
    println!("Site: {} ({})", settings.site.site_id, settings.site.domain);
    println!();

    let state = AppState::init(&AppOptions::from_settings(&settings, layout)).await?;
    let snapshot = state.health_checker.refresh().await?;

    for (name, check) in &snapshot.checks {
        let marker = if check.passed {
            "PASS".green().bold()
        } else {
            "FAIL".red().bold()
        };
        println!("  [{}] {:<14} {}", marker, name, check.message);
    }

    let step = state.manual_checks.current_step().await?;
    println!();
    println!("Manual checks step: {}", step);

    let overall = match snapshot.overall_status {
        HealthStatus::Healthy => "healthy".green().bold(),
        HealthStatus::Warning => "warning".yellow().bold(),
        HealthStatus::Critical => "critical".red().bold(),
    };
    println!("Overall status: {}", overall);
    Ok(())
}
