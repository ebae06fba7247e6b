mod analyzer;
mod api;
mod attendance;
mod cli;
mod config;
mod db;
mod portal;

use crate::cli::{Cli, Commands, ConfigCommands};
use crate::config::Config;
use crate::db::Database;
use crate::portal::{PortalService, read_import_file};
use anyhow::{Context, Result, bail};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve => run_service(load_or_default_config()?).await,
        Commands::Status => handle_status(),
        Commands::Report {
            student_id,
            date,
            token,
        } => handle_report(&student_id, date.as_deref(), token.as_deref()).await,
        Commands::Import { file } => handle_import(&file),
        Commands::Config { command } => handle_config_command(command),
    }
}

fn handle_config_command(command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Set { key, value } => {
            let mut config = load_or_default_config()?;
            config.set_value(&key, &value)?;
            config.save()?;

            println!("Config saved: {key} = {value}");
            Ok(())
        }
        ConfigCommands::Get { key } => {
            let config = load_or_default_config()?;
            let value = config
                .get_value(&key)
                .with_context(|| format!("Unsupported config key: {key}"))?;

            println!("{value}");
            Ok(())
        }
    }
}

fn handle_status() -> Result<()> {
    let config = load_or_default_config()?;
    let database = Database::open(&config.db_path)?;

    println!("student-portal status");
    println!("- config: {}", Config::config_path()?.display());
    println!("- db_path: {}", config.db_path.display());
    println!("- stored_activities: {}", database.count_activities()?);
    println!("- api_port: {}", config.api_port);
    println!(
        "- attendance_base_url: {}",
        config
            .resolve_attendance_base_url()
            .unwrap_or_else(|| "not_set".to_string())
    );
    println!("- display_offset_hours: {}", config.display_offset_hours);

    Ok(())
}

async fn handle_report(student_id: &str, date: Option<&str>, token: Option<&str>) -> Result<()> {
    let config = load_or_default_config()?;
    let service = PortalService::from_config(&config);

    let reports = service.daily_reports(student_id, date, token).await?;
    let rendered =
        serde_json::to_string_pretty(&reports).context("Failed to serialize daily reports")?;

    println!("{rendered}");
    Ok(())
}

fn handle_import(file: &Path) -> Result<()> {
    let config = load_or_default_config()?;
    let requests = read_import_file(file)?;
    let summary = PortalService::from_config(&config).import_activities(&requests)?;

    println!(
        "Imported {} activit(ies), rejected {}",
        summary.stored, summary.rejected
    );
    if summary.stored == 0 && summary.rejected > 0 {
        bail!("No valid activity submissions in {}", file.display());
    }

    Ok(())
}

async fn run_service(config: Config) -> Result<()> {
    let _ = Database::open(&config.db_path)?;
    let shared_config = Arc::new(config);

    info!("student portal service started");

    tokio::select! {
        api_result = api::run_server(shared_config) => {
            api_result?;
        }
        _ = signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    Ok(())
}

fn load_or_default_config() -> Result<Config> {
    let path = Config::config_path()?;
    if path.exists() {
        return Config::load();
    }

    let config = Config::default();
    config.save()?;
    info!(path = %path.display(), "wrote default config");
    Ok(config)
}
