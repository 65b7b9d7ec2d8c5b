use std::sync::Arc;

use anyhow::Result;
use chrono_tz::Tz;
use clap::Parser;
use homekeep_core::db;
use homekeep_core::error::CoreError;
use homekeep_core::planner::Planner;
use homekeep_core::repository::SqliteRepository;
use owo_colors::{OwoColorize, Style};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use config::Config;

mod cli;
mod commands;
mod config;
mod parser;
mod timezone;
mod util;
mod views;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} Invalid configuration: {}", "Error:".red().bold(), e);
            std::process::exit(2);
        }
    };
    init_tracing(&config.log_level);

    if let Err(e) = run(cli, config).await {
        handle_error(e);
        std::process::exit(1);
    }
}

/// Logs go to stderr so they never mix with command output. `RUST_LOG`
/// overrides the configured level.
fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli, config: Config) -> Result<()> {
    match cli.command {
        Commands::Next(command) => commands::next::print_next(command),
        Commands::Add(command) => {
            let (planner, tz) = open_planner(&config).await?;
            commands::add::add_task(&planner, command, tz).await
        }
        Commands::Upcoming(command) => {
            let (planner, tz) = open_planner(&config).await?;
            commands::upcoming::list_upcoming(&planner, command, tz).await
        }
        Commands::Backfill(command) => {
            let (planner, _) = open_planner(&config).await?;
            commands::backfill::backfill(&planner, command).await
        }
        Commands::Do(command) => {
            let (planner, tz) = open_planner(&config).await?;
            commands::r#do::do_occurrence(&planner, command, tz).await
        }
        Commands::Reschedule(command) => {
            let (planner, tz) = open_planner(&config).await?;
            commands::reschedule::reschedule(&planner, command, tz).await
        }
        Commands::Delete(command) => {
            let (planner, _) = open_planner(&config).await?;
            commands::delete::delete_task(&planner, command).await
        }
    }
}

/// Opens the store and builds the planner. `next` never gets here, so it runs
/// without a database.
async fn open_planner(config: &Config) -> Result<(Planner<SqliteRepository>, Tz)> {
    let tz = timezone::display_timezone(config.timezone.as_deref())?;
    let pool = db::establish_connection(config.database_path.as_deref()).await?;
    let repository = Arc::new(SqliteRepository::new(pool, config.user.clone()));
    Ok((Planner::new(repository, config.planner.clone().into()), tz))
}

fn handle_error(err: anyhow::Error) {
    let error_style = Style::new().red().bold();

    let core_error = err.chain().find_map(|e| e.downcast_ref::<CoreError>());
    match core_error {
        Some(CoreError::NotFound(s)) => {
            eprintln!("{} {}", "Error:".style(error_style), s);
        }
        Some(CoreError::AmbiguousId(matches)) => {
            eprintln!("{}", "Error: Ambiguous ID.".style(error_style));
            eprintln!("Did you mean one of these?");
            for (id, label) in matches {
                eprintln!("  {} ({})", id.yellow(), label);
            }
        }
        Some(CoreError::InvalidInput(s)) => {
            eprintln!("{} Invalid input: {}", "Error:".style(error_style), s);
        }
        Some(CoreError::InvalidDate(s)) => {
            eprintln!("{} Invalid date: {}", "Error:".style(error_style), s);
        }
        Some(CoreError::NotConfigured(s)) => {
            eprintln!("{} Store is not configured: {}", "Error:".style(error_style), s);
            eprintln!("Set `database_path` in homekeep.toml or HOMEKEEP_DATABASE_PATH.");
        }
        Some(CoreError::NoCurrentUser) => {
            eprintln!("{} No user is set.", "Error:".style(error_style));
            eprintln!("Set `user` in homekeep.toml or HOMEKEEP_USER.");
        }
        Some(CoreError::Database(db_err)) => {
            eprintln!("{} Database error: {}", "Error:".style(error_style), db_err);
        }
        _ => eprintln!("{} {:#}", "Error:".style(error_style), err),
    }
}
