//! Homestead CLI - household records from the terminal
//!
//! Works against the Homestead API when reachable and keeps working from the
//! offline cache when not; queued changes go out with `homestead sync`.

mod cli;
mod commands;
mod config_profiles;
mod error;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::add::run_add;
use crate::commands::clear::run_clear;
use crate::commands::common::GlobalOptions;
use crate::commands::config::run_config;
use crate::commands::conflicts::run_conflicts;
use crate::commands::delete::run_delete;
use crate::commands::edit::run_edit;
use crate::commands::get::run_get;
use crate::commands::list::run_list;
use crate::commands::range::run_range;
use crate::commands::status::run_status;
use crate::commands::sync::run_sync;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("homestead_core=warn,homestead_cli=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let options = GlobalOptions {
        data_path: cli.data_path,
        profile: cli.profile,
        offline: cli.offline,
    };

    match cli.command {
        Commands::Add { collection, fields } => run_add(&collection, &fields, &options).await?,
        Commands::Get {
            collection,
            id,
            json,
        } => run_get(&collection, &id, json, &options).await?,
        Commands::List {
            collection,
            limit,
            json,
        } => run_list(&collection, limit, json, &options).await?,
        Commands::Edit {
            collection,
            id,
            fields,
        } => run_edit(&collection, &id, &fields, &options).await?,
        Commands::Delete { collection, id } => run_delete(&collection, &id, &options).await?,
        Commands::Range {
            collection,
            from,
            to,
            refresh,
            json,
        } => run_range(&collection, &from, &to, refresh, json, &options).await?,
        Commands::Sync => run_sync(&options).await?,
        Commands::Status { json } => run_status(json, &options).await?,
        Commands::Conflicts { limit, json } => run_conflicts(limit, json, &options).await?,
        Commands::Clear { yes } => run_clear(yes, &options).await?,
        Commands::Config { command } => run_config(command, options.profile.as_deref())?,
    }

    Ok(())
}
