use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "homestead")]
#[command(about = "Manage household records from the command line, online or offline")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to the offline data file
    #[arg(long, global = true, value_name = "PATH")]
    pub data_path: Option<PathBuf>,

    /// CLI profile name holding the API URL and user id
    #[arg(long, global = true, value_name = "NAME")]
    pub profile: Option<String>,

    /// Skip the remote store and work from the offline cache only
    #[arg(long, global = true)]
    pub offline: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a record
    #[command(alias = "new")]
    Add {
        /// Collection name (tasks, plants, projects, events ...)
        collection: String,
        /// Fields as key=value; values are read as JSON when they parse
        fields: Vec<String>,
    },
    /// Show one record
    Get {
        collection: String,
        /// Record ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List cached records of a collection
    List {
        collection: String,
        /// Number of records to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Update fields of a record (opens an editor when no fields are given)
    Edit {
        collection: String,
        /// Record ID
        id: String,
        /// Fields as key=value
        fields: Vec<String>,
    },
    /// Delete a record
    Delete {
        collection: String,
        /// Record ID
        id: String,
    },
    /// Show records whose date falls in [from, to)
    Range {
        collection: String,
        /// Start (YYYY-MM-DD, RFC 3339, or unix ms), inclusive
        #[arg(long)]
        from: String,
        /// End (YYYY-MM-DD, RFC 3339, or unix ms), exclusive
        #[arg(long)]
        to: String,
        /// Drop cached coverage for the collection and fetch again
        #[arg(long)]
        refresh: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Send queued offline changes to the remote store
    Sync,
    /// Show connectivity, queued changes and recent sync failures
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List recently resolved sync conflicts
    Conflicts {
        /// Number of conflicts to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Discard all offline data, including unsynced changes
    Clear {
        /// Confirm discarding unsynced changes
        #[arg(long)]
        yes: bool,
    },
    /// Configure CLI profiles
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Initialize or update profile config
    Init {
        /// Profile name to initialize
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
        /// Homestead API base URL
        #[arg(long, value_name = "URL")]
        api_url: Option<String>,
        /// Signed-in user id that owns queued changes
        #[arg(long, value_name = "ID")]
        user_id: Option<String>,
        /// Keep current active profile instead of activating this one
        #[arg(long)]
        no_activate: bool,
    },
}
