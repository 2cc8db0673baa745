//! Command-line argument structures and enums

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use portfolio_core::config::Backend;

#[derive(Parser)]
#[command(name = "portfolio")]
#[command(version)]
#[command(about = "Topic-grouped writing with autosave and cloud sync", long_about = None)]
pub struct Cli {
    /// Override the configured storage backend (memory, file, store, drive)
    #[arg(short, long, global = true)]
    pub backend: Option<Backend>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Remember the storage backend (--backend) and create the project if it is empty
    Init {
        /// Data file (file backend) or database (store backend)
        #[arg(short, long)]
        path: Option<PathBuf>,
    },

    /// Replace the portfolio with a fresh project
    New {
        /// Skip confirmation
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Print the topic/entry tree
    #[command(alias = "ls")]
    Show,

    /// Show the backend and check for outside modifications
    Status,

    /// Manage topics
    #[command(alias = "t")]
    Topic {
        #[command(subcommand)]
        command: TopicCommands,
    },

    /// Manage entries
    #[command(alias = "e")]
    Entry {
        #[command(subcommand)]
        command: EntryCommands,
    },

    /// Replace the portfolio with an exported (or legacy) JSON file
    Import {
        file: PathBuf,

        /// Skip confirmation
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Write portfolio-data.json to a directory
    Export {
        /// Destination directory (default: current directory)
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },

    /// Google Drive sign-in and sync
    Cloud {
        #[command(subcommand)]
        command: CloudCommands,
    },

    /// Show or change configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
pub enum TopicCommands {
    /// Create a topic
    Add { name: String },

    Rename { id: String, name: String },

    /// Delete a topic and all of its entries
    Rm {
        id: String,

        /// Skip confirmation
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum EntryCommands {
    /// Append an entry to a topic and select it
    Add {
        topic_id: String,

        #[arg(short, long)]
        title: Option<String>,
    },

    /// Change an entry's title or content
    Edit {
        id: String,

        #[arg(short, long)]
        title: Option<String>,

        /// New content (HTML)
        #[arg(short, long, conflicts_with = "content_file")]
        content: Option<String>,

        /// Read new content from a file
        #[arg(long)]
        content_file: Option<PathBuf>,
    },

    Rm {
        id: String,

        /// Skip confirmation
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Move an entry to the end of another topic
    Mv { id: String, topic_id: String },

    /// Make an entry the active one
    Select { id: String },

    /// Print an entry's content
    Cat {
        /// Entry id (default: the active entry)
        id: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum CloudCommands {
    /// Sign in with a device code
    Login,

    /// Revoke the session and forget it
    Logout,

    /// Show the signed-in account
    Whoami,

    /// Upload the local portfolio
    Push,

    /// Replace the local portfolio with the uploaded one
    Pull {
        /// Skip confirmation
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show all settings
    Show,

    /// Turn autosave on or off
    SetAutosave {
        state: Toggle,

        /// Debounce window in milliseconds (500..=60000)
        #[arg(long)]
        interval_ms: Option<u64>,
    },

    /// Set the OAuth client used for Google sign-in
    SetGoogleClient {
        client_id: String,

        #[arg(long)]
        secret: Option<String>,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}
