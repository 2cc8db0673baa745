/// Clap argument definitions
mod args;

/// Google Drive sign-in and sync
mod cloud;

/// Config command handlers
mod config;

/// Entry commands
mod entry;

/// `init`, `new`, `show`, `status`, `import`, `export`
mod project;

/// Topic commands
mod topic;

/// Shared CLI utilities
mod util;

use clap::Parser;

use portfolio_core::config::Config;

pub use args::Cli;
use args::Commands;
use util::Context;

/// Main entry point for the CLI
pub fn run_cli() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("✗ Could not load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let mut ctx = match Context::new(config, cli.backend) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("✗ {}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Init { path } => project::handle_init(&mut ctx, path),
        Commands::New { yes } => project::handle_new(&mut ctx, yes),
        Commands::Show => project::handle_show(&ctx),
        Commands::Status => project::handle_status(&ctx),
        Commands::Import { file, yes } => project::handle_import(&mut ctx, &file, yes),
        Commands::Export { dir } => project::handle_export(&ctx, dir),
        Commands::Topic { command } => topic::handle_topic_command(&mut ctx, command),
        Commands::Entry { command } => entry::handle_entry_command(&mut ctx, command),
        Commands::Cloud { command } => cloud::handle_cloud_command(&mut ctx, command),
        Commands::Config { command } => config::handle_config_command(&mut ctx, command),
    };

    if let Err(e) = result {
        eprintln!("✗ {}", e);
        std::process::exit(1);
    }
}
