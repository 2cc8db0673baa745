//! Config command handlers

use std::time::Duration;

use portfolio_core::config::Config;
use portfolio_core::save::clamp_interval;

use crate::cli::args::{ConfigCommands, Toggle};
use crate::cli::util::{CliResult, Context};

pub fn handle_config_command(ctx: &mut Context, command: Option<ConfigCommands>) -> CliResult {
    match command {
        None | Some(ConfigCommands::Show) => show_config(ctx),
        Some(ConfigCommands::SetAutosave { state, interval_ms }) => {
            ctx.config.autosave = state == Toggle::On;
            if let Some(ms) = interval_ms {
                let clamped = clamp_interval(Duration::from_millis(ms));
                if clamped.as_millis() != u128::from(ms) {
                    println!("Interval clamped to {} ms", clamped.as_millis());
                }
                ctx.config.autosave_interval_ms = clamped.as_millis() as u64;
            }
            ctx.config.save()?;
            println!(
                "✓ Autosave {} ({} ms)",
                if ctx.config.autosave { "on" } else { "off" },
                ctx.config.autosave_interval_ms
            );
            Ok(())
        }
        Some(ConfigCommands::SetGoogleClient { client_id, secret }) => {
            ctx.config.google_client_id = Some(client_id);
            ctx.config.google_client_secret = secret;
            ctx.config.save()?;
            println!("✓ Google OAuth client saved");
            Ok(())
        }
    }
}

fn show_config(ctx: &Context) -> CliResult {
    let cfg = &ctx.config;
    println!("Portfolio Configuration");
    println!("=======================");
    println!("Backend: {:?}", cfg.backend);
    if let Ok(path) = cfg.resolved_file_path() {
        println!("Data file: {}", path.display());
    }
    if let Ok(path) = cfg.resolved_store_path() {
        println!("Store: {}", path.display());
    }
    println!(
        "Autosave: {} ({} ms)",
        if cfg.autosave { "on" } else { "off" },
        cfg.autosave_settings().interval.as_millis()
    );
    println!(
        "Cloud sync: {}",
        if cfg.cloud_sync_enabled { "enabled" } else { "disabled" }
    );
    if let Some(client_id) = &cfg.google_client_id {
        println!("Google client: {}", client_id);
    }
    println!("Theme: {:?} (accent {})", cfg.theme, cfg.accent_color);
    if let Some(path) = Config::config_path() {
        println!("Config file: {}", path.display());
    }
    Ok(())
}
