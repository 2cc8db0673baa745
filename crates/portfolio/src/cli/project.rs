//! Whole-project commands

use std::path::{Path, PathBuf};

use portfolio_core::config::Backend;
use portfolio_core::exchange;
use portfolio_core::fs::{FileSystem, RealFileSystem};
use portfolio_core::store::ExternalChange;

use crate::cli::util::{CliError, CliResult, Context, prompt_confirm, short_id};

pub fn handle_init(ctx: &mut Context, path: Option<PathBuf>) -> CliResult {
    ctx.config.backend = ctx.backend;
    if let Some(path) = path {
        match ctx.backend {
            Backend::File => ctx.config.file_path = Some(path),
            Backend::Store => ctx.config.store_path = Some(path),
            Backend::Memory | Backend::Drive => {
                return Err(CliError::Usage(
                    "--path only applies to the file and store backends".to_string(),
                ));
            }
        }
    }
    ctx.config.save()?;

    let mut session = ctx.open_session(true)?;
    let doc = session.document();
    println!(
        "✓ Using {} ({} topics, {} entries)",
        session.orchestrator().store().name(),
        doc.topics.len(),
        doc.entry_count()
    );
    ctx.finish(&mut session)
}

pub fn handle_new(ctx: &mut Context, yes: bool) -> CliResult {
    let mut session = ctx.open_session(yes)?;
    if !yes && !prompt_confirm("Replace the whole portfolio with an empty project?") {
        println!("Cancelled");
        return Ok(());
    }
    session.new_project();
    println!("✓ Started a new project");
    ctx.finish(&mut session)
}

pub fn handle_show(ctx: &Context) -> CliResult {
    let session = ctx.open_project()?;
    let doc = session.document();
    let active = session.active_entry_id();

    if doc.is_empty() {
        println!("(no topics)");
        return Ok(());
    }
    for topic in &doc.topics {
        println!("{}  [{}]", topic.name, short_id(&topic.id));
        if topic.entries.is_empty() {
            println!("    (empty)");
        }
        for entry in &topic.entries {
            let marker = if Some(entry.id.as_str()) == active { "*" } else { " " };
            println!(
                "  {} {}  [{}]  {}",
                marker,
                entry.title,
                short_id(&entry.id),
                entry.created_at.format("%Y-%m-%d %H:%M")
            );
        }
    }
    Ok(())
}

pub fn handle_status(ctx: &Context) -> CliResult {
    let mut session = ctx.open_project()?;
    println!("Backend:  {}", session.orchestrator().store().name());
    if let Some(path) = session_path(ctx)? {
        println!("Location: {}", path.display());
    }
    let settings = session.orchestrator().settings();
    println!(
        "Autosave: {} ({} ms)",
        if settings.enabled { "on" } else { "off" },
        settings.interval.as_millis()
    );
    println!("Entries:  {}", session.document().entry_count());

    match ctx.block_on(session.on_focus())? {
        ExternalChange::Unchanged => println!("✓ No outside changes"),
        ExternalChange::Modified { path, .. } => {
            println!("⚠ {} was changed by another program", path.display())
        }
    }
    Ok(())
}

fn session_path(ctx: &Context) -> CliResult<Option<PathBuf>> {
    Ok(match ctx.backend {
        Backend::File => Some(ctx.config.resolved_file_path()?),
        Backend::Store => Some(ctx.config.resolved_store_path()?),
        Backend::Memory | Backend::Drive => None,
    })
}

pub fn handle_import(ctx: &mut Context, file: &Path, yes: bool) -> CliResult {
    let text = RealFileSystem
        .read_to_string(file)
        .map_err(|e| CliError::Usage(format!("Could not read {}: {}", file.display(), e)))?;
    // Parse first so a bad file never prompts
    let incoming = exchange::import_json(&text)?;

    let mut session = ctx.open_session(yes)?;
    if !yes
        && !prompt_confirm(&format!(
            "Replace {} entries with {} imported entries?",
            session.document().entry_count(),
            incoming.entry_count()
        ))
    {
        println!("Cancelled");
        return Ok(());
    }
    session.replace_document(incoming);
    println!("✓ Imported {}", file.display());
    ctx.finish(&mut session)
}

pub fn handle_export(ctx: &Context, dir: Option<PathBuf>) -> CliResult {
    let session = ctx.open_project()?;
    let dir = dir.unwrap_or_else(|| PathBuf::from("."));
    let path = exchange::export_to(&RealFileSystem, &dir, session.document())?;
    println!("✓ Exported to {}", path.display());
    Ok(())
}
