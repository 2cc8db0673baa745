//! Entry command handlers

use portfolio_core::crud::EntryPatch;
use portfolio_core::fs::{FileSystem, RealFileSystem};
use portfolio_core::session::DeleteOutcome;

use crate::cli::args::EntryCommands;
use crate::cli::util::{CliError, CliResult, Context, resolve_entry_id, resolve_topic_id, short_id};

pub fn handle_entry_command(ctx: &mut Context, command: EntryCommands) -> CliResult {
    match command {
        EntryCommands::Add { topic_id, title } => {
            let mut session = ctx.open_session(true)?;
            let topic_id = resolve_topic_id(session.document(), &topic_id)?;
            let id = session.create_entry(&topic_id, title.as_deref())?;
            println!("✓ Created entry [{}]", short_id(&id));
            ctx.finish(&mut session)
        }
        EntryCommands::Edit {
            id,
            title,
            content,
            content_file,
        } => {
            let content = match content_file {
                Some(path) => Some(RealFileSystem.read_to_string(&path).map_err(|e| {
                    CliError::Usage(format!("Could not read {}: {}", path.display(), e))
                })?),
                None => content,
            };
            let patch = EntryPatch { title, content };
            if patch.is_empty() {
                return Err(CliError::Usage(
                    "Nothing to change; pass --title, --content or --content-file".to_string(),
                ));
            }

            let mut session = ctx.open_session(true)?;
            let id = resolve_entry_id(session.document(), &id)?;
            if session.update_entry(&id, &patch) {
                println!("✓ Updated entry [{}]", short_id(&id));
            }
            ctx.finish(&mut session)
        }
        EntryCommands::Rm { id, yes } => {
            let mut session = ctx.open_session(yes)?;
            let id = resolve_entry_id(session.document(), &id)?;
            match session.delete_entry(&id)? {
                DeleteOutcome::Deleted => println!("✓ Deleted entry [{}]", short_id(&id)),
                DeleteOutcome::Cancelled => println!("Cancelled"),
            }
            ctx.finish(&mut session)
        }
        EntryCommands::Mv { id, topic_id } => {
            let mut session = ctx.open_session(true)?;
            let id = resolve_entry_id(session.document(), &id)?;
            let topic_id = resolve_topic_id(session.document(), &topic_id)?;
            session.move_entry(&id, &topic_id)?;
            println!("✓ Moved entry [{}]", short_id(&id));
            ctx.finish(&mut session)
        }
        EntryCommands::Select { id } => {
            let mut session = ctx.open_session(true)?;
            let id = resolve_entry_id(session.document(), &id)?;
            session.select_entry(&id)?;
            println!("✓ Selected [{}]", short_id(&id));
            ctx.finish(&mut session)
        }
        EntryCommands::Cat { id } => {
            let session = ctx.open_project()?;
            let entry = match id {
                Some(id) => {
                    let id = resolve_entry_id(session.document(), &id)?;
                    session.document().find_entry(&id).cloned()
                }
                None => session.active_entry().cloned(),
            };
            match entry {
                Some(entry) => {
                    println!("# {}", entry.title);
                    println!();
                    println!("{}", entry.content);
                    Ok(())
                }
                None => Err(CliError::Usage("No entry selected".to_string())),
            }
        }
    }
}
