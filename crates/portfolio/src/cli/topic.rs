//! Topic command handlers

use portfolio_core::session::DeleteOutcome;

use crate::cli::args::TopicCommands;
use crate::cli::util::{CliResult, Context, resolve_topic_id, short_id};

pub fn handle_topic_command(ctx: &mut Context, command: TopicCommands) -> CliResult {
    match command {
        TopicCommands::Add { name } => {
            let mut session = ctx.open_session(true)?;
            let id = session.create_topic(&name)?;
            println!("✓ Created topic '{}' [{}]", name.trim(), short_id(&id));
            ctx.finish(&mut session)
        }
        TopicCommands::Rename { id, name } => {
            let mut session = ctx.open_session(true)?;
            let id = resolve_topic_id(session.document(), &id)?;
            session.rename_topic(&id, &name)?;
            println!("✓ Renamed topic to '{}'", name.trim());
            ctx.finish(&mut session)
        }
        TopicCommands::Rm { id, yes } => {
            let mut session = ctx.open_session(yes)?;
            let id = resolve_topic_id(session.document(), &id)?;
            match session.delete_topic(&id)? {
                DeleteOutcome::Deleted => println!("✓ Deleted topic [{}]", short_id(&id)),
                DeleteOutcome::Cancelled => println!("Cancelled"),
            }
            ctx.finish(&mut session)
        }
    }
}
