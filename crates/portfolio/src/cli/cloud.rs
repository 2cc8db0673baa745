//! Google Drive sign-in and sync commands

use portfolio_core::config::Backend;

use crate::cli::args::CloudCommands;
use crate::cli::util::{CliError, CliResult, Context, DriveAdapter, prompt_confirm};

pub fn handle_cloud_command(ctx: &mut Context, command: CloudCommands) -> CliResult {
    match command {
        CloudCommands::Login => handle_login(ctx),
        CloudCommands::Logout => {
            let mut cloud = ctx.drive_adapter()?;
            ctx.block_on(cloud.sign_out())?;
            println!("✓ Signed out");
            Ok(())
        }
        CloudCommands::Whoami => {
            let mut cloud = ctx.drive_adapter()?;
            match ctx.block_on(cloud.restore_session()) {
                Some(profile) => {
                    println!("{}", profile.display_name());
                    if let Some(email) = &profile.email {
                        println!("{}", email);
                    }
                }
                None => println!("Not signed in"),
            }
            Ok(())
        }
        CloudCommands::Push => handle_push(ctx),
        CloudCommands::Pull { yes } => handle_pull(ctx, yes),
    }
}

fn handle_login(ctx: &mut Context) -> CliResult {
    let mut cloud = ctx.drive_adapter()?;
    let profile = ctx.block_on(cloud.sign_in())?;
    println!("✓ Signed in as {}", profile.display_name());
    if !ctx.config.cloud_sync_enabled {
        ctx.config.cloud_sync_enabled = true;
        ctx.config.save()?;
    }
    Ok(())
}

/// Adapter with a validated session, for push and pull.
fn signed_in(ctx: &Context) -> CliResult<DriveAdapter> {
    if ctx.backend == Backend::Drive {
        return Err(CliError::Usage(
            "The drive backend already saves to Google Drive; push and pull sync a local backend"
                .to_string(),
        ));
    }
    let mut cloud = ctx.drive_adapter()?;
    if ctx.block_on(cloud.restore_session()).is_none() {
        return Err(CliError::Usage(
            "Not signed in. Run 'portfolio cloud login' first.".to_string(),
        ));
    }
    Ok(cloud)
}

fn handle_push(ctx: &mut Context) -> CliResult {
    let mut cloud = signed_in(ctx)?;
    let session = ctx.open_project()?;
    let info = ctx.block_on(cloud.upload(session.document()))?;
    println!(
        "✓ Uploaded {} entries to Google Drive ({})",
        session.document().entry_count(),
        info.name
    );
    Ok(())
}

fn handle_pull(ctx: &mut Context, yes: bool) -> CliResult {
    let mut cloud = signed_in(ctx)?;
    let Some(remote) = ctx.block_on(cloud.download())? else {
        println!("Nothing has been uploaded yet");
        return Ok(());
    };

    let mut session = ctx.open_session(yes)?;
    if !yes
        && !prompt_confirm(&format!(
            "Replace {} local entries with {} from Google Drive?",
            session.document().entry_count(),
            remote.entry_count()
        ))
    {
        println!("Cancelled");
        return Ok(());
    }
    session.replace_document(remote);
    println!("✓ Downloaded from Google Drive");
    ctx.finish(&mut session)
}
