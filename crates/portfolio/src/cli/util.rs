//! Shared utilities for CLI commands

use std::io::{self, Write};

use tokio::runtime::Runtime;

use portfolio_core::cloud::google::{DevicePrompt, GoogleDeviceAuth, GoogleDriveClient};
use portfolio_core::cloud::{CloudSyncAdapter, FileTokenCache};
use portfolio_core::config::{Backend, Config};
use portfolio_core::error::PortfolioError;
use portfolio_core::fs::{FileSystem, RealFileSystem};
use portfolio_core::model::PortfolioDocument;
use portfolio_core::save::SaveOrchestrator;
use portfolio_core::session::{AlwaysConfirm, ConfirmDelete, DeleteRequest, Session};
use portfolio_core::store::{FileHandleStore, KvStore, MemoryStore, PortfolioStore};

/// Session over whichever backend is configured.
pub type CliSession = Session<Box<dyn PortfolioStore>>;

pub type DriveAdapter = CloudSyncAdapter<GoogleDeviceAuth, GoogleDriveClient>;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] PortfolioError),

    #[error("{0}")]
    Usage(String),

    #[error("Failed to start async runtime: {0}")]
    Runtime(io::Error),
}

pub type CliResult<T = ()> = Result<T, CliError>;

/// Everything a command handler needs.
pub struct Context {
    pub config: Config,
    /// Backend for this invocation (`--backend` or the configured one)
    pub backend: Backend,
    pub runtime: Runtime,
}

impl Context {
    pub fn new(config: Config, backend_override: Option<Backend>) -> CliResult<Self> {
        let runtime = Runtime::new().map_err(CliError::Runtime)?;
        let backend = backend_override.unwrap_or(config.backend);
        Ok(Self {
            config,
            backend,
            runtime,
        })
    }

    pub fn block_on<F: std::future::Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    /// Open a session on the configured backend, starting a new project if
    /// the store is empty. Callers that change the document flush it with
    /// [`Context::finish`].
    ///
    /// With `yes`, deletions are not confirmed interactively.
    pub fn open_session(&self, yes: bool) -> CliResult<CliSession> {
        self.open_with(yes).map(|(session, _)| session)
    }

    /// Open a session for a command that only reads.
    ///
    /// Fails on an empty store instead of inventing a project that would
    /// never be saved.
    pub fn open_project(&self) -> CliResult<CliSession> {
        match self.open_with(true)? {
            (session, true) => Ok(session),
            (_, false) => Err(CliError::Usage(
                "No project yet; run 'portfolio init'".to_string(),
            )),
        }
    }

    fn open_with(&self, yes: bool) -> CliResult<(CliSession, bool)> {
        let store = self.build_store()?;
        let orchestrator = SaveOrchestrator::new(store, self.config.autosave_settings());
        let confirm: Box<dyn ConfirmDelete> = if yes {
            Box::new(AlwaysConfirm)
        } else {
            Box::new(TerminalConfirm)
        };
        let mut session = Session::new(orchestrator, confirm);
        let remembered = self.config.active_entry_id.as_deref();
        let existed = self.block_on(session.open(remembered))?;
        Ok((session, existed))
    }

    fn build_store(&self) -> CliResult<Box<dyn PortfolioStore>> {
        let store: Box<dyn PortfolioStore> = match self.backend {
            Backend::Memory => Box::new(MemoryStore::new()),
            Backend::File => {
                let path = self.config.resolved_file_path()?;
                Box::new(FileHandleStore::new(RealFileSystem).with_handle(path))
            }
            Backend::Store => {
                let path = self.config.resolved_store_path()?;
                if let Some(parent) = path.parent() {
                    RealFileSystem.create_dir_all(parent).map_err(PortfolioError::from)?;
                }
                Box::new(KvStore::open(&path)?)
            }
            Backend::Drive => {
                let mut cloud = self.drive_adapter()?;
                if self.block_on(cloud.restore_session()).is_none() {
                    return Err(CliError::Usage(
                        "Not signed in to Google Drive. Run 'portfolio cloud login' first."
                            .to_string(),
                    ));
                }
                Box::new(cloud)
            }
        };
        Ok(store)
    }

    /// Cloud adapter with the cached token loaded.
    pub fn drive_adapter(&self) -> CliResult<DriveAdapter> {
        let client_id = self.config.google_client_id.clone().ok_or_else(|| {
            CliError::Usage(
                "No Google OAuth client configured. Run 'portfolio config set-google-client <ID>'."
                    .to_string(),
            )
        })?;
        let identity = GoogleDeviceAuth::new(
            client_id,
            self.config.google_client_secret.clone(),
            Box::new(|prompt: &DevicePrompt| {
                println!("To sign in, visit {} and enter the code:", prompt.verification_url);
                println!();
                println!("    {}", prompt.user_code);
                println!();
                println!("Waiting for approval...");
            }),
        );
        let cache = FileTokenCache::in_config_dir(RealFileSystem)?;
        let mut adapter =
            CloudSyncAdapter::new(identity, GoogleDriveClient::new(), Box::new(cache));
        adapter.ensure_ready();
        Ok(adapter)
    }

    /// Flush pending changes and remember the selection.
    pub fn finish(&mut self, session: &mut CliSession) -> CliResult {
        if self.block_on(session.save_now())? {
            println!("✓ Saved to {}", session.orchestrator().store().name());
        }
        let active = session.active_entry_id().map(str::to_string);
        if self.config.active_entry_id != active {
            self.config.active_entry_id = active;
            self.config.save()?;
        }
        Ok(())
    }
}

/// Asks on the terminal before deleting.
pub struct TerminalConfirm;

impl ConfirmDelete for TerminalConfirm {
    fn confirm(&self, request: &DeleteRequest<'_>) -> bool {
        let message = match request {
            DeleteRequest::Topic {
                name, entry_count, ..
            } => format!("Delete topic '{}' and its {} entries?", name, entry_count),
            DeleteRequest::Entry { title, .. } => format!("Delete entry '{}'?", title),
        };
        prompt_confirm(&message)
    }
}

/// Prompt user for a yes/no answer. Anything but yes is no.
pub fn prompt_confirm(message: &str) -> bool {
    print!("{} [y/N] ", message);
    if io::stdout().flush().is_err() {
        return false;
    }

    let mut input = String::new();
    if io::stdin().read_line(&mut input).is_err() {
        return false;
    }
    matches!(input.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Shorten an id for display
pub fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

/// Pick the one id that equals `query` or starts with it.
fn resolve_id<'a>(
    ids: impl Iterator<Item = &'a str>,
    query: &str,
    what: &str,
) -> CliResult<String> {
    let mut matches = Vec::new();
    for id in ids {
        if id == query {
            return Ok(id.to_string());
        }
        if id.starts_with(query) {
            matches.push(id);
        }
    }
    match matches.as_slice() {
        [only] => Ok(only.to_string()),
        [] => Err(CliError::Usage(format!("No {} matches '{}'", what, query))),
        _ => Err(CliError::Usage(format!(
            "'{}' is ambiguous ({} matches); use more characters",
            query,
            matches.len()
        ))),
    }
}

pub fn resolve_entry_id(doc: &PortfolioDocument, query: &str) -> CliResult<String> {
    resolve_id(doc.entries().map(|e| e.id.as_str()), query, "entry")
}

pub fn resolve_topic_id(doc: &PortfolioDocument, query: &str) -> CliResult<String> {
    resolve_id(doc.topics.iter().map(|t| t.id.as_str()), query, "topic")
}
