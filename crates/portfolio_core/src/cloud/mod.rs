//! Cloud sync of the portfolio document.
//!
//! A single fixed-name JSON file lives in the provider's application-private
//! folder. It is located by name on every operation (no remembered id), then
//! created or overwritten, which makes uploads idempotent.
//!
//! # Architecture
//!
//! ```text
//! CloudSyncAdapter ──► IdentityProvider (OAuth consent, profile, revoke)
//!        │          └► DriveApi        (find-by-name, create, update, download)
//!        └────────────► TokenCache      (session survives restarts)
//! ```
//!
//! The adapter implements [`PortfolioStore`], so the save orchestrator drives
//! it exactly like a local backend. Real Google implementations of the two
//! network seams live in [`google`] behind the `google-drive` feature.

mod token;

#[cfg(feature = "google-drive")]
pub mod google;

pub use token::{FileTokenCache, MemoryTokenCache, TokenCache};

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PortfolioError, Result};
use crate::fs::BoxFuture;
use crate::migrate::parse_document;
use crate::model::PortfolioDocument;
use crate::store::{PortfolioStore, encode_document};

/// Name of the document in the application folder.
pub const CLOUD_FILE_NAME: &str = "portfolio-data.json";

/// The signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

impl UserProfile {
    /// Best available label for display
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or(&self.id)
    }
}

/// OAuth access token plus its expiry.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    pub fn new(access_token: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            access_token: access_token.into(),
            expires_at,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("access_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Metadata of a file in the application folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFileInfo {
    /// Provider-specific file identifier
    pub id: String,
    pub name: String,
    pub modified_at: Option<DateTime<Utc>>,
    pub size: Option<u64>,
}

/// OAuth identity provider.
pub trait IdentityProvider: Send + Sync {
    /// Human-readable name for this provider
    fn name(&self) -> &str;

    /// Run the consent flow and return a fresh token.
    fn authorize(&self) -> BoxFuture<'_, Result<AccessToken>>;

    /// Fetch the profile the token belongs to. Fails if the token is invalid.
    fn fetch_profile<'a>(&'a self, token: &'a AccessToken) -> BoxFuture<'a, Result<UserProfile>>;

    /// Revoke the token with the provider.
    fn revoke<'a>(&'a self, token: &'a AccessToken) -> BoxFuture<'a, Result<()>>;
}

/// File operations inside the application-private folder.
///
/// Implementations map an invalid or expired token to
/// [`PortfolioError::NotSignedIn`] and other failures to
/// [`PortfolioError::Provider`].
pub trait DriveApi: Send + Sync {
    /// Look a file up by exact name.
    fn find_file<'a>(
        &'a self,
        token: &'a AccessToken,
        name: &'a str,
    ) -> BoxFuture<'a, Result<Option<RemoteFileInfo>>>;

    fn create_file<'a>(
        &'a self,
        token: &'a AccessToken,
        name: &'a str,
        content: &'a [u8],
    ) -> BoxFuture<'a, Result<RemoteFileInfo>>;

    /// Overwrite the content of an existing file.
    fn update_file<'a>(
        &'a self,
        token: &'a AccessToken,
        file_id: &'a str,
        content: &'a [u8],
    ) -> BoxFuture<'a, Result<RemoteFileInfo>>;

    fn download_file<'a>(
        &'a self,
        token: &'a AccessToken,
        file_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<u8>>>;
}

/// Cloud backend for the portfolio document.
pub struct CloudSyncAdapter<I: IdentityProvider, D: DriveApi> {
    identity: I,
    drive: D,
    cache: Box<dyn TokenCache>,
    file_name: String,
    ready: bool,
    token: Option<AccessToken>,
    profile: Option<UserProfile>,
}

impl<I: IdentityProvider, D: DriveApi> CloudSyncAdapter<I, D> {
    pub fn new(identity: I, drive: D, cache: Box<dyn TokenCache>) -> Self {
        Self {
            identity,
            drive,
            cache,
            file_name: CLOUD_FILE_NAME.to_string(),
            ready: false,
            token: None,
            profile: None,
        }
    }

    /// Use a different remote file name.
    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = name.into();
        self
    }

    /// Finish initialization. Safe to call any number of times.
    ///
    /// Loads the cached token, if any, on the first call.
    pub fn ensure_ready(&mut self) {
        if self.ready {
            return;
        }
        self.token = self.cache.load();
        self.ready = true;
        log::debug!(
            "{} sync ready (cached session: {})",
            self.identity.name(),
            self.token.is_some()
        );
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn is_signed_in(&self) -> bool {
        self.token.is_some()
    }

    /// Profile of the current session, once signed in or restored
    pub fn profile(&self) -> Option<&UserProfile> {
        self.profile.as_ref()
    }

    fn check_ready(&self) -> Result<()> {
        if self.ready {
            Ok(())
        } else {
            Err(PortfolioError::NotReady)
        }
    }

    /// Token for the next network call, re-validated every time.
    fn session_token(&self) -> Result<AccessToken> {
        self.check_ready()?;
        match &self.token {
            Some(token) if !token.is_expired(Utc::now()) => Ok(token.clone()),
            _ => Err(PortfolioError::NotSignedIn),
        }
    }

    fn drop_session(&mut self) {
        self.token = None;
        self.profile = None;
        if let Err(e) = self.cache.clear() {
            log::warn!("Failed to clear cached token: {}", e);
        }
    }

    /// An auth failure from the provider ends the session.
    fn on_error(&mut self, err: PortfolioError) -> PortfolioError {
        if matches!(err, PortfolioError::NotSignedIn) {
            log::warn!("{} rejected the session token", self.identity.name());
            self.drop_session();
        }
        err
    }

    /// Run the provider's consent flow and start a session.
    pub async fn sign_in(&mut self) -> Result<UserProfile> {
        self.check_ready()?;
        let token = self.identity.authorize().await?;
        let profile = self.identity.fetch_profile(&token).await?;
        self.cache.store(&token)?;
        log::info!("Signed in to {} as {}", self.identity.name(), profile.display_name());
        self.token = Some(token);
        self.profile = Some(profile.clone());
        Ok(profile)
    }

    /// Revoke the token and forget it locally.
    ///
    /// The local session is purged even if revocation fails; the revocation
    /// error is still returned.
    pub async fn sign_out(&mut self) -> Result<()> {
        self.check_ready()?;
        let revoked = match self.token.clone() {
            Some(token) => self.identity.revoke(&token).await,
            None => Ok(()),
        };
        self.drop_session();
        if let Err(e) = &revoked {
            log::warn!("Token revocation failed: {}", e);
        } else {
            log::info!("Signed out of {}", self.identity.name());
        }
        revoked
    }

    /// Validate a cached session on startup.
    ///
    /// Any failure clears the cached token, so there is never a half-valid
    /// session.
    pub async fn restore_session(&mut self) -> Option<UserProfile> {
        self.ensure_ready();
        let token = self.token.clone()?;
        if token.is_expired(Utc::now()) {
            log::info!("Cached session expired");
            self.drop_session();
            return None;
        }

        match self.identity.fetch_profile(&token).await {
            Ok(profile) => {
                self.profile = Some(profile.clone());
                Some(profile)
            }
            Err(e) => {
                log::info!("Cached session is no longer valid: {}", e);
                self.drop_session();
                None
            }
        }
    }

    /// Find-by-name then create or overwrite.
    pub async fn upload(&mut self, doc: &PortfolioDocument) -> Result<RemoteFileInfo> {
        let token = self.session_token()?;
        let name = self.file_name.clone();
        let bytes = encode_document(doc)?.into_bytes();

        let existing = self.drive.find_file(&token, &name).await;
        let existing = existing.map_err(|e| self.on_error(e))?;

        let uploaded = match existing {
            Some(info) => self.drive.update_file(&token, &info.id, &bytes).await,
            None => self.drive.create_file(&token, &name, &bytes).await,
        };
        let info = uploaded.map_err(|e| self.on_error(e))?;
        log::info!("Uploaded {} ({} bytes) as {}", name, bytes.len(), info.id);
        Ok(info)
    }

    /// Find-by-name then download. `None` if nothing was uploaded yet.
    pub async fn download(&mut self) -> Result<Option<PortfolioDocument>> {
        let token = self.session_token()?;
        let name = self.file_name.clone();

        let existing = self.drive.find_file(&token, &name).await;
        let Some(info) = existing.map_err(|e| self.on_error(e))? else {
            return Ok(None);
        };

        let bytes = self.drive.download_file(&token, &info.id).await;
        let bytes = bytes.map_err(|e| self.on_error(e))?;
        let text = String::from_utf8(bytes)
            .map_err(|e| PortfolioError::InvalidSchema(format!("remote file is not UTF-8: {e}")))?;
        let doc = parse_document(&text)?;
        log::info!("Downloaded {} ({})", name, info.id);
        Ok(Some(doc))
    }
}

impl<I: IdentityProvider, D: DriveApi> PortfolioStore for CloudSyncAdapter<I, D> {
    fn name(&self) -> &str {
        self.identity.name()
    }

    fn save<'a>(&'a mut self, doc: &'a PortfolioDocument) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move { self.upload(doc).await.map(|_| ()) })
    }

    fn load(&mut self) -> BoxFuture<'_, Result<Option<PortfolioDocument>>> {
        Box::pin(async move { self.download().await })
    }
}
