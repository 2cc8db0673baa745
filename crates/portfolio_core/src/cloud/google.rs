//! Google identity and Drive `appDataFolder` clients.
//!
//! Sign-in uses the OAuth 2.0 device authorization grant, which suits a
//! terminal: the user is shown a code and a URL, and we poll until they
//! approve. The Drive client only ever touches the application-private
//! folder (`drive.appdata` scope).

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::{PortfolioError, Result};
use crate::fs::BoxFuture;

use super::{AccessToken, DriveApi, IdentityProvider, RemoteFileInfo, UserProfile};

const DEVICE_CODE_URL: &str = "https://oauth2.googleapis.com/device/code";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const REVOKE_URL: &str = "https://oauth2.googleapis.com/revoke";
const USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v3/userinfo";
const FILES_URL: &str = "https://www.googleapis.com/drive/v3/files";
const UPLOAD_URL: &str = "https://www.googleapis.com/upload/drive/v3/files";

const DEVICE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";
const FILE_FIELDS: &str = "id,name,modifiedTime,size";

/// Scopes requested at sign-in.
pub const SCOPES: &str = "openid email profile https://www.googleapis.com/auth/drive.appdata";

/// Map a non-success response onto the error taxonomy.
async fn api_error(context: &str, response: reqwest::Response) -> PortfolioError {
    let status = response.status();
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return PortfolioError::NotSignedIn;
    }
    let body = response.text().await.unwrap_or_default();
    PortfolioError::Provider(format!("{} failed ({}): {}", context, status, body))
}

fn transport(context: &str, err: reqwest::Error) -> PortfolioError {
    PortfolioError::Provider(format!("{}: {}", context, err))
}

// ============================================================================
// Drive
// ============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    name: String,
    #[serde(default)]
    modified_time: Option<DateTime<Utc>>,
    /// Drive reports sizes as decimal strings
    #[serde(default)]
    size: Option<String>,
}

impl From<DriveFile> for RemoteFileInfo {
    fn from(file: DriveFile) -> Self {
        RemoteFileInfo {
            id: file.id,
            name: file.name,
            modified_at: file.modified_time,
            size: file.size.and_then(|s| s.parse().ok()),
        }
    }
}

#[derive(Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

/// Drive v3 REST client scoped to `appDataFolder`.
#[derive(Clone, Default)]
pub struct GoogleDriveClient {
    client: reqwest::Client,
}

impl GoogleDriveClient {
    pub fn new() -> Self {
        Self::default()
    }

    async fn read_file(context: &str, response: reqwest::Response) -> Result<RemoteFileInfo> {
        if !response.status().is_success() {
            return Err(api_error(context, response).await);
        }
        let file: DriveFile = response
            .json()
            .await
            .map_err(|e| transport("Failed to parse Drive response", e))?;
        Ok(file.into())
    }
}

impl DriveApi for GoogleDriveClient {
    fn find_file<'a>(
        &'a self,
        token: &'a AccessToken,
        name: &'a str,
    ) -> BoxFuture<'a, Result<Option<RemoteFileInfo>>> {
        Box::pin(async move {
            let query = format!(
                "name = '{}' and trashed = false",
                name.replace('\'', "\\'")
            );
            let fields = format!("files({})", FILE_FIELDS);

            let response = self
                .client
                .get(FILES_URL)
                .bearer_auth(&token.access_token)
                .query(&[
                    ("spaces", "appDataFolder"),
                    ("q", query.as_str()),
                    ("fields", fields.as_str()),
                ])
                .send()
                .await
                .map_err(|e| transport("Failed to search Drive", e))?;

            if !response.status().is_success() {
                return Err(api_error("Drive search", response).await);
            }
            let list: FileList = response
                .json()
                .await
                .map_err(|e| transport("Failed to parse Drive response", e))?;
            Ok(list.files.into_iter().next().map(RemoteFileInfo::from))
        })
    }

    fn create_file<'a>(
        &'a self,
        token: &'a AccessToken,
        name: &'a str,
        content: &'a [u8],
    ) -> BoxFuture<'a, Result<RemoteFileInfo>> {
        Box::pin(async move {
            let metadata = serde_json::json!({
                "name": name,
                "mimeType": "application/json",
                "parents": ["appDataFolder"],
            });

            let metadata_part = reqwest::multipart::Part::text(metadata.to_string())
                .mime_str("application/json")
                .map_err(|e| transport("Failed to create metadata part", e))?;
            let file_part = reqwest::multipart::Part::bytes(content.to_vec())
                .file_name(name.to_string())
                .mime_str("application/json")
                .map_err(|e| transport("Failed to create file part", e))?;
            let form = reqwest::multipart::Form::new()
                .part("metadata", metadata_part)
                .part("file", file_part);

            let response = self
                .client
                .post(UPLOAD_URL)
                .bearer_auth(&token.access_token)
                .query(&[("uploadType", "multipart"), ("fields", FILE_FIELDS)])
                .multipart(form)
                .send()
                .await
                .map_err(|e| transport("Failed to upload to Drive", e))?;

            Self::read_file("Drive create", response).await
        })
    }

    fn update_file<'a>(
        &'a self,
        token: &'a AccessToken,
        file_id: &'a str,
        content: &'a [u8],
    ) -> BoxFuture<'a, Result<RemoteFileInfo>> {
        Box::pin(async move {
            let response = self
                .client
                .patch(format!("{}/{}", UPLOAD_URL, file_id))
                .bearer_auth(&token.access_token)
                .query(&[("uploadType", "media"), ("fields", FILE_FIELDS)])
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(content.to_vec())
                .send()
                .await
                .map_err(|e| transport("Failed to upload to Drive", e))?;

            Self::read_file("Drive update", response).await
        })
    }

    fn download_file<'a>(
        &'a self,
        token: &'a AccessToken,
        file_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<u8>>> {
        Box::pin(async move {
            let response = self
                .client
                .get(format!("{}/{}", FILES_URL, file_id))
                .bearer_auth(&token.access_token)
                .query(&[("alt", "media")])
                .send()
                .await
                .map_err(|e| transport("Failed to download from Drive", e))?;

            if !response.status().is_success() {
                return Err(api_error("Drive download", response).await);
            }
            let bytes = response
                .bytes()
                .await
                .map_err(|e| transport("Failed to read Drive response", e))?;
            Ok(bytes.to_vec())
        })
    }
}

// ============================================================================
// Identity
// ============================================================================

/// What the user must do to approve a device sign-in.
#[derive(Debug, Clone, Deserialize)]
pub struct DevicePrompt {
    pub user_code: String,
    #[serde(alias = "verification_uri")]
    pub verification_url: String,
    /// Seconds until the code expires
    pub expires_in: u64,
}

#[derive(Deserialize)]
struct DeviceCodeResponse {
    device_code: String,
    #[serde(flatten)]
    prompt: DevicePrompt,
    #[serde(default = "default_poll_interval")]
    interval: u64,
}

fn default_poll_interval() -> u64 {
    5
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Deserialize)]
struct UserInfo {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    picture: Option<String>,
}

/// Callback that shows the device code to the user.
pub type PromptHandler = Box<dyn Fn(&DevicePrompt) + Send + Sync>;

/// Google OAuth via the device authorization grant.
pub struct GoogleDeviceAuth {
    client: reqwest::Client,
    client_id: String,
    client_secret: Option<String>,
    on_prompt: PromptHandler,
}

impl GoogleDeviceAuth {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: Option<String>,
        on_prompt: PromptHandler,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            client_id: client_id.into(),
            client_secret,
            on_prompt,
        }
    }

    async fn request_device_code(&self) -> Result<DeviceCodeResponse> {
        let response = self
            .client
            .post(DEVICE_CODE_URL)
            .form(&[("client_id", self.client_id.as_str()), ("scope", SCOPES)])
            .send()
            .await
            .map_err(|e| transport("Failed to start sign-in", e))?;

        if !response.status().is_success() {
            return Err(api_error("Device code request", response).await);
        }
        response
            .json()
            .await
            .map_err(|e| transport("Failed to parse device code response", e))
    }

    async fn poll_token(&self, device: &DeviceCodeResponse) -> Result<AccessToken> {
        let mut interval = Duration::from_secs(device.interval.max(1));
        let deadline = tokio::time::Instant::now() + Duration::from_secs(device.prompt.expires_in);

        let mut form = vec![
            ("client_id", self.client_id.as_str()),
            ("device_code", device.device_code.as_str()),
            ("grant_type", DEVICE_GRANT),
        ];
        if let Some(secret) = &self.client_secret {
            form.push(("client_secret", secret.as_str()));
        }

        loop {
            tokio::time::sleep(interval).await;
            if tokio::time::Instant::now() >= deadline {
                return Err(PortfolioError::Provider("Sign-in code expired".to_string()));
            }

            let response = self
                .client
                .post(TOKEN_URL)
                .form(&form)
                .send()
                .await
                .map_err(|e| transport("Failed to poll for token", e))?;

            if response.status().is_success() {
                let token: TokenResponse = response
                    .json()
                    .await
                    .map_err(|e| transport("Failed to parse token response", e))?;
                let expires_at = token
                    .expires_in
                    .map(|secs| Utc::now() + chrono::Duration::seconds(secs));
                return Ok(AccessToken::new(token.access_token, expires_at));
            }

            let status = response.status();
            let error: TokenErrorResponse = response
                .json()
                .await
                .map_err(|e| transport("Failed to parse token error", e))?;
            match error.error.as_str() {
                "authorization_pending" => continue,
                "slow_down" => {
                    interval += Duration::from_secs(5);
                    log::debug!("Token polling slowed to {:?}", interval);
                }
                "access_denied" => {
                    return Err(PortfolioError::Provider("Sign-in was declined".to_string()));
                }
                "expired_token" => {
                    return Err(PortfolioError::Provider("Sign-in code expired".to_string()));
                }
                other => {
                    return Err(PortfolioError::Provider(format!(
                        "Token request failed ({}): {} {}",
                        status,
                        other,
                        error.error_description.unwrap_or_default()
                    )));
                }
            }
        }
    }
}

impl IdentityProvider for GoogleDeviceAuth {
    fn name(&self) -> &str {
        "Google Drive"
    }

    fn authorize(&self) -> BoxFuture<'_, Result<AccessToken>> {
        Box::pin(async move {
            let device = self.request_device_code().await?;
            (self.on_prompt)(&device.prompt);
            self.poll_token(&device).await
        })
    }

    fn fetch_profile<'a>(&'a self, token: &'a AccessToken) -> BoxFuture<'a, Result<UserProfile>> {
        Box::pin(async move {
            let response = self
                .client
                .get(USERINFO_URL)
                .bearer_auth(&token.access_token)
                .send()
                .await
                .map_err(|e| transport("Failed to fetch profile", e))?;

            if !response.status().is_success() {
                return Err(api_error("Profile request", response).await);
            }
            let info: UserInfo = response
                .json()
                .await
                .map_err(|e| transport("Failed to parse profile", e))?;
            Ok(UserProfile {
                id: info.sub,
                email: info.email,
                name: info.name,
                picture: info.picture,
            })
        })
    }

    fn revoke<'a>(&'a self, token: &'a AccessToken) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let response = self
                .client
                .post(REVOKE_URL)
                .form(&[("token", token.access_token.as_str())])
                .send()
                .await
                .map_err(|e| transport("Failed to revoke token", e))?;

            // Revoking an already-invalid token is reported as 400; nothing is left to undo
            let status = response.status();
            if status.is_success() || status == reqwest::StatusCode::BAD_REQUEST {
                Ok(())
            } else {
                Err(api_error("Token revocation", response).await)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drive_file_metadata_parsing() {
        let json = r#"{"files":[{"id":"abc","name":"portfolio-data.json","modifiedTime":"2024-03-01T09:30:00.000Z","size":"42"}]}"#;
        let list: FileList = serde_json::from_str(json).unwrap();
        let info: RemoteFileInfo = list.files.into_iter().next().unwrap().into();
        assert_eq!(info.id, "abc");
        assert_eq!(info.size, Some(42));
        assert!(info.modified_at.is_some());
    }

    #[test]
    fn test_device_code_response_parsing() {
        let json = r#"{"device_code":"dc","user_code":"ABCD-EFGH","verification_url":"https://www.google.com/device","expires_in":1800,"interval":5}"#;
        let device: DeviceCodeResponse = serde_json::from_str(json).unwrap();
        assert_eq!(device.device_code, "dc");
        assert_eq!(device.prompt.user_code, "ABCD-EFGH");
        assert_eq!(device.interval, 5);
    }
}
