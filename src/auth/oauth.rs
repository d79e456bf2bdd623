// Copyright 2025 Webmobix Solutions AG
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUTHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! OAuth2 installed-app authentication for the Google Sheets API.
//!
//! Tokens and the client secret live in a `.sheets-table-sync` directory,
//! searched first in the working directory and then in the home directory.

use anyhow::{Context, Result};
use google_sheets4::hyper_rustls;
use google_sheets4::yup_oauth2::{
    self, ApplicationSecret, InstalledFlowAuthenticator, InstalledFlowReturnMethod,
};
use hyper_util::client::legacy::connect::HttpConnector;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Directory holding tokens and the client secret.
pub const CONFIG_DIR_NAME: &str = ".sheets-table-sync";
const TOKEN_FILE_NAME: &str = "tokens.json";
const CLIENT_SECRET_FILE_NAME: &str = "client_secret.json";

/// Scopes requested for every token.
pub const SCOPES: &[&str] = &["https://www.googleapis.com/auth/spreadsheets"];

pub type HttpsConnector = hyper_rustls::HttpsConnector<HttpConnector>;
pub type SheetsAuthenticator = yup_oauth2::authenticator::Authenticator<HttpsConnector>;

/// Google Cloud Console client secret file format
#[derive(Debug, Deserialize)]
struct GoogleClientSecretFile {
    installed: ApplicationSecret,
}

/// Locates OAuth2 material and builds authenticators from it.
#[derive(Debug, Clone, Default)]
pub struct AuthManager {
    /// Token file; discovered when not set
    token_path: Option<PathBuf>,
    /// Client secret file; discovered when not set
    client_secret_path: Option<PathBuf>,
}

impl AuthManager {
    pub fn new(token_path: Option<PathBuf>) -> Self {
        Self {
            token_path,
            client_secret_path: None,
        }
    }

    pub fn with_client_secret(token_path: Option<PathBuf>, client_secret_path: PathBuf) -> Self {
        Self {
            token_path,
            client_secret_path: Some(client_secret_path),
        }
    }

    pub fn token_path(&self) -> Option<&Path> {
        self.token_path.as_deref()
    }

    /// Runs the browser consent flow and stores the tokens.
    ///
    /// Tokens go to the configured token path, or to the home directory's
    /// `.sheets-table-sync/tokens.json`.
    ///
    /// # Errors
    ///
    /// * If the client secret cannot be found or parsed
    /// * If the token directory cannot be created
    /// * If the OAuth2 flow or token exchange fails
    pub async fn authenticate(&self) -> Result<PathBuf> {
        info!("🔑 Starting OAuth2 authentication flow");

        let client_secret = self
            .load_client_secret()
            .await
            .context("Failed to load client secret")?;

        let token_path = match &self.token_path {
            Some(path) => path.clone(),
            None => home_config_dir()?.join(TOKEN_FILE_NAME),
        };
        if let Some(parent) = token_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let auth = InstalledFlowAuthenticator::builder(
            client_secret,
            InstalledFlowReturnMethod::HTTPRedirect,
        )
        .persist_tokens_to_disk(token_path.clone())
        .build()
        .await
        .context("Failed to create authenticator")?;

        auth.token(SCOPES)
            .await
            .context("Failed to obtain access token")?;

        info!("✅ Authentication successful");
        Ok(token_path)
    }

    /// Builds an authenticator backed by previously stored tokens.
    ///
    /// The returned authenticator refreshes tokens on its own; it is only
    /// expected to open a browser if the stored refresh token was revoked.
    pub async fn authenticator(&self) -> Result<SheetsAuthenticator> {
        let token_path = self.ensure_token_file()?;
        debug!("🔍 Using token cache at: {:?}", token_path);

        let client_secret = self
            .load_client_secret()
            .await
            .context("Failed to load client secret for Google Sheets API")?;

        InstalledFlowAuthenticator::builder(
            client_secret,
            InstalledFlowReturnMethod::HTTPRedirect,
        )
        .persist_tokens_to_disk(token_path)
        .build()
        .await
        .context("Failed to build authenticator from stored tokens")
    }

    /// Resolves a usable token file.
    ///
    /// Search order:
    /// 1. `token_override` (if provided)
    /// 2. `./.sheets-table-sync/tokens.json`
    /// 3. `~/.sheets-table-sync/tokens.json`
    ///
    /// # Errors
    ///
    /// Returns an error with remediation tips when no valid tokens can be found.
    pub fn resolve_token_path(token_override: Option<PathBuf>) -> Result<PathBuf> {
        if let Some(path) = token_override {
            validate_token_file(&path)?;
            info!("🔐 Using authentication tokens at: {}", path.display());
            return Ok(path);
        }

        match find_in(&search_dirs(), TOKEN_FILE_NAME, validate_token_file) {
            Some(path) => {
                info!("🔐 Using authentication tokens at: {}", path.display());
                Ok(path)
            }
            None => anyhow::bail!(
                "❌ No authentication tokens found.\n\n\
                Please authenticate first using one of these commands:\n\
                • Default (home directory): sheets-table-sync auth\n\
                • Local directory:         sheets-table-sync auth --local-cache\n\
                • Custom location:         sheets-table-sync auth --auth-cache /path/to/tokens.json"
            ),
        }
    }

    /// Returns this manager's token file, resolving one if none was set.
    pub fn ensure_token_file(&self) -> Result<PathBuf> {
        if let Some(path) = &self.token_path {
            validate_token_file(path)?;
            return Ok(path.clone());
        }

        Self::resolve_token_path(None)
    }

    fn find_client_secret_file(&self) -> Result<PathBuf> {
        if let Some(path) = &self.client_secret_path {
            if path.is_file() {
                return Ok(path.clone());
            }
            anyhow::bail!("Custom client secret file not found: {:?}", path);
        }

        find_in(&search_dirs(), CLIENT_SECRET_FILE_NAME, |path| {
            if path.is_file() {
                Ok(())
            } else {
                anyhow::bail!("not a file")
            }
        })
        .ok_or_else(|| {
            anyhow::anyhow!(
                "❌ No client_secret.json file found.\n\n\
                Create a Google Cloud OAuth2 desktop application and place the downloaded\n\
                client_secret.json file in one of these locations:\n\
                • Local directory:  ./{dir}/client_secret.json\n\
                • Home directory:   ~/{dir}/client_secret.json",
                dir = CONFIG_DIR_NAME
            )
        })
    }

    /// Loads the OAuth2 client secret.
    ///
    /// Accepts both the Google Cloud Console download (with its `installed`
    /// wrapper) and a bare `ApplicationSecret`.
    pub async fn load_client_secret(&self) -> Result<ApplicationSecret> {
        let secret_path = self.find_client_secret_file()?;

        let secret_json = fs::read_to_string(&secret_path)
            .with_context(|| format!("Failed to read client secret from {:?}", secret_path))?;

        if let Ok(google_format) = serde_json::from_str::<GoogleClientSecretFile>(&secret_json) {
            return Ok(google_format.installed);
        }

        serde_json::from_str::<ApplicationSecret>(&secret_json).with_context(|| {
            format!(
                "Failed to parse client secret JSON from {:?}. Expected the Google Cloud Console download.",
                secret_path
            )
        })
    }
}

/// `./.sheets-table-sync/` for local token storage.
pub fn local_config_dir() -> PathBuf {
    PathBuf::from(".").join(CONFIG_DIR_NAME)
}

pub fn home_config_dir() -> Result<PathBuf> {
    let home_dir = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .context("Cannot determine home directory. Use --auth-cache to choose a location.")?;
    Ok(PathBuf::from(home_dir).join(CONFIG_DIR_NAME))
}

pub fn token_file_in(dir: &Path) -> PathBuf {
    dir.join(TOKEN_FILE_NAME)
}

fn search_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![local_config_dir()];
    match home_config_dir() {
        Ok(home) => dirs.push(home),
        Err(err) => debug!("Skipping home directory search: {}", err),
    }
    dirs
}

/// First `file_name` inside `dirs` that passes `validate`. Invalid
/// candidates are reported and skipped.
fn find_in<F>(dirs: &[PathBuf], file_name: &str, validate: F) -> Option<PathBuf>
where
    F: Fn(&Path) -> Result<()>,
{
    for dir in dirs {
        let candidate = dir.join(file_name);
        if !candidate.exists() {
            debug!("🔍 No {} in {}", file_name, dir.display());
            continue;
        }

        match validate(&candidate) {
            Ok(()) => return Some(candidate),
            Err(err) => warn!(
                "⚠️  Ignoring {}: {}. Re-authenticate to replace it.",
                candidate.display(),
                err
            ),
        }
    }
    None
}

fn validate_token_file(token_path: &Path) -> Result<()> {
    if !token_path.exists() {
        anyhow::bail!("Token file not found at specified path: {:?}", token_path);
    }

    if !token_path.is_file() {
        anyhow::bail!("Token path is not a file: {:?}", token_path);
    }

    let metadata = fs::metadata(token_path)
        .with_context(|| format!("Failed to read token metadata: {:?}", token_path))?;

    if metadata.len() == 0 {
        anyhow::bail!("Token file is empty: {:?}", token_path);
    }

    Ok(())
}
