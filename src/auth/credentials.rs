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

//! Shared access-token cache.
//!
//! One short-lived bearer token is kept behind a read/write lock. Readers
//! take the cached token while it is fresh; the first caller to find it
//! stale refreshes it under the write lock while everyone else waits.

use crate::auth::oauth::{SCOPES, SheetsAuthenticator};
use crate::utils::{SyncError, SyncResult};
use google_sheets4::common::GetToken;
use std::error::Error as StdError;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::RwLock;
use tracing::debug;

/// Tokens this close to expiry are treated as expired.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    token: String,
    expires_at: Option<SystemTime>,
}

impl Credential {
    pub fn new(token: impl Into<String>, expires_at: Option<SystemTime>) -> Self {
        Self {
            token: token.into(),
            expires_at,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|at| SystemTime::now() + EXPIRY_MARGIN >= at)
    }
}

/// Something that can mint a fresh credential.
pub trait TokenSource: Send + Sync + 'static {
    fn fetch(&self) -> impl Future<Output = SyncResult<Credential>> + Send;
}

impl TokenSource for SheetsAuthenticator {
    async fn fetch(&self) -> SyncResult<Credential> {
        let token = self
            .token(SCOPES)
            .await
            .map_err(|err| SyncError::Auth(format!("Failed to obtain access token: {}", err)))?;

        let value = token
            .token()
            .ok_or_else(|| SyncError::Auth("Token response missing access token".to_string()))?;

        Ok(Credential::new(
            value,
            token.expiration_time().map(SystemTime::from),
        ))
    }
}

struct CacheInner<S> {
    source: S,
    cached: RwLock<Option<Credential>>,
}

/// Cloneable handle to one cached credential.
pub struct CredentialCache<S: TokenSource = SheetsAuthenticator> {
    inner: Arc<CacheInner<S>>,
}

impl<S: TokenSource> Clone for CredentialCache<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: TokenSource> CredentialCache<S> {
    pub fn new(source: S) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                source,
                cached: RwLock::new(None),
            }),
        }
    }

    /// Returns a valid access token, refreshing it when needed.
    pub async fn credential(&self) -> SyncResult<String> {
        {
            let cached = self.inner.cached.read().await;
            if let Some(credential) = cached.as_ref()
                && !credential.is_expired()
            {
                return Ok(credential.token.clone());
            }
        }

        let mut cached = self.inner.cached.write().await;
        // Another caller may have refreshed while we waited for the lock.
        if let Some(credential) = cached.as_ref()
            && !credential.is_expired()
        {
            return Ok(credential.token.clone());
        }

        debug!("🔄 Refreshing access token");
        let credential = self.inner.source.fetch().await?;
        let token = credential.token.clone();
        *cached = Some(credential);
        Ok(token)
    }
}

impl<S: TokenSource> GetToken for CredentialCache<S> {
    fn get_token<'a>(
        &'a self,
        _scopes: &'a [&str],
    ) -> Pin<
        Box<
            dyn Future<Output = Result<Option<String>, Box<dyn StdError + Send + Sync>>>
                + Send
                + 'a,
        >,
    > {
        Box::pin(async move {
            self.credential()
                .await
                .map(Some)
                .map_err(|err| Box::new(err) as Box<dyn StdError + Send + Sync>)
        })
    }
}
