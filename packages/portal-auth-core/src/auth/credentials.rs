//! In-memory credential storage keyed by service origin.
//!
//! Credentials live only for the lifetime of the process. The store owns
//! every issued credential and hands out shared `Arc` handles, so a token is
//! never duplicated into other structures.

use super::error::AuthError;
use super::server::{parse_uri, AuthType, Origin};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use url::Url;

/// Opaque bearer token. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

/// A single sign-in attempt against `target_uri`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRequest {
    pub target_uri: Url,
    pub auth_type: AuthType,
}

impl CredentialRequest {
    pub fn new(target_uri: &str, auth_type: AuthType) -> Result<Self, AuthError> {
        Ok(Self {
            target_uri: parse_uri(target_uri)?,
            auth_type,
        })
    }

    pub fn oauth_implicit(target_uri: &str) -> Result<Self, AuthError> {
        Self::new(target_uri, AuthType::OAuthImplicit)
    }

    pub fn origin(&self) -> Result<Origin, AuthError> {
        Origin::from_url(&self.target_uri)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct Credential {
    origin: Origin,
    access_token: AccessToken,
    issued_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
    username: Option<String>,
    principal_name: Option<String>,
}

impl Credential {
    pub fn new(
        origin: Origin,
        access_token: AccessToken,
        issued_at: DateTime<Utc>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            origin,
            access_token,
            issued_at,
            expires_at,
            username: None,
            principal_name: None,
        }
    }

    /// Account name reported by the provider alongside the token
    pub fn with_username(mut self, username: Option<String>) -> Self {
        self.username = username.filter(|u| !u.is_empty());
        self
    }

    /// Display name from a follow-up profile fetch
    pub fn set_principal_name(&mut self, name: impl Into<String>) {
        self.principal_name = Some(name.into());
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    pub fn access_token(&self) -> &AccessToken {
        &self.access_token
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn principal_name(&self) -> Option<&str> {
        self.principal_name.as_deref()
    }

    /// Best name to show for the signed-in account
    pub fn display_name(&self) -> Option<&str> {
        self.principal_name().or(self.username())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

#[derive(Debug, Default)]
pub struct CredentialStore {
    credentials: RwLock<HashMap<Origin, Arc<Credential>>>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a credential, replacing any existing one for the same origin.
    pub fn add(&self, credential: Credential) -> Arc<Credential> {
        let credential = Arc::new(credential);
        let origin = credential.origin().clone();
        let replaced = self
            .credentials
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(origin.clone(), Arc::clone(&credential));

        tracing::debug!(
            origin = %origin,
            replaced = replaced.is_some(),
            expires_at = ?credential.expires_at(),
            "Credential stored"
        );
        credential
    }

    /// Valid credential for `origin`. Expired entries are dropped and reported as missing.
    pub fn find(&self, origin: &Origin) -> Result<Arc<Credential>, AuthError> {
        self.find_at(origin, Utc::now())
    }

    fn find_at(&self, origin: &Origin, now: DateTime<Utc>) -> Result<Arc<Credential>, AuthError> {
        let found = self
            .credentials
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(origin)
            .cloned()
            .ok_or_else(|| AuthError::NotFound(origin.to_string()))?;

        if !found.is_expired_at(now) {
            return Ok(found);
        }

        let mut credentials = self
            .credentials
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        // Only evict the entry we inspected; a fresh one may have replaced it meanwhile
        if credentials
            .get(origin)
            .is_some_and(|current| Arc::ptr_eq(current, &found))
        {
            credentials.remove(origin);
            tracing::info!(origin = %origin, "Credential expired, removed from store");
        }
        Err(AuthError::NotFound(origin.to_string()))
    }

    /// Remove and return the credential for `origin`.
    pub fn remove(&self, origin: &Origin) -> Result<Arc<Credential>, AuthError> {
        let removed = self
            .credentials
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(origin)
            .ok_or_else(|| AuthError::NotFound(origin.to_string()))?;

        tracing::debug!(origin = %origin, "Credential removed");
        Ok(removed)
    }

    pub fn contains(&self, origin: &Origin) -> bool {
        self.find(origin).is_ok()
    }

    pub fn len(&self) -> usize {
        self.credentials
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
