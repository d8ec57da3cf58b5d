use crate::auth::{Credential, ProfileFetcher, ServerInfo};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// HTTP request timeout in seconds
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Signed-in user's profile, relative to the server URL
const SELF_PATH: &str = "community/self";

/// Profile of the signed-in portal user
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortalUser {
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PortalErrorBody {
    code: Option<i64>,
    message: Option<String>,
}

/// The portal answers errors with HTTP 200 and an `error` object
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SelfResponse {
    Error { error: PortalErrorBody },
    User(PortalUser),
}

#[derive(Debug, Clone)]
pub struct PortalClient {
    client: reqwest::Client,
}

impl PortalClient {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }

    /// Fetch the profile of the user `credential` was issued to.
    pub async fn fetch_self(&self, server: &ServerInfo, credential: &Credential) -> Result<PortalUser> {
        let url = server.endpoint(SELF_PATH)?;

        let resp = self
            .client
            .get(url)
            .query(&[("f", "json")])
            .bearer_auth(credential.access_token().secret())
            .send()
            .await
            .context("Failed to request portal profile")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            tracing::debug!("Profile request failed: {} - {}", status, body);
            return Err(anyhow::anyhow!("Server returned error: {}", status));
        }

        match resp
            .json::<SelfResponse>()
            .await
            .context("Failed to parse portal profile")?
        {
            SelfResponse::User(user) => Ok(user),
            SelfResponse::Error { error } => Err(anyhow::anyhow!(
                "Portal error {}: {}",
                error.code.unwrap_or_default(),
                error.message.unwrap_or_default()
            )),
        }
    }
}

#[async_trait]
impl ProfileFetcher for PortalClient {
    async fn fetch_principal_name(&self, server: &ServerInfo, credential: &Credential) -> Result<String> {
        let user = self.fetch_self(server, credential).await?;
        user.full_name
            .or(user.username)
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("Portal profile has no display name"))
    }
}
