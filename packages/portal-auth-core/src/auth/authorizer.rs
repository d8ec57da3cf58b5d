//! Capabilities the sign-in flow borrows from its host application.
//!
//! The broker never renders anything itself. A web view, a browser hand-off
//! or a test double implements [`Authorizer`]; [`ProfileFetcher`] resolves a
//! display name for a freshly issued credential.

use super::credentials::Credential;
use super::server::ServerInfo;
use anyhow::Result;
use async_trait::async_trait;
use url::Url;

/// How an interactive authorization ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationOutcome {
    /// Navigation reached the redirect URI; carries the full URL, fragment included.
    Redirected(Url),
    /// The prompt was closed, timed out or otherwise abandoned.
    Dismissed,
}

#[async_trait]
pub trait Authorizer: Send + Sync {
    /// Show `authorize_url` to the user and wait for a navigation to `redirect_uri`.
    async fn authorize(&self, authorize_url: &Url, redirect_uri: &Url) -> AuthorizationOutcome;
}

#[async_trait]
pub trait ProfileFetcher: Send + Sync {
    /// Display name of the account `credential` was issued to.
    async fn fetch_principal_name(
        &self,
        server: &ServerInfo,
        credential: &Credential,
    ) -> Result<String>;
}

/// Try to open `url` in the default browser.
///
/// Returns false when the `browser` feature is disabled or no browser could
/// be launched; the caller should then show the URL for manual copying.
pub fn open_in_browser(url: &Url) -> bool {
    #[cfg(feature = "browser")]
    {
        match webbrowser::open(url.as_str()) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    "Failed to open browser automatically: {}. User can use the manual link.",
                    e
                );
                false
            }
        }
    }

    #[cfg(not(feature = "browser"))]
    {
        tracing::debug!("Browser support disabled, not opening {}", url.origin().ascii_serialization());
        false
    }
}
