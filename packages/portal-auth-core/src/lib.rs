//! Portal Auth Core Library
//!
//! This crate provides the sign-in machinery for an online mapping portal:
//! - Server registry (origin to OAuth client parameters)
//! - OAuth 2.0 implicit-grant broker with CSRF `state` checking
//! - In-memory credential store keyed by origin
//! - Portal profile lookup and layered configuration
//!
//! # Features
//!
//! - `browser` (default): Open the authorization page in the default browser
//!
//! # Example
//!
//! ```no_run
//! use portal_auth_core::auth::{CredentialManager, CredentialRequest};
//! use portal_auth_core::portal;
//! # use portal_auth_core::auth::{AuthorizationOutcome, Authorizer};
//! # use std::sync::Arc;
//! # struct WebView;
//! # #[async_trait::async_trait]
//! # impl Authorizer for WebView {
//! #     async fn authorize(&self, _: &url::Url, _: &url::Url) -> AuthorizationOutcome {
//! #         AuthorizationOutcome::Dismissed
//! #     }
//! # }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = portal::load_portal_config();
//!     let manager = CredentialManager::with_authorizer(Arc::new(WebView));
//!     manager.register_server(config.server_info()?);
//!
//!     // Opens the login page and waits for the redirect
//!     let request = CredentialRequest::oauth_implicit(&config.portal_url.value)?;
//!     let credential = manager.get_credential(&request).await?;
//!     manager.add_credential(credential);
//!
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod portal;

// Re-export commonly used types
pub use auth::{
    AuthError, AuthType, Credential, CredentialManager, CredentialRequest, CredentialStore,
    OAuthBroker, Origin, ServerInfo, ServerRegistry,
};
pub use portal::{PortalClient, PortalConfig};
