//! Authentication module for portal sign-in.
//!
//! Provides the OAuth 2.0 implicit-grant broker, the server registry and
//! in-memory credential storage.

mod authorizer;
mod credentials;
mod error;
mod implicit_flow;
mod manager;
mod server;

#[cfg(test)]
mod testing;

pub use authorizer::{open_in_browser, AuthorizationOutcome, Authorizer, ProfileFetcher};
pub use credentials::{AccessToken, Credential, CredentialRequest, CredentialStore};
pub use error::AuthError;
pub use implicit_flow::OAuthBroker;
pub use manager::{ChallengeHandler, CredentialManager};
pub use server::{AuthType, Origin, ServerInfo, ServerRegistry};
