//! Error taxonomy for the sign-in flow.
//!
//! Every variant leaves the registry and store exactly as they were before
//! the failed call; nothing is retried automatically.

use super::server::AuthType;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Registry lookup for an origin nobody registered.
    #[error("No server registered for origin {0}")]
    NotRegistered(String),

    /// A credential was requested for a server the registry does not know.
    #[error("Unknown server: {0}")]
    UnknownServer(String),

    /// The provider redirected back with an `error` parameter.
    #[error("Authorization denied by provider: {error}")]
    AuthDenied {
        error: String,
        description: Option<String>,
    },

    #[error("State returned by the provider does not match the request")]
    StateMismatch,

    #[error("Sign-in was cancelled")]
    UserCancelled,

    #[error("A sign-in for {0} is already in progress")]
    AlreadyInProgress(String),

    #[error("No valid credential for {0}")]
    NotFound(String),

    #[error("Invalid URI: {0}")]
    InvalidUri(String),

    #[error("Unsupported authentication type: {0}")]
    UnsupportedAuthType(AuthType),

    #[error("Malformed redirect: {0}")]
    MalformedRedirect(String),
}

impl AuthError {
    /// Stable machine-readable name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::NotRegistered(_) => "not_registered",
            AuthError::UnknownServer(_) => "unknown_server",
            AuthError::AuthDenied { .. } => "auth_denied",
            AuthError::StateMismatch => "state_mismatch",
            AuthError::UserCancelled => "user_cancelled",
            AuthError::AlreadyInProgress(_) => "already_in_progress",
            AuthError::NotFound(_) => "not_found",
            AuthError::InvalidUri(_) => "invalid_uri",
            AuthError::UnsupportedAuthType(_) => "unsupported_auth_type",
            AuthError::MalformedRedirect(_) => "malformed_redirect",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_ignores_payload() {
        let denied = AuthError::AuthDenied {
            error: "access_denied".to_string(),
            description: Some("User said no".to_string()),
        };
        assert_eq!(denied.kind(), "auth_denied");
        assert_eq!(AuthError::NotFound("https://portal.example".into()).kind(), "not_found");
        assert_eq!(AuthError::StateMismatch.kind(), "state_mismatch");
        assert_eq!(
            AuthError::UnsupportedAuthType(AuthType::Token).kind(),
            "unsupported_auth_type"
        );
    }
}
