//! Sign-in / sign-out glue between the user and the credential manager.

use chrono::{DateTime, Utc};
use portal_auth_core::auth::{
    AuthError, Credential, CredentialManager, CredentialRequest, Origin, ProfileFetcher,
};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Which actions the user may take right now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Affordances {
    pub sign_in_enabled: bool,
    pub sign_out_enabled: bool,
}

impl Affordances {
    fn for_state(signed_in: bool) -> Self {
        Self {
            sign_in_enabled: !signed_in,
            sign_out_enabled: signed_in,
        }
    }
}

/// Summary of the active session, safe to print
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub origin: Origin,
    pub principal_name: Option<String>,
    pub username: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<&Credential> for SessionInfo {
    fn from(credential: &Credential) -> Self {
        Self {
            origin: credential.origin().clone(),
            principal_name: credential.principal_name().map(str::to_string),
            username: credential.username().map(str::to_string),
            expires_at: credential.expires_at(),
        }
    }
}

/// A failure translated for display, with the underlying cause kept
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserFacingError {
    pub message: String,
    pub cause: AuthError,
}

impl UserFacingError {
    fn signing_in(cause: AuthError) -> Self {
        Self {
            message: format!("Error while signing in: {}", describe(&cause)),
            cause,
        }
    }

    fn signing_out(cause: AuthError) -> Self {
        Self {
            message: format!("Error while signing out: {}", describe(&cause)),
            cause,
        }
    }
}

impl fmt::Display for UserFacingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for UserFacingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.cause)
    }
}

fn describe(error: &AuthError) -> String {
    match error {
        AuthError::NotRegistered(origin) | AuthError::UnknownServer(origin) => format!(
            "{} is not registered for sign-in. Check the portal URL in your configuration.",
            origin
        ),
        AuthError::AuthDenied { error, description } => format!(
            "the portal refused the sign-in ({}).",
            description.as_deref().unwrap_or(error)
        ),
        AuthError::StateMismatch => {
            "the sign-in response could not be verified. Please try again.".to_string()
        }
        AuthError::UserCancelled => "sign-in was cancelled.".to_string(),
        AuthError::AlreadyInProgress(_) => "a sign-in is already in progress.".to_string(),
        AuthError::NotFound(_) => "you are not signed in (the session may have expired).".to_string(),
        AuthError::InvalidUri(detail) => format!("invalid address: {}.", detail),
        AuthError::UnsupportedAuthType(auth_type) => {
            format!("this portal requires {} sign-in, which is not supported.", auth_type)
        }
        AuthError::MalformedRedirect(detail) => {
            format!("the pasted address is not a sign-in response ({}).", detail)
        }
    }
}

pub struct SignInController {
    manager: Arc<CredentialManager>,
    profiles: Arc<dyn ProfileFetcher>,
    server_uri: String,
    affordances: Affordances,
}

impl SignInController {
    pub fn new(
        manager: Arc<CredentialManager>,
        profiles: Arc<dyn ProfileFetcher>,
        server_uri: impl Into<String>,
    ) -> Self {
        let mut controller = Self {
            manager,
            profiles,
            server_uri: server_uri.into(),
            affordances: Affordances::for_state(false),
        };
        controller.refresh_affordances();
        controller
    }

    pub fn affordances(&self) -> Affordances {
        self.affordances
    }

    pub fn server_uri(&self) -> &str {
        &self.server_uri
    }

    /// Current session, if a valid credential is stored
    pub fn status(&mut self) -> Option<SessionInfo> {
        self.refresh_affordances();
        self.manager
            .find_credential(&self.server_uri)
            .ok()
            .map(|c| SessionInfo::from(&*c))
    }

    pub async fn sign_in(&mut self) -> Result<SessionInfo, UserFacingError> {
        if let Some(existing) = self.status() {
            tracing::info!(origin = %existing.origin, "Already signed in");
            return Ok(existing);
        }

        self.affordances.sign_in_enabled = false;

        match self.request_and_store().await {
            Ok(session) => {
                self.affordances = Affordances::for_state(true);
                Ok(session)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Sign-in failed");
                self.refresh_affordances();
                Err(UserFacingError::signing_in(e))
            }
        }
    }

    async fn request_and_store(&self) -> Result<SessionInfo, AuthError> {
        let request = CredentialRequest::oauth_implicit(&self.server_uri)?;
        let mut credential = self.manager.get_credential(&request).await?;

        let server = self.manager.server_info(&self.server_uri)?;
        match self.profiles.fetch_principal_name(&server, &credential).await {
            Ok(name) => credential.set_principal_name(name),
            // The credential stays valid without a display name
            Err(e) => tracing::warn!("Could not fetch portal profile: {:#}", e),
        }

        let stored = self.manager.add_credential(credential);
        tracing::info!(
            origin = %stored.origin(),
            principal = ?stored.display_name(),
            "Signed in"
        );
        Ok(SessionInfo::from(&*stored))
    }

    pub fn sign_out(&mut self) -> Result<SessionInfo, UserFacingError> {
        self.affordances.sign_out_enabled = false;

        let result = self
            .manager
            .find_credential(&self.server_uri)
            .and_then(|credential| self.manager.remove_credential(&credential));

        self.refresh_affordances();
        match result {
            Ok(removed) => {
                tracing::info!(origin = %removed.origin(), "Signed out");
                Ok(SessionInfo::from(&*removed))
            }
            Err(e) => {
                tracing::warn!(error = %e, "Sign-out failed");
                Err(UserFacingError::signing_out(e))
            }
        }
    }

    fn refresh_affordances(&mut self) {
        let signed_in = self.manager.find_credential(&self.server_uri).is_ok();
        self.affordances = Affordances::for_state(signed_in);
    }
}
