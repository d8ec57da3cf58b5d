//! OAuth 2.0 Implicit Grant flow (RFC 6749 section 4.2).
//!
//! The broker builds the authorize URL, hands it to an interactive
//! [`Authorizer`] and turns the fragment of the final redirect into a
//! [`Credential`]. Storing the credential is left to the caller.

use super::authorizer::{AuthorizationOutcome, Authorizer};
use super::credentials::{AccessToken, Credential, CredentialRequest};
use super::error::AuthError;
use super::server::{AuthType, Origin, ServerInfo, ServerRegistry};
use chrono::{Duration, Utc};
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use url::{form_urlencoded, Url};

/// Length of the anti-replay `state` value
const STATE_LENGTH: usize = 32;

/// Parameters of a successful implicit-grant redirect
#[derive(Debug)]
struct ImplicitGrantResponse {
    access_token: String,
    expires_in: Option<Duration>,
    state: Option<String>,
    username: Option<String>,
}

pub struct OAuthBroker {
    registry: Arc<ServerRegistry>,
    authorizer: Arc<dyn Authorizer>,
    in_flight: Mutex<HashSet<Origin>>,
}

impl OAuthBroker {
    pub fn new(registry: Arc<ServerRegistry>, authorizer: Arc<dyn Authorizer>) -> Self {
        Self {
            registry,
            authorizer,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Whether an interactive sign-in for `origin` is currently open.
    pub fn is_in_progress(&self, origin: &Origin) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(origin)
    }

    /// Run the implicit-grant flow for `request`.
    ///
    /// Suspends while the user completes the interactive login. At most one
    /// attempt per origin runs at a time; a concurrent call fails with
    /// [`AuthError::AlreadyInProgress`] without opening a second prompt.
    pub async fn request_credential(
        &self,
        request: &CredentialRequest,
    ) -> Result<Credential, AuthError> {
        if request.auth_type != AuthType::OAuthImplicit {
            return Err(AuthError::UnsupportedAuthType(request.auth_type));
        }

        let origin = request.origin()?;
        let server = self
            .registry
            .lookup(&origin)
            .map_err(|_| AuthError::UnknownServer(origin.to_string()))?;
        if server.auth_type() != AuthType::OAuthImplicit {
            return Err(AuthError::UnsupportedAuthType(server.auth_type()));
        }

        let _attempt = InFlight::acquire(&self.in_flight, &origin)?;

        let state = generate_state();
        let authorize_url = build_authorize_url(&server, &state)?;

        tracing::info!(origin = %origin, "Starting interactive authorization");

        let redirect = match self
            .authorizer
            .authorize(&authorize_url, server.redirect_uri())
            .await
        {
            AuthorizationOutcome::Redirected(url) => url,
            AuthorizationOutcome::Dismissed => {
                tracing::info!(origin = %origin, "Authorization dismissed by user");
                return Err(AuthError::UserCancelled);
            }
        };

        let response = parse_redirect(&redirect, server.redirect_uri())?;

        if response.state.as_deref() != Some(state.as_str()) {
            tracing::warn!(origin = %origin, "Redirect state does not match, discarding token");
            return Err(AuthError::StateMismatch);
        }

        let issued_at = Utc::now();
        let expires_at = match response.expires_in {
            Some(lifetime) => Some(issued_at.checked_add_signed(lifetime).ok_or_else(|| {
                AuthError::MalformedRedirect(format!(
                    "invalid expires_in: {}",
                    lifetime.num_seconds()
                ))
            })?),
            None => None,
        };

        tracing::info!(origin = %origin, expires_at = ?expires_at, "Access token issued");

        Ok(
            Credential::new(origin, AccessToken::new(response.access_token), issued_at, expires_at)
                .with_username(response.username),
        )
    }
}

/// Marks an origin as mid-flow until dropped, including when the
/// owning future is dropped before completing.
struct InFlight<'a> {
    in_flight: &'a Mutex<HashSet<Origin>>,
    origin: Origin,
}

impl<'a> InFlight<'a> {
    fn acquire(in_flight: &'a Mutex<HashSet<Origin>>, origin: &Origin) -> Result<Self, AuthError> {
        let inserted = in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(origin.clone());
        if !inserted {
            tracing::debug!(origin = %origin, "Rejecting concurrent sign-in");
            return Err(AuthError::AlreadyInProgress(origin.to_string()));
        }
        Ok(Self {
            in_flight,
            origin: origin.clone(),
        })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.origin);
    }
}

fn generate_state() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(STATE_LENGTH)
        .map(char::from)
        .collect()
}

fn build_authorize_url(server: &ServerInfo, state: &str) -> Result<Url, AuthError> {
    let mut url = server.authorize_endpoint()?;
    url.query_pairs_mut()
        .append_pair("client_id", server.oauth_client_id())
        .append_pair("response_type", "token")
        .append_pair("redirect_uri", server.redirect_uri().as_str())
        .append_pair("state", state);
    Ok(url)
}

fn parse_redirect(redirect: &Url, expected: &Url) -> Result<ImplicitGrantResponse, AuthError> {
    if !same_target(redirect, expected) {
        return Err(AuthError::MalformedRedirect(format!(
            "redirect does not target {}",
            expected
        )));
    }

    let fragment: HashMap<String, String> = redirect
        .fragment()
        .map(|f| form_urlencoded::parse(f.as_bytes()).into_owned().collect())
        .unwrap_or_default();

    // Some providers report errors in the query string instead of the fragment
    let query: HashMap<String, String> = redirect.query_pairs().into_owned().collect();
    if let Some(params) = [&fragment, &query].into_iter().find(|p| p.contains_key("error")) {
        return Err(AuthError::AuthDenied {
            error: params["error"].clone(),
            description: params.get("error_description").cloned(),
        });
    }

    let access_token = fragment
        .get("access_token")
        .filter(|t| !t.is_empty())
        .cloned()
        .ok_or_else(|| AuthError::MalformedRedirect("missing access_token".to_string()))?;

    let expires_in = fragment
        .get("expires_in")
        .map(|raw| {
            raw.parse::<i64>()
                .ok()
                .filter(|secs| *secs >= 0)
                .and_then(Duration::try_seconds)
                .ok_or_else(|| AuthError::MalformedRedirect(format!("invalid expires_in: {}", raw)))
        })
        .transpose()?;

    Ok(ImplicitGrantResponse {
        access_token,
        expires_in,
        state: fragment.get("state").cloned(),
        username: fragment.get("username").cloned(),
    })
}

/// Compare two URLs ignoring query and fragment
fn same_target(a: &Url, b: &Url) -> bool {
    let strip = |url: &Url| {
        let mut url = url.clone();
        url.set_query(None);
        url.set_fragment(None);
        url
    };
    strip(a) == strip(b)
}
