//! Test doubles for the interactive authorization capability.

use super::authorizer::{AuthorizationOutcome, Authorizer};
use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Notify;
use url::Url;

pub(crate) const OOB: &str = "urn:ietf:wg:oauth:2.0:oob";

enum Script {
    /// Redirect to the registered URI with these fragment params plus the request's state
    EchoState(String),
    /// Redirect to exactly this URL
    Fixed(String),
    Dismiss,
}

/// Answers every authorization with a canned redirect.
pub(crate) struct CannedAuthorizer {
    script: Script,
    seen: Mutex<Vec<Url>>,
}

impl CannedAuthorizer {
    fn with(script: Script) -> Self {
        Self {
            script,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn echo_state(fragment: &str) -> Self {
        Self::with(Script::EchoState(fragment.to_string()))
    }

    pub(crate) fn fixed(redirect: &str) -> Self {
        Self::with(Script::Fixed(redirect.to_string()))
    }

    pub(crate) fn dismiss() -> Self {
        Self::with(Script::Dismiss)
    }

    pub(crate) fn call_count(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub(crate) fn last_authorize_url(&self) -> Option<Url> {
        self.seen.lock().unwrap().last().cloned()
    }

    pub(crate) fn last_state(&self) -> Option<String> {
        let url = self.last_authorize_url()?;
        url.query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v.into_owned())
    }
}

#[async_trait]
impl Authorizer for CannedAuthorizer {
    async fn authorize(&self, authorize_url: &Url, redirect_uri: &Url) -> AuthorizationOutcome {
        self.seen.lock().unwrap().push(authorize_url.clone());

        match &self.script {
            Script::EchoState(fragment) => {
                let state = self.last_state().unwrap_or_default();
                let mut redirect = redirect_uri.clone();
                redirect.set_fragment(Some(&format!("{}&state={}", fragment, state)));
                AuthorizationOutcome::Redirected(redirect)
            }
            Script::Fixed(url) => AuthorizationOutcome::Redirected(Url::parse(url).unwrap()),
            Script::Dismiss => AuthorizationOutcome::Dismissed,
        }
    }
}

/// Holds the prompt open until `release` is notified, then dismisses it.
#[derive(Default)]
pub(crate) struct BlockingAuthorizer {
    pub(crate) entered: Notify,
    pub(crate) release: Notify,
    calls: AtomicUsize,
}

impl BlockingAuthorizer {
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Authorizer for BlockingAuthorizer {
    async fn authorize(&self, _authorize_url: &Url, _redirect_uri: &Url) -> AuthorizationOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.entered.notify_one();
        self.release.notified().await;
        AuthorizationOutcome::Dismissed
    }
}
