//! Terminal stand-in for the login web view.
//!
//! The authorization page is opened in the user's browser; once they have
//! signed in, they paste the final redirect URL back into the terminal.

use async_trait::async_trait;
use portal_auth_core::auth::{open_in_browser, AuthorizationOutcome, Authorizer};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::sync::Mutex;
use url::Url;

type LineSource = Lines<Box<dyn AsyncBufRead + Unpin + Send>>;

/// Line reader shared by the command loop and the authorizer.
///
/// Prompts go to stderr so stdout stays clean for `--format json`.
pub struct Console {
    lines: Mutex<LineSource>,
}

impl Console {
    pub fn stdin() -> Self {
        Self::from_reader(BufReader::new(tokio::io::stdin()))
    }

    pub fn from_reader(reader: impl AsyncBufRead + Unpin + Send + 'static) -> Self {
        let reader: Box<dyn AsyncBufRead + Unpin + Send> = Box::new(reader);
        Self {
            lines: Mutex::new(reader.lines()),
        }
    }

    /// Show `prompt` and read one line. `None` on EOF or read failure.
    pub async fn prompt(&self, prompt: &str) -> Option<String> {
        eprint!("{}", prompt);
        match self.lines.lock().await.next_line().await {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!("Failed to read from terminal: {}", e);
                None
            }
        }
    }
}

pub struct TerminalAuthorizer {
    console: Arc<Console>,
    timeout: Option<Duration>,
    open_browser: bool,
}

impl TerminalAuthorizer {
    pub fn new(console: Arc<Console>, timeout: Option<Duration>, open_browser: bool) -> Self {
        Self {
            console,
            timeout,
            open_browser,
        }
    }

    async fn read_redirect(&self) -> AuthorizationOutcome {
        loop {
            let Some(line) = self.console.prompt("Redirect URL (empty to cancel): ").await else {
                return AuthorizationOutcome::Dismissed;
            };
            let line = line.trim();
            if line.is_empty() {
                return AuthorizationOutcome::Dismissed;
            }
            match Url::parse(line) {
                Ok(url) => return AuthorizationOutcome::Redirected(url),
                Err(e) => eprintln!("That is not a valid URL ({}). Try again.", e),
            }
        }
    }
}

#[async_trait]
impl Authorizer for TerminalAuthorizer {
    async fn authorize(&self, authorize_url: &Url, redirect_uri: &Url) -> AuthorizationOutcome {
        eprintln!();
        eprintln!("Sign in to the portal at:\n\n{}\n", authorize_url);
        if self.open_browser && open_in_browser(authorize_url) {
            eprintln!("(opened in your browser)");
        }
        eprintln!(
            "When you are done, paste the address you were redirected to ({}#...).",
            redirect_uri
        );

        match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, self.read_redirect()).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    tracing::info!("Interactive sign-in timed out after {:?}", limit);
                    eprintln!();
                    AuthorizationOutcome::Dismissed
                }
            },
            None => self.read_redirect().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OOB: &str = "urn:ietf:wg:oauth:2.0:oob";

    fn authorizer(input: &'static [u8], timeout: Option<Duration>) -> TerminalAuthorizer {
        TerminalAuthorizer::new(Arc::new(Console::from_reader(input)), timeout, false)
    }

    fn urls() -> (Url, Url) {
        (
            Url::parse("https://portal.example/oauth2/authorize?client_id=abc").unwrap(),
            Url::parse(OOB).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_pasted_redirect() {
        let (authorize, redirect) = urls();
        let outcome = authorizer(b"urn:ietf:wg:oauth:2.0:oob#access_token=tok&state=S\n", None)
            .authorize(&authorize, &redirect)
            .await;

        match outcome {
            AuthorizationOutcome::Redirected(url) => {
                assert_eq!(url.fragment(), Some("access_token=tok&state=S"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invalid_line_is_retried() {
        let (authorize, redirect) = urls();
        let outcome = authorizer(b"not a url\n  https://portal.example/cb#x=1  \n", None)
            .authorize(&authorize, &redirect)
            .await;
        assert!(matches!(outcome, AuthorizationOutcome::Redirected(_)));
    }

    #[tokio::test]
    async fn test_empty_line_dismisses() {
        let (authorize, redirect) = urls();
        let outcome = authorizer(b"\n", None).authorize(&authorize, &redirect).await;
        assert_eq!(outcome, AuthorizationOutcome::Dismissed);
    }

    #[tokio::test]
    async fn test_eof_dismisses() {
        let (authorize, redirect) = urls();
        let outcome = authorizer(b"", None).authorize(&authorize, &redirect).await;
        assert_eq!(outcome, AuthorizationOutcome::Dismissed);
    }

    #[tokio::test]
    async fn test_timeout_dismisses() {
        let (authorize, redirect) = urls();
        // Keep the writer alive so the read never completes
        let (_writer, reader) = tokio::io::duplex(64);
        let authorizer = TerminalAuthorizer::new(
            Arc::new(Console::from_reader(BufReader::new(reader))),
            Some(Duration::from_millis(20)),
            false,
        );

        let outcome = authorizer.authorize(&authorize, &redirect).await;
        assert_eq!(outcome, AuthorizationOutcome::Dismissed);
    }
}
