//! Portal Auth CLI - sign in to an online mapping portal
//!
//! This binary drives the OAuth implicit-grant sign-in:
//! - Registers the configured portal and its OAuth client
//! - Opens the portal login page and accepts the pasted redirect
//! - Keeps the credential in memory for the rest of the session
//! - Signs out by removing the credential again

mod controller;
mod terminal;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use controller::{Affordances, SessionInfo, SignInController, UserFacingError};
use portal_auth_core::auth::CredentialManager;
use portal_auth_core::portal::{self, PortalClient};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use terminal::{Console, TerminalAuthorizer};

#[derive(Parser)]
#[command(name = "portal-auth")]
#[command(author = "Portal Auth Team")]
#[command(version)]
#[command(about = "Sign in to an online mapping portal with OAuth")]
#[command(long_about = "
Portal Auth signs in to an online mapping portal using the OAuth 2.0
implicit grant. Credentials are kept in memory only; they are gone when
the program exits.

Quick start:
  1. Set your app's client id:  export PORTAL_AUTH_CLIENT_ID=<id>
  2. Start a session:           portal-auth
  3. Type 'sign-in', complete the login in your browser, paste the
     address you were redirected to, and later 'sign-out'.
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Give up on an interactive login after this many seconds
    #[arg(long, global = true, value_name = "SECS")]
    pub login_timeout: Option<u64>,

    /// Don't open the login page in a browser, only print it
    #[arg(long, global = true)]
    pub no_browser: bool,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for scripting
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Interactive session with sign-in and sign-out (default)
    Session,

    /// Sign in once, print the result and exit
    #[command(alias = "login")]
    SignIn,

    /// Show configuration paths and settings
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("portal_auth={},portal_auth_core={}", log_level, log_level).into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let console = Arc::new(Console::stdin());

    match cli.command {
        None | Some(Commands::Session) => cmd_session(&cli, console).await,
        Some(Commands::SignIn) => cmd_sign_in(&cli, console).await,
        Some(Commands::Config) => cmd_config(&cli).await,
    }
}

/// Wire the configured portal, the terminal authorizer and the profile client together
fn build_controller(cli: &Cli, console: Arc<Console>) -> Result<SignInController> {
    let config = portal::load_portal_config();
    if !config.has_client_id() {
        anyhow::bail!(
            "No OAuth client id configured. Set PORTAL_AUTH_CLIENT_ID or client_id in {}",
            portal::config::get_config_file_path_string()
        );
    }

    let authorizer = TerminalAuthorizer::new(
        console,
        cli.login_timeout.map(Duration::from_secs),
        !cli.no_browser,
    );
    let manager = Arc::new(CredentialManager::with_authorizer(Arc::new(authorizer)));
    manager.register_server(
        config
            .server_info()
            .context("Invalid portal configuration")?,
    );

    let profiles = Arc::new(PortalClient::new()?);
    Ok(SignInController::new(manager, profiles, config.portal_url.value))
}

/// Outcome reported alongside a session
#[derive(Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum SessionStatus {
    SignedIn,
    SignedOut,
    Connected,
}

fn print_session(cli: &Cli, status: SessionStatus, session: &SessionInfo) {
    match cli.format {
        OutputFormat::Text => {
            let who = session
                .principal_name
                .as_deref()
                .or(session.username.as_deref())
                .unwrap_or("(unknown user)");
            match status {
                SessionStatus::SignedIn => println!("Signed in to {} as {}", session.origin, who),
                SessionStatus::SignedOut => println!("Signed out from {}", session.origin),
                SessionStatus::Connected => println!("Connected to {} as {}", session.origin, who),
            }
            if status != SessionStatus::SignedOut {
                match session.expires_at {
                    Some(at) => println!("Token expires: {}", at.to_rfc3339()),
                    None => println!("Token expires: never"),
                }
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::json!({
                "status": status,
                "session": session,
            }));
        }
    }
}

fn print_error(cli: &Cli, error: &UserFacingError) {
    match cli.format {
        OutputFormat::Text => eprintln!("{}", error),
        OutputFormat::Json => {
            println!("{}", serde_json::json!({
                "status": "error",
                "message": error.message,
                "kind": error.cause.kind(),
            }));
        }
    }
}

fn session_prompt(affordances: Affordances) -> String {
    let mark = |enabled: bool, name: &str| {
        if enabled {
            name.to_string()
        } else {
            format!("({})", name)
        }
    };
    format!(
        "[{} | {} | status | quit] > ",
        mark(affordances.sign_in_enabled, "sign-in"),
        mark(affordances.sign_out_enabled, "sign-out")
    )
}

async fn cmd_session(cli: &Cli, console: Arc<Console>) -> Result<()> {
    let mut controller = build_controller(cli, Arc::clone(&console))?;

    if let OutputFormat::Text = cli.format {
        println!("Portal: {}", controller.server_uri());
        println!("Type 'sign-in' to start. Unavailable actions are shown in parentheses.");
    }

    loop {
        let Some(line) = console.prompt(&session_prompt(controller.affordances())).await else {
            break;
        };

        match line.trim() {
            "" => continue,
            "sign-in" | "signin" | "login" => {
                if !controller.affordances().sign_in_enabled {
                    eprintln!("Already signed in. Use 'sign-out' first.");
                    continue;
                }
                match controller.sign_in().await {
                    Ok(session) => print_session(cli, SessionStatus::SignedIn, &session),
                    Err(e) => print_error(cli, &e),
                }
            }
            "sign-out" | "signout" | "logout" => {
                if !controller.affordances().sign_out_enabled {
                    eprintln!("Not signed in.");
                    continue;
                }
                match controller.sign_out() {
                    Ok(session) => print_session(cli, SessionStatus::SignedOut, &session),
                    Err(e) => print_error(cli, &e),
                }
            }
            "status" => match controller.status() {
                Some(session) => print_session(cli, SessionStatus::Connected, &session),
                None => match cli.format {
                    OutputFormat::Text => println!("Status: Not signed in"),
                    OutputFormat::Json => {
                        println!("{}", serde_json::json!({ "status": "not_signed_in" }));
                    }
                },
            },
            "quit" | "exit" | "q" => break,
            other => eprintln!("Unknown command '{}'. Try sign-in, sign-out, status or quit.", other),
        }
    }

    tracing::debug!("Session ended");
    Ok(())
}

async fn cmd_sign_in(cli: &Cli, console: Arc<Console>) -> Result<()> {
    let mut controller = build_controller(cli, console)?;

    match controller.sign_in().await {
        Ok(session) => {
            print_session(cli, SessionStatus::SignedIn, &session);
            Ok(())
        }
        Err(e) => {
            print_error(cli, &e);
            Err(e.into())
        }
    }
}

async fn cmd_config(cli: &Cli) -> Result<()> {
    let config = portal::load_portal_config();
    let config_path = portal::config::get_config_file_path_string();

    match cli.format {
        OutputFormat::Text => {
            println!("Configuration");
            println!("=============");
            println!();
            println!("Config file:   {}", config_path);
            println!("Portal URL:    {} (from {})", config.portal_url.value, config.portal_url.source);
            println!(
                "Client id:     {} (from {})",
                if config.has_client_id() { config.client_id.value.as_str() } else { "<not set>" },
                config.client_id.source
            );
            println!("Redirect URI:  {} (from {})", config.redirect_uri.value, config.redirect_uri.source);
            println!();
            println!("Environment variables:");
            println!("  PORTAL_AUTH_URL          - Override portal URL");
            println!("  PORTAL_AUTH_CLIENT_ID    - OAuth client id");
            println!("  PORTAL_AUTH_REDIRECT_URI - Override redirect URI");
            println!();
            println!("Example config.toml:");
            println!();
            println!("{}", portal::config::generate_example_config());
        }
        OutputFormat::Json => {
            println!("{}", serde_json::json!({
                "config_file": config_path,
                "portal_url": config.portal_url.value,
                "portal_url_source": config.portal_url.source.to_string(),
                "client_id": config.client_id.value,
                "client_id_source": config.client_id.source.to_string(),
                "redirect_uri": config.redirect_uri.value,
                "redirect_uri_source": config.redirect_uri.source.to_string(),
            }));
        }
    }

    Ok(())
}
