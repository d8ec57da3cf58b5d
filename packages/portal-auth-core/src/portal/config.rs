use crate::auth::{AuthError, ServerInfo};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Default portal sharing API (ArcGIS Online)
const DEFAULT_PORTAL_URL: &str = "https://www.arcgis.com/sharing/rest";

/// Out-of-band redirect: the token page is shown to the user instead of
/// redirecting to a local listener
const DEFAULT_REDIRECT_URI: &str = "urn:ietf:wg:oauth:2.0:oob";

/// Environment variable names for overrides
const ENV_PORTAL_URL: &str = "PORTAL_AUTH_URL";
const ENV_CLIENT_ID: &str = "PORTAL_AUTH_CLIENT_ID";
const ENV_REDIRECT_URI: &str = "PORTAL_AUTH_REDIRECT_URI";

/// Configuration file structure
#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    portal: Option<PortalSection>,
}

#[derive(Debug, Deserialize, Default)]
struct PortalSection {
    /// Portal sharing API URL (e.g., "https://your-portal.example.com/portal/sharing/rest")
    url: Option<String>,
    /// OAuth client id of the registered application
    client_id: Option<String>,
    /// Redirect URI registered for the application
    redirect_uri: Option<String>,
}

/// Where a configuration value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    /// Using default hardcoded values
    Default,
    /// Loaded from environment variable
    Environment,
    /// Loaded from config file
    ConfigFile,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::Environment => write!(f, "environment variable"),
            ConfigSource::ConfigFile => write!(f, "config file"),
        }
    }
}

/// A resolved value and its origin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Setting {
    pub value: String,
    pub source: ConfigSource,
}

/// Runtime portal configuration
#[derive(Debug, Clone)]
pub struct PortalConfig {
    pub portal_url: Setting,
    pub client_id: Setting,
    pub redirect_uri: Setting,
}

impl PortalConfig {
    pub fn has_client_id(&self) -> bool {
        !self.client_id.value.is_empty()
    }

    /// Server registration for the configured portal
    pub fn server_info(&self) -> Result<ServerInfo, AuthError> {
        ServerInfo::oauth_implicit(
            &self.portal_url.value,
            self.client_id.value.clone(),
            &self.redirect_uri.value,
        )
    }
}

/// Get the path to the configuration file
fn get_config_file_path() -> Option<PathBuf> {
    dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
        .map(|p| p.join("portal-auth").join("config.toml"))
}

/// Load configuration from the config file
fn load_config_file(path: &Path) -> Option<ConfigFile> {
    if !path.exists() {
        return None;
    }

    match fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::debug!("Loaded config from {:?}", path);
                Some(config)
            }
            Err(e) => {
                tracing::warn!("Failed to parse config file {:?}: {}", path, e);
                None
            }
        },
        Err(e) => {
            tracing::warn!("Failed to read config file {:?}: {}", path, e);
            None
        }
    }
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn resolve(env_value: Option<String>, file_value: Option<String>, default: &str) -> Setting {
    if let Some(value) = clean(env_value) {
        return Setting {
            value,
            source: ConfigSource::Environment,
        };
    }
    if let Some(value) = clean(file_value) {
        return Setting {
            value,
            source: ConfigSource::ConfigFile,
        };
    }
    Setting {
        value: default.to_string(),
        source: ConfigSource::Default,
    }
}

/// Load portal configuration with priority, per value:
/// 1. Environment variables (PORTAL_AUTH_URL, PORTAL_AUTH_CLIENT_ID, PORTAL_AUTH_REDIRECT_URI)
/// 2. Config file (~/.config/portal-auth/config.toml)
/// 3. Default values
pub fn load_portal_config() -> PortalConfig {
    load_portal_config_from(get_config_file_path().as_deref(), |key| {
        std::env::var(key).ok()
    })
}

/// Same as [`load_portal_config`] with an explicit file and environment lookup.
pub fn load_portal_config_from<F>(path: Option<&Path>, env: F) -> PortalConfig
where
    F: Fn(&str) -> Option<String>,
{
    let section = path
        .and_then(load_config_file)
        .and_then(|c| c.portal)
        .unwrap_or_default();

    let mut portal_url = resolve(env(ENV_PORTAL_URL), section.url, DEFAULT_PORTAL_URL);
    portal_url.value = portal_url.value.trim_end_matches('/').to_string();

    let config = PortalConfig {
        portal_url,
        client_id: resolve(env(ENV_CLIENT_ID), section.client_id, ""),
        redirect_uri: resolve(
            env(ENV_REDIRECT_URI),
            section.redirect_uri,
            DEFAULT_REDIRECT_URI,
        ),
    };

    tracing::debug!(
        "Using portal URL {} (from {})",
        config.portal_url.value,
        config.portal_url.source
    );
    config
}

/// Get the path to the config file for documentation purposes
pub fn get_config_file_path_string() -> String {
    get_config_file_path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "~/.config/portal-auth/config.toml".to_string())
}

/// Generate example config file content
pub fn generate_example_config() -> String {
    r#"# Portal Auth Configuration
# Place this file at: ~/.config/portal-auth/config.toml

[portal]
# Portal sharing API URL
# Default: https://www.arcgis.com/sharing/rest
# url = "https://your-portal.example.com/portal/sharing/rest"

# OAuth client id of your registered application (required)
# client_id = "your-client-id"

# Redirect URI registered for the application
# Default: urn:ietf:wg:oauth:2.0:oob
# redirect_uri = "urn:ietf:wg:oauth:2.0:oob"
"#
    .to_string()
}
