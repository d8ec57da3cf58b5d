//! Registry of known servers and the OAuth parameters used to sign in to them.
//!
//! Servers are keyed by their normalized origin (scheme, host and port). A
//! lookup only succeeds for an exact origin match; there is no wildcard or
//! path-prefix matching.

use super::error::AuthError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{PoisonError, RwLock};
use url::Url;

/// Authorize endpoint, relative to the server URL
const AUTHORIZE_PATH: &str = "oauth2/authorize";

/// Token scheme a server expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuthType {
    OAuthImplicit,
    OAuthAuthorizationCode,
    Token,
}

impl fmt::Display for AuthType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthType::OAuthImplicit => write!(f, "OAuth implicit grant"),
            AuthType::OAuthAuthorizationCode => write!(f, "OAuth authorization code"),
            AuthType::Token => write!(f, "token"),
        }
    }
}

/// Scheme + host + port of a service.
///
/// Stored as the ASCII serialization of the URL origin, so the scheme and
/// host are lowercase and a default port is omitted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Origin(String);

impl Origin {
    pub fn from_url(url: &Url) -> Result<Self, AuthError> {
        let origin = url.origin();
        if !origin.is_tuple() {
            return Err(AuthError::InvalidUri(format!("{} has no origin", url)));
        }
        Ok(Self(origin.ascii_serialization()))
    }

    pub fn parse(uri: &str) -> Result<Self, AuthError> {
        Self::from_url(&parse_uri(uri)?)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Origin {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parse a URI, mapping failures into the auth error taxonomy
pub(crate) fn parse_uri(uri: &str) -> Result<Url, AuthError> {
    Url::parse(uri.trim()).map_err(|e| AuthError::InvalidUri(format!("{}: {}", uri, e)))
}

/// Authentication metadata for one server. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    server_uri: Url,
    origin: Origin,
    auth_type: AuthType,
    oauth_client_id: String,
    redirect_uri: Url,
}

impl ServerInfo {
    pub fn new(
        server_uri: &str,
        auth_type: AuthType,
        oauth_client_id: impl Into<String>,
        redirect_uri: &str,
    ) -> Result<Self, AuthError> {
        let server_uri = parse_uri(server_uri)?;
        let origin = Origin::from_url(&server_uri)?;
        let redirect_uri = parse_uri(redirect_uri)?;

        Ok(Self {
            server_uri,
            origin,
            auth_type,
            oauth_client_id: oauth_client_id.into(),
            redirect_uri,
        })
    }

    /// Server info for the implicit-grant flow, the only flow the broker drives.
    pub fn oauth_implicit(
        server_uri: &str,
        oauth_client_id: impl Into<String>,
        redirect_uri: &str,
    ) -> Result<Self, AuthError> {
        Self::new(server_uri, AuthType::OAuthImplicit, oauth_client_id, redirect_uri)
    }

    pub fn server_uri(&self) -> &Url {
        &self.server_uri
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    pub fn auth_type(&self) -> AuthType {
        self.auth_type
    }

    pub fn oauth_client_id(&self) -> &str {
        &self.oauth_client_id
    }

    pub fn redirect_uri(&self) -> &Url {
        &self.redirect_uri
    }

    /// Resolve a path below the server URL (e.g. `oauth2/authorize`).
    pub fn endpoint(&self, path: &str) -> Result<Url, AuthError> {
        let mut base = self.server_uri.clone();
        base.set_query(None);
        base.set_fragment(None);
        if !base.path().ends_with('/') {
            let with_slash = format!("{}/", base.path());
            base.set_path(&with_slash);
        }
        base.join(path)
            .map_err(|e| AuthError::InvalidUri(format!("{}{}: {}", base, path, e)))
    }

    pub fn authorize_endpoint(&self) -> Result<Url, AuthError> {
        self.endpoint(AUTHORIZE_PATH)
    }
}

/// Origin-keyed table of [`ServerInfo`].
#[derive(Debug, Default)]
pub struct ServerRegistry {
    servers: RwLock<HashMap<Origin, ServerInfo>>,
}

impl ServerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store or overwrite the entry for `info`'s origin.
    ///
    /// Returns the entry that was replaced, if any.
    pub fn register(&self, info: ServerInfo) -> Option<ServerInfo> {
        let origin = info.origin().clone();
        let previous = self
            .servers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(origin.clone(), info);

        if previous.is_some() {
            tracing::debug!(origin = %origin, "Replaced server registration");
        } else {
            tracing::debug!(origin = %origin, "Registered server");
        }
        previous
    }

    pub fn lookup(&self, origin: &Origin) -> Result<ServerInfo, AuthError> {
        self.servers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(origin)
            .cloned()
            .ok_or_else(|| AuthError::NotRegistered(origin.to_string()))
    }

    /// Look up the server for any URI on its origin.
    pub fn lookup_uri(&self, uri: &str) -> Result<ServerInfo, AuthError> {
        self.lookup(&Origin::parse(uri)?)
    }

    pub fn len(&self) -> usize {
        self.servers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OOB: &str = "urn:ietf:wg:oauth:2.0:oob";

    #[test]
    fn test_origin_normalization() {
        let a = Origin::parse("https://Portal.Example:443/sharing/rest?f=json").unwrap();
        let b = Origin::parse("HTTPS://portal.example").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "https://portal.example");

        // Non-default port is part of the origin
        let c = Origin::parse("https://portal.example:8443/").unwrap();
        assert_ne!(a, c);
        assert_eq!(c.as_str(), "https://portal.example:8443");

        // Scheme is part of the origin
        let d = Origin::parse("http://portal.example").unwrap();
        assert_ne!(a, d);
    }

    #[test]
    fn test_origin_rejects_opaque_and_garbage() {
        assert!(matches!(Origin::parse(OOB), Err(AuthError::InvalidUri(_))));
        assert!(matches!(Origin::parse("not a url"), Err(AuthError::InvalidUri(_))));
        assert!(matches!("".parse::<Origin>(), Err(AuthError::InvalidUri(_))));
    }

    #[test]
    fn test_authorize_endpoint() {
        let info =
            ServerInfo::oauth_implicit("https://www.arcgis.com/sharing/rest", "abc", OOB).unwrap();
        assert_eq!(
            info.authorize_endpoint().unwrap().as_str(),
            "https://www.arcgis.com/sharing/rest/oauth2/authorize"
        );

        // Trailing slash and bare origins resolve the same way
        let info = ServerInfo::oauth_implicit("https://portal.example/", "abc", OOB).unwrap();
        assert_eq!(
            info.authorize_endpoint().unwrap().as_str(),
            "https://portal.example/oauth2/authorize"
        );
    }

    #[test]
    fn test_server_info_rejects_bad_redirect() {
        let result = ServerInfo::oauth_implicit("https://portal.example", "abc", "::nope");
        assert!(matches!(result, Err(AuthError::InvalidUri(_))));
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = ServerRegistry::new();
        assert!(registry.is_empty());

        let info = ServerInfo::oauth_implicit("https://portal.example/sharing/rest", "abc", OOB)
            .unwrap();
        assert!(registry.register(info.clone()).is_none());

        let found = registry.lookup_uri("https://portal.example/other/path").unwrap();
        assert_eq!(found, info);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_overwrites_same_origin() {
        let registry = ServerRegistry::new();
        registry.register(ServerInfo::oauth_implicit("https://portal.example", "first", OOB).unwrap());
        let replaced = registry
            .register(ServerInfo::oauth_implicit("https://portal.example/rest", "second", OOB).unwrap());

        assert_eq!(replaced.unwrap().oauth_client_id(), "first");
        let found = registry.lookup_uri("https://portal.example").unwrap();
        assert_eq!(found.oauth_client_id(), "second");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_lookup_not_registered() {
        let registry = ServerRegistry::new();
        registry.register(ServerInfo::oauth_implicit("https://portal.example", "abc", OOB).unwrap());

        assert!(matches!(
            registry.lookup_uri("https://other.example"),
            Err(AuthError::NotRegistered(o)) if o == "https://other.example"
        ));
        // No subdomain or port wildcarding
        assert!(registry.lookup_uri("https://www.portal.example").is_err());
        assert!(registry.lookup_uri("https://portal.example:8443").is_err());
    }
}
