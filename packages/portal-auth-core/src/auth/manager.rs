//! Composition root for server registration, challenge resolution and
//! credential storage.
//!
//! Construct one [`CredentialManager`] per application and pass it by
//! reference; there is no process-wide instance.

use super::authorizer::Authorizer;
use super::credentials::{Credential, CredentialRequest, CredentialStore};
use super::error::AuthError;
use super::implicit_flow::OAuthBroker;
use super::server::{Origin, ServerInfo, ServerRegistry};
use async_trait::async_trait;
use std::sync::Arc;

/// Produces a credential when a request cannot be satisfied from the store.
#[async_trait]
pub trait ChallengeHandler: Send + Sync {
    async fn create_credential(&self, request: &CredentialRequest) -> Result<Credential, AuthError>;
}

#[async_trait]
impl ChallengeHandler for OAuthBroker {
    async fn create_credential(&self, request: &CredentialRequest) -> Result<Credential, AuthError> {
        self.request_credential(request).await
    }
}

pub struct CredentialManager {
    registry: Arc<ServerRegistry>,
    store: Arc<CredentialStore>,
    challenge_handler: Arc<dyn ChallengeHandler>,
}

impl CredentialManager {
    pub fn new(
        registry: Arc<ServerRegistry>,
        store: Arc<CredentialStore>,
        challenge_handler: Arc<dyn ChallengeHandler>,
    ) -> Self {
        Self {
            registry,
            store,
            challenge_handler,
        }
    }

    /// Manager whose challenges run the implicit-grant flow through `authorizer`.
    pub fn with_authorizer(authorizer: Arc<dyn Authorizer>) -> Self {
        let registry = Arc::new(ServerRegistry::new());
        let broker = OAuthBroker::new(Arc::clone(&registry), authorizer);
        Self::new(registry, Arc::new(CredentialStore::new()), Arc::new(broker))
    }

    pub fn register_server(&self, info: ServerInfo) {
        tracing::info!(
            origin = %info.origin(),
            auth_type = %info.auth_type(),
            "Registering server"
        );
        self.registry.register(info);
    }

    pub fn server_info(&self, uri: &str) -> Result<ServerInfo, AuthError> {
        self.registry.lookup_uri(uri)
    }

    /// Challenge for a new credential. The result is not stored.
    pub async fn get_credential(&self, request: &CredentialRequest) -> Result<Credential, AuthError> {
        self.challenge_handler.create_credential(request).await
    }

    pub fn add_credential(&self, credential: Credential) -> Arc<Credential> {
        self.store.add(credential)
    }

    pub fn find_credential(&self, uri: &str) -> Result<Arc<Credential>, AuthError> {
        self.store.find(&Origin::parse(uri)?)
    }

    pub fn remove_credential(&self, credential: &Credential) -> Result<Arc<Credential>, AuthError> {
        self.store.remove(credential.origin())
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::testing::{CannedAuthorizer, OOB};

    fn manager(authorizer: CannedAuthorizer) -> CredentialManager {
        let manager = CredentialManager::with_authorizer(Arc::new(authorizer));
        manager.register_server(
            ServerInfo::oauth_implicit("https://portal.example/sharing/rest", "abc", OOB).unwrap(),
        );
        manager
    }

    #[tokio::test]
    async fn test_sign_in_then_sign_out() {
        let manager = manager(CannedAuthorizer::echo_state("access_token=tok123&expires_in=3600"));
        let request = CredentialRequest::oauth_implicit("https://portal.example/sharing/rest").unwrap();

        let credential = manager.get_credential(&request).await.unwrap();
        // Challenge alone does not store anything
        assert!(manager.find_credential("https://portal.example").is_err());

        let stored = manager.add_credential(credential);
        let found = manager.find_credential("https://portal.example/sharing/rest").unwrap();
        assert!(Arc::ptr_eq(&stored, &found));
        assert_eq!(found.origin().as_str(), request.origin().unwrap().as_str());

        manager.remove_credential(&found).unwrap();
        assert!(matches!(
            manager.find_credential("https://portal.example"),
            Err(AuthError::NotFound(_))
        ));
        assert!(matches!(manager.remove_credential(&found), Err(AuthError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_failed_challenge_stores_nothing() {
        let manager = manager(CannedAuthorizer::echo_state("error=access_denied"));
        let request = CredentialRequest::oauth_implicit("https://portal.example").unwrap();

        assert!(matches!(
            manager.get_credential(&request).await,
            Err(AuthError::AuthDenied { .. })
        ));
        assert!(manager.store().is_empty());
    }

    #[tokio::test]
    async fn test_custom_challenge_handler() {
        struct Fixed;

        #[async_trait]
        impl ChallengeHandler for Fixed {
            async fn create_credential(&self, request: &CredentialRequest) -> Result<Credential, AuthError> {
                Ok(Credential::new(
                    request.origin()?,
                    crate::auth::AccessToken::new("fixed"),
                    chrono::Utc::now(),
                    None,
                ))
            }
        }

        let manager = CredentialManager::new(
            Arc::new(ServerRegistry::new()),
            Arc::new(CredentialStore::new()),
            Arc::new(Fixed),
        );
        let request = CredentialRequest::oauth_implicit("https://any.example").unwrap();
        let credential = manager.get_credential(&request).await.unwrap();
        assert_eq!(credential.access_token().secret(), "fixed");
    }

    #[test]
    fn test_server_info_lookup() {
        let manager = manager(CannedAuthorizer::dismiss());
        let info = manager.server_info("https://portal.example/anything").unwrap();
        assert_eq!(info.oauth_client_id(), "abc");
        assert!(matches!(
            manager.server_info("https://nope.example"),
            Err(AuthError::NotRegistered(_))
        ));
    }
}
