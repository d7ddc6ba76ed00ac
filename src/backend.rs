use std::fmt;

use crate::error::BackendError;
use crate::resource::ProviderCredentials;

/// Concrete values yielded by a session.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct RetrievedCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    /// Region actually in force, which may differ from the requested one.
    pub region: String,
}

impl fmt::Debug for RetrievedCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetrievedCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"** redacted **")
            .field("session_token", &"** redacted **")
            .field("region", &self.region)
            .finish()
    }
}

#[async_trait::async_trait]
pub trait Session: Send + Sync {
    async fn retrieve(&self) -> Result<RetrievedCredentials, BackendError>;
}

/// Resolves secret material and mints sessions from it.
///
/// Base sessions come from either the ambient identity or static secret
/// material. Role assumption is a separate step applied to whichever base
/// session was obtained.
#[async_trait::async_trait]
pub trait CredentialBackend: Send + Sync {
    type Session: Session;

    async fn extract_secret(
        &self,
        credentials: &ProviderCredentials,
    ) -> Result<Vec<u8>, BackendError>;

    async fn session_from_identity(&self, region: &str) -> Result<Self::Session, BackendError>;

    async fn session_from_secret(
        &self,
        data: &[u8],
        region: &str,
    ) -> Result<Self::Session, BackendError>;

    async fn assume_role(
        &self,
        base: Self::Session,
        role_arn: &str,
        region: &str,
    ) -> Result<Self::Session, BackendError>;
}
