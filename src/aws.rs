use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use aws_credential_types::provider::ProvideCredentials;
use aws_credential_types::Credentials;
use aws_types::SdkConfig;
use tracing::debug;

use crate::aws_config::{configure_ambient, configure_assumed_role, configure_static};
use crate::backend::{CredentialBackend, RetrievedCredentials, Session};
use crate::credentials::{self, parse_shared_credentials, DEFAULT_SECTION};
use crate::error::BackendError;
use crate::resource::{ProviderCredentials, ResourceClient};

const PROVIDER_NAME: &str = "ProviderSecret";

/// A loaded AWS SDK config.
#[derive(Debug, Clone)]
pub struct AwsSession {
    config: SdkConfig,
}

impl AwsSession {
    pub fn new(config: SdkConfig) -> Self {
        Self { config }
    }
}

#[async_trait::async_trait]
impl Session for AwsSession {
    async fn retrieve(&self) -> Result<RetrievedCredentials, BackendError> {
        let provider = self
            .config
            .credentials_provider()
            .ok_or(BackendError::NoCredentialsProvider)?;
        let credentials = provider.provide_credentials().await?;

        Ok(RetrievedCredentials {
            access_key_id: credentials.access_key_id().to_string(),
            secret_access_key: credentials.secret_access_key().to_string(),
            session_token: credentials.session_token().unwrap_or_default().to_string(),
            region: self
                .config
                .region()
                .map(|region| region.to_string())
                .unwrap_or_default(),
        })
    }
}

/// Credential backend built on the AWS SDK.
pub struct AwsCredentialBackend<C> {
    client: Arc<C>,
    session_name: Option<String>,
}

impl<C> AwsCredentialBackend<C> {
    pub fn new(client: Arc<C>) -> Self {
        Self {
            client,
            session_name: None,
        }
    }

    /// Session name used for AssumeRole calls.
    pub fn with_session_name(mut self, session_name: impl Into<String>) -> Self {
        self.session_name = Some(session_name.into());
        self
    }

    fn session_name(&self) -> String {
        self.session_name.clone().unwrap_or_else(|| {
            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|elapsed| elapsed.as_secs())
                .unwrap_or_default();
            format!("jetaws-{now}")
        })
    }
}

#[async_trait::async_trait]
impl<C: ResourceClient> CredentialBackend for AwsCredentialBackend<C> {
    type Session = AwsSession;

    async fn extract_secret(
        &self,
        credentials: &ProviderCredentials,
    ) -> Result<Vec<u8>, BackendError> {
        credentials::extract(self.client.as_ref(), credentials).await
    }

    async fn session_from_identity(&self, region: &str) -> Result<AwsSession, BackendError> {
        debug!(region, "loading ambient aws config");
        Ok(AwsSession::new(configure_ambient(region).await))
    }

    async fn session_from_secret(
        &self,
        data: &[u8],
        region: &str,
    ) -> Result<AwsSession, BackendError> {
        let keys = parse_shared_credentials(data, DEFAULT_SECTION)?;
        debug!(region, access_key_id = %keys.access_key_id, "loading aws config from provider secret");

        let credentials = Credentials::new(
            keys.access_key_id,
            keys.secret_access_key,
            keys.session_token,
            None,
            PROVIDER_NAME,
        );
        Ok(AwsSession::new(configure_static(credentials, region).await))
    }

    async fn assume_role(
        &self,
        base: AwsSession,
        role_arn: &str,
        region: &str,
    ) -> Result<AwsSession, BackendError> {
        debug!(region, role_arn, "attaching assume role provider");
        let config =
            configure_assumed_role(&base.config, role_arn, region, &self.session_name()).await;
        Ok(AwsSession::new(config))
    }
}
