use std::path::PathBuf;

use crate::context::Interrupted;
use crate::fieldpath::FieldPathError;

/// Failures of a single provider setup resolution.
///
/// None of these are retried here; the reconciler owning the managed resource
/// decides when to try again.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("no providerConfigRef provided")]
    ConfigurationMissing,

    #[error("cannot get referenced ProviderConfig {name:?}")]
    ConfigurationFetchFailed {
        name: String,
        #[source]
        source: ClientError,
    },

    #[error("cannot get region")]
    RegionResolutionFailed(#[source] FieldPathError),

    #[error("cannot track ProviderConfig usage")]
    UsageTrackingFailed(#[source] ClientError),

    #[error("failed to use injected identity")]
    IdentitySessionFailed(#[source] BackendError),

    #[error("cannot get credentials")]
    SecretExtractionFailed(#[source] BackendError),

    #[error("failed to use provider secret")]
    SecretSessionFailed(#[source] BackendError),

    #[error("failed to retrieve aws credentials from aws config")]
    CredentialRetrievalFailed(#[source] BackendError),
}

/// Errors from reading or writing cluster objects.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("{kind} {name:?} not found")]
    NotFound { kind: &'static str, name: String },

    #[error("{kind} {name:?} exists and is not controlled by {owner:?}")]
    NotControllable {
        kind: &'static str,
        name: String,
        owner: String,
    },

    #[error("invalid {kind} name {name:?}")]
    InvalidName { kind: &'static str, name: String },

    #[error("managed resource has no providerConfigRef")]
    MissingReference,

    #[error("cannot decode {path}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot access {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Interrupted(#[from] Interrupted),
}

impl ClientError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound { .. })
    }
}

/// Errors from the credential backend.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("cannot extract from secret key when none specified")]
    MissingSecretRef,

    #[error("cannot extract from environment variable when none specified")]
    MissingEnvSelector,

    #[error("cannot extract from filesystem when no path specified")]
    MissingFsSelector,

    #[error("credentials source InjectedIdentity has no extractable secret")]
    NotExtractable,

    #[error("secret {namespace}/{name} has no key {key:?}")]
    MissingSecretKey {
        namespace: String,
        name: String,
        key: String,
    },

    #[error("environment variable {0:?} is not set")]
    MissingEnvVar(String),

    #[error("cannot read credentials file {path}")]
    ReadCredentialsFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot decode secret value")]
    Base64(#[from] base64::DecodeError),

    #[error("cannot parse credentials: {0}")]
    InvalidSecret(String),

    #[error("session has no credentials provider")]
    NoCredentialsProvider,

    #[error("cannot resolve credentials")]
    Credentials(#[from] aws_credential_types::provider::error::CredentialsError),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Interrupted(#[from] Interrupted),
}
