//! Terraform provider setup for a single managed resource.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::backend::{CredentialBackend, RetrievedCredentials, Session};
use crate::context::RequestContext;
use crate::error::{BackendError, ClientError, SetupError};
use crate::fieldpath::Paved;
use crate::resource::{CredentialsSourceKind, Managed, ResourceClient};
use crate::usage::UsageTracker;

// Keys of the AWS provider block in the Terraform configuration map.

/// Effective region; omitted when no region could be resolved.
pub const KEY_REGION: &str = "region";
/// Set to `true` in place of `region` so the provider accepts an empty region.
pub const KEY_SKIP_REGION_VALIDATION: &str = "skip_region_validation";
pub const KEY_ACCESS_KEY_ID: &str = "access_key";
pub const KEY_SECRET_ACCESS_KEY: &str = "secret_key";
/// Session token, present even when empty.
pub const KEY_SESSION_TOKEN: &str = "token";

/// Where a managed resource declares its region. Kinds without this field
/// are regionless.
pub const REGION_FIELD_PATH: &str = "spec.forProvider.region";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderRequirement {
    pub source: String,
    pub version: String,
}

/// Everything the Terraform workspace needs to configure the AWS provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Setup {
    pub version: String,
    pub requirement: ProviderRequirement,
    #[serde(default)]
    pub configuration: BTreeMap<String, Value>,
}

impl Setup {
    pub fn new(
        version: impl Into<String>,
        provider_source: impl Into<String>,
        provider_version: impl Into<String>,
    ) -> Self {
        Self {
            version: version.into(),
            requirement: ProviderRequirement {
                source: provider_source.into(),
                version: provider_version.into(),
            },
            configuration: BTreeMap::new(),
        }
    }
}

/// Reads the region a managed resource declares. Kinds without a region
/// field, such as IAM resources, resolve to an empty string.
pub fn region_of(managed: &dyn Managed) -> Result<String, SetupError> {
    let tree = managed
        .field_tree()
        .map_err(SetupError::RegionResolutionFailed)?;
    match Paved::new(&tree).get_string(REGION_FIELD_PATH) {
        Ok(region) => Ok(region.to_string()),
        Err(e) if e.is_not_found() => Ok(String::new()),
        Err(e) => Err(SetupError::RegionResolutionFailed(e)),
    }
}

/// Builds the provider configuration map from retrieved credentials.
pub fn configuration_for(credentials: &RetrievedCredentials) -> BTreeMap<String, Value> {
    let mut configuration = BTreeMap::new();
    if credentials.region.is_empty() {
        // Terraform validates the region even for resources that have none
        // and rejects both an empty and a missing value.
        configuration.insert(KEY_SKIP_REGION_VALIDATION.to_string(), Value::Bool(true));
    } else {
        configuration.insert(KEY_REGION.to_string(), Value::from(credentials.region.as_str()));
    }
    configuration.insert(
        KEY_ACCESS_KEY_ID.to_string(),
        Value::from(credentials.access_key_id.as_str()),
    );
    configuration.insert(
        KEY_SECRET_ACCESS_KEY.to_string(),
        Value::from(credentials.secret_access_key.as_str()),
    );
    configuration.insert(
        KEY_SESSION_TOKEN.to_string(),
        Value::from(credentials.session_token.as_str()),
    );
    configuration
}

/// Resolves provider setup for managed resources.
///
/// Holds no per-resource state, so one resolver can serve concurrent
/// reconciliations.
pub struct SetupResolver<B, T> {
    base: Setup,
    backend: B,
    tracker: T,
}

impl<B, T> SetupResolver<B, T>
where
    B: CredentialBackend,
    T: UsageTracker,
{
    pub fn new(base: Setup, backend: B, tracker: T) -> Self {
        Self { base, backend, tracker }
    }

    /// The version and requirement fields every resolution starts from. This
    /// is the partial setup to report alongside a failed resolution.
    pub fn base(&self) -> &Setup {
        &self.base
    }

    /// Resolves credentials and region for `managed` into a provider setup.
    #[instrument(skip_all, fields(resource = %managed.identity().name))]
    pub async fn resolve<C>(
        &self,
        ctx: &RequestContext,
        client: &C,
        managed: &dyn Managed,
    ) -> Result<Setup, SetupError>
    where
        C: ResourceClient + ?Sized,
    {
        let reference = managed
            .provider_config_reference()
            .ok_or(SetupError::ConfigurationMissing)?;

        let config = ctx
            .guard(client.get_provider_config(&reference.name))
            .await
            .map_err(|source| SetupError::ConfigurationFetchFailed {
                name: reference.name.clone(),
                source,
            })?;

        let region = region_of(managed)?;
        debug!(provider_config = %reference.name, region, "resolved provider config");

        ctx.guard::<_, ClientError, _>(self.tracker.track(managed))
            .await
            .map_err(SetupError::UsageTrackingFailed)?;

        let role_arn = config.spec.assume_role_arn.as_deref();
        let session = match config.spec.credentials.source {
            CredentialsSourceKind::InjectedIdentity => {
                let base = ctx
                    .guard::<_, BackendError, _>(self.backend.session_from_identity(&region))
                    .await
                    .map_err(SetupError::IdentitySessionFailed)?;
                self.elevate(ctx, base, role_arn, &region)
                    .await
                    .map_err(SetupError::IdentitySessionFailed)?
            }
            CredentialsSourceKind::None
            | CredentialsSourceKind::Secret
            | CredentialsSourceKind::Environment
            | CredentialsSourceKind::Filesystem => {
                let data = ctx
                    .guard::<_, BackendError, _>(
                        self.backend.extract_secret(&config.spec.credentials),
                    )
                    .await
                    .map_err(SetupError::SecretExtractionFailed)?;
                let base = ctx
                    .guard::<_, BackendError, _>(self.backend.session_from_secret(&data, &region))
                    .await
                    .map_err(SetupError::SecretSessionFailed)?;
                self.elevate(ctx, base, role_arn, &region)
                    .await
                    .map_err(SetupError::SecretSessionFailed)?
            }
        };

        let credentials = ctx
            .guard::<_, BackendError, _>(session.retrieve())
            .await
            .map_err(SetupError::CredentialRetrievalFailed)?;

        let mut setup = self.base.clone();
        setup.configuration = configuration_for(&credentials);
        debug!(
            effective_region = %credentials.region,
            source = ?config.spec.credentials.source,
            assumed_role = role_arn.is_some(),
            "resolved provider setup"
        );
        Ok(setup)
    }

    /// Assumes `role_arn` on top of `base` when one is configured.
    async fn elevate(
        &self,
        ctx: &RequestContext,
        base: B::Session,
        role_arn: Option<&str>,
        region: &str,
    ) -> Result<B::Session, BackendError> {
        match role_arn {
            Some(role_arn) => ctx.guard(self.backend.assume_role(base, role_arn, region)).await,
            None => Ok(base),
        }
    }
}
