use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::error::ClientError;
use crate::resource::{
    Managed, ObjectMeta, ProviderConfigUsage, Reference, ResourceClient,
    LABEL_KEY_PROVIDER_CONFIG,
};

/// Records that a managed resource uses its provider config, so the config
/// is not deleted while still in use.
#[async_trait::async_trait]
pub trait UsageTracker: Send + Sync {
    async fn track(&self, managed: &dyn Managed) -> Result<(), ClientError>;
}

/// Tracks usage by writing a [`ProviderConfigUsage`] named after the managed
/// resource's UID.
pub struct ProviderConfigUsageTracker<C> {
    client: Arc<C>,
}

impl<C> ProviderConfigUsageTracker<C> {
    pub fn new(client: Arc<C>) -> Self {
        Self { client }
    }
}

fn usage_for(managed: &dyn Managed, config: &Reference) -> ProviderConfigUsage {
    let mut labels = BTreeMap::new();
    labels.insert(LABEL_KEY_PROVIDER_CONFIG.to_string(), config.name.clone());

    ProviderConfigUsage {
        metadata: ObjectMeta {
            name: managed.uid().to_string(),
            namespace: None,
            uid: String::new(),
            labels,
        },
        owner_uid: managed.uid().to_string(),
        provider_config_ref: config.clone(),
        resource_ref: managed.identity(),
    }
}

#[async_trait::async_trait]
impl<C: ResourceClient> UsageTracker for ProviderConfigUsageTracker<C> {
    async fn track(&self, managed: &dyn Managed) -> Result<(), ClientError> {
        let config = managed
            .provider_config_reference()
            .ok_or(ClientError::MissingReference)?;
        let desired = usage_for(managed, config);

        if let Some(current) = self.client.get_usage(&desired.metadata.name).await? {
            if current.owner_uid != desired.owner_uid {
                return Err(ClientError::NotControllable {
                    kind: "ProviderConfigUsage",
                    name: desired.metadata.name,
                    owner: managed.uid().to_string(),
                });
            }
            if current.provider_config_ref == desired.provider_config_ref {
                debug!(usage = %desired.metadata.name, "usage already recorded");
                return Ok(());
            }
        }

        self.client.put_usage(&desired).await?;
        debug!(
            usage = %desired.metadata.name,
            provider_config = %config.name,
            "recorded provider config usage"
        );
        Ok(())
    }
}
