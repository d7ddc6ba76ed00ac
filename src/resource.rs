//! Cluster objects the resolver reads, and the capabilities used to reach them.

use std::borrow::Cow;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ClientError;
use crate::fieldpath::FieldPathError;

pub const LABEL_KEY_PROVIDER_CONFIG: &str = "crossplane.io/provider-config";

/// A reference to another object by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub name: String,
}

/// A reference to an object of a known type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedReference {
    pub api_version: String,
    pub kind: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uid: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

/// What a managed resource exposes to the resolver.
pub trait Managed: Send + Sync {
    fn provider_config_reference(&self) -> Option<&Reference>;

    /// Unstructured view of the object, used for field-path lookups.
    fn field_tree(&self) -> Result<Cow<'_, Value>, FieldPathError>;

    fn identity(&self) -> TypedReference;

    fn uid(&self) -> &str;
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManagedSpec {
    #[serde(default)]
    provider_config_ref: Option<Reference>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManagedHeader {
    api_version: String,
    kind: String,
    #[serde(default)]
    metadata: ObjectMeta,
    #[serde(default)]
    spec: ManagedSpec,
}

/// A managed resource manifest kept as its full JSON object.
#[derive(Debug, Clone)]
pub struct ManagedResource {
    header: ManagedHeader,
    object: Value,
}

impl ManagedResource {
    pub fn from_value(object: Value) -> Result<Self, serde_json::Error> {
        let header = ManagedHeader::deserialize(&object)?;
        Ok(Self { header, object })
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        Self::from_value(serde_json::from_slice(bytes)?)
    }

    pub fn name(&self) -> &str {
        &self.header.metadata.name
    }
}

impl Managed for ManagedResource {
    fn provider_config_reference(&self) -> Option<&Reference> {
        self.header.spec.provider_config_ref.as_ref()
    }

    fn field_tree(&self) -> Result<Cow<'_, Value>, FieldPathError> {
        Ok(Cow::Borrowed(&self.object))
    }

    fn identity(&self) -> TypedReference {
        TypedReference {
            api_version: self.header.api_version.clone(),
            kind: self.header.kind.clone(),
            name: self.header.metadata.name.clone(),
        }
    }

    fn uid(&self) -> &str {
        &self.header.metadata.uid
    }
}

/// Where the credentials of a [`ProviderConfig`] come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CredentialsSourceKind {
    #[default]
    None,
    Secret,
    InjectedIdentity,
    Environment,
    Filesystem,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretKeySelector {
    pub namespace: String,
    pub name: String,
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvSelector {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsSelector {
    pub path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderCredentials {
    #[serde(default)]
    pub source: CredentialsSourceKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<SecretKeySelector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<EnvSelector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fs: Option<FsSelector>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfigSpec {
    pub credentials: ProviderCredentials,
    #[serde(default, rename = "assumeRoleARN", skip_serializing_if = "Option::is_none")]
    pub assume_role_arn: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub metadata: ObjectMeta,
    pub spec: ProviderConfigSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Secret {
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// Base64 encoded values.
    #[serde(default)]
    pub data: BTreeMap<String, String>,
    #[serde(default)]
    pub string_data: BTreeMap<String, String>,
}

/// Records that a managed resource uses a provider config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfigUsage {
    pub metadata: ObjectMeta,
    /// UID of the managed resource that controls this record.
    pub owner_uid: String,
    pub provider_config_ref: Reference,
    pub resource_ref: TypedReference,
}

/// Access to the objects the resolver and its collaborators read and write.
#[async_trait::async_trait]
pub trait ResourceClient: Send + Sync {
    async fn get_provider_config(&self, name: &str) -> Result<ProviderConfig, ClientError>;

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret, ClientError>;

    async fn get_usage(&self, name: &str) -> Result<Option<ProviderConfigUsage>, ClientError>;

    async fn put_usage(&self, usage: &ProviderConfigUsage) -> Result<(), ClientError>;
}
