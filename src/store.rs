use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;

use crate::error::ClientError;
use crate::resource::{ProviderConfig, ProviderConfigUsage, ResourceClient, Secret};

const PROVIDER_CONFIGS: &str = "providerconfigs";
const SECRETS: &str = "secrets";
const USAGES: &str = "providerconfigusages";
const MAX_NAME_LEN: usize = 253;

/// Resource client backed by JSON manifests in a directory:
///
/// ```text
/// <root>/providerconfigs/<name>.json
/// <root>/secrets/<namespace>/<name>.json
/// <root>/providerconfigusages/<name>.json
/// ```
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn provider_config_path(&self, name: &str) -> Result<PathBuf, ClientError> {
        let name = object_name("ProviderConfig", name)?;
        Ok(self.root.join(PROVIDER_CONFIGS).join(format!("{name}.json")))
    }

    fn secret_path(&self, namespace: &str, name: &str) -> Result<PathBuf, ClientError> {
        let namespace = object_name("Namespace", namespace)?;
        let name = object_name("Secret", name)?;
        Ok(self
            .root
            .join(SECRETS)
            .join(namespace)
            .join(format!("{name}.json")))
    }

    fn usage_path(&self, name: &str) -> Result<PathBuf, ClientError> {
        let name = object_name("ProviderConfigUsage", name)?;
        Ok(self.root.join(USAGES).join(format!("{name}.json")))
    }

    async fn read<T: DeserializeOwned>(
        path: PathBuf,
        kind: &'static str,
        name: &str,
    ) -> Result<Option<T>, ClientError> {
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(ClientError::Io { path, source }),
        };
        tracing::trace!(kind, name, path = %path.display(), "read manifest");
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| ClientError::Decode { path, source })
    }
}

/// Accepts only DNS-subdomain style object names, so a name can never leave
/// the store root when joined onto it.
fn object_name<'a>(kind: &'static str, name: &'a str) -> Result<&'a str, ClientError> {
    let valid = !name.is_empty()
        && name.len() <= MAX_NAME_LEN
        && name != "."
        && name != ".."
        && name
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'.');
    if valid {
        Ok(name)
    } else {
        Err(ClientError::InvalidName { kind, name: name.to_string() })
    }
}

fn not_found(kind: &'static str, name: &str) -> ClientError {
    ClientError::NotFound { kind, name: name.to_string() }
}

#[async_trait::async_trait]
impl ResourceClient for FileStore {
    async fn get_provider_config(&self, name: &str) -> Result<ProviderConfig, ClientError> {
        Self::read(self.provider_config_path(name)?, "ProviderConfig", name)
            .await?
            .ok_or_else(|| not_found("ProviderConfig", name))
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret, ClientError> {
        Self::read(self.secret_path(namespace, name)?, "Secret", name)
            .await?
            .ok_or_else(|| not_found("Secret", &format!("{namespace}/{name}")))
    }

    async fn get_usage(&self, name: &str) -> Result<Option<ProviderConfigUsage>, ClientError> {
        Self::read(self.usage_path(name)?, "ProviderConfigUsage", name).await
    }

    async fn put_usage(&self, usage: &ProviderConfigUsage) -> Result<(), ClientError> {
        let path = self.usage_path(&usage.metadata.name)?;
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| ClientError::Io { path, source }
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err(parent))?;
        }
        let bytes = serde_json::to_vec_pretty(usage).map_err(|source| ClientError::Decode {
            path: path.clone(),
            source,
        })?;

        let staging = path.with_extension("json.tmp");
        tokio::fs::write(&staging, bytes).await.map_err(io_err(&staging))?;
        tokio::fs::rename(&staging, &path).await.map_err(io_err(&path))?;
        Ok(())
    }
}
