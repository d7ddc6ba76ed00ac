//! Secret material extraction and parsing.

use std::fmt;
use std::path::PathBuf;

use base64::Engine;
use configparser::ini::Ini;

use crate::error::BackendError;
use crate::resource::{
    CredentialsSourceKind, EnvSelector, FsSelector, ProviderCredentials, ResourceClient,
    SecretKeySelector,
};

pub const DEFAULT_SECTION: &str = "default";

const KEY_ACCESS_KEY_ID: &str = "aws_access_key_id";
const KEY_SECRET_ACCESS_KEY: &str = "aws_secret_access_key";
const KEY_SESSION_TOKEN: &str = "aws_session_token";

/// A credential source together with the selector it needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource<'a> {
    None,
    InjectedIdentity,
    Secret(&'a SecretKeySelector),
    Environment(&'a EnvSelector),
    Filesystem(&'a FsSelector),
}

impl<'a> CredentialSource<'a> {
    pub fn from_credentials(credentials: &'a ProviderCredentials) -> Result<Self, BackendError> {
        Ok(match credentials.source {
            CredentialsSourceKind::None => CredentialSource::None,
            CredentialsSourceKind::InjectedIdentity => CredentialSource::InjectedIdentity,
            CredentialsSourceKind::Secret => CredentialSource::Secret(
                credentials
                    .secret_ref
                    .as_ref()
                    .ok_or(BackendError::MissingSecretRef)?,
            ),
            CredentialsSourceKind::Environment => CredentialSource::Environment(
                credentials.env.as_ref().ok_or(BackendError::MissingEnvSelector)?,
            ),
            CredentialsSourceKind::Filesystem => CredentialSource::Filesystem(
                credentials.fs.as_ref().ok_or(BackendError::MissingFsSelector)?,
            ),
        })
    }
}

/// Resolves raw secret material for any source other than injected identity.
pub async fn extract<C>(
    client: &C,
    credentials: &ProviderCredentials,
) -> Result<Vec<u8>, BackendError>
where
    C: ResourceClient + ?Sized,
{
    match CredentialSource::from_credentials(credentials)? {
        CredentialSource::None => Ok(Vec::new()),
        CredentialSource::InjectedIdentity => Err(BackendError::NotExtractable),
        CredentialSource::Secret(selector) => {
            let secret = client.get_secret(&selector.namespace, &selector.name).await?;
            if let Some(value) = secret.string_data.get(&selector.key) {
                return Ok(value.as_bytes().to_vec());
            }
            let encoded = secret.data.get(&selector.key).ok_or_else(|| {
                BackendError::MissingSecretKey {
                    namespace: selector.namespace.clone(),
                    name: selector.name.clone(),
                    key: selector.key.clone(),
                }
            })?;
            Ok(base64::engine::general_purpose::STANDARD.decode(encoded)?)
        }
        CredentialSource::Environment(selector) => std::env::var(&selector.name)
            .map(String::into_bytes)
            .map_err(|_| BackendError::MissingEnvVar(selector.name.clone())),
        CredentialSource::Filesystem(selector) => {
            let path = expand_home(&selector.path);
            tokio::fs::read(&path)
                .await
                .map_err(|source| BackendError::ReadCredentialsFile { path, source })
        }
    }
}

fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs_next::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}

/// Long-lived keys read from a shared-credentials document.
#[derive(Clone, PartialEq, Eq)]
pub struct StaticCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"** redacted **")
            .field("session_token", &self.session_token.as_ref().map(|_| "** redacted **"))
            .finish()
    }
}

/// Parses an AWS shared-credentials (INI) document and returns the keys of
/// `profile`.
pub fn parse_shared_credentials(
    data: &[u8],
    profile: &str,
) -> Result<StaticCredentials, BackendError> {
    let text = std::str::from_utf8(data)
        .map_err(|e| BackendError::InvalidSecret(format!("not valid UTF-8: {e}")))?;

    let mut ini = Ini::new();
    ini.read(text.to_string())
        .map_err(BackendError::InvalidSecret)?;

    let required = |key: &str| {
        ini.get(profile, key)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| BackendError::InvalidSecret(format!("[{profile}] has no {key}")))
    };

    Ok(StaticCredentials {
        access_key_id: required(KEY_ACCESS_KEY_ID)?,
        secret_access_key: required(KEY_SECRET_ACCESS_KEY)?,
        session_token: ini
            .get(profile, KEY_SESSION_TOKEN)
            .filter(|value| !value.is_empty()),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::io::Write;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::error::ClientError;
    use crate::resource::{ObjectMeta, ProviderConfig, ProviderConfigUsage, Secret};

    const CREDENTIALS: &str = "[default]\naws_access_key_id = AKIDEXAMPLE\naws_secret_access_key = wJalrXUtnFEMI\n";

    struct MockClient {
        secret: Secret,
    }

    #[async_trait::async_trait]
    impl ResourceClient for MockClient {
        async fn get_provider_config(&self, name: &str) -> Result<ProviderConfig, ClientError> {
            Err(ClientError::NotFound { kind: "ProviderConfig", name: name.to_string() })
        }

        async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret, ClientError> {
            if self.secret.metadata.namespace.as_deref() == Some(namespace)
                && self.secret.metadata.name == name
            {
                Ok(self.secret.clone())
            } else {
                Err(ClientError::NotFound { kind: "Secret", name: name.to_string() })
            }
        }

        async fn get_usage(&self, _name: &str) -> Result<Option<ProviderConfigUsage>, ClientError> {
            Ok(None)
        }

        async fn put_usage(&self, _usage: &ProviderConfigUsage) -> Result<(), ClientError> {
            Ok(())
        }
    }

    fn client_with(data: BTreeMap<String, String>, string_data: BTreeMap<String, String>) -> MockClient {
        MockClient {
            secret: Secret {
                metadata: ObjectMeta {
                    name: "aws-creds".to_string(),
                    namespace: Some("crossplane-system".to_string()),
                    ..Default::default()
                },
                data,
                string_data,
            },
        }
    }

    fn secret_credentials(key: &str) -> ProviderCredentials {
        ProviderCredentials {
            source: CredentialsSourceKind::Secret,
            secret_ref: Some(SecretKeySelector {
                namespace: "crossplane-system".to_string(),
                name: "aws-creds".to_string(),
                key: key.to_string(),
            }),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_extract_secret_decodes_data() {
        let encoded = base64::engine::general_purpose::STANDARD.encode(CREDENTIALS);
        let client = client_with(
            BTreeMap::from([("creds".to_string(), encoded)]),
            BTreeMap::new(),
        );

        let actual = extract(&client, &secret_credentials("creds")).await.unwrap();

        assert_eq!(actual, CREDENTIALS.as_bytes());
    }

    #[tokio::test]
    async fn test_extract_secret_prefers_string_data() {
        let client = client_with(
            BTreeMap::from([("creds".to_string(), "bm90LXRoaXM=".to_string())]),
            BTreeMap::from([("creds".to_string(), "plain".to_string())]),
        );

        let actual = extract(&client, &secret_credentials("creds")).await.unwrap();

        assert_eq!(actual, b"plain");
    }

    #[tokio::test]
    async fn test_extract_secret_missing_key() {
        let client = client_with(BTreeMap::new(), BTreeMap::new());
        let actual = extract(&client, &secret_credentials("creds")).await;
        assert!(matches!(actual, Err(BackendError::MissingSecretKey { .. })));
    }

    #[tokio::test]
    async fn test_extract_secret_without_selector() {
        let client = client_with(BTreeMap::new(), BTreeMap::new());
        let fixture = ProviderCredentials {
            source: CredentialsSourceKind::Secret,
            ..Default::default()
        };
        let actual = extract(&client, &fixture).await;
        assert!(matches!(actual, Err(BackendError::MissingSecretRef)));
    }

    #[tokio::test]
    async fn test_extract_secret_not_found() {
        let client = client_with(BTreeMap::new(), BTreeMap::new());
        let mut fixture = secret_credentials("creds");
        fixture.secret_ref.as_mut().unwrap().name = "other".to_string();
        let actual = extract(&client, &fixture).await;
        assert!(matches!(
            actual,
            Err(BackendError::Client(ClientError::NotFound { .. }))
        ));
    }

    #[tokio::test]
    async fn test_extract_environment() {
        std::env::set_var("JETAWS_TEST_EXTRACT_CREDS", "from-env");
        let client = client_with(BTreeMap::new(), BTreeMap::new());
        let fixture = ProviderCredentials {
            source: CredentialsSourceKind::Environment,
            env: Some(EnvSelector { name: "JETAWS_TEST_EXTRACT_CREDS".to_string() }),
            ..Default::default()
        };

        let actual = extract(&client, &fixture).await.unwrap();

        assert_eq!(actual, b"from-env");
    }

    #[tokio::test]
    async fn test_extract_environment_unset() {
        let client = client_with(BTreeMap::new(), BTreeMap::new());
        let fixture = ProviderCredentials {
            source: CredentialsSourceKind::Environment,
            env: Some(EnvSelector { name: "JETAWS_TEST_UNSET_VARIABLE".to_string() }),
            ..Default::default()
        };
        let actual = extract(&client, &fixture).await;
        assert!(matches!(actual, Err(BackendError::MissingEnvVar(_))));
    }

    #[tokio::test]
    async fn test_extract_filesystem() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CREDENTIALS.as_bytes()).unwrap();
        let client = client_with(BTreeMap::new(), BTreeMap::new());
        let fixture = ProviderCredentials {
            source: CredentialsSourceKind::Filesystem,
            fs: Some(FsSelector { path: file.path().display().to_string() }),
            ..Default::default()
        };

        let actual = extract(&client, &fixture).await.unwrap();

        assert_eq!(actual, CREDENTIALS.as_bytes());
    }

    #[tokio::test]
    async fn test_extract_none_yields_empty_material() {
        let client = client_with(BTreeMap::new(), BTreeMap::new());
        let actual = extract(&client, &ProviderCredentials::default()).await.unwrap();
        assert!(actual.is_empty());
    }

    #[tokio::test]
    async fn test_extract_injected_identity_is_rejected() {
        let client = client_with(BTreeMap::new(), BTreeMap::new());
        let fixture = ProviderCredentials {
            source: CredentialsSourceKind::InjectedIdentity,
            ..Default::default()
        };
        let actual = extract(&client, &fixture).await;
        assert!(matches!(actual, Err(BackendError::NotExtractable)));
    }

    #[test]
    fn test_parse_shared_credentials() {
        let fixture = "[default]\naws_access_key_id = AKIDEXAMPLE\naws_secret_access_key = wJalrXUtnFEMI\naws_session_token = FwoGZX\n";
        let actual = parse_shared_credentials(fixture.as_bytes(), DEFAULT_SECTION).unwrap();
        let expected = StaticCredentials {
            access_key_id: "AKIDEXAMPLE".to_string(),
            secret_access_key: "wJalrXUtnFEMI".to_string(),
            session_token: Some("FwoGZX".to_string()),
        };
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_parse_shared_credentials_without_token() {
        let actual = parse_shared_credentials(CREDENTIALS.as_bytes(), DEFAULT_SECTION).unwrap();
        assert_eq!(actual.session_token, None);
    }

    #[test]
    fn test_parse_shared_credentials_missing_secret_key() {
        let fixture = "[default]\naws_access_key_id = AKIDEXAMPLE\n";
        let actual = parse_shared_credentials(fixture.as_bytes(), DEFAULT_SECTION);
        assert!(matches!(actual, Err(BackendError::InvalidSecret(_))));
    }

    #[test]
    fn test_parse_shared_credentials_empty_material() {
        let actual = parse_shared_credentials(b"", DEFAULT_SECTION);
        assert!(matches!(actual, Err(BackendError::InvalidSecret(_))));
    }

    #[test]
    fn test_static_credentials_debug_redacts_secrets() {
        let fixture = parse_shared_credentials(CREDENTIALS.as_bytes(), DEFAULT_SECTION).unwrap();
        let actual = format!("{fixture:?}");
        assert!(actual.contains("AKIDEXAMPLE"));
        assert!(!actual.contains("wJalrXUtnFEMI"));
    }
}
