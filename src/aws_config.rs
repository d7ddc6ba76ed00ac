use aws_config::meta::region::RegionProviderChain;
use aws_config::sts::AssumeRoleProvider;
use aws_config::BehaviorVersion;
use aws_credential_types::provider::SharedCredentialsProvider;
use aws_credential_types::Credentials;
use aws_types::region::Region;
use aws_types::SdkConfig;

/// Uses `region` when set, otherwise the SDK's default region chain.
fn region_provider(region: &str) -> RegionProviderChain {
    let requested = (!region.is_empty()).then(|| Region::new(region.to_string()));
    RegionProviderChain::first_try(requested).or_default_provider()
}

/// Config backed by the default credential chain: environment, profile,
/// web identity token, container and instance metadata.
pub async fn configure_ambient(region: &str) -> SdkConfig {
    aws_config::defaults(BehaviorVersion::v2024_03_28())
        .region(region_provider(region))
        .load()
        .await
}

/// Config that only ever uses `credentials`.
pub async fn configure_static(credentials: Credentials, region: &str) -> SdkConfig {
    aws_config::defaults(BehaviorVersion::v2024_03_28())
        .credentials_provider(credentials)
        .region(region_provider(region))
        .load()
        .await
}

/// Layers an STS AssumeRole provider for `role_arn` over the credentials of
/// `base`. No STS call is made here; the role is assumed the first time
/// credentials are read from the returned config.
pub async fn configure_assumed_role(
    base: &SdkConfig,
    role_arn: &str,
    region: &str,
    session_name: &str,
) -> SdkConfig {
    let mut builder = AssumeRoleProvider::builder(role_arn)
        .session_name(session_name)
        .configure(base);
    if !region.is_empty() {
        builder = builder.region(Region::new(region.to_string()));
    }

    base.to_builder()
        .credentials_provider(SharedCredentialsProvider::new(builder.build().await))
        .build()
}
