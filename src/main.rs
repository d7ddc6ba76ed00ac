use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use jetaws::{
    AwsCredentialBackend, FileStore, ManagedResource, ProviderConfigUsageTracker, RequestContext,
    Setup, SetupResolver,
};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "jetaws")]
#[command(about = "Resolve Terraform AWS provider setup for a managed resource")]
struct Cli {
    /// Directory holding ProviderConfig, Secret and ProviderConfigUsage manifests
    #[arg(long, env = "JETAWS_STORE")]
    store: PathBuf,

    /// Managed resource manifest (JSON)
    #[arg(long)]
    resource: PathBuf,

    #[arg(long, env = "TERRAFORM_VERSION", default_value = "1.0.11")]
    terraform_version: String,

    #[arg(long, env = "TERRAFORM_PROVIDER_SOURCE", default_value = "hashicorp/aws")]
    provider_source: String,

    #[arg(long, env = "TERRAFORM_PROVIDER_VERSION", default_value = "3.63.0")]
    provider_version: String,

    /// Deadline in seconds for the whole resolution
    #[arg(long)]
    timeout: Option<u64>,

    /// Session name for AssumeRole calls
    #[arg(long)]
    session_name: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries the setup document
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "jetaws=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let manifest = tokio::fs::read(&cli.resource)
        .await
        .with_context(|| format!("cannot read {}", cli.resource.display()))?;
    let managed = ManagedResource::from_slice(&manifest)
        .with_context(|| format!("cannot decode {}", cli.resource.display()))?;

    let store = Arc::new(FileStore::new(cli.store));
    let mut backend = AwsCredentialBackend::new(store.clone());
    if let Some(session_name) = cli.session_name {
        backend = backend.with_session_name(session_name);
    }
    let resolver = SetupResolver::new(
        Setup::new(cli.terraform_version, cli.provider_source, cli.provider_version),
        backend,
        ProviderConfigUsageTracker::new(store.clone()),
    );

    let mut ctx = RequestContext::new();
    if let Some(secs) = cli.timeout {
        ctx = ctx.with_timeout(Duration::from_secs(secs));
    }
    let canceller = ctx.token().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling resolution");
            canceller.cancel();
        }
    });

    tracing::info!(resource = %managed.name(), store = %store.root().display(), "resolving provider setup");
    let setup = resolver.resolve(&ctx, store.as_ref(), &managed).await?;

    println!("{}", serde_json::to_string_pretty(&setup)?);
    Ok(())
}
