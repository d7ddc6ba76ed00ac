//! Terraform AWS provider setup for managed resources.
//!
//! [`SetupResolver::resolve`] turns a managed resource and the
//! `ProviderConfig` it references into the provider configuration block
//! (region and credentials) a Terraform workspace runs with.

pub mod aws;
pub mod aws_config;
pub mod backend;
pub mod context;
pub mod credentials;
pub mod error;
pub mod fieldpath;
pub mod resource;
pub mod setup;
pub mod store;
pub mod usage;

pub use aws::{AwsCredentialBackend, AwsSession};
pub use backend::{CredentialBackend, RetrievedCredentials, Session};
pub use context::{Interrupted, RequestContext};
pub use error::{BackendError, ClientError, SetupError};
pub use resource::{Managed, ManagedResource, ResourceClient};
pub use setup::{ProviderRequirement, Setup, SetupResolver};
pub use store::FileStore;
pub use usage::{ProviderConfigUsageTracker, UsageTracker};
