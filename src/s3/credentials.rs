//! Storage credential resolution
//!
//! Credentials are taken from the storage configuration first, then from the
//! standard `AWS_*` environment variables. When neither is present the AWS
//! default provider chain is used by the client builder.

use crate::config::StorageConfig;
use aws_credential_types::Credentials;
use thiserror::Error;

/// Credential loading errors
#[derive(Error, Debug)]
pub enum CredentialsError {
    #[error("Incomplete credentials: {0}")]
    Incomplete(String),
}

/// Where a set of static credentials came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Config,
    Environment,
}

impl CredentialSource {
    fn provider_name(&self) -> &'static str {
        match self {
            CredentialSource::Config => "hayate-config",
            CredentialSource::Environment => "hayate-environment",
        }
    }
}

/// Resolved static credentials
#[derive(Debug, Clone)]
pub struct ResolvedCredentials {
    pub source: CredentialSource,
    pub credentials: Credentials,
}

/// Resolve static credentials for the storage backend
///
/// Returns `Ok(None)` when no static credentials are configured, in which case
/// the SDK's default provider chain applies.
pub fn resolve(config: &StorageConfig) -> Result<Option<ResolvedCredentials>, CredentialsError> {
    if let Some(resolved) = from_pair(
        config.access_key.as_deref(),
        config.secret_key.as_deref(),
        None,
        CredentialSource::Config,
    )? {
        return Ok(Some(resolved));
    }

    let access_key = std::env::var("AWS_ACCESS_KEY_ID").ok();
    let secret_key = std::env::var("AWS_SECRET_ACCESS_KEY").ok();
    let session_token = std::env::var("AWS_SESSION_TOKEN").ok();
    from_pair(
        access_key.as_deref(),
        secret_key.as_deref(),
        session_token,
        CredentialSource::Environment,
    )
}

fn from_pair(
    access_key: Option<&str>,
    secret_key: Option<&str>,
    session_token: Option<String>,
    source: CredentialSource,
) -> Result<Option<ResolvedCredentials>, CredentialsError> {
    match (access_key, secret_key) {
        (Some(access), Some(secret)) => Ok(Some(ResolvedCredentials {
            source,
            credentials: Credentials::new(
                access,
                secret,
                session_token,
                None,
                source.provider_name(),
            ),
        })),
        (None, None) => Ok(None),
        (Some(_), None) => Err(CredentialsError::Incomplete(format!(
            "{:?} provides an access key without a secret key",
            source
        ))),
        (None, Some(_)) => Err(CredentialsError::Incomplete(format!(
            "{:?} provides a secret key without an access key",
            source
        ))),
    }
}
