use anyhow::Context;
use aws_config::meta::region::RegionProviderChain;
use aws_config::retry::RetryConfig;
use aws_config::BehaviorVersion;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::error::AuthError;

const FALLBACK_REGION: &str = "us-east-1";

/// Temporary credentials issued by STS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub expiration: DateTime<Utc>,
}

/// STS client for the given profile, falling back to `us-east-1` when no region is configured.
///
/// Retries are disabled: a SAML assertion is only good for a single exchange attempt.
pub async fn sts_client(profile: &str) -> aws_sdk_sts::Client {
    let region = RegionProviderChain::default_provider().or_else(FALLBACK_REGION);
    let config = aws_config::defaults(BehaviorVersion::latest())
        .profile_name(profile)
        .region(region)
        .retry_config(RetryConfig::disabled())
        .load()
        .await;

    aws_sdk_sts::Client::new(&config)
}

pub fn session_duration_seconds(duration_hours: u8) -> i32 {
    i32::from(duration_hours) * 60 * 60
}

pub async fn assume_role_with_saml(
    client: &aws_sdk_sts::Client,
    cancel: &CancellationToken,
    duration_hours: u8,
    role_arn: &str,
    principal_arn: &str,
    saml_assertion_base64: &str,
) -> anyhow::Result<Credentials> {
    log::debug!("AssumeRoleWithSAML role: {}, principal: {}", role_arn, principal_arn);

    let request = client
        .assume_role_with_saml()
        .duration_seconds(session_duration_seconds(duration_hours))
        .role_arn(role_arn)
        .principal_arn(principal_arn)
        .saml_assertion(saml_assertion_base64)
        .send();

    let output = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(AuthError::Cancelled.into()),
        output = request => output.context("failed to assume role with SAML")?,
    };

    let credentials = output
        .credentials()
        .context("AssumeRoleWithSAML returned no credentials")?;
    let expiration = credentials.expiration();

    Ok(Credentials {
        access_key_id: credentials.access_key_id().to_string(),
        secret_access_key: credentials.secret_access_key().to_string(),
        session_token: credentials.session_token().to_string(),
        expiration: DateTime::from_timestamp(expiration.secs(), expiration.subsec_nanos())
            .context("credential expiration is out of range")?,
    })
}
