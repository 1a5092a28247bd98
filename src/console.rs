//! Sign-in URL for the AWS Management Console.
//!
//! See <https://docs.aws.amazon.com/IAM/latest/UserGuide/id_roles_providers_enable-console-custom-url.html>.

use anyhow::Context;
use aws_config::BehaviorVersion;
use aws_credential_types::provider::ProvideCredentials;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::AuthError;

const DEFAULT_REGION: &str = "us-east-1";

/// Shortest session the federation endpoint accepts.
const SIGNIN_DURATION_SECONDS: &str = "900";

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ConsoleSession {
    #[serde(rename = "sessionId")]
    pub access_key_id: String,

    #[serde(rename = "sessionKey")]
    pub secret_access_key: String,

    #[serde(rename = "sessionToken")]
    pub session_token: String,
}

#[derive(Deserialize, Debug)]
struct SigninTokenResponse {
    #[serde(rename = "SigninToken")]
    signin_token: String,
}

/// Credentials and region the profile currently resolves to.
pub async fn current_session(profile: &str) -> anyhow::Result<(ConsoleSession, String)> {
    let config = aws_config::defaults(BehaviorVersion::latest())
        .profile_name(profile)
        .load()
        .await;

    let credentials = config
        .credentials_provider()
        .context("no AWS credentials provider configured")?
        .provide_credentials()
        .await
        .context("failed to get aws credential: please authenticate first")?;

    let region = config
        .region()
        .map(|r| r.to_string())
        .unwrap_or_else(|| DEFAULT_REGION.to_string());

    let session = ConsoleSession {
        access_key_id: credentials.access_key_id().to_string(),
        secret_access_key: credentials.secret_access_key().to_string(),
        session_token: credentials.session_token().unwrap_or_default().to_string(),
    };
    Ok((session, region))
}

pub fn console_domain(region: &str) -> &'static str {
    if region.starts_with("us-gov-") {
        "amazonaws-us-gov.com"
    } else if region.starts_with("cn-") {
        "amazonaws.cn"
    } else {
        "aws.amazon.com"
    }
}

pub async fn build_console_url(
    http_client: &reqwest::Client,
    cancel: &CancellationToken,
    session: &ConsoleSession,
    region: &str,
) -> anyhow::Result<String> {
    let domain = console_domain(region);
    let federation_url = format!("https://signin.{}/federation", domain);

    let token = get_signin_token(http_client, cancel, &federation_url, session).await?;

    login_url(
        &federation_url,
        &format!("https://console.{}/console/home", domain),
        &token,
    )
}

pub async fn get_signin_token(
    http_client: &reqwest::Client,
    cancel: &CancellationToken,
    federation_url: &str,
    session: &ConsoleSession,
) -> anyhow::Result<String> {
    let session_json = serde_json::to_string(session)?;

    let request = http_client
        .get(federation_url)
        .query(&[
            ("Action", "getSigninToken"),
            ("DurationSeconds", SIGNIN_DURATION_SECONDS),
            ("Session", session_json.as_str()),
        ])
        .send();

    let response = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(AuthError::Cancelled.into()),
        response = request => response.context("failed to request a sign-in token")?,
    };

    if response.status() != reqwest::StatusCode::OK {
        return Err(AuthError::SigninStatus(response.status().to_string()).into());
    }

    let body: SigninTokenResponse = response
        .json()
        .await
        .context("failed to decode the sign-in token response")?;
    Ok(body.signin_token)
}

pub fn login_url(federation_url: &str, destination: &str, signin_token: &str) -> anyhow::Result<String> {
    let url = url::Url::parse_with_params(
        federation_url,
        &[
            ("Action", "login"),
            ("Destination", destination),
            ("SigninToken", signin_token),
        ],
    )?;
    Ok(url.into())
}
