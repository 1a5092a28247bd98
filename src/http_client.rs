use std::time::Duration;

/// The federation endpoint is expected to answer quickly; give up after this.
pub const SIGNIN_TIMEOUT: Duration = Duration::from_secs(5);

pub fn create_signin_http_client() -> anyhow::Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(SIGNIN_TIMEOUT)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}
