use std::fmt;
use std::path::Path;

use anyhow::Context;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::browser::{BrowserLauncher, BrowserSession, OutgoingRequest};
use crate::error::AuthError;
use crate::saml::AWS_SAML_ENDPOINT;

const LOGIN_HOST: &str = "login.microsoftonline.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    SessionStarting,
    NetworkMonitoring,
    AwaitingTargetRequest,
    Captured,
    ShutdownComplete,
    Cancelled,
    Failed,
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Azure AD as the SAML identity provider, driven through a real browser.
pub struct Azure<L> {
    launcher: L,
    saml_request: String,
    tenant_id: String,
}

impl<L: BrowserLauncher> Azure<L> {
    pub fn new(launcher: L, saml_request: String, tenant_id: String) -> Self {
        Self {
            launcher,
            saml_request,
            tenant_id,
        }
    }

    pub fn login_url(&self) -> String {
        let escaped: String =
            url::form_urlencoded::byte_serialize(self.saml_request.as_bytes()).collect();
        format!(
            "https://{}/{}/saml2?SAMLRequest={}",
            LOGIN_HOST, self.tenant_id, escaped
        )
    }

    /// Signs in through the browser and returns the base64 SAML response it posts to AWS.
    ///
    /// The browser is shut down on every path out of here, including cancellation.
    pub async fn authenticate(
        &self,
        cancel: &CancellationToken,
        profile_dir: &Path,
    ) -> anyhow::Result<String> {
        let mut state = CaptureState::Idle;
        transition(&mut state, CaptureState::SessionStarting);

        if cancel.is_cancelled() {
            transition(&mut state, CaptureState::Cancelled);
            return Err(AuthError::Cancelled.into());
        }

        // A launched session must reach shutdown, so launch is not raced against cancellation.
        let session = match self.launcher.launch(profile_dir).await {
            Ok(session) => session,
            Err(err) => {
                transition(&mut state, CaptureState::Failed);
                return Err(err.context("failed to start browser session"));
            }
        };

        let mut capture = CaptureSession { session, state };
        let result = if cancel.is_cancelled() {
            Err(AuthError::Cancelled.into())
        } else {
            capture.run(cancel, &self.login_url()).await
        };
        let CaptureSession { session, mut state } = capture;

        match result {
            Ok(saml_response) => {
                transition(&mut state, CaptureState::Captured);
                session
                    .shutdown()
                    .await
                    .context("failed to shut down browser session")?;
                transition(&mut state, CaptureState::ShutdownComplete);
                Ok(saml_response)
            }
            Err(err) => {
                let terminal = match err.downcast_ref::<AuthError>() {
                    Some(AuthError::Cancelled) => CaptureState::Cancelled,
                    _ => CaptureState::Failed,
                };
                if let Err(shutdown_err) = session.shutdown().await {
                    log::warn!("failed to shut down browser session: {:#}", shutdown_err);
                }
                transition(&mut state, terminal);
                Err(err)
            }
        }
    }
}

fn transition(state: &mut CaptureState, next: CaptureState) {
    log::debug!("capture: {} -> {}", state, next);
    *state = next;
}

struct CaptureSession<S> {
    session: S,
    state: CaptureState,
}

impl<S: BrowserSession> CaptureSession<S> {
    async fn run(&mut self, cancel: &CancellationToken, login_url: &str) -> anyhow::Result<String> {
        // Subscribe before navigating, or a fast redirect could post the response unseen.
        let mut requests = self.session.watch_requests().await?;
        transition(&mut self.state, CaptureState::NetworkMonitoring);

        log::debug!("navigating to {}", login_url);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AuthError::Cancelled.into()),
            navigated = self.session.navigate(login_url) => {
                navigated.context("failed to open the Azure AD login page")?
            }
        }
        transition(&mut self.state, CaptureState::AwaitingTargetRequest);

        wait_for_saml_response(cancel, &mut requests).await
    }
}

async fn wait_for_saml_response(
    cancel: &CancellationToken,
    requests: &mut mpsc::UnboundedReceiver<OutgoingRequest>,
) -> anyhow::Result<String> {
    loop {
        let request = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AuthError::Cancelled.into()),
            request = requests.recv() => request,
        };

        let Some(request) = request else {
            anyhow::bail!("browser closed before the SAML response was posted");
        };

        if request.url != AWS_SAML_ENDPOINT {
            continue;
        }

        log::debug!("captured request to {}", request.url);
        return extract_saml_response(request.post_data.as_deref().unwrap_or_default());
    }
}

fn extract_saml_response(post_data: &str) -> anyhow::Result<String> {
    url::form_urlencoded::parse(post_data.as_bytes())
        .find(|(key, _)| key == "SAMLResponse")
        .map(|(_, value)| value.into_owned())
        .ok_or_else(|| AuthError::MissingSamlResponse.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_url_escapes_saml_request() {
        let azure = Azure::new(
            crate::browser::Chrome,
            "ab+c/d==".to_string(),
            "tenant-id".to_string(),
        );
        assert_eq!(
            azure.login_url(),
            "https://login.microsoftonline.com/tenant-id/saml2?SAMLRequest=ab%2Bc%2Fd%3D%3D"
        );
    }

    #[test]
    fn extracts_saml_response_from_form() {
        let body = "RelayState=&SAMLResponse=PHNhbWw%2BPC9zYW1sPg%3D%3D";
        assert_eq!(extract_saml_response(body).unwrap(), "PHNhbWw+PC9zYW1sPg==");
    }

    #[test]
    fn missing_saml_response_is_fatal() {
        let err = extract_saml_response("RelayState=x").unwrap_err();
        assert_eq!(err.to_string(), "no such key: SAMLResponse");
    }
}
