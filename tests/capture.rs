use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use aws_azure_auth::azure::Azure;
use aws_azure_auth::browser::{BrowserLauncher, BrowserSession, OutgoingRequest};
use aws_azure_auth::saml::AWS_SAML_ENDPOINT;
use aws_azure_auth::AuthError;

#[derive(Clone, Default)]
struct Calls(Arc<Mutex<Vec<String>>>);

impl Calls {
    fn push(&self, call: impl Into<String>) {
        self.0.lock().unwrap().push(call.into());
    }

    fn all(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

struct FakeBrowser {
    calls: Calls,
    requests: Vec<OutgoingRequest>,
    close_after_navigation: bool,
    cancel_on_launch: Option<CancellationToken>,
}

struct FakeSession {
    calls: Calls,
    requests: Vec<OutgoingRequest>,
    close_after_navigation: bool,
    tx: Option<mpsc::UnboundedSender<OutgoingRequest>>,
}

#[async_trait]
impl BrowserLauncher for FakeBrowser {
    type Session = FakeSession;

    async fn launch(&self, profile_dir: &Path) -> anyhow::Result<FakeSession> {
        self.calls.push(format!("launch {}", profile_dir.display()));
        if let Some(cancel) = &self.cancel_on_launch {
            cancel.cancel();
            tokio::task::yield_now().await;
        }
        Ok(FakeSession {
            calls: self.calls.clone(),
            requests: self.requests.clone(),
            close_after_navigation: self.close_after_navigation,
            tx: None,
        })
    }
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn watch_requests(&mut self) -> anyhow::Result<mpsc::UnboundedReceiver<OutgoingRequest>> {
        self.calls.push("watch");
        let (tx, rx) = mpsc::unbounded_channel();
        self.tx = Some(tx);
        Ok(rx)
    }

    async fn navigate(&mut self, url: &str) -> anyhow::Result<()> {
        self.calls.push(format!("navigate {}", url));
        let tx = self.tx.as_ref().expect("navigate before watch");
        for request in self.requests.drain(..) {
            tx.send(request).unwrap();
        }
        if self.close_after_navigation {
            self.tx = None;
        }
        Ok(())
    }

    async fn shutdown(self) -> anyhow::Result<()> {
        self.calls.push("shutdown");
        Ok(())
    }
}

fn request(url: &str, post_data: Option<&str>) -> OutgoingRequest {
    OutgoingRequest {
        url: url.to_string(),
        post_data: post_data.map(str::to_string),
    }
}

fn azure(requests: Vec<OutgoingRequest>, calls: &Calls) -> Azure<FakeBrowser> {
    Azure::new(
        FakeBrowser {
            calls: calls.clone(),
            requests,
            close_after_navigation: false,
            cancel_on_launch: None,
        },
        "cmVxdWVzdA==".to_string(),
        "tenant".to_string(),
    )
}

#[tokio::test]
async fn captures_saml_response_after_unrelated_requests() {
    let calls = Calls::default();
    let azure = azure(
        vec![
            request("https://login.microsoftonline.com/tenant/login", Some("login=user")),
            request("https://signin.aws.amazon.com/saml?x=1", Some("SAMLResponse=wrong")),
            request(AWS_SAML_ENDPOINT, Some("SAMLResponse=YXNzZXJ0aW9u&RelayState=")),
            request(AWS_SAML_ENDPOINT, Some("SAMLResponse=c2Vjb25k")),
        ],
        &calls,
    );

    let response = azure
        .authenticate(&CancellationToken::new(), Path::new("/tmp/profile"))
        .await
        .unwrap();

    assert_eq!(response, "YXNzZXJ0aW9u");
    assert_eq!(
        calls.all(),
        vec![
            "launch /tmp/profile".to_string(),
            "watch".to_string(),
            "navigate https://login.microsoftonline.com/tenant/saml2?SAMLRequest=cmVxdWVzdA%3D%3D"
                .to_string(),
            "shutdown".to_string(),
        ]
    );
}

#[tokio::test]
async fn matching_request_without_saml_response_fails() {
    let calls = Calls::default();
    let azure = azure(vec![request(AWS_SAML_ENDPOINT, Some("RelayState=x"))], &calls);

    let err = azure
        .authenticate(&CancellationToken::new(), Path::new("/tmp/profile"))
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<AuthError>(),
        Some(AuthError::MissingSamlResponse)
    ));
    assert_eq!(calls.all().last().map(String::as_str), Some("shutdown"));
}

#[tokio::test]
async fn cancellation_stops_waiting_and_shuts_down() {
    let calls = Calls::default();
    let azure = azure(
        vec![request("https://login.microsoftonline.com/common/reprocess", None)],
        &calls,
    );

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = tokio::time::timeout(
        Duration::from_secs(5),
        azure.authenticate(&cancel, Path::new("/tmp/profile")),
    )
    .await
    .expect("authenticate did not return after cancellation")
    .unwrap_err();

    assert!(matches!(err.downcast_ref::<AuthError>(), Some(AuthError::Cancelled)));
    assert_eq!(calls.all().last().map(String::as_str), Some("shutdown"));
}

#[tokio::test]
async fn cancelled_before_launch_never_starts_browser() {
    let calls = Calls::default();
    let azure = azure(Vec::new(), &calls);

    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = azure
        .authenticate(&cancel, Path::new("/tmp/profile"))
        .await
        .unwrap_err();

    assert!(matches!(err.downcast_ref::<AuthError>(), Some(AuthError::Cancelled)));
    assert!(calls.all().is_empty());
}

#[tokio::test]
async fn browser_closed_before_response_is_an_error() {
    let calls = Calls::default();
    let azure = Azure::new(
        FakeBrowser {
            calls: calls.clone(),
            requests: vec![request("https://login.microsoftonline.com/tenant/login", None)],
            close_after_navigation: true,
            cancel_on_launch: None,
        },
        "cmVxdWVzdA==".to_string(),
        "tenant".to_string(),
    );

    let err = azure
        .authenticate(&CancellationToken::new(), Path::new("/tmp/profile"))
        .await
        .unwrap_err();

    assert!(err.downcast_ref::<AuthError>().is_none());
    assert_eq!(calls.all().last().map(String::as_str), Some("shutdown"));
}

#[tokio::test]
async fn cancelled_during_launch_closes_browser() {
    let calls = Calls::default();
    let cancel = CancellationToken::new();
    let azure = Azure::new(
        FakeBrowser {
            calls: calls.clone(),
            requests: Vec::new(),
            close_after_navigation: false,
            cancel_on_launch: Some(cancel.clone()),
        },
        "cmVxdWVzdA==".to_string(),
        "tenant".to_string(),
    );

    let err = azure
        .authenticate(&cancel, Path::new("/tmp/profile"))
        .await
        .unwrap_err();

    assert!(matches!(err.downcast_ref::<AuthError>(), Some(AuthError::Cancelled)));
    assert_eq!(
        calls.all(),
        vec!["launch /tmp/profile".to_string(), "shutdown".to_string()]
    );
}
