use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventRequestWillBeSent, GetRequestPostDataParams,
};
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// An HTTP request the browser is about to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingRequest {
    pub url: String,
    pub post_data: Option<String>,
}

#[async_trait]
pub trait BrowserSession: Send + Sized {
    /// Starts forwarding every outgoing request of the session into the returned channel.
    async fn watch_requests(&mut self) -> anyhow::Result<mpsc::UnboundedReceiver<OutgoingRequest>>;

    async fn navigate(&mut self, url: &str) -> anyhow::Result<()>;

    /// Closes the browser gracefully so the profile directory is flushed.
    async fn shutdown(self) -> anyhow::Result<()>;
}

#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    type Session: BrowserSession;

    async fn launch(&self, profile_dir: &Path) -> anyhow::Result<Self::Session>;
}

pub struct Chrome;

#[async_trait]
impl BrowserLauncher for Chrome {
    type Session = ChromeSession;

    async fn launch(&self, profile_dir: &Path) -> anyhow::Result<ChromeSession> {
        let config = BrowserConfig::builder()
            .with_head()
            .user_data_dir(profile_dir)
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .build()
            .map_err(anyhow::Error::msg)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chrome")?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    log::debug!("browser handler: {}", err);
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .context("failed to open a browser tab")?;

        Ok(ChromeSession {
            browser,
            page,
            handler,
            forwarder: None,
        })
    }
}

/// Maps a `Network.requestWillBeSent` event. The body is the concatenation of the
/// base64-decoded post data entries, or `None` when the event carries no entries.
fn outgoing_request(event: &EventRequestWillBeSent) -> OutgoingRequest {
    let post_data = event.request.post_data_entries.as_ref().and_then(|entries| {
        let mut body = Vec::new();
        for bytes in entries.iter().filter_map(|entry| entry.bytes.as_ref()) {
            match STANDARD.decode(AsRef::<str>::as_ref(bytes)) {
                Ok(decoded) => body.extend(decoded),
                Err(err) => {
                    log::warn!("undecodable post data for {}: {}", event.request.url, err);
                    return None;
                }
            }
        }
        if body.is_empty() {
            None
        } else {
            Some(String::from_utf8_lossy(&body).into_owned())
        }
    });

    OutgoingRequest {
        url: event.request.url.clone(),
        post_data,
    }
}

pub struct ChromeSession {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    forwarder: Option<JoinHandle<()>>,
}

#[async_trait]
impl BrowserSession for ChromeSession {
    async fn watch_requests(&mut self) -> anyhow::Result<mpsc::UnboundedReceiver<OutgoingRequest>> {
        self.page
            .execute(EnableParams::default())
            .await
            .context("failed to enable network monitoring")?;
        let mut events = self
            .page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .context("failed to subscribe to network events")?;

        let (tx, rx) = mpsc::unbounded_channel();
        let page = self.page.clone();
        self.forwarder = Some(tokio::spawn(async move {
            while let Some(event) = events.next().await {
                let mut request = outgoing_request(&event);
                // Large bodies are not inlined in the event and have to be fetched.
                if request.post_data.is_none() && event.request.has_post_data == Some(true) {
                    match page
                        .execute(GetRequestPostDataParams::new(event.request_id.clone()))
                        .await
                    {
                        Ok(body) => request.post_data = Some(body.result.post_data),
                        Err(err) => log::warn!("failed to fetch body of {}: {}", request.url, err),
                    }
                }
                if tx.send(request).is_err() {
                    break;
                }
            }
        }));

        Ok(rx)
    }

    async fn navigate(&mut self, url: &str) -> anyhow::Result<()> {
        self.page.goto(url).await?;
        Ok(())
    }

    async fn shutdown(mut self) -> anyhow::Result<()> {
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }

        self.browser
            .close()
            .await
            .context("failed to close the browser")?;
        self.browser
            .wait()
            .await
            .context("failed to wait for the browser to exit")?;

        if let Err(err) = self.handler.await {
            log::debug!("browser handler task: {}", err);
        }
        Ok(())
    }
}
