use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::HarvestError;

/// A background data-fetch response recorded by a page after load.
#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct CapturedResponse {
    pub url: String,
    pub body: String,
}

impl CapturedResponse {
    pub fn new(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            body: body.into(),
        }
    }
}

/// One live browser page. Background responses are recorded from the moment the
/// session exists; navigation responses are not.
#[async_trait]
pub trait BrowserSession: Send {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), HarvestError>;

    /// Wait until `selector` matches an element. `Ok(false)` means it never appeared.
    async fn wait_for_selector(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<bool, HarvestError>;

    /// Drain the captured response buffer. Responses are returned once only.
    async fn take_responses(&mut self) -> Result<Vec<CapturedResponse>, HarvestError>;

    async fn evaluate(&mut self, script: &str) -> Result<serde_json::Value, HarvestError>;

    async fn scroll(&mut self) -> Result<(), HarvestError> {
        self.evaluate("window.scrollBy(0, window.innerHeight);")
            .await
            .map(|_| ())
    }

    /// Visible text of the first element matching `selector`.
    async fn text(&mut self, selector: &str) -> Result<Option<String>, HarvestError>;

    /// Values of attribute `name` across every element matching `selector`.
    async fn attributes(&mut self, selector: &str, name: &str)
        -> Result<Vec<String>, HarvestError>;

    async fn current_url(&mut self) -> Result<String, HarvestError>;

    /// Tear down the page and the browser behind it.
    async fn close(self: Box<Self>) -> Result<(), HarvestError>;
}

/// Source of browser sessions.
///
/// Every call to [`SessionLauncher::launch`] must produce a fresh browser with no
/// cookies, cache or captured responses shared with any other session. Workers run
/// concurrently on the same runtime and rely on this for isolation.
#[async_trait]
pub trait SessionLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, HarvestError>;
}
