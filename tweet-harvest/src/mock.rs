//! Scripted in-memory browser used by the unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::browser::{BrowserSession, CapturedResponse, SessionLauncher};
use crate::HarvestError;

/// What a URL renders as. The first response batch is captured while the page
/// loads; each later batch appears after one scroll.
#[derive(Clone, Debug, Default)]
pub(crate) struct MockPage {
    selectors: Vec<String>,
    batches: Vec<Vec<CapturedResponse>>,
    texts: HashMap<String, String>,
    attrs: HashMap<String, Vec<String>>,
    redirect: Option<String>,
    unreachable: bool,
    load_delay: Duration,
}

impl MockPage {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::default()
        }
    }

    pub(crate) fn with_selector(mut self, selector: &str) -> Self {
        self.selectors.push(selector.to_owned());
        self
    }

    pub(crate) fn with_batch(mut self, batch: Vec<CapturedResponse>) -> Self {
        self.batches.push(batch);
        self
    }

    pub(crate) fn with_text(mut self, selector: &str, text: &str) -> Self {
        self.texts.insert(selector.to_owned(), text.to_owned());
        self
    }

    pub(crate) fn with_attrs(mut self, selector: &str, values: &[&str]) -> Self {
        self.attrs.insert(
            selector.to_owned(),
            values.iter().map(|v| v.to_string()).collect(),
        );
        self
    }

    pub(crate) fn with_redirect(mut self, url: &str) -> Self {
        self.redirect = Some(url.to_owned());
        self
    }

    pub(crate) fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = delay;
        self
    }
}

#[derive(Default, Debug)]
pub(crate) struct MockStats {
    launched: AtomicUsize,
    closed: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
    navigations: Mutex<Vec<String>>,
}

impl MockStats {
    pub(crate) fn launched(&self) -> usize {
        self.launched.load(Ordering::SeqCst)
    }

    pub(crate) fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub(crate) fn navigations(&self) -> Vec<String> {
        self.navigations.lock().unwrap().clone()
    }
}

#[derive(Clone, Default)]
pub(crate) struct MockLauncher {
    pages: Arc<HashMap<String, MockPage>>,
    // Remaining forced navigation failures per URL
    flaky: Arc<Mutex<HashMap<String, usize>>>,
    pub stats: Arc<MockStats>,
}

impl MockLauncher {
    pub(crate) fn new(pages: impl IntoIterator<Item = (String, MockPage)>) -> Self {
        Self {
            pages: Arc::new(pages.into_iter().collect()),
            ..Self::default()
        }
    }

    pub(crate) fn with_flaky(self, url: &str, failures: usize) -> Self {
        self.flaky.lock().unwrap().insert(url.to_owned(), failures);
        self
    }
}

#[async_trait]
impl SessionLauncher for MockLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, HarvestError> {
        self.stats.launched.fetch_add(1, Ordering::SeqCst);
        let active = self.stats.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats.max_active.fetch_max(active, Ordering::SeqCst);
        Ok(Box::new(MockSession {
            launcher: self.clone(),
            url: None,
            page: None,
            pending: Vec::new(),
            next_batch: 0,
        }))
    }
}

pub(crate) struct MockSession {
    launcher: MockLauncher,
    url: Option<String>,
    page: Option<MockPage>,
    pending: Vec<CapturedResponse>,
    next_batch: usize,
}

impl MockSession {
    fn release_batch(&mut self) {
        if let Some(batch) = self
            .page
            .as_ref()
            .and_then(|p| p.batches.get(self.next_batch))
        {
            self.pending.extend(batch.iter().cloned());
            self.next_batch += 1;
        }
    }
}

#[async_trait]
impl BrowserSession for MockSession {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), HarvestError> {
        self.launcher
            .stats
            .navigations
            .lock()
            .unwrap()
            .push(url.to_owned());

        // A new document starts with an empty capture buffer
        self.pending.clear();
        self.next_batch = 0;
        self.page = None;
        self.url = Some(url.to_owned());

        let fail = || HarvestError::FetchTimeout {
            url: url.to_owned(),
            timeout,
        };

        let forced = {
            let mut flaky = self.launcher.flaky.lock().unwrap();
            match flaky.get_mut(url) {
                Some(n) if *n > 0 => {
                    *n -= 1;
                    true
                }
                _ => false,
            }
        };
        if forced {
            return Err(fail());
        }

        let page = match self.launcher.pages.get(url) {
            Some(p) if !p.unreachable => p.clone(),
            _ => return Err(fail()),
        };
        if !page.load_delay.is_zero() {
            tokio::time::sleep(page.load_delay).await;
        }
        self.page = Some(page);
        self.release_batch();
        Ok(())
    }

    async fn wait_for_selector(
        &mut self,
        selector: &str,
        _timeout: Duration,
    ) -> Result<bool, HarvestError> {
        Ok(self
            .page
            .as_ref()
            .is_some_and(|p| p.selectors.iter().any(|s| s == selector)))
    }

    async fn take_responses(&mut self) -> Result<Vec<CapturedResponse>, HarvestError> {
        Ok(std::mem::take(&mut self.pending))
    }

    async fn evaluate(&mut self, _script: &str) -> Result<serde_json::Value, HarvestError> {
        Ok(serde_json::Value::Null)
    }

    async fn scroll(&mut self) -> Result<(), HarvestError> {
        self.release_batch();
        Ok(())
    }

    async fn text(&mut self, selector: &str) -> Result<Option<String>, HarvestError> {
        Ok(self.page.as_ref().and_then(|p| p.texts.get(selector).cloned()))
    }

    async fn attributes(
        &mut self,
        selector: &str,
        _name: &str,
    ) -> Result<Vec<String>, HarvestError> {
        Ok(self
            .page
            .as_ref()
            .and_then(|p| p.attrs.get(selector).cloned())
            .unwrap_or_default())
    }

    async fn current_url(&mut self) -> Result<String, HarvestError> {
        let redirect = self.page.as_ref().and_then(|p| p.redirect.clone());
        Ok(redirect.or_else(|| self.url.clone()).unwrap_or_default())
    }

    async fn close(self: Box<Self>) -> Result<(), HarvestError> {
        self.launcher.stats.closed.fetch_add(1, Ordering::SeqCst);
        self.launcher.stats.active.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A `UserTweets` timeline response listing `ids` in order.
pub(crate) fn timeline_response(ids: &[&str]) -> CapturedResponse {
    let entries: Vec<_> = ids
        .iter()
        .map(|id| {
            json!({
                "entryId": format!("tweet-{id}"),
                "content": {
                    "itemContent": {
                        "tweet_results": { "result": { "rest_id": id } }
                    }
                }
            })
        })
        .collect();
    let body = json!({
        "data": { "user": { "result": { "timeline": { "timeline": {
            "instructions": [
                { "type": "TimelineClearCache" },
                { "type": "TimelineAddEntries", "entries": entries }
            ]
        } } } } }
    });
    CapturedResponse::new(
        "https://x.com/i/api/graphql/abc/UserTweets?variables=%7B%7D",
        body.to_string(),
    )
}

/// A `TweetResultByRestId` response for one tweet.
pub(crate) fn tweet_detail_response(id: &str, text: &str) -> CapturedResponse {
    let body = json!({
        "data": { "tweetResult": { "result": {
            "__typename": "Tweet",
            "rest_id": id,
            "legacy": { "full_text": text, "created_at": "Wed Oct 10 20:19:24 +0000 2018" }
        } } }
    });
    CapturedResponse::new(
        "https://x.com/i/api/graphql/def/TweetResultByRestId?variables=%7B%7D",
        body.to_string(),
    )
}

/// A `UserByScreenName` response.
pub(crate) fn user_response(screen_name: &str) -> CapturedResponse {
    let body = json!({
        "data": { "user": { "result": {
            "__typename": "User",
            "rest_id": "12",
            "legacy": { "screen_name": screen_name, "followers_count": 3 }
        } } }
    });
    CapturedResponse::new(
        "https://x.com/i/api/graphql/ghi/UserByScreenName?variables=%7B%7D",
        body.to_string(),
    )
}
