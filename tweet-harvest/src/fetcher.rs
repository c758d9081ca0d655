use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use crate::browser::{BrowserSession, CapturedResponse, SessionLauncher};
use crate::tweet_result::{ReducedTweet, TweetResult};
use crate::HarvestError;

const TWEET_TEXT_SELECTOR: &str = "[data-testid='tweetText']";
const MEDIA_SELECTOR: &str = "img[src*='pbs.twimg.com/media']";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchMode {
    Profile,
    Tweet,
}

impl FetchMode {
    /// Element whose presence means client-side rendering finished.
    pub fn marker_selector(self) -> &'static str {
        match self {
            Self::Profile => "[data-testid='primaryColumn']",
            Self::Tweet => "[data-testid='tweet']",
        }
    }

    /// Substring of the request URL of the API call carrying the payload.
    pub fn response_marker(self) -> &'static str {
        match self {
            Self::Profile => "UserBy",
            Self::Tweet => "TweetResultByRestId",
        }
    }

    fn result_pointer(self) -> &'static str {
        match self {
            Self::Profile => "/data/user/result",
            Self::Tweet => "/data/tweetResult/result",
        }
    }
}

#[derive(Clone, Debug)]
pub struct FetchTimeouts {
    pub navigation: Duration,
    pub selector: Duration,
}

impl Default for FetchTimeouts {
    fn default() -> Self {
        Self {
            navigation: Duration::from_secs(60),
            selector: Duration::from_secs(60),
        }
    }
}

/// Loads one URL in its own browser session and pulls the platform payload out of
/// the page's background API traffic.
pub struct PageFetcher<L> {
    launcher: L,
    timeouts: FetchTimeouts,
}

impl<L: SessionLauncher> PageFetcher<L> {
    pub fn new(launcher: L, timeouts: FetchTimeouts) -> Self {
        Self { launcher, timeouts }
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    /// Like [`PageFetcher::try_fetch`], but every failure becomes `None`.
    pub async fn fetch(&self, url: &str, mode: FetchMode) -> Option<TweetResult> {
        match self.try_fetch(url, mode).await {
            Ok(result) => result,
            Err(e) => {
                warn!(url, error = %e, "fetch failed");
                None
            }
        }
    }

    /// `Ok(None)` means the page loaded but carried no usable data.
    pub async fn try_fetch(
        &self,
        url: &str,
        mode: FetchMode,
    ) -> Result<Option<TweetResult>, HarvestError> {
        let start = Instant::now();
        let result = self.fetch_in_new_session(url, mode).await;
        info!(url, elapsed = ?start.elapsed(), "fetch finished");
        result
    }

    async fn fetch_in_new_session(
        &self,
        url: &str,
        mode: FetchMode,
    ) -> Result<Option<TweetResult>, HarvestError> {
        let mut session = self.launcher.launch().await?;
        let result = self.fetch_in(session.as_mut(), url, mode).await;
        if let Err(e) = session.close().await {
            warn!(url, error = %e, "failed to close browser session");
        }
        result
    }

    async fn fetch_in(
        &self,
        session: &mut dyn BrowserSession,
        url: &str,
        mode: FetchMode,
    ) -> Result<Option<TweetResult>, HarvestError> {
        info!(url, "navigating");
        session.navigate(url, self.timeouts.navigation).await?;

        match session.current_url().await {
            Ok(current) if current != url => info!(url, redirected_to = %current, "redirected"),
            _ => {}
        }

        let selector = mode.marker_selector();
        if !session
            .wait_for_selector(selector, self.timeouts.selector)
            .await?
        {
            let e = HarvestError::SelectorNotFound {
                url: url.to_owned(),
                selector: selector.to_owned(),
            };
            warn!(error = %e, "no data available");
            return Ok(None);
        }

        let candidates: Vec<_> = session
            .take_responses()
            .await?
            .into_iter()
            .filter(|r| r.url.contains(mode.response_marker()))
            .collect();
        if candidates.is_empty() {
            warn!(url, "no matching api responses");
        }

        for candidate in &candidates {
            match extract_result(candidate, mode) {
                Ok(value) => return Ok(Some(TweetResult::Structured(value))),
                Err(e) => warn!(error = %e, "skipping response"),
            }
        }

        if mode == FetchMode::Tweet {
            return Ok(dom_fallback(session, url).await);
        }
        Ok(None)
    }
}

/// Parse a captured response and lift out the result object for `mode`.
pub fn extract_result(
    response: &CapturedResponse,
    mode: FetchMode,
) -> Result<serde_json::Value, HarvestError> {
    let malformed = |msg: String| HarvestError::MalformedResponse {
        url: response.url.clone(),
        msg,
    };

    let mut value: serde_json::Value =
        serde_json::from_str(&response.body).map_err(|e| malformed(e.to_string()))?;
    match value.pointer_mut(mode.result_pointer()) {
        Some(result) if !result.is_null() => Ok(result.take()),
        _ => Err(malformed(format!("missing {}", mode.result_pointer()))),
    }
}

async fn dom_fallback(session: &mut dyn BrowserSession, url: &str) -> Option<TweetResult> {
    info!(url, "extracting tweet from rendered page");
    match reduced_from_page(session, url).await {
        Ok(reduced) => Some(TweetResult::Reduced(reduced)),
        Err(e) => {
            error!(url, error = %e, "unable to extract tweet from page");
            None
        }
    }
}

async fn reduced_from_page(
    session: &mut dyn BrowserSession,
    url: &str,
) -> Result<ReducedTweet, HarvestError> {
    let text = session.text(TWEET_TEXT_SELECTOR).await?.unwrap_or_default();
    let media = session.attributes(MEDIA_SELECTOR, "src").await?;

    let mut segments = url.trim_end_matches('/').rsplit('/');
    let id = segments.next().unwrap_or_default();
    let username = segments.nth(1).unwrap_or_default();

    Ok(ReducedTweet::new(id, username, text, media))
}
