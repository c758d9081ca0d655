use std::time::Duration;

use serde::Deserialize;
use tracing::{error, info, warn};

use crate::browser::{BrowserSession, CapturedResponse, SessionLauncher};
use crate::fetcher::FetchMode;
use crate::tweet_url::TweetUrl;
use crate::HarvestError;

const TIMELINE_MARKER: &str = "UserTweets";
const MAX_SCROLLS: usize = 10;

pub const DEFAULT_DOMAINS: [&str; 2] = ["https://x.com", "https://twitter.com"];

#[derive(Clone, Debug)]
pub struct DiscoverOptions {
    /// Candidate bases tried in order; the first that renders a profile is used.
    pub domains: Vec<String>,
    pub navigation_timeout: Duration,
    /// How long to wait for the profile to render after navigation.
    pub settle: Duration,
    pub scroll_pause: Duration,
}

impl Default for DiscoverOptions {
    fn default() -> Self {
        Self {
            domains: DEFAULT_DOMAINS.iter().map(|d| d.to_string()).collect(),
            navigation_timeout: Duration::from_secs(30),
            settle: Duration::from_secs(5),
            scroll_pause: Duration::from_secs(3),
        }
    }
}

/// Number of scrolls attempted for `max_tweets`. Each scroll usually loads
/// several tweets.
pub fn scroll_budget(max_tweets: usize) -> usize {
    (max_tweets / 10 + 1).min(MAX_SCROLLS)
}

/// Scrolls a user's profile and collects tweet URLs from the timeline responses.
pub struct UrlDiscoverer<'a, L> {
    launcher: &'a L,
    options: DiscoverOptions,
}

impl<'a, L: SessionLauncher> UrlDiscoverer<'a, L> {
    pub fn new(launcher: &'a L, options: DiscoverOptions) -> Self {
        Self { launcher, options }
    }

    /// Unique tweet URLs in first-seen order, at most `max_tweets` of them. An
    /// unloadable profile yields an empty list.
    pub async fn discover(&self, username: &str, max_tweets: usize) -> Vec<TweetUrl> {
        if max_tweets == 0 {
            return Vec::new();
        }

        let mut session = match self.launcher.launch().await {
            Ok(s) => s,
            Err(e) => {
                error!(username, error = %e, "unable to start discovery");
                return Vec::new();
            }
        };
        let urls = self.discover_in(session.as_mut(), username, max_tweets).await;
        if let Err(e) = session.close().await {
            warn!(username, error = %e, "failed to close browser session");
        }
        urls
    }

    async fn discover_in(
        &self,
        session: &mut dyn BrowserSession,
        username: &str,
        max_tweets: usize,
    ) -> Vec<TweetUrl> {
        let base = match self.load_profile(session, username).await {
            Ok(base) => base,
            Err(e) => {
                error!(error = %e, "profile did not load");
                return Vec::new();
            }
        };
        info!(base = %base, "using base url");

        let mut urls: Vec<TweetUrl> = Vec::new();
        let scrolls = scroll_budget(max_tweets);
        for i in 0..scrolls {
            info!(username, "scroll {}/{}", i + 1, scrolls);
            if self
                .collect(session, &base, username, max_tweets, &mut urls)
                .await
            {
                return urls;
            }

            if let Err(e) = session.scroll().await {
                warn!(error = %e, "scroll failed");
            }
            tokio::time::sleep(self.options.scroll_pause).await;
        }

        // Pick up whatever the last scroll loaded
        self.collect(session, &base, username, max_tweets, &mut urls)
            .await;
        urls
    }

    /// Drain captured responses into `urls`. Returns true once `max_tweets` is reached.
    async fn collect(
        &self,
        session: &mut dyn BrowserSession,
        base: &str,
        username: &str,
        max_tweets: usize,
        urls: &mut Vec<TweetUrl>,
    ) -> bool {
        // Draining the buffer also resets it for the next round
        let responses = match session.take_responses().await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "unable to read captured responses");
                return false;
            }
        };

        for id in timeline_ids(&responses) {
            let url = TweetUrl::new(base, username, &id);
            if urls.contains(&url) {
                continue;
            }
            info!(url = %url, "found tweet");
            urls.push(url);
            if urls.len() >= max_tweets {
                return true;
            }
        }
        false
    }

    async fn load_profile(
        &self,
        session: &mut dyn BrowserSession,
        username: &str,
    ) -> Result<String, HarvestError> {
        let selector = FetchMode::Profile.marker_selector();
        for base in &self.options.domains {
            let base = base.trim_end_matches('/');
            let url = format!("{base}/{username}");
            info!(url = %url, "trying profile");

            if let Err(e) = session
                .navigate(&url, self.options.navigation_timeout)
                .await
            {
                warn!(url = %url, error = %e, "failed to load profile");
                continue;
            }
            match session.wait_for_selector(selector, self.options.settle).await {
                Ok(true) => {
                    info!(url = %url, "loaded profile");
                    return Ok(base.to_owned());
                }
                Ok(false) => warn!(url = %url, "profile did not render"),
                Err(e) => warn!(url = %url, error = %e, "failed to inspect profile"),
            }
        }

        Err(HarvestError::ProfileLoad {
            username: username.to_owned(),
        })
    }
}

/// Tweet IDs from every timeline response in `responses`, in order of appearance.
/// Responses that fail to parse are logged and skipped.
pub fn timeline_ids(responses: &[CapturedResponse]) -> Vec<String> {
    responses
        .iter()
        .filter(|r| r.url.contains(TIMELINE_MARKER))
        .flat_map(|r| match parse_timeline(r) {
            Ok(ids) => ids,
            Err(e) => {
                warn!(error = %e, "skipping timeline response");
                Vec::new()
            }
        })
        .collect()
}

fn parse_timeline(response: &CapturedResponse) -> Result<Vec<String>, HarvestError> {
    let parsed: TimelineResponse =
        serde_json::from_str(&response.body).map_err(|e| HarvestError::MalformedResponse {
            url: response.url.clone(),
            msg: e.to_string(),
        })?;

    let Some(user) = parsed.data.user.and_then(|u| u.result) else {
        return Ok(Vec::new());
    };
    let ids = user
        .timeline
        .timeline
        .instructions
        .into_iter()
        .flat_map(|i| i.entries)
        .filter_map(|entry| entry.content?.item_content?.tweet_results?.result?.into_rest_id())
        .collect();
    Ok(ids)
}

#[derive(Deserialize, Debug)]
struct TimelineResponse {
    data: TimelineData,
}

#[derive(Deserialize, Debug)]
struct TimelineData {
    user: Option<TimelineUser>,
}

#[derive(Deserialize, Debug)]
struct TimelineUser {
    result: Option<TimelineUserResult>,
}

#[derive(Deserialize, Debug)]
struct TimelineUserResult {
    #[serde(alias = "timeline_v2")]
    timeline: TimelineWrapper,
}

#[derive(Deserialize, Debug)]
struct TimelineWrapper {
    timeline: Timeline,
}

#[derive(Deserialize, Debug)]
struct Timeline {
    #[serde(default)]
    instructions: Vec<TimelineInstruction>,
}

#[derive(Deserialize, Debug)]
struct TimelineInstruction {
    #[serde(default)]
    entries: Vec<TimelineEntry>,
}

#[derive(Deserialize, Debug)]
struct TimelineEntry {
    content: Option<EntryContent>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct EntryContent {
    item_content: Option<ItemContent>,
}

#[derive(Deserialize, Debug)]
struct ItemContent {
    tweet_results: Option<TweetResults>,
}

#[derive(Deserialize, Debug)]
struct TweetResults {
    result: Option<TweetStub>,
}

#[derive(Deserialize, Debug)]
struct TweetStub {
    rest_id: Option<String>,
    // Present on TweetWithVisibilityResults
    tweet: Option<Box<TweetStub>>,
}

impl TweetStub {
    fn into_rest_id(self) -> Option<String> {
        match self.rest_id {
            Some(id) => Some(id),
            None => self.tweet?.into_rest_id(),
        }
    }
}
