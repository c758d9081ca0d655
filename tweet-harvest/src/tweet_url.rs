use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::HarvestError;

/// Address of a single tweet: `<base>/<username>/status/<id>`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TweetUrl(String);

impl TweetUrl {
    pub fn new(base: &str, username: &str, id: &str) -> Self {
        Self(format!(
            "{}/{}/status/{}",
            base.trim_end_matches('/'),
            username,
            id
        ))
    }

    /// Accept either a bare numeric tweet ID or a full status URL. Bare IDs are
    /// placed under `base` and `username`.
    pub fn parse(input: &str, base: &str, username: &str) -> Result<Self, HarvestError> {
        static STATUS_RE: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r"^/(?P<user>[^/]+)/status/(?P<id>\d+)/?$").unwrap());

        let input = input.trim();
        let invalid = || HarvestError::InvalidUrl {
            url: input.to_owned(),
        };

        if !input.is_empty() && input.chars().all(|c| c.is_ascii_digit()) {
            return Ok(Self::new(base, username, input));
        }

        let url = Url::parse(input).map_err(|_| invalid())?;
        let host = url.host_str().ok_or_else(invalid)?;
        let caps = STATUS_RE.captures(url.path()).ok_or_else(invalid)?;
        let origin = format!("{}://{}", url.scheme(), host);
        Ok(Self::new(&origin, &caps["user"], &caps["id"]))
    }

    /// The tweet identifier, taken from the trailing path segment.
    pub fn tweet_id(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or_default()
    }

    /// The username segment, third from the end.
    pub fn username(&self) -> Option<&str> {
        self.0.rsplit('/').nth(2)
    }

    /// Scheme and host the tweet lives under, e.g. `https://x.com`.
    pub fn base(&self) -> &str {
        self.0.rsplitn(4, '/').nth(3).unwrap_or_default()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TweetUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TweetUrl {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
