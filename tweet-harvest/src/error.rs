use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarvestError {
    #[error("unable to launch browser session: {msg}")]
    Launch { msg: String },

    #[error("unable to load {url} within {timeout:?}")]
    FetchTimeout { url: String, timeout: Duration },

    #[error("selector {selector} never rendered on {url}")]
    SelectorNotFound { url: String, selector: String },

    #[error("malformed response from {url}: {msg}")]
    MalformedResponse { url: String, msg: String },

    #[error("browser error: {msg}")]
    Browser { msg: String },

    #[error("unable to load profile for user: {username}")]
    ProfileLoad { username: String },

    #[error("invalid tweet url: {url}")]
    InvalidUrl { url: String },

    #[error("no tweets found for user: {username}")]
    NoTweets { username: String },

    #[error("unable to write {path:?}: {error}")]
    Write {
        path: PathBuf,
        error: std::io::Error,
    },

    #[error("unable to serialize results: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl From<thirtyfour::error::WebDriverError> for HarvestError {
    fn from(e: thirtyfour::error::WebDriverError) -> Self {
        Self::Browser { msg: e.to_string() }
    }
}

impl HarvestError {
    /// Errors that may clear up on a later attempt at the same URL.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Launch { .. } | Self::FetchTimeout { .. } | Self::Browser { .. }
        )
    }
}
