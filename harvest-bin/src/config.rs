use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tweet_harvest::discover::{DiscoverOptions, DEFAULT_DOMAINS};
use tweet_harvest::fetcher::FetchTimeouts;
use tweet_harvest::webdriver::{BrowserOptions, DEFAULT_DRIVER_ADDR, DEFAULT_USER_AGENT};

#[derive(Deserialize, Debug, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub driver_url: String,
    /// chromedriver binary to start for the duration of the run
    pub driver_path: Option<PathBuf>,
    pub headless: bool,
    pub user_agent: String,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub domains: Vec<String>,
    pub navigation_timeout_secs: u64,
    pub selector_timeout_secs: u64,
    pub profile_timeout_secs: u64,
    pub profile_settle_secs: u64,
    pub scroll_pause_ms: u64,
    /// Log file appended to on every run. Empty disables file logging.
    pub log_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            driver_url: DEFAULT_DRIVER_ADDR.to_owned(),
            driver_path: None,
            headless: true,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            viewport_width: 1280,
            viewport_height: 720,
            domains: DEFAULT_DOMAINS.iter().map(|d| d.to_string()).collect(),
            navigation_timeout_secs: 60,
            selector_timeout_secs: 60,
            profile_timeout_secs: 30,
            profile_settle_secs: 5,
            scroll_pause_ms: 3000,
            log_file: PathBuf::from("harvest.log"),
        }
    }
}

impl Config {
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let conf_contents = std::fs::read_to_string(path.as_ref())?;
        Ok(toml::from_str(&conf_contents)?)
    }

    /// Read `explicit` if given. Otherwise read the default location when it
    /// exists, falling back to built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::read(path).with_context(|| format!("unable to read config {path:?}"));
        }
        match default_config_path() {
            Some(path) if path.exists() => {
                Self::read(&path).with_context(|| format!("unable to read config {path:?}"))
            }
            _ => Ok(Self::default()),
        }
    }

    pub fn browser_options(&self) -> BrowserOptions {
        BrowserOptions {
            driver_url: self.driver_url.clone(),
            headless: self.headless,
            user_agent: self.user_agent.clone(),
            viewport: (self.viewport_width, self.viewport_height),
        }
    }

    pub fn fetch_timeouts(&self) -> FetchTimeouts {
        FetchTimeouts {
            navigation: Duration::from_secs(self.navigation_timeout_secs),
            selector: Duration::from_secs(self.selector_timeout_secs),
        }
    }

    pub fn discover_options(&self) -> DiscoverOptions {
        DiscoverOptions {
            domains: self.domains.clone(),
            navigation_timeout: Duration::from_secs(self.profile_timeout_secs),
            settle: Duration::from_secs(self.profile_settle_secs),
            scroll_pause: Duration::from_millis(self.scroll_pause_ms),
        }
    }

    pub fn log_path(&self) -> Option<&Path> {
        if self.log_file.as_os_str().is_empty() {
            None
        } else {
            Some(self.log_file.as_path())
        }
    }

    /// Base used for bare tweet IDs and the profile page.
    pub fn primary_domain(&self) -> &str {
        self.domains
            .first()
            .map(String::as_str)
            .unwrap_or(DEFAULT_DOMAINS[0])
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "Tweet Harvest")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let conf: Config = toml::from_str(
            r#"
            driver_url = "http://127.0.0.1:4444"
            domains = ["https://twitter.com"]
            scroll_pause_ms = 500
            "#,
        )
        .unwrap();

        assert_eq!(conf.driver_url, "http://127.0.0.1:4444");
        assert_eq!(conf.primary_domain(), "https://twitter.com");
        assert_eq!(conf.discover_options().scroll_pause, Duration::from_millis(500));
        assert!(conf.headless);
        assert_eq!(conf.fetch_timeouts().navigation, Duration::from_secs(60));
        assert_eq!(conf.browser_options().viewport, (1280, 720));
        assert_eq!(conf.log_path(), Some(Path::new("harvest.log")));
    }

    #[test]
    fn log_file_can_be_moved_or_disabled() {
        let conf: Config = toml::from_str("log_file = \"/var/log/harvest/run.log\"").unwrap();
        assert_eq!(conf.log_path(), Some(Path::new("/var/log/harvest/run.log")));

        let conf: Config = toml::from_str("log_file = \"\"").unwrap();
        assert_eq!(conf.log_path(), None);
    }

    #[test]
    fn empty_file_is_default() {
        assert_eq!(toml::from_str::<Config>("").unwrap(), Config::default());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(toml::from_str::<Config>("bearer = \"abc\"").is_err());
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(Config::load(Some(&tmp.path().join("missing.toml"))).is_err());

        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "headless = false\n").unwrap();
        assert!(!Config::load(Some(&path)).unwrap().headless);
    }
}
