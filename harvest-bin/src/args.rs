use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, ValueHint};
use tweet_harvest::webdriver::WebDriverLauncher;
use tweet_harvest::{HarvestJob, HarvestOutput, Harvester, ProgressBar, TweetUrl};

use crate::config::Config;
use crate::driver::DriverProcess;

/// Harvest a user's tweets through a headless browser and save them as JSON.
#[derive(Parser, Debug)]
#[command(name = "harvest", version, about)]
pub struct Args {
    /// Username whose tweets to harvest.
    #[arg(short, long)]
    pub username: String,

    /// Directory to write results to.
    #[arg(short, long, default_value = "tweets", value_hint = ValueHint::DirPath)]
    pub output: PathBuf,

    /// Number of tweets fetched concurrently.
    #[arg(short, long, default_value_t = 4, value_parser = parse_positive)]
    pub workers: usize,

    /// Maximum number of tweets to collect from the profile.
    #[arg(short, long, default_value_t = 8, value_parser = parse_positive)]
    pub max: usize,

    /// Fetch these tweets instead of reading the profile, 1 tweet ID or URL per line.
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub input: Option<PathBuf>,

    /// Also save the user's profile data.
    #[arg(long)]
    pub profile: bool,

    /// Extra attempts per tweet after a timeout or browser error.
    #[arg(long, default_value_t = 0)]
    pub retries: usize,

    /// Config file location.
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,
}

fn parse_positive(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_owned()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

impl Args {
    pub fn job(&self) -> HarvestJob {
        HarvestJob {
            max_tweets: self.max,
            workers: self.workers,
            retries: self.retries,
            include_profile: self.profile,
            ..HarvestJob::new(&self.username, &self.output)
        }
    }

    /// Run the harvest. `config` is normally loaded from [`Args::config`].
    pub async fn harvest<PB: ProgressBar>(&self, config: &Config) -> Result<HarvestOutput> {
        let job = self.job();

        let preset = match &self.input {
            Some(path) => Some(read_input(path, config.primary_domain(), &self.username).await?),
            None => None,
        };

        let launcher = WebDriverLauncher::new(config.browser_options());
        let _driver = match &config.driver_path {
            Some(path) => Some(DriverProcess::spawn(path, &config.driver_url, &launcher).await?),
            None => None,
        };

        let harvester =
            Harvester::new(launcher, config.fetch_timeouts(), config.discover_options());
        let output = match preset {
            Some(urls) => harvester.run_urls::<PB>(&job, urls).await?,
            None => harvester.run::<PB>(&job).await?,
        };

        Ok(output)
    }
}

/// Read tweet IDs or URLs, one per line. Blank lines are skipped and any other
/// unparseable line fails the whole file.
pub async fn read_input(path: &Path, base: &str, username: &str) -> Result<Vec<TweetUrl>> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("unable to read {path:?}"))?;

    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| TweetUrl::parse(line, base, username).map_err(Into::into))
        .collect()
}
