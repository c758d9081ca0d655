use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::browser::SessionLauncher;
use crate::coordinator::{CoordinatorOptions, FetchCoordinator};
use crate::discover::{DiscoverOptions, UrlDiscoverer};
use crate::fetcher::{FetchMode, FetchTimeouts, PageFetcher};
use crate::tweet_url::TweetUrl;
use crate::writer::ResultWriter;
use crate::{HarvestError, ProgressBar};

/// Settings for one run, fixed once parsed from the command line.
#[derive(Clone, Debug)]
pub struct HarvestJob {
    pub username: String,
    pub max_tweets: usize,
    pub workers: usize,
    pub output_dir: PathBuf,
    pub retries: usize,
    /// Also fetch and save the user's profile payload.
    pub include_profile: bool,
}

impl HarvestJob {
    pub fn new(username: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            username: username.into(),
            max_tweets: 8,
            workers: 4,
            output_dir: output_dir.into(),
            retries: 0,
            include_profile: false,
        }
    }
}

#[derive(Debug)]
pub struct HarvestOutput {
    pub tweets_path: PathBuf,
    pub profile_path: Option<PathBuf>,
    pub requested: usize,
    pub fetched: usize,
}

/// Discovery, fan-out and persistence wired together over one launcher.
pub struct Harvester<L> {
    fetcher: Arc<PageFetcher<L>>,
    discover: DiscoverOptions,
    backoff: Duration,
}

impl<L: SessionLauncher + 'static> Harvester<L> {
    pub fn new(launcher: L, timeouts: FetchTimeouts, discover: DiscoverOptions) -> Self {
        Self {
            fetcher: Arc::new(PageFetcher::new(launcher, timeouts)),
            discover,
            backoff: Duration::from_secs(1),
        }
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Harvest tweets from the user's profile timeline.
    pub async fn run<PB: ProgressBar>(
        &self,
        job: &HarvestJob,
    ) -> Result<HarvestOutput, HarvestError> {
        info!(username = %job.username, "extracting tweet urls");
        let discoverer = UrlDiscoverer::new(self.fetcher.launcher(), self.discover.clone());
        let urls = discoverer.discover(&job.username, job.max_tweets).await;
        info!(username = %job.username, "found {} tweets", urls.len());

        self.run_urls::<PB>(job, urls).await
    }

    /// Harvest a known list of tweet URLs, skipping discovery.
    pub async fn run_urls<PB: ProgressBar>(
        &self,
        job: &HarvestJob,
        urls: Vec<TweetUrl>,
    ) -> Result<HarvestOutput, HarvestError> {
        if urls.is_empty() {
            let e = HarvestError::NoTweets {
                username: job.username.clone(),
            };
            error!(error = %e, "nothing to fetch");
            return Err(e);
        }

        let writer = ResultWriter::new(&job.output_dir);
        let profile_path = if job.include_profile {
            // Discovered URLs carry the domain that actually rendered
            let base = urls[0].base().to_owned();
            self.save_profile(job, &base, &writer).await?
        } else {
            None
        };

        let requested = urls.len();
        let coordinator = FetchCoordinator::new(
            Arc::clone(&self.fetcher),
            CoordinatorOptions {
                workers: job.workers,
                retries: job.retries,
                backoff: self.backoff,
            },
        );
        let report = coordinator.fetch_all::<PB>(urls).await;
        if !report.failed.is_empty() {
            warn!(count = report.failed.len(), "some tweets could not be fetched");
        }

        let tweets_path = writer.write_tweets(&job.username, &report.results).await?;
        info!(
            count = report.results.len(),
            path = %tweets_path.display(),
            "saved tweets"
        );

        Ok(HarvestOutput {
            tweets_path,
            profile_path,
            requested,
            fetched: report.results.len(),
        })
    }

    async fn save_profile(
        &self,
        job: &HarvestJob,
        base: &str,
        writer: &ResultWriter,
    ) -> Result<Option<PathBuf>, HarvestError> {
        let url = format!("{}/{}", base.trim_end_matches('/'), job.username);

        match self.fetcher.fetch(&url, FetchMode::Profile).await {
            Some(profile) => {
                let path = writer.write_profile(&job.username, &profile).await?;
                info!(path = %path.display(), "saved profile");
                Ok(Some(path))
            }
            None => {
                warn!(url = %url, "profile data unavailable");
                Ok(None)
            }
        }
    }
}
