use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::browser::SessionLauncher;
use crate::fetcher::{FetchMode, PageFetcher};
use crate::tweet_result::{ResultCollection, TweetResult};
use crate::tweet_url::TweetUrl;
use crate::{HarvestError, ProgressBar};

/// Fetches a single tweet. Implementations must not share browser state between
/// concurrent calls.
#[async_trait]
pub trait TweetSource: Send + Sync {
    async fn fetch_tweet(&self, url: &TweetUrl) -> Result<Option<TweetResult>, HarvestError>;
}

#[async_trait]
impl<L: SessionLauncher> TweetSource for PageFetcher<L> {
    async fn fetch_tweet(&self, url: &TweetUrl) -> Result<Option<TweetResult>, HarvestError> {
        self.try_fetch(url.as_str(), FetchMode::Tweet).await
    }
}

/// Work queue filled once before any worker starts.
pub struct TaskQueue {
    urls: Mutex<VecDeque<TweetUrl>>,
}

impl TaskQueue {
    pub fn new(urls: impl IntoIterator<Item = TweetUrl>) -> Self {
        Self {
            urls: Mutex::new(urls.into_iter().collect()),
        }
    }

    /// Never waits; `None` once the queue is drained.
    pub fn try_take(&self) -> Option<TweetUrl> {
        self.urls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }

    pub fn len(&self) -> usize {
        self.urls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Default)]
struct SharedResults {
    results: Mutex<ResultCollection>,
    failed: Mutex<Vec<TweetUrl>>,
}

impl SharedResults {
    fn insert(&self, id: String, result: TweetResult) {
        self.results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, result);
    }

    fn record_failure(&self, url: TweetUrl) {
        self.failed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(url);
    }

    fn take(&self) -> (ResultCollection, Vec<TweetUrl>) {
        let mut results = self.results.lock().unwrap_or_else(PoisonError::into_inner);
        let mut failed = self.failed.lock().unwrap_or_else(PoisonError::into_inner);
        (std::mem::take(&mut *results), std::mem::take(&mut *failed))
    }
}

#[derive(Clone, Debug)]
pub struct CoordinatorOptions {
    pub workers: usize,
    /// Extra attempts per URL after a transient error.
    pub retries: usize,
    /// Delay before the first retry, doubled for each one after.
    pub backoff: Duration,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            workers: 4,
            retries: 0,
            backoff: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Default)]
pub struct FetchReport {
    pub results: ResultCollection,
    /// Number of workers spawned.
    pub workers: usize,
    /// URLs that produced no result.
    pub failed: Vec<TweetUrl>,
}

pub fn effective_workers(requested: usize, urls: usize) -> usize {
    requested.min(urls)
}

/// Spreads tweet URLs over a fixed pool of workers and merges what they fetch.
pub struct FetchCoordinator<S> {
    source: Arc<S>,
    options: CoordinatorOptions,
}

impl<S: TweetSource + 'static> FetchCoordinator<S> {
    pub fn new(source: Arc<S>, options: CoordinatorOptions) -> Self {
        Self { source, options }
    }

    /// Returns once every worker has exited. Failed URLs are left out of the
    /// results and never retried beyond `retries`.
    pub async fn fetch_all<PB: ProgressBar>(&self, urls: Vec<TweetUrl>) -> FetchReport {
        let workers = effective_workers(self.options.workers, urls.len());
        if workers == 0 {
            return FetchReport::default();
        }

        let pb = Arc::new(PB::init(urls.len(), "Fetching tweets"));
        let queue = Arc::new(TaskQueue::new(urls));
        let shared = Arc::new(SharedResults::default());

        let mut set = JoinSet::new();
        for id in 0..workers {
            let worker = Worker {
                id,
                source: Arc::clone(&self.source),
                queue: Arc::clone(&queue),
                shared: Arc::clone(&shared),
                pb: Arc::clone(&pb),
                retries: self.options.retries,
                backoff: self.options.backoff,
            };
            set.spawn(worker.run());
        }
        while let Some(joined) = set.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "worker exited abnormally");
            }
        }

        if let Ok(pb) = Arc::try_unwrap(pb) {
            pb.destroy();
        }
        let (results, failed) = shared.take();
        FetchReport {
            results,
            workers,
            failed,
        }
    }
}

struct Worker<S, PB> {
    id: usize,
    source: Arc<S>,
    queue: Arc<TaskQueue>,
    shared: Arc<SharedResults>,
    pb: Arc<PB>,
    retries: usize,
    backoff: Duration,
}

impl<S: TweetSource, PB: ProgressBar> Worker<S, PB> {
    async fn run(self) {
        let worker = self.id;
        info!(worker, "worker started");

        while let Some(url) = self.queue.try_take() {
            info!(worker, url = %url, "processing");
            let outcome = AssertUnwindSafe(self.fetch_with_retry(&url))
                .catch_unwind()
                .await;
            match outcome {
                Ok(Ok(Some(result))) => {
                    self.shared.insert(url.tweet_id().to_owned(), result);
                    info!(worker, url = %url, "completed");
                }
                Ok(Ok(None)) => {
                    warn!(worker, url = %url, "no data for tweet");
                    self.shared.record_failure(url);
                }
                Ok(Err(e)) => {
                    error!(worker, url = %url, error = %e, "failed to fetch tweet");
                    self.shared.record_failure(url);
                }
                Err(_) => {
                    error!(worker, url = %url, "fetch panicked");
                    self.shared.record_failure(url);
                }
            }
            self.pb.increment();
        }

        info!(worker, "worker finished");
    }

    async fn fetch_with_retry(&self, url: &TweetUrl) -> Result<Option<TweetResult>, HarvestError> {
        let mut attempt = 0;
        loop {
            match self.source.fetch_tweet(url).await {
                Err(e) if e.is_transient() && attempt < self.retries => {
                    let delay = self.backoff.saturating_mul(1 << attempt.min(16));
                    warn!(worker = self.id, url = %url, error = %e, ?delay, "retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}
