pub mod browser;
pub mod coordinator;
pub mod discover;
mod error;
pub mod fetcher;
mod harvest;
mod progress_bar;
mod tweet_result;
mod tweet_url;
pub mod webdriver;
mod writer;

#[cfg(test)]
mod mock;

pub use error::HarvestError;
pub use harvest::{HarvestJob, HarvestOutput, Harvester};
pub use progress_bar::{NoProgress, ProgressBar};
pub use tweet_result::{ReducedTweet, ResultCollection, TweetResult};
pub use tweet_url::TweetUrl;
pub use writer::ResultWriter;
