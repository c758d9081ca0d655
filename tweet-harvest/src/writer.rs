use std::path::PathBuf;

use chrono::{DateTime, Local};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;

use crate::tweet_result::{ResultCollection, TweetResult};
use crate::HarvestError;

const STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Persists harvest output as indented JSON under one directory.
///
/// Files are named `<username>_<kind>_<YYYYMMDD_HHMMSS>.json`. Two writes for the
/// same user and kind within one second share a name and the later one wins.
pub struct ResultWriter {
    output_dir: PathBuf,
}

impl ResultWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn file_path(&self, username: &str, kind: &str, stamp: &DateTime<Local>) -> PathBuf {
        self.output_dir.join(format!(
            "{}_{}_{}.json",
            username,
            kind,
            stamp.format(STAMP_FORMAT)
        ))
    }

    pub async fn write_tweets(
        &self,
        username: &str,
        results: &ResultCollection,
    ) -> Result<PathBuf, HarvestError> {
        self.write_at(username, "tweets", results, Local::now())
            .await
    }

    pub async fn write_profile(
        &self,
        username: &str,
        profile: &TweetResult,
    ) -> Result<PathBuf, HarvestError> {
        self.write_at(username, "profile", profile, Local::now())
            .await
    }

    pub async fn write_at<T: Serialize + ?Sized>(
        &self,
        username: &str,
        kind: &str,
        payload: &T,
        stamp: DateTime<Local>,
    ) -> Result<PathBuf, HarvestError> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|error| HarvestError::Write {
                path: self.output_dir.clone(),
                error,
            })?;

        let mut data = Vec::new();
        let mut serializer =
            serde_json::Serializer::with_formatter(&mut data, PrettyFormatter::with_indent(b"    "));
        payload.serialize(&mut serializer)?;

        let path = self.file_path(username, kind, &stamp);
        tokio::fs::write(&path, data)
            .await
            .map_err(|error| HarvestError::Write {
                path: path.clone(),
                error,
            })?;

        Ok(path)
    }
}

#[cfg(test)]
mod test {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;
    use crate::tweet_result::ReducedTweet;

    fn stamp() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 3, 9, 14, 5, 7).unwrap()
    }

    fn collection() -> ResultCollection {
        let mut results = ResultCollection::new();
        results.insert(
            "1".to_owned(),
            TweetResult::Structured(json!({ "rest_id": "1", "legacy": { "full_text": "a" } })),
        );
        results.insert(
            "2".to_owned(),
            TweetResult::Reduced(ReducedTweet::new("2", "alice", "b".to_owned(), vec![])),
        );
        results
    }

    #[tokio::test]
    async fn creates_directory_and_names_file() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = ResultWriter::new(tmp.path().join("nested").join("out"));

        let path = writer
            .write_at("alice", "tweets", &collection(), stamp())
            .await
            .unwrap();
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "alice_tweets_20250309_140507.json"
        );

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\n    \"1\": {"));
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["1"]["legacy"]["full_text"], "a");
        assert_eq!(parsed["2"]["legacy"]["created_at"], "Unknown date");
    }

    #[tokio::test]
    async fn same_second_overwrites() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = ResultWriter::new(tmp.path());

        let first = writer
            .write_at("alice", "tweets", &collection(), stamp())
            .await
            .unwrap();
        let second = writer
            .write_at("alice", "tweets", &ResultCollection::new(), stamp())
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(std::fs::read_to_string(&second).unwrap(), "{}");
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 1);

        let later = stamp() + chrono::Duration::seconds(1);
        let third = writer
            .write_at("alice", "tweets", &collection(), later)
            .await
            .unwrap();
        assert_ne!(second, third);
    }

    #[tokio::test]
    async fn unwritable_directory_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("file");
        std::fs::write(&blocker, "x").unwrap();
        let writer = ResultWriter::new(blocker.join("out"));

        let err = writer
            .write_tweets("alice", &collection())
            .await
            .unwrap_err();
        assert!(matches!(err, HarvestError::Write { .. }));
    }

    #[tokio::test]
    async fn keeps_completion_order() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = ResultWriter::new(tmp.path());
        let mut results = ResultCollection::new();
        for id in ["1790000000000000001", "987", "1790000000000000000"] {
            results.insert(id.to_owned(), TweetResult::Structured(json!({ "rest_id": id })));
        }

        let path = writer
            .write_at("alice", "tweets", &results, stamp())
            .await
            .unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let positions: Vec<_> = results
            .keys()
            .map(|id| text.find(&format!("\"{id}\": {{")).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }
}
