use indexmap::IndexMap;
use serde::Serialize;

/// One fetched payload. Both variants serialize to the platform's tweet shape, so
/// consumers of the written file never need to know which path produced it.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum TweetResult {
    /// Result object lifted verbatim from the platform's API response.
    Structured(serde_json::Value),
    /// Best-effort payload scraped from the rendered page.
    Reduced(ReducedTweet),
}

impl TweetResult {
    pub fn is_reduced(&self) -> bool {
        matches!(self, Self::Reduced(_))
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Structured(v) => v.clone(),
            // Plain structs of strings always serialize
            Self::Reduced(r) => serde_json::to_value(r).unwrap_or_default(),
        }
    }
}

/// Map from tweet identifier to its payload for a single run, in the order the
/// fetches completed.
pub type ResultCollection = IndexMap<String, TweetResult>;

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ReducedTweet {
    pub rest_id: String,
    pub legacy: ReducedLegacy,
    pub core: ReducedCore,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ReducedLegacy {
    pub full_text: String,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entities: Option<ReducedEntities>,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ReducedEntities {
    pub media: Vec<ReducedMedia>,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ReducedMedia {
    #[serde(rename = "type")]
    pub media_type: String,
    pub media_url_https: String,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ReducedCore {
    pub user_results: ReducedUserResults,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ReducedUserResults {
    pub result: ReducedUserResult,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ReducedUserResult {
    pub legacy: ReducedUser,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ReducedUser {
    pub name: String,
    pub screen_name: String,
}

impl ReducedTweet {
    pub const UNKNOWN_DATE: &'static str = "Unknown date";

    pub fn new(id: &str, username: &str, text: String, media_urls: Vec<String>) -> Self {
        let entities = (!media_urls.is_empty()).then(|| ReducedEntities {
            media: media_urls
                .into_iter()
                .map(|url| ReducedMedia {
                    media_type: "photo".to_owned(),
                    media_url_https: url,
                })
                .collect(),
        });

        Self {
            rest_id: id.to_owned(),
            legacy: ReducedLegacy {
                full_text: text,
                created_at: Self::UNKNOWN_DATE.to_owned(),
                entities,
            },
            core: ReducedCore {
                user_results: ReducedUserResults {
                    result: ReducedUserResult {
                        legacy: ReducedUser {
                            name: username.to_owned(),
                            screen_name: username.to_owned(),
                        },
                    },
                },
            },
        }
    }
}
