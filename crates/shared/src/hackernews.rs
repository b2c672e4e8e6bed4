use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

pub const DEFAULT_API_BASE: &str = "https://hacker-news.firebaseio.com/v0";

/// A story or comment as returned by `/item/{id}`. Every field may be missing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Item {
    pub id: u64,
    pub title: Option<String>,
    pub url: Option<String>,
    pub score: Option<u64>,
    pub by: Option<String>,
    pub kids: Vec<u64>,
    pub text: Option<String>,
    pub deleted: bool,
    pub dead: bool,
}

/// Discussion page for a story; derived from the ID alone.
pub fn comments_url(id: u64) -> String {
    format!("https://news.ycombinator.com/item?id={}", id)
}

/// Read access to ranked story IDs and items.
#[async_trait]
pub trait ItemSource: Send + Sync {
    /// The first `count` IDs of the front page, in rank order.
    async fn top_stories(&self, count: usize) -> Result<Vec<u64>>;

    /// `Ok(None)` when the API answers `null` (unknown or purged item).
    async fn item(&self, id: u64) -> Result<Option<Item>>;
}

pub struct HackerNewsClient {
    client: Client,
    api_base: String,
}

impl HackerNewsClient {
    pub fn new() -> Result<Self> {
        Self::with_base(DEFAULT_API_BASE)
    }

    pub fn with_base(api_base: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}/{}", self.api_base, path);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", url))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("unknown error"));
            anyhow::bail!("Hacker News API returned error: {} - {}", status, error_text);
        }

        response
            .json::<T>()
            .await
            .with_context(|| format!("Failed to parse Hacker News response from {}", url))
    }
}

#[async_trait]
impl ItemSource for HackerNewsClient {
    async fn top_stories(&self, count: usize) -> Result<Vec<u64>> {
        let mut ids: Vec<u64> = self.get_json("topstories.json").await?;
        ids.truncate(count);
        Ok(ids)
    }

    async fn item(&self, id: u64) -> Result<Option<Item>> {
        self.get_json(&format!("item/{}.json", id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comments_url() {
        assert_eq!(comments_url(42), "https://news.ycombinator.com/item?id=42");
    }

    #[test]
    fn test_item_missing_fields_deserialize() {
        let item: Item = serde_json::from_str(r#"{"id": 1}"#).unwrap();
        assert_eq!(item.title, None);
        assert_eq!(item.score, None);
        assert!(item.kids.is_empty());
        assert!(!item.deleted);
    }

    #[test]
    fn test_item_full_story_deserialize() {
        let json = r#"{
            "by": "dhouston",
            "descendants": 71,
            "id": 8863,
            "kids": [8952, 9224],
            "score": 111,
            "time": 1175714200,
            "title": "My YC app: Dropbox",
            "type": "story",
            "url": "http://www.getdropbox.com/u/2/screencast.html"
        }"#;
        let item: Item = serde_json::from_str(json).unwrap();
        assert_eq!(item.by.as_deref(), Some("dhouston"));
        assert_eq!(item.kids, vec![8952, 9224]);
        assert_eq!(item.score, Some(111));
    }

    #[test]
    fn test_null_item_is_none() {
        let item: Option<Item> = serde_json::from_str("null").unwrap();
        assert!(item.is_none());
    }

    #[test]
    fn test_base_trailing_slash_trimmed() {
        let client = HackerNewsClient::with_base("http://localhost:1/v0/").unwrap();
        assert_eq!(client.api_base, "http://localhost:1/v0");
    }
}
