use chrono::NaiveDate;

/// Placeholder the mailing-list provider swaps for each recipient's unsubscribe link.
pub const UNSUBSCRIBE_PLACEHOLDER: &str = "%mailing_list_unsubscribe_url%";

/// One story in a digest, assembled once per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryRecord {
    pub id: u64,
    pub title: String,
    pub url: String,
    pub comments_url: String,
    pub points: u64,
    pub author: String,
    /// Number of first-level replies, not the full thread size.
    pub comments_count: usize,
    pub post_summary: Option<String>,
    pub comment_summary: Option<String>,
}

impl StoryRecord {
    /// Link used for the headline: the article, or the discussion when there is none.
    pub fn headline_url(&self) -> &str {
        if self.url.is_empty() {
            &self.comments_url
        } else {
            &self.url
        }
    }
}

/// The unit rendered, archived and mailed.
#[derive(Debug, Clone)]
pub struct DigestDocument {
    pub date: NaiveDate,
    pub stories: Vec<StoryRecord>,
    pub unsubscribe_url: String,
}

impl DigestDocument {
    pub fn new(date: NaiveDate, stories: Vec<StoryRecord>) -> Self {
        Self {
            date,
            stories,
            unsubscribe_url: UNSUBSCRIBE_PLACEHOLDER.to_string(),
        }
    }

    /// e.g. "March 15, 2024"
    pub fn display_date(&self) -> String {
        self.date.format("%B %d, %Y").to_string()
    }

    pub fn subject(&self) -> String {
        format!("HackerNews Digest - {}", self.display_date())
    }
}
