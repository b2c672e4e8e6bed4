use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::extractor::ArticleExtractor;
use crate::hackernews::{comments_url, Item, ItemSource};
use crate::models::StoryRecord;
use crate::summarizer::{CompletionBackend, Summarizer, SummaryMode};

/// Wide enough that html2text never wraps a comment mid-sentence.
const COMMENT_TEXT_WIDTH: usize = 1000;

/// Builds one `StoryRecord` per top story: metadata, article summary, comment summary.
pub struct DigestAssembler<S, E, B> {
    source: S,
    extractor: E,
    summarizer: Summarizer<B>,
    concurrency: usize,
}

impl<S, E, B> DigestAssembler<S, E, B>
where
    S: ItemSource,
    E: ArticleExtractor,
    B: CompletionBackend,
{
    pub fn new(source: S, extractor: E, summarizer: Summarizer<B>) -> Self {
        Self {
            source,
            extractor,
            summarizer,
            concurrency: 1,
        }
    }

    /// Number of stories processed at once. 1 keeps the run strictly sequential;
    /// output stays in rank order either way.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Records for the top `count` stories, in the API's rank order.
    ///
    /// Stories whose metadata cannot be fetched are skipped, not fatal.
    pub async fn assemble(&self, count: usize) -> Result<Vec<StoryRecord>> {
        let ids = self
            .source
            .top_stories(count)
            .await
            .context("Failed to fetch top stories")?;
        let total = ids.len();
        info!(total, "Assembling digest");

        let records: Vec<Option<StoryRecord>> = stream::iter(ids.into_iter().enumerate())
            .map(|(index, id)| self.build_story(index + 1, total, id))
            .buffered(self.concurrency)
            .collect()
            .await;

        let records: Vec<StoryRecord> = records.into_iter().flatten().collect();
        info!(
            assembled = records.len(),
            skipped = total - records.len(),
            "Digest assembled"
        );
        Ok(records)
    }

    async fn build_story(&self, position: usize, total: usize, id: u64) -> Option<StoryRecord> {
        info!("[{}/{}] Processing story {}", position, total, id);

        let item = match self.source.item(id).await {
            Ok(Some(item)) => item,
            Ok(None) => {
                warn!(story_id = id, "Story not found; skipping");
                return None;
            }
            Err(e) => {
                warn!(story_id = id, error = %e, "Failed to fetch story metadata; skipping");
                return None;
            }
        };

        let url = item.url.clone().unwrap_or_default();
        let post_summary = if url.is_empty() {
            None
        } else {
            match self.extractor.extract(&url).await {
                Some(content) => self.summarizer.summarize(&content, SummaryMode::Article).await,
                None => None,
            }
        };

        let comments = self.collect_comments(&item.kids).await;
        let comment_summary = self
            .summarizer
            .summarize(&comments, SummaryMode::Comments)
            .await;

        Some(story_record(id, item, post_summary, comment_summary))
    }

    /// Text of each first-level reply, one per line. Replies to replies are not fetched.
    async fn collect_comments(&self, ids: &[u64]) -> String {
        let mut all_comments = String::new();

        for &comment_id in ids {
            match self.source.item(comment_id).await {
                Ok(Some(comment)) => {
                    if let Some(text) = comment_text(&comment) {
                        all_comments.push_str(&text);
                        all_comments.push('\n');
                    }
                }
                Ok(None) => debug!(comment_id, "Comment missing"),
                Err(e) => warn!(comment_id, error = %e, "Failed to fetch comment"),
            }
        }

        all_comments
    }
}

/// Plain text of a live comment, or `None` for deleted, dead or empty ones.
fn comment_text(comment: &Item) -> Option<String> {
    if comment.deleted || comment.dead {
        return None;
    }
    let html = comment.text.as_deref()?;
    let text = html2text::from_read(html.as_bytes(), COMMENT_TEXT_WIDTH);
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// Apply field defaults. `comments_count` is the number of direct child IDs.
fn story_record(
    id: u64,
    item: Item,
    post_summary: Option<String>,
    comment_summary: Option<String>,
) -> StoryRecord {
    StoryRecord {
        id,
        title: item.title.unwrap_or_else(|| "No Title".to_string()),
        url: item.url.unwrap_or_default(),
        comments_url: comments_url(id),
        points: item.score.unwrap_or(0),
        author: item.by.unwrap_or_else(|| "unknown".to_string()),
        comments_count: item.kids.len(),
        post_summary,
        comment_summary,
    }
}
