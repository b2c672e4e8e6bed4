// Public modules
pub mod archive;
pub mod config;
pub mod digest;
pub mod error;
pub mod extractor;
pub mod hackernews;
pub mod logging;
pub mod mailer;
pub mod models;
pub mod render;
pub mod summarizer;

// Re-export commonly used types
pub use archive::{Archive, ArchiveEntry};
pub use config::{Config, MailConfig};
pub use digest::DigestAssembler;
pub use error::{ExtractError, LlmError, MailError};
pub use extractor::{ArticleExtractor, ContentExtractor};
pub use hackernews::{HackerNewsClient, Item, ItemSource};
pub use mailer::{validate_email, MailgunClient, SubscribeOutcome};
pub use models::{DigestDocument, StoryRecord};
pub use render::DigestRenderer;
pub use summarizer::{ChatClient, CompletionBackend, Summarizer, SummaryMode};
