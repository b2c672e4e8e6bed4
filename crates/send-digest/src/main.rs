use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use shared::{
    config, logging, Archive, ChatClient, Config, ContentExtractor, DigestAssembler,
    DigestDocument, DigestRenderer, HackerNewsClient, MailConfig, MailgunClient, Summarizer,
};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "send-digest")]
#[command(about = "Summarize today's top Hacker News stories, archive the digest and mail it to subscribers")]
struct Args {
    /// Number of top stories to include
    #[arg(short, long, default_value = "10")]
    count: usize,

    /// Directory for archived digests (default: DIGEST_ARCHIVE_DIR or the local data dir)
    #[arg(short, long)]
    archive_dir: Option<PathBuf>,

    /// Stories processed at once; output keeps rank order
    #[arg(long, default_value = "1")]
    concurrency: usize,

    /// Build and archive the digest without mailing it
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_tracing("info");
    let args = Args::parse();
    let started = Instant::now();

    let config = Config::from_env()?;
    // Fail before spending model calls if mail is not configured.
    let mail_config = if args.dry_run {
        None
    } else {
        Some(MailConfig::from_env()?)
    };
    let archive_dir = match args.archive_dir {
        Some(dir) => dir,
        None => config::archive_dir_from_env()?,
    };

    info!(count = args.count, concurrency = args.concurrency, "Generating digest");

    let assembler = DigestAssembler::new(
        HackerNewsClient::new()?,
        ContentExtractor::new()?,
        Summarizer::new(ChatClient::new(&config)?),
    )
    .with_concurrency(args.concurrency);

    let stories = assembler
        .assemble(args.count)
        .await
        .context("Failed to assemble digest")?;

    if stories.is_empty() {
        error!("No digest data generated.");
        return Ok(());
    }

    let summarized = stories.iter().filter(|s| s.post_summary.is_some()).count();
    info!(
        stories = stories.len(),
        article_summaries = summarized,
        "Rendering digest"
    );

    let document = DigestDocument::new(Local::now().date_naive(), stories);
    let html = DigestRenderer::generate(&document);

    let archive = Archive::new(archive_dir);
    let path = archive
        .save(&html, document.date)
        .context("Failed to archive digest")?;
    info!(path = %path.display(), "Digest archived");

    match mail_config {
        Some(mail_config) => {
            let mailer = MailgunClient::new(mail_config)?;
            let text = DigestRenderer::generate_text(&html);
            match mailer.send_digest(&document.subject(), &text, &html).await {
                Ok(()) => info!("Digest sent successfully!"),
                Err(e) => {
                    error!(error = %e, "Failed to send digest");
                    return Err(e).context("Failed to send digest");
                }
            }
        }
        None => warn!("Dry run: digest not sent"),
    }

    info!(secs = started.elapsed().as_secs(), "Done");
    Ok(())
}
