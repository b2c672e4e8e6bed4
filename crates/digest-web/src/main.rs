//! Web front end for the digest: subscription form, archive browsing and the
//! deployment webhook.
//!
//! # Environment Variables
//! - `DIGEST_WEB_ADDR`: listen address (default "0.0.0.0:5000")
//! - `DIGEST_ARCHIVE_DIR`: where `send-digest` stores rendered digests
//! - `MAILGUN_API_KEY`, `MAILGUN_LIST_NAME`, `DOMAIN_NAME`: subscription backend
//! - `DEPLOY_WEBHOOK_SECRET`, `DEPLOY_REPO_DIR`, `DEPLOY_SERVICE_NAME`: `/deploy`

mod app;
mod deploy;
mod pages;

use anyhow::Result;
use shared::{config, logging, Archive, MailConfig, MailgunClient};
use tracing::{info, warn};

use crate::app::AppState;
use crate::deploy::DeployConfig;

const DEFAULT_ADDR: &str = "0.0.0.0:5000";

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_tracing("info");
    config::try_load_dotenv();

    let addr = config::optional_var("DIGEST_WEB_ADDR").unwrap_or_else(|| DEFAULT_ADDR.into());
    let archive = Archive::new(config::archive_dir_from_env()?);

    // The archive stays browsable without mail credentials.
    let mailer = match MailConfig::from_env() {
        Ok(mail_config) => Some(MailgunClient::new(mail_config)?),
        Err(e) => {
            warn!(error = %e, "Subscriptions disabled");
            None
        }
    };

    let deploy = DeployConfig::from_env();
    if deploy.is_none() {
        info!("DEPLOY_WEBHOOK_SECRET not set; /deploy is disabled");
    }

    let state = AppState::new(archive, mailer, deploy);
    let app = app::router(state);

    info!(%addr, "Starting digest web front end");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
