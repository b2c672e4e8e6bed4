use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::Html,
    routing::{get, post},
    Form, Router,
};
use serde::Deserialize;
use shared::{validate_email, Archive, MailError, MailgunClient};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::deploy::{DeployConfig, TOKEN_HEADER};
use crate::pages;

const RECENT_DIGESTS: usize = 7;

type Page = (StatusCode, Html<String>);

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    archive: Arc<Archive>,
    mailer: Option<Arc<MailgunClient>>,
    deploy: Option<Arc<DeployConfig>>,
}

impl AppState {
    pub fn new(
        archive: Archive,
        mailer: Option<MailgunClient>,
        deploy: Option<DeployConfig>,
    ) -> Self {
        Self {
            archive: Arc::new(archive),
            mailer: mailer.map(Arc::new),
            deploy: deploy.map(Arc::new),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/subscribe", post(subscribe))
        .route("/archive", get(archive_index))
        .route("/archive/:name", get(archive_entry))
        .route("/deploy", post(deploy))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn page(status: StatusCode, html: String) -> Page {
    (status, Html(html))
}

fn internal_error() -> Page {
    page(
        StatusCode::INTERNAL_SERVER_ERROR,
        pages::message("Error", "Something went wrong. Please try again later."),
    )
}

async fn index(State(state): State<AppState>) -> Page {
    match state.archive.list() {
        Ok(mut entries) => {
            entries.truncate(RECENT_DIGESTS);
            page(StatusCode::OK, pages::index(&entries))
        }
        Err(e) => {
            error!(error = %e, "Failed to list archive");
            internal_error()
        }
    }
}

#[derive(Debug, Deserialize)]
struct SubscribeForm {
    #[serde(default)]
    email: String,
}

async fn subscribe(State(state): State<AppState>, Form(form): Form<SubscribeForm>) -> Page {
    let email = match validate_email(&form.email) {
        Ok(email) => email,
        Err(e) => return page(StatusCode::BAD_REQUEST, pages::message("Error", &e.to_string())),
    };

    let Some(mailer) = state.mailer.as_ref() else {
        warn!("Subscribe attempted with no mailing list configured");
        return page(
            StatusCode::SERVICE_UNAVAILABLE,
            pages::message("Error", "Subscriptions are currently unavailable."),
        );
    };

    match mailer.add_subscriber(&email).await {
        Ok(outcome) => page(StatusCode::OK, pages::message("Thank you", outcome.message())),
        Err(MailError::InvalidEmail(reason)) => {
            page(StatusCode::BAD_REQUEST, pages::message("Error", &reason))
        }
        Err(e) => {
            error!(%email, error = %e, "Subscribe failed");
            page(
                StatusCode::BAD_GATEWAY,
                pages::message("Error", "Could not update the mailing list. Please try again later."),
            )
        }
    }
}

async fn archive_index(State(state): State<AppState>) -> Page {
    match state.archive.list() {
        Ok(entries) => page(StatusCode::OK, pages::archive(&entries)),
        Err(e) => {
            error!(error = %e, "Failed to list archive");
            internal_error()
        }
    }
}

async fn archive_entry(State(state): State<AppState>, Path(name): Path<String>) -> Page {
    match state.archive.load(&name) {
        Ok(Some(html)) => page(StatusCode::OK, html),
        Ok(None) => page(
            StatusCode::NOT_FOUND,
            pages::message("Not found", "No digest was archived under that name."),
        ),
        Err(e) => {
            error!(%name, error = %e, "Failed to read archived digest");
            internal_error()
        }
    }
}

async fn deploy(State(state): State<AppState>, headers: HeaderMap) -> (StatusCode, String) {
    let Some(deploy) = state.deploy.as_ref() else {
        return (StatusCode::NOT_FOUND, "Not found".into());
    };

    let token = headers.get(TOKEN_HEADER).and_then(|v| v.to_str().ok());
    if !deploy.authorized(token) {
        warn!("Rejected deploy request with bad token");
        return (StatusCode::UNAUTHORIZED, "Unauthorized".into());
    }

    info!(repo = %deploy.repo_dir.display(), "Deploying");
    match deploy.run().await {
        Ok(output) => (StatusCode::OK, output),
        Err(e) => {
            error!(error = %e, "Deploy failed");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", e))
        }
    }
}
