use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;
use tracing::info;

use crate::config::MailConfig;
use crate::error::MailError;

const LOOKUP_TIMEOUT: Duration = Duration::from_secs(8);
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("valid regex")
});

/// Trim and sanity-check an address typed into the subscribe form.
pub fn validate_email(email: &str) -> Result<String, MailError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(MailError::InvalidEmail("Email is required.".to_string()));
    }
    if !EMAIL.is_match(email) {
        return Err(MailError::InvalidEmail("Invalid email format.".to_string()));
    }
    Ok(email.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeOutcome {
    Added,
    AlreadySubscribed,
}

impl SubscribeOutcome {
    pub fn message(self) -> &'static str {
        match self {
            SubscribeOutcome::Added => "You have been added to the mailing list.",
            SubscribeOutcome::AlreadySubscribed => {
                "You are already subscribed to the mailing list."
            }
        }
    }
}

/// Mailgun mailing-list API: membership lookup, subscribe, and list-wide send.
pub struct MailgunClient {
    client: Client,
    config: MailConfig,
}

impl MailgunClient {
    pub fn new(config: MailConfig) -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, config })
    }

    fn api_base(&self) -> &str {
        self.config.api_base.trim_end_matches('/')
    }

    fn members_url(&self) -> String {
        format!(
            "{}/lists/{}/members",
            self.api_base(),
            self.config.list_address()
        )
    }

    fn member_url(&self, email: &str) -> String {
        format!("{}/{}", self.members_url(), urlencoding::encode(email))
    }

    fn messages_url(&self) -> String {
        format!("{}/{}/messages", self.api_base(), self.config.domain_name)
    }

    async fn post_form(&self, url: &str, fields: &[(&str, &str)]) -> Result<Response, MailError> {
        let response = self
            .client
            .post(url)
            .basic_auth("api", Some(&self.config.api_key))
            .form(fields)
            .timeout(WRITE_TIMEOUT)
            .send()
            .await?;
        Ok(response)
    }

    pub async fn is_subscriber(&self, email: &str) -> Result<bool, MailError> {
        let email = validate_email(email)?;

        let response = self
            .client
            .get(self.member_url(&email))
            .basic_auth("api", Some(&self.config.api_key))
            .timeout(LOOKUP_TIMEOUT)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                info!(%email, "Subscriber exists");
                Ok(true)
            }
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(api_error(response).await),
        }
    }

    /// Subscribe `email`, treating an existing membership as success.
    pub async fn add_subscriber(&self, email: &str) -> Result<SubscribeOutcome, MailError> {
        let email = validate_email(email)?;

        if self.is_subscriber(&email).await? {
            return Ok(SubscribeOutcome::AlreadySubscribed);
        }

        let response = self
            .post_form(
                &self.members_url(),
                &[
                    ("address", email.as_str()),
                    ("subscribed", "true"),
                    ("upsert", "yes"),
                ],
            )
            .await?;

        if response.status() == StatusCode::OK {
            info!(%email, "Added to mailing list");
            Ok(SubscribeOutcome::Added)
        } else {
            Err(api_error(response).await)
        }
    }

    /// Send one message to the whole list (from and to are the list address).
    pub async fn send_digest(&self, subject: &str, text: &str, html: &str) -> Result<(), MailError> {
        let list_address = self.config.list_address();

        let response = self
            .post_form(
                &self.messages_url(),
                &[
                    ("from", list_address.as_str()),
                    ("to", list_address.as_str()),
                    ("subject", subject),
                    ("text", text),
                    ("html", html),
                ],
            )
            .await?;

        if response.status().is_success() {
            info!(to = %list_address, "Digest sent to mailing list");
            Ok(())
        } else {
            Err(api_error(response).await)
        }
    }
}

async fn api_error(response: Response) -> MailError {
    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        return MailError::RateLimited;
    }
    let detail = response
        .text()
        .await
        .unwrap_or_else(|_| String::from("unknown error"));
    MailError::Api { status, detail }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Path;
    use axum::routing::{get, post};
    use axum::Router;
    use std::sync::{Arc, Mutex};

    fn config(api_base: &str) -> MailConfig {
        MailConfig {
            api_key: "key-123".into(),
            list_name: "digest".into(),
            domain_name: "example.com".into(),
            api_base: api_base.into(),
        }
    }

    /// Fake Mailgun: `known@example.com` is a member, `busy@example.com` is throttled.
    async fn spawn_mailgun(bodies: Arc<Mutex<Vec<String>>>) -> String {
        let members = bodies.clone();
        let messages = bodies;
        let app = Router::new()
            .route(
                "/lists/:list/members/:email",
                get(|Path((_list, email)): Path<(String, String)>| async move {
                    match email.as_str() {
                        "known@example.com" => StatusCode::OK,
                        "busy@example.com" => StatusCode::TOO_MANY_REQUESTS,
                        _ => StatusCode::NOT_FOUND,
                    }
                }),
            )
            .route(
                "/lists/:list/members",
                post(move |body: String| {
                    let members = members.clone();
                    async move {
                        members.lock().unwrap().push(body);
                        StatusCode::OK
                    }
                }),
            )
            .route(
                "/:domain/messages",
                post(move |body: String| {
                    let messages = messages.clone();
                    async move {
                        messages.lock().unwrap().push(body);
                        StatusCode::OK
                    }
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    // ==================== Validation Tests ====================

    #[test]
    fn test_validate_email_trims() {
        assert_eq!(validate_email("  a.b+c@example.org ").unwrap(), "a.b+c@example.org");
    }

    #[test]
    fn test_validate_email_empty() {
        let err = validate_email("   ").unwrap_err();
        assert_eq!(err.to_string(), "Email is required.");
    }

    #[test]
    fn test_validate_email_bad_format() {
        for bad in ["nobody", "a@b", "a@b.c", "a b@example.com", "@example.com"] {
            let err = validate_email(bad).unwrap_err();
            assert_eq!(err.to_string(), "Invalid email format.", "{bad}");
        }
    }

    #[test]
    fn test_urls() {
        let client = MailgunClient::new(config("https://api.mailgun.net/v3/")).unwrap();
        assert_eq!(
            client.members_url(),
            "https://api.mailgun.net/v3/lists/digest@example.com/members"
        );
        assert_eq!(
            client.member_url("x@y.com"),
            "https://api.mailgun.net/v3/lists/digest@example.com/members/x%40y.com"
        );
        assert_eq!(
            client.messages_url(),
            "https://api.mailgun.net/v3/example.com/messages"
        );
    }

    // ==================== API Tests ====================

    #[tokio::test]
    async fn test_is_subscriber() {
        let base = spawn_mailgun(Arc::new(Mutex::new(Vec::new()))).await;
        let client = MailgunClient::new(config(&base)).unwrap();

        assert!(client.is_subscriber("known@example.com").await.unwrap());
        assert!(!client.is_subscriber("new@example.com").await.unwrap());
        assert!(matches!(
            client.is_subscriber("busy@example.com").await,
            Err(MailError::RateLimited)
        ));
    }

    #[tokio::test]
    async fn test_add_subscriber_existing_is_not_reposted() {
        let bodies = Arc::new(Mutex::new(Vec::new()));
        let base = spawn_mailgun(bodies.clone()).await;
        let client = MailgunClient::new(config(&base)).unwrap();

        let outcome = client.add_subscriber("known@example.com").await.unwrap();
        assert_eq!(outcome, SubscribeOutcome::AlreadySubscribed);
        assert!(bodies.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_subscriber_new() {
        let bodies = Arc::new(Mutex::new(Vec::new()));
        let base = spawn_mailgun(bodies.clone()).await;
        let client = MailgunClient::new(config(&base)).unwrap();

        let outcome = client.add_subscriber(" new@example.com ").await.unwrap();
        assert_eq!(outcome, SubscribeOutcome::Added);
        let posted = bodies.lock().unwrap();
        assert_eq!(
            *posted,
            vec!["address=new%40example.com&subscribed=true&upsert=yes"]
        );
    }

    #[tokio::test]
    async fn test_add_subscriber_invalid_never_calls_api() {
        let client = MailgunClient::new(config("http://127.0.0.1:9")).unwrap();
        assert!(matches!(
            client.add_subscriber("not-an-email").await,
            Err(MailError::InvalidEmail(_))
        ));
    }

    #[tokio::test]
    async fn test_send_digest_posts_list_message() {
        let bodies = Arc::new(Mutex::new(Vec::new()));
        let base = spawn_mailgun(bodies.clone()).await;
        let client = MailgunClient::new(config(&base)).unwrap();

        client
            .send_digest("HackerNews Digest - March 15, 2024", "plain", "<p>html</p>")
            .await
            .unwrap();

        let posted = bodies.lock().unwrap();
        assert_eq!(posted.len(), 1);
        assert!(posted[0].starts_with("from=digest%40example.com&to=digest%40example.com"));
        assert!(posted[0].contains("&subject=HackerNews+Digest+-+March+15%2C+2024&"));
        assert!(posted[0].contains("html=%3Cp%3Ehtml%3C%2Fp%3E"));
    }
}
