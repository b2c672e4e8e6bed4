use reqwest::StatusCode;
use thiserror::Error;

/// Reasons an article could not be turned into usable text.
///
/// None of these are faults of the run: the extractor logs them and hands the
/// assembler `None` so a story degrades to metadata only.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("hard paywall detected")]
    Paywalled,

    #[error("extracted content too short ({0} chars)")]
    TooShort(usize),
}

/// Failure kinds from the chat-completion provider, derived from the status code.
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("request payload too large")]
    PayloadTooLarge,

    #[error("rate limited by provider")]
    RateLimited,

    #[error("provider returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("completion contained no text")]
    EmptyResponse,
}

impl LlmError {
    pub fn from_status(status: StatusCode, body: String) -> Self {
        match status {
            StatusCode::PAYLOAD_TOO_LARGE => LlmError::PayloadTooLarge,
            StatusCode::TOO_MANY_REQUESTS => LlmError::RateLimited,
            _ => LlmError::Status { status, body },
        }
    }
}

#[derive(Error, Debug)]
pub enum MailError {
    #[error("{0}")]
    InvalidEmail(String),

    #[error("Too many requests")]
    RateLimited,

    #[error("Mailgun error ({status}): {detail}")]
    Api { status: StatusCode, detail: String },

    #[error("Request error: {0}")]
    Transport(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_413_is_payload_too_large() {
        let err = LlmError::from_status(StatusCode::PAYLOAD_TOO_LARGE, String::new());
        assert!(matches!(err, LlmError::PayloadTooLarge));
    }

    #[test]
    fn test_status_429_is_rate_limited() {
        let err = LlmError::from_status(StatusCode::TOO_MANY_REQUESTS, "slow down".into());
        assert!(matches!(err, LlmError::RateLimited));
    }

    #[test]
    fn test_other_status_keeps_body() {
        let err = LlmError::from_status(StatusCode::BAD_GATEWAY, "upstream".into());
        match err {
            LlmError::Status { status, body } => {
                assert_eq!(status, StatusCode::BAD_GATEWAY);
                assert_eq!(body, "upstream");
            }
            other => panic!("unexpected error kind: {other:?}"),
        }
    }
}
