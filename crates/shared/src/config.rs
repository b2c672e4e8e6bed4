use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

pub const DEFAULT_LLM_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
pub const DEFAULT_LLM_MODEL: &str = "openai/gpt-oss-120b";
pub const DEFAULT_MAILGUN_API_BASE: &str = "https://api.mailgun.net/v3";

/// Credentials and endpoint for the chat-completion provider.
#[derive(Debug, Clone)]
pub struct Config {
    pub llm_api_key: String,
    pub llm_api_url: String,
    pub llm_model: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // Try to load .env from multiple locations
        try_load_dotenv();

        let llm_api_key = required_var("GROQ_API_KEY").context(
            "GROQ_API_KEY not found.\n\n\
            To fix this, create ~/.config/hn-digest/.env with:\n  \
            GROQ_API_KEY=your_key_here\n\n\
            Get a Groq API key from: https://console.groq.com/keys",
        )?;

        Ok(Self {
            llm_api_key,
            llm_api_url: optional_var("LLM_API_URL")
                .unwrap_or_else(|| DEFAULT_LLM_API_URL.to_string()),
            llm_model: optional_var("LLM_MODEL").unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
        })
    }
}

/// Mailing-list credentials. The list address is `{list_name}@{domain_name}`.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub api_key: String,
    pub list_name: String,
    pub domain_name: String,
    pub api_base: String,
}

impl MailConfig {
    pub fn from_env() -> Result<Self> {
        try_load_dotenv();

        let missing = "Mailgun configuration missing (MAILGUN_API_KEY, MAILGUN_LIST_NAME, or DOMAIN_NAME). \
            Set them in the environment or in ~/.config/hn-digest/.env";

        let api_key = required_var("MAILGUN_API_KEY").context(missing)?;
        let list_name = required_var("MAILGUN_LIST_NAME").context(missing)?;
        let domain_name = required_var("DOMAIN_NAME").context(missing)?;

        Ok(Self {
            api_key,
            list_name,
            domain_name,
            api_base: optional_var("MAILGUN_API_BASE")
                .unwrap_or_else(|| DEFAULT_MAILGUN_API_BASE.to_string()),
        })
    }

    pub fn list_address(&self) -> String {
        format!("{}@{}", self.list_name, self.domain_name)
    }
}

/// Where rendered digests are archived: `DIGEST_ARCHIVE_DIR` or the local data dir.
pub fn archive_dir_from_env() -> Result<PathBuf> {
    try_load_dotenv();

    if let Some(dir) = optional_var("DIGEST_ARCHIVE_DIR") {
        return Ok(PathBuf::from(dir));
    }

    let data_dir = dirs::data_local_dir()
        .context("Could not determine local data directory")?
        .join("hn-digest")
        .join("archive");

    Ok(data_dir)
}

/// Read a variable that must be present and non-blank.
fn required_var(name: &str) -> Result<String> {
    optional_var(name).with_context(|| format!("{} is not set", name))
}

/// Read a variable, treating blank values as unset.
pub fn optional_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn try_load_dotenv() {
    // Try locations in order of preference:

    // 1. Current directory (for development)
    if dotenvy::dotenv().is_ok() {
        return;
    }

    // 2. ~/.config/hn-digest/.env (standard config location)
    if let Some(config_dir) = dirs::config_dir() {
        let config_path = config_dir.join("hn-digest").join(".env");
        if config_path.exists() && dotenvy::from_path(&config_path).is_ok() {
            return;
        }
    }

    // 3. ~/.env (home directory)
    if let Some(home_dir) = dirs::home_dir() {
        let home_path = home_dir.join(".env");
        if home_path.exists() {
            let _ = dotenvy::from_path(&home_path);
        }
    }

    // If none found, that's okay - environment variables might be set system-wide
}
