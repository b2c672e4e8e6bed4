use anyhow::{bail, Context, Result};
use shared::config;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::info;

pub const TOKEN_HEADER: &str = "x-deploy-token";
const DEFAULT_SERVICE_NAME: &str = "digest-web";

/// Settings for the `/deploy` webhook. Absent entirely when no secret is set.
#[derive(Debug, Clone)]
pub struct DeployConfig {
    pub secret: String,
    pub repo_dir: PathBuf,
    pub service_name: String,
}

impl DeployConfig {
    pub fn from_env() -> Option<Self> {
        let secret = config::optional_var("DEPLOY_WEBHOOK_SECRET")?;
        let repo_dir = config::optional_var("DEPLOY_REPO_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        let service_name = config::optional_var("DEPLOY_SERVICE_NAME")
            .unwrap_or_else(|| DEFAULT_SERVICE_NAME.to_string());

        Some(Self {
            secret,
            repo_dir,
            service_name,
        })
    }

    pub fn authorized(&self, token: Option<&str>) -> bool {
        token.is_some_and(|t| constant_time_eq(t.as_bytes(), self.secret.as_bytes()))
    }

    /// Pull the latest code, then restart the service.
    pub async fn run(&self) -> Result<String> {
        let pulled = run_step(
            Command::new("git")
                .args(["pull", "--ff-only"])
                .current_dir(&self.repo_dir),
            "git pull",
            &self.repo_dir,
        )
        .await?;

        run_step(
            Command::new("systemctl").args(["restart", &self.service_name]),
            "systemctl restart",
            &self.repo_dir,
        )
        .await?;

        info!(service = %self.service_name, "Deployment finished");
        Ok(pulled)
    }
}

async fn run_step(command: &mut Command, label: &str, dir: &Path) -> Result<String> {
    let output = command
        .output()
        .await
        .with_context(|| format!("Failed to run {} in {}", label, dir.display()))?;

    if !output.status.success() {
        bail!(
            "{} failed ({}): {}",
            label,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    info!(step = label, %stdout, "Deploy step succeeded");
    Ok(stdout)
}

/// Byte comparison whose running time does not depend on where inputs differ.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(secret: &str) -> DeployConfig {
        DeployConfig {
            secret: secret.into(),
            repo_dir: PathBuf::from("."),
            service_name: "digest-web".into(),
        }
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"s3cret", b"s3cret"));
        assert!(!constant_time_eq(b"s3cret", b"s3creT"));
        assert!(!constant_time_eq(b"s3cret", b"s3cret!"));
        assert!(constant_time_eq(b"", b""));
    }

    #[test]
    fn test_authorized() {
        let deploy = config("s3cret");
        assert!(deploy.authorized(Some("s3cret")));
        assert!(!deploy.authorized(Some("wrong")));
        assert!(!deploy.authorized(None));
    }

    #[tokio::test]
    async fn test_run_fails_outside_repository() {
        let tmp = tempfile::tempdir().unwrap();
        let deploy = DeployConfig {
            repo_dir: tmp.path().to_path_buf(),
            ..config("s3cret")
        };
        assert!(deploy.run().await.is_err());
    }
}
