//! Headless browser fetching: slow, but renders the page like a real visitor
//!
//! The browser binary is located lazily on first use and the result is
//! cached for the lifetime of the strategy.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::sync::OnceCell;

use crate::fetch::{require_payload, FetchFailure, FetchStrategy, PageRequest, StrategyKind};

/// Executable names tried on `PATH` when no binary is configured
const CANDIDATES: [&str; 6] = [
    "chromium",
    "chromium-browser",
    "google-chrome",
    "google-chrome-stable",
    "chrome",
    "headless_shell",
];

/// Renders pages with headless Chromium `--dump-dom`
#[derive(Debug)]
pub struct BrowserFetchStrategy {
    configured: Option<PathBuf>,
    binary: OnceCell<Option<PathBuf>>,
    user_agent: String,
    timeout: Duration,
    render_budget_ms: u64,
}

impl BrowserFetchStrategy {
    pub fn new(configured: Option<PathBuf>, user_agent: impl Into<String>, timeout: Duration) -> Self {
        Self {
            configured,
            binary: OnceCell::new(),
            user_agent: user_agent.into(),
            timeout,
            render_budget_ms: 5_000,
        }
    }

    async fn binary(&self) -> Result<&Path, FetchFailure> {
        let located = self
            .binary
            .get_or_init(|| async {
                let found = locate_browser(self.configured.as_deref());
                match &found {
                    Some(path) => tracing::info!(browser = %path.display(), "headless browser located"),
                    None => tracing::warn!("no headless browser found; browser fallback disabled"),
                }
                found
            })
            .await;

        located.as_deref().ok_or_else(|| {
            FetchFailure::ToolUnavailable(format!(
                "no browser binary configured or found on PATH (tried {})",
                CANDIDATES.join(", ")
            ))
        })
    }

    fn command(&self, binary: &Path, url: &str) -> Command {
        let mut command = Command::new(binary);
        command
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-blink-features=AutomationControlled")
            .arg(format!("--user-agent={}", self.user_agent))
            .arg(format!("--virtual-time-budget={}", self.render_budget_ms))
            .arg("--dump-dom")
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

fn locate_browser(configured: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = configured {
        if path.is_file() {
            return Some(path.to_path_buf());
        }
        tracing::warn!(browser = %path.display(), "configured browser binary does not exist");
    }

    let search_path = std::env::var_os("PATH")?;
    std::env::split_paths(&search_path)
        .flat_map(|dir| CANDIDATES.iter().map(move |name| dir.join(name)))
        .find(|candidate| candidate.is_file())
}

#[async_trait]
impl FetchStrategy for BrowserFetchStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Browser
    }

    async fn fetch(&self, request: &PageRequest) -> Result<String, FetchFailure> {
        let binary = self.binary().await?;
        let child = self
            .command(binary, &request.url)
            .spawn()
            .map_err(|e| FetchFailure::ToolUnavailable(format!("cannot start {}: {}", binary.display(), e)))?;

        // Dropping the future on timeout drops the child, which kills it
        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| FetchFailure::Timeout(self.timeout))?
            .map_err(|e| FetchFailure::Transport(format!("browser I/O error: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let first_line = stderr.lines().next().unwrap_or_default();
            return Err(FetchFailure::Transport(format!(
                "browser exited with {}: {}",
                output.status, first_line
            )));
        }

        require_payload(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_configured_binary_falls_back_to_path_search() {
        let strategy = BrowserFetchStrategy::new(
            Some(PathBuf::from("/definitely/not/a/browser")),
            "ua",
            Duration::from_secs(1),
        );

        // Whatever the host has installed, the result is cached after the first lookup
        let first = strategy.binary().await.map(Path::to_path_buf);
        let second = strategy.binary().await.map(Path::to_path_buf);
        assert_eq!(first, second);
        if let Ok(path) = first {
            assert_ne!(path, PathBuf::from("/definitely/not/a/browser"));
        }
    }

    #[test]
    fn configured_binary_wins_when_present() {
        let exe = std::env::current_exe().unwrap();
        assert_eq!(locate_browser(Some(&exe)), Some(exe));
    }
}
