//! RON configuration of the command-line shell.
//!
//! Reads `stash.ron` from the working directory unless `--config` names
//! another file. A missing default file means defaults.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use log::LevelFilter;
use serde::Deserialize;
use stash_engine::{FetchSettings, RetryPolicy, SiteProfile, MAX_ATTEMPTS, POOL_WIDTH};
use stash_logging::LogDestination;

pub const DEFAULT_CONFIG_FILE: &str = "stash.ron";

/// Overrides `cookie` when set.
pub const COOKIE_ENV: &str = "STASH_COOKIE";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StashConfig {
    pub site_url: String,
    pub stash_root: Option<PathBuf>,
    /// Raw `Cookie` header of a logged-in browser session.
    pub cookie: Option<String>,
    pub user_agent: Option<String>,
    pub workers: usize,
    pub max_attempts: usize,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// Move finished downloads into their author folder.
    pub sort_downloads: bool,
    pub log_destination: LogDestination,
    pub log_level: String,
}

impl Default for StashConfig {
    fn default() -> Self {
        Self {
            site_url: SiteProfile::default().base_url,
            stash_root: None,
            cookie: None,
            user_agent: None,
            workers: POOL_WIDTH,
            max_attempts: MAX_ATTEMPTS,
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
            sort_downloads: true,
            log_destination: LogDestination::default(),
            log_level: "info".to_string(),
        }
    }
}

impl StashConfig {
    /// Loads `path`, or the default file when `path` is `None`.
    ///
    /// An explicitly named file must exist; the default one may be absent.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.is_file() {
                    Self::from_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };
        Ok(config.with_cookie_override(std::env::var(COOKIE_ENV).ok()))
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        Ok(ron::from_str(content)?)
    }

    pub fn with_cookie_override(mut self, cookie: Option<String>) -> Self {
        if let Some(cookie) = cookie.filter(|value| !value.trim().is_empty()) {
            self.cookie = Some(cookie);
        }
        self
    }

    /// Unknown level names fall back to `Info`.
    pub fn level_filter(&self) -> LevelFilter {
        LevelFilter::from_str(self.log_level.trim()).unwrap_or(LevelFilter::Info)
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        let defaults = FetchSettings::default();
        FetchSettings {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            user_agent: self.user_agent.clone().unwrap_or(defaults.user_agent.clone()),
            cookie: self.cookie.clone(),
            ..defaults
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
        }
    }

    pub fn site_profile(&self) -> SiteProfile {
        SiteProfile::new(self.site_url.clone())
    }
}
