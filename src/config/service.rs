//! Service configuration: capacity defaults, operation deadlines, audit and
//! journal settings.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::core::{AppResult, DEFAULT_MAX_CAPACITY};

/// Environment variable for [`ServiceConfig::default_max_capacity`].
pub const ENV_DEFAULT_MAX_CAPACITY: &str = "COUNSELLOR_DEFAULT_MAX_CAPACITY";
/// Environment variable for [`ServiceConfig::op_timeout_ms`].
pub const ENV_OP_TIMEOUT_MS: &str = "COUNSELLOR_OP_TIMEOUT_MS";
/// Environment variable for [`ServiceConfig::audit_capacity`].
pub const ENV_AUDIT_CAPACITY: &str = "COUNSELLOR_AUDIT_CAPACITY";
/// Environment variable for the journal directory.
pub const ENV_JOURNAL_PATH: &str = "COUNSELLOR_JOURNAL_PATH";

/// Where committed transactions are journaled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalConfig {
    /// Directory holding the journal file.
    pub dir: PathBuf,
    /// File stem of the journal.
    #[serde(default = "default_stream")]
    pub stream: String,
}

fn default_stream() -> String {
    "ledger".into()
}

const fn default_max_capacity() -> u32 {
    DEFAULT_MAX_CAPACITY
}

const fn default_audit_capacity() -> usize {
    1024
}

/// Root service configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Capacity given to counsellors created without a positive one.
    #[serde(default = "default_max_capacity")]
    pub default_max_capacity: u32,
    /// Deadline applied to each API operation; `None` means no deadline.
    #[serde(default)]
    pub op_timeout_ms: Option<u64>,
    /// Audit events kept in memory; zero disables auditing.
    #[serde(default = "default_audit_capacity")]
    pub audit_capacity: usize,
    /// Journal location; `None` keeps the store volatile.
    #[serde(default)]
    pub journal: Option<JournalConfig>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            default_max_capacity: default_max_capacity(),
            op_timeout_ms: None,
            audit_capacity: default_audit_capacity(),
            journal: None,
        }
    }
}

impl ServiceConfig {
    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.default_max_capacity == 0 {
            return Err("default_max_capacity must be greater than 0".into());
        }
        if self.op_timeout_ms == Some(0) {
            return Err("op_timeout_ms must be greater than 0 when set".into());
        }
        if let Some(journal) = &self.journal {
            if journal.stream.trim().is_empty() {
                return Err("journal.stream must not be empty".into());
            }
        }
        Ok(())
    }

    /// Per-operation deadline.
    #[must_use]
    pub fn op_timeout(&self) -> Option<Duration> {
        self.op_timeout_ms.map(Duration::from_millis)
    }

    /// Parse configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns a description of the parse or validation failure.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from the process environment, loading a `.env`
    /// file first when one exists. Unset variables keep their defaults.
    ///
    /// # Errors
    ///
    /// Fails when a variable is present but not parseable, or when the
    /// result does not validate.
    pub fn from_env() -> AppResult<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Same as [`Self::from_env`].
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        if let Some(raw) = lookup(ENV_DEFAULT_MAX_CAPACITY) {
            cfg.default_max_capacity = raw
                .trim()
                .parse()
                .with_context(|| format!("{ENV_DEFAULT_MAX_CAPACITY}={raw}"))?;
        }
        if let Some(raw) = lookup(ENV_OP_TIMEOUT_MS) {
            cfg.op_timeout_ms = Some(
                raw.trim()
                    .parse()
                    .with_context(|| format!("{ENV_OP_TIMEOUT_MS}={raw}"))?,
            );
        }
        if let Some(raw) = lookup(ENV_AUDIT_CAPACITY) {
            cfg.audit_capacity = raw
                .trim()
                .parse()
                .with_context(|| format!("{ENV_AUDIT_CAPACITY}={raw}"))?;
        }
        if let Some(dir) = lookup(ENV_JOURNAL_PATH).filter(|d| !d.trim().is_empty()) {
            cfg.journal = Some(JournalConfig {
                dir: PathBuf::from(dir),
                stream: default_stream(),
            });
        }
        cfg.validate().map_err(anyhow::Error::msg)?;
        Ok(cfg)
    }
}
