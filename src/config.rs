//! Import configuration.
//!
//! Everything the pipeline needs (connection parameters, namespace conventions, cleaning and
//! loading policy) lives in one [`ImportConfig`] passed to the orchestrator at construction.
//! All sections implement [`Default`] and deserialize with missing fields defaulted, so a config
//! file only needs to name what it overrides:
//!
//! ```rust
//! use docstore_import::config::ImportConfig;
//!
//! let cfg = ImportConfig::from_json_str(r#"{"namespace": {"sub_container": "bench"}}"#).unwrap();
//! assert_eq!(cfg.namespace.sub_container, "bench");
//! assert_eq!(cfg.loader.max_reported_failures, 5);
//! ```

use std::path::Path;
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ImportError, ImportResult, StoreResult};
use crate::execution::ExecutionOptions;
use crate::ingestion::ImportSeverity;

/// Top-level configuration for an import run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    pub connection: ConnectionConfig,
    pub namespace: NamespaceConfig,
    pub cleaning: CleaningConfig,
    pub loader: LoaderConfig,
    pub retry: RetryPolicy,
    pub settle: SettleDelays,
    pub execution: ExecutionOptions,
    /// Severity at or above which observers receive `on_alert`.
    pub alert_at_or_above: ImportSeverity,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig::default(),
            namespace: NamespaceConfig::default(),
            cleaning: CleaningConfig::default(),
            loader: LoaderConfig::default(),
            retry: RetryPolicy::default(),
            settle: SettleDelays::default(),
            execution: ExecutionOptions::default(),
            alert_at_or_above: ImportSeverity::Critical,
        }
    }
}

impl ImportConfig {
    /// Parse a configuration from JSON text and validate it.
    pub fn from_json_str(input: &str) -> ImportResult<Self> {
        let cfg: Self = serde_json::from_str(input)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read a JSON configuration file and validate it.
    pub fn from_json_path(path: impl AsRef<Path>) -> ImportResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Check invariants the pipeline relies on.
    pub fn validate(&self) -> ImportResult<()> {
        if self.namespace.sub_container.trim().is_empty() {
            return Err(config_error("namespace.sub_container must not be empty"));
        }
        if self.retry.max_attempts == 0 {
            return Err(config_error("retry.max_attempts must be > 0"));
        }
        if self.execution.max_concurrent_tables == 0 {
            return Err(config_error("execution.max_concurrent_tables must be > 0"));
        }
        if self.loader.progress_interval == 0 {
            return Err(config_error("loader.progress_interval must be > 0"));
        }
        if self.connection.timeout_secs == 0 {
            return Err(config_error("connection.timeout_secs must be > 0"));
        }
        Ok(())
    }

    /// A configuration with every settling delay and retry backoff set to zero.
    ///
    /// Useful against in-process stores, where there is nothing to wait for.
    pub fn without_delays(mut self) -> Self {
        self.settle = SettleDelays::none();
        self.retry.backoff_ms = 0;
        self
    }
}

fn config_error(message: &str) -> ImportError {
    ImportError::Config {
        message: message.to_string(),
    }
}

/// How to reach the cluster.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Host name or IP of a cluster node.
    pub host: String,
    /// `http` or `https`.
    pub scheme: String,
    /// Cluster management REST port.
    pub management_port: u16,
    /// Query service port.
    pub query_port: u16,
    pub username: String,
    pub password: String,
    /// Per-request timeout.
    pub timeout_secs: u64,
}

impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("scheme", &self.scheme)
            .field("management_port", &self.management_port)
            .field("query_port", &self.query_port)
            .field("username", &self.username)
            .field("password_set", &!self.password.is_empty())
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            scheme: "http".to_string(),
            management_port: 8091,
            query_port: 8093,
            username: "Administrator".to_string(),
            password: "password".to_string(),
            timeout_secs: 30,
        }
    }
}

impl ConnectionConfig {
    /// Environment variable overriding [`Self::host`].
    pub const HOST_ENV: &'static str = "DOCSTORE_HOST";
    /// Environment variable overriding [`Self::username`].
    pub const USERNAME_ENV: &'static str = "DOCSTORE_USERNAME";
    /// Environment variable overriding [`Self::password`].
    pub const PASSWORD_ENV: &'static str = "DOCSTORE_PASSWORD";

    /// Accepts either a bare host or a `couchbase://host` connection string.
    pub fn with_host(mut self, host: &str) -> Self {
        self.host = host
            .trim_start_matches("couchbases://")
            .trim_start_matches("couchbase://")
            .trim_end_matches('/')
            .to_string();
        self
    }

    /// Apply overrides from the process environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    pub(crate) fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(host) = lookup(Self::HOST_ENV) {
            self = self.with_host(&host);
        }
        if let Some(user) = lookup(Self::USERNAME_ENV) {
            self.username = user;
        }
        if let Some(password) = lookup(Self::PASSWORD_ENV) {
            self.password = password;
        }
        self
    }

    /// Base URL of the cluster management REST API.
    pub fn management_url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.management_port)
    }

    /// Full URL of the query service endpoint.
    pub fn query_url(&self) -> String {
        format!(
            "{}://{}:{}/query/service",
            self.scheme, self.host, self.query_port
        )
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Settings used when a container has to be created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerSettings {
    /// Memory quota for a new container, in MiB.
    pub ram_quota_mb: u32,
    /// Store-specific container type.
    pub bucket_type: String,
}

impl Default for ContainerSettings {
    fn default() -> Self {
        Self {
            ram_quota_mb: 600,
            bucket_type: "couchbase".to_string(),
        }
    }
}

/// Where tables land in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamespaceConfig {
    /// Fixed sub-container every dataset's tables are placed under.
    pub sub_container: String,
    /// One leaf container per table. When `false`, every table goes to `_default`.
    pub separate_leaf_containers: bool,
    pub container: ContainerSettings,
}

impl Default for NamespaceConfig {
    fn default() -> Self {
        Self {
            sub_container: "spider2".to_string(),
            separate_leaf_containers: true,
            container: ContainerSettings::default(),
        }
    }
}

/// Type-cleaning policy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningConfig {
    /// Normalize empty strings in numeric columns before loading.
    pub enabled: bool,
    /// Count replacements without applying them.
    pub dry_run: bool,
    /// Also rewrite the source file (with a one-time backup) when values were replaced.
    pub rewrite_source_files: bool,
}

/// Document loading policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// How many row failures per table are reported with full detail.
    pub max_reported_failures: usize,
    /// Emit a progress event every this many rows.
    pub progress_interval: usize,
    /// Natural-key columns tried, in order, when a row has no `id`.
    pub alternate_key_fields: Vec<String>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_reported_failures: 5,
            progress_interval: 1_000,
            alternate_key_fields: vec!["businessentityid".to_string()],
        }
    }
}

/// Bounded retry of transient store failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Wait before attempt `n + 1` is `n * backoff_ms`.
    pub backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_ms: 500,
        }
    }
}

impl RetryPolicy {
    /// Run `op`, retrying while it fails with [`crate::StoreError::Transient`].
    ///
    /// Non-transient failures are returned immediately.
    pub fn run<T, F>(&self, mut op: F) -> StoreResult<T>
    where
        F: FnMut() -> StoreResult<T>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op() {
                Err(e) if e.is_transient() && attempt < attempts => {
                    tracing::debug!(attempt, error = %e, "retrying transient store failure");
                    let wait = self.backoff_ms.saturating_mul(u64::from(attempt));
                    if wait > 0 {
                        thread::sleep(Duration::from_millis(wait));
                    }
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

/// Pauses after creating a namespace level, for stores that propagate metadata asynchronously.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettleDelays {
    pub container_ms: u64,
    pub sub_container_ms: u64,
    pub leaf_ms: u64,
}

impl Default for SettleDelays {
    fn default() -> Self {
        Self {
            container_ms: 3_000,
            sub_container_ms: 1_000,
            leaf_ms: 500,
        }
    }
}

impl SettleDelays {
    pub fn none() -> Self {
        Self {
            container_ms: 0,
            sub_container_ms: 0,
            leaf_ms: 0,
        }
    }
}
