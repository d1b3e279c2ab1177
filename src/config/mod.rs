//! Configuration (layered: TOML file > environment > built-in defaults).
//!
//! File lookup order: explicit path, then `$SWITCHYARD_CONFIG`, then
//! `config.toml` in the platform config directory. A missing default file
//! is not an error; a missing explicit file is.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SwitchyardError;
use crate::provider::BackendConfig;
use crate::types::ToolLoopOverrides;
use crate::util::retry::delay_from_secs;
use crate::util::RetryPolicy;

pub const CONFIG_PATH_ENV: &str = "SWITCHYARD_CONFIG";
pub const LISTEN_ENV: &str = "SWITCHYARD_LISTEN";

/// Root configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SwitchyardConfig {
    pub server: ServerConfig,
    pub retry: RetryConfig,
    pub tool_loop: ToolLoopConfig,
    pub admission: AdmissionConfig,
    pub rate_limit: RateLimitConfig,
    pub providers: BTreeMap<String, BackendConfig>,
}

impl Default for SwitchyardConfig {
    fn default() -> Self {
        let mut providers = BTreeMap::new();
        providers.insert("local".to_string(), BackendConfig::Local);
        Self {
            server: ServerConfig::default(),
            retry: RetryConfig::default(),
            tool_loop: ToolLoopConfig::default(),
            admission: AdmissionConfig::default(),
            rate_limit: RateLimitConfig::default(),
            providers,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8787".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub multiplier: f64,
    pub rate_limit_schedule_secs: Vec<f64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            multiplier: 2.0,
            rate_limit_schedule_secs: vec![5.0, 10.0, 20.0],
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay: Duration::from_millis(self.base_delay_ms),
            multiplier: self.multiplier,
            rate_limit_schedule: self
                .rate_limit_schedule_secs
                .iter()
                .copied()
                .map(delay_from_secs)
                .collect(),
        }
    }
}

/// Tool-loop policy. Per-request [`ToolLoopOverrides`] win over these values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolLoopConfig {
    pub countdown_enabled: bool,
    pub final_prompt_enabled: bool,
    pub parallel_execution: bool,
    pub max_iterations: u32,
    pub timeout_ms: Option<u64>,
}

impl Default for ToolLoopConfig {
    fn default() -> Self {
        Self {
            countdown_enabled: true,
            final_prompt_enabled: true,
            parallel_execution: false,
            max_iterations: 10,
            timeout_ms: None,
        }
    }
}

impl ToolLoopConfig {
    /// Effective policy for one request.
    pub fn resolve(&self, overrides: Option<&ToolLoopOverrides>) -> ToolLoopConfig {
        let Some(o) = overrides else {
            return self.clone();
        };
        ToolLoopConfig {
            countdown_enabled: o.countdown_enabled.unwrap_or(self.countdown_enabled),
            final_prompt_enabled: o.final_prompt_enabled.unwrap_or(self.final_prompt_enabled),
            parallel_execution: o.parallel_execution.unwrap_or(self.parallel_execution),
            max_iterations: o.max_iterations.unwrap_or(self.max_iterations).max(1),
            timeout_ms: o.timeout_ms.or(self.timeout_ms),
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// Concurrency limits for one route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RouteLimits {
    pub enabled: bool,
    /// In-flight cap; zero or negative means unbounded.
    pub max_concurrent: i64,
    pub max_queue_size: usize,
    /// Longest wait for a slot; zero waits until granted or cancelled.
    pub queue_timeout_ms: u64,
}

impl RouteLimits {
    fn with_capacity(max_concurrent: i64, max_queue_size: usize) -> Self {
        Self {
            enabled: true,
            max_concurrent,
            max_queue_size,
            queue_timeout_ms: 30_000,
        }
    }
}

impl Default for RouteLimits {
    fn default() -> Self {
        Self::with_capacity(16, 32)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AdmissionConfig {
    pub run: RouteLimits,
    pub stream: RouteLimits,
    pub vector: RouteLimits,
    pub embeddings: RouteLimits,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            run: RouteLimits::with_capacity(32, 64),
            stream: RouteLimits::default(),
            vector: RouteLimits::default(),
            embeddings: RouteLimits::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub requests_per_minute: u32,
    pub burst: u32,
    pub trust_proxy_headers: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_minute: 60,
            burst: 10,
            trust_proxy_headers: false,
        }
    }
}

impl SwitchyardConfig {
    /// Load configuration and apply environment overrides.
    pub fn load(explicit: Option<&Path>) -> Result<Self, SwitchyardError> {
        let _ = dotenvy::dotenv();

        let explicit = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from));
        let mut config = match explicit {
            Some(path) => Self::from_file(&path)?,
            None => match default_config_path().filter(|p| p.exists()) {
                Some(path) => Self::from_file(&path)?,
                None => Self::default(),
            },
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, SwitchyardError> {
        let raw = fs::read_to_string(path).map_err(|e| {
            SwitchyardError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        tracing::debug!(path = %path.display(), "loaded config file");
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, SwitchyardError> {
        toml::from_str(raw).map_err(|e| SwitchyardError::Configuration(e.to_string()))
    }

    /// Apply environment overrides through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(listen) = lookup(LISTEN_ENV).filter(|v| !v.trim().is_empty()) {
            self.server.listen = listen;
        }
    }

    pub fn validate(&self) -> Result<(), SwitchyardError> {
        let retry = &self.retry;
        if retry.max_attempts == 0 {
            return Err(SwitchyardError::Configuration(
                "retry.max_attempts must be at least 1".into(),
            ));
        }
        if !retry.multiplier.is_finite() || retry.multiplier < 0.0 {
            return Err(SwitchyardError::Configuration(
                "retry.multiplier must be a non-negative number".into(),
            ));
        }
        if retry
            .rate_limit_schedule_secs
            .iter()
            .any(|s| !s.is_finite() || *s < 0.0)
        {
            return Err(SwitchyardError::Configuration(
                "retry.rate_limit_schedule_secs entries must be non-negative".into(),
            ));
        }
        if self.tool_loop.max_iterations == 0 {
            return Err(SwitchyardError::Configuration(
                "tool_loop.max_iterations must be at least 1".into(),
            ));
        }
        if self.rate_limit.enabled
            && (self.rate_limit.requests_per_minute == 0 || self.rate_limit.burst == 0)
        {
            return Err(SwitchyardError::Configuration(
                "rate_limit.requests_per_minute and rate_limit.burst must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// `config.toml` inside the platform config directory.
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "switchyard", "switchyard")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}
