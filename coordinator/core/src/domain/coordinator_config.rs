// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Coordinator Configuration Types
//
// Defines the configuration schema for a Chorus coordinator process:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - Persistent store connection
// - Dispatch timing (base unit and jitter window)
// - Cache refresh cadence and restriction policy
// - Admin notification endpoint
// - Observability settings

use chorus_schedule::{DispatchScheduler, JitterWindow, ScheduleError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const API_VERSION: &str = "chorus/v1";
pub const KIND: &str = "CoordinatorConfig";

/// Top-level Kubernetes-style coordinator configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfigManifest {
    /// API version (must be "chorus/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "CoordinatorConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    pub spec: CoordinatorConfigSpec,
}

/// Manifest metadata (Kubernetes-style)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    /// Human-readable coordinator name
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfigSpec {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub dispatch: DispatchConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub restrictions: RestrictionPolicyConfig,

    /// Admin notification sink; notifications are only logged when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notifications: Option<NotificationConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub observability: Option<ObservabilityConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Connection string (supports "env:VAR_NAME")
    #[serde(default = "default_database_url")]
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Delay added per position in the dispatch order
    #[serde(with = "humantime_serde", default = "default_base_unit")]
    pub base_unit: Duration,

    #[serde(with = "humantime_serde", default = "default_jitter_min")]
    pub jitter_min: Duration,

    #[serde(with = "humantime_serde", default = "default_jitter_max")]
    pub jitter_max: Duration,

    /// Recently handled event ids remembered per agent
    #[serde(default = "default_seen_event_capacity")]
    pub seen_event_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(with = "humantime_serde", default = "default_refresh_interval")]
    pub refresh_interval: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestrictionPolicyConfig {
    /// Restrictions reaching this far into the future are treated as permanent
    #[serde(with = "humantime_serde", default = "default_permanent_after")]
    pub permanent_after: Duration,

    /// Added on top of every rate-limit wait
    #[serde(with = "humantime_serde", default = "default_rate_limit_margin")]
    pub rate_limit_margin: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Bot API base URL
    #[serde(default = "default_notification_endpoint")]
    pub endpoint: String,

    /// Bot token (supports "env:VAR_NAME")
    pub bot_token: String,

    /// Chat receiving the notifications (supports "env:VAR_NAME")
    pub chat_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<MetricsConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (e.g., "info", "debug", "trace")
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format ("json" or "text")
    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

// Default value functions
fn default_database_url() -> String {
    "env:DATABASE_URL".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_base_unit() -> Duration {
    Duration::from_millis(500)
}

fn default_jitter_min() -> Duration {
    Duration::from_millis(100)
}

fn default_jitter_max() -> Duration {
    Duration::from_millis(400)
}

fn default_seen_event_capacity() -> usize {
    1024
}

fn default_refresh_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_permanent_after() -> Duration {
    Duration::from_secs(366 * 24 * 60 * 60)
}

fn default_rate_limit_margin() -> Duration {
    Duration::from_secs(2)
}

fn default_notification_endpoint() -> String {
    "https://api.telegram.org".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            base_unit: default_base_unit(),
            jitter_min: default_jitter_min(),
            jitter_max: default_jitter_max(),
            seen_event_capacity: default_seen_event_capacity(),
        }
    }
}

impl DispatchConfig {
    pub fn scheduler(&self) -> Result<DispatchScheduler, ScheduleError> {
        DispatchScheduler::new(
            self.base_unit,
            JitterWindow::new(self.jitter_min, self.jitter_max),
        )
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            refresh_interval: default_refresh_interval(),
        }
    }
}

impl Default for RestrictionPolicyConfig {
    fn default() -> Self {
        Self {
            permanent_after: default_permanent_after(),
            rate_limit_margin: default_rate_limit_margin(),
        }
    }
}

impl Default for CoordinatorConfigSpec {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            dispatch: DispatchConfig::default(),
            cache: CacheConfig::default(),
            restrictions: RestrictionPolicyConfig::default(),
            notifications: None,
            observability: None,
        }
    }
}

impl Default for CoordinatorConfigManifest {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "chorus".to_string(),
                version: Some("1.0.0".to_string()),
                labels: None,
            },
            spec: CoordinatorConfigSpec::default(),
        }
    }
}

/// Resolve "env:VAR_NAME" references; other values are returned unchanged.
pub fn resolve_env_ref(value: &str) -> anyhow::Result<String> {
    match value.strip_prefix("env:") {
        Some(var) => std::env::var(var)
            .map_err(|_| anyhow::anyhow!("Environment variable '{}' is not set", var)),
        None => Ok(value.to_string()),
    }
}

impl CoordinatorConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. CHORUS_CONFIG_PATH environment variable
    /// 2. ./chorus-config.yaml (working directory)
    /// 3. ~/.chorus/config.yaml (user home)
    /// 4. /etc/chorus/config.yaml (system, Unix) or C:\ProgramData\Chorus\config.yaml (Windows)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("CHORUS_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./chorus-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".chorus").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        #[cfg(unix)]
        let system_config = PathBuf::from("/etc/chorus/config.yaml");
        #[cfg(windows)]
        let system_config = PathBuf::from("C:\\ProgramData\\Chorus\\config.yaml");

        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit CLI path fails if missing or invalid
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path).map_err(|e| {
                anyhow::anyhow!("Failed to load config at {:?}: {}", path, e)
            })?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            if !url.is_empty() && self.spec.database.url != url {
                tracing::info!("Environment override: DATABASE_URL");
                self.spec.database.url = url;
            }
        }

        if let Ok(val) = std::env::var("CHORUS_REFRESH_INTERVAL_SECS") {
            match val.parse::<u64>() {
                Ok(secs) if secs > 0 => {
                    tracing::info!("Environment override: CHORUS_REFRESH_INTERVAL_SECS={}", secs);
                    self.spec.cache.refresh_interval = Duration::from_secs(secs);
                }
                _ => {
                    tracing::warn!(
                        "Invalid value for CHORUS_REFRESH_INTERVAL_SECS: '{}'. Expected a positive integer. Ignoring.",
                        val
                    );
                }
            }
        }
    }

    /// Connection string with any "env:" reference resolved
    pub fn database_url(&self) -> anyhow::Result<String> {
        resolve_env_ref(&self.spec.database.url)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        if self.spec.database.url.is_empty() {
            anyhow::bail!("spec.database.url cannot be empty");
        }

        if self.spec.database.max_connections == 0 {
            anyhow::bail!("spec.database.max_connections must be positive");
        }

        self.spec
            .dispatch
            .scheduler()
            .map_err(|e| anyhow::anyhow!("Invalid spec.dispatch: {}", e))?;

        if self.spec.dispatch.seen_event_capacity == 0 {
            anyhow::bail!("spec.dispatch.seen_event_capacity must be positive");
        }

        if self.spec.cache.refresh_interval.is_zero() {
            anyhow::bail!("spec.cache.refresh_interval must be positive");
        }

        if self.spec.restrictions.permanent_after.is_zero() {
            anyhow::bail!("spec.restrictions.permanent_after must be positive");
        }

        if let Some(notifications) = &self.spec.notifications {
            if notifications.endpoint.is_empty() {
                anyhow::bail!("spec.notifications.endpoint cannot be empty");
            }
            if notifications.bot_token.is_empty() {
                anyhow::bail!("spec.notifications.bot_token cannot be empty");
            }
            if notifications.chat_id.is_empty() {
                anyhow::bail!("spec.notifications.chat_id cannot be empty");
            }
        }

        Ok(())
    }
}

/// Annotated sample written by `chorus config generate`
pub const SAMPLE_CONFIG_YAML: &str = r#"apiVersion: chorus/v1
kind: CoordinatorConfig
metadata:
  name: chorus-node
spec:
  database:
    # "env:NAME" reads the value from the environment
    url: env:DATABASE_URL
    max_connections: 5
  dispatch:
    # position p waits p * base_unit + jitter; jitter_max - jitter_min <= base_unit
    base_unit: 500ms
    jitter_min: 100ms
    jitter_max: 400ms
    seen_event_capacity: 1024
  cache:
    refresh_interval: 60s
  restrictions:
    permanent_after: 366days
    rate_limit_margin: 2s
  notifications:
    endpoint: https://api.telegram.org
    bot_token: env:BOT_TOKEN
    chat_id: env:CHAT_ID
  observability:
    logging:
      level: info
      format: text
    metrics:
      enabled: false
      port: 9090
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_manifest() {
        let manifest = CoordinatorConfigManifest::default();
        assert_eq!(manifest.api_version, "chorus/v1");
        assert_eq!(manifest.kind, "CoordinatorConfig");
        assert_eq!(manifest.spec.dispatch.base_unit, Duration::from_millis(500));
        assert!(manifest.spec.notifications.is_none());
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_sample_parses_and_validates() {
        let manifest = CoordinatorConfigManifest::from_yaml_str(SAMPLE_CONFIG_YAML).unwrap();
        assert_eq!(manifest.metadata.name, "chorus-node");
        assert_eq!(manifest.spec.cache.refresh_interval, Duration::from_secs(60));
        assert_eq!(
            manifest.spec.restrictions.permanent_after,
            Duration::from_secs(366 * 86_400)
        );
        assert_eq!(
            manifest.spec.notifications.as_ref().map(|n| n.chat_id.as_str()),
            Some("env:CHAT_ID")
        );
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_minimal_spec_uses_defaults() {
        let yaml = r#"
apiVersion: chorus/v1
kind: CoordinatorConfig
metadata:
  name: minimal
spec: {}
"#;
        let manifest = CoordinatorConfigManifest::from_yaml_str(yaml).unwrap();
        assert_eq!(manifest.spec.dispatch.jitter_max, Duration::from_millis(400));
        assert_eq!(manifest.spec.database.url, "env:DATABASE_URL");
        assert_eq!(manifest.spec.dispatch.seen_event_capacity, 1024);
    }

    #[test]
    fn test_validation() {
        let mut manifest = CoordinatorConfigManifest::default();

        manifest.api_version = "wrong/v1".to_string();
        assert!(manifest.validate().is_err());
        manifest.api_version = API_VERSION.to_string();

        manifest.kind = "WrongKind".to_string();
        assert!(manifest.validate().is_err());
        manifest.kind = KIND.to_string();

        // jitter window wider than the base unit lets positions overlap
        manifest.spec.dispatch.jitter_min = Duration::ZERO;
        manifest.spec.dispatch.jitter_max = Duration::from_millis(800);
        assert!(manifest.validate().is_err());
        manifest.spec.dispatch.jitter_max = Duration::from_millis(400);
        assert!(manifest.validate().is_ok());

        manifest.spec.cache.refresh_interval = Duration::ZERO;
        assert!(manifest.validate().is_err());
        manifest.spec.cache.refresh_interval = Duration::from_secs(30);

        manifest.spec.notifications = Some(NotificationConfig {
            endpoint: default_notification_endpoint(),
            bot_token: String::new(),
            chat_id: "42".to_string(),
        });
        assert!(manifest.validate().is_err());
    }

    #[test]
    fn test_resolve_env_ref() {
        std::env::set_var("CHORUS_TEST_RESOLVE_TOKEN", "s3cret");
        assert_eq!(resolve_env_ref("env:CHORUS_TEST_RESOLVE_TOKEN").unwrap(), "s3cret");
        assert_eq!(resolve_env_ref("plain").unwrap(), "plain");
        assert!(resolve_env_ref("env:CHORUS_TEST_DEFINITELY_UNSET").is_err());
    }

    #[test]
    fn test_yaml_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chorus-config.yaml");

        let mut manifest = CoordinatorConfigManifest::default();
        manifest.metadata.name = "roundtrip".to_string();
        manifest.spec.dispatch.base_unit = Duration::from_millis(750);
        manifest.to_yaml_file(&path).unwrap();

        let loaded = CoordinatorConfigManifest::load_or_default(Some(path)).unwrap();
        assert_eq!(loaded.metadata.name, "roundtrip");
        assert_eq!(loaded.spec.dispatch.base_unit, Duration::from_millis(750));
    }

    #[test]
    fn test_explicit_missing_path_fails() {
        let result = CoordinatorConfigManifest::load_or_default(Some(PathBuf::from(
            "/nonexistent/chorus-config.yaml",
        )));
        assert!(result.is_err());
    }
}
