//! Link configuration
//!
//! Layers, lowest to highest priority:
//! 1. built-in defaults
//! 2. optional YAML file
//! 3. `RECIPE_*` environment variables (nested keys joined with `__`,
//!    e.g. `RECIPE_REALTIME__ENABLED=false`)

use common::serde_helpers::{bool_true, deserialize_optional_u64};
use errors::{RecipeError, RecipeResult};
use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Environment prefix for every link setting
pub const ENV_PREFIX: &str = "RECIPE_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Base URL of the backend project, e.g. `https://xyz.supabase.co`
    #[serde(default)]
    pub backend_url: String,

    /// Public (anon) API key, sent both as `apikey` and as bearer token
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_table")]
    pub table: String,

    /// Column sorted descending by `fetch_all`
    #[serde(default = "default_order_column")]
    pub order_column: String,

    #[serde(default = "default_fetch_limit")]
    pub fetch_limit: u32,

    /// Per request timeout; requests wait indefinitely when unset
    #[serde(default, deserialize_with = "deserialize_optional_u64")]
    pub request_timeout_secs: Option<u64>,

    #[serde(default)]
    pub realtime: RealtimeConfig,

    #[serde(default)]
    pub migration: MigrationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Build a realtime transport at all
    #[serde(default = "bool_true")]
    pub enabled: bool,

    #[serde(default = "default_schema")]
    pub schema: String,

    #[serde(default = "default_channel")]
    pub channel: String,

    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Rows per bulk insert
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_table() -> String {
    "recipes".to_string()
}

fn default_order_column() -> String {
    "published_date".to_string()
}

fn default_fetch_limit() -> u32 {
    1000
}

fn default_schema() -> String {
    "public".to_string()
}

fn default_channel() -> String {
    "recipes-changes".to_string()
}

fn default_heartbeat_interval() -> u64 {
    25
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_batch_size() -> usize {
    500
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            backend_url: String::new(),
            api_key: String::new(),
            table: default_table(),
            order_column: default_order_column(),
            fetch_limit: default_fetch_limit(),
            request_timeout_secs: None,
            realtime: RealtimeConfig::default(),
            migration: MigrationConfig::default(),
        }
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            schema: default_schema(),
            channel: default_channel(),
            heartbeat_interval_secs: default_heartbeat_interval(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
        }
    }
}

impl LinkConfig {
    /// Minimal config pointing at `backend_url`, everything else default
    pub fn new(backend_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            backend_url: backend_url.into(),
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    /// Load defaults, then `path` (if given), then the environment
    pub fn load(path: Option<&Path>) -> RecipeResult<Self> {
        let mut figment = Figment::from(Serialized::defaults(LinkConfig::default()));

        if let Some(path) = path {
            if !path.exists() {
                return Err(RecipeError::FileNotFound(path.display().to_string()));
            }
            figment = figment.merge(Yaml::file(path));
        }

        let config: LinkConfig = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> RecipeResult<()> {
        if self.backend_url.trim().is_empty() {
            return Err(RecipeError::MissingConfig("backend_url".to_string()));
        }
        if self.api_key.trim().is_empty() {
            return Err(RecipeError::MissingConfig("api_key".to_string()));
        }

        let url = Url::parse(self.backend_url.trim()).map_err(|e| RecipeError::InvalidConfig {
            field: "backend_url".to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(RecipeError::InvalidConfig {
                field: "backend_url".to_string(),
                reason: format!("unsupported scheme '{}', expected http(s)", url.scheme()),
            });
        }

        if self.table.trim().is_empty() {
            return Err(RecipeError::MissingConfig("table".to_string()));
        }
        if self.fetch_limit == 0 {
            return Err(RecipeError::InvalidConfig {
                field: "fetch_limit".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }
        if self.request_timeout_secs == Some(0) {
            return Err(RecipeError::InvalidConfig {
                field: "request_timeout_secs".to_string(),
                reason: "must be greater than 0 when set".to_string(),
            });
        }
        if self.realtime.heartbeat_interval_secs == 0 {
            return Err(RecipeError::InvalidConfig {
                field: "realtime.heartbeat_interval_secs".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }
        if self.realtime.connect_timeout_secs == 0 {
            return Err(RecipeError::InvalidConfig {
                field: "realtime.connect_timeout_secs".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }
        if self.migration.batch_size == 0 {
            return Err(RecipeError::InvalidConfig {
                field: "migration.batch_size".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }

        Ok(())
    }

    /// Backend URL without trailing slash
    pub fn base_url(&self) -> &str {
        self.backend_url.trim().trim_end_matches('/')
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

impl RealtimeConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_fixed_query() {
        let config = LinkConfig::default();
        assert_eq!(config.table, "recipes");
        assert_eq!(config.order_column, "published_date");
        assert_eq!(config.fetch_limit, 1000);
        assert_eq!(config.request_timeout(), None);
        assert!(config.realtime.enabled);
        assert_eq!(config.realtime.channel, "recipes-changes");
        assert_eq!(config.realtime.schema, "public");
        assert_eq!(config.realtime.heartbeat_interval(), Duration::from_secs(25));
        assert_eq!(config.migration.batch_size, 500);
    }

    #[test]
    fn test_validation() {
        assert!(matches!(
            LinkConfig::default().validate(),
            Err(RecipeError::MissingConfig(_))
        ));
        assert!(matches!(
            LinkConfig::new("https://x.example", "").validate(),
            Err(RecipeError::MissingConfig(_))
        ));
        assert!(matches!(
            LinkConfig::new("ftp://x.example", "key").validate(),
            Err(RecipeError::InvalidConfig { .. })
        ));

        let mut config = LinkConfig::new("https://x.example/", "key");
        assert!(config.validate().is_ok());
        assert_eq!(config.base_url(), "https://x.example");

        config.migration.batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "backend_url: https://proj.example\n\
             api_key: anon\n\
             request_timeout_secs: \"15\"\n\
             realtime:\n  enabled: false\n\
             migration:\n  batch_size: 50"
        )
        .unwrap();

        let config = LinkConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.base_url(), "https://proj.example");
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(15)));
        assert!(!config.realtime.enabled);
        assert_eq!(config.realtime.channel, "recipes-changes");
        assert_eq!(config.migration.batch_size, 50);
    }

    #[test]
    fn test_missing_file() {
        let err = LinkConfig::load(Some(Path::new("/nonexistent/recipe.yaml"))).unwrap_err();
        assert!(matches!(err, RecipeError::FileNotFound(_)));
    }

    #[test]
    fn test_env_overrides_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "link.yaml",
                "backend_url: https://file.example\napi_key: from-file\n",
            )?;
            jail.set_env("RECIPE_API_KEY", "from-env");
            jail.set_env("RECIPE_REALTIME__CHANNEL", "custom");

            let config = LinkConfig::load(Some(Path::new("link.yaml")))
                .map_err(|e| e.to_string())?;
            assert_eq!(config.backend_url, "https://file.example");
            assert_eq!(config.api_key, "from-env");
            assert_eq!(config.realtime.channel, "custom");
            Ok(())
        });
    }
}
