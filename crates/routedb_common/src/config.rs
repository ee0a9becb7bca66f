use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{StatementError, StatementResult};

/// Top-level router configuration (`routedb.toml`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteConfig {
    #[serde(default)]
    pub fanout: FanoutConfig,
    #[serde(default)]
    pub defaults: StatementDefaults,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// How the execute phase of a data operation is scheduled across targets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// One target after another, in router order.
    #[default]
    Sequential,
    /// Targets run concurrently on scoped threads. Failures are still
    /// reported by router order, not completion order.
    Parallel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FanoutConfig {
    pub mode: ExecutionMode,
    /// Upper bound on targets executing at once in parallel mode (0 = no bound).
    pub max_parallelism: usize,
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Sequential,
            max_parallelism: 0,
        }
    }
}

/// Values the statement getters report before any setter is called.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatementDefaults {
    /// -1 means "not set"; targets apply their own limit.
    pub max_rows: i32,
    pub max_field_size: i32,
    /// Seconds, 0 = no timeout.
    pub query_timeout_secs: i32,
    pub fetch_size: i32,
    pub escape_processing: bool,
    pub poolable: bool,
}

impl Default for StatementDefaults {
    fn default() -> Self {
        Self {
            max_rows: -1,
            max_field_size: 65_535,
            query_timeout_secs: 0,
            fetch_size: 0,
            escape_processing: true,
            poolable: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is not set.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info,routedb=debug".to_string(),
        }
    }
}

impl RouteConfig {
    pub fn from_toml_str(content: &str) -> StatementResult<Self> {
        toml::from_str(content)
            .map_err(|e| StatementError::invalid_argument(format!("config parse error: {e}")))
    }

    pub fn to_toml_string(&self) -> StatementResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| StatementError::Internal(format!("config serialize error: {e}")))
    }

    /// Load from `path`. A missing file yields the defaults; an unreadable or
    /// malformed file is an error.
    pub fn load(path: impl AsRef<Path>) -> StatementResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| {
            StatementError::invalid_argument(format!("cannot read {}: {e}", path.display()))
        })?;
        let config = Self::from_toml_str(&content)?;
        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = RouteConfig::default();
        assert_eq!(cfg.fanout.mode, ExecutionMode::Sequential);
        assert_eq!(cfg.defaults.max_rows, -1);
        assert_eq!(cfg.defaults.max_field_size, 65_535);
        assert!(cfg.defaults.poolable);
        assert!(cfg.defaults.escape_processing);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let cfg = RouteConfig::from_toml_str(
            r#"
            [fanout]
            mode = "parallel"
            max_parallelism = 4

            [defaults]
            fetch_size = 500
            "#,
        )
        .unwrap();
        assert_eq!(cfg.fanout.mode, ExecutionMode::Parallel);
        assert_eq!(cfg.fanout.max_parallelism, 4);
        assert_eq!(cfg.defaults.fetch_size, 500);
        assert_eq!(cfg.defaults.max_rows, -1);
        assert_eq!(cfg.logging, LoggingConfig::default());
    }

    #[test]
    fn test_malformed_toml_is_invalid_argument() {
        let err = RouteConfig::from_toml_str("[fanout]\nmode = \"sideways\"").unwrap_err();
        assert!(matches!(err, StatementError::InvalidArgument(_)));
    }

    #[test]
    fn test_round_trip_through_file() {
        let mut cfg = RouteConfig::default();
        cfg.fanout.mode = ExecutionMode::Parallel;
        cfg.defaults.query_timeout_secs = 30;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(cfg.to_toml_string().unwrap().as_bytes()).unwrap();

        let loaded = RouteConfig::load(file.path()).unwrap();
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = RouteConfig::load(dir.path().join("absent.toml")).unwrap();
        assert_eq!(loaded, RouteConfig::default());
    }
}
