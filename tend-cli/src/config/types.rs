use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tend_core::SupervisorConfig;

/// Log filter used when neither `--verbose` nor `log_filter` is given
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Configuration as stored in TOML files (with optional fields for merging)
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct RawTendConfig {
    /// Root of daemon records, PID files and logs
    pub data_dir: Option<PathBuf>,

    /// tracing-subscriber filter directive
    pub log_filter: Option<String>,
}

/// Final configuration with defaults applied
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TendConfig {
    pub data_dir: PathBuf,
    pub log_filter: String,
}

impl Default for TendConfig {
    fn default() -> Self {
        Self {
            data_dir: tend_paths::data_dir(),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl TendConfig {
    pub fn supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig::default().with_data_dir(&self.data_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_config_parses_partial_toml() {
        let raw: RawTendConfig = toml::from_str(r#"log_filter = "tend_core=debug""#).unwrap();

        assert!(raw.data_dir.is_none());
        assert_eq!(raw.log_filter.as_deref(), Some("tend_core=debug"));
    }

    #[test]
    fn test_raw_config_parses_empty_file() {
        let raw: RawTendConfig = toml::from_str("").unwrap();
        assert_eq!(raw, RawTendConfig::default());
    }

    #[test]
    fn test_supervisor_config_uses_data_dir() {
        let config = TendConfig {
            data_dir: PathBuf::from("/srv/tend"),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        };

        assert_eq!(config.supervisor_config().data_dir, PathBuf::from("/srv/tend"));
    }
}
