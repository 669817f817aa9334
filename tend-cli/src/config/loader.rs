use super::types::{DEFAULT_LOG_FILTER, RawTendConfig, TendConfig};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load merged configuration (user + project + environment)
    pub fn load() -> Result<TendConfig> {
        Self::load_from(&Self::user_config_path(), &Self::project_config_path())
    }

    /// Load from explicit layer paths; missing files are skipped
    pub fn load_from(user_path: &Path, project_path: &Path) -> Result<TendConfig> {
        let mut raw = RawTendConfig::default();

        // Layer 1: User config
        if let Some(user_config) = Self::read_layer(user_path)? {
            raw = Self::merge_raw(raw, user_config);
        }

        // Layer 2: Project config
        if let Some(project_config) = Self::read_layer(project_path)? {
            raw = Self::merge_raw(raw, project_config);
        }

        // Layer 3: Environment
        if let Ok(dir) = std::env::var("TEND_DATA_DIR") {
            raw.data_dir = Some(PathBuf::from(dir));
        }

        Ok(Self::finalize(raw))
    }

    /// Get user config path (`$XDG_CONFIG_HOME/tend/config.toml`)
    pub fn user_config_path() -> PathBuf {
        tend_paths::config_dir().join("config.toml")
    }

    /// Get project config path
    /// Can be overridden with TEND_PROJECT_CONFIG_DIR env var (useful for isolated tests)
    pub fn project_config_path() -> PathBuf {
        if let Ok(dir) = std::env::var("TEND_PROJECT_CONFIG_DIR") {
            PathBuf::from(dir).join("config.toml")
        } else {
            PathBuf::from(".tend/config.toml")
        }
    }

    fn read_layer(path: &Path) -> Result<Option<RawTendConfig>> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let raw = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(Some(raw))
    }

    /// Merge two raw configs (overlay values override base only if explicitly set)
    fn merge_raw(base: RawTendConfig, overlay: RawTendConfig) -> RawTendConfig {
        RawTendConfig {
            data_dir: overlay.data_dir.or(base.data_dir),
            log_filter: overlay.log_filter.or(base.log_filter),
        }
    }

    /// Convert raw config to final config with defaults applied
    fn finalize(raw: RawTendConfig) -> TendConfig {
        TendConfig {
            data_dir: raw.data_dir.unwrap_or_else(tend_paths::data_dir),
            log_filter: raw
                .log_filter
                .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    // ==================== Merge Tests ====================

    #[test]
    fn test_merge_overlay_wins_when_set() {
        let base = RawTendConfig {
            data_dir: Some(PathBuf::from("/base")),
            log_filter: Some("warn".to_string()),
        };
        let overlay = RawTendConfig {
            data_dir: Some(PathBuf::from("/overlay")),
            log_filter: None,
        };

        let merged = ConfigLoader::merge_raw(base, overlay);

        assert_eq!(merged.data_dir, Some(PathBuf::from("/overlay")));
        assert_eq!(merged.log_filter.as_deref(), Some("warn"));
    }

    #[test]
    fn test_finalize_applies_defaults() {
        let config = ConfigLoader::finalize(RawTendConfig::default());

        assert_eq!(config.log_filter, DEFAULT_LOG_FILTER);
        assert_eq!(config.data_dir, tend_paths::data_dir());
    }

    // ==================== Load Tests ====================

    #[test]
    #[serial]
    fn test_load_layers_user_then_project() {
        let temp_dir = TempDir::new().unwrap();
        let user = write(
            &temp_dir,
            "user.toml",
            "data_dir = \"/user/data\"\nlog_filter = \"debug\"\n",
        );
        let project = write(&temp_dir, "project.toml", "data_dir = \"/project/data\"\n");

        // SAFETY: serialized with other env-mutating tests
        unsafe { std::env::remove_var("TEND_DATA_DIR") };
        let config = ConfigLoader::load_from(&user, &project).unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/project/data"));
        assert_eq!(config.log_filter, "debug");
    }

    #[test]
    #[serial]
    fn test_load_skips_missing_files() {
        let temp_dir = TempDir::new().unwrap();

        // SAFETY: serialized with other env-mutating tests
        unsafe { std::env::remove_var("TEND_DATA_DIR") };
        let config = ConfigLoader::load_from(
            &temp_dir.path().join("absent-user.toml"),
            &temp_dir.path().join("absent-project.toml"),
        )
        .unwrap();

        assert_eq!(config.log_filter, DEFAULT_LOG_FILTER);
    }

    #[test]
    #[serial]
    fn test_env_overrides_data_dir() {
        let temp_dir = TempDir::new().unwrap();
        let project = write(&temp_dir, "project.toml", "data_dir = \"/project/data\"\n");

        // SAFETY: serialized with other env-mutating tests
        unsafe { std::env::set_var("TEND_DATA_DIR", "/env/data") };
        let config = ConfigLoader::load_from(&temp_dir.path().join("absent.toml"), &project);
        unsafe { std::env::remove_var("TEND_DATA_DIR") };

        assert_eq!(config.unwrap().data_dir, PathBuf::from("/env/data"));
    }

    #[test]
    #[serial]
    fn test_invalid_toml_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let project = write(&temp_dir, "project.toml", "data_dir = [not toml");

        let result = ConfigLoader::load_from(&temp_dir.path().join("absent.toml"), &project);

        let message = format!("{:#}", result.unwrap_err());
        assert!(message.contains("Failed to parse config file"));
    }

    #[test]
    #[serial]
    fn test_project_config_path_env_override() {
        // SAFETY: serialized with other env-mutating tests
        unsafe { std::env::set_var("TEND_PROJECT_CONFIG_DIR", "/tmp/tend-project") };
        let path = ConfigLoader::project_config_path();
        unsafe { std::env::remove_var("TEND_PROJECT_CONFIG_DIR") };

        assert_eq!(path, PathBuf::from("/tmp/tend-project/config.toml"));
    }

    #[test]
    #[serial]
    fn test_project_config_path_default() {
        // SAFETY: serialized with other env-mutating tests
        unsafe { std::env::remove_var("TEND_PROJECT_CONFIG_DIR") };
        assert_eq!(
            ConfigLoader::project_config_path(),
            PathBuf::from(".tend/config.toml")
        );
    }
}
