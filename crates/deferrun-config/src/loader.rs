//! Configuration loader.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::schema::Config;

const CONFIG_FILE_NAME: &str = "config.toml";

/// Configuration loader with environment variable substitution.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let content = fs::read_to_string(path)?;
        Self::load_str(&content)
    }

    /// Load configuration from a string.
    pub fn load_str(content: &str) -> Result<Config, ConfigError> {
        let expanded = Self::expand_env_vars(content)?;
        let config: Config = toml::from_str(&expanded)?;
        Ok(config)
    }

    /// Load `path` if given, else the default file if it exists, else defaults.
    ///
    /// An explicitly named file must exist.
    pub fn load_or_default(path: Option<&Path>) -> Result<Config, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::load(&path),
                _ => Ok(Config::default()),
            },
        }
    }

    /// `~/.deferrun/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".deferrun").join(CONFIG_FILE_NAME))
    }

    /// Expand environment variables in the format `${VAR}`.
    fn expand_env_vars(content: &str) -> Result<String, ConfigError> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}")
            .map_err(|e| ConfigError::InvalidFormat(e.to_string()))?;

        let mut result = content.to_string();
        for cap in re.captures_iter(content) {
            let var_name = &cap[1];
            let var_value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotSet(var_name.to_string()))?;
            result = result.replace(&cap[0], &var_value);
        }

        Ok(result)
    }

    /// Expand shell-style paths (e.g., `~/.deferrun`).
    pub fn expand_path(path: &str) -> String {
        shellexpand::tilde(path).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deferrun_core::MissedJobPolicy;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_empty_config() {
        let config = ConfigLoader::load_str("").unwrap();
        assert_eq!(config.scheduler.missed_job_policy, MissedJobPolicy::Expire);
        assert!(config.handlers.is_empty());
    }

    #[test]
    fn test_load_full_config() {
        let content = r#"
            [store]
            data_dir = "/var/lib/deferrun"
            payload_retention = "keep"

            [scheduler]
            missed_job_policy = "run_immediately"

            [logging]
            level = "debug"
            file = false

            [handlers.py]
            program = "python3"
            args = ["-u"]
            timeout_secs = 300

            [handlers.sh]
            program = "sh"
        "#;
        let config = ConfigLoader::load_str(content).unwrap();
        assert_eq!(config.store.data_dir, "/var/lib/deferrun");
        assert_eq!(config.scheduler.missed_job_policy, MissedJobPolicy::RunImmediately);
        assert_eq!(config.logging.level, "debug");
        assert!(!config.logging.file);
        assert_eq!(config.handlers.len(), 2);

        let py = &config.handlers["py"];
        assert_eq!(py.program, "python3");
        assert_eq!(py.args, vec!["-u"]);
        assert_eq!(py.timeout_secs, Some(300));
        assert!(config.handlers["sh"].timeout_secs.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[logging]").unwrap();
        writeln!(file, "level = \"warn\"").unwrap();

        let config = ConfigLoader::load(file.path()).unwrap();
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = ConfigLoader::load(Path::new("/nonexistent/path/config.toml"));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_load_or_default_requires_named_file() {
        let result = ConfigLoader::load_or_default(Some(Path::new("/nonexistent/deferrun.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_invalid_toml() {
        let result = ConfigLoader::load_str("invalid = [unclosed");
        assert!(matches!(result, Err(ConfigError::TomlParse(_))));
    }

    #[test]
    fn test_expand_env_vars() {
        // SAFETY: test-only variable name, not read anywhere else
        unsafe {
            std::env::set_var("DEFERRUN_TEST_PROGRAM", "python3.12");
        }
        let content = r#"
            [handlers.py]
            program = "${DEFERRUN_TEST_PROGRAM}"
        "#;
        let config = ConfigLoader::load_str(content).unwrap();
        assert_eq!(config.handlers["py"].program, "python3.12");
        unsafe {
            std::env::remove_var("DEFERRUN_TEST_PROGRAM");
        }
    }

    #[test]
    fn test_expand_env_vars_not_set() {
        let content = "value = \"${DEFERRUN_NONEXISTENT_VAR_12345}\"";
        let result = ConfigLoader::expand_env_vars(content);
        assert!(matches!(result, Err(ConfigError::EnvVarNotSet(name)) if name == "DEFERRUN_NONEXISTENT_VAR_12345"));
    }

    #[test]
    fn test_expand_env_vars_no_vars() {
        let content = "value = \"no variables here\"";
        let expanded = ConfigLoader::expand_env_vars(content).unwrap();
        assert_eq!(expanded, content);
    }

    #[test]
    fn test_expand_path() {
        assert_eq!(ConfigLoader::expand_path("/usr/local/bin"), "/usr/local/bin");
        let expanded = ConfigLoader::expand_path("~/test");
        assert!(!expanded.starts_with('~'));
        assert!(expanded.ends_with("/test"));
    }
}
