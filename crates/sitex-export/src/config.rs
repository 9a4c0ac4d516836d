//! Export configuration: a TOML file merged with `SITEX_` environment
//! variables.

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use crate::{ExportError, Result};

pub const DEFAULT_EXPORT_DIR_NAME: &str = "simple-wp-site-exporter-exports";
pub const DEFAULT_ADMIN_URL: &str = "http://localhost/wp-admin/";

/// Budget assumed when the configured execution limit cannot be read.
pub const FALLBACK_EXECUTION_TIME: u64 = 30;

/// Host execution-time limit as configured, which may not be numeric.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimeLimit {
    Seconds(i64),
    Text(String),
}

impl Default for TimeLimit {
    fn default() -> Self {
        Self::Seconds(FALLBACK_EXECUTION_TIME as i64)
    }
}

impl TimeLimit {
    /// Limit in seconds; `0` means unlimited.
    pub fn seconds(&self) -> u64 {
        match self {
            Self::Seconds(n) => u64::try_from(*n).unwrap_or(FALLBACK_EXECUTION_TIME),
            Self::Text(text) => text.trim().parse().unwrap_or(FALLBACK_EXECUTION_TIME),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Web root that gets archived.
    pub site_root: PathBuf,
    pub upload_dir: PathBuf,
    pub upload_url: String,
    /// Download and delete requests must carry a referer under this URL.
    pub admin_url: String,
    pub site_name: String,
    pub export_dir_name: String,
    pub state_file: Option<PathBuf>,
    pub max_execution_time: TimeLimit,
    pub exec_enabled: bool,
    pub deletion_delay_secs: u64,
    pub rate_limit_secs: u64,
    pub log_filter: String,
    /// User the CLI acts as.
    pub operator_user_id: u64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            site_root: PathBuf::new(),
            upload_dir: PathBuf::new(),
            upload_url: String::new(),
            admin_url: DEFAULT_ADMIN_URL.to_string(),
            site_name: "site".to_string(),
            export_dir_name: DEFAULT_EXPORT_DIR_NAME.to_string(),
            state_file: None,
            max_execution_time: TimeLimit::default(),
            exec_enabled: true,
            deletion_delay_secs: 300,
            rate_limit_secs: 60,
            log_filter: "info".to_string(),
            operator_user_id: 1,
        }
    }
}

impl ExportConfig {
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed("SITEX_"))
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config: Self = Self::figment(path)
            .extract()
            .map_err(|e| ExportError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.upload_dir.as_os_str().is_empty() || self.upload_url.trim().is_empty() {
            return Err(ExportError::Configuration(
                "upload directory or URL is not set".into(),
            ));
        }
        if self.site_root.as_os_str().is_empty() {
            return Err(ExportError::Configuration("site root is not set".into()));
        }
        let name = &self.export_dir_name;
        if name.is_empty() || name.contains(['/', '\\']) || name.contains("..") {
            return Err(ExportError::Configuration(format!(
                "invalid export directory name '{name}'"
            )));
        }
        Ok(())
    }

    pub fn state_file(&self) -> PathBuf {
        self.state_file
            .clone()
            .unwrap_or_else(|| self.upload_dir.join(".sitex-state.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_defaults_and_file_values() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "sitex.toml",
                r#"
                site_root = "/var/www/html"
                upload_dir = "/var/www/html/wp-content/uploads"
                upload_url = "https://example.com/wp-content/uploads"
                site_name = "Example Blog"
                "#,
            )?;
            let config = ExportConfig::load(Some(Path::new("sitex.toml"))).map_err(|e| e.to_string())?;
            assert_eq!(config.site_name, "Example Blog");
            assert_eq!(config.export_dir_name, DEFAULT_EXPORT_DIR_NAME);
            assert_eq!(config.deletion_delay_secs, 300);
            assert_eq!(config.rate_limit_secs, 60);
            assert!(config.exec_enabled);
            assert_eq!(
                config.state_file(),
                PathBuf::from("/var/www/html/wp-content/uploads/.sitex-state.json")
            );
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "sitex.toml",
                r#"
                site_root = "/srv"
                upload_dir = "/srv/uploads"
                upload_url = "https://example.com/uploads"
                "#,
            )?;
            jail.set_env("SITEX_EXEC_ENABLED", "false");
            jail.set_env("SITEX_MAX_EXECUTION_TIME", "unlimited-ish");
            let config = ExportConfig::load(Some(Path::new("sitex.toml"))).map_err(|e| e.to_string())?;
            assert!(!config.exec_enabled);
            assert_eq!(config.max_execution_time.seconds(), FALLBACK_EXECUTION_TIME);
            Ok(())
        });
    }

    #[test]
    fn test_missing_upload_dir_is_configuration_error() {
        Jail::expect_with(|jail| {
            jail.create_file("sitex.toml", r#"site_root = "/srv""#)?;
            let result = ExportConfig::load(Some(Path::new("sitex.toml")));
            assert!(matches!(result, Err(ExportError::Configuration(_))));
            Ok(())
        });
    }

    #[test]
    fn test_time_limit_parsing() {
        assert_eq!(TimeLimit::Seconds(0).seconds(), 0);
        assert_eq!(TimeLimit::Seconds(-1).seconds(), FALLBACK_EXECUTION_TIME);
        assert_eq!(TimeLimit::Text("120".into()).seconds(), 120);
        assert_eq!(TimeLimit::Text("".into()).seconds(), FALLBACK_EXECUTION_TIME);
    }
}
