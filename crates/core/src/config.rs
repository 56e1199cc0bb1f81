//! TOML-based configuration for locsync.
//!
//! Credentials are never stored in the file. The `*_env` fields name
//! environment variables whose values are resolved at runtime via
//! [`AppConfig::resolve_env_vars`]; [`AppConfig::validate`] then rejects a
//! config whose required credentials did not resolve, so a run never starts
//! half-configured.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::ConfigError;
use crate::logging::LogLevel;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level application configuration loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Source CMS settings.
    pub source: SourceConfig,

    /// Target localization platform settings.
    pub target: TargetConfig,

    /// TMX backup settings.
    #[serde(default)]
    pub backup: BackupConfig,

    /// Run log settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

/// Source CMS (Braze-style REST API) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// REST endpoint of the Source instance.
    #[serde(default = "default_source_endpoint")]
    pub endpoint: String,

    /// Environment variable holding the Source API key.
    pub api_key_env: String,

    /// Resolved API key (populated by `resolve_env_vars`).
    #[serde(skip)]
    pub api_key: Option<String>,
}

fn default_source_endpoint() -> String {
    "https://rest.iad-01.braze.com".into()
}

// ---------------------------------------------------------------------------
// Target
// ---------------------------------------------------------------------------

/// Target platform (Transifex-style JSON:API) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// API base URL.
    #[serde(default = "default_target_api_url")]
    pub api_url: String,

    /// Organization slug.
    pub organization: String,

    /// Project slug.
    pub project: String,

    /// Environment variable holding the Target API token.
    pub api_token_env: String,

    /// Resolved token (populated by `resolve_env_vars`).
    #[serde(skip)]
    pub api_token: Option<String>,
}

fn default_target_api_url() -> String {
    "https://rest.api.transifex.com".into()
}

// ---------------------------------------------------------------------------
// Backup
// ---------------------------------------------------------------------------

/// TMX backup settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Take a full-project TMX backup before every sync.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Directory backups are written to. Defaults to the user's Downloads.
    #[serde(default = "default_backup_dir")]
    pub dir: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

fn default_backup_dir() -> Option<PathBuf> {
    dirs::download_dir().or_else(|| dirs::home_dir().map(|h| h.join("Downloads")))
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: default_backup_dir(),
        }
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Run log settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `Normal` or `Debug`.
    #[serde(default)]
    pub level: LogLevel,
}

// ---------------------------------------------------------------------------
// Loading & resolving
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Load an [`AppConfig`] from a TOML file at the given path.
    ///
    /// This does **not** resolve environment variables -- call
    /// [`resolve_env_vars`](Self::resolve_env_vars) afterwards.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Resolve the `*_env` fields from environment variables.
    ///
    /// Missing variables only log a warning here; [`validate`](Self::validate)
    /// is what turns them into errors.
    pub fn resolve_env_vars(&mut self) {
        info!("resolving environment variable references in config");
        self.source.api_key = resolve_optional_env(&self.source.api_key_env, "source.api_key_env");
        self.target.api_token =
            resolve_optional_env(&self.target.api_token_env, "target.api_token_env");
        debug!("environment variable resolution complete");
    }

    /// Validate that all required fields are present and sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_url(&self.source.endpoint, "source.endpoint")?;
        require_url(&self.target.api_url, "target.api_url")?;
        require_slug(&self.target.organization, "target.organization")?;
        require_slug(&self.target.project, "target.project")?;

        if self.source.api_key.is_none() {
            return Err(ConfigError::EnvVarMissing {
                var: self.source.api_key_env.clone(),
                field: "source.api_key_env".into(),
            });
        }
        if self.target.api_token.is_none() {
            return Err(ConfigError::EnvVarMissing {
                var: self.target.api_token_env.clone(),
                field: "target.api_token_env".into(),
            });
        }

        if self.backup.enabled {
            match &self.backup.dir {
                Some(dir) if !dir.as_os_str().is_empty() => {}
                _ => {
                    return Err(ConfigError::InvalidValue {
                        field: "backup.dir".into(),
                        detail: "backup is enabled but no backup directory is set".into(),
                    })
                }
            }
        }

        Ok(())
    }

    /// Convenience: load, resolve, and validate in one call.
    pub fn load_and_resolve<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.resolve_env_vars();
        config.validate()?;
        Ok(config)
    }

    /// `o:{org}:p:{project}`, the Target id of the configured project.
    pub fn project_id(&self) -> String {
        format!("o:{}:p:{}", self.target.organization, self.target.project)
    }

    /// Resolved Source API key.
    pub fn source_api_key(&self) -> Result<&str, ConfigError> {
        self.source
            .api_key
            .as_deref()
            .ok_or_else(|| ConfigError::EnvVarMissing {
                var: self.source.api_key_env.clone(),
                field: "source.api_key_env".into(),
            })
    }

    /// Resolved Target API token.
    pub fn target_api_token(&self) -> Result<&str, ConfigError> {
        self.target
            .api_token
            .as_deref()
            .ok_or_else(|| ConfigError::EnvVarMissing {
                var: self.target.api_token_env.clone(),
                field: "target.api_token_env".into(),
            })
    }
}

fn require_url(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::InvalidValue {
            field: field.into(),
            detail: "URL must not be empty".into(),
        });
    }
    if !(value.starts_with("https://") || value.starts_with("http://")) {
        return Err(ConfigError::InvalidValue {
            field: field.into(),
            detail: format!("'{}' is not an http(s) URL", value),
        });
    }
    Ok(())
}

fn require_slug(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::InvalidValue {
            field: field.into(),
            detail: "slug must not be empty".into(),
        });
    }
    if value.contains(':') || value.contains('/') {
        return Err(ConfigError::InvalidValue {
            field: field.into(),
            detail: format!("slug '{}' must not contain ':' or '/'", value),
        });
    }
    Ok(())
}

/// Try to read an environment variable by name. Returns `Some(value)` on
/// success; logs a warning and returns `None` if the variable is unset.
fn resolve_optional_env(env_name: &str, field: &str) -> Option<String> {
    match std::env::var(env_name) {
        Ok(val) if !val.trim().is_empty() => {
            debug!(field, env_name, "resolved env var");
            Some(val)
        }
        Ok(_) => {
            warn!(field, env_name, "env var is set but empty");
            None
        }
        Err(_) => {
            warn!(field, env_name, "env var not set");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_toml() -> &'static str {
        r#"
[source]
endpoint = "https://rest.fra-01.braze.eu"
api_key_env = "LOCSYNC_TEST_BRAZE_KEY"

[target]
api_url = "https://rest.api.transifex.com"
organization = "acme"
project = "marketing"
api_token_env = "LOCSYNC_TEST_TX_TOKEN"

[backup]
enabled = true
dir = "/tmp/locsync-backups"

[logging]
level = "Debug"
"#
    }

    fn resolved(toml_str: &str) -> AppConfig {
        let mut config: AppConfig = toml::from_str(toml_str).unwrap();
        config.source.api_key = Some("braze-key".into());
        config.target.api_token = Some("tx-token".into());
        config
    }

    #[test]
    fn test_parse_full_config() {
        let config: AppConfig = toml::from_str(sample_toml()).expect("failed to parse toml");
        assert_eq!(config.source.endpoint, "https://rest.fra-01.braze.eu");
        assert_eq!(config.target.organization, "acme");
        assert_eq!(config.target.project, "marketing");
        assert!(config.backup.enabled);
        assert_eq!(config.backup.dir, Some(PathBuf::from("/tmp/locsync-backups")));
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.project_id(), "o:acme:p:marketing");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("locsync.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(sample_toml().as_bytes()).unwrap();

        let config = AppConfig::load_from_file(&path).expect("load_from_file failed");
        assert_eq!(config.target.api_token_env, "LOCSYNC_TEST_TX_TOKEN");
    }

    #[test]
    fn test_file_not_found() {
        let result = AppConfig::load_from_file("/nonexistent/locsync.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_defaults() {
        let minimal = r#"
[source]
api_key_env = "BRAZE_API_KEY"
[target]
organization = "acme"
project = "marketing"
api_token_env = "TX_TOKEN"
"#;
        let config: AppConfig = toml::from_str(minimal).unwrap();
        assert_eq!(config.source.endpoint, "https://rest.iad-01.braze.com");
        assert_eq!(config.target.api_url, "https://rest.api.transifex.com");
        assert!(config.backup.enabled);
        assert_eq!(config.logging.level, LogLevel::Normal);
    }

    #[test]
    fn test_validate_accepts_resolved_config() {
        assert!(resolved(sample_toml()).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_missing_credentials() {
        let mut config = resolved(sample_toml());
        config.target.api_token = None;
        let result = config.validate();
        assert!(matches!(
            result,
            Err(ConfigError::EnvVarMissing { ref var, .. }) if var == "LOCSYNC_TEST_TX_TOKEN"
        ));

        let mut config = resolved(sample_toml());
        config.source.api_key = None;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::EnvVarMissing { ref field, .. }) if field == "source.api_key_env"
        ));
    }

    #[test]
    fn test_validate_rejects_bad_slug() {
        let mut config = resolved(sample_toml());
        config.target.project = "o:acme:p:marketing".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "target.project"
        ));
    }

    #[test]
    fn test_validate_rejects_non_http_endpoint() {
        let mut config = resolved(sample_toml());
        config.source.endpoint = "rest.iad-01.braze.com".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "source.endpoint"
        ));
    }

    #[test]
    fn test_validate_requires_backup_dir_when_enabled() {
        let mut config = resolved(sample_toml());
        config.backup.dir = None;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "backup.dir"
        ));

        config.backup.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_resolve_env_vars() {
        std::env::set_var("LOCSYNC_RESOLVE_KEY", "k-123");
        std::env::set_var("LOCSYNC_RESOLVE_TOKEN", "t-456");

        let toml_str = r#"
[source]
api_key_env = "LOCSYNC_RESOLVE_KEY"
[target]
organization = "acme"
project = "marketing"
api_token_env = "LOCSYNC_RESOLVE_TOKEN"
"#;
        let mut config: AppConfig = toml::from_str(toml_str).unwrap();
        config.resolve_env_vars();

        assert_eq!(config.source_api_key().unwrap(), "k-123");
        assert_eq!(config.target_api_token().unwrap(), "t-456");

        std::env::remove_var("LOCSYNC_RESOLVE_KEY");
        std::env::remove_var("LOCSYNC_RESOLVE_TOKEN");
    }

    #[test]
    fn test_load_and_resolve_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("locsync.toml");
        std::fs::write(
            &path,
            r#"
[source]
api_key_env = "LOCSYNC_LAR_KEY"
[target]
organization = "acme"
project = "marketing"
api_token_env = "LOCSYNC_LAR_TOKEN"
[backup]
enabled = false
"#,
        )
        .unwrap();

        assert!(matches!(
            AppConfig::load_and_resolve(&path),
            Err(ConfigError::EnvVarMissing { ref var, .. }) if var == "LOCSYNC_LAR_KEY"
        ));

        std::env::set_var("LOCSYNC_LAR_KEY", "k");
        std::env::set_var("LOCSYNC_LAR_TOKEN", "t");
        let config = AppConfig::load_and_resolve(&path).unwrap();
        assert_eq!(config.target_api_token().unwrap(), "t");

        std::env::remove_var("LOCSYNC_LAR_KEY");
        std::env::remove_var("LOCSYNC_LAR_TOKEN");
    }
}
