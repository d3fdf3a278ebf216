//! Configuration file loading

use super::schema::ConfigSchema;
use crate::error::{Error, Result};
use std::env;
use std::path::{Path, PathBuf};

/// Environment variables that override file settings
pub const ENV_DATABASE_URL: &str = "FIREBASE_DATABASE_URL";
/// Database auth token override
pub const ENV_AUTH_TOKEN: &str = "FIREBASE_AUTH_TOKEN";
/// Device identifier override
pub const ENV_DEVICE_ID: &str = "SOS_BEACON_DEVICE_ID";
/// Store timeout override, in seconds
pub const ENV_TIMEOUT_SECS: &str = "SOS_BEACON_TIMEOUT_SECS";

/// Configuration wrapper
#[derive(Debug, Clone)]
pub struct Config {
    /// Parsed settings
    pub schema: ConfigSchema,
    /// File the settings came from, if any
    pub path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a file path or the standard locations, apply
    /// environment overrides, then validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = Self::load_unvalidated(path)?;
        config.schema.validate()?;
        Ok(config)
    }

    /// Load without validating, for diagnostics that must run on a broken setup
    pub fn load_unvalidated(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => {
                let expanded = PathBuf::from(shellexpand::tilde(&p.to_string_lossy()).as_ref());
                if !expanded.exists() {
                    return Err(Error::config_not_found(&expanded));
                }
                Some(expanded)
            }
            None => find_config_file(),
        };

        let mut schema = if let Some(ref p) = config_path {
            load_config_file(p)?
        } else {
            ConfigSchema::default()
        };

        apply_overrides(&mut schema, |key| env::var(key).ok());

        Ok(Self {
            schema,
            path: config_path,
        })
    }

    /// Defaults only (no file, no environment)
    #[must_use]
    pub fn defaults() -> Self {
        Self {
            schema: ConfigSchema::default(),
            path: None,
        }
    }
}

/// Find configuration file in standard locations
fn find_config_file() -> Option<PathBuf> {
    let mut candidates = vec![
        PathBuf::from(".sos-beacon.toml"),
        PathBuf::from("sos-beacon.toml"),
    ];

    if let Some(dir) = dirs::config_dir() {
        candidates.push(dir.join("sos-beacon").join("config.toml"));
    }

    candidates.into_iter().find(|candidate| candidate.exists())
}

/// Load and parse a TOML configuration file
fn load_config_file(path: &Path) -> Result<ConfigSchema> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::config(format!("Failed to read config file {}: {e}", path.display())).with_source(e)
    })?;

    toml::from_str(&content).map_err(|e| {
        Error::from(e).with_context(format!("While parsing {}", path.display()))
    })
}

/// Overlay environment values on top of the file settings
pub(crate) fn apply_overrides(schema: &mut ConfigSchema, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(url) = lookup(ENV_DATABASE_URL) {
        schema.store.database_url = url;
    }

    if let Some(token) = lookup(ENV_AUTH_TOKEN) {
        schema.store.auth_token = Some(token);
    }

    if let Some(id) = lookup(ENV_DEVICE_ID) {
        schema.general.device_id = Some(id);
    }

    if let Some(secs) = lookup(ENV_TIMEOUT_SECS).and_then(|s| s.parse().ok()) {
        schema.store.timeout_secs = secs;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LocationSource;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_config_defaults() {
        let config = Config::defaults();
        assert!(config.path.is_none());
        assert_eq!(config.schema.store.root, "users");
    }

    #[test]
    fn test_load_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[store]
database_url = "https://demo.firebaseio.com"

[location]
source = "fixed"
latitude = 12.34
longitude = 56.78
"#
        )
        .unwrap();

        let config = Config::load_unvalidated(Some(file.path())).unwrap();
        assert_eq!(config.path.as_deref(), Some(file.path()));
        assert_eq!(config.schema.location.source, LocationSource::Fixed);
        assert_eq!(config.schema.location.latitude, Some(12.34));
    }

    #[test]
    fn test_missing_explicit_file() {
        let err = Config::load(Some(Path::new("/nonexistent/sos-beacon.toml"))).unwrap_err();
        assert_eq!(err.code, crate::ErrorCode::ConfigNotFound);
    }

    #[test]
    fn test_malformed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[store\ndatabase_url = ").unwrap();

        let err = Config::load_unvalidated(Some(file.path())).unwrap_err();
        assert_eq!(err.code, crate::ErrorCode::ConfigParseError);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_DATABASE_URL, "https://env.firebaseio.com"),
            (ENV_DEVICE_ID, "abc123"),
            (ENV_TIMEOUT_SECS, "5"),
        ]);

        let mut schema = ConfigSchema::default();
        apply_overrides(&mut schema, |k| env.get(k).map(ToString::to_string));

        assert_eq!(schema.store.database_url, "https://env.firebaseio.com");
        assert_eq!(schema.general.device_id.as_deref(), Some("abc123"));
        assert_eq!(schema.store.timeout_secs, 5);
        assert!(schema.store.auth_token.is_none());
    }

    #[test]
    fn test_unparsable_timeout_override_is_ignored() {
        let mut schema = ConfigSchema::default();
        apply_overrides(&mut schema, |k| (k == ENV_TIMEOUT_SECS).then(|| "soon".to_string()));
        assert_eq!(schema.store.timeout_secs, 30);
    }
}
