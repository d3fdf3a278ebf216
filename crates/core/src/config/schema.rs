//! Configuration schema definitions
//!
//! Every section and field has a default, so an empty file is a valid configuration.

use crate::error::{Error, Result};
use chrono::format::{Item, StrftimeItems};
use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

/// Root configuration schema
#[allow(missing_docs)]
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConfigSchema {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub location: LocationConfig,

    #[serde(default)]
    pub permissions: PermissionsConfig,

    #[serde(default)]
    pub report: ReportConfig,

    #[serde(default)]
    pub strings: StringsConfig,
}

impl ConfigSchema {
    /// Validate every section
    pub fn validate(&self) -> Result<()> {
        self.validate_local()?;
        self.store.validate()
    }

    /// Validate everything except the remote store, for runs that never reach it
    pub fn validate_local(&self) -> Result<()> {
        self.general.validate()?;
        self.location.validate()?;
        self.report.validate()?;
        Ok(())
    }
}

/// Characters the realtime database forbids inside a key
const KEY_FORBIDDEN: [char; 6] = ['.', '$', '#', '[', ']', '/'];

/// Device identity overrides
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GeneralConfig {
    /// Device identifier used as the record key (derived from the host when unset)
    #[serde(default)]
    pub device_id: Option<String>,

    /// Build identifier reported as `buildNumber` (read from the host when unset)
    #[serde(default)]
    pub build_number: Option<String>,
}

impl GeneralConfig {
    fn validate(&self) -> Result<()> {
        if let Some(id) = &self.device_id {
            if id.trim().is_empty() {
                return Err(Error::config_invalid("general.device_id", "device_id cannot be blank"));
            }
            if id.chars().any(|c| KEY_FORBIDDEN.contains(&c) || c.is_control()) {
                return Err(Error::config_invalid(
                    "general.device_id",
                    format!(
                        "device_id `{}` contains a character not allowed in a database key",
                        id.escape_default()
                    ),
                )
                .with_suggestion("Use letters, digits, '-' or '_'"));
            }
        }
        Ok(())
    }
}

/// Remote store connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Realtime database URL, e.g. `https://<project>.firebaseio.com`
    #[serde(default)]
    pub database_url: String,

    /// Optional database secret or ID token, sent as the `auth` query parameter
    #[serde(default)]
    pub auth_token: Option<String>,

    /// Top-level namespace holding the device records
    #[serde(default = "default_root")]
    pub root: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            auth_token: None,
            root: default_root(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_root() -> String {
    "users".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl StoreConfig {
    fn validate(&self) -> Result<()> {
        if self.database_url.is_empty() {
            return Err(Error::config_invalid("store.database_url", "database_url cannot be empty")
                .with_suggestion("Set store.database_url or FIREBASE_DATABASE_URL"));
        }

        if !self.database_url.starts_with("http://") && !self.database_url.starts_with("https://") {
            return Err(Error::config_invalid(
                "store.database_url",
                "database_url must start with http:// or https://",
            ));
        }

        if self.root.trim_matches('/').is_empty() {
            return Err(Error::config_invalid("store.root", "root cannot be empty"));
        }

        if self.timeout_secs == 0 {
            return Err(Error::config_invalid("store.timeout_secs", "timeout cannot be zero"));
        }

        Ok(())
    }
}

/// Where location fixes come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LocationSource {
    /// A local gpsd daemon
    #[default]
    Gpsd,
    /// The coordinates configured in this section
    Fixed,
}

/// Location provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationConfig {
    /// Provider backing the GPS source
    #[serde(default)]
    pub source: LocationSource,

    /// gpsd host
    #[serde(default = "default_gpsd_host")]
    pub gpsd_host: String,

    /// gpsd port
    #[serde(default = "default_gpsd_port")]
    pub gpsd_port: u16,

    /// Failed reconnects to gpsd before an armed request is dropped; unset
    /// keeps retrying
    #[serde(default)]
    pub gpsd_reconnect_limit: Option<u32>,

    /// Latitude delivered by the fixed source
    #[serde(default)]
    pub latitude: Option<f64>,

    /// Longitude delivered by the fixed source
    #[serde(default)]
    pub longitude: Option<f64>,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            source: LocationSource::default(),
            gpsd_host: default_gpsd_host(),
            gpsd_port: default_gpsd_port(),
            gpsd_reconnect_limit: None,
            latitude: None,
            longitude: None,
        }
    }
}

fn default_gpsd_host() -> String {
    "127.0.0.1".to_string()
}

fn default_gpsd_port() -> u16 {
    2947
}

impl LocationConfig {
    fn validate(&self) -> Result<()> {
        if self.source != LocationSource::Fixed {
            return Ok(());
        }

        match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) => {
                if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
                    return Err(Error::config_invalid(
                        "location.latitude",
                        format!("fixed coordinates out of range: ({lat}, {lng})"),
                    ));
                }
                Ok(())
            }
            _ => Err(Error::config_invalid(
                "location.latitude",
                "the fixed source needs both latitude and longitude",
            )),
        }
    }
}

/// Permissions that can be pre-granted in configuration
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PermissionGrant {
    Location,
    PhoneState,
}

/// Host permission handling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionsConfig {
    /// Permissions treated as already granted
    #[serde(default)]
    pub granted: Vec<PermissionGrant>,

    /// Ask on the terminal for permissions that are not pre-granted
    #[serde(default = "default_true")]
    pub prompt: bool,
}

impl Default for PermissionsConfig {
    fn default() -> Self {
        Self {
            granted: Vec::new(),
            prompt: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Timestamp settings for location reports
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Fixed UTC offset the timestamp is rendered in, `+HH:MM` or `-HH:MM`
    #[serde(default = "default_utc_offset")]
    pub utc_offset: String,

    /// chrono format string for the timestamp
    #[serde(default = "default_timestamp_format")]
    pub timestamp_format: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            utc_offset: default_utc_offset(),
            timestamp_format: default_timestamp_format(),
        }
    }
}

fn default_utc_offset() -> String {
    "+05:30".to_string()
}

fn default_timestamp_format() -> String {
    "%Y-%m-%d %H:%M:%S".to_string()
}

impl ReportConfig {
    /// Parsed form of `utc_offset`
    pub fn offset(&self) -> Result<FixedOffset> {
        parse_utc_offset(&self.utc_offset)
    }

    fn validate(&self) -> Result<()> {
        self.offset()?;
        validate_timestamp_format(&self.timestamp_format)
    }
}

/// Reject empty formats and unknown `%` specifiers, which chrono only reports
/// when rendering
pub fn validate_timestamp_format(raw: &str) -> Result<()> {
    if raw.is_empty() {
        return Err(Error::config_invalid("report.timestamp_format", "format cannot be empty"));
    }
    if StrftimeItems::new(raw).any(|item| matches!(item, Item::Error)) {
        return Err(Error::config_invalid(
            "report.timestamp_format",
            format!("invalid chrono format `{raw}`"),
        )
        .with_suggestion("See the chrono strftime specifiers, e.g. %Y-%m-%d %H:%M:%S"));
    }
    Ok(())
}

/// Parse a `+HH:MM` / `-HH:MM` offset
pub fn parse_utc_offset(raw: &str) -> Result<FixedOffset> {
    let invalid = || {
        Error::config_invalid("report.utc_offset", format!("invalid UTC offset `{raw}`"))
            .with_suggestion("Use the form +05:30 or -03:00")
    };

    let (sign, rest) = match raw.as_bytes().first() {
        Some(b'+') => (1, &raw[1..]),
        Some(b'-') => (-1, &raw[1..]),
        _ => return Err(invalid()),
    };

    let (hours, minutes) = rest.split_once(':').ok_or_else(invalid)?;
    if hours.len() != 2 || minutes.len() != 2 {
        return Err(invalid());
    }

    let hours: i32 = hours.parse().map_err(|_| invalid())?;
    let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
    if hours > 23 || minutes > 59 {
        return Err(invalid());
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}

/// User-visible strings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StringsConfig {
    /// Label template, takes `build_number`
    #[serde(default = "default_build_number_template")]
    pub build_number: String,

    /// Shown after a fix has been written
    #[serde(default = "default_location_updated")]
    pub location_updated: String,

    /// Shown when the GPS provider is disabled
    #[serde(default = "default_enable_gps")]
    pub enable_gps: String,
}

impl Default for StringsConfig {
    fn default() -> Self {
        Self {
            build_number: default_build_number_template(),
            location_updated: default_location_updated(),
            enable_gps: default_enable_gps(),
        }
    }
}

fn default_build_number_template() -> String {
    "Build number: {{build_number}}".to_string()
}

fn default_location_updated() -> String {
    "Location updated".to_string()
}

fn default_enable_gps() -> String {
    "Please enable GPS and Internet".to_string()
}
