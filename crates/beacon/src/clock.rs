//! Wall clock and report timestamp formatting

use chrono::{DateTime, FixedOffset, Offset, Utc};
use sos_core::config::{validate_timestamp_format, ReportConfig};
use sos_core::Error;
use std::fmt::Write;

/// Source of the current time, injected so reports are reproducible in tests
pub trait Clock: Send + Sync {
    /// Current instant
    fn now(&self) -> DateTime<Utc>;
}

/// The system clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Renders report timestamps at a fixed UTC offset
#[derive(Debug, Clone)]
pub struct TimestampFormatter {
    offset: FixedOffset,
    format: String,
}

impl TimestampFormatter {
    /// Default report format
    pub const DEFAULT_FORMAT: &'static str = "%Y-%m-%d %H:%M:%S";

    /// Formatter for an explicit offset and chrono format string
    pub fn new(offset: FixedOffset, format: impl Into<String>) -> sos_core::Result<Self> {
        let format = format.into();
        validate_timestamp_format(&format)?;
        Ok(Self { offset, format })
    }

    /// `yyyy-MM-dd HH:mm:ss` at UTC+05:30
    #[must_use]
    pub fn ist() -> Self {
        // 5h30m is always a valid offset
        let offset = FixedOffset::east_opt(5 * 3600 + 30 * 60).unwrap_or_else(|| Utc.fix());
        Self {
            offset,
            format: Self::DEFAULT_FORMAT.to_string(),
        }
    }

    /// Formatter described by the `[report]` section
    pub fn from_config(config: &ReportConfig) -> sos_core::Result<Self> {
        Self::new(config.offset()?, config.timestamp_format.clone())
    }

    /// The offset timestamps are rendered in
    #[must_use]
    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Render `at` in the configured offset
    pub fn format(&self, at: DateTime<Utc>) -> sos_core::Result<String> {
        let mut rendered = String::new();
        write!(rendered, "{}", at.with_timezone(&self.offset).format(&self.format)).map_err(|_| {
            Error::validation(format!("cannot render timestamp with `{}`", self.format))
        })?;
        Ok(rendered)
    }
}

impl Default for TimestampFormatter {
    fn default() -> Self {
        Self::ist()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use regex::Regex;

    #[test]
    fn test_ist_rendering() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        assert_eq!(TimestampFormatter::ist().format(at).unwrap(), "2024-03-01 15:30:00");
    }

    #[test]
    fn test_crosses_midnight() {
        let at = Utc.with_ymd_and_hms(2023, 12, 31, 20, 45, 9).unwrap();
        assert_eq!(TimestampFormatter::ist().format(at).unwrap(), "2024-01-01 02:15:09");
    }

    #[test]
    fn test_shape() {
        let re = Regex::new(r"^\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}$").unwrap();
        assert!(re.is_match(&TimestampFormatter::default().format(SystemClock.now()).unwrap()));
    }

    #[test]
    fn test_from_config() {
        let config = ReportConfig {
            utc_offset: "-03:00".into(),
            timestamp_format: "%H:%M".into(),
        };
        let formatter = TimestampFormatter::from_config(&config).unwrap();
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        assert_eq!(formatter.format(at).unwrap(), "07:00");
    }

    #[test]
    fn test_from_config_rejects_bad_offset() {
        let config = ReportConfig {
            utc_offset: "IST".into(),
            ..ReportConfig::default()
        };
        assert!(TimestampFormatter::from_config(&config).is_err());
    }

    #[test]
    fn test_unknown_specifier_rejected_up_front() {
        let config = ReportConfig {
            timestamp_format: "%Y-%m-%d %Q".into(),
            ..ReportConfig::default()
        };
        assert!(TimestampFormatter::from_config(&config).is_err());
        assert!(TimestampFormatter::new(Utc.fix(), "%H:%M %Q").is_err());
        assert!(TimestampFormatter::new(Utc.fix(), "%H:%M").is_ok());
    }

    proptest! {
        #[test]
        fn test_any_instant_renders_fixed_width(secs in 0i64..4_102_444_800) {
            let at = DateTime::from_timestamp(secs, 0).unwrap();
            let shape = Regex::new(r"^\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}$").unwrap();
            let rendered = TimestampFormatter::ist().format(at).unwrap();
            prop_assert!(shape.is_match(&rendered));
            prop_assert_eq!(rendered, (at + chrono::Duration::minutes(330)).format("%Y-%m-%d %H:%M:%S").to_string());
        }
    }
}
