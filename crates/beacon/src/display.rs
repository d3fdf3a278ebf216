//! The screen's visible surface and its strings

use crate::error::Result;
use handlebars::Handlebars;
use serde_json::json;
use sos_core::config::StringsConfig;

const BUILD_NUMBER_TEMPLATE: &str = "build_number";

/// Where the screen shows things
pub trait DisplaySurface: Send {
    /// Replace the label text
    fn set_label(&self, text: &str);

    /// Show a short transient message
    fn toast(&self, text: &str);
}

/// User-visible strings, with the label rendered from a template
pub struct Strings {
    templates: Handlebars<'static>,
    location_updated: String,
    enable_gps: String,
}

impl Strings {
    /// Compile the `[strings]` section. Unknown template variables are errors.
    pub fn from_config(config: &StringsConfig) -> Result<Self> {
        let mut templates = Handlebars::new();
        templates.set_strict_mode(true);
        templates.register_escape_fn(handlebars::no_escape);
        templates.register_template_string(BUILD_NUMBER_TEMPLATE, &config.build_number)?;

        Ok(Self {
            templates,
            location_updated: config.location_updated.clone(),
            enable_gps: config.enable_gps.clone(),
        })
    }

    /// Label text for a build identifier
    pub fn build_number_label(&self, build_number: &str) -> Result<String> {
        let label = self
            .templates
            .render(BUILD_NUMBER_TEMPLATE, &json!({ "build_number": build_number }))?;
        Ok(label)
    }

    /// Shown after a fix has been written
    #[must_use]
    pub fn location_updated(&self) -> &str {
        &self.location_updated
    }

    /// Shown when the GPS provider is off
    #[must_use]
    pub fn enable_gps(&self) -> &str {
        &self.enable_gps
    }
}

impl std::fmt::Debug for Strings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Strings")
            .field("location_updated", &self.location_updated)
            .field("enable_gps", &self.enable_gps)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_label() {
        let strings = Strings::from_config(&StringsConfig::default()).unwrap();
        assert_eq!(
            strings.build_number_label("QP1A.190711.020").unwrap(),
            "Build number: QP1A.190711.020"
        );
        assert_eq!(strings.location_updated(), "Location updated");
        assert_eq!(strings.enable_gps(), "Please enable GPS and Internet");
    }

    #[test]
    fn test_build_ids_are_not_escaped() {
        let strings = Strings::from_config(&StringsConfig::default()).unwrap();
        assert_eq!(
            strings.build_number_label("Ubuntu 24.04 <LTS> & co").unwrap(),
            "Build number: Ubuntu 24.04 <LTS> & co"
        );
    }

    #[test]
    fn test_unknown_variable_rejected() {
        let config = StringsConfig {
            build_number: "Build {{version}}".into(),
            ..StringsConfig::default()
        };
        let strings = Strings::from_config(&config).unwrap();
        assert!(strings.build_number_label("x").is_err());
    }

    #[test]
    fn test_malformed_template_rejected() {
        let config = StringsConfig {
            build_number: "Build {{#if}".into(),
            ..StringsConfig::default()
        };
        assert!(Strings::from_config(&config).is_err());
    }
}
