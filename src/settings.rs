//! Handles settings for the application. Configuration is read from an
//! optional `clarity.toml` and `CLARITY_*` environment variables; command
//! line flags override both.

use serde::{Deserialize, Serialize};

use crate::domain::{Currency, Locale, ValidationError};

pub const DEFAULT_CONFIG_PATH: &str = "clarity.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
            Theme::System => "system",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        match s.trim().to_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            "system" => Ok(Theme::System),
            other => Err(ValidationError::UnknownTheme(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub theme: Theme,
    pub locale: Locale,
    /// ISO 4217 code of the display and entry currency.
    pub currency: String,
    /// SQLite database file.
    pub database: String,
    /// Default log filter when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            theme: Theme::System,
            locale: Locale::IdId,
            currency: "IDR".to_string(),
            database: "clarity.db".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from `path` (missing file is fine) and the environment.
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let path = path.unwrap_or(DEFAULT_CONFIG_PATH);
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("CLARITY"))
            .build()?;

        settings.try_deserialize()
    }

    pub fn currency(&self) -> Result<Currency, ValidationError> {
        Currency::from_code(&self.currency)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.theme, Theme::System);
        assert_eq!(settings.locale, Locale::IdId);
        assert_eq!(settings.currency().unwrap(), Currency::idr());
    }

    #[test]
    fn test_theme_parse() {
        assert_eq!(Theme::parse("Dark"), Ok(Theme::Dark));
        assert!(Theme::parse("sepia").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clarity.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "theme = \"dark\"").unwrap();
        writeln!(file, "locale = \"de-DE\"").unwrap();
        writeln!(file, "currency = \"EUR\"").unwrap();

        let settings = Settings::load(path.to_str()).unwrap();
        assert_eq!(settings.theme, Theme::Dark);
        assert_eq!(settings.locale, Locale::DeDe);
        assert_eq!(settings.currency().unwrap().code(), "EUR");
        // Unset fields keep their defaults.
        assert_eq!(settings.database, "clarity.db");
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let settings = Settings::load(path.to_str()).unwrap();
        assert_eq!(settings.locale, Locale::IdId);
    }
}
