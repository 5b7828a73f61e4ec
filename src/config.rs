//! Configuration module
//!
//! `AppConfig` is read from a TOML file at `$BATTERY_RENTAL_CONFIG` or
//! `~/.config/battery-rental/config.toml`. A missing file yields defaults.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::access::EntityKind;
use crate::infrastructure::database::DatabaseConfig;
use crate::shared::errors::InfraError;
use crate::shared::time::Calendar;

/// Environment variable overriding the config file location.
pub const CONFIG_ENV: &str = "BATTERY_RENTAL_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseSection,
    pub calendar: CalendarSection,
    pub settlement: SettlementSection,
    pub access: AccessSection,
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    pub url: String,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            url: DatabaseConfig::default().url,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarSection {
    /// IANA zone all billing days are computed in
    pub timezone: String,
}

impl Default for CalendarSection {
    fn default() -> Self {
        Self {
            timezone: "Europe/Warsaw".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettlementSection {
    /// Moderator ledgers start on this date; `None` means all history.
    pub cutoff_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessSection {
    pub moderator_allowed_entities: BTreeSet<EntityKind>,
}

impl Default for AccessSection {
    fn default() -> Self {
        Self {
            moderator_allowed_entities: EntityKind::moderator_default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub level: String,
    pub format: LogFormat,
    /// Facade calls slower than this are logged as warnings
    pub slow_request_ms: u64,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            slow_request_ms: 3000,
        }
    }
}

impl AppConfig {
    /// Load from `path`. A missing file is not an error.
    pub fn load(path: &Path) -> Result<Self, InfraError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self, InfraError> {
        toml::from_str(raw).map_err(|e| InfraError::Config(format!("invalid config: {}", e)))
    }

    pub fn save(&self, path: &Path) -> Result<(), InfraError> {
        let raw = toml::to_string_pretty(self)
            .map_err(|e| InfraError::Config(format!("cannot serialize config: {}", e)))?;
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, raw)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), InfraError> {
        Calendar::from_name(&self.calendar.timezone).map_err(InfraError::Config)?;
        if self.access.moderator_allowed_entities.is_empty() {
            return Err(InfraError::Config(
                "access.moderator_allowed_entities must not be empty".to_string(),
            ));
        }
        if self.database.url.trim().is_empty() {
            return Err(InfraError::Config("database.url must be set".to_string()));
        }
        Ok(())
    }

    pub fn calendar(&self) -> Result<Calendar, InfraError> {
        Calendar::from_name(&self.calendar.timezone).map_err(InfraError::Config)
    }

    pub fn database_config(&self) -> DatabaseConfig {
        DatabaseConfig {
            url: self.database.url.clone(),
        }
    }
}

/// `~/.config/battery-rental/config.toml`, or `./config.toml` when the
/// platform has no config directory.
pub fn default_config_path() -> PathBuf {
    dirs_next::config_dir()
        .map(|dir| dir.join("battery-rental").join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("config.toml"))
}

/// Path from [`CONFIG_ENV`] if set, else [`default_config_path`].
pub fn config_path() -> PathBuf {
    std::env::var(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| default_config_path())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = AppConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.logging.slow_request_ms, 3000);
        assert_eq!(
            cfg.access.moderator_allowed_entities,
            EntityKind::moderator_default()
        );
    }

    #[test]
    fn parses_partial_file() {
        let cfg = AppConfig::from_toml(
            r#"
            [calendar]
            timezone = "Europe/Berlin"

            [settlement]
            cutoff_date = "2025-01-01"

            [access]
            moderator_allowed_entities = ["rental", "payment"]
            "#,
        )
        .unwrap();
        assert_eq!(cfg.calendar.timezone, "Europe/Berlin");
        assert_eq!(cfg.settlement.cutoff_date, NaiveDate::from_ymd_opt(2025, 1, 1));
        assert_eq!(cfg.access.moderator_allowed_entities.len(), 2);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn rejects_unknown_timezone() {
        let mut cfg = AppConfig::default();
        cfg.calendar.timezone = "Nowhere/Town".to_string();
        assert!(matches!(cfg.validate(), Err(InfraError::Config(_))));
    }

    #[test]
    fn rejects_empty_whitelist() {
        let mut cfg = AppConfig::default();
        cfg.access.moderator_allowed_entities.clear();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn missing_file_gives_defaults() {
        let cfg = AppConfig::load(Path::new("/nonexistent/battery-rental.toml")).unwrap();
        assert_eq!(cfg, AppConfig::default());
    }
}
