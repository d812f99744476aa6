use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::{
    bulk::DEFAULT_MAX_CONCURRENCY, calendar::WeekStart, catalog::TemplateCatalog,
    model::TemplateVariant,
};

/// Runtime and CLI configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoosterConfig {
    /// Week boundary convention used when resuming schedules.
    pub week_start: WeekStart,
    /// Variant for trainees whose gender does not select one.
    pub default_variant: TemplateVariant,
    /// Bulk engine settings.
    pub bulk: BulkSettings,
    /// Notification settings.
    pub notifications: NotificationSettings,
    /// Telemetry sinks.
    pub telemetry: TelemetrySettings,
    /// Template catalog file; the embedded catalog is used when absent.
    pub catalog_path: Option<PathBuf>,
    /// JSON store used by the CLI.
    pub store_path: PathBuf,
}

impl Default for BoosterConfig {
    fn default() -> Self {
        Self {
            week_start: WeekStart::default(),
            default_variant: TemplateVariant::default(),
            bulk: BulkSettings::default(),
            notifications: NotificationSettings::default(),
            telemetry: TelemetrySettings::default(),
            catalog_path: None,
            store_path: default_store_path(),
        }
    }
}

impl BoosterConfig {
    /// Loads configuration from a TOML file; relative paths resolve against its directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading booster config {}", path.display()))?;
        let base_dir = path
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        Self::from_toml_str(&raw, &base_dir).with_context(|| format!("parsing {}", path.display()))
    }

    /// Parses configuration TOML, resolving relative paths against `base_dir`.
    pub fn from_toml_str(raw: &str, base_dir: &Path) -> Result<Self> {
        let document: BoosterConfigSerde = toml::from_str(raw)?;
        let resolve = |candidate: PathBuf| {
            if candidate.is_relative() {
                base_dir.join(candidate)
            } else {
                candidate
            }
        };
        let mut bulk = document.bulk;
        if bulk.max_concurrency == 0 {
            bulk.max_concurrency = DEFAULT_MAX_CONCURRENCY;
        }
        Ok(Self {
            week_start: document.week_start,
            default_variant: document.default_variant,
            bulk,
            notifications: document.notifications,
            telemetry: TelemetrySettings {
                log_path: document.telemetry.log_path.map(resolve),
                event_log_path: document.telemetry.event_log_path.map(resolve),
            },
            catalog_path: document.catalog_path.map(resolve),
            store_path: resolve(document.store_path),
        })
    }

    /// Catalog named by `catalog_path`, or the embedded one.
    pub fn catalog(&self) -> Result<TemplateCatalog> {
        match &self.catalog_path {
            Some(path) => TemplateCatalog::load(path),
            None => TemplateCatalog::embedded(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct BoosterConfigSerde {
    #[serde(default)]
    week_start: WeekStart,
    #[serde(default)]
    default_variant: TemplateVariant,
    #[serde(default)]
    bulk: BulkSettings,
    #[serde(default)]
    notifications: NotificationSettings,
    #[serde(default)]
    telemetry: TelemetrySettings,
    #[serde(default)]
    catalog_path: Option<PathBuf>,
    #[serde(default = "default_store_path")]
    store_path: PathBuf,
}

/// `[bulk]` table.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct BulkSettings {
    /// Trainees processed at once.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

impl Default for BulkSettings {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

/// `[notifications]` table.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct NotificationSettings {
    /// Publish notification events; when false nothing is dispatched.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// `[telemetry]` table.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct TelemetrySettings {
    /// JSON-lines log file.
    #[serde(default)]
    pub log_path: Option<PathBuf>,
    /// JSON-lines event file.
    #[serde(default)]
    pub event_log_path: Option<PathBuf>,
}

fn default_store_path() -> PathBuf {
    PathBuf::from("booster-store.json")
}

const fn default_max_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENCY
}

const fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn empty_document_uses_defaults() {
        let config = BoosterConfig::from_toml_str("", Path::new("/etc/booster")).unwrap();
        assert_eq!(config.week_start, WeekStart::Sunday);
        assert_eq!(config.default_variant, TemplateVariant::Female);
        assert_eq!(config.bulk.max_concurrency, DEFAULT_MAX_CONCURRENCY);
        assert!(config.notifications.enabled);
        assert_eq!(
            config.store_path,
            PathBuf::from("/etc/booster/booster-store.json")
        );
        assert!(config.catalog().is_ok());
    }

    #[test]
    fn loads_file_and_resolves_relative_paths() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("booster.toml");
        fs::write(
            &path,
            r#"
week_start = "monday"
default_variant = "male"
store_path = "data/store.json"

[bulk]
max_concurrency = 0

[notifications]
enabled = false

[telemetry]
log_path = "logs/booster.log"
event_log_path = "/var/log/booster-events.log"
"#,
        )
        .unwrap();
        let config = BoosterConfig::load(&path).unwrap();
        assert_eq!(config.week_start, WeekStart::Monday);
        assert_eq!(config.default_variant, TemplateVariant::Male);
        assert_eq!(config.bulk.max_concurrency, DEFAULT_MAX_CONCURRENCY);
        assert!(!config.notifications.enabled);
        assert_eq!(config.store_path, dir.path().join("data/store.json"));
        assert_eq!(
            config.telemetry.log_path,
            Some(dir.path().join("logs/booster.log"))
        );
        assert_eq!(
            config.telemetry.event_log_path,
            Some(PathBuf::from("/var/log/booster-events.log"))
        );
    }

    #[test]
    fn unknown_week_start_is_rejected() {
        let err = BoosterConfig::from_toml_str("week_start = \"friday\"", Path::new(".")).unwrap_err();
        assert!(format!("{err:#}").contains("friday"));
    }

    #[test]
    fn missing_catalog_file_is_reported() {
        let config =
            BoosterConfig::from_toml_str("catalog_path = \"nope.toml\"", Path::new("/nowhere"))
                .unwrap();
        let err = config.catalog().unwrap_err();
        assert!(format!("{err:#}").contains("nope.toml"));
    }
}
