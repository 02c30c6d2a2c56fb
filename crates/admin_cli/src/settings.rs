//! Handles settings for the admin tool. Configuration is read from
//! `massledger.toml` (optional) and `MASSLEDGER_*` environment variables,
//! e.g. `MASSLEDGER_DATABASE_URL` or `MASSLEDGER_APP__LEVEL`.
use std::collections::HashSet;

use chrono::format::{Item, StrftimeItems};
use config::{Config, ConfigError, Environment, File};
use engine::{
    CelebrationKind, DEFAULT_MONTHLY_TARGET, InterruptionPolicy, ProjectionPolicy, RetryPolicy,
};
use serde::Deserialize;

const DEFAULT_CONFIG_FILE: &str = "massledger";

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct App {
    pub level: String,
}

impl Default for App {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// How rows of a CSV export map onto celebrations.
///
/// With `has_headers = false` the column names are 0-based positions.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ImportTemplate {
    pub date_column: String,
    pub kind_column: String,
    pub allocation_column: String,
    /// Optional row identity. Rows repeating a non-empty id are skipped;
    /// without it every row is recorded.
    pub id_column: Option<String>,
    pub date_format: String,
    pub has_headers: bool,
    /// Used when the kind cell is blank or the column is absent.
    pub default_kind: CelebrationKind,
}

impl Default for ImportTemplate {
    fn default() -> Self {
        Self {
            date_column: "date".to_string(),
            kind_column: "kind".to_string(),
            allocation_column: "allocation".to_string(),
            id_column: None,
            date_format: "%Y-%m-%d".to_string(),
            has_headers: true,
            default_kind: CelebrationKind::Personal,
        }
    }
}

impl ImportTemplate {
    pub fn validate(&self) -> Result<(), String> {
        let mut columns = vec![
            ("date_column", &self.date_column),
            ("kind_column", &self.kind_column),
            ("allocation_column", &self.allocation_column),
        ];
        if let Some(id_column) = &self.id_column {
            columns.push(("id_column", id_column));
        }

        let mut seen = HashSet::new();
        for (label, column) in columns {
            let column = column.trim();
            if column.is_empty() {
                return Err(format!("import.{label} must not be empty"));
            }
            if !self.has_headers && column.parse::<usize>().is_err() {
                return Err(format!(
                    "import.{label} must be a column index when has_headers is false, got {column:?}"
                ));
            }
            if !seen.insert(column) {
                return Err(format!("import.{label} duplicates another column: {column:?}"));
            }
        }

        if self.date_format.trim().is_empty() {
            return Err("import.date_format must not be empty".to_string());
        }
        if StrftimeItems::new(&self.date_format).any(|item| matches!(item, Item::Error)) {
            return Err(format!(
                "import.date_format is not a valid chrono format: {:?}",
                self.date_format
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database_url: String,
    pub app: App,
    pub monthly_target: i64,
    pub retry: RetryPolicy,
    pub interruption: InterruptionPolicy,
    pub projection: ProjectionPolicy,
    pub import: ImportTemplate,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: "sqlite:./massledger.db?mode=rwc".to_string(),
            app: App::default(),
            monthly_target: DEFAULT_MONTHLY_TARGET,
            retry: RetryPolicy::default(),
            interruption: InterruptionPolicy::default(),
            projection: ProjectionPolicy::default(),
            import: ImportTemplate::default(),
        }
    }
}

impl Settings {
    /// Load settings. An explicit `path` must exist; the default file is
    /// optional.
    pub fn new(path: Option<&str>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => File::with_name(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };
        let settings = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix("MASSLEDGER")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = settings.try_deserialize()?;
        settings.import.validate().map_err(ConfigError::Message)?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_template_is_valid() {
        assert_eq!(ImportTemplate::default().validate(), Ok(()));
    }

    #[test]
    fn duplicate_columns_rejected() {
        let template = ImportTemplate {
            kind_column: "date".to_string(),
            ..ImportTemplate::default()
        };
        assert!(template.validate().is_err());
    }

    #[test]
    fn headerless_template_needs_indexes() {
        let template = ImportTemplate {
            has_headers: false,
            ..ImportTemplate::default()
        };
        assert!(template.validate().is_err());

        let template = ImportTemplate {
            has_headers: false,
            date_column: "0".to_string(),
            kind_column: "1".to_string(),
            allocation_column: "2".to_string(),
            ..ImportTemplate::default()
        };
        assert_eq!(template.validate(), Ok(()));
    }

    #[test]
    fn id_column_joins_the_distinct_check() {
        let template = ImportTemplate {
            id_column: Some("kind".to_string()),
            ..ImportTemplate::default()
        };
        assert!(template.validate().is_err());

        let template = ImportTemplate {
            id_column: Some("ref".to_string()),
            ..ImportTemplate::default()
        };
        assert_eq!(template.validate(), Ok(()));
    }

    #[test]
    fn bad_date_format_rejected() {
        let template = ImportTemplate {
            date_format: "%Y-%Q".to_string(),
            ..ImportTemplate::default()
        };
        assert!(template.validate().is_err());
    }
}
