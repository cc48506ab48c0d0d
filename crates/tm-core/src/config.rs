//! Configuration types and parsing for tidemark.yml

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable overriding the legacy ledger table name
pub const LEGACY_TABLE_ENV: &str = "TIDEMARK_LEGACY_TABLE";

/// Environment variable overriding the legacy ledger schema
pub const LEGACY_SCHEMA_ENV: &str = "TIDEMARK_LEGACY_SCHEMA";

/// Default ledger table name
pub const DEFAULT_LEDGER_TABLE: &str = "__tidemark_migrations";

/// Default ledger schema for dialects with namespaces
pub const DEFAULT_LEDGER_SCHEMA: &str = "tidemark";

/// Main migration configuration from tidemark.yml
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MigrateConfig {
    /// Directory holding one folder per migration unit
    #[serde(default = "default_migrations_dir")]
    pub migrations_dir: PathBuf,

    /// Where applied units are recorded
    #[serde(default)]
    pub ledger: LedgerLocation,

    /// A ledger written by an older release, copied forward on first run.
    /// Without a `schema` key it lives in the dialect's default namespace.
    #[serde(default, deserialize_with = "deserialize_legacy_ledger")]
    pub legacy_ledger: Option<LedgerLocation>,

    /// Transaction scope used while applying
    #[serde(default)]
    pub transaction: TransactionScope,
}

/// Table (and optional schema) of a ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LedgerLocation {
    /// Ledger table name
    #[serde(default = "default_ledger_table")]
    pub table: String,

    /// Ledger schema; ignored by dialects without schema namespaces
    #[serde(default = "default_ledger_schema")]
    pub schema: Option<String>,
}

/// How applied units are grouped into transactions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionScope {
    /// Each unit and its ledger row commit together
    #[default]
    PerUnit,
    /// The whole delta commits or rolls back as one
    Run,
}

impl Default for LedgerLocation {
    fn default() -> Self {
        Self {
            table: default_ledger_table(),
            schema: default_ledger_schema(),
        }
    }
}

impl LedgerLocation {
    pub fn new(table: impl Into<String>, schema: Option<&str>) -> Self {
        Self {
            table: table.into(),
            schema: schema.map(str::to_string),
        }
    }

    /// Read a legacy ledger location from the environment.
    ///
    /// The table variable is required; the schema variable is optional.
    pub fn from_env() -> Option<Self> {
        let table = std::env::var(LEGACY_TABLE_ENV)
            .ok()
            .filter(|t| !t.is_empty())?;
        let schema = std::env::var(LEGACY_SCHEMA_ENV)
            .ok()
            .filter(|s| !s.is_empty());
        Some(Self { table, schema })
    }
}

impl Default for MigrateConfig {
    fn default() -> Self {
        Self {
            migrations_dir: default_migrations_dir(),
            ledger: LedgerLocation::default(),
            legacy_ledger: None,
            transaction: TransactionScope::default(),
        }
    }
}

fn default_migrations_dir() -> PathBuf {
    PathBuf::from("migrations")
}

fn default_ledger_table() -> String {
    DEFAULT_LEDGER_TABLE.to_string()
}

fn default_ledger_schema() -> Option<String> {
    Some(DEFAULT_LEDGER_SCHEMA.to_string())
}

/// On-disk form of `legacy_ledger`: the table is required and the schema
/// does not inherit the new ledger's default.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct LegacyLedgerEntry {
    table: String,
    #[serde(default)]
    schema: Option<String>,
}

fn deserialize_legacy_ledger<'de, D>(deserializer: D) -> Result<Option<LedgerLocation>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let entry = Option::<LegacyLedgerEntry>::deserialize(deserializer)?;
    Ok(entry.map(|e| LedgerLocation {
        table: e.table,
        schema: e.schema,
    }))
}

impl MigrateConfig {
    /// Load configuration from a file path
    pub fn load(path: &Path) -> CoreResult<Self> {
        if !path.exists() {
            return Err(CoreError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| CoreError::io(path, e))?;
        let config: MigrateConfig = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a project directory (tidemark.yml or tidemark.yaml)
    pub fn load_from_dir(dir: &Path) -> CoreResult<Self> {
        let yml_path = dir.join("tidemark.yml");
        let yaml_path = dir.join("tidemark.yaml");

        let mut config = if yml_path.exists() {
            Self::load(&yml_path)?
        } else if yaml_path.exists() {
            Self::load(&yaml_path)?
        } else {
            return Err(CoreError::ConfigNotFound {
                path: yml_path.display().to_string(),
            });
        };

        if config.migrations_dir.is_relative() {
            config.migrations_dir = dir.join(&config.migrations_dir);
        }
        Ok(config)
    }

    /// Validate field values
    pub fn validate(&self) -> CoreResult<()> {
        if self.ledger.table.trim().is_empty() {
            return Err(CoreError::ConfigInvalid {
                message: "ledger.table must not be empty".to_string(),
            });
        }
        if let Some(legacy) = &self.legacy_ledger {
            if legacy.table.trim().is_empty() {
                return Err(CoreError::ConfigInvalid {
                    message: "legacy_ledger.table must not be empty".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Legacy ledger location: environment first, then the config file.
    pub fn resolve_legacy_ledger(&self) -> Option<LedgerLocation> {
        LedgerLocation::from_env().or_else(|| self.legacy_ledger.clone())
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
