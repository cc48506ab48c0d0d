//! Error types for tm-core

use thiserror::Error;

/// Core error type for Tidemark
#[derive(Error, Debug)]
pub enum CoreError {
    /// T001: Migrations directory not found
    #[error("[T001] Migrations directory not found: {path}")]
    MissingDirectory { path: String },

    /// T002: Unit folder name lacks a numeric timestamp prefix
    #[error("[T002] Migration folder '{name}' must start with a numeric timestamp (e.g. 1700000000000_init)")]
    MalformedUnitName { name: String },

    /// T003: SQL script or snapshot document missing for a chained unit
    #[error("[T003] Missing {artifact} for migration '{unit}': {path}")]
    MissingArtifact {
        unit: String,
        artifact: &'static str,
        path: String,
    },

    /// T004: Snapshot document could not be parsed
    #[error("[T004] Malformed snapshot {path}: {message}")]
    MalformedSnapshot { path: String, message: String },

    /// T005: Legacy journal layout is incomplete or unreadable
    #[error("[T005] Legacy migrations folder {dir} is invalid: {}", missing.join(", "))]
    LegacyStructureInvalid { dir: String, missing: Vec<String> },

    /// T006: Configuration file not found
    #[error("[T006] Config file not found: {path}")]
    ConfigNotFound { path: String },

    /// T007: Invalid configuration value
    #[error("[T007] Invalid config: {message}")]
    ConfigInvalid { message: String },

    /// T008: IO error with file path context
    #[error("[T008] Failed to access '{path}': {source}")]
    IoWithPath {
        path: String,
        source: std::io::Error,
    },

    /// T009: IO error
    #[error("[T009] IO error: {0}")]
    Io(#[from] std::io::Error),

    /// T010: Config YAML parse error
    #[error("[T010] Config parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for CoreError
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Wrap an IO error with the path that triggered it.
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        CoreError::IoWithPath {
            path: path.display().to_string(),
            source,
        }
    }
}
