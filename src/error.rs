use std::time::Duration;

use thiserror::Error;

/// Malformed or missing survey input.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("missing item columns: {}", .missing.join(", "))]
    MissingItemColumns { missing: Vec<String> },

    #[error("respondent {respondent}: expected {expected} items, found {found}")]
    ItemCount {
        respondent: String,
        expected: usize,
        found: usize,
    },

    #[error("respondent {respondent}: item {item} is missing")]
    MissingItem { respondent: String, item: usize },

    #[error("row {row}, column '{column}': '{value}' is not a number")]
    InvalidItem {
        row: usize,
        column: String,
        value: String,
    },

    #[error("respondent {respondent}: {count} attributes supplied, at most {max} allowed")]
    TooManyAttributes {
        respondent: String,
        count: usize,
        max: usize,
    },

    #[error("unknown attribute column '{0}'")]
    UnknownColumn(String),

    #[error("input has no header row")]
    MissingHeader,

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Invalid setup. Raised once when configuration is loaded, never per request.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("no band scheme chosen; set `bands` in the config or pass --bands")]
    BandSchemeNotChosen,

    #[error("band scheme '{scheme}': {message}")]
    InvalidBands { scheme: String, message: String },

    #[error("invalid color '{0}', expected #rrggbb")]
    InvalidColor(String),

    #[error("threshold {0} is outside [0, 100]")]
    InvalidThreshold(f64),

    #[error("invalid page geometry: {0}")]
    InvalidPage(String),

    #[error("invalid category selection: {0}")]
    InvalidCategories(String),

    #[error("histogram needs at least one bin")]
    InvalidHistogramBins,

    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// A chart or prose collaborator failed or timed out.
#[derive(Debug, Clone, Error)]
pub enum RenderingUnavailable {
    #[error("renderer failed: {0}")]
    Renderer(String),

    #[error("{what} timed out after {after:?}")]
    Timeout { what: &'static str, after: Duration },

    #[error("render worker stopped: {0}")]
    Worker(String),

    #[error("summary service failed: {0}")]
    Summary(String),

    #[error("summary service not configured: {0}")]
    NotConfigured(String),
}

impl RenderingUnavailable {
    pub fn renderer(message: impl Into<String>) -> Self {
        Self::Renderer(message.into())
    }

    pub fn summary(message: impl Into<String>) -> Self {
        Self::Summary(message.into())
    }
}

/// Umbrella error for library callers that run the whole pipeline.
#[derive(Debug, Error)]
pub enum SusError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("export failed: {0}")]
    Export(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}
