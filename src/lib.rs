//! System Usability Scale scoring, aggregation and report assembly.

pub mod bands;
pub mod charts;
pub mod config;
pub mod error;
pub mod grouping;
pub mod ingest;
pub mod labels;
pub mod layout;
pub mod models;
pub mod pipeline;
pub mod render;
pub mod report;
pub mod scoring;
pub mod stats;
pub mod summary;

pub use config::{AnalysisConfig, BandChoice, Setup};
pub use error::{ConfigurationError, RenderingUnavailable, SchemaError, SusError};
pub use layout::ReportDocument;
pub use models::{SampleStatistics, ScoredResponse, SurveyResponse};
pub use pipeline::{analyze, generate_report, Collaborators, RequestContext};
