use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bands::BandScheme;
use crate::error::ConfigurationError;
use crate::labels::Language;
use crate::models::MAX_ATTRIBUTES;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomBands {
    pub breakpoints: Vec<f64>,
    pub labels: Vec<String>,
    pub colors: Vec<String>,
}

impl CustomBands {
    fn build(&self, name: &str) -> Result<BandScheme, ConfigurationError> {
        BandScheme::new(name, &self.breakpoints, &self.labels, &self.colors)
    }
}

/// Which breakpoint set classifies scores. There is no default: the caller
/// must pick one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "scheme", rename_all = "snake_case")]
pub enum BandChoice {
    SixZone,
    Bangor,
    Custom(CustomBands),
}

impl BandChoice {
    pub fn build(&self, language: Language) -> Result<BandScheme, ConfigurationError> {
        match self {
            BandChoice::SixZone => Ok(BandScheme::six_zone(language)),
            BandChoice::Bangor => Ok(BandScheme::bangor(language)),
            BandChoice::Custom(custom) => custom.build("custom"),
        }
    }
}

/// Which input columns become auxiliary attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CategorySelection {
    /// Every column that is neither an item nor the id, in file order.
    #[default]
    Trailing,
    /// Header positions `start..end`, 0-based.
    Positions { start: usize, end: usize },
    Names { columns: Vec<String> },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageConfig {
    #[serde(default = "default_page_width")]
    pub width_mm: f64,
    #[serde(default = "default_page_height")]
    pub height_mm: f64,
    #[serde(default = "default_margin")]
    pub margin_mm: f64,
    #[serde(default)]
    pub orientation: Orientation,
    #[serde(default = "default_footer")]
    pub footer: String,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            width_mm: default_page_width(),
            height_mm: default_page_height(),
            margin_mm: default_margin(),
            orientation: Orientation::default(),
            footer: default_footer(),
        }
    }
}

impl PageConfig {
    /// Page width and height after applying the orientation.
    pub fn dimensions(&self) -> (f64, f64) {
        let (short, long) = if self.width_mm <= self.height_mm {
            (self.width_mm, self.height_mm)
        } else {
            (self.height_mm, self.width_mm)
        };
        match self.orientation {
            Orientation::Portrait => (short, long),
            Orientation::Landscape => (long, short),
        }
    }
}

fn default_page_width() -> f64 {
    210.0
}

fn default_page_height() -> f64 {
    297.0
}

fn default_margin() -> f64 {
    10.0
}

fn default_footer() -> String {
    "SUS report".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderConfig {
    #[serde(default = "default_render_timeout")]
    pub timeout_secs: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_render_timeout(),
        }
    }
}

impl RenderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_render_timeout() -> u64 {
    10
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_summary_timeout")]
    pub timeout_secs: u64,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: default_base_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_summary_timeout(),
        }
    }
}

impl SummaryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_summary_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub bands: Option<BandChoice>,
    /// Replaces the built-in acceptability ranges when set.
    #[serde(default)]
    pub acceptability: Option<CustomBands>,
    #[serde(default = "default_thresholds")]
    pub thresholds: Vec<f64>,
    #[serde(default)]
    pub categories: CategorySelection,
    #[serde(default)]
    pub id_column: Option<String>,
    #[serde(default = "default_histogram_bins")]
    pub histogram_bins: usize,
    #[serde(default)]
    pub language: Language,
    #[serde(default)]
    pub page: PageConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub summary: SummaryConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            bands: None,
            acceptability: None,
            thresholds: default_thresholds(),
            categories: CategorySelection::default(),
            id_column: None,
            histogram_bins: default_histogram_bins(),
            language: Language::default(),
            page: PageConfig::default(),
            render: RenderConfig::default(),
            summary: SummaryConfig::default(),
        }
    }
}

fn default_thresholds() -> Vec<f64> {
    vec![70.0, 72.0]
}

fn default_histogram_bins() -> usize {
    20
}

/// Configuration that passed validation, with band schemes built.
#[derive(Debug, Clone)]
pub struct Setup {
    pub config: AnalysisConfig,
    pub bands: BandScheme,
    pub acceptability: BandScheme,
}

impl AnalysisConfig {
    pub fn from_path(path: &Path) -> Result<Self, ConfigurationError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigurationError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml(&raw)?;
        debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigurationError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn with_bands(mut self, bands: BandChoice) -> Self {
        self.bands = Some(bands);
        self
    }

    /// Validates everything once and builds the band schemes.
    pub fn validate(self) -> Result<Setup, ConfigurationError> {
        let bands = self
            .bands
            .as_ref()
            .ok_or(ConfigurationError::BandSchemeNotChosen)?
            .build(self.language)?;
        let acceptability = match &self.acceptability {
            Some(custom) => custom.build("acceptability")?,
            None => BandScheme::acceptability(self.language),
        };

        if let Some(&bad) = self
            .thresholds
            .iter()
            .find(|cutoff| !(0.0..=100.0).contains(*cutoff))
        {
            return Err(ConfigurationError::InvalidThreshold(bad));
        }
        if self.histogram_bins == 0 {
            return Err(ConfigurationError::InvalidHistogramBins);
        }
        self.validate_page()?;
        self.validate_categories()?;

        Ok(Setup {
            config: self,
            bands,
            acceptability,
        })
    }

    fn validate_page(&self) -> Result<(), ConfigurationError> {
        let page = &self.page;
        if page.margin_mm < 0.0 {
            return Err(ConfigurationError::InvalidPage("margin must not be negative".into()));
        }
        let (width, height) = page.dimensions();
        if width <= page.margin_mm * 2.0 + 50.0 || height <= page.margin_mm * 2.0 + 80.0 {
            return Err(ConfigurationError::InvalidPage(format!(
                "{width}x{height} mm leaves no room inside {} mm margins",
                page.margin_mm
            )));
        }
        Ok(())
    }

    fn validate_categories(&self) -> Result<(), ConfigurationError> {
        match &self.categories {
            CategorySelection::Trailing => Ok(()),
            CategorySelection::Positions { start, end } if start >= end => {
                Err(ConfigurationError::InvalidCategories(format!(
                    "empty position range {start}..{end}"
                )))
            }
            CategorySelection::Positions { .. } => Ok(()),
            CategorySelection::Names { columns } if columns.len() > MAX_ATTRIBUTES => {
                Err(ConfigurationError::InvalidCategories(format!(
                    "{} columns named, at most {MAX_ATTRIBUTES} allowed",
                    columns.len()
                )))
            }
            CategorySelection::Names { columns } if columns.iter().any(|c| c.trim().is_empty()) => {
                Err(ConfigurationError::InvalidCategories("blank column name".into()))
            }
            CategorySelection::Names { .. } => Ok(()),
        }
    }
}
