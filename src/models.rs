use serde::{Deserialize, Serialize};

use crate::error::SchemaError;

pub const ITEM_COUNT: usize = 10;
pub const MAX_ATTRIBUTES: usize = 4;
pub const LIKERT_MIN: i64 = 1;
pub const LIKERT_MAX: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKind {
    Numeric,
    Text,
}

/// Value of an auxiliary attribute, tagged once at ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AttributeValue {
    Numeric(f64),
    Text(String),
}

impl AttributeValue {
    pub fn kind(&self) -> AttributeKind {
        match self {
            AttributeValue::Numeric(_) => AttributeKind::Numeric,
            AttributeValue::Text(_) => AttributeKind::Text,
        }
    }

    pub fn display(&self) -> String {
        match self {
            AttributeValue::Numeric(value) if value.fract() == 0.0 => format!("{value:.0}"),
            AttributeValue::Numeric(value) => value.to_string(),
            AttributeValue::Text(value) => value.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub value: Option<AttributeValue>,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: Option<AttributeValue>) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// One respondent's raw answers. Items are kept unclamped; the scorer clamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveyResponse {
    pub id: String,
    pub items: Vec<Option<i64>>,
    pub attributes: Vec<Attribute>,
}

impl SurveyResponse {
    pub fn new(
        id: impl Into<String>,
        items: Vec<Option<i64>>,
        attributes: Vec<Attribute>,
    ) -> Result<Self, SchemaError> {
        let id = id.into();
        if attributes.len() > MAX_ATTRIBUTES {
            return Err(SchemaError::TooManyAttributes {
                respondent: id,
                count: attributes.len(),
                max: MAX_ATTRIBUTES,
            });
        }
        Ok(Self {
            id,
            items,
            attributes,
        })
    }

    /// Convenience constructor for fully answered questionnaires.
    pub fn complete(id: impl Into<String>, items: [i64; ITEM_COUNT]) -> Self {
        Self {
            id: id.into(),
            items: items.iter().copied().map(Some).collect(),
            attributes: Vec::new(),
        }
    }

    pub fn with_attribute(
        mut self,
        name: impl Into<String>,
        value: Option<AttributeValue>,
    ) -> Self {
        self.attributes.push(Attribute::new(name, value));
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes
            .iter()
            .find(|attribute| attribute.name == name)
            .and_then(|attribute| attribute.value.as_ref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredResponse {
    pub response: SurveyResponse,
    /// Raw answers after clamping to the Likert range.
    pub items: [u8; ITEM_COUNT],
    pub adjusted: [u8; ITEM_COUNT],
    pub score: f64,
}

impl ScoredResponse {
    pub fn id(&self) -> &str {
        &self.response.id
    }

    pub fn adjusted_sum(&self) -> u32 {
        self.adjusted.iter().map(|value| u32::from(*value)).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdShare {
    pub cutoff: f64,
    pub percent: f64,
}

/// Descriptive statistics over a scored sample. `count == 0` means no data
/// and every other numeric field is zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleStatistics {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub q1: f64,
    pub q3: f64,
    pub iqr: f64,
    pub thresholds: Vec<ThresholdShare>,
}

impl SampleStatistics {
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn percent_at_least(&self, cutoff: f64) -> Option<f64> {
        self.thresholds
            .iter()
            .find(|share| share.cutoff == cutoff)
            .map(|share| share.percent)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Binning {
    Distinct,
    Quantile,
    EqualWidth,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    pub label: String,
    pub lower: Option<f64>,
    pub upper: Option<f64>,
    pub mean_score: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryGroup {
    pub attribute: String,
    pub kind: Option<AttributeKind>,
    pub binning: Binning,
    pub buckets: Vec<Bucket>,
}

impl CategoryGroup {
    pub fn empty(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            kind: None,
            binning: Binning::Distinct,
            buckets: Vec::new(),
        }
    }

    /// Empty groups are skipped by chart building and layout.
    pub fn is_renderable(&self) -> bool {
        !self.buckets.is_empty()
    }

    pub fn total(&self) -> usize {
        self.buckets.iter().map(|bucket| bucket.count).sum()
    }

    pub fn bucket(&self, label: &str) -> Option<&Bucket> {
        self.buckets.iter().find(|bucket| bucket.label == label)
    }
}
