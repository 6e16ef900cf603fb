//! Usability bands: ordered, contiguous partitions of the 0-100 score range.
//!
//! A scheme is validated once when it is built. Classification afterwards
//! assumes the partition is well formed and never fails.

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;
use crate::labels::Language;

pub const SCORE_MIN: f64 = 0.0;
pub const SCORE_MAX: f64 = 100.0;

const SIX_ZONE_BREAKPOINTS: [f64; 7] = [0.0, 25.0, 39.0, 52.0, 73.0, 86.0, 100.0];
const BANGOR_BREAKPOINTS: [f64; 7] = [0.0, 25.0, 51.0, 68.0, 80.0, 84.0, 100.0];
const ACCEPTABILITY_BREAKPOINTS: [f64; 5] = [0.0, 50.0, 62.0, 72.0, 100.0];

const ADJECTIVE_COLORS: [&str; 6] = [
    "#ff0000", "#f0ad4e", "#f7ec13", "#5bc0de", "#5cb85c", "#3c763d",
];
const ACCEPTABILITY_COLORS: [&str; 4] = ["#ff0000", "#f39c12", "#f1c40f", "#27ae60"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub label: String,
    pub color: String,
    pub lower: f64,
    pub upper: f64,
}

impl Band {
    pub fn range_label(&self) -> String {
        format!("{:.0}–{:.0}", self.lower, self.upper)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BandScheme {
    pub name: String,
    bands: Vec<Band>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandCount {
    pub band: Band,
    pub count: usize,
    pub percent: f64,
}

impl BandScheme {
    pub fn new<S: AsRef<str>>(
        name: impl Into<String>,
        breakpoints: &[f64],
        labels: &[S],
        colors: &[S],
    ) -> Result<Self, ConfigurationError> {
        let name = name.into();
        let invalid = |message: String| ConfigurationError::InvalidBands {
            scheme: name.clone(),
            message,
        };

        if breakpoints.len() < 2 {
            return Err(invalid("at least two breakpoints are required".into()));
        }
        if let Some(bad) = breakpoints.iter().find(|value| !value.is_finite()) {
            return Err(invalid(format!("breakpoint {bad} is not a finite number")));
        }
        if breakpoints[0] != SCORE_MIN || breakpoints[breakpoints.len() - 1] != SCORE_MAX {
            return Err(invalid(format!(
                "breakpoints must start at {SCORE_MIN} and end at {SCORE_MAX}"
            )));
        }
        if let Some(pair) = breakpoints.windows(2).find(|pair| pair[0] >= pair[1]) {
            return Err(invalid(format!(
                "breakpoints must strictly increase ({} then {})",
                pair[0], pair[1]
            )));
        }
        let expected = breakpoints.len() - 1;
        if labels.len() != expected || colors.len() != expected {
            return Err(invalid(format!(
                "{expected} bands need {expected} labels and colors, got {} and {}",
                labels.len(),
                colors.len()
            )));
        }
        for color in colors {
            parse_hex_color(color.as_ref())
                .ok_or_else(|| ConfigurationError::InvalidColor(color.as_ref().to_string()))?;
        }

        let bands = breakpoints
            .windows(2)
            .zip(labels.iter().zip(colors))
            .map(|(pair, (label, color))| Band {
                label: label.as_ref().to_string(),
                color: color.as_ref().to_string(),
                lower: pair[0],
                upper: pair[1],
            })
            .collect();

        Ok(Self { name, bands })
    }

    /// Six-zone adjective scheme: 0/25/39/52/73/86/100.
    pub fn six_zone(language: Language) -> Self {
        let labels = match language {
            Language::En => [
                "Worst imaginable",
                "Poor",
                "Acceptable",
                "Good",
                "Excellent",
                "Best imaginable",
            ],
            Language::Fr => [
                "Pire imaginable",
                "Mauvais",
                "Acceptable",
                "Bon",
                "Excellent",
                "Meilleur imaginable",
            ],
        };
        Self::builtin("six_zone", &SIX_ZONE_BREAKPOINTS, &labels, &ADJECTIVE_COLORS)
    }

    /// Bangor-aligned scheme: 0/25/51/68/80/84/100.
    pub fn bangor(language: Language) -> Self {
        let labels = match language {
            Language::En => [
                "Worst imaginable",
                "Poor",
                "OK",
                "Good",
                "Excellent",
                "Best imaginable",
            ],
            Language::Fr => [
                "Pire imaginable",
                "Mauvais",
                "Correct",
                "Bon",
                "Excellent",
                "Meilleur imaginable",
            ],
        };
        Self::builtin("bangor", &BANGOR_BREAKPOINTS, &labels, &ADJECTIVE_COLORS)
    }

    /// Acceptability ranges used by the secondary gauge: 0/50/62/72/100.
    pub fn acceptability(language: Language) -> Self {
        let labels = match language {
            Language::En => ["Not acceptable", "Low marginal", "High marginal", "Acceptable"],
            Language::Fr => [
                "Non acceptable",
                "Probabilité faible",
                "Probabilité élevée",
                "Acceptable",
            ],
        };
        Self::builtin("acceptability", &ACCEPTABILITY_BREAKPOINTS, &labels, &ACCEPTABILITY_COLORS)
    }

    fn builtin(name: &str, breakpoints: &[f64], labels: &[&str], colors: &[&str]) -> Self {
        let bands = breakpoints
            .windows(2)
            .zip(labels.iter().zip(colors))
            .map(|(pair, (label, color))| Band {
                label: (*label).to_string(),
                color: (*color).to_string(),
                lower: pair[0],
                upper: pair[1],
            })
            .collect();
        Self {
            name: name.to_string(),
            bands,
        }
    }

    pub fn bands(&self) -> &[Band] {
        &self.bands
    }

    pub fn breakpoints(&self) -> Vec<f64> {
        let mut points: Vec<f64> = self.bands.iter().map(|band| band.lower).collect();
        if let Some(last) = self.bands.last() {
            points.push(last.upper);
        }
        points
    }

    /// Half-open `[lower, upper)` bands; the last band is closed at 100.
    /// Scores outside [0, 100] are clamped first.
    pub fn index_of(&self, score: f64) -> usize {
        let score = score.clamp(SCORE_MIN, SCORE_MAX);
        self.bands
            .iter()
            .position(|band| score < band.upper)
            .unwrap_or(self.bands.len() - 1)
    }

    pub fn classify(&self, score: f64) -> &Band {
        &self.bands[self.index_of(score)]
    }

    pub fn distribution(&self, scores: impl IntoIterator<Item = f64>) -> Vec<BandCount> {
        let mut counts = vec![0usize; self.bands.len()];
        for score in scores {
            counts[self.index_of(score)] += 1;
        }
        let total: usize = counts.iter().sum();
        self.bands
            .iter()
            .zip(counts)
            .map(|(band, count)| BandCount {
                band: band.clone(),
                count,
                percent: if total == 0 {
                    0.0
                } else {
                    count as f64 / total as f64 * 100.0
                },
            })
            .collect()
    }
}

pub fn parse_hex_color(value: &str) -> Option<[u8; 3]> {
    let hex = value.strip_prefix('#')?;
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();
    Some([channel(0..2)?, channel(2..4)?, channel(4..6)?])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundaries_are_lower_inclusive() {
        let scheme = BandScheme::six_zone(Language::En);
        assert_eq!(scheme.index_of(24.9), 0);
        assert_eq!(scheme.index_of(25.0), 1);
        assert_eq!(scheme.classify(25.0).label, "Poor");
        assert_eq!(scheme.classify(73.0).label, "Excellent");
    }

    #[test]
    fn last_band_is_closed() {
        let scheme = BandScheme::six_zone(Language::En);
        assert_eq!(scheme.classify(100.0).label, "Best imaginable");
        assert_eq!(scheme.classify(0.0).label, "Worst imaginable");
        assert_eq!(scheme.classify(140.0).label, "Best imaginable");
    }

    #[test]
    fn builtin_schemes_pass_validation() {
        for scheme in [
            BandScheme::six_zone(Language::Fr),
            BandScheme::bangor(Language::En),
            BandScheme::acceptability(Language::En),
        ] {
            let labels: Vec<&str> = scheme.bands().iter().map(|b| b.label.as_str()).collect();
            let colors: Vec<&str> = scheme.bands().iter().map(|b| b.color.as_str()).collect();
            let rebuilt =
                BandScheme::new(scheme.name.clone(), &scheme.breakpoints(), &labels, &colors)
                    .expect("builtin scheme is valid");
            assert_eq!(rebuilt, scheme);
        }
    }

    #[test]
    fn bangor_breakpoints() {
        let scheme = BandScheme::bangor(Language::En);
        assert_eq!(scheme.breakpoints(), BANGOR_BREAKPOINTS.to_vec());
        assert_eq!(scheme.classify(68.0).label, "Good");
        assert_eq!(scheme.classify(83.9).label, "Excellent");
    }

    #[test]
    fn rejects_gaps_and_overlaps() {
        let labels = ["a", "b"];
        let colors = ["#000000", "#ffffff"];
        assert!(BandScheme::new("x", &[0.0, 60.0, 50.0], &labels, &colors).is_err());
        assert!(BandScheme::new("x", &[0.0, 50.0, 90.0], &labels, &colors).is_err());
        assert!(BandScheme::new("x", &[5.0, 50.0, 100.0], &labels, &colors).is_err());
        assert!(BandScheme::new("x", &[0.0, 50.0, 100.0], &labels[..1], &colors[..1]).is_err());
        assert!(BandScheme::new("x", &[0.0, f64::NAN, 100.0], &labels, &colors).is_err());
        assert!(BandScheme::new("x", &[0.0, f64::INFINITY, 100.0], &labels, &colors).is_err());
        assert!(BandScheme::new("x", &[0.0, 50.0, 100.0], &labels, &colors).is_ok());
    }

    #[test]
    fn scheme_serializes_its_validated_bands() {
        let value = serde_json::to_value(BandScheme::bangor(Language::En)).unwrap();
        assert_eq!(value["name"], "bangor");
        let bands = value["bands"].as_array().unwrap();
        assert_eq!(bands.len(), 6);
        assert_eq!(bands[0]["lower"], 0.0);
        assert_eq!(bands[5]["upper"], 100.0);
    }

    #[test]
    fn rejects_malformed_colors() {
        let err = BandScheme::new("x", &[0.0, 100.0], &["all"], &["red"]).unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidColor(_)));
        assert_eq!(parse_hex_color("#3c763d"), Some([0x3c, 0x76, 0x3d]));
        assert_eq!(parse_hex_color("#3c76"), None);
    }

    #[test]
    fn distribution_counts_every_score_once() {
        let scheme = BandScheme::acceptability(Language::En);
        let counts = scheme.distribution([10.0, 50.0, 61.9, 72.0, 100.0]);
        let tallies: Vec<usize> = counts.iter().map(|c| c.count).collect();
        assert_eq!(tallies, vec![1, 2, 0, 2]);
        assert_eq!(counts[3].percent, 40.0);
    }
}
