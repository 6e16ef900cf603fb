use serde::{Deserialize, Serialize};

use crate::bands::{BandCount, BandScheme, SCORE_MAX, SCORE_MIN};
use crate::models::{CategoryGroup, SampleStatistics, ScoredResponse, ITEM_COUNT};
use crate::stats::item_means;

pub const CATEGORY_COLORS: [&str; 4] = ["#2980b9", "#27ae60", "#e67e22", "#8e44ad"];
pub const HISTOGRAM_COLOR: &str = "#2980b9";
pub const MEAN_MARKER_COLOR: &str = "#e74c3c";
pub const RADAR_RANGE: (f64, f64) = (1.0, 5.0);
const Y_HEADROOM: f64 = 1.15;

/// Where an artifact lands in the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartSlot {
    ScoreGauge,
    AcceptabilityGauge,
    Histogram,
    Radar,
    BandDistribution,
    Category(usize),
}

impl ChartSlot {
    pub fn file_stem(&self) -> String {
        match self {
            ChartSlot::ScoreGauge => "score_gauge".to_string(),
            ChartSlot::AcceptabilityGauge => "acceptability_gauge".to_string(),
            ChartSlot::Histogram => "histogram".to_string(),
            ChartSlot::Radar => "radar".to_string(),
            ChartSlot::BandDistribution => "band_distribution".to_string(),
            ChartSlot::Category(index) => format!("category_{}", index + 1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaugeZone {
    pub lower: f64,
    pub upper: f64,
    pub label: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaugeChart {
    pub title: String,
    pub value: f64,
    pub range: (f64, f64),
    pub zones: Vec<GaugeZone>,
    /// Needle position, the value clamped into `range`.
    pub needle: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramChart {
    pub title: String,
    pub edges: Vec<f64>,
    pub counts: Vec<usize>,
    pub mean_marker: f64,
    pub y_max: f64,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadarChart {
    pub title: String,
    pub axes: Vec<String>,
    pub values: Vec<f64>,
    pub range: (f64, f64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarChart {
    pub title: String,
    pub labels: Vec<String>,
    pub values: Vec<f64>,
    /// Secondary series, respondent count per bar.
    pub counts: Vec<usize>,
    pub colors: Vec<String>,
    pub y_max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChartArtifact {
    Gauge(GaugeChart),
    Histogram(HistogramChart),
    Radar(RadarChart),
    GroupedBar(BarChart),
    BandDistribution(BarChart),
}

impl ChartArtifact {
    pub fn title(&self) -> &str {
        match self {
            ChartArtifact::Gauge(chart) => &chart.title,
            ChartArtifact::Histogram(chart) => &chart.title,
            ChartArtifact::Radar(chart) => &chart.title,
            ChartArtifact::GroupedBar(chart) | ChartArtifact::BandDistribution(chart) => {
                &chart.title
            }
        }
    }
}

pub fn gauge(title: &str, value: f64, scheme: &BandScheme) -> ChartArtifact {
    let zones = scheme
        .bands()
        .iter()
        .map(|band| GaugeZone {
            lower: band.lower,
            upper: band.upper,
            label: band.label.clone(),
            color: band.color.clone(),
        })
        .collect();
    ChartArtifact::Gauge(GaugeChart {
        title: title.to_string(),
        value,
        range: (SCORE_MIN, SCORE_MAX),
        zones,
        needle: value.clamp(SCORE_MIN, SCORE_MAX),
    })
}

/// Equal-width bins over `[min, max]`, last bin closed. A degenerate range is
/// widened by half a unit on each side.
pub fn histogram_bins(scores: &[f64], bins: usize) -> (Vec<f64>, Vec<usize>) {
    let bins = bins.max(1);
    if scores.is_empty() {
        return (Vec::new(), Vec::new());
    }
    let mut min = scores.iter().copied().fold(f64::INFINITY, f64::min);
    let mut max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if min == max {
        min -= 0.5;
        max += 0.5;
    }
    let width = (max - min) / bins as f64;
    let edges: Vec<f64> = (0..=bins)
        .map(|k| if k == bins { max } else { min + width * k as f64 })
        .collect();

    let mut counts = vec![0usize; bins];
    for &score in scores {
        let slot = (((score - min) / width) as usize).min(bins - 1);
        counts[slot] += 1;
    }
    (edges, counts)
}

pub fn histogram(
    title: &str,
    sample: &[ScoredResponse],
    stats: &SampleStatistics,
    bins: usize,
) -> ChartArtifact {
    let scores: Vec<f64> = sample.iter().map(|scored| scored.score).collect();
    let (edges, counts) = histogram_bins(&scores, bins);
    let peak = counts.iter().copied().max().unwrap_or(0);
    ChartArtifact::Histogram(HistogramChart {
        title: title.to_string(),
        edges,
        counts,
        mean_marker: stats.mean,
        y_max: (peak as f64 * Y_HEADROOM).max(1.0),
        color: HISTOGRAM_COLOR.to_string(),
    })
}

pub fn radar(title: &str, sample: &[ScoredResponse]) -> ChartArtifact {
    ChartArtifact::Radar(RadarChart {
        title: title.to_string(),
        axes: (1..=ITEM_COUNT).map(|n| format!("Q{n}")).collect(),
        values: item_means(sample).to_vec(),
        range: RADAR_RANGE,
    })
}

pub fn band_distribution(title: &str, counts: &[BandCount]) -> ChartArtifact {
    let peak = counts.iter().map(|entry| entry.count).max().unwrap_or(0);
    ChartArtifact::BandDistribution(BarChart {
        title: title.to_string(),
        labels: counts.iter().map(|entry| entry.band.label.clone()).collect(),
        values: counts.iter().map(|entry| entry.count as f64).collect(),
        counts: counts.iter().map(|entry| entry.count).collect(),
        colors: counts.iter().map(|entry| entry.band.color.clone()).collect(),
        y_max: (peak as f64 * Y_HEADROOM).max(1.0),
    })
}

/// `None` for groups with nothing to show.
pub fn category_bars(group: &CategoryGroup, index: usize) -> Option<ChartArtifact> {
    if !group.is_renderable() {
        return None;
    }
    let color = CATEGORY_COLORS[index % CATEGORY_COLORS.len()].to_string();
    let peak = group
        .buckets
        .iter()
        .map(|bucket| bucket.mean_score)
        .fold(0.0, f64::max);
    Some(ChartArtifact::GroupedBar(BarChart {
        title: group.attribute.clone(),
        labels: group.buckets.iter().map(|bucket| bucket.label.clone()).collect(),
        values: group.buckets.iter().map(|bucket| bucket.mean_score).collect(),
        counts: group.buckets.iter().map(|bucket| bucket.count).collect(),
        colors: vec![color; group.buckets.len()],
        y_max: (peak * 1.25).max(1.0),
    }))
}
