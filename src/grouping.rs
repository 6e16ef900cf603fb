use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::models::{AttributeKind, AttributeValue, Binning, Bucket, CategoryGroup, ScoredResponse};
use crate::stats::quantile;

/// Bucket count for numeric attributes, chosen from the number of usable values.
pub fn bucket_count(n: usize) -> usize {
    match n {
        0..=19 => 4,
        20..=99 => 6,
        _ => 8,
    }
}

pub fn group_by_attribute(sample: &[ScoredResponse], attribute: &str) -> CategoryGroup {
    let values: Vec<(&AttributeValue, f64)> = sample
        .iter()
        .filter_map(|scored| {
            scored
                .response
                .attribute(attribute)
                .map(|value| (value, scored.score))
        })
        .collect();

    if values.is_empty() {
        warn!(attribute, "attribute has no usable values");
        return CategoryGroup::empty(attribute);
    }

    let numeric: Option<Vec<(f64, f64)>> = values
        .iter()
        .map(|(value, score)| match value {
            AttributeValue::Numeric(number) if number.is_finite() => Some((*number, *score)),
            _ => None,
        })
        .collect();

    let group = match numeric {
        Some(points) => group_numeric(attribute, &points),
        None => group_text(attribute, &values),
    };
    debug!(
        attribute,
        buckets = group.buckets.len(),
        binning = ?group.binning,
        "grouped attribute"
    );
    group
}

/// Groups every attribute in order, keeping empty groups so slot positions
/// stay aligned with the attribute list.
pub fn group_all(sample: &[ScoredResponse], attributes: &[String]) -> Vec<CategoryGroup> {
    attributes
        .iter()
        .map(|attribute| group_by_attribute(sample, attribute))
        .collect()
}

fn group_text(attribute: &str, values: &[(&AttributeValue, f64)]) -> CategoryGroup {
    let mut totals: BTreeMap<String, (usize, f64)> = BTreeMap::new();
    for (value, score) in values {
        let entry = totals.entry(value.display()).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += score;
    }

    let buckets = totals
        .into_iter()
        .map(|(label, (count, total))| Bucket {
            label,
            lower: None,
            upper: None,
            mean_score: total / count as f64,
            count,
        })
        .collect();

    CategoryGroup {
        attribute: attribute.to_string(),
        kind: Some(AttributeKind::Text),
        binning: Binning::Distinct,
        buckets,
    }
}

fn group_numeric(attribute: &str, points: &[(f64, f64)]) -> CategoryGroup {
    let mut sorted: Vec<f64> = points.iter().map(|(value, _)| *value).collect();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let q = bucket_count(sorted.len());

    let (edges, binning) = match quantile_edges(&sorted, q) {
        Some(edges) => (edges, Binning::Quantile),
        None => {
            debug!(attribute, "duplicate values collapse quantile edges, using equal width");
            (equal_width_edges(&sorted, q), Binning::EqualWidth)
        }
    };

    let slots = edges.len().saturating_sub(1).max(1);
    let mut totals = vec![(0usize, 0.0f64); slots];
    for (value, score) in points {
        let slot = bucket_index(&edges, *value);
        totals[slot].0 += 1;
        totals[slot].1 += score;
    }

    let decimals = label_decimals(&edges);
    let buckets = totals
        .into_iter()
        .enumerate()
        .filter(|(_, (count, _))| *count > 0)
        .map(|(slot, (count, total))| {
            let lower = edges[slot];
            let upper = edges.get(slot + 1).copied().unwrap_or(lower);
            Bucket {
                label: format!("{lower:.decimals$}–{upper:.decimals$}"),
                lower: Some(lower),
                upper: Some(upper),
                mean_score: total / count as f64,
                count,
            }
        })
        .collect();

    CategoryGroup {
        attribute: attribute.to_string(),
        kind: Some(AttributeKind::Numeric),
        binning,
        buckets,
    }
}

/// `q + 1` quantile edges, or `None` when they are not strictly increasing.
fn quantile_edges(sorted: &[f64], q: usize) -> Option<Vec<f64>> {
    let edges: Vec<f64> = (0..=q)
        .map(|k| quantile(sorted, k as f64 / q as f64))
        .collect::<Option<_>>()?;
    edges
        .windows(2)
        .all(|pair| pair[0] < pair[1])
        .then_some(edges)
}

fn equal_width_edges(sorted: &[f64], q: usize) -> Vec<f64> {
    let min = sorted[0];
    let max = sorted[sorted.len() - 1];
    if min == max {
        return vec![min, max];
    }
    let width = (max - min) / q as f64;
    (0..=q)
        .map(|k| if k == q { max } else { min + width * k as f64 })
        .collect()
}

/// Right-closed intervals `(e[k], e[k+1]]`, the first one also closed on the left.
fn bucket_index(edges: &[f64], value: f64) -> usize {
    let last = edges.len().saturating_sub(2);
    edges[1..]
        .iter()
        .position(|upper| value <= *upper)
        .unwrap_or(last)
        .min(last)
}

/// Integer labels unless rounding would make distinct neighbouring edges collide.
fn label_decimals(edges: &[f64]) -> usize {
    (0..=3)
        .find(|&decimals| {
            edges.windows(2).all(|pair| {
                pair[0] == pair[1]
                    || format!("{:.decimals$}", pair[0]) != format!("{:.decimals$}", pair[1])
            })
        })
        .unwrap_or(3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SurveyResponse, ITEM_COUNT};
    use crate::scoring::score_response;
    use pretty_assertions::assert_eq;

    fn respondent(
        id: usize,
        items: [i64; ITEM_COUNT],
        name: &str,
        value: Option<AttributeValue>,
    ) -> ScoredResponse {
        let response =
            SurveyResponse::complete(format!("r{id}"), items).with_attribute(name, value);
        score_response(&response).unwrap()
    }

    fn numeric_sample(values: &[f64]) -> Vec<ScoredResponse> {
        values
            .iter()
            .enumerate()
            .map(|(i, value)| {
                respondent(i, [3; ITEM_COUNT], "Age", Some(AttributeValue::Numeric(*value)))
            })
            .collect()
    }

    #[test]
    fn bucket_count_follows_sample_size() {
        assert_eq!(bucket_count(15), 4);
        assert_eq!(bucket_count(19), 4);
        assert_eq!(bucket_count(20), 6);
        assert_eq!(bucket_count(99), 6);
        assert_eq!(bucket_count(150), 8);
    }

    #[test]
    fn text_attribute_groups_by_value() {
        let sample = vec![
            respondent(
                1,
                [5, 1, 5, 1, 5, 1, 5, 1, 5, 1],
                "Team",
                Some(AttributeValue::Text("A".into())),
            ),
            respondent(2, [3; ITEM_COUNT], "Team", Some(AttributeValue::Text("A".into()))),
            respondent(
                3,
                [1, 5, 1, 5, 1, 5, 1, 5, 1, 5],
                "Team",
                Some(AttributeValue::Text("B".into())),
            ),
            respondent(4, [3; ITEM_COUNT], "Team", None),
        ];
        let group = group_by_attribute(&sample, "Team");
        assert_eq!(group.kind, Some(AttributeKind::Text));
        assert_eq!(group.buckets.len(), 2);
        let a = group.bucket("A").unwrap();
        assert_eq!((a.count, a.mean_score), (2, 75.0));
        let b = group.bucket("B").unwrap();
        assert_eq!((b.count, b.mean_score), (1, 0.0));
    }

    #[test]
    fn fifteen_numeric_values_use_four_quantile_buckets() {
        let values: Vec<f64> = (1..=15).map(|v| v as f64 * 2.0).collect();
        let group = group_by_attribute(&numeric_sample(&values), "Age");
        assert_eq!(group.binning, Binning::Quantile);
        assert_eq!(group.buckets.len(), 4);
        assert_eq!(group.total(), 15);
        assert_eq!(group.buckets[0].label, "2–9");
        assert_eq!(group.buckets[3].label, "23–30");
    }

    #[test]
    fn one_hundred_fifty_values_use_eight_buckets() {
        let values: Vec<f64> = (0..150).map(|v| v as f64).collect();
        let group = group_by_attribute(&numeric_sample(&values), "Age");
        assert_eq!(group.binning, Binning::Quantile);
        assert_eq!(group.buckets.len(), 8);
        assert_eq!(group.total(), 150);
        let lowers: Vec<f64> = group.buckets.iter().filter_map(|b| b.lower).collect();
        assert!(lowers.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn duplicates_fall_back_to_equal_width() {
        let mut values = vec![1.0; 12];
        values.extend([2.0, 5.0, 9.0]);
        let group = group_by_attribute(&numeric_sample(&values), "Age");
        assert_eq!(group.binning, Binning::EqualWidth);
        assert_eq!(group.total(), 15);
        assert_eq!(group.buckets[0].label, "1–3");
        assert_eq!(group.buckets[0].count, 13);
        assert_eq!(group.buckets.last().unwrap().label, "7–9");
    }

    #[test]
    fn single_distinct_value_is_one_bucket() {
        let group = group_by_attribute(&numeric_sample(&[4.0, 4.0, 4.0]), "Age");
        assert_eq!(group.buckets.len(), 1);
        assert_eq!(group.buckets[0].count, 3);
        assert_eq!(group.buckets[0].label, "4–4");
    }

    #[test]
    fn narrow_ranges_keep_labels_distinct() {
        let values: Vec<f64> = (0..8).map(|v| v as f64 * 0.1).collect();
        let group = group_by_attribute(&numeric_sample(&values), "Age");
        let labels: Vec<&str> = group.buckets.iter().map(|b| b.label.as_str()).collect();
        let mut deduped = labels.clone();
        deduped.dedup();
        assert_eq!(labels, deduped);
        assert!(labels[0].contains('.'));
    }

    #[test]
    fn attribute_without_values_is_not_renderable() {
        let sample = vec![respondent(1, [3; ITEM_COUNT], "Team", None)];
        let group = group_by_attribute(&sample, "Team");
        assert!(!group.is_renderable());
        assert!(!group_by_attribute(&sample, "Unknown").is_renderable());
    }
}
