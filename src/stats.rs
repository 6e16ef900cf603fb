use tracing::warn;

use crate::models::{SampleStatistics, ScoredResponse, ThresholdShare, ITEM_COUNT};

/// Quantile of an ascending slice using linear interpolation between order
/// statistics. Returns `None` for an empty slice.
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let position = (sorted.len() - 1) as f64 * q.clamp(0.0, 1.0);
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Bessel-corrected standard deviation; zero below two observations.
pub fn std_dev(values: &[f64]) -> f64 {
    let Some(mean) = mean(values) else {
        return 0.0;
    };
    if values.len() < 2 {
        return 0.0;
    }
    let variance = values
        .iter()
        .map(|value| (value - mean).powi(2))
        .sum::<f64>()
        / (values.len() - 1) as f64;
    variance.sqrt()
}

pub fn sorted_scores(sample: &[ScoredResponse]) -> Vec<f64> {
    let mut scores: Vec<f64> = sample.iter().map(|scored| scored.score).collect();
    scores.sort_by(|a, b| a.total_cmp(b));
    scores
}

pub fn aggregate(sample: &[ScoredResponse], thresholds: &[f64]) -> SampleStatistics {
    if sample.is_empty() {
        warn!("aggregating an empty sample");
        return SampleStatistics::default();
    }

    let scores = sorted_scores(sample);
    let count = scores.len();
    let q1 = quantile(&scores, 0.25).unwrap_or_default();
    let q3 = quantile(&scores, 0.75).unwrap_or_default();

    let thresholds = thresholds
        .iter()
        .map(|&cutoff| {
            let hits = scores.iter().filter(|&&score| score >= cutoff).count();
            ThresholdShare {
                cutoff,
                percent: hits as f64 / count as f64 * 100.0,
            }
        })
        .collect();

    SampleStatistics {
        count,
        mean: mean(&scores).unwrap_or_default(),
        median: quantile(&scores, 0.5).unwrap_or_default(),
        std_dev: std_dev(&scores),
        min: scores[0],
        max: scores[count - 1],
        q1,
        q3,
        iqr: q3 - q1,
        thresholds,
    }
}

/// Mean clamped answer per questionnaire item, in item order.
pub fn item_means(sample: &[ScoredResponse]) -> [f64; ITEM_COUNT] {
    let mut means = [0.0; ITEM_COUNT];
    if sample.is_empty() {
        return means;
    }
    for scored in sample {
        for (total, value) in means.iter_mut().zip(scored.items.iter()) {
            *total += f64::from(*value);
        }
    }
    for total in means.iter_mut() {
        *total /= sample.len() as f64;
    }
    means
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SurveyResponse;
    use crate::scoring::score_response;

    fn scored(items: [i64; ITEM_COUNT]) -> ScoredResponse {
        score_response(&SurveyResponse::complete("t", items)).unwrap()
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn quantiles_interpolate_between_order_statistics() {
        let values = [10.0, 20.0, 30.0, 40.0];
        assert!(close(quantile(&values, 0.25).unwrap(), 17.5));
        assert!(close(quantile(&values, 0.5).unwrap(), 25.0));
        assert!(close(quantile(&values, 0.75).unwrap(), 32.5));
        assert_eq!(quantile(&[], 0.5), None);
    }

    #[test]
    fn empty_sample_yields_no_data() {
        let stats = aggregate(&[], &[70.0]);
        assert!(stats.is_empty());
        assert_eq!(stats, SampleStatistics::default());
    }

    #[test]
    fn single_element_sample() {
        let sample = vec![scored([4, 2, 4, 2, 4, 2, 4, 2, 4, 2])];
        let stats = aggregate(&sample, &[]);
        assert_eq!(stats.count, 1);
        assert_eq!(stats.mean, 75.0);
        assert_eq!(stats.std_dev, 0.0);
        assert_eq!(stats.q1, 75.0);
        assert_eq!(stats.q3, 75.0);
        assert_eq!(stats.iqr, 0.0);
    }

    #[test]
    fn spread_uses_sample_standard_deviation() {
        // scores 0, 50, 100
        let sample = vec![
            scored([1, 5, 1, 5, 1, 5, 1, 5, 1, 5]),
            scored([3; ITEM_COUNT]),
            scored([5, 1, 5, 1, 5, 1, 5, 1, 5, 1]),
        ];
        let stats = aggregate(&sample, &[50.0, 72.0]);
        assert_eq!(stats.mean, 50.0);
        assert_eq!(stats.median, 50.0);
        assert!(close(stats.std_dev, 50.0));
        assert_eq!((stats.min, stats.max), (0.0, 100.0));
        assert_eq!((stats.q1, stats.q3, stats.iqr), (25.0, 75.0, 50.0));
        assert!(close(stats.percent_at_least(50.0).unwrap(), 200.0 / 3.0));
        assert!(close(stats.percent_at_least(72.0).unwrap(), 100.0 / 3.0));
    }

    #[test]
    fn item_means_use_clamped_answers() {
        let sample = vec![scored([5; ITEM_COUNT]), scored([1, 9, 1, 1, 1, 1, 1, 1, 1, 1])];
        let means = item_means(&sample);
        assert_eq!(means[0], 3.0);
        assert_eq!(means[1], 5.0);
    }
}
