use tracing::debug;

use crate::error::SchemaError;
use crate::models::{ScoredResponse, SurveyResponse, ITEM_COUNT, LIKERT_MAX, LIKERT_MIN};

pub const SCORE_FACTOR: f64 = 2.5;

/// Contribution of one clamped answer. Odd positions are positively worded,
/// even positions are reverse scored.
pub fn adjusted_value(position: usize, value: u8) -> u8 {
    match position % 2 {
        1 => value - 1,
        _ => 5 - value,
    }
}

pub fn clamp_item(value: i64) -> u8 {
    value.clamp(LIKERT_MIN, LIKERT_MAX) as u8
}

pub fn score_response(response: &SurveyResponse) -> Result<ScoredResponse, SchemaError> {
    if response.items.len() != ITEM_COUNT {
        return Err(SchemaError::ItemCount {
            respondent: response.id.clone(),
            expected: ITEM_COUNT,
            found: response.items.len(),
        });
    }

    let mut items = [0u8; ITEM_COUNT];
    let mut adjusted = [0u8; ITEM_COUNT];
    for (index, raw) in response.items.iter().enumerate() {
        let position = index + 1;
        let value = raw.ok_or_else(|| SchemaError::MissingItem {
            respondent: response.id.clone(),
            item: position,
        })?;
        items[index] = clamp_item(value);
        adjusted[index] = adjusted_value(position, items[index]);
    }

    let sum: u32 = adjusted.iter().map(|value| u32::from(*value)).sum();
    Ok(ScoredResponse {
        response: response.clone(),
        items,
        adjusted,
        score: f64::from(sum) * SCORE_FACTOR,
    })
}

/// Scores a whole sample, stopping at the first malformed response.
pub fn score_sample(responses: &[SurveyResponse]) -> Result<Vec<ScoredResponse>, SchemaError> {
    let scored = responses
        .iter()
        .map(score_response)
        .collect::<Result<Vec<_>, _>>()?;
    debug!(respondents = scored.len(), "scored sample");
    Ok(scored)
}
