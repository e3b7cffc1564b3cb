use super::ScoreError;
use crate::provider::FieldValueSnapshot;
use crate::rules::{CategoryRules, FieldRule, MissingValue, Modifier};
use serde::Serialize;
use tracing::trace;

/// Audit record for one field rule that produced a score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldContribution {
    pub field: String,
    pub modifier: &'static str,
    pub input: String,
    pub substituted: bool,
    pub factor: f64,
    pub weight: f64,
    pub add_num: f64,
    pub transformed: f64,
    pub score: f64,
    /// False when the merge discards the score for being negative.
    pub accepted: bool,
}

impl FieldContribution {
    /// The computation with literal operands, e.g. `(0 + 2 * log1p(9)) * 1`.
    pub fn expression(&self) -> String {
        format!(
            "({} + {} * {}({})) * {}",
            self.add_num, self.factor, self.modifier, self.input, self.weight
        )
    }
}

/// Scores every field rule of the category in declaration order.
///
/// Absent optional fields are skipped entirely.
pub fn compute_field_scores(
    rules: &CategoryRules,
    snapshot: &FieldValueSnapshot,
) -> Result<Vec<FieldContribution>, ScoreError> {
    let mut contributions = Vec::with_capacity(rules.field_rules.len());
    for rule in &rules.field_rules {
        if let Some(contribution) = compute_field_score(&rules.name, rule, snapshot)? {
            trace!(
                category = %rules.name,
                field = %contribution.field,
                score = contribution.score,
                substituted = contribution.substituted,
                "field contribution"
            );
            contributions.push(contribution);
        }
    }
    Ok(contributions)
}

/// Scores a single field rule, or `None` when the field is absent and optional.
pub fn compute_field_score(
    category: &str,
    rule: &FieldRule,
    snapshot: &FieldValueSnapshot,
) -> Result<Option<FieldContribution>, ScoreError> {
    let computed = match &rule.modifier {
        Modifier::Scalar(modifier) => {
            let (value, substituted) = match snapshot.scalar(&rule.field) {
                Some(value) => (value, false),
                None => match fallback(category, rule)? {
                    None => return Ok(None),
                    Some(MissingValue::Scalar(value)) => (value, true),
                    Some(MissingValue::Point(_)) => return Err(missing_required(category, rule)),
                },
            };
            (value.to_string(), substituted, modifier.apply(value))
        }
        Modifier::DecayGeoExp(decay) => {
            let (point, substituted) = match snapshot.point(&rule.field) {
                Some(point) => (point, false),
                None => match fallback(category, rule)? {
                    None => return Ok(None),
                    Some(MissingValue::Point(point)) => (point, true),
                    Some(MissingValue::Scalar(_)) => return Err(missing_required(category, rule)),
                },
            };
            (point.to_string(), substituted, decay.apply(&point))
        }
    };

    let (input, substituted, transformed) = computed;
    let score = (rule.add_num + rule.factor * transformed) * rule.weight;
    Ok(Some(FieldContribution {
        field: rule.field.clone(),
        modifier: rule.modifier.label(),
        input,
        substituted,
        factor: rule.factor,
        weight: rule.weight,
        add_num: rule.add_num,
        transformed,
        score,
        accepted: score >= 0.0 || score.is_nan(),
    }))
}

// Ok(None) means skip: the field is optional.
fn fallback(category: &str, rule: &FieldRule) -> Result<Option<MissingValue>, ScoreError> {
    if !rule.require {
        return Ok(None);
    }
    rule.missing
        .map(Some)
        .ok_or_else(|| missing_required(category, rule))
}

fn missing_required(category: &str, rule: &FieldRule) -> ScoreError {
    ScoreError::MissingRequiredField {
        category: category.to_string(),
        field: rule.field.clone(),
    }
}
