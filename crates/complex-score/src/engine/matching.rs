use crate::provider::FieldValueSnapshot;
use crate::rules::{CategoryRules, MatchClause, MatchKind, SortRule};
use serde::Serialize;

/// The sort rule that awarded the bonus.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SortMatch {
    pub weight: i32,
    pub condition: String,
    pub sort_base_score: f64,
    pub bonus: f64,
}

/// Checks one clause against the field's value set.
///
/// `in`/`not_in` test whether a field value occurs inside the expected value
/// (`value.contains(v)`), not the other way round.
pub fn clause_matches(clause: &MatchClause, values: &[String]) -> bool {
    let expected = clause.value.as_deref().unwrap_or("");
    match clause.kind {
        MatchKind::Any => true,
        MatchKind::Equal => values.iter().any(|value| value == expected),
        MatchKind::Not => !values.iter().any(|value| value == expected),
        MatchKind::Exists => !values.is_empty(),
        MatchKind::NotExists => values.is_empty(),
        MatchKind::In => values.iter().any(|value| expected.contains(value.as_str())),
        MatchKind::NotIn => !values.iter().any(|value| expected.contains(value.as_str())),
    }
}

/// All clauses must match; a rule without clauses never does.
pub fn rule_matches(rule: &SortRule, snapshot: &FieldValueSnapshot) -> bool {
    !rule.clauses.is_empty()
        && rule.clauses.iter().all(|clause| {
            let values = clause
                .field
                .as_deref()
                .map(|field| snapshot.terms(field))
                .unwrap_or(&[]);
            clause_matches(clause, values)
        })
}

/// First matching rule in priority order, with its bonus.
///
/// A negative bonus is floored out like a negative field score and contributes zero.
pub fn evaluate_sort_rules(rules: &CategoryRules, snapshot: &FieldValueSnapshot) -> Option<SortMatch> {
    let sort_base_score = rules.sort_base_score.unwrap_or(0.0);
    rules
        .sort_rules
        .iter()
        .find(|rule| rule_matches(rule, snapshot))
        .map(|rule| {
            let raw = f64::from(rule.weight) * sort_base_score;
            SortMatch {
                weight: rule.weight,
                condition: rule.condition(),
                sort_base_score,
                bonus: if raw < 0.0 { 0.0 } else { raw },
            }
        })
}
