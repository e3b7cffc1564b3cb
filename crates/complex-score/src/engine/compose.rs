use crate::rules::RuleSet;

/// `funcScoreFactor * fieldTotal + originalScoreFactor * subQueryScore + sortTotal`.
pub fn compose(rule_set: &RuleSet, field_total: f64, sort_total: f64, sub_query_score: f64) -> f64 {
    rule_set.func_score_factor * field_total
        + rule_set.original_score_factor * sub_query_score
        + sort_total
}

/// Score of a document whose category did not resolve.
pub fn pass_through(rule_set: &RuleSet, sub_query_score: f64) -> f64 {
    rule_set.original_score_factor * sub_query_score
}
