//! Per-document score evaluation.
//!
//! A [`ComplexScoreEngine`] wraps an immutable [`RuleSet`] and scores documents through a
//! [`FieldValueProvider`]: the category code picks the rules, field rules produce merged
//! field scores, the first matching sort rule adds its bonus, and the composer combines
//! both with the underlying relevance score. Documents without resolvable rules pass
//! their relevance score through unchanged apart from `original_score_factor`.

pub mod compose;
pub mod explain;
pub mod fields;
pub mod matching;
pub mod merge;
pub mod resolver;

#[cfg(test)]
mod tests;

pub use explain::{Explanation, ExplanationNode};
pub use fields::FieldContribution;
pub use matching::SortMatch;

use crate::provider::{DocId, FieldAccessError, FieldValueProvider, FieldValueSnapshot};
use crate::rules::{CategoryRules, RuleSet};
use explain::CategoryTrace;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Fatal per-document failures. Any of them aborts the whole scoring request.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoreError {
    #[error("field [{field}] of category [{category}] is required but has no value and no missing fallback")]
    MissingRequiredField { category: String, field: String },
    #[error(transparent)]
    UnsupportedFieldType(#[from] FieldAccessError),
    #[error("category [{category}] produced a non-finite {component}: {value}")]
    NonFiniteScore {
        category: String,
        component: String,
        value: f64,
    },
}

/// What to do with NaN or infinite scores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NonFinitePolicy {
    /// Hand them to the caller unchanged.
    #[default]
    Propagate,
    /// Fail with [`ScoreError::NonFiniteScore`].
    Reject,
}

impl NonFinitePolicy {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "propagate" => Some(NonFinitePolicy::Propagate),
            "reject" => Some(NonFinitePolicy::Reject),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            NonFinitePolicy::Propagate => "propagate",
            NonFinitePolicy::Reject => "reject",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineOptions {
    pub non_finite: NonFinitePolicy,
}

/// One document of a batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreRequest {
    pub doc: DocId,
    pub sub_query_score: f64,
    pub explain: bool,
}

impl ScoreRequest {
    pub fn new(doc: DocId, sub_query_score: f64) -> Self {
        Self {
            doc,
            sub_query_score,
            explain: false,
        }
    }

    pub fn explained(mut self) -> Self {
        self.explain = true;
        self
    }
}

/// Final score with the intermediate totals that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreOutcome {
    pub score: f64,
    /// Category code read from the document, whether or not it resolved.
    pub category_code: Option<String>,
    /// Name of the resolved category; `None` for pass-through documents.
    pub category: Option<String>,
    pub field_score_total: f64,
    pub sort_score_total: f64,
    pub contributions: Vec<FieldContribution>,
    pub sort_match: Option<SortMatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<Explanation>,
}

impl ScoreOutcome {
    pub fn passed_through(&self) -> bool {
        self.category.is_none()
    }
}

/// Scores documents against one compiled rule set.
///
/// Holds no mutable state, so a single engine can be shared across threads.
#[derive(Debug, Clone)]
pub struct ComplexScoreEngine {
    rules: Arc<RuleSet>,
    options: EngineOptions,
}

impl ComplexScoreEngine {
    pub fn new(rules: Arc<RuleSet>, options: EngineOptions) -> Self {
        debug!(
            categories = rules.categories.len(),
            category_field = %rules.category_field,
            non_finite = options.non_finite.label(),
            "complex score engine ready"
        );
        Self { rules, options }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn options(&self) -> EngineOptions {
        self.options
    }

    pub fn score<P: FieldValueProvider + ?Sized>(
        &self,
        provider: &P,
        doc: DocId,
        sub_query_score: f64,
    ) -> Result<ScoreOutcome, ScoreError> {
        self.evaluate(provider, doc, sub_query_score, false)
    }

    /// Like [`score`](Self::score), with the explanation tree attached.
    pub fn explain<P: FieldValueProvider + ?Sized>(
        &self,
        provider: &P,
        doc: DocId,
        sub_query_score: f64,
    ) -> Result<ScoreOutcome, ScoreError> {
        self.evaluate(provider, doc, sub_query_score, true)
    }

    /// Scores pre-captured field values; a pure function of its inputs and the rule set.
    pub fn score_snapshot(
        &self,
        category_code: Option<&str>,
        snapshot: &FieldValueSnapshot,
        sub_query_score: f64,
    ) -> Result<ScoreOutcome, ScoreError> {
        self.evaluate_snapshot(category_code, snapshot, sub_query_score, false)
    }

    pub fn explain_snapshot(
        &self,
        category_code: Option<&str>,
        snapshot: &FieldValueSnapshot,
        sub_query_score: f64,
    ) -> Result<ScoreOutcome, ScoreError> {
        self.evaluate_snapshot(category_code, snapshot, sub_query_score, true)
    }

    /// Scores requests in order. The first fatal error aborts the whole batch and no
    /// partial results are returned.
    pub fn score_batch<P: FieldValueProvider + ?Sized>(
        &self,
        provider: &P,
        requests: &[ScoreRequest],
    ) -> Result<Vec<ScoreOutcome>, ScoreError> {
        requests
            .iter()
            .map(|request| {
                self.evaluate(provider, request.doc, request.sub_query_score, request.explain)
            })
            .collect()
    }

    fn evaluate<P: FieldValueProvider + ?Sized>(
        &self,
        provider: &P,
        doc: DocId,
        sub_query_score: f64,
        explain: bool,
    ) -> Result<ScoreOutcome, ScoreError> {
        let code = resolver::category_code(provider, &self.rules, doc)?;
        match resolver::resolve(&self.rules, code.as_deref()) {
            Some(rules) => {
                let snapshot = FieldValueSnapshot::capture(provider, doc, rules)?;
                self.evaluate_category(code.as_deref(), rules, &snapshot, sub_query_score, explain)
            }
            None => Ok(self.pass_through(code.as_deref(), sub_query_score, explain)),
        }
    }

    fn evaluate_snapshot(
        &self,
        category_code: Option<&str>,
        snapshot: &FieldValueSnapshot,
        sub_query_score: f64,
        explain: bool,
    ) -> Result<ScoreOutcome, ScoreError> {
        match resolver::resolve(&self.rules, category_code) {
            Some(rules) => {
                self.evaluate_category(category_code, rules, snapshot, sub_query_score, explain)
            }
            None => Ok(self.pass_through(category_code, sub_query_score, explain)),
        }
    }

    fn pass_through(
        &self,
        category_code: Option<&str>,
        sub_query_score: f64,
        explain: bool,
    ) -> ScoreOutcome {
        let score = compose::pass_through(&self.rules, sub_query_score);
        ScoreOutcome {
            score,
            category_code: category_code.map(str::to_string),
            category: None,
            field_score_total: 0.0,
            sort_score_total: 0.0,
            contributions: Vec::new(),
            sort_match: None,
            explanation: explain.then(|| {
                explain::explain_pass_through(&self.rules, category_code, sub_query_score, score)
            }),
        }
    }

    fn evaluate_category(
        &self,
        category_code: Option<&str>,
        rules: &CategoryRules,
        snapshot: &FieldValueSnapshot,
        sub_query_score: f64,
        explain: bool,
    ) -> Result<ScoreOutcome, ScoreError> {
        let contributions = fields::compute_field_scores(rules, snapshot)?;
        let field_total = merge::merge_field_scores(
            rules.field_mode,
            contributions.iter().map(|contribution| contribution.score),
        );
        let sort_match = matching::evaluate_sort_rules(rules, snapshot);
        let sort_total = sort_match.as_ref().map_or(0.0, |matched| matched.bonus);
        let score = compose::compose(&self.rules, field_total, sort_total, sub_query_score);

        if self.options.non_finite == NonFinitePolicy::Reject {
            reject_non_finite(rules, &contributions, score)?;
        }

        let explanation = explain.then(|| {
            explain::explain_category(CategoryTrace {
                rule_set: &self.rules,
                rules,
                contributions: &contributions,
                field_total,
                sort_match: sort_match.as_ref(),
                sort_total,
                sub_query_score,
                score,
            })
        });

        Ok(ScoreOutcome {
            score,
            category_code: category_code.map(str::to_string),
            category: Some(rules.name.clone()),
            field_score_total: field_total,
            sort_score_total: sort_total,
            contributions,
            sort_match,
            explanation,
        })
    }
}

fn reject_non_finite(
    rules: &CategoryRules,
    contributions: &[FieldContribution],
    score: f64,
) -> Result<(), ScoreError> {
    if let Some(contribution) = contributions.iter().find(|c| !c.score.is_finite()) {
        return Err(ScoreError::NonFiniteScore {
            category: rules.name.clone(),
            component: format!("score for field [{}]", contribution.field),
            value: contribution.score,
        });
    }
    if !score.is_finite() {
        return Err(ScoreError::NonFiniteScore {
            category: rules.name.clone(),
            component: "final score".to_string(),
            value: score,
        });
    }
    Ok(())
}
