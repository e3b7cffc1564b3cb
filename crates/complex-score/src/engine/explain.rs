use super::fields::FieldContribution;
use super::matching::SortMatch;
use crate::rules::{CategoryRules, RuleSet};
use serde::Serialize;
use std::fmt::Write as _;

/// Descriptive breakdown of a score; never read back by the engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Explanation {
    pub label: String,
    pub value: f64,
    pub detail: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Explanation>,
}

/// Flattened node of an explanation tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExplanationNode<'a> {
    pub depth: usize,
    pub label: &'a str,
    pub value: f64,
    pub detail: &'a str,
}

impl Explanation {
    pub fn new(label: impl Into<String>, value: f64, detail: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value,
            detail: detail.into(),
            children: Vec::new(),
        }
    }

    pub fn with_child(mut self, child: Explanation) -> Self {
        self.children.push(child);
        self
    }

    /// Pre-order list of nodes.
    pub fn nodes(&self) -> Vec<ExplanationNode<'_>> {
        let mut nodes = Vec::new();
        self.collect(0, &mut nodes);
        nodes
    }

    fn collect<'a>(&'a self, depth: usize, nodes: &mut Vec<ExplanationNode<'a>>) {
        nodes.push(ExplanationNode {
            depth,
            label: &self.label,
            value: self.value,
            detail: &self.detail,
        });
        for child in &self.children {
            child.collect(depth + 1, nodes);
        }
    }

    /// Indented plain-text rendering, one node per line.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for node in self.nodes() {
            let _ = writeln!(
                out,
                "{:indent$}{} = {}: {}",
                "",
                node.label,
                node.value,
                node.detail,
                indent = node.depth * 2
            );
        }
        out
    }
}

pub(crate) fn explain_pass_through(
    rule_set: &RuleSet,
    category_code: Option<&str>,
    sub_query_score: f64,
    score: f64,
) -> Explanation {
    let reason = match category_code.map(str::trim) {
        None | Some("") => "no category code".to_string(),
        Some(code) => format!("no rules for category [{code}]"),
    };
    Explanation::new(
        "complex score",
        score,
        format!(
            "{reason}: original_score_factor * sub_query_score = {} * {}",
            rule_set.original_score_factor, sub_query_score
        ),
    )
}

pub(crate) struct CategoryTrace<'a> {
    pub rule_set: &'a RuleSet,
    pub rules: &'a CategoryRules,
    pub contributions: &'a [FieldContribution],
    pub field_total: f64,
    pub sort_match: Option<&'a SortMatch>,
    pub sort_total: f64,
    pub sub_query_score: f64,
    pub score: f64,
}

pub(crate) fn explain_category(trace: CategoryTrace<'_>) -> Explanation {
    let mut fields = Explanation::new(
        "field score total",
        trace.field_total,
        format!("merged with field_mode [{}]", trace.rules.field_mode.label()),
    );
    for contribution in trace.contributions {
        let mut detail = contribution.expression();
        if contribution.substituted {
            detail.push_str(", missing value substituted");
        }
        if !contribution.accepted {
            detail.push_str(", discarded as negative");
        }
        fields = fields.with_child(Explanation::new(
            format!("field [{}]", contribution.field),
            contribution.score,
            detail,
        ));
    }

    let sort = match trace.sort_match {
        Some(matched) => Explanation::new(
            "sort score total",
            trace.sort_total,
            format!(
                "first match [{}]: weight * sort_base_score = {} * {}",
                matched.condition, matched.weight, matched.sort_base_score
            ),
        ),
        None => Explanation::new(
            "sort score total",
            trace.sort_total,
            format!("no sort rule matched (sort_mode [{}])", trace.rules.sort_mode.label()),
        ),
    };

    Explanation::new(
        "complex score",
        trace.score,
        format!(
            "category [{}]: func_score_factor * field_score_total + original_score_factor * sub_query_score + sort_score_total = {} * {} + {} * {} + {}",
            trace.rules.name,
            trace.rule_set.func_score_factor,
            trace.field_total,
            trace.rule_set.original_score_factor,
            trace.sub_query_score,
            trace.sort_total
        ),
    )
    .with_child(fields)
    .with_child(sort)
}
