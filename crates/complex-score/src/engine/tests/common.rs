use std::sync::Arc;

use serde_json::{json, Value};

use crate::engine::{ComplexScoreEngine, EngineOptions, NonFinitePolicy};
use crate::provider::{JsonDocument, JsonDocumentStore};
use crate::rules::loader::RuleSetLoader;
use crate::rules::RuleSet;

pub(super) const TOLERANCE: f64 = 1e-9;

pub(super) fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < TOLERANCE,
        "expected {expected}, got {actual}"
    );
}

pub(super) fn rule_set(config: Value) -> Arc<RuleSet> {
    Arc::new(
        RuleSetLoader::default()
            .from_value(config)
            .expect("rule set loads"),
    )
}

pub(super) fn engine(config: Value) -> ComplexScoreEngine {
    ComplexScoreEngine::new(rule_set(config), EngineOptions::default())
}

pub(super) fn strict_engine(config: Value) -> ComplexScoreEngine {
    ComplexScoreEngine::new(
        rule_set(config),
        EngineOptions {
            non_finite: NonFinitePolicy::Reject,
        },
    )
}

pub(super) fn electronics_config() -> Value {
    json!({
        "func_score_factor": 2,
        "original_score_factor": 1,
        "categorys": {
            "electronics": {
                "filed_mode": "sum",
                "fields_score": [
                    { "field": "price", "factor": 0.5, "modifier": "log1p", "weight": 1, "add_num": 0 }
                ]
            }
        }
    })
}

/// Two alias codes sharing field and sort rules.
pub(super) fn phones_config() -> Value {
    json!({
        "func_score_factor": 1,
        "original_score_factor": 0.5,
        "categorys": {
            "phones,mobiles": {
                "filed_mode": "sum",
                "fields_score": [
                    { "field": "sales", "factor": 1, "modifier": "log1p" },
                    { "field": "rating", "factor": 2, "modifier": "none", "weight": 0.5 },
                    { "field": "stock", "factor": 1, "modifier": "none", "require": true, "missing": "3" }
                ],
                "sort_mode": "max",
                "sort_base_score": 10,
                "sort_score": [
                    { "weight": 1, "type": "any" },
                    { "weight": 5, "field": "brand", "type": "equal", "value": "acme" },
                    { "weight": 3, "field": "brand&color", "type": "equal&not", "value": "zen&red" }
                ]
            }
        }
    })
}

pub(super) fn store(documents: Value) -> JsonDocumentStore {
    let documents: Vec<JsonDocument> =
        serde_json::from_value(documents).expect("documents deserialize");
    JsonDocumentStore::new(documents)
}
