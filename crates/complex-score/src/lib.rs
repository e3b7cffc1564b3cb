pub mod config;
pub mod engine;
pub mod error;
pub mod provider;
pub mod report;
pub mod rules;
pub mod telemetry;

pub use engine::{
    ComplexScoreEngine, EngineOptions, Explanation, NonFinitePolicy, ScoreError, ScoreOutcome,
    ScoreRequest,
};
pub use provider::{
    DocId, FieldAccessError, FieldValueProvider, FieldValueSnapshot, JsonDocument,
    JsonDocumentStore,
};
pub use rules::loader::{ConfigurationError, DuplicateCodePolicy, LoaderOptions, RuleSetLoader};
pub use rules::{CategoryRules, FieldMode, FieldRule, Modifier, RuleSet, SortMode, SortRule};
