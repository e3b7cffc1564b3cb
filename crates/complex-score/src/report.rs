use crate::engine::ScoreOutcome;
use serde::{Deserialize, Serialize};
use std::io::Write;

/// One line of the score report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRow {
    pub id: String,
    /// Code read from the document's category field; empty when it had none.
    #[serde(default)]
    pub category_code: String,
    /// Empty for documents that passed through.
    #[serde(default)]
    pub category: String,
    pub score: f64,
}

impl ScoreRow {
    pub fn from_outcome(id: impl Into<String>, outcome: &ScoreOutcome) -> Self {
        Self {
            id: id.into(),
            category_code: outcome.category_code.clone().unwrap_or_default(),
            category: outcome.category.clone().unwrap_or_default(),
            score: outcome.score,
        }
    }
}

/// Writes rows as CSV with an `id,category_code,category,score` header.
pub fn write_scores<W: Write>(writer: W, rows: &[ScoreRow]) -> Result<(), csv::Error> {
    let mut csv_writer = csv::WriterBuilder::new().has_headers(true).from_writer(writer);
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}
