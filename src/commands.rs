use clap::Args;
use complex_score::config::AppConfig;
use complex_score::error::AppError;
use complex_score::report::{write_scores, ScoreRow};
use complex_score::{
    ComplexScoreEngine, DocId, JsonDocument, JsonDocumentStore, RuleSet, RuleSetLoader,
    ScoreOutcome, ScoreRequest,
};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

#[derive(Args, Debug)]
pub(crate) struct ValidateArgs {
    /// Rule configuration (JSON)
    #[arg(long)]
    pub(crate) rules: PathBuf,
}

#[derive(Args, Debug)]
pub(crate) struct ScoreArgs {
    /// Rule configuration (JSON)
    #[arg(long)]
    pub(crate) rules: PathBuf,
    /// JSON array of documents: {"id", "sub_query_score", "fields"}
    #[arg(long)]
    pub(crate) documents: PathBuf,
    /// Print each document's explanation tree as JSON (the CSV report then needs --output)
    #[arg(long, requires = "output")]
    pub(crate) explain: bool,
    /// Write the CSV report to this file instead of stdout
    #[arg(long)]
    pub(crate) output: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct ExplainedScore<'a> {
    id: &'a str,
    #[serde(flatten)]
    outcome: &'a ScoreOutcome,
}

fn request_for(
    position: usize,
    document: &JsonDocument,
    explain: bool,
) -> Result<ScoreRequest, AppError> {
    let doc = DocId::try_from(position).map_err(|_| {
        AppError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!(
                "document {} at position {position} is beyond the addressable range",
                document.id
            ),
        ))
    })?;
    let request = ScoreRequest::new(doc, document.sub_query_score);
    Ok(if explain { request.explained() } else { request })
}

fn load_rules(path: &Path, config: &AppConfig) -> Result<RuleSet, AppError> {
    let loader = RuleSetLoader::new(config.scoring.loader_options());
    Ok(loader.from_path(path)?)
}

pub(crate) fn validate(
    args: ValidateArgs,
    config: &AppConfig,
    out: &mut dyn Write,
) -> Result<(), AppError> {
    let rules = load_rules(&args.rules, config)?;

    let categories: BTreeSet<&str> = rules
        .categories
        .values()
        .map(|category| category.name.as_str())
        .collect();
    let mut codes: Vec<&str> = rules.categories.keys().map(String::as_str).collect();
    codes.sort_unstable();

    writeln!(out, "rules OK: {}", args.rules.display())?;
    writeln!(out, "category field: {}", rules.category_field)?;
    writeln!(
        out,
        "categories: {} ({} codes: {})",
        categories.len(),
        codes.len(),
        codes.join(", ")
    )?;
    for (field, mandatory) in rules.required_fields() {
        let marker = if mandatory { "required" } else { "optional" };
        writeln!(out, "  {field} [{marker}]")?;
    }
    Ok(())
}

pub(crate) fn score(args: ScoreArgs, config: &AppConfig, out: &mut dyn Write) -> Result<(), AppError> {
    let rules = Arc::new(load_rules(&args.rules, config)?);
    let store = JsonDocumentStore::from_path(&args.documents)?;
    let engine = ComplexScoreEngine::new(rules, config.scoring.engine_options());

    let requests = store
        .documents()
        .iter()
        .enumerate()
        .map(|(position, document)| request_for(position, document, args.explain))
        .collect::<Result<Vec<_>, _>>()?;

    let outcomes = engine.score_batch(&store, &requests)?;
    let passed_through = outcomes.iter().filter(|o| o.passed_through()).count();
    info!(
        documents = outcomes.len(),
        passed_through,
        "scored documents"
    );

    let rows: Vec<ScoreRow> = store
        .documents()
        .iter()
        .zip(&outcomes)
        .map(|(document, outcome)| ScoreRow::from_outcome(document.id.clone(), outcome))
        .collect();

    match &args.output {
        Some(path) => {
            let file = BufWriter::new(File::create(path)?);
            write_scores(file, &rows)?;
            info!(path = %path.display(), "wrote score report");
        }
        None => write_scores(&mut *out, &rows)?,
    }

    if args.explain {
        let explained: Vec<ExplainedScore<'_>> = store
            .documents()
            .iter()
            .zip(&outcomes)
            .map(|(document, outcome)| ExplainedScore {
                id: &document.id,
                outcome,
            })
            .collect();
        serde_json::to_writer_pretty(&mut *out, &explained)?;
        writeln!(out)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document() -> JsonDocument {
        JsonDocument {
            id: "tv-1".to_string(),
            sub_query_score: 2.5,
            fields: serde_json::Map::new(),
        }
    }

    #[test]
    fn requests_keep_position_and_query_score() {
        let request = request_for(7, &document(), true).expect("position fits");
        assert_eq!(request.doc, 7);
        assert_eq!(request.sub_query_score, 2.5);
        assert!(request.explain);
    }

    #[test]
    fn positions_past_the_id_range_are_rejected() {
        let Some(position) = (DocId::MAX as usize).checked_add(1) else {
            return;
        };
        match request_for(position, &document(), false) {
            Err(AppError::Io(err)) => assert_eq!(err.kind(), std::io::ErrorKind::InvalidData),
            other => panic!("expected out of range error, got {other:?}"),
        }
    }
}
