use crate::commands::{score, validate, ScoreArgs, ValidateArgs};
use clap::{Parser, Subcommand};
use complex_score::config::AppConfig;
use complex_score::error::AppError;
use complex_score::telemetry;
use std::ffi::OsString;
use std::io::Write;

#[derive(Parser, Debug)]
#[command(
    name = "complex-score",
    about = "Validate category scoring rules and score documents against them",
    version
)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Compile a rule configuration and report what it covers
    Validate(ValidateArgs),
    /// Score a JSON document file and write an id,category_code,category,score report
    Score(ScoreArgs),
}

pub(crate) fn run() -> Result<(), AppError> {
    let cli = Cli::try_parse()?;
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let stdout = std::io::stdout();
    execute(cli.command, &config, &mut stdout.lock())
}

/// Parses `args` (program name first) and runs the command without installing telemetry.
pub(crate) fn run_with_args<I, T>(
    args: I,
    config: &AppConfig,
    out: &mut dyn Write,
) -> Result<(), AppError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::try_parse_from(args)?;
    execute(cli.command, config, out)
}

fn execute(command: Command, config: &AppConfig, out: &mut dyn Write) -> Result<(), AppError> {
    match command {
        Command::Validate(args) => validate(args, config, out),
        Command::Score(args) => score(args, config, out),
    }
}
