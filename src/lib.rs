mod cli;
mod commands;

use complex_score::config::AppConfig;
use complex_score::error::AppError;
use std::ffi::OsString;
use std::io::Write;

pub fn run() -> Result<(), AppError> {
    cli::run()
}

/// Runs one command with explicit arguments and configuration, writing to `out`.
pub fn run_with_args<I, T>(args: I, config: &AppConfig, out: &mut dyn Write) -> Result<(), AppError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    cli::run_with_args(args, config, out)
}
