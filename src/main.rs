use complex_score::error::AppError;
use complex_score_cli::run;

fn main() {
    match run() {
        Ok(()) => {}
        Err(AppError::Usage(err)) => err.exit(),
        Err(err) => {
            eprintln!("application error: {err}");
            std::process::exit(1);
        }
    }
}
