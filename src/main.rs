// src/main.rs

use std::process::ExitCode;

use assetflow::{cli, logging, run};

#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::parse();
    if let Err(err) = logging::init_logging(args.log_level) {
        eprintln!("assetflow: failed to initialise logging: {err:?}");
    }

    match run(args).await {
        Ok(outcome) => ExitCode::from(outcome.exit_code()),
        Err(err) => {
            eprintln!("assetflow error: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}
