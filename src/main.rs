mod cli;
mod engine;
mod error;
mod export;
mod logging;
mod markdown;
mod model;
mod orchestrator;
mod store;
mod transcript;
#[cfg(feature = "tui")]
mod tui;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    // Before the runtime spawns its workers.
    model::capture_local_offset();
    run()
}

#[tokio::main]
async fn run() -> Result<()> {
    let args = cli::Cli::parse();
    let is_non_tui = !args.is_interactive();
    let target = if is_non_tui {
        logging::LogTarget::Stderr
    } else {
        logging::LogTarget::CacheFile
    };
    logging::init(&args.log_level, target)?;

    match cli::run(args).await {
        Ok(()) => {
            // Explicitly exit with code 0 on success, especially for non-TUI modes
            if is_non_tui {
                std::process::exit(0);
            }
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "exiting with error");
            Err(e)
        }
    }
}
