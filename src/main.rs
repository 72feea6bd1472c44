use clap::{CommandFactory, Parser};
use ev_registrations::PipelineError;
use ev_registrations::cli::{args::Args, commands};
use std::process;
use tokio_util::sync::CancellationToken;

/// Exit status when the run completed but some dates or files failed
const EXIT_PARTIAL_FAILURE: i32 = 2;

fn main() {
    let args = Args::parse();

    // If no subcommand was provided, show help and available commands
    if args.command.is_none() {
        let _ = Args::command().print_help();
        println!();
        process::exit(0);
    }

    let runtime = tokio::runtime::Runtime::new().unwrap_or_else(|e| {
        eprintln!("Failed to create async runtime: {}", e);
        process::exit(1);
    });

    let result = runtime.block_on(async {
        let cancellation_token = CancellationToken::new();

        // Cancellation lets in-flight downloads and merges wind down so no
        // partial file is left behind
        let signal_token = cancellation_token.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    eprintln!("\nReceived CTRL+C, shutting down gracefully...");
                    signal_token.cancel();
                }
                Err(e) => eprintln!("Failed to install CTRL+C signal handler: {}", e),
            }
        });

        let result = commands::run(args, cancellation_token.clone()).await;
        if cancellation_token.is_cancelled() {
            return Err(PipelineError::Interrupted {
                reason: "interrupted by user".to_string(),
            }
            .into());
        }
        result
    });

    match result {
        Ok(0) => process::exit(0),
        Ok(failures) => {
            eprintln!("Completed with {} failure(s)", failures);
            process::exit(EXIT_PARTIAL_FAILURE);
        }
        Err(error) => {
            eprintln!("Error: {:#}", error);
            process::exit(1);
        }
    }
}
