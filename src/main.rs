//! EventStore to SQLite converter - Binary Entry Point

use clap::Parser;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

use eventstore_sqlite::cli::{format_summary, Cli};
use eventstore_sqlite::{Converter, ConverterError, ExitCode, JsonlEventSource, ShutdownSignal};

fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so the summary on stdout stays clean
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let code = run(&cli);
    std::process::exit(code.as_i32());
}

fn run(cli: &Cli) -> ExitCode {
    let shutdown = ShutdownSignal::new();
    if let Err(e) = shutdown.install_ctrlc_handler() {
        warn!(error = %e, "cannot install Ctrl+C handler");
    }

    let mut converter = match Converter::open(cli.to_config()) {
        Ok(converter) => converter.with_shutdown(shutdown),
        Err(e) => return report_failure(&e),
    };

    let source = JsonlEventSource::new(&cli.source);
    match converter.run(&source) {
        Ok(stats) => {
            print!("{}", format_summary(&stats));
            ExitCode::from_stats(&stats)
        }
        Err(e) => report_failure(&e),
    }
}

fn report_failure(err: &ConverterError) -> ExitCode {
    error!(error = %err, "conversion failed");
    if let Some(stats) = err.stats() {
        print!("{}", format_summary(stats));
    }
    eprintln!("\nError: {}", err);
    if let Some(checkpoint) = err.checkpoint() {
        eprintln!("Progress saved at position {}; rerun with --resume to continue", checkpoint);
    }
    ExitCode::from(err)
}
