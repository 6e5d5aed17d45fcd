//! Cache Latency Bench - command-line entry point

use cache_latency_bench::{
    app::App,
    cli::Cli,
    error::{AppError, ErrorReporter},
    PKG_NAME, VERSION,
};
use clap::Parser;
use std::process;

#[tokio::main]
async fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panic: {}", panic_info);
        eprintln!("This is a bug in {} v{}; please report it with the command line used.", PKG_NAME, VERSION);
        process::exit(99);
    }));

    let cli = Cli::parse();

    if cli.should_show_topic_help() {
        println!("{}", cli.display_help());
        return;
    }

    if let Err(message) = cli.validate() {
        eprintln!("Error: {}", message);
        process::exit(1);
    }

    let reporter = ErrorReporter::new(cli.use_colors(), cli.verbose);

    if cli.debug {
        eprintln!("{} v{}", PKG_NAME, VERSION);
        if let Some(commit) = option_env!("GIT_COMMIT") {
            eprintln!("Commit: {}", commit);
        }
        if let Some(built) = option_env!("BUILD_TIME") {
            eprintln!("Built: {}", built);
        }
    }

    let result = match App::new(cli) {
        Ok(app) => app.run().await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        reporter.report_error(&e);
        print_error_suggestions(&e);
        process::exit(e.exit_code());
    }
}

/// Print helpful suggestions for common errors
fn print_error_suggestions(error: &AppError) {
    match error {
        AppError::Config(_) => {
            eprintln!();
            eprintln!("Configuration help:");
            eprintln!("  - Check your .env file format (see --help-topic env)");
            eprintln!("  - Backends are tcp, tcp-pool, http, redis or all");
            eprintln!("  - Modes are sequential, concurrent, bounded or bounded:<k>");
        }
        AppError::Connect(_) => {
            eprintln!();
            eprintln!("Connection troubleshooting:");
            eprintln!("  - Check that the cache is listening on the configured address");
            eprintln!("  - Start a local line cache with: clb --serve --tcp-addr 127.0.0.1:6060");
            eprintln!("  - Skip unavailable backends with --backend");
        }
        AppError::Timeout(_) => {
            eprintln!();
            eprintln!("Timeout troubleshooting:");
            eprintln!("  - Raise --timeout-ms or --barrier-timeout");
            eprintln!("  - Cap in-flight calls with --mode bounded:<k>");
        }
        AppError::Benchmark(_) => {
            eprintln!();
            eprintln!("Benchmark troubleshooting:");
            eprintln!("  - Every iteration of a cell failed; run with --verbose for failure details");
            eprintln!("  - Try --failure-policy retry-once for flaky connections");
        }
        _ => {}
    }
}
