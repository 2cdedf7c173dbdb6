//! Kiln CLI - Main entry point

use clap::{CommandFactory, Parser};
use kiln_cli::{commands, Cli, Commands, Outcome, EXIT_ERROR};
use kiln_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use std::process;
use tracing::error;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.markdown_help {
        println!("{}", clap_markdown::help_markdown::<Cli>());
        return;
    }

    let Some(command) = &cli.command else {
        // Help goes to stdout; a missing subcommand is still a usage error
        let _ = Cli::command().print_help();
        process::exit(EXIT_ERROR);
    };

    // Diagnostics go to stderr so stdout stays the suite's own output
    let log_config = LogConfig::builder()
        .level(if cli.verbose {
            LogLevel::Debug
        } else {
            LogLevel::Warn
        })
        .output(LogOutput::Console)
        .log_file_prefix("kiln-cli")
        .filter_directives("sqlx=warn,aws_smithy_runtime=warn")
        .build();

    // Environment variables take precedence
    let log_config = log_config.clone().with_env().unwrap_or(log_config);

    // The CLI works without logging
    let _guard = init_logging(&log_config).ok();

    match execute_command(command).await {
        Ok(outcome) => process::exit(outcome.exit_code()),
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("Error: {}", e);
            process::exit(EXIT_ERROR);
        },
    }
}

async fn execute_command(command: &Commands) -> kiln_cli::Result<Outcome> {
    match command {
        Commands::Run {
            path,
            config,
            kiln_dir,
            results_dir,
        } => commands::run::run(path.as_deref(), config, kiln_dir, results_dir).await,

        Commands::Validate { path, kiln_dir } => {
            commands::validate::run(path.as_deref(), kiln_dir)
        },
    }
}
