//! Build automation tasks for kiln
//!
//! - Generating the CLI reference from the clap definitions

use clap::Parser;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Build automation tasks for kiln", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// Generate the CLI reference in markdown
    GenerateCliDocs {
        /// Output directory for generated documentation
        #[arg(short, long, default_value = "docs")]
        output_dir: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::GenerateCliDocs { output_dir } => generate_cli_docs(&output_dir)?,
    }

    Ok(())
}

fn generate_cli_docs(output_dir: &str) -> anyhow::Result<()> {
    println!("Generating CLI documentation...");

    let markdown = clap_markdown::help_markdown::<kiln_cli::Cli>();

    let content = format!(
        r#"# Kiln CLI Reference

This documentation is generated from the CLI source code. Last updated: {}.

## Overview

Kiln runs integration tests for data pipelines. Each specification seeds a
PostgreSQL database and an S3 bucket, runs one job or transformation, and
checks the resulting tables and output.

## Quick Start

```bash
# Check specifications, fixtures and staged files
kiln validate

# Run every specification under kiln/specs
kiln run --config config/kiln.yaml

# Run a single specification
kiln run kiln/specs/declassify_users.yaml
```

## Layout

```text
config/kiln.yaml      database, file_store and executor sections plus runtime values
kiln/specs/           one YAML document per test
kiln/fixtures/        named rows, merged across files
kiln/files/           files to upload and file params
results/              data.yaml, executor_out.txt, executor_err.txt
```

## Commands

{}

## Exit Status

- `0`: every test passed
- `1`: at least one test failed, or `kiln validate` found problems
- `2`: configuration, specification or fixture could not be loaded

## Environment Variables

- `DATABASE_URL` - PostgreSQL connection string
- `S3_BUCKET`, `S3_REGION`, `S3_ENDPOINT`, `S3_ACCESS_KEY`, `S3_SECRET_KEY` - file store
- `KILN_EXECUTOR_DIR` - directory holding `kitchen.sh` and `pan.sh`
- `LOG_LEVEL`, `LOG_FORMAT`, `LOG_OUTPUT` - diagnostics on stderr

---

*To update, run `cargo xtask generate-cli-docs`.*
"#,
        chrono::Utc::now().format("%Y-%m-%d"),
        markdown
    );

    let output_path = PathBuf::from(output_dir);
    fs::create_dir_all(&output_path)?;

    let file_path = output_path.join("cli-reference.md");
    fs::write(&file_path, content)?;

    println!("✅ Generated CLI documentation at: {}", file_path.display());

    Ok(())
}
