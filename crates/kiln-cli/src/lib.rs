//! Kiln CLI Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Command-line interface for running data pipeline integration tests.
//!
//! # Overview
//!
//! - **Suite Execution**: run specifications against the configured database,
//!   file store and executor (`kiln run`)
//! - **Validation**: check specifications, fixtures and staged files without
//!   touching any collaborator (`kiln validate`)

pub mod commands;
pub mod error;
pub mod output;

// Re-export commonly used types
pub use error::{CliError, Result};

use clap::{Parser, Subcommand};
use kiln_core::config::{DEFAULT_CONFIG_FILE, DEFAULT_KILN_DIR, DEFAULT_RESULTS_DIR};
use std::path::PathBuf;

/// Kiln - integration tests for data pipelines
#[derive(Parser, Debug)]
#[command(name = "kiln")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print the CLI reference as markdown and exit
    #[arg(long, hide = true)]
    pub markdown_help: bool,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a suite of specifications
    Run {
        /// Specification file or directory (defaults to <kiln-dir>/specs)
        path: Option<PathBuf>,

        /// Configuration file
        #[arg(short, long, env = "KILN_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,

        /// Directory holding specs/, fixtures/ and files/
        #[arg(short, long, env = "KILN_DIR", default_value = DEFAULT_KILN_DIR)]
        kiln_dir: PathBuf,

        /// Directory the report is written to
        #[arg(short, long, env = "KILN_RESULTS_DIR", default_value = DEFAULT_RESULTS_DIR)]
        results_dir: PathBuf,
    },

    /// Check specifications and fixtures without running anything
    Validate {
        /// Specification file or directory (defaults to <kiln-dir>/specs)
        path: Option<PathBuf>,

        /// Directory holding specs/, fixtures/ and files/
        #[arg(short, long, env = "KILN_DIR", default_value = DEFAULT_KILN_DIR)]
        kiln_dir: PathBuf,
    },
}

/// How a command finished, mapped to the process exit status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Passed,
    Failed,
}

impl Outcome {
    pub fn from_pass(pass: bool) -> Self {
        if pass {
            Outcome::Passed
        } else {
            Outcome::Failed
        }
    }

    pub fn exit_code(self) -> i32 {
        match self {
            Outcome::Passed => 0,
            Outcome::Failed => 1,
        }
    }
}

/// Exit status for errors that stop a command before it produces an outcome
pub const EXIT_ERROR: i32 = 2;
