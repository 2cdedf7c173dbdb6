//! Console rendering of suite progress and results

use colored::Colorize;
use kiln_core::session::{BatchResult, ReportError, ReportFiles, SessionListener};
use kiln_core::{Specification, TestResult};
use std::time::Duration;

const RULE_WIDTH: usize = 60;

/// Prints one line per test as the suite runs
pub struct ConsoleProgress;

impl SessionListener for ConsoleProgress {
    fn suite_started(&self, total: usize) {
        println!("{}", "Kiln suite started".cyan().bold());
        println!("Running {} specification(s)", total);
        print_rule();
    }

    fn test_started(&self, index: usize, total: usize, specification: &Specification) {
        println!("Test {} of {}: {}", index, total, specification.name().bold());
    }

    fn test_finished(&self, _index: usize, _total: usize, result: &TestResult) {
        let duration = format_duration(result.duration());
        match result.cause() {
            None => println!("  {} ({})", "PASS".green().bold(), duration),
            Some(cause) => println!("  {} ({}): {}", "FAIL".red().bold(), duration, cause),
        }
        print_rule();
    }
}

/// Final summary; the report location is printed even for a failing suite
pub fn print_summary(batch: &BatchResult, report: &Result<ReportFiles, ReportError>) {
    if batch.pass() {
        println!("{}", "Suite ended successfully".green().bold());
    } else {
        println!("{}", "Suite ended but was not successful".red().bold());
        let failures: Vec<_> = batch.failures().collect();
        println!(
            "{} of {} test(s) failed:",
            failures.len(),
            batch.results().len()
        );
        for result in failures {
            println!(
                "  {} {}: {}",
                "✗".red(),
                result.name(),
                result.cause().unwrap_or_default()
            );
        }
    }

    println!("Total time: {}", format_duration(batch.duration()));

    match report {
        Ok(files) => println!("Results can be viewed at {}", files.dir.display()),
        Err(e) => eprintln!("{} {}", "Report was not written:".yellow(), e),
    }
}

fn print_rule() {
    println!("{}", "-".repeat(RULE_WIDTH));
}

/// Seconds with two decimals
pub fn format_duration(duration: Duration) -> String {
    format!("{:.2}s", duration.as_secs_f64())
}
