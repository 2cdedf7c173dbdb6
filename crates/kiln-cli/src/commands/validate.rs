//! `kiln validate` command implementation
//!
//! Loads fixtures and specifications and checks every reference they make
//! into the kiln directory. No collaborator is contacted.

use colored::Colorize;
use kiln_core::config::Layout;
use kiln_core::{FixtureSet, Specification};
use std::path::Path;

use crate::error::Result;
use crate::Outcome;

pub fn run(path: Option<&Path>, kiln_dir: &Path) -> Result<Outcome> {
    let layout = Layout {
        kiln_dir: kiln_dir.to_path_buf(),
        ..Layout::default()
    };
    let fixtures = layout.load_fixtures()?;
    let specifications = layout.load_specifications(path)?;
    let files_dir = layout.files_dir();

    println!(
        "Checking {} specification(s) against {} fixture(s)",
        specifications.len(),
        fixtures.len()
    );

    let mut invalid = 0;
    for specification in &specifications {
        let problems = find_problems(specification, &fixtures, &files_dir);
        if problems.is_empty() {
            println!("  {} {}", "✓".green(), specification.name());
            continue;
        }

        invalid += 1;
        println!(
            "  {} {} ({})",
            "✗".red(),
            specification.name(),
            specification.path().display()
        );
        for problem in problems {
            println!("      {}", problem);
        }
    }

    if invalid == 0 {
        println!("{}", "All specifications are valid".green().bold());
    } else {
        println!(
            "{}",
            format!("{} specification(s) have problems", invalid).red().bold()
        );
    }

    Ok(Outcome::from_pass(invalid == 0))
}

/// Unknown fixtures, missing staged files and missing file params
pub fn find_problems(
    specification: &Specification,
    fixtures: &FixtureSet,
    files_dir: &Path,
) -> Vec<String> {
    let mut problems = Vec::new();

    for name in specification.stage().fixtures() {
        if let Err(e) = fixtures.get(name) {
            problems.push(e.to_string());
        }
    }

    for file in specification.stage().files() {
        let local = file.local_path(files_dir);
        if !local.is_file() {
            problems.push(format!("staged file not found: {}", local.display()));
        }
    }

    for (param, relative) in specification.act().params().files() {
        let local = files_dir.join(relative);
        if !local.is_file() {
            problems.push(format!(
                "file param '{}' not found: {}",
                param,
                local.display()
            ));
        }
    }

    problems
}
