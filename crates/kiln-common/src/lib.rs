//! Kiln Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared utilities for the kiln workspace members:
//!
//! - **Error Handling**: `CommonError` and the crate `Result` alias
//! - **Logging**: tracing subscriber setup shared by every binary
//! - **YAML**: reading single files and merging whole directory trees
//!
//! # Example
//!
//! ```no_run
//! use kiln_common::yaml::YamlReader;
//!
//! fn load() -> kiln_common::Result<()> {
//!     let fixtures = YamlReader::smash("kiln/fixtures")?;
//!     println!("{} fixture(s)", fixtures.len());
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;
pub mod yaml;

pub use error::{CommonError, Result};
