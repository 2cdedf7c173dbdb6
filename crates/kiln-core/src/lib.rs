//! Kiln Core
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Integration-test orchestration for data pipelines. Every test runs the same
//! sequence against real collaborators:
//!
//! 1. clean the database, then seed it with named fixtures
//! 2. clean the file store, then upload staged files
//! 3. execute one job or transformation with compiled params
//! 4. assert on table contents and captured output
//!
//! # Modules
//!
//! - [`record`]: order-independent, type-normalized record comparison
//! - [`fixture`]: named rows to seed
//! - [`specification`]: the declarative test document
//! - [`judge`]: assertion evaluation
//! - [`runner`]: the per-test stage sequencer
//! - [`session`]: suite execution and the results directory
//! - [`externals`]: database, file store and executor collaborators
//! - [`config`]: YAML configuration with environment overrides
//!
//! # Example
//!
//! ```no_run
//! use kiln_core::config::{KilnConfig, Layout};
//!
//! fn load() -> kiln_core::Result<()> {
//!     let config = KilnConfig::load("config/kiln.yaml")?;
//!     let layout = Layout::default();
//!     let specs = layout.load_specifications(None)?;
//!     println!("{} spec(s), executor in {}", specs.len(), config.executor.dir.display());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod externals;
pub mod fixture;
pub mod judge;
pub mod record;
pub mod runner;
pub mod runtime;
pub mod session;
pub mod specification;

pub use error::{Error, FixtureNotFound, ParamError, Result, SpecError};
pub use fixture::{Fixture, FixtureSet};
pub use record::{Record, RecordSet};
pub use runner::{Runner, RunnerSettings, TestResult};
pub use runtime::RuntimeConfig;
pub use session::{BatchResult, Reporter, Session, SessionListener};
pub use specification::Specification;
