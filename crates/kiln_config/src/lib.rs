//! Job descriptions, board lookup data, and option resolution.
//!
//! This crate reads a job file into a strongly-typed [`Job`], loads the
//! read-only [`BoardDb`], and merges option scopes into [`ResolvedOptions`]
//! with a fixed precedence: defaults, then the board database, then the job,
//! then explicit per-stage overrides.

#![warn(missing_docs)]

pub mod board_db;
pub mod error;
pub mod loader;
pub mod resolve;
pub mod types;

pub use board_db::BoardDb;
pub use error::ConfigError;
pub use loader::{load_job, load_job_from_str};
pub use resolve::{resolve, ResolvedOptions, Scope, ScopedValue};
pub use types::*;
