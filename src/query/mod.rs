//! Athena query execution for medstore.
//!
//! This module runs statements through a [`QueryService`](crate::athena::QueryService),
//! names and stores SELECT results, registers the patient table and
//! benchmarks repeated queries.

pub mod benchmark;
pub mod catalog;
pub mod naming;
pub mod runner;

pub use benchmark::{benchmark, BenchmarkReport};
pub use catalog::{describe_table, setup_catalog, validate_identifier};
pub use naming::{is_select, result_file_name};
pub use runner::{PollSettings, QueryOutcome, QueryRunner};
