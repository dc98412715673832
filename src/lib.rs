//! medstore - S3 buckets and Athena queries for healthcare data.
//!
//! This library exposes the core modules for use in integration tests.

pub mod athena;
pub mod aws;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod objects;
pub mod provision;
pub mod query;
pub mod routing;
pub mod storage;
