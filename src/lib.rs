//! Tiger Tracker: periodic crypto price ingestion.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod quotes;
pub mod catalog;
pub mod engine;
pub mod storage;
pub mod analytics;
pub mod dashboard;
