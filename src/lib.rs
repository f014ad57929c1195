//! # Tech Digest
//!
//! Collects the day's trending repositories, top Hacker News stories and tech
//! feed articles, normalizes them into one record shape, and writes a JSON
//! snapshot plus a dated archive.
//!
//! ## Architecture
//!
//! 1. **Fetching**: each source adapter pulls through its own paced transport
//! 2. **Normalizing**: adapters emit [`models::NormalizedRecord`]s
//! 3. **Merging**: the [`aggregator::Aggregator`] builds a [`models::RunResult`]
//! 4. **Output**: a [`outputs::json::SnapshotSink`] persists the run

pub mod aggregator;
pub mod cli;
pub mod config;
pub mod http;
pub mod models;
pub mod outputs;
pub mod pacer;
pub mod scrapers;
pub mod utils;
