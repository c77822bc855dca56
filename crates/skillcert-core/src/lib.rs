//! skillcert-core — Scoring engine, prerequisite gating, and attempt sessions.
//!
//! This crate defines the certification data model, exact-match scoring,
//! progress/unlock derivation from the result log, and the timed attempt
//! flow the skillcert front ends build on.

pub mod catalog;
pub mod config;
pub mod error;
pub mod model;
pub mod parser;
pub mod progress;
pub mod report;
pub mod results;
pub mod scoring;
pub mod session;
pub mod state;
pub mod statistics;
pub mod timer;
