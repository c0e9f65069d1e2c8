// Rust guideline compliant 2026-10-18

//! Adapters for the load-test binaries.
//!
//! `work_queue` implements both trace-queue ports. The other modules each
//! implement the `Operation` port for one protocol.

pub mod filesystem;
pub mod rest;
pub mod s3;
pub mod time_budget;
pub mod work_queue;
