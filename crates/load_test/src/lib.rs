// Rust guideline compliant 2026-10-18

//! Load-test library: the work-queue and protocol adapters, payload
//! handling, the session driver and fixture creation shared by the
//! `run_load_test` and `mk_load_test_files` binaries.

pub mod adapters;
pub mod credentials;
pub mod fixture;
pub mod http_codes;
pub mod payload;
pub mod session;
