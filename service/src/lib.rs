//! Host-side plumbing for the `easy_access_rs` command line: configuration parsing and
//! console logging.

pub mod config;
pub mod logging;
