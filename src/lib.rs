//! xg2g configuration library
//!
//! Loads, validates and hot-reloads the runtime configuration of the xg2g
//! service. The `cli` and `logging` modules back the `xg2g-config` binary.

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
