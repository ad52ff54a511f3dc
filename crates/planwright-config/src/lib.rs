//! Configuration for planwright
//!
//! Configuration comes from `.planwright/config.toml`, discovered upward from a
//! start directory, or from [`ConfigBuilder`] for embedding. Values set
//! programmatically override the file, which overrides built-in defaults.

mod config;

pub use config::*;
