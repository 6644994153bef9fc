//! Configuration module for Reshelf
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every key is optional; a missing file behaves like an empty one.
//!
//! # Example
//!
//! ```no_run
//! use reshelf::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("reshelf.toml")).unwrap();
//! println!("Refresh will use {} threads", config.fetch.threads);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, DatabaseConfig, FetchConfig, DEFAULT_USER_AGENT};

// Re-export parser functions
pub use parser::{
    compute_config_hash, default_config_path, load_config, load_config_with_hash,
    resolve_database_path,
};
pub use validation::validate_fetch_config;
