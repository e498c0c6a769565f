//! Elaboration settings for the transaction system.
//!
//! Settings live in the `[elaboration]` table of a `tessel.toml` file (or any
//! TOML string) and are parsed into a strongly typed [`ElaborationConfig`].

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_from_str};
pub use types::*;
