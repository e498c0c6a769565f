//! Errors raised while reading `tessel.toml`.

use std::path::PathBuf;

/// Why the elaboration settings could not be loaded.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// `tessel.toml` exists but could not be read, or does not exist.
    #[error("cannot read `{}`: {source}", path.display())]
    Read {
        /// The file that was opened.
        path: PathBuf,
        /// The underlying I/O failure.
        source: std::io::Error,
    },

    /// The file is not valid TOML, or a key has the wrong type or an
    /// unknown value (e.g. `scheduler = "lottery"`).
    #[error("malformed settings: {0}")]
    Malformed(String),

    /// `name_prefix` would produce illegal netlist identifiers.
    #[error("name_prefix `{prefix}` {reason}")]
    BadPrefix {
        /// The rejected prefix.
        prefix: String,
        /// What is wrong with it.
        reason: &'static str,
    },
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::Malformed(err.to_string())
    }
}
