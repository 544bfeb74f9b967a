//! Error types for midi-mlog

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for midi-mlog operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while compiling a MIDI file
#[derive(Debug, Error)]
pub enum Error {
    /// The MIDI file could not be opened
    #[error("File '{}' not found, or bad file: {source}", path.display())]
    ReadInput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The MIDI file could not be parsed
    #[error("MIDI parse error: {0}")]
    Midi(#[from] midly::Error),

    /// A configuration value is outside its domain
    #[error("Configuration error: {0}")]
    Config(String),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// The schematic could not be encoded
    #[error("Schematic error: {0}")]
    Schematic(String),

    /// Clipboard access failed
    #[error("Clipboard error: {0}")]
    Clipboard(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
