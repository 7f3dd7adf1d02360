//! Error types for the hwprobe core library.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by fallible setup and parsing operations.
///
/// Acquisition itself never returns these: read failures are recorded as
/// field states instead.
#[derive(Error, Debug)]
pub enum Error {
    /// The privileged shell process could not be started.
    #[error("Failed to spawn shell '{program}': {source}")]
    ShellSpawn {
        program: String,
        source: std::io::Error,
    },

    /// Writing a command to the shell failed.
    #[error("Shell I/O error: {0}")]
    ShellIo(#[from] std::io::Error),

    /// The shell session exited or lost its pipes.
    #[error("Shell session closed")]
    ShellClosed,

    /// Unknown subsystem name.
    #[error("Invalid subsystem: {0}")]
    InvalidSubsystem(String),

    /// Unknown memory unit name.
    #[error("Invalid memory unit: {0}")]
    InvalidMemoryUnit(String),
}
