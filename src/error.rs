//! Error types shared by the codec, registry, engines and proxies.

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SpecError>;

/// Failures raised while reading, writing or replaying a specification.
///
/// None of these are retried or swallowed internally; they propagate to the
/// caller that triggered them.
#[derive(Debug, thiserror::Error)]
pub enum SpecError {
    /// Text does not match the grammar for the requested type.
    #[error("Format error: {0}")]
    Format(String),

    /// An `<id:NAME>` reference could not be resolved.
    #[error("Resolution error: object id {id:?} {reason}")]
    Resolution {
        /// The id that failed to resolve.
        id: String,
        /// Why the lookup failed.
        reason: String,
    },

    /// A previous record run could not identify an object.
    #[error("Unknown object in specification: {0}")]
    UnknownObject(String),

    /// The invoked method does not match the next recorded entry.
    #[error("Sequence mismatch at entry {position}: expected {expected}, got {actual}")]
    SequenceMismatch {
        /// Cursor position of the entry that was expected.
        position: usize,
        /// Method name recorded at that position.
        expected: String,
        /// Method name that was actually invoked.
        actual: String,
    },

    /// The next entry has no usable return value.
    #[error("Missing value: no recorded return value for {method}({arguments})")]
    MissingValue {
        /// Invoked method name.
        method: String,
        /// Formatted argument list of the invocation.
        arguments: String,
    },

    /// A named test input is absent from the preamble.
    #[error("Missing test input: {0}")]
    MissingInput(String),

    /// The recorded call failed and the failure is being replayed.
    #[error("{method} failed during recording: {note}")]
    RecordedFailure {
        /// Method whose recorded call failed.
        method: String,
        /// The exception note written at record time.
        note: String,
    },

    /// An object could not be registered under the requested id.
    #[error("Registration error: {0}")]
    Registration(String),

    /// A proxy was driven in a way its capability descriptor does not allow.
    #[error("Capability error: {0}")]
    Capability(String),

    /// The produced specification differs from the stored one.
    #[error("Specification diverged from the approved text:\n{diff}")]
    Diverged {
        /// Line-level diff between stored and produced text.
        diff: String,
    },

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SpecError {
    pub(crate) fn format(message: impl Into<String>) -> Self {
        Self::Format(message.into())
    }

    pub(crate) fn resolution(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Resolution { id: id.into(), reason: reason.into() }
    }
}
