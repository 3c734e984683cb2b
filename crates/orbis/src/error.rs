//! Error types for the orbis crate.

use std::fmt;

/// Result type for orbis operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in orbis operations.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// A required value was absent or outside its domain.
    InvalidArgument {
        /// The operation that rejected the argument.
        context: &'static str,
        /// Description of what was invalid.
        detail: String,
    },
    /// An index-based accessor was given an index past the end.
    OutOfRange {
        /// The operation that was called.
        context: &'static str,
        /// The offending index.
        index: usize,
        /// Number of valid entries.
        count: usize,
    },
    /// A shader stage failed to parse or validate.
    ProgramCompile {
        /// Key of the program being built.
        key: &'static str,
        /// Shader stage that failed.
        stage: &'static str,
        /// Compiler diagnostics.
        message: String,
    },
    /// Compiled shader stages could not be linked into a program.
    ProgramLink {
        /// Key of the program being built.
        key: &'static str,
        /// Description of the mismatch.
        message: String,
    },
    /// A program failed to build in an earlier frame and is not retried.
    ProgramUnavailable {
        /// Key of the program.
        key: &'static str,
    },
    /// Geometry construction failed.
    Geom(orbis_geom::GeomError),
}

impl Error {
    pub(crate) fn invalid(context: &'static str, detail: impl Into<String>) -> Self {
        Error::InvalidArgument {
            context,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidArgument { context, detail } => {
                write!(f, "invalid argument to {context}: {detail}")
            }
            Error::OutOfRange {
                context,
                index,
                count,
            } => {
                write!(f, "{context}: index {index} out of range for count {count}")
            }
            Error::ProgramCompile {
                key,
                stage,
                message,
            } => {
                write!(f, "failed to compile {stage} stage of {key}: {message}")
            }
            Error::ProgramLink { key, message } => {
                write!(f, "failed to link {key}: {message}")
            }
            Error::ProgramUnavailable { key } => {
                write!(f, "program {key} is unavailable after an earlier failure")
            }
            Error::Geom(e) => write!(f, "geometry error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Geom(e) => Some(e),
            _ => None,
        }
    }
}

impl From<orbis_geom::GeomError> for Error {
    fn from(e: orbis_geom::GeomError) -> Self {
        Error::Geom(e)
    }
}
