//! Error types for geometry operations.

use std::fmt;

/// Errors that can occur when constructing geometric values.
#[derive(Debug, Clone, PartialEq)]
pub enum GeomError {
    /// A required value was missing or outside its domain.
    InvalidArgument {
        context: &'static str,
        detail: String,
    },
}

impl GeomError {
    pub(crate) fn invalid(context: &'static str, detail: impl Into<String>) -> Self {
        Self::InvalidArgument {
            context,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for GeomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument { context, detail } => {
                write!(f, "invalid argument to {context}: {detail}")
            }
        }
    }
}

impl std::error::Error for GeomError {}

/// Result type for geometry operations.
pub type GeomResult<T> = Result<T, GeomError>;
