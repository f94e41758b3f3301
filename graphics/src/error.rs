//! Graphics error types.

use std::fmt;

/// Errors that can occur in the graphics system.
///
/// These are the fatal failures: a shader, layout, or pipeline that hits one
/// of these cannot be created and the owning asset must be abandoned.
/// Recoverable per-call binding mistakes use
/// [`BindingError`](crate::materials::BindingError) instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphicsError {
    /// Failed to initialize the graphics system.
    InitializationFailed(String),
    /// Failed to create a native resource (buffer, layout, pipeline, ...).
    ResourceCreationFailed(String),
    /// Shader bytecode could not be parsed or reflected.
    ReflectionFailed(String),
    /// A resource was declared with conflicting metadata across shader stages.
    LayoutConflict(String),
    /// An invalid parameter was provided.
    InvalidParameter(String),
    /// Out of GPU memory.
    OutOfMemory,
    /// An internal error occurred.
    Internal(String),
}

impl fmt::Display for GraphicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InitializationFailed(msg) => write!(f, "initialization failed: {msg}"),
            Self::ResourceCreationFailed(msg) => write!(f, "resource creation failed: {msg}"),
            Self::ReflectionFailed(msg) => write!(f, "shader reflection failed: {msg}"),
            Self::LayoutConflict(msg) => write!(f, "descriptor layout conflict: {msg}"),
            Self::InvalidParameter(msg) => write!(f, "invalid parameter: {msg}"),
            Self::OutOfMemory => write!(f, "out of GPU memory"),
            Self::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for GraphicsError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GraphicsError::OutOfMemory;
        assert_eq!(err.to_string(), "out of GPU memory");

        let err = GraphicsError::ReflectionFailed("bad magic number".to_string());
        assert_eq!(err.to_string(), "shader reflection failed: bad magic number");

        let err = GraphicsError::LayoutConflict("'camera' redeclared".to_string());
        assert_eq!(
            err.to_string(),
            "descriptor layout conflict: 'camera' redeclared"
        );
    }
}
