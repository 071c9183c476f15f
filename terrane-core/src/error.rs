use std::error::Error;
use std::fmt;

/// Errors raised by terrane operations.
///
/// Per-candidate numeric failures (singular systems, empty neighborhoods) are never surfaced
/// through this type; operations absorb them by skipping the affected candidate or writing the
/// no-data value. `ToolError` covers the failures a caller has to act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    /// Structurally invalid input, e.g. a zero-sized image or an out-of-range classification code
    InvalidInput(String),
    /// An internal capacity was exhausted. The algorithms in this workspace defer work instead
    /// of failing, so this variant is reserved for hosts whose sources can outgrow memory.
    ResourceExhaustion(String),
    /// The caller requested cancellation through its `ProgressSink`
    Cancelled,
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolError::InvalidInput(msg) => write!(f, "invalid input: {}", msg),
            ToolError::ResourceExhaustion(msg) => write!(f, "resource exhaustion: {}", msg),
            ToolError::Cancelled => write!(f, "operation cancelled"),
        }
    }
}

impl Error for ToolError {}

/// Result type for operations in terrane-core
pub type Result<T> = std::result::Result<T, ToolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(
            ToolError::InvalidInput("width must be > 0".into()).to_string(),
            "invalid input: width must be > 0"
        );
        assert_eq!(ToolError::Cancelled.to_string(), "operation cancelled");
    }
}
