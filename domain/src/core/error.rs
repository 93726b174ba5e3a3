//! Domain error types

use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("invalid conversation identity: {0}")]
    InvalidIdentity(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl DomainError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DomainError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancelled_display() {
        assert_eq!(DomainError::Cancelled.to_string(), "operation cancelled");
        assert!(DomainError::Cancelled.is_cancelled());
        assert!(!DomainError::InvalidIdentity("x".into()).is_cancelled());
    }
}
