use thiserror::Error;

/// Broad class of a reduction failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed parameters, empty series, mismatched lengths.
    InputValidation,
    /// Missing reference material, too few reference spots, unknown element or mode.
    Precondition,
    /// Selectable but not implemented.
    UnsupportedOperation,
}

/// Errors raised by the reduction pipeline.
///
/// None of these are transient: the caller fixes the input (flags, selections,
/// reference tables) and re-runs the affected stage.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum SimsError {
    #[error("invalid input: {0}")]
    InputValidation(String),

    #[error("ensemble size mismatch: {left} draws combined with {right} draws")]
    EnsembleSizeMismatch { left: usize, right: usize },

    #[error("precondition not met: {0}")]
    Precondition(String),

    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),
}

impl SimsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SimsError::InputValidation(_) | SimsError::EnsembleSizeMismatch { .. } => ErrorKind::InputValidation,
            SimsError::Precondition(_) => ErrorKind::Precondition,
            SimsError::UnsupportedOperation(_) => ErrorKind::UnsupportedOperation,
        }
    }

    pub(crate) fn input(msg: impl Into<String>) -> Self {
        SimsError::InputValidation(msg.into())
    }

    pub(crate) fn precondition(msg: impl Into<String>) -> Self {
        SimsError::Precondition(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, SimsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(SimsError::input("no data").kind(), ErrorKind::InputValidation);
        assert_eq!(SimsError::EnsembleSizeMismatch { left: 3, right: 4 }.kind(), ErrorKind::InputValidation);
        assert_eq!(SimsError::precondition("no primary").kind(), ErrorKind::Precondition);
        assert_eq!(SimsError::UnsupportedOperation("quadratic".into()).kind(), ErrorKind::UnsupportedOperation);
    }

    #[test]
    fn test_error_display() {
        let err = SimsError::EnsembleSizeMismatch { left: 3, right: 4 };
        assert_eq!(err.to_string(), "ensemble size mismatch: 3 draws combined with 4 draws");
    }
}
