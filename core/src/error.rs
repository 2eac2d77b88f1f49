//! Error kinds reported by the numerical core.
//!
//! Only the least-squares solve and the GNSS measurement update can fail. Both report
//! through [`NavigationError`] and leave the caller's state untouched, so the expected
//! reaction is to skip the correction for that epoch and keep mechanizing.
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum NavigationError {
    /// Singular or ill-conditioned information/innovation matrix, or a least-squares solve
    /// that did not converge within its iteration cap.
    #[error("solution diverged: {reason}")]
    Divergence { reason: String },
    /// Fewer usable satellites than the solve requires.
    #[error("insufficient observations: {available} satellites supplied, {required} required")]
    InsufficientObservations { required: usize, available: usize },
}

impl NavigationError {
    pub(crate) fn divergence(reason: impl Into<String>) -> Self {
        NavigationError::Divergence {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        let err = NavigationError::InsufficientObservations {
            required: 4,
            available: 3,
        };
        assert_eq!(
            err.to_string(),
            "insufficient observations: 3 satellites supplied, 4 required"
        );
        let err = NavigationError::divergence("singular innovation covariance");
        assert_eq!(
            err.to_string(),
            "solution diverged: singular innovation covariance"
        );
    }
}
