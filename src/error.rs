//! Error types surfaced by the calculation engine

use thiserror::Error;

/// Errors a caller has to handle.
///
/// Unknown formulas, truncated trees and missing prices are not errors;
/// they are reported inside the result types.
#[derive(Debug, Error)]
pub enum IndustryError {
    /// Rejected request parameter. Never clamped silently.
    #[error("invalid {field} = {value}: {reason}")]
    InvalidInput {
        field: &'static str,
        value: String,
        reason: &'static str,
    },

    /// Failure inside a data provider (database, import files).
    #[error(transparent)]
    Data(#[from] anyhow::Error),
}

impl IndustryError {
    pub fn invalid(field: &'static str, value: impl ToString, reason: &'static str) -> Self {
        IndustryError::InvalidInput {
            field,
            value: value.to_string(),
            reason,
        }
    }
}

pub type Result<T, E = IndustryError> = std::result::Result<T, E>;
