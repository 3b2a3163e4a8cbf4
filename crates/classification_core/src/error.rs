//! crates/classification_core/src/error.rs
//!
//! The error taxonomy returned by every core operation.

use crate::ports::PortError;
use uuid::Uuid;

/// Every failure a core operation can report to its caller.
///
/// Variants fall into four groups: validation (bad input), integrity
/// (business-rule refusals carrying the blocking count or ids), not-found, and
/// infrastructure (the store failed). Partial reorder application is not an
/// error; it is reported through [`crate::domain::ReorderOutcome`].
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Invalid {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    #[error("Category would sit at depth {depth}, the maximum is {max}")]
    DepthExceeded { depth: usize, max: usize },

    #[error("A category cannot be its own parent")]
    SelfParent,

    #[error("Cannot move a category under one of its own descendants")]
    Cycle,

    #[error("Category still has {0} child categories")]
    HasChildren(u64),

    #[error("Category is still used by {0} segments")]
    InUse(u64),

    #[error("Segments do not belong to the material: {0:?}")]
    InvalidReference(Vec<Uuid>),

    #[error("The ordered id list is empty")]
    EmptyList,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Not allowed")]
    Forbidden,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Store failure: {0}")]
    Infrastructure(String),

    #[error("Workbook rendering failed: {0}")]
    Export(String),
}

/// A convenience type alias for `Result<T, CoreError>`.
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        CoreError::Validation {
            field,
            message: message.into(),
        }
    }

    /// A stable, machine-readable name for the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::Validation { .. } => "validation_error",
            CoreError::DepthExceeded { .. } => "depth_exceeded",
            CoreError::SelfParent => "self_parent",
            CoreError::Cycle => "cycle",
            CoreError::HasChildren(_) => "has_children",
            CoreError::InUse(_) => "in_use",
            CoreError::InvalidReference(_) => "invalid_reference",
            CoreError::EmptyList => "empty_list",
            CoreError::NotFound(_) => "not_found",
            CoreError::Forbidden => "forbidden",
            CoreError::Unauthorized => "unauthorized",
            CoreError::Infrastructure(_) => "infrastructure",
            CoreError::Export(_) => "export_failed",
        }
    }

    /// True for the business-rule refusals of the category and ordering rules.
    pub fn is_integrity(&self) -> bool {
        matches!(
            self,
            CoreError::DepthExceeded { .. }
                | CoreError::SelfParent
                | CoreError::Cycle
                | CoreError::HasChildren(_)
                | CoreError::InUse(_)
                | CoreError::InvalidReference(_)
                | CoreError::EmptyList
        )
    }
}

impl From<PortError> for CoreError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound(what) => CoreError::NotFound(what),
            PortError::Conflict(message) => CoreError::validation("unique", message),
            PortError::StillReferenced(_) => CoreError::InUse(0),
            PortError::Unauthorized => CoreError::Unauthorized,
            PortError::Unexpected(message) => CoreError::Infrastructure(message),
        }
    }
}
