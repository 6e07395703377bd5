use sitekit_api::{BlockId, BlockType, ContentError};

use crate::gateway::GatewayError;
use crate::store::StoreError;

/// Shown for both missing and foreign parents so existence is not leaked.
pub const NOT_AVAILABLE_MESSAGE: &str = "This item is not available. Select a valid site to continue.";

/// Failure of a builder operation. Returned, never panicked.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BuilderError {
    #[error("Unknown block type: {0}")]
    UnknownBlockType(String),

    #[error("Block not found: {0}")]
    BlockNotFound(BlockId),

    /// Delete or reorder of a structural block.
    #[error("{reason}")]
    ProtectedBlock {
        block_type: BlockType,
        reason: &'static str,
    },

    #[error("A {0} block already exists")]
    DuplicateStructuralBlock(BlockType),

    #[error("{}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("Invalid order: {0}")]
    InvalidOrder(String),

    #[error("Block limit of {0} reached")]
    TooManyBlocks(usize),

    #[error("A save is already in progress")]
    SaveInProgress,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0}")]
    NotFound(String),

    #[error("Access denied")]
    AccessDenied,

    #[error("{0}")]
    Persistence(String),
}

impl BuilderError {
    /// Text for the editing UI. Not-found and access-denied read the same.
    pub fn user_message(&self) -> String {
        match self {
            BuilderError::NotFound(_) | BuilderError::AccessDenied => {
                NOT_AVAILABLE_MESSAGE.to_string()
            }
            other => other.to_string(),
        }
    }

    /// Errors that block the whole editing view rather than a single action.
    pub fn is_fatal(&self) -> bool {
        matches!(self, BuilderError::NotFound(_) | BuilderError::AccessDenied)
    }
}

impl From<GatewayError> for BuilderError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::MalformedId(e) => BuilderError::NotFound(e.to_string()),
            GatewayError::NotFound { kind } => BuilderError::NotFound(format!("{} not found", kind)),
            GatewayError::AccessDenied => BuilderError::AccessDenied,
            GatewayError::ValidationFailed(errors) => BuilderError::Validation(errors),
            e @ GatewayError::Persistence { .. } => BuilderError::Persistence(e.to_string()),
        }
    }
}

impl From<ContentError> for BuilderError {
    fn from(err: ContentError) -> Self {
        BuilderError::Validation(vec![err.to_string()])
    }
}

pub type BuilderResult<T> = std::result::Result<T, BuilderError>;
