//! Persistence gateway contract
//!
//! Server-side functions that read and write a parent's block collection.
//! The collection is stored as one JSON object keyed by block id on the
//! parent's row. Every call receives the acting session explicitly and
//! implementations must re-verify that the session's user owns the site
//! that owns the parent, failing closed.

use async_trait::async_trait;

use sitekit_api::{Block, BlockMap, BlockType, FieldDeltas, IdError, SiteId, UserId};

/// Who is acting and which site they currently have selected.
///
/// Passed explicitly to every gateway call instead of living in ambient
/// global state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionContext {
    pub user_id: UserId,
    pub site_id: SiteId,
}

impl SessionContext {
    pub fn new(user_id: UserId, site_id: SiteId) -> Self {
        Self { user_id, site_id }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GatewayError {
    /// Rejected before touching the store.
    #[error(transparent)]
    MalformedId(#[from] IdError),

    #[error("{kind} not found")]
    NotFound { kind: &'static str },

    #[error("Access denied")]
    AccessDenied,

    #[error("Validation failed: {}", .0.join("; "))]
    ValidationFailed(Vec<String>),

    /// Infrastructure failure, tagged with the operation for logging.
    #[error("{operation} failed: {message}")]
    Persistence {
        operation: &'static str,
        message: String,
    },
}

impl GatewayError {
    pub fn persistence(operation: &'static str, message: impl Into<String>) -> Self {
        GatewayError::Persistence {
            operation,
            message: message.into(),
        }
    }
}

pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Read/write access to the block collection of pages, posts and products.
#[async_trait]
pub trait BlockGateway: Send + Sync {
    /// Load all blocks of a parent.
    async fn load_blocks(&self, session: &SessionContext, parent_id: &str)
        -> GatewayResult<BlockMap>;

    /// Atomically overwrite a parent's blocks with `blocks`.
    ///
    /// The caller passes the final desired collection (survivors only);
    /// anything not in `blocks` is removed.
    async fn replace_blocks(
        &self,
        session: &SessionContext,
        parent_id: &str,
        blocks: BlockMap,
    ) -> GatewayResult<()>;

    /// Append a single block and return it as stored.
    async fn add_block(
        &self,
        session: &SessionContext,
        parent_id: &str,
        block_type: BlockType,
        content: FieldDeltas,
    ) -> GatewayResult<Block>;

    /// Remove a single block immediately.
    async fn delete_block(
        &self,
        session: &SessionContext,
        parent_id: &str,
        block_id: &str,
    ) -> GatewayResult<()>;
}
