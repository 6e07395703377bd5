pub mod builder;
pub mod config;
pub mod diff;
pub mod error;
pub mod gateway;
pub mod preview;
pub mod schema;
pub mod status;
pub mod store;

pub use builder::{BlockBuilder, SaveReport};
pub use config::BuilderConfig;
pub use error::{BuilderError, BuilderResult, NOT_AVAILABLE_MESSAGE};
pub use gateway::{BlockGateway, GatewayError, GatewayResult, SessionContext};
pub use preview::{render_outline, render_preview, PreviewNode};
pub use schema::{
    BlockDefinition, FieldDefinition, FieldRules, FieldType, SchemaRegistry, ValidationReport,
};
pub use status::SaveStatus;
pub use store::{slugify, BlockStore, StoreError};
