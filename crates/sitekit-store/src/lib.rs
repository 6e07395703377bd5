//! Block persistence for sitekit
//!
//! `MemoryGateway` implements `BlockGateway` over an in-process store of
//! sites and parents. Each parent keeps its blocks as one JSON object keyed
//! by block id, the same shape the relational backend stores on the parent
//! row. The whole store can be written to and read from a snapshot file.

pub mod memory_gateway;
pub mod snapshot;

pub use memory_gateway::{MemoryGateway, ParentSummary};
pub use snapshot::{ParentRecord, SiteRecord, Snapshot};
