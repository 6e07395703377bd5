//! Shared data model for sitekit
//!
//! This crate provides the types every other sitekit crate speaks:
//! - `Block`: one content unit owned by a page, post or product
//! - `BlockType`: the closed set of block tags
//! - `BlockContent`: per-type strongly typed content (tagged union)
//! - `BlockMap`: the id-keyed collection persisted on the parent row
//! - Id newtypes for parents, sites and users

pub mod block;
pub mod content;
pub mod ids;

pub use block::{Block, BlockMap, BlockType, PROTECTED_BLOCK_TYPES};
pub use content::{
    BlockContent, CallToActionContent, ContentError, FaqContent, FaqItem, FieldDeltas,
    FooterContent, GalleryContent, GalleryImage, HeroContent, NavLink, NavigationContent,
    PricingContent, PricingTier, ProductPricingContent, RichTextContent, Testimonial,
    TestimonialsContent,
};
pub use ids::{BlockId, IdError, ParentId, ParentKind, SiteId, UserId};
