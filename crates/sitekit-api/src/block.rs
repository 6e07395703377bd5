use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use crate::content::{BlockContent, ContentError};
use crate::ids::BlockId;

/// Block types that are part of the site layout rather than page content.
pub const PROTECTED_BLOCK_TYPES: [BlockType; 2] = [BlockType::Navigation, BlockType::Footer];

// =============================================================================
// BlockType - closed set of block tags
// =============================================================================

/// Tag identifying what a block renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlockType {
    Hero,
    RichText,
    Faq,
    Pricing,
    ProductPricing,
    Gallery,
    Testimonials,
    CallToAction,
    Navigation,
    Footer,
}

impl BlockType {
    pub const ALL: [BlockType; 10] = [
        BlockType::Hero,
        BlockType::RichText,
        BlockType::Faq,
        BlockType::Pricing,
        BlockType::ProductPricing,
        BlockType::Gallery,
        BlockType::Testimonials,
        BlockType::CallToAction,
        BlockType::Navigation,
        BlockType::Footer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BlockType::Hero => "hero",
            BlockType::RichText => "rich-text",
            BlockType::Faq => "faq",
            BlockType::Pricing => "pricing",
            BlockType::ProductPricing => "product-pricing",
            BlockType::Gallery => "gallery",
            BlockType::Testimonials => "testimonials",
            BlockType::CallToAction => "call-to-action",
            BlockType::Navigation => "navigation",
            BlockType::Footer => "footer",
        }
    }

    /// Look up a type by its tag. Returns `None` for unknown tags.
    pub fn parse(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == tag)
    }

    /// Reason this type cannot be deleted or reordered, if it is protected.
    pub fn protection(&self) -> Option<&'static str> {
        match self {
            BlockType::Navigation => {
                Some("Navigation is part of the site layout and cannot be removed")
            }
            BlockType::Footer => Some("Footer is part of the site layout and cannot be removed"),
            _ => None,
        }
    }

    pub fn is_protected(&self) -> bool {
        self.protection().is_some()
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Block
// =============================================================================

/// A single content unit belonging to one page, post or product.
///
/// Persisted as `{ id, type, content, display_order, created_at?, updated_at? }`.
/// The `type` tag is derived from the content variant, so it cannot change
/// after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawBlock", into = "RawBlock")]
pub struct Block {
    pub id: BlockId,
    pub content: BlockContent,
    pub display_order: u32,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Block {
    /// Create a block with a freshly generated id.
    pub fn new(content: BlockContent) -> Self {
        Self::with_id(BlockId::generate(), content)
    }

    pub fn with_id(id: impl Into<BlockId>, content: BlockContent) -> Self {
        Self {
            id: id.into(),
            content,
            display_order: 0,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn block_type(&self) -> BlockType {
        self.content.block_type()
    }

    pub fn is_protected(&self) -> bool {
        self.block_type().is_protected()
    }

    /// Builder: set the display order
    pub fn at(mut self, display_order: u32) -> Self {
        self.display_order = display_order;
        self
    }
}

/// Wire form of a block, with the content as an open JSON object.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawBlock {
    id: BlockId,
    #[serde(rename = "type")]
    block_type: BlockType,
    #[serde(default)]
    content: Value,
    #[serde(default)]
    display_order: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated_at: Option<DateTime<Utc>>,
}

impl TryFrom<RawBlock> for Block {
    type Error = ContentError;

    fn try_from(raw: RawBlock) -> Result<Self, Self::Error> {
        Ok(Block {
            id: raw.id,
            content: BlockContent::from_value(raw.block_type, raw.content)?,
            display_order: raw.display_order,
            created_at: raw.created_at,
            updated_at: raw.updated_at,
        })
    }
}

impl From<Block> for RawBlock {
    fn from(block: Block) -> Self {
        RawBlock {
            block_type: block.block_type(),
            content: block.content.to_value(),
            id: block.id,
            display_order: block.display_order,
            created_at: block.created_at,
            updated_at: block.updated_at,
        }
    }
}

// =============================================================================
// BlockMap - the id-keyed collection stored on the parent row
// =============================================================================

/// Blocks of one parent keyed by id, as persisted in the parent's JSON column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockMap(BTreeMap<BlockId, Block>);

impl BlockMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a block under its own id, returning the block it replaced.
    pub fn insert(&mut self, block: Block) -> Option<Block> {
        self.0.insert(block.id.clone(), block)
    }

    pub fn get(&self, id: &str) -> Option<&Block> {
        self.0.get(id)
    }

    pub fn remove(&mut self, id: &str) -> Option<Block> {
        self.0.remove(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Block> {
        self.0.values()
    }

    /// Blocks sorted by `display_order`, ties broken by id.
    pub fn into_ordered(self) -> Vec<Block> {
        let mut blocks: Vec<Block> = self.0.into_values().collect();
        blocks.sort_by(|a, b| {
            a.display_order
                .cmp(&b.display_order)
                .then_with(|| a.id.cmp(&b.id))
        });
        blocks
    }
}

impl FromIterator<Block> for BlockMap {
    fn from_iter<I: IntoIterator<Item = Block>>(iter: I) -> Self {
        let mut map = BlockMap::new();
        for block in iter {
            map.insert(block);
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn block_type_tags_round_trip() {
        for block_type in BlockType::ALL {
            assert_eq!(BlockType::parse(block_type.as_str()), Some(block_type));
            let encoded = serde_json::to_value(block_type).unwrap();
            assert_eq!(encoded, json!(block_type.as_str()));
        }
        assert_eq!(BlockType::parse("carousel"), None);
    }

    #[test]
    fn only_navigation_and_footer_are_protected() {
        let protected: Vec<_> = BlockType::ALL
            .into_iter()
            .filter(BlockType::is_protected)
            .collect();
        assert_eq!(protected, PROTECTED_BLOCK_TYPES.to_vec());
    }

    #[test]
    fn block_serializes_to_persisted_shape() {
        let block = Block::with_id("b1", BlockContent::default_for(BlockType::RichText)).at(2);
        let value = serde_json::to_value(&block).unwrap();

        assert_eq!(value["id"], json!("b1"));
        assert_eq!(value["type"], json!("rich-text"));
        assert_eq!(value["display_order"], json!(2));
        assert!(value["content"].is_object());
        assert!(value.get("created_at").is_none());
    }

    #[test]
    fn block_deserializes_from_persisted_shape() {
        let block: Block = serde_json::from_value(json!({
            "id": "b7",
            "type": "hero",
            "content": {"title": "Hello"},
            "display_order": 4,
            "created_at": "2024-05-01T10:00:00Z"
        }))
        .unwrap();

        assert_eq!(block.block_type(), BlockType::Hero);
        assert_eq!(block.display_order, 4);
        assert!(block.created_at.is_some());
        assert_eq!(block.content.to_map()["title"], json!("Hello"));
    }

    #[test]
    fn unknown_type_fails_to_deserialize() {
        let result: Result<Block, _> = serde_json::from_value(json!({
            "id": "b1",
            "type": "carousel",
            "content": {}
        }));
        assert!(result.is_err());
    }

    #[test]
    fn block_map_orders_by_display_order() {
        let map: BlockMap = [
            Block::with_id("c", BlockContent::default_for(BlockType::Faq)).at(2),
            Block::with_id("a", BlockContent::default_for(BlockType::Hero)).at(0),
            Block::with_id("b", BlockContent::default_for(BlockType::RichText)).at(1),
        ]
        .into_iter()
        .collect();

        let ids: Vec<BlockId> = map.into_ordered().into_iter().map(|b| b.id).collect();
        let expected: Vec<BlockId> = vec!["a".into(), "b".into(), "c".into()];
        assert_eq!(ids, expected);
    }

    #[test]
    fn block_map_serializes_keyed_by_id() {
        let map: BlockMap = [Block::with_id("x", BlockContent::default_for(BlockType::Footer))]
            .into_iter()
            .collect();
        let value = serde_json::to_value(&map).unwrap();
        assert_eq!(value["x"]["type"], json!("footer"));
    }

    proptest! {
        #[test]
        fn into_ordered_sorts_any_orders(orders in prop::collection::vec(0u32..8, 0..16)) {
            let map: BlockMap = orders
                .iter()
                .enumerate()
                .map(|(i, order)| {
                    Block::with_id(format!("b{}", i), BlockContent::default_for(BlockType::Faq)).at(*order)
                })
                .collect();

            let ordered = map.clone().into_ordered();

            prop_assert_eq!(ordered.len(), orders.len());
            for pair in ordered.windows(2) {
                prop_assert!((pair[0].display_order, &pair[0].id) < (pair[1].display_order, &pair[1].id));
            }
            prop_assert_eq!(ordered.into_iter().collect::<BlockMap>(), map);
        }
    }
}
