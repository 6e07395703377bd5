//! Block content - one strongly typed struct per block type.
//!
//! Content travels as an open JSON object (the `content` key of a persisted
//! block). `BlockContent::from_value` reads that object into the variant for
//! the block's type; keys the variant does not know are ignored and missing
//! keys fall back to the type's defaults.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::block::BlockType;

/// Shallow field updates applied to a block's content.
pub type FieldDeltas = Map<String, Value>;

/// Error raised when JSON content does not fit a block type's shape.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ContentError {
    #[error("Content for '{block_type}' must be a JSON object")]
    NotAnObject { block_type: BlockType },

    #[error("Invalid content for '{block_type}': {message}")]
    Shape {
        block_type: BlockType,
        message: String,
    },
}

// =============================================================================
// Per-type content structs
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HeroContent {
    pub title: String,
    pub subtitle: String,
    pub button_text: String,
    pub button_url: String,
    pub background_image: String,
    pub alignment: String,
}

impl Default for HeroContent {
    fn default() -> Self {
        Self {
            title: "Welcome to our site".to_string(),
            subtitle: "Tell visitors what makes you different.".to_string(),
            button_text: "Get started".to_string(),
            button_url: "#".to_string(),
            background_image: String::new(),
            alignment: "center".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RichTextContent {
    pub html: String,
}

impl Default for RichTextContent {
    fn default() -> Self {
        Self {
            html: "<p>Start writing your content here.</p>".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FaqItem {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FaqContent {
    pub title: String,
    pub items: Vec<FaqItem>,
}

impl Default for FaqContent {
    fn default() -> Self {
        Self {
            title: "Frequently asked questions".to_string(),
            items: vec![FaqItem {
                question: "What do you offer?".to_string(),
                answer: "Describe your offer here.".to_string(),
            }],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PricingTier {
    pub name: String,
    pub price: String,
    pub period: String,
    pub features: Vec<String>,
    pub cta_text: String,
    pub cta_url: String,
    pub highlighted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PricingContent {
    pub title: String,
    pub subtitle: String,
    pub tiers: Vec<PricingTier>,
}

impl Default for PricingContent {
    fn default() -> Self {
        Self {
            title: "Pricing".to_string(),
            subtitle: String::new(),
            tiers: vec![PricingTier {
                name: "Starter".to_string(),
                price: "$0".to_string(),
                period: "month".to_string(),
                features: vec!["One site".to_string()],
                cta_text: "Choose plan".to_string(),
                cta_url: "#".to_string(),
                highlighted: false,
            }],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProductPricingContent {
    pub price: f64,
    pub compare_at_price: Option<f64>,
    pub currency: String,
    pub show_compare_at: bool,
    pub button_text: String,
    pub button_url: String,
}

impl Default for ProductPricingContent {
    fn default() -> Self {
        Self {
            price: 0.0,
            compare_at_price: None,
            currency: "USD".to_string(),
            show_compare_at: false,
            button_text: "Buy now".to_string(),
            button_url: "#".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GalleryImage {
    pub url: String,
    pub alt: String,
    pub caption: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GalleryContent {
    pub title: String,
    pub images: Vec<GalleryImage>,
    pub columns: f64,
}

impl Default for GalleryContent {
    fn default() -> Self {
        Self {
            title: "Gallery".to_string(),
            images: Vec::new(),
            columns: 3.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Testimonial {
    pub quote: String,
    pub author: String,
    pub role: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TestimonialsContent {
    pub title: String,
    pub items: Vec<Testimonial>,
}

impl Default for TestimonialsContent {
    fn default() -> Self {
        Self {
            title: "What our customers say".to_string(),
            items: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CallToActionContent {
    pub title: String,
    pub description: String,
    pub button_text: String,
    pub button_url: String,
    pub background_color: String,
}

impl Default for CallToActionContent {
    fn default() -> Self {
        Self {
            title: "Ready to get started?".to_string(),
            description: String::new(),
            button_text: "Contact us".to_string(),
            button_url: "#".to_string(),
            background_color: "#111827".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NavLink {
    pub label: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NavigationContent {
    pub logo_text: String,
    pub logo_url: String,
    pub links: Vec<NavLink>,
    pub sticky: bool,
}

impl Default for NavigationContent {
    fn default() -> Self {
        Self {
            logo_text: "My Site".to_string(),
            logo_url: "/".to_string(),
            links: vec![NavLink {
                label: "Home".to_string(),
                url: "/".to_string(),
            }],
            sticky: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FooterContent {
    pub copyright: String,
    pub links: Vec<NavLink>,
    pub show_social: bool,
}

impl Default for FooterContent {
    fn default() -> Self {
        Self {
            copyright: "© My Site. All rights reserved.".to_string(),
            links: Vec::new(),
            show_social: false,
        }
    }
}

// =============================================================================
// BlockContent - discriminated union over all block types
// =============================================================================

/// Content of a block. The variant fixes the block's type for its lifetime.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockContent {
    Hero(HeroContent),
    RichText(RichTextContent),
    Faq(FaqContent),
    Pricing(PricingContent),
    ProductPricing(ProductPricingContent),
    Gallery(GalleryContent),
    Testimonials(TestimonialsContent),
    CallToAction(CallToActionContent),
    Navigation(NavigationContent),
    Footer(FooterContent),
}

fn decode<T: DeserializeOwned>(block_type: BlockType, map: Map<String, Value>) -> Result<T, ContentError> {
    serde_json::from_value(Value::Object(map)).map_err(|e| ContentError::Shape {
        block_type,
        message: e.to_string(),
    })
}

fn encode<T: Serialize>(content: &T) -> Map<String, Value> {
    match serde_json::to_value(content) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

impl BlockContent {
    /// Default content for a freshly added block of `block_type`.
    pub fn default_for(block_type: BlockType) -> Self {
        match block_type {
            BlockType::Hero => BlockContent::Hero(HeroContent::default()),
            BlockType::RichText => BlockContent::RichText(RichTextContent::default()),
            BlockType::Faq => BlockContent::Faq(FaqContent::default()),
            BlockType::Pricing => BlockContent::Pricing(PricingContent::default()),
            BlockType::ProductPricing => {
                BlockContent::ProductPricing(ProductPricingContent::default())
            }
            BlockType::Gallery => BlockContent::Gallery(GalleryContent::default()),
            BlockType::Testimonials => BlockContent::Testimonials(TestimonialsContent::default()),
            BlockType::CallToAction => BlockContent::CallToAction(CallToActionContent::default()),
            BlockType::Navigation => BlockContent::Navigation(NavigationContent::default()),
            BlockType::Footer => BlockContent::Footer(FooterContent::default()),
        }
    }

    /// Read the open JSON content of a block into its typed variant.
    ///
    /// `null` yields the type's default content.
    pub fn from_value(block_type: BlockType, value: Value) -> Result<Self, ContentError> {
        let map = match value {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            _ => return Err(ContentError::NotAnObject { block_type }),
        };

        Ok(match block_type {
            BlockType::Hero => BlockContent::Hero(decode(block_type, map)?),
            BlockType::RichText => BlockContent::RichText(decode(block_type, map)?),
            BlockType::Faq => BlockContent::Faq(decode(block_type, map)?),
            BlockType::Pricing => BlockContent::Pricing(decode(block_type, map)?),
            BlockType::ProductPricing => BlockContent::ProductPricing(decode(block_type, map)?),
            BlockType::Gallery => BlockContent::Gallery(decode(block_type, map)?),
            BlockType::Testimonials => BlockContent::Testimonials(decode(block_type, map)?),
            BlockType::CallToAction => BlockContent::CallToAction(decode(block_type, map)?),
            BlockType::Navigation => BlockContent::Navigation(decode(block_type, map)?),
            BlockType::Footer => BlockContent::Footer(decode(block_type, map)?),
        })
    }

    pub fn block_type(&self) -> BlockType {
        match self {
            BlockContent::Hero(_) => BlockType::Hero,
            BlockContent::RichText(_) => BlockType::RichText,
            BlockContent::Faq(_) => BlockType::Faq,
            BlockContent::Pricing(_) => BlockType::Pricing,
            BlockContent::ProductPricing(_) => BlockType::ProductPricing,
            BlockContent::Gallery(_) => BlockType::Gallery,
            BlockContent::Testimonials(_) => BlockType::Testimonials,
            BlockContent::CallToAction(_) => BlockType::CallToAction,
            BlockContent::Navigation(_) => BlockType::Navigation,
            BlockContent::Footer(_) => BlockType::Footer,
        }
    }

    /// The content as an open JSON object.
    pub fn to_map(&self) -> Map<String, Value> {
        match self {
            BlockContent::Hero(c) => encode(c),
            BlockContent::RichText(c) => encode(c),
            BlockContent::Faq(c) => encode(c),
            BlockContent::Pricing(c) => encode(c),
            BlockContent::ProductPricing(c) => encode(c),
            BlockContent::Gallery(c) => encode(c),
            BlockContent::Testimonials(c) => encode(c),
            BlockContent::CallToAction(c) => encode(c),
            BlockContent::Navigation(c) => encode(c),
            BlockContent::Footer(c) => encode(c),
        }
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.to_map())
    }

    /// Shallow-merge `deltas` over this content, keeping the block type.
    ///
    /// Fails without side effects when a delta does not fit the field's type.
    pub fn merged(&self, deltas: &FieldDeltas) -> Result<Self, ContentError> {
        let mut map = self.to_map();
        for (key, value) in deltas {
            map.insert(key.clone(), value.clone());
        }
        Self::from_value(self.block_type(), Value::Object(map))
    }

    /// Short human readable text for previews and listings.
    pub fn summary(&self) -> String {
        let text = match self {
            BlockContent::Hero(c) => c.title.clone(),
            BlockContent::RichText(c) => strip_tags(&c.html),
            BlockContent::Faq(c) => format!("{} ({} questions)", c.title, c.items.len()),
            BlockContent::Pricing(c) => format!("{} ({} tiers)", c.title, c.tiers.len()),
            BlockContent::ProductPricing(c) => format!("{:.2} {}", c.price, c.currency),
            BlockContent::Gallery(c) => format!("{} ({} images)", c.title, c.images.len()),
            BlockContent::Testimonials(c) => format!("{} ({} quotes)", c.title, c.items.len()),
            BlockContent::CallToAction(c) => c.title.clone(),
            BlockContent::Navigation(c) => format!("{} ({} links)", c.logo_text, c.links.len()),
            BlockContent::Footer(c) => c.copyright.clone(),
        };
        text.trim().to_string()
    }
}

fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                out.push(' ');
            }
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn null_content_is_default() {
        let content = BlockContent::from_value(BlockType::RichText, Value::Null).unwrap();
        assert_eq!(content, BlockContent::default_for(BlockType::RichText));
    }

    #[test]
    fn missing_keys_take_defaults_and_unknown_keys_are_ignored() {
        let content =
            BlockContent::from_value(BlockType::Hero, json!({"title": "Hi", "bogus": 1})).unwrap();
        let BlockContent::Hero(hero) = content else {
            panic!("expected hero");
        };
        assert_eq!(hero.title, "Hi");
        assert_eq!(hero.alignment, "center");
    }

    #[test]
    fn non_object_content_is_rejected() {
        let err = BlockContent::from_value(BlockType::Faq, json!([1, 2])).unwrap_err();
        assert_eq!(
            err,
            ContentError::NotAnObject {
                block_type: BlockType::Faq
            }
        );
    }

    #[test]
    fn merge_is_shallow_and_keeps_type() {
        let base = BlockContent::default_for(BlockType::Hero);
        let mut deltas = FieldDeltas::new();
        deltas.insert("subtitle".to_string(), json!("New subtitle"));

        let merged = base.merged(&deltas).unwrap();
        assert_eq!(merged.block_type(), BlockType::Hero);
        assert_eq!(merged.to_map()["subtitle"], json!("New subtitle"));
        assert_eq!(merged.to_map()["title"], base.to_map()["title"]);
    }

    #[test]
    fn merge_with_wrong_field_type_fails() {
        let base = BlockContent::default_for(BlockType::ProductPricing);
        let mut deltas = FieldDeltas::new();
        deltas.insert("price".to_string(), json!("free"));

        assert!(matches!(
            base.merged(&deltas),
            Err(ContentError::Shape {
                block_type: BlockType::ProductPricing,
                ..
            })
        ));
    }

    #[test]
    fn rich_text_summary_strips_markup() {
        let content = BlockContent::RichText(RichTextContent {
            html: "<h2>Title</h2><p>Body  text</p>".to_string(),
        });
        assert_eq!(content.summary(), "Title Body text");
    }
}
