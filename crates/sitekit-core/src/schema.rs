//! Block schema registry
//!
//! Static per-type metadata consumed by block editors: which fields a block
//! type exposes, how each field is edited, and the rules its value must
//! satisfy. The registry also instantiates new blocks from the type's
//! default content.
//!
//! Validation never fails fast. Every violation is collected so the editor
//! can show the complete list next to the offending fields.

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

use sitekit_api::{Block, BlockContent, BlockType, FieldDeltas};

/// How a field is edited and what kind of value it holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Textarea,
    Richtext,
    Url,
    Boolean,
    Number,
    Select,
    Color,
}

/// Constraints applied to a field's value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldRules {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<&'static str>,
    /// Accept an empty string for a required field.
    pub allow_empty: bool,
}

/// One editable field of a block type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    pub key: &'static str,
    pub label: &'static str,
    pub field_type: FieldType,
    pub required: bool,
    pub rules: FieldRules,
    #[serde(skip_serializing_if = "no_options")]
    pub options: &'static [&'static str],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help: Option<&'static str>,
}

fn no_options(options: &&'static [&'static str]) -> bool {
    options.is_empty()
}

impl FieldDefinition {
    pub fn new(key: &'static str, label: &'static str, field_type: FieldType) -> Self {
        Self {
            key,
            label,
            field_type,
            required: false,
            rules: FieldRules::default(),
            options: &[],
            help: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn allow_empty(mut self) -> Self {
        self.rules.allow_empty = true;
        self
    }

    pub fn min_length(mut self, len: usize) -> Self {
        self.rules.min_length = Some(len);
        self
    }

    pub fn max_length(mut self, len: usize) -> Self {
        self.rules.max_length = Some(len);
        self
    }

    pub fn pattern(mut self, pattern: &'static str) -> Self {
        self.rules.pattern = Some(pattern);
        self
    }

    pub fn options(mut self, options: &'static [&'static str]) -> Self {
        self.options = options;
        self
    }

    pub fn help(mut self, help: &'static str) -> Self {
        self.help = Some(help);
        self
    }
}

/// Editable fields and defaults for one block type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockDefinition {
    pub block_type: BlockType,
    pub label: &'static str,
    pub description: &'static str,
    pub fields: Vec<FieldDefinition>,
}

impl BlockDefinition {
    pub fn new(block_type: BlockType, label: &'static str, description: &'static str) -> Self {
        Self {
            block_type,
            label,
            description,
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, field: FieldDefinition) -> Self {
        self.fields.push(field);
        self
    }

    pub fn default_content(&self) -> BlockContent {
        BlockContent::default_for(self.block_type)
    }

    /// Why blocks of this type cannot be deleted or reordered, if they can't.
    pub fn protection(&self) -> Option<&'static str> {
        self.block_type.protection()
    }

    pub fn field_definition(&self, key: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.key == key)
    }
}

/// Outcome of validating block content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn from_errors(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}

/// Lookup table from block type to its definition.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    definitions: BTreeMap<BlockType, BlockDefinition>,
    /// Field patterns compiled at registration, keyed by source.
    patterns: HashMap<&'static str, Regex>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with a definition for every built-in block type.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for definition in builtin_definitions() {
            registry.register(definition);
        }
        registry
    }

    /// Add or replace the definition for its block type.
    ///
    /// Field patterns are compiled here; a pattern that does not compile is
    /// logged and never checked.
    pub fn register(&mut self, definition: BlockDefinition) -> Option<BlockDefinition> {
        for field in &definition.fields {
            let Some(pattern) = field.rules.pattern else {
                continue;
            };
            if self.patterns.contains_key(pattern) {
                continue;
            }
            match Regex::new(pattern) {
                Ok(re) => {
                    self.patterns.insert(pattern, re);
                }
                Err(e) => warn!(
                    "[SchemaRegistry] Ignoring bad pattern for '{}': {}",
                    field.key, e
                ),
            }
        }
        self.definitions.insert(definition.block_type, definition)
    }

    pub fn get_block_definition(&self, tag: &str) -> Option<&BlockDefinition> {
        BlockType::parse(tag).and_then(|t| self.definitions.get(&t))
    }

    pub fn definition(&self, block_type: BlockType) -> Option<&BlockDefinition> {
        self.definitions.get(&block_type)
    }

    pub fn definitions(&self) -> impl Iterator<Item = &BlockDefinition> {
        self.definitions.values()
    }

    /// Instantiate a new block of type `tag` with `overrides` merged onto the
    /// type's default content.
    ///
    /// Returns `None` for unknown types and for overrides that do not fit the
    /// type's content shape.
    pub fn create_instance(&self, tag: &str, overrides: &FieldDeltas) -> Option<Block> {
        let definition = self.get_block_definition(tag)?;
        match definition.default_content().merged(overrides) {
            Ok(content) => {
                debug!("[SchemaRegistry] Instantiated '{}' block", tag);
                Some(Block::new(content))
            }
            Err(e) => {
                warn!("[SchemaRegistry] Rejected overrides for '{}': {}", tag, e);
                None
            }
        }
    }

    /// Check `content` against the field rules of block type `tag`.
    pub fn validate(&self, tag: &str, content: &Map<String, Value>) -> ValidationReport {
        let Some(definition) = self.get_block_definition(tag) else {
            return ValidationReport::from_errors(vec![format!("Unknown block type: {}", tag)]);
        };

        let mut errors = Vec::new();
        for field in &definition.fields {
            validate_field(field, content.get(field.key), &self.patterns, &mut errors);
        }
        ValidationReport::from_errors(errors)
    }

    pub fn validate_content(&self, content: &BlockContent) -> ValidationReport {
        self.validate(content.block_type().as_str(), &content.to_map())
    }
}

fn validate_field(
    field: &FieldDefinition,
    value: Option<&Value>,
    patterns: &HashMap<&'static str, Regex>,
    errors: &mut Vec<String>,
) {
    let label = field.label;
    let value = match value {
        None | Some(Value::Null) => {
            if field.required {
                errors.push(format!("{} is required", label));
            }
            return;
        }
        Some(v) => v,
    };

    match field.field_type {
        FieldType::Boolean => {
            if !value.is_boolean() {
                errors.push(format!("{} must be true or false", label));
            }
        }
        FieldType::Number => {
            if !value.is_number() {
                errors.push(format!("{} must be a number", label));
            }
        }
        _ => {
            let Some(text) = value.as_str() else {
                errors.push(format!("{} must be text", label));
                return;
            };
            validate_text(field, text, patterns, errors);
        }
    }
}

fn validate_text(
    field: &FieldDefinition,
    text: &str,
    patterns: &HashMap<&'static str, Regex>,
    errors: &mut Vec<String>,
) {
    let label = field.label;
    let rules = &field.rules;

    if text.trim().is_empty() {
        if field.required && !rules.allow_empty {
            errors.push(format!("{} is required", label));
        }
        return;
    }

    let len = text.chars().count();
    if let Some(min) = rules.min_length {
        if len < min {
            errors.push(format!("{} must be at least {} characters", label, min));
        }
    }
    if let Some(max) = rules.max_length {
        if len > max {
            errors.push(format!("{} must be at most {} characters", label, max));
        }
    }

    match field.field_type {
        FieldType::Url if !is_valid_url(text) => {
            errors.push(format!("{} must be a valid URL", label));
        }
        FieldType::Color if !is_hex_color(text) => {
            errors.push(format!("{} must be a hex color", label));
        }
        FieldType::Select if !field.options.is_empty() && !field.options.contains(&text) => {
            errors.push(format!(
                "{} must be one of: {}",
                label,
                field.options.join(", ")
            ));
        }
        _ => {}
    }

    if let Some(re) = rules.pattern.and_then(|p| patterns.get(p)) {
        if !re.is_match(text) {
            errors.push(format!("{} has an invalid format", label));
        }
    }
}

/// Absolute http(s) URLs, site-relative paths, anchors and mailto links.
pub fn is_valid_url(text: &str) -> bool {
    let text = text.trim();
    if text.starts_with('/') || text.starts_with('#') {
        return !text.contains(char::is_whitespace);
    }
    match url::Url::parse(text) {
        Ok(parsed) => match parsed.scheme() {
            "http" | "https" => parsed.host_str().is_some(),
            "mailto" | "tel" => !parsed.path().is_empty(),
            _ => false,
        },
        Err(_) => false,
    }
}

fn is_hex_color(text: &str) -> bool {
    let Some(hex) = text.strip_prefix('#') else {
        return false;
    };
    matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit())
}

const ALIGNMENTS: &[&str] = &["left", "center", "right"];

fn builtin_definitions() -> Vec<BlockDefinition> {
    use FieldType::*;

    vec![
        BlockDefinition::new(BlockType::Hero, "Hero", "Large heading with a call to action")
            .field(
                FieldDefinition::new("title", "Hero Title", String)
                    .required()
                    .max_length(120),
            )
            .field(FieldDefinition::new("subtitle", "Hero Subtitle", Textarea).max_length(300))
            .field(FieldDefinition::new("buttonText", "Button Text", String).max_length(40))
            .field(FieldDefinition::new("buttonUrl", "Button URL", Url))
            .field(
                FieldDefinition::new("backgroundImage", "Background Image", Url)
                    .help("Absolute image URL"),
            )
            .field(FieldDefinition::new("alignment", "Alignment", Select).options(ALIGNMENTS)),
        BlockDefinition::new(BlockType::RichText, "Rich Text", "Free-form formatted text")
            .field(FieldDefinition::new("html", "Content", Richtext).required()),
        BlockDefinition::new(BlockType::Faq, "FAQ", "Questions and answers").field(
            FieldDefinition::new("title", "FAQ Title", String)
                .required()
                .max_length(120),
        ),
        BlockDefinition::new(BlockType::Pricing, "Pricing", "Plan comparison table")
            .field(
                FieldDefinition::new("title", "Pricing Title", String)
                    .required()
                    .max_length(120),
            )
            .field(
                FieldDefinition::new("subtitle", "Pricing Subtitle", Textarea).max_length(300),
            ),
        BlockDefinition::new(
            BlockType::ProductPricing,
            "Product Pricing",
            "Price and purchase button for a product",
        )
        .field(FieldDefinition::new("price", "Price", Number).required())
        .field(FieldDefinition::new("compareAtPrice", "Compare-at Price", Number))
        .field(
            FieldDefinition::new("currency", "Currency", String)
                .required()
                .pattern("^[A-Z]{3}$")
                .help("ISO 4217 code, e.g. USD"),
        )
        .field(FieldDefinition::new("showCompareAt", "Show Compare-at Price", Boolean))
        .field(FieldDefinition::new("buttonText", "Button Text", String).max_length(40))
        .field(FieldDefinition::new("buttonUrl", "Button URL", Url)),
        BlockDefinition::new(BlockType::Gallery, "Gallery", "Grid of images")
            .field(FieldDefinition::new("title", "Gallery Title", String).max_length(120))
            .field(FieldDefinition::new("columns", "Columns", Number)),
        BlockDefinition::new(BlockType::Testimonials, "Testimonials", "Customer quotes").field(
            FieldDefinition::new("title", "Section Title", String).max_length(120),
        ),
        BlockDefinition::new(
            BlockType::CallToAction,
            "Call to Action",
            "Banner prompting visitors to act",
        )
        .field(
            FieldDefinition::new("title", "CTA Title", String)
                .required()
                .max_length(120),
        )
        .field(FieldDefinition::new("description", "Description", Textarea).max_length(500))
        .field(
            FieldDefinition::new("buttonText", "Button Text", String)
                .required()
                .max_length(40),
        )
        .field(FieldDefinition::new("buttonUrl", "Button URL", Url).required())
        .field(FieldDefinition::new("backgroundColor", "Background Color", Color)),
        BlockDefinition::new(BlockType::Navigation, "Navigation", "Site header and menu")
            .field(
                FieldDefinition::new("logoText", "Logo Text", String)
                    .required()
                    .max_length(60),
            )
            .field(FieldDefinition::new("logoUrl", "Logo Link", Url))
            .field(FieldDefinition::new("sticky", "Sticky Header", Boolean)),
        BlockDefinition::new(BlockType::Footer, "Footer", "Site footer")
            .field(
                FieldDefinition::new("copyright", "Copyright Text", String)
                    .required()
                    .max_length(200),
            )
            .field(FieldDefinition::new("showSocial", "Show Social Links", Boolean)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(m) => m,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn every_block_type_is_registered() {
        let registry = SchemaRegistry::builtin();
        for block_type in BlockType::ALL {
            assert!(registry.definition(block_type).is_some(), "{}", block_type);
        }
    }

    #[test]
    fn default_content_of_every_type_is_valid() {
        let registry = SchemaRegistry::builtin();
        for definition in registry.definitions() {
            let report = registry.validate_content(&definition.default_content());
            assert!(report.valid, "{}: {:?}", definition.block_type, report.errors);
        }
    }

    #[test]
    fn unknown_type_has_no_definition() {
        let registry = SchemaRegistry::builtin();
        assert!(registry.get_block_definition("carousel").is_none());
        assert!(registry
            .create_instance("carousel", &FieldDeltas::new())
            .is_none());

        let report = registry.validate("carousel", &Map::new());
        assert!(!report.valid);
        assert_eq!(report.errors, vec!["Unknown block type: carousel"]);
    }

    #[test]
    fn empty_required_title_is_reported() {
        let registry = SchemaRegistry::builtin();
        let report = registry.validate(
            "hero",
            &map(json!({"title": "", "subtitle": "valid enough text"})),
        );
        assert_eq!(
            report,
            ValidationReport {
                valid: false,
                errors: vec!["Hero Title is required".to_string()],
            }
        );
    }

    #[test]
    fn all_violations_are_accumulated() {
        let registry = SchemaRegistry::builtin();
        let report = registry.validate(
            "call-to-action",
            &map(json!({
                "title": "x".repeat(121),
                "buttonUrl": "not a url",
                "backgroundColor": "blue",
            })),
        );
        assert_eq!(
            report.errors,
            vec![
                "CTA Title must be at most 120 characters",
                "Button Text is required",
                "Button URL must be a valid URL",
                "Background Color must be a hex color",
            ]
        );
    }

    #[test]
    fn primitive_fields_enforce_their_type() {
        let registry = SchemaRegistry::builtin();
        let report = registry.validate(
            "product-pricing",
            &map(json!({"price": "12", "currency": "usd", "showCompareAt": "yes"})),
        );
        assert_eq!(
            report.errors,
            vec![
                "Price must be a number",
                "Currency has an invalid format",
                "Show Compare-at Price must be true or false",
            ]
        );
    }

    #[test]
    fn select_fields_check_options() {
        let registry = SchemaRegistry::builtin();
        let report = registry.validate("hero", &map(json!({"title": "Hi", "alignment": "top"})));
        assert_eq!(
            report.errors,
            vec!["Alignment must be one of: left, center, right"]
        );
    }

    #[test]
    fn allow_empty_accepts_blank_required_field() {
        let mut registry = SchemaRegistry::new();
        registry.register(
            BlockDefinition::new(BlockType::RichText, "Rich Text", "").field(
                FieldDefinition::new("html", "Content", FieldType::Richtext)
                    .required()
                    .allow_empty(),
            ),
        );
        assert!(registry.validate("rich-text", &map(json!({"html": ""}))).valid);
        assert!(!registry.validate("rich-text", &Map::new()).valid);
    }

    #[test]
    fn min_length_is_enforced() {
        let mut registry = SchemaRegistry::new();
        registry.register(
            BlockDefinition::new(BlockType::Faq, "FAQ", "")
                .field(FieldDefinition::new("title", "FAQ Title", FieldType::String).min_length(3)),
        );
        let report = registry.validate("faq", &map(json!({"title": "ab"})));
        assert_eq!(report.errors, vec!["FAQ Title must be at least 3 characters"]);
    }

    #[test]
    fn patterns_are_compiled_once_at_registration() {
        let registry = SchemaRegistry::builtin();
        assert_eq!(registry.patterns.len(), 1);
        assert!(registry.patterns.contains_key("^[A-Z]{3}$"));

        let report = registry.validate(
            "product-pricing",
            &map(json!({"price": 10, "currency": "usd"})),
        );
        assert_eq!(report.errors, vec!["Currency has an invalid format"]);
    }

    #[test]
    fn bad_pattern_is_skipped() {
        let mut registry = SchemaRegistry::new();
        registry.register(
            BlockDefinition::new(BlockType::Faq, "FAQ", "")
                .field(FieldDefinition::new("title", "FAQ Title", FieldType::String).pattern("(")),
        );
        assert!(registry.patterns.is_empty());
        assert!(registry.validate("faq", &map(json!({"title": "anything"}))).valid);
    }

    #[test]
    fn create_instance_merges_overrides() {
        let registry = SchemaRegistry::builtin();
        let overrides = map(json!({"title": "Launch week"}));
        let block = registry.create_instance("hero", &overrides).unwrap();

        assert_eq!(block.block_type(), BlockType::Hero);
        let content = block.content.to_map();
        assert_eq!(content["title"], json!("Launch week"));
        assert_eq!(content["buttonText"], json!("Get started"));
    }

    #[test]
    fn create_instance_rejects_ill_typed_overrides() {
        let registry = SchemaRegistry::builtin();
        let overrides = map(json!({"price": "ten"}));
        assert!(registry.create_instance("product-pricing", &overrides).is_none());
    }

    #[test]
    fn url_forms() {
        assert!(is_valid_url("https://example.com/a?b=c"));
        assert!(is_valid_url("/about"));
        assert!(is_valid_url("#pricing"));
        assert!(is_valid_url("mailto:hi@example.com"));
        assert!(!is_valid_url("example.com"));
        assert!(!is_valid_url("javascript:alert(1)"));
        assert!(!is_valid_url("/has space"));
    }

    proptest! {
        #[test]
        fn validate_never_panics(tag in "[a-z-]{0,16}", title in ".{0,200}", n in any::<i64>()) {
            let registry = SchemaRegistry::builtin();
            let content = map(json!({"title": title, "price": n, "html": title}));
            let report = registry.validate(&tag, &content);
            prop_assert_eq!(report.valid, report.errors.is_empty());
        }
    }
}
