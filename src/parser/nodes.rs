//! Typed view over loosely-typed blocks.
//!
//! Every attribute read here is total: a missing or mistyped value falls back to the
//! documented default instead of failing.

use serde_json::{Map, Value};

use super::blocks::Block;
use crate::model::{HeadingTag, IconStyle, Tier, DEFAULT_GROUP_ICON};

pub const GROUP_BLOCK: &str = "popup-maker/integration-features-group";
pub const FEATURE_BLOCK: &str = "popup-maker/integration-feature";

#[derive(Debug)]
pub enum Node<'a> {
    /// Markup between blocks (no type identifier).
    Freeform,
    Group(GroupNode<'a>),
    Feature(FeatureNode<'a>),
    Other(&'a Block),
}

#[derive(Debug)]
pub struct GroupNode<'a> {
    pub attrs: GroupAttrs,
    pub children: &'a [Block],
}

#[derive(Debug)]
pub struct FeatureNode<'a> {
    pub attrs: FeatureAttrs,
    pub block: &'a Block,
}

impl<'a> Node<'a> {
    pub fn classify(block: &'a Block) -> Node<'a> {
        match block.name.as_deref() {
            None | Some("") => Node::Freeform,
            Some(GROUP_BLOCK) => Node::Group(GroupNode {
                attrs: GroupAttrs::from_attrs(&block.attrs),
                children: &block.inner_blocks,
            }),
            Some(FEATURE_BLOCK) => Node::Feature(FeatureNode {
                attrs: FeatureAttrs::from_attrs(&block.attrs),
                block,
            }),
            Some(_) => Node::Other(block),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupAttrs {
    pub anchor: Option<String>,
    pub heading: String,
    pub subheading: String,
    pub icon: String,
    pub icon_color: String,
    pub icon_bg_color: String,
    pub heading_tag: HeadingTag,
    pub show_feature_count: bool,
    pub feature_count: u64,
}

impl GroupAttrs {
    pub fn from_attrs(attrs: &Map<String, Value>) -> Self {
        GroupAttrs {
            anchor: attr_string(attrs, "anchor").filter(|s| !s.is_empty()),
            heading: attr_string(attrs, "heading").unwrap_or_default(),
            subheading: attr_string(attrs, "subheading").unwrap_or_default(),
            icon: attr_string(attrs, "groupIcon").unwrap_or_else(|| DEFAULT_GROUP_ICON.to_string()),
            icon_color: attr_string(attrs, "groupIconColor").unwrap_or_default(),
            icon_bg_color: attr_string(attrs, "groupIconBackgroundColor").unwrap_or_default(),
            heading_tag: attr_enum(attrs, "headingTag"),
            show_feature_count: attr_bool(attrs, "showFeatureCount"),
            feature_count: attr_u64(attrs, "featureCount"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureAttrs {
    pub tier: Tier,
    pub label: Option<String>,
    pub has_description: bool,
    pub show_free_badge: bool,
    pub icon_style: IconStyle,
}

impl FeatureAttrs {
    pub fn from_attrs(attrs: &Map<String, Value>) -> Self {
        FeatureAttrs {
            tier: attr_enum(attrs, "tier"),
            label: attr_string(attrs, "label").filter(|s| !s.is_empty()),
            has_description: attr_bool(attrs, "hasDescription"),
            show_free_badge: attr_bool(attrs, "showFreeBadge"),
            icon_style: attr_enum(attrs, "iconStyle"),
        }
    }
}

/// Strings as-is; numbers and booleans formatted; anything else absent.
pub fn attr_string(attrs: &Map<String, Value>, key: &str) -> Option<String> {
    match attrs.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Host truthiness: false, 0, "", "0", null and empty arrays are false.
pub fn attr_bool(attrs: &Map<String, Value>, key: &str) -> bool {
    attrs.get(key).is_some_and(truthy)
}

pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty() && s != "0",
        Value::Array(items) => !items.is_empty(),
        Value::Object(_) => true,
    }
}

pub fn attr_u64(attrs: &Map<String, Value>, key: &str) -> u64 {
    match attrs.get(key) {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

fn attr_enum<T>(attrs: &Map<String, Value>, key: &str) -> T
where
    T: std::str::FromStr + Default,
{
    attrs
        .get(key)
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok())
        .unwrap_or_default()
}
