use super::{feature, Accumulator};
use crate::model::Category;
use crate::parser::nodes::{GroupNode, Node};

/// Parse a group and its direct feature children. Deeper descendants are not searched.
pub(super) fn parse(node: &GroupNode<'_>, acc: &mut Accumulator) -> Category {
    let attrs = &node.attrs;
    let mut category = Category {
        id: acc.category_id(attrs),
        heading: attrs.heading.clone(),
        subheading: attrs.subheading.clone(),
        icon: attrs.icon.clone(),
        icon_color: attrs.icon_color.clone(),
        icon_bg_color: attrs.icon_bg_color.clone(),
        heading_tag: attrs.heading_tag,
        show_feature_count: attrs.show_feature_count,
        feature_count: attrs.feature_count,
        features: Vec::new(),
    };

    for child in node.children {
        if let Node::Feature(f) = Node::classify(child) {
            let parsed = feature::parse(&f);
            acc.record(parsed.tier);
            category.features.push(parsed);
        }
    }

    category
}
