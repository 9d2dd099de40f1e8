use crate::model::Feature;
use crate::parser::blocks::Block;
use crate::parser::markup::{find_label_span, strip_tags};
use crate::parser::nodes::FeatureNode;

pub fn parse(node: &FeatureNode<'_>) -> Feature {
    let label = extract_label(node);
    let description = extract_description(node.block);

    Feature {
        label,
        tier: node.attrs.tier,
        has_description: node.attrs.has_description || !description.is_empty(),
        description,
        show_free_badge: node.attrs.show_free_badge,
        icon_style: node.attrs.icon_style,
    }
}

/// Label attribute when saved there, otherwise the label span in the block's own markup.
fn extract_label(node: &FeatureNode<'_>) -> String {
    if let Some(label) = &node.attrs.label {
        return strip_tags(label);
    }

    let block = node.block;
    let html = if block.inner_html.is_empty() {
        block.content_fragments()
    } else {
        block.inner_html.clone()
    };

    find_label_span(&html).map(strip_tags).unwrap_or_default()
}

fn extract_description(block: &Block) -> String {
    block
        .inner_blocks
        .iter()
        .map(rendered_markup)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn rendered_markup(block: &Block) -> String {
    if !block.inner_html.is_empty() {
        return block.inner_html.trim().to_string();
    }
    block.content_fragments().trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{IconStyle, Tier};
    use crate::parser::blocks::{blocks_from_json, parse_blocks};
    use crate::parser::nodes::Node;
    use serde_json::json;

    fn parse_first(content: &str) -> Feature {
        let blocks = parse_blocks(content);
        let node = blocks
            .iter()
            .find_map(|b| match Node::classify(b) {
                Node::Feature(f) => Some(f),
                _ => None,
            })
            .expect("feature block");
        parse(&node)
    }

    #[test]
    fn default_tier_is_free() {
        let f = parse_first("<!-- wp:popup-maker/integration-feature /-->");
        assert_eq!(f.tier, Tier::Free);
        assert_eq!(f.icon_style, IconStyle::PlusMinus);
        assert_eq!(f.label, "");
    }

    #[test]
    fn label_attr_is_stripped() {
        let f = parse_first(r#"<!-- wp:popup-maker/integration-feature {"label":"<b>Install</b> Now"} /-->"#);
        assert_eq!(f.label, "Install Now");
    }

    #[test]
    fn label_from_span_markup() {
        let f = parse_first(concat!(
            r#"<!-- wp:popup-maker/integration-feature {"tier":"pro"} -->"#,
            r#"<div class="pm-integration-feature"><span class="pm-integration-feature__label"><b>Install</b> Now</span></div>"#,
            "<!-- /wp:popup-maker/integration-feature -->"
        ));
        assert_eq!(f.label, "Install Now");
        assert_eq!(f.tier, Tier::Pro);
    }

    #[test]
    fn label_found_in_fragments_around_children() {
        let f = parse_first(concat!(
            "<!-- wp:popup-maker/integration-feature -->",
            r#"<details><summary><span class="pm-integration-feature__label">Zoom</span></summary><div>"#,
            "<!-- wp:paragraph --><p>Join calls.</p><!-- /wp:paragraph -->",
            "</div></details>",
            "<!-- /wp:popup-maker/integration-feature -->"
        ));
        assert_eq!(f.label, "Zoom");
        assert_eq!(f.description, "<p>Join calls.</p>");
        assert!(f.has_description);
    }

    #[test]
    fn pre_parsed_tree_without_rendered_markup() {
        let blocks = blocks_from_json(&json!([{
            "blockName": "popup-maker/integration-feature",
            "attrs": { "tier": "pro" },
            "innerBlocks": [{
                "blockName": "core/paragraph",
                "attrs": {},
                "innerBlocks": [],
                "innerHTML": "",
                "innerContent": ["\n<p>Sync ", "contacts</p>\n"]
            }],
            "innerHTML": "",
            "innerContent": [
                "<div><span class=\"pm-integration-feature__label\"><b>Frag</b> Label</span>",
                null,
                "</div>"
            ]
        }]));
        let Node::Feature(node) = Node::classify(&blocks[0]) else {
            panic!("expected a feature node");
        };
        let f = parse(&node);
        assert_eq!(f.label, "Frag Label");
        assert_eq!(f.description, "<p>Sync contacts</p>");
        assert!(f.has_description);
        assert_eq!(f.tier, Tier::Pro);
    }

    #[test]
    fn no_children_means_no_description() {
        let f = parse_first("<!-- wp:popup-maker/integration-feature --><div></div><!-- /wp:popup-maker/integration-feature -->");
        assert_eq!(f.description, "");
        assert!(!f.has_description);
    }

    #[test]
    fn explicit_flag_without_children() {
        let f = parse_first(r#"<!-- wp:popup-maker/integration-feature {"hasDescription":true} /-->"#);
        assert!(f.has_description);
        assert_eq!(f.description, "");
    }

    #[test]
    fn description_joins_children_with_newlines() {
        let f = parse_first(concat!(
            "<!-- wp:popup-maker/integration-feature --><div>",
            "<!-- wp:paragraph -->\n<p>One</p>\n<!-- /wp:paragraph -->",
            "<!-- wp:separator /-->",
            "<!-- wp:paragraph -->\n<p>Two</p>\n<!-- /wp:paragraph -->",
            "</div><!-- /wp:popup-maker/integration-feature -->"
        ));
        assert_eq!(f.description, "<p>One</p>\n<p>Two</p>");
    }
}
