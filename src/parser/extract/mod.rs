pub mod feature;
pub mod group;

use std::collections::HashSet;

use tracing::trace;

use super::blocks::Block;
use super::markup::slugify;
use super::nodes::{GroupAttrs, Node};
use crate::model::{Category, ExtractionResult, Tier, TierCounts, UNCATEGORIZED_ID};

/// Running state of one extraction pass. Owned by a single `extract` call and consumed
/// into its result.
#[derive(Debug, Default)]
pub(super) struct Accumulator {
    categories: Vec<Category>,
    total_features: usize,
    features_by_tier: TierCounts,
    uncategorized: Option<usize>,
    used_ids: HashSet<String>,
}

impl Accumulator {
    fn record(&mut self, tier: Tier) {
        self.total_features += 1;
        self.features_by_tier.increment(tier);
    }

    fn push_category(&mut self, category: Category) {
        self.categories.push(category);
    }

    /// The uncategorized bucket, created on first use at the current end of the list.
    fn uncategorized_mut(&mut self) -> &mut Category {
        let idx = match self.uncategorized {
            Some(idx) => idx,
            None => {
                self.categories.push(Category::uncategorized());
                let idx = self.categories.len() - 1;
                self.uncategorized = Some(idx);
                idx
            }
        };
        &mut self.categories[idx]
    }

    /// Anchor, else heading slug, else positional id; suffixed on collision.
    fn category_id(&mut self, attrs: &GroupAttrs) -> String {
        let base = attrs
            .anchor
            .as_deref()
            .filter(|a| *a != UNCATEGORIZED_ID)
            .map(String::from)
            .or_else(|| Some(slugify(&attrs.heading)).filter(|s| !s.is_empty()))
            .unwrap_or_else(|| format!("category-{}", self.categories.len() + 1));

        let mut id = base.clone();
        let mut n = 2;
        while self.used_ids.contains(&id) {
            id = format!("{}-{}", base, n);
            n += 1;
        }
        self.used_ids.insert(id.clone());
        id
    }

    fn finish(self) -> ExtractionResult {
        ExtractionResult {
            categories: self.categories,
            total_features: self.total_features,
            features_by_tier: self.features_by_tier,
        }
    }
}

/// Extract categories and features from a block tree. Pure and deterministic.
pub fn extract(blocks: &[Block]) -> ExtractionResult {
    let mut acc = Accumulator::default();
    walk(blocks, &mut acc);
    trace!(
        categories = acc.categories.len(),
        features = acc.total_features,
        "extraction finished"
    );
    acc.finish()
}

/// Depth-first, in document order. Wrapper levels are tracked on an explicit stack.
fn walk(blocks: &[Block], acc: &mut Accumulator) {
    let mut stack = vec![blocks.iter()];

    while let Some(level) = stack.last_mut() {
        let Some(block) = level.next() else {
            stack.pop();
            continue;
        };

        match Node::classify(block) {
            Node::Freeform => {}
            Node::Group(g) => {
                let category = group::parse(&g, acc);
                acc.push_category(category);
            }
            Node::Feature(f) => {
                let parsed = feature::parse(&f);
                acc.record(parsed.tier);
                acc.uncategorized_mut().features.push(parsed);
            }
            Node::Other(b) if !b.inner_blocks.is_empty() => stack.push(b.inner_blocks.iter()),
            Node::Other(_) => {}
        }
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::blocks::{blocks_from_json, parse_blocks};

    fn feature(tier: &str, label: &str) -> String {
        format!(
            r#"<!-- wp:popup-maker/integration-feature {{"tier":"{}","label":"{}"}} /-->"#,
            tier, label
        )
    }

    fn group(heading: &str, inner: &str) -> String {
        format!(
            "<!-- wp:popup-maker/integration-features-group {{\"heading\":\"{}\"}} --><div>{}</div><!-- /wp:popup-maker/integration-features-group -->",
            heading, inner
        )
    }

    fn run(content: &str) -> ExtractionResult {
        extract(&parse_blocks(content))
    }

    fn assert_counts_consistent(r: &ExtractionResult) {
        let in_categories: usize = r.categories.iter().map(|c| c.features.len()).sum();
        assert_eq!(r.total_features, r.features_by_tier.total());
        assert_eq!(r.total_features, in_categories);
    }

    #[test]
    fn empty_group_is_kept() {
        let r = run(&group("CRM", ""));
        assert_eq!(r.categories.len(), 1);
        assert_eq!(r.categories[0].heading, "CRM");
        assert_eq!(r.categories[0].id, "crm");
        assert!(r.categories[0].features.is_empty());
        assert_eq!(r.total_features, 0);
    }

    #[test]
    fn standalone_feature_goes_uncategorized() {
        let r = run(&feature("pro", "Sync Leads"));
        assert_eq!(r.categories.len(), 1);
        let c = &r.categories[0];
        assert!(c.is_uncategorized());
        assert_eq!(c.features.len(), 1);
        assert_eq!(c.features[0].label, "Sync Leads");
        assert_eq!(r.features_by_tier, TierCounts { free: 0, pro: 1, proplus: 0 });
    }

    #[test]
    fn group_plus_standalone() {
        let content = format!(
            "{}\n\n<!-- wp:columns --><div><!-- wp:column --><div>{}</div><!-- /wp:column --></div><!-- /wp:columns -->",
            group("Forms", &format!("{}{}", feature("free", "Contact Form"), feature("proplus", "Conditional Logic"))),
            feature("pro", "Webhooks"),
        );
        let r = run(&content);
        assert_eq!(r.categories.len(), 2);
        assert_eq!(r.categories[0].heading, "Forms");
        assert_eq!(r.categories[0].features.len(), 2);
        assert!(r.categories[1].is_uncategorized());
        assert_eq!(r.categories[1].features.len(), 1);
        assert_eq!(r.total_features, 3);
        assert_eq!(r.features_by_tier, TierCounts { free: 1, pro: 1, proplus: 1 });
        assert_counts_consistent(&r);
    }

    #[test]
    fn uncategorized_is_a_singleton_in_first_position() {
        let content = format!(
            "{}{}{}",
            feature("free", "A"),
            group("Middle", &feature("pro", "B")),
            feature("proplus", "C"),
        );
        let r = run(&content);
        let ids: Vec<&str> = r.categories.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec![UNCATEGORIZED_ID, "middle"]);
        assert_eq!(r.categories[0].features.len(), 2);
        assert_eq!(r.categories.iter().filter(|c| c.is_uncategorized()).count(), 1);
        assert_counts_consistent(&r);
    }

    #[test]
    fn group_scope_is_one_level() {
        let inner = format!(
            "{}<!-- wp:group --><div>{}</div><!-- /wp:group -->",
            feature("free", "Direct"),
            feature("pro", "Nested"),
        );
        let r = run(&group("Scoped", &inner));
        assert_eq!(r.categories.len(), 1);
        assert_eq!(r.categories[0].features.len(), 1);
        assert_eq!(r.categories[0].features[0].label, "Direct");
        assert_eq!(r.total_features, 1);
    }

    #[test]
    fn groups_found_inside_wrappers() {
        let content = format!(
            "<!-- wp:group --><div><!-- wp:group --><section>{}</section><!-- /wp:group --></div><!-- /wp:group -->",
            group("Deep", &feature("free", "X"))
        );
        let r = run(&content);
        assert_eq!(r.categories.len(), 1);
        assert_eq!(r.categories[0].heading, "Deep");
        assert_eq!(r.total_features, 1);
    }

    #[test]
    fn wrapper_traversal_keeps_document_order() {
        let content = format!(
            "{}<!-- wp:columns --><div>{}<!-- wp:column --><div>{}</div><!-- /wp:column -->{}</div><!-- /wp:columns -->{}",
            feature("free", "First"),
            group("Second", ""),
            feature("pro", "Third"),
            group("Fourth", ""),
            feature("proplus", "Fifth"),
        );
        let r = run(&content);
        let headings: Vec<&str> = r.categories.iter().map(|c| c.heading.as_str()).collect();
        assert_eq!(headings, vec!["Features", "Second", "Fourth"]);
        let labels: Vec<&str> = r.categories[0].features.iter().map(|f| f.label.as_str()).collect();
        assert_eq!(labels, vec!["First", "Third", "Fifth"]);
    }

    #[test]
    fn deeply_nested_wrappers() {
        let depth = 50_000;
        let content = format!("{}{}", "<!-- wp:group -->".repeat(depth), feature("pro", "Buried"));
        let r = run(&content);
        assert_eq!(r.total_features, 1);
        assert_eq!(r.categories.len(), 1);
        assert!(r.categories[0].is_uncategorized());
        assert_eq!(r.categories[0].features[0].label, "Buried");
        assert_eq!(r.features_by_tier, TierCounts { free: 0, pro: 1, proplus: 0 });
    }

    #[test]
    fn extraction_is_idempotent() {
        let blocks = parse_blocks(&format!(
            "{}{}",
            group("Forms", &feature("pro", "A")),
            feature("free", "B")
        ));
        assert_eq!(extract(&blocks), extract(&blocks));
    }

    #[test]
    fn duplicate_headings_get_distinct_ids() {
        let content = format!("{}{}{}", group("CRM", ""), group("CRM", ""), group("", ""));
        let r = run(&content);
        let ids: Vec<&str> = r.categories.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["crm", "crm-2", "category-3"]);
    }

    #[test]
    fn anchor_cannot_claim_the_sentinel() {
        let content = r#"<!-- wp:popup-maker/integration-features-group {"anchor":"__uncategorized__","heading":"Sneaky"} /-->"#;
        let r = run(content);
        assert_eq!(r.categories[0].id, "sneaky");
    }

    #[test]
    fn malformed_tree_yields_empty_result() {
        let r = extract(&blocks_from_json(&serde_json::json!({ "not": "a list" })));
        assert_eq!(r, ExtractionResult::default());
        assert!(run("").categories.is_empty());
    }

    #[test]
    fn zoom_fixture() {
        let content = std::fs::read_to_string("tests/fixtures/zoom.html").unwrap();
        let r = run(&content);
        assert_counts_consistent(&r);
        let headings: Vec<&str> = r.categories.iter().map(|c| c.heading.as_str()).collect();
        assert_eq!(headings, vec!["Meetings", "Webinars", "Features"]);
        assert_eq!(r.total_features, 5);
        assert_eq!(r.features_by_tier, TierCounts { free: 2, pro: 2, proplus: 1 });
        let meetings = &r.categories[0];
        assert_eq!(meetings.heading_tag, crate::model::HeadingTag::H3);
        assert_eq!(meetings.features[0].label, "Zoom Integration");
        assert!(meetings.features[0].has_description);
        assert!(!meetings.features[1].has_description);
    }
}
