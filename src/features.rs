use serde::{Deserialize, Serialize};

use crate::model::{Category, ExtractionResult, Feature, Tier, TierCounts};
use crate::parser::blocks::{parse_blocks, Block};
use crate::parser::extract::extract;

/// Parsed block tree plus the extraction result, with read-only views over it.
///
/// `data` is `None` until something has been parsed; every accessor then answers with
/// its empty default.
#[derive(Debug, Clone, Default)]
pub struct FeatureParser {
    blocks: Vec<Block>,
    data: Option<ExtractionResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total_categories: usize,
    pub total_features: usize,
    pub features_with_descriptions: usize,
    pub features_by_tier: TierCounts,
    pub category_names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiCategory {
    pub name: String,
    pub icon: String,
    pub features: Vec<ApiFeature>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiFeature {
    pub label: String,
    pub tier: Tier,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub description: Option<String>,
}

impl FeatureParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_content(content: &str) -> Self {
        let mut parser = Self::new();
        parser.parse(content);
        parser
    }

    pub fn from_result(result: ExtractionResult) -> Self {
        FeatureParser {
            blocks: Vec::new(),
            data: Some(result),
        }
    }

    pub fn parse(&mut self, content: &str) -> &mut Self {
        self.parse_blocks(parse_blocks(content))
    }

    pub fn parse_blocks(&mut self, blocks: Vec<Block>) -> &mut Self {
        self.data = Some(extract(&blocks));
        self.blocks = blocks;
        self
    }

    pub fn data(&self) -> Option<&ExtractionResult> {
        self.data.as_ref()
    }

    pub fn into_data(self) -> ExtractionResult {
        self.data.unwrap_or_default()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        match &self.data {
            Some(data) => serde_json::to_string_pretty(data),
            None => serde_json::to_string_pretty(&ExtractionResult::default()),
        }
    }

    pub fn categories(&self) -> &[Category] {
        self.data
            .as_ref()
            .map(|d| d.categories.as_slice())
            .unwrap_or(&[])
    }

    /// Every feature in category order. No deduplication.
    pub fn all_features(&self) -> Vec<&Feature> {
        self.categories().iter().flat_map(|c| &c.features).collect()
    }

    /// Exact tier match; unknown tier names match nothing.
    pub fn features_by_tier(&self, tier: &str) -> Vec<&Feature> {
        let Ok(tier) = tier.parse::<Tier>() else {
            return Vec::new();
        };
        self.all_features()
            .into_iter()
            .filter(|f| f.tier == tier)
            .collect()
    }

    pub fn tier_counts(&self) -> TierCounts {
        self.data.as_ref().map(|d| d.features_by_tier).unwrap_or_default()
    }

    pub fn total_count(&self) -> usize {
        self.data.as_ref().map_or(0, |d| d.total_features)
    }

    pub fn features_with_descriptions(&self) -> Vec<&Feature> {
        self.all_features()
            .into_iter()
            .filter(|f| f.has_description)
            .collect()
    }

    /// Case-insensitive substring match on labels. An empty query matches everything.
    pub fn search_features(&self, query: &str) -> Vec<&Feature> {
        let query = query.to_lowercase();
        self.all_features()
            .into_iter()
            .filter(|f| label_matches(&f.label, &query))
            .collect()
    }

    pub fn summary(&self) -> Summary {
        let categories = self.categories();
        Summary {
            total_categories: categories.len(),
            total_features: self.all_features().len(),
            features_with_descriptions: self.features_with_descriptions().len(),
            features_by_tier: self.tier_counts(),
            category_names: categories.iter().map(|c| c.heading.clone()).collect(),
        }
    }

    pub fn to_api_format(&self, include_descriptions: bool) -> Vec<ApiCategory> {
        self.categories()
            .iter()
            .map(|c| ApiCategory {
                name: c.heading.clone(),
                icon: c.icon.clone(),
                features: c
                    .features
                    .iter()
                    .map(|f| ApiFeature {
                        label: f.label.clone(),
                        tier: f.tier,
                        description: (include_descriptions && !f.description.is_empty())
                            .then(|| f.description.clone()),
                    })
                    .collect(),
            })
            .collect()
    }
}

/// `query` must already be lowercased.
pub fn label_matches(label: &str, query: &str) -> bool {
    label.to_lowercase().contains(query)
}
