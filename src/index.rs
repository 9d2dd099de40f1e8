use anyhow::Result;
use rayon::prelude::*;
use serde::Serialize;
use tracing::debug;

use crate::cache::ExtractionCache;
use crate::features::{ApiCategory, FeatureParser, Summary};
use crate::model::{ExtractionResult, Feature, Tier};
use crate::parser::process_content;
use crate::source::Document;

/// A feature together with the document it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexedFeature {
    #[serde(flatten)]
    pub feature: Feature,
    pub integration_id: i64,
    pub integration_title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntegrationEntry {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub url: String,
    pub summary: Summary,
    pub features: Vec<ApiCategory>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TierBuckets {
    pub free: Vec<IndexedFeature>,
    pub pro: Vec<IndexedFeature>,
    pub proplus: Vec<IndexedFeature>,
}

impl TierBuckets {
    pub fn get(&self, tier: Tier) -> &[IndexedFeature] {
        match tier {
            Tier::Free => &self.free,
            Tier::Pro => &self.pro,
            Tier::ProPlus => &self.proplus,
        }
    }

    fn bucket_mut(&mut self, tier: Tier) -> &mut Vec<IndexedFeature> {
        match tier {
            Tier::Free => &mut self.free,
            Tier::Pro => &mut self.pro,
            Tier::ProPlus => &mut self.proplus,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct IntegrationIndex {
    pub integrations: Vec<IntegrationEntry>,
    pub total_features: usize,
    pub all_features: Vec<IndexedFeature>,
    pub by_tier: TierBuckets,
}

/// Per-document extraction with its summary.
#[derive(Debug, Clone, Serialize)]
pub struct IntegrationFeatures {
    pub document: Document,
    pub features: ExtractionResult,
    pub summary: Summary,
}

/// Build the cross-document index. Documents are extracted in parallel and assembled in
/// the order given.
pub fn build_index(documents: &[Document]) -> IntegrationIndex {
    let results: Vec<ExtractionResult> = documents
        .par_iter()
        .map(|doc| process_content(&doc.content))
        .collect();
    assemble(documents, results)
}

/// Same as [`build_index`], with extraction served from `cache` where the content is unchanged.
pub fn build_index_cached(documents: &[Document], cache: &ExtractionCache) -> Result<IntegrationIndex> {
    let results = documents
        .iter()
        .map(|doc| cache.get_or_extract(doc))
        .collect::<Result<Vec<_>>>()?;
    Ok(assemble(documents, results))
}

pub fn collect_integration_features(documents: &[Document]) -> Vec<IntegrationFeatures> {
    documents
        .par_iter()
        .map(|doc| {
            let parser = FeatureParser::from_content(&doc.content);
            let summary = parser.summary();
            IntegrationFeatures {
                document: doc.clone(),
                features: parser.into_data(),
                summary,
            }
        })
        .collect()
}

fn assemble(documents: &[Document], results: Vec<ExtractionResult>) -> IntegrationIndex {
    let mut index = IntegrationIndex::default();

    for (doc, result) in documents.iter().zip(results) {
        let parser = FeatureParser::from_result(result);

        index.integrations.push(IntegrationEntry {
            id: doc.id,
            title: doc.title.clone(),
            slug: doc.slug.clone(),
            url: doc.url.clone(),
            summary: parser.summary(),
            features: parser.to_api_format(true),
        });

        for feature in parser.all_features() {
            let indexed = IndexedFeature {
                feature: feature.clone(),
                integration_id: doc.id,
                integration_title: doc.title.clone(),
            };
            index.total_features += 1;
            index.by_tier.bucket_mut(feature.tier).push(indexed.clone());
            index.all_features.push(indexed);
        }
    }

    debug!(
        integrations = index.integrations.len(),
        features = index.total_features,
        "index built"
    );
    index
}
