//! Request/response layer over the extractor and index builder.
//!
//! Mirrors the read-only endpoints `/integration-features/{id}`, `/integration-features`
//! and `/integration-features/by-tier`. Parameter allow-lists are enforced here, at the
//! boundary; the core never rejects input.

use std::str::FromStr;

use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info};

use crate::features::{label_matches, ApiCategory, FeatureParser, Summary};
use crate::index::{build_index, IndexedFeature, IntegrationIndex};
use crate::model::{ExtractionResult, Tier};
use crate::source::{DocumentFilter, DocumentSource};

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Integration post not found")]
    NotFound { id: i64 },
    #[error("Invalid parameter(s): {name} ('{value}' is not one of {allowed})")]
    InvalidParam {
        name: &'static str,
        value: String,
        allowed: &'static str,
    },
    #[error("document source failed: {0:#}")]
    Source(#[from] anyhow::Error),
}

impl QueryError {
    pub fn status(&self) -> u16 {
        match self {
            QueryError::NotFound { .. } => 404,
            QueryError::InvalidParam { .. } => 400,
            QueryError::Source(_) => 500,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            QueryError::NotFound { .. } => "not_found",
            QueryError::InvalidParam { .. } => "rest_invalid_param",
            QueryError::Source(_) => "source_error",
        }
    }

    /// `{code, message, data: {status}}`, the shape REST clients expect for errors.
    pub fn body(&self) -> serde_json::Value {
        json!({
            "code": self.code(),
            "message": self.to_string(),
            "data": { "status": self.status() },
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    #[default]
    Full,
    Api,
    Summary,
}

impl FromStr for Format {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full" => Ok(Format::Full),
            "api" => Ok(Format::Api),
            "summary" => Ok(Format::Summary),
            other => Err(QueryError::InvalidParam {
                name: "format",
                value: other.to_string(),
                allowed: "full, api, summary",
            }),
        }
    }
}

pub fn parse_format(value: &str) -> Result<Format, QueryError> {
    value.parse()
}

pub fn parse_tier(value: &str) -> Result<Tier, QueryError> {
    value.parse().map_err(|_| QueryError::InvalidParam {
        name: "tier",
        value: value.to_string(),
        allowed: "free, pro, proplus",
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FeaturesData {
    Full(ExtractionResult),
    Api(Vec<ApiCategory>),
    Summary(Summary),
}

impl FeaturesData {
    pub fn render(parser: FeatureParser, format: Format, include_descriptions: bool) -> Self {
        match format {
            Format::Summary => FeaturesData::Summary(parser.summary()),
            Format::Api => FeaturesData::Api(parser.to_api_format(include_descriptions)),
            Format::Full => FeaturesData::Full(parser.into_data()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeaturesResponse {
    pub document_id: i64,
    pub title: String,
    pub slug: String,
    pub data: FeaturesData,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexResponse {
    #[serde(flatten)]
    pub index: IntegrationIndex,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filtered_features: Option<Vec<IndexedFeature>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_results: Option<Vec<IndexedFeature>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierFeature {
    pub label: String,
    pub integration: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierGroup {
    pub count: usize,
    pub features: Vec<TierFeature>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierBreakdown {
    pub free: TierGroup,
    pub pro: TierGroup,
    pub proplus: TierGroup,
}

pub struct QueryService<S> {
    source: S,
    filter: DocumentFilter,
}

impl<S: DocumentSource> QueryService<S> {
    pub fn new(source: S, filter: DocumentFilter) -> Self {
        QueryService { source, filter }
    }

    /// Features of one document in the requested shape. Documents of another post type
    /// are reported as missing.
    pub fn integration_features(
        &self,
        id: i64,
        format: Format,
        include_descriptions: bool,
    ) -> Result<FeaturesResponse, QueryError> {
        let doc = self
            .source
            .get_document(id)?
            .filter(|d| d.post_type == self.filter.post_type)
            .ok_or(QueryError::NotFound { id })?;

        debug!(id, ?format, "extracting document features");
        let parser = FeatureParser::from_content(&doc.content);
        let data = FeaturesData::render(parser, format, include_descriptions);

        Ok(FeaturesResponse {
            document_id: doc.id,
            title: doc.title,
            slug: doc.slug,
            data,
        })
    }

    pub fn build_index(&self) -> Result<IntegrationIndex, QueryError> {
        let docs = self.source.list_documents(&self.filter)?;
        info!("Building index over {} documents", docs.len());
        Ok(build_index(&docs))
    }

    pub fn index(&self, tier: Option<Tier>, search: Option<&str>) -> Result<IndexResponse, QueryError> {
        let index = self.build_index()?;
        Ok(filter_index(index, tier, search))
    }

    pub fn by_tier(&self) -> Result<TierBreakdown, QueryError> {
        let index = self.build_index()?;
        Ok(tier_breakdown(&index))
    }
}

/// Attach the optional tier filter and label search to an index. An empty search is ignored.
pub fn filter_index(index: IntegrationIndex, tier: Option<Tier>, search: Option<&str>) -> IndexResponse {
    let filtered_features = tier.map(|t| index.by_tier.get(t).to_vec());
    let search_results = search.filter(|s| !s.is_empty()).map(|s| {
        let query = s.to_lowercase();
        index
            .all_features
            .iter()
            .filter(|f| label_matches(&f.feature.label, &query))
            .cloned()
            .collect()
    });

    IndexResponse {
        index,
        filtered_features,
        search_results,
    }
}

pub fn tier_breakdown(index: &IntegrationIndex) -> TierBreakdown {
    let group = |tier: Tier| {
        let bucket = index.by_tier.get(tier);
        TierGroup {
            count: bucket.len(),
            features: bucket
                .iter()
                .map(|f| TierFeature {
                    label: f.feature.label.clone(),
                    integration: f.integration_title.clone(),
                })
                .collect(),
        }
    };

    TierBreakdown {
        free: group(Tier::Free),
        pro: group(Tier::Pro),
        proplus: group(Tier::ProPlus),
    }
}
