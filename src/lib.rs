//! Feature extraction for WordPress integration pages built from Popup Maker blocks.
//!
//! Post content is parsed into a block tree ([`parser::blocks`]), integration feature blocks
//! are extracted into categories ([`parser::extract`]), and the results are exposed through
//! [`features::FeatureParser`], the cross-document [`index`] and the [`query`] layer.

pub mod cache;
pub mod db;
pub mod features;
pub mod index;
pub mod model;
pub mod parser;
pub mod query;
pub mod settings;
pub mod source;
pub mod wp_api;
pub mod wxr;
