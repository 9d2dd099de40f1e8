pub mod blocks;
pub mod extract;
pub mod markup;
pub mod nodes;

use crate::model::ExtractionResult;

/// Two-pass pipeline: raw content → block tree → extracted features.
pub fn process_content(content: &str) -> ExtractionResult {
    let blocks = blocks::parse_blocks(content);
    extract::extract(&blocks)
}
