//! Bracket-set suggestion module
//!
//! This module groups RAW files into likely exposure brackets by modification time
//! and filename, before any pixel is decoded.

mod suggest;
pub mod types;

#[cfg(test)]
mod tests;

pub use suggest::{
    common_alpha_prefix, confidence_from_score, label_for_group, score_group, split_by_time,
    suggest_from_infos, suggest_sets,
};
pub use types::{Confidence, GroupingConfig, GroupingConfigBuilder, RawFileInfo, SuggestedSet};
