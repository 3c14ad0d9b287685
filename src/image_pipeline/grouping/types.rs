//! Grouping types

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

/// A candidate input file with its modification time in seconds since the epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFileInfo {
    pub path: PathBuf,
    /// File name without directories
    pub name: String,
    pub mtime: f64,
}

impl RawFileInfo {
    pub fn new(path: impl Into<PathBuf>, mtime: f64) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { path, name, mtime }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn name(self) -> &'static str {
        match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One suggested bracket, serialized as an entry of the CLI's `sets` array.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuggestedSet {
    pub id: String,
    pub label: String,
    pub count: usize,
    pub confidence: Confidence,
    /// Rounded to three decimals
    pub score: f64,
    pub files: Vec<String>,
}

/// Configuration for bracket-set suggestion
#[derive(Debug, Clone)]
pub struct GroupingConfig {
    /// Largest gap in seconds between consecutive files of one set
    pub max_gap: f64,
    /// Smallest set worth suggesting
    pub min_size: usize,
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self {
            max_gap: 30.0,
            min_size: 2,
        }
    }
}

impl GroupingConfig {
    pub fn builder() -> GroupingConfigBuilder {
        GroupingConfigBuilder::default()
    }
}

#[derive(Default)]
pub struct GroupingConfigBuilder {
    max_gap: Option<f64>,
    min_size: Option<usize>,
}

impl GroupingConfigBuilder {
    pub fn max_gap(mut self, seconds: f64) -> Self {
        self.max_gap = Some(seconds);
        self
    }

    pub fn min_size(mut self, size: usize) -> Self {
        self.min_size = Some(size);
        self
    }

    pub fn build(self) -> GroupingConfig {
        let default = GroupingConfig::default();
        GroupingConfig {
            max_gap: self.max_gap.unwrap_or(default.max_gap),
            min_size: self.min_size.unwrap_or(default.min_size),
        }
    }
}
