//! Build configuration.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Inclusive range of group codes whose values are coerced to numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRange {
    pub start: i32,
    pub end: i32,
}

impl TagRange {
    pub fn new(start: i32, end: i32) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, code: i32) -> bool {
        (self.start..=self.end).contains(&code)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Source format name passed to the schema registry.
    pub source_format: String,
    /// Group codes in any of these ranges become numeric properties when
    /// their value parses as a finite f64.
    pub numeric_tag_ranges: Vec<TagRange>,
    /// Emit Layer nodes and BELONGS_TO edges.
    pub link_layers: bool,
    /// Emit block member Entity nodes and CONTAINS edges.
    pub link_block_members: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            source_format: "DXF".to_string(),
            // Coordinates, then distances and scale factors, then angles.
            numeric_tag_ranges: vec![TagRange::new(10, 59)],
            link_layers: true,
            link_block_members: true,
        }
    }
}

impl BuildConfig {
    pub fn is_numeric_tag(&self, code: i32) -> bool {
        self.numeric_tag_ranges.iter().any(|r| r.contains(code))
    }

    /// Load a config from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text)
            .map_err(|e| Error::invalid(format!("bad build config {}: {e}", path.display())))
    }
}
