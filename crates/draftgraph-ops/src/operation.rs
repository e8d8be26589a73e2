//! Operations, results and plans.

use draftgraph_graph::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// The eight primitives. Closed: the engine dispatches with one `match`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationKind {
    Match,
    Filter,
    Compare,
    Traverse,
    Aggregate,
    GroupBy,
    Project,
    Join,
}

impl OperationKind {
    pub const ALL: [OperationKind; 8] = [
        Self::Match,
        Self::Filter,
        Self::Compare,
        Self::Traverse,
        Self::Aggregate,
        Self::GroupBy,
        Self::Project,
        Self::Join,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Match => "MATCH",
            Self::Filter => "FILTER",
            Self::Compare => "COMPARE",
            Self::Traverse => "TRAVERSE",
            Self::Aggregate => "AGGREGATE",
            Self::GroupBy => "GROUP_BY",
            Self::Project => "PROJECT",
            Self::Join => "JOIN",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = Error;

    /// Case-insensitive; `GROUPBY` and `GROUP-BY` are accepted for `GROUP_BY`.
    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_uppercase().replace(|c: char| c == '-' || c == ' ', "_");
        match normalized.as_str() {
            "MATCH" => Ok(Self::Match),
            "FILTER" => Ok(Self::Filter),
            "COMPARE" => Ok(Self::Compare),
            "TRAVERSE" => Ok(Self::Traverse),
            "AGGREGATE" => Ok(Self::Aggregate),
            "GROUP_BY" | "GROUPBY" => Ok(Self::GroupBy),
            "PROJECT" => Ok(Self::Project),
            "JOIN" => Ok(Self::Join),
            _ => Err(Error::invalid(format!("unknown operation kind {s:?}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    #[serde(rename = "type")]
    pub kind: OperationKind,
    #[serde(default)]
    pub target_type: String,
    #[serde(default)]
    pub property_name: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

impl Operation {
    pub fn new(kind: OperationKind) -> Self {
        Self {
            kind,
            target_type: String::new(),
            property_name: String::new(),
            parameters: BTreeMap::new(),
        }
    }

    pub fn on(mut self, target_type: impl Into<String>) -> Self {
        self.target_type = target_type.into();
        self
    }

    pub fn property(mut self, name: impl Into<String>) -> Self {
        self.property_name = name.into();
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// A parameter, treating blank values as absent.
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    pub fn require(&self, key: &str) -> Result<&str> {
        self.parameter(key).ok_or_else(|| {
            Error::invalid(format!("{} requires parameter `{key}`", self.kind))
        })
    }

    /// A parameter exactly as given, so an empty string is a real value.
    pub fn literal(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).map(String::as_str)
    }

    pub fn require_literal(&self, key: &str) -> Result<&str> {
        self.literal(key).ok_or_else(|| {
            Error::invalid(format!("{} requires parameter `{key}`", self.kind))
        })
    }

    pub fn require_property(&self) -> Result<&str> {
        if self.property_name.trim().is_empty() {
            return Err(Error::invalid(format!("{} requires property_name", self.kind)));
        }
        Ok(&self.property_name)
    }

    /// Comma-separated list parameter, trimmed, blanks dropped. A key that is
    /// present but blank yields an empty list, not `None`.
    pub fn list(&self, key: &str) -> Option<Vec<&str>> {
        self.literal(key).map(split_list)
    }

    pub fn require_list(&self, key: &str) -> Result<Vec<&str>> {
        self.list(key).ok_or_else(|| {
            Error::invalid(format!("{} requires parameter `{key}`", self.kind))
        })
    }
}

pub(crate) fn split_list(text: &str) -> Vec<&str> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// What an operation produced: matched node ids in discovery order, a
/// provenance trail, a string value map and how many items were examined.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationResult {
    pub node_ids: Vec<String>,
    pub provenance: Vec<String>,
    pub values: BTreeMap<String, String>,
    pub processed: usize,
}

impl OperationResult {
    pub fn value(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.node_ids.is_empty() && self.values.is_empty()
    }
}

/// An ordered list of operations with the query it answers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationPlan {
    pub operations: Vec<Operation>,
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub explanation: String,
}

impl OperationPlan {
    pub fn new(query: impl Into<String>, operations: Vec<Operation>) -> Self {
        Self {
            operations,
            query: query.into(),
            explanation: String::new(),
        }
    }

    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = explanation.into();
        self
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}
