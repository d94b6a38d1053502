//! Point-in-time form values

use crate::blocks::BlockCategory;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One repeated entry (an experience, a study, a language)
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GroupEntry {
    /// Page instance ordinal the entry belongs to (0 = main page)
    #[serde(default)]
    pub instance: usize,

    #[serde(default)]
    pub values: BTreeMap<String, String>,
}

impl GroupEntry {
    pub fn new(instance: usize) -> Self {
        Self {
            instance,
            values: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Value of a key, empty when absent
    pub fn get(&self, key: &str) -> &str {
        self.values.get(key).map(String::as_str).unwrap_or("")
    }
}

/// Complete read of the form, rebuilt on every collection
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FormSnapshot {
    #[serde(default)]
    pub fields: BTreeMap<String, String>,

    #[serde(default)]
    pub groups: BTreeMap<BlockCategory, Vec<GroupEntry>>,

    /// Page instance id to ordinal
    #[serde(rename = "pageIndex", default)]
    pub page_index: BTreeMap<String, usize>,
}

impl FormSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field setter
    pub fn with_field(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Builder-style entry append
    pub fn with_entry(mut self, category: BlockCategory, entry: GroupEntry) -> Self {
        self.push_entry(category, entry);
        self
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(field.into(), value.into());
    }

    pub fn push_entry(&mut self, category: BlockCategory, entry: GroupEntry) {
        self.groups.entry(category).or_default().push(entry);
    }

    /// Value of a field, empty when absent
    pub fn get(&self, field: &str) -> &str {
        self.fields.get(field).map(String::as_str).unwrap_or("")
    }

    /// Entries of a category in form order
    pub fn entries(&self, category: BlockCategory) -> &[GroupEntry] {
        self.groups.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }
}
