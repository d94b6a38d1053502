//! Snapshot collection from a form source

use crate::blocks::{BlockCategory, DynamicBlockState};
use crate::schema::FormVariantSpec;
use crate::snapshot::{FormSnapshot, GroupEntry};
use std::collections::HashMap;

/// Read access to live form state
///
/// Missing elements return `None` and are collected as empty strings.
pub trait FormSource {
    /// Value of a simple field by element id
    fn value(&self, id: &str) -> Option<String>;

    /// Number of blocks currently rendered in a container
    fn block_count(&self, container: &str) -> usize;

    /// Value of one input of a block, addressed by its class
    fn block_value(&self, container: &str, index: usize, key: &str) -> Option<String>;
}

/// Build a fresh snapshot of every declared field and instantiated block
pub fn collect(spec: &FormVariantSpec, source: &dyn FormSource, blocks: &DynamicBlockState) -> FormSnapshot {
    let mut snapshot = FormSnapshot::new();

    for decl in &spec.fields {
        let raw = source.value(decl.source_id()).unwrap_or_default();
        snapshot.set(decl.id.clone(), decl.case.apply(&raw));
    }

    for group in &spec.groups {
        let containers: Vec<(usize, &str)> = match group.category {
            BlockCategory::Experience => blocks
                .pages()
                .iter()
                .enumerate()
                .map(|(i, p)| (i, p.container_id.as_str()))
                .collect(),
            _ => group.container.as_deref().map(|c| (0, c)).into_iter().collect(),
        };

        for (instance, container) in containers {
            for index in 0..source.block_count(container) {
                let mut entry = GroupEntry::new(instance);
                for key in &group.keys {
                    let raw = source
                        .block_value(container, index, key.source_id())
                        .unwrap_or_default();
                    entry.values.insert(key.id.clone(), key.case.apply(&raw));
                }
                snapshot.push_entry(group.category, entry);
            }
        }
    }

    snapshot.page_index = blocks.page_index();
    tracing::debug!(
        variant = %spec.id,
        fields = snapshot.fields.len(),
        groups = snapshot.groups.values().map(Vec::len).sum::<usize>(),
        "collected snapshot"
    );
    snapshot
}

/// In-memory form source
#[derive(Debug, Clone, Default)]
pub struct MapFormSource {
    values: HashMap<String, String>,
    blocks: HashMap<String, Vec<HashMap<String, String>>>,
}

impl MapFormSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(mut self, id: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(id.into(), value.into());
        self
    }

    /// Append a block to a container
    pub fn with_block<K, V>(mut self, container: &str, values: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.blocks
            .entry(container.to_string())
            .or_default()
            .push(values.into_iter().map(|(k, v)| (k.into(), v.into())).collect());
        self
    }
}

impl FormSource for MapFormSource {
    fn value(&self, id: &str) -> Option<String> {
        self.values.get(id).cloned()
    }

    fn block_count(&self, container: &str) -> usize {
        self.blocks.get(container).map_or(0, Vec::len)
    }

    fn block_value(&self, container: &str, index: usize, key: &str) -> Option<String> {
        self.blocks.get(container)?.get(index)?.get(key).cloned()
    }
}
