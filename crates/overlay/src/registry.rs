//! Field registry and select marking map

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn default_page() -> usize {
    1
}

/// Position of a field on the template in points (origin bottom-left, y up)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct FieldCoordinate {
    pub x: f64,
    pub y: f64,
    /// Box width for image fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    /// Box height for image fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    /// 1-based template page
    #[serde(default = "default_page")]
    pub page: usize,
}

impl FieldCoordinate {
    /// Point on page 1
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            width: None,
            height: None,
            page: 1,
        }
    }

    /// Same point on another template page
    pub fn on_page(mut self, page: usize) -> Self {
        self.page = page;
        self
    }

    /// Attach a bounding box
    pub fn with_box(mut self, width: f64, height: f64) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }
}

/// Field name to coordinate table of one form variant
///
/// Some keys are synthetic marker positions (e.g. `orden_nal`) reached
/// only through a [`SelectMarkingMap`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct FieldRegistry {
    entries: BTreeMap<String, FieldCoordinate>,
}

impl FieldRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an entry
    pub fn insert(&mut self, field: impl Into<String>, coordinate: FieldCoordinate) -> &mut Self {
        self.entries.insert(field.into(), coordinate);
        self
    }

    /// Coordinate of a field; `None` means "do not draw"
    pub fn resolve_coordinate(&self, field: &str) -> Option<&FieldCoordinate> {
        self.entries.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.entries.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldCoordinate)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Select name to (option value to marker key) table
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct SelectMarkingMap {
    selects: BTreeMap<String, BTreeMap<String, String>>,
}

impl SelectMarkingMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map one option of a select to a marker key
    pub fn insert(
        &mut self,
        select: impl Into<String>,
        value: impl Into<String>,
        marker: impl Into<String>,
    ) -> &mut Self {
        self.selects
            .entry(select.into())
            .or_default()
            .insert(value.into(), marker.into());
        self
    }

    /// Marker key for the selected value
    pub fn marker_key(&self, select: &str, value: &str) -> Option<&str> {
        self.selects
            .get(select)
            .and_then(|options| options.get(value))
            .map(String::as_str)
    }

    /// Select names in key order
    pub fn selects(&self) -> impl Iterator<Item = &str> {
        self.selects.keys().map(String::as_str)
    }

    /// Every marker key referenced by any select
    pub fn marker_keys(&self) -> impl Iterator<Item = &str> {
        self.selects
            .values()
            .flat_map(|options| options.values().map(String::as_str))
    }

    /// Resolve the selected value of `select` to a registry coordinate
    pub fn resolve_marking<'r>(
        &self,
        registry: &'r FieldRegistry,
        select: &str,
        value: &str,
    ) -> Option<&'r FieldCoordinate> {
        self.marker_key(select, value)
            .and_then(|key| registry.resolve_coordinate(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orden() -> (FieldRegistry, SelectMarkingMap) {
        let mut registry = FieldRegistry::new();
        registry
            .insert("orden_nal", FieldCoordinate::new(46.0, 586.0))
            .insert("orden_otro", FieldCoordinate::new(166.0, 586.0));
        let mut markings = SelectMarkingMap::new();
        markings
            .insert("orden", "nal", "orden_nal")
            .insert("orden", "otro", "orden_otro")
            .insert("orden", "dptl", "orden_dptl");
        (registry, markings)
    }

    #[test]
    fn test_resolve_marking() {
        let (registry, markings) = orden();
        let coord = markings.resolve_marking(&registry, "orden", "otro").unwrap();
        assert_eq!((coord.x, coord.y), (166.0, 586.0));
    }

    #[test]
    fn test_unknown_value_or_select_is_none() {
        let (registry, markings) = orden();
        assert!(markings.resolve_marking(&registry, "orden", "").is_none());
        assert!(markings.resolve_marking(&registry, "clase", "nal").is_none());
        // Mapped, but the marker key is missing from the registry
        assert!(markings.resolve_marking(&registry, "orden", "dptl").is_none());
    }

    #[test]
    fn test_coordinate_defaults_to_page_one() {
        let coord: FieldCoordinate = serde_json::from_str(r#"{"x": 1, "y": 2}"#).unwrap();
        assert_eq!(coord, FieldCoordinate::new(1.0, 2.0));
        let boxed: FieldCoordinate =
            serde_json::from_str(r#"{"x": 250, "y": 300, "width": 120, "height": 30, "page": 3}"#)
                .unwrap();
        assert_eq!(boxed, FieldCoordinate::new(250.0, 300.0).with_box(120.0, 30.0).on_page(3));
    }
}
