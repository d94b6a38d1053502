//! Variant spec types

use crate::blocks::BlockCategory;
use crate::registry::{FieldCoordinate, FieldRegistry, SelectMarkingMap};
use crate::{OverlayError, Result};
use form_text::{LineWrap, TextCase};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Built-in form variants
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum VariantId {
    /// Legal-entity identification form
    LegalEntity,
    /// Legal-entity form as regenerated on the confirmation page
    LegalEntityExtended,
    /// Three-page natural-person form
    NaturalPerson,
    /// Natural-person personal data page only
    Simplified,
}

impl VariantId {
    pub const ALL: [VariantId; 4] = [
        VariantId::LegalEntity,
        VariantId::LegalEntityExtended,
        VariantId::NaturalPerson,
        VariantId::Simplified,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            VariantId::LegalEntity => "legal-entity",
            VariantId::LegalEntityExtended => "legal-entity-extended",
            VariantId::NaturalPerson => "natural-person",
            VariantId::Simplified => "simplified",
        }
    }
}

impl fmt::Display for VariantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VariantId {
    type Err = OverlayError;

    fn from_str(s: &str) -> Result<Self> {
        VariantId::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| OverlayError::UnknownVariant(s.to_string()))
    }
}

/// Template document the variant draws on
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TemplateSource {
    /// Path relative to the form page (e.g. "plantilla.pdf")
    pub path: String,

    /// Pages the variant draws on; missing pages are added blank
    #[serde(default = "default_pages")]
    pub pages: usize,

    /// Download filename of the export
    #[serde(rename = "outputName")]
    pub output_name: String,
}

fn default_pages() -> usize {
    1
}

/// Font sizes of both render paths
///
/// Export sizes are points. Preview sizes are canvas pixels; when absent the
/// export size is scaled by the preview scale and rounded.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct FontSizes {
    #[serde(rename = "exportText", default = "default_export_size")]
    pub export_text: f32,

    #[serde(rename = "exportMark", default = "default_export_size")]
    pub export_mark: f32,

    #[serde(rename = "previewText", default)]
    pub preview_text: Option<f32>,

    #[serde(rename = "previewMark", default)]
    pub preview_mark: Option<f32>,
}

fn default_export_size() -> f32 {
    12.0
}

impl Default for FontSizes {
    fn default() -> Self {
        Self {
            export_text: default_export_size(),
            export_mark: default_export_size(),
            preview_text: None,
            preview_mark: None,
        }
    }
}

/// Extra advance after each glyph of a letter-spaced field
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct LetterSpacing {
    /// Canvas pixels
    #[serde(default = "default_preview_spacing")]
    pub preview: f32,
    /// Points
    #[serde(default = "default_export_spacing")]
    pub export: f32,
}

fn default_preview_spacing() -> f32 {
    3.0
}

fn default_export_spacing() -> f32 {
    2.0
}

impl Default for LetterSpacing {
    fn default() -> Self {
        Self {
            preview: default_preview_spacing(),
            export: default_export_spacing(),
        }
    }
}

/// Greedy line wrap of a long field
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct WrapRule {
    #[serde(rename = "maxChars")]
    pub max_chars: usize,

    #[serde(rename = "minBreak")]
    pub min_break: usize,

    /// Line height in points
    #[serde(rename = "lineHeight")]
    pub line_height: f64,
}

impl WrapRule {
    pub fn line_wrap(&self) -> LineWrap {
        LineWrap {
            max_chars: self.max_chars,
            min_break: self.min_break,
        }
    }
}

/// `field == equals` test against the snapshot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Condition {
    pub field: String,
    pub equals: String,
}

/// Registry keys of the day/month/year boxes of a date field
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DateBoxes {
    #[serde(default)]
    pub day: Option<String>,
    pub month: String,
    pub year: String,
}

/// Per-field drawing rule
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FieldRule {
    /// Truncate to this many characters
    #[serde(rename = "maxChars", default)]
    pub max_chars: Option<usize>,

    /// Export size override in points
    #[serde(default)]
    pub size: Option<f32>,

    #[serde(rename = "letterSpacing", default)]
    pub letter_spacing: Option<LetterSpacing>,

    #[serde(default)]
    pub wrap: Option<WrapRule>,

    /// Only draw when the condition holds
    #[serde(rename = "onlyWhen", default)]
    pub only_when: Option<Condition>,

    /// Split an ISO date into separate boxes
    #[serde(default)]
    pub date: Option<DateBoxes>,

    /// Vertical offset in points added to the coordinate
    #[serde(default)]
    pub dy: f64,
}

/// Values computed from other fields at plan time
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DerivedField {
    /// Lenient numeric total of the sources
    Sum { target: String, sources: Vec<String> },

    /// "place, dd/mm/yyyy" signature line; the render date stands in for an empty date
    PlaceAndDate {
        target: String,
        place: String,
        date: String,
        #[serde(rename = "placeMaxChars", default)]
        place_max_chars: Option<usize>,
    },

    /// Render date as dd/mm/yyyy
    Today { target: String },
}

impl DerivedField {
    pub fn target(&self) -> &str {
        match self {
            DerivedField::Sum { target, .. }
            | DerivedField::PlaceAndDate { target, .. }
            | DerivedField::Today { target } => target,
        }
    }
}

/// One collected field and its case rule
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldDecl {
    /// Snapshot key
    pub id: String,

    #[serde(default)]
    pub case: TextCase,

    /// Element id (or block class) to read when it differs from `id`
    #[serde(default)]
    pub source: Option<String>,
}

impl FieldDecl {
    pub fn source_id(&self) -> &str {
        self.source.as_deref().unwrap_or(&self.id)
    }
}

/// How a group column is drawn
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ColumnKind {
    Text {
        x: f64,
        #[serde(rename = "maxChars", default)]
        max_chars: Option<usize>,
        #[serde(default)]
        size: Option<f32>,
    },
    /// One "X" at the x of the selected option
    Mark { options: BTreeMap<String, f64> },
    /// ISO date split into boxes
    Date {
        #[serde(rename = "dayX", default)]
        day_x: Option<f64>,
        #[serde(rename = "monthX")]
        month_x: f64,
        #[serde(rename = "yearX")]
        year_x: f64,
    },
}

/// One column of a repeating row
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GroupColumn {
    /// Entry key
    pub key: String,

    /// Offset from the row baseline in points
    #[serde(default)]
    pub dy: f64,

    #[serde(flatten)]
    pub kind: ColumnKind,
}

/// Layout of a repeating group of rows
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GroupLayout {
    pub category: BlockCategory,

    /// Template page the rows live on
    pub page: usize,

    /// Baseline of the first row
    #[serde(rename = "baseY")]
    pub base_y: f64,

    /// Distance between rows
    pub step: f64,

    /// Rows per page instance
    #[serde(rename = "perPage")]
    pub per_page: usize,

    /// First row of the first page instance is only used when this holds
    #[serde(rename = "leadRowWhen", default)]
    pub lead_row_when: Option<Condition>,

    /// Columns left blank on the lead row while it is in use
    #[serde(rename = "leadRowOmits", default)]
    pub lead_row_omits: Vec<String>,

    /// Block container for categories without page instances
    #[serde(default)]
    pub container: Option<String>,

    /// Collected entry keys
    pub keys: Vec<FieldDecl>,

    pub columns: Vec<GroupColumn>,
}

impl GroupLayout {
    /// Rows available on a page instance
    pub fn capacity(&self, instance: usize, lead_row_open: bool) -> usize {
        if instance == 0 && self.lead_row_when.is_some() && !lead_row_open {
            self.per_page.saturating_sub(1).max(1)
        } else {
            self.per_page
        }
    }
}

/// A complete form variant: coordinates, rules and collector schema
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FormVariantSpec {
    pub id: VariantId,

    pub template: TemplateSource,

    pub registry: FieldRegistry,

    #[serde(default)]
    pub markings: SelectMarkingMap,

    #[serde(default)]
    pub rules: BTreeMap<String, FieldRule>,

    #[serde(default)]
    pub groups: Vec<GroupLayout>,

    #[serde(default)]
    pub derived: Vec<DerivedField>,

    #[serde(default)]
    pub fonts: FontSizes,

    /// Template raster scale of the preview
    #[serde(rename = "previewScale", default = "default_preview_scale")]
    pub preview_scale: f64,

    /// Signature image box
    #[serde(default)]
    pub signature: Option<FieldCoordinate>,

    /// Collected simple fields
    #[serde(default)]
    pub fields: Vec<FieldDecl>,
}

fn default_preview_scale() -> f64 {
    1.5
}

impl FormVariantSpec {
    /// Coordinate of a field in this variant
    pub fn resolve_coordinate(&self, field: &str) -> Option<&FieldCoordinate> {
        self.registry.resolve_coordinate(field)
    }

    /// Marker coordinate of a select value in this variant
    pub fn resolve_marking(&self, select: &str, value: &str) -> Option<&FieldCoordinate> {
        self.markings.resolve_marking(&self.registry, select, value)
    }

    /// Drawing rule of a field, if any
    pub fn rule(&self, field: &str) -> Option<&FieldRule> {
        self.rules.get(field)
    }

    /// Layout of a group category
    pub fn group(&self, category: BlockCategory) -> Option<&GroupLayout> {
        self.groups.iter().find(|g| g.category == category)
    }

    /// Check that every reference points at a registry entry
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(OverlayError::InvalidSpec(format!("{}: {msg}", self.id)));

        if self.template.pages == 0 {
            return invalid("template must have at least one page".into());
        }
        if self.preview_scale.is_nan() || self.preview_scale <= 0.0 {
            return invalid(format!("preview scale {} must be positive", self.preview_scale));
        }
        for (_, coord) in self.registry.iter() {
            if coord.page == 0 || coord.page > self.template.pages {
                return invalid(format!("coordinate on page {} outside template", coord.page));
            }
        }
        for key in self.markings.marker_keys() {
            if !self.registry.contains(key) {
                return invalid(format!("marker key '{key}' missing from registry"));
            }
        }
        for (field, rule) in &self.rules {
            if let Some(date) = &rule.date {
                let parts = date.day.iter().chain([&date.month, &date.year]);
                for key in parts {
                    if !self.registry.contains(key) {
                        return invalid(format!("date box '{key}' of '{field}' missing from registry"));
                    }
                }
            } else if !self.registry.contains(field) {
                return invalid(format!("rule for unknown field '{field}'"));
            }
            if let Some(wrap) = &rule.wrap {
                LineWrap::new(wrap.max_chars, wrap.min_break)?;
            }
        }
        for derived in &self.derived {
            if !self.registry.contains(derived.target()) {
                return invalid(format!("derived target '{}' missing from registry", derived.target()));
            }
        }
        for group in &self.groups {
            if group.page == 0 || group.page > self.template.pages {
                return invalid(format!("{} rows on page {} outside template", group.category, group.page));
            }
            if group.per_page == 0 || (group.lead_row_when.is_some() && group.per_page < 2) {
                return invalid(format!("{} needs more rows per page", group.category));
            }
            if group.category != BlockCategory::Experience && group.container.is_none() {
                return invalid(format!("{} rows need a container", group.category));
            }
            for column in &group.columns {
                if !group.keys.iter().any(|k| k.id == column.key) {
                    return invalid(format!("{} column '{}' is not collected", group.category, column.key));
                }
            }
            if let Some(key) = group.lead_row_omits.iter().find(|k| !group.columns.iter().any(|c| &c.key == *k)) {
                return invalid(format!("{} lead row omits unknown column '{key}'", group.category));
            }
        }
        if let Some(signature) = &self.signature {
            if signature.width.is_none() || signature.height.is_none() {
                return invalid("signature needs a box".into());
            }
        }
        Ok(())
    }
}

/// Runtime settings of the preview path
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PreviewSettings {
    /// Quiet period before a redraw, in milliseconds
    #[serde(rename = "debounceMs", default = "default_debounce")]
    pub debounce_ms: u64,

    #[serde(default)]
    pub watermark: Watermark,
}

fn default_debounce() -> u64 {
    50
}

impl Default for PreviewSettings {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce(),
            watermark: Watermark::default(),
        }
    }
}

/// Diagonal text repeated over the preview
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Watermark {
    #[serde(default = "default_watermark_text")]
    pub text: String,

    #[serde(default = "default_watermark_alpha")]
    pub alpha: f32,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_watermark_text() -> String {
    "FORMATOUNICO.COM".to_string()
}

fn default_watermark_alpha() -> f32 {
    0.12
}

fn default_true() -> bool {
    true
}

impl Default for Watermark {
    fn default() -> Self {
        Self {
            text: default_watermark_text(),
            alpha: default_watermark_alpha(),
            enabled: true,
        }
    }
}
