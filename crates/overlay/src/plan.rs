//! Render plan shared by the preview and export paths
//!
//! The plan is computed once per snapshot. Both renderers walk the same
//! marks, so a field drawn in the preview is drawn at the same template
//! coordinate in the export.

use crate::blocks::BlockCategory;
use crate::schema::{ColumnKind, Condition, DerivedField, FormVariantSpec, GroupLayout};
use crate::snapshot::FormSnapshot;
use chrono::NaiveDate;
use form_text::{format_dmy, sum_lenient, truncate_chars, wrap_greedy, DateParts};
use std::collections::{BTreeMap, BTreeSet};

/// Text drawn for a marker
pub const CHECK_TEXT: &str = "X";

/// How a mark is laid out
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MarkKind {
    /// Plain text run
    Text,
    /// One glyph at a time with extra advance after each glyph
    Spaced { preview: f32, export: f32 },
    /// "X" on a marker position
    Check,
}

/// One thing to draw, in template coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct Mark {
    /// Registry key or `category[index].key` for group columns
    pub field: String,
    pub text: String,
    pub kind: MarkKind,
    /// Points from the left edge
    pub x: f64,
    /// Baseline in points from the bottom edge
    pub y: f64,
    /// Points
    pub export_size: f32,
    /// Canvas pixels
    pub preview_size: f32,
}

/// Marks of one physical page
#[derive(Debug, Clone, PartialEq)]
pub struct PagePlan {
    /// 1-based template page
    pub template_page: usize,
    /// 0 for the template page itself, n for its n-th copy
    pub instance: usize,
    pub marks: Vec<Mark>,
}

/// Marks of every physical page, in output order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderPlan {
    pub pages: Vec<PagePlan>,
}

impl RenderPlan {
    fn with_template_pages(pages: usize) -> Self {
        Self {
            pages: (1..=pages)
                .map(|template_page| PagePlan {
                    template_page,
                    instance: 0,
                    marks: Vec::new(),
                })
                .collect(),
        }
    }

    /// Plan of one physical page
    pub fn page(&self, template_page: usize, instance: usize) -> Option<&PagePlan> {
        self.pages
            .iter()
            .find(|p| p.template_page == template_page && p.instance == instance)
    }

    /// Number of instances of a template page (at least 1)
    pub fn instances(&self, template_page: usize) -> usize {
        self.pages
            .iter()
            .filter(|p| p.template_page == template_page)
            .count()
            .max(1)
    }

    /// Total number of marks
    pub fn mark_count(&self) -> usize {
        self.pages.iter().map(|p| p.marks.len()).sum()
    }

    /// Every mark with its page
    pub fn marks(&self) -> impl Iterator<Item = (&PagePlan, &Mark)> {
        self.pages.iter().flat_map(|p| p.marks.iter().map(move |m| (p, m)))
    }

    fn push(&mut self, template_page: usize, instance: usize, mark: Mark) {
        let position = self
            .pages
            .iter()
            .position(|p| (p.template_page, p.instance) >= (template_page, instance));

        match position {
            Some(i) if self.pages[i].template_page == template_page && self.pages[i].instance == instance => {
                self.pages[i].marks.push(mark)
            }
            Some(i) => self.pages.insert(
                i,
                PagePlan {
                    template_page,
                    instance,
                    marks: vec![mark],
                },
            ),
            None => self.pages.push(PagePlan {
                template_page,
                instance,
                marks: vec![mark],
            }),
        }
    }

    /// Add empty plans for skipped instances so copies are contiguous
    fn fill_instances(&mut self) {
        let mut highest: BTreeMap<usize, usize> = BTreeMap::new();
        for page in &self.pages {
            let entry = highest.entry(page.template_page).or_default();
            *entry = (*entry).max(page.instance);
        }

        let mut filled = Vec::with_capacity(self.pages.len());
        let mut existing = std::mem::take(&mut self.pages).into_iter().peekable();
        for (template_page, max_instance) in highest {
            for instance in 0..=max_instance {
                match existing.peek() {
                    Some(p) if p.template_page == template_page && p.instance == instance => {
                        filled.extend(existing.next());
                    }
                    _ => filled.push(PagePlan {
                        template_page,
                        instance,
                        marks: Vec::new(),
                    }),
                }
            }
        }
        self.pages = filled;
    }
}

struct Sizes {
    export: f32,
    preview: f32,
}

fn preview_of(spec: &FormVariantSpec, export: f32) -> f32 {
    (export as f64 * spec.preview_scale).round() as f32
}

fn text_sizes(spec: &FormVariantSpec, size: Option<f32>) -> Sizes {
    match size {
        Some(export) => Sizes {
            export,
            preview: preview_of(spec, export),
        },
        None => Sizes {
            export: spec.fonts.export_text,
            preview: spec
                .fonts
                .preview_text
                .unwrap_or_else(|| preview_of(spec, spec.fonts.export_text)),
        },
    }
}

fn mark_sizes(spec: &FormVariantSpec) -> Sizes {
    Sizes {
        export: spec.fonts.export_mark,
        preview: spec
            .fonts
            .preview_mark
            .unwrap_or_else(|| preview_of(spec, spec.fonts.export_mark)),
    }
}

fn holds(condition: &Condition, snapshot: &FormSnapshot) -> bool {
    snapshot.get(&condition.field) == condition.equals
}

fn make_mark(field: impl Into<String>, text: impl Into<String>, kind: MarkKind, x: f64, y: f64, sizes: &Sizes) -> Mark {
    Mark {
        field: field.into(),
        text: text.into(),
        kind,
        x,
        y,
        export_size: sizes.export,
        preview_size: sizes.preview,
    }
}

/// Values computed from other fields
fn derive_values(
    spec: &FormVariantSpec,
    snapshot: &FormSnapshot,
    today: Option<NaiveDate>,
) -> BTreeMap<String, String> {
    let mut values = BTreeMap::new();

    for derived in &spec.derived {
        let value = match derived {
            DerivedField::Sum { sources, .. } => {
                Some(sum_lenient(sources.iter().map(|s| snapshot.get(s))).to_string())
            }
            DerivedField::PlaceAndDate {
                place,
                date,
                place_max_chars,
                ..
            } => {
                let place = snapshot.get(place).trim();
                let place = match place_max_chars {
                    Some(max) => truncate_chars(place, *max),
                    None => place.to_string(),
                };
                let date = NaiveDate::parse_from_str(snapshot.get(date).trim(), "%Y-%m-%d")
                    .ok()
                    .or(today)
                    .map(format_dmy)
                    .unwrap_or_default();
                let parts: Vec<&str> = [place.as_str(), date.as_str()]
                    .into_iter()
                    .filter(|p| !p.is_empty())
                    .collect();
                Some(parts.join(", "))
            }
            DerivedField::Today { .. } => today.map(format_dmy),
        };

        if let Some(value) = value {
            values.insert(derived.target().to_string(), value);
        }
    }

    values
}

/// Build the plan of every page for a snapshot
///
/// # Arguments
/// * `spec` - Form variant
/// * `snapshot` - Collected form values
/// * `today` - Render date for date stamps; `None` leaves them blank
pub fn build_plan(spec: &FormVariantSpec, snapshot: &FormSnapshot, today: Option<NaiveDate>) -> RenderPlan {
    let mut plan = RenderPlan::with_template_pages(spec.template.pages);
    let derived = derive_values(spec, snapshot, today);

    let mut reserved: BTreeSet<&str> = spec.markings.marker_keys().collect();
    for rule in spec.rules.values() {
        if let Some(date) = &rule.date {
            reserved.extend(date.day.iter().map(String::as_str));
            reserved.insert(date.month.as_str());
            reserved.insert(date.year.as_str());
        }
    }

    // Simple fields
    for (field, coord) in spec.registry.iter() {
        if reserved.contains(field) {
            continue;
        }
        let rule = spec.rule(field);
        if let Some(condition) = rule.and_then(|r| r.only_when.as_ref()) {
            if !holds(condition, snapshot) {
                continue;
            }
        }

        let value = derived
            .get(field)
            .map(String::as_str)
            .unwrap_or_else(|| snapshot.get(field));
        if value.trim().is_empty() {
            continue;
        }
        let text = match rule.and_then(|r| r.max_chars) {
            Some(max) => truncate_chars(value, max),
            None => value.to_string(),
        };

        let sizes = text_sizes(spec, rule.and_then(|r| r.size));
        let y = coord.y + rule.map_or(0.0, |r| r.dy);

        if let Some(wrap) = rule.and_then(|r| r.wrap) {
            for (i, line) in wrap_greedy(&text, wrap.line_wrap()).into_iter().enumerate() {
                let line_y = y - i as f64 * wrap.line_height;
                plan.push(coord.page, 0, make_mark(field, line, MarkKind::Text, coord.x, line_y, &sizes));
            }
            continue;
        }

        let kind = match rule.and_then(|r| r.letter_spacing) {
            Some(spacing) => MarkKind::Spaced {
                preview: spacing.preview,
                export: spacing.export,
            },
            None => MarkKind::Text,
        };
        plan.push(coord.page, 0, make_mark(field, text, kind, coord.x, y, &sizes));
    }

    // Dates split into boxes
    for (field, rule) in &spec.rules {
        let Some(boxes) = &rule.date else { continue };
        if let Some(condition) = &rule.only_when {
            if !holds(condition, snapshot) {
                continue;
            }
        }
        let value = snapshot.get(field);
        if value.trim().is_empty() {
            continue;
        }
        let parts = match DateParts::parse_iso(value) {
            Ok(parts) => parts,
            Err(e) => {
                tracing::debug!(field = %field, error = %e, "skipping unparseable date");
                continue;
            }
        };

        let sizes = text_sizes(spec, rule.size);
        let day = boxes.day.as_ref().zip(parts.day.as_ref());
        let pairs = day
            .into_iter()
            .chain([(&boxes.month, &parts.month), (&boxes.year, &parts.year)]);
        for (key, text) in pairs {
            if let Some(coord) = spec.resolve_coordinate(key) {
                let y = coord.y + rule.dy;
                plan.push(coord.page, 0, make_mark(key, text, MarkKind::Text, coord.x, y, &sizes));
            }
        }
    }

    for layout in &spec.groups {
        place_group(&mut plan, spec, layout, snapshot);
    }

    // Select markers
    let check = mark_sizes(spec);
    for select in spec.markings.selects() {
        if let Some(coord) = spec.resolve_marking(select, snapshot.get(select)) {
            plan.push(
                coord.page,
                0,
                make_mark(select, CHECK_TEXT, MarkKind::Check, coord.x, coord.y, &check),
            );
        }
    }

    plan.fill_instances();
    tracing::debug!(
        variant = %spec.id,
        pages = plan.pages.len(),
        marks = plan.mark_count(),
        "built render plan"
    );
    plan
}

/// Lay out the rows of one group, spilling onto page copies when full
fn place_group(plan: &mut RenderPlan, spec: &FormVariantSpec, layout: &GroupLayout, snapshot: &FormSnapshot) {
    let lead_row_open = layout
        .lead_row_when
        .as_ref()
        .map_or(true, |condition| holds(condition, snapshot));
    let mut used: BTreeMap<usize, usize> = BTreeMap::new();
    let check = mark_sizes(spec);

    for (index, entry) in snapshot.entries(layout.category).iter().enumerate() {
        let mut instance = entry.instance;
        while used.get(&instance).copied().unwrap_or(0) >= layout.capacity(instance, lead_row_open) {
            instance += 1;
        }
        let slot = used.entry(instance).or_insert(0);
        let offset = usize::from(instance == 0 && layout.lead_row_when.is_some() && !lead_row_open);
        let row = *slot + offset;
        *slot += 1;
        let on_lead_row = instance == 0 && row == 0 && layout.lead_row_when.is_some() && lead_row_open;

        let row_y = layout.base_y - row as f64 * layout.step;
        for column in &layout.columns {
            let value = entry.get(&column.key).trim();
            if value.is_empty() || (on_lead_row && layout.lead_row_omits.contains(&column.key)) {
                continue;
            }
            let field = group_field(layout.category, index, &column.key);
            let y = row_y + column.dy;

            match &column.kind {
                ColumnKind::Text { x, max_chars, size } => {
                    let text = match max_chars {
                        Some(max) => truncate_chars(value, *max),
                        None => value.to_string(),
                    };
                    let sizes = text_sizes(spec, *size);
                    plan.push(layout.page, instance, make_mark(field, text, MarkKind::Text, *x, y, &sizes));
                }
                ColumnKind::Mark { options } => {
                    if let Some(x) = options.get(value) {
                        plan.push(layout.page, instance, make_mark(field, CHECK_TEXT, MarkKind::Check, *x, y, &check));
                    }
                }
                ColumnKind::Date { day_x, month_x, year_x } => {
                    let Ok(parts) = DateParts::parse_iso(value) else {
                        tracing::debug!(field = %field, "skipping unparseable date");
                        continue;
                    };
                    let sizes = text_sizes(spec, None);
                    let day = day_x.zip(parts.day);
                    for (x, text) in day.into_iter().chain([(*month_x, parts.month), (*year_x, parts.year)]) {
                        plan.push(layout.page, instance, make_mark(field.clone(), text, MarkKind::Text, x, y, &sizes));
                    }
                }
            }
        }
    }
}

fn group_field(category: BlockCategory, index: usize, key: &str) -> String {
    format!("{category}[{index}].{key}")
}
