//! Dynamic block management
//!
//! Repeatable form sections (work experience, higher education, languages)
//! and extra "page 2" instances are tracked as ordered descriptors. Every
//! operation returns the [`BlockEvent`]s the host applies to its UI, so the
//! state here stays the single source of truth for counts and labels.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Container of the main page-2 experience list
pub const MAIN_EXPERIENCE_CONTAINER: &str = "expContainer";
/// Container of the higher-education list
pub const EDUCATION_CONTAINER: &str = "eduContainer";
/// Container of the language list
pub const LANGUAGE_CONTAINER: &str = "idiomasContainer";
/// Container that receives extra page panels
pub const EXTRA_PAGE_CONTAINER: &str = "extraPagePanels";

/// Entry input that is cleared and disabled on the current job
pub const CURRENT_JOB_LOCKED_KEY: &str = "fechaRetiro";

/// Shown when experience is added before answering "Empleo Actual"
pub const EMPLOYMENT_REQUIRED: &str =
    "Seleccione 'Sí' o 'No' para 'Empleo Actual' antes de añadir experiencias.";

const MAX_EXPERIENCE: usize = 4;
const MAX_EXPERIENCE_UNEMPLOYED: usize = 3;
const MAX_EDUCATION: usize = 5;
const MAX_LANGUAGES: usize = 2;
const MAX_EXTRA_PAGES: usize = 1;

/// Kinds of dynamic blocks
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub enum BlockCategory {
    Experience,
    Education,
    Language,
    /// Page-2 instance holding its own experience list
    Page,
}

impl fmt::Display for BlockCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BlockCategory::Experience => "experience",
            BlockCategory::Education => "education",
            BlockCategory::Language => "language",
            BlockCategory::Page => "page",
        };
        f.write_str(name)
    }
}

impl BlockCategory {
    fn id_prefix(self) -> &'static str {
        match self {
            BlockCategory::Experience => "exp",
            BlockCategory::Education => "edu",
            BlockCategory::Language => "idioma",
            BlockCategory::Page => "ext",
        }
    }
}

/// One instantiated block or page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlockDescriptor {
    pub id: String,

    #[serde(rename = "type")]
    pub kind: BlockCategory,

    pub label: String,

    /// Container the block lives in (for pages: the experience list they own)
    #[serde(rename = "containerId")]
    pub container_id: String,

    #[serde(rename = "panelId", default)]
    pub panel_id: Option<String>,

    #[serde(rename = "tabId", default)]
    pub tab_id: Option<String>,
}

/// UI change produced by a block operation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum BlockEvent {
    Added {
        block: BlockDescriptor,
    },
    Removed {
        id: String,
    },
    Relabeled {
        id: String,
        label: String,
    },
    /// Enable or disable the add button of a container
    AddControl {
        category: BlockCategory,
        #[serde(rename = "containerId")]
        container_id: String,
        enabled: bool,
    },
    /// Disable (and clear) or re-enable one input of a block
    InputLocked {
        id: String,
        key: String,
        locked: bool,
    },
    /// Add refused because a prerequisite is missing
    Rejected {
        #[serde(rename = "containerId")]
        container_id: String,
        message: String,
    },
}

/// Ordered, capacity-bounded dynamic blocks of one form
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DynamicBlockState {
    /// Page-2 instances, main page first
    pages: Vec<BlockDescriptor>,

    /// Entry blocks in display order
    blocks: Vec<BlockDescriptor>,

    /// "Empleo Actual" answer ("SI", "NO" or empty)
    #[serde(default)]
    employment: String,

    #[serde(rename = "nextId", default)]
    next_id: u64,
}

impl Default for DynamicBlockState {
    fn default() -> Self {
        Self::new()
    }
}

impl DynamicBlockState {
    /// State with the main page-2 instance and no entries
    pub fn new() -> Self {
        Self {
            pages: vec![BlockDescriptor {
                id: "main-p2".to_string(),
                kind: BlockCategory::Page,
                label: "Página 2".to_string(),
                container_id: MAIN_EXPERIENCE_CONTAINER.to_string(),
                panel_id: Some("panel-p2".to_string()),
                tab_id: Some("tab-p2".to_string()),
            }],
            blocks: Vec::new(),
            employment: String::new(),
            next_id: 0,
        }
    }

    /// Page-2 instances, main first
    pub fn pages(&self) -> &[BlockDescriptor] {
        &self.pages
    }

    /// Page instance id to ordinal
    pub fn page_index(&self) -> BTreeMap<String, usize> {
        self.pages
            .iter()
            .enumerate()
            .map(|(i, p)| (p.id.clone(), i))
            .collect()
    }

    /// Containers holding entries of a category, in page order
    pub fn containers(&self, category: BlockCategory) -> Vec<&str> {
        match category {
            BlockCategory::Experience => self.pages.iter().map(|p| p.container_id.as_str()).collect(),
            BlockCategory::Education => vec![EDUCATION_CONTAINER],
            BlockCategory::Language => vec![LANGUAGE_CONTAINER],
            BlockCategory::Page => Vec::new(),
        }
    }

    /// Blocks of a category in one container
    pub fn blocks<'a>(
        &'a self,
        category: BlockCategory,
        container: &'a str,
    ) -> impl Iterator<Item = &'a BlockDescriptor> + 'a {
        self.blocks
            .iter()
            .filter(move |b| b.kind == category && b.container_id == container)
    }

    pub fn count(&self, category: BlockCategory, container: &str) -> usize {
        match category {
            BlockCategory::Page => self.pages.len() - 1,
            _ => self.blocks(category, container).count(),
        }
    }

    pub fn employment(&self) -> &str {
        &self.employment
    }

    fn is_main(container: &str) -> bool {
        container == MAIN_EXPERIENCE_CONTAINER
    }

    /// Maximum blocks of a category in a container
    pub fn capacity(&self, category: BlockCategory, container: &str) -> usize {
        match category {
            BlockCategory::Experience if Self::is_main(container) && self.employment == "NO" => {
                MAX_EXPERIENCE_UNEMPLOYED
            }
            BlockCategory::Experience => MAX_EXPERIENCE,
            BlockCategory::Education => MAX_EDUCATION,
            BlockCategory::Language => MAX_LANGUAGES,
            BlockCategory::Page => MAX_EXTRA_PAGES,
        }
    }

    fn prerequisite_met(&self, category: BlockCategory, container: &str) -> bool {
        category != BlockCategory::Experience || !Self::is_main(container) || !self.employment.is_empty()
    }

    /// Whether the add control of a container is enabled
    pub fn can_add(&self, category: BlockCategory, container: &str) -> bool {
        self.prerequisite_met(category, container)
            && self.count(category, container) < self.capacity(category, container)
    }

    fn control(&self, category: BlockCategory, container: &str) -> BlockEvent {
        BlockEvent::AddControl {
            category,
            container_id: container.to_string(),
            enabled: self.can_add(category, container),
        }
    }

    fn label_for(&self, category: BlockCategory, container: &str, index: usize) -> String {
        match category {
            BlockCategory::Experience if index == 0 && Self::is_main(container) && self.employment == "SI" => {
                "Experiencia actual".to_string()
            }
            BlockCategory::Experience => format!("Experiencia {}", index + 1),
            BlockCategory::Education => format!("Estudio {}", index + 1),
            BlockCategory::Language => format!("Idioma {}", index + 1),
            BlockCategory::Page if index == 0 => "Página 2".to_string(),
            BlockCategory::Page => format!("Página 2.{index}"),
        }
    }

    /// Lock state of the first main-page experience, the current job when employed
    fn current_job_lock(&self) -> Option<BlockEvent> {
        let first = self.blocks(BlockCategory::Experience, MAIN_EXPERIENCE_CONTAINER).next()?;
        Some(BlockEvent::InputLocked {
            id: first.id.clone(),
            key: CURRENT_JOB_LOCKED_KEY.to_string(),
            locked: self.employment == "SI",
        })
    }

    fn next_id(&mut self, category: BlockCategory) -> String {
        self.next_id += 1;
        format!("{}-{}", category.id_prefix(), self.next_id)
    }

    /// Add a block at the end of a container
    ///
    /// At capacity nothing changes and no event is produced. Adding main-page
    /// experience before "Empleo Actual" is answered yields `Rejected`.
    pub fn add(&mut self, category: BlockCategory, container: &str) -> Vec<BlockEvent> {
        if category == BlockCategory::Page {
            return self.add_page();
        }
        if !self.prerequisite_met(category, container) {
            return vec![BlockEvent::Rejected {
                container_id: container.to_string(),
                message: EMPLOYMENT_REQUIRED.to_string(),
            }];
        }
        if category == BlockCategory::Experience && !self.pages.iter().any(|p| p.container_id == container) {
            tracing::debug!(container, "add to unknown experience container ignored");
            return Vec::new();
        }
        if !self.can_add(category, container) {
            return Vec::new();
        }

        let index = self.count(category, container);
        let block = BlockDescriptor {
            id: self.next_id(category),
            kind: category,
            label: self.label_for(category, container, index),
            container_id: container.to_string(),
            panel_id: None,
            tab_id: None,
        };
        self.blocks.push(block.clone());
        let mut events = vec![BlockEvent::Added { block }, self.control(category, container)];
        if category == BlockCategory::Experience && Self::is_main(container) && index == 0 {
            events.extend(self.current_job_lock());
        }
        events
    }

    /// Remove the block at `index` of a container and relabel the rest
    pub fn remove(&mut self, category: BlockCategory, container: &str, index: usize) -> Vec<BlockEvent> {
        if category == BlockCategory::Page {
            let id = self.pages.get(index).map(|p| p.id.clone());
            return id.map(|id| self.remove_page(&id)).unwrap_or_default();
        }
        let Some(id) = self.blocks(category, container).nth(index).map(|b| b.id.clone()) else {
            return Vec::new();
        };
        self.blocks.retain(|b| b.id != id);

        let mut events = vec![BlockEvent::Removed { id }];
        events.extend(self.relabel(category, container));
        events.push(self.control(category, container));
        if category == BlockCategory::Experience && Self::is_main(container) && index == 0 {
            events.extend(self.current_job_lock());
        }
        events
    }

    fn relabel(&mut self, category: BlockCategory, container: &str) -> Vec<BlockEvent> {
        let labels: Vec<(String, String)> = self
            .blocks(category, container)
            .enumerate()
            .map(|(i, b)| (b.id.clone(), self.label_for(category, container, i)))
            .collect();

        let mut events = Vec::new();
        for (id, label) in labels {
            if let Some(block) = self.blocks.iter_mut().find(|b| b.id == id) {
                if block.label != label {
                    block.label = label.clone();
                    events.push(BlockEvent::Relabeled { id, label });
                }
            }
        }
        events
    }

    /// Record the "Empleo Actual" answer
    ///
    /// Entries past a lowered capacity are dropped from the end of the main
    /// list. The first entry is relabeled and its retirement date locked or
    /// unlocked.
    pub fn set_employment(&mut self, value: &str) -> Vec<BlockEvent> {
        self.employment = value.trim().to_uppercase();

        let capacity = self.capacity(BlockCategory::Experience, MAIN_EXPERIENCE_CONTAINER);
        let surplus: Vec<String> = self
            .blocks(BlockCategory::Experience, MAIN_EXPERIENCE_CONTAINER)
            .skip(capacity)
            .map(|b| b.id.clone())
            .collect();
        if !surplus.is_empty() {
            tracing::debug!(removed = surplus.len(), capacity, "main experience list trimmed");
            self.blocks.retain(|b| !surplus.contains(&b.id));
        }

        let mut events: Vec<BlockEvent> = surplus.into_iter().map(|id| BlockEvent::Removed { id }).collect();
        events.extend(self.relabel(BlockCategory::Experience, MAIN_EXPERIENCE_CONTAINER));
        events.extend(self.current_job_lock());
        events.push(self.control(BlockCategory::Experience, MAIN_EXPERIENCE_CONTAINER));
        events
    }

    /// Add an extra page-2 instance with its own experience container
    pub fn add_page(&mut self) -> Vec<BlockEvent> {
        if !self.can_add(BlockCategory::Page, EXTRA_PAGE_CONTAINER) {
            return Vec::new();
        }
        self.next_id += 1;
        let n = self.next_id;
        let page = BlockDescriptor {
            id: format!("ext-{n}"),
            kind: BlockCategory::Page,
            label: self.label_for(BlockCategory::Page, EXTRA_PAGE_CONTAINER, self.pages.len()),
            container_id: format!("expContainer-ext-{n}"),
            panel_id: Some(format!("panel-p2-ext-{n}")),
            tab_id: Some(format!("tab-p2-ext-{n}")),
        };
        self.pages.push(page.clone());
        let container = page.container_id.clone();
        vec![
            BlockEvent::Added { block: page },
            self.control(BlockCategory::Experience, &container),
            self.control(BlockCategory::Page, EXTRA_PAGE_CONTAINER),
        ]
    }

    /// Remove an extra page and every experience it holds
    ///
    /// The main page cannot be removed.
    pub fn remove_page(&mut self, id: &str) -> Vec<BlockEvent> {
        let Some(position) = self.pages.iter().position(|p| p.id == id) else {
            return Vec::new();
        };
        if position == 0 {
            return Vec::new();
        }
        let page = self.pages.remove(position);

        let mut events: Vec<BlockEvent> = self
            .blocks
            .iter()
            .filter(|b| b.container_id == page.container_id)
            .map(|b| BlockEvent::Removed { id: b.id.clone() })
            .collect();
        self.blocks.retain(|b| b.container_id != page.container_id);
        events.push(BlockEvent::Removed { id: page.id });

        for i in 1..self.pages.len() {
            let label = self.label_for(BlockCategory::Page, EXTRA_PAGE_CONTAINER, i);
            if self.pages[i].label != label {
                self.pages[i].label = label.clone();
                events.push(BlockEvent::Relabeled {
                    id: self.pages[i].id.clone(),
                    label,
                });
            }
        }
        events.push(self.control(BlockCategory::Page, EXTRA_PAGE_CONTAINER));
        events
    }

    /// Events that rebuild this state's UI from scratch, pages first
    pub fn replay(&self) -> Vec<BlockEvent> {
        let mut events: Vec<BlockEvent> = self
            .pages
            .iter()
            .skip(1)
            .chain(self.blocks.iter())
            .map(|b| BlockEvent::Added { block: b.clone() })
            .collect();
        events.extend(self.current_job_lock());
        for category in [BlockCategory::Experience, BlockCategory::Education, BlockCategory::Language] {
            for container in self.containers(category) {
                events.push(self.control(category, container));
            }
        }
        events.push(self.control(BlockCategory::Page, EXTRA_PAGE_CONTAINER));
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn labels(state: &DynamicBlockState, category: BlockCategory, container: &str) -> Vec<String> {
        state.blocks(category, container).map(|b| b.label.clone()).collect()
    }

    #[test]
    fn test_add_at_capacity_is_noop() {
        let mut state = DynamicBlockState::new();
        for _ in 0..2 {
            state.add(BlockCategory::Language, LANGUAGE_CONTAINER);
        }
        let before = state.clone();
        let events = state.add(BlockCategory::Language, LANGUAGE_CONTAINER);
        assert!(events.is_empty());
        assert_eq!(state, before);
        assert!(!state.can_add(BlockCategory::Language, LANGUAGE_CONTAINER));
    }

    #[test]
    fn test_add_reports_control_state() {
        let mut state = DynamicBlockState::new();
        for _ in 0..4 {
            state.add(BlockCategory::Education, EDUCATION_CONTAINER);
        }
        let events = state.add(BlockCategory::Education, EDUCATION_CONTAINER);
        assert!(matches!(&events[0], BlockEvent::Added { block } if block.label == "Estudio 5"));
        assert_eq!(
            events[1],
            BlockEvent::AddControl {
                category: BlockCategory::Education,
                container_id: EDUCATION_CONTAINER.into(),
                enabled: false
            }
        );
    }

    #[test]
    fn test_experience_requires_employment_answer() {
        let mut state = DynamicBlockState::new();
        assert!(!state.can_add(BlockCategory::Experience, MAIN_EXPERIENCE_CONTAINER));
        let events = state.add(BlockCategory::Experience, MAIN_EXPERIENCE_CONTAINER);
        assert!(matches!(&events[0], BlockEvent::Rejected { message, .. } if message == EMPLOYMENT_REQUIRED));
        assert_eq!(state.count(BlockCategory::Experience, MAIN_EXPERIENCE_CONTAINER), 0);
    }

    #[test]
    fn test_unemployed_main_page_holds_three() {
        let mut state = DynamicBlockState::new();
        state.set_employment("no");
        for _ in 0..5 {
            state.add(BlockCategory::Experience, MAIN_EXPERIENCE_CONTAINER);
        }
        assert_eq!(state.count(BlockCategory::Experience, MAIN_EXPERIENCE_CONTAINER), 3);

        state.set_employment("SI");
        assert!(state.can_add(BlockCategory::Experience, MAIN_EXPERIENCE_CONTAINER));
    }

    #[test]
    fn test_remove_relabels_contiguously() {
        let mut state = DynamicBlockState::new();
        state.set_employment("SI");
        for _ in 0..4 {
            state.add(BlockCategory::Experience, MAIN_EXPERIENCE_CONTAINER);
        }
        assert_eq!(
            labels(&state, BlockCategory::Experience, MAIN_EXPERIENCE_CONTAINER),
            vec!["Experiencia actual", "Experiencia 2", "Experiencia 3", "Experiencia 4"]
        );

        let events = state.remove(BlockCategory::Experience, MAIN_EXPERIENCE_CONTAINER, 1);
        assert!(matches!(&events[0], BlockEvent::Removed { .. }));
        assert_eq!(
            labels(&state, BlockCategory::Experience, MAIN_EXPERIENCE_CONTAINER),
            vec!["Experiencia actual", "Experiencia 2", "Experiencia 3"]
        );

        let relabeled = state.set_employment("NO");
        assert!(matches!(&relabeled[0], BlockEvent::Relabeled { label, .. } if label == "Experiencia 1"));
    }

    #[test]
    fn test_unemployed_answer_trims_main_list() {
        let mut state = DynamicBlockState::new();
        state.set_employment("SI");
        for _ in 0..4 {
            state.add(BlockCategory::Experience, MAIN_EXPERIENCE_CONTAINER);
        }
        let last = state
            .blocks(BlockCategory::Experience, MAIN_EXPERIENCE_CONTAINER)
            .last()
            .map(|b| b.id.clone())
            .unwrap();

        let events = state.set_employment("NO");
        assert_eq!(events[0], BlockEvent::Removed { id: last });
        let count = state.count(BlockCategory::Experience, MAIN_EXPERIENCE_CONTAINER);
        assert_eq!(count, 3);
        assert!(count <= state.capacity(BlockCategory::Experience, MAIN_EXPERIENCE_CONTAINER));
        assert!(!state.can_add(BlockCategory::Experience, MAIN_EXPERIENCE_CONTAINER));
        assert_eq!(
            labels(&state, BlockCategory::Experience, MAIN_EXPERIENCE_CONTAINER),
            vec!["Experiencia 1", "Experiencia 2", "Experiencia 3"]
        );
    }

    #[test]
    fn test_current_job_locks_retirement_date() {
        let mut state = DynamicBlockState::new();
        state.set_employment("SI");
        let events = state.add(BlockCategory::Experience, MAIN_EXPERIENCE_CONTAINER);
        let first = state
            .blocks(BlockCategory::Experience, MAIN_EXPERIENCE_CONTAINER)
            .next()
            .map(|b| b.id.clone())
            .unwrap();
        let locked = BlockEvent::InputLocked {
            id: first.clone(),
            key: CURRENT_JOB_LOCKED_KEY.to_string(),
            locked: true,
        };
        assert!(events.contains(&locked));
        assert!(state.replay().contains(&locked));

        // Only the first block carries the lock
        let second = state.add(BlockCategory::Experience, MAIN_EXPERIENCE_CONTAINER);
        assert!(!second.iter().any(|e| matches!(e, BlockEvent::InputLocked { .. })));

        let events = state.set_employment("NO");
        assert!(events.contains(&BlockEvent::InputLocked {
            id: first,
            key: CURRENT_JOB_LOCKED_KEY.to_string(),
            locked: false,
        }));
    }

    #[test]
    fn test_remove_out_of_range() {
        let mut state = DynamicBlockState::new();
        state.add(BlockCategory::Education, EDUCATION_CONTAINER);
        assert!(state.remove(BlockCategory::Education, EDUCATION_CONTAINER, 3).is_empty());
        assert_eq!(state.count(BlockCategory::Education, EDUCATION_CONTAINER), 1);
    }

    #[test]
    fn test_extra_page_lifecycle() {
        let mut state = DynamicBlockState::new();
        let events = state.add_page();
        let BlockEvent::Added { block: page } = &events[0] else {
            panic!("expected page");
        };
        assert_eq!(page.label, "Página 2.1");
        assert_eq!(page.container_id, "expContainer-ext-1");
        assert_eq!(page.tab_id.as_deref(), Some("tab-p2-ext-1"));
        // Extra pages do not need the employment answer
        assert!(state.can_add(BlockCategory::Experience, &page.container_id));

        assert!(state.add_page().is_empty());
        assert_eq!(state.pages().len(), 2);

        let container = page.container_id.clone();
        state.add(BlockCategory::Experience, &container);
        state.add(BlockCategory::Experience, &container);
        let removed = state.remove_page(&page.id);
        let removed_ids = removed
            .iter()
            .filter(|e| matches!(e, BlockEvent::Removed { .. }))
            .count();
        assert_eq!(removed_ids, 3);
        assert_eq!(state.count(BlockCategory::Experience, &container), 0);
        assert_eq!(state.pages().len(), 1);
    }

    #[test]
    fn test_main_page_cannot_be_removed() {
        let mut state = DynamicBlockState::new();
        assert!(state.remove_page("main-p2").is_empty());
        assert_eq!(state.page_index()["main-p2"], 0);
    }

    #[test]
    fn test_serde_roundtrip_keeps_ids() {
        let mut state = DynamicBlockState::new();
        state.add_page();
        state.add(BlockCategory::Language, LANGUAGE_CONTAINER);
        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("\"containerId\":\"expContainer\""));
        let back: DynamicBlockState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
        let replay = back.replay();
        assert_eq!(
            replay
                .iter()
                .filter(|e| matches!(e, BlockEvent::Added { .. }))
                .count(),
            2
        );
    }
}
