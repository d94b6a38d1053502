//! Form session: one variant, its blocks, preview and redraw scheduling

use crate::blocks::{BlockCategory, BlockEvent, DynamicBlockState};
use crate::collect::{collect, FormSource};
use crate::export::{export_pdf, ExportOutput};
use crate::persist::{FlatStore, PersistenceBridge, RecordStore, SavedForm};
use crate::preview::{PreviewFrame, PreviewSession};
use crate::schedule::RedrawScheduler;
use crate::schema::{FormVariantSpec, PreviewSettings};
use crate::snapshot::FormSnapshot;
use crate::Result;
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Write access to live form state, used when restoring a saved form
pub trait FormSink {
    /// Set a simple field by element id
    fn set_value(&mut self, id: &str, value: &str);

    /// Set one input of a block
    fn set_block_value(&mut self, container: &str, index: usize, key: &str, value: &str);

    /// Apply block UI changes
    fn apply_events(&mut self, events: &[BlockEvent]);
}

/// State of one open form page
pub struct FormSession {
    blocks: DynamicBlockState,
    preview: PreviewSession,
    scheduler: RedrawScheduler,
}

impl FormSession {
    pub fn new(spec: FormVariantSpec, settings: PreviewSettings) -> Self {
        let scheduler = RedrawScheduler::new(settings.debounce_ms);
        Self {
            blocks: DynamicBlockState::new(),
            preview: PreviewSession::new(spec, settings),
            scheduler,
        }
    }

    pub fn spec(&self) -> &FormVariantSpec {
        self.preview.spec()
    }

    pub fn blocks(&self) -> &DynamicBlockState {
        &self.blocks
    }

    /// Block operations go through here; their events are for the host UI
    pub fn blocks_mut(&mut self) -> &mut DynamicBlockState {
        &mut self.blocks
    }

    pub fn preview(&self) -> &PreviewSession {
        &self.preview
    }

    pub fn preview_mut(&mut self) -> &mut PreviewSession {
        &mut self.preview
    }

    /// Snapshot of the live form
    pub fn collect(&self, source: &dyn FormSource) -> FormSnapshot {
        collect(self.spec(), source, &self.blocks)
    }

    /// An input changed; returns the generation of the pending redraw
    pub fn on_input(&mut self, now_ms: u64) -> u64 {
        self.scheduler.request(now_ms)
    }

    /// Generation to redraw now, if the debounce delay has passed
    pub fn poll(&mut self, now_ms: u64) -> Option<u64> {
        self.scheduler.poll(now_ms)
    }

    /// Milliseconds until the pending redraw is due
    pub fn next_due(&self, now_ms: u64) -> Option<u64> {
        self.scheduler.remaining(now_ms)
    }

    /// Redraw one page for `generation`
    ///
    /// # Returns
    /// `None` when a newer input superseded this generation
    pub fn redraw(
        &mut self,
        generation: u64,
        snapshot: &FormSnapshot,
        template_page: usize,
        instance: usize,
        today: Option<NaiveDate>,
    ) -> Result<Option<PreviewFrame>> {
        if !self.scheduler.is_current(generation) {
            tracing::debug!(generation, "dropping stale redraw");
            return Ok(None);
        }
        let frame = self.preview.redraw(snapshot, template_page, instance, today)?;
        tracing::debug!(generation, marks = frame.marks.len(), "preview redrawn");
        Ok(Some(frame))
    }

    /// Export the snapshot taken at call time
    pub fn export(
        &self,
        template: &[u8],
        snapshot: &FormSnapshot,
        signature: Option<&[u8]>,
        today: Option<NaiveDate>,
    ) -> Result<ExportOutput> {
        export_pdf(self.spec(), template, snapshot, signature, today)
    }

    /// Save the snapshot and block layout
    pub fn save<R: RecordStore, F: FlatStore>(
        &self,
        bridge: &mut PersistenceBridge<R, F>,
        snapshot: &FormSnapshot,
    ) -> bool {
        let form = SavedForm::new(self.spec().id, snapshot.clone(), self.blocks.clone());
        bridge.save(&form)
    }

    /// Restore a saved form: blocks are recreated first, then values written
    ///
    /// # Returns
    /// The restored snapshot, `None` when nothing usable was saved
    pub fn restore<R: RecordStore, F: FlatStore>(
        &mut self,
        bridge: &PersistenceBridge<R, F>,
        sink: &mut dyn FormSink,
    ) -> Option<FormSnapshot> {
        let form = bridge.restore()?;
        if form.variant != self.spec().id {
            tracing::warn!(saved = %form.variant, active = %self.spec().id, "saved form belongs to another variant");
            return None;
        }

        self.blocks = form.blocks;
        sink.apply_events(&self.blocks.replay());

        let snapshot = form.snapshot;
        for decl in &self.spec().fields {
            if let Some(value) = snapshot.fields.get(&decl.id) {
                sink.set_value(decl.source_id(), value);
            }
        }

        for layout in &self.spec().groups {
            let mut next_index: BTreeMap<String, usize> = BTreeMap::new();
            for entry in snapshot.entries(layout.category) {
                let container = match layout.category {
                    BlockCategory::Experience => self.blocks.pages().get(entry.instance).map(|p| p.container_id.clone()),
                    _ => layout.container.clone(),
                };
                let Some(container) = container else { continue };
                let index = next_index.entry(container.clone()).or_insert(0);
                for key in &layout.keys {
                    sink.set_block_value(&container, *index, key.source_id(), entry.get(&key.id));
                }
                *index += 1;
            }
        }

        tracing::debug!(variant = %form.variant, fields = snapshot.fields.len(), "form restored");
        Some(snapshot)
    }
}
