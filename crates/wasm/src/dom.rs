//! Live form access through the DOM

use js_sys::Function;
use overlay::blocks::{EDUCATION_CONTAINER, LANGUAGE_CONTAINER};
use overlay::{BlockEvent, FormSink, FormSource};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Document, Element, HtmlInputElement, HtmlSelectElement, HtmlTextAreaElement};

/// Class of the block elements inside a container
pub(crate) fn block_selector(container: &str) -> &'static str {
    match container {
        EDUCATION_CONTAINER => ".edu-block",
        LANGUAGE_CONTAINER => ".idioma-block",
        _ => ".exp-block",
    }
}

fn element_value(element: &Element) -> Option<String> {
    if let Some(input) = element.dyn_ref::<HtmlInputElement>() {
        Some(input.value())
    } else if let Some(select) = element.dyn_ref::<HtmlSelectElement>() {
        Some(select.value())
    } else {
        element.dyn_ref::<HtmlTextAreaElement>().map(|area| area.value())
    }
}

fn set_element_value(element: &Element, value: &str) {
    if let Some(input) = element.dyn_ref::<HtmlInputElement>() {
        input.set_value(value);
    } else if let Some(select) = element.dyn_ref::<HtmlSelectElement>() {
        select.set_value(value);
    } else if let Some(area) = element.dyn_ref::<HtmlTextAreaElement>() {
        area.set_value(value);
    }
}

/// Form page document, optionally with a callback receiving block events
pub(crate) struct DomForm {
    document: Document,
    on_block_event: Option<Function>,
}

impl DomForm {
    pub fn new(document: Document, on_block_event: Option<Function>) -> Self {
        Self {
            document,
            on_block_event,
        }
    }

    /// Document of the current window
    pub fn current(on_block_event: Option<Function>) -> Result<Self, JsValue> {
        let document = web_sys::window()
            .and_then(|w| w.document())
            .ok_or_else(|| JsValue::from_str("No document available"))?;
        Ok(Self::new(document, on_block_event))
    }

    fn block(&self, container: &str, index: usize) -> Option<Element> {
        let element = self.document.get_element_by_id(container)?;
        let blocks = element.query_selector_all(block_selector(container)).ok()?;
        blocks.item(index as u32)?.dyn_into::<Element>().ok()
    }

    fn block_input(&self, container: &str, index: usize, key: &str) -> Option<Element> {
        let block = self.block(container, index)?;
        block
            .query_selector(&format!(".{key}, [name=\"{key}\"]"))
            .ok()
            .flatten()
    }

    /// Hand block events to the host, which builds or removes the markup
    pub fn dispatch(&self, events: &[BlockEvent]) {
        let Some(callback) = &self.on_block_event else {
            tracing::debug!(events = events.len(), "no block event handler");
            return;
        };
        for event in events {
            let result = serde_wasm_bindgen::to_value(event)
                .map_err(JsValue::from)
                .and_then(|value| callback.call1(&JsValue::NULL, &value));
            if let Err(e) = result {
                tracing::warn!(error = ?e, "block event handler failed");
            }
        }
    }
}

impl FormSource for DomForm {
    fn value(&self, id: &str) -> Option<String> {
        element_value(&self.document.get_element_by_id(id)?)
    }

    fn block_count(&self, container: &str) -> usize {
        self.document
            .get_element_by_id(container)
            .and_then(|c| c.query_selector_all(block_selector(container)).ok())
            .map(|blocks| blocks.length() as usize)
            .unwrap_or(0)
    }

    fn block_value(&self, container: &str, index: usize, key: &str) -> Option<String> {
        element_value(&self.block_input(container, index, key)?)
    }
}

impl FormSink for DomForm {
    fn set_value(&mut self, id: &str, value: &str) {
        if let Some(element) = self.document.get_element_by_id(id) {
            set_element_value(&element, value);
        }
    }

    fn set_block_value(&mut self, container: &str, index: usize, key: &str, value: &str) {
        match self.block_input(container, index, key) {
            Some(element) => set_element_value(&element, value),
            None => tracing::debug!(container, index, key, "block input not found"),
        }
    }

    fn apply_events(&mut self, events: &[BlockEvent]) {
        self.dispatch(events);
    }
}
