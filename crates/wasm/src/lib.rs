//! WASM bindings for hojavida
//!
//! This crate provides JavaScript-friendly API for:
//! - Collecting the form from the page and restoring it
//! - Dynamic blocks (experience, education, languages, extra pages)
//! - Debounced canvas preview as `ImageData`
//! - PDF export and local persistence
//! - The payment confirmation page
//!
//! # Example (JavaScript)
//!
//! ```javascript
//! import init, { HojaDeVida } from 'hojavida-wasm';
//!
//! await init();
//!
//! const form = new HojaDeVida('natural-person');
//! form.onBlockEvent((event) => renderBlock(event));
//! form.loadBasePage(1, canvas.width, canvas.height, pageImage.data);
//! form.restore();
//!
//! input.addEventListener('input', () => {
//!   form.onInput();
//!   setTimeout(() => {
//!     const generation = form.poll();
//!     if (generation !== undefined) {
//!       const frame = form.redraw(generation, 1, 0);
//!       if (frame) ctx.putImageData(frame, 0, 0);
//!     }
//!   }, 50);
//! });
//!
//! const pdf = form.exportPdf(templateBytes);
//! ```

mod dom;
mod storage;

use chrono::NaiveDate;
use dom::DomForm;
use image::RgbaImage;
use js_sys::Function;
use overlay::{build_plan, BlockCategory, BlockEvent, ConfirmationView, FormSession, FormSnapshot, PreviewSettings};
use storage::BrowserBridge;
use wasm_bindgen::prelude::*;
use wasm_bindgen::Clamped;
use web_sys::{ImageData, UrlSearchParams};

// Initialize panic hook for better error messages in browser console
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

fn to_js(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

/// Local date of the browser
fn today() -> Option<NaiveDate> {
    let now = js_sys::Date::new_0();
    NaiveDate::from_ymd_opt(now.get_full_year() as i32, now.get_month() + 1, now.get_date())
}

fn now_ms() -> u64 {
    js_sys::Date::now() as u64
}

fn parse_category(category: &str) -> Result<BlockCategory, JsValue> {
    match category {
        "experience" => Ok(BlockCategory::Experience),
        "education" => Ok(BlockCategory::Education),
        "language" => Ok(BlockCategory::Language),
        other => Err(JsValue::from_str(&format!("Unknown block category: {other}"))),
    }
}

fn image_data(image: &RgbaImage) -> Result<ImageData, JsValue> {
    ImageData::new_with_u8_clamped_array_and_sh(Clamped(image.as_raw().as_slice()), image.width(), image.height())
}

/// One open form page
#[wasm_bindgen]
pub struct HojaDeVida {
    session: FormSession,
    store: BrowserBridge,
    on_block_event: Option<Function>,
}

#[wasm_bindgen]
impl HojaDeVida {
    /// Open a built-in variant with default preview settings
    ///
    /// @param variant - "legal-entity", "legal-entity-extended", "natural-person" or "simplified"
    #[wasm_bindgen(constructor)]
    pub fn new(variant: &str) -> Result<HojaDeVida, JsValue> {
        Self::open(variant, PreviewSettings::default())
    }

    /// Open a variant with custom preview settings
    ///
    /// @param variant - Variant id
    /// @param settings - `{ debounceMs, watermark: { text, alpha, enabled } }`
    #[wasm_bindgen(js_name = withSettings)]
    pub fn with_settings(variant: &str, settings: JsValue) -> Result<HojaDeVida, JsValue> {
        let settings: PreviewSettings = serde_wasm_bindgen::from_value(settings)?;
        Self::open(variant, settings)
    }

    fn open(variant: &str, settings: PreviewSettings) -> Result<HojaDeVida, JsValue> {
        let id = variant.parse().map_err(to_js)?;
        let spec = overlay::builtin(id).map_err(to_js)?;
        Ok(HojaDeVida {
            session: FormSession::new(spec, settings),
            store: storage::browser_bridge(),
            on_block_event: None,
        })
    }

    fn dom(&self) -> Result<DomForm, JsValue> {
        DomForm::current(self.on_block_event.clone())
    }

    fn snapshot(&self) -> Result<FormSnapshot, JsValue> {
        Ok(self.session.collect(&self.dom()?))
    }

    fn emit(&self, events: Vec<BlockEvent>) -> Result<JsValue, JsValue> {
        match self.dom() {
            Ok(dom) => dom.dispatch(&events),
            Err(e) => tracing::warn!(error = ?e, events = events.len(), "block events not dispatched"),
        }
        Ok(serde_wasm_bindgen::to_value(&events)?)
    }

    /// Variant id
    #[wasm_bindgen(getter)]
    pub fn variant(&self) -> String {
        self.session.spec().id.to_string()
    }

    /// Template path relative to the form page
    #[wasm_bindgen(getter, js_name = templatePath)]
    pub fn template_path(&self) -> String {
        self.session.spec().template.path.clone()
    }

    /// Download filename of the export
    #[wasm_bindgen(getter, js_name = fileName)]
    pub fn file_name(&self) -> String {
        self.session.spec().template.output_name.clone()
    }

    /// Canvas scale the template pages are rasterized at
    #[wasm_bindgen(getter, js_name = previewScale)]
    pub fn preview_scale(&self) -> f64 {
        self.session.spec().preview_scale
    }

    /// Register the handler that builds and removes block markup
    ///
    /// @param callback - Called with one block event object at a time
    #[wasm_bindgen(js_name = onBlockEvent)]
    pub fn on_block_event(&mut self, callback: Function) {
        self.on_block_event = Some(callback);
    }

    // ---- Dynamic blocks ----

    /// Add a block
    ///
    /// @param category - "experience", "education" or "language"
    /// @param container - Container element id
    /// @returns Block events
    #[wasm_bindgen(js_name = addBlock)]
    pub fn add_block(&mut self, category: &str, container: &str) -> Result<JsValue, JsValue> {
        let events = self.session.blocks_mut().add(parse_category(category)?, container);
        self.emit(events)
    }

    /// Remove the block at `index` of a container
    #[wasm_bindgen(js_name = removeBlock)]
    pub fn remove_block(&mut self, category: &str, container: &str, index: usize) -> Result<JsValue, JsValue> {
        let events = self.session.blocks_mut().remove(parse_category(category)?, container, index);
        self.emit(events)
    }

    /// Record the "Empleo Actual" answer
    #[wasm_bindgen(js_name = setEmployment)]
    pub fn set_employment(&mut self, value: &str) -> Result<JsValue, JsValue> {
        let events = self.session.blocks_mut().set_employment(value);
        self.emit(events)
    }

    /// Add an extra experience page
    #[wasm_bindgen(js_name = addPage)]
    pub fn add_page(&mut self) -> Result<JsValue, JsValue> {
        let events = self.session.blocks_mut().add_page();
        self.emit(events)
    }

    /// Remove an extra experience page by block id
    #[wasm_bindgen(js_name = removePage)]
    pub fn remove_page(&mut self, id: &str) -> Result<JsValue, JsValue> {
        let events = self.session.blocks_mut().remove_page(id);
        self.emit(events)
    }

    // ---- Preview ----

    /// Set the raster of a template page
    ///
    /// @param page - 1-based template page
    /// @param width - Raster width in pixels
    /// @param height - Raster height in pixels
    /// @param rgba - RGBA pixels (e.g. `ImageData.data`)
    #[wasm_bindgen(js_name = loadBasePage)]
    pub fn load_base_page(&mut self, page: usize, width: u32, height: u32, rgba: Vec<u8>) -> Result<(), JsValue> {
        let image = RgbaImage::from_raw(width, height, rgba)
            .ok_or_else(|| JsValue::from_str("Pixel buffer does not match the page size"))?;
        self.session.preview_mut().set_base_page(page, image);
        Ok(())
    }

    /// Load the preview font
    ///
    /// @param data - TTF file bytes (Uint8Array)
    #[wasm_bindgen(js_name = loadFont)]
    pub fn load_font(&mut self, data: Vec<u8>) -> Result<(), JsValue> {
        self.session.preview_mut().load_font(data).map_err(to_js)
    }

    /// Set the signature image drawn on the preview
    ///
    /// @param data - PNG or JPEG bytes
    #[wasm_bindgen(js_name = setSignature)]
    pub fn set_signature(&mut self, data: &[u8]) -> Result<(), JsValue> {
        self.session.preview_mut().set_signature(data).map_err(to_js)
    }

    #[wasm_bindgen(js_name = clearSignature)]
    pub fn clear_signature(&mut self) {
        self.session.preview_mut().clear_signature();
    }

    /// An input changed
    ///
    /// @returns Generation of the pending redraw
    #[wasm_bindgen(js_name = onInput)]
    pub fn on_input(&mut self) -> f64 {
        self.session.on_input(now_ms()) as f64
    }

    /// Generation to redraw now, if the debounce delay has passed
    pub fn poll(&mut self) -> Option<f64> {
        self.session.poll(now_ms()).map(|g| g as f64)
    }

    /// Milliseconds until the pending redraw is due
    #[wasm_bindgen(js_name = nextDue)]
    pub fn next_due(&self) -> Option<f64> {
        self.session.next_due(now_ms()).map(|ms| ms as f64)
    }

    /// Redraw one page from the live form
    ///
    /// @param generation - Value returned by `poll`
    /// @param page - 1-based template page
    /// @param instance - Page instance, 0 for the template page itself
    /// @returns ImageData, or undefined when a newer input superseded it
    pub fn redraw(&mut self, generation: f64, page: usize, instance: usize) -> Result<Option<ImageData>, JsValue> {
        let snapshot = self.snapshot()?;
        let frame = self
            .session
            .redraw(generation as u64, &snapshot, page, instance, today())
            .map_err(to_js)?;
        frame.map(|frame| image_data(&frame.image)).transpose()
    }

    /// Number of instances of a template page the live form needs
    pub fn instances(&self, page: usize) -> Result<usize, JsValue> {
        let snapshot = self.snapshot()?;
        Ok(build_plan(self.session.spec(), &snapshot, today()).instances(page))
    }

    // ---- Export & persistence ----

    /// Export the live form onto the template
    ///
    /// @param template - Template PDF bytes (Uint8Array)
    /// @param signature - Optional PNG or JPEG bytes
    /// @returns PDF bytes (Uint8Array)
    #[wasm_bindgen(js_name = exportPdf)]
    pub fn export_pdf(&self, template: &[u8], signature: Option<Vec<u8>>) -> Result<Vec<u8>, JsValue> {
        let snapshot = self.snapshot()?;
        let output = self
            .session
            .export(template, &snapshot, signature.as_deref(), today())
            .map_err(to_js)?;
        Ok(output.bytes)
    }

    /// Save the live form and its blocks
    pub fn save(&mut self) -> Result<bool, JsValue> {
        let snapshot = self.snapshot()?;
        Ok(self.session.save(&mut self.store, &snapshot))
    }

    /// Recreate saved blocks and write saved values into the page
    ///
    /// @returns Whether a saved form was restored
    pub fn restore(&mut self) -> Result<bool, JsValue> {
        let mut dom = self.dom()?;
        Ok(self.session.restore(&self.store, &mut dom).is_some())
    }

    /// Store export bytes under a transaction reference
    ///
    /// @returns The reference used
    #[wasm_bindgen(js_name = savePdf)]
    pub fn save_pdf(&mut self, bytes: &[u8], reference: Option<String>) -> String {
        self.store.save_pdf(bytes, reference.as_deref(), now_ms())
    }

    #[wasm_bindgen(js_name = loadPdf)]
    pub fn load_pdf(&self, reference: &str) -> Option<Vec<u8>> {
        self.store.load_pdf(reference)
    }

    #[wasm_bindgen(js_name = clearSaved)]
    pub fn clear_saved(&mut self) {
        self.store.clear();
    }
}

// ---- Payment confirmation ----

/// Transaction reference of a query string
///
/// @param query - e.g. `location.search`
#[wasm_bindgen(js_name = transactionReference)]
pub fn transaction_reference(query: &str) -> Option<String> {
    let params = UrlSearchParams::new_with_str(query).ok()?;
    let found: Vec<(&str, String)> = overlay::payment::REFERENCE_PARAMS
        .iter()
        .filter_map(|name| params.get(name).map(|value| (*name, value)))
        .collect();
    overlay::payment::transaction_reference(found.iter().map(|(k, v)| (*k, v.as_str()))).map(|r| r.value)
}

/// Transaction reference of the current page URL
#[wasm_bindgen(js_name = currentTransactionReference)]
pub fn current_transaction_reference() -> Option<String> {
    let search = web_sys::window()?.location().search().ok()?;
    transaction_reference(&search)
}

/// Gateway status endpoint of a transaction
#[wasm_bindgen(js_name = statusUrl)]
pub fn status_url(transaction_id: &str) -> String {
    overlay::payment::status_url(transaction_id)
}

/// Screen of the confirmation page
#[wasm_bindgen]
pub struct Confirmation {
    view: ConfirmationView,
}

#[wasm_bindgen]
impl Confirmation {
    /// View for a status check
    ///
    /// @param body - Response body of a successful request
    /// @param error - Failure description when the request failed
    #[wasm_bindgen(js_name = fromResponse)]
    pub fn from_response(body: Option<String>, error: Option<String>) -> Confirmation {
        let response = match &body {
            Some(body) => Ok(body.as_str()),
            None => Err(error.unwrap_or_else(|| "no response".to_string())),
        };
        Confirmation {
            view: ConfirmationView::from_response(response),
        }
    }

    /// View when the URL carries no transaction reference
    #[wasm_bindgen(js_name = accessDenied)]
    pub fn access_denied() -> Confirmation {
        Confirmation {
            view: ConfirmationView::AccessDenied,
        }
    }

    #[wasm_bindgen(getter)]
    pub fn title(&self) -> String {
        self.view.title().to_string()
    }

    #[wasm_bindgen(getter)]
    pub fn message(&self) -> String {
        self.view.message()
    }

    #[wasm_bindgen(getter, js_name = downloadEnabled)]
    pub fn download_enabled(&self) -> bool {
        self.view.download_enabled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasm_bindgen_test::*;

    #[wasm_bindgen_test]
    fn test_open_variant() {
        let form = HojaDeVida::new("legal-entity").unwrap();
        assert_eq!(form.variant(), "legal-entity");
        assert_eq!(form.file_name(), "Hoja_de_Vida_Persona_Juridica.pdf");
        assert!(HojaDeVida::new("unknown").is_err());
    }

    #[wasm_bindgen_test]
    fn test_base_page_size_checked() {
        let mut form = HojaDeVida::new("simplified").unwrap();
        assert!(form.load_base_page(1, 2, 2, vec![255; 16]).is_ok());
        assert!(form.load_base_page(1, 2, 2, vec![255; 15]).is_err());
    }

    #[wasm_bindgen_test]
    fn test_transaction_reference() {
        assert_eq!(transaction_reference("?id=1&reference=ABC"), Some("ABC".to_string()));
        assert_eq!(transaction_reference("?env=test"), None);
        assert_eq!(transaction_reference("?codigo=a+b%20c"), Some("a b c".to_string()));
        assert_eq!(status_url("7"), "https://production.wompi.co/v1/transactions/7");
    }

    #[wasm_bindgen_test]
    fn test_confirmation() {
        let approved = Confirmation::from_response(Some(r#"{"data":{"status":"APPROVED"}}"#.into()), None);
        assert!(approved.download_enabled());
        let failed = Confirmation::from_response(None, Some("offline".into()));
        assert!(!failed.download_enabled());
        assert_eq!(failed.title(), "Error de Conexión");
        assert!(!Confirmation::access_denied().download_enabled());
    }

    #[wasm_bindgen_test]
    fn test_parse_category() {
        assert!(matches!(parse_category("education"), Ok(BlockCategory::Education)));
        assert!(parse_category("page").is_err());
    }
}
