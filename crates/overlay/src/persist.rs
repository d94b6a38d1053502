//! Local persistence of form state and generated PDFs
//!
//! Two tiers: a structured record store (IndexedDB in the browser, a
//! directory of JSON files natively) and a flat string store
//! (`localStorage`). Every save goes to both; reads prefer the structured
//! tier. Storage failures never reach the caller: they are logged and the
//! other tier is used.

use crate::blocks::DynamicBlockState;
use crate::schema::VariantId;
use crate::snapshot::FormSnapshot;
use crate::{OverlayError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

/// Key of the saved form
pub const FORM_KEY: &str = "formatounico_form_data";

/// Key prefix of saved PDFs
pub const PDF_KEY_PREFIX: &str = "pdf_";

/// Key of the list of saved PDF references
pub const PDF_INDEX_KEY: &str = "pdf_index";

const PDF_DATA_URL: &str = "data:application/pdf;base64,";

/// Everything needed to rebuild a form
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SavedForm {
    pub variant: VariantId,

    pub snapshot: FormSnapshot,

    #[serde(default)]
    pub blocks: DynamicBlockState,
}

impl SavedForm {
    pub fn new(variant: VariantId, snapshot: FormSnapshot, blocks: DynamicBlockState) -> Self {
        Self {
            variant,
            snapshot,
            blocks,
        }
    }
}

/// Structured key/value tier
pub trait RecordStore {
    fn put(&mut self, key: &str, value: &Value) -> Result<()>;
    fn get(&self, key: &str) -> Result<Option<Value>>;
    fn delete(&mut self, key: &str) -> Result<()>;
}

/// Flat string tier
pub trait FlatStore {
    fn set_item(&mut self, key: &str, value: &str) -> Result<()>;
    fn get_item(&self, key: &str) -> Result<Option<String>>;
    fn remove_item(&mut self, key: &str) -> Result<()>;
}

/// Key of a saved PDF
pub fn pdf_key(reference: &str) -> String {
    format!("{PDF_KEY_PREFIX}{reference}")
}

/// Encode PDF bytes as a data URL
pub fn pdf_data_url(bytes: &[u8]) -> String {
    format!("{PDF_DATA_URL}{}", STANDARD.encode(bytes))
}

/// Decode a data URL written by [`pdf_data_url`]
pub fn decode_pdf_data_url(url: &str) -> Result<Vec<u8>> {
    let payload = url
        .strip_prefix(PDF_DATA_URL)
        .ok_or_else(|| OverlayError::Storage("not a PDF data URL".to_string()))?;
    STANDARD
        .decode(payload)
        .map_err(|e| OverlayError::Storage(e.to_string()))
}

/// Two-tier store front
///
/// The structured tier is optional: without one (or when it fails) only
/// the flat tier is used.
pub struct PersistenceBridge<R, F> {
    records: Option<R>,
    flat: F,
}

impl<R: RecordStore, F: FlatStore> PersistenceBridge<R, F> {
    pub fn new(records: Option<R>, flat: F) -> Self {
        Self { records, flat }
    }

    pub fn records(&self) -> Option<&R> {
        self.records.as_ref()
    }

    pub fn flat(&self) -> &F {
        &self.flat
    }

    /// Save the form to every available tier
    ///
    /// # Returns
    /// `true` when at least one tier accepted the write
    pub fn save(&mut self, form: &SavedForm) -> bool {
        let value = match serde_json::to_value(form) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "form not serializable");
                return false;
            }
        };
        self.write(FORM_KEY, value)
    }

    /// Saved form, structured tier first
    pub fn restore(&self) -> Option<SavedForm> {
        let value = self.read(FORM_KEY)?;
        match serde_json::from_value(value) {
            Ok(form) => Some(form),
            Err(e) => {
                tracing::warn!(error = %e, "saved form unreadable");
                None
            }
        }
    }

    /// Store a generated PDF
    ///
    /// # Arguments
    /// * `bytes` - PDF bytes
    /// * `reference` - Payment reference; `None` uses `default-<now_ms>`
    /// * `now_ms` - Current time in milliseconds since the epoch
    ///
    /// # Returns
    /// The reference the PDF was stored under
    pub fn save_pdf(&mut self, bytes: &[u8], reference: Option<&str>, now_ms: u64) -> String {
        let reference = match reference {
            Some(r) if !r.is_empty() => r.to_string(),
            _ => format!("default-{now_ms}"),
        };
        self.write(&pdf_key(&reference), Value::String(pdf_data_url(bytes)));
        let mut index = self.pdf_references();
        if !index.contains(&reference) {
            index.push(reference.clone());
            self.write(PDF_INDEX_KEY, Value::from(index));
        }
        reference
    }

    /// References of the PDFs saved so far
    pub fn pdf_references(&self) -> Vec<String> {
        self.read(PDF_INDEX_KEY)
            .and_then(|value| serde_json::from_value(value).ok())
            .unwrap_or_default()
    }

    /// Load a PDF saved under `reference`
    pub fn load_pdf(&self, reference: &str) -> Option<Vec<u8>> {
        let value = self.read(&pdf_key(reference))?;
        let url = value.as_str()?;
        match decode_pdf_data_url(url) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::warn!(reference, error = %e, "saved PDF unreadable");
                None
            }
        }
    }

    /// Forget the saved form and every saved PDF in every tier
    pub fn clear(&mut self) {
        let mut keys: Vec<String> = self.pdf_references().iter().map(|r| pdf_key(r)).collect();
        keys.push(PDF_INDEX_KEY.to_string());
        keys.push(FORM_KEY.to_string());
        for key in &keys {
            self.remove(key);
        }
        tracing::debug!(keys = keys.len(), "saved data cleared");
    }

    fn remove(&mut self, key: &str) {
        if let Some(records) = self.records.as_mut() {
            if let Err(e) = records.delete(key) {
                tracing::warn!(key, error = %e, "structured store clear failed");
            }
        }
        if let Err(e) = self.flat.remove_item(key) {
            tracing::warn!(key, error = %e, "flat store clear failed");
        }
    }

    fn write(&mut self, key: &str, value: Value) -> bool {
        let mut stored = false;
        if let Some(records) = self.records.as_mut() {
            match records.put(key, &value) {
                Ok(()) => stored = true,
                Err(e) => tracing::warn!(key, error = %e, "structured store write failed"),
            }
        }

        let text = match &value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        match self.flat.set_item(key, &text) {
            Ok(()) => stored = true,
            Err(e) => tracing::warn!(key, error = %e, "flat store write failed"),
        }
        stored
    }

    fn read(&self, key: &str) -> Option<Value> {
        if let Some(records) = self.records.as_ref() {
            match records.get(key) {
                Ok(Some(value)) => return Some(value),
                Ok(None) => {}
                Err(e) => tracing::warn!(key, error = %e, "structured store read failed, using flat store"),
            }
        }

        let text = match self.flat.get_item(key) {
            Ok(text) => text?,
            Err(e) => {
                tracing::warn!(key, error = %e, "flat store read failed");
                return None;
            }
        };
        // PDFs are stored as bare data URLs, forms as JSON text
        if text.starts_with(PDF_DATA_URL) {
            return Some(Value::String(text));
        }
        match serde_json::from_str(&text) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key, error = %e, "flat store value is not JSON");
                None
            }
        }
    }
}

/// Absent structured tier, for bridges that only have a flat store
#[derive(Debug, Clone, Copy)]
pub enum NoRecordStore {}

impl RecordStore for NoRecordStore {
    fn put(&mut self, _: &str, _: &Value) -> Result<()> {
        match *self {}
    }

    fn get(&self, _: &str) -> Result<Option<Value>> {
        match *self {}
    }

    fn delete(&mut self, _: &str) -> Result<()> {
        match *self {}
    }
}

/// In-memory structured store
#[derive(Debug, Clone, Default)]
pub struct MemoryRecordStore {
    records: BTreeMap<String, Value>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for MemoryRecordStore {
    fn put(&mut self, key: &str, value: &Value) -> Result<()> {
        self.records.insert(key.to_string(), value.clone());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.records.get(key).cloned())
    }

    fn delete(&mut self, key: &str) -> Result<()> {
        self.records.remove(key);
        Ok(())
    }
}

/// In-memory flat store
#[derive(Debug, Clone, Default)]
pub struct MemoryFlatStore {
    items: BTreeMap<String, String>,
}

impl MemoryFlatStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl FlatStore for MemoryFlatStore {
    fn set_item(&mut self, key: &str, value: &str) -> Result<()> {
        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.items.get(key).cloned())
    }

    fn remove_item(&mut self, key: &str) -> Result<()> {
        self.items.remove(key);
        Ok(())
    }
}

/// Structured store backed by one JSON file per key
#[derive(Debug, Clone)]
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    /// Use `root`, creating it if needed
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| OverlayError::Storage(e.to_string()))?;
        Ok(Self { root })
    }

    /// File of a key; bytes outside `[A-Za-z0-9_-]` are written as `%XX`
    fn path(&self, key: &str) -> PathBuf {
        let mut name = String::with_capacity(key.len());
        for byte in key.bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
                name.push(char::from(byte));
            } else {
                name.push_str(&format!("%{byte:02X}"));
            }
        }
        self.root.join(format!("{name}.json"))
    }
}

impl RecordStore for DirStore {
    fn put(&mut self, key: &str, value: &Value) -> Result<()> {
        let text = serde_json::to_vec_pretty(value)?;
        fs::write(self.path(key), text).map_err(|e| OverlayError::Storage(e.to_string()))
    }

    fn get(&self, key: &str) -> Result<Option<Value>> {
        let path = self.path(key);
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read(path).map_err(|e| OverlayError::Storage(e.to_string()))?;
        Ok(Some(serde_json::from_slice(&text)?))
    }

    fn delete(&mut self, key: &str) -> Result<()> {
        let path = self.path(key);
        if path.exists() {
            fs::remove_file(path).map_err(|e| OverlayError::Storage(e.to_string()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::{BlockCategory, EDUCATION_CONTAINER};
    use pretty_assertions::assert_eq;

    /// Structured tier that always fails
    struct BrokenStore;

    impl RecordStore for BrokenStore {
        fn put(&mut self, _: &str, _: &Value) -> Result<()> {
            Err(OverlayError::Storage("quota exceeded".into()))
        }
        fn get(&self, _: &str) -> Result<Option<Value>> {
            Err(OverlayError::Storage("blocked".into()))
        }
        fn delete(&mut self, _: &str) -> Result<()> {
            Err(OverlayError::Storage("blocked".into()))
        }
    }

    fn form() -> SavedForm {
        let mut blocks = DynamicBlockState::new();
        blocks.add(BlockCategory::Education, EDUCATION_CONTAINER);
        SavedForm::new(
            VariantId::NaturalPerson,
            FormSnapshot::new().with_field("apellido1", "PEREZ"),
            blocks,
        )
    }

    #[test]
    fn test_save_restore_roundtrip() {
        let mut bridge = PersistenceBridge::new(Some(MemoryRecordStore::new()), MemoryFlatStore::new());
        assert!(bridge.restore().is_none());
        assert!(bridge.save(&form()));
        assert_eq!(bridge.restore(), Some(form()));
        // Both tiers were written
        assert_eq!(bridge.flat().len(), 1);

        bridge.clear();
        assert!(bridge.restore().is_none());
    }

    #[test]
    fn test_flat_tier_fallback() {
        let mut bridge = PersistenceBridge::new(Some(BrokenStore), MemoryFlatStore::new());
        assert!(bridge.save(&form()));
        assert_eq!(bridge.restore(), Some(form()));

        let mut flat_only = PersistenceBridge::<NoRecordStore, _>::new(None, MemoryFlatStore::new());
        flat_only.save(&form());
        assert_eq!(flat_only.restore().map(|f| f.variant), Some(VariantId::NaturalPerson));
    }

    #[test]
    fn test_pdf_references() {
        let mut bridge = PersistenceBridge::new(Some(MemoryRecordStore::new()), MemoryFlatStore::new());
        let reference = bridge.save_pdf(b"%PDF-1.5 test", Some("TX-42"), 0);
        assert_eq!(reference, "TX-42");
        let fallback = bridge.save_pdf(b"%PDF-1.5 other", None, 1_700_000_000_000);
        assert_eq!(fallback, "default-1700000000000");

        assert_eq!(bridge.load_pdf("TX-42").as_deref(), Some(&b"%PDF-1.5 test"[..]));
        assert!(bridge.load_pdf("TX-43").is_none());
        assert_eq!(
            bridge.flat().get_item("pdf_TX-42").unwrap().unwrap(),
            "data:application/pdf;base64,JVBERi0xLjUgdGVzdA=="
        );
    }

    #[test]
    fn test_dir_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirStore::open(dir.path().join("records")).unwrap();
        let mut bridge = PersistenceBridge::new(Some(store), MemoryFlatStore::new());
        bridge.save(&form());

        let reopened = DirStore::open(dir.path().join("records")).unwrap();
        let value = reopened.get(FORM_KEY).unwrap().unwrap();
        assert_eq!(value["snapshot"]["fields"]["apellido1"], "PEREZ");
        assert!(dir.path().join("records").join("formatounico_form_data.json").exists());
    }

    #[test]
    fn test_dir_store_keys_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = DirStore::open(dir.path()).unwrap();
        store.put("pdf_a/b", &Value::from("slash")).unwrap();
        store.put("pdf_a_b", &Value::from("underscore")).unwrap();
        store.put("pdf_a%2Fb", &Value::from("escaped")).unwrap();

        assert_eq!(store.get("pdf_a/b").unwrap(), Some(Value::from("slash")));
        assert_eq!(store.get("pdf_a_b").unwrap(), Some(Value::from("underscore")));
        assert_eq!(store.get("pdf_a%2Fb").unwrap(), Some(Value::from("escaped")));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 3);
    }

    #[test]
    fn test_clear_removes_saved_pdfs() {
        let mut bridge = PersistenceBridge::new(Some(MemoryRecordStore::new()), MemoryFlatStore::new());
        bridge.save(&form());
        bridge.save_pdf(b"%PDF-1.5 a", Some("TX-1"), 0);
        bridge.save_pdf(b"%PDF-1.5 b", None, 7);
        bridge.save_pdf(b"%PDF-1.5 c", Some("TX-1"), 0);
        assert_eq!(bridge.pdf_references(), vec!["TX-1".to_string(), "default-7".to_string()]);

        bridge.clear();
        assert!(bridge.restore().is_none());
        assert!(bridge.load_pdf("TX-1").is_none());
        assert!(bridge.load_pdf("default-7").is_none());
        assert!(bridge.pdf_references().is_empty());
        assert!(bridge.flat().is_empty());
        assert_eq!(bridge.records().unwrap().get(&pdf_key("TX-1")).unwrap(), None);
    }
}
