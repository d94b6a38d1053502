//! `localStorage` tier of the persistence bridge

use overlay::persist::NoRecordStore;
use overlay::{FlatStore, OverlayError, PersistenceBridge};
use wasm_bindgen::JsValue;
use web_sys::Storage;

/// Bridge used in the browser; IndexedDB is driven by the host
pub(crate) type BrowserBridge = PersistenceBridge<NoRecordStore, LocalStore>;

/// Window `localStorage`, absent in private modes and workers
pub(crate) struct LocalStore {
    storage: Option<Storage>,
}

fn storage_error(e: JsValue) -> OverlayError {
    OverlayError::Storage(e.as_string().unwrap_or_else(|| format!("{e:?}")))
}

impl LocalStore {
    pub fn open() -> Self {
        let storage = web_sys::window().and_then(|w| w.local_storage().ok().flatten());
        if storage.is_none() {
            tracing::warn!("localStorage unavailable");
        }
        Self { storage }
    }

    fn storage(&self) -> overlay::Result<&Storage> {
        self.storage
            .as_ref()
            .ok_or_else(|| OverlayError::Storage("localStorage unavailable".to_string()))
    }
}

impl FlatStore for LocalStore {
    fn set_item(&mut self, key: &str, value: &str) -> overlay::Result<()> {
        self.storage()?.set_item(key, value).map_err(storage_error)
    }

    fn get_item(&self, key: &str) -> overlay::Result<Option<String>> {
        self.storage()?.get_item(key).map_err(storage_error)
    }

    fn remove_item(&mut self, key: &str) -> overlay::Result<()> {
        self.storage()?.remove_item(key).map_err(storage_error)
    }
}

pub(crate) fn browser_bridge() -> BrowserBridge {
    PersistenceBridge::new(None, LocalStore::open())
}
