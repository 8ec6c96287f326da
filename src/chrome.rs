/// Browser-backed storage area and tab source, bridged through popup.js

use crate::error::{self, SyncError};
use crate::storage::{ChangeHandler, StorageArea, StorageChange, Subscription};
use crate::tabs::{TabDescriptor, TabSource};
use log::warn;
use serde::Serialize;
use serde_json::Value;
use wasm_bindgen::prelude::*;

// Import JS bridge functions
#[wasm_bindgen(module = "/popup.js")]
extern "C" {
    #[wasm_bindgen(catch)]
    async fn getStorage(key: &str) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn setStorage(key: &str, value: JsValue) -> Result<(), JsValue>;

    fn watchStorage(key: &str, callback: &js_sys::Function) -> js_sys::Function;

    #[wasm_bindgen(catch)]
    async fn getActiveTab() -> Result<JsValue, JsValue>;
}

/// chrome.storage.local
#[derive(Debug, Clone, Copy, Default)]
pub struct ChromeStorage;

/// chrome.tabs, active tab of the current window
#[derive(Debug, Clone, Copy, Default)]
pub struct ChromeTabs;

fn from_js(value: JsValue) -> error::Result<Option<Value>> {
    if value.is_null() || value.is_undefined() {
        return Ok(None);
    }
    serde_wasm_bindgen::from_value(value)
        .map(Some)
        .map_err(|e| SyncError::SchemaMismatch(format!("Failed to parse stored value: {:?}", e)))
}

impl StorageArea for ChromeStorage {
    async fn get(&self, key: &str) -> error::Result<Option<Value>> {
        let value = getStorage(key)
            .await
            .map_err(|e| SyncError::StorageUnavailable(format!("Failed to get storage: {:?}", e)))?;
        from_js(value)
    }

    async fn set(&self, key: &str, value: Value) -> error::Result<()> {
        // Plain objects rather than JS Maps, which chrome.storage cannot hold
        let value_js = value
            .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
            .map_err(|e| SyncError::SchemaMismatch(format!("Failed to serialize: {:?}", e)))?;

        setStorage(key, value_js)
            .await
            .map_err(|e| SyncError::StorageUnavailable(format!("Failed to save storage: {:?}", e)))
    }

    fn watch(&self, key: &str, handler: ChangeHandler) -> Subscription {
        let owned_key = key.to_string();
        let callback = Closure::<dyn FnMut(JsValue, JsValue)>::new(move |new_js: JsValue, old_js: JsValue| {
            let new_value = match from_js(new_js) {
                Ok(value) => value,
                Err(e) => {
                    warn!("Ignoring change to {}: {}", owned_key, e);
                    return;
                }
            };
            handler(StorageChange {
                new_value,
                old_value: from_js(old_js).unwrap_or(None),
            });
        });

        let unwatch = watchStorage(key, callback.as_ref().unchecked_ref());

        Subscription::new(move || {
            if let Err(e) = unwatch.call0(&JsValue::NULL) {
                warn!("Failed to remove storage listener: {:?}", e);
            }
            drop(callback);
        })
    }
}

impl TabSource for ChromeTabs {
    async fn active_tab(&self) -> error::Result<Option<TabDescriptor>> {
        let tab_js = getActiveTab()
            .await
            .map_err(|e| SyncError::TabQueryFailed(format!("Failed to query tabs: {:?}", e)))?;

        if tab_js.is_null() || tab_js.is_undefined() {
            return Ok(None);
        }

        match serde_wasm_bindgen::from_value::<TabDescriptor>(tab_js) {
            Ok(tab) => Ok(Some(tab)),
            Err(e) => {
                warn!("Failed to parse tab: {:?}", e);
                Ok(None)
            }
        }
    }
}
