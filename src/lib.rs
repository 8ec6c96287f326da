/// Save for Later - Chrome Extension for bookmarking tabs
/// Built with Rust + WASM + Yew

pub mod chrome;
pub mod config;
pub mod error;
pub mod list_store;
pub mod saved_item;
pub mod storage;
pub mod sync;
pub mod tabs;
pub mod ui;

pub use config::SyncConfig;
pub use error::SyncError;
pub use list_store::ListStore;
pub use saved_item::{NewSavedItem, SavedItem, Snapshot};
pub use storage::{MemoryStorage, StorageArea, Subscription};
pub use sync::{ListSynchronizer, SyncState};

use wasm_bindgen::prelude::*;

// Set up panic hook for better error messages in the browser console
#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::default());
}

// Start the Yew app for the popup
#[wasm_bindgen]
pub fn start_popup() {
    yew::Renderer::<ui::popup::App>::new().render();
}
