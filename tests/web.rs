#![cfg(target_arch = "wasm32")]

/// Browser smoke tests: run with `wasm-pack test --headless --chrome`

use save_for_later::{ListStore, ListSynchronizer, MemoryStorage, NewSavedItem, SyncConfig};
use std::rc::Rc;
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

#[wasm_bindgen_test]
async fn test_save_and_remove_in_browser() {
    let storage = MemoryStorage::new();
    let sync = ListSynchronizer::new(Rc::new(ListStore::new(storage, SyncConfig::default())));
    sync.mount().await.unwrap();

    let saved = sync
        .save_item(NewSavedItem::new("https://timmo.dev"))
        .await
        .unwrap();
    assert_eq!(sync.working_copy().unwrap().len(), 1);

    assert!(sync.delete_item(&saved).await.unwrap());
    assert_eq!(sync.working_copy(), Some(Vec::new()));
}
