/// Key-value storage substrate: the contract chrome.storage.local fulfils,
/// plus an in-process implementation with the same fan-out behaviour.

use crate::error::{Result, SyncError};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

/// One change of a watched key, as the substrate reports it
#[derive(Debug, Clone, PartialEq)]
pub struct StorageChange {
    pub new_value: Option<Value>,
    pub old_value: Option<Value>,
}

pub type ChangeHandler = Rc<dyn Fn(StorageChange)>;

/// get/set/watch over string keys.
///
/// `watch` handlers fire for every change of the key, including the ones made
/// through this same handle.
#[allow(async_fn_in_trait)]
pub trait StorageArea {
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    async fn set(&self, key: &str, value: Value) -> Result<()>;

    fn watch(&self, key: &str, handler: ChangeHandler) -> Subscription;
}

/// Token returned by `watch`. Unsubscribing is idempotent and also happens on drop.
pub struct Subscription {
    cancel: RefCell<Option<Box<dyn FnOnce()>>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + 'static) -> Self {
        Subscription {
            cancel: RefCell::new(Some(Box::new(cancel))),
        }
    }

    pub fn unsubscribe(&self) {
        let cancel = self.cancel.borrow_mut().take();
        if let Some(cancel) = cancel {
            cancel();
        }
    }

    pub fn is_active(&self) -> bool {
        self.cancel.borrow().is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

struct Watcher {
    id: u64,
    key: String,
    handler: ChangeHandler,
}

struct MemoryInner {
    values: HashMap<String, Value>,
    watchers: Vec<Watcher>,
    next_watcher_id: u64,
    available: bool,
    writes: usize,
}

/// In-process storage area. Clones share the same values and watchers, so
/// several views built from clones behave like popups over one extension store.
#[derive(Clone)]
pub struct MemoryStorage {
    inner: Rc<RefCell<MemoryInner>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        MemoryStorage {
            inner: Rc::new(RefCell::new(MemoryInner {
                values: HashMap::new(),
                watchers: Vec::new(),
                next_watcher_id: 0,
                available: true,
                writes: 0,
            })),
        }
    }

    /// Simulate the substrate going away (or coming back)
    pub fn set_available(&self, available: bool) {
        self.inner.borrow_mut().available = available;
    }

    /// Number of successful `set` calls so far
    pub fn write_count(&self) -> usize {
        self.inner.borrow().writes
    }

    pub fn watcher_count(&self) -> usize {
        self.inner.borrow().watchers.len()
    }

    pub fn raw(&self, key: &str) -> Option<Value> {
        self.inner.borrow().values.get(key).cloned()
    }

    /// Seed a value without notifying watchers or counting a write
    pub fn seed(&self, key: &str, value: Value) {
        self.inner.borrow_mut().values.insert(key.to_string(), value);
    }

    /// Delete a key, notifying watchers the way chrome.storage does on removal
    pub fn remove(&self, key: &str) -> Result<()> {
        let old_value = {
            let mut inner = self.inner.borrow_mut();
            if !inner.available {
                return Err(unavailable());
            }
            inner.values.remove(key)
        };

        if old_value.is_some() {
            self.notify(
                key,
                StorageChange {
                    new_value: None,
                    old_value,
                },
            );
        }
        Ok(())
    }

    fn notify(&self, key: &str, change: StorageChange) {
        // Collect first so handlers may read or write the store re-entrantly
        let handlers: Vec<ChangeHandler> = self
            .inner
            .borrow()
            .watchers
            .iter()
            .filter(|w| w.key == key)
            .map(|w| w.handler.clone())
            .collect();

        for handler in handlers {
            handler(change.clone());
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

fn unavailable() -> SyncError {
    SyncError::StorageUnavailable("storage area is not reachable".to_string())
}

impl StorageArea for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let inner = self.inner.borrow();
        if !inner.available {
            return Err(unavailable());
        }
        Ok(inner.values.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let old_value = {
            let mut inner = self.inner.borrow_mut();
            if !inner.available {
                return Err(unavailable());
            }
            inner.writes += 1;
            inner.values.insert(key.to_string(), value.clone())
        };

        self.notify(
            key,
            StorageChange {
                new_value: Some(value),
                old_value,
            },
        );
        Ok(())
    }

    fn watch(&self, key: &str, handler: ChangeHandler) -> Subscription {
        let id = {
            let mut inner = self.inner.borrow_mut();
            let id = inner.next_watcher_id;
            inner.next_watcher_id += 1;
            inner.watchers.push(Watcher {
                id,
                key: key.to_string(),
                handler,
            });
            id
        };

        let inner: Weak<RefCell<MemoryInner>> = Rc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = inner.upgrade() {
                inner.borrow_mut().watchers.retain(|w| w.id != id);
            }
        })
    }
}
