/// Persistent list store: the only code that talks to the storage area
/// about the saved-items collection.

use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::saved_item::{SavedItem, Snapshot};
use crate::storage::{ChangeHandler, StorageArea, StorageChange, Subscription};
use log::{debug, warn};
use std::rc::Rc;

pub struct ListStore<S> {
    area: S,
    config: SyncConfig,
}

impl<S: StorageArea> ListStore<S> {
    pub fn new(area: S, config: SyncConfig) -> Self {
        ListStore { area, config }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn area(&self) -> &S {
        &self.area
    }

    /// Current persisted list; a key that was never written reads as empty
    pub async fn read_all(&self) -> Result<Snapshot> {
        let value = self.area.get(&self.config.collection_key).await?;
        Snapshot::from_stored(value)
    }

    /// Overwrite the persisted list in a single `set`. Last writer wins.
    pub async fn write_all(&self, snapshot: &Snapshot) -> Result<()> {
        let value = snapshot.to_value()?;
        self.area.set(&self.config.collection_key, value).await
    }

    /// Watch the collection key. The handler gets `(new, old)` for every change,
    /// this process's own writes included. Changes that fail to decode are dropped.
    pub fn subscribe(&self, handler: impl Fn(Snapshot, Snapshot) + 'static) -> Subscription {
        let key = self.config.collection_key.clone();
        let on_change: ChangeHandler = Rc::new(move |change: StorageChange| {
            let new_list = match Snapshot::from_stored(change.new_value) {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    warn!("Ignoring change to {}: {}", key, e);
                    return;
                }
            };
            // The old side is informational only
            let old_list = Snapshot::from_stored(change.old_value).unwrap_or_default();
            handler(new_list, old_list);
        });

        self.area.watch(&self.config.collection_key, on_change)
    }

    /// Apply `mutate` on top of `base` and write the result, as long as the store
    /// still holds `base`. If someone else wrote in between, `mutate` is re-applied
    /// to the fresh list. Returns `None` when `mutate` declines to change anything.
    pub async fn commit<F>(&self, base: Snapshot, mut mutate: F) -> Result<Option<Snapshot>>
    where
        F: FnMut(&[SavedItem]) -> Option<Vec<SavedItem>>,
    {
        let attempts = self.config.max_commit_attempts.max(1);
        let mut base = base;

        for attempt in 1..=attempts {
            let Some(items) = mutate(&base.items) else {
                return Ok(None);
            };

            match self.write_if_current(&base, items, attempt).await? {
                Attempt::Written(next) => return Ok(Some(next)),
                Attempt::Moved(current) => base = current,
            }
        }

        warn!("Giving up on commit after {} attempts", attempts);
        Err(SyncError::Conflict { attempts })
    }

    /// Like `commit`, for a mutation that always adds one item. `build` sees the
    /// list it is appending to; the item from the winning attempt is returned.
    pub async fn append<F>(&self, base: Snapshot, mut build: F) -> Result<(Snapshot, SavedItem)>
    where
        F: FnMut(&[SavedItem]) -> SavedItem,
    {
        let attempts = self.config.max_commit_attempts.max(1);
        let mut base = base;

        for attempt in 1..=attempts {
            let item = build(&base.items);
            let mut items = base.items.clone();
            items.push(item.clone());

            match self.write_if_current(&base, items, attempt).await? {
                Attempt::Written(next) => return Ok((next, item)),
                Attempt::Moved(current) => base = current,
            }
        }

        warn!("Giving up on append after {} attempts", attempts);
        Err(SyncError::Conflict { attempts })
    }

    async fn write_if_current(
        &self,
        base: &Snapshot,
        items: Vec<SavedItem>,
        attempt: u32,
    ) -> Result<Attempt> {
        let current = self.read_all().await?;
        if current != *base {
            debug!(
                "Saved items moved from version {} to {} (attempt {}), merging again",
                base.version, current.version, attempt
            );
            return Ok(Attempt::Moved(current));
        }

        let next = Snapshot::new(base.version + 1, items);
        self.write_all(&next).await?;
        Ok(Attempt::Written(next))
    }
}

enum Attempt {
    Written(Snapshot),
    /// The store no longer holds the base; carries what it holds now
    Moved(Snapshot),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use serde_json::json;
    use std::cell::RefCell;

    fn item(id: &str, url: &str, position: u32) -> SavedItem {
        SavedItem {
            id: id.to_string(),
            url: url.to_string(),
            position,
        }
    }

    fn store() -> ListStore<MemoryStorage> {
        ListStore::new(MemoryStorage::new(), SyncConfig::default())
    }

    fn push(extra: SavedItem) -> impl FnMut(&[SavedItem]) -> Option<Vec<SavedItem>> {
        move |items| {
            let mut next = items.to_vec();
            next.push(extra.clone());
            Some(next)
        }
    }

    #[tokio::test]
    async fn test_read_all_empty() {
        let store = store();
        assert_eq!(store.read_all().await.unwrap(), Snapshot::empty());
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let store = store();
        let snapshot = Snapshot::new(1, vec![item("1", "https://example.com", 0)]);

        store.write_all(&snapshot).await.unwrap();

        assert_eq!(store.read_all().await.unwrap(), snapshot);
        assert_eq!(
            store.area().raw("savedItems"),
            Some(json!({
                "version": 1,
                "items": [{"id": "1", "url": "https://example.com", "position": 0}]
            }))
        );
    }

    #[tokio::test]
    async fn test_repeated_write_is_idempotent() {
        let store = store();
        let snapshot = Snapshot::new(
            1,
            vec![item("1", "https://a.example", 0), item("2", "https://b.example", 1)],
        );

        store.write_all(&snapshot).await.unwrap();
        store.write_all(&snapshot).await.unwrap();

        assert_eq!(store.read_all().await.unwrap(), snapshot);
    }

    #[tokio::test]
    async fn test_storage_unavailable_propagates() {
        let store = store();
        store.area().set_available(false);

        assert!(matches!(store.read_all().await, Err(SyncError::StorageUnavailable(_))));
        assert!(matches!(
            store.write_all(&Snapshot::empty()).await,
            Err(SyncError::StorageUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_subscribe_sees_echo() {
        let store = store();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let _sub = store.subscribe(move |new_list, old_list| sink.borrow_mut().push((new_list, old_list)));

        let written = Snapshot::new(1, vec![item("1", "https://example.com", 0)]);
        store.write_all(&written).await.unwrap();

        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, written);
        assert_eq!(seen[0].1, Snapshot::empty());
    }

    #[tokio::test]
    async fn test_subscribe_drops_malformed_changes() {
        let store = store();
        let calls = Rc::new(RefCell::new(0));
        let counter = calls.clone();
        let _sub = store.subscribe(move |_, _| *counter.borrow_mut() += 1);

        store.area().set("savedItems", json!([{"id": "1"}])).await.unwrap();

        assert_eq!(*calls.borrow(), 0);
    }

    #[tokio::test]
    async fn test_commit_bumps_version() {
        let store = store();

        let committed = store
            .commit(Snapshot::empty(), push(item("1", "https://a.example", 0)))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(committed.version, 1);
        assert_eq!(store.read_all().await.unwrap(), committed);
    }

    #[tokio::test]
    async fn test_commit_declined_writes_nothing() {
        let store = store();

        let result = store.commit(Snapshot::empty(), |_| None).await.unwrap();

        assert_eq!(result, None);
        assert_eq!(store.area().write_count(), 0);
    }

    #[tokio::test]
    async fn test_commit_from_stale_base_merges() {
        let store = store();
        let a = item("a", "https://a.example", 0);
        store.write_all(&Snapshot::new(1, vec![a.clone()])).await.unwrap();

        let stale = store.read_all().await.unwrap();
        let b = item("b", "https://b.example", 1);
        store.commit(stale.clone(), push(b.clone())).await.unwrap();

        // Second writer still holds the pre-B snapshot
        let c = item("c", "https://c.example", 1);
        let merged = store.commit(stale, push(c.clone())).await.unwrap().unwrap();

        assert_eq!(merged.version, 3);
        assert_eq!(merged.items, vec![a, b, c]);
        assert_eq!(store.read_all().await.unwrap(), merged);
    }

    #[tokio::test]
    async fn test_commit_does_not_clobber_legacy_list() {
        let store = store();
        store
            .area()
            .seed("savedItems", json!([{"id": "old", "url": "https://old.example"}]));

        let committed = store
            .commit(Snapshot::empty(), push(item("1", "https://new.example", 0)))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(committed.items.len(), 2);
        assert_eq!(committed.items[0].id, "old");
    }

    #[tokio::test]
    async fn test_commit_gives_up_when_base_never_matches() {
        let store = ListStore::new(
            MemoryStorage::new(),
            SyncConfig::default().with_max_commit_attempts(2),
        );
        store.write_all(&Snapshot::new(7, Vec::new())).await.unwrap();

        // A mutation that rewrites the store itself keeps invalidating the base
        let area = store.area().clone();
        let mut bump = 7;
        let result = store
            .commit(Snapshot::empty(), move |items| {
                bump += 1;
                area.seed("savedItems", json!({"version": bump, "items": []}));
                Some(items.to_vec())
            })
            .await;

        assert_eq!(result, Err(SyncError::Conflict { attempts: 2 }));
    }

    #[tokio::test]
    async fn test_append_returns_item_from_winning_attempt() {
        let store = store();
        store
            .write_all(&Snapshot::new(2, vec![item("a", "https://a.example", 4)]))
            .await
            .unwrap();

        // Base is stale, so the position must come from the fresh list
        let (committed, appended) = store
            .append(Snapshot::empty(), |items| {
                item("b", "https://b.example", crate::saved_item::next_position(items))
            })
            .await
            .unwrap();

        assert_eq!(appended, item("b", "https://b.example", 5));
        assert_eq!(committed.version, 3);
        assert_eq!(committed.items.last(), Some(&appended));
    }

    #[tokio::test]
    async fn test_append_storage_unavailable() {
        let store = store();
        store.area().set_available(false);

        let result = store
            .append(Snapshot::empty(), |_| item("a", "https://a.example", 0))
            .await;

        assert!(matches!(result, Err(SyncError::StorageUnavailable(_))));
    }
}
