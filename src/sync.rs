/// Per-view list synchronizer.
///
/// Each view (popup instance, background page) owns one `ListSynchronizer`.
/// Its working copy is only ever replaced wholesale by a `Snapshot`, whether the
/// snapshot comes from this view's own commit or from a storage notification.
use crate::error::{Result, SyncError};
use crate::list_store::ListStore;
use crate::saved_item::{NewSavedItem, SavedItem, Snapshot, next_position};
use crate::storage::{StorageArea, Subscription};
use crate::tabs::{TabSource, url_to_save};
use log::{debug, warn};
use std::cell::RefCell;
use std::rc::{Rc, Weak};

#[derive(Debug, Clone, PartialEq)]
pub enum SyncState {
    /// No working copy yet (not the same as an empty list)
    Uninitialized,
    Ready(Snapshot),
    TornDown,
}

type Observer = Rc<dyn Fn(&[SavedItem])>;

struct ViewState {
    state: SyncState,
    observers: Vec<Observer>,
    /// Store notifications received so far
    notifications: u64,
}

pub struct ListSynchronizer<S: StorageArea> {
    store: Rc<ListStore<S>>,
    view: Rc<RefCell<ViewState>>,
    subscription: RefCell<Option<Subscription>>,
}

impl<S: StorageArea> ListSynchronizer<S> {
    pub fn new(store: Rc<ListStore<S>>) -> Self {
        ListSynchronizer {
            store,
            view: Rc::new(RefCell::new(ViewState {
                state: SyncState::Uninitialized,
                observers: Vec::new(),
                notifications: 0,
            })),
            subscription: RefCell::new(None),
        }
    }

    pub fn state(&self) -> SyncState {
        self.view.borrow().state.clone()
    }

    pub fn working_copy(&self) -> Option<Vec<SavedItem>> {
        match &self.view.borrow().state {
            SyncState::Ready(snapshot) => Some(snapshot.items.clone()),
            _ => None,
        }
    }

    /// Register a callback that receives every new working copy
    pub fn observe(&self, observer: impl Fn(&[SavedItem]) + 'static) {
        self.view.borrow_mut().observers.push(Rc::new(observer));
    }

    /// Start watching the store, then load the current list.
    pub async fn mount(&self) -> Result<()> {
        self.ensure_live()?;
        self.ensure_subscribed();

        let snapshot = self.store.read_all().await?;
        debug!("Loaded {} saved item(s)", snapshot.items.len());
        replace(&self.view, snapshot);
        Ok(())
    }

    /// Append a new item and persist the list.
    ///
    /// The working copy only changes once the write has gone through.
    pub async fn save_item(&self, candidate: NewSavedItem) -> Result<SavedItem> {
        let base = self.base()?.unwrap_or_default();
        self.ensure_subscribed();

        let id = candidate.resolve_id();
        let url = candidate.url;
        let seen = self.notifications();

        let (committed, saved) = self
            .store
            .append(base, |items| SavedItem {
                id: id.clone(),
                url: url.clone(),
                position: next_position(items),
            })
            .await?;

        apply_committed(&self.view, committed, seen);
        Ok(saved)
    }

    /// Save whatever the active tab is showing. A missing tab or url abandons the
    /// save with a warning and returns `Ok(None)`.
    pub async fn save_active_tab<T: TabSource>(&self, tabs: &T) -> Result<Option<SavedItem>> {
        self.ensure_live()?;

        let url = match url_to_save(tabs.active_tab().await?) {
            Ok(url) => url,
            Err(e @ (SyncError::MissingActiveTab | SyncError::MissingTabUrl)) => {
                warn!("Not saving: {}", e);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        self.save_item(NewSavedItem::new(url)).await.map(Some)
    }

    /// Remove every item sharing the target's id. Returns whether anything was removed.
    pub async fn delete_item(&self, target: &SavedItem) -> Result<bool> {
        let Some(base) = self.base()? else {
            debug!("Delete before the list was loaded; nothing to remove");
            return Ok(false);
        };
        self.ensure_subscribed();
        let seen = self.notifications();

        let committed = self
            .store
            .commit(base, |items| {
                if !items.iter().any(|item| item.id == target.id) {
                    return None;
                }
                Some(items.iter().filter(|item| item.id != target.id).cloned().collect())
            })
            .await?;

        match committed {
            Some(snapshot) => {
                apply_committed(&self.view, snapshot, seen);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Release the subscription and stop reacting to changes. Safe to call twice.
    pub fn teardown(&self) {
        if let Some(subscription) = self.subscription.borrow_mut().take() {
            subscription.unsubscribe();
        }

        let mut view = self.view.borrow_mut();
        view.state = SyncState::TornDown;
        view.observers.clear();
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription
            .borrow()
            .as_ref()
            .is_some_and(Subscription::is_active)
    }

    /// Any view holding a working copy must also be hearing about other writers
    fn ensure_subscribed(&self) {
        if self.subscription.borrow().is_some() {
            return;
        }

        let view = Rc::downgrade(&self.view);
        let subscription = self.store.subscribe(move |new_list, _old_list| {
            reconcile(&view, new_list);
        });
        *self.subscription.borrow_mut() = Some(subscription);
    }

    fn notifications(&self) -> u64 {
        self.view.borrow().notifications
    }

    /// Snapshot mutations build on; `None` while the list has not loaded
    fn base(&self) -> Result<Option<Snapshot>> {
        match &self.view.borrow().state {
            SyncState::Uninitialized => Ok(None),
            SyncState::Ready(snapshot) => Ok(Some(snapshot.clone())),
            SyncState::TornDown => Err(SyncError::TornDown),
        }
    }

    fn ensure_live(&self) -> Result<()> {
        match self.view.borrow().state {
            SyncState::TornDown => Err(SyncError::TornDown),
            _ => Ok(()),
        }
    }
}

impl<S: StorageArea> Drop for ListSynchronizer<S> {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Store notifications always win: whatever the store says now is the working copy
fn reconcile(view: &Weak<RefCell<ViewState>>, snapshot: Snapshot) {
    if let Some(view) = view.upgrade() {
        view.borrow_mut().notifications += 1;
        replace(&view, snapshot);
    }
}

/// A commit result is only used if no notification arrived while it was in flight.
/// Otherwise the notification stream is already at least as new, and the echo of
/// this write is on its way through it.
fn apply_committed(view: &Rc<RefCell<ViewState>>, snapshot: Snapshot, seen: u64) {
    let notified = view.borrow().notifications;
    if notified != seen {
        debug!(
            "Not applying committed version {}; {} notification(s) arrived meanwhile",
            snapshot.version,
            notified - seen
        );
        return;
    }
    replace(view, snapshot);
}

/// The single place a working copy gets replaced
fn replace(view: &Rc<RefCell<ViewState>>, snapshot: Snapshot) {
    let (observers, items) = {
        let mut view = view.borrow_mut();
        if view.state == SyncState::TornDown {
            return;
        }
        let items = snapshot.items.clone();
        view.state = SyncState::Ready(snapshot);
        (view.observers.clone(), items)
    };

    for observer in observers {
        observer(&items);
    }
}
