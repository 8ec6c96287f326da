/// Popup UI for the Save for Later extension

use crate::chrome::{ChromeStorage, ChromeTabs};
use crate::config::SyncConfig;
use crate::list_store::ListStore;
use crate::saved_item::SavedItem;
use crate::sync::ListSynchronizer;
use crate::ui::components::SavedItemList;
use log::warn;
use patternfly_yew::prelude::*;
use std::rc::Rc;
use wasm_bindgen_futures::spawn_local;
use yew::prelude::*;

type PopupSync = ListSynchronizer<ChromeStorage>;

#[derive(Clone, PartialEq)]
enum AppState {
    Idle,
    Busy,
    Error(String),
}

#[function_component(App)]
pub fn app() -> Html {
    let state = use_state(|| AppState::Idle);
    // None until the first read lands
    let items = use_state(|| None::<Vec<SavedItem>>);
    let sync = use_mut_ref(|| None::<Rc<PopupSync>>);

    // Create the synchronizer on mount, tear it down on unmount
    {
        let state = state.clone();
        let items = items.clone();
        let sync = sync.clone();

        use_effect_with((), move |_| {
            let synchronizer = Rc::new(ListSynchronizer::new(Rc::new(ListStore::new(
                ChromeStorage,
                SyncConfig::default(),
            ))));

            {
                let items = items.clone();
                synchronizer.observe(move |list| items.set(Some(list.to_vec())));
            }
            *sync.borrow_mut() = Some(synchronizer.clone());

            let mounting = synchronizer.clone();
            spawn_local(async move {
                if let Err(e) = mounting.mount().await {
                    warn!("Failed to load saved items: {}", e);
                    state.set(AppState::Error(format!("Failed to load: {}", e)));
                }
            });

            move || {
                synchronizer.teardown();
                sync.borrow_mut().take();
            }
        });
    }

    let on_save = {
        let state = state.clone();
        let sync = sync.clone();

        Callback::from(move |_: MouseEvent| {
            let Some(synchronizer) = sync.borrow().clone() else {
                return;
            };
            let state = state.clone();

            state.set(AppState::Busy);
            spawn_local(async move {
                match synchronizer.save_active_tab(&ChromeTabs).await {
                    Ok(_) => state.set(AppState::Idle),
                    Err(e) => {
                        warn!("Failed to save tab: {}", e);
                        state.set(AppState::Error(format!("Failed to save: {}", e)));
                    }
                }
            });
        })
    };

    let on_remove = {
        let state = state.clone();
        let sync = sync.clone();

        Callback::from(move |item: SavedItem| {
            let Some(synchronizer) = sync.borrow().clone() else {
                return;
            };
            let state = state.clone();

            state.set(AppState::Busy);
            spawn_local(async move {
                match synchronizer.delete_item(&item).await {
                    Ok(_) => state.set(AppState::Idle),
                    Err(e) => {
                        warn!("Failed to remove {}: {}", item.url, e);
                        state.set(AppState::Error(format!("Failed to remove: {}", e)));
                    }
                }
            });
        })
    };

    let is_busy = matches!(*state, AppState::Busy);

    html! {
        <main class="popup">
            <h1 class="popup-title">{"Save for Later"}</h1>
            <p class="popup-subtitle">{"Save articles, videos, and more to view later."}</p>

            <section class="save-section">
                <Button onclick={on_save} disabled={is_busy} variant={ButtonVariant::Primary}>
                    {"Save for later"}
                </Button>
            </section>

            if let AppState::Error(err) = &*state {
                <Alert r#type={AlertType::Danger} title={"Error"} inline={true}>
                    {err.clone()}
                </Alert>
            }

            <hr class="popup-separator" />

            <section class="saved-section">
                <h2 class="saved-title">{"Saved Items"}</h2>
                {match &*items {
                    None => html! {
                        <div class="loading-text-center">
                            <Spinner />
                        </div>
                    },
                    Some(list) => html! {
                        <SavedItemList items={list.clone()} on_remove={on_remove} disabled={is_busy} />
                    },
                }}
            </section>
        </main>
    }
}
