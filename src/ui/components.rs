/// Reusable UI components

use crate::saved_item::{SavedItem, host_label};
use patternfly_yew::prelude::*;
use yew::prelude::*;

#[derive(Properties, PartialEq)]
pub struct SavedItemRowProps {
    pub item: SavedItem,
    pub on_remove: Callback<SavedItem>,
    #[prop_or(false)]
    pub disabled: bool,
}

#[function_component(SavedItemRow)]
pub fn saved_item_row(props: &SavedItemRowProps) -> Html {
    let on_click = {
        let item = props.item.clone();
        props.on_remove.reform(move |_: MouseEvent| item.clone())
    };

    html! {
        <li class="saved-item">
            <div class="saved-item-text">
                if let Some(host) = host_label(&props.item.url) {
                    <span class="saved-item-host">{host}</span>
                }
                <a
                    class="saved-item-link"
                    href={props.item.url.clone()}
                    referrerpolicy="no-referrer"
                    target="_blank"
                >
                    {&props.item.url}
                </a>
            </div>
            <Button onclick={on_click} disabled={props.disabled} variant={ButtonVariant::Secondary}>
                {"Remove"}
            </Button>
        </li>
    }
}

#[derive(Properties, PartialEq)]
pub struct SavedItemListProps {
    pub items: Vec<SavedItem>,
    pub on_remove: Callback<SavedItem>,
    #[prop_or(false)]
    pub disabled: bool,
}

#[function_component(SavedItemList)]
pub fn saved_item_list(props: &SavedItemListProps) -> Html {
    if props.items.is_empty() {
        return html! {
            <p class="empty-text">{"You have no saved items."}</p>
        };
    }

    html! {
        <ul class="saved-items">
            {for props.items.iter().enumerate().map(|(index, item)| html! {
                // Upgraded legacy lists may repeat ids
                <SavedItemRow
                    key={format!("{}-{}", item.id, index)}
                    item={item.clone()}
                    on_remove={props.on_remove.clone()}
                    disabled={props.disabled}
                />
            })}
        </ul>
    }
}
