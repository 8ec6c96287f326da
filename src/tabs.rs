/// Tab query contract

use crate::error::{Result, SyncError};
use serde::{Deserialize, Serialize};

/// The parts of a browser tab the store cares about
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TabDescriptor {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

impl TabDescriptor {
    pub fn with_url(url: impl Into<String>) -> Self {
        TabDescriptor {
            url: Some(url.into()),
            title: None,
        }
    }
}

/// Supplies the active tab of the current window
#[allow(async_fn_in_trait)]
pub trait TabSource {
    async fn active_tab(&self) -> Result<Option<TabDescriptor>>;
}

/// Pick the url to save out of a tab query result
pub fn url_to_save(tab: Option<TabDescriptor>) -> Result<String> {
    let tab = tab.ok_or(SyncError::MissingActiveTab)?;
    match tab.url {
        Some(url) if !url.trim().is_empty() => Ok(url),
        _ => Err(SyncError::MissingTabUrl),
    }
}

/// A tab source that always answers with the same tab
#[derive(Debug, Clone, Default)]
pub struct FixedTab(pub Option<TabDescriptor>);

impl TabSource for FixedTab {
    async fn active_tab(&self) -> Result<Option<TabDescriptor>> {
        Ok(self.0.clone())
    }
}
