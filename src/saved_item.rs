/// Data structures for saved items and the persisted list

use crate::error::{Result, SyncError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A bookmarked resource
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SavedItem {
    pub id: String,
    pub url: String,
    pub position: u32,
}

/// Fields supplied by the caller when saving; the rest are assigned on commit
#[derive(Debug, Clone, PartialEq)]
pub struct NewSavedItem {
    pub url: String,
    pub id: Option<String>,
}

impl NewSavedItem {
    pub fn new(url: impl Into<String>) -> Self {
        NewSavedItem {
            url: url.into(),
            id: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Resolve the id once so retries of the same save keep the same identity
    pub(crate) fn resolve_id(&self) -> String {
        self.id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string())
    }
}

/// The persisted list together with its optimistic-concurrency token.
///
/// `version` is bumped on every versioned write. Version 0 means the value
/// was never written by a versioned writer (missing key or a legacy array).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Snapshot {
    pub version: u64,
    pub items: Vec<SavedItem>,
}

impl Snapshot {
    pub fn empty() -> Self {
        Snapshot::default()
    }

    pub fn new(version: u64, items: Vec<SavedItem>) -> Self {
        Snapshot { version, items }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn to_value(&self) -> Result<Value> {
        serde_json::to_value(self)
            .map_err(|e| SyncError::SchemaMismatch(format!("failed to serialize: {}", e)))
    }

    /// Decode whatever is stored under the collection key
    pub fn from_stored(value: Option<Value>) -> Result<Snapshot> {
        let value = match value {
            None | Some(Value::Null) => return Ok(Snapshot::empty()),
            Some(value) => value,
        };

        let (version, records) = match serde_json::from_value::<PersistedValue>(value) {
            Ok(PersistedValue::Versioned { version, items }) => (version, items),
            Ok(PersistedValue::Bare(items)) => (0, items),
            Err(e) => {
                return Err(SyncError::SchemaMismatch(format!(
                    "expected a list of saved items: {}",
                    e
                )));
            }
        };

        Ok(Snapshot {
            version,
            items: upgrade_records(records)?,
        })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PersistedValue {
    Versioned {
        version: u64,
        items: Vec<StoredRecord>,
    },
    Bare(Vec<StoredRecord>),
}

/// A stored record as any revision may have written it
#[derive(Debug, Deserialize)]
struct StoredRecord {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    position: Option<f64>,
}

/// Bring records from older revisions up to the canonical shape.
///
/// Missing ids become `legacy-<index>` so every view derives the same identity.
/// Missing positions continue after the highest explicit one, in list order.
fn upgrade_records(records: Vec<StoredRecord>) -> Result<Vec<SavedItem>> {
    let mut explicit = Vec::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        explicit.push(match record.position {
            Some(p) => Some(position_from_number(index, p)?),
            None => None,
        });
    }

    let mut next = explicit
        .iter()
        .flatten()
        .max()
        .map_or(0, |max| max.saturating_add(1));

    let mut upgraded = 0;
    let mut items = Vec::with_capacity(records.len());

    for (index, (record, position)) in records.into_iter().zip(explicit).enumerate() {
        let url = record.url.ok_or_else(|| {
            SyncError::SchemaMismatch(format!("record {} has no url", index))
        })?;

        if record.id.is_none() || position.is_none() {
            upgraded += 1;
        }

        let position = position.unwrap_or_else(|| {
            let assigned = next;
            next = next.saturating_add(1);
            assigned
        });

        items.push(SavedItem {
            id: record.id.unwrap_or_else(|| format!("legacy-{}", index)),
            url,
            position,
        });
    }

    if upgraded > 0 {
        log::debug!("Upgraded {} saved item(s) from an older record shape", upgraded);
    }

    Ok(items)
}

fn position_from_number(index: usize, p: f64) -> Result<u32> {
    if p.is_finite() && p >= 0.0 && p.fract() == 0.0 && p <= u32::MAX as f64 {
        Ok(p as u32)
    } else {
        Err(SyncError::SchemaMismatch(format!(
            "record {} has invalid position {}",
            index, p
        )))
    }
}

/// Next free ordering hint: one past the current maximum, 0 for an empty list
pub fn next_position(items: &[SavedItem]) -> u32 {
    items
        .iter()
        .map(|item| item.position)
        .max()
        .map_or(0, |max| max.saturating_add(1))
}

/// Host part of a saved url for display, if it parses
pub fn host_label(url: &str) -> Option<String> {
    url::Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(|host| host.trim_start_matches("www.").to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(id: &str, url: &str, position: u32) -> SavedItem {
        SavedItem {
            id: id.to_string(),
            url: url.to_string(),
            position,
        }
    }

    #[test]
    fn test_missing_value_is_empty() {
        assert_eq!(Snapshot::from_stored(None).unwrap(), Snapshot::empty());
        assert_eq!(Snapshot::from_stored(Some(Value::Null)).unwrap(), Snapshot::empty());
    }

    #[test]
    fn test_versioned_value() {
        let value = json!({
            "version": 3,
            "items": [{"id": "1", "url": "https://timmo.dev", "position": 0}]
        });

        let snapshot = Snapshot::from_stored(Some(value)).unwrap();

        assert_eq!(snapshot.version, 3);
        assert_eq!(snapshot.items, vec![item("1", "https://timmo.dev", 0)]);
    }

    #[test]
    fn test_written_shape() {
        let snapshot = Snapshot::new(2, vec![item("1", "https://vitejs.dev", 4)]);

        assert_eq!(
            snapshot.to_value().unwrap(),
            json!({
                "version": 2,
                "items": [{"id": "1", "url": "https://vitejs.dev", "position": 4}]
            })
        );
    }

    #[test]
    fn test_bare_array_with_all_fields() {
        let value = json!([
            {"id": "1", "position": 0, "url": "https://timmo.dev"},
            {"id": "2", "position": 1, "url": "https://vitejs.dev"}
        ]);

        let snapshot = Snapshot::from_stored(Some(value)).unwrap();

        assert_eq!(snapshot.version, 0);
        assert_eq!(snapshot.items[1], item("2", "https://vitejs.dev", 1));
    }

    #[test]
    fn test_upgrade_id_only_records() {
        let value = json!([
            {"id": "a", "url": "https://a.example"},
            {"id": "b", "url": "https://b.example"}
        ]);

        let snapshot = Snapshot::from_stored(Some(value)).unwrap();

        assert_eq!(snapshot.items[0].position, 0);
        assert_eq!(snapshot.items[1].position, 1);
    }

    #[test]
    fn test_upgrade_position_only_records() {
        let value = json!([
            {"position": 4, "url": "https://a.example"},
            {"url": "https://b.example"},
            {"position": 2.0, "url": "https://c.example"}
        ]);

        let snapshot = Snapshot::from_stored(Some(value.clone())).unwrap();

        assert_eq!(
            snapshot.items,
            vec![
                item("legacy-0", "https://a.example", 4),
                item("legacy-1", "https://b.example", 5),
                item("legacy-2", "https://c.example", 2),
            ]
        );

        // Every view must derive the same identities
        assert_eq!(Snapshot::from_stored(Some(value)).unwrap(), snapshot);
    }

    #[test]
    fn test_record_without_url_is_rejected() {
        let value = json!([{"id": "1", "position": 0}]);

        match Snapshot::from_stored(Some(value)) {
            Err(SyncError::SchemaMismatch(msg)) => assert!(msg.contains("record 0")),
            other => panic!("expected schema mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_position_is_rejected() {
        let value = json!([{"id": "1", "url": "https://a.example", "position": -1}]);
        assert!(matches!(
            Snapshot::from_stored(Some(value)),
            Err(SyncError::SchemaMismatch(_))
        ));

        let value = json!([{"id": "1", "url": "https://a.example", "position": 1.5}]);
        assert!(matches!(
            Snapshot::from_stored(Some(value)),
            Err(SyncError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_non_list_is_rejected() {
        assert!(matches!(
            Snapshot::from_stored(Some(json!("https://a.example"))),
            Err(SyncError::SchemaMismatch(_))
        ));
        assert!(matches!(
            Snapshot::from_stored(Some(json!([{"url": 7}]))),
            Err(SyncError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_next_position() {
        assert_eq!(next_position(&[]), 0);
        assert_eq!(
            next_position(&[item("1", "https://a", 3), item("2", "https://b", 1)]),
            4
        );
    }

    #[test]
    fn test_new_saved_item_ids() {
        assert_eq!(NewSavedItem::new("https://a").with_id("1").resolve_id(), "1");

        let generated = NewSavedItem::new("https://a").resolve_id();
        assert!(Uuid::parse_str(&generated).is_ok());
    }

    #[test]
    fn test_host_label() {
        assert_eq!(host_label("https://www.timmo.dev/posts"), Some("timmo.dev".to_string()));
        assert_eq!(host_label("https://vitejs.dev"), Some("vitejs.dev".to_string()));
        assert_eq!(host_label("not a url"), None);
    }
}
