use std::sync::Arc;

use tracing::warn;
use uuid::Uuid;

use crate::error::StorageError;
use crate::state::{HistoryEntry, ProcessingRequest, ProcessingResult};
use crate::storage::{Storage, HISTORY_KEY};

pub const MAX_HISTORY_ENTRIES: usize = 50;

/// Capped, newest-first log of completed requests.
#[derive(Clone)]
pub struct HistoryStore {
    storage: Arc<dyn Storage>,
    limit: usize,
}

fn decode(raw: Option<String>) -> Vec<HistoryEntry> {
    match raw {
        Some(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!("Discarding unreadable history record: {}", e);
            Vec::new()
        }),
        None => Vec::new(),
    }
}

impl HistoryStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self::with_limit(storage, MAX_HISTORY_ENTRIES)
    }

    pub fn with_limit(storage: Arc<dyn Storage>, limit: usize) -> Self {
        Self {
            storage,
            limit: limit.max(1),
        }
    }

    /// Record a completed request at the head of the log and return the
    /// stored entry.
    pub fn append(
        &self,
        request: &ProcessingRequest,
        result: &ProcessingResult,
    ) -> Result<HistoryEntry, StorageError> {
        let entry = HistoryEntry {
            id: Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            original_text: request.text.clone(),
            translated_text: result.translated_text.clone(),
            terms: result.terms.clone(),
            context_note: result.context_note.clone(),
            mode: request.mode,
            style: request.style,
        };

        let mut encode_error = None;
        let limit = self.limit;
        let new_entry = entry.clone();
        self.storage.update(HISTORY_KEY, &mut |raw| {
            let mut entries = decode(raw.clone());
            entries.insert(0, new_entry.clone());
            entries.truncate(limit);
            match serde_json::to_string(&entries) {
                Ok(json) => Some(json),
                Err(e) => {
                    encode_error = Some(e);
                    raw
                }
            }
        })?;

        if let Some(e) = encode_error {
            return Err(StorageError::Encode(e));
        }
        Ok(entry)
    }

    /// Current entries, newest first. Missing or corrupt data reads as empty.
    pub fn list(&self) -> Vec<HistoryEntry> {
        match self.storage.get_item(HISTORY_KEY) {
            Ok(raw) => decode(raw),
            Err(e) => {
                warn!("Failed to read history: {}", e);
                Vec::new()
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<HistoryEntry> {
        self.list().into_iter().find(|entry| entry.id == id)
    }

    /// Drop one entry and return what remains. Unknown ids leave the list as is.
    pub fn remove(&self, id: &str) -> Result<Vec<HistoryEntry>, StorageError> {
        let mut remaining = Vec::new();
        let mut encode_error = None;
        self.storage.update(HISTORY_KEY, &mut |raw| {
            let mut entries = decode(raw.clone());
            entries.retain(|entry| entry.id != id);
            remaining = entries.clone();
            match serde_json::to_string(&entries) {
                Ok(json) => Some(json),
                Err(e) => {
                    encode_error = Some(e);
                    raw
                }
            }
        })?;

        if let Some(e) = encode_error {
            return Err(StorageError::Encode(e));
        }
        Ok(remaining)
    }

    pub fn clear(&self) -> Result<(), StorageError> {
        self.storage.remove_item(HISTORY_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::{Mode, Style};
    use crate::storage::MemoryStorage;

    fn store() -> (Arc<MemoryStorage>, HistoryStore) {
        let storage = Arc::new(MemoryStorage::new());
        let history = HistoryStore::new(storage.clone());
        (storage, history)
    }

    fn result(text: &str) -> ProcessingResult {
        ProcessingResult {
            translated_text: text.to_string(),
            terms: Vec::new(),
            context_note: "note".to_string(),
        }
    }

    fn request(text: &str) -> ProcessingRequest {
        ProcessingRequest::new(text, Mode::Translation, Style::Academic)
    }

    #[test]
    fn append_prepends_and_returns_entry() {
        let (_, history) = store();
        let first = history.append(&request("a"), &result("A")).unwrap();
        let second = history.append(&request("b"), &result("B")).unwrap();

        let entries = history.list();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], second);
        assert_eq!(entries[1], first);
        assert_eq!(second.original_text, "b");
        assert_eq!(second.translated_text, "B");
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn fifty_first_append_evicts_oldest() {
        let (_, history) = store();
        for i in 0..51 {
            history
                .append(&request(&format!("text {}", i)), &result(&format!("out {}", i)))
                .unwrap();
        }

        let entries = history.list();
        assert_eq!(entries.len(), MAX_HISTORY_ENTRIES);
        assert_eq!(entries[0].original_text, "text 50");
        assert_eq!(entries[49].original_text, "text 1");
        assert!(entries.iter().all(|e| e.original_text != "text 0"));
    }

    #[test]
    fn remove_unknown_id_returns_list_unchanged() {
        let (_, history) = store();
        history.append(&request("a"), &result("A")).unwrap();
        history.append(&request("b"), &result("B")).unwrap();
        let before = history.list();

        let after = history.remove("not-an-id").unwrap();
        assert_eq!(after, before);
        assert_eq!(history.list(), before);
    }

    #[test]
    fn remove_filters_one_entry() {
        let (_, history) = store();
        let keep = history.append(&request("a"), &result("A")).unwrap();
        let drop = history.append(&request("b"), &result("B")).unwrap();

        let remaining = history.remove(&drop.id).unwrap();
        assert_eq!(remaining, vec![keep.clone()]);
        assert_eq!(history.get(&keep.id), Some(keep));
        assert_eq!(history.get(&drop.id), None);
    }

    #[test]
    fn clear_deletes_the_record() {
        let (storage, history) = store();
        history.append(&request("a"), &result("A")).unwrap();
        history.clear().unwrap();

        assert!(history.list().is_empty());
        assert_eq!(storage.get_item(HISTORY_KEY).unwrap(), None);
    }

    #[test]
    fn corrupt_record_reads_as_empty() {
        let (storage, history) = store();
        storage.set_item(HISTORY_KEY, "{not json").unwrap();
        assert!(history.list().is_empty());

        // and the next append replaces it with a valid list
        history.append(&request("a"), &result("A")).unwrap();
        assert_eq!(history.list().len(), 1);
    }

    #[test]
    fn entries_without_mode_default_to_translation() {
        let (storage, history) = store();
        storage
            .set_item(
                HISTORY_KEY,
                r#"[{"id":"1","timestamp":5,"originalText":"o","translatedText":"t","terms":[],"contextNote":"c"}]"#,
            )
            .unwrap();

        let entries = history.list();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].mode, Mode::Translation);
        assert_eq!(entries[0].style, Style::Academic);
    }
}
