use crate::esmp::identity::normalize_name;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Process-local state shared by every reconcile and archive call.
///
/// Titles are keyed in NFC. `in_flight` holds at most one entry per title;
/// a second trigger for a busy title is dropped, not queued.
#[derive(Debug, Default)]
pub struct SyncSession {
    in_flight: Mutex<BTreeSet<String>>,
    titles: Mutex<BTreeMap<String, String>>,
}

#[derive(Debug)]
pub struct TitleGuard<'a> {
    session: &'a SyncSession,
    title: String,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SyncSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Non-blocking acquire. `None` means the title is already in flight.
    pub fn try_acquire(&self, title: &str) -> Option<TitleGuard<'_>> {
        let title = normalize_name(title);
        if !lock(&self.in_flight).insert(title.clone()) {
            return None;
        }
        Some(TitleGuard {
            session: self,
            title,
        })
    }

    pub fn is_in_flight(&self, title: &str) -> bool {
        lock(&self.in_flight).contains(&normalize_name(title))
    }

    pub fn remember(&self, title: &str, record_id: &str) {
        lock(&self.titles).insert(normalize_name(title), record_id.to_string());
    }

    pub fn record_id_for(&self, title: &str) -> Option<String> {
        lock(&self.titles).get(&normalize_name(title)).cloned()
    }

    pub fn forget(&self, title: &str) -> Option<String> {
        lock(&self.titles).remove(&normalize_name(title))
    }

    pub fn indexed_titles(&self) -> usize {
        lock(&self.titles).len()
    }

    pub fn reset_index(&self) {
        lock(&self.titles).clear();
    }
}

impl TitleGuard<'_> {
    pub fn title(&self) -> &str {
        &self.title
    }
}

impl Drop for TitleGuard<'_> {
    fn drop(&mut self) {
        lock(&self.session.in_flight).remove(&self.title);
    }
}

#[cfg(test)]
mod tests {
    use super::SyncSession;

    #[test]
    fn second_acquire_for_same_title_is_refused() {
        let session = SyncSession::new();
        let first = session.try_acquire("My Song");
        assert!(first.is_some());
        assert!(session.try_acquire("My Song").is_none());
        assert!(session.try_acquire("Other Song").is_some());
    }

    #[test]
    fn guard_release_on_drop() {
        let session = SyncSession::new();
        {
            let _guard = session.try_acquire("My Song").expect("acquire");
            assert!(session.is_in_flight("My Song"));
        }
        assert!(!session.is_in_flight("My Song"));
        assert!(session.try_acquire("My Song").is_some());
    }

    #[test]
    fn title_index_tracks_latest_record() {
        let session = SyncSession::new();
        session.remember("My Song", "page-1");
        session.remember("My Song", "page-2");
        assert_eq!(session.record_id_for("My Song").as_deref(), Some("page-2"));
        assert_eq!(session.forget("My Song").as_deref(), Some("page-2"));
        assert_eq!(session.record_id_for("My Song"), None);
    }

    #[test]
    fn index_keys_are_composed() {
        let session = SyncSession::new();
        session.remember("\u{1100}\u{1161}", "legacy");
        assert_eq!(session.record_id_for("\u{AC00}").as_deref(), Some("legacy"));
        let _guard = session.try_acquire("\u{AC00}").expect("acquire");
        assert!(session.try_acquire("\u{1100}\u{1161}").is_none());
    }
}
