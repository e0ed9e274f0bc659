//! In-memory session store.
//!
//! A [`DashMap`] keyed by session id. Sessions are ephemeral and
//! single-process; entries are evicted after a bounded idle period that
//! matches the temp-upload cleanup horizon, so a session never outlives its
//! source document. All mutation is whole-session replace-or-create — no
//! partial field mutation is ever visible to other readers.

use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::session::Session;

/// Default idle eviction horizon: 30 minutes.
pub const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(30 * 60);

struct Entry {
    session: Session,
    touched: Instant,
}

pub struct SessionStore {
    entries: DashMap<String, Entry>,
    idle_ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_IDLE_TTL)
    }
}

impl SessionStore {
    pub fn new(idle_ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            idle_ttl,
        }
    }

    /// Store a new session, returning its id.
    pub fn insert(&self, session: Session) -> String {
        let id = session.id.clone();
        self.entries.insert(
            id.clone(),
            Entry {
                session,
                touched: Instant::now(),
            },
        );
        id
    }

    /// Fetch a clone of the session and refresh its idle timer.
    /// Expired entries are dropped on access.
    pub fn get(&self, id: &str) -> Option<Session> {
        let mut entry = self.entries.get_mut(id)?;
        if entry.touched.elapsed() > self.idle_ttl {
            drop(entry);
            self.entries.remove(id);
            tracing::debug!(session = id, "evicted idle session on access");
            return None;
        }
        entry.touched = Instant::now();
        Some(entry.session.clone())
    }

    /// Replace a session wholesale (the only update primitive).
    pub fn replace(&self, session: Session) {
        self.insert(session);
    }

    pub fn remove(&self, id: &str) -> Option<Session> {
        self.entries.remove(id).map(|(_, e)| e.session)
    }

    /// Drop every entry past the idle horizon. Returns how many were evicted.
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| e.touched.elapsed() <= self.idle_ttl);
        let evicted = before - self.entries.len();
        if evicted > 0 {
            tracing::info!(evicted, "purged idle sessions");
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Field;

    fn session() -> Session {
        Session::new(vec![Field::new("Name")], None)
    }

    #[test]
    fn insert_get_remove_round_trip() {
        let store = SessionStore::default();
        let id = store.insert(session());
        assert!(store.get(&id).is_some());
        assert!(store.remove(&id).is_some());
        assert!(store.get(&id).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn get_unknown_id_is_none() {
        let store = SessionStore::default();
        assert!(store.get("sess_missing").is_none());
    }

    #[test]
    fn replace_overwrites_values() {
        let store = SessionStore::default();
        let mut s = session();
        let id = store.insert(s.clone());

        s.values.insert("Name".into(), "Max".into());
        s.cursor = 1;
        store.replace(s);

        let got = store.get(&id).unwrap();
        assert_eq!(got.values.get("Name").map(String::as_str), Some("Max"));
        assert_eq!(got.cursor, 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn idle_entries_expire() {
        let store = SessionStore::new(Duration::from_millis(10));
        let id = store.insert(session());
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(store.purge_expired(), 1);
        assert!(store.get(&id).is_none());
    }

    #[test]
    fn expired_entry_dropped_on_access() {
        let store = SessionStore::new(Duration::from_millis(10));
        let id = store.insert(session());
        std::thread::sleep(Duration::from_millis(30));
        // No purge call; get() itself must refuse the stale entry.
        assert!(store.get(&id).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn get_refreshes_idle_timer() {
        let store = SessionStore::new(Duration::from_millis(50));
        let id = store.insert(session());
        for _ in 0..4 {
            std::thread::sleep(Duration::from_millis(20));
            assert!(store.get(&id).is_some(), "touch should keep entry alive");
        }
    }
}
