//! Per-visitor values, keyed by the session cookie id.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use kstring::KString;

pub trait SessionStore: Debug + Send + Sync {
    fn get(&self, sid: &str, key: &str) -> Option<String>;
    fn set(&self, sid: &str, key: &str, value: String);
    fn remove(&self, sid: &str, key: &str);
}

#[derive(Debug)]
struct SessionData {
    last_access: Instant,
    values: HashMap<KString, String>,
}

/// Keeps sessions in process memory; sessions not accessed for
/// `timeout` are dropped.
#[derive(Debug)]
pub struct MemorySessionStore {
    timeout: Duration,
    sessions: Mutex<HashMap<KString, SessionData>>,
}

impl MemorySessionStore {
    pub fn new(timeout: Duration) -> Self {
        MemorySessionStore {
            timeout,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn with_session<T>(&self, sid: &str, f: impl FnOnce(&mut SessionData) -> T) -> T {
        // Only single map operations happen under the lock.
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        let timeout = self.timeout;
        sessions.retain(|_, s| now.duration_since(s.last_access) < timeout);
        let data = sessions.entry(KString::from_ref(sid)).or_insert_with(
            || SessionData { last_access: now, values: HashMap::new() });
        data.last_access = now;
        f(data)
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, sid: &str, key: &str) -> Option<String> {
        self.with_session(sid, |s| s.values.get(key).cloned())
    }

    fn set(&self, sid: &str, key: &str, value: String) {
        self.with_session(sid, |s| {
            s.values.insert(KString::from_ref(key), value);
        })
    }

    fn remove(&self, sid: &str, key: &str) {
        self.with_session(sid, |s| {
            s.values.remove(key);
        })
    }
}

/// The session of the current request.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: KString,
    store: Arc<dyn SessionStore>,
}

impl SessionHandle {
    pub fn new(id: &str, store: Arc<dyn SessionStore>) -> Self {
        SessionHandle { id: KString::from_ref(id), store }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.store.get(&self.id, key)
    }

    pub fn set(&self, key: &str, value: impl Into<String>) {
        self.store.set(&self.id, key, value.into())
    }

    pub fn remove(&self, key: &str) {
        self.store.remove(&self.id, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn t_sessions_are_separate() {
        let store: Arc<dyn SessionStore> = Arc::new(
            MemorySessionStore::new(Duration::from_secs(60)));
        let a = SessionHandle::new("a", store.clone());
        let b = SessionHandle::new("b", store);
        a.set("user", "alice");
        assert_eq!(a.get("user").as_deref(), Some("alice"));
        assert_eq!(b.get("user"), None);
        a.remove("user");
        assert_eq!(a.get("user"), None);
    }

    #[test]
    fn t_timeout() {
        let store = MemorySessionStore::new(Duration::from_secs(0));
        store.set("a", "k", "v".into());
        assert_eq!(store.get("a", "k"), None);
        assert_eq!(store.len(), 1);
    }
}
