//! Persisted key-value storage for the session.
//!
//! The controller never touches a global: it is handed a [`KeyValueStore`]
//! and performs every multi-key update as one [`WriteBatch`], so a failed
//! write leaves the previous session fully intact.
//!
//! ```rust,ignore
//! use casdoor_session::store::{KeyValueStore, MemoryStore, WriteBatch};
//!
//! let store = MemoryStore::default();
//! store.apply(WriteBatch::new().set("access_token", "abc").remove("oauth_state"))?;
//! assert_eq!(store.get("access_token").as_deref(), Some("abc"));
//! ```

#[cfg(feature = "file-store")]
mod file;
mod memory;

#[cfg(feature = "file-store")]
pub use file::FileStore;
pub use memory::MemoryStore;

/// Key holding the bearer token.
pub const ACCESS_TOKEN_KEY: &str = "access_token";
/// Key holding the method that produced the token.
pub const AUTH_METHOD_KEY: &str = "auth_method";
/// Key holding the state of a pending OAuth redirect.
pub const OAUTH_STATE_KEY: &str = "oauth_state";
/// Key holding the state of a pending Microsoft redirect.
pub const MICROSOFT_STATE_KEY: &str = "microsoft_state";

/// Every key the controller owns.
pub const SESSION_KEYS: [&str; 4] = [
    ACCESS_TOKEN_KEY,
    AUTH_METHOD_KEY,
    OAUTH_STATE_KEY,
    MICROSOFT_STATE_KEY,
];

/// Persistence failure.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt session file {path}: {source}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// One pending mutation of a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    Set(String),
    Remove,
}

/// An ordered set of key mutations applied all-or-nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[must_use]
pub struct WriteBatch {
    ops: Vec<(String, WriteOp)>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.ops.push((key.into(), WriteOp::Set(value.into())));
        self
    }

    pub fn remove(mut self, key: impl Into<String>) -> Self {
        self.ops.push((key.into(), WriteOp::Remove));
        self
    }

    /// Removes every session key.
    pub fn clear_session() -> Self {
        SESSION_KEYS
            .into_iter()
            .fold(Self::new(), |batch, key| batch.remove(key))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> impl Iterator<Item = (&str, &WriteOp)> {
        self.ops.iter().map(|(k, op)| (k.as_str(), op))
    }

    /// Applies the batch to a map in order.
    pub fn apply_to(&self, map: &mut std::collections::HashMap<String, String>) {
        for (key, op) in self.ops() {
            match op {
                WriteOp::Set(value) => {
                    map.insert(key.to_string(), value.clone());
                }
                WriteOp::Remove => {
                    map.remove(key);
                }
            }
        }
    }
}

/// String key-value storage scoped to one client.
///
/// Reads are infallible: implementations serve them from memory.
///
/// # Example
///
/// ```rust,ignore
/// struct CookieStore { jar: Mutex<HashMap<String, String>> }
///
/// impl KeyValueStore for CookieStore {
///     fn get(&self, key: &str) -> Option<String> {
///         self.jar.lock().get(key).cloned()
///     }
///
///     fn apply(&self, batch: WriteBatch) -> Result<(), StoreError> {
///         batch.apply_to(&mut self.jar.lock());
///         Ok(())
///     }
/// }
/// ```
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    /// Applies every operation of `batch`, or none of them on error.
    fn apply(&self, batch: WriteBatch) -> Result<(), StoreError>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for std::sync::Arc<T> {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }

    fn apply(&self, batch: WriteBatch) -> Result<(), StoreError> {
        (**self).apply(batch)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn batch_applies_in_order() {
        let mut map = HashMap::new();
        WriteBatch::new()
            .set("a", "1")
            .set("b", "2")
            .remove("a")
            .set("b", "3")
            .apply_to(&mut map);

        assert_eq!(map.get("a"), None);
        assert_eq!(map.get("b").map(String::as_str), Some("3"));
    }

    #[test]
    fn clear_session_removes_all_owned_keys() {
        let batch = WriteBatch::clear_session();
        let keys: Vec<&str> = batch.ops().map(|(k, _)| k).collect();
        assert_eq!(keys, SESSION_KEYS);
        assert!(batch.ops().all(|(_, op)| *op == WriteOp::Remove));
    }

    #[test]
    fn clear_session_leaves_foreign_keys() {
        let mut map = HashMap::from([
            ("access_token".to_string(), "t".to_string()),
            ("theme".to_string(), "dark".to_string()),
        ]);
        WriteBatch::clear_session().apply_to(&mut map);
        assert_eq!(map.len(), 1);
        assert!(map.contains_key("theme"));
    }
}
