//! Per-publish key/value side-channel.
//!
//! Collaborators (an embedded interpreter, a tracing bridge) attach values for the
//! duration of one publish; the map is cleared when the context returns to its pool.

use std::any::Any;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

type Value = Arc<dyn Any + Send + Sync>;

/// String-keyed, type-erased values shared by everything handling one publish.
///
/// Interior mutability lets subscribers (which only see `&PublishContext`) write too.
#[derive(Default)]
pub struct Extensions {
    map: Mutex<HashMap<Cow<'static, str>, Value>>,
}

impl Extensions {
    /// Stores `value` under `key`, returning whether a previous value was replaced.
    pub fn insert<V>(&self, key: impl Into<Cow<'static, str>>, value: V) -> bool
    where
        V: Any + Send + Sync,
    {
        self.map.lock().insert(key.into(), Arc::new(value)).is_some()
    }

    /// Returns the value under `key` if it exists and is a `V`.
    pub fn get<V>(&self, key: &str) -> Option<Arc<V>>
    where
        V: Any + Send + Sync,
    {
        let value = self.map.lock().get(key).cloned()?;
        value.downcast::<V>().ok()
    }

    /// Removes the value under `key`; returns `true` if one was present.
    pub fn remove(&self, key: &str) -> bool {
        self.map.lock().remove(key).is_some()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.map.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.map.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.lock().is_empty()
    }

    /// Drops every value; capacity is kept for reuse.
    pub fn clear(&self) {
        self.map.lock().clear();
    }
}

impl fmt::Debug for Extensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let map = self.map.lock();
        f.debug_set().entries(map.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_get() {
        let ext = Extensions::default();
        assert!(!ext.insert("depth", 3usize));
        assert_eq!(ext.get::<usize>("depth").as_deref(), Some(&3));
        assert!(ext.get::<String>("depth").is_none());
        assert!(ext.get::<usize>("missing").is_none());
    }

    #[test]
    fn test_replace_remove_clear() {
        let ext = Extensions::default();
        ext.insert(String::from("script"), "a");
        assert!(ext.insert("script", "b"));
        assert_eq!(ext.get::<&str>("script").as_deref(), Some(&"b"));
        assert_eq!(ext.len(), 1);

        assert!(ext.remove("script"));
        assert!(!ext.remove("script"));

        ext.insert("x", 1u8);
        ext.clear();
        assert!(ext.is_empty());
    }
}
