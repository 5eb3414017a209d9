//! Durable key-value storage seam
//!
//! In the browser this is `window.localStorage`; everywhere else an
//! in-memory map stands in for it.

use std::collections::HashMap;

use crate::error::StorageError;

/// String key-value store with `localStorage` semantics
pub trait KeyValueStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removing a missing key is not an error
    fn remove_item(&mut self, key: &str) -> Result<(), StorageError>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for &mut T {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get_item(key)
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set_item(key, value)
    }

    fn remove_item(&mut self, key: &str) -> Result<(), StorageError> {
        (**self).remove_item(key)
    }
}

/// In-memory store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStorage {
    items: HashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.items.contains_key(key)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MemoryStorage {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            items: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl KeyValueStore for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.items.get(key).cloned())
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> Result<(), StorageError> {
        self.items.remove(key);
        Ok(())
    }
}

#[cfg(all(target_arch = "wasm32", feature = "web"))]
pub use web::LocalStorage;

#[cfg(all(target_arch = "wasm32", feature = "web"))]
mod web {
    use wasm_bindgen::JsValue;

    use super::KeyValueStore;
    use crate::error::StorageError;

    /// `window.localStorage`
    pub struct LocalStorage {
        inner: web_sys::Storage,
    }

    impl LocalStorage {
        pub fn open() -> Result<Self, StorageError> {
            let window = web_sys::window()
                .ok_or_else(|| StorageError::Unavailable("No window".to_string()))?;
            let inner = window
                .local_storage()
                .map_err(|e| StorageError::Unavailable(describe(&e)))?
                .ok_or_else(|| StorageError::Unavailable("No localStorage".to_string()))?;
            Ok(Self { inner })
        }
    }

    fn describe(value: &JsValue) -> String {
        value.as_string().unwrap_or_else(|| format!("{value:?}"))
    }

    impl KeyValueStore for LocalStorage {
        fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.inner.get_item(key).map_err(|e| StorageError::Read {
                key: key.to_string(),
                reason: describe(&e),
            })
        }

        fn set_item(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
            // Throws on quota exhaustion
            self.inner.set_item(key, value).map_err(|e| StorageError::Write {
                key: key.to_string(),
                reason: describe(&e),
            })
        }

        fn remove_item(&mut self, key: &str) -> Result<(), StorageError> {
            self.inner.remove_item(key).map_err(|e| StorageError::Write {
                key: key.to_string(),
                reason: describe(&e),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_storage_roundtrip() {
        let mut storage = MemoryStorage::new();
        assert_eq!(storage.get_item("k").unwrap(), None);

        storage.set_item("k", "v").unwrap();
        assert_eq!(storage.get_item("k").unwrap().as_deref(), Some("v"));

        storage.remove_item("k").unwrap();
        storage.remove_item("k").unwrap();
        assert!(storage.is_empty());
    }

    #[test]
    fn test_memory_storage_from_pairs() {
        let storage: MemoryStorage = [("a", "1"), ("b", "2")].into_iter().collect();
        assert_eq!(storage.len(), 2);
        assert!(storage.contains_key("b"));
    }
}
