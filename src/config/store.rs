//! Host configuration store.
//!
//! The injector writes resolved secrets into a [`ConfigStore`]. Keys are
//! dotted paths (`services.mailgun.secret`); a `None` write is an explicit
//! unset and stores JSON `null`.

use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::fmt;

/// Key/value view of the host application's runtime configuration.
pub trait ConfigStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;

    fn set(&self, key: &str, value: Option<String>);
}

/// [`ConfigStore`] over an in-memory JSON tree.
#[derive(Default)]
pub struct JsonConfigStore {
    root: RwLock<Value>,
}

impl JsonConfigStore {
    pub fn new() -> Self {
        Self::from_value(Value::Object(Map::new()))
    }

    /// Seed the store with an existing document. Non-object documents are
    /// replaced by an empty object.
    pub fn from_value(value: Value) -> Self {
        let root = if value.is_object() { value } else { Value::Object(Map::new()) };
        Self { root: RwLock::new(root) }
    }

    /// Copy of the whole tree.
    pub fn snapshot(&self) -> Value {
        self.root.read().clone()
    }

    /// Convenience for reading a string leaf.
    pub fn get_str(&self, key: &str) -> Option<String> {
        self.get(key).and_then(|v| v.as_str().map(str::to_string))
    }
}

impl fmt::Debug for JsonConfigStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let top_level: Vec<String> = match &*self.root.read() {
            Value::Object(map) => map.keys().cloned().collect(),
            _ => Vec::new(),
        };
        f.debug_struct("JsonConfigStore").field("keys", &top_level).finish()
    }
}

impl ConfigStore for JsonConfigStore {
    fn get(&self, key: &str) -> Option<Value> {
        let root = self.root.read();
        key.split('.').try_fold(&*root, |node, segment| node.get(segment)).cloned()
    }

    fn set(&self, key: &str, value: Option<String>) {
        let value = value.map(Value::String).unwrap_or(Value::Null);
        let mut root = self.root.write();

        let mut segments: Vec<&str> = key.split('.').collect();
        let Some(leaf) = segments.pop() else {
            return;
        };

        let mut node = &mut *root;
        for segment in segments {
            if !node.is_object() {
                *node = Value::Object(Map::new());
            }
            node = match node {
                Value::Object(map) => {
                    map.entry(segment.to_string()).or_insert_with(|| Value::Object(Map::new()))
                }
                _ => return,
            };
        }

        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        if let Value::Object(map) = node {
            map.insert(leaf.to_string(), value);
        }
    }
}
