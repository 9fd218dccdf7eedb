//! Hierarchical task state persisted between invocations.
//!
//! The whole persisted artifact of a task attempt is a single JSON object
//! (the *root* document). Every retry executor or polling waiter works on a
//! named subtree of it, reached through [`TaskState::nested_state`]. Writes
//! through a nested scope land in the root document, so whatever the host
//! stores after a suspension already contains them.
//!
//! # Example
//!
//! ```
//! use task_core::state::{Document, TaskState};
//!
//! let mut document = Document::new();
//! let mut state = TaskState::of(&mut document);
//! {
//!     let mut submit = state.nested_state("submit");
//!     submit.params().set("job_id", "j-42").unwrap();
//! }
//! assert_eq!(document["submit"]["job_id"], "j-42");
//! ```

use crate::error::StateError;
use crate::signal::Suspension;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// The persisted document: string keys mapped to arbitrary JSON values.
pub type Document = Map<String, Value>;

/// A view into a subtree of the persisted task document.
///
/// A scope is a borrowed handle to the root document plus a key path.
/// Only one scope tree exists per invocation and invocations never run
/// concurrently, so a plain `&mut` borrow is all the sharing needed.
#[derive(Debug)]
pub struct TaskState<'a> {
    root: &'a mut Document,
    path: Vec<String>,
}

impl<'a> TaskState<'a> {
    /// Create the top-level scope over the document handed back by the host.
    pub fn of(root: &'a mut Document) -> Self {
        Self {
            root,
            path: Vec::new(),
        }
    }

    /// Derive a child scope for `key`, creating an empty object if absent.
    ///
    /// Deriving the same key twice yields scopes over the same subtree. A
    /// value of the wrong shape at `key` is replaced by an empty object.
    pub fn nested_state(&mut self, key: &str) -> TaskState<'_> {
        let mut path = self.path.clone();
        path.push(key.to_string());
        let mut nested = TaskState {
            root: &mut *self.root,
            path,
        };
        nested.object_mut();
        nested
    }

    /// The subtree this scope is allowed to read and write.
    pub fn params(&mut self) -> Params<'_> {
        Params {
            map: self.object_mut(),
        }
    }

    /// The full persisted document.
    ///
    /// Only meant for building a [`Suspension`]; reading or writing through
    /// the root bypasses scope isolation.
    pub fn root(&self) -> &Document {
        &*self.root
    }

    /// Key path of this scope from the root, empty for the root scope.
    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// Snapshot the root document into a suspension signal.
    pub fn suspend(&self, retry_interval_seconds: u64) -> Suspension {
        Suspension::new(retry_interval_seconds, self.root.clone())
    }

    fn object_mut(&mut self) -> &mut Document {
        let mut current: &mut Document = &mut *self.root;
        for key in &self.path {
            let slot = current
                .entry(key.clone())
                .or_insert_with(|| Value::Object(Document::new()));
            current = ensure_object(slot);
        }
        current
    }
}

fn ensure_object(value: &mut Value) -> &mut Document {
    match value {
        Value::Object(map) => map,
        other => {
            *other = Value::Object(Document::new());
            ensure_object(other)
        }
    }
}

/// Typed accessors over one scope's parameters.
#[derive(Debug)]
pub struct Params<'p> {
    map: &'p mut Document,
}

impl Params<'_> {
    /// Read `key`, treating a missing key or `null` as `None`.
    pub fn get<T>(&self, key: &str) -> Result<Option<T>, StateError>
    where
        T: DeserializeOwned,
    {
        match self.map.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|source| StateError::Decode {
                    key: key.to_string(),
                    source,
                }),
        }
    }

    /// Read `key`, falling back to `default` when it is missing.
    pub fn get_or<T>(&self, key: &str, default: T) -> Result<T, StateError>
    where
        T: DeserializeOwned,
    {
        Ok(self.get(key)?.unwrap_or(default))
    }

    /// Read `key` as `T`, decoding a missing key as `null`.
    ///
    /// For types that can represent absence themselves, such as `()` or
    /// `Option<_>`.
    pub fn get_nullable<T>(&self, key: &str) -> Result<T, StateError>
    where
        T: DeserializeOwned,
    {
        let value = self.map.get(key).cloned().unwrap_or(Value::Null);
        serde_json::from_value(value).map_err(|source| StateError::Decode {
            key: key.to_string(),
            source,
        })
    }

    pub fn set<T>(&mut self, key: &str, value: T) -> Result<(), StateError>
    where
        T: Serialize,
    {
        let value = serde_json::to_value(value).map_err(|source| StateError::Encode {
            key: key.to_string(),
            source,
        })?;
        self.map.insert(key.to_string(), value);
        Ok(())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.map.remove(key)
    }

    pub fn has(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.map.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Raw view of the underlying object.
    pub fn as_map(&self) -> &Document {
        &*self.map
    }
}
