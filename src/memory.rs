//! In-process reference implementation of [`StoreBackend`].
//!
//! `MemoryStore` keeps a mutable key tree behind a mutex and exposes the
//! same opaque-handle, call-by-index surface a platform backend would. It
//! exists for tests, examples, and doctests: the fixture methods
//! ([`add_key`](MemoryStore::add_key), [`set_value`](MemoryStore::set_value),
//! [`remove_key`](MemoryStore::remove_key), ...) mutate the tree at any
//! time, which makes external-concurrent-mutation scenarios scriptable.
//!
//! Handles resolve by path, so a call against a handle whose key was
//! removed sees the store's current truth, exactly like a live registry.
//! Enumeration returns the store's current state on every call; detecting
//! drift between calls is the traversal layer's concern. Name matching is
//! exact (case-sensitive), unlike the platform registry.

use crate::backend::{
    Access, Handle, KeyMetadata, RootKind, StoreBackend, ValueFetch, ValueProbe,
};
use crate::error::{RegistryError, Result};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

#[derive(Default)]
struct Node {
    class: String,
    last_written: u64,
    denied: bool,
    children: BTreeMap<String, Node>,
    values: Vec<StoredValue>,
}

struct StoredValue {
    name: String,
    value_type: u32,
    data: Vec<u8>,
}

struct StoreInner {
    tree: BTreeMap<String, Node>,
    handles: HashMap<u64, Vec<String>>,
    next_handle: u64,
}

/// In-memory key/value store implementing [`StoreBackend`].
pub struct MemoryStore {
    inner: Mutex<StoreInner>,
}

impl MemoryStore {
    /// Creates a store with the six well-known roots and nothing else.
    pub fn new() -> Self {
        let mut tree = BTreeMap::new();
        for root in RootKind::ALL {
            tree.insert(root.name().to_string(), Node::default());
        }
        Self {
            inner: Mutex::new(StoreInner {
                tree,
                handles: HashMap::new(),
                next_handle: 1,
            }),
        }
    }

    /// Creates the key at `path`, along with any missing ancestors.
    ///
    /// `path` is `\`-separated and starts with a well-known root name,
    /// e.g. `HKEY_CLASSES_ROOT\.txt`.
    ///
    /// # Panics
    ///
    /// Panics if the first segment is not a well-known root name.
    pub fn add_key(&self, path: &str) {
        let segments = split_path(path);
        let mut inner = self.lock();
        let mut node = inner
            .tree
            .get_mut(&segments[0])
            .unwrap_or_else(|| panic!("unknown root '{}'", segments[0]));
        for segment in &segments[1..] {
            node = node.children.entry(segment.clone()).or_default();
        }
    }

    /// Sets the class string and last-written timestamp of an existing key.
    ///
    /// # Panics
    ///
    /// Panics if no key exists at `path`.
    pub fn set_key_info(&self, path: &str, class: &str, last_written: u64) {
        let segments = split_path(path);
        let mut inner = self.lock();
        let node = resolve_mut(&mut inner.tree, &segments)
            .unwrap_or_else(|| panic!("no key at '{}'", path));
        node.class = class.to_string();
        node.last_written = last_written;
    }

    /// Marks the key at `path` so that opening it fails with `AccessDenied`.
    ///
    /// # Panics
    ///
    /// Panics if no key exists at `path`.
    pub fn deny_access(&self, path: &str) {
        let segments = split_path(path);
        let mut inner = self.lock();
        resolve_mut(&mut inner.tree, &segments)
            .unwrap_or_else(|| panic!("no key at '{}'", path))
            .denied = true;
    }

    /// Removes the key at `path` and its entire subtree.
    ///
    /// # Panics
    ///
    /// Panics if `path` names a root or a key that does not exist.
    pub fn remove_key(&self, path: &str) {
        let segments = split_path(path);
        assert!(segments.len() > 1, "cannot remove root '{}'", path);
        let (name, parent_segments) = segments.split_last().expect("non-empty path");
        let mut inner = self.lock();
        let parent = resolve_mut(&mut inner.tree, parent_segments)
            .unwrap_or_else(|| panic!("no key at '{}'", path));
        parent
            .children
            .remove(name)
            .unwrap_or_else(|| panic!("no key at '{}'", path));
    }

    /// Sets a value on the key at `path`, replacing any value of the same
    /// name in place (the enumeration index is preserved).
    ///
    /// # Panics
    ///
    /// Panics if no key exists at `path`.
    pub fn set_value(&self, path: &str, name: &str, value_type: u32, data: Vec<u8>) {
        let segments = split_path(path);
        let mut inner = self.lock();
        let node = resolve_mut(&mut inner.tree, &segments)
            .unwrap_or_else(|| panic!("no key at '{}'", path));
        if let Some(existing) = node.values.iter_mut().find(|v| v.name == name) {
            existing.value_type = value_type;
            existing.data = data;
        } else {
            node.values.push(StoredValue {
                name: name.to_string(),
                value_type,
                data,
            });
        }
    }

    /// Removes the named value from the key at `path`.
    ///
    /// # Panics
    ///
    /// Panics if the key or the value does not exist.
    pub fn remove_value(&self, path: &str, name: &str) {
        let segments = split_path(path);
        let mut inner = self.lock();
        let node = resolve_mut(&mut inner.tree, &segments)
            .unwrap_or_else(|| panic!("no key at '{}'", path));
        let index = node
            .values
            .iter()
            .position(|v| v.name == name)
            .unwrap_or_else(|| panic!("no value '{}' at '{}'", name, path));
        node.values.remove(index);
    }

    /// Returns the number of handles currently open against this store.
    pub fn open_handle_count(&self) -> usize {
        self.lock().handles.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoreInner> {
        self.inner.lock().expect("memory store lock poisoned")
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreBackend for MemoryStore {
    fn open_root(&self, root: RootKind) -> Result<Handle> {
        let mut inner = self.lock();
        if !inner.tree.contains_key(root.name()) {
            return Err(RegistryError::store_unavailable(format!(
                "root '{}' cannot be queried",
                root.name()
            )));
        }
        Ok(issue_handle(&mut inner, vec![root.name().to_string()]))
    }

    fn open_child(&self, parent: Handle, name: &str, _access: Access) -> Result<Handle> {
        let mut inner = self.lock();
        let mut segments = resolve_handle(&inner, parent)?;
        segments.push(name.to_string());

        let node = resolve(&inner.tree, &segments)
            .ok_or_else(|| RegistryError::not_found("key", name))?;
        if node.denied {
            return Err(RegistryError::access_denied(name));
        }
        Ok(issue_handle(&mut inner, segments))
    }

    fn query_metadata(&self, handle: Handle) -> Result<KeyMetadata> {
        let inner = self.lock();
        let segments = resolve_handle(&inner, handle)?;
        let node = resolve(&inner.tree, &segments)
            .ok_or_else(|| RegistryError::not_found("key", &segments.join("\\")))?;

        Ok(KeyMetadata {
            class: node.class.clone(),
            subkey_count: node.children.len() as u32,
            value_count: node.values.len() as u32,
            max_subkey_name_len: node
                .children
                .keys()
                .map(|name| name.encode_utf16().count() as u32)
                .max()
                .unwrap_or(0),
            max_value_name_len: node
                .values
                .iter()
                .map(|v| v.name.encode_utf16().count() as u32)
                .max()
                .unwrap_or(0),
            max_value_data_len: node
                .values
                .iter()
                .map(|v| v.data.len() as u32)
                .max()
                .unwrap_or(0),
            last_written: node.last_written,
        })
    }

    fn enumerate_child_name(
        &self,
        handle: Handle,
        index: u32,
        _max_name_len: u32,
    ) -> Result<String> {
        let inner = self.lock();
        let segments = resolve_handle(&inner, handle)?;
        let node = resolve(&inner.tree, &segments)
            .ok_or_else(|| RegistryError::not_found("key", &segments.join("\\")))?;
        node.children
            .keys()
            .nth(index as usize)
            .cloned()
            .ok_or_else(|| RegistryError::not_found_index("subkey", index))
    }

    fn probe_value(
        &self,
        handle: Handle,
        index: u32,
        _max_name_len: u32,
        _max_data_len: u32,
    ) -> Result<ValueProbe> {
        let inner = self.lock();
        let segments = resolve_handle(&inner, handle)?;
        let node = resolve(&inner.tree, &segments)
            .ok_or_else(|| RegistryError::not_found("key", &segments.join("\\")))?;
        let value = node
            .values
            .get(index as usize)
            .ok_or_else(|| RegistryError::not_found_index("value", index))?;
        Ok(ValueProbe {
            name: value.name.clone(),
            value_type: value.value_type,
            data_size: value.data.len() as u32,
        })
    }

    fn fetch_value(&self, handle: Handle, index: u32, _buffer_size: u32) -> Result<ValueFetch> {
        let inner = self.lock();
        let segments = resolve_handle(&inner, handle)?;
        let node = resolve(&inner.tree, &segments)
            .ok_or_else(|| RegistryError::not_found("key", &segments.join("\\")))?;
        let value = node
            .values
            .get(index as usize)
            .ok_or_else(|| RegistryError::not_found_index("value", index))?;
        // Returns the value's current bytes; drift against an earlier probe
        // is the caller's concern.
        Ok(ValueFetch {
            name: value.name.clone(),
            value_type: value.value_type,
            data: value.data.clone(),
        })
    }

    fn close(&self, handle: Handle) {
        self.lock().handles.remove(&handle.as_raw());
    }
}

fn split_path(path: &str) -> Vec<String> {
    path.split('\\').map(str::to_string).collect()
}

fn issue_handle(inner: &mut StoreInner, segments: Vec<String>) -> Handle {
    let raw = inner.next_handle;
    inner.next_handle += 1;
    inner.handles.insert(raw, segments);
    Handle::from_raw(raw)
}

fn resolve_handle(inner: &StoreInner, handle: Handle) -> Result<Vec<String>> {
    inner
        .handles
        .get(&handle.as_raw())
        .cloned()
        .ok_or_else(|| RegistryError::invalid_operation("handle is closed"))
}

fn resolve<'a>(tree: &'a BTreeMap<String, Node>, segments: &[String]) -> Option<&'a Node> {
    let mut node = tree.get(&segments[0])?;
    for segment in &segments[1..] {
        node = node.children.get(segment)?;
    }
    Some(node)
}

fn resolve_mut<'a>(
    tree: &'a mut BTreeMap<String, Node>,
    segments: &[String],
) -> Option<&'a mut Node> {
    let mut node = tree.get_mut(&segments[0])?;
    for segment in &segments[1..] {
        node = node.children.get_mut(segment)?;
    }
    Some(node)
}
