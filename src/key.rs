//! Open registry keys and the parent-lifetime ownership chain.

use crate::backend::{Access, Handle, KeyMetadata, RootKind, StoreBackend};
use crate::error::{RegistryError, Result};
use crate::subkeys::SubkeyIterator;
use crate::utils::filetime_to_datetime;
use crate::values::ValueIterator;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Separator between key names in a path.
pub const PATH_SEPARATOR: char = '\\';

/// One open registry key.
///
/// A key owns a backend handle and the metadata captured by a single query
/// at open time; no accessor ever re-queries the backend. Cloning is cheap
/// (shared inner), and equality is defined over handle identity only, so
/// two independent opens of the same key compare unequal.
///
/// # Lifetime chain
///
/// Every non-root key holds a strong reference to its parent, and every
/// iterator or cached entry derived from a key holds a strong reference to
/// that key. The backend handle is released exactly once, when the last
/// holder is dropped, which makes release order strictly
/// children-before-parents without any manual sequencing. Root keys own
/// and release their handle exactly like non-root keys.
#[derive(Clone)]
pub struct RegistryKey {
    inner: Arc<KeyInner>,
}

struct KeyInner {
    backend: Arc<dyn StoreBackend>,
    handle: Handle,
    name: String,
    path: String,
    metadata: KeyMetadata,
    parent: Option<RegistryKey>,
}

impl Drop for KeyInner {
    fn drop(&mut self) {
        self.backend.close(self.handle);
    }
}

impl RegistryKey {
    /// Opens one of the well-known root keys.
    ///
    /// Performs one metadata query against the root handle supplied by the
    /// backend; fails with `StoreUnavailable` if the root cannot be queried.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use reg_view::{MemoryStore, RegistryKey, RootKind};
    /// use std::sync::Arc;
    ///
    /// let store = Arc::new(MemoryStore::new());
    /// let root = RegistryKey::open_root(store, RootKind::ClassesRoot).unwrap();
    /// assert_eq!(root.name(), "HKEY_CLASSES_ROOT");
    /// ```
    #[instrument(skip(backend))]
    pub fn open_root(backend: Arc<dyn StoreBackend>, root: RootKind) -> Result<Self> {
        debug!(root = %root, "Opening root key");
        let handle = backend.open_root(root)?;
        Self::from_handle(backend, handle, root.name().to_string(), None)
    }

    /// Opens the HKEY_LOCAL_MACHINE root key.
    pub fn open_local_machine(backend: Arc<dyn StoreBackend>) -> Result<Self> {
        Self::open_root(backend, RootKind::LocalMachine)
    }

    /// Opens the HKEY_CLASSES_ROOT root key.
    pub fn open_classes_root(backend: Arc<dyn StoreBackend>) -> Result<Self> {
        Self::open_root(backend, RootKind::ClassesRoot)
    }

    /// Opens the HKEY_CURRENT_USER root key.
    pub fn open_current_user(backend: Arc<dyn StoreBackend>) -> Result<Self> {
        Self::open_root(backend, RootKind::CurrentUser)
    }

    /// Opens the HKEY_USERS root key.
    pub fn open_users(backend: Arc<dyn StoreBackend>) -> Result<Self> {
        Self::open_root(backend, RootKind::Users)
    }

    /// Opens the HKEY_CURRENT_CONFIG root key.
    pub fn open_current_config(backend: Arc<dyn StoreBackend>) -> Result<Self> {
        Self::open_root(backend, RootKind::CurrentConfig)
    }

    /// Opens the HKEY_PERFORMANCE_DATA root key.
    pub fn open_performance_data(backend: Arc<dyn StoreBackend>) -> Result<Self> {
        Self::open_root(backend, RootKind::PerformanceData)
    }

    /// Opens a child key by name.
    ///
    /// The child is opened with read+write access and its metadata is
    /// queried once. The returned key holds a strong reference to `self`,
    /// keeping this key's handle alive for as long as the child exists.
    ///
    /// # Errors
    ///
    /// * `InvalidOperation` - `name` is empty.
    /// * `NotFound` - no such child exists.
    /// * `AccessDenied` - permissions are insufficient.
    /// * `StoreUnavailable` - any other backend failure.
    #[instrument(skip(self), fields(parent = %self.inner.path))]
    pub fn open_subkey(&self, name: &str) -> Result<RegistryKey> {
        if name.is_empty() {
            return Err(RegistryError::invalid_operation(
                "subkey name must not be empty",
            ));
        }
        debug!(name, "Opening subkey");
        let handle = self
            .inner
            .backend
            .open_child(self.inner.handle, name, Access::READ_WRITE)?;
        Self::from_handle(
            self.inner.backend.clone(),
            handle,
            name.to_string(),
            Some(self.clone()),
        )
    }

    /// Builds a key around a freshly opened handle.
    ///
    /// The metadata query happens here; if it fails, the handle is closed
    /// before the error is returned so nothing leaks.
    fn from_handle(
        backend: Arc<dyn StoreBackend>,
        handle: Handle,
        name: String,
        parent: Option<RegistryKey>,
    ) -> Result<Self> {
        let metadata = match backend.query_metadata(handle) {
            Ok(metadata) => metadata,
            Err(err) => {
                backend.close(handle);
                return Err(err);
            }
        };

        let path = match &parent {
            Some(parent) => format!("{}{}{}", parent.path(), PATH_SEPARATOR, name),
            None => name.clone(),
        };

        Ok(Self {
            inner: Arc::new(KeyInner {
                backend,
                handle,
                name,
                path,
                metadata,
                parent,
            }),
        })
    }

    /// Returns a lazy, cached iterator over this key's subkeys.
    pub fn subkeys(&self) -> SubkeyIterator {
        SubkeyIterator::new(self.clone())
    }

    /// Returns a lazy, cached iterator over this key's values.
    pub fn values(&self) -> ValueIterator {
        ValueIterator::new(self.clone())
    }

    /// Returns the name of the key.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Returns the full path of the key: the parent's path, a `\`, and
    /// this key's name. A root key's path is its own name.
    pub fn path(&self) -> &str {
        &self.inner.path
    }

    /// Returns the class string of the key.
    pub fn class_name(&self) -> &str {
        &self.inner.metadata.class
    }

    /// Returns the number of direct subkeys, as of open time.
    pub fn subkey_count(&self) -> u32 {
        self.inner.metadata.subkey_count
    }

    /// Returns the number of values, as of open time.
    pub fn value_count(&self) -> u32 {
        self.inner.metadata.value_count
    }

    /// Returns the length of the longest subkey name, as of open time.
    pub fn max_subkey_name_len(&self) -> u32 {
        self.inner.metadata.max_subkey_name_len
    }

    /// Returns the length of the longest value name, as of open time.
    pub fn max_value_name_len(&self) -> u32 {
        self.inner.metadata.max_value_name_len
    }

    /// Returns the length of the longest value data, as of open time.
    pub fn max_value_data_len(&self) -> u32 {
        self.inner.metadata.max_value_data_len
    }

    /// Returns the last time the key was written, as of open time.
    ///
    /// Returns `None` if the backend timestamp is outside the representable
    /// range.
    pub fn last_written(&self) -> Option<DateTime<Utc>> {
        filetime_to_datetime(self.inner.metadata.last_written)
    }

    /// Returns the raw last-written timestamp in FILETIME ticks.
    pub fn last_written_raw(&self) -> u64 {
        self.inner.metadata.last_written
    }

    /// Returns this key's parent, or `None` for a root key.
    pub fn parent(&self) -> Option<&RegistryKey> {
        self.inner.parent.as_ref()
    }

    /// Returns true if this is a root key.
    pub fn is_root(&self) -> bool {
        self.inner.parent.is_none()
    }

    /// Returns the backend handle of this key.
    pub fn handle(&self) -> Handle {
        self.inner.handle
    }

    /// Returns true if `self` and `other` are the same key instance, not
    /// merely keys with equal handles.
    ///
    /// Cached iterator entries are shared, so dereferencing the same
    /// position twice yields keys for which this returns true.
    pub fn ptr_eq(&self, other: &RegistryKey) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn backend(&self) -> &Arc<dyn StoreBackend> {
        &self.inner.backend
    }
}

impl PartialEq for RegistryKey {
    fn eq(&self, other: &Self) -> bool {
        self.inner.handle == other.inner.handle
    }
}

impl Eq for RegistryKey {}

impl std::fmt::Debug for RegistryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryKey")
            .field("path", &self.inner.path)
            .field("handle", &self.inner.handle)
            .field("subkey_count", &self.inner.metadata.subkey_count)
            .field("value_count", &self.inner.metadata.value_count)
            .finish()
    }
}
