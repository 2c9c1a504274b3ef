//! Backend abstraction over the native key/value store.
//!
//! The registry is reached exclusively through opaque handles and
//! call-by-index enumeration. This module defines that call surface as a
//! trait so the traversal layer never touches OS primitives directly: a
//! production backend wraps the platform calls, while [`crate::MemoryStore`]
//! implements the same surface in-process for tests and examples.

use crate::error::Result;

/// Opaque handle to one open key in the backend store.
///
/// A handle is only meaningful to the backend that issued it. Two handles
/// are the same key instance iff they are equal; independent opens of the
/// same key yield distinct handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(u64);

impl Handle {
    /// Creates a handle from a backend-assigned raw identifier.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw identifier backing this handle.
    pub fn as_raw(&self) -> u64 {
        self.0
    }
}

/// Access rights requested when opening a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Access(pub u32);

impl Access {
    /// Read access: query metadata, enumerate children and values.
    pub const READ: Access = Access(0x0001);

    /// Write access: reserved for future write support.
    pub const WRITE: Access = Access(0x0002);

    /// Combined read and write access, the mode used for subkey opens.
    pub const READ_WRITE: Access = Access(Self::READ.0 | Self::WRITE.0);

    /// Returns true if all bits of `other` are present in this mask.
    pub fn contains(&self, other: Access) -> bool {
        (self.0 & other.0) == other.0
    }
}

/// The platform's well-known root stores.
///
/// Each variant is an independent entry point into the backend; opening one
/// is idempotent against the store, so no process-wide root state is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RootKind {
    /// HKEY_LOCAL_MACHINE: machine-wide configuration.
    LocalMachine,
    /// HKEY_CLASSES_ROOT: file associations and COM registrations.
    ClassesRoot,
    /// HKEY_CURRENT_USER: per-user configuration.
    CurrentUser,
    /// HKEY_USERS: all loaded user profiles.
    Users,
    /// HKEY_CURRENT_CONFIG: current hardware profile.
    CurrentConfig,
    /// HKEY_PERFORMANCE_DATA: performance counter pseudo-store.
    PerformanceData,
}

impl RootKind {
    /// All well-known roots, in their conventional order.
    pub const ALL: [RootKind; 6] = [
        RootKind::LocalMachine,
        RootKind::ClassesRoot,
        RootKind::CurrentUser,
        RootKind::Users,
        RootKind::CurrentConfig,
        RootKind::PerformanceData,
    ];

    /// Returns the well-known display name of this root.
    pub fn name(&self) -> &'static str {
        match self {
            RootKind::LocalMachine => "HKEY_LOCAL_MACHINE",
            RootKind::ClassesRoot => "HKEY_CLASSES_ROOT",
            RootKind::CurrentUser => "HKEY_CURRENT_USER",
            RootKind::Users => "HKEY_USERS",
            RootKind::CurrentConfig => "HKEY_CURRENT_CONFIG",
            RootKind::PerformanceData => "HKEY_PERFORMANCE_DATA",
        }
    }
}

impl std::fmt::Display for RootKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Metadata for one open key, as reported by a single backend query.
///
/// The traversal layer captures this once per open and never re-queries;
/// all counts and bounds reflect the key's state at open time.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KeyMetadata {
    /// Class string of the key.
    pub class: String,

    /// Number of direct subkeys.
    pub subkey_count: u32,

    /// Number of values.
    pub value_count: u32,

    /// Length in characters of the longest subkey name.
    pub max_subkey_name_len: u32,

    /// Length in characters of the longest value name.
    pub max_value_name_len: u32,

    /// Length in bytes of the longest value data.
    pub max_value_data_len: u32,

    /// Last-written timestamp in 100ns ticks since 1601-01-01 (FILETIME).
    pub last_written: u64,
}

/// Result of the first phase of a value read: name, type, and size, but no
/// payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueProbe {
    /// Name of the value.
    pub name: String,

    /// Raw type tag as stored by the backend.
    pub value_type: u32,

    /// Size of the payload in bytes.
    pub data_size: u32,
}

/// Result of the second phase of a value read: the payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueFetch {
    /// Name of the value.
    pub name: String,

    /// Raw type tag as stored by the backend.
    pub value_type: u32,

    /// Payload bytes, exactly as stored.
    pub data: Vec<u8>,
}

/// The opaque-handle, call-by-index surface of the native store.
///
/// All calls are synchronous and blocking; they complete or fail
/// deterministically, and the traversal layer propagates every failure
/// to its caller without retrying.
///
/// Implementations classify their own failures into the
/// [`crate::RegistryError`] kinds: a missing name or index is `NotFound`,
/// a permission failure on open is `AccessDenied`, a call against a closed
/// handle is `InvalidOperation`, and anything else is `StoreUnavailable`.
pub trait StoreBackend: Send + Sync {
    /// Opens one of the well-known root keys.
    fn open_root(&self, root: RootKind) -> Result<Handle>;

    /// Opens a child key by name under an open key.
    fn open_child(&self, parent: Handle, name: &str, access: Access) -> Result<Handle>;

    /// Queries the metadata of an open key.
    fn query_metadata(&self, handle: Handle) -> Result<KeyMetadata>;

    /// Returns the name of the child key at `index`.
    ///
    /// `max_name_len` is the parent's cached longest-subkey-name bound and
    /// sizes the name buffer in one call; no size probe is needed for
    /// child names.
    fn enumerate_child_name(&self, handle: Handle, index: u32, max_name_len: u32)
        -> Result<String>;

    /// First phase of a value read: reports the value's name, raw type tag,
    /// and payload size at `index` without transferring the payload.
    ///
    /// `max_name_len` and `max_data_len` are the parent's cached bounds.
    fn probe_value(
        &self,
        handle: Handle,
        index: u32,
        max_name_len: u32,
        max_data_len: u32,
    ) -> Result<ValueProbe>;

    /// Second phase of a value read: transfers the payload at `index` into
    /// a buffer of `buffer_size` bytes, as learned from the probe.
    fn fetch_value(&self, handle: Handle, index: u32, buffer_size: u32) -> Result<ValueFetch>;

    /// Releases an open handle. Called exactly once per handle, when the
    /// last owner of the corresponding key is dropped.
    fn close(&self, handle: Handle);
}
