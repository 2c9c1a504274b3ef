//! # Live Registry Traversal
//!
//! A typed, lazily cached traversal layer for live Windows registry stores.
//!
//! ## Features
//!
//! - **Lazy enumeration**: children and values are fetched from the backend
//!   only when first dereferenced, then cached per position
//! - **Random access**: iterator cursors move forward, backward, and by
//!   arbitrary signed offsets without refetching
//! - **Type-safe**: every value decodes into a closed set of typed payloads
//! - **Safe lifetimes**: reference-counted parent chains guarantee that a
//!   key's handle outlives every iterator, record, and descendant derived
//!   from it
//! - **Backend-agnostic**: the native store is reached through the
//!   [`StoreBackend`] trait; an in-memory implementation ships for tests
//!   and examples
//!
//! ## Architecture
//!
//! The layer is built around four pieces:
//!
//! 1. **[`StoreBackend`]**: the opaque-handle, call-by-index surface of the
//!    native store (open, query, enumerate, probe/fetch, close)
//! 2. **[`RegistryKey`]**: one open key with metadata cached at open time
//!    and a strong reference to its parent
//! 3. **[`SubkeyIterator`] / [`ValueIterator`]**: cached random-access
//!    cursors over a key's children and values
//! 4. **[`RegistryValue`]**: a decoded, immutable value record produced by
//!    the two-phase probe/fetch protocol
//!
//! ## Examples
//!
//! ### Basic traversal
//!
//! ```rust
//! use reg_view::{MemoryStore, RegistryKey, RootKind};
//! use std::sync::Arc;
//!
//! # fn main() -> reg_view::Result<()> {
//! let store = Arc::new(MemoryStore::new());
//! store.add_key(r"HKEY_CLASSES_ROOT\.txt");
//!
//! // Open a root key and descend
//! let root = RegistryKey::open_root(store, RootKind::ClassesRoot)?;
//! let txt = root.open_subkey(".txt")?;
//! assert_eq!(txt.path(), r"HKEY_CLASSES_ROOT\.txt");
//!
//! // Enumerate subkeys
//! for subkey in root.subkeys() {
//!     println!("  Subkey: {}", subkey?.name());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ### Reading typed values
//!
//! ```rust
//! use reg_view::{MemoryStore, RegistryKey, RootKind, ValueData};
//! use std::sync::Arc;
//!
//! # fn main() -> reg_view::Result<()> {
//! let store = Arc::new(MemoryStore::new());
//! store.add_key(r"HKEY_CURRENT_USER\Environment");
//! store.set_value(
//!     r"HKEY_CURRENT_USER\Environment",
//!     "Threads",
//!     4,
//!     8u32.to_le_bytes().to_vec(),
//! );
//!
//! let root = RegistryKey::open_root(store, RootKind::CurrentUser)?;
//! let mut values = root.open_subkey("Environment")?.values();
//!
//! let value = values.current()?;
//! match value.data() {
//!     ValueData::Dword(d) => assert_eq!(*d, 8),
//!     other => panic!("unexpected payload: {}", other),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Consistency model
//!
//! Enumeration bounds are captured when an iterator is constructed and are
//! never re-queried: the iterator is a consistent view *as of construction
//! time*, not a linearizable read of live content. Entries that another
//! process deletes mid-enumeration surface as `NotFound`; a value whose
//! size or type changes between the size probe and the data fetch surfaces
//! as `Inconsistent`. Nothing is retried and no partial read is ever
//! returned.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod error;
pub mod key;
pub mod memory;
pub mod subkeys;
pub mod utils;
pub mod value;
pub mod values;

// Re-export main types for convenience
pub use backend::{Access, Handle, KeyMetadata, RootKind, StoreBackend, ValueFetch, ValueProbe};
pub use error::{RegistryError, Result};
pub use key::{RegistryKey, PATH_SEPARATOR};
pub use memory::MemoryStore;
pub use subkeys::SubkeyIterator;
pub use value::{RegistryValue, ValueData, ValueType};
pub use values::ValueIterator;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
