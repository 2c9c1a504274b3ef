//! Error types for registry traversal operations.
//!
//! This module provides comprehensive error handling for all traversal and
//! decoding operations, including backend failures, iterator misuse, and
//! malformed value payloads.

use thiserror::Error;

/// Result type alias for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Errors that can occur while traversing or decoding a registry store.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Key or value not found in the backend store.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Permissions were insufficient to open a key.
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// A backend open or query failed for a reason other than a missing
    /// entry or a permission problem.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Iterator position is outside the enumerable range.
    #[error("Position {position} out of range (count: {count})")]
    OutOfRange {
        /// Position that was dereferenced.
        position: i64,
        /// Entry count captured when the iterator was constructed.
        count: u32,
    },

    /// The operation is not meaningful for the arguments it was given,
    /// such as comparing iterators rooted at different keys or calling
    /// through an already-closed handle.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// A value changed between the size probe and the data fetch.
    #[error("Value at index {index} changed during read: {detail}")]
    Inconsistent {
        /// Enumeration index of the value.
        index: u32,
        /// What differed between the two calls.
        detail: String,
    },

    /// A value payload violates the minimum shape of its type tag.
    #[error("Malformed {type_name} payload: expected at least {expected} bytes, got {actual}")]
    Malformed {
        /// Display name of the value type (e.g., "REG_DWORD").
        type_name: String,
        /// Minimum byte width required by the type.
        expected: usize,
        /// Byte width actually reported.
        actual: usize,
    },
}

impl RegistryError {
    /// Creates a not found error with context about what was being searched.
    ///
    /// # Arguments
    ///
    /// * `item_type` - Type of item (e.g., "key", "value")
    /// * `name` - Name of the item that wasn't found
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use reg_view::error::RegistryError;
    /// let err = RegistryError::not_found("key", "Microsoft");
    /// ```
    pub fn not_found(item_type: &str, name: &str) -> Self {
        Self::NotFound(format!("{} '{}'", item_type, name))
    }

    /// Creates a not found error for a positional enumeration miss.
    pub fn not_found_index(item_type: &str, index: u32) -> Self {
        Self::NotFound(format!("{} at index {}", item_type, index))
    }

    /// Creates an access denied error for the named key.
    pub fn access_denied(name: &str) -> Self {
        Self::AccessDenied(format!("key '{}'", name))
    }

    /// Creates a store unavailable error with a backend-supplied message.
    pub fn store_unavailable(message: impl Into<String>) -> Self {
        Self::StoreUnavailable(message.into())
    }

    /// Creates an out of range error with the offending position.
    pub fn out_of_range(position: i64, count: u32) -> Self {
        Self::OutOfRange { position, count }
    }

    /// Creates an invalid operation error with a description of the misuse.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation(message.into())
    }

    /// Creates an inconsistency error for a probe/fetch mismatch.
    pub fn inconsistent(index: u32, detail: impl Into<String>) -> Self {
        Self::Inconsistent {
            index,
            detail: detail.into(),
        }
    }

    /// Creates a malformed payload error for a width violation.
    ///
    /// # Arguments
    ///
    /// * `type_name` - Display name of the value type (e.g., "REG_DWORD")
    /// * `expected` - Minimum byte width required by the type
    /// * `actual` - Byte width actually reported
    pub fn malformed(type_name: &str, expected: usize, actual: usize) -> Self {
        Self::Malformed {
            type_name: type_name.to_string(),
            expected,
            actual,
        }
    }
}
