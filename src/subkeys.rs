//! Lazy, cached, random-access enumeration of a key's subkeys.

use crate::error::{RegistryError, Result};
use crate::key::RegistryKey;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::debug;

/// Random-access cursor over the subkeys of one [`RegistryKey`].
///
/// The sequence is lazy: a child is opened only when its position is first
/// dereferenced, then cached so the same position never triggers a second
/// backend call and always returns the identical [`RegistryKey`] instance.
/// The enumerable bound is the owner's subkey count, captured once at
/// construction; a store mutated concurrently with iteration yields a stale
/// bound, and children that disappear surface as `NotFound` on dereference.
///
/// The cursor position is signed and may transiently leave `[0, count)`
/// through [`seek`](Self::seek) or [`retreat`](Self::retreat); only
/// dereferencing an out-of-range position fails.
#[derive(Debug)]
pub struct SubkeyIterator {
    parent: RegistryKey,
    position: i64,
    count: u32,
    cache: BTreeMap<u32, RegistryKey>,
}

impl SubkeyIterator {
    /// Creates an iterator positioned at 0.
    pub(crate) fn new(parent: RegistryKey) -> Self {
        let count = parent.subkey_count();
        Self {
            parent,
            position: 0,
            count,
            cache: BTreeMap::new(),
        }
    }

    /// Returns the key this iterator enumerates.
    pub fn parent(&self) -> &RegistryKey {
        &self.parent
    }

    /// Returns the number of enumerable positions, captured at construction.
    pub fn len(&self) -> u32 {
        self.count
    }

    /// Returns true if the owning key had no subkeys at construction time.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Returns the current cursor position.
    pub fn position(&self) -> i64 {
        self.position
    }

    /// Moves the cursor forward by one.
    pub fn advance(&mut self) {
        self.position += 1;
    }

    /// Moves the cursor backward by one.
    pub fn retreat(&mut self) {
        self.position -= 1;
    }

    /// Moves the cursor by an arbitrary signed offset.
    pub fn seek(&mut self, offset: i64) {
        self.position += offset;
    }

    /// Dereferences the entry at the current cursor position.
    pub fn current(&mut self) -> Result<RegistryKey> {
        self.entry(self.position)
    }

    /// Dereferences the entry at an arbitrary position without moving the
    /// cursor.
    ///
    /// # Errors
    ///
    /// * `OutOfRange` - `position` is outside `[0, count)`.
    /// * `NotFound` - the backend no longer has an entry at this index
    ///   (e.g. concurrent deletion); surfaced, not retried, and nothing is
    ///   cached for the position.
    pub fn entry(&mut self, position: i64) -> Result<RegistryKey> {
        let index = self.check_range(position)?;
        self.materialize(index)
    }

    /// Compares cursor positions of two iterators over the same key.
    ///
    /// # Errors
    ///
    /// `InvalidOperation` if the iterators enumerate different keys.
    pub fn try_cmp(&self, other: &Self) -> Result<Ordering> {
        if self.parent != other.parent {
            return Err(RegistryError::invalid_operation(
                "cannot compare subkey iterators over different keys",
            ));
        }
        Ok(self.position.cmp(&other.position))
    }

    fn check_range(&self, position: i64) -> Result<u32> {
        if position < 0 || position >= i64::from(self.count) {
            return Err(RegistryError::out_of_range(position, self.count));
        }
        Ok(position as u32)
    }

    fn materialize(&mut self, index: u32) -> Result<RegistryKey> {
        if let Some(cached) = self.cache.get(&index) {
            debug!(index, "Subkey cache hit");
            return Ok(cached.clone());
        }

        debug!(index, "Subkey cache miss, enumerating");
        let name = self.parent.backend().enumerate_child_name(
            self.parent.handle(),
            index,
            self.parent.max_subkey_name_len(),
        )?;
        let subkey = self.parent.open_subkey(&name)?;
        self.cache.insert(index, subkey.clone());
        Ok(subkey)
    }
}

impl Iterator for SubkeyIterator {
    type Item = Result<RegistryKey>;

    /// Yields the entry at the cursor and advances past it; positions
    /// outside `[0, count)` end the iteration.
    fn next(&mut self) -> Option<Self::Item> {
        if self.position < 0 || self.position >= i64::from(self.count) {
            return None;
        }
        let item = self.materialize(self.position as u32);
        self.position += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = if self.position < 0 || self.position > i64::from(self.count) {
            0
        } else {
            (i64::from(self.count) - self.position) as usize
        };
        (remaining, Some(remaining))
    }
}

impl PartialEq for SubkeyIterator {
    fn eq(&self, other: &Self) -> bool {
        self.parent == other.parent && self.position == other.position
    }
}

impl Eq for SubkeyIterator {}

impl PartialOrd for SubkeyIterator {
    /// Orders by position; iterators over different keys are unordered.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.parent != other.parent {
            return None;
        }
        Some(self.position.cmp(&other.position))
    }
}
