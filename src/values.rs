//! Lazy, cached, random-access enumeration and decoding of a key's values.

use crate::error::{RegistryError, Result};
use crate::key::RegistryKey;
use crate::value::{RegistryValue, ValueData, ValueType};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Random-access cursor over the values of one [`RegistryKey`].
///
/// Mirrors [`crate::SubkeyIterator`] in movement, caching, and comparison
/// semantics, but each dereference runs the two-phase read protocol: a
/// probe call learns the value's name, type tag, and payload size, then a
/// fetch call transfers the payload into a buffer sized exactly from the
/// probe. A size or type that differs between the two calls means the
/// value was mutated concurrently and fails as `Inconsistent`.
///
/// Decoded entries are cached as shared [`RegistryValue`] records, so the
/// same position decodes once and every access returns the identical
/// record.
#[derive(Debug)]
pub struct ValueIterator {
    parent: RegistryKey,
    position: i64,
    count: u32,
    cache: BTreeMap<u32, Arc<RegistryValue>>,
}

impl ValueIterator {
    /// Creates an iterator positioned at 0.
    pub(crate) fn new(parent: RegistryKey) -> Self {
        let count = parent.value_count();
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

    /// Returns true if the owning key had no values at construction time.
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
    pub fn current(&mut self) -> Result<Arc<RegistryValue>> {
        self.entry(self.position)
    }

    /// Dereferences the entry at an arbitrary position without moving the
    /// cursor.
    ///
    /// # Errors
    ///
    /// * `OutOfRange` - `position` is outside `[0, count)`.
    /// * `NotFound` - the backend no longer has a value at this index.
    /// * `Inconsistent` - size or type changed between probe and fetch.
    /// * `Malformed` - the payload violates its type's minimum width.
    ///
    /// No cache entry is written on any error path.
    pub fn entry(&mut self, position: i64) -> Result<Arc<RegistryValue>> {
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
                "cannot compare value iterators over different keys",
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

    fn materialize(&mut self, index: u32) -> Result<Arc<RegistryValue>> {
        if let Some(cached) = self.cache.get(&index) {
            debug!(index, "Value cache hit");
            return Ok(cached.clone());
        }

        debug!(index, "Value cache miss, probing");
        let probe = self.parent.backend().probe_value(
            self.parent.handle(),
            index,
            self.parent.max_value_name_len(),
            self.parent.max_value_data_len(),
        )?;

        let fetch = self
            .parent
            .backend()
            .fetch_value(self.parent.handle(), index, probe.data_size)?;

        if fetch.value_type != probe.value_type {
            return Err(RegistryError::inconsistent(
                index,
                format!(
                    "type tag {} became {}",
                    probe.value_type, fetch.value_type
                ),
            ));
        }
        if fetch.data.len() as u64 != u64::from(probe.data_size) {
            return Err(RegistryError::inconsistent(
                index,
                format!(
                    "data size {} became {}",
                    probe.data_size,
                    fetch.data.len()
                ),
            ));
        }

        let value_type = ValueType::from_raw(probe.value_type);
        let data = ValueData::decode(value_type, &fetch.data)?;
        let record = Arc::new(RegistryValue::new(probe.name, value_type, data));
        self.cache.insert(index, record.clone());
        Ok(record)
    }
}

impl Iterator for ValueIterator {
    type Item = Result<Arc<RegistryValue>>;

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

impl PartialEq for ValueIterator {
    fn eq(&self, other: &Self) -> bool {
        self.parent == other.parent && self.position == other.position
    }
}

impl Eq for ValueIterator {}

impl PartialOrd for ValueIterator {
    /// Orders by position; iterators over different keys are unordered.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.parent != other.parent {
            return None;
        }
        Some(self.position.cmp(&other.position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RootKind;
    use crate::memory::MemoryStore;

    fn utf16le(s: &str) -> Vec<u8> {
        s.encode_utf16().flat_map(u16::to_le_bytes).collect()
    }

    fn fixture() -> RegistryKey {
        let store = MemoryStore::new();
        let path = r"HKEY_LOCAL_MACHINE\SOFTWARE\Contoso";
        store.add_key(path);
        store.set_value(path, "InstallDir", 1, utf16le("C:\\Contoso\0"));
        store.set_value(path, "Version", 4, 7u32.to_le_bytes().to_vec());
        store.set_value(path, "Serial", 11, 0x1122334455667788u64.to_le_bytes().to_vec());
        let root = RegistryKey::open_root(Arc::new(store), RootKind::LocalMachine).unwrap();
        root.open_subkey("SOFTWARE")
            .unwrap()
            .open_subkey("Contoso")
            .unwrap()
    }

    #[test]
    fn test_enumerates_values() {
        let mut values = fixture().values();
        assert_eq!(values.len(), 3);

        let first = values.current().unwrap();
        assert_eq!(first.name(), "InstallDir");
        assert_eq!(first.value_type(), ValueType::String);

        values.seek(2);
        let third = values.current().unwrap();
        assert_eq!(third.as_qword(), Some(0x1122334455667788));
    }

    #[test]
    fn test_same_position_returns_cached_record() {
        let mut values = fixture().values();
        let first = values.entry(1).unwrap();
        let second = values.entry(1).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_empty_key_has_no_range() {
        let store = MemoryStore::new();
        store.add_key(r"HKEY_LOCAL_MACHINE\Empty");
        let root = RegistryKey::open_root(Arc::new(store), RootKind::LocalMachine).unwrap();
        let mut values = root.open_subkey("Empty").unwrap().values();

        assert_eq!(values.len(), 0);
        assert!(values.is_empty());
        let err = values.current().unwrap_err();
        assert!(matches!(err, RegistryError::OutOfRange { position: 0, count: 0 }));
    }

    #[test]
    fn test_cross_key_comparison_is_an_error() {
        let key = fixture();
        let parent = key.parent().unwrap().clone();
        let a = key.values();
        let b = parent.values();
        assert!(PartialOrd::partial_cmp(&a, &b).is_none());
        assert!(matches!(
            a.try_cmp(&b),
            Err(RegistryError::InvalidOperation(_))
        ));
    }
}
