//! Integration tests for the two-phase value read protocol and payload
//! decoding, including property tests over the integer and multi-string
//! layouts.

use proptest::prelude::*;
use reg_view::{
    Access, Handle, KeyMetadata, MemoryStore, RegistryError, RegistryKey, RootKind, StoreBackend,
    ValueData, ValueFetch, ValueProbe, ValueType,
};
use std::sync::{Arc, Mutex};

fn utf16le(s: &str) -> Vec<u8> {
    s.encode_utf16().flat_map(u16::to_le_bytes).collect()
}

/// Encodes a string list in the store's multi-string layout: each entry
/// NUL-terminated, then one extra NUL terminating the list.
fn encode_multi(strings: &[String]) -> Vec<u8> {
    let mut joined = String::new();
    for s in strings {
        joined.push_str(s);
        joined.push('\0');
    }
    joined.push('\0');
    utf16le(&joined)
}

fn key_with_values(values: &[(&str, u32, Vec<u8>)]) -> RegistryKey {
    let store = MemoryStore::new();
    let path = r"HKEY_CURRENT_USER\Software\Fixture";
    store.add_key(path);
    for (name, value_type, data) in values {
        store.set_value(path, name, *value_type, data.clone());
    }
    let root = RegistryKey::open_current_user(Arc::new(store)).unwrap();
    root.open_subkey("Software")
        .unwrap()
        .open_subkey("Fixture")
        .unwrap()
}

#[test]
fn test_binary_is_copied_verbatim() {
    let bytes = vec![0x00, 0xFF, 0x10, 0x20];
    let key = key_with_values(&[("Blob", 3, bytes.clone())]);
    let value = key.values().entry(0).unwrap();
    assert_eq!(value.value_type(), ValueType::Binary);
    assert_eq!(value.as_binary(), Some(bytes.as_slice()));
}

#[test]
fn test_string_and_expand_string_share_payload_shape() {
    let key = key_with_values(&[
        ("Plain", 1, utf16le("hello\0")),
        ("Expand", 2, utf16le("%PATH%;C:\\bin\0")),
    ]);
    let mut values = key.values();

    let plain = values.entry(0).unwrap();
    assert_eq!(plain.value_type(), ValueType::String);
    assert_eq!(plain.as_string(), Some("hello"));

    let expand = values.entry(1).unwrap();
    assert_eq!(expand.value_type(), ValueType::ExpandString);
    assert_eq!(expand.as_string(), Some("%PATH%;C:\\bin"));
}

#[test]
fn test_unterminated_string_is_taken_at_reported_length() {
    let key = key_with_values(&[("NoNul", 1, utf16le("abc"))]);
    let value = key.values().entry(0).unwrap();
    assert_eq!(value.as_string(), Some("abc"));
}

#[test]
fn test_multi_string_layouts() {
    let key = key_with_values(&[
        ("Two", 7, encode_multi(&["first".into(), "second".into()])),
        ("Empty", 7, encode_multi(&[])),
        ("OneEmpty", 7, encode_multi(&[String::new()])),
    ]);
    let mut values = key.values();

    assert_eq!(
        values.entry(0).unwrap().as_multi_string(),
        Some(["first".to_string(), "second".to_string()].as_slice())
    );
    let empty: &[String] = &[];
    assert_eq!(values.entry(1).unwrap().as_multi_string(), Some(empty));
    assert_eq!(
        values.entry(2).unwrap().as_multi_string(),
        Some([String::new()].as_slice())
    );
}

#[test]
fn test_uninterpreted_tags_have_absent_payload() {
    // REG_NONE, REG_LINK, REG_RESOURCE_LIST, REG_FULL_RESOURCE_DESCRIPTOR,
    // and an unknown tag all decode to an absent payload.
    let key = key_with_values(&[
        ("None", 0, vec![1, 2, 3]),
        ("Link", 6, utf16le("target\0")),
        ("Resources", 8, vec![0xAA; 16]),
        ("Descriptor", 9, vec![0xBB; 16]),
        ("Mystery", 0xFFFF, vec![0xCC; 4]),
    ]);
    for (index, expected_type) in [
        (0, ValueType::None),
        (1, ValueType::Link),
        (2, ValueType::ResourceList),
        (3, ValueType::FullResourceDescriptor),
        (4, ValueType::Unknown(0xFFFF)),
    ] {
        let value = key.values().entry(index).unwrap();
        assert_eq!(value.value_type(), expected_type);
        assert_eq!(value.data(), &ValueData::None);
    }
}

#[test]
fn test_short_dword_is_malformed() {
    let key = key_with_values(&[("Short", 4, vec![0x01, 0x02])]);
    let err = key.values().entry(0).unwrap_err();
    assert!(matches!(
        err,
        RegistryError::Malformed {
            expected: 4,
            actual: 2,
            ..
        }
    ));
}

#[test]
fn test_short_qword_is_malformed() {
    let key = key_with_values(&[("Short", 11, vec![0u8; 4])]);
    let err = key.values().entry(0).unwrap_err();
    assert!(matches!(err, RegistryError::Malformed { expected: 8, .. }));
}

#[test]
fn test_oversized_integer_reads_leading_bytes() {
    // A dword with trailing junk still decodes its first four bytes.
    let mut data = 0x01020304u32.to_le_bytes().to_vec();
    data.extend_from_slice(&[0xEE, 0xEE]);
    let key = key_with_values(&[("Padded", 4, data)]);
    assert_eq!(key.values().entry(0).unwrap().as_dword(), Some(0x01020304));
}

proptest! {
    #[test]
    fn prop_dword_round_trip(n in any::<u32>()) {
        let decoded = ValueData::decode(ValueType::Dword, &n.to_le_bytes()).unwrap();
        prop_assert_eq!(decoded, ValueData::Dword(n));
    }

    #[test]
    fn prop_qword_round_trip(n in any::<u64>()) {
        let decoded = ValueData::decode(ValueType::Qword, &n.to_le_bytes()).unwrap();
        prop_assert_eq!(decoded, ValueData::Qword(n));
    }

    #[test]
    fn prop_multi_string_round_trip(strings in proptest::collection::vec("[^\\x00]*", 0..6)) {
        let encoded = encode_multi(&strings);
        let decoded = ValueData::decode(ValueType::MultiString, &encoded).unwrap();
        prop_assert_eq!(decoded, ValueData::MultiString(strings));
    }

    #[test]
    fn prop_string_round_trip(s in "[^\\x00]*") {
        let decoded = ValueData::decode(ValueType::String, &utf16le(&s)).unwrap();
        prop_assert_eq!(decoded, ValueData::String(s));
    }
}

/// A backend that rewrites one value between the caller's probe and fetch,
/// standing in for an external writer racing the read.
struct DriftingStore {
    store: MemoryStore,
    drift: Mutex<Option<(String, String, u32, Vec<u8>)>>,
}

impl DriftingStore {
    fn new(store: MemoryStore) -> Self {
        Self {
            store,
            drift: Mutex::new(None),
        }
    }

    fn drift_on_next_fetch(&self, path: &str, name: &str, value_type: u32, data: Vec<u8>) {
        *self.drift.lock().unwrap() = Some((path.into(), name.into(), value_type, data));
    }
}

impl StoreBackend for DriftingStore {
    fn open_root(&self, root: RootKind) -> reg_view::Result<Handle> {
        self.store.open_root(root)
    }

    fn open_child(&self, parent: Handle, name: &str, access: Access) -> reg_view::Result<Handle> {
        self.store.open_child(parent, name, access)
    }

    fn query_metadata(&self, handle: Handle) -> reg_view::Result<KeyMetadata> {
        self.store.query_metadata(handle)
    }

    fn enumerate_child_name(
        &self,
        handle: Handle,
        index: u32,
        max_name_len: u32,
    ) -> reg_view::Result<String> {
        self.store.enumerate_child_name(handle, index, max_name_len)
    }

    fn probe_value(
        &self,
        handle: Handle,
        index: u32,
        max_name_len: u32,
        max_data_len: u32,
    ) -> reg_view::Result<ValueProbe> {
        self.store.probe_value(handle, index, max_name_len, max_data_len)
    }

    fn fetch_value(
        &self,
        handle: Handle,
        index: u32,
        buffer_size: u32,
    ) -> reg_view::Result<ValueFetch> {
        if let Some((path, name, value_type, data)) = self.drift.lock().unwrap().take() {
            self.store.set_value(&path, &name, value_type, data);
        }
        self.store.fetch_value(handle, index, buffer_size)
    }

    fn close(&self, handle: Handle) {
        self.store.close(handle)
    }
}

#[test]
fn test_size_drift_between_probe_and_fetch_is_inconsistent() {
    let store = MemoryStore::new();
    let path = r"HKEY_CURRENT_USER\Racy";
    store.add_key(path);
    store.set_value(path, "Value", 3, vec![1, 2, 3, 4]);

    let drifting = Arc::new(DriftingStore::new(store));
    drifting.drift_on_next_fetch(path, "Value", 3, vec![1, 2]);

    let root = RegistryKey::open_current_user(drifting.clone()).unwrap();
    let key = root.open_subkey("Racy").unwrap();
    let mut values = key.values();

    let err = values.entry(0).unwrap_err();
    assert!(matches!(err, RegistryError::Inconsistent { index: 0, .. }));

    // The failed position was not cached: with the store now quiescent,
    // the same position reads cleanly.
    let value = values.entry(0).unwrap();
    assert_eq!(value.as_binary(), Some([1u8, 2].as_slice()));
}

#[test]
fn test_type_drift_between_probe_and_fetch_is_inconsistent() {
    let store = MemoryStore::new();
    let path = r"HKEY_CURRENT_USER\Racy";
    store.add_key(path);
    store.set_value(path, "Value", 4, 9u32.to_le_bytes().to_vec());

    let drifting = Arc::new(DriftingStore::new(store));
    drifting.drift_on_next_fetch(path, "Value", 11, 9u32.to_le_bytes().to_vec());

    let root = RegistryKey::open_current_user(drifting.clone()).unwrap();
    let mut values = root.open_subkey("Racy").unwrap().values();

    let err = values.entry(0).unwrap_err();
    assert!(matches!(err, RegistryError::Inconsistent { index: 0, .. }));
}

#[test]
fn test_zero_value_key() {
    let key = key_with_values(&[]);
    let mut values = key.values();
    assert_eq!(values.len(), 0);
    assert!(matches!(
        values.entry(0).unwrap_err(),
        RegistryError::OutOfRange { position: 0, count: 0 }
    ));
    assert!(values.next().is_none());
}
