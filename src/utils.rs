//! Utility functions for string decoding and timestamp conversion.

use crate::error::{RegistryError, Result};
use chrono::{DateTime, Utc};
use encoding_rs::UTF_16LE;

/// Seconds between 1601-01-01 (FILETIME epoch) and 1970-01-01 (Unix epoch).
const FILETIME_UNIX_DIFF_SECS: i64 = 11_644_473_600;

/// FILETIME ticks (100ns) per second.
const FILETIME_TICKS_PER_SEC: u64 = 10_000_000;

/// Decodes a UTF-16LE string from a byte slice, trimming trailing NULs.
///
/// Registry strings carry their length out of band (the probe's byte-length
/// field) and are not necessarily NUL-terminated. When a terminator is
/// included in the reported length, it shows up here as trailing NUL code
/// units; those are trimmed from the end only, never scanned for in the
/// interior. Invalid code units (e.g. unpaired surrogates) are replaced
/// rather than rejected.
///
/// # Errors
///
/// Returns `Malformed` if the byte length is odd (UTF-16 requires 2-byte
/// units).
pub fn read_utf16_string(data: &[u8], type_name: &str) -> Result<String> {
    if data.is_empty() {
        return Ok(String::new());
    }

    if data.len() % 2 != 0 {
        return Err(RegistryError::malformed(type_name, data.len() + 1, data.len()));
    }

    let (decoded, _encoding, _had_errors) = UTF_16LE.decode(data);

    Ok(decoded.trim_end_matches('\0').to_string())
}

/// Splits a REG_MULTI_SZ byte buffer into its ordered list of strings.
///
/// The buffer is a sequence of UTF-16LE runs, each terminated by a NUL code
/// unit, with one extra NUL terminating the list. Runs are emitted in order;
/// the list terminator's empty run is dropped, so a buffer built from `[]`
/// or `[""]` round-trips exactly. A final run without a terminator is still
/// emitted.
///
/// # Errors
///
/// Returns `Malformed` if the byte length is odd.
pub fn split_multi_string(data: &[u8]) -> Result<Vec<String>> {
    if data.len() % 2 != 0 {
        return Err(RegistryError::malformed(
            "REG_MULTI_SZ",
            data.len() + 1,
            data.len(),
        ));
    }

    let mut strings = Vec::new();
    let mut run_start = 0usize;
    let unit_count = data.len() / 2;

    for unit_index in 0..unit_count {
        let byte_index = unit_index * 2;
        let unit = u16::from_le_bytes([data[byte_index], data[byte_index + 1]]);
        if unit == 0 {
            let (run, _encoding, _had_errors) = UTF_16LE.decode(&data[run_start..byte_index]);
            strings.push(run.into_owned());
            run_start = byte_index + 2;
        }
    }

    // Run after the last NUL, present only in non-terminated buffers.
    if run_start < data.len() {
        let (run, _encoding, _had_errors) = UTF_16LE.decode(&data[run_start..]);
        strings.push(run.into_owned());
    }

    // The empty run before the list terminator is not an entry.
    if strings.last().is_some_and(String::is_empty) && data.len() >= 2 {
        let tail = u16::from_le_bytes([data[data.len() - 2], data[data.len() - 1]]);
        if tail == 0 {
            strings.pop();
        }
    }

    Ok(strings)
}

/// Converts a FILETIME value (100ns ticks since 1601-01-01) to a UTC
/// datetime.
///
/// Returns `None` if the timestamp is outside the representable range.
pub fn filetime_to_datetime(filetime: u64) -> Option<DateTime<Utc>> {
    let seconds = (filetime / FILETIME_TICKS_PER_SEC) as i64 - FILETIME_UNIX_DIFF_SECS;
    let nanos = (filetime % FILETIME_TICKS_PER_SEC) * 100;

    DateTime::from_timestamp(seconds, nanos as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utf16le(s: &str) -> Vec<u8> {
        s.encode_utf16().flat_map(u16::to_le_bytes).collect()
    }

    #[test]
    fn test_read_utf16_string() {
        assert_eq!(read_utf16_string(&utf16le("Hello"), "REG_SZ").unwrap(), "Hello");
        assert_eq!(read_utf16_string(&[], "REG_SZ").unwrap(), "");

        // Terminator included in the reported length is trimmed.
        assert_eq!(
            read_utf16_string(&utf16le("Hello\0"), "REG_SZ").unwrap(),
            "Hello"
        );
    }

    #[test]
    fn test_read_utf16_string_preserves_interior_nul() {
        // Only trailing NULs are trimmed; nothing scans the interior.
        assert_eq!(
            read_utf16_string(&utf16le("a\0b\0"), "REG_SZ").unwrap(),
            "a\0b"
        );
    }

    #[test]
    fn test_read_utf16_string_odd_length() {
        let err = read_utf16_string(&[0x41, 0x00, 0x42], "REG_SZ").unwrap_err();
        assert!(matches!(err, RegistryError::Malformed { .. }));
    }

    #[test]
    fn test_split_multi_string() {
        let buffer = utf16le("first\0second\0\0");
        assert_eq!(
            split_multi_string(&buffer).unwrap(),
            vec!["first".to_string(), "second".to_string()]
        );
    }

    #[test]
    fn test_split_multi_string_empty_list() {
        // An empty list encodes as the bare terminator.
        assert_eq!(split_multi_string(&utf16le("\0")).unwrap(), Vec::<String>::new());
        assert_eq!(split_multi_string(&[]).unwrap(), Vec::<String>::new());
    }

    #[test]
    fn test_split_multi_string_single_empty_string() {
        assert_eq!(split_multi_string(&utf16le("\0\0")).unwrap(), vec![String::new()]);
    }

    #[test]
    fn test_split_multi_string_trailing_empty_entry() {
        let buffer = utf16le("a\0\0\0");
        assert_eq!(
            split_multi_string(&buffer).unwrap(),
            vec!["a".to_string(), String::new()]
        );
    }

    #[test]
    fn test_split_multi_string_unterminated() {
        // Missing list terminator: the final run still counts.
        let buffer = utf16le("a\0b");
        assert_eq!(
            split_multi_string(&buffer).unwrap(),
            vec!["a".to_string(), "b".to_string()]
        );
    }

    #[test]
    fn test_filetime_conversion() {
        // 1601-01-01 00:00:00 UTC
        let dt = filetime_to_datetime(0).unwrap();
        assert_eq!(dt.timestamp(), -FILETIME_UNIX_DIFF_SECS);

        // 1970-01-01 00:00:00 UTC
        let unix_epoch = FILETIME_UNIX_DIFF_SECS as u64 * FILETIME_TICKS_PER_SEC;
        assert_eq!(filetime_to_datetime(unix_epoch).unwrap().timestamp(), 0);

        // Sub-second ticks survive as nanoseconds.
        let dt = filetime_to_datetime(unix_epoch + 1).unwrap();
        assert_eq!(dt.timestamp_subsec_nanos(), 100);
    }
}
