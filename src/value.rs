//! Registry value types, payload decoding, and the decoded value record.

use crate::error::{RegistryError, Result};
use crate::utils::{read_utf16_string, split_multi_string};
use byteorder::{ByteOrder, LittleEndian};

/// Registry value data types.
///
/// Raw tag codes follow the platform's REG_* numbering. Codes outside the
/// known set are preserved as `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ValueType {
    /// No value type.
    None,

    /// String (UTF-16LE, usually NUL-terminated).
    String,

    /// String with unexpanded environment variable references.
    ExpandString,

    /// Binary data.
    Binary,

    /// 32-bit little-endian integer.
    Dword,

    /// Symbolic link target.
    Link,

    /// Sequence of NUL-separated strings.
    MultiString,

    /// Resource list.
    ResourceList,

    /// Full resource descriptor.
    FullResourceDescriptor,

    /// 64-bit little-endian integer.
    Qword,

    /// Unknown or non-standard value type. Contains the raw tag code.
    Unknown(u32),
}

impl ValueType {
    /// Maps a raw backend tag code to a value type.
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0 => ValueType::None,
            1 => ValueType::String,
            2 => ValueType::ExpandString,
            3 => ValueType::Binary,
            4 => ValueType::Dword,
            6 => ValueType::Link,
            7 => ValueType::MultiString,
            8 => ValueType::ResourceList,
            9 => ValueType::FullResourceDescriptor,
            11 => ValueType::Qword,
            other => ValueType::Unknown(other),
        }
    }

    /// Returns the raw tag code for this value type.
    pub fn as_raw(&self) -> u32 {
        match self {
            ValueType::None => 0,
            ValueType::String => 1,
            ValueType::ExpandString => 2,
            ValueType::Binary => 3,
            ValueType::Dword => 4,
            ValueType::Link => 6,
            ValueType::MultiString => 7,
            ValueType::ResourceList => 8,
            ValueType::FullResourceDescriptor => 9,
            ValueType::Qword => 11,
            ValueType::Unknown(raw) => *raw,
        }
    }

    /// Returns the name of this value type.
    pub fn name(&self) -> String {
        match self {
            ValueType::None => "REG_NONE".to_string(),
            ValueType::String => "REG_SZ".to_string(),
            ValueType::ExpandString => "REG_EXPAND_SZ".to_string(),
            ValueType::Binary => "REG_BINARY".to_string(),
            ValueType::Dword => "REG_DWORD".to_string(),
            ValueType::Link => "REG_LINK".to_string(),
            ValueType::MultiString => "REG_MULTI_SZ".to_string(),
            ValueType::ResourceList => "REG_RESOURCE_LIST".to_string(),
            ValueType::FullResourceDescriptor => "REG_FULL_RESOURCE_DESCRIPTOR".to_string(),
            ValueType::Qword => "REG_QWORD".to_string(),
            ValueType::Unknown(raw) => format!("REG_UNKNOWN_{:#010x}", raw),
        }
    }
}

/// Decoded registry value payload.
///
/// The concrete shape is fully determined by the value's type tag; see
/// [`ValueData::decode`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ValueData {
    /// No data, or a type this layer does not interpret.
    None,

    /// Binary data, copied verbatim.
    Binary(Vec<u8>),

    /// 32-bit integer.
    Dword(u32),

    /// 64-bit integer.
    Qword(u64),

    /// Single string.
    String(String),

    /// Ordered sequence of strings.
    MultiString(Vec<String>),
}

impl ValueData {
    /// Decodes a raw payload according to its type tag.
    ///
    /// The mapping is exhaustive: `Binary` copies bytes verbatim; `Dword`
    /// and `Qword` reinterpret fixed-width little-endian integers; `String`
    /// and `ExpandString` decode UTF-16LE up to the reported byte length;
    /// `MultiString` splits on embedded NULs; everything else (`None`,
    /// `Link`, the resource types, and unknown tags) carries no
    /// interpretation and decodes to [`ValueData::None`].
    ///
    /// # Errors
    ///
    /// Returns `Malformed` if a fixed-width tag's payload is shorter than
    /// the required width, or if a string payload has an odd byte length.
    pub fn decode(value_type: ValueType, data: &[u8]) -> Result<Self> {
        match value_type {
            ValueType::Binary => Ok(ValueData::Binary(data.to_vec())),

            ValueType::Dword => {
                if data.len() < 4 {
                    return Err(RegistryError::malformed(&value_type.name(), 4, data.len()));
                }
                Ok(ValueData::Dword(LittleEndian::read_u32(data)))
            }

            ValueType::Qword => {
                if data.len() < 8 {
                    return Err(RegistryError::malformed(&value_type.name(), 8, data.len()));
                }
                Ok(ValueData::Qword(LittleEndian::read_u64(data)))
            }

            ValueType::String | ValueType::ExpandString => {
                Ok(ValueData::String(read_utf16_string(data, &value_type.name())?))
            }

            ValueType::MultiString => Ok(ValueData::MultiString(split_multi_string(data)?)),

            ValueType::None
            | ValueType::Link
            | ValueType::ResourceList
            | ValueType::FullResourceDescriptor
            | ValueType::Unknown(_) => Ok(ValueData::None),
        }
    }
}

impl std::fmt::Display for ValueData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueData::None => f.write_str("(none)"),
            ValueData::Binary(bytes) => f.write_str(&hex::encode(bytes)),
            ValueData::Dword(d) => write!(f, "{} (0x{:08X})", d, d),
            ValueData::Qword(q) => write!(f, "{} (0x{:016X})", q, q),
            ValueData::String(s) => f.write_str(s),
            ValueData::MultiString(strings) => f.write_str(&strings.join(", ")),
        }
    }
}

/// One decoded, immutable registry value: name, type tag, and payload.
///
/// Produced by a [`crate::ValueIterator`] from a completed two-phase
/// probe/fetch, then shared read-only out of the iterator's cache.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RegistryValue {
    name: String,
    value_type: ValueType,
    data: ValueData,
}

impl RegistryValue {
    /// Creates a record from an already-decoded payload.
    pub(crate) fn new(name: String, value_type: ValueType, data: ValueData) -> Self {
        Self {
            name,
            value_type,
            data,
        }
    }

    /// Returns the name of the value.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the type tag of the value.
    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    /// Returns the decoded payload.
    pub fn data(&self) -> &ValueData {
        &self.data
    }

    /// Returns the payload bytes if this is a binary value.
    pub fn as_binary(&self) -> Option<&[u8]> {
        match &self.data {
            ValueData::Binary(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Returns the integer if this is a 32-bit value.
    pub fn as_dword(&self) -> Option<u32> {
        match &self.data {
            ValueData::Dword(d) => Some(*d),
            _ => None,
        }
    }

    /// Returns the integer if this is a 64-bit value.
    pub fn as_qword(&self) -> Option<u64> {
        match &self.data {
            ValueData::Qword(q) => Some(*q),
            _ => None,
        }
    }

    /// Returns the string if this is a string or expandable-string value.
    pub fn as_string(&self) -> Option<&str> {
        match &self.data {
            ValueData::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the string list if this is a multi-string value.
    pub fn as_multi_string(&self) -> Option<&[String]> {
        match &self.data {
            ValueData::MultiString(strings) => Some(strings),
            _ => None,
        }
    }
}
