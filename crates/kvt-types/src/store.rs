//! The datastore's value union.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Sub-type tag carried by a byte blob.
///
/// The tag records which codec produced the bytes so the read path can pick
/// the matching decoder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BytesType {
    /// Written by the user-registered serializer.
    Blob,
    /// Written by the built-in serializer.
    Native,
    /// Any tag this transcoder did not write.
    Other(u8),
}

impl BytesType {
    pub const BLOB_CODE: u8 = 4;
    pub const NATIVE_CODE: u8 = 11;

    pub fn code(self) -> u8 {
        match self {
            Self::Blob => Self::BLOB_CODE,
            Self::Native => Self::NATIVE_CODE,
            Self::Other(c) => c,
        }
    }

    pub fn from_code(code: u8) -> Self {
        match code {
            Self::BLOB_CODE => Self::Blob,
            Self::NATIVE_CODE => Self::Native,
            c => Self::Other(c),
        }
    }
}

impl fmt::Display for BytesType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blob => write!(f, "blob"),
            Self::Native => write!(f, "native"),
            Self::Other(c) => write!(f, "bytes({c})"),
        }
    }
}

/// A value as the datastore holds it.
///
/// Map keys are store values too; the transcoder only ever produces
/// `Integer` or `String` keys.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum StoreValue {
    Nil,
    Boolean(bool),
    Integer(i64),
    Double(f64),
    String(String),
    Bytes { kind: BytesType, data: Vec<u8> },
    List(Vec<StoreValue>),
    Map(Vec<(StoreValue, StoreValue)>),
    GeoJson(String),
}

impl StoreValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Nil => "nil",
            Self::Boolean(_) => "boolean",
            Self::Integer(_) => "integer",
            Self::Double(_) => "double",
            Self::String(_) => "string",
            Self::Bytes { .. } => "bytes",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::GeoJson(_) => "geojson",
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    pub fn is_container(&self) -> bool {
        matches!(self, Self::List(_) | Self::Map(_))
    }
}
