use serde::{Deserialize, Serialize};

/// How host objects without a native store representation are persisted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SerializerPolicy {
    /// Refuse to store such values.
    None,
    /// Use the transcoder's built-in serialization.
    #[default]
    Builtin,
    /// Use the registered user serializer.
    User,
}

/// Whether the primary key travels with the record or only its digest.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyPolicy {
    #[default]
    Digest,
    Send,
}

/// Capabilities reported by the connected store.
///
/// Read once at the start of each top-level call and threaded through the
/// conversion, so a single call never observes a change mid-way.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreFeatures {
    /// The store has a native 64-bit float type.
    pub supports_double: bool,
    /// The store has a native geospatial type.
    pub supports_geo: bool,
}

impl StoreFeatures {
    /// A store with every optional capability.
    pub const fn full() -> Self {
        Self {
            supports_double: true,
            supports_geo: true,
        }
    }

    /// A store with no optional capabilities.
    pub const fn minimal() -> Self {
        Self {
            supports_double: false,
            supports_geo: false,
        }
    }
}

impl Default for StoreFeatures {
    fn default() -> Self {
        Self::full()
    }
}
