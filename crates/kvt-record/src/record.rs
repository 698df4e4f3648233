use std::fmt;

use kvt_types::{DynamicValue, KeyPolicy, StoreValue};
use serde::{Deserialize, Serialize};

use crate::key::Key;

/// A named value within a record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bin {
    pub name: String,
    pub value: StoreValue,
}

impl Bin {
    pub fn new(name: impl Into<String>, value: StoreValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Server-side record metadata.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMeta {
    /// Seconds until expiry; zero means the namespace default.
    pub ttl: u32,
    /// Number of times the record has been written.
    pub generation: u16,
}

/// A key, its metadata, and its bins.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub key: Key,
    pub meta: RecordMeta,
    pub bins: Vec<Bin>,
}

impl Record {
    pub fn new(key: Key, meta: RecordMeta, bins: Vec<Bin>) -> Self {
        Self { key, meta, bins }
    }

    pub fn bin(&self, name: &str) -> Option<&StoreValue> {
        self.bins.iter().find(|b| b.name == name).map(|b| &b.value)
    }
}

/// Optimistic-concurrency check applied to a write.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GenerationPolicy {
    #[default]
    Ignore,
    /// Write only if the stored generation equals this value.
    ExpectEqual(u16),
    /// Write only if this value is greater than the stored generation.
    ExpectGreater(u16),
}

impl GenerationPolicy {
    /// Whether a record currently at `current` may be written.
    pub fn permits(self, current: u16) -> bool {
        match self {
            Self::Ignore => true,
            Self::ExpectEqual(g) => current == g,
            Self::ExpectGreater(g) => g > current,
        }
    }
}

impl fmt::Display for GenerationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ignore => write!(f, "any"),
            Self::ExpectEqual(g) => write!(f, "== {g}"),
            Self::ExpectGreater(g) => write!(f, "< {g}"),
        }
    }
}

/// Metadata supplied with a write.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteMeta {
    pub ttl: u32,
    pub generation: GenerationPolicy,
}

impl WriteMeta {
    pub fn with_ttl(ttl: u32) -> Self {
        Self {
            ttl,
            ..Default::default()
        }
    }
}

/// Options for a read.
#[derive(Clone, Debug, PartialEq)]
pub struct GetOptions {
    /// Bin names to select, as a dynamic list of strings. `None` reads all bins.
    pub bins: Option<DynamicValue>,
    /// Overrides the configured key policy.
    pub key_policy: Option<KeyPolicy>,
    /// Render `metadata` in the result; when false it is `null`.
    pub with_metadata: bool,
}

impl Default for GetOptions {
    fn default() -> Self {
        Self {
            bins: None,
            key_policy: None,
            with_metadata: true,
        }
    }
}

impl GetOptions {
    pub fn select<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            bins: Some(DynamicValue::List(
                names.into_iter().map(|n| DynamicValue::String(n.into())).collect(),
            )),
            ..Default::default()
        }
    }
}
