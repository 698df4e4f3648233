//! Record keys: building them, digesting them, and moving them to and from
//! the dynamic value model.

use std::fmt;

use kvt_types::{CodecError, CodecResult, Digest, DynamicValue, KeyPolicy};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::digest::DigestHasher;

/// Maximum namespace length in bytes.
pub const MAX_NAMESPACE_LEN: usize = 31;
/// Maximum set name length in bytes.
pub const MAX_SET_LEN: usize = 63;

const FIELD_NAMESPACE: &str = "ns";
const FIELD_SET: &str = "set";
const FIELD_KEY: &str = "key";
const FIELD_DIGEST: &str = "digest";

/// A user-supplied primary key value.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimaryKey {
    Integer(i64),
    String(String),
}

impl PrimaryKey {
    /// Type byte mixed into the digest.
    pub fn type_code(&self) -> u8 {
        match self {
            Self::Integer(_) => 1,
            Self::String(_) => 3,
        }
    }

    pub fn to_dynamic(&self) -> DynamicValue {
        match self {
            Self::Integer(n) => DynamicValue::Int(*n),
            Self::String(s) => DynamicValue::String(s.clone()),
        }
    }
}

impl fmt::Display for PrimaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s}"),
        }
    }
}

/// How a caller identifies a record within `(namespace, set)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyIdentity {
    Integer(i64),
    String(String),
    /// Raw digest material, zero-padded to the digest width.
    Digest(Vec<u8>),
}

impl KeyIdentity {
    /// Digest material taken from an integer's decimal form.
    pub fn digest_from_integer(n: i64) -> Self {
        Self::Digest(n.to_string().into_bytes())
    }

    /// Digest material taken from a string's bytes.
    pub fn digest_from_str(s: &str) -> Self {
        Self::Digest(s.as_bytes().to_vec())
    }
}

/// A fully resolved record key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Key {
    namespace: String,
    set: String,
    value: Option<PrimaryKey>,
    digest: Digest,
}

impl Key {
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn set(&self) -> &str {
        &self.set
    }

    /// The primary key, if the key was built from one.
    pub fn value(&self) -> Option<&PrimaryKey> {
        self.value.as_ref()
    }

    pub fn digest(&self) -> Digest {
        self.digest
    }

    /// The same key without its primary key value.
    pub fn without_value(&self) -> Self {
        Self {
            value: None,
            ..self.clone()
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:", self.namespace, self.set)?;
        match &self.value {
            Some(value) => write!(f, "{value}"),
            None => write!(f, "#{}", self.digest.short_hex()),
        }
    }
}

fn validate_scope(namespace: &str, set: &str) -> CodecResult<()> {
    if namespace.is_empty() {
        return Err(CodecError::parameter("namespace must not be empty"));
    }
    if namespace.len() > MAX_NAMESPACE_LEN {
        return Err(CodecError::parameter(format!(
            "namespace '{namespace}' exceeds {MAX_NAMESPACE_LEN} bytes"
        )));
    }
    if set.len() > MAX_SET_LEN {
        return Err(CodecError::parameter(format!(
            "set '{set}' exceeds {MAX_SET_LEN} bytes"
        )));
    }
    Ok(())
}

/// Build a key from its scope and identity.
pub fn build_key(namespace: &str, set: &str, identity: KeyIdentity) -> CodecResult<Key> {
    validate_scope(namespace, set)?;
    let (value, digest) = match identity {
        KeyIdentity::Integer(n) => {
            let pk = PrimaryKey::Integer(n);
            let digest = DigestHasher::RECORD.digest(namespace, set, &pk);
            (Some(pk), digest)
        }
        KeyIdentity::String(s) => {
            if s.is_empty() {
                return Err(CodecError::parameter("primary key must not be an empty string"));
            }
            let pk = PrimaryKey::String(s);
            let digest = DigestHasher::RECORD.digest(namespace, set, &pk);
            (Some(pk), digest)
        }
        KeyIdentity::Digest(material) => (None, Digest::from_material(&material)?),
    };
    trace!(namespace, set, digest = %digest.short_hex(), "key built");
    Ok(Key {
        namespace: namespace.to_string(),
        set: set.to_string(),
        value,
        digest,
    })
}

/// Build a key around a complete, caller-supplied digest.
pub fn key_with_digest(namespace: &str, set: &str, digest: Digest) -> CodecResult<Key> {
    validate_scope(namespace, set)?;
    Ok(Key {
        namespace: namespace.to_string(),
        set: set.to_string(),
        value: None,
        digest,
    })
}

/// The 20-byte digest identifying `key`.
pub fn digest_of(key: &Key) -> Digest {
    key.digest
}

/// Render a key as `{ns, set, key, digest}`, including the primary key
/// whenever the key has one.
pub fn key_to_dynamic(key: &Key) -> DynamicValue {
    render_key(key, true)
}

/// Render a key for a read result: the primary key is included only when
/// the key has one and `policy` is [`KeyPolicy::Send`].
pub fn key_to_dynamic_with_policy(key: &Key, policy: KeyPolicy) -> DynamicValue {
    render_key(key, policy == KeyPolicy::Send)
}

fn render_key(key: &Key, include_value: bool) -> DynamicValue {
    let value = match (&key.value, include_value) {
        (Some(pk), true) => pk.to_dynamic(),
        _ => DynamicValue::Null,
    };
    DynamicValue::map([
        (FIELD_NAMESPACE, DynamicValue::String(key.namespace.clone())),
        (FIELD_SET, DynamicValue::String(key.set.clone())),
        (FIELD_KEY, value),
        (FIELD_DIGEST, DynamicValue::String(key.digest.to_hex())),
    ])
}

/// Parse a key from a dynamic `{ns, set, key, digest}` structure, the
/// shape [`key_to_dynamic`] renders.
///
/// A `digest` field of exactly 40 hex characters is a complete digest;
/// any other string or integer is raw digest material. When both `key` and
/// a complete digest are present the digest must match the one computed
/// from the key. When both `key` and digest material are present, the field
/// that comes last wins.
pub fn key_from_dynamic(value: &DynamicValue) -> CodecResult<Key> {
    let entries = value.as_map().ok_or_else(|| {
        CodecError::parameter(format!("key must be a map, found {}", value.kind_name()))
    })?;

    let mut namespace = None;
    let mut set = None;
    let mut key = None;
    let mut digest = None;
    let mut digest_last = false;
    for (field, item) in entries {
        let name = field.as_str().ok_or_else(|| {
            CodecError::parameter(format!("key field names must be strings, found {}", field.kind_name()))
        })?;
        let slot = match name {
            FIELD_NAMESPACE => &mut namespace,
            FIELD_SET => &mut set,
            FIELD_KEY => &mut key,
            FIELD_DIGEST => &mut digest,
            other => return Err(CodecError::parameter(format!("unknown key field '{other}'"))),
        };
        if !item.is_null() {
            *slot = Some(item);
            match name {
                FIELD_KEY => digest_last = false,
                FIELD_DIGEST => digest_last = true,
                _ => {}
            }
        }
    }

    let namespace = required_str(namespace, FIELD_NAMESPACE)?;
    let set = required_str(set, FIELD_SET)?;

    match (key, digest) {
        (Some(pk), Some(DynamicValue::String(s))) if is_full_hex_digest(s) => {
            let expected = Digest::from_hex(s)?;
            let key = build_key(namespace, set, primary_key_identity(pk)?)?;
            if key.digest != expected {
                return Err(CodecError::parameter(format!(
                    "digest {} does not match key digest {}",
                    expected.to_hex(),
                    key.digest.to_hex()
                )));
            }
            Ok(key)
        }
        (Some(_), Some(d)) if digest_last => digest_key(namespace, set, d),
        (Some(pk), _) => build_key(namespace, set, primary_key_identity(pk)?),
        (None, Some(d)) => digest_key(namespace, set, d),
        (None, None) => Err(CodecError::client("key requires a primary key or a digest")),
    }
}

fn primary_key_identity(pk: &DynamicValue) -> CodecResult<KeyIdentity> {
    match pk {
        DynamicValue::Int(n) => Ok(KeyIdentity::Integer(*n)),
        DynamicValue::String(s) => Ok(KeyIdentity::String(s.clone())),
        other => Err(CodecError::parameter(format!(
            "primary key must be an integer or string, found {}",
            other.kind_name()
        ))),
    }
}

fn digest_key(namespace: &str, set: &str, digest: &DynamicValue) -> CodecResult<Key> {
    match digest {
        DynamicValue::String(s) if is_full_hex_digest(s) => {
            key_with_digest(namespace, set, Digest::from_hex(s)?)
        }
        DynamicValue::String(s) => build_key(namespace, set, KeyIdentity::digest_from_str(s)),
        DynamicValue::Int(n) => build_key(namespace, set, KeyIdentity::digest_from_integer(*n)),
        other => Err(CodecError::parameter(format!(
            "digest must be a string or integer, found {}",
            other.kind_name()
        ))),
    }
}

fn required_str<'v>(value: Option<&'v DynamicValue>, field: &str) -> CodecResult<&'v str> {
    match value {
        Some(DynamicValue::String(s)) => Ok(s),
        Some(other) => Err(CodecError::parameter(format!(
            "key field '{field}' must be a string, found {}",
            other.kind_name()
        ))),
        None => Err(CodecError::client(format!("key field '{field}' is missing"))),
    }
}

fn is_full_hex_digest(s: &str) -> bool {
    s.len() == 2 * kvt_types::DIGEST_SIZE && s.bytes().all(|b| b.is_ascii_hexdigit())
}
