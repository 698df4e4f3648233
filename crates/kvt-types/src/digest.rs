use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CodecError, CodecResult};

/// Width of a record digest in bytes.
pub const DIGEST_SIZE: usize = 20;

/// Fixed-width identifier of a record within a namespace.
///
/// A `Digest` is normally derived from `(namespace, set, primary key)`, but a
/// caller may also supply one directly, either as a full 20-byte value or as
/// shorter raw material that is zero-padded to width.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Digest([u8; DIGEST_SIZE]);

impl Digest {
    /// Create a `Digest` from a pre-computed value.
    pub const fn from_raw(bytes: [u8; DIGEST_SIZE]) -> Self {
        Self(bytes)
    }

    /// Build a digest from caller-supplied raw material.
    ///
    /// The material is copied into the front of the digest and the remainder
    /// is zero-filled. Empty material and material wider than
    /// [`DIGEST_SIZE`] are client errors.
    pub fn from_material(material: &[u8]) -> CodecResult<Self> {
        if material.is_empty() {
            return Err(CodecError::client("digest must not be empty"));
        }
        if material.len() > DIGEST_SIZE {
            return Err(CodecError::client(format!(
                "digest max length exceeded: {} bytes (max {DIGEST_SIZE})",
                material.len()
            )));
        }
        let mut arr = [0u8; DIGEST_SIZE];
        arr[..material.len()].copy_from_slice(material);
        Ok(Self(arr))
    }

    /// The raw 20-byte value.
    pub fn as_bytes(&self) -> &[u8; DIGEST_SIZE] {
        &self.0
    }

    /// Hex-encoded string representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Parse from a 40-character hex string.
    pub fn from_hex(s: &str) -> CodecResult<Self> {
        let bytes = hex::decode(s)
            .map_err(|e| CodecError::parameter(format!("invalid digest hex: {e}")))?;
        if bytes.len() != DIGEST_SIZE {
            return Err(CodecError::parameter(format!(
                "invalid digest length: expected {DIGEST_SIZE}, got {}",
                bytes.len()
            )));
        }
        let mut arr = [0u8; DIGEST_SIZE];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.short_hex())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<[u8; DIGEST_SIZE]> for Digest {
    fn from(bytes: [u8; DIGEST_SIZE]) -> Self {
        Self(bytes)
    }
}

impl From<Digest> for [u8; DIGEST_SIZE] {
    fn from(digest: Digest) -> Self {
        digest.0
    }
}
