use kvt_types::{Digest, DIGEST_SIZE};

use crate::key::PrimaryKey;

/// Domain-separated BLAKE3 key hasher.
///
/// The digest covers the namespace, the set, the primary key's type, and its
/// bytes. Namespace and set are length-prefixed so that moving bytes between
/// them changes the digest. The first [`DIGEST_SIZE`] bytes of the hash are
/// kept.
#[derive(Clone, Copy, Debug)]
pub struct DigestHasher {
    domain: &'static str,
}

impl DigestHasher {
    /// Hasher for record keys.
    pub const RECORD: Self = Self {
        domain: "kvt-record-key-v1",
    };

    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    pub fn domain(&self) -> &str {
        self.domain
    }

    /// Digest of `(namespace, set, key)`.
    pub fn digest(&self, namespace: &str, set: &str, key: &PrimaryKey) -> Digest {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        update_prefixed(&mut hasher, namespace.as_bytes());
        update_prefixed(&mut hasher, set.as_bytes());
        hasher.update(&[key.type_code()]);
        match key {
            PrimaryKey::Integer(n) => hasher.update(&n.to_be_bytes()),
            PrimaryKey::String(s) => hasher.update(s.as_bytes()),
        };
        let hash = hasher.finalize();
        let mut out = [0u8; DIGEST_SIZE];
        out.copy_from_slice(&hash.as_bytes()[..DIGEST_SIZE]);
        Digest::from_raw(out)
    }
}

fn update_prefixed(hasher: &mut blake3::Hasher, bytes: &[u8]) {
    hasher.update(&(bytes.len() as u64).to_be_bytes());
    hasher.update(bytes);
}
