//! Key and record transcoding for kvt.
//!
//! This crate sits on top of `kvt-codec` and adds the two record-level
//! transforms:
//!
//! - **KeyCodec**: [`build_key`], [`digest_of`], [`key_to_dynamic`], and
//!   [`key_from_dynamic`] move a `(namespace, set, primary key | digest)`
//!   triple between the dynamic model and a resolved [`Key`].
//! - **RecordCodec**: [`RecordCodec::put_record`] and
//!   [`RecordCodec::get_record`] convert whole records, with the storage
//!   collaborator behind the [`RecordStore`] trait.
//!
//! # Storage Backends
//!
//! - [`InMemoryRecordStore`] -- `HashMap`-based store for tests and embedding

pub mod codec;
pub mod digest;
pub mod error;
pub mod key;
pub mod memory;
pub mod record;
pub mod store;

pub use codec::RecordCodec;
pub use digest::DigestHasher;
pub use error::{StoreError, StoreResult};
pub use key::{
    build_key, digest_of, key_from_dynamic, key_to_dynamic, key_to_dynamic_with_policy,
    key_with_digest, Key, KeyIdentity, PrimaryKey,
};
pub use memory::InMemoryRecordStore;
pub use record::{Bin, GenerationPolicy, GetOptions, Record, RecordMeta, WriteMeta};
pub use store::RecordStore;
