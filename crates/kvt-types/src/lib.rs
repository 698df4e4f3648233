//! Foundation types for kvt, the key-value transcoder.
//!
//! This crate defines the two value systems the transcoder moves between and
//! the vocabulary shared by every other kvt crate. Every other kvt crate
//! depends on `kvt-types`.
//!
//! # Key Types
//!
//! - [`DynamicValue`] -- the host's nullable, arbitrarily nested value model
//! - [`OpaqueObject`] -- host objects with no native store representation
//! - [`StoreValue`] -- the datastore's fixed, strongly typed value union
//! - [`BytesType`] -- sub-type tag telling the decoder which codec wrote a blob
//! - [`Digest`] -- 20-byte record identifier derived from a key
//! - [`CodecError`] -- parameter / client / serialization / server taxonomy
//! - [`SerializerPolicy`], [`KeyPolicy`], [`StoreFeatures`] -- per-call policy

pub mod digest;
pub mod dynamic;
pub mod error;
pub mod policy;
pub mod store;

pub use digest::{Digest, DIGEST_SIZE};
pub use dynamic::{DynamicValue, OpaqueObject, GEOJSON_CLASS};
pub use error::{CodecError, CodecResult, ErrorKind};
pub use policy::{KeyPolicy, SerializerPolicy, StoreFeatures};
pub use store::{BytesType, StoreValue};
