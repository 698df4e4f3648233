//! Transcoding between host dynamic values and datastore values.
//!
//! The crate is layered leaf to root:
//!
//! - [`ValueCodec`] converts single scalars and owns the serializer policy
//!   dispatch, including the pluggable [`SerializerRegistry`].
//! - [`StaticPool`] is the per-call arena encoded nodes are linked through.
//! - [`ContainerWalker`] recurses over lists and maps, handing converted
//!   children to one of four [`Sink`]s.
//! - [`Transcoder`] ties a registry and a [`CodecConfig`] together for
//!   callers.
//!
//! ```rust
//! use kvt_codec::Transcoder;
//! use kvt_types::{DynamicValue, SerializerPolicy, StoreFeatures};
//!
//! let transcoder = Transcoder::default();
//! let value = DynamicValue::List(vec![1.into(), "two".into()]);
//! let stored = transcoder
//!     .encode(&value, StoreFeatures::full(), SerializerPolicy::Builtin)
//!     .unwrap();
//! assert_eq!(transcoder.decode(stored).unwrap(), value);
//! ```

mod bounded;
pub mod config;
pub mod pool;
pub mod scalar;
pub mod serializer;
pub mod sink;
pub mod transcoder;
pub mod walker;

pub use config::{CodecConfig, DEFAULT_MAX_DEPTH};
pub use pool::{NodeId, PoolStats, StaticPool};
pub use scalar::ValueCodec;
pub use serializer::{SerializerRegistry, UserDeserializer, UserSerializer};
pub use sink::{validate_bin_names, BinSink, IntKeyedSink, ListSink, Sink, StrKeyedSink, MAX_BIN_NAME_LEN};
pub use transcoder::Transcoder;
pub use walker::{ContainerWalker, MapKeyKind};
