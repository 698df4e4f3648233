use std::fmt;

use bincode::Options;
use kvt_types::{CodecError, CodecResult, DynamicValue};
use tracing::{debug, warn};

use crate::bounded::{BoundedValue, DEPTH_EXCEEDED};

/// Converts a host value into bytes on behalf of the `User` policy.
///
/// Failures are reported as plain messages; the registry wraps them into
/// serialization errors naming the callback.
pub trait UserSerializer: Send + Sync {
    fn serialize(&self, value: &DynamicValue) -> Result<Vec<u8>, String>;
}

/// Reconstructs a host value from bytes written by a [`UserSerializer`].
pub trait UserDeserializer: Send + Sync {
    fn deserialize(&self, bytes: &[u8]) -> Result<DynamicValue, String>;
}

impl<F> UserSerializer for F
where
    F: Fn(&DynamicValue) -> Result<Vec<u8>, String> + Send + Sync,
{
    fn serialize(&self, value: &DynamicValue) -> Result<Vec<u8>, String> {
        self(value)
    }
}

impl<F> UserDeserializer for F
where
    F: Fn(&[u8]) -> Result<DynamicValue, String> + Send + Sync,
{
    fn deserialize(&self, bytes: &[u8]) -> Result<DynamicValue, String> {
        self(bytes)
    }
}

/// Holds at most one user serializer and one user deserializer.
///
/// Built once while wiring the application, then shared (typically behind an
/// `Arc`) with every transcoding call. Registration takes `&mut self`, so it
/// cannot race with conversions that hold a shared reference.
#[derive(Default)]
pub struct SerializerRegistry {
    serializer: Option<Box<dyn UserSerializer>>,
    deserializer: Option<Box<dyn UserDeserializer>>,
}

impl SerializerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the user serializer, replacing any previous one.
    pub fn register_serializer(&mut self, serializer: impl UserSerializer + 'static) {
        if self.serializer.is_some() {
            warn!("replacing registered user serializer");
        } else {
            debug!("user serializer registered");
        }
        self.serializer = Some(Box::new(serializer));
    }

    /// Install the user deserializer, replacing any previous one.
    pub fn register_deserializer(&mut self, deserializer: impl UserDeserializer + 'static) {
        if self.deserializer.is_some() {
            warn!("replacing registered user deserializer");
        } else {
            debug!("user deserializer registered");
        }
        self.deserializer = Some(Box::new(deserializer));
    }

    /// Builder form of the two registration calls.
    pub fn with_user_pair(
        mut self,
        serializer: impl UserSerializer + 'static,
        deserializer: impl UserDeserializer + 'static,
    ) -> Self {
        self.register_serializer(serializer);
        self.register_deserializer(deserializer);
        self
    }

    pub fn has_serializer(&self) -> bool {
        self.serializer.is_some()
    }

    pub fn has_deserializer(&self) -> bool {
        self.deserializer.is_some()
    }

    pub(crate) fn serialize_user(&self, value: &DynamicValue) -> CodecResult<Vec<u8>> {
        let serializer = self
            .serializer
            .as_ref()
            .ok_or_else(|| CodecError::serialization("no serializer callback registered"))?;
        serializer
            .serialize(value)
            .map_err(|e| CodecError::serialization(format!("user serializer callback failed: {e}")))
    }

    pub(crate) fn deserialize_user(&self, bytes: &[u8]) -> CodecResult<DynamicValue> {
        let deserializer = self
            .deserializer
            .as_ref()
            .ok_or_else(|| CodecError::serialization("no deserializer callback registered"))?;
        deserializer
            .deserialize(bytes)
            .map_err(|e| CodecError::serialization(format!("user deserializer callback failed: {e}")))
    }
}

impl fmt::Debug for SerializerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerializerRegistry")
            .field("serializer", &self.has_serializer())
            .field("deserializer", &self.has_deserializer())
            .finish()
    }
}

/// Encode with the built-in format.
pub(crate) fn serialize_builtin(value: &DynamicValue) -> CodecResult<Vec<u8>> {
    bincode::serialize(value)
        .map_err(|e| CodecError::serialization(format!("builtin serializer failed: {e}")))
}

/// Decode bytes written by [`serialize_builtin`], failing with a client
/// error once containers nest deeper than `max_depth`.
pub(crate) fn deserialize_builtin(bytes: &[u8], max_depth: usize) -> CodecResult<DynamicValue> {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .allow_trailing_bytes()
        .deserialize_seed(BoundedValue::root(max_depth), bytes)
        .map_err(|e| match *e {
            bincode::ErrorKind::Custom(ref msg) if msg.starts_with(DEPTH_EXCEEDED) => {
                CodecError::client(msg.clone())
            }
            _ => CodecError::serialization(format!("builtin deserializer failed: {e}")),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use kvt_types::{ErrorKind, OpaqueObject};

    fn upper_serializer(value: &DynamicValue) -> Result<Vec<u8>, String> {
        match value {
            DynamicValue::String(s) => Ok(s.to_uppercase().into_bytes()),
            other => Err(format!("cannot serialize {}", other.kind_name())),
        }
    }

    #[test]
    fn empty_registry_is_serialization_error() {
        let registry = SerializerRegistry::new();
        let err = registry.serialize_user(&DynamicValue::Null).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Serialization);
        assert!(err.is_client());
        assert!(registry.deserialize_user(b"x").is_err());
    }

    #[test]
    fn callback_failure_names_the_callback() {
        let mut registry = SerializerRegistry::new();
        registry.register_serializer(upper_serializer);
        let err = registry.serialize_user(&DynamicValue::Int(1)).unwrap_err();
        assert!(err.message().contains("user serializer callback failed"));
        assert!(err.message().contains("cannot serialize int"));
    }

    #[test]
    fn re_registration_replaces() {
        let mut registry = SerializerRegistry::new();
        registry.register_serializer(|_: &DynamicValue| -> Result<Vec<u8>, String> { Ok(vec![1]) });
        registry.register_serializer(|_: &DynamicValue| -> Result<Vec<u8>, String> { Ok(vec![2]) });
        assert_eq!(registry.serialize_user(&DynamicValue::Null).unwrap(), vec![2]);
    }

    #[test]
    fn builtin_roundtrips_opaque_objects() {
        let obj = DynamicValue::Opaque(OpaqueObject::new(
            "Point",
            vec![("x".into(), 1.into()), ("y".into(), 2.5.into())],
        ));
        let bytes = serialize_builtin(&obj).unwrap();
        assert_eq!(deserialize_builtin(&bytes, 8).unwrap(), obj);
    }

    #[test]
    fn builtin_rejects_garbage() {
        let err = deserialize_builtin(&[0xff, 0xff, 0xff, 0xff], 8).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Serialization);
    }

    /// Hand-built bytes for `levels` lists nested one inside the next,
    /// closed by a null. Each level is a `List` tag and a length of one.
    fn nested_list_bytes(levels: usize) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(levels * 12 + 4);
        for _ in 0..levels {
            bytes.extend_from_slice(&5u32.to_le_bytes());
            bytes.extend_from_slice(&1u64.to_le_bytes());
        }
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes
    }

    #[test]
    fn builtin_decodes_hand_built_nesting_within_limit() {
        let value = deserialize_builtin(&nested_list_bytes(3), 3).unwrap();
        assert_eq!(
            value,
            DynamicValue::List(vec![DynamicValue::List(vec![DynamicValue::List(vec![
                DynamicValue::Null
            ])])])
        );
    }

    #[test]
    fn builtin_stops_at_depth_limit_on_very_deep_blob() {
        // Far deeper than any stack could recurse through.
        let bytes = nested_list_bytes(200_000);
        let err = deserialize_builtin(&bytes, 64).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Client);
        assert!(err.message().contains("maximum nesting depth of 64"));
    }

    #[test]
    fn debug_shows_presence_only() {
        let registry = SerializerRegistry::new().with_user_pair(upper_serializer, |b: &[u8]| -> Result<DynamicValue, String> {
            Ok(DynamicValue::String(String::from_utf8_lossy(b).into_owned()))
        });
        let debug = format!("{registry:?}");
        assert!(debug.contains("serializer: true"));
        assert!(debug.contains("deserializer: true"));
    }
}
