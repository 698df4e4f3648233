use kvt_types::{
    BytesType, CodecError, CodecResult, DynamicValue, OpaqueObject, SerializerPolicy,
    StoreFeatures, StoreValue,
};
use tracing::trace;

use crate::bounded::check_nesting;
use crate::config::DEFAULT_MAX_DEPTH;
use crate::serializer::{self, SerializerRegistry};

/// Leaf conversion between [`DynamicValue`] and [`StoreValue`].
///
/// A codec is built per top-level call. The store capabilities and the
/// serializer policy are captured once at construction and stay fixed for
/// every element the call converts.
///
/// Serialized blobs hold nested values of their own. Their nesting is
/// measured from the blob's root and held to `max_depth` on both sides.
#[derive(Clone, Copy, Debug)]
pub struct ValueCodec<'a> {
    registry: &'a SerializerRegistry,
    features: StoreFeatures,
    policy: SerializerPolicy,
    max_depth: usize,
}

impl<'a> ValueCodec<'a> {
    pub fn new(
        registry: &'a SerializerRegistry,
        features: StoreFeatures,
        policy: SerializerPolicy,
    ) -> Self {
        Self {
            registry,
            features,
            policy,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn features(&self) -> StoreFeatures {
        self.features
    }

    pub fn policy(&self) -> SerializerPolicy {
        self.policy
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Convert a single non-container value.
    pub fn encode_scalar(&self, value: &DynamicValue) -> CodecResult<StoreValue> {
        match value {
            DynamicValue::Null => Ok(StoreValue::Nil),
            DynamicValue::Bool(b) => Ok(StoreValue::Boolean(*b)),
            DynamicValue::Int(n) => Ok(StoreValue::Integer(*n)),
            DynamicValue::Float(f) if self.features.supports_double => Ok(StoreValue::Double(*f)),
            DynamicValue::Float(_) => self.serialize(value),
            DynamicValue::String(s) => Ok(StoreValue::String(s.clone())),
            DynamicValue::Opaque(obj) if obj.is_geojson() && self.features.supports_geo => {
                let text = obj.to_text().ok_or_else(|| {
                    CodecError::client("geojson object has no textual representation")
                })?;
                Ok(StoreValue::GeoJson(text.to_string()))
            }
            DynamicValue::Opaque(_) => self.serialize(value),
            DynamicValue::List(_) | DynamicValue::Map(_) => Err(CodecError::client(format!(
                "expected a scalar, found {}",
                value.kind_name()
            ))),
        }
    }

    /// Write a value the store has no native type for, under the active policy.
    pub fn serialize(&self, value: &DynamicValue) -> CodecResult<StoreValue> {
        trace!(kind = value.kind_name(), policy = ?self.policy, "serializing value");
        match self.policy {
            SerializerPolicy::None => Err(CodecError::parameter(format!(
                "cannot store {} without a serializer policy",
                value.kind_name()
            ))),
            SerializerPolicy::Builtin => {
                check_nesting(value, self.max_depth)?;
                Ok(StoreValue::Bytes {
                    kind: BytesType::Native,
                    data: serializer::serialize_builtin(value)?,
                })
            }
            SerializerPolicy::User => {
                check_nesting(value, self.max_depth)?;
                Ok(StoreValue::Bytes {
                    kind: BytesType::Blob,
                    data: self.registry.serialize_user(value)?,
                })
            }
        }
    }

    /// Convert a single non-container store value.
    pub fn decode_scalar(&self, value: StoreValue) -> CodecResult<DynamicValue> {
        match value {
            StoreValue::Nil => Ok(DynamicValue::Null),
            StoreValue::Boolean(b) => Ok(DynamicValue::Bool(b)),
            StoreValue::Integer(n) => Ok(DynamicValue::Int(n)),
            StoreValue::Double(f) => Ok(DynamicValue::Float(f)),
            StoreValue::String(s) => Ok(DynamicValue::String(s)),
            StoreValue::Bytes { kind, data } => self.decode_bytes(kind, &data),
            StoreValue::GeoJson(text) => Ok(DynamicValue::Opaque(OpaqueObject::geojson(text))),
            StoreValue::List(_) | StoreValue::Map(_) => Err(CodecError::client(format!(
                "expected a scalar, found {}",
                value.type_name()
            ))),
        }
    }

    /// Decode a blob by its sub-type tag. The active policy is not consulted.
    pub fn decode_bytes(&self, kind: BytesType, data: &[u8]) -> CodecResult<DynamicValue> {
        match kind {
            BytesType::Native => serializer::deserialize_builtin(data, self.max_depth),
            BytesType::Blob => {
                let value = self.registry.deserialize_user(data)?;
                check_nesting(&value, self.max_depth)?;
                Ok(value)
            }
            BytesType::Other(code) => Err(CodecError::client(format!(
                "unable to deserialize bytes of type {code}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kvt_types::ErrorKind;

    fn point() -> DynamicValue {
        DynamicValue::Opaque(OpaqueObject::new("Point", vec![("x".into(), 3.into())]))
    }

    fn codec(registry: &SerializerRegistry, policy: SerializerPolicy) -> ValueCodec<'_> {
        ValueCodec::new(registry, StoreFeatures::full(), policy)
    }

    #[test]
    fn native_scalars() {
        let registry = SerializerRegistry::new();
        let c = codec(&registry, SerializerPolicy::None);
        assert_eq!(c.encode_scalar(&DynamicValue::Null).unwrap(), StoreValue::Nil);
        assert_eq!(c.encode_scalar(&true.into()).unwrap(), StoreValue::Boolean(true));
        assert_eq!(c.encode_scalar(&7.into()).unwrap(), StoreValue::Integer(7));
        assert_eq!(c.encode_scalar(&1.25.into()).unwrap(), StoreValue::Double(1.25));
        assert_eq!(c.encode_scalar(&"hi".into()).unwrap(), StoreValue::String("hi".into()));
    }

    #[test]
    fn float_without_double_support_is_serialized() {
        let registry = SerializerRegistry::new();
        let c = ValueCodec::new(&registry, StoreFeatures::minimal(), SerializerPolicy::Builtin);
        let encoded = c.encode_scalar(&2.5.into()).unwrap();
        assert!(matches!(encoded, StoreValue::Bytes { kind: BytesType::Native, .. }));
        assert_eq!(c.decode_scalar(encoded).unwrap(), DynamicValue::Float(2.5));
    }

    #[test]
    fn float_without_double_support_under_none_policy() {
        let registry = SerializerRegistry::new();
        let c = ValueCodec::new(&registry, StoreFeatures::minimal(), SerializerPolicy::None);
        let err = c.encode_scalar(&2.5.into()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parameter);
    }

    #[test]
    fn opaque_under_none_policy_is_parameter_error() {
        let registry = SerializerRegistry::new();
        let err = codec(&registry, SerializerPolicy::None).encode_scalar(&point()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parameter);
    }

    #[test]
    fn opaque_under_user_policy_without_callback_is_client_error() {
        let registry = SerializerRegistry::new();
        let err = codec(&registry, SerializerPolicy::User).encode_scalar(&point()).unwrap_err();
        assert!(err.is_client());
    }

    #[test]
    fn user_callback_roundtrip() {
        let registry = SerializerRegistry::new().with_user_pair(
            |v: &DynamicValue| -> Result<Vec<u8>, String> {
                Ok(v.to_json().to_string().into_bytes())
            },
            |b: &[u8]| -> Result<DynamicValue, String> {
                let json: serde_json::Value =
                    serde_json::from_slice(b).map_err(|e| e.to_string())?;
                Ok(DynamicValue::from_json(json))
            },
        );
        let c = codec(&registry, SerializerPolicy::User);
        let encoded = c.encode_scalar(&point()).unwrap();
        assert!(matches!(encoded, StoreValue::Bytes { kind: BytesType::Blob, .. }));

        // The callback pair maps an object to its JSON rendering.
        let decoded = c.decode_scalar(encoded).unwrap();
        assert_eq!(decoded.get("$class"), Some(&DynamicValue::from("Point")));
        assert_eq!(decoded.get("x"), Some(&DynamicValue::Int(3)));
    }

    #[test]
    fn decode_follows_tag_not_policy() {
        let registry = SerializerRegistry::new();
        let writer = codec(&registry, SerializerPolicy::Builtin);
        let encoded = writer.encode_scalar(&point()).unwrap();

        let reader = codec(&registry, SerializerPolicy::None);
        assert_eq!(reader.decode_scalar(encoded).unwrap(), point());
    }

    #[test]
    fn unknown_bytes_tag_is_client_error() {
        let registry = SerializerRegistry::new();
        let c = codec(&registry, SerializerPolicy::Builtin);
        let err = c
            .decode_scalar(StoreValue::Bytes {
                kind: BytesType::Other(7),
                data: vec![1, 2],
            })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Client);
    }

    #[test]
    fn geojson_requires_store_support() {
        let registry = SerializerRegistry::new();
        let geo = DynamicValue::Opaque(OpaqueObject::geojson(r#"{"type":"Point"}"#));

        let with_geo = codec(&registry, SerializerPolicy::Builtin);
        let encoded = with_geo.encode_scalar(&geo).unwrap();
        assert_eq!(encoded, StoreValue::GeoJson(r#"{"type":"Point"}"#.into()));
        assert_eq!(with_geo.decode_scalar(encoded).unwrap(), geo);

        let features = StoreFeatures {
            supports_double: true,
            supports_geo: false,
        };
        let without_geo = ValueCodec::new(&registry, features, SerializerPolicy::Builtin);
        assert!(matches!(
            without_geo.encode_scalar(&geo).unwrap(),
            StoreValue::Bytes { kind: BytesType::Native, .. }
        ));
    }

    #[test]
    fn containers_are_not_scalars() {
        let registry = SerializerRegistry::new();
        let c = codec(&registry, SerializerPolicy::Builtin);
        let err = c.encode_scalar(&DynamicValue::List(vec![])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Client);
        let err = c.decode_scalar(StoreValue::Map(vec![])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Client);
    }

    #[test]
    fn user_blob_nesting_is_checked_after_decode() {
        // The deserializer returns whatever the bytes describe.
        let mut registry = SerializerRegistry::new();
        registry.register_deserializer(|b: &[u8]| -> Result<DynamicValue, String> {
            let mut value = DynamicValue::Null;
            for _ in 0..b.len() {
                value = DynamicValue::List(vec![value]);
            }
            Ok(value)
        });
        let c = codec(&registry, SerializerPolicy::User).with_max_depth(3);
        assert!(c.decode_bytes(BytesType::Blob, &[0; 3]).is_ok());
        let err = c.decode_bytes(BytesType::Blob, &[0; 4]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Client);
    }
}
