use std::sync::Arc;

use kvt_types::{CodecResult, DynamicValue, SerializerPolicy, StoreFeatures, StoreValue};
use tracing::debug;

use crate::config::CodecConfig;
use crate::pool::StaticPool;
use crate::scalar::ValueCodec;
use crate::serializer::SerializerRegistry;
use crate::walker::ContainerWalker;

/// Shared transcoding context.
///
/// Holds the serializer registry and codec configuration. Cheap to share
/// behind an `Arc`; every call builds its own codec, walker, and pool from it.
#[derive(Debug, Clone)]
pub struct Transcoder {
    registry: Arc<SerializerRegistry>,
    config: CodecConfig,
}

impl Transcoder {
    pub fn new(registry: Arc<SerializerRegistry>, config: CodecConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &SerializerRegistry {
        &self.registry
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Serializer policy to use when the caller did not choose one.
    pub fn policy_or_default(&self, policy: Option<SerializerPolicy>) -> SerializerPolicy {
        policy.unwrap_or(self.config.default_serializer)
    }

    pub fn value_codec(&self, features: StoreFeatures, policy: SerializerPolicy) -> ValueCodec<'_> {
        ValueCodec::new(&self.registry, features, policy)
    }

    pub fn walker(&self, features: StoreFeatures, policy: SerializerPolicy) -> ContainerWalker<'_> {
        ContainerWalker::new(self.value_codec(features, policy), self.config.max_depth)
    }

    /// A fresh pool sized for roughly `capacity` nodes.
    pub fn new_pool(&self, capacity: usize) -> StaticPool {
        StaticPool::new(capacity, self.config.pool_node_limit)
    }

    /// Encode one value of any shape.
    pub fn encode(
        &self,
        value: &DynamicValue,
        features: StoreFeatures,
        policy: SerializerPolicy,
    ) -> CodecResult<StoreValue> {
        let mut pool = self.new_pool(value.container_len().unwrap_or(1));
        let encoded = self.walker(features, policy).encode_value(value, &mut pool)?;
        debug!(nodes = pool.len(), kind = encoded.type_name(), "value encoded");
        Ok(encoded)
    }

    /// Decode one value of any shape. Blobs are decoded by their tag.
    pub fn decode(&self, value: StoreValue) -> CodecResult<DynamicValue> {
        self.walker(StoreFeatures::default(), self.config.default_serializer)
            .decode_value(value, 1)
    }
}

impl Default for Transcoder {
    fn default() -> Self {
        Self::new(Arc::new(SerializerRegistry::new()), CodecConfig::default())
    }
}
