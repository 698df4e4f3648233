use kvt_types::{CodecError, CodecResult, DynamicValue, StoreValue};

use crate::pool::{NodeId, StaticPool};
use crate::scalar::ValueCodec;
use crate::sink::{IntKeyedSink, ListSink, Sink, StrKeyedSink};

/// How a map's keys are laid out in the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MapKeyKind {
    Integer,
    String,
}

impl MapKeyKind {
    /// Integer-keyed if every key is an integer, string-keyed otherwise.
    pub fn classify(entries: &[(DynamicValue, DynamicValue)]) -> Self {
        if entries.iter().all(|(k, _)| matches!(k, DynamicValue::Int(_))) {
            Self::Integer
        } else {
            Self::String
        }
    }

    fn classify_store(entries: &[(StoreValue, StoreValue)]) -> Self {
        if entries.iter().all(|(k, _)| matches!(k, StoreValue::Integer(_))) {
            Self::Integer
        } else {
            Self::String
        }
    }
}

/// Recursive descent over nested lists and maps.
///
/// Encoding links converted nodes through a [`StaticPool`]; decoding consumes
/// an owned [`StoreValue`] tree. Both directions stop at the first failing
/// element and fail once nesting goes past `max_depth`.
#[derive(Clone, Copy, Debug)]
pub struct ContainerWalker<'a> {
    codec: ValueCodec<'a>,
    max_depth: usize,
}

impl<'a> ContainerWalker<'a> {
    /// The codec inherits `max_depth` for the blobs it writes and reads.
    pub fn new(codec: ValueCodec<'a>, max_depth: usize) -> Self {
        Self {
            codec: codec.with_max_depth(max_depth),
            max_depth,
        }
    }

    pub fn codec(&self) -> &ValueCodec<'a> {
        &self.codec
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    fn check_depth(&self, depth: usize) -> CodecResult<()> {
        if depth > self.max_depth {
            return Err(CodecError::client(format!(
                "maximum nesting depth of {} exceeded",
                self.max_depth
            )));
        }
        Ok(())
    }

    /// Convert any value into a free pool node. `depth` is the nesting level
    /// the value itself sits at; top-level values are at level 1.
    pub fn encode_node(
        &self,
        value: &DynamicValue,
        pool: &mut StaticPool,
        depth: usize,
    ) -> CodecResult<NodeId> {
        match value {
            DynamicValue::List(items) => {
                self.check_depth(depth)?;
                let id = pool.alloc_list(items.len())?;
                self.encode_container(value, &mut ListSink::new(id), pool, depth)?;
                Ok(id)
            }
            DynamicValue::Map(entries) => {
                self.check_depth(depth)?;
                let id = pool.alloc_map(entries.len())?;
                match MapKeyKind::classify(entries) {
                    MapKeyKind::Integer => {
                        self.encode_container(value, &mut IntKeyedSink::new(id), pool, depth)?
                    }
                    MapKeyKind::String => {
                        self.encode_container(value, &mut StrKeyedSink::new(id), pool, depth)?
                    }
                }
                Ok(id)
            }
            scalar => {
                let leaf = self.codec.encode_scalar(scalar)?;
                pool.alloc_leaf(leaf)
            }
        }
    }

    /// Convert each element of `container` and hand it to `sink`, in the
    /// container's own order. `depth` is the level of `container`.
    pub fn encode_container<S: Sink>(
        &self,
        container: &DynamicValue,
        sink: &mut S,
        pool: &mut StaticPool,
        depth: usize,
    ) -> CodecResult<()> {
        match container {
            DynamicValue::List(items) => {
                for item in items {
                    let child = self.encode_node(item, pool, depth + 1)?;
                    sink.attach(pool, None, child)?;
                }
                Ok(())
            }
            DynamicValue::Map(entries) => {
                for (key, item) in entries {
                    let child = self.encode_node(item, pool, depth + 1)?;
                    sink.attach(pool, Some(key), child)?;
                }
                Ok(())
            }
            other => Err(CodecError::client(format!(
                "expected a list or map, found {}",
                other.kind_name()
            ))),
        }
    }

    /// Convert a whole value into an owned store tree using `pool`.
    pub fn encode_value(&self, value: &DynamicValue, pool: &mut StaticPool) -> CodecResult<StoreValue> {
        let root = self.encode_node(value, pool, 1)?;
        pool.take(root)
    }

    /// Convert a store list or map back into a dynamic container.
    pub fn decode_container(&self, value: StoreValue) -> CodecResult<DynamicValue> {
        if !value.is_container() {
            return Err(CodecError::client(format!(
                "expected a list or map, found {}",
                value.type_name()
            )));
        }
        self.decode_value(value, 1)
    }

    /// Convert any store value. `depth` is the level `value` sits at.
    pub fn decode_value(&self, value: StoreValue, depth: usize) -> CodecResult<DynamicValue> {
        match value {
            StoreValue::List(items) => {
                self.check_depth(depth)?;
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.decode_value(item, depth + 1)?);
                }
                Ok(DynamicValue::List(out))
            }
            StoreValue::Map(entries) => {
                self.check_depth(depth)?;
                let kind = MapKeyKind::classify_store(&entries);
                let mut out = Vec::with_capacity(entries.len());
                for (key, item) in entries {
                    let key = decode_map_key(key, kind)?;
                    out.push((key, self.decode_value(item, depth + 1)?));
                }
                Ok(DynamicValue::Map(out))
            }
            scalar => self.codec.decode_scalar(scalar),
        }
    }
}

fn decode_map_key(key: StoreValue, kind: MapKeyKind) -> CodecResult<DynamicValue> {
    match (key, kind) {
        (StoreValue::Integer(n), MapKeyKind::Integer) => Ok(DynamicValue::Int(n)),
        (StoreValue::Integer(n), MapKeyKind::String) => Ok(DynamicValue::String(n.to_string())),
        (StoreValue::String(s), _) => Ok(DynamicValue::String(s)),
        (other, _) => Err(CodecError::client(format!(
            "unsupported map key type: {}",
            other.type_name()
        ))),
    }
}
