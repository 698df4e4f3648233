//! Depth-bounded decoding of the built-in blob format.
//!
//! Blobs come from storage and may nest arbitrarily deep. The derived
//! `Deserialize` for [`DynamicValue`] recurses once per level with no bound,
//! so the built-in deserializer drives these seeds instead. Each container
//! variant checks its level before descending, which stops the walk long
//! before the stack is at risk.
//!
//! The seeds read the same layout the derived `Serialize` writes: variants by
//! index, lists and maps as sequences, map entries and object properties as
//! two-element tuples.

use std::fmt;
use std::marker::PhantomData;

use kvt_types::{CodecError, CodecResult, DynamicValue, OpaqueObject};
use serde::de::{self, DeserializeSeed, Deserializer, EnumAccess, SeqAccess, Unexpected, VariantAccess, Visitor};

/// Prefix of every depth error raised while decoding.
pub(crate) const DEPTH_EXCEEDED: &str = "maximum nesting depth";

const VARIANTS: &[&str] = &[
    "Null", "Bool", "Int", "Float", "String", "List", "Map", "Opaque",
];

/// Cap on up-front allocation taken from an untrusted length prefix.
const MAX_PREALLOC: usize = 4096;

/// Decodes one [`DynamicValue`] sitting at `level`.
#[derive(Clone, Copy, Debug)]
pub(crate) struct BoundedValue {
    level: usize,
    max_depth: usize,
}

impl BoundedValue {
    /// Seed for a blob's root value.
    pub(crate) fn root(max_depth: usize) -> Self {
        Self {
            level: 1,
            max_depth,
        }
    }

    /// Seed for the children of a container at this level.
    fn enter<E: de::Error>(self) -> Result<Self, E> {
        if self.level > self.max_depth {
            return Err(E::custom(format!(
                "{DEPTH_EXCEEDED} of {} exceeded",
                self.max_depth
            )));
        }
        Ok(Self {
            level: self.level + 1,
            ..self
        })
    }
}

impl<'de> DeserializeSeed<'de> for BoundedValue {
    type Value = DynamicValue;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<DynamicValue, D::Error> {
        deserializer.deserialize_enum("DynamicValue", VARIANTS, self)
    }
}

impl<'de> Visitor<'de> for BoundedValue {
    type Value = DynamicValue;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a dynamic value")
    }

    fn visit_enum<A: EnumAccess<'de>>(self, data: A) -> Result<DynamicValue, A::Error> {
        let (index, variant): (u32, _) = data.variant()?;
        match index {
            0 => variant.unit_variant().map(|()| DynamicValue::Null),
            1 => variant.newtype_variant().map(DynamicValue::Bool),
            2 => variant.newtype_variant().map(DynamicValue::Int),
            3 => variant.newtype_variant().map(DynamicValue::Float),
            4 => variant.newtype_variant().map(DynamicValue::String),
            5 => {
                let child = self.enter::<A::Error>()?;
                variant.newtype_variant_seed(SeqSeed(child)).map(DynamicValue::List)
            }
            6 => {
                let child = self.enter::<A::Error>()?;
                variant
                    .newtype_variant_seed(SeqSeed(PairSeed(child, child)))
                    .map(DynamicValue::Map)
            }
            7 => {
                let child = self.enter::<A::Error>()?;
                variant.newtype_variant_seed(ObjectSeed(child)).map(DynamicValue::Opaque)
            }
            other => Err(de::Error::invalid_value(
                Unexpected::Unsigned(u64::from(other)),
                &"a variant index below 8",
            )),
        }
    }
}

/// Fail if `value` nests containers deeper than `max_depth`, counting
/// `value` itself as level 1. Lists, maps and opaque objects are containers.
///
/// Walks with an explicit stack so in-memory values of any depth are safe.
pub(crate) fn check_nesting(value: &DynamicValue, max_depth: usize) -> CodecResult<()> {
    let mut pending = vec![(value, 1usize)];
    while let Some((value, level)) = pending.pop() {
        if !matches!(
            value,
            DynamicValue::List(_) | DynamicValue::Map(_) | DynamicValue::Opaque(_)
        ) {
            continue;
        }
        if level > max_depth {
            return Err(CodecError::client(format!(
                "{DEPTH_EXCEEDED} of {max_depth} exceeded"
            )));
        }
        match value {
            DynamicValue::List(items) => pending.extend(items.iter().map(|c| (c, level + 1))),
            DynamicValue::Map(entries) => {
                for (k, v) in entries {
                    pending.push((k, level + 1));
                    pending.push((v, level + 1));
                }
            }
            DynamicValue::Opaque(obj) => {
                pending.extend(obj.properties().iter().map(|(_, v)| (v, level + 1)))
            }
            _ => {}
        }
    }
    Ok(())
}

/// A sequence whose elements are all decoded by the same seed.
#[derive(Clone, Copy)]
struct SeqSeed<S>(S);

impl<'de, S> DeserializeSeed<'de> for SeqSeed<S>
where
    S: DeserializeSeed<'de> + Copy,
{
    type Value = Vec<S::Value>;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Vec<S::Value>, D::Error> {
        deserializer.deserialize_seq(self)
    }
}

impl<'de, S> Visitor<'de> for SeqSeed<S>
where
    S: DeserializeSeed<'de> + Copy,
{
    type Value = Vec<S::Value>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a sequence")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Vec<S::Value>, A::Error> {
        let mut out = Vec::with_capacity(seq.size_hint().unwrap_or(0).min(MAX_PREALLOC));
        while let Some(item) = seq.next_element_seed(self.0)? {
            out.push(item);
        }
        Ok(out)
    }
}

/// A two-element tuple with a seed per position.
#[derive(Clone, Copy)]
struct PairSeed<K, V>(K, V);

impl<'de, K, V> DeserializeSeed<'de> for PairSeed<K, V>
where
    K: DeserializeSeed<'de>,
    V: DeserializeSeed<'de>,
{
    type Value = (K::Value, V::Value);

    fn deserialize<D: Deserializer<'de>>(
        self,
        deserializer: D,
    ) -> Result<(K::Value, V::Value), D::Error> {
        deserializer.deserialize_tuple(2, self)
    }
}

impl<'de, K, V> Visitor<'de> for PairSeed<K, V>
where
    K: DeserializeSeed<'de>,
    V: DeserializeSeed<'de>,
{
    type Value = (K::Value, V::Value);

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a pair")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<(K::Value, V::Value), A::Error> {
        let first = seq
            .next_element_seed(self.0)?
            .ok_or_else(|| de::Error::invalid_length(0, &"a pair"))?;
        let second = seq
            .next_element_seed(self.1)?
            .ok_or_else(|| de::Error::invalid_length(1, &"a pair"))?;
        Ok((first, second))
    }
}

/// An [`OpaqueObject`]: class name, then `(name, value)` properties.
#[derive(Clone, Copy)]
struct ObjectSeed(BoundedValue);

impl<'de> DeserializeSeed<'de> for ObjectSeed {
    type Value = OpaqueObject;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<OpaqueObject, D::Error> {
        deserializer.deserialize_struct("OpaqueObject", &["class_name", "properties"], self)
    }
}

impl<'de> Visitor<'de> for ObjectSeed {
    type Value = OpaqueObject;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an opaque object")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<OpaqueObject, A::Error> {
        let class_name: String = seq
            .next_element()?
            .ok_or_else(|| de::Error::invalid_length(0, &"an opaque object"))?;
        let properties = seq
            .next_element_seed(SeqSeed(PairSeed(PhantomData::<String>, self.0)))?
            .ok_or_else(|| de::Error::invalid_length(1, &"an opaque object"))?;
        Ok(OpaqueObject::new(class_name, properties))
    }
}
