//! Destinations for converted container elements.
//!
//! The walker converts every element the same way regardless of where it
//! lands. A [`Sink`] supplies the one step that differs: linking a converted
//! child under its parent, addressed by the element's source key.

use std::collections::HashSet;

use kvt_types::{CodecError, CodecResult, DynamicValue, StoreValue};

use crate::pool::{NodeId, StaticPool};

/// Maximum length of a bin name in bytes.
pub const MAX_BIN_NAME_LEN: usize = 15;

/// Attaches converted children to a destination container.
pub trait Sink {
    /// Link `child` under this sink. `key` is the element's key in the source
    /// map, or `None` for list elements.
    fn attach(
        &mut self,
        pool: &mut StaticPool,
        key: Option<&DynamicValue>,
        child: NodeId,
    ) -> CodecResult<()>;
}

/// Appends to a list node.
#[derive(Debug)]
pub struct ListSink {
    parent: NodeId,
}

impl ListSink {
    pub fn new(parent: NodeId) -> Self {
        Self { parent }
    }
}

impl Sink for ListSink {
    fn attach(
        &mut self,
        pool: &mut StaticPool,
        _key: Option<&DynamicValue>,
        child: NodeId,
    ) -> CodecResult<()> {
        pool.push_child(self.parent, child)
    }
}

/// Associates by string key. Integer source keys become decimal strings,
/// so `1` and `"1"` in the same map collide and are rejected.
#[derive(Debug)]
pub struct StrKeyedSink {
    parent: NodeId,
    seen: HashSet<String>,
}

impl StrKeyedSink {
    pub fn new(parent: NodeId) -> Self {
        Self {
            parent,
            seen: HashSet::new(),
        }
    }
}

impl Sink for StrKeyedSink {
    fn attach(
        &mut self,
        pool: &mut StaticPool,
        key: Option<&DynamicValue>,
        child: NodeId,
    ) -> CodecResult<()> {
        let key = match key {
            Some(DynamicValue::String(s)) => s.clone(),
            Some(DynamicValue::Int(n)) => n.to_string(),
            Some(other) => {
                return Err(CodecError::parameter(format!(
                    "unsupported map key type: {}",
                    other.kind_name()
                )))
            }
            None => return Err(CodecError::client("map element without a key")),
        };
        if !self.seen.insert(key.clone()) {
            return Err(CodecError::parameter(format!("duplicate map key '{key}'")));
        }
        pool.insert_child(self.parent, StoreValue::String(key), child)
    }
}

/// Associates by integer key.
#[derive(Debug)]
pub struct IntKeyedSink {
    parent: NodeId,
}

impl IntKeyedSink {
    pub fn new(parent: NodeId) -> Self {
        Self { parent }
    }
}

impl Sink for IntKeyedSink {
    fn attach(
        &mut self,
        pool: &mut StaticPool,
        key: Option<&DynamicValue>,
        child: NodeId,
    ) -> CodecResult<()> {
        match key {
            Some(DynamicValue::Int(n)) => {
                pool.insert_child(self.parent, StoreValue::Integer(*n), child)
            }
            Some(other) => Err(CodecError::client(format!(
                "expected an integer map key, found {}",
                other.kind_name()
            ))),
            None => Err(CodecError::client("map element without a key")),
        }
    }
}

/// Collects record bins as free roots, one per bin name.
///
/// Bins are not linked under a pool node; the record codec takes each root
/// out of the pool once the walk completes.
#[derive(Debug, Default)]
pub struct BinSink {
    bins: Vec<(String, NodeId)>,
    names: HashSet<String>,
}

impl BinSink {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bins: Vec::with_capacity(capacity),
            names: HashSet::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// The collected `(bin name, root node)` pairs in input order.
    pub fn into_bins(self) -> Vec<(String, NodeId)> {
        self.bins
    }
}

impl Sink for BinSink {
    fn attach(
        &mut self,
        _pool: &mut StaticPool,
        key: Option<&DynamicValue>,
        child: NodeId,
    ) -> CodecResult<()> {
        let name = bin_name(key)?;
        if !self.names.insert(name.to_string()) {
            return Err(CodecError::parameter(format!("duplicate bin name '{name}'")));
        }
        self.bins.push((name.to_string(), child));
        Ok(())
    }
}

fn bin_name(key: Option<&DynamicValue>) -> CodecResult<&str> {
    let name = match key {
        Some(DynamicValue::String(s)) => s.as_str(),
        Some(other) => {
            return Err(CodecError::parameter(format!(
                "bin name must be a string, found {}",
                other.kind_name()
            )))
        }
        None => return Err(CodecError::parameter("bin without a name")),
    };
    if name.is_empty() {
        return Err(CodecError::parameter("bin name must not be empty"));
    }
    if name.len() > MAX_BIN_NAME_LEN {
        return Err(CodecError::parameter(format!(
            "bin name '{name}' exceeds {MAX_BIN_NAME_LEN} bytes"
        )));
    }
    Ok(name)
}

/// Check every bin name of a bins map without converting any value.
pub fn validate_bin_names(entries: &[(DynamicValue, DynamicValue)]) -> CodecResult<()> {
    let mut seen = HashSet::with_capacity(entries.len());
    for (key, _) in entries {
        let name = bin_name(Some(key))?;
        if !seen.insert(name) {
            return Err(CodecError::parameter(format!("duplicate bin name '{name}'")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kvt_types::ErrorKind;

    #[test]
    fn str_keyed_sink_stringifies_integers() {
        let mut pool = StaticPool::new(4, 4);
        let map = pool.alloc_map(2).unwrap();
        let mut sink = StrKeyedSink::new(map);
        let a = pool.alloc_leaf(StoreValue::Nil).unwrap();
        sink.attach(&mut pool, Some(&DynamicValue::Int(5)), a).unwrap();
        let b = pool.alloc_leaf(StoreValue::Nil).unwrap();
        let err = sink.attach(&mut pool, Some(&DynamicValue::Bool(true)), b).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parameter);

        assert_eq!(
            pool.take(map).unwrap(),
            StoreValue::Map(vec![(StoreValue::String("5".into()), StoreValue::Nil)])
        );
    }

    #[test]
    fn str_keyed_sink_rejects_colliding_keys() {
        let mut pool = StaticPool::new(4, 4);
        let map = pool.alloc_map(2).unwrap();
        let mut sink = StrKeyedSink::new(map);
        let a = pool.alloc_leaf(StoreValue::String("a".into())).unwrap();
        sink.attach(&mut pool, Some(&DynamicValue::Int(1)), a).unwrap();
        let b = pool.alloc_leaf(StoreValue::String("b".into())).unwrap();
        let err = sink.attach(&mut pool, Some(&DynamicValue::from("1")), b).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parameter);
        assert!(err.message().contains("duplicate map key '1'"));
    }

    #[test]
    fn bin_sink_rejects_duplicates() {
        let mut pool = StaticPool::new(4, 4);
        let mut sink = BinSink::with_capacity(2);
        let a = pool.alloc_leaf(StoreValue::Integer(1)).unwrap();
        let b = pool.alloc_leaf(StoreValue::Integer(2)).unwrap();
        sink.attach(&mut pool, Some(&"a".into()), a).unwrap();
        let err = sink.attach(&mut pool, Some(&"a".into()), b).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parameter);
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn bin_name_rules() {
        let ok = vec![(DynamicValue::from("abcdefghijklmno"), DynamicValue::Null)];
        assert!(validate_bin_names(&ok).is_ok());

        let long = vec![(DynamicValue::from("abcdefghijklmnop"), DynamicValue::Null)];
        assert_eq!(validate_bin_names(&long).unwrap_err().kind(), ErrorKind::Parameter);

        let empty = vec![(DynamicValue::from(""), DynamicValue::Null)];
        assert!(validate_bin_names(&empty).is_err());

        let int_name = vec![(DynamicValue::Int(1), DynamicValue::Null)];
        assert!(validate_bin_names(&int_name).is_err());

        let dup = vec![
            (DynamicValue::from("x"), DynamicValue::Null),
            (DynamicValue::from("x"), DynamicValue::Int(1)),
        ];
        assert!(validate_bin_names(&dup).is_err());
    }
}
