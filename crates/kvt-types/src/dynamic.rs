//! The host's dynamic value model.
//!
//! [`DynamicValue`] is what callers hand to the transcoder and what they get
//! back. Maps are ordered by insertion and may mix key kinds; the transcoder
//! decides per map whether it is integer-keyed or string-keyed.

use serde::{Deserialize, Serialize};

/// Class name that marks an [`OpaqueObject`] as a geospatial value.
pub const GEOJSON_CLASS: &str = "GeoJSON";

/// Property holding the textual form of a geospatial object.
const GEOJSON_TEXT_PROPERTY: &str = "json";

/// A nullable, arbitrarily nested host value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum DynamicValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<DynamicValue>),
    /// Ordered associative container; keys may be of any kind.
    Map(Vec<(DynamicValue, DynamicValue)>),
    /// A host object the store has no native representation for.
    Opaque(OpaqueObject),
}

impl DynamicValue {
    /// Short name of the value's runtime kind, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Opaque(_) => "object",
        }
    }

    /// Build a string-keyed map from `(name, value)` pairs.
    pub fn map<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, DynamicValue)>,
    {
        Self::Map(
            entries
                .into_iter()
                .map(|(k, v)| (Self::String(k.into()), v))
                .collect(),
        )
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn is_container(&self) -> bool {
        matches!(self, Self::List(_) | Self::Map(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[DynamicValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&[(DynamicValue, DynamicValue)]> {
        match self {
            Self::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Look up the first entry whose key is the string `name`.
    pub fn get(&self, name: &str) -> Option<&DynamicValue> {
        self.as_map()?
            .iter()
            .find(|(k, _)| k.as_str() == Some(name))
            .map(|(_, v)| v)
    }

    /// Number of elements in a container, `None` for scalars.
    pub fn container_len(&self) -> Option<usize> {
        match self {
            Self::List(items) => Some(items.len()),
            Self::Map(entries) => Some(entries.len()),
            _ => None,
        }
    }

    /// Convert from a JSON document. Integers that fit `i64` stay integers.
    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::List(items.into_iter().map(Self::from_json).collect())
            }
            serde_json::Value::Object(fields) => Self::Map(
                fields
                    .into_iter()
                    .map(|(k, v)| (Self::String(k), Self::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Render as JSON for display. Map keys are stringified, non-finite
    /// floats become `null`, and objects render as `{"$class": .., ..props}`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Int(n) => serde_json::Value::from(*n),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::List(items) => serde_json::Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Map(entries) => {
                let mut obj = serde_json::Map::new();
                for (k, v) in entries {
                    obj.insert(key_text(k), v.to_json());
                }
                serde_json::Value::Object(obj)
            }
            Self::Opaque(o) => {
                let mut obj = serde_json::Map::new();
                obj.insert("$class".into(), serde_json::Value::String(o.class_name.clone()));
                for (name, v) in &o.properties {
                    obj.insert(name.clone(), v.to_json());
                }
                serde_json::Value::Object(obj)
            }
        }
    }
}

fn key_text(key: &DynamicValue) -> String {
    match key {
        DynamicValue::String(s) => s.clone(),
        DynamicValue::Int(n) => n.to_string(),
        other => other.to_json().to_string(),
    }
}

impl From<bool> for DynamicValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for DynamicValue {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<i32> for DynamicValue {
    fn from(n: i32) -> Self {
        Self::Int(n.into())
    }
}

impl From<f64> for DynamicValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for DynamicValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for DynamicValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<Vec<DynamicValue>> for DynamicValue {
    fn from(items: Vec<DynamicValue>) -> Self {
        Self::List(items)
    }
}

impl From<OpaqueObject> for DynamicValue {
    fn from(o: OpaqueObject) -> Self {
        Self::Opaque(o)
    }
}

impl From<serde_json::Value> for DynamicValue {
    fn from(v: serde_json::Value) -> Self {
        Self::from_json(v)
    }
}

/// A host object reference: a class name plus ordered named properties.
///
/// Objects of class [`GEOJSON_CLASS`] carry their GeoJSON text and expose it
/// through [`OpaqueObject::to_text`]; every other object is only storable
/// through a serializer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OpaqueObject {
    class_name: String,
    properties: Vec<(String, DynamicValue)>,
}

impl OpaqueObject {
    pub fn new(class_name: impl Into<String>, properties: Vec<(String, DynamicValue)>) -> Self {
        Self {
            class_name: class_name.into(),
            properties,
        }
    }

    /// A geospatial object wrapping GeoJSON text.
    pub fn geojson(text: impl Into<String>) -> Self {
        Self::new(
            GEOJSON_CLASS,
            vec![(GEOJSON_TEXT_PROPERTY.to_string(), DynamicValue::String(text.into()))],
        )
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn properties(&self) -> &[(String, DynamicValue)] {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&DynamicValue> {
        self.properties
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Returns `true` if this object carries the geospatial marker.
    pub fn is_geojson(&self) -> bool {
        self.class_name == GEOJSON_CLASS
    }

    /// The object's textual form, if it has one.
    pub fn to_text(&self) -> Option<&str> {
        if !self.is_geojson() {
            return None;
        }
        self.property(GEOJSON_TEXT_PROPERTY)?.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_integers_stay_integers() {
        let v = DynamicValue::from_json(json!({"a": 1, "b": 1.5}));
        assert_eq!(v.get("a"), Some(&DynamicValue::Int(1)));
        assert_eq!(v.get("b"), Some(&DynamicValue::Float(1.5)));
    }

    #[test]
    fn map_preserves_insertion_order() {
        let v = DynamicValue::map([("z", 1.into()), ("a", 2.into())]);
        let keys: Vec<_> = v.as_map().unwrap().iter().map(|(k, _)| k.as_str().unwrap()).collect();
        assert_eq!(keys, vec!["z", "a"]);
    }

    #[test]
    fn geojson_exposes_text() {
        let geo = OpaqueObject::geojson(r#"{"type":"Point","coordinates":[1,2]}"#);
        assert!(geo.is_geojson());
        assert_eq!(geo.to_text(), Some(r#"{"type":"Point","coordinates":[1,2]}"#));
    }

    #[test]
    fn plain_object_has_no_text() {
        let obj = OpaqueObject::new("Point", vec![("x".into(), 1.into())]);
        assert!(obj.to_text().is_none());
        assert_eq!(obj.property("x"), Some(&DynamicValue::Int(1)));
    }

    #[test]
    fn to_json_stringifies_integer_keys() {
        let v = DynamicValue::Map(vec![(DynamicValue::Int(0), "a".into())]);
        assert_eq!(v.to_json(), json!({"0": "a"}));
    }

    #[test]
    fn kind_names() {
        assert_eq!(DynamicValue::Null.kind_name(), "null");
        assert_eq!(DynamicValue::List(vec![]).kind_name(), "list");
        assert_eq!(DynamicValue::Opaque(OpaqueObject::geojson("{}")).kind_name(), "object");
    }
}
