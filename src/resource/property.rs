//! Property values and property maps.
//!
//! Resource state is a tree of [`PropertyValue`]s rooted in a [`PropertyMap`].
//! Maps keep their keys sorted so that diffs, rendering and serialized
//! checkpoints are reproducible.

use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::ser::{self, SerializeMap};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

use super::urn::Urn;

/// Key of a property inside a [`PropertyMap`].
pub type PropertyKey = String;

/// Wire key used to encode a resource reference inside an object.
pub const REF_KEY: &str = "$ref";

/// Wire key used to encode a not-yet-known value inside an object.
pub const UNKNOWN_KEY: &str = "$unknown";

/// A reference to another managed resource, compared by URN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRef {
    urn: Urn,
}

/// A value that will only be known once a provider computes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownValue {
    type_label: String,
}

/// A single property value.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// Explicit absence of a value.
    Null,
    /// A boolean.
    Bool(bool),
    /// A number with float64 semantics.
    Number(f64),
    /// A string.
    String(String),
    /// A reference to another resource.
    Resource(ResourceRef),
    /// An ordered list of values.
    Array(Vec<PropertyValue>),
    /// A nested map.
    Object(PropertyMap),
    /// A value pending remote computation.
    Unknown(UnknownValue),
}

/// An ordered mapping from property keys to values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyMap {
    entries: BTreeMap<PropertyKey, PropertyValue>,
}

impl ResourceRef {
    /// Creates a reference to the given resource.
    #[must_use]
    pub const fn new(urn: Urn) -> Self {
        Self { urn }
    }

    /// The referenced resource.
    #[must_use]
    pub const fn urn(&self) -> &Urn {
        &self.urn
    }
}

impl UnknownValue {
    /// Creates an unknown value with a display label such as `"string"`.
    #[must_use]
    pub fn new(type_label: impl Into<String>) -> Self {
        Self {
            type_label: type_label.into(),
        }
    }

    /// The label shown in place of the value.
    #[must_use]
    pub fn type_label(&self) -> &str {
        &self.type_label
    }
}

impl PropertyValue {
    /// Returns true for [`PropertyValue::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns true if this value carries something worth showing.
    #[must_use]
    pub const fn has_value(&self) -> bool {
        !self.is_null()
    }

    /// Returns true for [`PropertyValue::Unknown`].
    #[must_use]
    pub const fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown(_))
    }

    /// Short name of the discriminant, used in logs and validation messages.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Resource(_) => "resource",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
            Self::Unknown(_) => "unknown",
        }
    }

    /// Returns the referenced resource, if this is a reference.
    #[must_use]
    pub const fn as_resource(&self) -> Option<&ResourceRef> {
        match self {
            Self::Resource(r) => Some(r),
            _ => None,
        }
    }

    /// Calls `f` on every resource reference reachable from this value.
    pub fn visit_refs<F: FnMut(&ResourceRef)>(&self, f: &mut F) {
        match self {
            Self::Resource(r) => f(r),
            Self::Array(items) => items.iter().for_each(|v| v.visit_refs(f)),
            Self::Object(map) => map.values().for_each(|v| v.visit_refs(f)),
            _ => {}
        }
    }

    /// Rewrites every resource reference reachable from this value.
    pub fn map_refs<F: FnMut(&ResourceRef) -> ResourceRef>(&mut self, f: &mut F) {
        match self {
            Self::Resource(r) => *r = f(r),
            Self::Array(items) => items.iter_mut().for_each(|v| v.map_refs(f)),
            Self::Object(map) => map.values_mut().for_each(|v| v.map_refs(f)),
            _ => {}
        }
    }
}

impl PropertyMap {
    /// Creates an empty map.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Inserts a value, returning the previous one.
    pub fn insert(&mut self, key: impl Into<PropertyKey>, value: PropertyValue) -> Option<PropertyValue> {
        self.entries.insert(key.into(), value)
    }

    /// Looks up a value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.entries.get(key)
    }

    /// Returns true if the key is present (even with a null value).
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Removes a key.
    pub fn remove(&mut self, key: &str) -> Option<PropertyValue> {
        self.entries.remove(key)
    }

    /// Keys in stable (sorted) order.
    pub fn keys(&self) -> impl Iterator<Item = &PropertyKey> {
        self.entries.keys()
    }

    /// Values in key order.
    pub fn values(&self) -> impl Iterator<Item = &PropertyValue> {
        self.entries.values()
    }

    /// Mutable values in key order.
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut PropertyValue> {
        self.entries.values_mut()
    }

    /// Entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&PropertyKey, &PropertyValue)> {
        self.entries.iter()
    }

    /// Number of keys, nulls included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the map has no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Calls `f` on every resource reference in the map.
    pub fn visit_refs<F: FnMut(&ResourceRef)>(&self, f: &mut F) {
        self.values().for_each(|v| v.visit_refs(f));
    }

    /// Rewrites every resource reference in the map.
    pub fn map_refs<F: FnMut(&ResourceRef) -> ResourceRef>(&mut self, f: &mut F) {
        self.values_mut().for_each(|v| v.map_refs(f));
    }
}

impl FromIterator<(PropertyKey, PropertyValue)> for PropertyMap {
    fn from_iter<I: IntoIterator<Item = (PropertyKey, PropertyValue)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a PropertyMap {
    type Item = (&'a PropertyKey, &'a PropertyValue);
    type IntoIter = std::collections::btree_map::Iter<'a, PropertyKey, PropertyValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<i32> for PropertyValue {
    fn from(v: i32) -> Self {
        Self::Number(f64::from(v))
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<PropertyMap> for PropertyValue {
    fn from(v: PropertyMap) -> Self {
        Self::Object(v)
    }
}

impl<T: Into<Self>> From<Vec<T>> for PropertyValue {
    fn from(v: Vec<T>) -> Self {
        Self::Array(v.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "<null>"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Resource(r) => write!(f, "&{}", r.urn().name()),
            Self::Unknown(u) => write!(f, "{}", u.type_label()),
            Self::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Self::Object(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

// Serialization: plain JSON/YAML shapes for data, single-key objects for
// references and unknowns.

impl Serialize for PropertyValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Number(n) if !n.is_finite() => {
                Err(ser::Error::custom(format!("cannot encode non-finite number {n}")))
            }
            Self::Number(n) => serializer.serialize_f64(*n),
            Self::String(s) => serializer.serialize_str(s),
            Self::Array(items) => items.serialize(serializer),
            Self::Object(map) => map.serialize(serializer),
            Self::Resource(r) => {
                let mut m = serializer.serialize_map(Some(1))?;
                m.serialize_entry(REF_KEY, r.urn().as_str())?;
                m.end()
            }
            Self::Unknown(u) => {
                let mut m = serializer.serialize_map(Some(1))?;
                m.serialize_entry(UNKNOWN_KEY, u.type_label())?;
                m.end()
            }
        }
    }
}

impl Serialize for PropertyMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut m = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            m.serialize_entry(k, v)?;
        }
        m.end()
    }
}

struct PropertyValueVisitor;

impl<'de> Visitor<'de> for PropertyValueVisitor {
    type Value = PropertyValue;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a property value")
    }

    fn visit_unit<E: de::Error>(self) -> Result<PropertyValue, E> {
        Ok(PropertyValue::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<PropertyValue, E> {
        Ok(PropertyValue::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<PropertyValue, D::Error> {
        PropertyValue::deserialize(deserializer)
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<PropertyValue, E> {
        Ok(PropertyValue::Bool(v))
    }

    #[allow(clippy::cast_precision_loss)]
    fn visit_i64<E: de::Error>(self, v: i64) -> Result<PropertyValue, E> {
        Ok(PropertyValue::Number(v as f64))
    }

    #[allow(clippy::cast_precision_loss)]
    fn visit_u64<E: de::Error>(self, v: u64) -> Result<PropertyValue, E> {
        Ok(PropertyValue::Number(v as f64))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<PropertyValue, E> {
        if !v.is_finite() {
            return Err(E::custom(format!("non-finite number {v} is not a property value")));
        }
        Ok(PropertyValue::Number(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<PropertyValue, E> {
        Ok(PropertyValue::String(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<PropertyValue, E> {
        Ok(PropertyValue::String(v))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<PropertyValue, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element::<PropertyValue>()? {
            items.push(item);
        }
        Ok(PropertyValue::Array(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<PropertyValue, A::Error> {
        let mut map = PropertyMap::new();
        while let Some((k, v)) = access.next_entry::<String, PropertyValue>()? {
            map.insert(k, v);
        }

        if map.len() == 1 {
            if let Some(PropertyValue::String(urn)) = map.get(REF_KEY) {
                return Ok(PropertyValue::Resource(ResourceRef::new(Urn::parse(urn))));
            }
            if let Some(PropertyValue::String(label)) = map.get(UNKNOWN_KEY) {
                return Ok(PropertyValue::Unknown(UnknownValue::new(label.clone())));
            }
        }
        Ok(PropertyValue::Object(map))
    }
}

impl<'de> Deserialize<'de> for PropertyValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(PropertyValueVisitor)
    }
}

impl<'de> Deserialize<'de> for PropertyMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let entries = BTreeMap::<PropertyKey, PropertyValue>::deserialize(deserializer)?;
        Ok(Self { entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PropertyMap {
        let mut nested = PropertyMap::new();
        nested.insert("enabled", PropertyValue::Bool(true));

        let mut map = PropertyMap::new();
        map.insert("zone", "eu-west-1a".into());
        map.insert("size", 40.into());
        map.insert("tags", vec!["a", "b"].into());
        map.insert("options", nested.into());
        map.insert("description", PropertyValue::Null);
        map.insert(
            "vpc",
            PropertyValue::Resource(ResourceRef::new(Urn::new("dev", "local:net:Vpc", "main"))),
        );
        map.insert("arn", PropertyValue::Unknown(UnknownValue::new("string")));
        map
    }

    #[test]
    fn test_non_finite_numbers_are_rejected() {
        assert!(serde_yaml::from_str::<PropertyMap>("x: .nan").is_err());
        assert!(serde_yaml::from_str::<PropertyMap>("x: .inf").is_err());

        let mut map = PropertyMap::new();
        map.insert("x", PropertyValue::Number(f64::NAN));
        assert!(serde_json::to_string(&map).is_err());
    }

    #[test]
    fn test_keys_are_sorted() {
        let keys: Vec<_> = sample().keys().cloned().collect();
        assert_eq!(
            keys,
            vec!["arn", "description", "options", "size", "tags", "vpc", "zone"]
        );
    }

    #[test]
    fn test_json_encoding_of_special_values() {
        let json = serde_json::to_value(sample()).expect("serialize");
        assert_eq!(json["vpc"]["$ref"], "urn:stratum:dev::local:net:Vpc::main");
        assert_eq!(json["arn"]["$unknown"], "string");
        assert!(json["description"].is_null());
        assert_eq!(json["size"], 40.0);
    }

    #[test]
    fn test_decode_restores_references_and_unknowns() {
        let text = serde_json::to_string(&sample()).expect("serialize");
        let decoded: PropertyMap = serde_json::from_str(&text).expect("deserialize");
        assert_eq!(decoded, sample());
        assert!(matches!(decoded.get("vpc"), Some(PropertyValue::Resource(_))));
        assert!(decoded.get("arn").is_some_and(PropertyValue::is_unknown));
    }

    #[test]
    fn test_yaml_decodes_like_json() {
        let yaml = "count: 3\nname: web\nlinks:\n  - $ref: urn:stratum:dev::local:net:Vpc::main\n";
        let decoded: PropertyMap = serde_yaml::from_str(yaml).expect("yaml");
        assert_eq!(decoded.get("count"), Some(&PropertyValue::Number(3.0)));
        let Some(PropertyValue::Array(links)) = decoded.get("links") else {
            panic!("links should be an array");
        };
        assert_eq!(
            links[0].as_resource().map(|r| r.urn().name().to_string()),
            Some(String::from("main"))
        );
    }

    #[test]
    fn test_object_with_extra_keys_is_not_a_reference() {
        let json = r#"{"$ref": "x", "other": 1}"#;
        let value: PropertyValue = serde_json::from_str(json).expect("deserialize");
        assert!(matches!(value, PropertyValue::Object(_)));
    }
}
