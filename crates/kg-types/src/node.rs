//! The configuration tree: ordered mappings, sequences and opaque leaves.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered mapping used for every `Mapping` node.
pub type Mapping = IndexMap<String, ConfigNode>;

/// Marker value meaning "remove this sequence element" when assigned to an
/// element's own key. Anywhere else it is an ordinary null leaf.
pub const ABSENT: ConfigNode = ConfigNode::Leaf(Scalar::Null);

/// An atomic value. Tuples are fixed-size and never flattened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Tuple(Vec<Scalar>),
}

/// A node of a configuration tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigNode {
    Mapping(Mapping),
    Sequence(Vec<ConfigNode>),
    Leaf(Scalar),
}

impl ConfigNode {
    pub fn null() -> Self {
        ABSENT
    }

    pub fn mapping() -> Self {
        Self::Mapping(Mapping::new())
    }

    pub fn tuple<I>(items: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Scalar>,
    {
        Self::Leaf(Scalar::Tuple(items.into_iter().map(Into::into).collect()))
    }

    /// Builder-style insert for mapping nodes; a no-op on other shapes.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ConfigNode>) -> Self {
        if let Self::Mapping(map) = &mut self {
            map.insert(key.into(), value.into());
        }
        self
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Leaf(Scalar::Null))
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Leaf(_))
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Self::Mapping(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_mapping_mut(&mut self) -> Option<&mut Mapping> {
        match self {
            Self::Mapping(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[ConfigNode]> {
        match self {
            Self::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_sequence_mut(&mut self) -> Option<&mut Vec<ConfigNode>> {
        match self {
            Self::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Leaf(Scalar::Str(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Leaf(Scalar::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Leaf(Scalar::Int(v)) => Some(*v),
            _ => None,
        }
    }

    /// Numeric view accepting both integer and float leaves.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Leaf(Scalar::Int(v)) => Some(*v as f64),
            Self::Leaf(Scalar::Float(v)) => Some(*v),
            _ => None,
        }
    }

    /// Child of a mapping node.
    pub fn get(&self, key: &str) -> Option<&ConfigNode> {
        self.as_mapping()?.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut ConfigNode> {
        self.as_mapping_mut()?.get_mut(key)
    }

    /// Short name of the node shape, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Mapping(_) => "mapping",
            Self::Sequence(_) => "sequence",
            Self::Leaf(Scalar::Null) => "null",
            Self::Leaf(Scalar::Bool(_)) => "bool",
            Self::Leaf(Scalar::Int(_)) => "int",
            Self::Leaf(Scalar::Float(_)) => "float",
            Self::Leaf(Scalar::Str(_)) => "string",
            Self::Leaf(Scalar::Tuple(_)) => "tuple",
        }
    }

    /// Deep merge of `patch` into `self`.
    ///
    /// Mapping keys present on both sides merge recursively, keys only in the
    /// patch are appended, and every other combination replaces `self`.
    pub fn merge(&mut self, patch: ConfigNode) {
        match (self, patch) {
            (Self::Mapping(base), Self::Mapping(patch)) => {
                for (key, value) in patch {
                    match base.get_mut(&key) {
                        Some(existing) => existing.merge(value),
                        None => {
                            base.insert(key, value);
                        }
                    }
                }
            }
            (this, patch) => *this = patch,
        }
    }

    /// Canonical compact JSON text.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

impl Default for ConfigNode {
    fn default() -> Self {
        ABSENT
    }
}

impl fmt::Display for ConfigNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&text)
    }
}

impl From<serde_json::Value> for ConfigNode {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => ABSENT,
            Value::Bool(b) => b.into(),
            Value::Number(n) => match n.as_i64() {
                Some(v) => v.into(),
                None => n.as_f64().map(Self::from).unwrap_or(ABSENT),
            },
            Value::String(s) => s.into(),
            Value::Array(items) => Self::Sequence(items.into_iter().map(Self::from).collect()),
            Value::Object(map) => {
                Self::Mapping(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl From<Scalar> for ConfigNode {
    fn from(value: Scalar) -> Self {
        Self::Leaf(value)
    }
}

impl From<Mapping> for ConfigNode {
    fn from(value: Mapping) -> Self {
        Self::Mapping(value)
    }
}

impl From<Vec<ConfigNode>> for ConfigNode {
    fn from(value: Vec<ConfigNode>) -> Self {
        Self::Sequence(value)
    }
}

impl<T: Into<ConfigNode>> From<Option<T>> for ConfigNode {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(ABSENT)
    }
}

macro_rules! scalar_conversions {
    ($($ty:ty => $variant:ident $(as $cast:ty)?),* $(,)?) => {
        $(
            impl From<$ty> for Scalar {
                fn from(value: $ty) -> Self {
                    Scalar::$variant(value $(as $cast)?)
                }
            }

            impl From<$ty> for ConfigNode {
                fn from(value: $ty) -> Self {
                    ConfigNode::Leaf(Scalar::from(value))
                }
            }
        )*
    };
}

scalar_conversions! {
    bool => Bool,
    i32 => Int as i64,
    i64 => Int,
    u32 => Int as i64,
    usize => Int as i64,
    f32 => Float as f64,
    f64 => Float,
    String => Str,
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Str(value.to_string())
    }
}

impl From<&str> for ConfigNode {
    fn from(value: &str) -> Self {
        ConfigNode::Leaf(Scalar::from(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_conversion_keeps_insertion_order() {
        let node = ConfigNode::from(json!({"zeta": 1, "alpha": 2.5, "mid": [true, null]}));
        let keys: Vec<&str> = node.as_mapping().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, ["zeta", "alpha", "mid"]);
        assert_eq!(node.get("zeta"), Some(&ConfigNode::from(1)));
        assert_eq!(node.get("alpha").and_then(ConfigNode::as_f64), Some(2.5));
        assert_eq!(node.get("mid").and_then(ConfigNode::as_sequence).map(<[_]>::len), Some(2));
    }

    #[test]
    fn serialized_text_is_stable() {
        let text = r#"{"name":"seq","layers":[{"class_name":"Dense","config":{"units":64,"scale":1.0,"seed":null}}]}"#;
        let node = ConfigNode::from_json(text).unwrap();
        assert_eq!(node.to_json().unwrap(), text);
        assert_eq!(node.to_string(), text);
    }

    #[test]
    fn tuples_render_as_arrays_and_stay_atomic() {
        let node = ConfigNode::mapping().with("kernel_size", ConfigNode::tuple([3i64, 3]));
        assert_eq!(node.to_json().unwrap(), r#"{"kernel_size":[3,3]}"#);
        assert!(node.get("kernel_size").unwrap().is_leaf());
    }

    #[test]
    fn merge_preserves_siblings() {
        let mut layer = ConfigNode::from(json!({
            "class_name": "Dense",
            "config": {
                "units": 64,
                "kernel_initializer": {
                    "class_name": "VarianceScaling",
                    "config": {"scale": 1.0, "mode": "fan_avg", "distribution": "uniform"}
                }
            }
        }));
        let patch = ConfigNode::from(json!({
            "config": {"kernel_initializer": {"config": {"distribution": "random_uniform"}}}
        }));
        layer.merge(patch);

        let init = layer.get("config").and_then(|c| c.get("kernel_initializer")).unwrap();
        let init_config = init.get("config").unwrap();
        assert_eq!(init_config.get("distribution").and_then(ConfigNode::as_str), Some("random_uniform"));
        assert_eq!(init_config.get("mode").and_then(ConfigNode::as_str), Some("fan_avg"));
        assert_eq!(init.get("class_name").and_then(ConfigNode::as_str), Some("VarianceScaling"));
        assert_eq!(layer.get("config").and_then(|c| c.get("units")), Some(&ConfigNode::from(64)));
    }

    #[test]
    fn merge_replaces_non_mappings() {
        let mut node = ConfigNode::from(json!({"a": [1, 2, 3]}));
        node.merge(ConfigNode::from(json!({"a": [9]})));
        assert_eq!(node, ConfigNode::from(json!({"a": [9]})));
    }

    #[test]
    fn option_none_is_absent() {
        let node: ConfigNode = Option::<f64>::None.into();
        assert_eq!(node, ABSENT);
        assert!(node.is_null());
        assert_eq!(ConfigNode::from(Some(0.9)).as_f64(), Some(0.9));
    }
}
