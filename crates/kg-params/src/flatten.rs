//! Flattening of a configuration tree into an ordered parameter registry.

use indexmap::map::Entry;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use kg_types::{ConfigNode, ParamError, ParamResult};

use crate::codec;

/// Flat view of a tree: key to a live borrow of the node, in traversal order.
pub type ParamRegistry<'a> = IndexMap<String, &'a ConfigNode>;

/// Controls how sequence elements are named and which fields stay atomic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlattenOptions {
    /// Field of a sequence element whose string value becomes the element tag.
    pub discriminator: String,
    /// Mapping fields emitted as a single entry and never descended into.
    pub opaque_fields: Vec<String>,
}

impl Default for FlattenOptions {
    fn default() -> Self {
        Self {
            discriminator: "class_name".to_string(),
            opaque_fields: Vec::new(),
        }
    }
}

impl FlattenOptions {
    pub fn with_discriminator(mut self, field: impl Into<String>) -> Self {
        self.discriminator = field.into();
        self
    }

    pub fn with_opaque_field(mut self, field: impl Into<String>) -> Self {
        self.opaque_fields.push(field.into());
        self
    }

    pub fn is_opaque(&self, field: &str) -> bool {
        self.opaque_fields.iter().any(|f| f == field)
    }

    /// Tag of a sequence element, if its discriminator field holds a non-empty string.
    pub fn tag_of<'a>(&self, element: &'a ConfigNode) -> Option<&'a str> {
        element
            .get(&self.discriminator)
            .and_then(ConfigNode::as_str)
            .filter(|tag| !tag.is_empty())
    }
}

/// Flattens `node` under `prefix` with the default options.
pub fn flatten<'a>(node: &'a ConfigNode, prefix: &str) -> ParamResult<ParamRegistry<'a>> {
    Flattener::new(&FlattenOptions::default()).flatten(node, prefix)
}

/// Depth-first walker producing a [`ParamRegistry`].
#[derive(Debug, Clone, Copy)]
pub struct Flattener<'o> {
    options: &'o FlattenOptions,
}

impl<'o> Flattener<'o> {
    pub fn new(options: &'o FlattenOptions) -> Self {
        Self { options }
    }

    /// Flattens a whole tree. With an empty prefix the root has no entry of its own.
    pub fn flatten<'a>(&self, node: &'a ConfigNode, prefix: &str) -> ParamResult<ParamRegistry<'a>> {
        let mut registry = ParamRegistry::new();
        self.flatten_into(&mut registry, node, prefix)?;
        debug!(prefix, entries = registry.len(), "flattened configuration tree");
        Ok(registry)
    }

    /// Appends the entries for `node` under `key` to an existing registry.
    pub fn flatten_into<'a>(
        &self,
        registry: &mut ParamRegistry<'a>,
        node: &'a ConfigNode,
        key: &str,
    ) -> ParamResult<()> {
        if !key.is_empty() {
            insert(registry, key.to_string(), node)?;
        }
        match node {
            ConfigNode::Leaf(_) => Ok(()),
            ConfigNode::Mapping(map) => {
                for (field, child) in map {
                    let child_key = codec::join(key, field)?;
                    if self.options.is_opaque(field) {
                        insert(registry, child_key, child)?;
                    } else {
                        self.flatten_into(registry, child, &child_key)?;
                    }
                }
                Ok(())
            }
            ConfigNode::Sequence(items) => {
                for (index, item) in items.iter().enumerate() {
                    let item_key = codec::element_key(key, index, self.options.tag_of(item))?;
                    self.flatten_into(registry, item, &item_key)?;
                }
                Ok(())
            }
        }
    }
}

fn insert<'a>(registry: &mut ParamRegistry<'a>, key: String, node: &'a ConfigNode) -> ParamResult<()> {
    match registry.entry(key) {
        Entry::Occupied(entry) => Err(ParamError::DuplicateKey {
            key: entry.key().clone(),
        }),
        Entry::Vacant(entry) => {
            entry.insert(node);
            Ok(())
        }
    }
}
