//! Parameter view over a `{name, layers: [...]}` architecture tree.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::str::FromStr;
use tracing::debug;

use kg_types::{ConfigNode, ParamError, ParamResult};

use crate::codec;
use crate::flatten::{FlattenOptions, Flattener, ParamRegistry};
use crate::protocol::{ParamEstimator, Params};
use crate::update::{ApplySummary, Edits, TreeUpdater};

/// Structural variant of the layer container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerLayout {
    /// Plain ordered layer list.
    #[default]
    Sequential,
    /// Layer list whose elements carry graph linkage (`inbound_nodes`) plus
    /// top-level input/output bindings; linkage is kept verbatim.
    Functional,
}

impl LayerLayout {
    /// Fields holding graph linkage for this layout.
    pub fn linkage_fields(self) -> &'static [&'static str] {
        match self {
            Self::Sequential => &[],
            Self::Functional => &["inbound_nodes", "input_layers", "output_layers"],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Functional => "functional",
        }
    }
}

impl FromStr for LayerLayout {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sequential" => Ok(Self::Sequential),
            "functional" | "graph" => Ok(Self::Functional),
            other => Err(ParamError::InvalidValue {
                name: "model_type".to_string(),
                expected: "\"sequential\" or \"functional\"".to_string(),
                found: format!("{other:?}"),
            }),
        }
    }
}

/// Field names of the layer container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerStackOptions {
    pub identifier_field: String,
    pub sequence_field: String,
    pub discriminator: String,
}

impl Default for LayerStackOptions {
    fn default() -> Self {
        Self {
            identifier_field: "name".to_string(),
            sequence_field: "layers".to_string(),
            discriminator: "class_name".to_string(),
        }
    }
}

/// Owns one architecture tree and exposes it as a flat parameter namespace.
///
/// Keys are `name`, any other top-level field, `layers`, and then one block per
/// layer: `layers_<index>_<class_name>` followed by its fields
/// (`layers_0_Dense__config__units`).
#[derive(Debug, Clone, PartialEq)]
pub struct LayerStack {
    tree: ConfigNode,
    layout: LayerLayout,
    options: LayerStackOptions,
    flatten: FlattenOptions,
}

impl LayerStack {
    pub fn new(tree: ConfigNode, layout: LayerLayout) -> Self {
        Self::with_options(tree, layout, LayerStackOptions::default())
    }

    pub fn with_options(tree: ConfigNode, layout: LayerLayout, options: LayerStackOptions) -> Self {
        let flatten = flatten_options(layout, &options);
        debug!(layout = layout.as_str(), "created layer stack");
        Self {
            tree,
            layout,
            options,
            flatten,
        }
    }

    /// Builds the tree from an identifier and a layer list.
    pub fn from_layers(name: impl Into<ConfigNode>, layers: Vec<ConfigNode>, layout: LayerLayout) -> Self {
        let options = LayerStackOptions::default();
        let tree = ConfigNode::mapping()
            .with(options.identifier_field.clone(), name)
            .with(options.sequence_field.clone(), layers);
        Self::with_options(tree, layout, options)
    }

    pub fn tree(&self) -> &ConfigNode {
        &self.tree
    }

    pub fn into_tree(self) -> ConfigNode {
        self.tree
    }

    pub fn replace_tree(&mut self, tree: ConfigNode) {
        self.tree = tree;
    }

    pub fn layout(&self) -> LayerLayout {
        self.layout
    }

    pub fn set_layout(&mut self, layout: LayerLayout) {
        self.layout = layout;
        self.flatten = flatten_options(layout, &self.options);
    }

    pub fn flatten_options(&self) -> &FlattenOptions {
        &self.flatten
    }

    pub fn name(&self) -> Option<&str> {
        self.tree.get(&self.options.identifier_field).and_then(ConfigNode::as_str)
    }

    /// Layer elements; empty when the tree has no sequence field.
    pub fn layers(&self) -> &[ConfigNode] {
        self.tree
            .get(&self.options.sequence_field)
            .and_then(ConfigNode::as_sequence)
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.layers().len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers().is_empty()
    }

    /// Full ordered registry: identifier, other top-level fields, the layer
    /// list itself, then each layer block depth-first.
    pub fn registry(&self) -> ParamResult<ParamRegistry<'_>> {
        let flattener = Flattener::new(&self.flatten);
        let mut registry = ParamRegistry::new();

        let Some(map) = self.tree.as_mapping() else {
            flattener.flatten_into(&mut registry, &self.tree, "")?;
            return Ok(registry);
        };

        let identifier = &self.options.identifier_field;
        let sequence = &self.options.sequence_field;
        let ordered = map
            .get_key_value(identifier)
            .into_iter()
            .chain(map.iter().filter(|(k, _)| *k != identifier && *k != sequence))
            .chain(map.get_key_value(sequence));

        for (field, child) in ordered {
            let key = codec::join("", field)?;
            if self.flatten.is_opaque(field) {
                insert_opaque(&mut registry, key, child)?;
            } else {
                flattener.flatten_into(&mut registry, child, &key)?;
            }
        }
        Ok(registry)
    }

    /// Applies edits; elements assigned [`kg_types::ABSENT`] are dropped once
    /// the whole batch has run, keeping the order of the remaining layers.
    pub fn apply(&mut self, edits: Edits) -> ParamResult<ApplySummary> {
        let summary = TreeUpdater::new(&self.flatten).apply(&mut self.tree, edits)?;
        debug!(replaced = summary.replaced, removed = summary.removed, layers = self.len(), "updated layer stack");
        Ok(summary)
    }

    /// Canonical JSON of the tree.
    pub fn to_json(&self) -> ParamResult<String> {
        self.tree.to_json().map_err(|err| ParamError::InvalidValue {
            name: self.options.identifier_field.clone(),
            expected: "JSON-serializable tree".to_string(),
            found: err.to_string(),
        })
    }
}

impl ParamEstimator for LayerStack {
    fn get_params(&self) -> ParamResult<Params<'_>> {
        Ok(self
            .registry()?
            .into_iter()
            .map(|(key, node)| (key, Cow::Borrowed(node)))
            .collect())
    }

    fn set_params(&mut self, edits: Edits) -> ParamResult<&mut Self> {
        self.apply(edits)?;
        Ok(self)
    }
}

fn flatten_options(layout: LayerLayout, options: &LayerStackOptions) -> FlattenOptions {
    layout
        .linkage_fields()
        .iter()
        .fold(
            FlattenOptions::default().with_discriminator(options.discriminator.clone()),
            |acc, field| acc.with_opaque_field(*field),
        )
}

fn insert_opaque<'a>(registry: &mut ParamRegistry<'a>, key: String, node: &'a ConfigNode) -> ParamResult<()> {
    if registry.insert(key.clone(), node).is_some() {
        return Err(ParamError::DuplicateKey { key });
    }
    Ok(())
}
