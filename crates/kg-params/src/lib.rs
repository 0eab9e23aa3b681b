//! # kg-params
//!
//! Flat, string-keyed parameter namespace over nested configuration trees.
//!
//! Provides the key codec, the tree flattener, the batched tree updater with
//! element removal, the layer-stack adapter for Keras-style architectures, and
//! the get/set/clone protocol consumed by hyperparameter searches.

pub mod codec;
mod flatten;
mod layers;
mod path;
mod protocol;
mod update;

#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;

pub use codec::{element_key, join, nest, split, SEPARATOR};
pub use flatten::{flatten, FlattenOptions, Flattener, ParamRegistry};
pub use layers::{LayerLayout, LayerStack, LayerStackOptions};
pub use path::{lookup, node_at, resolve, Path, Step};
pub use protocol::{edits, ParamEstimator, Params};
pub use update::{ApplySummary, Edits, TreeUpdater};
