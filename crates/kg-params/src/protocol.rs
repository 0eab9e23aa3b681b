//! The get/set/clone protocol a search harness drives.

use indexmap::IndexMap;
use std::borrow::Cow;

use kg_types::{ConfigNode, ParamResult};

use crate::update::Edits;

/// Flat parameter view: owned values for computed entries, borrows for tree nodes.
pub type Params<'a> = IndexMap<String, Cow<'a, ConfigNode>>;

/// Anything a hyperparameter search can tune through string keys.
///
/// `Clone` must produce an instance that shares no mutable state with the
/// original; a search evaluates clones side by side.
pub trait ParamEstimator: Clone {
    /// Every addressable parameter, in a deterministic order.
    fn get_params(&self) -> ParamResult<Params<'_>>;

    /// Applies `edits` in order and returns `self` for chaining.
    fn set_params(&mut self, edits: Edits) -> ParamResult<&mut Self>;

    /// Fresh instance with identical parameters.
    fn clone_estimator(&self) -> Self {
        self.clone()
    }

    fn param_keys(&self) -> ParamResult<Vec<String>> {
        Ok(self.get_params()?.into_keys().collect())
    }
}

/// Builds an ordered edit batch.
pub fn edits<K, V, I>(pairs: I) -> Edits
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<ConfigNode>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
}
