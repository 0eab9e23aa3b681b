//! Application of flat-keyed edits to a configuration tree.

use indexmap::IndexMap;
use tracing::{debug, warn};

use kg_types::{ConfigNode, ParamError, ParamResult};

use crate::flatten::FlattenOptions;
use crate::path::{self, Path, Step};

/// Ordered batch of edits, applied in insertion order.
pub type Edits = IndexMap<String, ConfigNode>;

/// Outcome of one [`TreeUpdater::apply`] batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplySummary {
    /// Edits that overwrote or replaced a node.
    pub replaced: usize,
    /// Sequence elements removed during compaction.
    pub removed: usize,
}

/// Applies edits to a tree in place.
///
/// Assigning [`kg_types::ABSENT`] to a sequence element's own key removes the
/// element; every other resolved key has its node replaced by the new value.
/// Removals are deferred until the batch finishes so that the remaining keys
/// of the batch still resolve against the original indices.
#[derive(Debug, Clone, Copy)]
pub struct TreeUpdater<'o> {
    options: &'o FlattenOptions,
    prefix: &'o str,
}

impl<'o> TreeUpdater<'o> {
    pub fn new(options: &'o FlattenOptions) -> Self {
        Self { options, prefix: "" }
    }

    /// Keys are expected to carry `prefix`, as produced by flattening under it.
    pub fn with_prefix(mut self, prefix: &'o str) -> Self {
        self.prefix = prefix;
        self
    }

    /// Applies `edits` in order.
    ///
    /// There is no rollback: when an edit fails, the edits before it stay
    /// applied (and their removals are still compacted) and the error is
    /// returned.
    pub fn apply<I, K>(&self, root: &mut ConfigNode, edits: I) -> ParamResult<ApplySummary>
    where
        I: IntoIterator<Item = (K, ConfigNode)>,
        K: AsRef<str>,
    {
        let mut summary = ApplySummary::default();
        let mut marked: Vec<Path> = Vec::new();
        let mut outcome = Ok(());

        for (key, value) in edits {
            if let Err(err) = self.apply_one(root, key.as_ref(), value, &mut marked, &mut summary) {
                outcome = Err(err);
                break;
            }
        }

        summary.removed = compact(root, marked);
        outcome.map(|()| summary)
    }

    fn apply_one(
        &self,
        root: &mut ConfigNode,
        key: &str,
        value: ConfigNode,
        marked: &mut Vec<Path>,
        summary: &mut ApplySummary,
    ) -> ParamResult<()> {
        let path = path::resolve(root, self.prefix, key, self.options)?;

        if value.is_null() && matches!(path.last(), Some(Step::Index(_))) {
            debug!(key, "marking sequence element for removal");
            marked.push(path);
            return Ok(());
        }

        let slot = path::node_at_mut(root, &path)
            .ok_or_else(|| ParamError::UnknownParameter { key: key.to_string() })?;
        debug!(key, from = slot.kind(), to = value.kind(), "replacing node");
        *slot = value;
        summary.replaced += 1;
        Ok(())
    }
}

/// Removes the marked elements and returns how many were removed.
///
/// Paths are processed in descending order: within one sequence the highest
/// index goes first and nested elements go before their ancestors, so no
/// removal shifts a path that is still pending.
fn compact(root: &mut ConfigNode, mut marked: Vec<Path>) -> usize {
    marked.sort_unstable_by(|a, b| b.cmp(a));
    marked.dedup();

    let mut removed = 0;
    for mut element in marked {
        let Some(Step::Index(index)) = element.pop() else {
            continue;
        };
        match path::node_at_mut(root, &element).and_then(ConfigNode::as_sequence_mut) {
            Some(items) if index < items.len() => {
                items.remove(index);
                removed += 1;
            }
            _ => warn!(?element, index, "marked element no longer exists, skipping removal"),
        }
    }
    removed
}
