//! Resolution of flat keys back to locations inside a tree.

use kg_types::{ConfigNode, ParamError, ParamResult};

use crate::codec::SEPARATOR;
use crate::flatten::FlattenOptions;

/// One step from a node to one of its children.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Step {
    Key(String),
    Index(usize),
}

/// Location of a node relative to the root.
pub type Path = Vec<Step>;

/// Walks `key` (as produced by flattening under `prefix`) against the current
/// shape of `root` and returns the path it addresses.
///
/// An empty path means the key addresses the root itself.
pub fn resolve(root: &ConfigNode, prefix: &str, key: &str, options: &FlattenOptions) -> ParamResult<Path> {
    let unknown = || ParamError::UnknownParameter { key: key.to_string() };

    let (mut rest, mut at_root) = if prefix.is_empty() {
        (key, true)
    } else {
        (key.strip_prefix(prefix).ok_or_else(unknown)?, false)
    };
    if prefix.is_empty() && key.is_empty() {
        return Err(unknown());
    }

    let mut path = Path::new();
    let mut node = root;
    let mut opaque = false;

    while !rest.is_empty() {
        if opaque {
            return Err(unknown());
        }
        match node {
            ConfigNode::Leaf(_) => return Err(unknown()),
            ConfigNode::Mapping(map) => {
                let tail = if at_root {
                    rest
                } else {
                    rest.strip_prefix(SEPARATOR).ok_or_else(unknown)?
                };
                let (segment, remainder) = match tail.find(SEPARATOR) {
                    Some(pos) => tail.split_at(pos),
                    None => (tail, ""),
                };
                if let Some(child) = map.get(segment) {
                    opaque = options.is_opaque(segment);
                    path.push(Step::Key(segment.to_string()));
                    node = child;
                    rest = remainder;
                } else {
                    // `<field>_<index>...` addressing an element of a sequence field.
                    let (field, child) = map
                        .iter()
                        .filter(|(field, child)| {
                            matches!(child, ConfigNode::Sequence(_))
                                && !options.is_opaque(field)
                                && segment.len() > field.len()
                                && segment.starts_with(field.as_str())
                                && segment.as_bytes()[field.len()] == b'_'
                        })
                        .max_by_key(|(field, _)| field.len())
                        .ok_or_else(unknown)?;
                    path.push(Step::Key(field.clone()));
                    node = child;
                    rest = &tail[field.len()..];
                }
            }
            ConfigNode::Sequence(items) => {
                let tail = if at_root {
                    rest
                } else {
                    rest.strip_prefix('_').ok_or_else(unknown)?
                };
                let digits = tail.bytes().take_while(u8::is_ascii_digit).count();
                if digits == 0 || (digits > 1 && tail.starts_with('0')) {
                    return Err(unknown());
                }
                let index: usize = tail[..digits].parse().map_err(|_| unknown())?;
                let item = items.get(index).ok_or_else(unknown)?;
                let mut after = &tail[digits..];
                if let Some(tag) = options.tag_of(item) {
                    after = after
                        .strip_prefix('_')
                        .and_then(|a| a.strip_prefix(tag))
                        .filter(|a| a.is_empty() || a.starts_with(SEPARATOR))
                        .ok_or_else(unknown)?;
                }
                path.push(Step::Index(index));
                node = item;
                rest = after;
            }
        }
        at_root = false;
    }
    Ok(path)
}

/// Node at `path`, if the path still exists.
pub fn node_at<'a>(root: &'a ConfigNode, path: &[Step]) -> Option<&'a ConfigNode> {
    path.iter().try_fold(root, |node, step| match (node, step) {
        (ConfigNode::Mapping(map), Step::Key(key)) => map.get(key),
        (ConfigNode::Sequence(items), Step::Index(index)) => items.get(*index),
        _ => None,
    })
}

pub fn node_at_mut<'a>(root: &'a mut ConfigNode, path: &[Step]) -> Option<&'a mut ConfigNode> {
    path.iter().try_fold(root, |node, step| match (node, step) {
        (ConfigNode::Mapping(map), Step::Key(key)) => map.get_mut(key),
        (ConfigNode::Sequence(items), Step::Index(index)) => items.get_mut(*index),
        _ => None,
    })
}

/// Value stored under a flat key.
pub fn lookup<'a>(
    root: &'a ConfigNode,
    prefix: &str,
    key: &str,
    options: &FlattenOptions,
) -> ParamResult<&'a ConfigNode> {
    let path = resolve(root, prefix, key, options)?;
    node_at(root, &path).ok_or_else(|| ParamError::UnknownParameter { key: key.to_string() })
}
