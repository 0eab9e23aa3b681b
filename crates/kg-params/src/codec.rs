//! Conversion between key paths and flat parameter keys.

use kg_types::{ConfigNode, Mapping, ParamError, ParamResult};

/// Reserved separator between key segments.
pub const SEPARATOR: &str = "__";

fn invalid(segment: &str, reason: &str) -> ParamError {
    ParamError::InvalidSegment {
        segment: segment.to_string(),
        reason: reason.to_string(),
    }
}

/// Checks that `segment` can be joined and split back without ambiguity.
pub fn validate_segment(segment: &str) -> ParamResult<()> {
    if segment.is_empty() {
        return Err(invalid(segment, "segment is empty"));
    }
    if segment.contains(SEPARATOR) {
        return Err(invalid(segment, "segment contains the reserved separator"));
    }
    // "a_" + "__" + "b" splits as ["a", "_b"].
    if segment.starts_with('_') || segment.ends_with('_') {
        return Err(invalid(segment, "segment starts or ends with '_'"));
    }
    Ok(())
}

/// Appends `segment` to `prefix`. An empty prefix yields the segment itself.
pub fn join(prefix: &str, segment: &str) -> ParamResult<String> {
    validate_segment(segment)?;
    if prefix.is_empty() {
        Ok(segment.to_string())
    } else {
        Ok(format!("{prefix}{SEPARATOR}{segment}"))
    }
}

/// Splits a key into its segments.
pub fn split(key: &str) -> Vec<&str> {
    key.split(SEPARATOR).collect()
}

/// Key of the `index`-th element of the sequence stored under `container`.
///
/// The element tag, when present, must itself be a valid segment.
pub fn element_key(container: &str, index: usize, tag: Option<&str>) -> ParamResult<String> {
    let mut key = if container.is_empty() {
        index.to_string()
    } else {
        format!("{container}_{index}")
    };
    if let Some(tag) = tag {
        validate_segment(tag)?;
        key.push('_');
        key.push_str(tag);
    }
    Ok(key)
}

/// Builds the nested tree a single flat key describes:
/// `a__b__c = v` becomes `{a: {b: {c: v}}}`.
pub fn nest(key: &str, value: ConfigNode) -> ParamResult<ConfigNode> {
    let segments = split(key);
    for segment in &segments {
        validate_segment(segment)?;
    }
    Ok(segments.into_iter().rev().fold(value, |child, segment| {
        let mut map = Mapping::new();
        map.insert(segment.to_string(), child);
        ConfigNode::Mapping(map)
    }))
}
