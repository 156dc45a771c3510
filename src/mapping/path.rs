//! Array paths: parsing and resolution against nested values
//!
//! A path such as `orders/*{status == 'open'}/lines` is split on a separator
//! into segments. Each segment is a key (or the wildcard `*`) with an
//! optional condition in braces. Resolution walks the value one segment at
//! a time; a wildcard applies the remaining segments to every child that
//! passes its condition and gathers the results.

use crate::error::{MapError, Result};
use crate::expression::{ConditionEvaluator, ExpressionLanguage};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::fmt;

/// Key matching every child of a container
pub const WILDCARD: &str = "*";

const DISPLAY_SEPARATOR: &str = "/";

static CONDITION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(.*)\{(.*)\}").expect("valid regex"));

/// One step of an array path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSegment {
    pub key: String,
    /// Empty when the segment has no condition
    pub condition: String,
}

impl PathSegment {
    pub fn new(key: impl Into<String>, condition: impl Into<String>) -> Self {
        PathSegment {
            key: key.into(),
            condition: condition.into(),
        }
    }

    /// Split `key{condition}`; without a brace pair the whole text is the key
    pub fn parse(raw: &str) -> Self {
        if raw.contains('{') {
            if let Some(captures) = CONDITION_RE.captures(raw) {
                return PathSegment::new(&captures[1], &captures[2]);
            }
        }
        PathSegment::new(raw, "")
    }

    pub fn is_wildcard(&self) -> bool {
        self.key == WILDCARD
    }

    pub fn has_condition(&self) -> bool {
        !self.condition.is_empty()
    }
}

/// Parsed array path
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Path {
    segments: Vec<PathSegment>,
}

impl Path {
    /// Split `path` on `separator`. Segments may be double-quoted to contain the separator.
    pub fn parse(path: &str, separator: &str) -> Result<Self> {
        let delimiter = separator_byte(separator)?;

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(delimiter)
            .from_reader(path.as_bytes());

        let segments = match reader.records().next() {
            Some(record) => {
                let record = record.map_err(|e| MapError::InvalidPath {
                    path: path.to_string(),
                    message: e.to_string(),
                })?;
                record.iter().map(PathSegment::parse).collect()
            }
            None => Vec::new(),
        };

        Ok(Path { segments })
    }

    pub fn from_segments(segments: Vec<PathSegment>) -> Self {
        Path { segments }
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Whether resolving this path can collapse several matches into one
    pub fn has_wildcard(&self) -> bool {
        self.segments.iter().any(PathSegment::is_wildcard)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(DISPLAY_SEPARATOR)?;
            }
            f.write_str(&segment.key)?;
            if segment.has_condition() {
                write!(f, "{{{}}}", segment.condition)?;
            }
        }
        Ok(())
    }
}

/// Validate a separator and return it as a single byte
pub fn separator_byte(separator: &str) -> Result<u8> {
    match separator.as_bytes() {
        [byte] if byte.is_ascii() && *byte != b'"' => Ok(*byte),
        _ => Err(MapError::InvalidSeparator(separator.to_string())),
    }
}

/// Resolves array paths against nested values
pub struct PathResolver<E = ExpressionLanguage> {
    evaluator: E,
}

impl Default for PathResolver<ExpressionLanguage> {
    fn default() -> Self {
        PathResolver::new(ExpressionLanguage::new())
    }
}

impl<E: ConditionEvaluator> PathResolver<E> {
    pub fn new(evaluator: E) -> Self {
        PathResolver { evaluator }
    }

    pub fn evaluator(&self) -> &E {
        &self.evaluator
    }

    /// Resolve `path` against `value`
    ///
    /// Returns `None` when the path leads nowhere. A wildcard that matches
    /// exactly one child yields that child rather than a one-item list.
    /// Fails only when a condition cannot be evaluated.
    pub fn resolve(&self, value: &Value, path: &Path) -> Result<Option<Value>> {
        self.resolve_segments(value, path.segments())
    }

    fn resolve_segments(&self, value: &Value, segments: &[PathSegment]) -> Result<Option<Value>> {
        let Some((segment, rest)) = segments.split_first() else {
            return Ok(Some(value.clone()));
        };

        if !is_container(value) {
            return Ok(None);
        }

        if segment.is_wildcard() {
            let mut matches = Vec::new();
            for item in children(value) {
                if !self.test(segment, item)? {
                    continue;
                }
                // The remaining segments are applied per item, never to the gathered result
                match self.resolve_segments(item, rest)? {
                    Some(Value::Array(items)) => matches.extend(items),
                    Some(other) => matches.push(other),
                    None => matches.push(Value::Null),
                }
            }
            return Ok(collapse(matches));
        }

        let Some(child) = lookup_key(value, &segment.key) else {
            return Ok(None);
        };
        if !self.test(segment, child)? {
            return Ok(None);
        }
        self.resolve_segments(child, rest)
    }

    /// Evaluate the segment's condition against a candidate value
    fn test(&self, segment: &PathSegment, candidate: &Value) -> Result<bool> {
        if !segment.has_condition() {
            return Ok(true);
        }
        let scope = condition_scope(candidate);
        self.evaluator
            .evaluate(&segment.condition, &scope)
            .map_err(|source| MapError::Expression {
                condition: segment.condition.clone(),
                source,
            })
    }
}

/// Variables visible to a condition: the fields of a mapping, the indices
/// of a list, or a single `value` for anything else
fn condition_scope(candidate: &Value) -> Cow<'_, Map<String, Value>> {
    match candidate {
        Value::Object(map) => Cow::Borrowed(map),
        Value::Array(items) => Cow::Owned(
            items
                .iter()
                .enumerate()
                .map(|(i, item)| (i.to_string(), item.clone()))
                .collect(),
        ),
        other => {
            let mut scope = Map::new();
            scope.insert("value".to_string(), other.clone());
            Cow::Owned(scope)
        }
    }
}

fn collapse(mut matches: Vec<Value>) -> Option<Value> {
    match matches.len() {
        0 => None,
        1 => matches.pop(),
        _ => Some(Value::Array(matches)),
    }
}

pub(crate) fn is_container(value: &Value) -> bool {
    matches!(value, Value::Array(_) | Value::Object(_))
}

/// Children of a container in container order
pub(crate) fn children(value: &Value) -> Box<dyn Iterator<Item = &Value> + '_> {
    match value {
        Value::Array(items) => Box::new(items.iter()),
        Value::Object(map) => Box::new(map.values()),
        _ => Box::new(std::iter::empty()),
    }
}

/// Direct child by key; list children are addressed by their index
pub(crate) fn lookup_key<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExpressionError;
    use serde_json::json;

    fn resolve(value: &Value, path: &str) -> Option<Value> {
        let resolver: PathResolver = PathResolver::default();
        resolver.resolve(value, &Path::parse(path, "/").unwrap()).unwrap()
    }

    #[test]
    fn test_segment_parsing() {
        assert_eq!(PathSegment::parse("items"), PathSegment::new("items", ""));
        assert_eq!(PathSegment::parse("*{value > 2}"), PathSegment::new("*", "value > 2"));
        // No closing brace: the segment is used verbatim
        assert_eq!(PathSegment::parse("odd{key"), PathSegment::new("odd{key", ""));
        // Greedy key: only the last brace pair is the condition
        assert_eq!(PathSegment::parse("a{x}{y}"), PathSegment::new("a{x}", "y"));
    }

    #[test]
    fn test_path_parsing() {
        let path = Path::parse("orders/*{status == 'open'}/lines", "/").unwrap();
        assert_eq!(
            path.segments(),
            &[
                PathSegment::new("orders", ""),
                PathSegment::new("*", "status == 'open'"),
                PathSegment::new("lines", ""),
            ]
        );
        assert!(path.has_wildcard());
        assert_eq!(path.to_string(), "orders/*{status == 'open'}/lines");

        let custom = Path::parse("a|b", "|").unwrap();
        assert_eq!(custom.segments().len(), 2);

        // Quoting protects a separator inside a segment
        let quoted = Path::parse("\"a/b\"/c", "/").unwrap();
        assert_eq!(quoted.segments()[0].key, "a/b");
        assert_eq!(quoted.segments()[1].key, "c");

        assert!(Path::parse("", "/").unwrap().is_empty());
    }

    #[test]
    fn test_invalid_separator() {
        assert!(matches!(Path::parse("a/b", "//"), Err(MapError::InvalidSeparator(_))));
        assert!(matches!(Path::parse("a/b", ""), Err(MapError::InvalidSeparator(_))));
    }

    #[test]
    fn test_nested_keys() {
        let data = json!({"a": {"b": {"c": 42}}, "list": [10, 20, 30]});
        assert_eq!(resolve(&data, "a/b/c"), Some(json!(42)));
        assert_eq!(resolve(&data, "a/b"), Some(json!({"c": 42})));
        assert_eq!(resolve(&data, "list/1"), Some(json!(20)));
        assert_eq!(resolve(&data, "a/missing"), None);
        // Cannot navigate into a scalar
        assert_eq!(resolve(&data, "a/b/c/d"), None);
    }

    #[test]
    fn test_empty_path_returns_value() {
        let data = json!({"a": 1});
        let resolver: PathResolver = PathResolver::default();
        assert_eq!(resolver.resolve(&data, &Path::default()).unwrap(), Some(data.clone()));
    }

    #[test]
    fn test_wildcard_collapse_rule() {
        assert_eq!(resolve(&json!({"items": [5]}), "items/*"), Some(json!(5)));
        assert_eq!(resolve(&json!({"items": [5, 6]}), "items/*"), Some(json!([5, 6])));
        assert_eq!(resolve(&json!({"items": []}), "items/*"), None);
    }

    #[test]
    fn test_wildcard_condition_filter() {
        let data = json!({"items": [1, 2, 3, 4]});
        assert_eq!(resolve(&data, "items/*{value > 2}"), Some(json!([3, 4])));
        assert_eq!(resolve(&data, "items/*{value > 3}"), Some(json!(4)));
        assert_eq!(resolve(&data, "items/*{value > 4}"), None);
    }

    #[test]
    fn test_wildcard_applies_rest_per_item() {
        let data = json!({
            "orders": [
                {"id": 1, "lines": [{"sku": "a"}, {"sku": "b"}]},
                {"id": 2, "lines": [{"sku": "c"}]},
                {"id": 3}
            ]
        });

        // Nested lists are spliced one level; a missing branch contributes null
        assert_eq!(
            resolve(&data, "orders/*/lines/*/sku"),
            Some(json!(["a", "b", "c", null]))
        );
        assert_eq!(resolve(&data, "orders/*{id == 2}/lines/*/sku"), Some(json!("c")));
    }

    #[test]
    fn test_wildcard_over_mapping() {
        let data = json!({"prices": {"eur": 10, "usd": 12, "gbp": 9}});
        assert_eq!(resolve(&data, "prices/*{value >= 10}"), Some(json!([10, 12])));
    }

    #[test]
    fn test_keyed_segment_condition() {
        let data = json!({"product": {"name": "Sword", "stock": 0}, "price": 15});
        assert_eq!(resolve(&data, "product{stock > 0}/name"), None);
        assert_eq!(resolve(&data, "product{stock == 0}/name"), Some(json!("Sword")));
        assert_eq!(resolve(&data, "price{value > 10}"), Some(json!(15)));
    }

    #[test]
    fn test_found_null_is_distinct_from_missing() {
        let data = json!({"a": null});
        assert_eq!(resolve(&data, "a"), Some(Value::Null));
        assert_eq!(resolve(&data, "b"), None);
    }

    #[test]
    fn test_broken_condition_is_an_error() {
        let resolver: PathResolver = PathResolver::default();
        let path = Path::parse("items/*{value >}", "/").unwrap();
        let err = resolver.resolve(&json!({"items": [1]}), &path).unwrap_err();

        match err {
            MapError::Expression { condition, source } => {
                assert_eq!(condition, "value >");
                assert!(matches!(source, ExpressionError::Syntax { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_custom_evaluator() {
        struct AlwaysFalse;

        impl ConditionEvaluator for AlwaysFalse {
            fn evaluate(&self, _: &str, _: &Map<String, Value>) -> std::result::Result<bool, ExpressionError> {
                Ok(false)
            }
        }

        let resolver = PathResolver::new(AlwaysFalse);
        let path = Path::parse("items/*{anything}", "/").unwrap();
        assert_eq!(resolver.resolve(&json!({"items": [1, 2]}), &path).unwrap(), None);

        // Segments without a condition never reach the evaluator
        let plain = Path::parse("items/*", "/").unwrap();
        assert_eq!(resolver.resolve(&json!({"items": [1, 2]}), &plain).unwrap(), Some(json!([1, 2])));
    }
}
