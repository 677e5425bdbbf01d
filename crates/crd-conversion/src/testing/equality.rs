use assert_json_diff::{CompareMode, Config, assert_json_matches_no_panic};
use serde::Serialize;
use serde_json::{Map, Value};

/// Paths of maps which are considered absent when they are empty, in addition
/// to the ones added with [`SemanticEquality::with_map_path`].
pub const DEFAULT_MAP_PATHS: &[&str] = &["/metadata/labels", "/metadata/annotations"];

/// Compares two values after serializing them into JSON.
///
/// A field which is `null` or an empty list is treated like a missing field,
/// so `None` and `Some(vec![])` are interchangeable. Empty objects are kept,
/// because `Some(Struct::default())` and `None` are different values. Only
/// objects at the registered map paths are treated as absent when empty, so
/// that `None` and `Some(BTreeMap::new())` compare equal there.
///
/// Map paths are JSON pointers like `/metadata/annotations`. A `*` segment
/// matches any key or list index.
#[derive(Clone, Debug)]
pub struct SemanticEquality {
    map_paths: Vec<Vec<String>>,
}

impl Default for SemanticEquality {
    fn default() -> Self {
        DEFAULT_MAP_PATHS
            .iter()
            .fold(Self::strict(), |equality, path| equality.with_map_path(*path))
    }
}

impl SemanticEquality {
    /// Creates a comparison without any map paths.
    pub fn strict() -> Self {
        Self {
            map_paths: Vec::new(),
        }
    }

    /// Treats the empty object at `path` as absent.
    pub fn with_map_path(mut self, path: impl AsRef<str>) -> Self {
        let segments = path
            .as_ref()
            .split('/')
            .skip(1)
            .map(|segment| segment.replace("~1", "/").replace("~0", "~"))
            .collect();

        self.map_paths.push(segments);
        self
    }

    /// Returns a human readable diff if the values differ.
    pub fn diff<L, R>(&self, lhs: &L, rhs: &R) -> Result<Option<String>, serde_json::Error>
    where
        L: Serialize + ?Sized,
        R: Serialize + ?Sized,
    {
        let lhs = self.normalize(serde_json::to_value(lhs)?);
        let rhs = self.normalize(serde_json::to_value(rhs)?);

        Ok(assert_json_matches_no_panic(&lhs, &rhs, Config::new(CompareMode::Strict)).err())
    }

    pub fn equal<L, R>(&self, lhs: &L, rhs: &R) -> Result<bool, serde_json::Error>
    where
        L: Serialize + ?Sized,
        R: Serialize + ?Sized,
    {
        Ok(self.diff(lhs, rhs)?.is_none())
    }

    /// Removes absent fields from all objects contained in `value`.
    ///
    /// Elements of lists are normalized but never removed, as that would shift
    /// the position of the following elements.
    pub fn normalize(&self, value: Value) -> Value {
        self.normalize_at(value, &mut Vec::new())
    }

    fn normalize_at(&self, value: Value, path: &mut Vec<String>) -> Value {
        match value {
            Value::Object(object) => Value::Object(self.normalize_object(object, path)),
            Value::Array(items) => Value::Array(
                items
                    .into_iter()
                    .enumerate()
                    .map(|(index, item)| {
                        path.push(index.to_string());
                        let item = self.normalize_at(item, path);
                        path.pop();
                        item
                    })
                    .collect(),
            ),
            value => value,
        }
    }

    fn normalize_object(
        &self,
        object: Map<String, Value>,
        path: &mut Vec<String>,
    ) -> Map<String, Value> {
        let mut normalized = Map::new();

        for (key, value) in object {
            path.push(key.clone());
            let value = self.normalize_at(value, path);
            let absent = match &value {
                Value::Null => true,
                Value::Array(items) => items.is_empty(),
                Value::Object(object) => object.is_empty() && self.is_map_path(path),
                _ => false,
            };
            path.pop();

            if !absent {
                normalized.insert(key, value);
            }
        }

        normalized
    }

    fn is_map_path(&self, path: &[String]) -> bool {
        self.map_paths.iter().any(|map_path| {
            map_path.len() == path.len()
                && map_path
                    .iter()
                    .zip(path)
                    .all(|(expected, actual)| expected == "*" || expected == actual)
        })
    }
}

/// Compares two values with the [default](SemanticEquality::default) settings,
/// returning a human readable diff if they differ.
pub fn semantic_diff<L, R>(lhs: &L, rhs: &R) -> Result<Option<String>, serde_json::Error>
where
    L: Serialize + ?Sized,
    R: Serialize + ?Sized,
{
    SemanticEquality::default().diff(lhs, rhs)
}

/// Returns whether both values are semantically equal, see [`semantic_diff`].
pub fn semantically_equal<L, R>(lhs: &L, rhs: &R) -> Result<bool, serde_json::Error>
where
    L: Serialize + ?Sized,
    R: Serialize + ?Sized,
{
    SemanticEquality::default().equal(lhs, rhs)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use k8s_openapi::{api::core::v1::ConfigMap, apimachinery::pkg::apis::meta::v1::ObjectMeta};
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    #[derive(Debug, Default, Serialize)]
    struct Inner {
        name: Option<String>,
        items: Vec<String>,
    }

    #[derive(Debug, Default, Serialize)]
    struct Outer {
        inner: Option<Inner>,
    }

    #[rstest]
    #[case(json!({"a": null}), json!({}))]
    #[case(json!({"a": []}), json!({}))]
    #[case(json!({"a": {"b": {}}}), json!({"a": {"b": {}}}))]
    #[case(json!({"a": {"b": null, "c": 1}}), json!({"a": {"c": 1}}))]
    #[case(json!({"a": {"b": null}}), json!({"a": {}}))]
    #[case(json!({"a": [null, {}, {"b": []}]}), json!({"a": [null, {}, {}]}))]
    #[case(json!({"a": "", "b": 0, "c": false}), json!({"a": "", "b": 0, "c": false}))]
    #[case(json!({"metadata": {"annotations": {}, "labels": {}}}), json!({"metadata": {}}))]
    #[case(json!({"spec": {"annotations": {}}}), json!({"spec": {"annotations": {}}}))]
    fn normalize_values(#[case] input: Value, #[case] expected: Value) {
        assert_eq!(SemanticEquality::default().normalize(input), expected);
    }

    #[test]
    fn empty_struct_differs_from_none() {
        let without = Outer { inner: None };
        let with = Outer {
            inner: Some(Inner::default()),
        };

        let diff = semantic_diff(&without, &with)
            .expect("values must serialize")
            .expect("values must differ");
        assert!(diff.contains("inner"), "unexpected diff: {diff}");
    }

    #[test]
    fn empty_collections_equal_missing_ones() {
        let without = ConfigMap {
            metadata: ObjectMeta {
                name: Some("foo".to_owned()),
                ..Default::default()
            },
            ..Default::default()
        };
        let with = ConfigMap {
            metadata: ObjectMeta {
                name: Some("foo".to_owned()),
                annotations: Some(BTreeMap::new()),
                labels: Some(BTreeMap::new()),
                finalizers: Some(Vec::new()),
                ..Default::default()
            },
            ..Default::default()
        };

        assert!(semantically_equal(&without, &with).expect("config maps must serialize"));
    }

    #[test]
    fn custom_map_paths() {
        let lhs = json!({
            "spec": {"selectors": [{"matchLabels": {}}, {"matchLabels": {"a": "b"}}]}
        });
        let rhs = json!({"spec": {"selectors": [{}, {"matchLabels": {"a": "b"}}]}});

        assert!(!semantically_equal(&lhs, &rhs).expect("values must serialize"));
        assert!(
            SemanticEquality::default()
                .with_map_path("/spec/selectors/*/matchLabels")
                .equal(&lhs, &rhs)
                .expect("values must serialize")
        );
    }

    #[test]
    fn strict_keeps_metadata_maps() {
        let lhs = json!({"metadata": {"annotations": {}}});
        let rhs = json!({"metadata": {}});

        assert!(semantically_equal(&lhs, &rhs).expect("values must serialize"));
        assert!(
            !SemanticEquality::strict()
                .equal(&lhs, &rhs)
                .expect("values must serialize")
        );
    }

    #[test]
    fn escaped_map_paths() {
        let lhs = json!({"data": {"a/b": {}}});
        let rhs = json!({"data": {}});

        assert!(
            SemanticEquality::strict()
                .with_map_path("/data/a~1b")
                .equal(&lhs, &rhs)
                .expect("values must serialize")
        );
    }

    #[test]
    fn different_values_produce_diff() {
        let lhs = json!({"spec": {"replicas": 1, "image": "nginx"}});
        let rhs = json!({"spec": {"replicas": 2, "image": "nginx"}});

        let diff = semantic_diff(&lhs, &rhs)
            .expect("values must serialize")
            .expect("values must differ");
        assert!(diff.contains(".spec.replicas"), "unexpected diff: {diff}");
    }

    #[test]
    fn extra_fields_are_not_ignored() {
        let lhs = json!({"spec": {"replicas": 1}});
        let rhs = json!({"spec": {"replicas": 1, "paused": true}});

        assert!(!semantically_equal(&lhs, &rhs).expect("values must serialize"));
        assert!(!semantically_equal(&rhs, &lhs).expect("values must serialize"));
    }
}
