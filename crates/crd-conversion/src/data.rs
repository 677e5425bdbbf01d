//! Carries fields which a target version doesn't know about through a
//! conversion, by storing them as JSON in an annotation of the converted
//! object.
//!
//! When converting a hub into a spoke, the spoke loses every field it has no
//! schema for. Calling [`marshal_data`] with the hub as source and the spoke as
//! destination keeps a copy of the hub in the spoke. When the spoke is later
//! converted back into the hub, [`unmarshal_data`] returns that copy so the
//! lost fields can be restored.
use kube::{Resource, ResourceExt};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use snafu::{ResultExt, Snafu};

/// The annotation holding the JSON snapshot of the source object.
pub const DATA_ANNOTATION: &str = "cluster.x-k8s.io/conversion-data";

const METADATA_KEY: &str = "metadata";

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to convert source object into a generic JSON value"))]
    SerializeSource { source: serde_json::Error },

    #[snafu(display("source object must serialize into a JSON object, got {value}"))]
    SourceNotAnObject { value: Value },

    #[snafu(display("failed to serialize conversion data"))]
    SerializeData { source: serde_json::Error },

    #[snafu(display("failed to deserialize conversion data from annotation {DATA_ANNOTATION:?}"))]
    DeserializeData { source: serde_json::Error },
}

/// Stores `src` as JSON in the [`DATA_ANNOTATION`] of `dst`.
///
/// The `metadata` of `src` is not stored. A previously stored value is
/// replaced.
pub fn marshal_data<S, D>(src: &S, dst: &mut D) -> Result<()>
where
    S: Serialize,
    D: Resource,
{
    let value = serde_json::to_value(src).context(SerializeSourceSnafu)?;
    let Value::Object(mut object) = value else {
        return SourceNotAnObjectSnafu { value }.fail();
    };
    object.remove(METADATA_KEY);

    let data = serde_json::to_string(&object).context(SerializeDataSnafu)?;
    dst.annotations_mut().insert(DATA_ANNOTATION.to_owned(), data);

    Ok(())
}

/// Restores the object stored in the [`DATA_ANNOTATION`] of `from`.
///
/// Returns `Ok(None)` without touching `from` if the annotation doesn't exist.
/// Otherwise the annotation is removed after it has been deserialized
/// successfully. If deserialization fails, the annotation stays in place.
///
/// As [`marshal_data`] drops the `metadata`, it is restored as an empty object.
/// This allows restoring types which require a `metadata` field, like the ones
/// generated by [`kube::CustomResource`].
pub fn unmarshal_data<T, R>(from: &mut R) -> Result<Option<T>>
where
    T: DeserializeOwned,
    R: Resource,
{
    let Some(data) = from.annotations().get(DATA_ANNOTATION) else {
        return Ok(None);
    };

    let mut value: Value = serde_json::from_str(data).context(DeserializeDataSnafu)?;
    if let Some(object) = value.as_object_mut() {
        object
            .entry(METADATA_KEY)
            .or_insert_with(|| Value::Object(Default::default()));
    }

    let restored = serde_json::from_value(value).context(DeserializeDataSnafu)?;
    remove_data_annotation(from);

    Ok(Some(restored))
}

/// Removes the [`DATA_ANNOTATION`] from `object`, returning its value.
pub fn remove_data_annotation<R>(object: &mut R) -> Option<String>
where
    R: Resource,
{
    object.meta_mut().annotations.as_mut()?.remove(DATA_ANNOTATION)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use k8s_openapi::{api::core::v1::ConfigMap, apimachinery::pkg::apis::meta::v1::ObjectMeta};
    use serde::Deserialize;

    use super::*;

    fn config_map(name: &str, data: &[(&str, &str)]) -> ConfigMap {
        ConfigMap {
            metadata: ObjectMeta {
                name: Some(name.to_owned()),
                labels: Some([("app".to_owned(), name.to_owned())].into()),
                ..Default::default()
            },
            data: Some(
                data.iter()
                    .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
                    .collect(),
            ),
            ..Default::default()
        }
    }

    #[test]
    fn marshal_creates_annotations() {
        let src = config_map("src", &[("key", "value")]);
        let mut dst = ConfigMap::default();

        marshal_data(&src, &mut dst).expect("config map must marshal");

        let data = dst
            .annotations()
            .get(DATA_ANNOTATION)
            .expect("annotation must be set");
        let data: Value = serde_json::from_str(data).expect("annotation must contain JSON");
        assert_eq!(
            data,
            serde_json::json!({
                "apiVersion": "v1",
                "kind": "ConfigMap",
                "data": { "key": "value" },
            })
        );
    }

    #[test]
    fn marshal_keeps_existing_annotations() {
        let src = config_map("src", &[("key", "value")]);
        let mut dst = ConfigMap::default();
        dst.annotations_mut().insert("keep".to_owned(), "me".to_owned());
        dst.annotations_mut()
            .insert(DATA_ANNOTATION.to_owned(), "stale".to_owned());

        marshal_data(&src, &mut dst).expect("config map must marshal");

        assert_eq!(dst.annotations().len(), 2);
        assert_eq!(dst.annotations().get("keep").map(String::as_str), Some("me"));
        assert_ne!(
            dst.annotations().get(DATA_ANNOTATION).map(String::as_str),
            Some("stale")
        );
    }

    #[test]
    fn marshal_rejects_non_objects() {
        let mut dst = ConfigMap::default();

        let err = marshal_data(&[1, 2, 3], &mut dst).expect_err("arrays must be rejected");
        assert!(matches!(err, Error::SourceNotAnObject { .. }));
        assert!(dst.metadata.annotations.is_none());
    }

    #[test]
    fn round_trip_drops_metadata() {
        let src = config_map("src", &[("key", "value"), ("other", "value")]);
        let mut dst = ConfigMap::default();

        marshal_data(&src, &mut dst).expect("config map must marshal");
        let restored: ConfigMap = unmarshal_data(&mut dst)
            .expect("config map must unmarshal")
            .expect("annotation must exist");

        assert_eq!(restored.data, src.data);
        assert_eq!(restored.metadata, ObjectMeta::default());
    }

    #[test]
    fn unmarshal_consumes_annotation() {
        let src = config_map("src", &[("key", "value")]);
        let mut dst = config_map("dst", &[]);
        dst.annotations_mut().insert("keep".to_owned(), "me".to_owned());

        marshal_data(&src, &mut dst).expect("config map must marshal");
        let restored: Option<ConfigMap> =
            unmarshal_data(&mut dst).expect("config map must unmarshal");

        assert!(restored.is_some());
        assert!(!dst.annotations().contains_key(DATA_ANNOTATION));
        assert!(dst.annotations().contains_key("keep"));
    }

    #[test]
    fn unmarshal_without_annotation() {
        let mut from = config_map("from", &[("key", "value")]);
        let before = from.clone();

        let restored: Option<ConfigMap> = unmarshal_data(&mut from).expect("nothing to unmarshal");

        assert!(restored.is_none());
        assert_eq!(from, before);
    }

    #[test]
    fn unmarshal_failure_keeps_annotation() {
        #[derive(Debug, Deserialize)]
        struct Strict {
            #[allow(dead_code)]
            data: BTreeMap<String, u32>,
        }

        let src = config_map("src", &[("key", "not a number")]);
        let mut dst = ConfigMap::default();
        marshal_data(&src, &mut dst).expect("config map must marshal");
        let before = dst.clone();

        let err = unmarshal_data::<Strict, _>(&mut dst).expect_err("data must not fit");

        assert!(matches!(err, Error::DeserializeData { .. }));
        assert_eq!(dst, before);
    }

    #[test]
    fn remove_annotation() {
        let mut object = ConfigMap::default();
        assert_eq!(remove_data_annotation(&mut object), None);

        object
            .annotations_mut()
            .insert(DATA_ANNOTATION.to_owned(), "{}".to_owned());
        assert_eq!(remove_data_annotation(&mut object).as_deref(), Some("{}"));
        assert!(object.annotations().is_empty());
    }
}
