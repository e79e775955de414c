//! Digest markers
//!
//! A marker is a ConfigMap recording the digest of the last successfully
//! deployed content of one sub-release. It is shipped together with the
//! sub-release's own documents so both land in the same apply/install call.

use serde_yaml::{Mapping, Value};

use crate::error::Result;
use crate::store::{ConfigMapStore, MANAGED_BY, MANAGED_BY_LABEL};

/// Name prefix of every digest marker
pub const MARKER_PREFIX: &str = "run.helmet.digest.v1.";

/// Data key holding the digest
pub const DIGEST_KEY: &str = "digest";

/// File the marker is written to inside a sub-release's Helm chart
pub const MARKER_TEMPLATE_FILE: &str = "helmet-digest-marker.yaml";

/// Marker ConfigMap name for a sub-release
pub fn marker_name(sub_release: &str) -> String {
    format!("{}{}", MARKER_PREFIX, sub_release)
}

/// Build the marker ConfigMap document
pub fn marker_document(sub_release: &str, namespace: &str, digest: &str) -> Value {
    let mut labels = Mapping::new();
    labels.insert(MANAGED_BY_LABEL.into(), MANAGED_BY.into());

    let mut metadata = Mapping::new();
    metadata.insert("name".into(), marker_name(sub_release).into());
    metadata.insert("namespace".into(), namespace.into());
    metadata.insert("labels".into(), Value::Mapping(labels));

    let mut data = Mapping::new();
    data.insert(DIGEST_KEY.into(), digest.into());

    let mut doc = Mapping::new();
    doc.insert("apiVersion".into(), "v1".into());
    doc.insert("kind".into(), "ConfigMap".into());
    doc.insert("metadata".into(), Value::Mapping(metadata));
    doc.insert("data".into(), Value::Mapping(data));

    Value::Mapping(doc)
}

/// Read the recorded digest of a sub-release
///
/// A missing marker, or one without a digest, is `None`.
pub async fn read_marker(
    store: &dyn ConfigMapStore,
    namespace: &str,
    sub_release: &str,
) -> Result<Option<String>> {
    let found = store.get(namespace, &marker_name(sub_release)).await?;
    Ok(found.and_then(|cm| cm.data.get(DIGEST_KEY).cloned()))
}

/// Delete the marker of a sub-release; returns whether it existed
pub async fn delete_marker(
    store: &dyn ConfigMapStore,
    namespace: &str,
    sub_release: &str,
) -> Result<bool> {
    store.delete(namespace, &marker_name(sub_release)).await
}

/// Recognize a marker ConfigMap document, returning `(namespace, name, digest)`
pub fn parse_marker_document(doc: &Value) -> Option<(String, String, String)> {
    if doc.get("kind")?.as_str()? != "ConfigMap" {
        return None;
    }

    let metadata = doc.get("metadata")?;
    let name = metadata.get("name")?.as_str()?;
    if !name.starts_with(MARKER_PREFIX) {
        return None;
    }
    let namespace = metadata.get("namespace")?.as_str()?;
    let digest = doc.get("data")?.get(DIGEST_KEY)?.as_str()?;

    Some((namespace.to_string(), name.to_string(), digest.to_string()))
}
