use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::WorkloadId;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
}

impl ObjectMeta {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            ..Self::default()
        }
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }

    pub fn set_label(&mut self, key: &str, value: impl Into<String>) {
        self.labels.insert(key.to_owned(), value.into());
    }

    pub fn remove_label(&mut self, key: &str) {
        self.labels.remove(key);
    }

    pub fn set_annotation(&mut self, key: &str, value: impl Into<String>) {
        self.annotations.insert(key.to_owned(), value.into());
    }

    pub fn remove_annotation(&mut self, key: &str) {
        self.annotations.remove(key);
    }
}

/// Equality-based label selector, printed as `k1=v1,k2=v2`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelSelector(BTreeMap<String, String>);

impl LabelSelector {
    pub fn new(labels: BTreeMap<String, String>) -> Self {
        Self(labels)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.0.iter().all(|(k, v)| labels.get(k) == Some(v))
    }
}

impl<K, V> FromIterator<(K, V)> for LabelSelector
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{key}={value}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistentVolumeClaimSource {
    pub claim_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistent_volume_claim: Option<PersistentVolumeClaimSource>,
}

impl Volume {
    pub fn empty_dir(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            persistent_volume_claim: None,
        }
    }

    pub fn claim(name: impl Into<String>, claim_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            persistent_volume_claim: Some(PersistentVolumeClaimSource {
                claim_name: claim_name.into(),
            }),
        }
    }
}

/// In-memory copy of a workload object.
///
/// Controllers carry a pod template; a bare Pod is its own template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workload {
    pub kind: String,
    pub metadata: ObjectMeta,
    /// `spec.selector.matchLabels`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<BTreeMap<String, String>>,
    /// `spec.template.metadata`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<ObjectMeta>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<Volume>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<serde_json::Value>,
}

impl Workload {
    pub fn pod(id: &WorkloadId) -> Self {
        Self {
            kind: "Pod".into(),
            metadata: ObjectMeta::new(id.namespace(), id.name()),
            selector: None,
            template: None,
            volumes: Vec::new(),
            status: None,
        }
    }

    /// A controller whose pods carry `pod_labels` and are selected by them.
    pub fn controller(id: &WorkloadId, pod_labels: BTreeMap<String, String>) -> Self {
        let template = ObjectMeta {
            labels: pod_labels.clone(),
            ..ObjectMeta::default()
        };
        Self {
            kind: id.kind().to_owned(),
            metadata: ObjectMeta::new(id.namespace(), id.name()),
            selector: Some(pod_labels),
            template: Some(template),
            volumes: Vec::new(),
            status: None,
        }
    }

    pub fn with_volume(mut self, volume: Volume) -> Self {
        self.volumes.push(volume);
        self
    }

    pub fn with_status(mut self, status: serde_json::Value) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_resource_version(mut self, version: impl Into<String>) -> Self {
        self.metadata.resource_version = Some(version.into());
        self
    }

    pub fn is_pod(&self) -> bool {
        self.kind == "Pod"
    }

    /// Metadata the created pods will carry.
    pub fn pod_metadata(&self) -> &ObjectMeta {
        self.template.as_ref().unwrap_or(&self.metadata)
    }

    pub fn pod_metadata_mut(&mut self) -> &mut ObjectMeta {
        match self.template {
            Some(ref mut template) => template,
            None => &mut self.metadata,
        }
    }

    pub fn pod_selector(&self) -> Option<LabelSelector> {
        self.selector
            .as_ref()
            .filter(|labels| !labels.is_empty())
            .map(|labels| LabelSelector::new(labels.clone()))
    }

    pub fn has_persistent_volume_claim(&self) -> bool {
        self.volumes.iter().any(|volume| {
            volume
                .persistent_volume_claim
                .as_ref()
                .is_some_and(|claim| !claim.claim_name.is_empty())
        })
    }

    pub fn remove_pod_status(&mut self) {
        self.status = None;
    }

    pub fn remove_resource_version(&mut self) {
        self.metadata.resource_version = None;
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Secret {
    pub metadata: ObjectMeta,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub secret_type: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, String>,
}

impl Secret {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            metadata: ObjectMeta::new(namespace, name),
            ..Self::default()
        }
    }
}
