use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const WLID_PREFIX: &str = "wlid://";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WlidError {
    #[error("workload id {0:?} does not start with wlid://")]
    Prefix(String),

    #[error("workload id {wlid:?} is missing the {part} part")]
    Missing { wlid: String, part: &'static str },
}

/// Reference to a single cluster object:
/// `wlid://cluster-<cluster>/namespace-<namespace>/<kind>-<name>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WorkloadId {
    cluster: String,
    namespace: String,
    kind: String,
    name: String,
}

impl WorkloadId {
    pub fn new(
        cluster: impl Into<String>,
        namespace: impl Into<String>,
        kind: &str,
        name: impl Into<String>,
    ) -> Self {
        Self {
            cluster: cluster.into(),
            namespace: namespace.into(),
            kind: canonical_kind(kind),
            name: name.into(),
        }
    }

    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Kind in API casing, e.g. `StatefulSet`.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_pod(&self) -> bool {
        self.kind == "Pod"
    }
}

impl FromStr for WorkloadId {
    type Err = WlidError;

    fn from_str(wlid: &str) -> Result<Self, Self::Err> {
        let rest = wlid
            .strip_prefix(WLID_PREFIX)
            .ok_or_else(|| WlidError::Prefix(wlid.to_owned()))?;

        let missing = |part| WlidError::Missing {
            wlid: wlid.to_owned(),
            part,
        };

        let mut parts = rest.splitn(3, '/');
        let cluster = parts
            .next()
            .and_then(|p| p.strip_prefix("cluster-"))
            .filter(|p| !p.is_empty())
            .ok_or_else(|| missing("cluster"))?;
        let namespace = parts
            .next()
            .and_then(|p| p.strip_prefix("namespace-"))
            .filter(|p| !p.is_empty())
            .ok_or_else(|| missing("namespace"))?;
        let (kind, name) = parts
            .next()
            .and_then(|p| p.split_once('-'))
            .filter(|(kind, name)| !kind.is_empty() && !name.is_empty())
            .ok_or_else(|| missing("kind-name"))?;

        Ok(Self::new(cluster, namespace, kind, name))
    }
}

impl TryFrom<String> for WorkloadId {
    type Error = WlidError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<WorkloadId> for String {
    fn from(id: WorkloadId) -> Self {
        id.to_string()
    }
}

impl fmt::Display for WorkloadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{WLID_PREFIX}cluster-{}/namespace-{}/{}-{}",
            self.cluster,
            self.namespace,
            self.kind.to_lowercase(),
            self.name
        )
    }
}

fn canonical_kind(kind: &str) -> String {
    match kind.to_lowercase().as_str() {
        "pod" => "Pod".into(),
        "deployment" => "Deployment".into(),
        "statefulset" => "StatefulSet".into(),
        "daemonset" => "DaemonSet".into(),
        "replicaset" => "ReplicaSet".into(),
        "replicationcontroller" => "ReplicationController".into(),
        "job" => "Job".into(),
        "cronjob" => "CronJob".into(),
        "secret" => "Secret".into(),
        _ => {
            let mut chars = kind.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        }
    }
}
