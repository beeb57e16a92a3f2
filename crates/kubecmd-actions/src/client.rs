use std::future::Future;

use thiserror::Error;

use crate::{LabelSelector, Secret, Workload, WorkloadId};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClusterError {
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: String,
        namespace: String,
        name: String,
    },

    #[error("cluster request failed: {0}")]
    Transport(String),
}

impl ClusterError {
    pub fn not_found(kind: &str, namespace: &str, name: &str) -> Self {
        ClusterError::NotFound {
            kind: kind.to_owned(),
            namespace: namespace.to_owned(),
            name: name.to_owned(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ClusterError::NotFound { .. })
    }
}

/// Capability to read and write cluster objects.
///
/// Implementations are shared by every in-flight command without extra
/// locking; the cluster's own resource versioning arbitrates writes.
pub trait ClusterClient: Send + Sync {
    fn get_workload(
        &self,
        id: &WorkloadId,
    ) -> impl Future<Output = Result<Workload, ClusterError>> + Send;

    fn create_workload(
        &self,
        workload: &Workload,
    ) -> impl Future<Output = Result<Workload, ClusterError>> + Send;

    fn update_workload(
        &self,
        workload: &Workload,
    ) -> impl Future<Output = Result<Workload, ClusterError>> + Send;

    fn delete_workload(
        &self,
        id: &WorkloadId,
    ) -> impl Future<Output = Result<(), ClusterError>> + Send;

    /// Deletes every pod in `namespace` matching `selector`.
    fn delete_pods(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> impl Future<Output = Result<(), ClusterError>> + Send;

    fn get_secret(
        &self,
        namespace: &str,
        name: &str,
    ) -> impl Future<Output = Result<Secret, ClusterError>> + Send;

    /// Lists secrets in `namespace`, all of them when `selector` is `None`.
    fn list_secrets(
        &self,
        namespace: &str,
        selector: Option<&LabelSelector>,
    ) -> impl Future<Output = Result<Vec<Secret>, ClusterError>> + Send;

    fn update_secret(
        &self,
        secret: &Secret,
    ) -> impl Future<Output = Result<Secret, ClusterError>> + Send;

    fn delete_secret(
        &self,
        namespace: &str,
        name: &str,
    ) -> impl Future<Output = Result<(), ClusterError>> + Send;
}
