use thiserror::Error;

use crate::{ClusterError, CommandName, WorkloadId};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ActionError {
    #[error("{command} on {wlid} failed: {source}")]
    Cluster {
        command: CommandName,
        wlid: WorkloadId,
        #[source]
        source: ClusterError,
    },

    #[error("{command}: failed to restart pod, time: {elapsed_secs} seconds, workloadID: {wlid}")]
    Timeout {
        command: CommandName,
        elapsed_secs: u64,
        wlid: WorkloadId,
    },

    #[error("{command} on {wlid} needs to delete pods but the workload has no pod selector")]
    MissingSelector {
        command: CommandName,
        wlid: WorkloadId,
    },

    #[error("secret {namespace}/{name}: {source}")]
    Secret {
        namespace: String,
        name: String,
        #[source]
        source: ClusterError,
    },
}

impl ActionError {
    /// Cluster error behind this failure, if any.
    pub fn cluster_error(&self) -> Option<&ClusterError> {
        match self {
            ActionError::Cluster { source, .. } | ActionError::Secret { source, .. } => {
                Some(source)
            }
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.cluster_error().is_some_and(ClusterError::is_not_found)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ActionError::Timeout { .. })
    }
}
