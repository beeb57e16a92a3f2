//! In-process [`ClusterClient`] used by the agent demo and the tests.

use std::collections::{BTreeMap, HashMap};

use tokio::sync::Mutex;
use tracing::debug;

use crate::{ClusterClient, ClusterError, LabelSelector, Secret, Workload, WorkloadId};

/// Every request the cluster received, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum ClusterCall {
    GetWorkload(WorkloadId),
    CreateWorkload(Workload),
    UpdateWorkload(Workload),
    DeleteWorkload(WorkloadId),
    DeletePods { namespace: String, selector: String },
    GetSecret { namespace: String, name: String },
    ListSecrets { namespace: String, selector: Option<String> },
    UpdateSecret(Secret),
    DeleteSecret { namespace: String, name: String },
}

/// (namespace, kind, name)
type ObjectKey = (String, String, String);

#[derive(Debug, Clone, Copy)]
enum Linger {
    Polls(u32),
    Forever,
}

#[derive(Debug, Default)]
struct State {
    workloads: BTreeMap<ObjectKey, Workload>,
    secrets: BTreeMap<(String, String), Secret>,
    linger_on_delete: HashMap<ObjectKey, Linger>,
    terminating: HashMap<ObjectKey, Linger>,
    calls: Vec<ClusterCall>,
    version: u64,
    unreachable: bool,
}

impl State {
    fn record(&mut self, call: ClusterCall) -> Result<(), ClusterError> {
        self.calls.push(call);
        if self.unreachable {
            return Err(ClusterError::Transport("cluster unreachable".into()));
        }
        Ok(())
    }

    fn next_version(&mut self) -> String {
        self.version += 1;
        self.version.to_string()
    }
}

#[derive(Debug, Default)]
pub struct InMemoryCluster {
    state: Mutex<State>,
}

fn id_key(id: &WorkloadId) -> ObjectKey {
    (
        id.namespace().to_owned(),
        id.kind().to_owned(),
        id.name().to_owned(),
    )
}

fn workload_key(workload: &Workload) -> ObjectKey {
    (
        workload.metadata.namespace.clone(),
        workload.kind.clone(),
        workload.metadata.name.clone(),
    )
}

impl InMemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `workload` as-is, stamping a resource version.
    pub async fn insert_workload(&self, mut workload: Workload) {
        let mut state = self.state.lock().await;
        workload.metadata.resource_version = Some(state.next_version());
        state.workloads.insert(workload_key(&workload), workload);
    }

    pub async fn insert_secret(&self, secret: Secret) {
        let mut state = self.state.lock().await;
        let key = (
            secret.metadata.namespace.clone(),
            secret.metadata.name.clone(),
        );
        state.secrets.insert(key, secret);
    }

    /// After a delete, keep `id` visible for `polls` more reads, or forever
    /// when `polls` is `None`.
    pub async fn linger_after_delete(&self, id: &WorkloadId, polls: Option<u32>) {
        let linger = polls.map_or(Linger::Forever, Linger::Polls);
        self.state
            .lock()
            .await
            .linger_on_delete
            .insert(id_key(id), linger);
    }

    /// Makes every following request fail with a transport error.
    pub async fn set_unreachable(&self, unreachable: bool) {
        self.state.lock().await.unreachable = unreachable;
    }

    pub async fn calls(&self) -> Vec<ClusterCall> {
        self.state.lock().await.calls.clone()
    }

    pub async fn workload(&self, id: &WorkloadId) -> Option<Workload> {
        self.state.lock().await.workloads.get(&id_key(id)).cloned()
    }

    pub async fn secret(&self, namespace: &str, name: &str) -> Option<Secret> {
        self.state
            .lock()
            .await
            .secrets
            .get(&(namespace.to_owned(), name.to_owned()))
            .cloned()
    }
}

impl ClusterClient for InMemoryCluster {
    async fn get_workload(&self, id: &WorkloadId) -> Result<Workload, ClusterError> {
        let mut state = self.state.lock().await;
        state.record(ClusterCall::GetWorkload(id.clone()))?;

        let key = id_key(id);
        match state.terminating.get(&key).copied() {
            Some(Linger::Polls(0)) => {
                debug!(wlid = %id, "terminating object is gone");
                state.terminating.remove(&key);
                state.workloads.remove(&key);
            }
            Some(Linger::Polls(left)) => {
                state.terminating.insert(key.clone(), Linger::Polls(left - 1));
            }
            Some(Linger::Forever) | None => {}
        }

        state
            .workloads
            .get(&key)
            .cloned()
            .ok_or_else(|| ClusterError::not_found(id.kind(), id.namespace(), id.name()))
    }

    async fn create_workload(&self, workload: &Workload) -> Result<Workload, ClusterError> {
        let mut state = self.state.lock().await;
        state.record(ClusterCall::CreateWorkload(workload.clone()))?;

        let key = workload_key(workload);
        if state.workloads.contains_key(&key) {
            return Err(ClusterError::Transport(format!(
                "{} {}/{} already exists",
                key.1, key.0, key.2
            )));
        }

        let mut created = workload.clone();
        created.metadata.resource_version = Some(state.next_version());
        state.workloads.insert(key, created.clone());
        Ok(created)
    }

    async fn update_workload(&self, workload: &Workload) -> Result<Workload, ClusterError> {
        let mut state = self.state.lock().await;
        state.record(ClusterCall::UpdateWorkload(workload.clone()))?;

        let key = workload_key(workload);
        let Some(current) = state.workloads.get(&key) else {
            return Err(ClusterError::not_found(&key.1, &key.0, &key.2));
        };
        if workload.metadata.resource_version.is_some()
            && workload.metadata.resource_version != current.metadata.resource_version
        {
            return Err(ClusterError::Transport(format!(
                "conflict updating {} {}/{}: stale resource version",
                key.1, key.0, key.2
            )));
        }

        let mut updated = workload.clone();
        updated.metadata.resource_version = Some(state.next_version());
        state.workloads.insert(key, updated.clone());
        Ok(updated)
    }

    async fn delete_workload(&self, id: &WorkloadId) -> Result<(), ClusterError> {
        let mut state = self.state.lock().await;
        state.record(ClusterCall::DeleteWorkload(id.clone()))?;

        let key = id_key(id);
        if !state.workloads.contains_key(&key) {
            return Err(ClusterError::not_found(id.kind(), id.namespace(), id.name()));
        }

        match state.linger_on_delete.get(&key).copied() {
            Some(linger) => {
                state.terminating.insert(key, linger);
            }
            None => {
                state.workloads.remove(&key);
            }
        }
        Ok(())
    }

    async fn delete_pods(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<(), ClusterError> {
        let mut state = self.state.lock().await;
        state.record(ClusterCall::DeletePods {
            namespace: namespace.to_owned(),
            selector: selector.to_string(),
        })?;

        state.workloads.retain(|(ns, kind, _), workload| {
            !(ns == namespace && kind == "Pod" && selector.matches(&workload.metadata.labels))
        });
        Ok(())
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret, ClusterError> {
        let mut state = self.state.lock().await;
        state.record(ClusterCall::GetSecret {
            namespace: namespace.to_owned(),
            name: name.to_owned(),
        })?;

        state
            .secrets
            .get(&(namespace.to_owned(), name.to_owned()))
            .cloned()
            .ok_or_else(|| ClusterError::not_found("Secret", namespace, name))
    }

    async fn list_secrets(
        &self,
        namespace: &str,
        selector: Option<&LabelSelector>,
    ) -> Result<Vec<Secret>, ClusterError> {
        let mut state = self.state.lock().await;
        state.record(ClusterCall::ListSecrets {
            namespace: namespace.to_owned(),
            selector: selector.map(ToString::to_string),
        })?;

        Ok(state
            .secrets
            .values()
            .filter(|secret| secret.metadata.namespace == namespace)
            .filter(|secret| selector.is_none_or(|s| s.matches(&secret.metadata.labels)))
            .cloned()
            .collect())
    }

    async fn update_secret(&self, secret: &Secret) -> Result<Secret, ClusterError> {
        let mut state = self.state.lock().await;
        state.record(ClusterCall::UpdateSecret(secret.clone()))?;

        let key = (
            secret.metadata.namespace.clone(),
            secret.metadata.name.clone(),
        );
        if !state.secrets.contains_key(&key) {
            return Err(ClusterError::not_found("Secret", &key.0, &key.1));
        }
        state.secrets.insert(key, secret.clone());
        Ok(secret.clone())
    }

    async fn delete_secret(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        let mut state = self.state.lock().await;
        state.record(ClusterCall::DeleteSecret {
            namespace: namespace.to_owned(),
            name: name.to_owned(),
        })?;

        state
            .secrets
            .remove(&(namespace.to_owned(), name.to_owned()))
            .map(|_| ())
            .ok_or_else(|| ClusterError::not_found("Secret", namespace, name))
    }
}
