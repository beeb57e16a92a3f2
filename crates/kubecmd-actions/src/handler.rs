use std::mem;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::future::BoxFuture;
use kubecmd_core::{BoxError, CommandResponseTask, Rehandle, ResponseHandler};
use tracing::{debug, error, info};

use crate::edit::edit_workload;
use crate::{
    ActionError, ClusterClient, ClusterError, Command, RecreateConfig, Workload, WorkloadId,
};

/// Executes one command against one target object.
#[derive(Debug)]
pub struct ActionHandler<C> {
    wlid: WorkloadId,
    command: Command,
    client: Arc<C>,
    recreate: RecreateConfig,
}

#[derive(Debug, Clone, PartialEq)]
enum UpdatePhase {
    Fetch,
    AwaitPodGone { workload: Workload, polls: u32 },
    Finished,
}

/// Progress of one update command, carried between dispatcher rounds.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkloadUpdateMachine {
    phase: UpdatePhase,
}

impl Default for WorkloadUpdateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkloadUpdateMachine {
    pub fn new() -> Self {
        Self {
            phase: UpdatePhase::Fetch,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.phase, UpdatePhase::Finished)
    }

    /// Number of times the deleted pod was still found.
    pub fn polls(&self) -> u32 {
        match self.phase {
            UpdatePhase::AwaitPodGone { polls, .. } => polls,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Done,
    /// Call `step` again after the delay.
    Wait(Duration),
}

impl<C: ClusterClient> ActionHandler<C> {
    pub fn new(wlid: WorkloadId, command: Command, client: Arc<C>) -> Self {
        Self {
            wlid,
            command,
            client,
            recreate: RecreateConfig::default(),
        }
    }

    pub fn with_recreate_config(mut self, recreate: RecreateConfig) -> Self {
        self.recreate = recreate;
        self
    }

    pub fn wlid(&self) -> &WorkloadId {
        &self.wlid
    }

    pub fn command(&self) -> &Command {
        &self.command
    }

    pub(crate) fn client(&self) -> &C {
        &self.client
    }

    /// Runs the whole update, sleeping between pod polls.
    pub async fn update(&self) -> Result<(), ActionError> {
        let mut machine = WorkloadUpdateMachine::new();
        loop {
            match self.step(&mut machine).await? {
                Step::Done => return Ok(()),
                Step::Wait(delay) => tokio::time::sleep(delay).await,
            }
        }
    }

    /// Advances `machine` until it finishes or has to wait.
    ///
    /// A failed step leaves the machine finished.
    pub async fn step(&self, machine: &mut WorkloadUpdateMachine) -> Result<Step, ActionError> {
        loop {
            match mem::replace(&mut machine.phase, UpdatePhase::Finished) {
                UpdatePhase::Fetch => {
                    let mut workload = self
                        .client
                        .get_workload(&self.wlid)
                        .await
                        .map_err(|err| self.cluster_error(err))?;

                    edit_workload(
                        &mut workload,
                        &self.command.command_name,
                        &self.wlid,
                        Utc::now(),
                    );
                    info!(
                        command = %self.command.command_name,
                        wlid = %self.wlid,
                        workload = %workload.to_json(),
                        "edited workload"
                    );

                    if !self.wlid.is_pod() {
                        self.update_workload(&workload).await?;
                        return Ok(Step::Done);
                    }

                    info!(wlid = %self.wlid, "recreating pod");
                    self.client
                        .delete_workload(&self.wlid)
                        .await
                        .map_err(|err| self.cluster_error(err))?;
                    workload.remove_pod_status();
                    workload.remove_resource_version();

                    machine.phase = UpdatePhase::AwaitPodGone { workload, polls: 0 };
                }

                UpdatePhase::AwaitPodGone { workload, polls } => {
                    match self.client.get_workload(&self.wlid).await {
                        Err(err) if err.is_not_found() => {
                            self.client
                                .create_workload(&workload)
                                .await
                                .map_err(|err| self.cluster_error(err))?;
                            info!(wlid = %self.wlid, polls, "pod recreated");
                            return Ok(Step::Done);
                        }
                        Err(err) => return Err(self.cluster_error(err)),
                        Ok(_) => {}
                    }

                    let elapsed = self.recreate.poll_interval * polls;
                    if elapsed >= self.recreate.max_wait {
                        error!(
                            command = %self.command.command_name,
                            wlid = %self.wlid,
                            elapsed_secs = elapsed.as_secs(),
                            "pod was not deleted in time"
                        );
                        return Err(ActionError::Timeout {
                            command: self.command.command_name.clone(),
                            elapsed_secs: elapsed.as_secs(),
                            wlid: self.wlid.clone(),
                        });
                    }

                    debug!(wlid = %self.wlid, polls, "pod still exists");
                    machine.phase = UpdatePhase::AwaitPodGone {
                        workload,
                        polls: polls + 1,
                    };
                    return Ok(Step::Wait(self.recreate.poll_interval));
                }

                UpdatePhase::Finished => return Ok(Step::Done),
            }
        }
    }

    async fn update_workload(&self, workload: &Workload) -> Result<(), ActionError> {
        let delete_pods =
            self.command.is_force_delete() || workload.has_persistent_volume_claim();

        if delete_pods {
            info!(wlid = %self.wlid, "updating workload by deleting pods");
            let selector = workload
                .pod_selector()
                .ok_or_else(|| ActionError::MissingSelector {
                    command: self.command.command_name.clone(),
                    wlid: self.wlid.clone(),
                })?;
            return self
                .client
                .delete_pods(self.wlid.namespace(), &selector)
                .await
                .map_err(|err| self.cluster_error(err));
        }

        self.client
            .update_workload(workload)
            .await
            .map(|_| ())
            .map_err(|err| self.cluster_error(err))
    }

    fn cluster_error(&self, source: ClusterError) -> ActionError {
        ActionError::Cluster {
            command: self.command.command_name.clone(),
            wlid: self.wlid.clone(),
            source,
        }
    }
}

impl<C: ClusterClient + 'static> ActionHandler<C> {
    /// Wraps this handler into a dispatcher task; each pod poll becomes its
    /// own round.
    pub fn into_task(self) -> CommandResponseTask<WorkloadUpdateMachine> {
        let name = self.command.command_name.to_string();
        CommandResponseTask::new(name, self, WorkloadUpdateMachine::new())
    }
}

impl<C: ClusterClient> ResponseHandler<WorkloadUpdateMachine> for ActionHandler<C> {
    fn handle<'a>(
        &'a self,
        machine: &'a mut WorkloadUpdateMachine,
    ) -> BoxFuture<'a, Result<Rehandle, BoxError>> {
        Box::pin(async move {
            match self.step(machine).await {
                Ok(Step::Done) => Ok(Rehandle::Done),
                Ok(Step::Wait(delay)) => Ok(Rehandle::After(delay)),
                Err(err) => {
                    error!(
                        command = %self.command.command_name,
                        wlid = %self.wlid,
                        error = %err,
                        "command failed"
                    );
                    Err(err.into())
                }
            }
        })
    }
}
