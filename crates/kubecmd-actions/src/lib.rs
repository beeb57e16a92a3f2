//! Cluster-facing command actions: workload updates and secret edits.
//!
//! [`ActionHandler`] runs a command against one target object through a
//! [`ClusterClient`]. Workload updates are expressed as a
//! [`WorkloadUpdateMachine`] so a pod recreation can be polled through the
//! `kubecmd-core` dispatcher one round at a time.

pub mod client;
pub mod command;
pub mod config;
pub mod edit;
pub mod errors;
pub mod handler;
pub mod identifier;
pub mod memory;
pub mod object;
mod secrets;

pub use client::{ClusterClient, ClusterError};
pub use command::{Command, CommandName};
pub use config::RecreateConfig;
pub use errors::ActionError;
pub use handler::{ActionHandler, Step, WorkloadUpdateMachine};
pub use identifier::{WlidError, WorkloadId};
pub use memory::{ClusterCall, InMemoryCluster};
pub use object::{LabelSelector, ObjectMeta, Secret, Volume, Workload};
