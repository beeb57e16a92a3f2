use std::collections::BTreeMap;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use kubecmd_actions::{
    ActionHandler, Command, CommandName, InMemoryCluster, RecreateConfig, Volume, Workload,
    WorkloadId, WorkloadUpdateMachine,
};
use kubecmd_core::{ResponseDispatcher, SchedulerConfig};
use tokio::time::sleep;
use tracing::info;

use tracing_subscriber::{EnvFilter, fmt};

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();
}

async fn seed_cluster(
    cluster: &InMemoryCluster,
) -> Result<(WorkloadId, WorkloadId), Box<dyn Error>> {
    let pod: WorkloadId = "wlid://cluster-demo/namespace-default/pod-nginx".parse()?;
    let db: WorkloadId = "wlid://cluster-demo/namespace-default/statefulset-postgres".parse()?;

    let running = Workload::pod(&pod).with_status(serde_json::json!({ "phase": "Running" }));
    cluster.insert_workload(running).await;
    // the kubelet takes a few seconds to tear the pod down
    cluster.linger_after_delete(&pod, Some(3)).await;

    let pod_labels = BTreeMap::from([("app".to_owned(), "postgres".to_owned())]);
    cluster
        .insert_workload(
            Workload::controller(&db, pod_labels)
                .with_volume(Volume::claim("data", "postgres-data")),
        )
        .await;

    Ok((pod, db))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();

    let scheduler_config = SchedulerConfig::from_env()?;
    let recreate_config = RecreateConfig::from_env()?;
    info!(?scheduler_config, ?recreate_config, "starting agent demo");

    let cluster = Arc::new(InMemoryCluster::new());
    let (pod, db) = seed_cluster(&cluster).await?;

    let dispatcher = ResponseDispatcher::<WorkloadUpdateMachine>::start(&scheduler_config);
    let mut events = dispatcher.subscribe();

    let restart = ActionHandler::new(pod, Command::new(CommandName::Restart), Arc::clone(&cluster))
        .with_recreate_config(recreate_config);
    dispatcher.submit(restart.into_task()).await?;

    let update = ActionHandler::new(db, Command::new(CommandName::Update), Arc::clone(&cluster))
        .with_recreate_config(recreate_config);
    dispatcher
        .submit(update.into_task().with_initial_delay(Duration::from_secs(1)))
        .await?;

    info!("commands submitted");

    let observer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            info!(
                task_id = %event.task_id,
                command = %event.command,
                round = event.round,
                kind = event.kind.as_str(),
                "round event"
            );
        }
    });

    // Let system run
    sleep(Duration::from_secs(10)).await;

    info!(calls = cluster.calls().await.len(), "shutting down agent");
    dispatcher.shutdown().await;
    observer.abort();

    Ok(())
}
