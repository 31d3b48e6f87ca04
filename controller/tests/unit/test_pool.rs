//! Worker pool tests

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use launchpad::deploy::{BuildPipeline, PipelineOptions, Publishing};
use launchpad::hostname::{HostnameAllocator, HostnameOptions, ProjectLocks};
use launchpad::models::{DeploymentId, DeploymentStatus};
use launchpad::publish::{PublishOptions, WorkloadPublisher};
use launchpad::queue::BuildQueue;
use launchpad::store::RecordStore;
use launchpad::workers::pool::Options;
use launchpad::workers::WorkerPool;

use crate::fakes::{
    memory_store, seed_deployment, seed_project, FakeBuilder, FakeFetcher, FakeTarget,
};

struct Harness {
    store: Arc<dyn RecordStore>,
    queue: Arc<BuildQueue>,
    fetcher: Arc<FakeFetcher>,
    pool: WorkerPool,
}

fn harness(
    workspace: &Path,
    workers: usize,
    fetcher: FakeFetcher,
    builder: FakeBuilder,
) -> Harness {
    publishing_harness(workspace, workers, fetcher, builder, None)
}

fn publishing_harness(
    workspace: &Path,
    workers: usize,
    fetcher: FakeFetcher,
    builder: FakeBuilder,
    target: Option<Arc<FakeTarget>>,
) -> Harness {
    let store = memory_store();
    let queue = Arc::new(BuildQueue::new());
    let fetcher = Arc::new(fetcher);
    let mut pipeline = BuildPipeline::new(
        store.clone(),
        fetcher.clone(),
        Arc::new(builder),
        PipelineOptions {
            workspace_dir: workspace.to_path_buf(),
            keep_workspace: false,
            registry: None,
        },
    );
    if let Some(target) = target {
        pipeline = pipeline.with_publishing(Publishing {
            allocator: Arc::new(HostnameAllocator::new(
                store.clone(),
                HostnameOptions::default(),
            )),
            publisher: Arc::new(WorkloadPublisher::new(
                store.clone(),
                target,
                PublishOptions::default(),
            )),
            locks: Arc::new(ProjectLocks::new()),
        });
    }
    let pipeline = Arc::new(pipeline);
    let pool = WorkerPool::new(Options { workers }, queue.clone(), store.clone(), pipeline);
    Harness {
        store,
        queue,
        fetcher,
        pool,
    }
}

async fn wait_for_status(
    store: &Arc<dyn RecordStore>,
    id: DeploymentId,
    status: DeploymentStatus,
) {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if store.get_deployment(id).await.unwrap().status == status {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("deployment {} never reached {}", id, status));
}

#[tokio::test]
async fn test_single_worker_processes_in_enqueue_order() {
    let workspace = tempfile::tempdir().unwrap();
    let h = harness(
        workspace.path(),
        1,
        FakeFetcher::default().with_file("Dockerfile", "FROM scratch\n"),
        FakeBuilder::default(),
    );
    let project = seed_project(&h.store, "demo").await;
    let a = seed_deployment(&h.store, project.id).await;
    let b = seed_deployment(&h.store, project.id).await;
    let c = seed_deployment(&h.store, project.id).await;

    let order = [c.id, a.id, b.id];
    for id in order {
        h.queue.enqueue(id);
    }
    h.pool.start().unwrap();

    for id in order {
        wait_for_status(&h.store, id, DeploymentStatus::Deploying).await;
    }
    let fetched: Vec<_> = h.fetcher.fetched();
    let expected: Vec<_> = order
        .iter()
        .map(|id| workspace.path().join(id.to_string()))
        .collect();
    assert_eq!(fetched, expected);
    assert!(h.queue.is_empty());

    h.pool.stop().await.unwrap();
}

#[tokio::test]
async fn test_failed_build_marks_deployment_failed() {
    let workspace = tempfile::tempdir().unwrap();
    let h = harness(
        workspace.path(),
        2,
        FakeFetcher::default(),
        FakeBuilder::default(),
    );
    let project = seed_project(&h.store, "empty").await;
    let deployment = seed_deployment(&h.store, project.id).await;

    h.pool.start().unwrap();
    h.queue.enqueue(deployment.id);
    wait_for_status(&h.store, deployment.id, DeploymentStatus::Failed).await;

    let build = h.store.find_build(deployment.id).await.unwrap().unwrap();
    assert!(build.logs.contains("could not detect project type"));

    h.pool.stop().await.unwrap();
}

#[tokio::test]
async fn test_stop_interrupts_in_flight_job() {
    let workspace = tempfile::tempdir().unwrap();
    let h = harness(
        workspace.path(),
        1,
        FakeFetcher::default().with_file("Dockerfile", "FROM scratch\n"),
        FakeBuilder::blocking(),
    );
    let project = seed_project(&h.store, "slow").await;
    let deployment = seed_deployment(&h.store, project.id).await;

    h.pool.start().unwrap();
    assert!(h.pool.is_running());
    h.queue.enqueue(deployment.id);

    wait_for_status(&h.store, deployment.id, DeploymentStatus::Building).await;
    assert_eq!(h.pool.in_flight(), 1);

    tokio::time::timeout(Duration::from_secs(5), h.pool.stop())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(h.pool.in_flight(), 0);
    assert!(!h.pool.is_running());
    let stored = h.store.get_deployment(deployment.id).await.unwrap();
    assert_eq!(stored.status, DeploymentStatus::Building);
}

#[tokio::test]
async fn test_stop_with_idle_workers() {
    let workspace = tempfile::tempdir().unwrap();
    let h = harness(
        workspace.path(),
        3,
        FakeFetcher::default(),
        FakeBuilder::default(),
    );
    h.pool.start().unwrap();

    tokio::time::timeout(Duration::from_secs(5), h.pool.stop())
        .await
        .unwrap()
        .unwrap();
    assert!(!h.pool.is_running());
}

#[tokio::test]
async fn test_start_twice_is_rejected() {
    let workspace = tempfile::tempdir().unwrap();
    let h = harness(
        workspace.path(),
        1,
        FakeFetcher::default(),
        FakeBuilder::default(),
    );
    assert!(!h.pool.is_running());
    h.pool.start().unwrap();
    assert!(h.pool.start().is_err());
    h.pool.stop().await.unwrap();
}

#[tokio::test]
async fn test_zero_workers_still_runs_one() {
    let workspace = tempfile::tempdir().unwrap();
    let h = harness(
        workspace.path(),
        0,
        FakeFetcher::default().with_file("Dockerfile", "FROM scratch\n"),
        FakeBuilder::default(),
    );
    let project = seed_project(&h.store, "demo").await;
    let deployment = seed_deployment(&h.store, project.id).await;

    h.pool.start().unwrap();
    h.queue.enqueue(deployment.id);
    wait_for_status(&h.store, deployment.id, DeploymentStatus::Deploying).await;
    h.pool.stop().await.unwrap();
}

#[tokio::test]
async fn test_concurrent_deploys_share_one_hostname() {
    let workspace = tempfile::tempdir().unwrap();
    let target = Arc::new(FakeTarget::default());
    let h = publishing_harness(
        workspace.path(),
        4,
        FakeFetcher::default().with_file("Dockerfile", "FROM scratch\n"),
        FakeBuilder::default(),
        Some(target.clone()),
    );
    let project = seed_project(&h.store, "demo").await;
    let mut ids = Vec::new();
    for _ in 0..12 {
        let deployment = seed_deployment(&h.store, project.id).await;
        h.queue.enqueue(deployment.id);
        ids.push(deployment.id);
    }

    h.pool.start().unwrap();
    for id in &ids {
        wait_for_status(&h.store, *id, DeploymentStatus::Deployed).await;
    }

    for id in &ids {
        let deployment = h.store.get_deployment(*id).await.unwrap();
        assert_eq!(deployment.hostname.as_deref(), Some("demo.localhost"));
    }
    let hostnames = h.store.list_hostnames(project.id).await.unwrap();
    assert_eq!(hostnames.len(), 1);
    assert!(hostnames[0].is_active);
    assert!(ids.contains(&hostnames[0].deployment_id));

    // One workload per project, created once and updated afterwards
    let updates = target
        .calls()
        .into_iter()
        .filter(|call| call.starts_with("update process_group"))
        .count();
    assert_eq!(updates, ids.len() - 1);

    h.pool.stop().await.unwrap();
    assert_eq!(h.pool.in_flight(), 0);
    assert!(h.queue.is_empty());
}
