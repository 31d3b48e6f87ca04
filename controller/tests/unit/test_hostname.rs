//! Hostname allocation tests

use std::collections::HashSet;
use std::sync::Arc;

use launchpad::errors::{HostnameError, StoreError};
use launchpad::hostname::{HostnameAllocator, HostnameOptions};
use launchpad::store::RecordStore;

use crate::fakes::{memory_store, seed_deployment, seed_project};

fn allocator(store: &Arc<dyn RecordStore>) -> HostnameAllocator {
    HostnameAllocator::new(store.clone(), HostnameOptions::default())
}

#[tokio::test]
async fn test_same_hostname_on_every_publish() {
    let store = memory_store();
    let allocator = allocator(&store);
    let project = seed_project(&store, "demo").await;

    let first = seed_deployment(&store, project.id).await;
    let second = seed_deployment(&store, project.id).await;

    let h1 = allocator.allocate(project.id, first.id).await.unwrap();
    let h2 = allocator.allocate(project.id, second.id).await.unwrap();
    assert_eq!(h1, "demo.localhost");
    assert_eq!(h2, "demo.localhost");

    let rows = store.list_hostnames(project.id).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert!(rows[0].is_active);
    assert_eq!(rows[0].deployment_id, second.id);

    let second = store.get_deployment(second.id).await.unwrap();
    assert_eq!(second.hostname.as_deref(), Some("demo.localhost"));
}

#[tokio::test]
async fn test_many_publishes_keep_one_active_row() {
    let store = memory_store();
    let allocator = allocator(&store);
    let project = seed_project(&store, "steady").await;

    let mut seen = HashSet::new();
    for _ in 0..10 {
        let deployment = seed_deployment(&store, project.id).await;
        seen.insert(allocator.allocate(project.id, deployment.id).await.unwrap());
    }
    assert_eq!(seen.len(), 1);

    let active: Vec<_> = store
        .list_hostnames(project.id)
        .await
        .unwrap()
        .into_iter()
        .filter(|h| h.is_active)
        .collect();
    assert_eq!(active.len(), 1);
}

#[tokio::test]
async fn test_collision_with_other_project_gets_suffix() {
    let store = memory_store();
    let allocator = allocator(&store);

    let owner = seed_project(&store, "other").await;
    let owner_deployment = seed_deployment(&store, owner.id).await;
    store
        .create_hostname("app.localhost", owner.id, owner_deployment.id)
        .await
        .unwrap();

    let project = seed_project(&store, "app").await;
    let deployment = seed_deployment(&store, project.id).await;
    let hostname = allocator.allocate(project.id, deployment.id).await.unwrap();
    assert_eq!(hostname, "app-1.localhost");

    let owner_row = store.find_hostname("app.localhost").await.unwrap().unwrap();
    assert_eq!(owner_row.project_id, owner.id);
    assert!(owner_row.is_active);
}

#[tokio::test]
async fn test_distinct_projects_never_share_hostname() {
    let store = memory_store();
    let allocator = allocator(&store);

    let mut hostnames = HashSet::new();
    for slug in ["My App", "my-app", "my_app", "my.app"] {
        let project = store
            .create_project(launchpad::models::NewProject {
                owner_account: "acct".to_string(),
                name: slug.to_string(),
                slug: slug.to_string(),
                repo: launchpad::models::RepoCoordinates {
                    owner: "acme".to_string(),
                    name: slug.to_string(),
                    url: String::new(),
                },
                branch: "main".to_string(),
                env: Default::default(),
            })
            .await
            .unwrap();
        let deployment = seed_deployment(&store, project.id).await;
        let hostname = allocator.allocate(project.id, deployment.id).await.unwrap();
        assert!(hostnames.insert(hostname.clone()), "duplicate {}", hostname);
    }
    assert!(hostnames.contains("my-app.localhost"));
    assert!(hostnames.contains("my-app-3.localhost"));
}

#[tokio::test]
async fn test_probe_exhaustion() {
    let store = memory_store();
    let allocator = HostnameAllocator::new(
        store.clone(),
        HostnameOptions {
            max_probe: 1,
            ..Default::default()
        },
    );

    let owner = seed_project(&store, "owner").await;
    let owner_deployment = seed_deployment(&store, owner.id).await;
    for taken in ["web.localhost", "web-1.localhost"] {
        store
            .create_hostname(taken, owner.id, owner_deployment.id)
            .await
            .unwrap();
    }

    let project = seed_project(&store, "web").await;
    let deployment = seed_deployment(&store, project.id).await;
    let err = allocator
        .allocate(project.id, deployment.id)
        .await
        .unwrap_err();
    assert!(matches!(err, HostnameError::Exhausted { attempts: 2, .. }));
    assert!(store.list_hostnames(project.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_inactive_row_of_same_project_is_reactivated() {
    let store = memory_store();
    let allocator = allocator(&store);
    let project = seed_project(&store, "demo").await;
    let first = seed_deployment(&store, project.id).await;

    allocator.allocate(project.id, first.id).await.unwrap();
    store.deactivate_hostnames(project.id, None).await.unwrap();

    let second = seed_deployment(&store, project.id).await;
    let hostname = allocator.allocate(project.id, second.id).await.unwrap();
    assert_eq!(hostname, "demo.localhost");

    let rows = store.list_hostnames(project.id).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert!(rows[0].is_active);
    assert_eq!(rows[0].deployment_id, second.id);
}

#[tokio::test]
async fn test_stray_active_rows_are_deactivated() {
    let store = memory_store();
    let allocator = allocator(&store);
    let project = seed_project(&store, "demo").await;
    let first = seed_deployment(&store, project.id).await;

    store
        .create_hostname("demo.localhost", project.id, first.id)
        .await
        .unwrap();
    store
        .create_hostname("demo-legacy.localhost", project.id, first.id)
        .await
        .unwrap();

    let second = seed_deployment(&store, project.id).await;
    let hostname = allocator.allocate(project.id, second.id).await.unwrap();

    let active: Vec<_> = store
        .list_hostnames(project.id)
        .await
        .unwrap()
        .into_iter()
        .filter(|h| h.is_active)
        .collect();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].hostname, hostname);
}

#[tokio::test]
async fn test_unknown_deployment_writes_nothing() {
    let store = memory_store();
    let allocator = allocator(&store);
    let project = seed_project(&store, "demo").await;

    let err = allocator
        .allocate(project.id, launchpad::models::DeploymentId(999))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        HostnameError::Store(StoreError::NotFound { .. })
    ));
    assert!(store.list_hostnames(project.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_deployment_of_other_project_rejected() {
    let store = memory_store();
    let allocator = allocator(&store);
    let a = seed_project(&store, "alpha").await;
    let b = seed_project(&store, "beta").await;
    let deployment = seed_deployment(&store, b.id).await;

    let err = allocator.allocate(a.id, deployment.id).await.unwrap_err();
    assert!(matches!(
        err,
        HostnameError::Store(StoreError::Conflict { .. })
    ));
}

#[tokio::test]
async fn test_slug_fallback_chain() {
    let store = memory_store();
    let allocator = allocator(&store);
    let project = store
        .create_project(launchpad::models::NewProject {
            owner_account: "acct".to_string(),
            name: "???".to_string(),
            slug: "!!!".to_string(),
            repo: launchpad::models::RepoCoordinates {
                owner: "acme".to_string(),
                name: "Fallback_Repo".to_string(),
                url: String::new(),
            },
            branch: "main".to_string(),
            env: Default::default(),
        })
        .await
        .unwrap();
    let deployment = seed_deployment(&store, project.id).await;
    let hostname = allocator.allocate(project.id, deployment.id).await.unwrap();
    assert_eq!(hostname, "fallback-repo.localhost");
}
