//! Project registration tests

use std::collections::BTreeMap;

use launchpad::ingest::{ProjectRegistry, Registration};
use launchpad::models::RepoCoordinates;

use crate::fakes::memory_store;

fn registration(account: &str, name: &str, repo: &str) -> Registration {
    Registration {
        owner_account: account.to_string(),
        name: name.to_string(),
        repo: RepoCoordinates {
            owner: "acme".to_string(),
            name: repo.to_string(),
            url: format!("https://github.com/acme/{}.git", repo),
        },
        branch: None,
        env: BTreeMap::new(),
    }
}

#[tokio::test]
async fn test_register_derives_slug_and_branch() {
    let store = memory_store();
    let registry = ProjectRegistry::new(store.clone());

    let project = registry
        .register(registration("acct-1", "My Service", "my-service"))
        .await
        .unwrap();
    assert_eq!(project.slug, "my-service");
    assert_eq!(project.branch, "main");
    assert_eq!(project.owner_account, "acct-1");

    let found = store
        .find_project_by_repo("acme", "my-service")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, project.id);
}

#[tokio::test]
async fn test_reregister_is_idempotent() {
    let registry = ProjectRegistry::new(memory_store());

    let first = registry
        .register(registration("acct-1", "api", "api"))
        .await
        .unwrap();
    let second = registry
        .register(registration("acct-1", "api", "api"))
        .await
        .unwrap();
    assert_eq!(first.id, second.id);
}

#[tokio::test]
async fn test_reregister_relinks_account() {
    let store = memory_store();
    let registry = ProjectRegistry::new(store.clone());

    let first = registry
        .register(registration("acct-1", "api", "api"))
        .await
        .unwrap();
    let relinked = registry
        .register(registration("acct-2", "api", "api"))
        .await
        .unwrap();

    assert_eq!(relinked.id, first.id);
    assert_eq!(relinked.owner_account, "acct-2");
    assert_eq!(store.list_projects().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_slug_collision_gets_suffix() {
    let registry = ProjectRegistry::new(memory_store());

    let first = registry
        .register(registration("acct-1", "web", "web"))
        .await
        .unwrap();
    let second = registry
        .register(registration("acct-1", "web", "web-frontend"))
        .await
        .unwrap();
    let third = registry
        .register(registration("acct-2", "Web", "web-legacy"))
        .await
        .unwrap();

    assert_eq!(first.slug, "web");
    assert_eq!(second.slug, "web-1");
    assert_eq!(third.slug, "web-2");
}

#[tokio::test]
async fn test_explicit_branch_and_name_fallback() {
    let registry = ProjectRegistry::new(memory_store());

    let mut request = registration("acct-1", "!!!", "Docs_Site");
    request.branch = Some("release".to_string());
    let project = registry.register(request).await.unwrap();

    assert_eq!(project.slug, "docs-site");
    assert_eq!(project.branch, "release");
}
