//! Deployment lifecycle tests

use launchpad::deploy::fsm::{DeploymentEvent, DeploymentFsm};
use launchpad::errors::StoreError;
use launchpad::models::DeploymentStatus;
use launchpad::store::DeploymentUpdate;

use crate::fakes::{memory_store, seed_deployment, seed_project};

const ALL: [DeploymentStatus; 5] = [
    DeploymentStatus::Pending,
    DeploymentStatus::Building,
    DeploymentStatus::Deploying,
    DeploymentStatus::Deployed,
    DeploymentStatus::Failed,
];

#[test]
fn test_legal_transitions() {
    use DeploymentStatus::*;
    let legal = [
        (Pending, Building),
        (Building, Deploying),
        (Deploying, Deployed),
        (Pending, Failed),
        (Building, Failed),
        (Deploying, Failed),
    ];
    for from in ALL {
        for to in ALL {
            assert_eq!(
                from.can_transition_to(to),
                legal.contains(&(from, to)),
                "{} -> {}",
                from,
                to
            );
        }
    }
}

#[test]
fn test_fsm_rejects_skipping_build() {
    let mut fsm = DeploymentFsm::new();
    assert!(fsm.process(DeploymentEvent::Published).is_err());
    assert_eq!(fsm.state(), DeploymentStatus::Pending);
}

#[test]
fn test_fsm_resumes_from_stored_status() {
    let mut fsm = DeploymentFsm::from_status(DeploymentStatus::Deploying);
    fsm.process(DeploymentEvent::Failed("publish failed".to_string()))
        .unwrap();
    assert_eq!(fsm.state(), DeploymentStatus::Failed);
    assert_eq!(fsm.error(), Some("publish failed"));
    assert!(fsm.process(DeploymentEvent::BuildStarted).is_err());
}

#[tokio::test]
async fn test_store_walks_happy_path_and_refuses_leaving_deployed() {
    let store = memory_store();
    let project = seed_project(&store, "demo").await;
    let deployment = seed_deployment(&store, project.id).await;
    assert_eq!(deployment.status, DeploymentStatus::Pending);

    for status in [
        DeploymentStatus::Building,
        DeploymentStatus::Deploying,
        DeploymentStatus::Deployed,
    ] {
        let updated = store
            .update_deployment(deployment.id, DeploymentUpdate::status(status))
            .await
            .unwrap();
        assert_eq!(updated.status, status);
    }

    let err = store
        .update_deployment(
            deployment.id,
            DeploymentUpdate::status(DeploymentStatus::Failed),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidTransition { .. }));
}

#[tokio::test]
async fn test_store_never_reenters_pending() {
    let store = memory_store();
    let project = seed_project(&store, "demo").await;
    let deployment = seed_deployment(&store, project.id).await;

    store
        .update_deployment(
            deployment.id,
            DeploymentUpdate::status(DeploymentStatus::Building),
        )
        .await
        .unwrap();
    let err = store
        .update_deployment(
            deployment.id,
            DeploymentUpdate::status(DeploymentStatus::Pending),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidTransition { .. }));
}
