//! Hand-written collaborators and seed helpers shared by the tests

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use launchpad::deploy::{ImageBuilder, SourceFetcher};
use launchpad::errors::{ControllerError, TargetError};
use launchpad::models::{Deployment, NewDeployment, NewProject, Project, ProjectId, RepoCoordinates};
use launchpad::publish::{PublishTarget, WorkloadSpec};
use launchpad::store::{LocalStore, RecordStore};

pub fn memory_store() -> Arc<dyn RecordStore> {
    Arc::new(LocalStore::in_memory())
}

pub async fn seed_project(store: &Arc<dyn RecordStore>, slug: &str) -> Project {
    store
        .create_project(NewProject {
            owner_account: "acct-1".to_string(),
            name: slug.to_string(),
            slug: slug.to_string(),
            repo: RepoCoordinates {
                owner: "acme".to_string(),
                name: slug.to_string(),
                url: format!("https://github.com/acme/{}.git", slug),
            },
            branch: "main".to_string(),
            env: BTreeMap::new(),
        })
        .await
        .unwrap()
}

pub async fn seed_deployment(store: &Arc<dyn RecordStore>, project_id: ProjectId) -> Deployment {
    store
        .create_deployment(NewDeployment {
            project_id,
            commit_sha: "0123456789abcdef".to_string(),
            commit_message: "change".to_string(),
            branch: "main".to_string(),
        })
        .await
        .unwrap()
}

/// Writes a fixed set of files into the target directory
#[derive(Default)]
pub struct FakeFetcher {
    files: Vec<(String, String)>,
    head: Option<String>,
    fail: Option<String>,
    fetched: Mutex<Vec<PathBuf>>,
}

impl FakeFetcher {
    pub fn with_file(mut self, name: &str, contents: &str) -> Self {
        self.files.push((name.to_string(), contents.to_string()));
        self
    }

    pub fn with_head(mut self, head: &str) -> Self {
        self.head = Some(head.to_string());
        self
    }

    pub fn failing(message: &str) -> Self {
        Self {
            fail: Some(message.to_string()),
            ..Default::default()
        }
    }

    /// Target directories in fetch order
    pub fn fetched(&self) -> Vec<PathBuf> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourceFetcher for FakeFetcher {
    async fn fetch(
        &self,
        _repo_url: &str,
        target_dir: &Path,
        _branch: &str,
    ) -> Result<(), ControllerError> {
        self.fetched.lock().unwrap().push(target_dir.to_path_buf());
        if let Some(message) = &self.fail {
            return Err(ControllerError::FetchError(message.clone()));
        }
        tokio::fs::create_dir_all(target_dir).await?;
        for (name, contents) in &self.files {
            tokio::fs::write(target_dir.join(name), contents).await?;
        }
        Ok(())
    }

    async fn head_commit(&self, _dir: &Path) -> Option<String> {
        self.head.clone()
    }
}

/// Records built tags; optionally never finishes
#[derive(Default)]
pub struct FakeBuilder {
    block: bool,
    fail: Option<String>,
    builds: Mutex<Vec<(String, String)>>,
}

impl FakeBuilder {
    /// A builder whose builds never complete
    pub fn blocking() -> Self {
        Self {
            block: true,
            ..Default::default()
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            fail: Some(message.to_string()),
            ..Default::default()
        }
    }

    /// (tag, recipe contents) per build
    pub fn builds(&self) -> Vec<(String, String)> {
        self.builds.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageBuilder for FakeBuilder {
    async fn build(
        &self,
        _source_dir: &Path,
        tag: &str,
        recipe: &Path,
    ) -> Result<String, ControllerError> {
        let contents = tokio::fs::read_to_string(recipe).await?;
        self.builds
            .lock()
            .unwrap()
            .push((tag.to_string(), contents));
        if self.block {
            std::future::pending::<()>().await;
        }
        if let Some(message) = &self.fail {
            return Err(ControllerError::BuildError(message.clone()));
        }
        Ok(format!("built {}\n", tag))
    }
}

/// In-memory publish target recording every call
#[derive(Default)]
pub struct FakeTarget {
    existing: Mutex<HashSet<(&'static str, String)>>,
    fail_on: Option<&'static str>,
    calls: Mutex<Vec<String>>,
    specs: Mutex<Vec<WorkloadSpec>>,
}

impl FakeTarget {
    /// Pretend a resource of `kind` named `name` already exists
    pub fn with_existing(self, kind: &'static str, name: &str) -> Self {
        self.existing.lock().unwrap().insert((kind, name.to_string()));
        self
    }

    /// Fail every create and update of `kind`
    pub fn failing_on(mut self, kind: &'static str) -> Self {
        self.fail_on = Some(kind);
        self
    }

    /// Calls in order, e.g. `create process_group project-1`
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Specs passed to successful updates and creates
    pub fn specs(&self) -> Vec<WorkloadSpec> {
        self.specs.lock().unwrap().clone()
    }

    fn create(&self, kind: &'static str, spec: &WorkloadSpec) -> Result<(), TargetError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("create {} {}", kind, spec.name));
        self.check_failure(kind, spec)?;
        let mut existing = self.existing.lock().unwrap();
        if !existing.insert((kind, spec.name.clone())) {
            return Err(TargetError::AlreadyExists {
                kind,
                name: spec.name.clone(),
            });
        }
        self.specs.lock().unwrap().push(spec.clone());
        Ok(())
    }

    fn update(&self, kind: &'static str, spec: &WorkloadSpec) -> Result<(), TargetError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("update {} {}", kind, spec.name));
        self.check_failure(kind, spec)?;
        self.specs.lock().unwrap().push(spec.clone());
        Ok(())
    }

    fn check_failure(&self, kind: &'static str, spec: &WorkloadSpec) -> Result<(), TargetError> {
        if self.fail_on == Some(kind) {
            return Err(TargetError::Api {
                kind,
                name: spec.name.clone(),
                message: "cluster unavailable".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl PublishTarget for FakeTarget {
    async fn create_process_group(&self, spec: &WorkloadSpec) -> Result<(), TargetError> {
        self.create("process_group", spec)
    }

    async fn update_process_group(&self, spec: &WorkloadSpec) -> Result<(), TargetError> {
        self.update("process_group", spec)
    }

    async fn create_endpoint(&self, spec: &WorkloadSpec) -> Result<(), TargetError> {
        self.create("endpoint", spec)
    }

    async fn update_endpoint(&self, spec: &WorkloadSpec) -> Result<(), TargetError> {
        self.update("endpoint", spec)
    }

    async fn create_route(&self, spec: &WorkloadSpec) -> Result<(), TargetError> {
        self.create("route", spec)
    }

    async fn update_route(&self, spec: &WorkloadSpec) -> Result<(), TargetError> {
        self.update("route", spec)
    }
}
