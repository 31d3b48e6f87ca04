//! Kubernetes publish target
//!
//! Process group = `apps/v1 Deployment`, endpoint = `v1 Service`,
//! route = `networking/v1 Ingress`. Creates use POST so conflicts surface as
//! HTTP 409; updates use server-side apply.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EnvVar, PodSpec, PodTemplateSpec, ResourceRequirements, Service,
    ServicePort, ServiceSpec,
};
use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, ServiceBackendPort,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::api::{Api, Patch, PatchParams, PostParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use crate::errors::{ControllerError, TargetError};
use crate::publish::{PublishTarget, WorkloadSpec};

const FIELD_MANAGER: &str = "launchpad";

/// Publish target backed by a Kubernetes cluster
pub struct KubeTarget {
    client: Client,
}

impl KubeTarget {
    /// Connect using a kubeconfig file, or the inferred config when `None`
    /// (KUBECONFIG, ~/.kube/config or in-cluster)
    pub async fn connect(kubeconfig: Option<&Path>) -> Result<Self, ControllerError> {
        let client = match kubeconfig {
            Some(path) => {
                let kubeconfig = Kubeconfig::read_from(path)
                    .map_err(|e| ControllerError::ConfigError(e.to_string()))?;
                let config =
                    Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                        .await
                        .map_err(|e| ControllerError::ConfigError(e.to_string()))?;
                Client::try_from(config).map_err(|e| ControllerError::ConfigError(e.to_string()))?
            }
            None => Client::try_default()
                .await
                .map_err(|e| ControllerError::ConfigError(e.to_string()))?,
        };

        info!("Kubernetes client initialized");
        Ok(Self { client })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    async fn create<K>(
        &self,
        kind: &'static str,
        spec: &WorkloadSpec,
        obj: &K,
    ) -> Result<(), TargetError>
    where
        K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>
            + Clone
            + Serialize
            + DeserializeOwned
            + std::fmt::Debug,
        <K as kube::Resource>::DynamicType: Default,
    {
        let api: Api<K> = Api::namespaced(self.client.clone(), &spec.namespace);
        match api.create(&PostParams::default(), obj).await {
            Ok(_) => {
                debug!(name = %spec.name, namespace = %spec.namespace, "Created {}", kind);
                Ok(())
            }
            Err(kube::Error::Api(err)) if err.code == 409 => Err(TargetError::AlreadyExists {
                kind,
                name: spec.name.clone(),
            }),
            Err(e) => Err(api_error(kind, spec, e)),
        }
    }

    async fn apply<K>(
        &self,
        kind: &'static str,
        spec: &WorkloadSpec,
        obj: &K,
    ) -> Result<(), TargetError>
    where
        K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>
            + Clone
            + Serialize
            + DeserializeOwned
            + std::fmt::Debug,
        <K as kube::Resource>::DynamicType: Default,
    {
        let api: Api<K> = Api::namespaced(self.client.clone(), &spec.namespace);
        api.patch(
            &spec.name,
            &PatchParams::apply(FIELD_MANAGER).force(),
            &Patch::Apply(obj),
        )
        .await
        .map_err(|e| api_error(kind, spec, e))?;
        debug!(name = %spec.name, namespace = %spec.namespace, "Updated {}", kind);
        Ok(())
    }
}

fn api_error(kind: &'static str, spec: &WorkloadSpec, err: kube::Error) -> TargetError {
    TargetError::Api {
        kind,
        name: spec.name.clone(),
        message: err.to_string(),
    }
}

fn labels(spec: &WorkloadSpec) -> BTreeMap<String, String> {
    BTreeMap::from([("app".to_string(), spec.name.clone())])
}

fn metadata(spec: &WorkloadSpec) -> ObjectMeta {
    ObjectMeta {
        name: Some(spec.name.clone()),
        namespace: Some(spec.namespace.clone()),
        labels: Some(labels(spec)),
        ..Default::default()
    }
}

/// `apps/v1 Deployment` running the image
pub fn build_deployment(spec: &WorkloadSpec) -> Deployment {
    let env = spec
        .env
        .iter()
        .map(|(name, value)| EnvVar {
            name: name.clone(),
            value: Some(value.clone()),
            ..Default::default()
        })
        .collect();

    let resources = ResourceRequirements {
        requests: Some(BTreeMap::from([
            ("cpu".to_string(), Quantity(spec.resources.cpu_request.clone())),
            ("memory".to_string(), Quantity(spec.resources.memory_request.clone())),
        ])),
        limits: Some(BTreeMap::from([
            ("cpu".to_string(), Quantity(spec.resources.cpu_limit.clone())),
            ("memory".to_string(), Quantity(spec.resources.memory_limit.clone())),
        ])),
        ..Default::default()
    };

    Deployment {
        metadata: metadata(spec),
        spec: Some(DeploymentSpec {
            replicas: Some(spec.replicas),
            selector: LabelSelector {
                match_labels: Some(labels(spec)),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels(spec)),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![Container {
                        name: "app".to_string(),
                        image: Some(spec.image.clone()),
                        ports: Some(vec![ContainerPort {
                            container_port: i32::from(spec.container_port),
                            ..Default::default()
                        }]),
                        env: Some(env),
                        resources: Some(resources),
                        ..Default::default()
                    }],
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// `v1 Service` selecting the deployment's pods
pub fn build_service(spec: &WorkloadSpec) -> Service {
    Service {
        metadata: metadata(spec),
        spec: Some(ServiceSpec {
            selector: Some(labels(spec)),
            ports: Some(vec![ServicePort {
                port: i32::from(spec.service_port),
                target_port: Some(IntOrString::Int(i32::from(spec.container_port))),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// `networking/v1 Ingress` binding the hostname to the service
pub fn build_ingress(spec: &WorkloadSpec) -> Ingress {
    Ingress {
        metadata: metadata(spec),
        spec: Some(IngressSpec {
            ingress_class_name: spec.ingress_class.clone(),
            rules: Some(vec![IngressRule {
                host: Some(spec.host.clone()),
                http: Some(HTTPIngressRuleValue {
                    paths: vec![HTTPIngressPath {
                        path: Some("/".to_string()),
                        path_type: "Prefix".to_string(),
                        backend: IngressBackend {
                            service: Some(IngressServiceBackend {
                                name: spec.name.clone(),
                                port: Some(ServiceBackendPort {
                                    number: Some(i32::from(spec.service_port)),
                                    ..Default::default()
                                }),
                            }),
                            ..Default::default()
                        },
                    }],
                }),
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[async_trait]
impl PublishTarget for KubeTarget {
    async fn create_process_group(&self, spec: &WorkloadSpec) -> Result<(), TargetError> {
        self.create("deployment", spec, &build_deployment(spec)).await
    }

    async fn update_process_group(&self, spec: &WorkloadSpec) -> Result<(), TargetError> {
        self.apply("deployment", spec, &build_deployment(spec)).await
    }

    async fn create_endpoint(&self, spec: &WorkloadSpec) -> Result<(), TargetError> {
        self.create("service", spec, &build_service(spec)).await
    }

    async fn update_endpoint(&self, spec: &WorkloadSpec) -> Result<(), TargetError> {
        self.apply("service", spec, &build_service(spec)).await
    }

    async fn create_route(&self, spec: &WorkloadSpec) -> Result<(), TargetError> {
        self.create("ingress", spec, &build_ingress(spec)).await
    }

    async fn update_route(&self, spec: &WorkloadSpec) -> Result<(), TargetError> {
        self.apply("ingress", spec, &build_ingress(spec)).await
    }
}
