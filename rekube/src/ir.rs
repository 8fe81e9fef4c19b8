//! Intermediate application model consumed by the resource builders.
//!
//! The model is the read-only input boundary of the engine: upstream
//! analysis fills it in, the [`crate::apiresource`] builders turn it into
//! Kubernetes objects. Pod-level detail rides on the stock
//! [`PodSpec`] type so the builders can embed it directly.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{PersistentVolumeClaimSpec, PodSpec};
use k8s_openapi::ByteString;

/// Restart policy value meaning run-to-completion semantics
pub const RESTART_POLICY_NEVER: &str = "Never";
/// Restart policy value meaning retry-until-success semantics
pub const RESTART_POLICY_ON_FAILURE: &str = "OnFailure";
/// Default restart policy for long-running workloads
pub const RESTART_POLICY_ALWAYS: &str = "Always";

/// The whole application model: named services plus shared storage.
#[derive(Debug, Clone, Default)]
pub struct EnhancedIr {
    /// Application name, used for artifacts that span services
    pub name: String,
    /// Services keyed by name
    pub services: BTreeMap<String, IrService>,
    /// Storage definitions shared across services
    pub storages: Vec<IrStorage>,
}

impl EnhancedIr {
    /// Create an empty model for the named application
    pub fn new(name: &str) -> Self {
        EnhancedIr {
            name: name.to_string(),
            ..EnhancedIr::default()
        }
    }

    /// Insert a service, keyed by its own name
    pub fn add_service(&mut self, service: IrService) {
        self.services.insert(service.name.clone(), service);
    }
}

/// One deployable service and its exposure shape.
#[derive(Debug, Clone, Default)]
pub struct IrService {
    /// Service name; doubles as the object name for everything built from it
    pub name: String,
    /// Ingress backend name when it differs from the service name
    pub backend_service_name: Option<String>,
    /// Arbitrary annotations carried onto every generated object
    pub annotations: BTreeMap<String, String>,
    /// Relative URL path the service is reachable under
    pub service_relative_path: String,
    /// Service-port to pod-port wiring
    pub port_forwardings: Vec<PortForwarding>,
    /// Desired replica count for replica-bearing kinds
    pub replicas: i32,
    /// Networks the service participates in, attached as pod labels
    pub networks: Vec<String>,
    /// Expose the service outside the cluster
    pub expose: bool,
    /// The service only contributes ingress rules, no workload of its own
    pub only_ingress: bool,
    /// One instance per node
    pub daemon: bool,
    /// Build a serverless service instead of a workload
    pub serverless: bool,
    /// Which replica-bearing kind to prefer
    pub deployment_type: DeploymentType,
    /// Pod-level detail, embedded into the generated workload
    pub pod_spec: PodSpec,
}

impl IrService {
    /// Create a service with defaults and the conventional two replicas
    pub fn new(name: &str) -> Self {
        IrService {
            name: name.to_string(),
            replicas: 2,
            ..IrService::default()
        }
    }

    /// The restart policy from the pod spec, defaulting to `Always`
    pub fn restart_policy(&self) -> &str {
        self.pod_spec
            .restart_policy
            .as_deref()
            .unwrap_or(RESTART_POLICY_ALWAYS)
    }

    /// Whether the pod is meant to run to completion
    pub fn runs_to_completion(&self) -> bool {
        matches!(
            self.restart_policy(),
            RESTART_POLICY_NEVER | RESTART_POLICY_ON_FAILURE
        )
    }
}

/// Which replica-bearing workload kind a service prefers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DeploymentType {
    /// A plain Deployment
    #[default]
    Deployment,
    /// A StatefulSet, for services needing stable identity
    StatefulSet,
    /// A progressive-delivery Rollout
    Rollout(RolloutType),
}

/// Progressive-delivery strategy for [`DeploymentType::Rollout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RolloutType {
    /// Two full environments, traffic flipped between them
    BlueGreen,
    /// Gradual traffic shifting to the new version
    Canary,
}

/// Wires one externally visible service port to a pod port.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortForwarding {
    /// The port the service listens on
    pub service_port: BackendPort,
    /// The pod port traffic lands on
    pub pod_port: BackendPort,
}

/// A port referenced by name or by number.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendPort {
    /// Named port, when the manifest refers to ports by name
    pub name: Option<String>,
    /// Numeric port
    pub number: i32,
}

impl BackendPort {
    /// A purely numeric port
    pub fn number(number: i32) -> Self {
        BackendPort { name: None, number }
    }
}

/// A single storage definition.
#[derive(Debug, Clone, Default)]
pub struct IrStorage {
    /// Storage name; becomes the object name
    pub name: String,
    /// Arbitrary annotations for the generated object
    pub annotations: BTreeMap<String, String>,
    /// Which kind of storage this is
    pub storage_type: StorageType,
    /// Secret type override, for storages emitted as secrets
    pub secret_type: Option<String>,
    /// Key/value content for config maps and secrets
    pub content: BTreeMap<String, ByteString>,
    /// Claim spec, for storages emitted as persistent volume claims
    pub pvc_spec: Option<PersistentVolumeClaimSpec>,
}

/// The storage kinds the model distinguishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StorageType {
    /// Plain configuration data
    #[default]
    ConfigMap,
    /// Sensitive data
    Secret,
    /// Registry credentials
    PullSecret,
    /// A persistent volume claim
    Pvc,
}
