//! Typed bodies for kinds outside the core Kubernetes API surface.
//!
//! OpenShift, Argo and Knative kinds have no stock struct, so the shapes
//! the builders need are declared here. Only the fields this engine reads
//! or writes are modelled; everything else survives untouched inside the
//! dynamic body when objects merely pass through.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{PodSpec, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use serde::{Deserialize, Serialize};

/// OpenShift `DeploymentConfig`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeploymentConfig {
    /// Standard object metadata
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// Desired state
    #[serde(default)]
    pub spec: DeploymentConfigSpec,
}

/// Desired state of a [`DeploymentConfig`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentConfigSpec {
    /// Replica count
    #[serde(default)]
    pub replicas: i32,
    /// Plain label selector (not a `LabelSelector` struct)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub selector: BTreeMap<String, String>,
    /// Pod template
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<PodTemplateSpec>,
    /// Redeployment triggers
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub triggers: Vec<DeploymentTriggerPolicy>,
}

/// One redeployment trigger on a [`DeploymentConfig`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentTriggerPolicy {
    /// Trigger type, `ConfigChange` or `ImageChange`
    #[serde(rename = "type")]
    pub type_: String,
    /// Parameters when the trigger type is `ImageChange`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_change_params: Option<DeploymentTriggerImageChangeParams>,
}

/// Image-change trigger parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentTriggerImageChangeParams {
    /// Redeploy automatically on image change
    #[serde(default)]
    pub automatic: bool,
    /// Containers the new image applies to
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub container_names: Vec<String>,
    /// The image stream tag being watched
    #[serde(default)]
    pub from: ObjectReference,
}

/// Minimal cross-object reference.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectReference {
    /// Referenced kind
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    /// Referenced name
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
}

/// OpenShift `Route`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Route {
    /// Standard object metadata
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// Desired state
    #[serde(default)]
    pub spec: RouteSpec,
    /// Route status; emitted to keep templating tools happy
    #[serde(default)]
    pub status: RouteStatus,
}

/// Desired state of a [`Route`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouteSpec {
    /// External hostname
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub host: String,
    /// Target port on the backing service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<RoutePort>,
    /// The backing service
    #[serde(default)]
    pub to: RouteTargetReference,
}

/// Port selection of a [`RouteSpec`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutePort {
    /// Port on the backing service, by name or number
    pub target_port: IntOrString,
}

/// The service a [`Route`] sends traffic to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteTargetReference {
    /// Referenced kind, always `Service`
    pub kind: String,
    /// Service name
    pub name: String,
    /// Traffic weight
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<i32>,
}

impl Default for RouteTargetReference {
    fn default() -> Self {
        RouteTargetReference {
            kind: "Service".to_string(),
            name: String::new(),
            weight: None,
        }
    }
}

/// Status block of a [`Route`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouteStatus {
    /// Per-router admission records
    #[serde(default)]
    pub ingress: Vec<RouteIngress>,
}

/// One router's view of a [`Route`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouteIngress {
    /// Hostname the router exposes
    #[serde(default)]
    pub host: String,
}

/// Argo `Rollout`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Rollout {
    /// Standard object metadata
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// Desired state
    #[serde(default)]
    pub spec: RolloutSpec,
}

/// Desired state of a [`Rollout`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RolloutSpec {
    /// Replica count
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    /// Pod selector
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<LabelSelector>,
    /// Pod template
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<PodTemplateSpec>,
    /// Progressive-delivery strategy
    #[serde(default)]
    pub strategy: RolloutStrategy,
}

/// Exactly one strategy is set on a [`RolloutSpec`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RolloutStrategy {
    /// Blue/green strategy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blue_green: Option<BlueGreenStrategy>,
    /// Canary strategy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canary: Option<CanaryStrategy>,
}

/// Blue/green rollout parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlueGreenStrategy {
    /// Service receiving live traffic
    pub active_service: String,
    /// Service receiving preview traffic
    pub preview_service: String,
    /// Promote automatically once the preview is healthy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_promotion_enabled: Option<bool>,
}

/// Canary rollout parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanaryStrategy {
    /// Service backing the stable replicas
    pub stable_service: String,
    /// Service backing the canary replicas
    pub canary_service: String,
    /// Surge allowance while shifting traffic
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_surge: Option<IntOrString>,
}

/// Knative serving `Service`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnativeService {
    /// Standard object metadata
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// Desired state
    #[serde(default)]
    pub spec: KnativeServiceSpec,
}

/// Desired state of a [`KnativeService`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnativeServiceSpec {
    /// Revision template
    #[serde(default)]
    pub template: RevisionTemplateSpec,
}

/// Template for the revisions a [`KnativeService`] stamps out.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RevisionTemplateSpec {
    /// Revision spec, a pod spec with serving extensions
    #[serde(default)]
    pub spec: RevisionSpec,
}

/// Pod-level spec of one revision.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RevisionSpec {
    /// The embedded pod spec, inlined the way serving serializes it
    #[serde(flatten)]
    pub pod_spec: PodSpec,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn route_round_trips_named_and_numbered_ports() {
        let v = json!({
            "metadata": { "name": "edge" },
            "spec": {
                "host": "example.com",
                "port": { "targetPort": 8080 },
                "to": { "kind": "Service", "name": "web", "weight": 1 }
            },
            "status": { "ingress": [ { "host": "" } ] }
        });
        let route: Route = serde_json::from_value(v).unwrap();
        assert_eq!(route.spec.to.name, "web");
        assert!(matches!(
            route.spec.port.as_ref().unwrap().target_port,
            IntOrString::Int(8080)
        ));

        let named = json!({ "spec": { "port": { "targetPort": "http" }, "to": { "kind": "Service", "name": "web" } } });
        let route: Route = serde_json::from_value(named).unwrap();
        assert!(matches!(
            route.spec.port.as_ref().unwrap().target_port,
            IntOrString::String(_)
        ));
    }

    #[test]
    fn revision_spec_inlines_the_pod_spec() {
        let v = json!({
            "spec": {
                "template": {
                    "spec": {
                        "containers": [ { "name": "fn", "image": "reg.example.com/fn" } ]
                    }
                }
            }
        });
        let svc: KnativeService = serde_json::from_value(v).unwrap();
        assert_eq!(svc.spec.template.spec.pod_spec.containers.len(), 1);
    }
}
