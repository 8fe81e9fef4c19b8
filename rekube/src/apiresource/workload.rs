//! The workload family: everything that runs pods.
//!
//! Covers Pod, Job, Deployment, DeploymentConfig, ReplicationController,
//! DaemonSet, StatefulSet and Rollout. Kind resolution picks the best
//! replica-bearing kind the cluster offers; cross-kind conversion retargets
//! foreign workloads along the same preference ladder.

use k8s_openapi::api::apps::v1 as apps;
use k8s_openapi::api::batch::v1 as batch;
use k8s_openapi::api::core::v1 as corev1;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use serde_json::json;
use tracing::{debug, error, warn};

use rekube_core::{
    ClusterMetadataSpec, Diagnostic, DynamicObject, Error, GroupVersion, GroupVersionKind,
    ObjectMeta, Result,
};

use crate::ir::{
    DeploymentType, EnhancedIr, IrService, RolloutType, RESTART_POLICY_ALWAYS,
    RESTART_POLICY_ON_FAILURE,
};

use super::types::{
    BlueGreenStrategy, CanaryStrategy, DeploymentConfig, DeploymentConfigSpec,
    DeploymentTriggerImageChangeParams, DeploymentTriggerPolicy, ObjectReference, Rollout,
    RolloutSpec, RolloutStrategy,
};
use super::{is_present, object_meta, pod_labels, service_labels, storage, ApiResourceKind};

const POD_KIND: &str = "Pod";
const JOB_KIND: &str = "Job";
const DEPLOYMENT_KIND: &str = "Deployment";
const DEPLOYMENT_CONFIG_KIND: &str = "DeploymentConfig";
const REPLICATION_CONTROLLER_KIND: &str = "ReplicationController";
const DAEMON_SET_KIND: &str = "DaemonSet";
const STATEFUL_SET_KIND: &str = "StatefulSet";
const ROLLOUT_KIND: &str = "Rollout";

/// Replica count assumed when a source object carries none
pub const DEFAULT_REPLICAS: i32 = 2;

/// The workload resource family.
#[derive(Debug, Default)]
pub struct WorkloadResource;

impl ApiResourceKind for WorkloadResource {
    fn supported_kinds(&self) -> &'static [&'static str] {
        &[
            POD_KIND,
            JOB_KIND,
            DEPLOYMENT_KIND,
            DEPLOYMENT_CONFIG_KIND,
            REPLICATION_CONTROLLER_KIND,
            DAEMON_SET_KIND,
            STATEFUL_SET_KIND,
            ROLLOUT_KIND,
        ]
    }

    fn create_objects(
        &self,
        ir: &EnhancedIr,
        supported_kinds: &[String],
        cluster: &ClusterMetadataSpec,
        diags: &mut Vec<Diagnostic>,
    ) -> Vec<DynamicObject> {
        let mut objs = Vec::new();
        for service in ir.services.values() {
            if service.serverless || service.only_ingress {
                continue;
            }
            match self.create_workload(service, supported_kinds, cluster, diags) {
                Ok(obj) => objs.push(obj),
                Err(err) => error!(%err, service = %service.name, "could not build a workload"),
            }
        }
        objs
    }

    fn convert_to_supported_kinds(
        &self,
        obj: &DynamicObject,
        supported_kinds: &[String],
        _others: &[DynamicObject],
        _ir: &EnhancedIr,
        cluster: &ClusterMetadataSpec,
        diags: &mut Vec<Diagnostic>,
    ) -> Option<Vec<DynamicObject>> {
        let kind = obj.kind();
        if !self.supported_kinds().contains(&kind) {
            return None;
        }
        match self.retarget(obj, supported_kinds, cluster, diags) {
            Ok(objs) => Some(objs),
            Err(err) => {
                error!(%err, kind, "kind conversion failed; keeping the object as-is");
                Some(vec![obj.clone()])
            }
        }
    }
}

impl WorkloadResource {
    /// Pick a kind for a fresh service per the resolution ladder
    fn create_workload(
        &self,
        service: &IrService,
        supported_kinds: &[String],
        cluster: &ClusterMetadataSpec,
        diags: &mut Vec<Diagnostic>,
    ) -> Result<DynamicObject> {
        let meta = object_meta(
            &service.name,
            pod_labels(&service.name, &service.networks),
            &service.annotations,
        );
        let pod_spec = service.pod_spec.clone();
        let replicas = service.replicas;
        if service.daemon {
            emit_anyway(supported_kinds, DAEMON_SET_KIND, diags);
            return to_daemon_set(meta, pod_spec, cluster);
        }
        if service.deployment_type == DeploymentType::StatefulSet {
            emit_anyway(supported_kinds, STATEFUL_SET_KIND, diags);
            return to_stateful_set(meta, pod_spec, replicas, cluster);
        }
        if let DeploymentType::Rollout(rollout_type) = &service.deployment_type {
            emit_anyway(supported_kinds, ROLLOUT_KIND, diags);
            return to_rollout(meta, pod_spec, replicas, *rollout_type, cluster);
        }
        if service.runs_to_completion() {
            if is_present(supported_kinds, JOB_KIND) {
                return to_job(meta, pod_spec, cluster);
            }
            if is_present(supported_kinds, POD_KIND) {
                diags.push(Diagnostic::KindDegraded {
                    kind: JOB_KIND.to_string(),
                    fallback: POD_KIND.to_string(),
                });
                return to_pod(meta, pod_spec, RESTART_POLICY_ON_FAILURE, cluster);
            }
            emit_anyway(supported_kinds, JOB_KIND, diags);
            return to_job(meta, pod_spec, cluster);
        }
        if is_present(supported_kinds, DEPLOYMENT_KIND) {
            return to_deployment(meta, pod_spec, replicas, cluster);
        }
        if is_present(supported_kinds, DEPLOYMENT_CONFIG_KIND) {
            diags.push(Diagnostic::KindDegraded {
                kind: DEPLOYMENT_KIND.to_string(),
                fallback: DEPLOYMENT_CONFIG_KIND.to_string(),
            });
            return to_deployment_config(meta, pod_spec, replicas, cluster);
        }
        if is_present(supported_kinds, REPLICATION_CONTROLLER_KIND) {
            diags.push(Diagnostic::KindDegraded {
                kind: DEPLOYMENT_KIND.to_string(),
                fallback: REPLICATION_CONTROLLER_KIND.to_string(),
            });
            return to_replication_controller(meta, pod_spec, replicas, cluster);
        }
        if is_present(supported_kinds, POD_KIND) {
            diags.push(Diagnostic::KindDegraded {
                kind: DEPLOYMENT_KIND.to_string(),
                fallback: POD_KIND.to_string(),
            });
            return to_pod(meta, pod_spec, RESTART_POLICY_ALWAYS, cluster);
        }
        error!(service = %service.name, "no replica-bearing kind available; emitting a Deployment anyway");
        emit_anyway(supported_kinds, DEPLOYMENT_KIND, diags);
        to_deployment(meta, pod_spec, replicas, cluster)
    }

    /// Retarget an existing workload along the preference ladder
    fn retarget(
        &self,
        obj: &DynamicObject,
        supported_kinds: &[String],
        cluster: &ClusterMetadataSpec,
        diags: &mut Vec<Diagnostic>,
    ) -> Result<Vec<DynamicObject>> {
        let kind = obj.kind();
        // per-node and ordered kinds have no meaningful substitutes
        if matches!(kind, DAEMON_SET_KIND | STATEFUL_SET_KIND | ROLLOUT_KIND) {
            return Ok(vec![obj.clone()]);
        }
        if kind == POD_KIND {
            let pod: corev1::Pod = obj.try_parse()?;
            if pod_runs_to_completion(&pod) {
                if is_present(supported_kinds, JOB_KIND) {
                    return Ok(vec![pod_to_job(&pod, cluster)?]);
                }
                return Ok(vec![obj.clone()]);
            }
        }
        if kind == JOB_KIND && !is_present(supported_kinds, JOB_KIND) {
            if is_present(supported_kinds, POD_KIND) {
                let (meta, pod_spec, _) = parse_workload(obj)?;
                diags.push(Diagnostic::KindDegraded {
                    kind: JOB_KIND.to_string(),
                    fallback: POD_KIND.to_string(),
                });
                return Ok(vec![to_pod(meta, pod_spec, RESTART_POLICY_ON_FAILURE, cluster)?]);
            }
            warn!(name = obj.name(), "neither Job nor Pod is supported; keeping the Job");
            return Ok(vec![obj.clone()]);
        }
        if is_present(supported_kinds, DEPLOYMENT_KIND) {
            if matches!(kind, DEPLOYMENT_CONFIG_KIND | REPLICATION_CONTROLLER_KIND | POD_KIND) {
                let (meta, pod_spec, replicas) = parse_workload(obj)?;
                let replicas = replicas_or_default(replicas, obj.name(), diags);
                diags.push(Diagnostic::KindDegraded {
                    kind: kind.to_string(),
                    fallback: DEPLOYMENT_KIND.to_string(),
                });
                return Ok(vec![to_deployment(meta, pod_spec, replicas, cluster)?]);
            }
            return Ok(vec![obj.clone()]);
        }
        if is_present(supported_kinds, DEPLOYMENT_CONFIG_KIND) {
            if matches!(kind, DEPLOYMENT_KIND | REPLICATION_CONTROLLER_KIND | POD_KIND) {
                let (meta, pod_spec, replicas) = parse_workload(obj)?;
                let replicas = replicas_or_default(replicas, obj.name(), diags);
                diags.push(Diagnostic::KindDegraded {
                    kind: kind.to_string(),
                    fallback: DEPLOYMENT_CONFIG_KIND.to_string(),
                });
                return Ok(vec![to_deployment_config(meta, pod_spec, replicas, cluster)?]);
            }
            return Ok(vec![obj.clone()]);
        }
        if is_present(supported_kinds, REPLICATION_CONTROLLER_KIND) {
            if matches!(kind, DEPLOYMENT_CONFIG_KIND | DEPLOYMENT_KIND | POD_KIND) {
                let (meta, pod_spec, replicas) = parse_workload(obj)?;
                let replicas = replicas_or_default(replicas, obj.name(), diags);
                diags.push(Diagnostic::KindDegraded {
                    kind: kind.to_string(),
                    fallback: REPLICATION_CONTROLLER_KIND.to_string(),
                });
                return Ok(vec![to_replication_controller(meta, pod_spec, replicas, cluster)?]);
            }
            return Ok(vec![obj.clone()]);
        }
        if is_present(supported_kinds, POD_KIND) {
            if matches!(kind, DEPLOYMENT_CONFIG_KIND | DEPLOYMENT_KIND | REPLICATION_CONTROLLER_KIND) {
                let (meta, pod_spec, _) = parse_workload(obj)?;
                diags.push(Diagnostic::KindDegraded {
                    kind: kind.to_string(),
                    fallback: POD_KIND.to_string(),
                });
                return Ok(vec![to_pod(meta, pod_spec, RESTART_POLICY_ALWAYS, cluster)?]);
            }
            return Ok(vec![obj.clone()]);
        }
        debug!(kind, "no workload kind is supported by the cluster; keeping the object");
        Ok(vec![obj.clone()])
    }
}

fn emit_anyway(supported_kinds: &[String], kind: &str, diags: &mut Vec<Diagnostic>) {
    if !is_present(supported_kinds, kind) {
        error!(kind, "emitting a kind the target cluster does not support");
        diags.push(Diagnostic::KindDegraded {
            kind: kind.to_string(),
            fallback: kind.to_string(),
        });
    }
}

fn replicas_or_default(replicas: Option<i32>, name: &str, diags: &mut Vec<Diagnostic>) -> i32 {
    match replicas {
        Some(n) => n,
        None => {
            diags.push(Diagnostic::DefaultSubstituted {
                subject: format!("replicas of {name}"),
                value: DEFAULT_REPLICAS.to_string(),
            });
            DEFAULT_REPLICAS
        }
    }
}

fn pod_runs_to_completion(pod: &corev1::Pod) -> bool {
    matches!(
        pod.spec
            .as_ref()
            .and_then(|s| s.restart_policy.as_deref())
            .unwrap_or(RESTART_POLICY_ALWAYS),
        "Never" | "OnFailure"
    )
}

/// Pull the pieces every constructor needs out of any workload body
fn parse_workload(obj: &DynamicObject) -> Result<(ObjectMeta, corev1::PodSpec, Option<i32>)> {
    match obj.kind() {
        POD_KIND => {
            let pod: corev1::Pod = obj.try_parse()?;
            Ok((pod.metadata, pod.spec.unwrap_or_default(), None))
        }
        JOB_KIND => {
            let job: batch::Job = obj.try_parse()?;
            let spec = job
                .spec
                .and_then(|s| s.template.spec)
                .unwrap_or_default();
            Ok((job.metadata, spec, None))
        }
        DEPLOYMENT_KIND => {
            let dep: apps::Deployment = obj.try_parse()?;
            let (spec, replicas) = match dep.spec {
                Some(s) => (s.template.spec.unwrap_or_default(), s.replicas),
                None => (corev1::PodSpec::default(), None),
            };
            Ok((dep.metadata, spec, replicas))
        }
        REPLICATION_CONTROLLER_KIND => {
            let rc: corev1::ReplicationController = obj.try_parse()?;
            let (spec, replicas) = match rc.spec {
                Some(s) => (
                    s.template.and_then(|t| t.spec).unwrap_or_default(),
                    s.replicas,
                ),
                None => (corev1::PodSpec::default(), None),
            };
            Ok((rc.metadata, spec, replicas))
        }
        DEPLOYMENT_CONFIG_KIND => {
            let dc: DeploymentConfig = obj.try_parse()?;
            let spec = dc
                .spec
                .template
                .and_then(|t| t.spec)
                .unwrap_or_default();
            Ok((dc.metadata, spec, Some(dc.spec.replicas)))
        }
        kind => Err(Error::KindUnsupported {
            kind: kind.to_string(),
        }),
    }
}

fn deployment_gvk() -> GroupVersionKind {
    GroupVersion::gv("apps", "v1").with_kind(DEPLOYMENT_KIND)
}

fn template(meta: &ObjectMeta, pod_spec: corev1::PodSpec) -> corev1::PodTemplateSpec {
    corev1::PodTemplateSpec {
        metadata: Some(meta.clone()),
        spec: Some(pod_spec),
    }
}

fn with_restart(mut pod_spec: corev1::PodSpec, policy: &str) -> corev1::PodSpec {
    pod_spec.restart_policy = Some(policy.to_string());
    pod_spec
}

pub(crate) fn to_deployment(
    meta: ObjectMeta,
    pod_spec: corev1::PodSpec,
    replicas: i32,
    cluster: &ClusterMetadataSpec,
) -> Result<DynamicObject> {
    let name = meta.name.clone().unwrap_or_default();
    let pod_spec = storage::convert_volumes_by_policy(
        with_restart(pod_spec, RESTART_POLICY_ALWAYS),
        cluster,
    );
    let dep = apps::Deployment {
        metadata: meta.clone(),
        spec: Some(apps::DeploymentSpec {
            replicas: Some(replicas),
            selector: LabelSelector {
                match_labels: Some(service_labels(&name)),
                ..LabelSelector::default()
            },
            template: template(&meta, pod_spec),
            ..apps::DeploymentSpec::default()
        }),
        ..apps::Deployment::default()
    };
    debug!(%name, "built a Deployment");
    DynamicObject::from_typed(&deployment_gvk(), &dep)
}

pub(crate) fn to_deployment_config(
    meta: ObjectMeta,
    pod_spec: corev1::PodSpec,
    replicas: i32,
    cluster: &ClusterMetadataSpec,
) -> Result<DynamicObject> {
    let name = meta.name.clone().unwrap_or_default();
    let pod_spec = storage::convert_volumes_by_policy(
        with_restart(pod_spec, RESTART_POLICY_ALWAYS),
        cluster,
    );
    let mut triggers = vec![DeploymentTriggerPolicy {
        type_: "ConfigChange".to_string(),
        image_change_params: None,
    }];
    for container in &pod_spec.containers {
        let image = container.image.as_deref().unwrap_or_default();
        let (stream, tag) = image_stream_name_and_tag(image);
        triggers.push(DeploymentTriggerPolicy {
            type_: "ImageChange".to_string(),
            image_change_params: Some(DeploymentTriggerImageChangeParams {
                automatic: true,
                container_names: vec![container.name.clone()],
                from: ObjectReference {
                    kind: "ImageStreamTag".to_string(),
                    name: format!("{stream}:{tag}"),
                },
            }),
        });
    }
    let dc = DeploymentConfig {
        metadata: meta.clone(),
        spec: DeploymentConfigSpec {
            replicas,
            selector: service_labels(&name),
            template: Some(template(&meta, pod_spec)),
            triggers,
        },
    };
    debug!(%name, "built a DeploymentConfig");
    let gvk = GroupVersion::gv("apps.openshift.io", "v1").with_kind(DEPLOYMENT_CONFIG_KIND);
    DynamicObject::from_typed(&gvk, &dc)
}

pub(crate) fn to_replication_controller(
    meta: ObjectMeta,
    pod_spec: corev1::PodSpec,
    replicas: i32,
    cluster: &ClusterMetadataSpec,
) -> Result<DynamicObject> {
    let name = meta.name.clone().unwrap_or_default();
    let pod_spec = storage::convert_volumes_by_policy(
        with_restart(pod_spec, RESTART_POLICY_ALWAYS),
        cluster,
    );
    let rc = corev1::ReplicationController {
        metadata: meta.clone(),
        spec: Some(corev1::ReplicationControllerSpec {
            replicas: Some(replicas),
            selector: Some(service_labels(&name)),
            template: Some(template(&meta, pod_spec)),
            ..corev1::ReplicationControllerSpec::default()
        }),
        ..corev1::ReplicationController::default()
    };
    debug!(%name, "built a ReplicationController");
    let gvk = GroupVersion::gv("", "v1").with_kind(REPLICATION_CONTROLLER_KIND);
    DynamicObject::from_typed(&gvk, &rc)
}

pub(crate) fn to_pod(
    meta: ObjectMeta,
    pod_spec: corev1::PodSpec,
    restart_policy: &str,
    cluster: &ClusterMetadataSpec,
) -> Result<DynamicObject> {
    let pod_spec =
        storage::convert_volumes_by_policy(with_restart(pod_spec, restart_policy), cluster);
    let pod = corev1::Pod {
        metadata: meta,
        spec: Some(pod_spec),
        ..corev1::Pod::default()
    };
    let gvk = GroupVersion::gv("", "v1").with_kind(POD_KIND);
    DynamicObject::from_typed(&gvk, &pod)
}

pub(crate) fn to_job(
    meta: ObjectMeta,
    pod_spec: corev1::PodSpec,
    cluster: &ClusterMetadataSpec,
) -> Result<DynamicObject> {
    let pod_spec = storage::convert_volumes_by_policy(
        with_restart(pod_spec, RESTART_POLICY_ON_FAILURE),
        cluster,
    );
    let job = batch::Job {
        metadata: meta.clone(),
        spec: Some(batch::JobSpec {
            template: template(&meta, pod_spec),
            ..batch::JobSpec::default()
        }),
        ..batch::Job::default()
    };
    let gvk = GroupVersion::gv("batch", "v1").with_kind(JOB_KIND);
    DynamicObject::from_typed(&gvk, &job)
}

/// Convert a run-to-completion pod into a Job
///
/// A pod with an `Always` restart policy has no job semantics; asking for
/// the conversion anyway is an error rather than a silent reinterpretation.
pub fn pod_to_job(pod: &corev1::Pod, cluster: &ClusterMetadataSpec) -> Result<DynamicObject> {
    if !pod_runs_to_completion(pod) {
        return Err(Error::CrossKindConversionInvalid {
            from: POD_KIND.to_string(),
            to: JOB_KIND.to_string(),
            reason: "a pod with restart policy Always never completes".to_string(),
        });
    }
    to_job(
        pod.metadata.clone(),
        pod.spec.clone().unwrap_or_default(),
        cluster,
    )
}

pub(crate) fn to_daemon_set(
    meta: ObjectMeta,
    pod_spec: corev1::PodSpec,
    cluster: &ClusterMetadataSpec,
) -> Result<DynamicObject> {
    let name = meta.name.clone().unwrap_or_default();
    let pod_spec = storage::convert_volumes_by_policy(
        with_restart(pod_spec, RESTART_POLICY_ALWAYS),
        cluster,
    );
    let ds = apps::DaemonSet {
        metadata: meta.clone(),
        spec: Some(apps::DaemonSetSpec {
            selector: LabelSelector {
                match_labels: Some(service_labels(&name)),
                ..LabelSelector::default()
            },
            template: template(&meta, pod_spec),
            ..apps::DaemonSetSpec::default()
        }),
        ..apps::DaemonSet::default()
    };
    let gvk = GroupVersion::gv("apps", "v1").with_kind(DAEMON_SET_KIND);
    DynamicObject::from_typed(&gvk, &ds)
}

pub(crate) fn to_stateful_set(
    meta: ObjectMeta,
    pod_spec: corev1::PodSpec,
    replicas: i32,
    cluster: &ClusterMetadataSpec,
) -> Result<DynamicObject> {
    let name = meta.name.clone().unwrap_or_default();
    let pod_spec = storage::convert_volumes_by_policy(
        with_restart(pod_spec, RESTART_POLICY_ALWAYS),
        cluster,
    );
    let body = json!({
        "spec": {
            "replicas": replicas,
            "serviceName": name,
            "selector": { "matchLabels": service_labels(&name) },
            "template": serde_json::to_value(template(&meta, pod_spec))?,
        }
    });
    let gvk = GroupVersion::gv("apps", "v1").with_kind(STATEFUL_SET_KIND);
    let mut obj = DynamicObject::new(&name, &gvk).data(body);
    obj.metadata = meta;
    Ok(obj)
}

pub(crate) fn to_rollout(
    meta: ObjectMeta,
    pod_spec: corev1::PodSpec,
    replicas: i32,
    rollout_type: RolloutType,
    cluster: &ClusterMetadataSpec,
) -> Result<DynamicObject> {
    let name = meta.name.clone().unwrap_or_default();
    let pod_spec = storage::convert_volumes_by_policy(
        with_restart(pod_spec, RESTART_POLICY_ALWAYS),
        cluster,
    );
    let strategy = match rollout_type {
        RolloutType::BlueGreen => RolloutStrategy {
            blue_green: Some(BlueGreenStrategy {
                active_service: name.clone(),
                preview_service: format!("{name}-preview"),
                auto_promotion_enabled: Some(false),
            }),
            canary: None,
        },
        RolloutType::Canary => RolloutStrategy {
            blue_green: None,
            canary: Some(CanaryStrategy {
                stable_service: name.clone(),
                canary_service: format!("{name}-preview"),
                max_surge: Some(IntOrString::String("25%".to_string())),
            }),
        },
    };
    let rollout = Rollout {
        metadata: meta.clone(),
        spec: RolloutSpec {
            replicas: Some(replicas),
            selector: Some(LabelSelector {
                match_labels: Some(service_labels(&name)),
                ..LabelSelector::default()
            }),
            template: Some(template(&meta, pod_spec)),
            strategy,
        },
    };
    let gvk = GroupVersion::gv("argoproj.io", "v1alpha1").with_kind(ROLLOUT_KIND);
    DynamicObject::from_typed(&gvk, &rollout)
}

/// Split an image reference into its stream name and tag
fn image_stream_name_and_tag(image: &str) -> (String, String) {
    let last_segment = image.rsplit('/').next().unwrap_or(image);
    match last_segment.split_once(':') {
        Some((name, tag)) => (name.to_string(), tag.to_string()),
        None => (last_segment.to_string(), "latest".to_string()),
    }
}
