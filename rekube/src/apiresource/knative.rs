//! The serverless family: Knative serving `Service`.
//!
//! Serverless services fold their exposure and scaling concerns into one
//! object, so they bypass both the workload ladder and version
//! negotiation entirely.

use tracing::debug;

use rekube_core::{ClusterMetadataSpec, Diagnostic, DynamicObject, GroupVersion, Result};

use crate::ir::{EnhancedIr, IrService, RESTART_POLICY_ALWAYS};
use crate::scheme::KNATIVE_SERVING_GROUP;

use super::types::{KnativeService, KnativeServiceSpec, RevisionSpec, RevisionTemplateSpec};
use super::{object_meta, service_labels, ApiResourceKind};

const KNATIVE_SERVICE_KIND: &str = "Service";

/// The serverless resource family.
#[derive(Debug, Default)]
pub struct KnativeResource;

impl ApiResourceKind for KnativeResource {
    fn supported_kinds(&self) -> &'static [&'static str] {
        &[KNATIVE_SERVICE_KIND]
    }

    fn claims(&self, obj: &DynamicObject) -> bool {
        obj.kind() == KNATIVE_SERVICE_KIND
            && obj.group_version().group == KNATIVE_SERVING_GROUP
    }

    fn create_objects(
        &self,
        ir: &EnhancedIr,
        _supported_kinds: &[String],
        _cluster: &ClusterMetadataSpec,
        _diags: &mut Vec<Diagnostic>,
    ) -> Vec<DynamicObject> {
        let mut objs = Vec::new();
        for service in ir.services.values() {
            if !service.serverless {
                continue;
            }
            match create_knative_service(service) {
                Ok(obj) => objs.push(obj),
                Err(err) => tracing::error!(%err, service = %service.name, "could not build a serverless service"),
            }
        }
        objs
    }

    fn convert_to_supported_kinds(
        &self,
        obj: &DynamicObject,
        _supported_kinds: &[String],
        _others: &[DynamicObject],
        _ir: &EnhancedIr,
        _cluster: &ClusterMetadataSpec,
        _diags: &mut Vec<Diagnostic>,
    ) -> Option<Vec<DynamicObject>> {
        if !self.claims(obj) {
            return None;
        }
        // never downgraded to a plain workload
        Some(vec![obj.clone()])
    }
}

fn create_knative_service(service: &IrService) -> Result<DynamicObject> {
    let mut pod_spec = service.pod_spec.clone();
    pod_spec.restart_policy = Some(RESTART_POLICY_ALWAYS.to_string());
    let ksvc = KnativeService {
        metadata: object_meta(&service.name, service_labels(&service.name), &service.annotations),
        spec: KnativeServiceSpec {
            template: RevisionTemplateSpec {
                spec: RevisionSpec { pod_spec },
            },
        },
    };
    debug!(service = %service.name, "built a serverless service");
    let gvk = GroupVersion::gv(KNATIVE_SERVING_GROUP, "v1").with_kind(KNATIVE_SERVICE_KIND);
    DynamicObject::from_typed(&gvk, &ksvc)
}
