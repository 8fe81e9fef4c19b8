//! The network-isolation family: one `NetworkPolicy` per service network.
//!
//! Pods built by the workload family carry a `rekube.io/network/<name>`
//! label for every network their service joins; the policies here select
//! on those labels and admit ingress only from pods on the same network.

use tracing::{debug, error};

use k8s_openapi::api::networking::v1 as networkingv1;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;

use rekube_core::{ClusterMetadataSpec, Diagnostic, DynamicObject, GroupVersion, Result};

use crate::ir::EnhancedIr;

use super::{is_present, network_labels, object_meta, ApiResourceKind};

const NETWORK_POLICY_KIND: &str = "NetworkPolicy";
const NETWORKING_GROUP: &str = "networking.k8s.io";

/// The network-isolation resource family.
#[derive(Debug, Default)]
pub struct NetworkPolicyResource;

impl ApiResourceKind for NetworkPolicyResource {
    fn supported_kinds(&self) -> &'static [&'static str] {
        &[NETWORK_POLICY_KIND]
    }

    fn create_objects(
        &self,
        ir: &EnhancedIr,
        supported_kinds: &[String],
        _cluster: &ClusterMetadataSpec,
        _diags: &mut Vec<Diagnostic>,
    ) -> Vec<DynamicObject> {
        let mut objs = Vec::new();
        if !is_present(supported_kinds, NETWORK_POLICY_KIND) {
            if ir.services.values().any(|s| !s.networks.is_empty()) {
                error!("no supported kind to shape service networks into");
            }
            return objs;
        }
        for service in ir.services.values() {
            for network in &service.networks {
                debug!(service = %service.name, %network, "shaping a source network into a policy");
                match create_network_policy(network) {
                    Ok(obj) => objs.push(obj),
                    Err(err) => {
                        error!(%err, %network, service = %service.name, "could not build a network policy");
                    }
                }
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
        // no degradation target exists for a policy
        Some(vec![obj.clone()])
    }
}

fn create_network_policy(network: &str) -> Result<DynamicObject> {
    let labels = network_labels(&[network.to_string()]);
    let policy = networkingv1::NetworkPolicy {
        metadata: object_meta(network, labels.clone(), &Default::default()),
        spec: Some(networkingv1::NetworkPolicySpec {
            pod_selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..LabelSelector::default()
            },
            ingress: Some(vec![networkingv1::NetworkPolicyIngressRule {
                from: Some(vec![networkingv1::NetworkPolicyPeer {
                    pod_selector: Some(LabelSelector {
                        match_labels: Some(labels),
                        ..LabelSelector::default()
                    }),
                    ..networkingv1::NetworkPolicyPeer::default()
                }]),
                ..networkingv1::NetworkPolicyIngressRule::default()
            }]),
            ..networkingv1::NetworkPolicySpec::default()
        }),
    };
    let gvk = GroupVersion::gv(NETWORKING_GROUP, "v1").with_kind(NETWORK_POLICY_KIND);
    DynamicObject::from_typed(&gvk, &policy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::IrService;
    use rekube_core::ClusterMetadata;
    use serde_json::json;

    fn ir_with_networks(name: &str, networks: &[&str]) -> EnhancedIr {
        let mut ir = EnhancedIr::new("app");
        let mut svc = IrService::new(name);
        svc.networks = networks.iter().map(|n| n.to_string()).collect();
        ir.add_service(svc);
        ir
    }

    #[test]
    fn each_service_network_becomes_a_policy() {
        let ir = ir_with_networks("web", &["frontend", "backend"]);
        let cluster = ClusterMetadata::kubernetes().spec;
        let objs = NetworkPolicyResource.create_objects(
            &ir,
            &[NETWORK_POLICY_KIND.to_string()],
            &cluster,
            &mut Vec::new(),
        );
        assert_eq!(objs.len(), 2);
        assert_eq!(objs[0].types.api_version, "networking.k8s.io/v1");
        assert_eq!(objs[0].name(), "frontend");
        assert_eq!(
            objs[0].body_path(&["spec", "podSelector", "matchLabels", "rekube.io/network/frontend"]),
            Some(&json!("true"))
        );
        let policy: networkingv1::NetworkPolicy = objs[1].try_parse().unwrap();
        let ingress = policy.spec.unwrap().ingress.unwrap();
        let from = ingress[0].from.as_ref().unwrap();
        let peer_labels = from[0].pod_selector.as_ref().unwrap().match_labels.as_ref().unwrap();
        assert_eq!(peer_labels.get("rekube.io/network/backend").map(String::as_str), Some("true"));
    }

    #[test]
    fn policies_are_skipped_when_the_kind_is_unsupported() {
        let ir = ir_with_networks("web", &["frontend"]);
        let cluster = ClusterMetadata::kubernetes().spec;
        let objs = NetworkPolicyResource.create_objects(&ir, &[], &cluster, &mut Vec::new());
        assert!(objs.is_empty());
    }
}
