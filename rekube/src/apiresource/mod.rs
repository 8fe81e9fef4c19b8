//! Kind resolution and cross-kind conversion.
//!
//! Each resource family (workloads, networking, storage, serverless)
//! implements [`ApiResourceKind`]; the [`ApiResource`] driver runs the
//! family's builders, retargets each object at a kind the cluster
//! actually supports, and merge-dedupes the results.

use std::collections::BTreeMap;

use tracing::{debug, error};

use rekube_core::{ClusterMetadataSpec, Diagnostic, DynamicObject, ObjectMeta};

use crate::ir::EnhancedIr;
use crate::scheme::{convert::convert_to_version, Scheme};

pub mod knative;
pub mod network;
pub mod networkpolicy;
pub mod storage;
pub mod types;
pub mod workload;

pub use knative::KnativeResource;
pub use network::ServiceResource;
pub use networkpolicy::NetworkPolicyResource;
pub use storage::StorageResource;
pub use workload::WorkloadResource;

/// Label key marking which service an object was generated for
pub const SERVICE_SELECTOR_LABEL: &str = "rekube.io/service";
const NETWORK_SELECTOR_PREFIX: &str = "rekube.io/network";

/// A family of related kinds and the conversions between them.
pub trait ApiResourceKind {
    /// Every kind this family can emit or retarget
    fn supported_kinds(&self) -> &'static [&'static str];

    /// Whether this family owns the given object
    ///
    /// Kind names alone are ambiguous (the serverless `Service` shares its
    /// kind with the core one), so families may refine this by group.
    fn claims(&self, obj: &DynamicObject) -> bool {
        self.supported_kinds().contains(&obj.kind())
    }

    /// Build fresh objects from the application model
    fn create_objects(
        &self,
        ir: &EnhancedIr,
        supported_kinds: &[String],
        cluster: &ClusterMetadataSpec,
        diags: &mut Vec<Diagnostic>,
    ) -> Vec<DynamicObject>;

    /// Retarget one object at a kind the cluster supports
    ///
    /// Returns `None` when the object does not belong to this family.
    fn convert_to_supported_kinds(
        &self,
        obj: &DynamicObject,
        supported_kinds: &[String],
        others: &[DynamicObject],
        ir: &EnhancedIr,
        cluster: &ClusterMetadataSpec,
        diags: &mut Vec<Diagnostic>,
    ) -> Option<Vec<DynamicObject>>;
}

/// Driver wrapping one [`ApiResourceKind`] family.
pub struct ApiResource {
    kind: Box<dyn ApiResourceKind>,
}

impl ApiResource {
    /// Wrap a family implementation
    pub fn new(kind: impl ApiResourceKind + 'static) -> Self {
        ApiResource { kind: Box::new(kind) }
    }

    /// Whether an object belongs to this family
    pub fn handles(&self, obj: &DynamicObject) -> bool {
        self.kind.claims(obj)
    }

    /// Build objects from the model, retarget, and merge-dedupe them
    pub fn convert_ir_to_objects(
        &self,
        ir: &EnhancedIr,
        cluster: &ClusterMetadataSpec,
        scheme: &Scheme,
    ) -> (Vec<DynamicObject>, Vec<Diagnostic>) {
        let mut diags = Vec::new();
        let supported = self.cluster_supported_kinds(cluster);
        let objs = self.kind.create_objects(ir, &supported, cluster, &mut diags);
        let converted = self.retarget_and_dedupe(&objs, ir, cluster, scheme, &mut diags);
        (converted, diags)
    }

    /// Retarget already-built objects of this family and merge-dedupe them
    pub fn convert_objects(
        &self,
        objs: &[DynamicObject],
        ir: &EnhancedIr,
        cluster: &ClusterMetadataSpec,
        scheme: &Scheme,
    ) -> (Vec<DynamicObject>, Vec<Diagnostic>) {
        let mut diags = Vec::new();
        let converted = self.retarget_and_dedupe(objs, ir, cluster, scheme, &mut diags);
        (converted, diags)
    }

    fn retarget_and_dedupe(
        &self,
        objs: &[DynamicObject],
        ir: &EnhancedIr,
        cluster: &ClusterMetadataSpec,
        scheme: &Scheme,
        diags: &mut Vec<Diagnostic>,
    ) -> Vec<DynamicObject> {
        let supported = self.cluster_supported_kinds(cluster);
        let mut cached: Vec<DynamicObject> = Vec::new();
        for obj in objs {
            if !self.handles(obj) {
                error!(kind = obj.kind(), "object is of an incompatible kind for this family");
                continue;
            }
            let retargeted = match self
                .kind
                .convert_to_supported_kinds(obj, &supported, objs, ir, cluster, diags)
            {
                Some(objs) => objs,
                None => {
                    error!(kind = obj.kind(), "family claimed the kind but could not convert it");
                    continue;
                }
            };
            for newobj in retargeted {
                if !merge_into(&mut cached, &newobj, scheme) {
                    cached.push(newobj);
                }
            }
        }
        cached
    }

    /// The family's kinds filtered down to what the cluster supports
    pub fn cluster_supported_kinds(&self, cluster: &ClusterMetadataSpec) -> Vec<String> {
        self.kind
            .supported_kinds()
            .iter()
            .filter(|kind| cluster.supports_kind(kind))
            .map(|kind| kind.to_string())
            .collect()
    }
}

/// Merge `obj` into an existing cache entry with the same identity.
///
/// Identity is namespace-qualified name plus group and kind; versions may
/// differ and still merge. The cached object is first converted to the
/// incoming object's version so both bodies share a shape, then the later
/// object wins field-by-field.
fn merge_into(cached: &mut Vec<DynamicObject>, obj: &DynamicObject, scheme: &Scheme) -> bool {
    for existing in cached.iter_mut() {
        if !is_same_resource(existing, obj) {
            continue;
        }
        debug!(name = obj.name(), kind = obj.kind(), "merging duplicate resource");
        let aligned = if existing.group_version() == obj.group_version() {
            existing.clone()
        } else {
            match convert_to_version(scheme, existing, &obj.group_version()) {
                Ok(converted) => converted,
                Err(err) => {
                    error!(%err, name = obj.name(), kind = obj.kind(),
                        "could not align versions; merging the bodies as-is");
                    existing.clone()
                }
            }
        };
        let mut base = match serde_json::to_value(&aligned) {
            Ok(v) => v,
            Err(err) => {
                error!(%err, "could not serialize object for merging");
                return false;
            }
        };
        let patch = match serde_json::to_value(obj) {
            Ok(v) => v,
            Err(err) => {
                error!(%err, "could not serialize object for merging");
                return false;
            }
        };
        json_patch::merge(&mut base, &patch);
        match DynamicObject::try_from(base) {
            Ok(merged) => {
                *existing = merged;
                return true;
            }
            Err(err) => {
                error!(%err, "merged object lost its type information");
                return false;
            }
        }
    }
    false
}

fn is_same_resource(a: &DynamicObject, b: &DynamicObject) -> bool {
    let id = a.object_id();
    if id.is_empty() || id != b.object_id() {
        return false;
    }
    let (agvk, bgvk) = (a.gvk(), b.gvk());
    agvk.group == bgvk.group && agvk.kind == bgvk.kind
}

pub(crate) fn is_present(kinds: &[String], kind: &str) -> bool {
    kinds.iter().any(|k| k == kind)
}

pub(crate) fn service_labels(name: &str) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(SERVICE_SELECTOR_LABEL.to_string(), name.to_string());
    labels
}

pub(crate) fn network_labels(networks: &[String]) -> BTreeMap<String, String> {
    networks
        .iter()
        .map(|network| (format!("{NETWORK_SELECTOR_PREFIX}/{network}"), "true".to_string()))
        .collect()
}

pub(crate) fn pod_labels(name: &str, networks: &[String]) -> BTreeMap<String, String> {
    let mut labels = service_labels(name);
    labels.append(&mut network_labels(networks));
    labels
}

pub(crate) fn object_meta(
    name: &str,
    labels: BTreeMap<String, String>,
    annotations: &BTreeMap<String, String>,
) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        labels: Some(labels),
        annotations: if annotations.is_empty() {
            None
        } else {
            Some(annotations.clone())
        },
        ..ObjectMeta::default()
    }
}
