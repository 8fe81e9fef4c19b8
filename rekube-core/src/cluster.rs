//! The capability matrix: a previously collected, static description of
//! which kinds and group/versions a target cluster supports.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{metadata::TypeMeta, Error, Result};

/// Kind tag used by persisted cluster profile documents
pub const CLUSTER_METADATA_KIND: &str = "ClusterMetadata";
/// apiVersion tag used by persisted cluster profile documents
pub const CLUSTER_METADATA_API_VERSION: &str = "rekube.io/v1alpha1";

/// A collected cluster profile document
///
/// Loaded from a YAML document tagged with the `ClusterMetadata` kind,
/// typically produced by a collector against a live cluster or shipped as a
/// static profile. Immutable for the duration of a negotiation run.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct ClusterMetadata {
    /// The type fields of the profile document
    #[serde(flatten)]
    pub types: TypeMeta,
    /// Profile name (usually the kube context it was collected from)
    #[serde(default)]
    pub metadata: ClusterMeta,
    /// The capability matrix itself
    #[serde(default)]
    pub spec: ClusterMetadataSpec,
}

/// Minimal metadata carried by profile documents
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
pub struct ClusterMeta {
    /// Name of the profile
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
}

/// The data of a cluster profile
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterMetadataSpec {
    /// Storage classes installed on the cluster
    #[serde(default)]
    pub storage_classes: Vec<String>,
    /// Supported group/versions per kind, highest priority first
    ///
    /// An empty or absent entry means the kind is unsupported, never
    /// "any version accepted".
    #[serde(default)]
    pub api_kind_version_map: BTreeMap<String, Vec<String>>,
    /// API host the profile was collected from, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

impl ClusterMetadataSpec {
    /// All group/versions supported for a kind, or `None` when unsupported
    pub fn supported_versions(&self, kind: &str) -> Option<&[String]> {
        match self.api_kind_version_map.get(kind) {
            Some(gvs) if !gvs.is_empty() => Some(gvs),
            _ => None,
        }
    }

    /// Whether any version of the kind is supported
    pub fn supports_kind(&self, kind: &str) -> bool {
        self.supported_versions(kind).is_some()
    }

    /// Hard check that the matrix can support anything at all
    pub fn validate(&self) -> Result<()> {
        if self.api_kind_version_map.values().all(|gvs| gvs.is_empty()) {
            return Err(Error::CapabilityMatrixEmpty);
        }
        Ok(())
    }

    /// Merge another collected profile into this one
    ///
    /// Profiles describe the same target, so the result is the
    /// intersection: only storage classes and kinds present in both
    /// survive, with the newer profile's version lists winning.
    pub fn merge(&mut self, newer: &ClusterMetadataSpec) {
        self.storage_classes
            .retain(|sc| newer.storage_classes.contains(sc));
        if self.storage_classes.is_empty() {
            self.storage_classes = vec!["default".to_string()];
        }
        let mut merged = BTreeMap::new();
        for (kind, gvs) in &newer.api_kind_version_map {
            if self.api_kind_version_map.contains_key(kind) {
                merged.insert(kind.clone(), gvs.clone());
            }
        }
        self.api_kind_version_map = merged;
        if newer.host.is_some() {
            self.host = newer.host.clone();
        }
    }
}

impl ClusterMetadata {
    /// Create an empty profile for a named context
    pub fn new(context_name: &str) -> Self {
        ClusterMetadata {
            types: TypeMeta {
                api_version: CLUSTER_METADATA_API_VERSION.to_string(),
                kind: CLUSTER_METADATA_KIND.to_string(),
            },
            metadata: ClusterMeta {
                name: context_name.to_string(),
            },
            spec: ClusterMetadataSpec::default(),
        }
    }

    /// Load a profile from a YAML document
    pub fn from_yaml(doc: &str) -> Result<Self> {
        let md: ClusterMetadata = serde_yaml::from_str(doc)?;
        Ok(md)
    }

    /// Built-in profile for a current vanilla Kubernetes cluster
    pub fn kubernetes() -> Self {
        let mut md = ClusterMetadata::new("kubernetes");
        let matrix: &[(&str, &[&str])] = &[
            ("Pod", &["v1"]),
            ("Service", &["v1"]),
            ("ConfigMap", &["v1"]),
            ("Secret", &["v1"]),
            ("PersistentVolumeClaim", &["v1"]),
            ("ReplicationController", &["v1"]),
            ("Deployment", &["apps/v1"]),
            ("DaemonSet", &["apps/v1"]),
            ("StatefulSet", &["apps/v1"]),
            ("Job", &["batch/v1"]),
            ("Ingress", &["networking.k8s.io/v1"]),
            ("NetworkPolicy", &["networking.k8s.io/v1"]),
        ];
        for (kind, gvs) in matrix {
            md.spec.api_kind_version_map.insert(
                kind.to_string(),
                gvs.iter().map(|gv| gv.to_string()).collect(),
            );
        }
        md.spec.storage_classes = vec!["default".to_string()];
        md
    }

    /// Built-in profile for an OpenShift cluster
    pub fn openshift() -> Self {
        let mut md = ClusterMetadata::kubernetes();
        md.metadata.name = "openshift".to_string();
        md.spec.api_kind_version_map.insert(
            "DeploymentConfig".to_string(),
            vec!["apps.openshift.io/v1".to_string()],
        );
        md.spec.api_kind_version_map.insert(
            "Route".to_string(),
            vec!["route.openshift.io/v1".to_string()],
        );
        md.spec.api_kind_version_map.remove("Ingress");
        md
    }
}
