//! Metadata structs flattened into every negotiated object.
pub use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};

use crate::gvk::{GroupVersion, GroupVersionKind};

/// Type information that is flattened into every kubernetes object
#[derive(Deserialize, Serialize, Clone, Default, Debug, Eq, PartialEq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct TypeMeta {
    /// The version of the API
    pub api_version: String,

    /// The name of the API
    pub kind: String,
}

impl TypeMeta {
    /// Construct from a full `GroupVersionKind`
    pub fn from_gvk(gvk: &GroupVersionKind) -> Self {
        TypeMeta {
            api_version: gvk.api_version(),
            kind: gvk.kind.clone(),
        }
    }

    /// The group/version this object is tagged with
    ///
    /// An `apiVersion` with more than one slash cannot occur in practice
    /// (the parse treats everything after the first slash as the version).
    pub fn group_version(&self) -> GroupVersion {
        self.api_version
            .parse()
            .unwrap_or_else(|_| GroupVersion::gv("", &self.api_version))
    }

    /// The full `GroupVersionKind` tag
    pub fn gvk(&self) -> GroupVersionKind {
        self.group_version().with_kind(&self.kind)
    }
}
