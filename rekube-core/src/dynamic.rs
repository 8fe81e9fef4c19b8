//! A type-erased representation for resources whose kind and version are
//! only decided during negotiation.
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{map::Map, Value};

use crate::{
    gvk::{GroupVersion, GroupVersionKind},
    metadata::{ObjectMeta, TypeMeta},
    Error, Result,
};

/// A dynamic representation of a kubernetes object
///
/// Every object flowing through the negotiation engine is one of these: a
/// kind/group-version tag, standard object metadata, and an opaque body.
/// Objects are transient; they live for one negotiate-and-serialize call.
#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq)]
pub struct DynamicObject {
    /// The type fields
    #[serde(flatten)]
    pub types: TypeMeta,
    /// Object metadata
    #[serde(default)]
    pub metadata: ObjectMeta,

    /// All other keys
    #[serde(flatten)]
    pub data: Value,
}

impl DynamicObject {
    /// Create a DynamicObject with minimal values set from a gvk tag.
    #[must_use]
    pub fn new(name: &str, gvk: &GroupVersionKind) -> Self {
        Self {
            types: TypeMeta::from_gvk(gvk),
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            data: Value::Object(Map::new()),
        }
    }

    /// Attach dynamic data to a DynamicObject
    #[must_use]
    pub fn data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    /// Build a DynamicObject from a typed resource struct
    ///
    /// The serialized form's `apiVersion`/`kind`/`metadata` keys are lifted
    /// out of the body; the object is tagged with the supplied `gvk` rather
    /// than whatever the typed struct serializes (so the same body can be
    /// tagged at an internal pivot version).
    pub fn from_typed<K: Serialize>(gvk: &GroupVersionKind, resource: &K) -> Result<Self> {
        let mut body = serde_json::to_value(resource)?;
        let metadata = match body.as_object_mut() {
            Some(map) => {
                map.remove("apiVersion");
                map.remove("kind");
                match map.remove("metadata") {
                    Some(meta) => serde_json::from_value(meta)?,
                    None => ObjectMeta::default(),
                }
            }
            None => ObjectMeta::default(),
        };
        Ok(Self {
            types: TypeMeta::from_gvk(gvk),
            metadata,
            data: body,
        })
    }

    /// Attempt to parse this object into a typed resource struct
    ///
    /// The tag is deliberately left out of the rebuilt value: typed structs
    /// validate `apiVersion`/`kind` when present, and a pivot-tagged object
    /// must still parse into its versioned representation.
    pub fn try_parse<K: DeserializeOwned>(&self) -> Result<K> {
        let mut whole = self.data.clone();
        if !whole.is_object() {
            whole = Value::Object(Map::new());
        }
        if let Some(map) = whole.as_object_mut() {
            map.insert("metadata".to_string(), serde_json::to_value(&self.metadata)?);
        }
        Ok(serde_json::from_value(whole)?)
    }

    /// The full kind tag of this object
    pub fn gvk(&self) -> GroupVersionKind {
        self.types.gvk()
    }

    /// The group/version this object is currently at
    pub fn group_version(&self) -> GroupVersion {
        self.types.group_version()
    }

    /// The kind name of this object
    pub fn kind(&self) -> &str {
        &self.types.kind
    }

    /// The object name, or empty when unset
    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }

    /// Overwrite the group/version tag, keeping the kind
    pub fn retag(&mut self, gv: &GroupVersion) {
        self.types.api_version = gv.api_version();
    }

    /// Namespace-qualified identity used to detect duplicate resources
    ///
    /// Two objects with the same id and kind describe the same logical
    /// resource even when tagged at different group/versions.
    pub fn object_id(&self) -> String {
        format!(
            "{}{}",
            self.metadata.namespace.as_deref().unwrap_or_default(),
            self.metadata.name.as_deref().unwrap_or_default()
        )
    }

    /// Fetch a body field by path, if present
    pub fn body_path(&self, path: &[&str]) -> Option<&Value> {
        let mut cur = &self.data;
        for p in path {
            cur = cur.get(p)?;
        }
        Some(cur)
    }
}

/// Parse a `DynamicObject` out of a single serialized manifest value
impl TryFrom<Value> for DynamicObject {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }
}
