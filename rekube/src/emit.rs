//! The emission pipeline: build, fix, negotiate, persist.
//!
//! Both entry points are best-effort end to end: a resource that cannot
//! be converted is written in its original form and the degradation is
//! reported through the returned diagnostics, never by aborting the run.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info, warn};

use rekube_core::{ClusterMetadataSpec, Diagnostic, DynamicObject, Result};

use crate::apiresource::{
    ApiResource, KnativeResource, NetworkPolicyResource, ServiceResource, StorageResource,
    WorkloadResource,
};
use crate::fixer;
use crate::ir::EnhancedIr;
use crate::scheme::{convert, Scheme};

/// What a pipeline run produced.
#[derive(Debug, Default)]
pub struct TransformOutput {
    /// Paths of the YAML files written, in emission order
    pub files: Vec<PathBuf>,
    /// Every degradation decision made along the way
    pub diagnostics: Vec<Diagnostic>,
}

/// The standard resource families, in claim order
pub fn default_resources() -> Vec<ApiResource> {
    vec![
        ApiResource::new(WorkloadResource),
        ApiResource::new(KnativeResource),
        ApiResource::new(ServiceResource),
        ApiResource::new(NetworkPolicyResource),
        ApiResource::new(StorageResource),
    ]
}

/// Turn an application model into persisted manifests
///
/// Runs every family's builders over the model, applies the structural
/// fixups, negotiates each object down to a version the cluster supports
/// and writes one YAML file per object into `out_dir`.
pub fn transform_ir_and_persist(
    ir: &EnhancedIr,
    out_dir: &Path,
    resources: &[ApiResource],
    cluster: &ClusterMetadataSpec,
    scheme: &Scheme,
) -> Result<TransformOutput> {
    cluster.validate()?;
    let mut objs = Vec::new();
    let mut diagnostics = Vec::new();
    for resource in resources {
        let (built, diags) = resource.convert_ir_to_objects(ir, cluster, scheme);
        objs.extend(built);
        diagnostics.extend(diags);
    }
    finish(objs, out_dir, cluster, scheme, diagnostics)
}

/// Re-target already-parsed manifests at a different cluster
///
/// Each object is claimed by the first family that recognizes it and run
/// through that family's cross-kind conversion; objects no family claims
/// go straight to version negotiation unchanged.
pub fn transform_objects_and_persist(
    objs: &[DynamicObject],
    out_dir: &Path,
    resources: &[ApiResource],
    cluster: &ClusterMetadataSpec,
    scheme: &Scheme,
) -> Result<TransformOutput> {
    cluster.validate()?;
    let ir = EnhancedIr::default();
    // structural fixups first; cross-kind conversion reads the fixed shapes
    let objs = fixer::fix_objects(objs.to_vec());
    let mut retargeted = Vec::new();
    let mut diagnostics = Vec::new();
    for obj in &objs {
        match resources.iter().find(|r| r.handles(obj)) {
            Some(resource) => {
                let (converted, diags) =
                    resource.convert_objects(std::slice::from_ref(obj), &ir, cluster, scheme);
                retargeted.extend(converted);
                diagnostics.extend(diags);
            }
            None => {
                debug!(kind = obj.kind(), "no family claims the kind; passing it through");
                retargeted.push(obj.clone());
            }
        }
    }
    finish(retargeted, out_dir, cluster, scheme, diagnostics)
}

fn finish(
    objs: Vec<DynamicObject>,
    out_dir: &Path,
    cluster: &ClusterMetadataSpec,
    scheme: &Scheme,
    mut diagnostics: Vec<Diagnostic>,
) -> Result<TransformOutput> {
    let objs = fixer::fix_objects(objs);
    let mut negotiated = Vec::new();
    for obj in objs {
        let (obj, diags) = convert::convert_to_supported_version(scheme, &obj, cluster);
        diagnostics.extend(diags);
        negotiated.push(obj);
    }
    let files = write_objects(&negotiated, out_dir)?;
    info!(count = files.len(), dir = %out_dir.display(), "wrote manifests");
    Ok(TransformOutput { files, diagnostics })
}

/// Serialize objects to `<out_dir>/<name>-<lowercased kind>.yaml`
pub fn write_objects(objs: &[DynamicObject], out_dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(out_dir)?;
    let mut files = Vec::new();
    for obj in objs {
        let filename = format!("{}-{}.yaml", obj.name(), obj.kind().to_lowercase());
        let path = out_dir.join(filename);
        fs::write(&path, serde_yaml::to_string(obj)?)?;
        files.push(path);
    }
    Ok(files)
}

/// Read every YAML document under a directory into objects
///
/// Walks the tree recursively; documents that do not parse, or that carry
/// no `apiVersion`/`kind` tag, are skipped with a warning rather than
/// failing the whole read.
pub fn parse_k8s_yaml(dir: &Path) -> Result<Vec<DynamicObject>> {
    let mut objs = Vec::new();
    collect_yaml_objects(dir, &mut objs)?;
    Ok(objs)
}

fn collect_yaml_objects(dir: &Path, objs: &mut Vec<DynamicObject>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_yaml_objects(&path, objs)?;
            continue;
        }
        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| matches!(e, "yaml" | "yml"))
            .unwrap_or(false);
        if !is_yaml {
            continue;
        }
        let content = fs::read_to_string(&path)?;
        for document in serde_yaml::Deserializer::from_str(&content) {
            let value = match serde_json::Value::deserialize(document) {
                Ok(value) => value,
                Err(err) => {
                    warn!(%err, file = %path.display(), "skipping unparseable document");
                    continue;
                }
            };
            if value.is_null() {
                continue;
            }
            match DynamicObject::try_from(value) {
                Ok(obj) => objs.push(obj),
                Err(err) => {
                    warn!(%err, file = %path.display(), "skipping untyped document");
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rekube_core::GroupVersion;
    use serde_json::json;

    #[test]
    fn filenames_follow_name_and_lowercased_kind() {
        let dir = tempfile::tempdir().unwrap();
        let gv = GroupVersion::gv("apps", "v1");
        let obj = DynamicObject::new("web", &gv.with_kind("Deployment")).data(json!({"spec": {}}));
        let files = write_objects(&[obj], dir.path()).unwrap();
        assert_eq!(files[0].file_name().unwrap(), "web-deployment.yaml");
        assert!(files[0].exists());
    }

    #[test]
    fn unparseable_documents_are_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("objs.yaml"),
            concat!(
                "apiVersion: v1\nkind: Service\nmetadata:\n  name: web\n",
                "---\n",
                "not an object at all\n",
                "---\n",
                "apiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: web\n",
            ),
        )
        .unwrap();
        let objs = parse_k8s_yaml(dir.path()).unwrap();
        assert_eq!(objs.len(), 2);
        assert_eq!(objs[0].kind(), "Service");
        assert_eq!(objs[1].kind(), "Deployment");
    }
}
