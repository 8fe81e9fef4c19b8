//! Structural fixups applied to objects before version negotiation.
//!
//! Parsed manifests from the wild often miss fields the modern API
//! versions require. Each fixup is a small pure correction over the
//! object body; none of them consult the capability matrix.

use serde_json::{json, Value};
use tracing::debug;

use rekube_core::DynamicObject;

/// Kinds whose modern versions require an explicit label selector
const SELECTOR_KINDS: &[&str] = &["Deployment", "DaemonSet", "StatefulSet", "ReplicaSet"];

/// Run every fixup over every object
pub fn fix_objects(objs: Vec<DynamicObject>) -> Vec<DynamicObject> {
    objs.into_iter()
        .map(|mut obj| {
            fix_selector(&mut obj);
            fix_ingress_paths(&mut obj);
            drop_empty_annotations(&mut obj);
            obj
        })
        .collect()
}

/// Synthesize a label selector from the template labels when absent
pub fn fix_selector(obj: &mut DynamicObject) {
    if !SELECTOR_KINDS.contains(&obj.kind()) {
        return;
    }
    let has_selector = obj
        .body_path(&["spec", "selector"])
        .map(|s| !s.is_null())
        .unwrap_or(false);
    if has_selector {
        return;
    }
    let labels = match obj.body_path(&["spec", "template", "metadata", "labels"]) {
        Some(labels) if labels.is_object() => labels.clone(),
        _ => return,
    };
    if let Some(spec) = obj.data.pointer_mut("/spec").and_then(Value::as_object_mut) {
        debug!(name = obj.metadata.name.as_deref().unwrap_or_default(), "synthesized a label selector");
        spec.insert("selector".to_string(), json!({ "matchLabels": labels }));
    }
}

/// Give ingress paths the defaults the v1 surface requires
pub fn fix_ingress_paths(obj: &mut DynamicObject) {
    if obj.kind() != "Ingress" {
        return;
    }
    let rules = match obj.data.pointer_mut("/spec/rules").and_then(Value::as_array_mut) {
        Some(rules) => rules,
        None => return,
    };
    for rule in rules {
        let paths = match rule.pointer_mut("/http/paths").and_then(Value::as_array_mut) {
            Some(paths) => paths,
            None => continue,
        };
        for path in paths {
            let map = match path.as_object_mut() {
                Some(map) => map,
                None => continue,
            };
            let empty = map
                .get("path")
                .and_then(Value::as_str)
                .map(str::is_empty)
                .unwrap_or(true);
            if empty {
                map.insert("path".to_string(), json!("/"));
            }
            map.entry("pathType").or_insert(json!("Prefix"));
        }
    }
}

/// Remove annotation maps that carry nothing
pub fn drop_empty_annotations(obj: &mut DynamicObject) {
    if obj
        .metadata
        .annotations
        .as_ref()
        .map(|a| a.is_empty())
        .unwrap_or(false)
    {
        obj.metadata.annotations = None;
    }
    if let Some(template_meta) = obj
        .data
        .pointer_mut("/spec/template/metadata")
        .and_then(Value::as_object_mut)
    {
        let empty = template_meta
            .get("annotations")
            .and_then(Value::as_object)
            .map(|a| a.is_empty())
            .unwrap_or(false);
        if empty {
            template_meta.remove("annotations");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rekube_core::GroupVersion;

    #[test]
    fn selector_synthesized_from_template_labels() {
        let gv = GroupVersion::gv("apps", "v1");
        let mut obj = DynamicObject::new("web", &gv.with_kind("Deployment")).data(json!({
            "spec": {
                "template": { "metadata": { "labels": { "app": "web" } } }
            }
        }));
        fix_selector(&mut obj);
        assert_eq!(
            obj.body_path(&["spec", "selector", "matchLabels", "app"]),
            Some(&json!("web"))
        );

        // an existing selector is left alone
        let mut obj = DynamicObject::new("web", &gv.with_kind("Deployment")).data(json!({
            "spec": {
                "selector": { "matchLabels": { "app": "other" } },
                "template": { "metadata": { "labels": { "app": "web" } } }
            }
        }));
        fix_selector(&mut obj);
        assert_eq!(
            obj.body_path(&["spec", "selector", "matchLabels", "app"]),
            Some(&json!("other"))
        );
    }

    #[test]
    fn ingress_paths_get_defaults() {
        let gv = GroupVersion::gv("networking.k8s.io", "v1");
        let mut obj = DynamicObject::new("edge", &gv.with_kind("Ingress")).data(json!({
            "spec": {
                "rules": [{
                    "http": { "paths": [{ "backend": { "service": { "name": "web" } } }] }
                }]
            }
        }));
        fix_ingress_paths(&mut obj);
        let path = obj.body_path(&["spec", "rules"]).unwrap()[0]["http"]["paths"][0].clone();
        assert_eq!(path["path"], json!("/"));
        assert_eq!(path["pathType"], json!("Prefix"));
    }

    #[test]
    fn empty_annotations_are_dropped() {
        let gv = GroupVersion::gv("", "v1");
        let mut obj = DynamicObject::new("web", &gv.with_kind("Service"));
        obj.metadata.annotations = Some(Default::default());
        drop_empty_annotations(&mut obj);
        assert!(obj.metadata.annotations.is_none());
    }
}
