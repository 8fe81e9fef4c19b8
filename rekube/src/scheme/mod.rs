//! The type and conversion registry driving version negotiation.
//!
//! A [`Scheme`] is built once at startup through [`SchemeBuilder`] and is
//! read-only afterwards. Every known kind is registered as one or more
//! [`KindFamily`] descriptors: the family's pivot (internal) group/version
//! plus the concrete group/versions it can be serialized at. Conversion
//! functions are partial body mappings between `(kind, group/version)`
//! pairs; only chains through the pivot representation are guaranteed to
//! exist.
use ahash::HashMap;
use serde_json::Value;

use rekube_core::{GroupVersion, GroupVersionKind, Result, Version, INTERNAL_VERSION};

pub mod convert;
pub mod groups;

/// API group of Knative serving resources
///
/// Kinds in this group are optional add-ons and are treated as
/// self-consistent: they bypass capability matrix lookup and are never
/// downgraded.
pub const KNATIVE_SERVING_GROUP: &str = "serving.knative.dev";

/// A registered body conversion between two representations of a kind
///
/// The function receives the object body (no metadata, no type tag) and
/// returns the body reshaped for the target representation. Mappings may
/// be lossy; fields with no target equivalent are dropped.
pub type ConvertFn = fn(Value) -> Result<Value>;

/// Descriptor for one family of representations of a kind
///
/// Two objects of the same kind at different group/versions within one
/// family are the same logical resource; the pivot representation bridges
/// between them and is never emitted directly.
#[derive(Debug, Clone)]
pub struct KindFamily {
    /// Kind name shared by every member
    pub kind: String,
    /// The internal (pivot) group/version of the family
    pub pivot: GroupVersion,
    /// Concrete group/versions registered for the family, highest priority first
    pub versions: Vec<GroupVersion>,
}

/// Immutable registry of kinds and conversion functions
#[derive(Debug, Default)]
pub struct Scheme {
    families: HashMap<String, Vec<KindFamily>>,
    converters: HashMap<(GroupVersionKind, GroupVersion), ConvertFn>,
}

impl Scheme {
    /// Start building a new scheme
    pub fn builder() -> SchemeBuilder {
        SchemeBuilder::default()
    }

    /// All registered families sharing a kind name
    pub fn families(&self, kind: &str) -> &[KindFamily] {
        self.families.get(kind).map(Vec::as_slice).unwrap_or_default()
    }

    /// Whether any family is registered for the kind
    pub fn is_registered(&self, kind: &str) -> bool {
        self.families.contains_key(kind)
    }

    /// Look up a direct conversion function
    pub fn converter(&self, from: &GroupVersionKind, to: &GroupVersion) -> Option<ConvertFn> {
        self.converters.get(&(from.clone(), to.clone())).copied()
    }

    /// Registered versions within a group, descending by version priority
    ///
    /// Used by preferred-version fallback when the capability matrix has
    /// no usable entry for a kind.
    pub fn prioritized_versions_for_group(&self, group: &str) -> Vec<GroupVersion> {
        let mut versions: Vec<GroupVersion> = Vec::new();
        for families in self.families.values() {
            for family in families {
                for gv in &family.versions {
                    if gv.group == group && !versions.contains(gv) {
                        versions.push(gv.clone());
                    }
                }
            }
        }
        versions.sort_by_cached_key(|gv| std::cmp::Reverse(Version::parse(&gv.version)));
        versions
    }

    /// The registry of every kind this engine understands
    ///
    /// Mirrors the upstream scheme installs: core, apps (with historical
    /// beta and `extensions` versions), batch, networking, OpenShift,
    /// Argo Rollouts, Knative serving and Tekton pipeline kinds.
    pub fn default_scheme() -> Scheme {
        Scheme::builder()
            // core group
            .register_kind("Pod", "", &["v1"])
            .register_kind("Service", "", &["v1"])
            .register_kind("ConfigMap", "", &["v1"])
            .register_kind("Secret", "", &["v1"])
            .register_kind("PersistentVolumeClaim", "", &["v1"])
            .register_kind("ReplicationController", "", &["v1"])
            // apps, including versions still found in old manifests
            .register_kind("Deployment", "apps", &[
                "apps/v1",
                "apps/v1beta2",
                "apps/v1beta1",
                "extensions/v1beta1",
            ])
            .register_kind("DaemonSet", "apps", &["apps/v1", "extensions/v1beta1"])
            .register_kind("StatefulSet", "apps", &["apps/v1", "apps/v1beta2", "apps/v1beta1"])
            .register_kind("ReplicaSet", "apps", &["apps/v1", "extensions/v1beta1"])
            // batch
            .register_kind("Job", "batch", &["batch/v1"])
            .register_kind("CronJob", "batch", &["batch/v1", "batch/v1beta1"])
            // networking
            .register_kind("Ingress", "networking.k8s.io", &[
                "networking.k8s.io/v1",
                "networking.k8s.io/v1beta1",
                "extensions/v1beta1",
            ])
            .register_kind("NetworkPolicy", "networking.k8s.io", &[
                "networking.k8s.io/v1",
                "extensions/v1beta1",
            ])
            // platform-specific kinds
            .register_kind("DeploymentConfig", "apps.openshift.io", &["apps.openshift.io/v1"])
            .register_kind("Route", "route.openshift.io", &["route.openshift.io/v1"])
            .register_kind("Rollout", "argoproj.io", &["argoproj.io/v1alpha1"])
            .register_kind("Service", KNATIVE_SERVING_GROUP, &["serving.knative.dev/v1"])
            // pipeline kinds are only named so pre-existing manifests negotiate
            .register_kind("Pipeline", "tekton.dev", &["tekton.dev/v1beta1"])
            .register_kind("PipelineRun", "tekton.dev", &["tekton.dev/v1beta1"])
            // structural mappings for representations whose body shape differs
            .register_converter(
                GroupVersionKind::gvk("extensions", "v1beta1", "Deployment"),
                GroupVersion::gv("apps", INTERNAL_VERSION),
                deployment_legacy_to_pivot,
            )
            .register_converter(
                GroupVersionKind::gvk("networking.k8s.io", "v1beta1", "Ingress"),
                GroupVersion::gv("networking.k8s.io", INTERNAL_VERSION),
                ingress_legacy_to_pivot,
            )
            .register_converter(
                GroupVersionKind::gvk("extensions", "v1beta1", "Ingress"),
                GroupVersion::gv("networking.k8s.io", INTERNAL_VERSION),
                ingress_legacy_to_pivot,
            )
            .register_converter(
                GroupVersionKind::gvk("networking.k8s.io", INTERNAL_VERSION, "Ingress"),
                GroupVersion::gv("networking.k8s.io", "v1beta1"),
                ingress_pivot_to_legacy,
            )
            .register_converter(
                GroupVersionKind::gvk("networking.k8s.io", INTERNAL_VERSION, "Ingress"),
                GroupVersion::gv("extensions", "v1beta1"),
                ingress_pivot_to_legacy,
            )
            .build()
    }
}

/// Builder for [`Scheme`]; construction must complete before negotiation begins
#[derive(Debug, Default)]
pub struct SchemeBuilder {
    families: HashMap<String, Vec<KindFamily>>,
    converters: HashMap<(GroupVersionKind, GroupVersion), ConvertFn>,
}

impl SchemeBuilder {
    /// Register a kind family under a pivot group
    ///
    /// Pass-through converters between the pivot and every version are
    /// registered automatically; call [`register_converter`] afterwards to
    /// replace a pair whose body shape actually differs. Malformed version
    /// strings are skipped with a debug log.
    ///
    /// [`register_converter`]: SchemeBuilder::register_converter
    #[must_use]
    pub fn register_kind(mut self, kind: &str, pivot_group: &str, versions: &[&str]) -> Self {
        let pivot = GroupVersion::gv(pivot_group, INTERNAL_VERSION);
        let mut registered = Vec::new();
        for gv in versions {
            let gv: GroupVersion = match gv.parse() {
                Ok(gv) => gv,
                Err(err) => {
                    tracing::debug!(%err, kind, "skipping malformed version in kind registration");
                    continue;
                }
            };
            self.converters
                .entry((gv.with_kind(kind), pivot.clone()))
                .or_insert(passthrough);
            self.converters
                .entry((pivot.with_kind(kind), gv.clone()))
                .or_insert(passthrough);
            registered.push(gv);
        }
        self.families.entry(kind.to_string()).or_default().push(KindFamily {
            kind: kind.to_string(),
            pivot,
            versions: registered,
        });
        self
    }

    /// Register (or replace) a direct conversion function
    #[must_use]
    pub fn register_converter(mut self, from: GroupVersionKind, to: GroupVersion, f: ConvertFn) -> Self {
        self.converters.insert((from, to), f);
        self
    }

    /// Finalize the registry; read-only from here on
    pub fn build(self) -> Scheme {
        Scheme {
            families: self.families,
            converters: self.converters,
        }
    }
}

fn passthrough(body: Value) -> Result<Value> {
    Ok(body)
}

/// `extensions/v1beta1` deployments may omit the label selector; the pivot
/// representation requires one, synthesized from the template labels.
fn deployment_legacy_to_pivot(mut body: Value) -> Result<Value> {
    let template_labels = body
        .pointer("/spec/template/metadata/labels")
        .cloned()
        .unwrap_or(Value::Null);
    if let Some(spec) = body.get_mut("spec").and_then(Value::as_object_mut) {
        let missing = spec
            .get("selector")
            .and_then(Value::as_object)
            .map(|s| s.is_empty())
            .unwrap_or(true);
        if missing && template_labels.is_object() {
            spec.insert(
                "selector".to_string(),
                serde_json::json!({ "matchLabels": template_labels }),
            );
        }
    }
    Ok(body)
}

/// Reshape a legacy ingress body (`serviceName`/`servicePort` backends)
/// into the pivot (v1) form.
fn ingress_legacy_to_pivot(mut body: Value) -> Result<Value> {
    for_each_ingress_backend(&mut body, |backend| {
        let name = backend.remove("serviceName");
        let port = backend.remove("servicePort");
        let Some(name) = name else { return Ok(()) };
        let port = match port {
            Some(Value::Number(n)) => serde_json::json!({ "number": n }),
            Some(Value::String(s)) => serde_json::json!({ "name": s }),
            _ => Value::Null,
        };
        let mut service = serde_json::Map::new();
        service.insert("name".to_string(), name);
        if !port.is_null() {
            service.insert("port".to_string(), port);
        }
        backend.insert("service".to_string(), Value::Object(service));
        Ok(())
    })?;
    Ok(body)
}

/// Reshape a pivot (v1) ingress body into the legacy backend form.
///
/// Lossy: `pathType` has no legacy equivalent and is dropped.
fn ingress_pivot_to_legacy(mut body: Value) -> Result<Value> {
    for_each_ingress_path(&mut body, |path| {
        path.remove("pathType");
        Ok(())
    })?;
    for_each_ingress_backend(&mut body, |backend| {
        let Some(service) = backend.remove("service") else { return Ok(()) };
        if let Some(name) = service.get("name") {
            backend.insert("serviceName".to_string(), name.clone());
        }
        match service.get("port") {
            Some(port) if port.get("number").is_some() => {
                backend.insert("servicePort".to_string(), port["number"].clone());
            }
            Some(port) if port.get("name").is_some() => {
                backend.insert("servicePort".to_string(), port["name"].clone());
            }
            _ => {}
        }
        Ok(())
    })?;
    Ok(body)
}

fn for_each_ingress_path(
    body: &mut Value,
    mut f: impl FnMut(&mut serde_json::Map<String, Value>) -> Result<()>,
) -> Result<()> {
    let Some(rules) = body
        .pointer_mut("/spec/rules")
        .and_then(Value::as_array_mut)
    else {
        return Ok(());
    };
    for rule in rules {
        let Some(paths) = rule.pointer_mut("/http/paths").and_then(Value::as_array_mut) else {
            continue;
        };
        for path in paths {
            if let Some(path) = path.as_object_mut() {
                f(path)?;
            }
        }
    }
    Ok(())
}

fn for_each_ingress_backend(
    body: &mut Value,
    mut f: impl FnMut(&mut serde_json::Map<String, Value>) -> Result<()>,
) -> Result<()> {
    for_each_ingress_path(body, |path| {
        if let Some(backend) = path.get_mut("backend").and_then(Value::as_object_mut) {
            f(backend)?;
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn register_kind_creates_pivot_converters() {
        let scheme = Scheme::builder()
            .register_kind("Widget", "things.example.com", &["things.example.com/v1"])
            .build();
        let pivot = GroupVersion::gv("things.example.com", INTERNAL_VERSION);
        let v1 = GroupVersion::gv("things.example.com", "v1");
        assert!(scheme.converter(&v1.with_kind("Widget"), &pivot).is_some());
        assert!(scheme.converter(&pivot.with_kind("Widget"), &v1).is_some());
        assert!(scheme.converter(&v1.with_kind("Widget"), &v1).is_none());
    }

    #[test]
    fn service_has_two_families() {
        let scheme = Scheme::default_scheme();
        let families = scheme.families("Service");
        assert_eq!(families.len(), 2);
        assert!(families.iter().any(|f| f.pivot.group.is_empty()));
        assert!(families.iter().any(|f| f.pivot.group == KNATIVE_SERVING_GROUP));
    }

    #[test]
    fn prioritized_versions_descend() {
        let scheme = Scheme::default_scheme();
        let apps = scheme.prioritized_versions_for_group("apps");
        assert_eq!(apps[0], GroupVersion::gv("apps", "v1"));
        assert_eq!(apps[1], GroupVersion::gv("apps", "v1beta2"));
        assert_eq!(apps[2], GroupVersion::gv("apps", "v1beta1"));
    }

    #[test]
    fn legacy_ingress_backend_reshapes() {
        let legacy = json!({
            "spec": {
                "rules": [{
                    "host": "web.example.com",
                    "http": { "paths": [{
                        "path": "/",
                        "backend": { "serviceName": "web", "servicePort": 8080 }
                    }]}
                }]
            }
        });
        let pivot = ingress_legacy_to_pivot(legacy).unwrap();
        assert_eq!(
            pivot.pointer("/spec/rules/0/http/paths/0/backend/service/name"),
            Some(&json!("web"))
        );
        assert_eq!(
            pivot.pointer("/spec/rules/0/http/paths/0/backend/service/port/number"),
            Some(&json!(8080))
        );

        let back = ingress_pivot_to_legacy(pivot).unwrap();
        assert_eq!(
            back.pointer("/spec/rules/0/http/paths/0/backend/serviceName"),
            Some(&json!("web"))
        );
        assert_eq!(
            back.pointer("/spec/rules/0/http/paths/0/backend/servicePort"),
            Some(&json!(8080))
        );
    }

    #[test]
    fn legacy_deployment_gains_selector() {
        let legacy = json!({
            "spec": {
                "replicas": 2,
                "template": { "metadata": { "labels": { "app": "web" } } }
            }
        });
        let pivot = deployment_legacy_to_pivot(legacy).unwrap();
        assert_eq!(
            pivot.pointer("/spec/selector/matchLabels/app"),
            Some(&json!("web"))
        );
    }
}
