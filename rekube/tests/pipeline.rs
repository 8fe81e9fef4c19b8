//! End-to-end pipeline behavior against different capability matrices.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1 as corev1;
use serde_json::json;

use rekube::core::{ClusterMetadata, ClusterMetadataSpec, DynamicObject, GroupVersion};
use rekube::emit::{self, default_resources};
use rekube::ir::{BackendPort, EnhancedIr, IrService, PortForwarding};
use rekube::scheme::convert::{convert_to_supported_version, convert_to_version};
use rekube::{Diagnostic, Scheme};

fn trace_init() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing_subscriber::filter::LevelFilter::DEBUG)
        .try_init();
}

fn cluster_with(matrix: &[(&str, &[&str])]) -> ClusterMetadataSpec {
    trace_init();
    let mut spec = ClusterMetadataSpec::default();
    for (kind, gvs) in matrix {
        spec.api_kind_version_map.insert(
            kind.to_string(),
            gvs.iter().map(|gv| gv.to_string()).collect(),
        );
    }
    spec
}

fn web_service(name: &str) -> IrService {
    let mut service = IrService::new(name);
    service.expose = true;
    service.pod_spec.containers = vec![corev1::Container {
        name: name.to_string(),
        image: Some(format!("registry.example.com/{name}:v1")),
        ..corev1::Container::default()
    }];
    service.port_forwardings = vec![PortForwarding {
        service_port: BackendPort::number(8080),
        pod_port: BackendPort::number(8080),
    }];
    service
}

#[test]
fn replicated_service_degrades_to_replication_controller() {
    // Deployment is listed but with no versions, which means unsupported
    let cluster = cluster_with(&[
        ("Deployment", &[]),
        ("ReplicationController", &["v1"]),
        ("Pod", &["v1"]),
        ("Service", &["v1"]),
    ]);
    let mut ir = EnhancedIr::new("app");
    ir.add_service(web_service("web"));

    let dir = tempfile::tempdir().unwrap();
    let out = emit::transform_ir_and_persist(
        &ir,
        dir.path(),
        &default_resources(),
        &cluster,
        &Scheme::default_scheme(),
    )
    .unwrap();

    let names: Vec<_> = out
        .files
        .iter()
        .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
        .collect();
    assert!(names.contains(&"web-replicationcontroller.yaml".to_string()));
    assert!(!names.iter().any(|n| n.contains("deployment")));
    assert!(out.diagnostics.iter().any(|d| matches!(
        d,
        Diagnostic::KindDegraded { kind, fallback }
            if kind == "Deployment" && fallback == "ReplicationController"
    )));
}

#[test]
fn daemon_service_emits_daemonset_despite_empty_matrix_entry() {
    let cluster = cluster_with(&[("DaemonSet", &[]), ("Service", &["v1"])]);
    let mut ir = EnhancedIr::new("app");
    let mut service = web_service("agent");
    service.expose = false;
    service.daemon = true;
    ir.add_service(service);

    let dir = tempfile::tempdir().unwrap();
    let out = emit::transform_ir_and_persist(
        &ir,
        dir.path(),
        &default_resources(),
        &cluster,
        &Scheme::default_scheme(),
    )
    .unwrap();

    assert!(out
        .files
        .iter()
        .any(|p| p.file_name().unwrap() == "agent-daemonset.yaml"));
    assert!(out.diagnostics.iter().any(|d| matches!(
        d,
        Diagnostic::KindDegraded { kind, fallback } if kind == "DaemonSet" && fallback == "DaemonSet"
    )));
}

#[test]
fn pivot_bridges_legacy_deployment_to_apps_v1() {
    let scheme = Scheme::default_scheme();
    let gv: GroupVersion = "apps/v1beta1".parse().unwrap();
    let obj = DynamicObject::new("web", &gv.with_kind("Deployment")).data(json!({
        "spec": {
            "replicas": 2,
            "selector": { "matchLabels": { "app": "web" } },
            "template": {
                "metadata": { "labels": { "app": "web" } },
                "spec": { "containers": [{ "name": "web", "image": "nginx" }] }
            }
        }
    }));
    let out = convert_to_version(&scheme, &obj, &GroupVersion::gv("apps", "v1")).unwrap();
    assert_eq!(out.types.api_version, "apps/v1");
    assert_eq!(out.data, obj.data);
}

#[test]
fn highest_normalized_version_wins() {
    let scheme = Scheme::default_scheme();
    let cluster = cluster_with(&[(
        "StatefulSet",
        &["apps/v1alpha1", "apps/v1beta1", "apps/v1"],
    )]);
    let gv: GroupVersion = "apps/v1beta1".parse().unwrap();
    let obj = DynamicObject::new("db", &gv.with_kind("StatefulSet")).data(json!({"spec": {}}));
    let (out, diags) = convert_to_supported_version(&scheme, &obj, &cluster);
    assert_eq!(out.types.api_version, "apps/v1");
    assert!(diags.is_empty());
}

#[test]
fn negotiation_is_idempotent_over_the_whole_pipeline() {
    let cluster = ClusterMetadata::kubernetes().spec;
    let mut ir = EnhancedIr::new("app");
    ir.add_service(web_service("web"));

    let first_dir = tempfile::tempdir().unwrap();
    let first = emit::transform_ir_and_persist(
        &ir,
        first_dir.path(),
        &default_resources(),
        &cluster,
        &Scheme::default_scheme(),
    )
    .unwrap();

    // feed the written manifests back through the object pipeline
    let objs = emit::parse_k8s_yaml(first_dir.path()).unwrap();
    assert_eq!(objs.len(), first.files.len());

    let second_dir = tempfile::tempdir().unwrap();
    emit::transform_objects_and_persist(
        &objs,
        second_dir.path(),
        &default_resources(),
        &cluster,
        &Scheme::default_scheme(),
    )
    .unwrap();

    let again = emit::parse_k8s_yaml(second_dir.path()).unwrap();
    let mut objs = objs;
    let mut again = again;
    objs.sort_by_key(|o| o.object_id() + o.kind());
    again.sort_by_key(|o| o.object_id() + o.kind());
    assert_eq!(objs, again);
}

#[test]
fn openshift_target_swaps_ingress_for_routes() {
    let cluster = ClusterMetadata::openshift().spec;
    let mut ir = EnhancedIr::new("shop");
    ir.add_service(web_service("web"));
    ir.add_service(web_service("api"));

    let dir = tempfile::tempdir().unwrap();
    let out = emit::transform_ir_and_persist(
        &ir,
        dir.path(),
        &default_resources(),
        &cluster,
        &Scheme::default_scheme(),
    )
    .unwrap();

    let names: Vec<_> = out
        .files
        .iter()
        .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
        .collect();
    assert!(names.contains(&"web-route.yaml".to_string()));
    assert!(names.contains(&"api-route.yaml".to_string()));
    assert!(!names.iter().any(|n| n.ends_with("-ingress.yaml")));
    // workloads land on DeploymentConfig-capable clusters as Deployments
    // only when the matrix says so; the openshift profile has both
    assert!(names.contains(&"web-deployment.yaml".to_string()));
}

#[test]
fn parsed_ingress_manifest_becomes_routes_on_openshift() {
    let cluster = ClusterMetadata::openshift().spec;
    let gv: GroupVersion = "networking.k8s.io/v1".parse().unwrap();
    let ingress = DynamicObject::new("edge", &gv.with_kind("Ingress")).data(json!({
        "spec": {
            "rules": [{
                "host": "shop.example.com",
                "http": { "paths": [
                    { "path": "/web", "pathType": "Prefix",
                      "backend": { "service": { "name": "web", "port": { "number": 8080 } } } },
                    { "path": "/api", "pathType": "Prefix",
                      "backend": { "service": { "name": "api", "port": { "number": 9090 } } } }
                ] }
            }]
        }
    }));

    let dir = tempfile::tempdir().unwrap();
    let out = emit::transform_objects_and_persist(
        &[ingress],
        dir.path(),
        &default_resources(),
        &cluster,
        &Scheme::default_scheme(),
    )
    .unwrap();

    // one rule-path becomes one route; both share the object name, so
    // dedupe merges them into a single written file
    assert!(out
        .files
        .iter()
        .all(|p| p.file_name().unwrap().to_str().unwrap().ends_with("-route.yaml")));
    let objs = emit::parse_k8s_yaml(dir.path()).unwrap();
    assert!(objs.iter().all(|o| o.kind() == "Route"));
    assert_eq!(
        objs[0].body_path(&["spec", "host"]),
        Some(&json!("shop.example.com"))
    );
}

#[test]
fn unknown_kinds_pass_through_with_a_diagnostic() {
    let cluster = ClusterMetadata::kubernetes().spec;
    let gv: GroupVersion = "example.com/v1".parse().unwrap();
    let custom = DynamicObject::new("thing", &gv.with_kind("Widget")).data(json!({"spec": {"x": 1}}));

    let dir = tempfile::tempdir().unwrap();
    let out = emit::transform_objects_and_persist(
        &[custom.clone()],
        dir.path(),
        &default_resources(),
        &cluster,
        &Scheme::default_scheme(),
    )
    .unwrap();

    let objs = emit::parse_k8s_yaml(dir.path()).unwrap();
    assert_eq!(objs.len(), 1);
    assert_eq!(objs[0], custom);
    assert!(out
        .diagnostics
        .iter()
        .any(|d| matches!(d, Diagnostic::VersionNotFound { kind, .. } if kind == "Widget")));
}

#[test]
fn config_data_survives_the_secret_degradation() {
    use k8s_openapi::ByteString;
    use rekube::ir::{IrStorage, StorageType};

    let cluster = cluster_with(&[("Secret", &["v1"]), ("Service", &["v1"]), ("Deployment", &["apps/v1"])]);
    let mut ir = EnhancedIr::new("app");
    let mut content = BTreeMap::new();
    content.insert(
        "app.conf".to_string(),
        ByteString(b"debug = true".to_vec()),
    );
    ir.storages.push(IrStorage {
        name: "config".to_string(),
        storage_type: StorageType::ConfigMap,
        content,
        ..IrStorage::default()
    });

    let dir = tempfile::tempdir().unwrap();
    emit::transform_ir_and_persist(
        &ir,
        dir.path(),
        &default_resources(),
        &cluster,
        &Scheme::default_scheme(),
    )
    .unwrap();

    let objs = emit::parse_k8s_yaml(dir.path()).unwrap();
    let secret = objs.iter().find(|o| o.kind() == "Secret").unwrap();
    // secret data is the base64 form of the original content
    assert_eq!(
        secret.body_path(&["data", "app.conf"]),
        Some(&json!("ZGVidWcgPSB0cnVl"))
    );
}

#[test]
fn deployment_survives_a_pod_only_round_trip() {
    let labels = json!({ "rekube.io/service": "web" });
    let gv: GroupVersion = "apps/v1".parse().unwrap();
    let mut deployment = DynamicObject::new("web", &gv.with_kind("Deployment")).data(json!({
        "spec": {
            "replicas": 3,
            "selector": { "matchLabels": labels.clone() },
            "template": {
                "metadata": { "labels": labels.clone() },
                "spec": { "containers": [{ "name": "web", "image": "nginx" }] }
            }
        }
    }));
    deployment.metadata.labels = Some(BTreeMap::from([(
        "rekube.io/service".to_string(),
        "web".to_string(),
    )]));

    // a cluster that only runs bare pods
    let pods_only = cluster_with(&[("Pod", &["v1"])]);
    let pod_dir = tempfile::tempdir().unwrap();
    emit::transform_objects_and_persist(
        std::slice::from_ref(&deployment),
        pod_dir.path(),
        &default_resources(),
        &pods_only,
        &Scheme::default_scheme(),
    )
    .unwrap();
    let pods = emit::parse_k8s_yaml(pod_dir.path()).unwrap();
    assert_eq!(pods.len(), 1);
    assert_eq!(pods[0].kind(), "Pod");

    // and back to one that runs deployments
    let back_dir = tempfile::tempdir().unwrap();
    let back = emit::transform_objects_and_persist(
        &pods,
        back_dir.path(),
        &default_resources(),
        &ClusterMetadata::kubernetes().spec,
        &Scheme::default_scheme(),
    )
    .unwrap();
    let objs = emit::parse_k8s_yaml(back_dir.path()).unwrap();
    assert_eq!(objs.len(), 1);
    assert_eq!(objs[0].kind(), "Deployment");

    // the pod template comes through the detour intact
    assert_eq!(
        objs[0].body_path(&["spec", "template", "metadata", "labels"]),
        Some(&labels)
    );
    assert_eq!(
        objs[0]
            .body_path(&["spec", "template", "spec", "containers"])
            .and_then(|c| c.get(0)),
        deployment
            .body_path(&["spec", "template", "spec", "containers"])
            .and_then(|c| c.get(0))
    );
    // the replica count does not; the default is substituted and reported
    assert_eq!(objs[0].body_path(&["spec", "replicas"]), Some(&json!(2)));
    assert!(back
        .diagnostics
        .iter()
        .any(|d| matches!(d, Diagnostic::DefaultSubstituted { .. })));
}
