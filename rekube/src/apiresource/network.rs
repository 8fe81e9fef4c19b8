//! The networking family: Service, Ingress and Route.
//!
//! Exposure resolution prefers Route on clusters that have it, falls back
//! to a single fan-out Ingress shared by every exposed service, and
//! degrades to NodePort services when neither ingress kind exists. The
//! Ingress to Route conversion is one rule-path to one route.

use k8s_openapi::api::core::v1 as corev1;
use k8s_openapi::api::networking::v1 as networkingv1;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use tracing::{debug, error, warn};

use rekube_core::{ClusterMetadataSpec, Diagnostic, DynamicObject, GroupVersion, Result};

use crate::ir::{EnhancedIr, IrService};
use crate::scheme::KNATIVE_SERVING_GROUP;

use super::types::{Route, RouteIngress, RoutePort, RouteSpec, RouteStatus, RouteTargetReference};
use super::{is_present, object_meta, service_labels, ApiResourceKind};

const SERVICE_KIND: &str = "Service";
const INGRESS_KIND: &str = "Ingress";
const ROUTE_KIND: &str = "Route";

/// Port assumed when a route names no target port at all
pub const DEFAULT_SERVICE_PORT: i32 = 8080;

/// The networking resource family.
#[derive(Debug, Default)]
pub struct ServiceResource;

impl ApiResourceKind for ServiceResource {
    fn supported_kinds(&self) -> &'static [&'static str] {
        &[SERVICE_KIND, INGRESS_KIND, ROUTE_KIND]
    }

    fn claims(&self, obj: &DynamicObject) -> bool {
        if obj.kind() == SERVICE_KIND && obj.group_version().group == KNATIVE_SERVING_GROUP {
            return false;
        }
        self.supported_kinds().contains(&obj.kind())
    }

    fn create_objects(
        &self,
        ir: &EnhancedIr,
        supported_kinds: &[String],
        cluster: &ClusterMetadataSpec,
        _diags: &mut Vec<Diagnostic>,
    ) -> Vec<DynamicObject> {
        let mut objs = Vec::new();
        let mut ingress_enabled = false;
        for service in ir.services.values() {
            if service.serverless {
                continue;
            }
            let mut expose_object_created = false;
            if service.expose || service.only_ingress {
                if is_present(supported_kinds, ROUTE_KIND) {
                    match create_route(service) {
                        Ok(route) => {
                            objs.push(route);
                            expose_object_created = true;
                        }
                        Err(err) => error!(%err, service = %service.name, "could not build a Route"),
                    }
                } else if is_present(supported_kinds, INGRESS_KIND) {
                    // the fan-out ingress is shared; built once at the end
                    expose_object_created = true;
                    ingress_enabled = true;
                }
            }
            if service.only_ingress {
                if !expose_object_created {
                    error!(service = %service.name, "no ingress kind available to expose the service");
                }
                continue;
            }
            if !is_present(supported_kinds, SERVICE_KIND) {
                error!(service = %service.name, "the cluster offers no Service kind");
                continue;
            }
            let service_type = if expose_object_created || !service.expose {
                "ClusterIP"
            } else {
                "NodePort"
            };
            match create_service(service, service_type) {
                Ok(svc) => objs.push(svc),
                Err(err) => error!(%err, service = %service.name, "could not build a Service"),
            }
        }
        if ingress_enabled {
            match create_ingress(ir, cluster) {
                Ok(ingress) => objs.push(ingress),
                Err(err) => error!(%err, "could not build the shared Ingress"),
            }
        }
        objs
    }

    fn convert_to_supported_kinds(
        &self,
        obj: &DynamicObject,
        supported_kinds: &[String],
        _others: &[DynamicObject],
        ir: &EnhancedIr,
        _cluster: &ClusterMetadataSpec,
        diags: &mut Vec<Diagnostic>,
    ) -> Option<Vec<DynamicObject>> {
        let kind = obj.kind();
        if !self.claims(obj) {
            return None;
        }
        let result = if is_present(supported_kinds, ROUTE_KIND) {
            match kind {
                ROUTE_KIND => Ok(vec![obj.clone()]),
                INGRESS_KIND => ingress_to_route(obj, diags),
                _ => service_passthrough_or(obj, service_to_route),
            }
        } else if is_present(supported_kinds, INGRESS_KIND) {
            match kind {
                ROUTE_KIND => route_to_ingress(obj, ir, diags),
                INGRESS_KIND => Ok(vec![obj.clone()]),
                _ => service_passthrough_or(obj, service_to_ingress),
            }
        } else if is_present(supported_kinds, SERVICE_KIND) {
            match kind {
                ROUTE_KIND => {
                    diags.push(Diagnostic::KindDegraded {
                        kind: ROUTE_KIND.to_string(),
                        fallback: SERVICE_KIND.to_string(),
                    });
                    route_to_service(obj)
                }
                INGRESS_KIND => {
                    diags.push(Diagnostic::KindDegraded {
                        kind: INGRESS_KIND.to_string(),
                        fallback: SERVICE_KIND.to_string(),
                    });
                    ingress_to_service(obj)
                }
                _ => Ok(vec![obj.clone()]),
            }
        } else {
            return None;
        };
        match result {
            Ok(objs) => Some(objs),
            Err(err) => {
                error!(%err, kind, "network conversion failed; keeping the object");
                Some(vec![obj.clone()])
            }
        }
    }
}

/// Exposed services keep their externally visible type; cluster-internal
/// ones pass through untouched.
fn service_passthrough_or(
    obj: &DynamicObject,
    convert: fn(&DynamicObject) -> Result<Vec<DynamicObject>>,
) -> Result<Vec<DynamicObject>> {
    let svc: corev1::Service = obj.try_parse()?;
    let type_ = svc
        .spec
        .as_ref()
        .and_then(|s| s.type_.as_deref())
        .unwrap_or("ClusterIP");
    if matches!(type_, "NodePort" | "LoadBalancer") {
        convert(obj)
    } else {
        Ok(vec![obj.clone()])
    }
}

fn route_gvk() -> rekube_core::GroupVersionKind {
    GroupVersion::gv("route.openshift.io", "v1").with_kind(ROUTE_KIND)
}

fn ingress_gvk() -> rekube_core::GroupVersionKind {
    GroupVersion::gv("networking.k8s.io", "v1").with_kind(INGRESS_KIND)
}

fn service_gvk() -> rekube_core::GroupVersionKind {
    GroupVersion::gv("", "v1").with_kind(SERVICE_KIND)
}

fn route_shell(meta: rekube_core::ObjectMeta, host: String, to: &str, target_port: IntOrString) -> Route {
    Route {
        metadata: meta,
        spec: RouteSpec {
            host,
            port: Some(RoutePort { target_port }),
            to: RouteTargetReference {
                kind: SERVICE_KIND.to_string(),
                name: to.to_string(),
                // fixed weight; some templating tools reject a missing one
                weight: Some(1),
            },
        },
        status: RouteStatus {
            ingress: vec![RouteIngress::default()],
        },
    }
}

fn create_route(service: &IrService) -> Result<DynamicObject> {
    let target_port = service
        .port_forwardings
        .first()
        .map(|f| IntOrString::Int(f.service_port.number))
        .unwrap_or(IntOrString::Int(DEFAULT_SERVICE_PORT));
    let meta = object_meta(&service.name, service_labels(&service.name), &service.annotations);
    let route = route_shell(meta, String::new(), &service.name, target_port);
    debug!(service = %service.name, "built a Route");
    DynamicObject::from_typed(&route_gvk(), &route)
}

/// One rule-path of an Ingress becomes one Route
fn ingress_to_route(obj: &DynamicObject, _diags: &mut [Diagnostic]) -> Result<Vec<DynamicObject>> {
    let ingress: networkingv1::Ingress = obj.try_parse()?;
    let mut objs = Vec::new();
    for rule in ingress
        .spec
        .as_ref()
        .and_then(|s| s.rules.as_ref())
        .into_iter()
        .flatten()
    {
        let paths = match rule.http.as_ref() {
            Some(http) => &http.paths,
            None => continue,
        };
        for path in paths {
            let backend = match path.backend.service.as_ref() {
                Some(svc) => svc,
                None => continue,
            };
            let target_port = backend_target_port(backend.port.as_ref());
            let route = route_shell(
                ingress.metadata.clone(),
                rule.host.clone().unwrap_or_default(),
                &backend.name,
                target_port,
            );
            objs.push(DynamicObject::from_typed(&route_gvk(), &route)?);
        }
    }
    Ok(objs)
}

fn backend_target_port(port: Option<&networkingv1::ServiceBackendPort>) -> IntOrString {
    match port {
        Some(p) => match p.name.as_deref() {
            Some(name) if !name.is_empty() => IntOrString::String(name.to_string()),
            _ => IntOrString::Int(p.number.unwrap_or(DEFAULT_SERVICE_PORT)),
        },
        None => IntOrString::Int(DEFAULT_SERVICE_PORT),
    }
}

fn service_to_route(obj: &DynamicObject) -> Result<Vec<DynamicObject>> {
    let mut svc: corev1::Service = obj.try_parse()?;
    let mut objs = Vec::new();
    for port in svc.spec.as_ref().and_then(|s| s.ports.clone()).into_iter().flatten() {
        let route = route_shell(
            svc.metadata.clone(),
            String::new(),
            svc.metadata.name.as_deref().unwrap_or_default(),
            IntOrString::Int(port.port),
        );
        objs.push(DynamicObject::from_typed(&route_gvk(), &route)?);
    }
    if let Some(spec) = svc.spec.as_mut() {
        spec.type_ = Some("ClusterIP".to_string());
    }
    objs.push(DynamicObject::from_typed(&service_gvk(), &svc)?);
    Ok(objs)
}

/// Rebuild a Route as a single-rule Ingress
///
/// A route without an explicit target port falls back to the backing
/// service's first port forwarding from the model, then to 8080.
fn route_to_ingress(
    obj: &DynamicObject,
    ir: &EnhancedIr,
    diags: &mut Vec<Diagnostic>,
) -> Result<Vec<DynamicObject>> {
    let route: Route = obj.try_parse()?;
    let target_port = match route.spec.port.as_ref() {
        Some(port) => port.target_port.clone(),
        None => match ir
            .services
            .get(&route.spec.to.name)
            .and_then(|s| s.port_forwardings.first())
        {
            Some(forwarding) => IntOrString::Int(forwarding.service_port.number),
            None => {
                error!(route = obj.name(), "route names no target port; defaulting");
                diags.push(Diagnostic::DefaultSubstituted {
                    subject: format!("target port of route {}", obj.name()),
                    value: DEFAULT_SERVICE_PORT.to_string(),
                });
                IntOrString::Int(DEFAULT_SERVICE_PORT)
            }
        },
    };
    let backend_port = match &target_port {
        IntOrString::String(name) => networkingv1::ServiceBackendPort {
            name: Some(name.clone()),
            number: None,
        },
        IntOrString::Int(number) => networkingv1::ServiceBackendPort {
            name: None,
            number: Some(*number),
        },
    };
    let mut ingress = networkingv1::Ingress {
        metadata: route.metadata.clone(),
        spec: Some(networkingv1::IngressSpec {
            rules: Some(vec![networkingv1::IngressRule {
                host: if route.spec.host.is_empty() {
                    None
                } else {
                    Some(route.spec.host.clone())
                },
                http: Some(networkingv1::HTTPIngressRuleValue {
                    paths: vec![networkingv1::HTTPIngressPath {
                        path: None,
                        path_type: "Prefix".to_string(),
                        backend: networkingv1::IngressBackend {
                            service: Some(networkingv1::IngressServiceBackend {
                                name: route.spec.to.name.clone(),
                                port: Some(backend_port),
                            }),
                            ..networkingv1::IngressBackend::default()
                        },
                    }],
                }),
            }]),
            ..networkingv1::IngressSpec::default()
        }),
        ..networkingv1::Ingress::default()
    };
    if route.spec.host.starts_with("https") {
        if let Some(spec) = ingress.spec.as_mut() {
            spec.tls = Some(vec![networkingv1::IngressTLS {
                hosts: Some(vec![route.spec.host.clone()]),
                secret_name: Some("tlssecret-replaceme".to_string()),
            }]);
        }
    }
    Ok(vec![DynamicObject::from_typed(&ingress_gvk(), &ingress)?])
}

fn service_to_ingress(obj: &DynamicObject) -> Result<Vec<DynamicObject>> {
    let mut svc: corev1::Service = obj.try_parse()?;
    let name = svc.metadata.name.clone().unwrap_or_default();
    let ports = svc.spec.as_ref().and_then(|s| s.ports.clone()).unwrap_or_default();
    let path_prefix = format!("/{name}");
    let mut paths = Vec::new();
    for port in &ports {
        let path = if ports.len() > 1 {
            // multiple ports cannot share one path
            match port.name.as_deref() {
                Some(pname) if !pname.is_empty() => format!("{path_prefix}/{pname}"),
                _ => format!("{path_prefix}/{}", port.port),
            }
        } else {
            path_prefix.clone()
        };
        paths.push(networkingv1::HTTPIngressPath {
            path: Some(path),
            path_type: "Prefix".to_string(),
            backend: networkingv1::IngressBackend {
                service: Some(networkingv1::IngressServiceBackend {
                    name: name.clone(),
                    port: Some(networkingv1::ServiceBackendPort {
                        name: None,
                        number: Some(port.port),
                    }),
                }),
                ..networkingv1::IngressBackend::default()
            },
        });
    }
    let ingress = networkingv1::Ingress {
        metadata: svc.metadata.clone(),
        spec: Some(networkingv1::IngressSpec {
            rules: Some(vec![networkingv1::IngressRule {
                host: None,
                http: Some(networkingv1::HTTPIngressRuleValue { paths }),
            }]),
            ..networkingv1::IngressSpec::default()
        }),
        ..networkingv1::Ingress::default()
    };
    if let Some(spec) = svc.spec.as_mut() {
        spec.type_ = Some("ClusterIP".to_string());
    }
    Ok(vec![
        DynamicObject::from_typed(&ingress_gvk(), &ingress)?,
        DynamicObject::from_typed(&service_gvk(), &svc)?,
    ])
}

fn route_to_service(obj: &DynamicObject) -> Result<Vec<DynamicObject>> {
    let route: Route = obj.try_parse()?;
    let (port_name, port_number) = match route.spec.port.as_ref().map(|p| &p.target_port) {
        Some(IntOrString::String(name)) => (Some(name.clone()), DEFAULT_SERVICE_PORT),
        Some(IntOrString::Int(number)) => (None, *number),
        None => (None, DEFAULT_SERVICE_PORT),
    };
    let mut metadata = route.metadata.clone();
    metadata.name = Some(route.spec.to.name.clone());
    let svc = corev1::Service {
        metadata,
        spec: Some(corev1::ServiceSpec {
            type_: Some("NodePort".to_string()),
            ports: Some(vec![corev1::ServicePort {
                name: port_name,
                port: port_number,
                ..corev1::ServicePort::default()
            }]),
            ..corev1::ServiceSpec::default()
        }),
        ..corev1::Service::default()
    };
    Ok(vec![DynamicObject::from_typed(&service_gvk(), &svc)?])
}

fn ingress_to_service(obj: &DynamicObject) -> Result<Vec<DynamicObject>> {
    let ingress: networkingv1::Ingress = obj.try_parse()?;
    let mut objs = Vec::new();
    for rule in ingress
        .spec
        .as_ref()
        .and_then(|s| s.rules.as_ref())
        .into_iter()
        .flatten()
    {
        for path in rule.http.as_ref().map(|h| h.paths.as_slice()).unwrap_or_default() {
            let backend = match path.backend.service.as_ref() {
                Some(svc) => svc,
                None => continue,
            };
            let mut metadata = ingress.metadata.clone();
            metadata.name = Some(backend.name.clone());
            let svc = corev1::Service {
                metadata,
                spec: Some(corev1::ServiceSpec {
                    type_: Some("NodePort".to_string()),
                    ports: Some(vec![corev1::ServicePort {
                        name: backend.port.as_ref().and_then(|p| p.name.clone()),
                        port: backend
                            .port
                            .as_ref()
                            .and_then(|p| p.number)
                            .unwrap_or(DEFAULT_SERVICE_PORT),
                        ..corev1::ServicePort::default()
                    }]),
                    ..corev1::ServiceSpec::default()
                }),
                ..corev1::Service::default()
            };
            objs.push(DynamicObject::from_typed(&service_gvk(), &svc)?);
        }
    }
    Ok(objs)
}

fn create_service(service: &IrService, service_type: &str) -> Result<DynamicObject> {
    let ports = service_ports(service);
    let mut spec = corev1::ServiceSpec {
        type_: Some(service_type.to_string()),
        selector: Some(service_labels(&service.name)),
        ports: if ports.is_empty() { None } else { Some(ports.clone()) },
        ..corev1::ServiceSpec::default()
    };
    if ports.is_empty() {
        // headless service for port-less workloads
        spec.cluster_ip = Some("None".to_string());
    }
    let svc = corev1::Service {
        metadata: object_meta(&service.name, service_labels(&service.name), &service.annotations),
        spec: Some(spec),
        ..corev1::Service::default()
    };
    debug!(service = %service.name, service_type, "built a Service");
    DynamicObject::from_typed(&service_gvk(), &svc)
}

fn service_ports(service: &IrService) -> Vec<corev1::ServicePort> {
    let mut ports = Vec::new();
    for forwarding in &service.port_forwardings {
        let name = forwarding
            .service_port
            .name
            .clone()
            .unwrap_or_else(|| format!("port-{}", forwarding.service_port.number));
        let target_port = match forwarding.pod_port.name.as_deref() {
            Some(pod_name) if !pod_name.is_empty() => IntOrString::String(pod_name.to_string()),
            _ => IntOrString::Int(forwarding.pod_port.number),
        };
        ports.push(corev1::ServicePort {
            name: Some(name),
            port: forwarding.service_port.number,
            target_port: Some(target_port),
            ..corev1::ServicePort::default()
        });
    }
    ports
}

/// Build the single fan-out Ingress covering every exposed service
fn create_ingress(ir: &EnhancedIr, cluster: &ClusterMetadataSpec) -> Result<DynamicObject> {
    let mut paths = Vec::new();
    for service in ir.services.values() {
        if !service.expose && !service.only_ingress {
            continue;
        }
        let backend_name = service
            .backend_service_name
            .clone()
            .unwrap_or_else(|| service.name.clone());
        let ports = service_ports(service);
        let path_prefix = if service.service_relative_path.is_empty() {
            format!("/{}", service.name)
        } else {
            service.service_relative_path.clone()
        };
        for port in &ports {
            let path = if ports.len() > 1 {
                match port.name.as_deref() {
                    Some(pname) if !pname.is_empty() => format!("{path_prefix}/{pname}"),
                    _ => format!("{path_prefix}/{}", port.port),
                }
            } else {
                path_prefix.clone()
            };
            let backend_port = match port.name.as_deref() {
                Some(pname) if !pname.is_empty() => networkingv1::ServiceBackendPort {
                    name: Some(pname.to_string()),
                    number: None,
                },
                _ => networkingv1::ServiceBackendPort {
                    name: None,
                    number: Some(port.port),
                },
            };
            paths.push(networkingv1::HTTPIngressPath {
                path: Some(path),
                path_type: "Prefix".to_string(),
                backend: networkingv1::IngressBackend {
                    service: Some(networkingv1::IngressServiceBackend {
                        name: backend_name.clone(),
                        port: Some(backend_port),
                    }),
                    ..networkingv1::IngressBackend::default()
                },
            });
        }
    }
    if paths.is_empty() {
        warn!("no exposed service contributed an ingress path");
    }
    let ingress_name = if ir.services.len() == 1 {
        ir.services
            .keys()
            .next()
            .cloned()
            .unwrap_or_else(|| ir.name.clone())
    } else {
        ir.name.clone()
    };
    let ingress = networkingv1::Ingress {
        metadata: object_meta(&ingress_name, service_labels(&ingress_name), &Default::default()),
        spec: Some(networkingv1::IngressSpec {
            rules: Some(vec![networkingv1::IngressRule {
                host: cluster.host.clone(),
                http: Some(networkingv1::HTTPIngressRuleValue { paths }),
            }]),
            ..networkingv1::IngressSpec::default()
        }),
        ..networkingv1::Ingress::default()
    };
    DynamicObject::from_typed(&ingress_gvk(), &ingress)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BackendPort, PortForwarding};
    use rekube_core::ClusterMetadata;
    use serde_json::json;

    fn exposed_service(name: &str, port: i32) -> IrService {
        let mut service = IrService::new(name);
        service.expose = true;
        service.port_forwardings = vec![PortForwarding {
            service_port: BackendPort::number(port),
            pod_port: BackendPort::number(port),
        }];
        service
    }

    fn kinds(kinds: &[&str]) -> Vec<String> {
        kinds.iter().map(|k| k.to_string()).collect()
    }

    #[test]
    fn route_preferred_when_available() {
        let mut ir = EnhancedIr::new("app");
        ir.add_service(exposed_service("web", 8080));
        let cluster = ClusterMetadata::openshift().spec;
        let objs = ServiceResource.create_objects(
            &ir,
            &kinds(&["Service", "Route"]),
            &cluster,
            &mut Vec::new(),
        );
        assert_eq!(objs.len(), 2);
        assert_eq!(objs[0].kind(), "Route");
        // the backing service stays cluster-internal
        assert_eq!(objs[1].body_path(&["spec", "type"]), Some(&json!("ClusterIP")));
    }

    #[test]
    fn shared_ingress_fans_out_every_exposed_service() {
        let mut ir = EnhancedIr::new("app");
        ir.add_service(exposed_service("web", 8080));
        ir.add_service(exposed_service("api", 9090));
        let mut cluster = ClusterMetadata::kubernetes().spec;
        cluster.host = Some("apps.example.com".to_string());
        let objs = ServiceResource.create_objects(
            &ir,
            &kinds(&["Service", "Ingress"]),
            &cluster,
            &mut Vec::new(),
        );
        let ingress = objs.iter().find(|o| o.kind() == "Ingress").unwrap();
        assert_eq!(ingress.name(), "app");
        let rules = ingress.body_path(&["spec", "rules"]).unwrap();
        assert_eq!(rules[0]["host"], json!("apps.example.com"));
        assert_eq!(rules[0]["http"]["paths"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn no_ingress_kind_degrades_to_nodeport() {
        let mut ir = EnhancedIr::new("app");
        ir.add_service(exposed_service("web", 8080));
        let cluster = ClusterMetadata::kubernetes().spec;
        let objs =
            ServiceResource.create_objects(&ir, &kinds(&["Service"]), &cluster, &mut Vec::new());
        assert_eq!(objs.len(), 1);
        assert_eq!(objs[0].body_path(&["spec", "type"]), Some(&json!("NodePort")));
    }

    #[test]
    fn ingress_to_route_emits_one_route_per_path() {
        let mut ir = EnhancedIr::new("app");
        ir.add_service(exposed_service("web", 8080));
        ir.add_service(exposed_service("api", 9090));
        let mut cluster = ClusterMetadata::kubernetes().spec;
        cluster.host = Some("apps.example.com".to_string());
        let ingress = create_ingress(&ir, &cluster).unwrap();

        let routes = ingress_to_route(&ingress, &mut Vec::new()).unwrap();
        assert_eq!(routes.len(), 2);
        assert!(routes.iter().all(|r| r.kind() == "Route"));
        assert_eq!(
            routes[0].body_path(&["spec", "host"]),
            Some(&json!("apps.example.com"))
        );
    }

    #[test]
    fn route_without_port_falls_back_through_model_then_default() {
        let ir = {
            let mut ir = EnhancedIr::new("app");
            ir.add_service(exposed_service("web", 9000));
            ir
        };
        let meta = object_meta("edge", service_labels("edge"), &Default::default());
        let mut route = route_shell(meta, String::new(), "web", IntOrString::Int(1));
        route.spec.port = None;
        let obj = DynamicObject::from_typed(&route_gvk(), &route).unwrap();

        let mut diags = Vec::new();
        let out = route_to_ingress(&obj, &ir, &mut diags).unwrap();
        let port = out[0]
            .body_path(&["spec", "rules"]) // first rule, first path
            .and_then(|r| r[0]["http"]["paths"][0]["backend"]["service"]["port"]["number"].as_i64());
        assert_eq!(port, Some(9000));
        assert!(diags.is_empty());

        // unknown backing service: 8080 plus a recorded substitution
        let out = route_to_ingress(&obj, &EnhancedIr::new("empty"), &mut diags).unwrap();
        let port = out[0]
            .body_path(&["spec", "rules"])
            .and_then(|r| r[0]["http"]["paths"][0]["backend"]["service"]["port"]["number"].as_i64());
        assert_eq!(port, Some(DEFAULT_SERVICE_PORT as i64));
        assert!(matches!(diags[0], Diagnostic::DefaultSubstituted { .. }));
    }

    #[test]
    fn route_to_service_targets_the_backend_name() {
        let meta = object_meta("edge", service_labels("edge"), &Default::default());
        let route = route_shell(meta, String::new(), "web", IntOrString::Int(8080));
        let obj = DynamicObject::from_typed(&route_gvk(), &route).unwrap();
        let out = route_to_service(&obj).unwrap();
        assert_eq!(out[0].kind(), "Service");
        assert_eq!(out[0].name(), "web");
        assert_eq!(out[0].body_path(&["spec", "type"]), Some(&json!("NodePort")));
    }

    #[test]
    fn knative_services_are_not_claimed() {
        let gv: GroupVersion = "serving.knative.dev/v1".parse().unwrap();
        let obj = DynamicObject::new("fn", &gv.with_kind("Service"));
        assert!(!ServiceResource.claims(&obj));
        let core = DynamicObject::new("web", &GroupVersion::gv("", "v1").with_kind("Service"));
        assert!(ServiceResource.claims(&core));
    }
}
