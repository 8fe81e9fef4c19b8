//! The storage family: ConfigMap, Secret and PersistentVolumeClaim.
//!
//! Besides building the objects themselves, this module owns the
//! capability-driven volume substitution every workload constructor runs
//! its pod spec through: config-map volumes become secret volumes (and
//! vice versa) when only one of the two is supported, and claim-backed
//! volumes degrade to `emptyDir` when the cluster has no claims at all.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1 as corev1;
use k8s_openapi::ByteString;
use tracing::{debug, warn};

use rekube_core::{ClusterMetadataSpec, Diagnostic, DynamicObject, GroupVersion, Result};

use crate::ir::{EnhancedIr, IrStorage, StorageType};

use super::{is_present, ApiResourceKind};

const CONFIG_MAP_KIND: &str = "ConfigMap";
const SECRET_KIND: &str = "Secret";
const PVC_KIND: &str = "PersistentVolumeClaim";

const SECRET_TYPE_OPAQUE: &str = "Opaque";
const SECRET_TYPE_DOCKER_CONFIG_JSON: &str = "kubernetes.io/dockerconfigjson";

/// The storage resource family.
#[derive(Debug, Default)]
pub struct StorageResource;

impl ApiResourceKind for StorageResource {
    fn supported_kinds(&self) -> &'static [&'static str] {
        &[CONFIG_MAP_KIND, SECRET_KIND, PVC_KIND]
    }

    fn create_objects(
        &self,
        ir: &EnhancedIr,
        supported_kinds: &[String],
        _cluster: &ClusterMetadataSpec,
        diags: &mut Vec<Diagnostic>,
    ) -> Vec<DynamicObject> {
        let mut objs = Vec::new();
        for storage in &ir.storages {
            let built = match storage.storage_type {
                StorageType::ConfigMap => {
                    if !is_present(supported_kinds, CONFIG_MAP_KIND)
                        && is_present(supported_kinds, SECRET_KIND)
                    {
                        diags.push(Diagnostic::KindDegraded {
                            kind: CONFIG_MAP_KIND.to_string(),
                            fallback: SECRET_KIND.to_string(),
                        });
                        create_secret(storage)
                    } else {
                        create_config_map(storage)
                    }
                }
                StorageType::Secret => {
                    if !is_present(supported_kinds, SECRET_KIND)
                        && is_present(supported_kinds, CONFIG_MAP_KIND)
                    {
                        diags.push(Diagnostic::KindDegraded {
                            kind: SECRET_KIND.to_string(),
                            fallback: CONFIG_MAP_KIND.to_string(),
                        });
                        create_config_map(storage)
                    } else {
                        create_secret(storage)
                    }
                }
                StorageType::PullSecret => create_secret(storage),
                StorageType::Pvc => create_pvc(storage),
            };
            match built {
                Ok(obj) => objs.push(obj),
                Err(err) => warn!(%err, storage = %storage.name, "could not build a storage object"),
            }
        }
        objs
    }

    fn convert_to_supported_kinds(
        &self,
        obj: &DynamicObject,
        supported_kinds: &[String],
        _others: &[DynamicObject],
        _ir: &EnhancedIr,
        _cluster: &ClusterMetadataSpec,
        diags: &mut Vec<Diagnostic>,
    ) -> Option<Vec<DynamicObject>> {
        match obj.kind() {
            CONFIG_MAP_KIND => {
                if !is_present(supported_kinds, CONFIG_MAP_KIND)
                    && is_present(supported_kinds, SECRET_KIND)
                {
                    diags.push(Diagnostic::KindDegraded {
                        kind: CONFIG_MAP_KIND.to_string(),
                        fallback: SECRET_KIND.to_string(),
                    });
                    return config_map_to_secret(obj).ok().map(|o| vec![o]);
                }
                Some(vec![obj.clone()])
            }
            SECRET_KIND => {
                if !is_present(supported_kinds, SECRET_KIND)
                    && is_present(supported_kinds, CONFIG_MAP_KIND)
                {
                    diags.push(Diagnostic::KindDegraded {
                        kind: SECRET_KIND.to_string(),
                        fallback: CONFIG_MAP_KIND.to_string(),
                    });
                    return secret_to_config_map(obj).ok().map(|o| vec![o]);
                }
                Some(vec![obj.clone()])
            }
            PVC_KIND => {
                if !is_present(supported_kinds, PVC_KIND) {
                    warn!(name = obj.name(), "persistent volume claims are not supported by the target cluster");
                    diags.push(Diagnostic::KindDegraded {
                        kind: PVC_KIND.to_string(),
                        fallback: PVC_KIND.to_string(),
                    });
                }
                Some(vec![obj.clone()])
            }
            _ => None,
        }
    }
}

fn core_gvk(kind: &str) -> rekube_core::GroupVersionKind {
    GroupVersion::gv("", "v1").with_kind(kind)
}

fn create_config_map(storage: &IrStorage) -> Result<DynamicObject> {
    let name = compliant_name(&storage.name);
    let data: BTreeMap<String, String> = storage
        .content
        .iter()
        .map(|(k, v)| (k.clone(), String::from_utf8_lossy(&v.0).into_owned()))
        .collect();
    let cm = corev1::ConfigMap {
        metadata: meta_for(&name, storage),
        data: if data.is_empty() { None } else { Some(data) },
        ..corev1::ConfigMap::default()
    };
    debug!(%name, "built a ConfigMap");
    DynamicObject::from_typed(&core_gvk(CONFIG_MAP_KIND), &cm)
}

fn create_secret(storage: &IrStorage) -> Result<DynamicObject> {
    let name = compliant_name(&storage.name);
    let type_ = storage.secret_type.clone().unwrap_or_else(|| {
        if storage.storage_type == StorageType::PullSecret {
            SECRET_TYPE_DOCKER_CONFIG_JSON.to_string()
        } else {
            SECRET_TYPE_OPAQUE.to_string()
        }
    });
    let secret = corev1::Secret {
        metadata: meta_for(&name, storage),
        type_: Some(type_),
        data: if storage.content.is_empty() {
            None
        } else {
            Some(storage.content.clone())
        },
        ..corev1::Secret::default()
    };
    debug!(%name, "built a Secret");
    DynamicObject::from_typed(&core_gvk(SECRET_KIND), &secret)
}

fn create_pvc(storage: &IrStorage) -> Result<DynamicObject> {
    let pvc = corev1::PersistentVolumeClaim {
        metadata: meta_for(&storage.name, storage),
        spec: storage.pvc_spec.clone(),
        ..corev1::PersistentVolumeClaim::default()
    };
    debug!(name = %storage.name, "built a PersistentVolumeClaim");
    DynamicObject::from_typed(&core_gvk(PVC_KIND), &pvc)
}

fn meta_for(name: &str, storage: &IrStorage) -> rekube_core::ObjectMeta {
    rekube_core::ObjectMeta {
        name: Some(name.to_string()),
        annotations: if storage.annotations.is_empty() {
            None
        } else {
            Some(storage.annotations.clone())
        },
        ..rekube_core::ObjectMeta::default()
    }
}

fn config_map_to_secret(obj: &DynamicObject) -> Result<DynamicObject> {
    let cm: corev1::ConfigMap = obj.try_parse()?;
    let data: BTreeMap<String, ByteString> = cm
        .data
        .unwrap_or_default()
        .into_iter()
        .map(|(k, v)| (k, ByteString(v.into_bytes())))
        .collect();
    let secret = corev1::Secret {
        metadata: cm.metadata,
        type_: Some(SECRET_TYPE_OPAQUE.to_string()),
        data: if data.is_empty() { None } else { Some(data) },
        ..corev1::Secret::default()
    };
    DynamicObject::from_typed(&core_gvk(SECRET_KIND), &secret)
}

fn secret_to_config_map(obj: &DynamicObject) -> Result<DynamicObject> {
    let secret: corev1::Secret = obj.try_parse()?;
    let data: BTreeMap<String, String> = secret
        .data
        .unwrap_or_default()
        .into_iter()
        .map(|(k, v)| (k, String::from_utf8_lossy(&v.0).into_owned()))
        .collect();
    let cm = corev1::ConfigMap {
        metadata: secret.metadata,
        data: if data.is_empty() { None } else { Some(data) },
        ..corev1::ConfigMap::default()
    };
    DynamicObject::from_typed(&core_gvk(CONFIG_MAP_KIND), &cm)
}

/// Apply the capability-driven volume policy to a pod spec
///
/// Mounts with no backing volume are dropped first; every remaining
/// volume is then substituted according to what the cluster supports.
pub(crate) fn convert_volumes_by_policy(
    mut pod_spec: corev1::PodSpec,
    cluster: &ClusterMetadataSpec,
) -> corev1::PodSpec {
    let volumes = match pod_spec.volumes.take() {
        Some(v) if !v.is_empty() => v,
        _ => return pod_spec,
    };
    for container in &mut pod_spec.containers {
        if let Some(mounts) = container.volume_mounts.take() {
            let kept: Vec<corev1::VolumeMount> = mounts
                .into_iter()
                .filter(|vm| {
                    let backed = volumes.iter().any(|v| v.name == vm.name);
                    if !backed {
                        warn!(mount = %vm.name, "no backing volume for mount; dropping it");
                    }
                    backed
                })
                .collect();
            if !kept.is_empty() {
                container.volume_mounts = Some(kept);
            }
        }
    }
    pod_spec.volumes = Some(
        volumes
            .into_iter()
            .map(|v| convert_volume_by_supported_kind(v, cluster))
            .collect(),
    );
    pod_spec
}

fn convert_volume_by_supported_kind(
    volume: corev1::Volume,
    cluster: &ClusterMetadataSpec,
) -> corev1::Volume {
    if let Some(cm) = &volume.config_map {
        if !cluster.supports_kind(CONFIG_MAP_KIND) && cluster.supports_kind(SECRET_KIND) {
            return corev1::Volume {
                name: volume.name.clone(),
                secret: Some(corev1::SecretVolumeSource {
                    secret_name: Some(cm.name.clone()),
                    items: cm.items.clone(),
                    default_mode: cm.default_mode,
                    ..corev1::SecretVolumeSource::default()
                }),
                ..corev1::Volume::default()
            };
        }
        return volume;
    }
    if let Some(sec) = &volume.secret {
        if !cluster.supports_kind(SECRET_KIND) && cluster.supports_kind(CONFIG_MAP_KIND) {
            return corev1::Volume {
                name: volume.name.clone(),
                config_map: Some(corev1::ConfigMapVolumeSource {
                    name: sec.secret_name.clone().unwrap_or_default(),
                    items: sec.items.clone(),
                    default_mode: sec.default_mode,
                    ..corev1::ConfigMapVolumeSource::default()
                }),
                ..corev1::Volume::default()
            };
        }
        return volume;
    }
    if volume.persistent_volume_claim.is_some() {
        if !cluster.supports_kind(PVC_KIND) {
            warn!(volume = %volume.name, "claims unsupported; degrading the volume to emptyDir");
            return corev1::Volume {
                name: volume.name,
                empty_dir: Some(corev1::EmptyDirVolumeSource::default()),
                ..corev1::Volume::default()
            };
        }
        return volume;
    }
    volume
}

/// Lowercase a name and squash characters object names cannot carry
fn compliant_name(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '.' {
                c
            } else {
                '-'
            }
        })
        .collect::<String>()
        .trim_matches('-')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rekube_core::ClusterMetadata;
    use serde_json::json;

    fn content(pairs: &[(&str, &str)]) -> BTreeMap<String, ByteString> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), ByteString(v.as_bytes().to_vec())))
            .collect()
    }

    #[test]
    fn config_map_degrades_to_secret_when_unsupported() {
        let mut ir = EnhancedIr::new("app");
        ir.storages.push(IrStorage {
            name: "App_Config".to_string(),
            storage_type: StorageType::ConfigMap,
            content: content(&[("app.conf", "debug = true")]),
            ..IrStorage::default()
        });
        let cluster = ClusterMetadata::kubernetes().spec;
        let mut diags = Vec::new();
        let objs = StorageResource.create_objects(
            &ir,
            &["Secret".to_string()],
            &cluster,
            &mut diags,
        );
        assert_eq!(objs[0].kind(), "Secret");
        assert_eq!(objs[0].name(), "app-config");
        assert!(matches!(diags[0], Diagnostic::KindDegraded { .. }));
    }

    #[test]
    fn secret_and_config_map_round_trip_content() {
        let storage = IrStorage {
            name: "creds".to_string(),
            storage_type: StorageType::Secret,
            content: content(&[("user", "admin")]),
            ..IrStorage::default()
        };
        let secret = create_secret(&storage).unwrap();
        let cm = secret_to_config_map(&secret).unwrap();
        assert_eq!(cm.body_path(&["data", "user"]), Some(&json!("admin")));
        let back = config_map_to_secret(&cm).unwrap();
        assert_eq!(back.kind(), "Secret");
    }

    #[test]
    fn pull_secrets_carry_the_docker_config_type() {
        let storage = IrStorage {
            name: "registry".to_string(),
            storage_type: StorageType::PullSecret,
            ..IrStorage::default()
        };
        let secret = create_secret(&storage).unwrap();
        assert_eq!(
            secret.body_path(&["type"]),
            Some(&json!("kubernetes.io/dockerconfigjson"))
        );
    }

    #[test]
    fn claim_volumes_degrade_to_empty_dir() {
        let mut cluster = ClusterMetadata::kubernetes().spec;
        cluster.api_kind_version_map.remove("PersistentVolumeClaim");
        let pod_spec = corev1::PodSpec {
            containers: vec![corev1::Container {
                name: "web".to_string(),
                volume_mounts: Some(vec![corev1::VolumeMount {
                    name: "data".to_string(),
                    mount_path: "/data".to_string(),
                    ..corev1::VolumeMount::default()
                }]),
                ..corev1::Container::default()
            }],
            volumes: Some(vec![corev1::Volume {
                name: "data".to_string(),
                persistent_volume_claim: Some(corev1::PersistentVolumeClaimVolumeSource {
                    claim_name: "data".to_string(),
                    ..corev1::PersistentVolumeClaimVolumeSource::default()
                }),
                ..corev1::Volume::default()
            }]),
            ..corev1::PodSpec::default()
        };
        let converted = convert_volumes_by_policy(pod_spec, &cluster);
        let volumes = converted.volumes.unwrap();
        assert!(volumes[0].empty_dir.is_some());
        assert!(volumes[0].persistent_volume_claim.is_none());
    }

    #[test]
    fn volume_sources_swap_with_their_kinds() {
        let volume_named = |name: &str, source: corev1::Volume| corev1::Volume {
            name: name.to_string(),
            ..source
        };
        let spec_with = |volume: corev1::Volume| corev1::PodSpec {
            containers: vec![corev1::Container {
                name: "web".to_string(),
                volume_mounts: Some(vec![corev1::VolumeMount {
                    name: volume.name.clone(),
                    mount_path: "/etc/app".to_string(),
                    ..corev1::VolumeMount::default()
                }]),
                ..corev1::Container::default()
            }],
            volumes: Some(vec![volume]),
            ..corev1::PodSpec::default()
        };

        let mut secrets_only = ClusterMetadata::kubernetes().spec;
        secrets_only.api_kind_version_map.remove("ConfigMap");
        let spec = spec_with(volume_named(
            "settings",
            corev1::Volume {
                config_map: Some(corev1::ConfigMapVolumeSource {
                    name: "app-settings".to_string(),
                    ..corev1::ConfigMapVolumeSource::default()
                }),
                ..corev1::Volume::default()
            },
        ));
        let converted = convert_volumes_by_policy(spec, &secrets_only);
        let volume = &converted.volumes.unwrap()[0];
        assert_eq!(volume.name, "settings");
        assert!(volume.config_map.is_none());
        let secret = volume.secret.as_ref().unwrap();
        assert_eq!(secret.secret_name.as_deref(), Some("app-settings"));

        let mut config_maps_only = ClusterMetadata::kubernetes().spec;
        config_maps_only.api_kind_version_map.remove("Secret");
        let spec = spec_with(volume_named(
            "creds",
            corev1::Volume {
                secret: Some(corev1::SecretVolumeSource {
                    secret_name: Some("db-creds".to_string()),
                    ..corev1::SecretVolumeSource::default()
                }),
                ..corev1::Volume::default()
            },
        ));
        let converted = convert_volumes_by_policy(spec, &config_maps_only);
        let volume = &converted.volumes.unwrap()[0];
        assert_eq!(volume.name, "creds");
        assert!(volume.secret.is_none());
        assert_eq!(volume.config_map.as_ref().unwrap().name, "db-creds");
    }

    #[test]
    fn unbacked_mounts_are_pruned() {
        let cluster = ClusterMetadata::kubernetes().spec;
        let pod_spec = corev1::PodSpec {
            containers: vec![corev1::Container {
                name: "web".to_string(),
                volume_mounts: Some(vec![corev1::VolumeMount {
                    name: "ghost".to_string(),
                    mount_path: "/ghost".to_string(),
                    ..corev1::VolumeMount::default()
                }]),
                ..corev1::Container::default()
            }],
            volumes: Some(vec![corev1::Volume {
                name: "data".to_string(),
                empty_dir: Some(corev1::EmptyDirVolumeSource::default()),
                ..corev1::Volume::default()
            }]),
            ..corev1::PodSpec::default()
        };
        let converted = convert_volumes_by_policy(pod_spec, &cluster);
        assert!(converted.containers[0].volume_mounts.is_none());
    }
}
