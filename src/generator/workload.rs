//! Deployment and service objects for a single [`Component`].

use super::shared::{SecretKey, claim_name, config_map_name, secret_name};
use super::topology::{Component, EnvSubset};
use super::{object_meta, selector_labels};
use crate::config::types::{AccessMode, ChartSettings, DatabaseEngine};
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec, DeploymentStrategy};
use k8s_openapi::api::core::v1::{
    ConfigMapEnvSource, ConfigMapVolumeSource, Container, ContainerPort, EnvFromSource, EnvVar,
    EnvVarSource, PersistentVolumeClaimVolumeSource, PodSpec, PodTemplateSpec, SecretKeySelector,
    Service, ServicePort, ServiceSpec, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use log::trace;

/// Directory the official database images run init scripts from.
pub const INIT_SCRIPTS_PATH: &str = "/docker-entrypoint-initdb.d";
const INIT_SCRIPTS_VOLUME: &str = "init-scripts";

pub fn literal_env(name: &str, value: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.to_string()),
        ..EnvVar::default()
    }
}

pub fn secret_env(name: &str, secret: &str, key: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value_from: Some(EnvVarSource {
            secret_key_ref: Some(SecretKeySelector {
                name: secret.to_string(),
                key: key.to_string(),
                ..SecretKeySelector::default()
            }),
            ..EnvVarSource::default()
        }),
        ..EnvVar::default()
    }
}

/// Full environment of a component: its own variables, then one block per
/// database binding, then the requested subsets.
pub fn container_env(component: &Component, settings: &ChartSettings) -> Vec<EnvVar> {
    let secrets = secret_name(settings);
    let mut env = component.env.clone();

    for binding in &component.databases {
        let family = match binding.engine {
            DatabaseEngine::MySql => &settings.mysql,
            DatabaseEngine::Postgres => &settings.postgres,
        };
        // Keys are checked against the fixed set before this point.
        let Some(connection) = family.connections.get(binding.key) else {
            continue;
        };
        let names = binding.names;
        env.extend([
            literal_env(names.host, &connection.host),
            literal_env(names.port, &connection.port.to_string()),
            literal_env(names.name, &connection.database),
            literal_env(names.user, &connection.username),
            secret_env(
                names.password,
                &secrets,
                &SecretKey::DatabasePassword(binding.engine, binding.key.to_string()).to_string(),
            ),
        ]);
    }

    for subset in &component.subsets {
        match subset {
            EnvSubset::Smtp => {
                if let Some(auth) = &settings.smtp.auth {
                    env.push(literal_env("SMTP_USERNAME", &auth.username));
                    env.push(secret_env(
                        "SMTP_PASSWORD",
                        &secrets,
                        &SecretKey::SmtpPassword.to_string(),
                    ));
                }
            }
            EnvSubset::Vip => env.push(secret_env(
                "VIP_CLIENT_SECRET",
                &secrets,
                &SecretKey::VipClientSecret.to_string(),
            )),
            EnvSubset::Identity => {
                env.push(literal_env("IDP_ADMIN_USER", &settings.identity.admin_user));
                env.push(secret_env(
                    "IDP_ADMIN_PASSWORD",
                    &secrets,
                    &SecretKey::IdentityAdminPassword.to_string(),
                ));
            }
        }
    }

    env
}

fn volume_mounts(component: &Component) -> Vec<VolumeMount> {
    let mut mounts = component
        .mounts
        .iter()
        .map(|mount| VolumeMount {
            name: mount.volume.to_string(),
            mount_path: mount.path.to_string(),
            ..VolumeMount::default()
        })
        .collect::<Vec<_>>();
    if component.init_scripts.is_some() {
        mounts.push(VolumeMount {
            name: INIT_SCRIPTS_VOLUME.to_string(),
            mount_path: INIT_SCRIPTS_PATH.to_string(),
            read_only: Some(true),
            ..VolumeMount::default()
        });
    }
    mounts
}

/// `Recreate` when a mounted claim cannot be attached to two pods at once.
fn needs_recreate(component: &Component, settings: &ChartSettings) -> bool {
    component.mounts.iter().any(|mount| {
        settings
            .volumes
            .get(mount.volume)
            .is_some_and(|claim| claim.access_mode == AccessMode::ReadWriteOnce)
    })
}

pub fn deployment(component: &Component, settings: &ChartSettings) -> Deployment {
    trace!("building deployment for {}", component.name);
    let selector = selector_labels(settings, component.name);

    let container = Container {
        name: component.name.to_string(),
        image: Some(component.image.clone()),
        args: (!component.args.is_empty()).then(|| component.args.clone()),
        ports: Some(vec![ContainerPort {
            container_port: component.port,
            name: Some("main".to_string()),
            protocol: Some("TCP".to_string()),
            ..ContainerPort::default()
        }]),
        env_from: Some(vec![EnvFromSource {
            config_map_ref: Some(ConfigMapEnvSource {
                name: config_map_name(settings),
                ..ConfigMapEnvSource::default()
            }),
            ..EnvFromSource::default()
        }]),
        env: Some(container_env(component, settings)).filter(|env| !env.is_empty()),
        volume_mounts: Some(volume_mounts(component)).filter(|mounts| !mounts.is_empty()),
        ..Container::default()
    };

    let mut volumes = component
        .mounts
        .iter()
        .map(|mount| Volume {
            name: mount.volume.to_string(),
            persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                claim_name: claim_name(mount.volume),
                ..PersistentVolumeClaimVolumeSource::default()
            }),
            ..Volume::default()
        })
        .collect::<Vec<_>>();
    if let Some(config_map) = &component.init_scripts {
        volumes.push(Volume {
            name: INIT_SCRIPTS_VOLUME.to_string(),
            config_map: Some(ConfigMapVolumeSource {
                name: config_map.clone(),
                ..ConfigMapVolumeSource::default()
            }),
            ..Volume::default()
        });
    }

    Deployment {
        metadata: object_meta(settings, component.name, Some(component.name)),
        spec: Some(DeploymentSpec {
            replicas: Some(1),
            selector: LabelSelector {
                match_labels: Some(selector),
                ..LabelSelector::default()
            },
            strategy: needs_recreate(component, settings).then(|| DeploymentStrategy {
                type_: Some("Recreate".to_string()),
                ..DeploymentStrategy::default()
            }),
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(super::component_labels(settings, component.name)),
                    ..ObjectMeta::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![container],
                    volumes: Some(volumes).filter(|v| !v.is_empty()),
                    ..PodSpec::default()
                }),
            },
            ..DeploymentSpec::default()
        }),
        ..Deployment::default()
    }
}

pub fn service(component: &Component, settings: &ChartSettings) -> Service {
    Service {
        metadata: object_meta(settings, component.name, Some(component.name)),
        spec: Some(ServiceSpec {
            type_: Some("ClusterIP".to_string()),
            selector: Some(selector_labels(settings, component.name)),
            ports: Some(vec![ServicePort {
                name: Some("main".to_string()),
                port: component.port,
                target_port: Some(IntOrString::Int(component.port)),
                protocol: Some("TCP".to_string()),
                ..ServicePort::default()
            }]),
            ..ServiceSpec::default()
        }),
        ..Service::default()
    }
}
