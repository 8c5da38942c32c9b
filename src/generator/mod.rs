//! Assembly of the platform's Kubernetes objects.
//!
//! [`build_chart`] is the single entry point: it validates the raw
//! configuration, layers the defaults, creates the shared resources and
//! then one deployment + service pair per component, in a fixed order.

pub mod render;
pub mod shared;
pub mod topology;
pub mod workload;

use crate::config::merge::apply_defaults;
use crate::config::types::{ChartProps, ChartSettings};
use crate::config::validate::validate_props;
use crate::error::Result;
use k8s_openapi::Resource;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, PersistentVolumeClaim, Secret, Service};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use log::{debug, info};
use serde::Serialize;
use std::collections::BTreeMap;

pub const MANAGED_BY: &str = "imaging-chart";

/// One generated Kubernetes object.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Manifest {
    Namespace(Namespace),
    ConfigMap(ConfigMap),
    Secret(Secret),
    PersistentVolumeClaim(PersistentVolumeClaim),
    Deployment(Deployment),
    Service(Service),
}

impl Manifest {
    pub fn kind(&self) -> &'static str {
        match self {
            Manifest::Namespace(_) => Namespace::KIND,
            Manifest::ConfigMap(_) => ConfigMap::KIND,
            Manifest::Secret(_) => Secret::KIND,
            Manifest::PersistentVolumeClaim(_) => PersistentVolumeClaim::KIND,
            Manifest::Deployment(_) => Deployment::KIND,
            Manifest::Service(_) => Service::KIND,
        }
    }

    pub fn metadata(&self) -> &ObjectMeta {
        match self {
            Manifest::Namespace(o) => &o.metadata,
            Manifest::ConfigMap(o) => &o.metadata,
            Manifest::Secret(o) => &o.metadata,
            Manifest::PersistentVolumeClaim(o) => &o.metadata,
            Manifest::Deployment(o) => &o.metadata,
            Manifest::Service(o) => &o.metadata,
        }
    }

    pub fn name(&self) -> &str {
        self.metadata().name.as_deref().unwrap_or_default()
    }
}

/// The complete, ordered set of objects for one platform instance.
#[derive(Debug, Clone, PartialEq)]
pub struct Chart {
    namespace: String,
    manifests: Vec<Manifest>,
}

impl Chart {
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn manifests(&self) -> &[Manifest] {
        &self.manifests
    }

    /// Find an object by kind and name.
    pub fn find(&self, kind: &str, name: &str) -> Option<&Manifest> {
        self.manifests
            .iter()
            .find(|m| m.kind() == kind && m.name() == name)
    }

    pub fn deployments(&self) -> impl Iterator<Item = &Deployment> {
        self.manifests.iter().filter_map(|m| match m {
            Manifest::Deployment(d) => Some(d),
            _ => None,
        })
    }

    /// The shared config map, emitted before any init script map.
    pub fn config_map(&self) -> Option<&ConfigMap> {
        self.manifests.iter().find_map(|m| match m {
            Manifest::ConfigMap(c) => Some(c),
            _ => None,
        })
    }

    pub fn secret(&self) -> Option<&Secret> {
        self.manifests.iter().find_map(|m| match m {
            Manifest::Secret(s) => Some(s),
            _ => None,
        })
    }
}

/// Validate `props`, apply defaults and assemble every object.
///
/// Nothing is built when validation fails.
pub fn build_chart(props: ChartProps) -> Result<Chart> {
    validate_props(&props)?;
    let settings = apply_defaults(props)?;
    Ok(assemble(&settings))
}

/// Build the chart from already resolved settings.
pub fn assemble(settings: &ChartSettings) -> Chart {
    let components = topology::components(settings);
    let mut manifests = Vec::new();

    if settings.create_namespace {
        manifests.push(Manifest::Namespace(shared::namespace(settings)));
    }
    manifests.push(Manifest::ConfigMap(shared::config_map(settings)));
    manifests.push(Manifest::Secret(shared::secret(settings)));
    manifests.extend(
        shared::init_config_maps(settings)
            .into_iter()
            .map(Manifest::ConfigMap),
    );
    manifests.extend(
        shared::volume_claims(settings, &components)
            .into_iter()
            .map(Manifest::PersistentVolumeClaim),
    );

    for component in &components {
        debug!("adding {} ({})", component.name, component.role);
        manifests.push(Manifest::Deployment(workload::deployment(component, settings)));
        manifests.push(Manifest::Service(workload::service(component, settings)));
    }

    info!(
        "Generated {} objects for {} components in namespace {}",
        manifests.len(),
        components.len(),
        settings.namespace
    );

    Chart {
        namespace: settings.namespace.clone(),
        manifests,
    }
}

/// Labels carried by every object of the instance.
pub fn common_labels(settings: &ChartSettings) -> BTreeMap<String, String> {
    BTreeMap::from([
        (
            "app.kubernetes.io/part-of".to_string(),
            settings.instance_name.clone(),
        ),
        (
            "app.kubernetes.io/managed-by".to_string(),
            MANAGED_BY.to_string(),
        ),
    ])
}

pub fn component_labels(settings: &ChartSettings, component: &str) -> BTreeMap<String, String> {
    let mut labels = common_labels(settings);
    labels.insert("app.kubernetes.io/name".to_string(), component.to_string());
    labels
}

/// Subset of [`component_labels`] used by selectors.
pub fn selector_labels(settings: &ChartSettings, component: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("app.kubernetes.io/name".to_string(), component.to_string()),
        (
            "app.kubernetes.io/part-of".to_string(),
            settings.instance_name.clone(),
        ),
    ])
}

/// Metadata for a namespaced object.
pub fn object_meta(settings: &ChartSettings, name: &str, component: Option<&str>) -> ObjectMeta {
    let labels = match component {
        Some(component) => component_labels(settings, component),
        None => common_labels(settings),
    };
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(settings.namespace.clone()),
        labels: Some(labels),
        ..ObjectMeta::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::defaults::MYSQL_DATABASES;
    use crate::config::types::{DatabaseProps, VolumeClaimProps};
    use crate::error::{ChartError, ConfigError};
    use k8s_openapi::api::core::v1::EnvVar;

    fn base_props() -> ChartProps {
        ChartProps {
            url: "https://x.test/".to_string(),
            viewer_url: "https://y.test/".to_string(),
            admin_email: "admin@x.test".to_string(),
            identity_admin_password: "secret".to_string(),
            ..Default::default()
        }
    }

    fn env_of<'a>(chart: &'a Chart, deployment: &str) -> &'a [EnvVar] {
        let Some(Manifest::Deployment(d)) = chart.find("Deployment", deployment) else {
            panic!("no deployment {deployment}");
        };
        d.spec.as_ref().unwrap().template.spec.as_ref().unwrap().containers[0]
            .env
            .as_deref()
            .unwrap_or_default()
    }

    fn env_value<'a>(env: &'a [EnvVar], name: &str) -> Option<&'a str> {
        env.iter()
            .find(|e| e.name == name)
            .and_then(|e| e.value.as_deref())
    }

    #[test]
    fn test_shared_resources_come_first() {
        let chart = build_chart(base_props()).unwrap();
        let kinds: Vec<_> = chart.manifests().iter().map(Manifest::kind).collect();
        assert_eq!(&kinds[..3], &["Namespace", "ConfigMap", "Secret"]);

        // init scripts of the internal postgres and mysql instances
        assert_eq!(&kinds[3..5], &["ConfigMap", "ConfigMap"]);
        let first_deployment = kinds.iter().position(|k| *k == "Deployment").unwrap();
        assert!(kinds[5..first_deployment]
            .iter()
            .all(|k| *k == "PersistentVolumeClaim"));
        assert_eq!(chart.deployments().count(), 14);
        assert_eq!(chart.namespace(), "imaging");
    }

    #[test]
    fn test_namespace_can_be_skipped() {
        let mut props = base_props();
        props.create_namespace = Some(false);
        props.namespace = Some("pacs-prod".to_string());
        let chart = build_chart(props).unwrap();
        assert!(chart.manifests().iter().all(|m| m.kind() != "Namespace"));
        assert!(chart
            .manifests()
            .iter()
            .all(|m| m.metadata().namespace.as_deref() == Some("pacs-prod")));
    }

    #[test]
    fn test_missing_key_aborts_generation() {
        let mut props = base_props();
        props.volumes = Some(
            [(
                "logs".to_string(),
                VolumeClaimProps {
                    size: "1Gi".to_string(),
                    storage_class: None,
                    access_mode: None,
                },
            )]
            .into_iter()
            .collect(),
        );
        let err = build_chart(props).unwrap_err();
        assert!(matches!(
            err,
            ChartError::Config(ConfigError::MissingKeys { .. })
        ));
    }

    #[test]
    fn test_internal_mysql_is_deployed_and_routed() {
        let chart = build_chart(base_props()).unwrap();
        assert!(chart.find("Deployment", "mysql").is_some());
        assert!(chart.find("Service", "mysql").is_some());
        assert_eq!(env_value(env_of(&chart, "studies"), "DB_HOST"), Some("mysql"));
    }

    #[test]
    fn test_external_mysql_is_omitted_and_routed() {
        let mut props = base_props();
        let mut databases: BTreeMap<_, _> = MYSQL_DATABASES
            .iter()
            .map(|key| {
                let db = DatabaseProps {
                    host: "mysql.x.test".to_string(),
                    port: None,
                    database: None,
                    username: "app".to_string(),
                    password: "pw".to_string(),
                };
                (key.to_string(), db)
            })
            .collect();
        databases.insert(
            "legacy".to_string(),
            DatabaseProps {
                host: "old.x.test".to_string(),
                port: None,
                database: None,
                username: "x".to_string(),
                password: "x".to_string(),
            },
        );
        props.mysql_databases = Some(databases);

        let chart = build_chart(props).unwrap();
        assert!(chart.find("Deployment", "mysql").is_none());
        assert!(chart.find("Service", "mysql").is_none());
        assert!(chart.find("PersistentVolumeClaim", "mysql-data").is_none());
        assert_eq!(
            env_value(env_of(&chart, "studies"), "DB_HOST"),
            Some("mysql.x.test")
        );

        let secret = chart.secret().unwrap().string_data.as_ref().unwrap();
        assert!(!secret.keys().any(|k| k.contains("legacy")));
    }

    #[test]
    fn test_external_identity_provider() {
        let mut props = base_props();
        props.external_identity_url = Some("https://sso.x.test/auth".to_string());
        let chart = build_chart(props).unwrap();
        assert!(chart.find("Deployment", "keycloak").is_none());
        let data = chart.config_map().unwrap().data.as_ref().unwrap();
        assert_eq!(data["IDP_URL"], "https://sso.x.test/auth");
        // postgres still hosts the pacs database
        assert!(chart.find("Deployment", "postgres").is_some());
    }

    #[test]
    fn test_internal_instances_get_every_database_of_their_family() {
        let chart = build_chart(base_props()).unwrap();
        let Some(Manifest::ConfigMap(init)) = chart.find("ConfigMap", "imaging-mysql-init") else {
            panic!("no mysql init scripts");
        };
        let script = &init.data.as_ref().unwrap()[shared::INIT_SCRIPT_KEY];
        let env = env_of(&chart, "mysql");
        for key in MYSQL_DATABASES {
            assert!(script.contains(&format!("CREATE DATABASE IF NOT EXISTS \\`{key}\\`")));
            let var = shared::init_password_var(key);
            assert!(env.iter().any(|e| e.name == var), "{var}");
        }
        assert!(chart.find("ConfigMap", "imaging-postgres-init").is_some());
    }

    #[test]
    fn test_generation_is_deterministic() {
        let a = build_chart(base_props()).unwrap();
        let b = build_chart(base_props()).unwrap();
        assert_eq!(a, b);
    }
}
