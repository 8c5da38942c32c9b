//! Resources shared by every component: the namespace, the config map
//! imported in bulk by each container, the secret holding every password,
//! the init scripts of internal database instances and the persistent
//! volume claims.

use super::object_meta;
use super::topology::{Component, RABBITMQ_PORT, SOLR_PORT};
use crate::config::types::{ChartSettings, DatabaseEngine, DatabaseFamily};
use k8s_openapi::api::core::v1::{
    ConfigMap, Namespace, PersistentVolumeClaim, PersistentVolumeClaimSpec, Secret,
    VolumeResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use log::debug;
use std::collections::BTreeMap;
use std::fmt;

/// Keys of the shared secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretKey {
    RootPassword(DatabaseEngine),
    DatabasePassword(DatabaseEngine, String),
    IdentityAdminPassword,
    VipClientSecret,
    SmtpPassword,
}

impl fmt::Display for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecretKey::RootPassword(engine) => f.write_str(&engine.root_password_key()),
            SecretKey::DatabasePassword(engine, key) => f.write_str(&engine.password_key(key)),
            SecretKey::IdentityAdminPassword => f.write_str("identity-admin-password"),
            SecretKey::VipClientSecret => f.write_str("vip-client-secret"),
            SecretKey::SmtpPassword => f.write_str("smtp-password"),
        }
    }
}

pub fn config_map_name(settings: &ChartSettings) -> String {
    format!("{}-config", settings.instance_name)
}

pub fn secret_name(settings: &ChartSettings) -> String {
    format!("{}-secrets", settings.instance_name)
}

pub fn claim_name(volume: &str) -> String {
    format!("{volume}-data")
}

pub fn init_config_map_name(settings: &ChartSettings, engine: DatabaseEngine) -> String {
    format!("{}-{}-init", settings.instance_name, engine.name())
}

/// Key of the init script inside its config map.
pub const INIT_SCRIPT_KEY: &str = "init-databases.sh";

/// Variable carrying the password of database `key` into the init script,
/// e.g. `DB_PASSWORD_NIFTI_CONVERSION`.
pub fn init_password_var(key: &str) -> String {
    format!("DB_PASSWORD_{}", key.to_uppercase().replace('-', "_"))
}

/// Shell script creating every database and user of an internal instance.
/// Passwords are read from [`init_password_var`] variables.
pub fn init_script(family: &DatabaseFamily) -> String {
    let mut script = String::from("#!/bin/bash\nset -e\n");
    match family.engine {
        DatabaseEngine::MySql => {
            script.push_str("mysql -uroot -p\"$MYSQL_ROOT_PASSWORD\" <<EOSQL\n");
            for (key, conn) in &family.connections {
                let var = init_password_var(key);
                script.push_str(&format!(
                    "CREATE DATABASE IF NOT EXISTS \\`{db}\\`;\n\
                     CREATE USER IF NOT EXISTS '{user}'@'%' IDENTIFIED BY '${{{var}}}';\n\
                     GRANT ALL PRIVILEGES ON \\`{db}\\`.* TO '{user}'@'%';\n",
                    db = conn.database,
                    user = conn.username,
                ));
            }
            script.push_str("FLUSH PRIVILEGES;\n");
        }
        DatabaseEngine::Postgres => {
            script.push_str("psql -v ON_ERROR_STOP=1 --username postgres <<EOSQL\n");
            for (key, conn) in &family.connections {
                let var = init_password_var(key);
                script.push_str(&format!(
                    "CREATE USER \"{user}\" WITH PASSWORD '${{{var}}}';\n\
                     CREATE DATABASE \"{db}\" OWNER \"{user}\";\n",
                    db = conn.database,
                    user = conn.username,
                ));
            }
        }
    }
    script.push_str("EOSQL\n");
    script
}

/// One init script config map per internal database instance, mounted at
/// `/docker-entrypoint-initdb.d` by the instance's deployment.
pub fn init_config_maps(settings: &ChartSettings) -> Vec<ConfigMap> {
    [&settings.postgres, &settings.mysql]
        .into_iter()
        .filter(|family| !family.external)
        .map(|family| ConfigMap {
            metadata: object_meta(
                settings,
                &init_config_map_name(settings, family.engine),
                Some(family.engine.name()),
            ),
            data: Some(BTreeMap::from([(
                INIT_SCRIPT_KEY.to_string(),
                init_script(family),
            )])),
            ..ConfigMap::default()
        })
        .collect()
}

pub fn namespace(settings: &ChartSettings) -> Namespace {
    Namespace {
        metadata: ObjectMeta {
            name: Some(settings.namespace.clone()),
            labels: Some(super::common_labels(settings)),
            ..ObjectMeta::default()
        },
        ..Namespace::default()
    }
}

/// Plain settings every component imports through `envFrom`.
pub fn config_map_data(settings: &ChartSettings) -> BTreeMap<String, String> {
    let smtp = &settings.smtp;
    [
        ("URL_SCHEME", settings.url.scheme.clone()),
        ("URL_HOST", settings.url.host.clone()),
        ("VIEWER_URL_SCHEME", settings.viewer_url.scheme.clone()),
        ("VIEWER_URL_HOST", settings.viewer_url.host.clone()),
        ("ADMIN_EMAIL", settings.admin_email.clone()),
        ("ADMIN_NAME", settings.admin_name.clone()),
        ("INSTANCE_NAME", settings.instance_name.clone()),
        ("ALLOWED_ADMIN_IPS", settings.allowed_admin_ips.clone()),
        ("SMTP_HOST", smtp.host.clone()),
        ("SMTP_PORT", smtp.port.to_string()),
        ("SMTP_AUTH", smtp.auth.is_some().to_string()),
        ("SMTP_STARTTLS_ENABLE", smtp.starttls.enabled().to_string()),
        ("SMTP_STARTTLS_REQUIRED", smtp.starttls.required().to_string()),
        ("VIP_URL_SCHEME", settings.vip.url.scheme.clone()),
        ("VIP_URL_HOST", settings.vip.url.host.clone()),
        ("VIP_CLIENT_ID", settings.vip.client_id.clone()),
        ("IDP_URL", settings.identity.url.clone()),
        ("IDP_REALM", settings.identity.realm.clone()),
        ("RABBITMQ_HOST", "rabbitmq".to_string()),
        ("RABBITMQ_PORT", RABBITMQ_PORT.to_string()),
        ("SOLR_URL", format!("http://solr:{SOLR_PORT}/solr")),
    ]
    .into_iter()
    .map(|(key, value)| (key.to_string(), value))
    .collect()
}

pub fn config_map(settings: &ChartSettings) -> ConfigMap {
    ConfigMap {
        metadata: object_meta(settings, &config_map_name(settings), None),
        data: Some(config_map_data(settings)),
        ..ConfigMap::default()
    }
}

/// One entry per database password, plus the identity, VIP and SMTP
/// credentials.
pub fn secret_data(settings: &ChartSettings) -> BTreeMap<String, String> {
    let mut data = BTreeMap::new();

    for family in [&settings.mysql, &settings.postgres] {
        add_database_passwords(&mut data, family);
    }

    data.insert(
        SecretKey::IdentityAdminPassword.to_string(),
        settings.identity.admin_password.clone(),
    );
    data.insert(
        SecretKey::VipClientSecret.to_string(),
        settings.vip.client_secret.clone(),
    );
    if let Some(auth) = &settings.smtp.auth {
        data.insert(SecretKey::SmtpPassword.to_string(), auth.password.clone());
    }

    data
}

fn add_database_passwords(data: &mut BTreeMap<String, String>, family: &DatabaseFamily) {
    if !family.external {
        data.insert(
            SecretKey::RootPassword(family.engine).to_string(),
            family.root_password.clone(),
        );
    }
    for (key, connection) in &family.connections {
        data.insert(
            SecretKey::DatabasePassword(family.engine, key.clone()).to_string(),
            connection.password.clone(),
        );
    }
}

pub fn secret(settings: &ChartSettings) -> Secret {
    Secret {
        metadata: object_meta(settings, &secret_name(settings), None),
        type_: Some("Opaque".to_string()),
        string_data: Some(secret_data(settings)),
        ..Secret::default()
    }
}

/// Claims for every volume mounted by at least one of `components`.
pub fn volume_claims(settings: &ChartSettings, components: &[Component]) -> Vec<PersistentVolumeClaim> {
    settings
        .volumes
        .iter()
        .filter(|(volume, _)| {
            let used = components
                .iter()
                .any(|c| c.mounts.iter().any(|m| m.volume == volume.as_str()));
            if !used {
                debug!("volume '{volume}' has no consumer, skipping its claim");
            }
            used
        })
        .map(|(volume, claim)| PersistentVolumeClaim {
            metadata: object_meta(settings, &claim_name(volume), None),
            spec: Some(PersistentVolumeClaimSpec {
                access_modes: Some(vec![claim.access_mode.as_str().to_string()]),
                storage_class_name: claim.storage_class.clone(),
                resources: Some(VolumeResourceRequirements {
                    requests: Some(BTreeMap::from([(
                        "storage".to_string(),
                        Quantity(claim.size.clone()),
                    )])),
                    ..VolumeResourceRequirements::default()
                }),
                ..PersistentVolumeClaimSpec::default()
            }),
            ..PersistentVolumeClaim::default()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::merge::apply_defaults;
    use crate::config::types::{ChartProps, SmtpAuthProps, SmtpProps};
    use crate::generator::topology::components;

    fn base_props() -> ChartProps {
        ChartProps {
            url: "https://x.test/".to_string(),
            viewer_url: "https://y.test/".to_string(),
            admin_email: "admin@x.test".to_string(),
            identity_admin_password: "secret".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_config_map_url_parts() {
        let data = config_map_data(&apply_defaults(base_props()).unwrap());
        assert_eq!(data["URL_SCHEME"], "https");
        assert_eq!(data["URL_HOST"], "x.test");
        assert_eq!(data["VIEWER_URL_SCHEME"], "https");
        assert_eq!(data["VIEWER_URL_HOST"], "y.test");
        assert_eq!(data["IDP_URL"], "http://keycloak:8080");
        assert_eq!(data["SMTP_AUTH"], "false");
    }

    #[test]
    fn test_secret_has_one_entry_per_database() {
        let data = secret_data(&apply_defaults(base_props()).unwrap());
        for key in ["users", "studies", "import", "datasets", "preclinical"] {
            assert!(data.contains_key(&format!("mysql-{key}-password")), "{key}");
        }
        assert!(data.contains_key("postgres-keycloak-password"));
        assert!(data.contains_key("postgres-pacs-password"));
        assert!(data.contains_key("mysql-root-password"));
        assert!(data.contains_key("postgres-root-password"));
        assert_eq!(data["identity-admin-password"], "secret");
        assert!(!data.contains_key("smtp-password"));
    }

    #[test]
    fn test_smtp_password_goes_to_secret() {
        let mut props = base_props();
        props.smtp = Some(SmtpProps {
            auth: Some(SmtpAuthProps {
                username: Some("u".to_string()),
                password: Some("pw".to_string()),
            }),
            ..Default::default()
        });
        let settings = apply_defaults(props).unwrap();
        assert_eq!(secret_data(&settings)["smtp-password"], "pw");
        assert_eq!(config_map_data(&settings)["SMTP_AUTH"], "true");
    }

    #[test]
    fn test_claims_only_for_mounted_volumes() {
        let mut props = base_props();
        props.mysql_databases = Some(
            crate::config::defaults::MYSQL_DATABASES
                .iter()
                .map(|key| {
                    let db = crate::config::types::DatabaseProps {
                        host: "db.x.test".to_string(),
                        port: Some(3307),
                        database: None,
                        username: "u".to_string(),
                        password: "p".to_string(),
                    };
                    (key.to_string(), db)
                })
                .collect(),
        );
        let settings = apply_defaults(props).unwrap();
        let claims = volume_claims(&settings, &components(&settings));
        let names: Vec<_> = claims
            .iter()
            .filter_map(|c| c.metadata.name.as_deref())
            .collect();
        assert!(!names.contains(&"mysql-data"));
        assert!(names.contains(&"postgres-data"));
        assert!(names.contains(&"datasets-data"));

        let secret = secret_data(&settings);
        assert!(!secret.contains_key("mysql-root-password"));
        assert_eq!(secret["mysql-users-password"], "p");
    }

    #[test]
    fn test_claim_spec() {
        let settings = apply_defaults(base_props()).unwrap();
        let claims = volume_claims(&settings, &components(&settings));
        let datasets = claims
            .iter()
            .find(|c| c.metadata.name.as_deref() == Some("datasets-data"))
            .unwrap();
        let spec = datasets.spec.as_ref().unwrap();
        assert_eq!(spec.access_modes, Some(vec!["ReadWriteMany".to_string()]));
        let requests = spec.resources.as_ref().unwrap().requests.as_ref().unwrap();
        assert_eq!(requests["storage"], Quantity("100Gi".to_string()));
        assert_eq!(datasets.metadata.namespace.as_deref(), Some("imaging"));
    }

    #[test]
    fn test_init_scripts_create_every_database() {
        let settings = apply_defaults(base_props()).unwrap();
        let maps = init_config_maps(&settings);
        let names: Vec<_> = maps
            .iter()
            .filter_map(|m| m.metadata.name.as_deref())
            .collect();
        assert_eq!(names, vec!["imaging-postgres-init", "imaging-mysql-init"]);

        let mysql = init_script(&settings.mysql);
        assert!(mysql.starts_with("#!/bin/bash\nset -e\n"));
        for key in crate::config::defaults::MYSQL_DATABASES {
            assert!(mysql.contains(&format!("CREATE DATABASE IF NOT EXISTS \\`{key}\\`;")));
            assert!(mysql.contains(&format!("'{key}'@'%' IDENTIFIED BY '${{{}}}'", init_password_var(key))));
        }
        assert!(mysql.trim_end().ends_with("EOSQL"));

        let postgres = init_script(&settings.postgres);
        assert!(postgres.contains("CREATE DATABASE \"pacs\" OWNER \"pacs\";"));
        assert!(postgres.contains("CREATE USER \"keycloak\" WITH PASSWORD '${DB_PASSWORD_KEYCLOAK}';"));
    }

    #[test]
    fn test_no_init_script_for_external_instances() {
        let mut props = base_props();
        props.postgres_databases = Some(
            crate::config::defaults::POSTGRES_DATABASES
                .iter()
                .map(|key| {
                    let db = crate::config::types::DatabaseProps {
                        host: "pg.x.test".to_string(),
                        port: None,
                        database: None,
                        username: "u".to_string(),
                        password: "p".to_string(),
                    };
                    (key.to_string(), db)
                })
                .collect(),
        );
        let settings = apply_defaults(props).unwrap();
        let maps = init_config_maps(&settings);
        assert_eq!(maps.len(), 1);
        assert_eq!(maps[0].metadata.name.as_deref(), Some("imaging-mysql-init"));
        assert!(maps[0].data.as_ref().unwrap().contains_key(INIT_SCRIPT_KEY));
    }

    #[test]
    fn test_init_password_var() {
        assert_eq!(init_password_var("users"), "DB_PASSWORD_USERS");
        assert_eq!(init_password_var("nifti-conversion"), "DB_PASSWORD_NIFTI_CONVERSION");
    }
}
