//! Layering of caller-supplied configuration over the built-in defaults.
//!
//! Top-level fields are merged shallowly: a supplied value replaces the
//! default wholesale. The `smtp` and `vip` blocks are merged one level
//! deeper so that setting one of their fields keeps the defaults of the
//! others.

use super::defaults;
use super::types::{
    ChartProps, ChartSettings, Connection, DatabaseEngine, DatabaseFamily, DatabaseProps,
    Endpoint, IdentitySettings, ResourceMap, SmtpCredentials, SmtpProps, SmtpSettings,
    VipProps, VipSettings, VolumeClaimProps, VolumeClaimSettings,
};
use super::validate::parse_url;
use crate::error::ConfigError;
use log::{debug, warn};
use std::collections::BTreeMap;

/// Host the identity provider is reachable at when deployed in the chart.
pub const INTERNAL_IDENTITY_URL: &str = "http://keycloak:8080";

/// Produce fully populated settings from validated props.
pub fn apply_defaults(props: ChartProps) -> Result<ChartSettings, ConfigError> {
    let url = endpoint("url", &props.url)?;
    let viewer_url = endpoint("viewerUrl", &props.viewer_url)?;

    let database_password = match props.database_password {
        Some(password) => password,
        None => {
            if props.mysql_databases.is_none() || props.postgres_databases.is_none() {
                warn!("databasePassword not set, internal databases use the default password");
            }
            defaults::DATABASE_PASSWORD.to_string()
        }
    };

    let identity = IdentitySettings {
        admin_user: props
            .identity_admin_user
            .unwrap_or_else(|| defaults::IDENTITY_ADMIN_USER.to_string()),
        admin_password: props.identity_admin_password,
        realm: props
            .identity_realm
            .unwrap_or_else(|| defaults::IDENTITY_REALM.to_string()),
        external: props.external_identity_url.is_some(),
        url: props
            .external_identity_url
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| INTERNAL_IDENTITY_URL.to_string()),
    };

    Ok(ChartSettings {
        namespace: props.namespace.unwrap_or_else(|| defaults::NAMESPACE.to_string()),
        create_namespace: props.create_namespace.unwrap_or(true),
        instance_name: props
            .instance_name
            .unwrap_or_else(|| defaults::INSTANCE_NAME.to_string()),
        url,
        viewer_url,
        admin_email: props.admin_email,
        admin_name: props
            .admin_name
            .unwrap_or_else(|| defaults::ADMIN_NAME.to_string()),
        allowed_admin_ips: props.allowed_admin_ips.unwrap_or_default(),
        image_registry: props
            .image_registry
            .map(|registry| registry.trim_end_matches('/').to_string())
            .unwrap_or_else(|| defaults::IMAGE_REGISTRY.to_string()),
        image_tag: props
            .image_tag
            .unwrap_or_else(|| defaults::IMAGE_TAG.to_string()),
        identity,
        smtp: merge_smtp(props.smtp.unwrap_or_default()),
        vip: merge_vip(props.vip.unwrap_or_default())?,
        mysql: database_family(
            DatabaseEngine::MySql,
            props.mysql_databases,
            defaults::MYSQL_DATABASES,
            &database_password,
        ),
        postgres: database_family(
            DatabaseEngine::Postgres,
            props.postgres_databases,
            defaults::POSTGRES_DATABASES,
            &database_password,
        ),
        volumes: merge_volumes(props.volumes),
    })
}

/// Split a URL into scheme and host, dropping any path.
pub fn endpoint(field: &str, value: &str) -> Result<Endpoint, ConfigError> {
    let url = parse_url(field, value)?;
    let host = url.host_str().unwrap_or_default();
    let host = match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };
    Ok(Endpoint {
        scheme: url.scheme().to_string(),
        host,
    })
}

fn merge_smtp(smtp: SmtpProps) -> SmtpSettings {
    let auth = smtp.auth.and_then(|auth| match (auth.username, auth.password) {
        (Some(username), Some(password)) => Some(SmtpCredentials { username, password }),
        _ => None,
    });
    SmtpSettings {
        host: smtp.host.unwrap_or_else(|| defaults::SMTP_HOST.to_string()),
        port: smtp.port.unwrap_or(defaults::SMTP_PORT),
        starttls: smtp.starttls.unwrap_or_default(),
        auth,
    }
}

fn merge_vip(vip: VipProps) -> Result<VipSettings, ConfigError> {
    let url = vip.url.as_deref().unwrap_or(defaults::VIP_URL);
    Ok(VipSettings {
        url: endpoint("vip.url", url)?,
        client_id: vip
            .client_id
            .unwrap_or_else(|| defaults::VIP_CLIENT_ID.to_string()),
        client_secret: vip.client_secret.unwrap_or_default(),
    })
}

fn database_family(
    engine: DatabaseEngine,
    supplied: Option<ResourceMap<DatabaseProps>>,
    expected: &[&str],
    password: &str,
) -> DatabaseFamily {
    let external = supplied.is_some();
    let connections = match supplied {
        Some(databases) => databases
            .into_iter()
            .filter(|(key, _)| expected.contains(&key.as_str()))
            .map(|(key, db)| {
                let connection = Connection {
                    host: db.host,
                    port: db.port.unwrap_or(engine.default_port()),
                    database: db.database.unwrap_or_else(|| key.clone()),
                    username: db.username,
                    password: db.password,
                };
                (key, connection)
            })
            .collect(),
        None => {
            debug!("no {} databases supplied, deploying an internal instance", engine.name());
            expected
                .iter()
                .map(|key| {
                    let connection = Connection {
                        host: engine.name().to_string(),
                        port: engine.default_port(),
                        database: key.to_string(),
                        username: key.to_string(),
                        password: password.to_string(),
                    };
                    (key.to_string(), connection)
                })
                .collect()
        }
    };

    DatabaseFamily {
        engine,
        external,
        root_password: password.to_string(),
        connections,
    }
}

fn merge_volumes(
    supplied: Option<ResourceMap<VolumeClaimProps>>,
) -> BTreeMap<String, VolumeClaimSettings> {
    match supplied {
        Some(volumes) => volumes
            .into_iter()
            .filter(|(key, _)| defaults::volume_keys().contains(&key.as_str()))
            .map(|(key, claim)| {
                let settings = VolumeClaimSettings {
                    size: claim.size,
                    storage_class: claim.storage_class,
                    access_mode: claim
                        .access_mode
                        .unwrap_or_else(|| defaults::volume_access_mode(&key)),
                };
                (key, settings)
            })
            .collect(),
        None => defaults::VOLUMES
            .iter()
            .map(|(key, size, access_mode)| {
                let settings = VolumeClaimSettings {
                    size: size.to_string(),
                    storage_class: None,
                    access_mode: *access_mode,
                };
                (key.to_string(), settings)
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::{AccessMode, StartTls};

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
    fn test_defaults_fill_every_field() {
        let settings = apply_defaults(base_props()).unwrap();
        assert_eq!(settings.namespace, "imaging");
        assert!(settings.create_namespace);
        assert_eq!(settings.admin_name, defaults::ADMIN_NAME);
        assert_eq!(settings.identity.admin_user, "admin");
        assert_eq!(settings.identity.url, INTERNAL_IDENTITY_URL);
        assert!(!settings.identity.external);
        assert_eq!(settings.smtp.host, "localhost");
        assert_eq!(settings.smtp.port, 25);
        assert_eq!(settings.vip.url.host, "vip.creatis.insa-lyon.fr");
        assert_eq!(settings.volumes.len(), defaults::VOLUMES.len());
    }

    #[test]
    fn test_urls_keep_scheme_and_host_only() {
        let settings = apply_defaults(base_props()).unwrap();
        assert_eq!(settings.url.scheme, "https");
        assert_eq!(settings.url.host, "x.test");
        assert_eq!(settings.viewer_url.host, "y.test");
    }

    #[test]
    fn test_endpoint_keeps_explicit_port_and_drops_path() {
        let ep = endpoint("url", "http://x.test:8443/some/path?q=1").unwrap();
        assert_eq!(ep.scheme, "http");
        assert_eq!(ep.host, "x.test:8443");

        // Default ports are not repeated
        let ep = endpoint("url", "https://x.test:443/").unwrap();
        assert_eq!(ep.host, "x.test");
    }

    #[test]
    fn test_partial_smtp_keeps_sibling_defaults() {
        let mut props = base_props();
        props.smtp = Some(SmtpProps {
            port: Some(587),
            ..Default::default()
        });
        let smtp = apply_defaults(props).unwrap().smtp;
        assert_eq!(smtp.port, 587);
        assert_eq!(smtp.host, defaults::SMTP_HOST);
        assert_eq!(smtp.starttls, StartTls::Disabled);
        assert!(smtp.auth.is_none());
    }

    #[test]
    fn test_partial_vip_keeps_sibling_defaults() {
        let mut props = base_props();
        props.vip = Some(VipProps {
            client_secret: Some("s3cr3t".to_string()),
            ..Default::default()
        });
        let vip = apply_defaults(props).unwrap().vip;
        assert_eq!(vip.client_secret, "s3cr3t");
        assert_eq!(vip.client_id, defaults::VIP_CLIENT_ID);
        assert_eq!(vip.url.scheme, "https");
    }

    #[test]
    fn test_internal_databases_route_to_default_host() {
        let settings = apply_defaults(base_props()).unwrap();
        assert!(!settings.mysql.external);
        let users = &settings.mysql.connections["users"];
        assert_eq!(users.host, "mysql");
        assert_eq!(users.port, 3306);
        assert_eq!(users.database, "users");
        assert_eq!(users.password, defaults::DATABASE_PASSWORD);
        assert_eq!(settings.postgres.connections["pacs"].host, "postgres");
    }

    #[test]
    fn test_supplied_databases_are_external() {
        let mut props = base_props();
        props.database_password = Some("root".to_string());
        props.postgres_databases = Some(
            ["keycloak", "pacs", "extra"]
                .iter()
                .map(|key| {
                    let db = DatabaseProps {
                        host: "db.x.test".to_string(),
                        port: None,
                        database: None,
                        username: format!("{key}_user"),
                        password: format!("{key}_pw"),
                    };
                    (key.to_string(), db)
                })
                .collect(),
        );
        let settings = apply_defaults(props).unwrap();
        assert!(settings.postgres.external);
        assert_eq!(settings.postgres.connections.len(), 2);
        let keycloak = &settings.postgres.connections["keycloak"];
        assert_eq!(keycloak.host, "db.x.test");
        assert_eq!(keycloak.port, 5432);
        assert_eq!(keycloak.database, "keycloak");
        assert_eq!(keycloak.username, "keycloak_user");
        assert!(!settings.mysql.external);
        assert_eq!(settings.mysql.root_password, "root");
    }

    #[test]
    fn test_external_identity_url() {
        let mut props = base_props();
        props.external_identity_url = Some("https://sso.x.test/".to_string());
        let identity = apply_defaults(props).unwrap().identity;
        assert!(identity.external);
        assert_eq!(identity.url, "https://sso.x.test");
    }

    #[test]
    fn test_volume_access_mode_defaults_per_volume() {
        let mut props = base_props();
        props.volumes = Some(
            defaults::volume_keys()
                .into_iter()
                .map(|key| {
                    let claim = VolumeClaimProps {
                        size: "2Gi".to_string(),
                        storage_class: Some("fast".to_string()),
                        access_mode: None,
                    };
                    (key.to_string(), claim)
                })
                .collect(),
        );
        let volumes = apply_defaults(props).unwrap().volumes;
        assert_eq!(volumes["mysql"].access_mode, AccessMode::ReadWriteOnce);
        assert_eq!(volumes["datasets"].access_mode, AccessMode::ReadWriteMany);
        assert_eq!(volumes["logs"].storage_class.as_deref(), Some("fast"));
    }
}
