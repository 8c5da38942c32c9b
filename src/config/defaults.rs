//! Built-in defaults and the fixed key sets of the resource maps.

use super::types::AccessMode;

pub const NAMESPACE: &str = "imaging";
pub const INSTANCE_NAME: &str = "imaging";
pub const ADMIN_NAME: &str = "Platform Administrator";
pub const IMAGE_REGISTRY: &str = "ghcr.io/imaging-platform";
pub const IMAGE_TAG: &str = "latest";
pub const IDENTITY_ADMIN_USER: &str = "admin";
pub const IDENTITY_REALM: &str = "imaging";
pub const DATABASE_PASSWORD: &str = "password";

pub const SMTP_HOST: &str = "localhost";
pub const SMTP_PORT: u16 = 25;

pub const VIP_URL: &str = "https://vip.creatis.insa-lyon.fr/";
pub const VIP_CLIENT_ID: &str = "imaging-platform";

/// Databases hosted on the MySQL instance, one per microservice.
pub const MYSQL_DATABASES: &[&str] = &["users", "studies", "import", "datasets", "preclinical"];

/// Databases hosted on the PostgreSQL instance.
pub const POSTGRES_DATABASES: &[&str] = &["keycloak", "pacs"];

/// Shared volumes with their default claim size and access mode.
pub const VOLUMES: &[(&str, &str, AccessMode)] = &[
    ("mysql", "10Gi", AccessMode::ReadWriteOnce),
    ("postgres", "5Gi", AccessMode::ReadWriteOnce),
    ("rabbitmq", "1Gi", AccessMode::ReadWriteOnce),
    ("solr", "5Gi", AccessMode::ReadWriteOnce),
    ("datasets", "100Gi", AccessMode::ReadWriteMany),
    ("import", "50Gi", AccessMode::ReadWriteMany),
    ("dicom", "100Gi", AccessMode::ReadWriteMany),
    ("logs", "5Gi", AccessMode::ReadWriteMany),
];

pub fn volume_keys() -> Vec<&'static str> {
    VOLUMES.iter().map(|(name, _, _)| *name).collect()
}

/// Default access mode of a known volume. Unknown names fall back to
/// `ReadWriteOnce`.
pub fn volume_access_mode(name: &str) -> AccessMode {
    VOLUMES
        .iter()
        .find(|(key, _, _)| *key == name)
        .map(|(_, _, mode)| *mode)
        .unwrap_or(AccessMode::ReadWriteOnce)
}
