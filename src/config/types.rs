use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A resource map as supplied by the caller: names from a fixed key set
/// mapped to per-entry settings.
pub type ResourceMap<T> = BTreeMap<String, T>;

/// Chart configuration as read from the config file.
///
/// Only the endpoint URLs, the admin e-mail and the identity provider admin
/// password are mandatory. Everything else is layered over built-in
/// defaults by [`crate::config::merge::apply_defaults`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ChartProps {
    /// Public URL of the platform
    pub url: String,
    /// Public URL of the image viewer
    pub viewer_url: String,
    pub admin_email: String,
    /// Password of the identity provider administrator
    pub identity_admin_password: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_namespace: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_name: Option<String>,
    /// Comma separated list of addresses allowed to reach admin endpoints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_admin_ips: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_registry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_admin_user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_realm: Option<String>,
    /// When set, no identity provider is deployed and services use this URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_identity_url: Option<String>,
    /// Password for the internally deployed database instances
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_password: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smtp: Option<SmtpProps>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vip: Option<VipProps>,

    /// External MySQL databases. Omit to deploy MySQL in the cluster.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mysql_databases: Option<ResourceMap<DatabaseProps>>,
    /// External PostgreSQL databases. Omit to deploy PostgreSQL in the cluster.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postgres_databases: Option<ResourceMap<DatabaseProps>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volumes: Option<ResourceMap<VolumeClaimProps>>,
}

/// SMTP relay settings. Every field is optional so that a partial block
/// keeps the defaults of its siblings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SmtpProps {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starttls: Option<StartTls>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<SmtpAuthProps>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SmtpAuthProps {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// STARTTLS negotiation mode for the SMTP relay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StartTls {
    #[default]
    Disabled,
    Enabled,
    Required,
}

impl StartTls {
    pub fn enabled(self) -> bool {
        !matches!(self, StartTls::Disabled)
    }

    pub fn required(self) -> bool {
        matches!(self, StartTls::Required)
    }
}

impl fmt::Display for StartTls {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartTls::Disabled => write!(f, "disabled"),
            StartTls::Enabled => write!(f, "enabled"),
            StartTls::Required => write!(f, "required"),
        }
    }
}

/// Virtual Imaging Platform client settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct VipProps {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
}

/// Connection settings for one database on an external instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DatabaseProps {
    pub host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Database (schema) name, defaults to the map key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    pub username: String,
    pub password: String,
}

/// Persistent volume claim settings for one shared volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct VolumeClaimProps {
    /// Requested capacity, as a Kubernetes quantity (e.g. `10Gi`)
    pub size: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_mode: Option<AccessMode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessMode {
    ReadWriteOnce,
    ReadWriteMany,
    ReadOnlyMany,
}

impl AccessMode {
    pub fn as_str(self) -> &'static str {
        match self {
            AccessMode::ReadWriteOnce => "ReadWriteOnce",
            AccessMode::ReadWriteMany => "ReadWriteMany",
            AccessMode::ReadOnlyMany => "ReadOnlyMany",
        }
    }
}

// ============================================================================
// Resolved settings
// ============================================================================

/// Fully populated configuration. Produced by
/// [`crate::config::merge::apply_defaults`]; nothing downstream looks at
/// [`ChartProps`] again.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSettings {
    pub namespace: String,
    pub create_namespace: bool,
    pub instance_name: String,
    pub url: Endpoint,
    pub viewer_url: Endpoint,
    pub admin_email: String,
    pub admin_name: String,
    pub allowed_admin_ips: String,
    pub image_registry: String,
    pub image_tag: String,
    pub identity: IdentitySettings,
    pub smtp: SmtpSettings,
    pub vip: VipSettings,
    pub mysql: DatabaseFamily,
    pub postgres: DatabaseFamily,
    pub volumes: BTreeMap<String, VolumeClaimSettings>,
}

/// Scheme and host of a URL. `host` carries an explicit non-default port
/// but never a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub scheme: String,
    pub host: String,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.host)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IdentitySettings {
    pub admin_user: String,
    pub admin_password: String,
    pub realm: String,
    /// Base URL services use to reach the identity provider
    pub url: String,
    /// `true` when the provider lives outside the chart
    pub external: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub starttls: StartTls,
    pub auth: Option<SmtpCredentials>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SmtpCredentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VipSettings {
    pub url: Endpoint,
    pub client_id: String,
    pub client_secret: String,
}

/// All databases hosted by one engine (MySQL or PostgreSQL).
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseFamily {
    pub engine: DatabaseEngine,
    /// `true` when the caller supplied the databases, so no instance is deployed
    pub external: bool,
    /// Root password of the internal instance. Unused when external.
    pub root_password: String,
    pub connections: BTreeMap<String, Connection>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseEngine {
    MySql,
    Postgres,
}

impl DatabaseEngine {
    /// Name used for the internal service and as a prefix for secret keys.
    pub fn name(self) -> &'static str {
        match self {
            DatabaseEngine::MySql => "mysql",
            DatabaseEngine::Postgres => "postgres",
        }
    }

    pub fn default_port(self) -> u16 {
        match self {
            DatabaseEngine::MySql => 3306,
            DatabaseEngine::Postgres => 5432,
        }
    }

    /// Secret key holding the password of database `key`.
    pub fn password_key(self, key: &str) -> String {
        format!("{}-{}-password", self.name(), key)
    }

    pub fn root_password_key(self) -> String {
        format!("{}-root-password", self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VolumeClaimSettings {
    pub size: String,
    pub storage_class: Option<String>,
    pub access_mode: AccessMode,
}
