//! The fixed set of components making up the platform.
//!
//! [`components`] lists them in deployment order: backends first, then the
//! microservices that consume them. Toggleable backends are left out when
//! the configuration points at an external instance.

use super::shared::{SecretKey, init_config_map_name, init_password_var};
use super::workload::{literal_env, secret_env};
use crate::config::types::{ChartSettings, DatabaseEngine, DatabaseFamily};
use k8s_openapi::api::core::v1::EnvVar;
use std::fmt;

/// Port of the message broker service.
pub const RABBITMQ_PORT: i32 = 5672;
/// Port of the search index service.
pub const SOLR_PORT: i32 = 8983;
/// HTTP port of the PACS archive, also passed to the image as `HTTP_PORT`.
pub const PACS_HTTP_PORT: i32 = 8081;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Database,
    Identity,
    Broker,
    Search,
    Microservice,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Role::Database => "database",
            Role::Identity => "identity provider",
            Role::Broker => "message broker",
            Role::Search => "search index",
            Role::Microservice => "microservice",
        };
        f.write_str(label)
    }
}

/// Environment variable groups derived from shared settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvSubset {
    /// `SMTP_USERNAME` and `SMTP_PASSWORD`, only when SMTP auth is configured
    Smtp,
    /// `VIP_CLIENT_SECRET`
    Vip,
    /// `IDP_ADMIN_USER` and `IDP_ADMIN_PASSWORD`
    Identity,
}

/// Variable names an image reads its database connection from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbEnvNames {
    pub host: &'static str,
    pub port: &'static str,
    pub name: &'static str,
    pub user: &'static str,
    pub password: &'static str,
}

/// Names used by the platform microservices.
pub const PLATFORM_DB_ENV: DbEnvNames = DbEnvNames {
    host: "DB_HOST",
    port: "DB_PORT",
    name: "DB_NAME",
    user: "DB_USER",
    password: "DB_PASSWORD",
};

pub const KEYCLOAK_DB_ENV: DbEnvNames = DbEnvNames {
    host: "KC_DB_URL_HOST",
    port: "KC_DB_URL_PORT",
    name: "KC_DB_URL_DATABASE",
    user: "KC_DB_USERNAME",
    password: "KC_DB_PASSWORD",
};

/// dcm4chee-arc-psql
pub const DCM4CHEE_DB_ENV: DbEnvNames = DbEnvNames {
    host: "POSTGRES_HOST",
    port: "POSTGRES_PORT",
    name: "POSTGRES_DB",
    user: "POSTGRES_USER",
    password: "POSTGRES_PASSWORD",
};

/// A database a component connects to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatabaseBinding {
    pub engine: DatabaseEngine,
    pub key: &'static str,
    pub names: DbEnvNames,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mount {
    pub volume: &'static str,
    pub path: &'static str,
}

/// Declarative description of one deployment + service pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    pub name: &'static str,
    pub role: Role,
    pub image: String,
    pub port: i32,
    pub args: Vec<String>,
    /// Component specific variables, emitted before bindings and subsets
    pub env: Vec<EnvVar>,
    pub databases: Vec<DatabaseBinding>,
    pub subsets: Vec<EnvSubset>,
    pub mounts: Vec<Mount>,
    /// Config map mounted at `/docker-entrypoint-initdb.d`
    pub init_scripts: Option<String>,
}

impl Component {
    fn new(name: &'static str, role: Role, image: impl Into<String>, port: i32) -> Self {
        Self {
            name,
            role,
            image: image.into(),
            port,
            args: Vec::new(),
            env: Vec::new(),
            databases: Vec::new(),
            subsets: Vec::new(),
            mounts: Vec::new(),
            init_scripts: None,
        }
    }

    fn args(mut self, args: &[&str]) -> Self {
        self.args = args.iter().map(|a| a.to_string()).collect();
        self
    }

    fn env(mut self, env: Vec<EnvVar>) -> Self {
        self.env = env;
        self
    }

    fn database(mut self, engine: DatabaseEngine, key: &'static str, names: DbEnvNames) -> Self {
        self.databases.push(DatabaseBinding { engine, key, names });
        self
    }

    fn subsets(mut self, subsets: &[EnvSubset]) -> Self {
        self.subsets = subsets.to_vec();
        self
    }

    fn mount(mut self, volume: &'static str, path: &'static str) -> Self {
        self.mounts.push(Mount { volume, path });
        self
    }

    fn init_scripts(mut self, config_map: String) -> Self {
        self.init_scripts = Some(config_map);
        self
    }
}

/// Root password plus one `DB_PASSWORD_<KEY>` variable per database of an
/// internal instance, read by its init script.
fn backend_env(settings: &ChartSettings, family: &DatabaseFamily, root_var: &str) -> Vec<EnvVar> {
    let secrets = super::shared::secret_name(settings);
    let mut env = vec![secret_env(
        root_var,
        &secrets,
        &SecretKey::RootPassword(family.engine).to_string(),
    )];
    env.extend(family.connections.keys().map(|key| {
        secret_env(
            &init_password_var(key),
            &secrets,
            &SecretKey::DatabasePassword(family.engine, key.clone()).to_string(),
        )
    }));
    env
}

/// Every component to deploy for `settings`, in creation order.
pub fn components(settings: &ChartSettings) -> Vec<Component> {
    let secrets = super::shared::secret_name(settings);
    let mut out = Vec::new();

    if !settings.postgres.external {
        let mut env = backend_env(settings, &settings.postgres, "POSTGRES_PASSWORD");
        env.push(literal_env("PGDATA", "/var/lib/postgresql/data/pgdata"));
        out.push(
            Component::new("postgres", Role::Database, "postgres:16", 5432)
                .env(env)
                .mount("postgres", "/var/lib/postgresql/data")
                .init_scripts(init_config_map_name(settings, DatabaseEngine::Postgres)),
        );
    }

    if !settings.identity.external {
        out.push(
            Component::new(
                "keycloak",
                Role::Identity,
                "quay.io/keycloak/keycloak:24.0",
                8080,
            )
            .args(&["start", "--http-enabled=true", "--proxy-headers=xforwarded"])
            .env(vec![
                literal_env("KC_DB", "postgres"),
                literal_env("KC_HOSTNAME", &settings.url.host),
                literal_env("KEYCLOAK_ADMIN", &settings.identity.admin_user),
                secret_env(
                    "KEYCLOAK_ADMIN_PASSWORD",
                    &secrets,
                    &SecretKey::IdentityAdminPassword.to_string(),
                ),
            ])
            .database(DatabaseEngine::Postgres, "keycloak", KEYCLOAK_DB_ENV)
            .subsets(&[EnvSubset::Identity, EnvSubset::Smtp]),
        );
    }

    out.push(
        Component::new(
            "rabbitmq",
            Role::Broker,
            "rabbitmq:3.13-management",
            RABBITMQ_PORT,
        )
        .mount("rabbitmq", "/var/lib/rabbitmq"),
    );

    if !settings.mysql.external {
        out.push(
            Component::new("mysql", Role::Database, "mysql:8.0", 3306)
                .env(backend_env(settings, &settings.mysql, "MYSQL_ROOT_PASSWORD"))
                .mount("mysql", "/var/lib/mysql")
                .init_scripts(init_config_map_name(settings, DatabaseEngine::MySql)),
        );
    }

    out.push(
        Component::new("solr", Role::Search, "solr:9.6", SOLR_PORT)
            .args(&["solr-precreate", "imaging"])
            .mount("solr", "/var/solr"),
    );

    let image = |name: &str| {
        format!(
            "{}/{}:{}",
            settings.image_registry, name, settings.image_tag
        )
    };

    out.extend([
        Component::new("users", Role::Microservice, image("users"), 9901)
            .database(DatabaseEngine::MySql, "users", PLATFORM_DB_ENV)
            .subsets(&[EnvSubset::Identity, EnvSubset::Smtp])
            .mount("logs", "/var/log/imaging"),
        Component::new("studies", Role::Microservice, image("studies"), 9902)
            .database(DatabaseEngine::MySql, "studies", PLATFORM_DB_ENV)
            .mount("datasets", "/var/datasets")
            .mount("logs", "/var/log/imaging"),
        Component::new("import", Role::Microservice, image("import"), 9903)
            .database(DatabaseEngine::MySql, "import", PLATFORM_DB_ENV)
            .mount("import", "/tmp/import")
            .mount("dicom", "/var/dicom")
            .mount("logs", "/var/log/imaging"),
        Component::new("datasets", Role::Microservice, image("datasets"), 9904)
            .database(DatabaseEngine::MySql, "datasets", PLATFORM_DB_ENV)
            .subsets(&[EnvSubset::Vip, EnvSubset::Smtp])
            .mount("datasets", "/var/datasets")
            .mount("import", "/tmp/import")
            .mount("logs", "/var/log/imaging"),
        Component::new("preclinical", Role::Microservice, image("preclinical"), 9905)
            .database(DatabaseEngine::MySql, "preclinical", PLATFORM_DB_ENV)
            .mount("datasets", "/var/datasets")
            .mount("logs", "/var/log/imaging"),
        Component::new(
            "nifti-conversion",
            Role::Microservice,
            image("nifti-conversion"),
            9909,
        )
        .mount("datasets", "/var/datasets")
        .mount("import", "/tmp/import")
        .mount("logs", "/var/log/imaging"),
        Component::new(
            "pacs",
            Role::Microservice,
            "dcm4che/dcm4chee-arc-psql:5.31.2",
            PACS_HTTP_PORT,
        )
        .env(vec![literal_env("HTTP_PORT", &PACS_HTTP_PORT.to_string())])
        .database(DatabaseEngine::Postgres, "pacs", DCM4CHEE_DB_ENV)
        .mount("dicom", "/storage"),
        Component::new("viewer", Role::Microservice, "ohif/app:v3.8.0", 80),
        Component::new("front", Role::Microservice, image("front"), 80)
            .mount("logs", "/var/log/nginx"),
    ]);

    out
}
