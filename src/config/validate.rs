//! Structural checks on [`ChartProps`] that must pass before any resource
//! is built.
//!
//! Resource maps are optional, but once supplied they must name every
//! expected entry. Extra entries are tolerated and only logged.

use super::defaults;
use super::types::{ChartProps, ResourceMap};
use crate::error::ConfigError;
use log::warn;
use regex::Regex;
use std::sync::LazyLock;
use url::Url;

static DNS_LABEL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").expect("valid regex"));

/// Storage quantities: a decimal number with an optional binary or decimal suffix.
static QUANTITY_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d+(?:\.\d+)?(Ki|Mi|Gi|Ti|Pi|Ei|k|M|G|T|P|E)?$").expect("valid regex")
});

const DNS_LABEL_MAX_LEN: usize = 63;

/// Fail if `map` lacks any key of `expected`; warn about keys outside it.
///
/// All missing keys are reported at once, in the order of `expected`.
pub fn check_resource_map<T>(
    label: &str,
    map: &ResourceMap<T>,
    expected: &[&str],
) -> Result<(), ConfigError> {
    for key in map.keys() {
        if !expected.contains(&key.as_str()) {
            warn!("{label}: ignoring unexpected key '{key}'");
        }
    }

    let missing: Vec<String> = expected
        .iter()
        .filter(|key| !map.contains_key(**key))
        .map(|key| key.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::MissingKeys {
            map: label.to_string(),
            missing,
        })
    }
}

/// Run every check on the raw configuration.
pub fn validate_props(props: &ChartProps) -> Result<(), ConfigError> {
    if props.admin_email.trim().is_empty() {
        return Err(ConfigError::MissingField("adminEmail".to_string()));
    }
    if props.identity_admin_password.is_empty() {
        return Err(ConfigError::MissingField("identityAdminPassword".to_string()));
    }

    if let Some(namespace) = &props.namespace {
        check_dns_label("namespace", namespace)?;
    }
    if let Some(instance) = &props.instance_name {
        check_dns_label("instanceName", instance)?;
    }

    parse_url("url", &props.url)?;
    parse_url("viewerUrl", &props.viewer_url)?;
    if let Some(external) = &props.external_identity_url {
        parse_url("externalIdentityUrl", external)?;
    }
    if let Some(url) = props.vip.as_ref().and_then(|vip| vip.url.as_deref()) {
        parse_url("vip.url", url)?;
    }

    if let Some(auth) = props.smtp.as_ref().and_then(|smtp| smtp.auth.as_ref()) {
        // An auth block needs both credentials.
        if auth.username.as_deref().is_none_or(str::is_empty) {
            return Err(ConfigError::MissingField("smtp.auth.username".to_string()));
        }
        if auth.password.as_deref().is_none_or(str::is_empty) {
            return Err(ConfigError::MissingField("smtp.auth.password".to_string()));
        }
    }

    if let Some(volumes) = &props.volumes {
        check_resource_map("volumes", volumes, &defaults::volume_keys())?;
        for (key, claim) in volumes {
            check_quantity(&format!("volumes.{key}.size"), &claim.size)?;
        }
    }
    if let Some(databases) = &props.mysql_databases {
        check_resource_map("mysqlDatabases", databases, defaults::MYSQL_DATABASES)?;
    }
    if let Some(databases) = &props.postgres_databases {
        check_resource_map("postgresDatabases", databases, defaults::POSTGRES_DATABASES)?;
    }

    Ok(())
}

/// Names that end up as object names or label values must be DNS-1123 labels.
pub fn check_dns_label(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.len() <= DNS_LABEL_MAX_LEN && DNS_LABEL_REGEX.is_match(value) {
        Ok(())
    } else {
        Err(ConfigError::InvalidName {
            field: field.to_string(),
            value: value.to_string(),
        })
    }
}

pub fn check_quantity(field: &str, value: &str) -> Result<(), ConfigError> {
    if QUANTITY_REGEX.is_match(value) {
        Ok(())
    } else {
        Err(ConfigError::InvalidQuantity {
            field: field.to_string(),
            value: value.to_string(),
        })
    }
}

/// Parse an absolute URL that must carry a host.
pub fn parse_url(field: &str, value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value).map_err(|e| ConfigError::InvalidUrl {
        field: field.to_string(),
        reason: e.to_string(),
    })?;
    if url.host_str().is_none_or(str::is_empty) {
        return Err(ConfigError::InvalidUrl {
            field: field.to_string(),
            reason: format!("'{value}' has no host"),
        });
    }
    Ok(url)
}
