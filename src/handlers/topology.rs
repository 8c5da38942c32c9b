use crate::config::{self, merge::apply_defaults, validate::validate_props};
use crate::generator::topology::{Component, components};
use colored::Colorize;
use std::path::PathBuf;

pub fn handle_topology(config_path: Option<PathBuf>) -> crate::Result<()> {
    let path = config::resolve_config_path(config_path.as_deref())?;
    let props = config::load_props(&path)?;
    validate_props(&props)?;
    let settings = apply_defaults(props)?;

    println!(
        "\n{} {}",
        "📦 Components for".bright_white().bold(),
        settings.namespace.cyan()
    );
    println!(
        "{:<18} {:<18} {:<6} {:<46} {}",
        "NAME", "ROLE", "PORT", "IMAGE", "VOLUMES"
    );
    for component in components(&settings) {
        println!("{}", format_row(&component));
    }

    let external: Vec<&str> = [
        (settings.mysql.external, "mysql"),
        (settings.postgres.external, "postgres"),
        (settings.identity.external, "keycloak"),
    ]
    .into_iter()
    .filter_map(|(external, name)| external.then_some(name))
    .collect();
    if !external.is_empty() {
        println!(
            "\n{} external: {}",
            "🔗".yellow(),
            external.join(", ")
        );
    }

    Ok(())
}

fn format_row(component: &Component) -> String {
    let volumes = component
        .mounts
        .iter()
        .map(|m| m.volume)
        .collect::<Vec<_>>()
        .join(",");
    format!(
        "{:<18} {:<18} {:<6} {:<46} {}",
        component.name,
        component.role.to_string(),
        component.port,
        component.image,
        if volumes.is_empty() { "-".to_string() } else { volumes }
    )
}
