use crate::{
    cli::OutputFormat,
    config,
    generator::{self, render},
};
use colored::Colorize;
use std::path::PathBuf;

fn load(config_path: Option<PathBuf>) -> crate::Result<config::types::ChartProps> {
    let path = config::resolve_config_path(config_path.as_deref())?;
    config::load_props(&path)
}

pub fn handle_generate(
    config_path: Option<PathBuf>,
    namespace: Option<String>,
    output: Option<PathBuf>,
    format: OutputFormat,
    split: bool,
    dry_run: bool,
) -> crate::Result<()> {
    let mut props = load(config_path)?;
    if let Some(namespace) = namespace {
        props.namespace = Some(namespace);
    }

    let chart = generator::build_chart(props)?;
    let format: render::RenderFormat = format.into();

    if split {
        // clap enforces --output together with --split
        let Some(dir) = output else {
            return Ok(());
        };
        if dry_run {
            eprintln!("{}", "--- files (dry run) ---".dimmed());
            for path in render::split_paths(&chart, &dir, format) {
                println!("{}", path.display());
            }
            return Ok(());
        }
        let paths = render::write_split(&chart, &dir, format)?;
        eprintln!(
            "{} Wrote {} manifests to {}",
            "✅".green(),
            paths.len(),
            dir.display()
        );
        return Ok(());
    }

    let content = render::render(&chart, format)?;
    match output {
        Some(path) if !dry_run => {
            std::fs::write(&path, content)?;
            eprintln!(
                "{} Wrote {} manifests to {}",
                "✅".green(),
                chart.manifests().len(),
                path.display()
            );
        }
        Some(path) => {
            let banner = format!("--- {} (dry run) ---", path.display());
            eprintln!("{}", banner.as_str().dimmed());
            print!("{content}");
        }
        None => print!("{content}"),
    }

    Ok(())
}

pub fn handle_validate(config_path: Option<PathBuf>) -> crate::Result<()> {
    println!("🔍 Validating configuration...");
    let props = load(config_path)?;
    let chart = generator::build_chart(props)?;
    println!(
        "{} Configuration is valid: {} objects in namespace {}",
        "✅".green(),
        chart.manifests().len(),
        chart.namespace().bold()
    );
    Ok(())
}
