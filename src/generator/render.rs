//! Serialization of a [`Chart`] for `kubectl apply`.

use super::{Chart, Manifest};
use crate::error::Result;
use log::info;
use std::fs;
use std::path::{Path, PathBuf};

/// Output format of the rendered chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderFormat {
    /// Multi-document YAML stream (default)
    #[default]
    Yaml,
    /// A single `v1` `List` object
    Json,
}

impl RenderFormat {
    pub fn extension(self) -> &'static str {
        match self {
            RenderFormat::Yaml => "yaml",
            RenderFormat::Json => "json",
        }
    }
}

pub fn render(chart: &Chart, format: RenderFormat) -> Result<String> {
    match format {
        RenderFormat::Yaml => render_yaml(chart),
        RenderFormat::Json => render_json(chart),
    }
}

/// All objects as YAML documents separated by `---`.
pub fn render_yaml(chart: &Chart) -> Result<String> {
    let mut output = String::new();
    for (i, manifest) in chart.manifests().iter().enumerate() {
        if i > 0 {
            output.push_str("---\n");
        }
        output.push_str(&serde_yaml::to_string(manifest)?);
    }
    Ok(output)
}

pub fn render_json(chart: &Chart) -> Result<String> {
    let list = serde_json::json!({
        "apiVersion": "v1",
        "kind": "List",
        "items": chart.manifests(),
    });
    Ok(serde_json::to_string_pretty(&list)?)
}

/// File name of an object in split output, e.g. `05-deployment-users.yaml`.
pub fn split_file_name(index: usize, manifest: &Manifest, format: RenderFormat) -> String {
    format!(
        "{:02}-{}-{}.{}",
        index,
        manifest.kind().to_lowercase(),
        manifest.name(),
        format.extension()
    )
}

/// Paths [`write_split`] would create under `dir`.
pub fn split_paths(chart: &Chart, dir: &Path, format: RenderFormat) -> Vec<PathBuf> {
    chart
        .manifests()
        .iter()
        .enumerate()
        .map(|(i, manifest)| dir.join(split_file_name(i, manifest, format)))
        .collect()
}

fn render_manifest(manifest: &Manifest, format: RenderFormat) -> Result<String> {
    match format {
        RenderFormat::Yaml => Ok(serde_yaml::to_string(manifest)?),
        RenderFormat::Json => Ok(serde_json::to_string_pretty(manifest)? + "\n"),
    }
}

/// Write one file per object into `dir`, creating it if needed.
pub fn write_split(chart: &Chart, dir: &Path, format: RenderFormat) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;
    let paths = split_paths(chart, dir, format);
    for (manifest, path) in chart.manifests().iter().zip(&paths) {
        fs::write(path, render_manifest(manifest, format)?)?;
    }
    info!("Wrote {} files to {}", paths.len(), dir.display());
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::ChartProps;
    use crate::generator::build_chart;
    use tempfile::TempDir;

    fn chart() -> Chart {
        build_chart(ChartProps {
            url: "https://x.test/".to_string(),
            viewer_url: "https://y.test/".to_string(),
            admin_email: "admin@x.test".to_string(),
            identity_admin_password: "secret".to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_yaml_stream_has_one_document_per_object() {
        let chart = chart();
        let yaml = render_yaml(&chart).unwrap();
        assert_eq!(yaml.matches("\n---\n").count() + 1, chart.manifests().len());
        assert!(yaml.starts_with("apiVersion: v1\nkind: Namespace\n"));
        assert!(yaml.contains("kind: Deployment"));
        assert!(yaml.contains("apiVersion: apps/v1"));

        // Every document parses back into a typed object
        for doc in yaml.split("\n---\n") {
            let value: serde_yaml::Value = serde_yaml::from_str(doc).unwrap();
            assert!(value.get("kind").is_some());
        }
    }

    #[test]
    fn test_json_list() {
        let chart = chart();
        let json = render_json(&chart).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["kind"], "List");
        assert_eq!(value["items"].as_array().unwrap().len(), chart.manifests().len());
        assert_eq!(value["items"][1]["kind"], "ConfigMap");
        assert_eq!(value["items"][1]["data"]["URL_HOST"], "x.test");
    }

    #[test]
    fn test_write_split() {
        let chart = chart();
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("manifests");
        let paths = write_split(&chart, &out, RenderFormat::Yaml).unwrap();
        assert_eq!(paths.len(), chart.manifests().len());
        assert_eq!(
            paths[0].file_name().unwrap().to_str().unwrap(),
            "00-namespace-imaging.yaml"
        );
        let content = fs::read_to_string(&paths[1]).unwrap();
        assert!(content.contains("kind: ConfigMap"));
    }

    #[test]
    fn test_write_split_json() {
        let chart = chart();
        let dir = TempDir::new().unwrap();
        let paths = write_split(&chart, dir.path(), RenderFormat::Json).unwrap();
        assert_eq!(
            paths[1].file_name().unwrap().to_str().unwrap(),
            "01-configmap-imaging-config.json"
        );
        for path in &paths {
            assert_eq!(path.extension().unwrap(), "json");
            let value: serde_json::Value =
                serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
            assert!(value["kind"].is_string());
        }
    }
}
