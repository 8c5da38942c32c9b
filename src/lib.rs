//! # imaging-chart
//!
//! Generates the Kubernetes manifests of a multi-service medical imaging
//! platform from a single configuration object.
//!
//! ## Features
//!
//! - **Validation**: supplied database and volume maps must name every expected entry
//! - **Default layering**: partial configuration is completed with built-in defaults
//! - **Fixed topology**: databases, broker, search index, identity provider and microservices
//! - **External backends**: point at existing databases or an identity provider instead of deploying them
//!
//! ## Example
//!
//! ```rust,no_run
//! use imaging_chart::{build_chart, config, render_yaml};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let props = config::load_props(Path::new("imaging-chart.yaml"))?;
//! let chart = build_chart(props)?;
//! println!("{}", render_yaml(&chart)?);
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod generator;
pub mod handlers;

// Re-export commonly used types and functions
pub use config::types::{ChartProps, ChartSettings};
pub use error::{ChartError, ConfigError, Result};
pub use generator::render::{render_json, render_yaml, write_split};
pub use generator::{Chart, Manifest, build_chart};
use cli::Commands;

pub fn run_command(command: Commands) -> Result<()> {
    match command {
        Commands::Generate {
            config,
            namespace,
            output,
            format,
            split,
            dry_run,
        } => handlers::handle_generate(config, namespace, output, format, split, dry_run),
        Commands::Validate { config } => handlers::handle_validate(config),
        Commands::Topology { config } => handlers::handle_topology(config),
    }
}
