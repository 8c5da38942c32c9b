use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::generator::render::RenderFormat;

#[derive(Parser)]
#[command(name = "imaging-chart")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Generate Kubernetes manifests for the imaging platform")]
#[command(long_about = "Turns a single configuration file into the namespace, config map, secret, volume claims, deployments and services of a complete medical imaging platform instance. The output is meant to be applied with kubectl.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate the manifests
    Generate {
        /// Configuration file (YAML, TOML or JSON). Defaults to imaging-chart.* in the current directory
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Override the target namespace
        #[arg(short, long)]
        namespace: Option<String>,

        /// Output file, or directory with --split. Prints to stdout when omitted
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: OutputFormat,

        /// Write one file per object into the output directory
        #[arg(long, requires = "output")]
        split: bool,

        /// Show what would be written without touching the filesystem
        #[arg(long)]
        dry_run: bool,
    },

    /// Check a configuration file without generating anything
    Validate {
        /// Configuration file (YAML, TOML or JSON)
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
    },

    /// Show the components that would be deployed
    Topology {
        /// Configuration file (YAML, TOML or JSON)
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Yaml,
    Json,
}

impl From<OutputFormat> for RenderFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Yaml => RenderFormat::Yaml,
            OutputFormat::Json => RenderFormat::Json,
        }
    }
}

impl Cli {
    /// Initialize logging based on verbosity level
    pub fn init_logging(&self) {
        if self.quiet {
            return;
        }

        let level = match self.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        };

        env_logger::Builder::from_default_env()
            .filter_level(level)
            .init();
    }
}
