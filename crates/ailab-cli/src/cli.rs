//! CLI command definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// AI Lab CLI - plan llama.cpp inference containers
#[derive(Parser)]
#[command(name = "ailab")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(short = 'o', long, global = true, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,

    /// Extension configuration file (yaml, toml, json, ini, ron, json5)
    #[arg(short = 'c', long, global = true, env = "AILAB_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    #[default]
    Text,
    /// JSON output for automation
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run the launch sequence against a dry-run engine and print the container spec
    Plan(PlanArgs),

    /// Enumerate host GPUs and show which acceleration recipe each backend would use
    Probe {
        /// Also show backends without any acceleration recipe
        #[arg(long)]
        all: bool,
    },

    /// Show the effective serving image catalog
    Images,
}

#[derive(clap::Args, Debug, Clone)]
pub struct PlanArgs {
    /// Model weights file on the host
    #[arg(long, required_unless_present = "server_config")]
    pub model_file: Option<PathBuf>,

    /// Model identifier (defaults to the file stem)
    #[arg(long)]
    pub model_id: Option<String>,

    /// Model property as key=value (repeatable), e.g. chatFormat=openchat
    #[arg(long = "property", value_parser = parse_key_val)]
    pub properties: Vec<(String, String)>,

    /// Host port to publish the server on
    #[arg(short, long, default_value_t = 8000)]
    pub port: u16,

    /// Virtualization backend of the connection (unknown, wsl, libkrun, ...)
    #[arg(long, default_value = "unknown")]
    pub vm_type: String,

    /// Simulate a GPU of this vendor instead of enumerating the host
    #[arg(long)]
    pub gpu_vendor: Option<String>,

    /// Model name of the simulated GPU
    #[arg(long, default_value = "simulated GPU")]
    pub gpu_model: String,

    /// Enumerate host GPUs even if the configuration does not enable them
    #[arg(long, conflicts_with = "gpu_vendor")]
    pub detect_gpu: bool,

    /// Layers to offload to the GPU
    #[arg(long)]
    pub gpu_layers: Option<u32>,

    /// Use this image instead of the selected one
    #[arg(long)]
    pub image: Option<String>,

    /// Container label as key=value (repeatable)
    #[arg(long = "label", value_parser = parse_key_val)]
    pub labels: Vec<(String, String)>,

    /// Read the server config from a JSON file; --image, --gpu-layers, --label
    /// and --property are applied on top of it
    #[arg(long)]
    pub server_config: Option<PathBuf>,
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got `{s}`"))?;
    if key.is_empty() {
        return Err(format!("empty key in `{s}`"));
    }
    Ok((key.to_string(), value.to_string()))
}
