//! `ailab plan` - the full launch sequence against a dry-run engine

use crate::cli::{OutputFormat, PlanArgs};
use crate::dry_run::{DryRunEngine, StaticConnection, StaticGpus};
use crate::error::CliError;
use ailab_inference::{
    ContainerSpec, ExtensionConfiguration, GpuEnumerator, GpuInfo, GpuVendor, HostGpuEnumerator,
    InferenceProvider, InferenceServer, InferenceServerConfig, LlamaCppProvider, ModelInfo,
    TaskRegistry, VmType,
};
use colored::Colorize;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct PlanReport {
    pub vm_type: VmType,
    pub image: String,
    pub spec: ContainerSpec,
    pub server: InferenceServer,
}

pub async fn run(
    args: &PlanArgs,
    configuration: ExtensionConfiguration,
    output: OutputFormat,
) -> Result<(), CliError> {
    let report = plan(args, configuration).await?;

    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print_report(&report)?,
    }
    Ok(())
}

pub async fn plan(
    args: &PlanArgs,
    mut configuration: ExtensionConfiguration,
) -> Result<PlanReport, CliError> {
    let vm_type: VmType = args.vm_type.parse().map_err(CliError::InvalidArgument)?;
    let config = server_config(args)?;

    let gpus: Arc<dyn GpuEnumerator> = match args.gpu_vendor.as_deref() {
        Some(vendor) => {
            let vendor: GpuVendor = vendor.parse().map_err(CliError::InvalidArgument)?;
            configuration.experimental_gpu = true;
            Arc::new(StaticGpus(vec![GpuInfo::new(vendor, args.gpu_model.clone())]))
        }
        None => {
            configuration.experimental_gpu |= args.detect_gpu;
            Arc::new(HostGpuEnumerator::new())
        }
    };

    let engine = Arc::new(DryRunEngine::default());
    let images = configuration.images.clone();
    let provider = LlamaCppProvider::new(
        Arc::new(StaticConnection::new(vm_type)),
        gpus,
        Arc::new(configuration),
        engine.clone(),
        Arc::new(TaskRegistry::new()),
    )
    .with_images(images);

    let server = provider.perform(&config).await?;
    let spec = engine
        .created_spec()
        .ok_or_else(|| CliError::ConfigError("no container was created".to_string()))?;
    let image = engine.pulled_images().pop().unwrap_or_default();

    Ok(PlanReport {
        vm_type,
        image,
        spec,
        server,
    })
}

fn server_config(args: &PlanArgs) -> Result<InferenceServerConfig, CliError> {
    let mut config = match &args.server_config {
        Some(path) => {
            let mut config: InferenceServerConfig =
                serde_json::from_str(&std::fs::read_to_string(path)?)?;
            // The dry run only knows its own connection
            config.connection = None;
            config
        }
        None => InferenceServerConfig::new(args.port, model_from_flags(args)?),
    };

    // Flags refine a config file instead of being dropped
    for model in &mut config.models {
        for (key, value) in &args.properties {
            model.properties.insert(key.clone(), value.clone());
        }
    }
    if let Some(image) = &args.image {
        config.image = Some(image.clone());
    }
    if let Some(layers) = args.gpu_layers {
        config.gpu_layers = Some(layers);
    }
    config.labels.extend(args.labels.iter().cloned());
    Ok(config)
}

fn model_from_flags(args: &PlanArgs) -> Result<ModelInfo, CliError> {
    let file = args.model_file.as_ref().ok_or_else(|| {
        CliError::InvalidArgument("--model-file or --server-config is required".to_string())
    })?;
    let id = match &args.model_id {
        Some(id) => id.clone(),
        None => file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .ok_or_else(|| CliError::InvalidArgument(format!("{} has no file name", file.display())))?,
    };
    Ok(ModelInfo::new(id).with_file_path(file))
}

fn print_report(report: &PlanReport) -> Result<(), CliError> {
    let accelerated = !report.spec.host_config.device_requests.is_empty();
    println!("{:<10} {}", "backend".bold(), report.vm_type);
    println!("{:<10} {}", "image".bold(), report.image);
    println!(
        "{:<10} {}",
        "gpu".bold(),
        match report.spec.labels.get(ailab_inference::acceleration::GPU_LABEL) {
            Some(model) if accelerated => model.green().to_string(),
            _ => "none (CPU only)".yellow().to_string(),
        }
    );
    println!(
        "{:<10} {}",
        "api".bold(),
        report
            .server
            .labels
            .get(ailab_inference::builder::API_LABEL)
            .map(String::as_str)
            .unwrap_or("-")
    );
    println!();
    println!("{}", serde_json::to_string_pretty(&report.spec)?);
    Ok(())
}
