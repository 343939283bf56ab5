//! `ailab probe` - what the host can accelerate, per backend

use crate::cli::OutputFormat;
use crate::error::CliError;
use ailab_inference::{
    CdiProbe, ExtensionConfiguration, GpuEnumerator, GpuInfo, HostGpuEnumerator, VmType,
    recipe_for, select_gpu,
};
use colored::Colorize;
use comfy_table::{Cell, Color, ContentArrangement, Table};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct BackendVerdict {
    pub vm_type: VmType,
    pub recipe: Option<String>,
    pub reason: Option<String>,
    pub image: String,
}

#[derive(Debug, Serialize)]
pub struct ProbeReport {
    pub gpus: Vec<GpuInfo>,
    pub selected_gpu: Option<GpuInfo>,
    pub cdi_location: Option<String>,
    pub backends: Vec<BackendVerdict>,
}

pub async fn run(
    configuration: &ExtensionConfiguration,
    all: bool,
    output: OutputFormat,
) -> Result<(), CliError> {
    let gpus = HostGpuEnumerator::new().list_gpus().await?;
    let report = build_report(gpus, &CdiProbe::new(), configuration, all);

    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print_report(&report),
    }
    Ok(())
}

pub fn build_report(
    gpus: Vec<GpuInfo>,
    cdi: &CdiProbe,
    configuration: &ExtensionConfiguration,
    all: bool,
) -> ProbeReport {
    let selected = select_gpu(&gpus).cloned();

    let backends = VmType::ALL
        .into_iter()
        .filter_map(|vm_type| {
            let verdict = selected.as_ref().map(|gpu| recipe_for(vm_type, gpu, cdi));
            let (recipe, reason) = match &verdict {
                Some(Ok(recipe)) => (Some(recipe.to_string()), None),
                Some(Err(unsupported)) => (None, Some(unsupported.reason.to_string())),
                None => (None, Some("no GPU detected".to_string())),
            };
            if recipe.is_none() && !all {
                return None;
            }
            Some(BackendVerdict {
                vm_type,
                recipe,
                reason,
                image: configuration
                    .images
                    .select(vm_type, selected.as_ref(), cdi)
                    .to_string(),
            })
        })
        .collect();

    ProbeReport {
        cdi_location: cdi.configured_location().map(str::to_string),
        gpus,
        selected_gpu: selected,
        backends,
    }
}

fn print_report(report: &ProbeReport) {
    if report.gpus.is_empty() {
        println!("{}", "No GPU detected".yellow());
    }
    for gpu in &report.gpus {
        let marker = if Some(gpu) == report.selected_gpu.as_ref() {
            "*".green().to_string()
        } else {
            " ".to_string()
        };
        println!("{marker} {} ({})", gpu.model, gpu.vendor);
    }
    match &report.cdi_location {
        Some(location) => println!("NVIDIA CDI: {}", location.green()),
        None => println!("NVIDIA CDI: {}", "not configured".yellow()),
    }
    println!();

    let mut table = Table::new();
    table
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Backend", "Recipe", "Image"]);
    for verdict in &report.backends {
        let recipe = match (&verdict.recipe, &verdict.reason) {
            (Some(recipe), _) => Cell::new(recipe).fg(Color::Green),
            (None, Some(reason)) => Cell::new(format!("cpu only: {reason}")).fg(Color::Yellow),
            (None, None) => Cell::new("cpu only"),
        };
        table.add_row(vec![
            Cell::new(verdict.vm_type.as_str()),
            recipe,
            Cell::new(&verdict.image),
        ]);
    }
    println!("{table}");
}
