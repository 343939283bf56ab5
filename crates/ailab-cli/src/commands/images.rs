use crate::cli::OutputFormat;
use crate::error::CliError;
use ailab_inference::{ExtensionConfiguration, ImageFlavor};
use colored::Colorize;

pub fn run(configuration: &ExtensionConfiguration, output: OutputFormat) -> Result<(), CliError> {
    let images = &configuration.images;
    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(images)?),
        OutputFormat::Text => {
            for flavor in [ImageFlavor::Default, ImageFlavor::Cuda] {
                let name = format!("{flavor:?}").to_lowercase();
                println!("{:<8} {}", name.bold(), images.image(flavor));
            }
        }
    }
    Ok(())
}
