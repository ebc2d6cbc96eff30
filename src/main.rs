use clap::Parser;
use log::{error, info};
use std::error::Error;
use std::process::ExitCode;

use coco2tensor::{convert_dataset, Args};

fn main() -> ExitCode {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = match args.to_convert_config() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("Starting the conversion process...");

    match convert_dataset(&config) {
        Ok(stats) => {
            info!(
                "Conversion process completed successfully ({} images).",
                stats.images_written
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            let mut message = e.to_string();
            let mut source = e.source();
            while let Some(cause) = source {
                message.push_str(&format!(": {}", cause));
                source = cause.source();
            }
            error!("Conversion failed: {}", message);
            ExitCode::FAILURE
        }
    }
}
