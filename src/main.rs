use anyhow::{Context, Result};
use clap::Parser;
use image_convert::app::{App, Config};
use image_convert::settings::{ConversionMode, ConversionSettings, VersionedSettings};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "image-convert")]
#[command(about = "Resize and re-encode an image into another format")]
struct CliArgs {
    /// Image file to convert.
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Target format, e.g. webp, png, jpeg.
    #[arg(short, long)]
    format: Option<String>,

    #[arg(long, default_value_t = 1920)]
    width: u32,

    #[arg(long, default_value_t = 1080)]
    height: u32,

    /// Stretch to exactly WIDTHxHEIGHT instead of fitting inside it.
    #[arg(long)]
    no_aspect_ratio: bool,

    /// format-only, resize or compress.
    #[arg(long, default_value = "resize", value_parser = parse_mode_arg)]
    mode: ConversionMode,

    #[arg(long)]
    keep_original_size: bool,

    /// Scale relative to the source dimensions, in percent.
    #[arg(long, value_name = "PERCENT")]
    scale: Option<f64>,

    #[arg(short, long)]
    quality: Option<u8>,

    #[arg(long, value_name = "MB")]
    max_size_mb: Option<f64>,

    #[arg(long)]
    lossless: bool,

    /// JSON settings file in any supported schema version. Overrides the
    /// individual flags.
    #[arg(long, value_name = "FILE")]
    settings: Option<PathBuf>,

    #[arg(short, long)]
    output_dir: Option<PathBuf>,
}

fn parse_mode_arg(input: &str) -> std::result::Result<ConversionMode, String> {
    input.parse::<ConversionMode>().map_err(|e| e.to_string())
}

impl CliArgs {
    fn settings(&self, config: &Config) -> Result<ConversionSettings> {
        if let Some(path) = &self.settings {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading settings from {}", path.display()))?;
            return Ok(VersionedSettings::from_json(&json)?.into_canonical());
        }

        let format = self
            .format
            .clone()
            .unwrap_or_else(|| config.default_format.clone());
        let mut settings = ConversionSettings::new(format, self.width, self.height)
            .with_aspect_ratio(!self.no_aspect_ratio)
            .with_mode(self.mode)
            .with_quality(self.quality.unwrap_or(config.default_quality))
            .with_lossless(self.lossless);
        settings.keep_original_size = self.keep_original_size;
        settings.scale_percentage = self.scale;
        settings.max_size_mb = self.max_size_mb;
        Ok(settings)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "image_convert=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = CliArgs::parse();

    let mut config = Config::from_env()?;
    if let Some(dir) = &args.output_dir {
        config.output_dir = dir.clone();
    }
    let settings = args.settings(&config)?;

    let app = App::new(&config)?;
    match app.convert_file(&args.input, &settings).await {
        Ok(outcome) => {
            info!(
                "Converted {} -> {} ({})",
                args.input.display(),
                outcome.output_path.display(),
                outcome.media_type
            );
            println!("{}", outcome.output_path.display());
            Ok(())
        }
        Err(e) => {
            error!("Conversion failed: {}", e);
            std::process::exit(1);
        }
    }
}
