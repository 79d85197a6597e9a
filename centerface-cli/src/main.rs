use std::fs;

use anyhow::{Context, Result, ensure};
use centerface_core::{
    DetectedObject, DetectionParams, NetworkInfo, PostprocessConfig, parse_objects,
};
use centerface_utils::{config::AppSettings, configure_telemetry, init_logging};
use clap::Parser;
use log::{LevelFilter, debug, info};
use serde::Serialize;

mod args;
mod input;

use args::ParseArgs;
use input::TensorDump;

/// One detection as it appears in the JSON report.
#[derive(Debug, Serialize)]
struct DetectionRecord {
    left: f32,
    top: f32,
    width: f32,
    height: f32,
    confidence: f32,
    class_id: u32,
}

impl From<&DetectedObject> for DetectionRecord {
    fn from(object: &DetectedObject) -> Self {
        Self {
            left: object.left,
            top: object.top,
            width: object.width,
            height: object.height,
            confidence: object.confidence,
            class_id: object.class_id,
        }
    }
}

#[derive(Debug, Serialize)]
struct DetectionReport {
    source: String,
    network_width: u32,
    network_height: u32,
    detections: Vec<DetectionRecord>,
}

fn main() -> Result<()> {
    let args = ParseArgs::parse();
    init_logging(LevelFilter::Info)?;

    let mut settings = match &args.config {
        Some(path) => AppSettings::load_from_path(path)?,
        None => AppSettings::default(),
    };
    apply_overrides(&mut settings, &args);
    configure_telemetry(settings.telemetry.enabled, settings.telemetry.level_filter());

    let dump = TensorDump::load(&args.tensors)?;
    let network = resolve_network(&settings, &args, &dump)?;
    debug!(
        "parsing {} layer(s) at {}x{}",
        dump.layers.len(),
        network.width,
        network.height
    );

    let config = PostprocessConfig::from(&settings.detection);
    let layers = dump.output_layers();
    let mut objects = Vec::new();
    parse_objects(
        &layers,
        network,
        &DetectionParams::default(),
        &config,
        &mut objects,
    )
    .context("failed to parse CenterFace output tensors")?;
    info!("{} face(s) detected", objects.len());

    let report = DetectionReport {
        source: args.tensors.display().to_string(),
        network_width: network.width,
        network_height: network.height,
        detections: objects.iter().map(DetectionRecord::from).collect(),
    };
    let payload =
        serde_json::to_string_pretty(&report).context("failed to serialize detection report")?;
    match &args.json {
        Some(path) => {
            fs::write(path, payload)
                .with_context(|| format!("failed to write report to {}", path.display()))?;
            info!("wrote detection report to {}", path.display());
        }
        None => println!("{payload}"),
    }

    Ok(())
}

/// Fold command-line overrides into the loaded settings.
fn apply_overrides(settings: &mut AppSettings, args: &ParseArgs) {
    if let Some(width) = args.width {
        settings.input.width = width;
    }
    if let Some(height) = args.height {
        settings.input.height = height;
    }
    if let Some(threshold) = args.score_threshold {
        settings.detection.score_threshold = threshold;
    }
    if let Some(threshold) = args.nms_threshold {
        settings.detection.nms_threshold = threshold;
    }
    if args.telemetry {
        settings.telemetry.enabled = true;
    }
    if let Some(level) = &args.telemetry_level {
        settings.telemetry.level = level.clone();
    }
}

/// Network resolution priority: command line, then the dump, then settings.
fn resolve_network(
    settings: &AppSettings,
    args: &ParseArgs,
    dump: &TensorDump,
) -> Result<NetworkInfo> {
    let from_dump = |dumped: u32, configured: u32| if dumped > 0 { dumped } else { configured };
    let width = args
        .width
        .unwrap_or_else(|| from_dump(dump.width, settings.input.width));
    let height = args
        .height
        .unwrap_or_else(|| from_dump(dump.height, settings.input.height));
    ensure!(
        width > 0 && height > 0,
        "network resolution must be positive (got {width}x{height})"
    );
    Ok(NetworkInfo::new(width, height))
}
