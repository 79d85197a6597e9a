//! Command-line argument definitions for centerface-cli.

use clap::{ArgAction, Parser};
use std::path::PathBuf;

/// Parse CenterFace output tensors into face detections.
#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct ParseArgs {
    /// Path to a JSON dump of the model's output tensors.
    #[arg(short, long)]
    pub tensors: PathBuf,

    /// Optional settings JSON (defaults to built-in CenterFace parameters).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override network input width (pixels).
    #[arg(long)]
    pub width: Option<u32>,

    /// Override network input height (pixels).
    #[arg(long)]
    pub height: Option<u32>,

    /// Override score threshold.
    #[arg(long)]
    pub score_threshold: Option<f32>,

    /// Override NMS threshold.
    #[arg(long)]
    pub nms_threshold: Option<f32>,

    /// Write detections to a JSON file instead of stdout.
    #[arg(long)]
    pub json: Option<PathBuf>,

    /// Enable telemetry timing logs (defaults to settings file).
    #[arg(long, action = ArgAction::SetTrue)]
    pub telemetry: bool,

    /// Override telemetry logging level (error, warn, info, debug, trace).
    #[arg(long, value_name = "LEVEL")]
    pub telemetry_level: Option<String>,
}
