// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Flatscan — command-line document capture correction.
//
// Entry point. Initialises logging, loads the scan configuration, and runs
// one subcommand against image files on disk.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use flatscan_core::config::ScanConfig;
use flatscan_core::error::Result;
use flatscan_core::geometry::NormalizedQuad;
use flatscan_core::human_errors::humanize_error;
use flatscan_core::types::{CaptureStatus, EnhancementMode};
use flatscan_document::RasterImage;
use flatscan_pipeline::{CaptureRequest, CaptureSession, CornerSource, ScanContext, spawn_capture};
use tracing::info;

#[derive(Parser)]
#[command(name = "flatscan")]
#[command(about = "Straighten, crop and clean up photographed documents")]
#[command(version)]
struct Cli {
    /// Scan configuration file (JSON). Defaults apply when omitted.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the detected page outline as `tlX,tlY,trX,trY,brX,brY,blX,blY`
    Detect {
        #[arg(value_name = "IMAGE")]
        image: PathBuf,
    },
    /// Rectify and enhance a photographed page
    Process {
        #[arg(value_name = "IMAGE")]
        image: PathBuf,

        /// Where to write the processed page (format from extension)
        #[arg(short, long, value_name = "OUT")]
        output: PathBuf,

        /// Page corners in interchange form; detected when omitted
        #[arg(long, value_name = "CORNERS")]
        corners: Option<String>,

        #[arg(long, value_enum, default_value_t = Mode::Finalize)]
        mode: Mode,

        /// Directory holding the OCR models; prints recognized text
        #[cfg(feature = "ocr")]
        #[arg(long, value_name = "DIR")]
        ocr_models: Option<PathBuf>,
    },
    /// Write the default configuration to FILE
    InitConfig {
        #[arg(value_name = "FILE")]
        path: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Detect or use the given corners, rectify, then binarize
    Finalize,
    /// No rectification: deskew, then binarize
    Auto,
    /// Find the outline during enhancement, deskew if none, then binarize
    FullAuto,
}

impl Mode {
    fn corner_source(self, corners: Option<String>) -> CornerSource {
        match (corners, self) {
            (Some(text), _) => CornerSource::Interchange(text),
            (None, Mode::Finalize) => CornerSource::DetectOrDefault,
            (None, Mode::Auto) => CornerSource::Unrectified {
                mode: EnhancementMode::AutoEnhance,
            },
            (None, Mode::FullAuto) => CornerSource::Unrectified {
                mode: EnhancementMode::FullAuto,
            },
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            let human = humanize_error(&e);
            eprintln!("{}\n{}", human.message, human.suggestion);
            tracing::debug!(error = %e, "command failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Detect { image } => {
            let ctx = ScanContext::init(config)?;
            let frame = RasterImage::open(&image)?;
            match ctx.detector().detect(&frame) {
                Some(quad) => println!("{quad}"),
                None => {
                    println!("{}", NormalizedQuad::default_fallback());
                    eprintln!("no page outline found; printed the default outline");
                }
            }
            ctx.shutdown();
            Ok(ExitCode::SUCCESS)
        }
        Command::Process {
            image,
            output,
            corners,
            mode,
            #[cfg(feature = "ocr")]
            ocr_models,
        } => {
            let ctx = ScanContext::init(config)?;
            #[cfg(feature = "ocr")]
            let ctx = match ocr_models {
                Some(dir) => {
                    let recognizer = flatscan_document::OcrsRecognizer::from_model_dir(dir)?;
                    ctx.with_recognizer(Arc::new(recognizer))
                }
                None => ctx,
            };
            let ctx = Arc::new(ctx);

            let frame = RasterImage::open(&image)?;
            info!(
                path = %image.display(),
                width = frame.width(),
                height = frame.height(),
                "image loaded"
            );

            let request = CaptureRequest::new(frame, mode.corner_source(corners));
            let handle = spawn_capture(Arc::clone(&ctx), request);
            let mut session = CaptureSession::new();
            if session.complete(handle).await != CaptureStatus::Completed {
                if let Some(human) = session.last_error() {
                    eprintln!("{}\n{}", human.message, human.suggestion);
                }
                return Ok(ExitCode::FAILURE);
            }

            if let Some(capture) = session.last_capture() {
                capture.image.save(&output)?;
                if let Some(corners) = capture.corners {
                    info!(%corners, "page outline used");
                }
                println!("{}", output.display());

                if ctx.has_recognizer() {
                    let text = ctx.recognize(&capture.image)?;
                    println!("{}", text.text);
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::InitConfig { path } => {
            ScanConfig::default().persist(&path)?;
            println!("{}", path.display());
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<ScanConfig> {
    match path {
        Some(path) => ScanConfig::load(path),
        None => Ok(ScanConfig::default()),
    }
}
