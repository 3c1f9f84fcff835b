// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// flatscan — command-line front end for the scan pipeline.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use flatscan_core::{ScanConfig, TextBlock};
use flatscan_document::{FixedTextDetector, ProcessedDocument, ScanPipeline};
use tracing::{info, warn};

/// Flatten photographed pages into scans and PDFs.
#[derive(Debug, Parser)]
#[command(name = "flatscan", version, about)]
struct Cli {
    /// JSON file overriding the default pipeline settings.
    #[arg(long, global = true, env = "FLATSCAN_CONFIG")]
    config: Option<PathBuf>,

    /// Locate text with the OCR engine, using models from the ocrs cache.
    #[cfg(feature = "ocr")]
    #[arg(long, global = true)]
    ocr: bool,

    /// Directory holding the OCR models; implies `--ocr`.
    #[cfg(feature = "ocr")]
    #[arg(long, global = true)]
    ocr_models: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Rectify and enhance a page photo, writing a JPEG.
    Process {
        input: PathBuf,
        /// Output path (defaults to `<input>.scan.jpg`).
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Known text region as `left,top,right,bottom`; repeatable.
        #[arg(long = "hint", value_parser = parse_block)]
        hints: Vec<TextBlock>,
        /// Print the run report as JSON on stdout.
        #[arg(long)]
        report: bool,
    },
    /// Place a photo on a single PDF page.
    Pdf {
        input: PathBuf,
        /// Output path (defaults to `<input>.pdf`).
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Document title stored in the PDF metadata.
        #[arg(long, default_value = "Scanned Document")]
        title: String,
    },
    /// Print the detected document corners as JSON.
    Detect {
        input: PathBuf,
        /// Known text region as `left,top,right,bottom`; repeatable.
        #[arg(long = "hint", value_parser = parse_block)]
        hints: Vec<TextBlock>,
    },
}

/// Parse `left,top,right,bottom` into a text block.
fn parse_block(value: &str) -> Result<TextBlock, String> {
    let parts: Vec<i32> = value
        .split(',')
        .map(|part| part.trim().parse::<i32>())
        .collect::<Result<_, _>>()
        .map_err(|err| format!("invalid coordinate in {value:?}: {err}"))?;
    match parts.as_slice() {
        &[left, top, right, bottom] if right > left && bottom > top => {
            Ok(TextBlock::new(left, top, right, bottom))
        }
        &[_, _, _, _] => Err(format!("{value:?} must satisfy left < right and top < bottom")),
        _ => Err(format!("expected left,top,right,bottom, got {value:?}")),
    }
}

fn load_config(path: Option<&Path>) -> Result<ScanConfig> {
    match path {
        Some(path) => ScanConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(ScanConfig::default()),
    }
}

fn build_pipeline(cli: &Cli, config: ScanConfig, hints: &[TextBlock]) -> Result<ScanPipeline> {
    let pipeline = ScanPipeline::new(config).context("invalid pipeline configuration")?;
    if !hints.is_empty() {
        return Ok(pipeline.with_text_detector(FixedTextDetector::new(hints.to_vec())));
    }

    #[cfg(feature = "ocr")]
    if cli.ocr || cli.ocr_models.is_some() {
        use flatscan_document::scan::OcrConfig;

        let config = cli
            .ocr_models
            .as_ref()
            .map_or_else(OcrConfig::default, OcrConfig::from_dir);
        let detector = flatscan_document::OcrsTextDetector::new(config)
            .context("failed to initialise OCR text detector")?;
        return Ok(pipeline.with_text_detector(detector));
    }

    #[cfg(not(feature = "ocr"))]
    let _ = cli;
    Ok(pipeline)
}

fn default_output(input: &Path, suffix: &str) -> PathBuf {
    let mut name = input.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

fn read_input(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}

/// Write the scan to `output`, or the input unchanged when the pipeline
/// could not produce one. Returns the report JSON for a completed scan.
fn write_scan(
    result: flatscan_core::error::Result<ProcessedDocument>,
    input: &[u8],
    output: &Path,
) -> Result<Option<String>> {
    let (bytes, report) = match result {
        Ok(document) => {
            info!(outcome = ?document.report.outcome, output = %output.display(), "Scan complete");
            let report = serde_json::to_string_pretty(&document.report)?;
            (document.jpeg, Some(report))
        }
        Err(err) => {
            warn!(error = %err, "Scan failed; copying input unchanged");
            (input.to_vec(), None)
        }
    };
    std::fs::write(output, &bytes).with_context(|| format!("failed to write {}", output.display()))?;
    Ok(report)
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;

    match &cli.command {
        Command::Process {
            input,
            output,
            hints,
            report,
        } => {
            let pipeline = build_pipeline(&cli, config, hints)?;
            let bytes = read_input(input)?;
            let output = output
                .clone()
                .unwrap_or_else(|| default_output(input, ".scan.jpg"));

            if let Some(report_json) = write_scan(pipeline.run(&bytes), &bytes, &output)? {
                if *report {
                    println!("{report_json}");
                }
            }
        }
        Command::Pdf {
            input,
            output,
            title,
        } => {
            let pipeline = build_pipeline(&cli, config, &[])?;
            let bytes = read_input(input)?;
            let output = output.clone().unwrap_or_else(|| default_output(input, ".pdf"));

            let pdf = pipeline
                .create_pdf(&bytes, title)
                .with_context(|| format!("failed to create PDF from {}", input.display()))?;
            std::fs::write(&output, &pdf)
                .with_context(|| format!("failed to write {}", output.display()))?;
            info!(output = %output.display(), "PDF written");
        }
        Command::Detect { input, hints } => {
            let pipeline = build_pipeline(&cli, config, hints)?;
            let bytes = read_input(input)?;
            let Some(corners) = pipeline
                .detect(&bytes)
                .with_context(|| format!("failed to decode {}", input.display()))?
            else {
                bail!("no document boundary found in {}", input.display());
            };
            println!("{}", serde_json::to_string_pretty(&corners)?);
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    run(Cli::parse())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hint_blocks() {
        assert_eq!(parse_block("10, 20,300,400").unwrap(), TextBlock::new(10, 20, 300, 400));
        assert!(parse_block("1,2,3").is_err());
        assert!(parse_block("a,b,c,d").is_err());
        assert!(parse_block("50,0,10,10").is_err());
    }

    #[test]
    fn cli_accepts_repeated_hints() {
        let cli = Cli::try_parse_from([
            "flatscan", "process", "page.jpg", "--hint", "0,0,10,10", "--hint", "5,5,20,20", "--report",
        ])
        .unwrap();
        match cli.command {
            Command::Process { hints, report, .. } => {
                assert_eq!(hints.len(), 2);
                assert!(report);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn default_output_appends_suffix() {
        assert_eq!(
            default_output(Path::new("/tmp/page.jpg"), ".pdf"),
            PathBuf::from("/tmp/page.jpg.pdf")
        );
    }

    #[test]
    fn failed_scan_writes_input_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("page.scan.jpg");
        let failure = Err(flatscan_core::ScanError::ProcessingFailed("JPEG encoding failed".into()));

        let report = write_scan(failure, b"original photo bytes", &output).unwrap();
        assert!(report.is_none());
        assert_eq!(std::fs::read(&output).unwrap(), b"original photo bytes");
    }

    #[test]
    fn invalid_config_values_are_rejected() {
        let config = ScanConfig { blur_sigma: 0.0, ..ScanConfig::default() };
        let cli = Cli::try_parse_from(["flatscan", "detect", "page.jpg"]).unwrap();
        let Err(err) = build_pipeline(&cli, config, &[]) else {
            panic!("zero blur sigma should be rejected");
        };
        assert!(err.to_string().contains("invalid pipeline configuration"));
    }

    #[test]
    fn missing_config_file_is_reported() {
        let err = load_config(Some(Path::new("/nonexistent/flatscan.json"))).unwrap_err();
        assert!(err.to_string().contains("failed to load config"));
    }
}
