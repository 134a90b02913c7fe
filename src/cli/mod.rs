//! # CLI Module
//!
//! Command-line interface for the photo difference detector.
//!
//! ## Usage
//! ```bash
//! # Compare two photos over their whole area
//! spot-diff compare before.jpg after.jpg
//!
//! # Only look inside a selection, more sensitive
//! spot-diff compare before.jpg after.jpg --selection 120,80,400,300 --sensitivity 70
//!
//! # JSON output
//! spot-diff compare before.jpg after.jpg --output json
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use spot_diff::core::difference::DiffReduction;
use spot_diff::core::pipeline::{
    DetectionConfig, DetectionResult, DiffPipeline, DiffPipelineBuilder,
};
use spot_diff::core::{ImageSource, SelectionRect, Sensitivity};
use spot_diff::error::{Result, SpotDiffError};
use spot_diff::events::{Event, EventChannel, PipelineEvent};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

/// spot-diff - find what changed between two photos
#[derive(Parser, Debug)]
#[command(name = "spot-diff")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compare two photos of the same scene
    Compare {
        /// Reference photo
        image1: PathBuf,

        /// Photo to compare against the reference
        image2: PathBuf,

        /// Area of the first photo to compare, as x,y,width,height
        #[arg(short = 'r', long, value_parser = clap::value_parser!(SelectionRect), allow_hyphen_values = true)]
        selection: Option<SelectionRect>,

        /// Detection sensitivity (0 = only stark changes, 100 = any change)
        #[arg(short, long, default_value = "50", allow_negative_numbers = true)]
        sensitivity: i64,

        /// Output format
        #[arg(short, long, default_value = "pretty")]
        output: OutputFormat,

        /// JSON file with detection settings
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[command(flatten)]
        tuning: Tuning,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },
}

/// Overrides applied on top of the defaults or the config file
#[derive(Args, Debug, Default)]
struct Tuning {
    /// Keypoints detected per photo
    #[arg(long)]
    max_features: Option<usize>,

    /// RANSAC inlier tolerance in pixels
    #[arg(long)]
    reprojection_threshold: Option<f64>,

    /// RANSAC random seed
    #[arg(long)]
    seed: Option<u64>,

    /// Pixel-difference reduction
    #[arg(long)]
    reduction: Option<Reduction>,

    /// Structuring element size for noise cleanup (odd)
    #[arg(long)]
    kernel_size: Option<u8>,

    /// Regions must be larger than this in both dimensions
    #[arg(long)]
    min_region_size: Option<u32>,
}

impl Tuning {
    fn apply(self, mut builder: DiffPipelineBuilder) -> DiffPipelineBuilder {
        if let Some(max_features) = self.max_features {
            builder = builder.max_features(max_features);
        }
        if let Some(threshold) = self.reprojection_threshold {
            builder = builder.reprojection_threshold(threshold);
        }
        if let Some(seed) = self.seed {
            builder = builder.seed(seed);
        }
        if let Some(reduction) = self.reduction {
            builder = builder.reduction(reduction.into());
        }
        if let Some(kernel_size) = self.kernel_size {
            builder = builder.kernel_size(kernel_size);
        }
        if let Some(min_region_size) = self.min_region_size {
            builder = builder.min_region_size(min_region_size);
        }
        builder
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Reduction {
    /// Largest per-channel difference
    MaxChannel,
    /// Luma of the per-channel difference
    Luma,
}

impl From<Reduction> for DiffReduction {
    fn from(reduction: Reduction) -> Self {
        match reduction {
            Reduction::MaxChannel => DiffReduction::MaxChannel,
            Reduction::Luma => DiffReduction::Luma,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable output with colors
    Pretty,
    /// JSON output for scripting
    Json,
    /// Minimal output (one x,y,w,h line per region)
    Minimal,
}

/// Run the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Compare {
            image1,
            image2,
            selection,
            sensitivity,
            output,
            config,
            tuning,
            verbose,
        } => run_compare(
            image1,
            image2,
            selection,
            sensitivity,
            output,
            config,
            tuning,
            verbose,
        ),
    }
}

#[allow(clippy::too_many_arguments)]
fn run_compare(
    image1: PathBuf,
    image2: PathBuf,
    selection: Option<SelectionRect>,
    sensitivity: i64,
    output: OutputFormat,
    config_path: Option<PathBuf>,
    tuning: Tuning,
    verbose: bool,
) -> Result<()> {
    let term = Term::stderr();
    let sensitivity = Sensitivity::new(sensitivity)?;

    let config = match config_path {
        Some(path) => DetectionConfig::from_json_file(&path)?,
        None => DetectionConfig::default(),
    };
    let pipeline = tuning
        .apply(DiffPipeline::builder().config(config))
        .build()?;

    // Without a selection the whole of image 1 is compared; clamping trims it
    let selection = selection.unwrap_or(SelectionRect::new(0, 0, i32::MAX, i32::MAX));

    if matches!(output, OutputFormat::Pretty) {
        term.write_line(&format!(
            "{} {}",
            style("spot-diff").bold().cyan(),
            style(concat!("v", env!("CARGO_PKG_VERSION"))).dim()
        ))
        .ok();
        term.write_line("").ok();
    }

    let (sender, receiver) = EventChannel::new();

    let spinner = if matches!(output, OutputFormat::Pretty) {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(Duration::from_millis(100));
        Some(pb)
    } else {
        None
    };

    let spinner_clone = spinner.clone();

    // Handle events in a separate thread
    let event_thread = thread::spawn(move || {
        for event in receiver.iter() {
            match event {
                Event::Pipeline(PipelineEvent::StageChanged { stage }) => {
                    if let Some(ref pb) = spinner_clone {
                        pb.set_message(format!("{}...", stage));
                    }
                }
                Event::Pipeline(PipelineEvent::Completed { .. })
                | Event::Pipeline(PipelineEvent::Failed { .. }) => {
                    if let Some(ref pb) = spinner_clone {
                        pb.finish_and_clear();
                    }
                }
                Event::Stage(stage) if verbose => {
                    if let Some(ref pb) = spinner_clone {
                        pb.println(format!("  {}", style(format!("{:?}", stage)).dim()));
                    }
                }
                _ => {}
            }
        }
    });

    let result = pipeline.detect_with_events(
        &ImageSource::from(image1.as_path()),
        &ImageSource::from(image2.as_path()),
        selection,
        sensitivity,
        &sender,
    );

    // Drop sender to signal event thread to finish
    drop(sender);
    event_thread.join().ok();

    let result = match result {
        Ok(result) => result,
        Err(error) => {
            if matches!(output, OutputFormat::Pretty) {
                print_failure(&term, &error);
            }
            return Err(error);
        }
    };

    match output {
        OutputFormat::Pretty => print_pretty_results(&term, &result, verbose),
        OutputFormat::Json => print_json_results(&result)?,
        OutputFormat::Minimal => print_minimal_results(&result),
    }

    Ok(())
}

fn print_failure(term: &Term, error: &SpotDiffError) {
    term.write_line(&format!("{} {}", style("✗").red().bold(), error))
        .ok();
    if matches!(error, SpotDiffError::Alignment(_)) {
        term.write_line(&format!(
            "  {}",
            style("The photos could not be lined up. Retake them from the same spot.").dim()
        ))
        .ok();
    }
}

fn print_pretty_results(term: &Term, result: &DetectionResult, verbose: bool) {
    let stats = &result.stats;

    term.write_line(&format!(
        "{} Comparison Complete",
        style("✓").green().bold()
    ))
    .ok();
    term.write_line("").ok();

    term.write_line(&format!(
        "  Compared a {} area of a {}x{} photo in {:.1}s",
        style(format!("{}x{}", stats.region.width, stats.region.height)).cyan(),
        stats.image_width,
        stats.image_height,
        stats.duration_ms as f64 / 1000.0
    ))
    .ok();

    if verbose {
        let alignment = &stats.alignment;
        term.write_line(&format!(
            "  {} keypoints, {} good matches, {} inliers",
            style(alignment.reference_keypoints.min(alignment.moving_keypoints)).dim(),
            style(alignment.good_matches).dim(),
            style(alignment.inliers).dim()
        ))
        .ok();
        term.write_line(&format!(
            "  threshold {}, {} changed pixels, {} contours",
            style(stats.threshold).dim(),
            style(stats.foreground_pixels).dim(),
            style(stats.contours).dim()
        ))
        .ok();
    }

    term.write_line("").ok();

    if result.diffs.is_empty() {
        term.write_line(&format!(
            "  {} No differences found",
            style("=").green()
        ))
        .ok();
        return;
    }

    term.write_line(&format!(
        "{}",
        style(format!("{} difference(s):", result.diffs.len()))
            .bold()
            .underlined()
    ))
    .ok();
    term.write_line("").ok();

    for (i, rect) in result.diffs.iter().enumerate() {
        term.write_line(&format!(
            "  {} x={} y={} {}",
            style(format!("#{}", i + 1)).bold(),
            rect.x,
            rect.y,
            style(format!("{}x{}", rect.width, rect.height)).yellow()
        ))
        .ok();
    }
}

fn print_json_results(result: &DetectionResult) -> Result<()> {
    let json = serde_json::to_string_pretty(result)
        .map_err(|e| SpotDiffError::Config(format!("cannot serialize result: {}", e)))?;
    println!("{}", json);
    Ok(())
}

fn print_minimal_results(result: &DetectionResult) {
    for rect in &result.diffs {
        println!("{}", rect);
    }
}
