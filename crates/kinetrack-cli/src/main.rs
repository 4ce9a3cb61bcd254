//! kinetrack CLI: track a ball or circular target through a frame sequence.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

use kinetrack::{
    auto_calibrate, detect_circle, inspect_target, to_grayscale, CircleCandidate, DetectorSet,
    Frame, FrameSource, Strategy, TargetPose, TimedFrame, TrackingConfig, TrackingSession,
};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

#[derive(Parser)]
#[command(name = "kinetrack")]
#[command(about = "Track a ball or circular target across video frames and fit its motion")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Track an object through a directory of frames (sorted by file name).
    Track(CliTrackArgs),

    /// Measure the target in a single image: scale, orientation, inclination.
    Inspect(CliInspectArgs),

    /// Print the default configuration as JSON.
    DefaultConfig,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DetectorArg {
    Ball,
    Target,
    Luminance,
    Motion,
    Hough,
}

impl From<DetectorArg> for Strategy {
    fn from(arg: DetectorArg) -> Self {
        match arg {
            DetectorArg::Ball => Strategy::Ball,
            DetectorArg::Target => Strategy::Target,
            DetectorArg::Luminance => Strategy::Luminance,
            DetectorArg::Motion => Strategy::Motion,
            DetectorArg::Hough => Strategy::Hough,
        }
    }
}

#[derive(Debug, Clone, Args)]
struct ConfigArgs {
    /// JSON configuration file; omitted fields take defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Physical diameter of the reference object in meters.
    #[arg(long)]
    real_diameter_m: Option<f64>,

    /// Run only this detector.
    #[arg(long, value_enum)]
    detector: Option<DetectorArg>,
}

#[derive(Debug, Clone, Args)]
struct CliTrackArgs {
    /// Directory containing the frames.
    #[arg(long)]
    frames: PathBuf,

    /// Frame rate used to timestamp frames.
    #[arg(long, default_value = "30.0")]
    fps: f64,

    /// Sample the first frames for a target-based scale before tracking.
    #[arg(long)]
    auto_calibrate: bool,

    /// Path to write the session report (JSON).
    #[arg(long)]
    out: PathBuf,

    #[command(flatten)]
    config: ConfigArgs,
}

#[derive(Debug, Clone, Args)]
struct CliInspectArgs {
    /// Path to the input image.
    #[arg(long)]
    image: PathBuf,

    /// Path to write the result (JSON); stdout when omitted.
    #[arg(long)]
    out: Option<PathBuf>,

    #[command(flatten)]
    config: ConfigArgs,
}

#[derive(Debug, serde::Serialize)]
struct InspectOutput {
    image_size: [u32; 2],
    #[serde(skip_serializing_if = "Option::is_none")]
    target: Option<TargetPose>,
    #[serde(skip_serializing_if = "Option::is_none")]
    circle: Option<CircleCandidate>,
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Track(args) => run_track(&args),
        Commands::Inspect(args) => run_inspect(&args),
        Commands::DefaultConfig => {
            println!("{}", TrackingConfig::default().to_json_string()?);
            Ok(())
        }
    }
}

fn build_config(args: &ConfigArgs) -> CliResult<TrackingConfig> {
    let mut config = match &args.config {
        Some(path) => {
            tracing::info!("Loading config: {}", path.display());
            TrackingConfig::from_json_file(path)?
        }
        None => TrackingConfig::default(),
    };
    if let Some(d) = args.real_diameter_m {
        if !(d > 0.0) {
            return Err(format!("--real-diameter-m must be positive, got {}", d).into());
        }
        config.calibration.real_diameter_m = d;
    }
    if let Some(detector) = args.detector {
        config.detectors = DetectorSet::only(detector.into());
    }
    Ok(config)
}

fn load_frame(path: &Path) -> CliResult<Frame> {
    let img = image::open(path).map_err(|e| -> CliError {
        format!("Failed to open image {}: {}", path.display(), e).into()
    })?;
    Ok(img.to_rgba8())
}

fn write_or_print(out: Option<&Path>, json: &str) -> CliResult<()> {
    match out {
        Some(path) => {
            std::fs::write(path, json)?;
            tracing::info!("Results written to {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

// ── track ─────────────────────────────────────────────────────────────

/// Frames read lazily from a directory, timestamped by index and frame rate.
struct DirectorySource {
    paths: std::vec::IntoIter<PathBuf>,
    fps: f64,
    index: usize,
}

impl DirectorySource {
    fn open(dir: &Path, fps: f64) -> CliResult<Self> {
        if !(fps > 0.0) {
            return Err(format!("--fps must be positive, got {}", fps).into());
        }
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            })
            .collect();
        paths.sort();
        if paths.is_empty() {
            return Err(format!("No image frames found in {}", dir.display()).into());
        }
        tracing::info!("Found {} frames in {}", paths.len(), dir.display());
        Ok(Self {
            paths: paths.into_iter(),
            fps,
            index: 0,
        })
    }
}

impl FrameSource for DirectorySource {
    fn next_frame(&mut self) -> Option<TimedFrame> {
        for path in self.paths.by_ref() {
            let t = self.index as f64 / self.fps;
            self.index += 1;
            match load_frame(&path) {
                Ok(frame) => return Some(TimedFrame::new(t, frame)),
                Err(e) => tracing::warn!("Skipping frame: {}", e),
            }
        }
        None
    }
}

fn run_track(args: &CliTrackArgs) -> CliResult<()> {
    let config = build_config(&args.config)?;
    let mut session = TrackingSession::new(config.clone());

    if args.auto_calibrate {
        let mut probe = DirectorySource::open(&args.frames, args.fps)?;
        match auto_calibrate(&mut probe, &config).and_then(|r| r.calibration) {
            Some(state) => {
                session.seed_calibration(state);
            }
            None => tracing::warn!("Auto-calibration failed; calibrating from tracked frames"),
        }
    }

    let mut source = DirectorySource::open(&args.frames, args.fps)?;
    session.run(&mut source);

    let report = session.report();
    match report.calibration {
        Some(c) => tracing::info!("Scale: {:.6} m/px", c.meters_per_pixel),
        None => tracing::warn!("No calibration; samples are in pixels only"),
    }
    if let Ok(v) = report.kinematics.mean_speed {
        tracing::info!("Mean speed: {:.4} m/s", v);
    }
    if let Ok(a) = report.kinematics.acceleration_from_position {
        tracing::info!("Acceleration: {:.4} m/s^2", a);
    }
    if let Ok(deg) = report.kinematics.inclination_deg {
        tracing::info!("Implied incline: {:.2} deg", deg);
    }

    let json = serde_json::to_string_pretty(&report)?;
    write_or_print(Some(&args.out), &json)
}

// ── inspect ───────────────────────────────────────────────────────────

fn run_inspect(args: &CliInspectArgs) -> CliResult<()> {
    let config = build_config(&args.config)?;
    tracing::info!("Loading image: {}", args.image.display());
    let frame = load_frame(&args.image)?;
    let (w, h) = frame.dimensions();
    tracing::info!("Image size: {}x{}", w, h);

    let target = inspect_target(&frame, &config);
    let circle = detect_circle(&to_grayscale(&frame), &config.preprocess, &config.hough);

    match &target {
        Some(pose) => tracing::info!(
            "Target: {} px at ({:.1}, {:.1})",
            pose.pixel_count,
            pose.centroid[0],
            pose.centroid[1]
        ),
        None => tracing::warn!("Target band not found"),
    }
    if let Some(c) = &circle {
        tracing::info!("Circle: r={:.1} at ({:.1}, {:.1}), score {:.2}", c.r, c.cx, c.cy, c.score);
    }

    let output = InspectOutput {
        image_size: [w, h],
        target,
        circle,
    };
    let json = serde_json::to_string_pretty(&output)?;
    write_or_print(args.out.as_deref(), &json)
}
