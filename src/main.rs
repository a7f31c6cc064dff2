//! Motion Recorder CLI
//!
//! Records video while motion is present.

use chrono::Utc;
use clap::{Parser, Subcommand};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use motion_recorder::{
    activity::{create_shared_log_with_persistence, PersistedStats, SharedActivityLog},
    config::Config,
    core::{
        load_manifests, KernelShape, ManifestBuilder, MonotonicClock, MotionPipeline,
        RecorderAction, SessionSummary,
    },
    sink::Y4mSink,
    source::{
        Frame, PixelFormat, RawInput, RawSourceConfig, RawVideoSource, SyntheticConfig,
        SyntheticSource,
    },
    VERSION,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const ACTIVITY_FILE: &str = "activity.json";

#[derive(Parser)]
#[command(name = "motion-recorder")]
#[command(version = VERSION)]
#[command(about = "Record video while motion is present", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch a frame source and record motion
    Run {
        /// Frame source (synthetic or raw)
        #[arg(long, default_value = "synthetic")]
        source: String,

        /// Raw input file, or - for stdin
        #[arg(long, short, default_value = "-")]
        input: String,

        /// Frame width in pixels (required for raw input)
        #[arg(long)]
        width: Option<usize>,

        /// Frame height in pixels (required for raw input)
        #[arg(long)]
        height: Option<usize>,

        /// Pixel format of raw input (gray or rgb)
        #[arg(long, default_value = "gray")]
        format: String,

        /// Read raw input at this many frames per second instead of as fast as possible
        #[arg(long)]
        pace: Option<f64>,

        /// Stop after this many frames
        #[arg(long)]
        frames: Option<u64>,

        /// Change percentage that starts a recording
        #[arg(long)]
        threshold: Option<f64>,

        /// Seconds to keep recording after the last motion
        #[arg(long)]
        window: Option<f64>,

        /// Opening kernel size in pixels
        #[arg(long)]
        kernel_size: Option<usize>,

        /// Opening kernel shape (ellipse or rect)
        #[arg(long)]
        kernel_shape: Option<String>,

        /// Do not count shadows as motion
        #[arg(long)]
        shadows: bool,

        /// Directory for recordings and manifests
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Frame rate written into recordings
        #[arg(long)]
        fps: Option<f64>,

        /// Configuration file to use instead of the default one
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Show accumulated activity
    Status,

    /// List or export recording manifests
    Recordings {
        /// Directory to read manifests from
        #[arg(long, short)]
        dir: Option<PathBuf>,

        /// Write all manifests to this file instead of listing them
        #[arg(long)]
        export: Option<PathBuf>,

        /// Export format (json or jsonl)
        #[arg(long, default_value = "json")]
        format: String,
    },

    /// Show configuration
    Config,
}

/// Settings of `run` that are not part of the persisted configuration.
struct RunOptions {
    source: String,
    input: String,
    width: Option<usize>,
    height: Option<usize>,
    format: String,
    pace: Option<f64>,
    frames: Option<u64>,
}

/// Either kind of frame source, started.
enum FrameSource {
    Raw(RawVideoSource),
    Synthetic(SyntheticSource),
}

impl FrameSource {
    fn receiver(&self) -> Receiver<Frame> {
        match self {
            FrameSource::Raw(source) => source.receiver().clone(),
            FrameSource::Synthetic(source) => source.receiver().clone(),
        }
    }

    fn stop(&mut self) {
        match self {
            FrameSource::Raw(source) => source.stop(),
            FrameSource::Synthetic(source) => source.stop(),
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "motion_recorder=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            source,
            input,
            width,
            height,
            format,
            pace,
            frames,
            threshold,
            window,
            kernel_size,
            kernel_shape,
            shadows,
            output,
            fps,
            config,
        } => {
            let mut config = match config {
                Some(path) => Config::load_from(&path),
                None => Config::load(),
            }
            .unwrap_or_else(|e| {
                eprintln!("Warning: Could not load config ({e}), using defaults");
                Config::default()
            });

            if let Some(threshold) = threshold {
                config.detector.threshold_percent = threshold;
            }
            if let Some(window) = window {
                match Duration::try_from_secs_f64(window) {
                    Ok(window) => config.recording.window = window,
                    Err(e) => {
                        eprintln!("Error: Invalid window {window}: {e}");
                        std::process::exit(1);
                    }
                }
            }
            if let Some(size) = kernel_size {
                config.detector.kernel_size = size;
            }
            if let Some(shape) = kernel_shape {
                config.detector.kernel_shape = match shape.to_lowercase().as_str() {
                    "ellipse" => KernelShape::Ellipse,
                    "rect" => KernelShape::Rect,
                    other => {
                        eprintln!("Error: Unknown kernel shape '{other}' (expected ellipse or rect)");
                        std::process::exit(1);
                    }
                };
            }
            if shadows {
                config.detector.detect_shadows = true;
            }
            if let Some(output) = output {
                config.recording.output_dir = output;
            }
            if let Some(fps) = fps {
                config.recording.frame_rate = fps;
            }

            let options = RunOptions {
                source,
                input,
                width,
                height,
                format,
                pace,
                frames,
            };
            cmd_run(config, options);
        }
        Commands::Status => {
            cmd_status();
        }
        Commands::Recordings {
            dir,
            export,
            format,
        } => {
            cmd_recordings(dir, export, &format);
        }
        Commands::Config => {
            cmd_config();
        }
    }
}

fn cmd_run(config: Config, options: RunOptions) {
    println!("Motion Recorder v{VERSION}");
    println!();

    if let Err(e) = config.validate() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Could not create directories: {e}");
    }

    let mut source = match open_source(&options) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    println!("Watching {}...", options.source);
    println!("  Threshold: {:.1}%", config.detector.threshold_percent);
    println!(
        "  Window: {:.1}s",
        config.recording.window.as_secs_f64()
    );
    println!(
        "  Kernel: {:?} {}px",
        config.detector.kernel_shape, config.detector.kernel_size
    );
    println!("  Output: {:?}", config.recording.output_dir);
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let activity = create_shared_log_with_persistence(config.data_path.join(ACTIVITY_FILE));
    let manifests = ManifestBuilder::new();
    println!("Instance ID: {}", manifests.instance_id());

    let sink = Y4mSink::new(config.recording.output_dir.clone());
    let mut pipeline = match MotionPipeline::new(&config, sink, MonotonicClock::new()) {
        Ok(pipeline) => pipeline.with_activity_log(activity.clone()),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    // Set up Ctrl+C handler
    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone());

    let receiver = source.receiver();
    let mut last_status = Instant::now();

    while running.load(Ordering::SeqCst) {
        let frame = match receiver.recv_timeout(Duration::from_millis(100)) {
            Ok(frame) => frame,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                println!("End of input");
                break;
            }
        };

        let report = match pipeline.process(&frame) {
            Ok(report) => report,
            Err(e) => {
                eprintln!("Skipping frame: {e}");
                continue;
            }
        };

        match report.action {
            RecorderAction::Started { ref identifier } => {
                println!(
                    "[{}] Motion {:.1}%, recording {identifier}",
                    frame.timestamp.format("%H:%M:%S"),
                    report.change.percent
                );
            }
            RecorderAction::Stopped(ref summary) => {
                finish_recording(summary, &manifests, &config.recording.output_dir);
            }
            RecorderAction::SinkFailed {
                ref error,
                ref closed,
            } => {
                eprintln!("Recording error: {error}");
                if let Some(summary) = closed {
                    finish_recording(summary, &manifests, &config.recording.output_dir);
                }
            }
            RecorderAction::Idle | RecorderAction::Writing => {}
        }

        if last_status.elapsed() >= Duration::from_secs(1) {
            println!(
                "[{}] {:>5.1}% changed | {} | {:.1} fps{}",
                frame.timestamp.format("%H:%M:%S"),
                report.change.percent,
                report.state,
                report.fps,
                if report.warming_up { " | warming up" } else { "" }
            );
            last_status = Instant::now();
        }
    }

    println!();
    println!("Stopping...");
    source.stop();

    if let Some(summary) = pipeline.close() {
        finish_recording(&summary, &manifests, &config.recording.output_dir);
    }

    save_activity(&activity);

    // Final stats
    println!();
    println!("{}", activity.summary());
}

fn open_source(options: &RunOptions) -> Result<FrameSource, String> {
    match options.source.to_lowercase().as_str() {
        "synthetic" => {
            let defaults = SyntheticConfig::default();
            let format = PixelFormat::from_name(&options.format)
                .ok_or_else(|| format!("Unknown pixel format '{}'", options.format))?;
            let mut source = SyntheticSource::new(SyntheticConfig {
                width: options.width.unwrap_or(defaults.width),
                height: options.height.unwrap_or(defaults.height),
                format,
                frame_limit: options.frames,
                ..defaults
            });
            source.start().map_err(|e| e.to_string())?;
            Ok(FrameSource::Synthetic(source))
        }
        "raw" => {
            let (Some(width), Some(height)) = (options.width, options.height) else {
                return Err("Raw input needs --width and --height".to_string());
            };
            if width == 0 || height == 0 {
                return Err("Frame dimensions must be positive".to_string());
            }
            let format = PixelFormat::from_name(&options.format)
                .ok_or_else(|| format!("Unknown pixel format '{}'", options.format))?;

            let mut source = RawVideoSource::new(RawSourceConfig {
                input: RawInput::from_arg(&options.input),
                width,
                height,
                format,
                pace_fps: options.pace,
            });
            source.start().map_err(|e| e.to_string())?;
            Ok(FrameSource::Raw(source))
        }
        other => Err(format!("Unknown source '{other}' (expected synthetic or raw)")),
    }
}

fn finish_recording(summary: &SessionSummary, manifests: &ManifestBuilder, dir: &Path) {
    println!(
        "[{}] Recording {} finished: {} frames, {:.1}s, peak {:.1}%",
        Utc::now().format("%H:%M:%S"),
        summary.identifier,
        summary.frames_written,
        summary.duration_secs(),
        summary.peak_change
    );
    if let Some(ref error) = summary.close_error {
        eprintln!("Warning: Recording may be incomplete: {error}");
    }

    match manifests.write(summary, dir) {
        Ok(path) => println!("  Manifest: {path:?}"),
        Err(e) => eprintln!("Error writing manifest: {e}"),
    }
}

fn save_activity(activity: &SharedActivityLog) {
    if let Err(e) = activity.save() {
        eprintln!("Warning: Could not save activity log: {e}");
    }
}

fn cmd_status() {
    let config = Config::load().unwrap_or_default();

    println!("Motion Recorder Status");
    println!("======================");
    println!();

    println!("Configuration:");
    println!("  Threshold: {:.1}%", config.detector.threshold_percent);
    println!(
        "  Window: {:.1}s",
        config.recording.window.as_secs_f64()
    );
    println!("  Shadow detection: {}", config.detector.detect_shadows);
    println!("  Output: {:?}", config.recording.output_dir);
    println!();

    let stats_path = config.data_path.join(ACTIVITY_FILE);
    let stats = std::fs::read_to_string(&stats_path)
        .ok()
        .and_then(|content| serde_json::from_str::<PersistedStats>(&content).ok());

    match stats {
        Some(stats) => {
            println!("Cumulative Statistics:");
            println!("  Frames processed: {}", stats.frames_processed);
            println!("  Frames with motion: {}", stats.motion_frames);
            println!("  Frames recorded: {}", stats.frames_recorded);
            println!("  Recordings completed: {}", stats.recordings_completed);
            println!("  Sink failures: {}", stats.sink_failures);
            println!("  Frames rejected: {}", stats.frames_rejected);
            println!(
                "  Last updated: {}",
                stats.last_updated.format("%Y-%m-%d %H:%M:%S")
            );
        }
        None => println!("No previous session data found."),
    }
}

fn cmd_recordings(dir: Option<PathBuf>, export: Option<PathBuf>, format: &str) {
    let config = Config::load().unwrap_or_default();
    let dir = dir.unwrap_or(config.recording.output_dir);

    let manifests = match load_manifests(&dir) {
        Ok(manifests) => manifests,
        Err(e) => {
            eprintln!("Error reading {dir:?}: {e}");
            std::process::exit(1);
        }
    };

    if manifests.is_empty() {
        println!("No recordings found in {dir:?}");
        println!("Run 'motion-recorder run' to start recording.");
        return;
    }

    let Some(export_path) = export else {
        println!("{} recording(s) in {:?}", manifests.len(), dir);
        println!();
        for manifest in &manifests {
            println!(
                "  {}  {:>6.1}s  {:>5} frames  peak {:>5.1}%",
                manifest.identifier,
                manifest.duration_secs,
                manifest.frames,
                manifest.change.peak_percent
            );
        }
        return;
    };

    let result = if format == "jsonl" {
        // JSON Lines format
        let lines: Vec<String> = manifests
            .iter()
            .filter_map(|m| serde_json::to_string(m).ok())
            .collect();
        std::fs::write(&export_path, lines.join("\n"))
    } else {
        match serde_json::to_string_pretty(&manifests) {
            Ok(json) => std::fs::write(&export_path, json),
            Err(e) => {
                eprintln!("Error serializing: {e}");
                return;
            }
        }
    };

    match result {
        Ok(_) => println!("Exported {} manifests to {export_path:?}", manifests.len()),
        Err(e) => eprintln!("Error writing export: {e}"),
    }
}

fn cmd_config() {
    let config = Config::load().unwrap_or_default();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&config).unwrap_or_else(|_| "Error".to_string())
    );
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) {
    if let Err(e) = ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    }) {
        eprintln!("Warning: Could not set Ctrl+C handler: {e}");
    }
}
