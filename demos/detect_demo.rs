//! Demonstration of motion-triggered recording.
//!
//! This example shows how to:
//! 1. Generate a synthetic scene with moving objects
//! 2. Run frames through the motion pipeline
//! 3. React to recordings starting and stopping
//! 4. Write manifests for finished recordings
//!
//! Run with: cargo run --example detect_demo
//!
//! Recordings are written to a directory under the system temp dir.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use motion_recorder::{
    activity::ActivityLog,
    config::Config,
    core::{ManifestBuilder, MonotonicClock, MotionPipeline, RecorderAction},
    sink::Y4mSink,
    source::{SyntheticConfig, SyntheticSource},
};

fn main() {
    println!("Motion Recorder - Detection Demo");
    println!("================================");
    println!();

    let output_dir = std::env::temp_dir().join("motion-recorder-demo");

    let mut config = Config::default();
    config.recording.window = Duration::from_secs(1);
    config.recording.output_dir = output_dir.clone();

    // A faster scene than real time: both objects pass within ten seconds
    let scene = SyntheticConfig {
        fps: 30.0,
        frame_limit: Some(300),
        ..SyntheticConfig::default()
    };

    let activity = Arc::new(ActivityLog::new());
    let manifests = ManifestBuilder::new();
    let sink = Y4mSink::new(output_dir.clone());

    let mut pipeline = match MotionPipeline::new(&config, sink, MonotonicClock::new()) {
        Ok(pipeline) => pipeline.with_activity_log(activity.clone()),
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            return;
        }
    };

    let mut source = SyntheticSource::new(scene);
    if let Err(e) = source.start() {
        eprintln!("Error starting source: {e}");
        return;
    }

    println!("Instance ID: {}", manifests.instance_id());
    println!("Writing recordings to {output_dir:?}");
    println!();

    // Set up stop flag
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    // Set up Ctrl+C handler
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl+C handler");

    let receiver = source.receiver().clone();
    let mut frame_count = 0u64;

    while running.load(Ordering::SeqCst) {
        let frame = match receiver.recv_timeout(Duration::from_millis(100)) {
            Ok(frame) => frame,
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => continue,
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
        };
        frame_count += 1;

        let report = match pipeline.process(&frame) {
            Ok(report) => report,
            Err(e) => {
                eprintln!("  Rejected frame: {e}");
                continue;
            }
        };

        match report.action {
            RecorderAction::Started { identifier } => {
                println!(
                    "  Frame {frame_count}: {:.1}% changed, started {identifier}",
                    report.change.percent
                );
            }
            RecorderAction::Stopped(summary) => {
                println!(
                    "  Frame {frame_count}: stopped {} after {} frames (mean change {:.1}%)",
                    summary.identifier, summary.frames_written, summary.mean_change
                );
                match manifests.write(&summary, &output_dir) {
                    Ok(path) => println!("    Manifest: {path:?}"),
                    Err(e) => eprintln!("    Could not write manifest: {e}"),
                }
            }
            RecorderAction::SinkFailed { error, .. } => {
                eprintln!("  Frame {frame_count}: sink failed: {error}");
            }
            RecorderAction::Idle | RecorderAction::Writing => {}
        }

        if frame_count % 30 == 0 {
            println!(
                "  [{frame_count}] {:.1}% changed | {} | {:.1} fps",
                report.change.percent, report.state, report.fps
            );
        }
    }

    println!();
    println!("Stopping...");
    source.stop();

    if let Some(summary) = pipeline.close() {
        println!(
            "Closed {} with {} frames",
            summary.identifier, summary.frames_written
        );
        if let Err(e) = manifests.write(&summary, &output_dir) {
            eprintln!("Could not write manifest: {e}");
        }
    }

    // Final statistics
    println!();
    println!("{}", activity.summary());
    println!();
    println!("Demo complete!");
}
