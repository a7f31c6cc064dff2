//! Integration tests for the motion pipeline: real frames in, recordings out.

use chrono::{DateTime, Utc};
use motion_recorder::activity::{create_shared_log, SharedActivityLog};
use motion_recorder::config::Config;
use motion_recorder::core::{
    load_manifests, Clock, FrameReport, ManifestBuilder, ManualClock, MonotonicClock,
    MotionPipeline, RecorderAction, RecorderState,
};
use motion_recorder::sink::{MemorySink, VideoSink, Y4mSink};
use motion_recorder::source::{Frame, FrameError, PixelFormat, SyntheticConfig, SyntheticSource};
use std::time::Duration;

const WIDTH: usize = 40;
const HEIGHT: usize = 30;

/// Frames needed before the background learning rate settles at 1/history.
const WARMUP: usize = 260;

const FRAME_INTERVAL: Duration = Duration::from_millis(100);

fn scene(block: bool) -> Frame {
    let mut data = vec![90u8; WIDTH * HEIGHT];
    if block {
        for y in 6..22 {
            for x in 10..26 {
                data[y * WIDTH + x] = 240;
            }
        }
    }
    Frame::new(WIDTH, HEIGHT, PixelFormat::Gray8, data).unwrap()
}

struct Harness<S: VideoSink> {
    clock: ManualClock,
    activity: SharedActivityLog,
    pipeline: MotionPipeline<S, ManualClock>,
    origin: DateTime<Utc>,
}

impl<S: VideoSink> Harness<S> {
    fn new(sink: S) -> Self {
        let clock = ManualClock::new();
        let activity = create_shared_log();
        let pipeline = MotionPipeline::new(&Config::default(), sink, clock.clone())
            .unwrap()
            .with_activity_log(activity.clone());

        Self {
            clock,
            activity,
            pipeline,
            origin: Utc::now(),
        }
    }

    /// Advance time by one frame interval and process a frame.
    fn step(&mut self, block: bool) -> FrameReport {
        self.clock.advance(FRAME_INTERVAL);
        let at = self.origin + chrono::Duration::from_std(self.clock.now()).unwrap();
        self.pipeline.process(&scene(block).with_timestamp(at)).unwrap()
    }

    fn run(&mut self, frames: usize, block: bool) -> Vec<FrameReport> {
        (0..frames).map(|_| self.step(block)).collect()
    }

    fn warm_up(&mut self) {
        for report in self.run(WARMUP, false) {
            assert_eq!(report.state, RecorderState::Idle);
        }
    }
}

#[test]
fn test_motion_records_until_window_expires() {
    let sink = MemorySink::new();
    let mut harness = Harness::new(sink.clone());
    harness.warm_up();
    assert_eq!(sink.opened_count(), 0);

    let motion = harness.run(20, true);
    assert!(matches!(motion[0].action, RecorderAction::Started { .. }));
    for report in &motion {
        assert!(report.change.percent >= 10.0, "{}", report.change.percent);
        assert_eq!(report.state, RecorderState::Recording);
    }
    assert!(motion[1..]
        .iter()
        .all(|r| r.action == RecorderAction::Writing));

    // Frames inside the five second window are still written
    let tail = harness.run(49, false);
    for report in &tail {
        assert_eq!(report.change.percent, 0.0);
        assert_eq!(report.action, RecorderAction::Writing);
    }

    // Exactly five seconds after the last motion the recording closes
    let report = harness.step(false);
    let RecorderAction::Stopped(summary) = report.action else {
        panic!("expected the recording to stop");
    };
    assert_eq!(report.state, RecorderState::Idle);
    assert_eq!(summary.frames_written, 69);
    assert!(summary.peak_change >= 10.0);
    assert!((summary.duration_secs() - 6.8).abs() < 1e-6);
    assert!((report.fps - 10.0).abs() < 0.01);

    assert_eq!(sink.opened_count(), 1);
    assert_eq!(sink.written_count(), 69);
    assert_eq!(sink.closed_count(), 1);

    let stats = harness.activity.stats();
    assert_eq!(stats.frames_processed, (WARMUP + 70) as u64);
    assert_eq!(stats.motion_frames, 20);
    assert_eq!(stats.frames_recorded, 69);
    assert_eq!(stats.recordings_started, 1);
    assert_eq!(stats.recordings_completed, 1);

    // Nothing more happens once idle
    assert!(harness
        .run(20, false)
        .iter()
        .all(|r| r.action == RecorderAction::Idle));
}

#[test]
fn test_motion_within_window_extends_recording() {
    let sink = MemorySink::new();
    let mut harness = Harness::new(sink.clone());
    harness.warm_up();

    harness.run(5, true);
    harness.run(30, false);
    let resumed = harness.run(5, true);
    assert!(resumed.iter().all(|r| r.action == RecorderAction::Writing));

    let tail = harness.run(60, false);
    let stops = tail
        .iter()
        .filter(|r| matches!(r.action, RecorderAction::Stopped(_)))
        .count();
    assert_eq!(stops, 1);

    assert_eq!(sink.opened_count(), 1);
    assert_eq!(sink.closed_count(), 1);
}

#[test]
fn test_static_scene_never_records() {
    let sink = MemorySink::new();
    let mut harness = Harness::new(sink.clone());

    for report in harness.run(300, false) {
        assert_eq!(report.change.percent, 0.0);
        assert_eq!(report.action, RecorderAction::Idle);
    }
    assert!(sink.events().is_empty());
}

#[test]
fn test_wrong_shape_is_rejected_and_skipped() {
    let mut harness = Harness::new(MemorySink::new());
    harness.run(5, false);

    let err = harness
        .pipeline
        .process(&Frame::filled(20, 20, 90))
        .unwrap_err();
    assert!(matches!(err, FrameError::InputShape { .. }));
    assert_eq!(harness.activity.stats().frames_rejected, 1);

    let report = harness.step(false);
    assert_eq!(report.change.percent, 0.0);
    assert_eq!(harness.activity.stats().frames_processed, 6);
}

#[test]
fn test_format_change_is_rejected_without_stopping_recording() {
    let sink = MemorySink::new();
    let mut harness = Harness::new(sink.clone());
    harness.warm_up();
    harness.run(3, true);

    let rgb = Frame::new(WIDTH, HEIGHT, PixelFormat::Rgb24, vec![90; WIDTH * HEIGHT * 3]).unwrap();
    let err = harness.pipeline.process(&rgb).unwrap_err();
    assert!(matches!(
        err,
        FrameError::InputFormat {
            expected: PixelFormat::Gray8,
            actual: PixelFormat::Rgb24,
        }
    ));
    assert_eq!(harness.pipeline.state(), RecorderState::Recording);
    assert_eq!(harness.activity.stats().frames_rejected, 1);
    assert_eq!(harness.activity.stats().sink_failures, 0);

    let report = harness.step(true);
    assert_eq!(report.action, RecorderAction::Writing);
    assert_eq!(sink.written_count(), 4);
    assert_eq!(sink.closed_count(), 0);
}

#[test]
fn test_unavailable_sink_stays_idle() {
    let sink = MemorySink::new();
    let mut harness = Harness::new(sink.clone());
    harness.warm_up();

    sink.set_fail_opens(true);
    let report = harness.step(true);
    assert!(matches!(
        report.action,
        RecorderAction::SinkFailed { closed: None, .. }
    ));
    assert_eq!(report.state, RecorderState::Idle);
    assert_eq!(harness.activity.stats().sink_failures, 1);

    sink.set_fail_opens(false);
    let report = harness.step(true);
    assert!(matches!(report.action, RecorderAction::Started { .. }));
    assert_eq!(sink.opened_count(), 1);
}

#[test]
fn test_close_on_shutdown() {
    let sink = MemorySink::new();
    let mut harness = Harness::new(sink.clone());
    harness.warm_up();
    harness.run(3, true);

    let summary = harness.pipeline.close().unwrap();
    assert_eq!(summary.frames_written, 3);
    assert_eq!(harness.pipeline.state(), RecorderState::Idle);
    assert_eq!(sink.closed_count(), 1);
    assert_eq!(harness.activity.stats().recordings_completed, 1);

    assert!(harness.pipeline.close().is_none());
}

#[test]
fn test_y4m_recording_with_manifest() {
    let dir = std::env::temp_dir().join(format!("motion-recorder-y4m-it-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);

    let mut harness = Harness::new(Y4mSink::new(dir.clone()));
    harness.warm_up();
    harness.run(10, true);

    let summary = harness
        .run(50, false)
        .into_iter()
        .find_map(|r| match r.action {
            RecorderAction::Stopped(summary) => Some(summary),
            _ => None,
        })
        .unwrap();
    assert_eq!(summary.frames_written, 59);

    let location = summary.location.clone().unwrap();
    let header = format!("YUV4MPEG2 W{WIDTH} H{HEIGHT} F14:1 Ip A1:1 Cmono\n");
    let expected = header.len() + 59 * ("FRAME\n".len() + WIDTH * HEIGHT);
    let bytes = std::fs::read(&location).unwrap();
    assert_eq!(bytes.len(), expected);
    assert!(bytes.starts_with(header.as_bytes()));

    let manifest_path = ManifestBuilder::new().write(&summary, &dir).unwrap();
    assert_eq!(manifest_path.file_stem(), location.file_stem());

    let manifests = load_manifests(&dir).unwrap();
    assert_eq!(manifests.len(), 1);
    assert_eq!(manifests[0].frames, 59);
    assert_eq!(manifests[0].identifier, summary.identifier);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_synthetic_source_feeds_pipeline() {
    let sink = MemorySink::new();
    let mut pipeline = MotionPipeline::new(&Config::default(), sink.clone(), MonotonicClock::new())
        .unwrap();

    let mut source = SyntheticSource::new(SyntheticConfig {
        width: WIDTH,
        height: HEIGHT,
        fps: 2000.0,
        objects: Vec::new(),
        frame_limit: Some(50),
        ..SyntheticConfig::default()
    });
    source.start().unwrap();

    let mut processed = 0;
    for frame in source.receiver().iter() {
        let report = pipeline.process(&frame).unwrap();
        assert_eq!(report.change.percent, 0.0);
        processed += 1;
    }
    source.stop();

    assert_eq!(processed, 50);
    assert_eq!(sink.opened_count(), 0);
}
