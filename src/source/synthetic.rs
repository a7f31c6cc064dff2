//! Generated test scenes.
//!
//! A static background with rectangular objects that appear, move and leave
//! on a frame schedule. Used by the demo, by `motion-recorder run --source
//! synthetic` and by tests that need real pixels instead of canned metrics.

use crate::source::raw::CaptureError;
use crate::source::types::{Frame, PixelFormat};
use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// A solid rectangle moving at constant speed while it is on screen.
#[derive(Debug, Clone, PartialEq)]
pub struct MovingObject {
    /// First frame the object is visible in
    pub appears_at: u64,
    /// First frame the object is gone again
    pub leaves_at: u64,
    pub x: isize,
    pub y: isize,
    pub width: usize,
    pub height: usize,
    /// Pixels per frame
    pub velocity: (isize, isize),
    pub intensity: u8,
}

impl MovingObject {
    fn visible_at(&self, index: u64) -> bool {
        (self.appears_at..self.leaves_at).contains(&index)
    }

    fn origin_at(&self, index: u64) -> (isize, isize) {
        let steps = index.saturating_sub(self.appears_at) as isize;
        (
            self.x + self.velocity.0 * steps,
            self.y + self.velocity.1 * steps,
        )
    }
}

/// What to draw and how fast.
#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    pub width: usize,
    pub height: usize,
    pub format: PixelFormat,
    pub fps: f64,
    pub background: u8,
    pub objects: Vec<MovingObject>,
    /// Stop after this many frames; `None` runs until stopped
    pub frame_limit: Option<u64>,
}

impl Default for SyntheticConfig {
    /// A 160x120 gray scene with two intruders, each covering roughly 12%
    /// of the frame.
    fn default() -> Self {
        Self {
            width: 160,
            height: 120,
            format: PixelFormat::Gray8,
            fps: 14.0,
            background: 60,
            objects: vec![
                MovingObject {
                    appears_at: 28,
                    leaves_at: 98,
                    x: 0,
                    y: 36,
                    width: 48,
                    height: 48,
                    velocity: (1, 0),
                    intensity: 220,
                },
                MovingObject {
                    appears_at: 210,
                    leaves_at: 260,
                    x: 100,
                    y: 10,
                    width: 48,
                    height: 48,
                    velocity: (-1, 1),
                    intensity: 200,
                },
            ],
            frame_limit: None,
        }
    }
}

/// Renders frames of a [`SyntheticConfig`] by index.
#[derive(Debug, Clone)]
pub struct SyntheticScene {
    config: SyntheticConfig,
}

impl SyntheticScene {
    pub fn new(config: SyntheticConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SyntheticConfig {
        &self.config
    }

    /// Number of objects on screen in frame `index`.
    pub fn visible_objects(&self, index: u64) -> usize {
        self.config
            .objects
            .iter()
            .filter(|o| o.visible_at(index))
            .count()
    }

    /// Render frame `index`. Later objects are drawn over earlier ones.
    pub fn render(&self, index: u64) -> Frame {
        let SyntheticConfig { width, height, .. } = self.config;
        let mut luma = vec![self.config.background; width * height];

        for object in self.config.objects.iter().filter(|o| o.visible_at(index)) {
            let (ox, oy) = object.origin_at(index);
            let x0 = ox.clamp(0, width as isize) as usize;
            let y0 = oy.clamp(0, height as isize) as usize;
            let x1 = (ox + object.width as isize).clamp(0, width as isize) as usize;
            let y1 = (oy + object.height as isize).clamp(0, height as isize) as usize;

            for y in y0..y1 {
                luma[y * width + x0..y * width + x1].fill(object.intensity);
            }
        }

        let data = match self.config.format {
            PixelFormat::Gray8 => luma,
            PixelFormat::Rgb24 => luma.iter().flat_map(|&v| [v, v, v]).collect(),
        };

        Frame::new(width, height, self.config.format, data)
            .unwrap_or_else(|_| Frame::filled(width, height, self.config.background))
    }
}

/// Plays a [`SyntheticScene`] in real time on a background thread.
pub struct SyntheticSource {
    scene: SyntheticScene,
    sender: Option<Sender<Frame>>,
    receiver: Receiver<Frame>,
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig) -> Self {
        let (sender, receiver) = bounded(super::raw::CHANNEL_CAPACITY);
        Self {
            scene: SyntheticScene::new(config),
            sender: Some(sender),
            receiver,
            running: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
        }
    }

    pub fn scene(&self) -> &SyntheticScene {
        &self.scene
    }

    /// Start generating frames in a background thread.
    pub fn start(&mut self) -> Result<(), CaptureError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(CaptureError::AlreadyRunning);
        }
        let Some(sender) = self.sender.take() else {
            return Err(CaptureError::Exhausted);
        };
        self.running.store(true, Ordering::SeqCst);

        let running = self.running.clone();
        let scene = self.scene.clone();

        let handle = thread::spawn(move || {
            let frames = play(&scene, &sender, &running);
            tracing::debug!(frames, "Synthetic scene finished");
            running.store(false, Ordering::SeqCst);
        });

        self.thread_handle = Some(handle);
        Ok(())
    }

    /// Stop generating frames.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Get the receiver for frames. It disconnects once the frame limit is
    /// reached.
    pub fn receiver(&self) -> &Receiver<Frame> {
        &self.receiver
    }

    /// Try to receive a frame without blocking.
    pub fn try_recv(&self) -> Option<Frame> {
        self.receiver.try_recv().ok()
    }
}

impl Drop for SyntheticSource {
    fn drop(&mut self) {
        self.stop();
    }
}

fn play(scene: &SyntheticScene, sender: &Sender<Frame>, running: &AtomicBool) -> u64 {
    let config = scene.config();
    let interval = if config.fps.is_finite() && config.fps > 0.0 {
        Duration::from_secs_f64(1.0 / config.fps)
    } else {
        Duration::ZERO
    };
    let started = Instant::now();
    let mut index = 0;

    while running.load(Ordering::SeqCst) {
        if config.frame_limit.is_some_and(|limit| index >= limit) {
            break;
        }

        let deadline = started + interval.mul_f64(index as f64);
        if let Some(wait) = deadline.checked_duration_since(Instant::now()) {
            thread::sleep(wait);
        }

        let mut pending = scene.render(index);
        loop {
            match sender.send_timeout(pending, Duration::from_millis(100)) {
                Ok(()) => break,
                Err(SendTimeoutError::Timeout(frame)) => {
                    if !running.load(Ordering::SeqCst) {
                        return index;
                    }
                    pending = frame;
                }
                Err(SendTimeoutError::Disconnected(_)) => return index,
            }
        }
        index += 1;
    }

    index
}
