//! Pipeline controller
//!
//! The controller owns the [`PipelineState`] and decides which producer may
//! publish. Every intent runs to completion under one lock and never awaits
//! while holding it, so each transition is atomic with respect to the live
//! loop and the playback ticker. All exits from a producing state go through
//! one teardown routine, which cancels the live loop and the ticker and
//! detaches the publisher before anything new is attached.
//!
//! Locks are always taken producer slot first, then state. A delivery keeps
//! the producer slot but releases the state lock before the consumer runs,
//! so a consumer may call back into the controller while transitions on
//! other threads wait for it to return.

use parking_lot::{Mutex, MutexGuard};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::publisher::{
    FrameConsumer, FramePublisher, ProducerKind, ProducerLock, ProducerToken,
};
use super::state::{PipelineMode, PipelineState, PipelineStatus};
use crate::capture::{
    DetectionAdapter, LandmarkDetector, LiveCaptureHandle, LiveCaptureLoop, LiveSink,
    SourceHandle,
};
use crate::config::{CaptureConfig, ExportConfig, PipelineConfig, PlaybackConfig};
use crate::error::{AppError, Result};
use crate::events::{EventBus, PipelineEvent};
use crate::landmarks::{FrameSequence, LandmarkFrame, LandmarkGroup};
use crate::playback::{PlaybackLoop, PlaybackTicker};
use crate::recording::{export_sequence, Recorder};

struct Inner {
    state: PipelineState,
    recorder: Recorder,
    live: Option<LiveCaptureHandle>,
    ticker: Option<PlaybackTicker>,
    /// Speed for the loaded sequence and any sequence loaded later
    speed: f64,
    last_error: Option<String>,
}

impl Inner {
    /// Cancel every scheduled callback and revoke the publish right.
    /// Idempotent; the only way a producer is stopped.
    fn teardown(&mut self, publisher: &FramePublisher) {
        if let Some(live) = self.live.take() {
            live.cancel();
        }
        if let Some(ticker) = self.ticker.take() {
            ticker.cancel();
        }
        if let Some(kind) = publisher.detach() {
            debug!("Detached {:?} producer", kind);
        }
    }

    fn state_changed(&self) -> PipelineEvent {
        PipelineEvent::StateChanged {
            state: self.state.mode().as_str().to_string(),
            source: self.state.source().map(|s| s.name().to_string()),
        }
    }
}

struct Shared {
    inner: Mutex<Inner>,
    publisher: Arc<FramePublisher>,
    adapter: Arc<DetectionAdapter>,
    events: Arc<EventBus>,
    playback: PlaybackConfig,
    capture: CaptureConfig,
    export: ExportConfig,
}

impl Shared {
    fn lock(&self) -> (ProducerLock<'_>, MutexGuard<'_, Inner>) {
        let producer = self.publisher.lock_producer();
        (producer, self.inner.lock())
    }

    fn emit(&self, events: Vec<PipelineEvent>) {
        for event in events {
            self.events.publish(event);
        }
    }

    /// Attach live capture for `source` and spawn its loop
    fn arm_live(self: &Arc<Self>, inner: &mut Inner, source: SourceHandle) {
        let token = self.publisher.attach(ProducerKind::LiveCapture);
        let route = Arc::new(LiveRoute {
            shared: Arc::downgrade(self),
            token,
        });
        let handle = LiveCaptureLoop::new(
            source,
            self.adapter.clone(),
            route,
            Duration::from_millis(self.capture.rearm_interval_ms),
        )
        .spawn();
        inner.live = Some(handle);
        inner.last_error = None;
    }

    /// Attach playback and register the ticker
    fn arm_playback(self: &Arc<Self>, inner: &mut Inner) {
        let token = self.publisher.attach(ProducerKind::Playback);
        let weak = Arc::downgrade(self);
        let ticker = PlaybackTicker::spawn(self.playback.refresh_hz, move |now| {
            match weak.upgrade() {
                Some(shared) => shared.on_playback_tick(&token, now),
                None => false,
            }
        });
        inner.ticker = Some(ticker);
    }

    /// One playback tick. Returns `false` once this producer is detached.
    fn on_playback_tick(&self, token: &ProducerToken, now: Duration) -> bool {
        let (_producer, mut inner) = self.lock();
        if !self.publisher.is_current(token) {
            return false;
        }
        let PipelineState::PlaybackRunning(player) = &mut inner.state else {
            return false;
        };
        let Some(outcome) = player.tick(now) else {
            return true;
        };

        let total = player.len();
        let every = self.playback.progress_log_interval;
        let frame = player.frame(outcome.published).cloned();
        let progress = outcome
            .advanced_to
            .filter(|index| every > 0 && index % every == 0)
            .and_then(|index| player.frame(index).map(|f| progress_event(f, index, total)));
        drop(inner);

        if let Some(frame) = frame {
            self.publisher.publish_from(token, &frame);
        }
        if let Some(event) = progress {
            if let PipelineEvent::PlaybackProgress {
                frame, total_frames, ..
            } = &event
            {
                debug!("Playback at frame {}/{}", frame, total_frames);
            }
            self.events.publish(event);
        }
        true
    }
}

fn progress_event(frame: &LandmarkFrame, index: usize, total: usize) -> PipelineEvent {
    PipelineEvent::PlaybackProgress {
        frame: index,
        total_frames: total,
        has_face: frame.has(LandmarkGroup::Face),
        has_pose: frame.has(LandmarkGroup::Pose),
        has_left_hand: frame.has(LandmarkGroup::LeftHand),
        has_right_hand: frame.has(LandmarkGroup::RightHand),
    }
}

/// Routes live detection results to the recorder and the publisher
struct LiveRoute {
    shared: Weak<Shared>,
    token: ProducerToken,
}

impl LiveSink for LiveRoute {
    fn deliver(&self, frame: LandmarkFrame, timestamp: f64) -> bool {
        let Some(shared) = self.shared.upgrade() else {
            return false;
        };

        let (_producer, mut inner) = shared.lock();
        if !shared.publisher.is_current(&self.token) {
            return false;
        }
        if matches!(inner.state, PipelineState::Recording(_)) {
            inner.recorder.append(frame.clone(), timestamp);
        }
        drop(inner);

        shared.publisher.publish_from(&self.token, &frame);
        shared.publisher.is_current(&self.token)
    }

    fn fail(&self, error: AppError) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };

        let event = {
            let (_producer, mut inner) = shared.lock();
            if !shared.publisher.detach_if_current(&self.token) {
                return;
            }
            // The loop is already returning; dropping its handle only cancels
            inner.live = None;
            inner.last_error = Some(error.to_string());
            PipelineEvent::DetectionFailed {
                source: inner
                    .state
                    .source()
                    .map(|s| s.name().to_string())
                    .unwrap_or_default(),
                code: error.code().to_string(),
                reason: error.to_string(),
            }
        };

        warn!("Live capture paused after detector fault: {}", error);
        shared.events.publish(event);
    }
}

/// Arbitrates live capture, recording and playback over one publisher
///
/// Must be used from within a tokio runtime: selecting a video and starting
/// playback spawn tasks.
pub struct PipelineController {
    shared: Arc<Shared>,
}

impl PipelineController {
    pub fn new(
        config: &PipelineConfig,
        detector: Arc<dyn LandmarkDetector>,
        events: Arc<EventBus>,
    ) -> Self {
        let adapter = Arc::new(DetectionAdapter::new(detector, &config.detector));
        let speed = PlaybackConfig::clamp_speed(config.playback.speed);

        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    state: PipelineState::Idle,
                    recorder: Recorder::new(),
                    live: None,
                    ticker: None,
                    speed,
                    last_error: None,
                }),
                publisher: Arc::new(FramePublisher::new()),
                adapter,
                events,
                playback: config.playback.clone(),
                capture: config.capture.clone(),
                export: config.export.clone(),
            }),
        }
    }

    pub fn publisher(&self) -> Arc<FramePublisher> {
        self.shared.publisher.clone()
    }

    pub fn adapter(&self) -> &Arc<DetectionAdapter> {
        &self.shared.adapter
    }

    /// Install or remove the rendering consumer
    pub fn set_consumer(&self, consumer: Option<FrameConsumer>) {
        self.shared.publisher.set_consumer(consumer);
    }

    /// Select a live video source
    ///
    /// Drops any loaded sequence and any in-progress recording. The live loop
    /// is armed immediately and starts detecting once the source plays.
    pub fn select_video(&self, source: SourceHandle) {
        let event = {
            let (_producer, mut inner) = self.shared.lock();
            inner.teardown(&self.shared.publisher);
            inner.recorder.discard();
            info!("Selected video source {}", source.name());
            inner.state = PipelineState::LiveSelected(source.clone());
            self.shared.arm_live(&mut inner, source);
            inner.state_changed()
        };
        self.shared.events.publish(event);
    }

    /// Load a sequence for playback; playback starts paused
    pub fn select_sequence(&self, sequence: FrameSequence) {
        let summary = sequence.summary();
        let events = {
            let (_producer, mut inner) = self.shared.lock();
            inner.teardown(&self.shared.publisher);
            inner.recorder.discard();

            let config = PlaybackConfig {
                speed: inner.speed,
                ..self.shared.playback.clone()
            };
            let player = PlaybackLoop::new(Arc::new(sequence), &config);
            inner.state = PipelineState::PlaybackLoaded(player);
            vec![
                PipelineEvent::SequenceLoaded {
                    frames: summary.total_frames,
                    duration_secs: summary.duration(),
                },
                inner.state_changed(),
            ]
        };

        info!(
            "Loaded sequence: {} frames over {:.2}s (face {}, pose {}, left hand {}, right hand {}, empty {})",
            summary.total_frames,
            summary.duration(),
            summary.face_frames,
            summary.pose_frames,
            summary.left_hand_frames,
            summary.right_hand_frames,
            summary.empty_frames
        );
        self.shared.emit(events);
    }

    /// Read a sequence file and select it
    ///
    /// The file is fully parsed before anything changes; on `LoadFailure`
    /// the pipeline is left exactly as it was.
    pub async fn load_sequence_file(&self, path: &Path) -> Result<()> {
        let sequence = match FrameSequence::load(path).await {
            Ok(sequence) => sequence,
            Err(e) => {
                warn!("Failed to load sequence {}: {}", path.display(), e);
                return Err(e);
            }
        };
        self.select_sequence(sequence);
        Ok(())
    }

    /// Stop everything and return to `Idle`. Always safe, idempotent.
    pub fn clear(&self) {
        let event = {
            let (_producer, mut inner) = self.shared.lock();
            let was = inner.state.mode();
            inner.teardown(&self.shared.publisher);
            inner.recorder.discard();
            inner.state = PipelineState::Idle;
            if was == PipelineMode::Idle {
                return;
            }
            info!("Pipeline cleared (was {})", was);
            inner.state_changed()
        };
        self.shared.events.publish(event);
    }

    /// Start recording the selected live source
    ///
    /// Only valid while a live source is selected and playing; otherwise a
    /// no-op returning `false`.
    pub fn start_recording(&self) -> bool {
        let events = {
            let (_producer, mut inner) = self.shared.lock();
            let source = match &inner.state {
                PipelineState::LiveSelected(source) if source.status().is_playing() => {
                    source.clone()
                }
                PipelineState::LiveSelected(source) => {
                    debug!("Ignoring start recording: {} is not playing", source.name());
                    return false;
                }
                other => {
                    debug!("Ignoring start recording in {}", other.mode());
                    return false;
                }
            };

            inner.recorder.start();
            inner.state = PipelineState::Recording(source.clone());
            // Recording is an explicit play action; re-arm after a detector fault
            if inner.live.is_none() {
                self.shared.arm_live(&mut inner, source.clone());
            }
            vec![
                PipelineEvent::RecordingStarted {
                    source: source.name().to_string(),
                },
                inner.state_changed(),
            ]
        };
        self.shared.emit(events);
        true
    }

    /// Finalize the recording and return it
    ///
    /// Returns to `LiveSelected`; live capture keeps running. Outside of
    /// `Recording` this yields an empty sequence.
    pub fn stop_recording(&self) -> FrameSequence {
        self.finish_recording().unwrap_or_default()
    }

    /// Finalize the recording and write it to the export directory
    ///
    /// Returns `None` when no recording was in progress. An empty recording
    /// is still exported.
    pub async fn stop_recording_and_export(&self) -> Result<Option<PathBuf>> {
        let Some(sequence) = self.finish_recording() else {
            return Ok(None);
        };
        let path = export_sequence(&sequence, &self.shared.export).await?;
        Ok(Some(path))
    }

    fn finish_recording(&self) -> Option<FrameSequence> {
        let (sequence, events) = {
            let (_producer, mut inner) = self.shared.lock();
            let source = match &inner.state {
                PipelineState::Recording(source) => source.clone(),
                other => {
                    debug!("Ignoring stop recording in {}", other.mode());
                    return None;
                }
            };

            let sequence = inner.recorder.finalize();
            inner.state = PipelineState::LiveSelected(source);
            let events = vec![
                PipelineEvent::RecordingFinished {
                    frames: sequence.len(),
                },
                inner.state_changed(),
            ];
            (sequence, events)
        };
        self.shared.emit(events);
        Some(sequence)
    }

    /// Flip between paused and running playback
    ///
    /// No-op returning `false` unless a sequence is loaded.
    pub fn toggle_playback(&self) -> bool {
        let event = {
            let (_producer, mut inner) = self.shared.lock();
            match std::mem::take(&mut inner.state) {
                PipelineState::PlaybackLoaded(mut player) => {
                    player.rearm();
                    inner.state = PipelineState::PlaybackRunning(player);
                    self.shared.arm_playback(&mut inner);
                    info!("Playback started");
                }
                PipelineState::PlaybackRunning(player) => {
                    inner.teardown(&self.shared.publisher);
                    info!("Playback paused at frame {}/{}", player.cursor(), player.len());
                    inner.state = PipelineState::PlaybackLoaded(player);
                }
                other => {
                    debug!("Ignoring toggle playback in {}", other.mode());
                    inner.state = other;
                    return false;
                }
            }
            inner.state_changed()
        };
        self.shared.events.publish(event);
        true
    }

    /// Move the playback cursor back to frame 0, keeping play/pause state
    pub fn reset_playback(&self) -> bool {
        let (_producer, mut inner) = self.shared.lock();
        match inner.state.player_mut() {
            Some(player) => {
                player.reset();
                debug!("Playback reset to frame 0");
                true
            }
            None => {
                debug!("Ignoring reset playback: no sequence loaded");
                false
            }
        }
    }

    /// Set the playback speed multiplier; returns the clamped value applied
    pub fn set_playback_speed(&self, speed: f64) -> f64 {
        let (_producer, mut inner) = self.shared.lock();
        let applied = PlaybackConfig::clamp_speed(speed);
        inner.speed = applied;
        if let Some(player) = inner.state.player_mut() {
            player.set_speed(applied);
        }
        info!("Playback speed set to {:.2}x", applied);
        applied
    }

    /// Re-arm live capture after a detector fault
    ///
    /// No-op returning `false` unless a live source is selected and its loop
    /// has stopped.
    pub fn resume_live(&self) -> bool {
        let (_producer, mut inner) = self.shared.lock();
        let Some(source) = inner.state.source().cloned() else {
            debug!("Ignoring resume: no live source selected");
            return false;
        };
        if inner.live.as_ref().is_some_and(|live| !live.is_finished()) {
            return false;
        }

        inner.teardown(&self.shared.publisher);
        info!("Resuming live capture on {}", source.name());
        self.shared.arm_live(&mut inner, source);
        true
    }

    pub fn mode(&self) -> PipelineMode {
        let (_producer, inner) = self.shared.lock();
        inner.state.mode()
    }

    pub fn is_recording(&self) -> bool {
        self.mode() == PipelineMode::Recording
    }

    /// Frames accumulated by the in-progress recording
    pub fn recorded_frames(&self) -> usize {
        let (_producer, inner) = self.shared.lock();
        inner.recorder.len()
    }

    pub fn status(&self) -> PipelineStatus {
        let (_producer, inner) = self.shared.lock();
        let player = inner.state.player();
        PipelineStatus {
            mode: inner.state.mode(),
            source: inner.state.source().map(|s| s.name().to_string()),
            producer: self.shared.publisher.active_producer(),
            recording_frames: inner.recorder.len(),
            cursor: player.map(|p| p.cursor()),
            total_frames: player.map(|p| p.len()),
            speed: inner.speed,
            live_armed: inner.live.as_ref().is_some_and(|live| !live.is_finished()),
            last_error: inner.last_error.clone(),
        }
    }
}

impl Drop for PipelineController {
    fn drop(&mut self) {
        let (_producer, mut inner) = self.shared.lock();
        inner.teardown(&self.shared.publisher);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::stub::{marked_frame, marker_of, test_image, EchoDetector, GatedDetector};
    use crate::capture::HostVideoSource;
    use crate::landmarks::RecordedFrame;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;
    use tokio_test::assert_err;

    /// Live frames carry markers at or above this value, playback frames below
    const LIVE_MARKER: f64 = 1000.0;

    fn controller_with(detector: Arc<dyn LandmarkDetector>) -> (PipelineController, Arc<EventBus>) {
        let events = Arc::new(EventBus::new());
        let controller = PipelineController::new(&PipelineConfig::default(), detector, events.clone());
        (controller, events)
    }

    fn playing_source(name: &str, media_time: f64) -> Arc<HostVideoSource> {
        let source = Arc::new(HostVideoSource::new(name));
        source.present(test_image(media_time));
        source.play();
        source
    }

    fn marked_sequence(len: usize) -> FrameSequence {
        (0..len)
            .map(|i| RecordedFrame::new(marked_frame(i as f64), i as f64 / 30.0))
            .collect::<Vec<_>>()
            .into()
    }

    /// Consumer recording each frame's marker
    fn collecting(controller: &PipelineController) -> Arc<Mutex<Vec<f64>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        controller.set_consumer(Some(Arc::new(move |frame: &LandmarkFrame| {
            s.lock().push(marker_of(frame).unwrap_or(-1.0));
        })));
        seen
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_producer_across_rapid_switches() {
        let (controller, _events) = controller_with(Arc::new(EchoDetector::new()));
        let publisher = controller.publisher();
        let source = playing_source("camera", LIVE_MARKER);
        let sequence = marked_sequence(20);

        // Every publish must come from the producer attached at that instant
        let violations = Arc::new(AtomicUsize::new(0));
        let published = Arc::new(AtomicUsize::new(0));
        {
            let weak = Arc::downgrade(&publisher);
            let violations = violations.clone();
            let published = published.clone();
            controller.set_consumer(Some(Arc::new(move |frame: &LandmarkFrame| {
                published.fetch_add(1, Ordering::SeqCst);
                let expected = match marker_of(frame) {
                    Some(m) if m >= LIVE_MARKER => ProducerKind::LiveCapture,
                    _ => ProducerKind::Playback,
                };
                let active = weak.upgrade().and_then(|p| p.active_producer());
                if active != Some(expected) {
                    violations.fetch_add(1, Ordering::SeqCst);
                }
            })));
        }

        for round in 0..12u64 {
            controller.select_video(source.clone());
            tokio::time::sleep(Duration::from_millis(5 + round * 7)).await;

            controller.select_sequence(sequence.clone());
            assert_eq!(publisher.active_producer(), None);
            assert!(controller.toggle_playback());
            tokio::time::sleep(Duration::from_millis(3 + round * 5)).await;

            if round % 3 == 0 {
                controller.clear();
                let before = published.load(Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                assert_eq!(published.load(Ordering::SeqCst), before);
            }
        }

        controller.clear();
        controller.clear();
        assert!(published.load(Ordering::SeqCst) > 0);
        assert_eq!(violations.load(Ordering::SeqCst), 0);
        assert_eq!(controller.mode(), PipelineMode::Idle);
        assert_eq!(publisher.active_producer(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_publish_after_pause() {
        let (controller, _events) = controller_with(Arc::new(EchoDetector::new()));
        let seen = collecting(&controller);

        controller.select_sequence(marked_sequence(90));
        // Loaded but paused: nothing is published
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(seen.lock().is_empty());

        assert!(controller.toggle_playback());
        assert_eq!(controller.mode(), PipelineMode::PlaybackRunning);
        tokio::time::sleep(Duration::from_millis(500)).await;
        let count = seen.lock().len();
        assert!(count >= 25, "{} publishes", count);

        // Published in sequence order, each frame at least once
        let markers = seen.lock().clone();
        assert_eq!(markers[0], 0.0);
        assert!(markers.windows(2).all(|w| w[1] == w[0] || w[1] == w[0] + 1.0));

        assert!(controller.toggle_playback());
        assert_eq!(controller.mode(), PipelineMode::PlaybackLoaded);
        let paused_at = controller.status().cursor.unwrap();
        let count = seen.lock().len();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(seen.lock().len(), count);
        assert_eq!(controller.status().cursor, Some(paused_at));

        // Resume continues from the cursor, reset goes back to 0
        assert!(controller.toggle_playback());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(*seen.lock().get(count).unwrap(), paused_at as f64);
        assert!(controller.reset_playback());
        assert_eq!(controller.mode(), PipelineMode::PlaybackRunning);
        assert_eq!(controller.status().cursor, Some(0));
        controller.clear();
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_transitions_are_noops() {
        let (controller, _events) = controller_with(Arc::new(EchoDetector::new()));

        assert!(!controller.toggle_playback());
        assert!(!controller.start_recording());
        assert!(!controller.reset_playback());
        assert!(!controller.resume_live());
        assert!(controller.stop_recording().is_empty());
        assert_eq!(controller.stop_recording_and_export().await.unwrap(), None);
        assert_eq!(controller.mode(), PipelineMode::Idle);

        // Selected but paused source cannot record
        let source = Arc::new(HostVideoSource::new("camera"));
        controller.select_video(source.clone());
        assert!(!controller.start_recording());
        assert!(!controller.toggle_playback());
        assert!(!controller.reset_playback());
        assert_eq!(controller.mode(), PipelineMode::LiveSelected);

        source.play();
        assert!(controller.start_recording());
        assert!(!controller.start_recording());
        assert_eq!(controller.mode(), PipelineMode::Recording);
        controller.clear();
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_failure_leaves_state_unchanged() {
        let (controller, _events) = controller_with(Arc::new(EchoDetector::new()));
        let source = playing_source("camera", LIVE_MARKER);
        controller.select_video(source);

        let dir = TempDir::new().unwrap();
        let bad = dir.path().join("bad.json");
        tokio::fs::write(&bad, r#"[{"poseLandmarks": "nope"}]"#).await.unwrap();

        let result = controller.load_sequence_file(&bad).await;
        assert!(matches!(result, Err(AppError::LoadFailure(_))));
        assert_err!(controller.load_sequence_file(&dir.path().join("missing.json")).await);

        assert_eq!(controller.mode(), PipelineMode::LiveSelected);
        assert_eq!(
            controller.publisher().active_producer(),
            Some(ProducerKind::LiveCapture)
        );

        let good = dir.path().join("good.json");
        tokio::fs::write(&good, marked_sequence(4).to_json_pretty().unwrap())
            .await
            .unwrap();
        controller.load_sequence_file(&good).await.unwrap();
        assert_eq!(controller.mode(), PipelineMode::PlaybackLoaded);
        assert_eq!(controller.status().total_frames, Some(4));
        assert_eq!(controller.publisher().active_producer(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_detection_failure_pauses_live() {
        let detector = Arc::new(EchoDetector::failing_on(3));
        let (controller, events) = controller_with(detector.clone());
        let mut rx = events.subscribe();
        let seen = collecting(&controller);

        controller.select_video(playing_source("camera", LIVE_MARKER));
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(detector.calls(), 3);
        assert_eq!(seen.lock().len(), 2);
        let status = controller.status();
        assert_eq!(status.mode, PipelineMode::LiveSelected);
        assert_eq!(status.producer, None);
        assert!(!status.live_armed);
        assert!(status.last_error.unwrap().contains("model crashed"));

        let mut failed = false;
        while let Ok(event) = rx.try_recv() {
            if let PipelineEvent::DetectionFailed { source, code, .. } = event {
                assert_eq!(source, "camera");
                assert_eq!(code, "detection_failure");
                failed = true;
            }
        }
        assert!(failed);

        assert!(controller.resume_live());
        assert!(!controller.resume_live());
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(seen.lock().len() > 2);
        assert!(controller.status().last_error.is_none());
        controller.clear();
    }

    #[tokio::test(start_paused = true)]
    async fn test_record_three_frames_and_export() {
        let detector = Arc::new(GatedDetector::new());
        let dir = TempDir::new().unwrap();
        let config = PipelineConfig {
            export: ExportConfig {
                directory: dir.path().to_path_buf(),
                ..Default::default()
            },
            ..Default::default()
        };
        let events = Arc::new(EventBus::new());
        let controller = PipelineController::new(&config, detector.clone(), events);
        let seen = collecting(&controller);

        let source = playing_source("camera", 0.0);
        controller.select_video(source.clone());
        assert!(controller.start_recording());

        for (current, next) in [(0.0, 0.033), (0.033, 0.066)] {
            detector.wait_for_pending(1).await;
            // The following submission grabs whatever is presented next
            source.present(test_image(next));
            detector.complete(Ok(marked_frame(current)));
        }
        detector.wait_for_pending(1).await;
        detector.complete(Ok(LandmarkFrame::empty()));
        detector.wait_for_pending(1).await;
        assert_eq!(controller.recorded_frames(), 3);

        let path = controller.stop_recording_and_export().await.unwrap().unwrap();
        assert_eq!(controller.mode(), PipelineMode::LiveSelected);
        assert_eq!(controller.recorded_frames(), 0);

        let exported = FrameSequence::load(&path).await.unwrap();
        let timestamps: Vec<f64> = exported.iter().map(|f| f.timestamp).collect();
        assert_eq!(timestamps, vec![0.0, 0.033, 0.066]);
        assert!(exported[2].frame.is_empty());

        // Live frames kept flowing to the consumer while recording
        assert_eq!(seen.lock().len(), 3);
        controller.clear();
    }

    #[tokio::test(start_paused = true)]
    async fn test_switching_source_drops_recording() {
        let (controller, _events) = controller_with(Arc::new(EchoDetector::new()));
        controller.select_video(playing_source("camera", 0.5));
        assert!(controller.start_recording());
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(controller.recorded_frames() > 0);

        controller.select_sequence(marked_sequence(3));
        assert_eq!(controller.recorded_frames(), 0);
        assert!(controller.stop_recording().is_empty());

        controller.select_video(playing_source("other", 0.5));
        assert_eq!(controller.mode(), PipelineMode::LiveSelected);
        assert_eq!(controller.status().source.as_deref(), Some("other"));
        controller.clear();
    }

    #[tokio::test(start_paused = true)]
    async fn test_speed_and_progress_events() {
        let (controller, events) = controller_with(Arc::new(EchoDetector::new()));
        let mut rx = events.subscribe();

        assert_eq!(controller.set_playback_speed(4.0), 2.0);
        controller.select_sequence(marked_sequence(90));
        assert_eq!(controller.status().speed, 2.0);
        assert!(controller.toggle_playback());

        // 60 frames per second at double speed: two progress reports per second
        tokio::time::sleep(Duration::from_millis(1100)).await;
        controller.clear();

        let mut progress = Vec::new();
        let mut loaded = None;
        while let Ok(event) = rx.try_recv() {
            match event {
                PipelineEvent::PlaybackProgress { frame, total_frames, has_pose, .. } => {
                    assert_eq!(total_frames, 90);
                    assert!(has_pose);
                    progress.push(frame);
                }
                PipelineEvent::SequenceLoaded { frames, .. } => loaded = Some(frames),
                _ => {}
            }
        }
        assert_eq!(loaded, Some(90));
        assert_eq!(progress, vec![30, 60]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_consumer_queries_status_during_transitions() {
        let (controller, _events) = controller_with(Arc::new(EchoDetector::new()));
        let controller = Arc::new(controller);

        let queried = Arc::new(AtomicUsize::new(0));
        let mismatched = Arc::new(AtomicUsize::new(0));
        {
            let weak = Arc::downgrade(&controller);
            let queried = queried.clone();
            let mismatched = mismatched.clone();
            controller.set_consumer(Some(Arc::new(move |_frame: &LandmarkFrame| {
                std::thread::sleep(Duration::from_millis(2));
                if let Some(controller) = weak.upgrade() {
                    // No transition can detach playback while its frame is out
                    if controller.status().producer != Some(ProducerKind::Playback) {
                        mismatched.fetch_add(1, Ordering::SeqCst);
                    }
                    queried.fetch_add(1, Ordering::SeqCst);
                }
            })));
        }
        controller.select_sequence(marked_sequence(30));

        let toggler = {
            let controller = controller.clone();
            tokio::task::spawn_blocking(move || {
                for _ in 0..300 {
                    controller.toggle_playback();
                    std::thread::sleep(Duration::from_millis(1));
                }
            })
        };
        tokio::time::timeout(Duration::from_secs(20), toggler)
            .await
            .expect("transitions stalled behind the consumer")
            .unwrap();

        assert!(queried.load(Ordering::SeqCst) > 0);
        assert_eq!(mismatched.load(Ordering::SeqCst), 0);
        controller.clear();
    }

    #[tokio::test(start_paused = true)]
    async fn test_reselecting_source_keeps_one_detection_outstanding() {
        let detector = Arc::new(GatedDetector::new());
        let (controller, _events) = controller_with(detector.clone());
        let seen = collecting(&controller);
        let source = playing_source("camera", LIVE_MARKER);

        controller.select_video(source.clone());
        detector.wait_for_pending(1).await;

        // The new loop must not submit while the old call is unanswered
        controller.select_video(source.clone());
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(detector.calls(), 1);
        assert!(controller.adapter().is_in_flight());

        // The abandoned answer is discarded and the new loop takes the slot
        detector.complete(Ok(marked_frame(LIVE_MARKER)));
        detector.wait_for_pending(1).await;
        assert_eq!(detector.calls(), 2);
        assert_eq!(detector.max_concurrent(), 1);
        assert!(seen.lock().is_empty());

        detector.complete(Ok(marked_frame(LIVE_MARKER)));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(*seen.lock(), vec![LIVE_MARKER]);
        controller.clear();
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_sequence_publishes_nothing() {
        let (controller, _events) = controller_with(Arc::new(EchoDetector::new()));
        let seen = collecting(&controller);

        controller.select_sequence(FrameSequence::new());
        assert!(controller.toggle_playback());
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(seen.lock().is_empty());
        assert_eq!(controller.status().cursor, Some(0));
        controller.clear();
    }
}
