use std::time::Duration;

use crate::config::Config;
use crate::detection::Detection;
use crate::error::Error;

/// Invoked when a raw detection could not be matched to any existing track
/// and became one. The mutable borrow is the sanctioned place for consumers
/// to flip `downstream_processed`.
pub type DetectedCallback = Box<dyn FnMut(&mut Detection)>;

/// Invoked with ownership of a track that has just been removed after its
/// expiry timeout elapsed.
pub type ExpiredCallback = Box<dyn FnMut(Detection)>;

/// Configuration for the continuity tracker.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Fraction of the frame size a box corner may drift between frames and
    /// still be matched to the same track.
    pub movement_margin: f32,
    /// How long a track survives without a matching detection.
    pub expiry_timeout: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            movement_margin: 0.3,
            expiry_timeout: Duration::from_secs(5),
        }
    }
}

impl TrackerConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            movement_margin: config.movement_margin,
            expiry_timeout: Duration::from_secs(config.expiry_timeout_secs),
        }
    }

    fn validate(&self) -> Result<(), Error> {
        if !(self.movement_margin > 0.0 && self.movement_margin <= 1.0) {
            return Err(Error::Configuration(format!(
                "movement_margin must be within (0, 1], got {}",
                self.movement_margin
            )));
        }
        if self.expiry_timeout.is_zero() {
            return Err(Error::Configuration(
                "expiry_timeout must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Turns independent per-frame detection batches into persistent object
/// identities.
///
/// Owns the set of currently-live tracks, in first-observation order. One
/// call to [`Tracker::process_frame_detections`] fully completes, callbacks
/// included, before the next frame's batch may be submitted.
pub struct Tracker {
    tracks: Vec<Detection>,
    on_detected: Option<DetectedCallback>,
    on_expired: Option<ExpiredCallback>,
    movement_margin: f32,
    expiry_timeout: Duration,
}

impl Tracker {
    pub fn new(config: TrackerConfig) -> Result<Self, Error> {
        config.validate()?;
        Ok(Tracker {
            tracks: Vec::new(),
            on_detected: None,
            on_expired: None,
            movement_margin: config.movement_margin,
            expiry_timeout: config.expiry_timeout,
        })
    }

    pub fn set_detected_callback(&mut self, callback: impl FnMut(&mut Detection) + 'static) {
        self.on_detected = Some(Box::new(callback));
    }

    pub fn set_expired_callback(&mut self, callback: impl FnMut(Detection) + 'static) {
        self.on_expired = Some(Box::new(callback));
    }

    /// The currently-live tracks, in the order they were first observed.
    /// Snapshots are read-only and transient; the next processed frame may
    /// invalidate them.
    pub fn tracks(&self) -> &[Detection] {
        &self.tracks
    }

    /// Mutable access for downstream consumers to flag tracks as
    /// `downstream_processed` between frames.
    pub fn tracks_mut(&mut self) -> &mut [Detection] {
        &mut self.tracks
    }

    /// Reconcile one frame's raw detections against the live track set, then
    /// expire stale tracks. Executed once per frame, strictly sequentially.
    pub fn process_frame_detections(&mut self, raw_detections: Vec<Detection>) {
        for raw in raw_detections {
            self.reconcile(raw);
        }
        self.expire_stale();
    }

    /// Match one raw detection against the live collection, first-match-wins
    /// in first-observation order. A match only refreshes the track's
    /// timestamp; the raw detection's box, confidence, and frame are dropped
    /// so the track keeps its original observation. No candidate makes the
    /// raw detection a new track.
    fn reconcile(&mut self, raw: Detection) {
        let margin = self.movement_margin;
        let matched = self
            .tracks
            .iter()
            .position(|track| track.label() == raw.label() && raw.bounding_boxes_similar(track, margin));

        match matched {
            Some(index) => self.tracks[index].update_last_spotted(),
            None => {
                self.tracks.push(raw);
                if let (Some(callback), Some(track)) =
                    (self.on_detected.as_mut(), self.tracks.last_mut())
                {
                    callback(track);
                }
            }
        }
    }

    /// Two-phase expiry sweep: partition the collection into live and stale,
    /// reinstall the live set, then fire callbacks over the stale tracks in
    /// collection order. Never removes from the sequence being iterated.
    fn expire_stale(&mut self) {
        let timeout = self.expiry_timeout;
        let mut live = Vec::with_capacity(self.tracks.len());
        let mut expired = Vec::new();
        for track in self.tracks.drain(..) {
            if track.last_spotted().elapsed() > timeout {
                expired.push(track);
            } else {
                live.push(track);
            }
        }
        self.tracks = live;

        for track in expired {
            if let Some(callback) = self.on_expired.as_mut() {
                callback(track);
            }
        }
    }
}
