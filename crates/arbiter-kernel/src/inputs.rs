//! The arbiter's three sensor streams and the per-tick view of them.
//!
//! [`InputCache`] owns one [`FreshInput`] per stream.  At the start of every
//! tick the control loop feeds it whatever arrived on the bus, then freezes
//! it into an [`InputSnapshot`]: stale streams become `None`, and the
//! joystick message is reduced to the single override button the arbiter
//! cares about.  The state machine only ever sees the snapshot.

use std::time::{Duration, Instant};

use arbiter_types::{EventPayload, JoyState, Region, TrackUpdate};
use tracing::{trace, warn};

use crate::fresh_input::FreshInput;

/// Latest joystick, periodic detection, and tracker messages.
#[derive(Debug, Default)]
pub struct InputCache {
    pub joy: FreshInput<JoyState>,
    pub periodic_tracks: FreshInput<Region>,
    pub tracker: FreshInput<TrackUpdate>,
}

impl InputCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an inbound payload in the matching cache, stamped with `now`.
    ///
    /// Returns `false` for payloads that are not sensor input (commands and
    /// status lines), which are ignored.
    pub fn ingest(&mut self, payload: EventPayload, now: Instant) -> bool {
        match payload {
            EventPayload::Joy(joy) => self.joy.update(joy, now),
            EventPayload::PeriodicTrack(roi) => self.periodic_tracks.update(roi, now),
            EventPayload::Track(track) => self.tracker.update(track, now),
            other => {
                trace!(payload = ?other, "ignoring non-input payload");
                return false;
            }
        }
        true
    }

    /// Freeze the cache into the view used for one tick.
    ///
    /// A fresh joystick message with no button at `override_button` counts
    /// as an inactive joystick, so the rest of the tick still runs.
    pub fn snapshot(&self, now: Instant, staleness: Duration, override_button: usize) -> InputSnapshot {
        let override_pressed = self
            .joy
            .active(now, staleness)
            .and_then(|joy| match joy.button(override_button) {
                Ok(pressed) => Some(pressed),
                Err(e) => {
                    warn!(error = %e, "ignoring malformed joystick message");
                    None
                }
            });
        InputSnapshot {
            override_pressed,
            detection: self.periodic_tracks.active(now, staleness).copied(),
            track: self.tracker.active(now, staleness).cloned(),
        }
    }
}

/// What the behavior logic may rely on during one tick.
///
/// `None` means the stream is stale or has never produced anything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputSnapshot {
    /// State of the override button, if the joystick is live.
    pub override_pressed: Option<bool>,
    /// Region from the periodic-motion detector.
    pub detection: Option<Region>,
    pub track: Option<TrackUpdate>,
}

impl InputSnapshot {
    /// Joystick live and override button held.
    pub fn override_held(&self) -> bool {
        self.override_pressed == Some(true)
    }

    /// Joystick live and override button up.
    pub fn override_released(&self) -> bool {
        self.override_pressed == Some(false)
    }
}
