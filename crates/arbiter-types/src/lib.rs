//! `arbiter-types` – shared vocabulary of the behavior arbiter.
//!
//! Everything that crosses a crate boundary lives here: the closed
//! [`Mode`] registry, the sensor messages the arbiter consumes
//! ([`JoyState`], [`Region`], [`TrackUpdate`]), the [`Command`]s it emits,
//! the [`Event`] envelope carried by the bus, and the [`ArbiterError`]
//! taxonomy.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// ─────────────────────────────────────────────────────────────────────────────
// Mode registry
// ─────────────────────────────────────────────────────────────────────────────

/// High-level operating mode of the robot.
///
/// The discriminants are the ordinals used by the configuration surface
/// (`initial_mode = 1` selects [`Mode::Searching`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Mode {
    Idle = 0,
    Searching = 1,
    /// Reserved: no transition rules yet.
    LongRangeEngaging = 2,
    /// Reserved: no transition rules yet.
    LongRangeEngaged = 3,
    ApproachingPerson = 4,
    /// One-tick transient state entered when the tracked person is lost.
    ApproachingLost = 5,
    /// Reserved: no transition rules yet.
    FollowingPerson = 6,
    /// Reserved: no transition rules yet.
    CloseRangeEngaged = 7,
    /// Joystick override; autonomy is suspended.
    Manual = 8,
}

impl Mode {
    /// Every mode, in ordinal order.
    pub const ALL: [Mode; 9] = [
        Mode::Idle,
        Mode::Searching,
        Mode::LongRangeEngaging,
        Mode::LongRangeEngaged,
        Mode::ApproachingPerson,
        Mode::ApproachingLost,
        Mode::FollowingPerson,
        Mode::CloseRangeEngaged,
        Mode::Manual,
    ];

    /// Human-readable label used in the status line and in logs.
    pub fn display_name(self) -> &'static str {
        match self {
            Mode::Idle => "Idle",
            Mode::Searching => "Searching",
            Mode::LongRangeEngaging => "Long-range Engaging",
            Mode::LongRangeEngaged => "Long-range Engaged",
            Mode::ApproachingPerson => "Approaching The Person",
            Mode::ApproachingLost => "Lost The Person",
            Mode::FollowingPerson => "Following The Person",
            Mode::CloseRangeEngaged => "Close-range Engaged",
            Mode::Manual => "Manual (Joy Override)",
        }
    }

    pub fn ordinal(self) -> u8 {
        self as u8
    }

    /// `true` for the modes that have no transition rules and simply hold.
    pub fn is_reserved(self) -> bool {
        matches!(
            self,
            Mode::LongRangeEngaging
                | Mode::LongRangeEngaged
                | Mode::FollowingPerson
                | Mode::CloseRangeEngaged
        )
    }
}

impl TryFrom<u8> for Mode {
    type Error = ArbiterError;

    fn try_from(ordinal: u8) -> Result<Self, Self::Error> {
        Mode::ALL
            .get(usize::from(ordinal))
            .copied()
            .ok_or(ArbiterError::InvalidMode(ordinal))
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Inbound messages
// ─────────────────────────────────────────────────────────────────────────────

/// Image-space region of interest, in pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x_offset: u32,
    pub y_offset: u32,
    pub width: u32,
    pub height: u32,
    /// Whether the region should be computed on a rectified image.
    #[serde(default)]
    pub do_rectify: bool,
}

impl Region {
    pub fn new(x_offset: u32, y_offset: u32, width: u32, height: u32) -> Self {
        Self {
            x_offset,
            y_offset,
            width,
            height,
            do_rectify: false,
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{} {} {} {}]",
            self.x_offset, self.y_offset, self.width, self.height
        )
    }
}

/// Joystick snapshot.  Only `buttons` is interpreted by the arbiter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JoyState {
    pub buttons: Vec<bool>,
    #[serde(default)]
    pub axes: Vec<f32>,
}

impl JoyState {
    /// Look up a single button.
    ///
    /// Returns [`ArbiterError::Runtime`] when the message carries fewer
    /// buttons than `index` requires.
    pub fn button(&self, index: usize) -> Result<bool, ArbiterError> {
        self.buttons.get(index).copied().ok_or_else(|| {
            ArbiterError::Runtime(format!(
                "joystick button {index} requested but message has only {} buttons",
                self.buttons.len()
            ))
        })
    }
}

/// Visual tracker state reported with every [`TrackUpdate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackStatus {
    Tracking,
    Lost,
    Unknown,
}

/// Output of the visual tracker for a single frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackUpdate {
    pub status: TrackStatus,
    pub uid: u64,
    pub confidence: f32,
    pub roi: Region,
}

impl TrackUpdate {
    pub fn is_tracking(&self) -> bool {
        self.status == TrackStatus::Tracking
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Outbound commands
// ─────────────────────────────────────────────────────────────────────────────

/// Intent emitted by the behavior state machine for a downstream subsystem.
///
/// Enabling and disabling the visual servo are separate intents; the
/// dispatcher decides how each maps onto the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", content = "payload")]
pub enum Command {
    /// Drop whatever the visual tracker is currently following.
    ResetTracker,
    /// Seed the visual tracker with a detected region.
    InitTracker(Region),
    EnableVisualServo,
    DisableVisualServo,
    /// Region the visual servo should steer toward.
    SetServoTarget(Region),
}

// ─────────────────────────────────────────────────────────────────────────────
// Bus envelope
// ─────────────────────────────────────────────────────────────────────────────

/// Unified event wrapper for the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g. `"arbiter-runtime::behavior"`
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    /// Wrap `payload` with a fresh id and the current UTC time.
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

/// Variants of data that can be routed over the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    Joy(JoyState),
    /// Region reported by the periodic-motion detector.
    PeriodicTrack(Region),
    Track(TrackUpdate),
    /// Payload-less trigger (tracker reset).
    Trigger,
    Roi(Region),
    Enable(bool),
    Status(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Error taxonomy of the arbiter.
///
/// Stale inputs are deliberately absent: a stale input is a state the mode
/// logic reacts to, not a failure.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ArbiterError {
    #[error("Transport Error: {0}")]
    Transport(String),

    #[error("Runtime Error: {0}")]
    Runtime(String),

    #[error("Invalid Mode Ordinal: {0}")]
    InvalidMode(u8),

    #[error("Configuration Error: {0}")]
    Config(String),
}

impl ArbiterError {
    /// `true` for the categories the control loop logs and survives.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ArbiterError::Transport(_) | ArbiterError::Runtime(_))
    }
}
