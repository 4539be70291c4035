//! [`CommandSink`] – where the control loop delivers its output.
//!
//! The behavior state machine never publishes anything itself; it returns a
//! list of [`Command`]s.  The control loop hands them to a `CommandSink`,
//! which for a running system is the [`EventBus`].  Tests substitute a
//! recording or failing sink.
//!
//! # Command routing
//!
//! | Command | Topic | Payload |
//! |---|---|---|
//! | `ResetTracker` | `visual_tracker_reset` | `Trigger` |
//! | `InitTracker(roi)` | `visual_tracker_init` | `Roi(roi)` |
//! | `EnableVisualServo` | `visual_servo_enable` | `Enable(true)` |
//! | `DisableVisualServo` | `visual_servo_enable` | `Enable(false)` |
//! | `SetServoTarget(roi)` | `visual_servo_roi` | `Roi(roi)` |

use arbiter_types::{ArbiterError, Command, Event, EventPayload};
use tracing::debug;

use crate::bus::{EventBus, Topic};

/// Source tag stamped on every event the arbiter publishes.
pub const BEHAVIOR_SOURCE: &str = "arbiter-runtime::behavior";

/// Output seam of the control loop.
///
/// Both methods are fire-and-forget: they must not block, and an `Err` is
/// treated by the caller as a recoverable transport failure.
pub trait CommandSink: Send + Sync {
    /// Deliver one command to its downstream subsystem.
    fn send_command(&self, command: &Command) -> Result<(), ArbiterError>;

    /// Publish the per-tick status line.
    fn publish_status(&self, line: &str) -> Result<(), ArbiterError>;
}

/// Topic and payload a command is published as.
pub fn route(command: &Command) -> (Topic, EventPayload) {
    match *command {
        Command::ResetTracker => (Topic::VisualTrackerReset, EventPayload::Trigger),
        Command::InitTracker(roi) => (Topic::VisualTrackerInit, EventPayload::Roi(roi)),
        Command::EnableVisualServo => (Topic::VisualServoEnable, EventPayload::Enable(true)),
        Command::DisableVisualServo => (Topic::VisualServoEnable, EventPayload::Enable(false)),
        Command::SetServoTarget(roi) => (Topic::VisualServoRoi, EventPayload::Roi(roi)),
    }
}

impl CommandSink for EventBus {
    fn send_command(&self, command: &Command) -> Result<(), ArbiterError> {
        let (topic, payload) = route(command);
        let delivered = self.publish_to(topic, Event::new(BEHAVIOR_SOURCE, payload))?;
        debug!(topic = topic.name(), delivered, ?command, "command published");
        Ok(())
    }

    fn publish_status(&self, line: &str) -> Result<(), ArbiterError> {
        self.publish_to(
            Topic::Status,
            Event::new(BEHAVIOR_SOURCE, EventPayload::Status(line.to_string())),
        )?;
        Ok(())
    }
}
