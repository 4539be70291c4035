//! Headless, typed, topic-based publish/subscribe bus.
//!
//! Uses [`tokio::sync::broadcast`] channels under the hood so that every
//! subscriber receives every message without any single subscriber blocking
//! the others.
//!
//! # Topics
//!
//! | Topic | Name | Payload |
//! |---|---|---|
//! | [`Topic::Joy`] | `joy` | [`EventPayload::Joy`] |
//! | [`Topic::PeriodicTracks`] | `periodic_tracks` | [`EventPayload::PeriodicTrack`] |
//! | [`Topic::VisualTrackerTrack`] | `visual_tracker_track` | [`EventPayload::Track`] |
//! | [`Topic::VisualTrackerReset`] | `visual_tracker_reset` | [`EventPayload::Trigger`] |
//! | [`Topic::VisualTrackerInit`] | `visual_tracker_init` | [`EventPayload::Roi`] |
//! | [`Topic::VisualServoEnable`] | `visual_servo_enable` | [`EventPayload::Enable`] |
//! | [`Topic::VisualServoRoi`] | `visual_servo_roi` | [`EventPayload::Roi`] |
//! | [`Topic::Status`] | `status` | [`EventPayload::Status`] |

use arbiter_types::{ArbiterError, Event, EventPayload};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

/// Default channel capacity (number of buffered events before old ones are
/// dropped for slow subscribers).
const DEFAULT_CAPACITY: usize = 64;

/// Every routing lane on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Joystick button/axis state.
    Joy,
    /// Regions from the periodic-motion detector.
    PeriodicTracks,
    /// Per-frame visual tracker output.
    VisualTrackerTrack,
    VisualTrackerReset,
    VisualTrackerInit,
    VisualServoEnable,
    VisualServoRoi,
    /// Human-readable status line, once per tick.
    Status,
}

impl Topic {
    pub const ALL: [Topic; 8] = [
        Topic::Joy,
        Topic::PeriodicTracks,
        Topic::VisualTrackerTrack,
        Topic::VisualTrackerReset,
        Topic::VisualTrackerInit,
        Topic::VisualServoEnable,
        Topic::VisualServoRoi,
        Topic::Status,
    ];

    /// Conventional topic name, as used by transport adapters.
    pub fn name(self) -> &'static str {
        match self {
            Topic::Joy => "joy",
            Topic::PeriodicTracks => "periodic_tracks",
            Topic::VisualTrackerTrack => "visual_tracker_track",
            Topic::VisualTrackerReset => "visual_tracker_reset",
            Topic::VisualTrackerInit => "visual_tracker_init",
            Topic::VisualServoEnable => "visual_servo_enable",
            Topic::VisualServoRoi => "visual_servo_roi",
            Topic::Status => "status",
        }
    }

    /// `true` if `payload` is the message type carried on this topic.
    pub fn accepts(self, payload: &EventPayload) -> bool {
        matches!(
            (self, payload),
            (Topic::Joy, EventPayload::Joy(_))
                | (Topic::PeriodicTracks, EventPayload::PeriodicTrack(_))
                | (Topic::VisualTrackerTrack, EventPayload::Track(_))
                | (Topic::VisualTrackerReset, EventPayload::Trigger)
                | (Topic::VisualTrackerInit, EventPayload::Roi(_))
                | (Topic::VisualServoEnable, EventPayload::Enable(_))
                | (Topic::VisualServoRoi, EventPayload::Roi(_))
                | (Topic::Status, EventPayload::Status(_))
        )
    }
}

/// Shared bus. Clone it cheaply – all clones share the same underlying
/// broadcast channels.
#[derive(Clone, Debug)]
pub struct EventBus {
    joy: broadcast::Sender<Event>,
    periodic_tracks: broadcast::Sender<Event>,
    visual_tracker_track: broadcast::Sender<Event>,
    visual_tracker_reset: broadcast::Sender<Event>,
    visual_tracker_init: broadcast::Sender<Event>,
    visual_servo_enable: broadcast::Sender<Event>,
    visual_servo_roi: broadcast::Sender<Event>,
    status: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a new bus with the given channel capacity.
    ///
    /// The `capacity` is applied to every topic channel independently.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero (a Tokio broadcast restriction).
    pub fn new(capacity: usize) -> Self {
        Self {
            joy: broadcast::channel(capacity).0,
            periodic_tracks: broadcast::channel(capacity).0,
            visual_tracker_track: broadcast::channel(capacity).0,
            visual_tracker_reset: broadcast::channel(capacity).0,
            visual_tracker_init: broadcast::channel(capacity).0,
            visual_servo_enable: broadcast::channel(capacity).0,
            visual_servo_roi: broadcast::channel(capacity).0,
            status: broadcast::channel(capacity).0,
        }
    }

    /// Publish `event` to the given [`Topic`] channel.
    ///
    /// Returns the number of active receivers that were handed the event.
    /// Returns `Ok(0)` when nobody is listening: publishing is
    /// fire-and-forget.
    ///
    /// # Errors
    ///
    /// [`ArbiterError::Transport`] if the payload does not belong on `topic`.
    pub fn publish_to(&self, topic: Topic, event: Event) -> Result<usize, ArbiterError> {
        if !topic.accepts(&event.payload) {
            return Err(ArbiterError::Transport(format!(
                "payload {:?} rejected on topic '{}'",
                event.payload,
                topic.name()
            )));
        }
        let sender = self.topic_sender(topic);
        Ok(sender.send(event).unwrap_or(0))
    }

    /// Subscribe to a specific [`Topic`] channel.
    pub fn subscribe_to(&self, topic: Topic) -> TopicReceiver {
        TopicReceiver {
            topic,
            receiver: self.topic_sender(topic).subscribe(),
        }
    }

    /// Number of receivers currently subscribed to `topic`.
    pub fn receiver_count(&self, topic: Topic) -> usize {
        self.topic_sender(topic).receiver_count()
    }

    fn topic_sender(&self, topic: Topic) -> &broadcast::Sender<Event> {
        match topic {
            Topic::Joy => &self.joy,
            Topic::PeriodicTracks => &self.periodic_tracks,
            Topic::VisualTrackerTrack => &self.visual_tracker_track,
            Topic::VisualTrackerReset => &self.visual_tracker_reset,
            Topic::VisualTrackerInit => &self.visual_tracker_init,
            Topic::VisualServoEnable => &self.visual_servo_enable,
            Topic::VisualServoRoi => &self.visual_servo_roi,
            Topic::Status => &self.status,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Topic-bound receiver
// ---------------------------------------------------------------------------

/// A receiver bound to a single [`Topic`] channel.
///
/// Obtained via [`EventBus::subscribe_to`].
pub struct TopicReceiver {
    topic: Topic,
    receiver: broadcast::Receiver<Event>,
}

impl TopicReceiver {
    /// Wait for the next event on this topic.
    ///
    /// Returns:
    /// * `Ok(event)` – a successfully received event.
    /// * `Err(RecvError::Lagged(n))` – the subscriber fell behind and `n`
    ///   messages were dropped.
    /// * `Err(RecvError::Closed)` – the bus has shut down.
    pub async fn recv(&mut self) -> Result<Event, RecvError> {
        self.receiver.recv().await
    }

    /// Take the next buffered event without waiting.
    pub fn try_recv(&mut self) -> Result<Event, TryRecvError> {
        self.receiver.try_recv()
    }

    /// The [`Topic`] this receiver is bound to.
    pub fn topic(&self) -> Topic {
        self.topic
    }
}
