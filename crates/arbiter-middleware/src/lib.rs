//! `arbiter-middleware` – the message bus.
//!
//! Carries sensor messages into the arbiter and its commands back out,
//! without caring what either side does with them.
//!
//! # Modules
//!
//! - [`bus`] – typed, topic-based publish/subscribe bus built on Tokio
//!   broadcast channels.
//! - [`sink`] – [`CommandSink`]: the seam through which the control loop
//!   delivers commands and status lines.

pub mod bus;
pub mod sink;

pub use bus::{EventBus, Topic, TopicReceiver};
pub use sink::{BEHAVIOR_SOURCE, CommandSink};
