//! [`StatusReporter`] – the one-line status published every tick.
//!
//! ```text
//! Current State: 'Searching' Duration: 3.200
//! Current State: 'Searching' Duration: 3.300 -> 'Approaching The Person'
//! ```
//!
//! The arrow suffix appears only on ticks that changed mode.  The same line
//! is echoed to the debug log, at most once per `log_interval`.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::state_machine::TickOutcome;

/// Formats tick outcomes and throttles their debug logging.
#[derive(Debug)]
pub struct StatusReporter {
    log_interval: Duration,
    last_logged: Option<Instant>,
}

impl Default for StatusReporter {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl StatusReporter {
    pub fn new(log_interval: Duration) -> Self {
        Self {
            log_interval,
            last_logged: None,
        }
    }

    /// Render the status line for `outcome`.
    pub fn format(outcome: &TickOutcome) -> String {
        let mut line = format!(
            "Current State: '{}' Duration: {:.3}",
            outcome.mode,
            outcome.duration.as_secs_f64()
        );
        if outcome.changed_mode() {
            line.push_str(&format!(" -> '{}'", outcome.next_mode));
        }
        line
    }

    /// Render the status line and log it if the throttle allows.
    pub fn report(&mut self, outcome: &TickOutcome, now: Instant) -> String {
        let line = Self::format(outcome);
        if self.would_log(now) {
            debug!(status = %line, "behavior status");
            self.last_logged = Some(now);
        }
        line
    }

    /// `true` if a call to [`report`][Self::report] at `now` would log.
    pub fn would_log(&self, now: Instant) -> bool {
        self.last_logged
            .is_none_or(|last| now.saturating_duration_since(last) >= self.log_interval)
    }
}
