//! [`OverrideArbiter`] – the joystick safety interlock.
//!
//! Evaluated once per tick, after the inputs are refreshed and before any
//! mode-specific logic.  While the robot is in any mode other than
//! [`Mode::Manual`], a live joystick with the override button held forces
//! the robot into `Manual` and remembers the interrupted mode so it can be
//! resumed when the button is released.
//!
//! Because the rule lives here and runs ahead of the mode dispatch, no mode
//! branch can forget to honour it.
//!
//! # Example
//!
//! ```
//! use arbiter_kernel::{InputSnapshot, OverrideArbiter};
//! use arbiter_types::Mode;
//!
//! let held = InputSnapshot { override_pressed: Some(true), ..Default::default() };
//!
//! let mut mode = Mode::Searching;
//! let mut resume = Mode::Idle;
//! assert!(OverrideArbiter::apply(&mut mode, &mut resume, &held));
//! assert_eq!(mode, Mode::Manual);
//! assert_eq!(resume, Mode::Searching);
//! ```

use arbiter_types::Mode;
use tracing::warn;

use crate::inputs::InputSnapshot;

/// Outcome of an override that fired: the mode to come back to later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preemption {
    pub resume_mode: Mode,
}

/// Stateless evaluator for the override rule.
pub struct OverrideArbiter;

impl OverrideArbiter {
    /// Decide whether the override pre-empts `current` this tick.
    pub fn evaluate(current: Mode, inputs: &InputSnapshot) -> Option<Preemption> {
        if current != Mode::Manual && inputs.override_held() {
            Some(Preemption {
                resume_mode: current,
            })
        } else {
            None
        }
    }

    /// Apply the override rule in place.
    ///
    /// Returns `true` if the override fired.  Applying it a second time with
    /// the same inputs is a no-op, since the mode is already `Manual`.
    pub fn apply(current: &mut Mode, resume: &mut Mode, inputs: &InputSnapshot) -> bool {
        match Self::evaluate(*current, inputs) {
            Some(preemption) => {
                warn!(interrupted = %preemption.resume_mode, "joystick override detected");
                *resume = preemption.resume_mode;
                *current = Mode::Manual;
                true
            }
            None => false,
        }
    }
}
