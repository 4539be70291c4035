//! `arbiter-kernel` – input freshness and safety pre-emption.
//!
//! It does not decide behavior; it decides what the behavior logic is allowed
//! to believe and when a human takes over.
//!
//! # Modules
//!
//! - [`fresh_input`] – [`FreshInput`][fresh_input::FreshInput]: latest-value
//!   cache for one inbound stream, with an age-based activity check.
//! - [`inputs`] – [`InputCache`][inputs::InputCache] bundling the three
//!   sensor streams, and the per-tick [`InputSnapshot`][inputs::InputSnapshot]
//!   the state machine reads.
//! - [`override_arbiter`] – the joystick override rule, evaluated once per
//!   tick before any mode logic.

pub mod fresh_input;
pub mod inputs;
pub mod override_arbiter;

pub use fresh_input::FreshInput;
pub use inputs::{InputCache, InputSnapshot};
pub use override_arbiter::{OverrideArbiter, Preemption};
