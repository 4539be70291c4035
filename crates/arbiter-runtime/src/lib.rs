//! `arbiter-runtime` – the behavior engine.
//!
//! Decides, once per tick, which operating mode the robot is in and which
//! commands the tracker and visual servo should receive.
//!
//! # Modules
//!
//! - [`state_machine`] – [`BehaviorStateMachine`][state_machine::BehaviorStateMachine]:
//!   the per-tick decision function over an owned
//!   [`EngineState`][state_machine::EngineState].  Returns the commands it
//!   wants issued instead of publishing them, so it can be tested without a
//!   bus.
//! - [`status`] – [`StatusReporter`][status::StatusReporter]: formats the
//!   one-line status published every tick.
//! - [`control_loop`] – [`ControlLoop`][control_loop::ControlLoop]: drains the
//!   bus into the input caches, runs the tick at the configured rate and
//!   dispatches its output through a [`CommandSink`][arbiter_middleware::CommandSink].
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: initialises
//!   the global `tracing` subscriber with an optional OTLP span exporter.

pub mod control_loop;
pub mod state_machine;
pub mod status;
pub mod telemetry;

pub use control_loop::ControlLoop;
pub use state_machine::{BehaviorConfig, BehaviorStateMachine, EngineState, TickOutcome};
pub use status::StatusReporter;
pub use telemetry::{TracerProviderGuard, init_tracing};
