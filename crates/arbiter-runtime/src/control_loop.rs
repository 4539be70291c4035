//! [`ControlLoop`] – fixed-rate driver of the behavior engine.
//!
//! Each tick:
//!
//! 1. **Refresh** – drain the `joy`, `periodic_tracks` and
//!    `visual_tracker_track` receivers without blocking and store the latest
//!    message of each in the [`InputCache`].
//! 2. **Snapshot** – freeze the cache into an [`InputSnapshot`], dropping
//!    stale streams.
//! 3. **Decide** – run [`BehaviorStateMachine::tick`] (override arbiter plus
//!    mode logic) on the owned [`EngineState`].
//! 4. **Report** – format the status line.
//! 5. **Dispatch** – hand commands and status to the [`CommandSink`].
//!
//! # Error policy
//!
//! [`ArbiterError::Transport`] and [`ArbiterError::Runtime`] are logged and
//! the loop carries on with the next tick.  Anything else ends
//! [`ControlLoop::run`] with an error.  A malformed joystick message is not an
//! error: the snapshot treats the joystick as inactive and the tick runs.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use arbiter_kernel::{InputCache, InputSnapshot};
use arbiter_middleware::{CommandSink, EventBus, Topic, TopicReceiver};
use arbiter_types::ArbiterError;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, instrument, warn};

use crate::state_machine::{BehaviorConfig, BehaviorStateMachine, EngineState, TickOutcome};
use crate::status::StatusReporter;

/// Owns the engine state, the input caches and the bus receivers.
pub struct ControlLoop<S: CommandSink> {
    machine: BehaviorStateMachine,
    state: EngineState,
    inputs: InputCache,
    reporter: StatusReporter,
    missed_deadlines: u64,
    joy_rx: TopicReceiver,
    periodic_tracks_rx: TopicReceiver,
    tracker_rx: TopicReceiver,
    sink: S,
}

impl<S: CommandSink> ControlLoop<S> {
    /// Subscribe to the inbound topics of `bus` and start cold in the
    /// configured initial mode.
    pub fn new(config: BehaviorConfig, bus: &EventBus, sink: S) -> Self {
        let machine = BehaviorStateMachine::new(config);
        let state = machine.initial_state(Instant::now());
        info!(initial_mode = %state.current_mode, "behavior engine initialised");
        Self {
            machine,
            state,
            inputs: InputCache::new(),
            reporter: StatusReporter::default(),
            missed_deadlines: 0,
            joy_rx: bus.subscribe_to(Topic::Joy),
            periodic_tracks_rx: bus.subscribe_to(Topic::PeriodicTracks),
            tracker_rx: bus.subscribe_to(Topic::VisualTrackerTrack),
            sink,
        }
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn config(&self) -> &BehaviorConfig {
        self.machine.config()
    }

    /// Ticks of [`ControlLoop::run`] that overran their period.
    pub fn missed_deadlines(&self) -> u64 {
        self.missed_deadlines
    }

    /// Run one full tick at instant `now`.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by the sink.  The tick's state change
    /// has already been applied and every command is still attempted.
    /// [`ArbiterError::Transport`] is also returned if an inbound channel
    /// closed, before anything else happens.
    #[instrument(level = "debug", skip_all)]
    pub fn tick(&mut self, now: Instant) -> Result<TickOutcome, ArbiterError> {
        self.drain_bus_events(now)?;

        let config = self.machine.config();
        let snapshot: InputSnapshot = self.inputs.snapshot(
            now,
            config.staleness_threshold,
            config.override_button_index,
        );

        let outcome = self.machine.tick(&mut self.state, &snapshot, now);
        let line = self.reporter.report(&outcome, now);

        let mut first_error = None;
        for command in &outcome.commands {
            if let Err(e) = self.sink.send_command(command) {
                warn!(?command, error = %e, "command dispatch failed");
                first_error.get_or_insert(e);
            }
        }
        if let Err(e) = self.sink.publish_status(&line) {
            first_error.get_or_insert(e);
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(outcome),
        }
    }

    /// Tick at the configured rate until `shutdown` is raised.
    ///
    /// # Errors
    ///
    /// Returns [`ArbiterError::Config`] if the tick rate has no usable period,
    /// otherwise the first non-recoverable error raised by a tick.
    pub async fn run(&mut self, shutdown: Arc<AtomicBool>) -> Result<(), ArbiterError> {
        let rate_hz = self.machine.config().tick_rate_hz;
        let period = self.machine.config().tick_period()?;
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(rate_hz, "behavior loop started");
        while !shutdown.load(Ordering::SeqCst) {
            let scheduled = interval.tick().await;
            if shutdown.load(Ordering::SeqCst) {
                break;
            }

            match self.tick(Instant::now()) {
                Ok(_) => {}
                Err(e) if e.is_recoverable() => {
                    error!(error = %e, "tick failed, continuing");
                }
                Err(e) => {
                    error!(error = %e, "unrecoverable error, stopping behavior loop");
                    return Err(e);
                }
            }

            if scheduled.elapsed() > period {
                self.missed_deadlines += 1;
                warn!(rate_hz, "loop frequency of {rate_hz} Hz missed");
            }
        }
        info!("exiting the main loop");
        Ok(())
    }

    fn drain_bus_events(&mut self, now: Instant) -> Result<(), ArbiterError> {
        for rx in [
            &mut self.joy_rx,
            &mut self.periodic_tracks_rx,
            &mut self.tracker_rx,
        ] {
            drain(rx, &mut self.inputs, now)?;
        }
        Ok(())
    }
}

/// Move everything buffered on `rx` into `inputs`; the last message wins.
fn drain(rx: &mut TopicReceiver, inputs: &mut InputCache, now: Instant) -> Result<(), ArbiterError> {
    loop {
        match rx.try_recv() {
            Ok(event) => {
                inputs.ingest(event.payload, now);
            }
            Err(TryRecvError::Empty) => return Ok(()),
            Err(TryRecvError::Lagged(skipped)) => {
                warn!(topic = rx.topic().name(), skipped, "input receiver lagged");
            }
            Err(TryRecvError::Closed) => {
                return Err(ArbiterError::Transport(format!(
                    "topic '{}' closed",
                    rx.topic().name()
                )));
            }
        }
    }
}
