//! Behavior state machine.
//!
//! One call to [`BehaviorStateMachine::tick`] is one decision step:
//!
//! 1. **Transition detection** – if the mode changed since the previous tick,
//!    the mode timer restarts and the mode's on-entry actions will run.
//! 2. **Override** – [`OverrideArbiter`] may force [`Mode::Manual`].
//! 3. **Mode logic** – the (possibly overridden) current mode inspects the [`InputSnapshot`] and
//!    its time-in-mode, appends [`Command`]s and may select the next mode.
//!
//! | Mode | On entry | Each tick |
//! |---|---|---|
//! | `Idle` | reset tracker | after `idle_timeout` go to the initial mode (`Searching` if that is `Idle`) |
//! | `Searching` | – | seed the tracker from detections; go to `ApproachingPerson` once tracking |
//! | `ApproachingPerson` | enable servo | steer at the track; go to `ApproachingLost` when it is stale or lost |
//! | `ApproachingLost` | disable servo | go to `Idle` |
//! | `Manual` | – | after `override_timeout` resume into `Idle`; leave when the button is released |
//! | reserved modes | – | hold |
//!
//! The machine never publishes anything.  The caller owns the
//! [`EngineState`] and decides what to do with the returned commands.

use std::time::{Duration, Instant};

use arbiter_kernel::{InputSnapshot, OverrideArbiter};
use arbiter_types::{ArbiterError, Command, Mode};
use tracing::{error, info, warn};

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Per-run parameters.  Fixed once the loop starts.
#[derive(Debug, Clone, PartialEq)]
pub struct BehaviorConfig {
    /// Control loop frequency.
    pub tick_rate_hz: f64,
    /// Mode the engine starts in, and the target of an idle timeout.
    pub initial_mode: Mode,
    /// Index of the joystick button that requests manual control.
    pub override_button_index: usize,
    /// Time in `Manual` after which the interrupted mode is forgotten.
    pub override_timeout: Duration,
    /// Time in `Idle` after which the engine restarts autonomy.
    pub idle_timeout: Duration,
    /// Maximum age of an input before it is considered absent.
    pub staleness_threshold: Duration,
}

impl BehaviorConfig {
    /// Nominal duration of one tick.
    ///
    /// # Errors
    ///
    /// [`ArbiterError::Config`] if the rate does not give a representable,
    /// non-zero period.
    pub fn tick_period(&self) -> Result<Duration, ArbiterError> {
        match Duration::try_from_secs_f64(1.0 / self.tick_rate_hz) {
            Ok(period) if !period.is_zero() => Ok(period),
            _ => Err(ArbiterError::Config(format!(
                "tick rate of {} Hz has no usable period",
                self.tick_rate_hz
            ))),
        }
    }
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: 10.0,
            initial_mode: Mode::Idle,
            override_button_index: 7,
            override_timeout: Duration::from_secs(20),
            idle_timeout: Duration::from_secs(10),
            staleness_threshold: Duration::from_secs(1),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Engine state
// ─────────────────────────────────────────────────────────────────────────────

/// The only mutable state of the behavior engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineState {
    pub current_mode: Mode,
    /// Mode as of the end of the previous tick.
    pub previous_mode: Mode,
    /// Mode to return to when the joystick override ends.
    pub resume_mode: Mode,
    /// When `current_mode` was first observed.
    pub last_transition_time: Instant,
}

impl EngineState {
    /// Cold start in `initial` at `now`.
    pub fn new(initial: Mode, now: Instant) -> Self {
        Self {
            current_mode: initial,
            previous_mode: initial,
            resume_mode: initial,
            last_transition_time: now,
        }
    }
}

/// Result of one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutcome {
    /// Mode the tick started in.
    pub mode: Mode,
    /// Mode the next tick will start in.
    pub next_mode: Mode,
    /// `true` if this tick was the first one spent in `mode`.
    pub is_transition: bool,
    /// Time spent in `mode` as of this tick.
    pub duration: Duration,
    /// `true` if the joystick override fired this tick.  Reporting only.
    pub preempted: bool,
    /// Commands to issue, in order.
    pub commands: Vec<Command>,
}

impl TickOutcome {
    pub fn changed_mode(&self) -> bool {
        self.mode != self.next_mode
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// State machine
// ─────────────────────────────────────────────────────────────────────────────

/// Mode arbitration logic, parameterised by a [`BehaviorConfig`].
#[derive(Debug, Clone)]
pub struct BehaviorStateMachine {
    config: BehaviorConfig,
}

impl BehaviorStateMachine {
    pub fn new(config: BehaviorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BehaviorConfig {
        &self.config
    }

    /// A fresh [`EngineState`] in the configured initial mode.
    pub fn initial_state(&self, now: Instant) -> EngineState {
        EngineState::new(self.config.initial_mode, now)
    }

    /// Advance `state` by one tick at instant `now`.
    pub fn tick(&self, state: &mut EngineState, inputs: &InputSnapshot, now: Instant) -> TickOutcome {
        let mode = state.current_mode;
        let is_transition = mode != state.previous_mode;
        if is_transition {
            warn!(from = %state.previous_mode, to = %mode, "state transitioned");
            state.last_transition_time = now;
        }
        let duration = now.saturating_duration_since(state.last_transition_time);
        state.previous_mode = mode;

        let mut commands = Vec::new();

        let preempted = OverrideArbiter::apply(&mut state.current_mode, &mut state.resume_mode, inputs);

        // Dispatch on the post-override mode with the duration measured above.
        let dispatched = state.current_mode;
        match dispatched {
            Mode::Idle => self.idle(state, is_transition, duration, &mut commands),
            Mode::Searching => Self::searching(state, inputs, &mut commands),
            Mode::ApproachingPerson => Self::approaching(state, inputs, is_transition, &mut commands),
            Mode::ApproachingLost => Self::lost(state, is_transition, &mut commands),
            Mode::Manual => self.manual(state, inputs, duration),
            Mode::LongRangeEngaging
            | Mode::LongRangeEngaged
            | Mode::FollowingPerson
            | Mode::CloseRangeEngaged => {}
        }

        TickOutcome {
            mode,
            next_mode: state.current_mode,
            is_transition,
            duration,
            preempted,
            commands,
        }
    }

    fn idle(
        &self,
        state: &mut EngineState,
        is_transition: bool,
        duration: Duration,
        commands: &mut Vec<Command>,
    ) {
        if is_transition {
            warn!("behavior reset");
            commands.push(Command::ResetTracker);
        }
        if duration > self.config.idle_timeout {
            // Never time out of Idle back into Idle.
            let next = match self.config.initial_mode {
                Mode::Idle => Mode::Searching,
                other => other,
            };
            info!(next = %next, "idle timeout, transitioning to initial state");
            state.current_mode = next;
        }
    }

    fn searching(state: &mut EngineState, inputs: &InputSnapshot, commands: &mut Vec<Command>) {
        if let Some(roi) = inputs.detection {
            info!(roi = %roi, "periodic detector found a stationary track");
            commands.push(Command::InitTracker(roi));
        }
        if let Some(track) = &inputs.track
            && track.is_tracking()
        {
            info!(
                uid = track.uid,
                confidence = track.confidence,
                "visual tracker initialized, approaching"
            );
            state.current_mode = Mode::ApproachingPerson;
        }
    }

    fn approaching(
        state: &mut EngineState,
        inputs: &InputSnapshot,
        is_transition: bool,
        commands: &mut Vec<Command>,
    ) {
        if is_transition {
            info!("enabling visual servo");
            commands.push(Command::EnableVisualServo);
        }
        match &inputs.track {
            None => {
                error!("visual tracker is stale while approaching");
                state.current_mode = Mode::ApproachingLost;
            }
            Some(track) if !track.is_tracking() => {
                warn!(uid = track.uid, status = ?track.status, "tracker has lost the person");
                state.current_mode = Mode::ApproachingLost;
            }
            Some(track) => commands.push(Command::SetServoTarget(track.roi)),
        }
    }

    fn lost(state: &mut EngineState, is_transition: bool, commands: &mut Vec<Command>) {
        if is_transition {
            info!("disabling visual servo");
            commands.push(Command::DisableVisualServo);
        }
        state.current_mode = Mode::Idle;
    }

    fn manual(&self, state: &mut EngineState, inputs: &InputSnapshot, duration: Duration) {
        if duration > self.config.override_timeout && state.resume_mode != Mode::Idle {
            warn!(
                timeout_s = self.config.override_timeout.as_secs_f64(),
                abandoned = %state.resume_mode,
                "override timeout exceeded, behavior will be reset after override is over"
            );
            state.resume_mode = Mode::Idle;
        }
        if inputs.override_released() {
            warn!(resume = %state.resume_mode, "joystick override ended");
            state.current_mode = state.resume_mode;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbiter_types::{Region, TrackStatus, TrackUpdate};

    fn secs(s: f64) -> Duration {
        Duration::from_secs_f64(s)
    }

    fn settled(mode: Mode, t0: Instant) -> EngineState {
        EngineState::new(mode, t0)
    }

    fn track(status: TrackStatus) -> TrackUpdate {
        TrackUpdate {
            status,
            uid: 11,
            confidence: 0.9,
            roi: Region::new(100, 50, 40, 120),
        }
    }

    fn with_track(status: TrackStatus) -> InputSnapshot {
        InputSnapshot {
            track: Some(track(status)),
            ..Default::default()
        }
    }

    fn held() -> InputSnapshot {
        InputSnapshot {
            override_pressed: Some(true),
            ..Default::default()
        }
    }

    fn released() -> InputSnapshot {
        InputSnapshot {
            override_pressed: Some(false),
            ..Default::default()
        }
    }

    fn count(commands: &[Command], wanted: Command) -> usize {
        commands.iter().filter(|c| **c == wanted).count()
    }

    #[test]
    fn transition_is_detected_once_and_resets_timer() {
        let machine = BehaviorStateMachine::new(BehaviorConfig::default());
        let t0 = Instant::now();
        let mut state = settled(Mode::Idle, t0);
        state.current_mode = Mode::Searching;

        let t1 = t0 + secs(3.0);
        let first = machine.tick(&mut state, &InputSnapshot::default(), t1);
        assert!(first.is_transition);
        assert_eq!(first.duration, Duration::ZERO);
        assert_eq!(state.last_transition_time, t1);

        let second = machine.tick(&mut state, &InputSnapshot::default(), t1 + secs(0.5));
        assert!(!second.is_transition);
        assert_eq!(second.duration, secs(0.5));
        assert_eq!(state.previous_mode, Mode::Searching);
    }

    #[test]
    fn override_preempts_every_autonomous_mode() {
        let machine = BehaviorStateMachine::new(BehaviorConfig::default());
        let t0 = Instant::now();
        for mode in Mode::ALL.into_iter().filter(|m| *m != Mode::Manual) {
            let mut state = settled(mode, t0);
            let outcome = machine.tick(&mut state, &held(), t0 + secs(0.1));
            assert_eq!(outcome.next_mode, Mode::Manual, "{mode} was not pre-empted");
            assert!(outcome.preempted);
            assert!(outcome.commands.is_empty());
            assert_eq!(state.resume_mode, mode);
        }
    }

    #[test]
    fn override_on_entry_tick_suppresses_entry_action() {
        let machine = BehaviorStateMachine::new(BehaviorConfig::default());
        let t0 = Instant::now();
        let mut state = settled(Mode::Searching, t0);
        state.current_mode = Mode::ApproachingPerson;

        let outcome = machine.tick(&mut state, &held(), t0 + secs(0.1));
        assert_eq!(outcome.next_mode, Mode::Manual);
        assert_eq!(count(&outcome.commands, Command::EnableVisualServo), 0);
        assert_eq!(state.resume_mode, Mode::ApproachingPerson);
    }

    #[test]
    fn idle_timeout_with_idle_initial_mode_goes_searching() {
        let config = BehaviorConfig {
            idle_timeout: secs(5.0),
            ..Default::default()
        };
        let machine = BehaviorStateMachine::new(config);
        let t0 = Instant::now();
        let mut state = machine.initial_state(t0);

        let early = machine.tick(&mut state, &InputSnapshot::default(), t0 + secs(4.9));
        assert_eq!(early.next_mode, Mode::Idle);

        let late = machine.tick(&mut state, &InputSnapshot::default(), t0 + secs(5.1));
        assert_eq!(late.next_mode, Mode::Searching);
    }

    #[test]
    fn idle_timeout_returns_to_configured_initial_mode() {
        let config = BehaviorConfig {
            initial_mode: Mode::LongRangeEngaging,
            idle_timeout: secs(2.0),
            ..Default::default()
        };
        let machine = BehaviorStateMachine::new(config);
        let t0 = Instant::now();
        let mut state = settled(Mode::Idle, t0);

        let outcome = machine.tick(&mut state, &InputSnapshot::default(), t0 + secs(2.5));
        assert_eq!(outcome.next_mode, Mode::LongRangeEngaging);
    }

    #[test]
    fn entering_idle_resets_tracker_once() {
        let machine = BehaviorStateMachine::new(BehaviorConfig::default());
        let t0 = Instant::now();
        let mut state = settled(Mode::ApproachingLost, t0);
        state.current_mode = Mode::Idle;

        let entry = machine.tick(&mut state, &InputSnapshot::default(), t0 + secs(0.1));
        assert_eq!(entry.commands, vec![Command::ResetTracker]);

        let steady = machine.tick(&mut state, &InputSnapshot::default(), t0 + secs(0.2));
        assert!(steady.commands.is_empty());
    }

    #[test]
    fn searching_seeds_tracker_from_detection_without_leaving() {
        let machine = BehaviorStateMachine::new(BehaviorConfig::default());
        let t0 = Instant::now();
        let mut state = settled(Mode::Searching, t0);
        let roi = Region::new(1, 2, 3, 4);
        let inputs = InputSnapshot {
            detection: Some(roi),
            ..Default::default()
        };

        let outcome = machine.tick(&mut state, &inputs, t0 + secs(0.1));
        assert_eq!(outcome.commands, vec![Command::InitTracker(roi)]);
        assert_eq!(outcome.next_mode, Mode::Searching);
    }

    #[test]
    fn searching_ignores_non_tracking_updates() {
        let machine = BehaviorStateMachine::new(BehaviorConfig::default());
        let t0 = Instant::now();
        let mut state = settled(Mode::Searching, t0);
        let outcome = machine.tick(&mut state, &with_track(TrackStatus::Lost), t0 + secs(0.1));
        assert_eq!(outcome.next_mode, Mode::Searching);
    }

    #[test]
    fn tracking_starts_approach_and_enables_servo_once() {
        let machine = BehaviorStateMachine::new(BehaviorConfig::default());
        let t0 = Instant::now();
        let mut state = settled(Mode::Searching, t0);
        let inputs = with_track(TrackStatus::Tracking);

        let found = machine.tick(&mut state, &inputs, t0 + secs(0.1));
        assert_eq!(found.next_mode, Mode::ApproachingPerson);
        assert_eq!(count(&found.commands, Command::EnableVisualServo), 0);

        let entry = machine.tick(&mut state, &inputs, t0 + secs(0.2));
        assert!(entry.is_transition);
        assert_eq!(
            entry.commands,
            vec![
                Command::EnableVisualServo,
                Command::SetServoTarget(track(TrackStatus::Tracking).roi),
            ]
        );

        let steady = machine.tick(&mut state, &inputs, t0 + secs(0.3));
        assert_eq!(count(&steady.commands, Command::EnableVisualServo), 0);
        assert_eq!(
            steady.commands,
            vec![Command::SetServoTarget(track(TrackStatus::Tracking).roi)]
        );
    }

    #[test]
    fn stale_tracker_while_approaching_disables_servo_on_loss() {
        let machine = BehaviorStateMachine::new(BehaviorConfig::default());
        let t0 = Instant::now();
        let mut state = settled(Mode::ApproachingPerson, t0);

        let stale = machine.tick(&mut state, &InputSnapshot::default(), t0 + secs(1.5));
        assert_eq!(stale.next_mode, Mode::ApproachingLost);
        assert!(stale.commands.is_empty());

        let lost = machine.tick(&mut state, &InputSnapshot::default(), t0 + secs(1.6));
        assert_eq!(lost.commands, vec![Command::DisableVisualServo]);
        assert_eq!(lost.next_mode, Mode::Idle);
    }

    #[test]
    fn tracker_reporting_lost_ends_approach() {
        let machine = BehaviorStateMachine::new(BehaviorConfig::default());
        let t0 = Instant::now();
        let mut state = settled(Mode::ApproachingPerson, t0);
        let outcome = machine.tick(&mut state, &with_track(TrackStatus::Lost), t0 + secs(0.1));
        assert_eq!(outcome.next_mode, Mode::ApproachingLost);
        assert!(outcome.commands.is_empty());
    }

    #[test]
    fn approaching_lost_always_falls_back_to_idle() {
        let machine = BehaviorStateMachine::new(BehaviorConfig::default());
        let t0 = Instant::now();
        for inputs in [
            InputSnapshot::default(),
            with_track(TrackStatus::Tracking),
            released(),
        ] {
            let mut state = settled(Mode::ApproachingLost, t0);
            let outcome = machine.tick(&mut state, &inputs, t0 + secs(0.1));
            assert_eq!(outcome.next_mode, Mode::Idle);
        }
    }

    #[test]
    fn releasing_override_resumes_interrupted_mode() {
        let machine = BehaviorStateMachine::new(BehaviorConfig::default());
        let t0 = Instant::now();
        let mut state = settled(Mode::Manual, t0);
        state.resume_mode = Mode::Searching;

        let outcome = machine.tick(&mut state, &released(), t0 + secs(1.0));
        assert_eq!(outcome.next_mode, Mode::Searching);
    }

    #[test]
    fn stale_joystick_keeps_manual() {
        let machine = BehaviorStateMachine::new(BehaviorConfig::default());
        let t0 = Instant::now();
        let mut state = settled(Mode::Manual, t0);
        state.resume_mode = Mode::Searching;

        let outcome = machine.tick(&mut state, &InputSnapshot::default(), t0 + secs(1.0));
        assert_eq!(outcome.next_mode, Mode::Manual);
    }

    #[test]
    fn prolonged_override_resumes_into_idle() {
        let config = BehaviorConfig {
            override_timeout: secs(10.0),
            ..Default::default()
        };
        let machine = BehaviorStateMachine::new(config);
        let t0 = Instant::now();
        let mut state = settled(Mode::Manual, t0);
        state.resume_mode = Mode::FollowingPerson;

        let held_long = machine.tick(&mut state, &held(), t0 + secs(11.0));
        assert_eq!(held_long.next_mode, Mode::Manual);
        assert_eq!(state.resume_mode, Mode::Idle);

        let release = machine.tick(&mut state, &released(), t0 + secs(11.1));
        assert_eq!(release.next_mode, Mode::Idle);
    }

    #[test]
    fn override_after_long_autonomy_forgets_interrupted_mode() {
        let config = BehaviorConfig {
            override_timeout: secs(20.0),
            ..Default::default()
        };
        let machine = BehaviorStateMachine::new(config);
        let t0 = Instant::now();
        let mut state = settled(Mode::Searching, t0);

        // Manual logic runs on the grab tick with the 30 s spent in Searching.
        let grab = machine.tick(&mut state, &held(), t0 + secs(30.0));
        assert!(grab.preempted);
        assert_eq!(grab.next_mode, Mode::Manual);
        assert_eq!(state.resume_mode, Mode::Idle);

        let back = machine.tick(&mut state, &released(), t0 + secs(31.0));
        assert_eq!(back.next_mode, Mode::Idle);
    }

    #[test]
    fn short_override_round_trip_resumes_interrupted_mode() {
        let config = BehaviorConfig {
            override_timeout: secs(10.0),
            ..Default::default()
        };
        let machine = BehaviorStateMachine::new(config);
        let t0 = Instant::now();
        let mut state = settled(Mode::Searching, t0);

        let grab = machine.tick(&mut state, &held(), t0 + secs(2.0));
        assert!(grab.preempted);
        assert_eq!(state.resume_mode, Mode::Searching);

        let first_manual = machine.tick(&mut state, &held(), t0 + secs(2.1));
        assert!(first_manual.is_transition);
        assert!(!first_manual.preempted);
        assert_eq!(state.resume_mode, Mode::Searching);

        let back = machine.tick(&mut state, &released(), t0 + secs(3.0));
        assert_eq!(back.next_mode, Mode::Searching);
    }

    #[test]
    fn reserved_modes_hold_and_emit_nothing() {
        let machine = BehaviorStateMachine::new(BehaviorConfig::default());
        let t0 = Instant::now();
        let inputs = InputSnapshot {
            override_pressed: Some(false),
            detection: Some(Region::new(0, 0, 10, 10)),
            track: Some(track(TrackStatus::Tracking)),
        };
        for mode in Mode::ALL.into_iter().filter(|m| m.is_reserved()) {
            let mut state = settled(mode, t0);
            let outcome = machine.tick(&mut state, &inputs, t0 + secs(100.0));
            assert_eq!(outcome.next_mode, mode);
            assert!(outcome.commands.is_empty());
        }
    }

    #[test]
    fn tick_period_follows_rate() {
        let config = BehaviorConfig {
            tick_rate_hz: 20.0,
            ..Default::default()
        };
        assert_eq!(config.tick_period(), Ok(Duration::from_millis(50)));
    }

    #[test]
    fn tick_period_rejects_extreme_rates() {
        for rate in [1e-30, 1e12, 0.0, -1.0, f64::NAN] {
            let config = BehaviorConfig {
                tick_rate_hz: rate,
                ..Default::default()
            };
            assert!(
                matches!(config.tick_period(), Err(ArbiterError::Config(_))),
                "{rate} Hz was accepted"
            );
        }
    }
}
