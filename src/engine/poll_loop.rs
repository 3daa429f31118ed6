//! Poll loop with statum state machine
//!
//! One cycle per timer tick, never overlapping:
//!
//! ```text
//!            tick                      poll() Ok
//!   Idle ──────────► begin_cycle() ──────────────► Processing(snapshot)
//!    ▲                    │                              │
//!    │   Err(NotConnected)│                              │ edges + gate
//!    └────────────────────┘                              │ batch, dispatch
//!    ▲                                                   │
//!    └───────────────────────────────────────────────────┘
//! ```
//!
//! The debounce memory and the whammy flag are owned by the loop and only touched from
//! inside a cycle, so no locking is needed.

use crate::config::{AppConfig, MAX_POLL_INTERVAL_MS};
use crate::controller::snapshot::ControllerSnapshot;
use crate::controller::state_source::{SourceError, StateSource};
use crate::engine::stats::{LoopStats, StatsReporter};
use crate::mapping::edge::{detect_edges, DigitalState};
use crate::mapping::error::ConfigError;
use crate::mapping::hysteresis::{HysteresisGate, HysteresisState};
use crate::mapping::keyboard::{KeyEvent, KeyboardLayout};
use crate::output::batch::{dispatch, Dispatch, EventBatch};
use crate::output::sink::{InjectionError, InputSink};
use statum::{machine, state};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Errors raised while building the engine
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Controller error: {0}")]
    Source(#[from] SourceError),
}

/// Timing and policy knobs of the loop
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoopSettings {
    pub poll_interval: Duration,
    pub release_on_shutdown: bool,
    pub stats_interval_secs: u64,
    pub failure_alert_threshold: u64,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1),
            release_on_shutdown: true,
            stats_interval_secs: 30,
            failure_alert_threshold: 100,
        }
    }
}

impl LoopSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            poll_interval: Duration::from_millis(
                config.poll_interval_ms.clamp(1, MAX_POLL_INTERVAL_MS),
            ),
            release_on_shutdown: config.release_on_shutdown,
            stats_interval_secs: config.stats_interval_secs,
            failure_alert_threshold: config.failure_alert_threshold,
        }
    }
}

/// Everything that survives from one cycle to the next
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TranslationState {
    pub digital: DigitalState,
    pub whammy: HysteresisState,
}

#[state]
#[derive(Debug, Clone)]
pub enum PollState {
    Idle,
    Processing(ControllerSnapshot),
}

#[machine]
pub struct PollLoop<S: PollState> {
    source: Box<dyn StateSource>,
    sink: Box<dyn InputSink>,
    layout: KeyboardLayout,
    gate: Option<HysteresisGate>,
    memory: TranslationState,
    settings: LoopSettings,
    stats: LoopStats,
    stats_sender: watch::Sender<LoopStats>,
    // None until the first poll, then whether the last poll found a controller
    connected: Option<bool>,
}

/// Result of starting a cycle
pub enum Cycle {
    Polled(PollLoop<Processing>),
    Skipped(PollLoop<Idle>),
}

impl<S: PollState> PollLoop<S> {
    pub fn subscribe(&self) -> watch::Receiver<LoopStats> {
        self.stats_sender.subscribe()
    }

    pub fn stats(&self) -> &LoopStats {
        &self.stats
    }

    pub fn translation_state(&self) -> &TranslationState {
        &self.memory
    }

    fn publish_stats(&self) {
        self.stats_sender.send_replace(self.stats.clone());
    }

    /// Updates `connected` and reports whether it changed
    fn note_connection(&mut self, connected: bool) -> bool {
        let changed = self.connected != Some(connected);
        self.connected = Some(connected);
        changed
    }

    /// Folds a dispatch outcome into the counters
    fn record_dispatch(&mut self, outcome: &Result<Dispatch, InjectionError>) {
        match outcome {
            Ok(Dispatch::Skipped) => {}
            Ok(Dispatch::Sent(count)) => {
                self.stats.batches_dispatched += 1;
                self.stats.events_dispatched += *count as u64;
                self.stats.consecutive_injection_failures = 0;
            }
            Err(e) => {
                self.stats.injection_failures += 1;
                self.stats.consecutive_injection_failures += 1;
                let streak = self.stats.consecutive_injection_failures;
                if streak == self.settings.failure_alert_threshold {
                    error!(
                        "Input injection failed {} times in a row, keys are not reaching the host: {}",
                        streak, e
                    );
                } else {
                    warn!("Input injection failed: {}", e);
                }
            }
        }
    }
}

impl PollLoop<Idle> {
    pub fn create(
        source: Box<dyn StateSource>,
        sink: Box<dyn InputSink>,
        layout: KeyboardLayout,
        settings: LoopSettings,
    ) -> Result<Self, EngineError> {
        let gate = layout
            .whammy
            .as_ref()
            .map(HysteresisGate::from_binding)
            .transpose()?;
        let memory = TranslationState {
            digital: DigitalState::for_bindings(&layout.bindings),
            whammy: HysteresisState::default(),
        };
        let (stats_sender, _) = watch::channel(LoopStats::default());

        info!(
            "Creating poll loop: source={}, sink={}, {} buttons, whammy={}, settings={:?}",
            source.name(),
            sink.name(),
            layout.bindings.len(),
            gate.is_some(),
            settings
        );

        Ok(Self::new(
            source,
            sink,
            layout,
            gate,
            memory,
            settings,
            LoopStats::default(),
            stats_sender,
            None,
        ))
    }

    /// Polls the source. A missing controller ends the cycle right here with the
    /// translation state untouched.
    pub fn begin_cycle(mut self) -> Cycle {
        self.stats.cycles += 1;

        match self.source.poll() {
            Ok(snapshot) => {
                if self.note_connection(true) {
                    info!("Controller connected via {}", self.source.name());
                }
                Cycle::Polled(self.transition_with(snapshot))
            }
            Err(SourceError::NotConnected) => {
                if self.note_connection(false) {
                    warn!("Controller not connected, skipping cycles until it returns");
                }
                self.stats.disconnected_cycles += 1;
                self.publish_stats();
                Cycle::Skipped(self)
            }
            Err(e) => {
                if self.note_connection(false) {
                    error!("Controller poll failed, skipping cycles until it recovers: {}", e);
                } else {
                    debug!("Controller poll failed: {}", e);
                }
                self.stats.disconnected_cycles += 1;
                self.publish_stats();
                Cycle::Skipped(self)
            }
        }
    }

    /// Runs one complete cycle
    pub fn tick(self) -> PollLoop<Idle> {
        match self.begin_cycle() {
            Cycle::Polled(processing) => processing.process(),
            Cycle::Skipped(idle) => idle,
        }
    }

    /// Ticks at the configured interval until `token` is cancelled
    ///
    /// Cancellation is checked before every cycle and while waiting for the next tick, so
    /// the loop stops within one cycle.
    pub async fn run_until_cancelled(mut self, token: CancellationToken) -> PollLoop<Idle> {
        info!(
            "Starting poll loop with {:?} interval",
            self.settings.poll_interval
        );

        let mut interval_timer = tokio::time::interval(self.settings.poll_interval);
        interval_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut reporter = StatsReporter::new(self.settings.stats_interval_secs);

        loop {
            if token.is_cancelled() {
                break;
            }
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = interval_timer.tick() => {}
            }

            self = self.tick();
            reporter.maybe_log(&self.stats);
        }

        info!("Shutdown signal received, stopping poll loop");
        if self.settings.release_on_shutdown {
            match self.release_held() {
                Ok(Dispatch::Sent(count)) => info!("Released {} held keys", count),
                Ok(Dispatch::Skipped) => debug!("No keys held at shutdown"),
                Err(e) => warn!("Failed to release held keys: {}", e),
            }
        }
        self
    }

    /// Sends key-up for every key the host currently sees as held, as one batch
    pub fn release_held(&mut self) -> Result<Dispatch, InjectionError> {
        let mut events: Vec<KeyEvent> = self.memory.digital.held_keys().map(KeyEvent::up).collect();
        let gate_event = match &self.gate {
            Some(gate) if self.memory.whammy.engaged => Some(KeyEvent::up(gate.key())),
            _ => None,
        };
        events.sort_by_key(|event| event.key);

        let batch = EventBatch::for_cycle(events.clone(), gate_event);
        let outcome = dispatch(self.sink.as_mut(), batch);
        self.record_dispatch(&outcome);
        self.publish_stats();
        let outcome = outcome?;

        for event in events {
            self.memory.digital.mark_released(event.key);
        }
        self.memory.whammy.engaged = false;
        Ok(outcome)
    }
}

impl PollLoop<Processing> {
    /// Buttons first, then the analog gate, then one dispatch for the lot
    pub fn process(mut self) -> PollLoop<Idle> {
        let Some(snapshot) = self.get_state_data().copied() else {
            warn!("No snapshot found in state data, this should not happen");
            return self.transition();
        };

        let button_events = detect_edges(&snapshot, &self.layout.bindings, &mut self.memory.digital);

        let gate_event = match (&self.gate, &self.layout.whammy) {
            (Some(gate), Some(whammy)) => {
                gate.evaluate(snapshot.axis(whammy.axis), &mut self.memory.whammy)
            }
            _ => None,
        };

        let batch = EventBatch::for_cycle(button_events, gate_event);
        // On failure the translation state keeps the new levels; the next change is
        // emitted normally
        let outcome = dispatch(self.sink.as_mut(), batch);
        self.record_dispatch(&outcome);

        self.publish_stats();
        self.transition()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::snapshot::AnalogAxis;
    use crate::engine::testing::{RecordingSink, ScriptedSource};
    use crate::mapping::keyboard::{BindingEntry, VirtualKey, WhammyBinding};

    const FRET_1: VirtualKey = VirtualKey(0x31);
    const FRET_2: VirtualKey = VirtualKey(0x32);

    fn layout() -> KeyboardLayout {
        KeyboardLayout::new(
            &[BindingEntry {
                button: 0,
                key: FRET_1,
            }],
            Some(WhammyBinding::default()),
        )
        .unwrap()
    }

    fn two_fret_layout() -> KeyboardLayout {
        KeyboardLayout::new(
            &[
                BindingEntry {
                    button: 0,
                    key: FRET_1,
                },
                BindingEntry {
                    button: 1,
                    key: FRET_2,
                },
            ],
            Some(WhammyBinding::default()),
        )
        .unwrap()
    }

    fn snap(buttons: u16, whammy: i32) -> ControllerSnapshot {
        ControllerSnapshot::default()
            .with_buttons(buttons)
            .with_axis(AnalogAxis::RightStickY, whammy)
    }

    fn build(
        layout: KeyboardLayout,
        source: ScriptedSource,
        sink: &RecordingSink,
    ) -> PollLoop<Idle> {
        PollLoop::create(
            Box::new(source),
            Box::new(sink.clone()),
            layout,
            LoopSettings::default(),
        )
        .unwrap()
    }

    fn sorted(batch: &EventBatch) -> Vec<KeyEvent> {
        let mut events = batch.events().to_vec();
        events.sort_by_key(|e| (e.key, e.is_key_up));
        events
    }

    #[test]
    fn end_to_end_fret_and_whammy() {
        let source = ScriptedSource::new(vec![
            Ok(snap(0b1, 0)),
            Ok(snap(0b1, 6500)),
            Ok(snap(0b0, 6500)),
            Ok(snap(0b0, 3500)),
        ]);
        let sink = RecordingSink::new();
        let mut poll_loop = build(layout(), source, &sink);

        for _ in 0..4 {
            poll_loop = poll_loop.tick();
        }

        assert_eq!(
            sink.batches(),
            vec![
                EventBatch::new(vec![KeyEvent::down(FRET_1)]),
                EventBatch::new(vec![KeyEvent::down(VirtualKey::CONTROL)]),
                EventBatch::new(vec![KeyEvent::up(FRET_1)]),
                EventBatch::new(vec![KeyEvent::up(VirtualKey::CONTROL)]),
            ]
        );
        assert_eq!(poll_loop.stats().batches_dispatched, 4);
        assert_eq!(poll_loop.stats().events_dispatched, 4);
    }

    #[test]
    fn all_changes_of_a_cycle_share_one_dispatch() {
        let source = ScriptedSource::new(vec![Ok(snap(0, 0)), Ok(snap(0b11, 7000))]);
        let sink = RecordingSink::new();
        let poll_loop = build(two_fret_layout(), source, &sink);

        let poll_loop = poll_loop.tick().tick();

        let batches = sink.batches();
        assert_eq!(batches.len(), 2);
        assert_eq!(
            sorted(&batches[1]),
            vec![
                KeyEvent::down(VirtualKey::CONTROL),
                KeyEvent::down(FRET_1),
                KeyEvent::down(FRET_2),
            ]
        );
        // gate transition comes after the button edges
        assert_eq!(
            batches[1].events().last(),
            Some(&KeyEvent::down(VirtualKey::CONTROL))
        );
        assert_eq!(poll_loop.stats().events_dispatched, 5);
    }

    #[test]
    fn unchanged_cycle_does_not_call_the_sink() {
        let source = ScriptedSource::new(vec![Ok(snap(0b1, 0)), Ok(snap(0b1, 0)), Ok(snap(0b1, 5000))]);
        let sink = RecordingSink::new();
        let poll_loop = build(layout(), source, &sink).tick().tick().tick();

        assert_eq!(sink.batches().len(), 1);
        assert_eq!(poll_loop.stats().cycles, 3);
        assert_eq!(poll_loop.stats().batches_dispatched, 1);
    }

    #[test]
    fn disconnect_leaves_state_untouched() {
        let source = ScriptedSource::new(vec![
            Ok(snap(0b1, 7000)),
            Err(SourceError::NotConnected),
            Err(SourceError::NotConnected),
            Ok(snap(0b1, 7000)),
        ]);
        let sink = RecordingSink::new();
        let mut poll_loop = build(layout(), source, &sink).tick();
        let before = poll_loop.translation_state().clone();

        poll_loop = poll_loop.tick().tick();
        assert_eq!(poll_loop.translation_state(), &before);
        assert_eq!(sink.batches().len(), 1);
        assert_eq!(poll_loop.stats().disconnected_cycles, 2);

        // controller back with the same levels: nothing to re-send
        poll_loop = poll_loop.tick();
        assert_eq!(sink.batches().len(), 1);
        assert_eq!(poll_loop.translation_state(), &before);
    }

    #[test]
    fn failed_injections_are_counted_and_loop_continues() {
        let source = ScriptedSource::new(vec![Ok(snap(0b1, 0)), Ok(snap(0b0, 0)), Ok(snap(0b1, 0))]);
        let sink = RecordingSink::new();
        sink.set_failing(true);
        let mut poll_loop = build(layout(), source, &sink).tick().tick();

        assert_eq!(poll_loop.stats().injection_failures, 2);
        assert_eq!(poll_loop.stats().consecutive_injection_failures, 2);
        assert_eq!(poll_loop.stats().batches_dispatched, 0);

        sink.set_failing(false);
        poll_loop = poll_loop.tick();
        assert_eq!(poll_loop.stats().consecutive_injection_failures, 0);
        assert_eq!(poll_loop.stats().injection_failures, 2);
        assert_eq!(poll_loop.stats().batches_dispatched, 1);
    }

    #[test]
    fn stats_are_published_every_cycle() {
        let source = ScriptedSource::new(vec![Ok(snap(0b1, 0)), Err(SourceError::NotConnected)]);
        let sink = RecordingSink::new();
        let poll_loop = build(layout(), source, &sink);
        let receiver = poll_loop.subscribe();

        let poll_loop = poll_loop.tick();
        assert_eq!(receiver.borrow().batches_dispatched, 1);

        let _poll_loop = poll_loop.tick();
        assert_eq!(receiver.borrow().disconnected_cycles, 1);
        assert_eq!(receiver.borrow().cycles, 2);
    }

    #[test]
    fn release_held_lifts_buttons_and_whammy_in_one_batch() {
        let source = ScriptedSource::new(vec![Ok(snap(0b11, 7000))]);
        let sink = RecordingSink::new();
        let mut poll_loop = build(two_fret_layout(), source, &sink).tick();

        assert_eq!(poll_loop.release_held().unwrap(), Dispatch::Sent(3));
        assert_eq!(
            sink.batches().last().cloned(),
            Some(EventBatch::new(vec![
                KeyEvent::up(FRET_1),
                KeyEvent::up(FRET_2),
                KeyEvent::up(VirtualKey::CONTROL),
            ]))
        );
        assert_eq!(poll_loop.translation_state().digital.held_keys().count(), 0);
        assert!(!poll_loop.translation_state().whammy.engaged);
        assert_eq!(poll_loop.stats().batches_dispatched, 2);
        assert_eq!(poll_loop.stats().events_dispatched, 6);

        // nothing left to release
        assert_eq!(poll_loop.release_held().unwrap(), Dispatch::Skipped);
        assert_eq!(poll_loop.stats().batches_dispatched, 2);
    }

    #[test]
    fn failed_release_is_counted_and_keys_stay_held() {
        let source = ScriptedSource::new(vec![Ok(snap(0b1, 7000))]);
        let sink = RecordingSink::new();
        let mut poll_loop = build(layout(), source, &sink).tick();
        let receiver = poll_loop.subscribe();

        sink.set_failing(true);
        assert!(poll_loop.release_held().is_err());

        assert_eq!(poll_loop.stats().injection_failures, 1);
        assert_eq!(poll_loop.stats().consecutive_injection_failures, 1);
        assert_eq!(poll_loop.stats().batches_dispatched, 1);
        assert_eq!(receiver.borrow().injection_failures, 1);
        assert_eq!(poll_loop.translation_state().digital.held_keys().count(), 1);
        assert!(poll_loop.translation_state().whammy.engaged);
    }

    #[test]
    fn connection_changes_are_reported_once() {
        let source = ScriptedSource::new(vec![]);
        let sink = RecordingSink::new();
        let mut poll_loop = build(layout(), source, &sink);

        assert!(poll_loop.note_connection(false));
        assert!(!poll_loop.note_connection(false));
        assert!(poll_loop.note_connection(true));
        assert!(!poll_loop.note_connection(true));
        assert!(poll_loop.note_connection(false));
    }

    #[test]
    fn repeated_poll_failures_skip_cycles_as_one_outage() {
        let source = ScriptedSource::new(vec![
            Err(SourceError::Initialization("bus reset".to_string())),
            Err(SourceError::Initialization("bus reset".to_string())),
            Ok(snap(0b1, 0)),
        ]);
        let sink = RecordingSink::new();
        let mut poll_loop = build(layout(), source, &sink).tick().tick();

        assert_eq!(poll_loop.stats().disconnected_cycles, 2);
        assert_eq!(poll_loop.connected, Some(false));
        assert!(sink.batches().is_empty());
        // the failing cycles already marked the outage, so it is not reported again
        assert!(!poll_loop.note_connection(false));

        poll_loop = poll_loop.tick();
        assert_eq!(poll_loop.connected, Some(true));
        assert_eq!(sink.batches().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn run_until_cancelled_drives_cycles_on_the_timer() {
        let source = ScriptedSource::new(vec![
            Ok(snap(0b1, 0)),
            Ok(snap(0b1, 6500)),
            Ok(snap(0b0, 6500)),
            Ok(snap(0b0, 3500)),
        ]);
        let sink = RecordingSink::new();
        let poll_loop = build(layout(), source, &sink);

        let token = CancellationToken::new();
        let cancel = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel.cancel();
        });

        let poll_loop = poll_loop.run_until_cancelled(token).await;

        assert_eq!(sink.batches().len(), 4);
        assert!(poll_loop.stats().cycles >= 4);
        // script exhausted: every later cycle saw no controller
        assert_eq!(
            poll_loop.stats().disconnected_cycles,
            poll_loop.stats().cycles - 4
        );
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_releases_keys_still_held() {
        let source = ScriptedSource::new(vec![Ok(snap(0b1, 7000))]);
        let sink = RecordingSink::new();
        let poll_loop = build(layout(), source, &sink);

        let token = CancellationToken::new();
        let cancel = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            cancel.cancel();
        });
        poll_loop.run_until_cancelled(token).await;

        assert_eq!(
            sink.batches().last().cloned(),
            Some(EventBatch::new(vec![
                KeyEvent::up(FRET_1),
                KeyEvent::up(VirtualKey::CONTROL),
            ]))
        );
    }

    #[tokio::test]
    async fn cancelled_token_stops_before_first_cycle() {
        let source = ScriptedSource::new(vec![Ok(snap(0b1, 0))]);
        let sink = RecordingSink::new();
        let poll_loop = build(layout(), source, &sink);

        let token = CancellationToken::new();
        token.cancel();
        let poll_loop = poll_loop.run_until_cancelled(token).await;

        assert_eq!(poll_loop.stats().cycles, 0);
        assert!(sink.batches().is_empty());
    }
}
