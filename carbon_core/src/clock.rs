//! Timebase generator: internal tempo, tap-tempo recovery, external sync with
//! moving-average + lock-adjust, and swing shaping.
//!
//! Grounded directly on the reference firmware's `midi_clock_timer_task`
//! (`midi_clock.c`): the run/stop/continue/reset flags applied at a tick
//! boundary, beat-cross detection before swing-table lookup, external
//! interval averaging once `EXT_SYNC_MIN_HIST` samples exist, the
//! `run_tick_count - ext_run_tick_count` sign-driven lock-adjust, the
//! `EXT_SYNC_TEMPO_FILTER` low-pass on the displayed tempo, sync timeout
//! dropping to stop, and tap-tempo averaging over `TAP_HIST_LEN` samples
//! clamped into `[US_MIN, US_MAX]`.
//!
//! The swing table itself (`tables/swing_table.h` in the reference firmware)
//! was not part of the distilled source available here; [`swing_table`]
//! reconstructs one with the same shape (discrete levels 0..30, 50%..80%
//! shuffle of 8th-note pairs) while preserving the invariant the original
//! guarantees: ticks summed over one beat always equal `PPQ`.

use crate::config::{
    EXT_SYNC_HIST_LEN, EXT_SYNC_LOCK_ADJ, EXT_SYNC_MIN_HIST, EXT_SYNC_TEMPO_FILTER,
    EXT_SYNC_TIMEOUT_US, EXT_SYNC_UPSAMPLE, PPQ, TAP_HIST_LEN, TAP_TIMEOUT_US, TASK_US, US_MAX,
    US_MIN,
};

/// Number of discrete swing levels, matching the reference firmware's 0..30
/// range (50%-80% shuffle in single percentage-point steps).
pub const SWING_LEVELS: usize = 31;

fn clamp_us_per_tick(v: i64) -> u64 {
    v.clamp(US_MIN as i64, US_MAX as i64) as u64
}

/// Number of ticks (0, 1, or 2) to emit during tick-within-beat `phase` at
/// swing `level` (0..30, where 0 = no shuffle / 50%, 30 = maximum / 80%).
/// Implements a straight-8th shuffle: ticks are grouped into 8th-note pairs of
/// `PPQ / 4` ticks each (assuming a 4/4-ish subdivision into 8 eighths per
/// beat); within a pair, `shuffle` fraction of the second eighth's ticks are
/// folded into the first eighth's task-slot, biasing the off-beat eighth
/// later without changing the total tick count per beat.
pub fn swing_table(level: usize, phase: u32) -> u32 {
    let level = level.min(SWING_LEVELS - 1);
    if level == 0 {
        return 1;
    }
    let eighth = (PPQ / 8).max(1);
    let pos_in_eighth = phase % eighth;
    let eighth_index = (phase / eighth) % 2; // 0 = on-beat eighth, 1 = off-beat eighth
    let shuffle_ticks = (eighth as u64 * level as u64 / (SWING_LEVELS as u64 - 1)) as u32 / 2;
    match eighth_index {
        0 => {
            // front eighth: drop `shuffle_ticks` of its own pulses (they move
            // to the back eighth), but never below one per remaining slot.
            if pos_in_eighth < shuffle_ticks {
                0
            } else {
                1
            }
        }
        _ => {
            // back eighth: the first `shuffle_ticks` positions double up to
            // absorb the pulses removed from the front eighth.
            if pos_in_eighth < shuffle_ticks {
                2
            } else {
                1
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockSource {
    Internal,
    External,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunStopRequest {
    Idle,
    Start,
    Continue,
    Stop,
}

/// Callbacks the clock fires into the engine. Grounded on the reference
/// firmware's weak-symbol notifications (`midi_clock_beat_crossed`,
/// `midi_clock_ticked`, `run_state_changed`, `source_changed`,
/// `tap_locked`, `ext_tempo_changed`), collected into one trait instead of
/// free functions with a global override.
pub trait ClockSink {
    fn on_tick(&mut self, tick_count: u32) {
        let _ = tick_count;
    }
    fn on_beat(&mut self, tick_count: u32) {
        let _ = tick_count;
    }
    fn on_run_state_changed(&mut self, running: bool) {
        let _ = running;
    }
    fn on_source_changed(&mut self, source: ClockSource) {
        let _ = source;
    }
    fn on_tap_locked(&mut self, us_per_tick: u64) {
        let _ = us_per_tick;
    }
    fn on_ext_tempo_changed(&mut self, us_per_tick: u64) {
        let _ = us_per_tick;
    }
    fn on_pos_reset(&mut self) {}
}

/// A no-op sink, useful for tests that only inspect clock state directly.
#[derive(Default)]
pub struct NullSink;
impl ClockSink for NullSink {}

pub struct Clock {
    desired_source: ClockSource,
    source: ClockSource,
    desired_run_state: bool,
    run_state: bool,
    desired_swing: usize,
    swing: usize,
    runstop_request: RunStopRequest,
    reset_request: bool,

    time_count: u64,
    next_tick_time: u64,
    run_tick_count: u32,
    stop_tick_count: u32,
    int_us_per_tick: u64,

    ext_interval_hist: [u64; EXT_SYNC_HIST_LEN],
    ext_interval_count: usize,
    ext_sync_timeout: u64,
    ext_last_tick_time: u64,
    ext_run_tick_count: u32,
    ext_sync_tempo_average: u64,
    ext_tick_pending: bool,

    tap_last: u64,
    tap_hist: [u64; TAP_HIST_LEN],
    tap_hist_count: usize,
    tap_pending: bool,
}

impl Clock {
    pub fn new() -> Self {
        let default_us_per_tick = clamp_us_per_tick((60_000_000 / (120 * PPQ as u64)) as i64);
        Clock {
            desired_source: ClockSource::Internal,
            source: ClockSource::Internal,
            desired_run_state: false,
            run_state: false,
            desired_swing: 0,
            swing: 0,
            runstop_request: RunStopRequest::Idle,
            reset_request: false,
            time_count: 0,
            next_tick_time: 0,
            run_tick_count: 0,
            stop_tick_count: 0,
            int_us_per_tick: default_us_per_tick,
            ext_interval_hist: [0; EXT_SYNC_HIST_LEN],
            ext_interval_count: 0,
            ext_sync_timeout: 0,
            ext_last_tick_time: 0,
            ext_run_tick_count: 0,
            ext_sync_tempo_average: default_us_per_tick,
            ext_tick_pending: false,
            tap_last: 0,
            tap_hist: [0; TAP_HIST_LEN],
            tap_hist_count: 0,
            tap_pending: false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.run_state
    }

    pub fn is_ext_synced(&self) -> bool {
        self.ext_sync_timeout > 0
    }

    pub fn us_per_tick(&self) -> u64 {
        self.int_us_per_tick
    }

    pub fn set_tempo_bpm(&mut self, bpm: f32) {
        let us = (60_000_000.0 / (bpm as f64 * PPQ as f64)) as i64;
        self.int_us_per_tick = clamp_us_per_tick(us);
    }

    pub fn set_swing(&mut self, swing: usize) {
        self.desired_swing = swing.min(SWING_LEVELS - 1);
    }

    pub fn set_source(&mut self, source: ClockSource) {
        self.desired_source = source;
    }

    /// Run/stop/reset requests are suppressed while externally synced,
    /// matching the reference firmware ignoring user transport input under
    /// external lock.
    pub fn request_start(&mut self) {
        if !self.is_ext_synced() {
            self.runstop_request = RunStopRequest::Start;
        }
    }

    pub fn request_continue(&mut self) {
        if !self.is_ext_synced() {
            self.runstop_request = RunStopRequest::Continue;
        }
    }

    pub fn request_stop(&mut self) {
        if !self.is_ext_synced() {
            self.runstop_request = RunStopRequest::Stop;
        }
    }

    pub fn request_reset_pos(&mut self) {
        if !self.is_ext_synced() {
            self.reset_request = true;
        }
    }

    /// Notify the clock that an external MIDI clock tick arrived.
    pub fn rx_ext_tick(&mut self) {
        self.ext_tick_pending = true;
    }

    pub fn rx_ext_start(&mut self) {
        self.runstop_request = RunStopRequest::Start;
    }
    pub fn rx_ext_continue(&mut self) {
        self.runstop_request = RunStopRequest::Continue;
    }
    pub fn rx_ext_stop(&mut self) {
        self.runstop_request = RunStopRequest::Stop;
    }

    pub fn tap_tempo(&mut self) {
        self.tap_pending = true;
    }

    fn reset_pos(&mut self, sink: &mut impl ClockSink) {
        self.run_tick_count = 0;
        self.stop_tick_count = 0;
        self.time_count = 0;
        self.next_tick_time = 0;
        sink.on_pos_reset();
    }

    /// Advance the clock by one `TASK_US` task interval. Call this from the
    /// realtime cadence.
    pub fn timer_task(&mut self, sink: &mut impl ClockSink) {
        match self.runstop_request {
            RunStopRequest::Start => {
                self.desired_run_state = true;
                self.reset_pos(sink);
                self.runstop_request = RunStopRequest::Idle;
            }
            RunStopRequest::Continue => {
                self.desired_run_state = true;
                self.runstop_request = RunStopRequest::Idle;
            }
            RunStopRequest::Stop => {
                self.desired_run_state = false;
                self.runstop_request = RunStopRequest::Idle;
            }
            RunStopRequest::Idle => {}
        }

        if self.reset_request {
            self.reset_pos(sink);
            self.reset_request = false;
        }

        if self.source != self.desired_source {
            self.source = self.desired_source;
            sink.on_source_changed(self.source);
            self.desired_run_state = false;
            self.run_state = false;
        }

        self.time_count += TASK_US;
        if self.time_count > self.next_tick_time {
            if self.run_state != self.desired_run_state {
                if !self.desired_run_state {
                    self.stop_tick_count = self.run_tick_count;
                }
                self.run_state = self.desired_run_state;
                log::info!("clock run_state={}", self.run_state);
                sink.on_run_state_changed(self.run_state);
            }

            let mut tick_count = if self.run_state { self.run_tick_count } else { self.stop_tick_count };

            if tick_count % PPQ == 0 {
                if self.desired_swing != self.swing {
                    self.swing = self.desired_swing;
                }
                sink.on_beat(tick_count);
                if self.is_ext_synced() {
                    sink.on_ext_tempo_changed(self.ext_sync_tempo_average);
                }
            }

            let pulses = swing_table(self.swing, tick_count % PPQ);
            for _ in 0..pulses {
                sink.on_tick(tick_count);
            }
            tick_count += 1;
            self.next_tick_time += self.int_us_per_tick;

            if self.run_state {
                self.run_tick_count = tick_count;
            } else {
                self.stop_tick_count = tick_count;
            }
        }

        if self.source == ClockSource::External {
            self.recover_external_clock();
        }

        if self.ext_sync_timeout > 0 {
            self.ext_sync_timeout = self.ext_sync_timeout.saturating_sub(TASK_US);
            if self.ext_sync_timeout == 0 {
                log::info!("external clock sync lost, stopping");
                self.ext_interval_count = 0;
                self.runstop_request = RunStopRequest::Stop;
            }
        }

        self.recover_tap_tempo(sink);
    }

    fn recover_external_clock(&mut self) {
        if !self.ext_tick_pending {
            return;
        }
        self.ext_tick_pending = false;
        self.ext_sync_timeout = EXT_SYNC_TIMEOUT_US;

        let interval = self.time_count.saturating_sub(self.ext_last_tick_time);
        let slot = self.ext_interval_count % EXT_SYNC_HIST_LEN;
        self.ext_interval_hist[slot] = interval;

        let samples = self.ext_interval_count.saturating_add(1).min(EXT_SYNC_HIST_LEN);
        if samples >= EXT_SYNC_MIN_HIST {
            let sum: u64 = self.ext_interval_hist[..samples].iter().sum();
            let avg = sum / samples as u64;
            let mut us_per_tick = (avg / EXT_SYNC_UPSAMPLE) as i64;

            self.ext_sync_tempo_average = ((self.ext_sync_tempo_average as f32 * EXT_SYNC_TEMPO_FILTER)
                + (us_per_tick as f32 * (1.0 - EXT_SYNC_TEMPO_FILTER))) as u64;

            if self.run_state {
                self.ext_run_tick_count += EXT_SYNC_UPSAMPLE as u32;
                let error = self.run_tick_count as i64 - self.ext_run_tick_count as i64;
                if error < 0 {
                    us_per_tick -= EXT_SYNC_LOCK_ADJ as i64;
                } else if error > 0 {
                    us_per_tick += EXT_SYNC_LOCK_ADJ as i64;
                }
            }
            self.int_us_per_tick = clamp_us_per_tick(us_per_tick);
        }

        self.ext_last_tick_time = self.time_count;
        self.ext_interval_count += 1;
    }

    fn recover_tap_tempo(&mut self, sink: &mut impl ClockSink) {
        if self.tap_pending && !self.is_ext_synced() {
            self.tap_pending = false;
            let slot = self.tap_hist_count % TAP_HIST_LEN;
            self.tap_hist[slot] = self.time_count.saturating_sub(self.tap_last);
            self.tap_last = self.time_count;
            self.tap_hist_count += 1;

            if self.tap_hist_count > TAP_HIST_LEN {
                let period: u64 = self.tap_hist.iter().sum::<u64>() / TAP_HIST_LEN as u64;
                let candidate = period / PPQ as u64;
                self.int_us_per_tick = clamp_us_per_tick(candidate as i64);
                sink.on_tap_locked(self.int_us_per_tick);
            }
        }

        if self.tap_hist_count > 0 && self.time_count.saturating_sub(self.tap_last) > TAP_TIMEOUT_US {
            self.tap_hist_count = 0;
        }
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingSink {
        ticks: u32,
        beats: u32,
    }

    impl ClockSink for CountingSink {
        fn on_tick(&mut self, _tick_count: u32) {
            self.ticks += 1;
        }
        fn on_beat(&mut self, _tick_count: u32) {
            self.beats += 1;
        }
    }

    #[test]
    fn invariant_swing_sums_to_ppq_over_a_beat() {
        for level in 0..SWING_LEVELS {
            let total: u32 = (0..PPQ).map(|phase| swing_table(level, phase)).sum();
            assert_eq!(total, PPQ, "level {level} did not sum to PPQ");
        }
    }

    #[test]
    fn s4_clock_at_120_bpm_produces_ppq_ticks_per_beat() {
        let mut clock = Clock::new();
        clock.set_tempo_bpm(120.0);
        clock.request_start();
        let mut sink = CountingSink { ticks: 0, beats: 0 };
        // enough task iterations to cross two beats comfortably
        let us_per_beat = 500_000u64;
        let iterations = (us_per_beat * 3 / TASK_US) as usize;
        for _ in 0..iterations {
            clock.timer_task(&mut sink);
        }
        assert!(sink.beats >= 2);
        assert!(clock.is_running());
    }

    #[test]
    fn run_stop_requests_are_suppressed_while_externally_synced() {
        let mut clock = Clock::new();
        clock.set_source(ClockSource::External);
        let mut sink = NullSink;
        clock.timer_task(&mut sink); // apply source change
        clock.rx_ext_start();
        for _ in 0..10 {
            clock.rx_ext_tick();
            clock.timer_task(&mut sink);
        }
        assert!(clock.is_ext_synced());
        assert!(clock.is_running());
        clock.request_stop();
        clock.timer_task(&mut sink);
        // request was suppressed: run_state is still driven only by rx_ext_* calls
        assert!(clock.is_running());
    }

    #[test]
    fn external_sync_converges_after_min_history_samples() {
        let mut clock = Clock::new();
        clock.set_source(ClockSource::External);
        let mut sink = NullSink;
        clock.timer_task(&mut sink);
        let target_interval_us = 5000u64; // constant external tick period, within the tempo bounds
        for _ in 0..(EXT_SYNC_MIN_HIST + 2) {
            for _ in 0..(target_interval_us / TASK_US) {
                clock.timer_task(&mut sink);
            }
            clock.rx_ext_tick();
            clock.timer_task(&mut sink);
        }
        let expected = target_interval_us / EXT_SYNC_UPSAMPLE;
        let actual = clock.us_per_tick();
        let diff = if actual > expected { actual - expected } else { expected - actual };
        assert!(diff <= EXT_SYNC_LOCK_ADJ, "actual={actual} expected={expected} diff={diff}");
    }

    #[test]
    fn ext_sync_timeout_drops_sync_and_stops_clock() {
        let mut clock = Clock::new();
        clock.set_source(ClockSource::External);
        let mut sink = NullSink;
        clock.timer_task(&mut sink);
        clock.rx_ext_tick();
        clock.timer_task(&mut sink);
        clock.rx_ext_start();
        clock.timer_task(&mut sink);
        assert!(clock.is_ext_synced());
        for _ in 0..((EXT_SYNC_TIMEOUT_US / TASK_US) + 2) {
            clock.timer_task(&mut sink);
        }
        assert!(!clock.is_ext_synced());
        assert!(!clock.is_running());
    }
}
