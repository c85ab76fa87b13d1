//! Device-wide tunables.
//!
//! Kept as `pub const`s in one module rather than runtime-configurable values,
//! matching the reference firmware's use of compile-time constants for timing
//! and pool sizing.

/// Internal clock resolution, pulses (ticks) per quarter note.
pub const PPQ: u32 = 96;

/// Realtime task period, microseconds.
pub const TASK_US: u64 = 250;

/// Number of tracks per scene.
pub const TRACK_COUNT: usize = 6;

/// Number of scenes per song.
pub const SCENE_COUNT: usize = 16;

/// Steps per track.
pub const STEP_COUNT: usize = 64;

/// Polyphony: track events per step.
pub const STEP_POLYPHONY: usize = 4;

/// Song-mode list length.
pub const SONG_MODE_LEN: usize = 64;

/// Active-note pool size, per track.
pub const ACTIVE_NOTE_POOL: usize = 16;

/// Held-note and playing-note capacity for the arp VM, per track.
pub const ARP_MAX_HELD_NOTES: usize = 8;
pub const ARP_MAX_PLAYING_NOTES: usize = 8;

/// Arp program length and register file size.
pub const ARP_PROG_MAX_LEN: usize = 64;
pub const ARP_NUM_REGS: usize = 16;

/// Bound on bytecode-VM instructions executed per step, to guarantee termination.
pub const ARP_MAX_LOOP_COUNT: usize = 100;

/// Number of stored arp programs.
pub const ARP_NUM_PROGRAMS: usize = 37;

/// Default ring-queue capacity per port; must be a power of two.
pub const PORT_QUEUE_CAPACITY: usize = 256;

/// Real-time record buffer capacity (ticks × polyphony, bounded).
pub const RECORD_BUFFER_CAPACITY: usize = STEP_COUNT * STEP_POLYPHONY;

/// Internal clock tempo bounds, microseconds per tick. Corresponds to roughly
/// 30..300 BPM at [`PPQ`] = 96.
pub const US_MIN: u64 = 60_000_000 / (300 * PPQ as u64);
pub const US_MAX: u64 = 60_000_000 / (30 * PPQ as u64);

/// External-sync history length and minimum sample count before it is trusted.
pub const EXT_SYNC_HIST_LEN: usize = 8;
pub const EXT_SYNC_MIN_HIST: usize = 3;

/// External-sync timeout, microseconds, before sync is dropped and the clock stops.
pub const EXT_SYNC_TIMEOUT_US: u64 = 125_000;

/// External-sync lock-adjust step, microseconds per tick.
pub const EXT_SYNC_LOCK_ADJ: u64 = 500;

/// External-sync upsample factor (one external clock per this many internal ticks).
pub const EXT_SYNC_UPSAMPLE: u64 = 1;

/// Displayed external tempo low-pass filter coefficient (weight on the running average).
pub const EXT_SYNC_TEMPO_FILTER: f32 = 0.9;

/// Tap-tempo history length and timeout between taps.
pub const TAP_HIST_LEN: usize = 2;
pub const TAP_TIMEOUT_US: u64 = 2_500_000;

/// MIDI note number treated as the centre of the transpose range (used by bias resolution).
pub const TRANSPOSE_CENTRE: u8 = 60;

/// Output pulse width for analog clock/reset, in task intervals.
pub const ANALOG_PULSE_LEN_TASKS: u32 = 4;
