//! Error kinds produced by the core. Kept as small hand-rolled enums, in the
//! same style as the reference firmware's `MachineError`/`ParamError` (no
//! external error-handling crate).

use core::fmt::{Display, Formatter, Result as FmtResult};

/// Errors the core can report back to a caller (panel/MIDI-control layer or a
/// test harness). Per the real-time-path contract, none of these ever abort a
/// tick: the call that triggers one either no-ops or degrades silently, and
/// this value is only returned for logging/diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CarbonError {
    /// A port's ring queue was full; the incoming message was dropped.
    QueueFull,
    /// A port index was out of the closed port enumeration.
    InvalidPort,
    /// A track index was out of `0..TRACK_COUNT`.
    InvalidTrack,
    /// A scene index was out of `0..SCENE_COUNT`.
    InvalidScene,
    /// An arp/CV program id had no corresponding entry.
    InvalidProgram,
    /// A song blob failed to load (bad version, truncated, or corrupt).
    SongLoadError,
    /// A song blob failed to save (store rejected the write).
    SongSaveError,
    /// The arp VM exceeded its loop bound or jumped to a missing label; it
    /// resets its own program counter and continues on the next step.
    ArpProgramHalt,
    /// A final pitch fell outside 0..127 and was dropped.
    PitchOutOfRange,
    /// The real-time record buffer was full; further events were dropped.
    RecordOverflow,
}

impl Display for CarbonError {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        let msg = match self {
            CarbonError::QueueFull => "queue full",
            CarbonError::InvalidPort => "invalid port",
            CarbonError::InvalidTrack => "invalid track",
            CarbonError::InvalidScene => "invalid scene",
            CarbonError::InvalidProgram => "invalid program",
            CarbonError::SongLoadError => "song load error",
            CarbonError::SongSaveError => "song save error",
            CarbonError::ArpProgramHalt => "arp program halted",
            CarbonError::PitchOutOfRange => "pitch out of range",
            CarbonError::RecordOverflow => "record buffer overflow",
        };
        write!(f, "{}", msg)
    }
}
