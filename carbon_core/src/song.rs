//! Song/scene data model: steps, tracks, scenes and the song-wide settings
//! that the engine reads every tick.
//!
//! Grounded on `seq_engine.c`'s `sestate` fields (step size, motion,
//! gate-time, bias-track, track-type) and on `seq_utils.c`'s step-length
//! table and wrapped-range helper. No `song.c`/`pattern.c` source was present
//! in the retrieved corpus, so the stored-pattern table (distinct from
//! "as recorded") is a reconstruction: deterministic Euclidean rhythms tiled
//! over 64 steps, chosen because it is the standard way a step sequencer
//! fills a closed set of named patterns without per-pattern storage.

use heapless::Vec;

use crate::config::{SCENE_COUNT, SONG_MODE_LEN, STEP_COUNT, STEP_POLYPHONY, TRACK_COUNT};

/// Number of enumerated note durations, matching `SEQ_UTILS_STEP_LENS`.
pub const STEP_LENGTH_COUNT: usize = 17;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StepLength {
    ThirtySecondTriplet = 0,
    ThirtySecond,
    SixteenthTriplet,
    DottedThirtySecond,
    Sixteenth,
    EighthTriplet,
    DottedSixteenth,
    Eighth,
    QuarterTriplet,
    DottedEighth,
    Quarter,
    HalfTriplet,
    DottedQuarter,
    Half,
    WholeTriplet,
    DottedHalf,
    Whole,
}

impl StepLength {
    pub const ALL: [StepLength; STEP_LENGTH_COUNT] = [
        StepLength::ThirtySecondTriplet,
        StepLength::ThirtySecond,
        StepLength::SixteenthTriplet,
        StepLength::DottedThirtySecond,
        StepLength::Sixteenth,
        StepLength::EighthTriplet,
        StepLength::DottedSixteenth,
        StepLength::Eighth,
        StepLength::QuarterTriplet,
        StepLength::DottedEighth,
        StepLength::Quarter,
        StepLength::HalfTriplet,
        StepLength::DottedQuarter,
        StepLength::Half,
        StepLength::WholeTriplet,
        StepLength::DottedHalf,
        StepLength::Whole,
    ];

    /// Ticks at [`crate::config::PPQ`] = 96 (a quarter note is 96 ticks).
    const TICKS_AT_PPQ96: [u32; STEP_LENGTH_COUNT] =
        [8, 12, 16, 18, 24, 32, 36, 48, 64, 72, 96, 128, 144, 192, 256, 288, 384];

    pub fn ticks(self) -> u32 {
        Self::TICKS_AT_PPQ96[self as usize]
    }
}

impl TryFrom<u8> for StepLength {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if (value as usize) < STEP_LENGTH_COUNT {
            Ok(StepLength::ALL[value as usize])
        } else {
            Err(())
        }
    }
}

/// A single polyphony slot on a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackEvent {
    #[default]
    Null,
    Note {
        pitch: u8,
        velocity: u8,
        length: u16,
    },
    Cc {
        controller: u8,
        value: u8,
    },
}

/// A fixed slot holding up to [`STEP_POLYPHONY`] events plus per-step
/// playback attributes.
#[derive(Debug, Clone, Copy)]
pub struct Step {
    pub events: [TrackEvent; STEP_POLYPHONY],
    pub start_delay: u16,
    pub ratchet_count: u8,
    pub probability: u8,
}

impl Default for Step {
    fn default() -> Self {
        Step {
            events: [TrackEvent::Null; STEP_POLYPHONY],
            start_delay: 0,
            ratchet_count: 1,
            probability: 100,
        }
    }
}

impl Step {
    pub fn is_populated(&self) -> bool {
        self.events.iter().any(|e| !matches!(e, TrackEvent::Null))
    }

    /// Insert a note into the first free slot, if any. Mirrors step-record's
    /// bounded-polyphony insertion.
    pub fn add_note(&mut self, pitch: u8, velocity: u8, length: u16) -> bool {
        for slot in self.events.iter_mut() {
            if matches!(slot, TrackEvent::Null) {
                *slot = TrackEvent::Note { pitch, velocity, length };
                return true;
            }
        }
        false
    }

    pub fn clear(&mut self) {
        *self = Step::default();
    }
}

/// Number of stored pattern types, distinct from the "as recorded" pattern.
pub const STORED_PATTERN_COUNT: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternType {
    AsRecorded,
    Stored(u8),
}

impl PatternType {
    /// Whether `step` is enabled under this pattern. `AsRecorded` always
    /// returns true (it defers to whatever events are actually stored in the
    /// step); stored patterns are closed-form Euclidean rhythms tiled over a
    /// 16-step cell and repeated across [`STEP_COUNT`].
    pub fn step_enabled(self, step: usize) -> bool {
        match self {
            PatternType::AsRecorded => true,
            PatternType::Stored(id) => euclidean_hit(id as usize, step),
        }
    }
}

/// Bjorklund-style Euclidean rhythm over a 16-step cell, tiled across the
/// full step range. `id` selects a (hits, rotation) pair from a closed table
/// of [`STORED_PATTERN_COUNT`] entries: hit counts 1..16 at rotation 0, then
/// the same hit counts again at rotation 8.
fn euclidean_hit(id: usize, step: usize) -> bool {
    const CELL: usize = 16;
    let id = id % STORED_PATTERN_COUNT;
    let hits = (id % 16) + 1;
    let rotation = if id >= 16 { 8 } else { 0 };
    let phase = (step + rotation) % CELL;
    let prev = (phase + CELL - 1) % CELL;
    (phase * hits) / CELL != (prev * hits) / CELL
}

/// Voice tracks receive keyboard-transpose and tonality quantization; drum
/// tracks receive neither, only bias.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackType {
    Voice,
    Drum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionDirection {
    Forward,
    Reverse,
}

/// Sentinel meaning "no bias source", matching `SONG_TRACK_BIAS_NULL`.
pub const BIAS_NULL: i8 = -1;

/// Per-scene, per-track parameters the engine reads every tick.
#[derive(Debug, Clone)]
pub struct Track {
    pub steps: Vec<Step, STEP_COUNT>,
    pub step_length: StepLength,
    pub motion_start: u8,
    pub motion_length: u8,
    pub motion_dir: MotionDirection,
    pub gate_time: u8,
    pub pattern_type: PatternType,
    pub transpose: i8,
    pub tonality: crate::quantizer::Scale,
    pub mute: bool,
    pub arp_enable: bool,
    pub arp_type: crate::arp_progs::ArpType,
    pub arp_speed: StepLength,
    pub arp_gate_time: u16,
    pub bias_track: i8,
    pub track_type: TrackType,
    pub midi_channel: u8,
}

impl Default for Track {
    fn default() -> Self {
        let mut steps = Vec::new();
        for _ in 0..STEP_COUNT {
            let _ = steps.push(Step::default());
        }
        Track {
            steps,
            step_length: StepLength::Sixteenth,
            motion_start: 0,
            motion_length: STEP_COUNT as u8,
            motion_dir: MotionDirection::Forward,
            gate_time: 128,
            pattern_type: PatternType::AsRecorded,
            transpose: 0,
            tonality: crate::quantizer::Scale::Chromatic,
            mute: false,
            arp_enable: false,
            arp_type: crate::arp_progs::ArpType::Up1,
            arp_speed: StepLength::Sixteenth,
            arp_gate_time: 48,
            bias_track: BIAS_NULL,
            track_type: TrackType::Voice,
            midi_channel: 0,
        }
    }
}

impl Track {
    pub fn step(&self, index: usize) -> &Step {
        &self.steps[index]
    }

    pub fn step_mut(&mut self, index: usize) -> &mut Step {
        &mut self.steps[index]
    }

    pub fn step_enabled(&self, index: usize) -> bool {
        self.pattern_type.step_enabled(index) && self.steps[index].is_populated()
    }
}

#[derive(Debug, Clone)]
pub struct Scene {
    pub tracks: [Track; TRACK_COUNT],
}

impl Default for Scene {
    fn default() -> Self {
        Scene { tracks: core::array::from_fn(|_| Track::default()) }
    }
}

/// One entry in the 64-slot song-mode list.
#[derive(Debug, Clone, Copy, Default)]
pub struct SongListEntry {
    pub scene: Option<u8>,
    pub beats: u16,
    pub kbtrans: i8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneSync {
    Immediate,
    Beat,
    Track1,
}

#[derive(Debug, Clone)]
pub struct Song {
    pub scenes: Vec<Scene, SCENE_COUNT>,
    pub song_list: Vec<SongListEntry, SONG_MODE_LEN>,
    pub tempo_bpm: u32,
    pub swing: u8,
    pub scene_sync: SceneSync,
    pub kbtrans: i8,
}

impl Default for Song {
    fn default() -> Self {
        let mut scenes = Vec::new();
        for _ in 0..SCENE_COUNT {
            let _ = scenes.push(Scene::default());
        }
        let mut song_list = Vec::new();
        for _ in 0..SONG_MODE_LEN {
            let _ = song_list.push(SongListEntry::default());
        }
        Song {
            scenes,
            song_list,
            tempo_bpm: 120,
            swing: 0,
            scene_sync: SceneSync::Immediate,
            kbtrans: 0,
        }
    }
}

impl Song {
    pub fn scene(&self, index: usize) -> &Scene {
        &self.scenes[index]
    }

    pub fn scene_mut(&mut self, index: usize) -> &mut Scene {
        &mut self.scenes[index]
    }
}

/// `(pos - start) mod total_len < length`, as in `seq_utils_get_wrapped_range`.
pub fn in_wrapped_range(pos: usize, start: usize, length: usize, total_len: usize) -> bool {
    let offset = (pos + total_len - start % total_len) % total_len;
    offset < length
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_length_round_trips_through_index() {
        for len in StepLength::ALL {
            assert_eq!(StepLength::try_from(len as u8), Ok(len));
        }
        assert_eq!(StepLength::try_from(200), Err(()));
    }

    #[test]
    fn step_length_ticks_are_monotonic_increasing() {
        let ticks: Vec<u32, STEP_LENGTH_COUNT> = StepLength::ALL.iter().map(|l| l.ticks()).collect();
        for w in ticks.windows(2) {
            assert!(w[0] < w[1]);
        }
    }

    #[test]
    fn as_recorded_pattern_defers_to_step_population() {
        let mut step = Step::default();
        assert!(!step.is_populated());
        assert!(step.add_note(60, 100, 12));
        assert!(step.is_populated());
    }

    #[test]
    fn euclidean_pattern_hit_count_matches_id() {
        // id 3 -> 4 hits per 16-step cell
        let hits = (0..16).filter(|&s| euclidean_hit(3, s)).count();
        assert_eq!(hits, 4);
    }

    #[test]
    fn wrapped_range_handles_wraparound() {
        assert!(in_wrapped_range(62, 60, 8, 64));
        assert!(in_wrapped_range(3, 60, 8, 64));
        assert!(!in_wrapped_range(5, 60, 8, 64));
    }

    #[test]
    fn step_add_note_respects_polyphony_bound() {
        let mut step = Step::default();
        for i in 0..STEP_POLYPHONY {
            assert!(step.add_note(60 + i as u8, 100, 12));
        }
        assert!(!step.add_note(72, 100, 12));
    }
}
