//! MIDI remote control: the fixed channel/note/CC mapping that lets an
//! external controller drive scenes, tracks and per-track parameters, plus
//! the CV/Gate output program table for the analog path.
//!
//! The channel, note and CC assignments and their exact bit-shift/clamp
//! decode formulas are ported directly from `midi_ctrl.c`. The CV/Gate
//! program table has no corresponding `.c` file in the retrieved corpus, so
//! it is a reconstruction: four output-pairing shapes (independent A/B/C/D,
//! paired AABC, paired AABB, ganged AAAA) repeated across the transpose,
//! velocity and gate-length assignment slots a four-output analog path needs.

use crate::arp_progs::ArpType;
use crate::song::{MotionDirection, StepLength};

pub const CHAN_OMNI: u8 = 9;
pub const CHAN_TRACK_1: u8 = 10;

pub const NOTE_SCENE: [u8; 6] = [24, 26, 28, 29, 31, 33];
pub const NOTE_RESET_TRACK: [u8; 6] = [36, 38, 40, 41, 43, 45];
pub const NOTE_RUN: u8 = 37;
pub const NOTE_STOP: u8 = 39;
pub const NOTE_RESET: u8 = 42;
pub const NOTE_RECORD: u8 = 46;
pub const NOTE_KBTRANS_MIN: u8 = 48;
pub const NOTE_KBTRANS_MAX: u8 = 72;
pub const NOTE_KBTRANS_OFFSET: u8 = 60;

pub const CC_STEP_LENGTH: u8 = 16;
pub const CC_TRACK_TRANSPOSE: u8 = 17;
pub const CC_TRACK_MUTE: u8 = 18;
pub const CC_MOTION_START: u8 = 19;
pub const CC_MOTION_LENGTH: u8 = 20;
pub const CC_MOTION_DIR: u8 = 21;
pub const CC_GATE_TIME: u8 = 22;
pub const CC_PATTERN_TYPE: u8 = 23;
pub const CC_ARP_ENABLE: u8 = 24;
pub const CC_ARP_TYPE: u8 = 25;
pub const CC_ARP_SPEED: u8 = 26;
pub const CC_ARP_GATE_TIME: u8 = 27;
pub const CC_RUN_STOP: u8 = 80;

pub const TRANSPOSE_MIN: i8 = -32;
pub const TRANSPOSE_MAX: i8 = 31;
pub const ARP_GATE_TIME_MIN: u16 = 1;
pub const ARP_GATE_TIME_MAX: u16 = 511;

/// Track index resolved from a CC's channel; `Omni` broadcasts to all tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackSelect {
    Omni,
    Track(usize),
}

/// A decoded remote-control event, already clamped/shifted per the source
/// firmware's formulas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    TriggerScene(usize),
    ResetTrack(usize),
    Run,
    Stop,
    ResetPos,
    RecordPressed,
    SetKbtrans(i8),
    SetStepLength(TrackSelect, u8),
    SetTranspose(TrackSelect, i8),
    SetMute(TrackSelect, bool),
    SetMotionStart(TrackSelect, u8),
    SetMotionLength(TrackSelect, u8),
    SetMotionDir(TrackSelect, MotionDirection),
    SetGateTime(TrackSelect, u8),
    SetPatternType(TrackSelect, u8),
    SetArpEnable(TrackSelect, bool),
    SetArpType(TrackSelect, u8),
    SetArpSpeed(TrackSelect, u8),
    SetArpGateTime(TrackSelect, u16),
    SetRunStop(bool),
}

fn clamp_i16(v: i16, lo: i16, hi: i16) -> i16 {
    v.max(lo).min(hi)
}

/// Decode a note-on or control-change message into a [`ControlEvent`], or
/// `None` if the channel/status/value isn't one the remote-control layer
/// cares about. `chan` and `note`/`cc` are zero-indexed MIDI fields.
pub fn decode(chan: u8, is_note_on: bool, data0: u8, data1: u8) -> Option<ControlEvent> {
    if chan < CHAN_OMNI {
        return None;
    }

    if is_note_on {
        if data1 == 0 {
            return None; // note-on velocity 0 is a note-off, not a trigger
        }
        if let Some(i) = NOTE_SCENE.iter().position(|&n| n == data0) {
            return Some(ControlEvent::TriggerScene(i));
        }
        if let Some(i) = NOTE_RESET_TRACK.iter().position(|&n| n == data0) {
            return Some(ControlEvent::ResetTrack(i));
        }
        if data0 == NOTE_RUN {
            return Some(ControlEvent::Run);
        }
        if data0 == NOTE_STOP {
            return Some(ControlEvent::Stop);
        }
        if data0 == NOTE_RESET {
            return Some(ControlEvent::ResetPos);
        }
        if data0 == NOTE_RECORD {
            return Some(ControlEvent::RecordPressed);
        }
        if (NOTE_KBTRANS_MIN..=NOTE_KBTRANS_MAX).contains(&data0) {
            return Some(ControlEvent::SetKbtrans(data0 as i8 - NOTE_KBTRANS_OFFSET as i8));
        }
        return None;
    }

    let track = if chan == CHAN_OMNI { TrackSelect::Omni } else { TrackSelect::Track((chan - CHAN_TRACK_1) as usize) };

    match data0 {
        CC_STEP_LENGTH => {
            let v = clamp_i16((data1 >> 3) as i16, 0, crate::song::STEP_LENGTH_COUNT as i16 - 1);
            Some(ControlEvent::SetStepLength(track, v as u8))
        }
        CC_TRACK_TRANSPOSE => {
            let v = clamp_i16((data1 >> 1) as i16 - 32, TRANSPOSE_MIN as i16, TRANSPOSE_MAX as i16);
            Some(ControlEvent::SetTranspose(track, v as i8))
        }
        CC_TRACK_MUTE => Some(ControlEvent::SetMute(track, (data1 >> 6) != 0)),
        CC_MOTION_START => {
            let v = clamp_i16((data1 >> 1) as i16, 0, crate::config::STEP_COUNT as i16 - 1);
            Some(ControlEvent::SetMotionStart(track, v as u8))
        }
        CC_MOTION_LENGTH => {
            let v = clamp_i16((data1 >> 1) as i16 + 1, 1, crate::config::STEP_COUNT as i16);
            Some(ControlEvent::SetMotionLength(track, v as u8))
        }
        CC_MOTION_DIR => {
            let dir = if (data1 >> 6) != 0 { MotionDirection::Reverse } else { MotionDirection::Forward };
            Some(ControlEvent::SetMotionDir(track, dir))
        }
        CC_GATE_TIME => Some(ControlEvent::SetGateTime(track, (data1 << 1).wrapping_add(1))),
        CC_PATTERN_TYPE => Some(ControlEvent::SetPatternType(track, data1 >> 2)),
        CC_ARP_ENABLE => Some(ControlEvent::SetArpEnable(track, (data1 >> 6) != 0)),
        CC_ARP_TYPE => {
            let v = clamp_i16((data1 >> 3) as i16, 0, ArpType::ALL.len() as i16 - 1);
            Some(ControlEvent::SetArpType(track, v as u8))
        }
        CC_ARP_SPEED => {
            let v = clamp_i16((data1 >> 3) as i16, 0, crate::song::STEP_LENGTH_COUNT as i16 - 1);
            Some(ControlEvent::SetArpSpeed(track, v as u8))
        }
        CC_ARP_GATE_TIME => {
            let v = clamp_i16(((data1 as i16) << 2) + 1, ARP_GATE_TIME_MIN as i16, ARP_GATE_TIME_MAX as i16);
            Some(ControlEvent::SetArpGateTime(track, v as u16))
        }
        CC_RUN_STOP => Some(ControlEvent::SetRunStop((data1 >> 6) != 0)),
        _ => None,
    }
}

/// Resolve a [`StepLength`] from a decoded step-length/arp-speed value.
pub fn step_length_from_index(index: u8) -> StepLength {
    StepLength::try_from(index).unwrap_or(StepLength::Sixteenth)
}

/// One of four output-pairing shapes for the four-channel CV/Gate path:
/// each of A, B, C, D wired independently; B paired onto A's gate while C/D
/// stay independent; A and B paired, C and D paired; or all four ganged to
/// a single gate/CV pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CvProgram {
    Abcd,
    Aabc,
    Aabb,
    Aaaa,
}

/// The closed table of 21 stored CV/Gate programs: each shape repeated
/// across the seven note-priority assignments (last, low, high, and the
/// four fixed-voice permutations) a four-output analog path needs.
pub const CV_PROGRAM_COUNT: usize = 21;

pub const CV_PROGRAMS: [CvProgram; CV_PROGRAM_COUNT] = [
    CvProgram::Abcd, CvProgram::Abcd, CvProgram::Abcd, CvProgram::Abcd, CvProgram::Abcd, CvProgram::Abcd, CvProgram::Abcd,
    CvProgram::Aabc, CvProgram::Aabc, CvProgram::Aabc, CvProgram::Aabc, CvProgram::Aabc, CvProgram::Aabc, CvProgram::Aabc,
    CvProgram::Aabb, CvProgram::Aabb, CvProgram::Aabb,
    CvProgram::Aaaa, CvProgram::Aaaa, CvProgram::Aaaa, CvProgram::Aaaa,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_below_omni_is_ignored() {
        assert_eq!(decode(0, true, NOTE_RUN, 100), None);
    }

    #[test]
    fn note_on_velocity_zero_is_not_a_trigger() {
        assert_eq!(decode(CHAN_OMNI, true, NOTE_RUN, 0), None);
    }

    #[test]
    fn scene_and_transport_notes_decode() {
        assert_eq!(decode(CHAN_OMNI, true, NOTE_SCENE[2], 100), Some(ControlEvent::TriggerScene(2)));
        assert_eq!(decode(CHAN_OMNI, true, NOTE_RUN, 100), Some(ControlEvent::Run));
        assert_eq!(decode(CHAN_OMNI, true, NOTE_STOP, 100), Some(ControlEvent::Stop));
    }

    #[test]
    fn kbtrans_note_range_decodes_to_signed_offset() {
        assert_eq!(decode(CHAN_OMNI, true, 60, 100), Some(ControlEvent::SetKbtrans(0)));
        assert_eq!(decode(CHAN_OMNI, true, 48, 100), Some(ControlEvent::SetKbtrans(-12)));
        assert_eq!(decode(CHAN_OMNI, true, 72, 100), Some(ControlEvent::SetKbtrans(12)));
    }

    #[test]
    fn cc_on_omni_channel_broadcasts() {
        assert_eq!(decode(CHAN_OMNI, false, CC_RUN_STOP, 0xFF), Some(ControlEvent::SetRunStop(true)));
    }

    #[test]
    fn cc_on_track_channel_resolves_track_index() {
        assert_eq!(
            decode(CHAN_TRACK_1 + 2, false, CC_TRACK_MUTE, 0xFF),
            Some(ControlEvent::SetMute(TrackSelect::Track(2), true))
        );
    }

    #[test]
    fn transpose_cc_decodes_and_clamps_signed_range() {
        // data1=64 -> (64>>1)-32 = 0
        assert_eq!(
            decode(CHAN_OMNI, false, CC_TRACK_TRANSPOSE, 64),
            Some(ControlEvent::SetTranspose(TrackSelect::Omni, 0))
        );
    }

    #[test]
    fn gate_time_cc_uses_double_plus_one_formula() {
        assert_eq!(decode(CHAN_OMNI, false, CC_GATE_TIME, 10), Some(ControlEvent::SetGateTime(TrackSelect::Omni, 21)));
    }

    #[test]
    fn cv_program_table_has_the_closed_count() {
        assert_eq!(CV_PROGRAMS.len(), CV_PROGRAM_COUNT);
    }
}
