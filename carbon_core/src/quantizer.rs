//! Scale quantization for output processing.
//!
//! Grounded on the teacher's `quantizer.rs`: an `IntervalMap` (nearest
//! in-scale semitone per chromatic degree) indexed by note modulo octave.
//! Extended to the scale set `outproc_tonality_changed` names: besides the
//! two ordinary scales kept from the teacher, the firmware supports octave
//! and fifth "scales" used by the track's tonality control.

/// Note numbers are plain MIDI values (0..127); `carbon_core` does not use
/// `embedded-midi`'s `Note` newtype here since tonality math needs raw
/// arithmetic on note numbers.
pub type NoteNum = u8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scale {
    Chromatic,
    Major,
    Minor,
    Octave,
    OctaveAndFifth,
}

type IntervalMap = [u8; 12];

impl From<Scale> for IntervalMap {
    fn from(scale: Scale) -> Self {
        match scale {
            Scale::Chromatic => [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11],
            Scale::Major => [0, 2, 2, 4, 4, 5, 7, 7, 9, 9, 11, 11],
            Scale::Minor => [0, 2, 2, 3, 5, 5, 7, 7, 8, 10, 10, 12],
            Scale::Octave => [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0],
            Scale::OctaveAndFifth => [0, 0, 0, 0, 0, 0, 7, 7, 7, 7, 7, 7],
        }
    }
}

/// Quantize `note` to the nearest in-scale pitch of `scale`, rooted at
/// `root_note`. Saturates at 127.
pub fn quantize(note: NoteNum, scale: Scale, root_note: NoteNum) -> NoteNum {
    let root_degree = root_note % 12;
    let offset = 12 - root_degree;
    let note_offset = note as u16 + offset as u16;
    let octave = note_offset / 12;
    let degree = (note_offset % 12) as usize;
    let interval_map: IntervalMap = scale.into();
    let quantized_degree = interval_map[degree] as u16;
    let quantized = (quantized_degree + octave * 12).saturating_sub(offset as u16);
    quantized.min(127) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantize_c_major_leaves_natural_notes_unchanged() {
        assert_eq!(quantize(60, Scale::Major, 0), 60); // C
        assert_eq!(quantize(62, Scale::Major, 0), 62); // D
        assert_eq!(quantize(64, Scale::Major, 0), 64); // E
    }

    #[test]
    fn quantize_c_major_snaps_black_keys_down() {
        assert_eq!(quantize(61, Scale::Major, 0), 62); // C# -> D
        assert_eq!(quantize(66, Scale::Major, 0), 67); // F# -> G
    }

    #[test]
    fn quantize_chromatic_is_identity() {
        for n in 0..128u8 {
            assert_eq!(quantize(n, Scale::Chromatic, 0), n);
        }
    }

    #[test]
    fn quantize_octave_collapses_to_root_pitch_class() {
        assert_eq!(quantize(61, Scale::Octave, 0) % 12, 0);
        assert_eq!(quantize(73, Scale::Octave, 0) % 12, 0);
    }

    #[test]
    fn quantize_respects_nonzero_root() {
        // root G# (degree 8): G# itself is in-scale for OctaveAndFifth
        assert_eq!(quantize(68, Scale::OctaveAndFifth, 68) % 12, 68 % 12);
    }
}
