//! Output processing: transpose, tonality and the per-track output map.
//!
//! Grounded on `outproc.h` (delivery/process constants) and on
//! `seq_engine_track_play_step`'s bias/kbtrans resolution (`seq_engine.c`
//! lines ~899-921), generalized to the full two-output routing table the
//! spec calls for since no `outproc.c` was present in the retrieved corpus.

use heapless::Vec;

use crate::config::TRACK_COUNT;
use crate::message::{Message, Port};
use crate::quantizer::{self, Scale};
use crate::song::TrackType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deliver {
    A,
    B,
    Both,
}

/// One of a track's two output destinations.
#[derive(Debug, Clone, Copy)]
pub struct OutputSlot {
    pub port: Port,
    pub channel: u8,
    pub program: Option<u8>,
}

impl Default for OutputSlot {
    fn default() -> Self {
        OutputSlot { port: Port::DinOut1, channel: 0, program: None }
    }
}

/// A track's two output slots. `b` is `None` until the user maps a second
/// destination, so `Deliver::Both` on an unconfigured track sends once, not
/// twice through two identical default slots.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrackOutput {
    pub a: OutputSlot,
    pub b: Option<OutputSlot>,
}

/// A pending program change per output slot, sent once before the next note.
#[derive(Debug, Clone, Copy, Default)]
struct PendingProgram {
    a: Option<u8>,
    b: Option<u8>,
}

pub struct OutProc {
    outputs: [TrackOutput; TRACK_COUNT],
    pending: [PendingProgram; TRACK_COUNT],
}

impl OutProc {
    pub fn new() -> Self {
        OutProc {
            outputs: [TrackOutput::default(); TRACK_COUNT],
            pending: [PendingProgram::default(); TRACK_COUNT],
        }
    }

    pub fn set_output(&mut self, track: usize, a: OutputSlot, b: Option<OutputSlot>) {
        self.outputs[track] = TrackOutput { a, b };
        // a changed output map invalidates any pending program assumption
        self.pending[track] = PendingProgram { a: a.program, b: b.and_then(|s| s.program) };
    }

    /// Apply scene-wide/track-wide transpose to a note pitch, per `seq_engine_track_play_step`.
    /// Returns `None` if the result falls outside 0..127 (silently dropped).
    pub fn apply_transpose(
        track_type: TrackType,
        pitch: u8,
        scene_transpose: i8,
        kbtrans: i8,
        bias: i8,
    ) -> Option<u8> {
        let kbtrans = if track_type == TrackType::Voice { kbtrans } else { 0 };
        let shifted = pitch as i16 + scene_transpose as i16 + kbtrans as i16 + bias as i16;
        if (0..=127).contains(&shifted) {
            Some(shifted as u8)
        } else {
            None
        }
    }

    /// Quantize a pitch to `scale`, bypassed for drum tracks.
    pub fn apply_tonality(track_type: TrackType, pitch: u8, scale: Scale, root: u8) -> u8 {
        if track_type == TrackType::Drum {
            pitch
        } else {
            quantizer::quantize(pitch, scale, root)
        }
    }

    /// Deliver a processed message to a track's mapped output(s), emitting
    /// any pending program change first. CV_OUT is the analog path's
    /// concern, not the port-stream's, so it is skipped here.
    pub fn deliver(&mut self, track: usize, msg_status: u8, data0: u8, data1: u8, deliver: Deliver, len: u8) -> Vec<Message, 4> {
        let mut out = Vec::new();
        let output = self.outputs[track];
        if matches!(deliver, Deliver::A | Deliver::Both) {
            self.emit_slot(&mut out, track, true, output.a, msg_status, data0, data1, len);
        }
        if matches!(deliver, Deliver::B | Deliver::Both) {
            if let Some(b) = output.b {
                self.emit_slot(&mut out, track, false, b, msg_status, data0, data1, len);
            }
        }
        out
    }

    #[allow(clippy::too_many_arguments)]
    fn emit_slot(
        &mut self,
        out: &mut Vec<Message, 4>,
        track: usize,
        is_a: bool,
        slot: OutputSlot,
        status: u8,
        data0: u8,
        data1: u8,
        len: u8,
    ) {
        if slot.port == Port::CvOut {
            return;
        }
        let pending = if is_a { &mut self.pending[track].a } else { &mut self.pending[track].b };
        if let Some(program) = pending.take() {
            let _ = out.push(Message::two_byte(slot.port, 0xC0 | (slot.channel & 0x0F), program));
        }
        let chan_status = (status & 0xF0) | (slot.channel & 0x0F);
        let m = match len {
            1 => Message::one_byte(slot.port, chan_status),
            2 => Message::two_byte(slot.port, chan_status, data0),
            _ => Message::three_byte(slot.port, chan_status, data0, data1),
        };
        let _ = out.push(m);
    }

    pub fn stop_all_notes(&mut self, _track: usize) {
        // active-note teardown lives in the engine's active-note pool; this
        // hook exists so callers have a single place to invalidate pending
        // program changes on a hard stop.
    }
}

impl Default for OutProc {
    fn default() -> Self {
        Self::new()
    }
}
