//! The step sequencer engine: per-track clock division, motion, ratchet,
//! start-delay, bias and the active-note pool, run once per clock tick.
//!
//! Grounded on `seq_engine.c`: `seq_engine_run` (the per-tick loop, bias
//! resolution before playback, scene-sync checks), `seq_engine_track_play_step`
//! (bias/kbtrans resolution), `seq_engine_track_start_note` (active-note-pool
//! preemption, ratchet/gate-time setup), `seq_engine_track_manage_notes`
//! (ratchet/start-delay countdowns and note-off timeout), and
//! `seq_engine_compute_next_pos`/`seq_engine_move_to_next_step` (motion).

use heapless::Vec;

use crate::arp::{ArpBank, ArpSink, HeldNoteEvent};
use crate::config::{ACTIVE_NOTE_POOL, STEP_COUNT, TRACK_COUNT, TRANSPOSE_CENTRE};
use crate::message::{Message, Port};
use crate::outproc::{Deliver, OutProc, OutputSlot};
use crate::random::RandomSource;
use crate::song::{BIAS_NULL, MotionDirection, SceneSync, Song, TrackEvent, TrackType};

/// Receives every message the engine produces this tick, port-routed and
/// already scale/transpose-processed.
pub trait EngineSink {
    fn send(&mut self, msg: Message);
}

impl<T: EngineSink> ArpSink for T {
    fn arp_note_on(&mut self, _track: usize, _note: u8, _velocity: u8) {}
    fn arp_note_off(&mut self, _track: usize, _note: u8) {}
}

#[derive(Debug, Clone, Copy)]
struct ActiveNote {
    note: u8,
    velocity: u8,
    tick_len: i32,
    start_delay_countdown: i32,
    ratchet_note_count: u8,
    ratchet_note_countdown: i32,
    ratchet_note_length: i32,
    ratchet_note_length_countdown: i32,
    ratchet_gate_length: i32,
    ratchet_gate_length_countdown: i32,
}

impl ActiveNote {
    fn is_ratcheted(&self) -> bool {
        self.ratchet_note_count > 1
    }
}

/// Where the record path currently stands, mirroring `seq_ctrl_get_record_mode`
/// collapsed to the three states the live-routing gate cares about (step
/// record and real-time record both count as "recording").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    Idle,
    Armed,
    Recording,
}

#[derive(Default)]
struct TrackState {
    clock_div_count: u32,
    step_pos: usize,
    bias_output: i8,
    active_notes: Vec<Option<ActiveNote>, ACTIVE_NOTE_POOL>,
}

impl TrackState {
    fn new() -> Self {
        let mut active_notes = Vec::new();
        for _ in 0..ACTIVE_NOTE_POOL {
            let _ = active_notes.push(None);
        }
        TrackState { clock_div_count: 0, step_pos: 0, bias_output: 0, active_notes }
    }
}

pub struct Engine {
    song: Song,
    scene_current: usize,
    scene_next: usize,
    first_track: usize,
    kbtrans: i8,
    tracks: [TrackState; TRACK_COUNT],
    out: OutProc,
    arp: ArpBank,
    running: bool,
    track_select: u8,
    live_mode: bool,
    autolive: bool,
    step_edit_enable: bool,
    record_state: RecordState,
}

struct ForwardingSink<'a, S: EngineSink> {
    inner: &'a mut S,
    out: &'a mut OutProc,
}

impl<'a, S: EngineSink> ArpSink for ForwardingSink<'a, S> {
    fn arp_note_on(&mut self, track: usize, note: u8, velocity: u8) {
        for m in self.out.deliver(track, 0x90, note, velocity, Deliver::Both, 3) {
            self.inner.send(m);
        }
    }
    fn arp_note_off(&mut self, track: usize, note: u8) {
        for m in self.out.deliver(track, 0x80, note, 0x40, Deliver::Both, 3) {
            self.inner.send(m);
        }
    }
}

impl Engine {
    pub fn new(song: Song) -> Self {
        Engine {
            song,
            scene_current: 0,
            scene_next: 0,
            first_track: 0,
            kbtrans: 0,
            tracks: core::array::from_fn(|_| TrackState::new()),
            out: OutProc::new(),
            arp: ArpBank::new(),
            running: false,
            track_select: 0,
            live_mode: false,
            autolive: false,
            step_edit_enable: false,
            record_state: RecordState::Idle,
        }
    }

    pub fn song(&self) -> &Song {
        &self.song
    }

    pub fn song_mut(&mut self) -> &mut Song {
        &mut self.song
    }

    /// Track whose record pre-/post-roll gates real-time recording for all
    /// selected tracks; mirrors `seq_ctrl_get_first_track`'s single-track anchor.
    pub fn set_first_track(&mut self, track: usize) {
        self.first_track = track;
    }

    pub fn first_track(&self) -> usize {
        self.first_track
    }

    pub fn set_run_state(&mut self, running: bool) {
        self.running = running;
        if !running {
            for t in self.tracks.iter_mut() {
                t.clock_div_count = 0;
            }
        }
    }

    pub fn set_track_select(&mut self, track: usize, selected: bool) {
        if selected {
            self.track_select |= 1 << track;
        } else {
            self.track_select &= !(1 << track);
        }
    }

    pub fn is_track_selected(&self, track: usize) -> bool {
        self.track_select & (1 << track) != 0
    }

    pub fn set_live_mode(&mut self, enable: bool) {
        self.live_mode = enable;
    }

    pub fn set_autolive(&mut self, enable: bool) {
        self.autolive = enable;
    }

    pub fn set_step_edit_enable(&mut self, enable: bool) {
        self.step_edit_enable = enable;
    }

    pub fn set_record_state(&mut self, state: RecordState) {
        self.record_state = state;
    }

    /// Whether live MIDI input is currently routed to the arp/out-proc path
    /// rather than to the recorder, per §4.4 item 9: live mode is on, or
    /// autolive is on, or record is armed/in progress, or step-edit is
    /// active with the clock stopped.
    fn live_routing_active(&self) -> bool {
        self.live_mode
            || self.autolive
            || self.record_state != RecordState::Idle
            || (self.step_edit_enable && !self.running)
    }

    /// Route a live note-on to every selected track: to the arp's held-note
    /// tracker if the track has arp enabled, otherwise straight through
    /// out-proc as an immediate note, mirroring `seq_engine_live_send_msg`.
    pub fn handle_live_note_on(&mut self, note: u8, velocity: u8, sink: &mut impl EngineSink) {
        if !self.live_routing_active() {
            return;
        }
        let scene = self.song.scene(self.scene_current);
        for track in 0..TRACK_COUNT {
            if !self.is_track_selected(track) {
                continue;
            }
            if scene.tracks[track].arp_enable {
                self.arp.track(track).handle_input(HeldNoteEvent::NoteOn(note, velocity));
            } else {
                for m in self.out.deliver(track, 0x90, note, velocity, Deliver::Both, 3) {
                    sink.send(m);
                }
            }
        }
    }

    /// Route a live note-off the same way `handle_live_note_on` routed the
    /// matching note-on.
    pub fn handle_live_note_off(&mut self, note: u8, sink: &mut impl EngineSink) {
        if !self.live_routing_active() {
            return;
        }
        let scene = self.song.scene(self.scene_current);
        for track in 0..TRACK_COUNT {
            if !self.is_track_selected(track) {
                continue;
            }
            if scene.tracks[track].arp_enable {
                self.arp.track(track).handle_input(HeldNoteEvent::NoteOff(note));
            } else {
                for m in self.out.deliver(track, 0x80, note, 0x40, Deliver::Both, 3) {
                    sink.send(m);
                }
            }
        }
    }

    pub fn request_scene(&mut self, scene: usize) {
        self.scene_next = scene;
        if !self.running {
            self.change_scene_now();
        }
    }

    fn change_scene_now(&mut self) {
        self.scene_current = self.scene_next;
        self.reset_all_track_positions();
    }

    fn reset_all_track_positions(&mut self) {
        let scene = self.song.scene(self.scene_current).clone();
        for (i, track) in scene.tracks.iter().enumerate() {
            let st = &mut self.tracks[i];
            st.clock_div_count = 0;
            st.step_pos = match track.motion_dir {
                MotionDirection::Reverse => {
                    (track.motion_start as usize + track.motion_length as usize - 1) % STEP_COUNT
                }
                MotionDirection::Forward => track.motion_start as usize,
            };
            self.out.set_output(i, OutputSlot { port: Port::DinOut1, channel: track.midi_channel, program: None }, None);
        }
    }

    /// Run one clock tick. `beat_cross` is true exactly on the tick that
    /// crosses a beat boundary (driven by [`crate::clock::Clock`]).
    pub fn run_tick(
        &mut self,
        tick_count: u32,
        beat_cross: bool,
        sink: &mut impl EngineSink,
        rng: &mut impl RandomSource,
    ) {
        if tick_count == 0 {
            self.reset_all_track_positions();
        }

        if !self.running {
            return;
        }

        if self.scene_current != self.scene_next && self.scene_change_due(beat_cross) {
            self.change_scene_now();
        }

        self.resolve_bias_outputs();

        for track in 0..TRACK_COUNT {
            self.manage_active_notes(track, sink);

            if self.tracks[track].clock_div_count == 0 {
                self.play_step_if_due(track, sink, rng);
                self.advance_step(track);
            }

            let step_size = self.step_size_ticks(track);
            self.tracks[track].clock_div_count += 1;
            if self.tracks[track].clock_div_count >= step_size {
                self.tracks[track].clock_div_count = 0;
            }
        }

        {
            let out = &mut self.out;
            let mut forward = ForwardingSink { inner: sink, out };
            self.arp.run(tick_count, &mut forward, rng);
        }
    }

    /// Whether a pending scene change should take effect this tick, per
    /// `scene-sync-mode`: `Immediate` fires as soon as it is requested,
    /// `Beat` waits for the next beat crossing, and `Track1` waits for
    /// track 0's divider to be at zero with its step index back at its own
    /// motion-start (evaluated literally even if that track's motion-length
    /// is 1, making it true on every one of its own step boundaries).
    fn scene_change_due(&self, beat_cross: bool) -> bool {
        match self.song.scene_sync {
            SceneSync::Immediate => true,
            SceneSync::Beat => beat_cross,
            SceneSync::Track1 => {
                let track0 = &self.song.scene(self.scene_current).tracks[0];
                self.tracks[0].clock_div_count == 0 && self.tracks[0].step_pos == track0.motion_start as usize
            }
        }
    }

    fn step_size_ticks(&self, track: usize) -> u32 {
        self.song.scene(self.scene_current).tracks[track].step_length.ticks()
    }

    /// Before any track plays its step this tick, resolve the bias-output
    /// value from the first Note event on any track whose divider is at
    /// zero this tick. Mirrors `seq_engine_run`'s bias-resolution pass,
    /// which always runs ahead of playback for every track.
    fn resolve_bias_outputs(&mut self) {
        for track in 0..TRACK_COUNT {
            if self.tracks[track].clock_div_count != 0 {
                continue;
            }
            let step_pos = self.tracks[track].step_pos;
            let scene = self.song.scene(self.scene_current);
            let t = &scene.tracks[track];
            if !t.step_enabled(step_pos) {
                continue;
            }
            let step = t.step(step_pos);
            for event in step.events.iter() {
                if let TrackEvent::Note { pitch, .. } = event {
                    self.tracks[track].bias_output = (*pitch as i16 - TRANSPOSE_CENTRE as i16) as i8;
                    break;
                }
            }
        }
    }

    fn play_step_if_due(&mut self, track: usize, sink: &mut impl EngineSink, rng: &mut impl RandomSource) {
        let step_pos = self.tracks[track].step_pos;
        let scene = self.song.scene(self.scene_current).clone();
        let t = &scene.tracks[track];

        if t.mute || !t.step_enabled(step_pos) {
            return;
        }

        let step = t.step(step_pos);
        if step.probability < 100 && rng.random_below(100) >= step.probability as u32 {
            return;
        }

        let bias = if t.bias_track != BIAS_NULL && t.bias_track as usize != track {
            self.tracks[t.bias_track as usize].bias_output
        } else {
            0
        };

        for event in step.events.iter() {
            match *event {
                TrackEvent::Note { pitch, velocity, length } => {
                    let kbtrans = if t.track_type == TrackType::Voice { self.kbtrans } else { 0 };
                    let Some(final_pitch) = OutProcPitch::resolve(t.track_type, pitch, t.transpose, kbtrans, bias)
                    else {
                        continue;
                    };
                    self.start_note(track, final_pitch, velocity, length, step.start_delay, step.ratchet_count, t.gate_time, sink);
                }
                TrackEvent::Cc { controller, value } => {
                    let msgs = self.out.deliver(track, 0xB0, controller, value, Deliver::Both, 3);
                    for m in msgs {
                        sink.send(m);
                    }
                }
                TrackEvent::Null => {}
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn start_note(
        &mut self,
        track: usize,
        pitch: u8,
        velocity: u8,
        length: u16,
        start_delay: u16,
        ratchet_count: u8,
        gate_time: u8,
        sink: &mut impl EngineSink,
    ) {
        let arp_enabled = self.song.scene(self.scene_current).tracks[track].arp_enable;

        let slot = self.find_or_preempt_slot(track, sink);

        let total_len = ((length as i32) * gate_time as i32) >> 7;
        let mut note = ActiveNote {
            note: pitch,
            velocity,
            tick_len: total_len.max(1),
            start_delay_countdown: start_delay as i32,
            ratchet_note_count: ratchet_count,
            ratchet_note_countdown: 0,
            ratchet_note_length: 0,
            ratchet_note_length_countdown: 0,
            ratchet_gate_length: 0,
            ratchet_gate_length_countdown: 0,
        };

        if ratchet_count > 1 {
            let ratchet_len = (length as i32) / ratchet_count as i32;
            let mut gate_len = (ratchet_len * gate_time as i32) >> 8;
            if gate_len > ratchet_len {
                gate_len = ratchet_len;
            }
            note.ratchet_note_countdown = ratchet_count as i32;
            note.ratchet_note_length = ratchet_len;
            note.ratchet_note_length_countdown = ratchet_len;
            note.ratchet_gate_length = gate_len;
            note.ratchet_gate_length_countdown = gate_len;
        }

        if arp_enabled {
            self.arp.track(track).handle_input(HeldNoteEvent::NoteOn(pitch, velocity));
            note.start_delay_countdown = 0;
            note.ratchet_note_count = 1;
        } else if note.start_delay_countdown == 0 {
            self.emit_note_on(track, &note, sink);
        }

        self.tracks[track].active_notes[slot] = Some(note);
    }

    fn find_or_preempt_slot(&mut self, track: usize, sink: &mut impl EngineSink) -> usize {
        let notes = &self.tracks[track].active_notes;
        if let Some(free) = notes.iter().position(|n| n.is_none()) {
            return free;
        }
        let mut min_remain = i32::MAX;
        let mut min_idx = 0;
        for (i, n) in notes.iter().enumerate() {
            if let Some(n) = n {
                if n.tick_len < min_remain {
                    min_remain = n.tick_len;
                    min_idx = i;
                }
            }
        }
        if let Some(preempted) = self.tracks[track].active_notes[min_idx] {
            self.emit_note_off(track, &preempted, sink);
        }
        min_idx
    }

    fn emit_note_on(&mut self, track: usize, note: &ActiveNote, sink: &mut impl EngineSink) {
        let msgs = self.out.deliver(track, 0x90, note.note, note.velocity, Deliver::Both, 3);
        for m in msgs {
            sink.send(m);
        }
    }

    fn emit_note_off(&mut self, track: usize, note: &ActiveNote, sink: &mut impl EngineSink) {
        let msgs = self.out.deliver(track, 0x80, note.note, 0x40, Deliver::Both, 3);
        for m in msgs {
            sink.send(m);
        }
    }

    /// Ratchet countdown, start-delay countdown and final note-off timeout.
    /// Runs for every track on every tick, mirroring `seq_engine_track_manage_notes`.
    fn manage_active_notes(&mut self, track: usize, sink: &mut impl EngineSink) {
        let arp_enabled = self.song.scene(self.scene_current).tracks[track].arp_enable;
        for i in 0..ACTIVE_NOTE_POOL {
            let Some(mut note) = self.tracks[track].active_notes[i] else { continue };

            if note.start_delay_countdown > 0 {
                note.start_delay_countdown -= 1;
                if note.start_delay_countdown == 0 {
                    self.emit_note_on(track, &note, sink);
                }
                self.tracks[track].active_notes[i] = Some(note);
                continue;
            }

            if note.is_ratcheted() {
                note.ratchet_gate_length_countdown -= 1;
                if note.ratchet_gate_length_countdown <= 0 {
                    self.emit_note_off(track, &note, sink);
                }
                note.ratchet_note_length_countdown -= 1;
                if note.ratchet_note_length_countdown <= 0 {
                    note.ratchet_note_countdown -= 1;
                    if note.ratchet_note_countdown > 0 {
                        self.emit_note_on(track, &note, sink);
                        note.ratchet_note_length_countdown = note.ratchet_note_length;
                        note.ratchet_gate_length_countdown = note.ratchet_gate_length;
                        self.tracks[track].active_notes[i] = Some(note);
                    } else {
                        self.tracks[track].active_notes[i] = None;
                    }
                } else {
                    self.tracks[track].active_notes[i] = Some(note);
                }
                continue;
            }

            note.tick_len -= 1;
            if note.tick_len <= 0 {
                if arp_enabled {
                    self.arp.track(track).handle_input(HeldNoteEvent::NoteOff(note.note));
                } else {
                    self.emit_note_off(track, &note, sink);
                }
                self.tracks[track].active_notes[i] = None;
            } else {
                self.tracks[track].active_notes[i] = Some(note);
            }
        }
    }

    fn advance_step(&mut self, track: usize) {
        let t = &self.song.scene(self.scene_current).tracks[track];
        let motion_start = t.motion_start as i32;
        let motion_len = t.motion_length as i32;
        let change = if t.motion_dir == MotionDirection::Reverse { -1 } else { 1 };
        let pos = self.tracks[track].step_pos as i32;
        let total = STEP_COUNT as i32;

        let new_pos = (pos + change).rem_euclid(total);
        let offset = (new_pos - motion_start).rem_euclid(total);
        self.tracks[track].step_pos = if offset >= motion_len {
            if change > 0 {
                motion_start as usize
            } else {
                ((motion_start + motion_len - 1).rem_euclid(total)) as usize
            }
        } else {
            new_pos as usize
        };
    }

    pub fn stop_all_notes(&mut self, track: usize, sink: &mut impl EngineSink) {
        for i in 0..ACTIVE_NOTE_POOL {
            if let Some(note) = self.tracks[track].active_notes[i].take() {
                self.emit_note_off(track, &note, sink);
            }
        }
        self.out.stop_all_notes(track);
    }
}

struct OutProcPitch;
impl OutProcPitch {
    fn resolve(track_type: TrackType, pitch: u8, transpose: i8, kbtrans: i8, bias: i8) -> Option<u8> {
        crate::outproc::OutProc::apply_transpose(track_type, pitch, transpose, kbtrans, bias)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::FixedSequence;
    use crate::song::Step;

    struct RecordingSink {
        messages: Vec<Message, 64>,
    }

    impl RecordingSink {
        fn new() -> Self {
            RecordingSink { messages: Vec::new() }
        }
    }

    impl EngineSink for RecordingSink {
        fn send(&mut self, msg: Message) {
            let _ = self.messages.push(msg);
        }
    }

    #[test]
    fn a_populated_step_emits_note_on_at_divider_zero() {
        let mut song = Song::default();
        {
            let scene = song.scene_mut(0);
            scene.tracks[0].motion_length = 4;
            let mut step = Step::default();
            step.add_note(60, 100, 24);
            scene.tracks[0].steps[0] = step;
        }
        let mut engine = Engine::new(song);
        engine.set_run_state(true);
        engine.reset_all_track_positions();
        let mut sink = RecordingSink::new();
        let mut rng = FixedSequence::new(&[0]);
        engine.run_tick(0, false, &mut sink, &mut rng);
        assert!(sink.messages.iter().any(|m| m.status & 0xF0 == 0x90 && m.data0 == 60));
    }

    #[test]
    fn note_off_fires_when_gated_length_elapses() {
        let mut song = Song::default();
        {
            let scene = song.scene_mut(0);
            scene.tracks[0].motion_length = 4;
            scene.tracks[0].gate_time = 128; // 100%
            let mut step = Step::default();
            step.add_note(60, 100, 2);
            scene.tracks[0].steps[0] = step;
        }
        let mut engine = Engine::new(song);
        engine.set_run_state(true);
        engine.reset_all_track_positions();
        let mut sink = RecordingSink::new();
        let mut rng = FixedSequence::new(&[0]);
        for tick in 0..3 {
            engine.run_tick(tick, false, &mut sink, &mut rng);
        }
        assert!(sink.messages.iter().any(|m| m.status & 0xF0 == 0x80 && m.data0 == 60));
    }

    #[test]
    fn ratchet_splits_a_step_into_n_note_pairs() {
        let mut song = Song::default();
        {
            let scene = song.scene_mut(0);
            scene.tracks[0].motion_length = 4;
            let mut step = Step::default();
            step.add_note(60, 100, 8);
            step.ratchet_count = 4;
            scene.tracks[0].steps[0] = step;
        }
        let mut engine = Engine::new(song);
        engine.set_run_state(true);
        engine.reset_all_track_positions();
        let mut sink = RecordingSink::new();
        let mut rng = FixedSequence::new(&[0]);
        for tick in 0..8 {
            engine.run_tick(tick, false, &mut sink, &mut rng);
        }
        let note_ons = sink.messages.iter().filter(|m| m.status & 0xF0 == 0x90 && m.data0 == 60).count();
        assert_eq!(note_ons, 4);
    }

    #[test]
    fn start_delay_holds_the_note_on_until_countdown_elapses() {
        let mut song = Song::default();
        {
            let scene = song.scene_mut(0);
            scene.tracks[0].motion_length = 4;
            let mut step = Step::default();
            step.add_note(60, 100, 12);
            step.start_delay = 3;
            scene.tracks[0].steps[0] = step;
        }
        let mut engine = Engine::new(song);
        engine.set_run_state(true);
        engine.reset_all_track_positions();
        let mut sink = RecordingSink::new();
        let mut rng = FixedSequence::new(&[0]);
        engine.run_tick(0, false, &mut sink, &mut rng);
        assert!(!sink.messages.iter().any(|m| m.status & 0xF0 == 0x90));
        for tick in 1..4 {
            engine.run_tick(tick, false, &mut sink, &mut rng);
        }
        assert!(sink.messages.iter().any(|m| m.status & 0xF0 == 0x90 && m.data0 == 60));
    }

    #[test]
    fn drum_track_ignores_kbtrans_but_receives_bias() {
        assert_eq!(
            crate::outproc::OutProc::apply_transpose(TrackType::Drum, 60, 0, 12, 2),
            Some(62)
        );
    }

    #[test]
    fn motion_wraps_within_start_and_length() {
        let mut song = Song::default();
        song.scene_mut(0).tracks[0].motion_start = 2;
        song.scene_mut(0).tracks[0].motion_length = 3;
        let mut engine = Engine::new(song);
        engine.reset_all_track_positions();
        engine.tracks[0].step_pos = 4; // last step in range (2,3,4)
        engine.advance_step(0);
        assert_eq!(engine.tracks[0].step_pos, 2);
    }

    #[test]
    fn pool_exhaustion_preempts_the_shortest_remaining_note() {
        let song = Song::default();
        let mut engine = Engine::new(song);
        engine.set_run_state(true);
        engine.reset_all_track_positions();
        let mut sink = RecordingSink::new();
        let mut rng = FixedSequence::new(&[0]);
        let _ = &mut rng;
        // fill the pool manually with long notes, then start one more
        for i in 0..ACTIVE_NOTE_POOL {
            engine.tracks[0].active_notes[i] = Some(ActiveNote {
                note: 40 + i as u8,
                velocity: 100,
                tick_len: 100 + i as i32,
                start_delay_countdown: 0,
                ratchet_note_count: 1,
                ratchet_note_countdown: 0,
                ratchet_note_length: 0,
                ratchet_note_length_countdown: 0,
                ratchet_gate_length: 0,
                ratchet_gate_length_countdown: 0,
            });
        }
        engine.start_note(0, 90, 120, 12, 0, 1, 128, &mut sink);
        assert!(sink.messages.iter().any(|m| m.status & 0xF0 == 0x80 && m.data0 == 40));
        assert!(sink.messages.iter().any(|m| m.status & 0xF0 == 0x90 && m.data0 == 90));
    }

    #[test]
    fn immediate_scene_sync_switches_on_the_very_next_tick() {
        let mut song = Song::default();
        song.scene_sync = SceneSync::Immediate;
        let mut engine = Engine::new(song);
        engine.set_run_state(true);
        engine.reset_all_track_positions();
        let mut sink = RecordingSink::new();
        let mut rng = FixedSequence::new(&[0]);
        engine.run_tick(0, false, &mut sink, &mut rng);
        engine.request_scene(1);
        assert_eq!(engine.scene_current, 0);
        engine.run_tick(1, false, &mut sink, &mut rng);
        assert_eq!(engine.scene_current, 1);
    }

    #[test]
    fn beat_scene_sync_waits_for_a_beat_crossing() {
        let mut song = Song::default();
        song.scene_sync = SceneSync::Beat;
        let mut engine = Engine::new(song);
        engine.set_run_state(true);
        engine.reset_all_track_positions();
        let mut sink = RecordingSink::new();
        let mut rng = FixedSequence::new(&[0]);
        engine.run_tick(0, false, &mut sink, &mut rng);
        engine.request_scene(1);
        engine.run_tick(1, false, &mut sink, &mut rng);
        assert_eq!(engine.scene_current, 0); // no beat crossing yet
        engine.run_tick(2, true, &mut sink, &mut rng);
        assert_eq!(engine.scene_current, 1);
    }

    #[test]
    fn track1_scene_sync_waits_for_track_one_to_return_to_its_motion_start() {
        let mut song = Song::default();
        song.scene_sync = SceneSync::Track1;
        song.scene_mut(0).tracks[0].motion_start = 0;
        song.scene_mut(0).tracks[0].motion_length = 2;
        let mut engine = Engine::new(song);
        engine.set_run_state(true);
        engine.reset_all_track_positions();
        let mut sink = RecordingSink::new();
        let mut rng = FixedSequence::new(&[0]);
        engine.run_tick(0, false, &mut sink, &mut rng); // track 0 at motion_start, divider 0
        engine.request_scene(1);
        // track 0 advances away from motion_start on this tick's step-size boundary
        engine.run_tick(1, false, &mut sink, &mut rng);
        assert_eq!(engine.scene_current, 0);
        // enough ticks for track 0 to wrap back to motion_start
        let step_ticks = engine.step_size_ticks(0);
        for t in 2..(2 + step_ticks * 2) {
            engine.run_tick(t, false, &mut sink, &mut rng);
        }
        assert_eq!(engine.scene_current, 1);
    }

    #[test]
    fn arp_note_routes_through_the_track_output_map_not_a_fixed_channel() {
        let mut song = Song::default();
        song.scene_mut(0).tracks[0].midi_channel = 5;
        song.scene_mut(0).tracks[0].arp_enable = true;
        song.scene_mut(0).tracks[0].motion_length = 4;
        let mut step = Step::default();
        step.add_note(60, 100, 8);
        song.scene_mut(0).tracks[0].steps[0] = step;
        let mut engine = Engine::new(song);
        engine.set_run_state(true);
        engine.reset_all_track_positions();
        let mut sink = RecordingSink::new();
        let mut rng = FixedSequence::new(&[0]);
        engine.arp.track(0).set_enable(true, 0, &mut sink);
        engine.arp.track(0).set_seq_enable(false);
        engine.arp.track(0).set_speed_ticks(1);
        engine.run_tick(0, false, &mut sink, &mut rng);
        assert!(sink.messages.iter().any(|m| m.status & 0xF0 == 0x90 && (m.status & 0x0F) == 5));
    }

    #[test]
    fn live_note_is_ignored_when_no_live_routing_condition_holds() {
        let song = Song::default();
        let mut engine = Engine::new(song);
        engine.set_track_select(0, true);
        let mut sink = RecordingSink::new();
        engine.handle_live_note_on(60, 100, &mut sink);
        assert!(sink.messages.is_empty());
    }

    #[test]
    fn live_note_on_passes_through_out_proc_when_live_mode_is_on() {
        let mut song = Song::default();
        song.scene_mut(0).tracks[0].midi_channel = 3;
        let mut engine = Engine::new(song);
        engine.reset_all_track_positions();
        engine.set_track_select(0, true);
        engine.set_live_mode(true);
        let mut sink = RecordingSink::new();
        engine.handle_live_note_on(60, 100, &mut sink);
        assert!(sink.messages.iter().any(|m| m.status & 0xF0 == 0x90 && (m.status & 0x0F) == 3 && m.data0 == 60));
    }

    #[test]
    fn live_note_on_an_unselected_track_is_not_routed() {
        let song = Song::default();
        let mut engine = Engine::new(song);
        engine.set_live_mode(true);
        let mut sink = RecordingSink::new();
        engine.handle_live_note_on(60, 100, &mut sink);
        assert!(sink.messages.is_empty());
    }

    #[test]
    fn live_note_goes_to_the_arp_instead_of_out_proc_when_track_arp_is_on() {
        let mut song = Song::default();
        song.scene_mut(0).tracks[0].arp_enable = true;
        let mut engine = Engine::new(song);
        engine.set_track_select(0, true);
        engine.set_live_mode(true);
        let mut sink = RecordingSink::new();
        engine.handle_live_note_on(60, 100, &mut sink);
        // no immediate out-proc message: the arp only emits from its own run_tick dispatch
        assert!(sink.messages.is_empty());
        assert_eq!(engine.arp.track(0).held_note_count(), 1);
    }

    #[test]
    fn autolive_routes_live_input_even_with_live_mode_off() {
        let song = Song::default();
        let mut engine = Engine::new(song);
        engine.set_track_select(0, true);
        engine.set_autolive(true);
        let mut sink = RecordingSink::new();
        engine.handle_live_note_on(60, 100, &mut sink);
        assert!(sink.messages.iter().any(|m| m.status & 0xF0 == 0x90));
    }

    #[test]
    fn record_armed_routes_live_input() {
        let song = Song::default();
        let mut engine = Engine::new(song);
        engine.set_track_select(0, true);
        engine.set_record_state(RecordState::Armed);
        let mut sink = RecordingSink::new();
        engine.handle_live_note_on(60, 100, &mut sink);
        assert!(sink.messages.iter().any(|m| m.status & 0xF0 == 0x90));
    }

    #[test]
    fn step_edit_routes_live_input_only_while_stopped() {
        let song = Song::default();
        let mut engine = Engine::new(song);
        engine.set_track_select(0, true);
        engine.set_step_edit_enable(true);

        let mut sink = RecordingSink::new();
        engine.handle_live_note_on(60, 100, &mut sink);
        assert!(sink.messages.iter().any(|m| m.status & 0xF0 == 0x90));

        engine.set_run_state(true);
        let mut sink = RecordingSink::new();
        engine.handle_live_note_on(61, 100, &mut sink);
        assert!(sink.messages.is_empty());
    }
}
