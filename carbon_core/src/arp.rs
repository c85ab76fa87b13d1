//! The arpeggiator: per-track held-note tracking and a small bytecode VM that
//! walks a [`stored program`](crate::arp_progs) to decide which notes to
//! play and when to wait for the next step.
//!
//! Grounded on `arp.c`: `arp_run` (per-tick dispatch, freerun vs sequencer
//! sync dividers), `arp_execute_step` (the VM's fetch/decode/execute loop,
//! bounded by `ARP_MAX_LOOP_COUNT`), and the `arp_find_*_note` family. The
//! reference source's interpreter is missing bodies for the
//! `FIND_OLDEST/NEWEST/OLDER/NEWER_NOTE` opcodes even though `arp_progs.c`'s
//! `arp_progs_generate_note_order` emits them; here they walk the same
//! snapshot array in array (insertion) order rather than pitch order, which
//! is the order `arp_handle_input` already builds it in.

use crate::arp_progs::{self, ArpType, Instruction, Opcode, Program, REG_NOTE_OFFSET};
use crate::config::{ARP_MAX_HELD_NOTES, ARP_MAX_LOOP_COUNT, ARP_MAX_PLAYING_NOTES, ARP_NUM_REGS, TRACK_COUNT};
use crate::error::CarbonError;
use crate::random::RandomSource;

/// A note-on/note-off event fed into the arp's held-note tracker. Decoupled
/// from [`crate::message::Message`] so the VM doesn't need a MIDI dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeldNoteEvent {
    NoteOn(u8, u8),
    NoteOff(u8),
}

/// Notified when the arp starts or stops a generated note.
pub trait ArpSink {
    fn arp_note_on(&mut self, track: usize, note: u8, velocity: u8);
    fn arp_note_off(&mut self, track: usize, note: u8);
}

fn new_slots<const N: usize>() -> heapless::Vec<Option<u8>, N> {
    let mut v = heapless::Vec::new();
    for _ in 0..N {
        let _ = v.push(None);
    }
    v
}

pub struct Arp {
    seq_enable: bool,
    arp_enable: bool,
    ty: ArpType,
    gate_time_ticks: i32,
    step_size_ticks: i32,

    held_notes: heapless::Vec<Option<u8>, ARP_MAX_HELD_NOTES>,
    held_velocity: u8,
    held_note_count: usize,
    snapshot_notes: heapless::Vec<Option<u8>, ARP_MAX_HELD_NOTES>,

    playing_notes: heapless::Vec<Option<u8>, ARP_MAX_PLAYING_NOTES>,
    playing_note_count: usize,
    play_note_timeout: i32,

    seq_clock_count: i32,
    freerun_clock_count: i32,

    program: Program,
    pc: usize,
    x: i32,
    regs: [i32; ARP_NUM_REGS],
    note_offset: i32,
    last_error: Option<CarbonError>,
}

impl Arp {
    pub fn new() -> Self {
        let mut arp = Arp {
            seq_enable: false,
            arp_enable: false,
            ty: ArpType::Up1,
            gate_time_ticks: 1,
            step_size_ticks: 6,
            held_notes: new_slots(),
            held_velocity: 0,
            held_note_count: 0,
            snapshot_notes: new_slots(),
            playing_notes: new_slots(),
            playing_note_count: 0,
            play_note_timeout: 0,
            seq_clock_count: 0,
            freerun_clock_count: 0,
            program: Program::new(),
            pc: 0,
            x: 0,
            regs: [0; ARP_NUM_REGS],
            note_offset: 0,
            last_error: None,
        };
        arp.program = arp_progs::generate(arp.ty);
        arp
    }

    pub fn set_type(&mut self, ty: ArpType) {
        self.ty = ty;
        self.reset_program();
        self.program = arp_progs::generate(ty);
    }

    pub fn arp_type(&self) -> ArpType {
        self.ty
    }

    pub fn set_speed_ticks(&mut self, ticks: i32) {
        self.step_size_ticks = ticks.max(1);
    }

    pub fn set_gate_time_ticks(&mut self, ticks: i32) {
        self.gate_time_ticks = ticks.max(1);
    }

    pub fn is_enabled(&self) -> bool {
        self.arp_enable
    }

    /// Number of notes currently held down, per the held-note tracker fed by
    /// [`Arp::handle_input`].
    pub fn held_note_count(&self) -> usize {
        self.held_note_count
    }

    pub fn set_seq_enable(&mut self, enable: bool) {
        self.seq_enable = enable;
    }

    pub fn set_enable(&mut self, enable: bool, track: usize, sink: &mut impl ArpSink) {
        if enable {
            self.clear_input(track, sink);
            self.reset_program();
            self.arp_enable = true;
        } else {
            self.clear_input(track, sink);
            self.stop_all_notes(track, sink);
            self.arp_enable = false;
        }
    }

    pub fn handle_input(&mut self, event: HeldNoteEvent) {
        match event {
            HeldNoteEvent::NoteOff(note) => {
                if let Some(slot) = self.held_notes.iter_mut().find(|s| **s == Some(note)) {
                    *slot = None;
                    self.held_note_count = self.held_note_count.saturating_sub(1);
                }
            }
            HeldNoteEvent::NoteOn(note, velocity) => {
                if let Some(slot) = self.held_notes.iter_mut().find(|s| s.is_none()) {
                    *slot = Some(note);
                    if self.held_note_count == 0 {
                        self.held_velocity = velocity;
                    }
                    self.held_note_count += 1;
                }
                if self.held_note_count == 1 {
                    self.freerun_clock_count = 0;
                }
            }
        }
    }

    pub fn clear_input(&mut self, track: usize, sink: &mut impl ArpSink) {
        for slot in self.held_notes.iter_mut() {
            *slot = None;
        }
        self.held_note_count = 0;
        self.stop_all_notes(track, sink);
    }

    fn reset_program(&mut self) {
        self.pc = 0;
        self.x = 0;
        self.note_offset = 0;
        self.regs = [0; ARP_NUM_REGS];
        for slot in self.snapshot_notes.iter_mut() {
            *slot = None;
        }
    }

    /// Abandon the current program run: logs, records the halt reason so a
    /// caller can poll it, and resets back to instruction zero.
    fn halt(&mut self) {
        log::warn!("arp program halted, resetting");
        self.last_error = Some(CarbonError::ArpProgramHalt);
        self.reset_program();
    }

    /// The most recent halt reason, if the program has ever aborted a run.
    pub fn last_error(&self) -> Option<CarbonError> {
        self.last_error
    }

    /// Advance by one clock tick. Mirrors the per-track body of `arp_run`.
    pub fn run_tick(
        &mut self,
        tick_count: u32,
        track: usize,
        sink: &mut impl ArpSink,
        rng: &mut impl RandomSource,
    ) {
        if tick_count == 0 {
            self.seq_clock_count = 0;
        }

        if self.arp_enable {
            let at_step = if self.seq_enable {
                self.seq_clock_count == 0
            } else {
                self.freerun_clock_count == 0
            };

            if at_step {
                if self.held_note_count == 0 {
                    if self.playing_note_count > 0 {
                        self.stop_all_notes(track, sink);
                    }
                    self.reset_program();
                } else {
                    self.execute_step(track, sink, rng);
                }
            } else {
                self.timeout_notes(track, sink);
            }
        }

        if self.seq_enable {
            self.seq_clock_count += 1;
            if self.seq_clock_count >= self.step_size_ticks {
                self.seq_clock_count = 0;
            }
        } else {
            self.freerun_clock_count += 1;
            if self.freerun_clock_count >= self.step_size_ticks {
                self.freerun_clock_count = 0;
            }
        }
    }

    fn execute_step(&mut self, track: usize, sink: &mut impl ArpSink, rng: &mut impl RandomSource) {
        let mut loop_count = 0;
        while loop_count < ARP_MAX_LOOP_COUNT {
            if self.pc >= self.program.len() {
                self.reset_program();
                return;
            }
            let Instruction { op, arg } = self.program[self.pc];

            match op {
                Opcode::Nop | Opcode::Label => {}
                Opcode::Snapshot => self.take_snapshot(),
                Opcode::FindLowestNote => {
                    if !self.resolve_find(Self::find_lowest_note, arg) {
                        return;
                    }
                }
                Opcode::FindHighestNote => {
                    if !self.resolve_find(Self::find_highest_note, arg) {
                        return;
                    }
                }
                Opcode::FindLowerNote => {
                    let x = self.x;
                    if !self.resolve_find(move |s| s.find_lower_note(x), arg) {
                        return;
                    }
                }
                Opcode::FindHigherNote => {
                    let x = self.x;
                    if !self.resolve_find(move |s| s.find_higher_note(x), arg) {
                        return;
                    }
                }
                Opcode::FindOldestNote => {
                    if !self.resolve_find(Self::find_oldest_note, arg) {
                        return;
                    }
                }
                Opcode::FindNewestNote => {
                    if !self.resolve_find(Self::find_newest_note, arg) {
                        return;
                    }
                }
                Opcode::FindOlderNote => {
                    let x = self.x;
                    if !self.resolve_find(move |s| s.find_older_note(x), arg) {
                        return;
                    }
                }
                Opcode::FindNewerNote => {
                    let x = self.x;
                    if !self.resolve_find(move |s| s.find_newer_note(x), arg) {
                        return;
                    }
                }
                Opcode::FindRandomNote => {
                    let note = self.find_random_note(rng);
                    if !self.resolve_find(move |_| note, arg) {
                        return;
                    }
                }
                Opcode::PlayNote => {
                    let note = self.x + self.note_offset;
                    self.start_note(note, track, sink);
                }
                Opcode::Wait => {
                    self.pc += 1;
                    return;
                }
                Opcode::PlayNoteAndWait => {
                    self.stop_all_notes(track, sink);
                    let note = self.x + self.note_offset;
                    self.start_note(note, track, sink);
                    self.pc += 1;
                    return;
                }
                Opcode::Jump => {
                    match self.find_label(arg) {
                        Some(target) => self.pc = target,
                        None => {
                            self.halt();
                            return;
                        }
                    }
                }
                Opcode::Loadl => self.x = arg,
                Opcode::Loadf => {
                    if arg == REG_NOTE_OFFSET {
                        self.x = self.note_offset;
                    } else if let Some(r) = self.reg_index(arg) {
                        self.x = self.regs[r];
                    }
                }
                Opcode::Storef => {
                    if arg == REG_NOTE_OFFSET {
                        self.note_offset = self.x;
                    } else if let Some(r) = self.reg_index(arg) {
                        self.regs[r] = self.x;
                    }
                }
                Opcode::Addl => self.x += arg,
                Opcode::Subl => self.x -= arg,
                Opcode::Mull => self.x *= arg,
                Opcode::Addf => {
                    if let Some(r) = self.reg_index(arg) {
                        self.x += self.regs[r];
                    }
                }
                Opcode::Subf => {
                    if let Some(r) = self.reg_index(arg) {
                        self.x -= self.regs[r];
                    }
                }
                Opcode::Mulf => {
                    if let Some(r) = self.reg_index(arg) {
                        self.x *= self.regs[r];
                    }
                }
                Opcode::Jz => {
                    if self.x == 0 {
                        match self.find_label(arg) {
                            Some(target) => self.pc = target,
                            None => {
                                self.halt();
                                return;
                            }
                        }
                    }
                }
                Opcode::Rand => {
                    self.x = rng.random_below(arg.max(0) as u32) as i32;
                }
            }

            self.pc += 1;
            if self.pc >= self.program.capacity() {
                self.reset_program();
                return;
            }
            loop_count += 1;
        }
        self.halt();
    }

    /// Runs a find-note closure; on a miss, jumps to the label named by
    /// `label_arg` (resetting the program if that label doesn't exist).
    /// Returns `false` when execution should stop this tick (program reset).
    fn resolve_find(&mut self, find: impl FnOnce(&Self) -> Option<u8>, label_arg: i32) -> bool {
        match find(self) {
            Some(note) => {
                self.x = note as i32;
                true
            }
            None => match self.find_label(label_arg) {
                Some(target) => {
                    self.pc = target;
                    true
                }
                None => {
                    self.halt();
                    false
                }
            },
        }
    }

    fn reg_index(&self, arg: i32) -> Option<usize> {
        if arg >= 0 && (arg as usize) < ARP_NUM_REGS {
            Some(arg as usize)
        } else {
            None
        }
    }

    fn find_label(&self, label: i32) -> Option<usize> {
        self.program
            .iter()
            .position(|ins| ins.op == Opcode::Label && ins.arg == label)
    }

    fn take_snapshot(&mut self) {
        for (dst, src) in self.snapshot_notes.iter_mut().zip(self.held_notes.iter()) {
            *dst = *src;
        }
    }

    fn find_lowest_note(&self) -> Option<u8> {
        if self.held_note_count == 0 {
            return None;
        }
        self.snapshot_notes.iter().flatten().copied().min()
    }

    fn find_highest_note(&self) -> Option<u8> {
        if self.held_note_count == 0 {
            return None;
        }
        self.snapshot_notes.iter().flatten().copied().max()
    }

    fn find_lower_note(&self, note: i32) -> Option<u8> {
        if self.held_note_count == 0 {
            return None;
        }
        self.snapshot_notes
            .iter()
            .flatten()
            .copied()
            .filter(|&n| (n as i32) < note)
            .max()
    }

    fn find_higher_note(&self, note: i32) -> Option<u8> {
        if self.held_note_count == 0 {
            return None;
        }
        self.snapshot_notes
            .iter()
            .flatten()
            .copied()
            .filter(|&n| (n as i32) > note)
            .min()
    }

    fn find_random_note(&self, rng: &mut impl RandomSource) -> Option<u8> {
        if self.held_note_count == 0 {
            return None;
        }
        let notes: heapless::Vec<u8, ARP_MAX_HELD_NOTES> = self.snapshot_notes.iter().flatten().copied().collect();
        if notes.is_empty() {
            return None;
        }
        let idx = rng.random_below(notes.len() as u32) as usize;
        Some(notes[idx])
    }

    fn find_oldest_note(&self) -> Option<u8> {
        if self.held_note_count == 0 {
            return None;
        }
        self.snapshot_notes.iter().flatten().next().copied()
    }

    fn find_newest_note(&self) -> Option<u8> {
        if self.held_note_count == 0 {
            return None;
        }
        self.snapshot_notes.iter().flatten().last().copied()
    }

    fn find_older_note(&self, note: i32) -> Option<u8> {
        if self.held_note_count == 0 {
            return None;
        }
        let note = note as u8;
        let idx = self.snapshot_notes.iter().position(|s| *s == Some(note))?;
        self.snapshot_notes[..idx].iter().rev().flatten().next().copied()
    }

    fn find_newer_note(&self, note: i32) -> Option<u8> {
        if self.held_note_count == 0 {
            return None;
        }
        let note = note as u8;
        let idx = self.snapshot_notes.iter().position(|s| *s == Some(note))?;
        self.snapshot_notes[idx + 1..].iter().flatten().next().copied()
    }

    fn start_note(&mut self, note: i32, track: usize, sink: &mut impl ArpSink) {
        if !(0..=127).contains(&note) {
            return;
        }
        let note = note as u8;
        if let Some(slot) = self.playing_notes.iter_mut().find(|s| s.is_none()) {
            sink.arp_note_on(track, note, self.held_velocity);
            *slot = Some(note);
            self.playing_note_count += 1;
            self.play_note_timeout = self.gate_time_ticks;
        }
    }

    fn stop_all_notes(&mut self, track: usize, sink: &mut impl ArpSink) {
        for slot in self.playing_notes.iter_mut() {
            if let Some(note) = slot.take() {
                sink.arp_note_off(track, note);
                self.playing_note_count = self.playing_note_count.saturating_sub(1);
            }
        }
        self.play_note_timeout = 0;
    }

    fn timeout_notes(&mut self, track: usize, sink: &mut impl ArpSink) {
        if self.play_note_timeout > 0 {
            self.play_note_timeout -= 1;
            if self.play_note_timeout == 0 {
                self.stop_all_notes(track, sink);
            }
        }
    }
}

impl Default for Arp {
    fn default() -> Self {
        Self::new()
    }
}

/// All tracks' arpeggiators, driven together from the clock. Grounded on
/// `astate[SEQ_NUM_TRACKS]` and the free functions that index into it.
pub struct ArpBank {
    tracks: [Arp; TRACK_COUNT],
}

impl ArpBank {
    pub fn new() -> Self {
        ArpBank { tracks: core::array::from_fn(|_| Arp::new()) }
    }

    pub fn track(&mut self, track: usize) -> &mut Arp {
        &mut self.tracks[track]
    }

    pub fn run(&mut self, tick_count: u32, sink: &mut impl ArpSink, rng: &mut impl RandomSource) {
        for (i, arp) in self.tracks.iter_mut().enumerate() {
            arp.run_tick(tick_count, i, sink, rng);
        }
    }

    pub fn set_seq_enable(&mut self, enable: bool) {
        for arp in self.tracks.iter_mut() {
            arp.set_seq_enable(enable);
        }
    }
}

impl Default for ArpBank {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::FixedSequence;

    struct RecordingSink {
        on: heapless::Vec<(usize, u8), 32>,
        off: heapless::Vec<(usize, u8), 32>,
    }

    impl RecordingSink {
        fn new() -> Self {
            RecordingSink { on: heapless::Vec::new(), off: heapless::Vec::new() }
        }
    }

    impl ArpSink for RecordingSink {
        fn arp_note_on(&mut self, track: usize, note: u8, _velocity: u8) {
            let _ = self.on.push((track, note));
        }
        fn arp_note_off(&mut self, track: usize, note: u8) {
            let _ = self.off.push((track, note));
        }
    }

    #[test]
    fn up1_plays_held_notes_in_ascending_order() {
        let mut arp = Arp::new();
        let mut sink = RecordingSink::new();
        let mut rng = FixedSequence::new(&[0]);
        arp.set_type(ArpType::Up1);
        arp.set_enable(true, 0, &mut sink);
        arp.set_seq_enable(false);
        arp.set_speed_ticks(4);
        arp.handle_input(HeldNoteEvent::NoteOn(64, 100));
        arp.handle_input(HeldNoteEvent::NoteOn(60, 100));
        arp.handle_input(HeldNoteEvent::NoteOn(67, 100));

        for tick in 0..16u32 {
            arp.run_tick(tick, 0, &mut sink, &mut rng);
        }

        let played: heapless::Vec<u8, 32> = sink.on.iter().map(|(_, n)| *n).collect();
        assert_eq!(&played[..3], &[60, 64, 67]);
    }

    #[test]
    fn releasing_all_notes_stops_playing_notes() {
        let mut arp = Arp::new();
        let mut sink = RecordingSink::new();
        let mut rng = FixedSequence::new(&[0]);
        arp.set_type(ArpType::Up1);
        arp.set_enable(true, 0, &mut sink);
        arp.set_seq_enable(false);
        arp.set_speed_ticks(4);
        arp.handle_input(HeldNoteEvent::NoteOn(60, 100));
        for tick in 0..4u32 {
            arp.run_tick(tick, 0, &mut sink, &mut rng);
        }
        assert!(!sink.on.is_empty());
        arp.handle_input(HeldNoteEvent::NoteOff(60));
        for tick in 4..8u32 {
            arp.run_tick(tick, 0, &mut sink, &mut rng);
        }
        assert_eq!(sink.on.len(), sink.off.len());
    }

    #[test]
    fn note_order_program_follows_insertion_sequence_not_pitch() {
        let mut arp = Arp::new();
        let mut sink = RecordingSink::new();
        let mut rng = FixedSequence::new(&[0]);
        arp.set_type(ArpType::NoteOrder1);
        arp.set_enable(true, 0, &mut sink);
        arp.set_seq_enable(false);
        arp.set_speed_ticks(4);
        arp.handle_input(HeldNoteEvent::NoteOn(67, 100));
        arp.handle_input(HeldNoteEvent::NoteOn(60, 100));
        arp.handle_input(HeldNoteEvent::NoteOn(64, 100));

        for tick in 0..16u32 {
            arp.run_tick(tick, 0, &mut sink, &mut rng);
        }
        let played: heapless::Vec<u8, 32> = sink.on.iter().map(|(_, n)| *n).collect();
        assert_eq!(&played[..3], &[67, 60, 64]);
    }

    #[test]
    fn a_program_that_halts_on_a_missing_label_resets_cleanly() {
        // hand-craft a tiny broken program: JUMP to a label that doesn't exist
        let mut arp = Arp::new();
        arp.program = Program::new();
        let _ = arp.program.push(Instruction { op: Opcode::Jump, arg: 99 });
        let mut sink = RecordingSink::new();
        let mut rng = FixedSequence::new(&[0]);
        arp.arp_enable = true;
        arp.handle_input(HeldNoteEvent::NoteOn(60, 100));
        arp.execute_step(0, &mut sink, &mut rng);
        assert_eq!(arp.pc, 0);
        assert_eq!(arp.x, 0);
        assert_eq!(arp.last_error(), Some(CarbonError::ArpProgramHalt));
    }

    #[test]
    fn a_program_that_loops_forever_halts_after_the_loop_bound() {
        // label 0 followed by an unconditional jump back to it: never
        // reaches end-of-program or a missing label, only the loop bound.
        let mut arp = Arp::new();
        arp.program = Program::new();
        let _ = arp.program.push(Instruction { op: Opcode::Label, arg: 0 });
        let _ = arp.program.push(Instruction { op: Opcode::Jump, arg: 0 });
        let mut sink = RecordingSink::new();
        let mut rng = FixedSequence::new(&[0]);
        arp.arp_enable = true;
        arp.handle_input(HeldNoteEvent::NoteOn(60, 100));
        arp.execute_step(0, &mut sink, &mut rng);
        assert_eq!(arp.pc, 0);
        assert_eq!(arp.last_error(), Some(CarbonError::ArpProgramHalt));
    }
}
