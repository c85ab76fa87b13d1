//! Stored arpeggiator programs: a bytecode assembler and the 36 program
//! generators (`UP`, `DOWN`, `UP/DOWN`, `RANDOM`, `ORDER`, `UP/DOWN NR`,
//! `REPEAT`, `UP (LOW)`, `DOWN (HIGH)`, each across 1-4 octaves where that
//! applies), grounded on `arp_progs.c`'s `arp_progs_generate_*` family.

use heapless::Vec;

use crate::config::ARP_PROG_MAX_LEN;

/// Register holding the cumulative note-offset a program applies to notes it
/// plays; aliases into the VM's ordinary register file at a fixed slot, as in
/// the reference firmware's `ARP_REG_NOTE_OFFSET`.
pub const REG_NOTE_OFFSET: i32 = 0x70;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    Nop,
    Snapshot,
    FindLowestNote,
    FindHighestNote,
    FindLowerNote,
    FindHigherNote,
    FindOldestNote,
    FindNewestNote,
    FindOlderNote,
    FindNewerNote,
    FindRandomNote,
    PlayNote,
    Wait,
    PlayNoteAndWait,
    Label,
    Jump,
    Loadl,
    Loadf,
    Storef,
    Addl,
    Subl,
    Mull,
    Addf,
    Subf,
    Mulf,
    Jz,
    Rand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub op: Opcode,
    pub arg: i32,
}

pub type Program = Vec<Instruction, ARP_PROG_MAX_LEN>;

/// Stored arp program identity, matching the reference firmware's closed
/// `arp type` enumeration exactly (order is significant: it is exposed to the
/// panel/MIDI-control layer as a program number).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ArpType {
    Up1,
    Up2,
    Up3,
    Up4,
    Down1,
    Down2,
    Down3,
    Down4,
    UpDown1,
    UpDown2,
    UpDown3,
    UpDown4,
    Random1,
    Random2,
    Random3,
    Random4,
    NoteOrder1,
    NoteOrder2,
    NoteOrder3,
    NoteOrder4,
    UpDown1Nr,
    UpDown2Nr,
    UpDown3Nr,
    UpDown4Nr,
    Repeat1_0,
    Repeat1_1,
    Repeat2_1,
    Repeat3_1,
    Repeat4_1,
    UpLow1,
    UpLow2,
    UpLow3,
    UpLow4,
    DownHigh1,
    DownHigh2,
    DownHigh3,
    DownHigh4,
}

pub const ARP_NUM_TYPES: usize = 37;

impl ArpType {
    pub const ALL: [ArpType; ARP_NUM_TYPES] = [
        ArpType::Up1,
        ArpType::Up2,
        ArpType::Up3,
        ArpType::Up4,
        ArpType::Down1,
        ArpType::Down2,
        ArpType::Down3,
        ArpType::Down4,
        ArpType::UpDown1,
        ArpType::UpDown2,
        ArpType::UpDown3,
        ArpType::UpDown4,
        ArpType::Random1,
        ArpType::Random2,
        ArpType::Random3,
        ArpType::Random4,
        ArpType::NoteOrder1,
        ArpType::NoteOrder2,
        ArpType::NoteOrder3,
        ArpType::NoteOrder4,
        ArpType::UpDown1Nr,
        ArpType::UpDown2Nr,
        ArpType::UpDown3Nr,
        ArpType::UpDown4Nr,
        ArpType::Repeat1_0,
        ArpType::Repeat1_1,
        ArpType::Repeat2_1,
        ArpType::Repeat3_1,
        ArpType::Repeat4_1,
        ArpType::UpLow1,
        ArpType::UpLow2,
        ArpType::UpLow3,
        ArpType::UpLow4,
        ArpType::DownHigh1,
        ArpType::DownHigh2,
        ArpType::DownHigh3,
        ArpType::DownHigh4,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    /// Human-readable name, as shown on the panel display. Grounded on
    /// `arp_type_to_name`.
    pub const fn name(self) -> &'static str {
        match self {
            ArpType::Up1 => "Up 1",
            ArpType::Up2 => "Up 2",
            ArpType::Up3 => "Up 3",
            ArpType::Up4 => "Up 4",
            ArpType::Down1 => "Down 1",
            ArpType::Down2 => "Down 2",
            ArpType::Down3 => "Down 3",
            ArpType::Down4 => "Down 4",
            ArpType::UpDown1 => "Up/Down 1",
            ArpType::UpDown2 => "Up/Down 2",
            ArpType::UpDown3 => "Up/Down 3",
            ArpType::UpDown4 => "Up/Down 4",
            ArpType::Random1 => "Random 1",
            ArpType::Random2 => "Random 2",
            ArpType::Random3 => "Random 3",
            ArpType::Random4 => "Random 4",
            ArpType::NoteOrder1 => "Order 1",
            ArpType::NoteOrder2 => "Order 2",
            ArpType::NoteOrder3 => "Order 3",
            ArpType::NoteOrder4 => "Order 4",
            ArpType::UpDown1Nr => "Up/Down 1 NR",
            ArpType::UpDown2Nr => "Up/Down 2 NR",
            ArpType::UpDown3Nr => "Up/Down 3 NR",
            ArpType::UpDown4Nr => "Up/Down 4 NR",
            ArpType::Repeat1_0 => "Repeat 1:0",
            ArpType::Repeat1_1 => "Repeat 1:1",
            ArpType::Repeat2_1 => "Repeat 2:1",
            ArpType::Repeat3_1 => "Repeat 3:1",
            ArpType::Repeat4_1 => "Repeat 4:1",
            ArpType::UpLow1 => "Up (Low) 1",
            ArpType::UpLow2 => "Up (Low) 2",
            ArpType::UpLow3 => "Up (Low) 3",
            ArpType::UpLow4 => "Up (Low) 4",
            ArpType::DownHigh1 => "Down (High) 1",
            ArpType::DownHigh2 => "Down (High) 2",
            ArpType::DownHigh3 => "Down (High) 3",
            ArpType::DownHigh4 => "Down (High) 4",
        }
    }
}

/// Assembles a [`Program`], mirroring `arp_progs_ai`'s append-only instruction
/// stream and the label-as-plain-integer convention of the C generators.
struct Asm {
    prog: Program,
}

impl Asm {
    fn new() -> Self {
        Asm { prog: Program::new() }
    }

    fn i(&mut self, op: Opcode, arg: i32) -> &mut Self {
        let _ = self.prog.push(Instruction { op, arg });
        self
    }

    fn label(&mut self, n: i32) -> &mut Self {
        self.i(Opcode::Label, n)
    }
}

fn generate_up(octaves: i32) -> Program {
    const INIT: i32 = 0;
    const START: i32 = 1;
    const UP_LOOP: i32 = 2;
    const TRANS: i32 = 3;
    const OCT_COUNT: i32 = 0;

    let mut a = Asm::new();
    a.label(INIT)
        .i(Opcode::Snapshot, 0)
        .i(Opcode::Loadl, 0)
        .i(Opcode::Storef, REG_NOTE_OFFSET)
        .i(Opcode::Loadl, octaves)
        .i(Opcode::Storef, OCT_COUNT)
        .label(START)
        .i(Opcode::FindLowestNote, INIT)
        .i(Opcode::PlayNoteAndWait, 0)
        .i(Opcode::Snapshot, 0)
        .label(UP_LOOP)
        .i(Opcode::FindHigherNote, TRANS)
        .i(Opcode::PlayNoteAndWait, 0)
        .i(Opcode::Jump, UP_LOOP)
        .label(TRANS)
        .i(Opcode::Loadf, OCT_COUNT)
        .i(Opcode::Subl, 1)
        .i(Opcode::Storef, OCT_COUNT)
        .i(Opcode::Jz, INIT)
        .i(Opcode::Loadf, REG_NOTE_OFFSET)
        .i(Opcode::Addl, 12)
        .i(Opcode::Storef, REG_NOTE_OFFSET)
        .i(Opcode::Jump, START);
    a.prog
}

fn generate_down(octaves: i32) -> Program {
    const INIT: i32 = 0;
    const START: i32 = 1;
    const DOWN_LOOP: i32 = 2;
    const TRANS: i32 = 3;
    const OCT_COUNT: i32 = 0;

    let mut a = Asm::new();
    a.label(INIT)
        .i(Opcode::Snapshot, 0)
        .i(Opcode::Loadl, octaves)
        .i(Opcode::Storef, OCT_COUNT)
        .i(Opcode::Subl, 1)
        .i(Opcode::Mull, 12)
        .i(Opcode::Storef, REG_NOTE_OFFSET)
        .label(START)
        .i(Opcode::FindHighestNote, INIT)
        .i(Opcode::PlayNoteAndWait, 0)
        .i(Opcode::Snapshot, 0)
        .label(DOWN_LOOP)
        .i(Opcode::FindLowerNote, TRANS)
        .i(Opcode::PlayNoteAndWait, 0)
        .i(Opcode::Jump, DOWN_LOOP)
        .label(TRANS)
        .i(Opcode::Loadf, OCT_COUNT)
        .i(Opcode::Subl, 1)
        .i(Opcode::Storef, OCT_COUNT)
        .i(Opcode::Jz, INIT)
        .i(Opcode::Loadf, REG_NOTE_OFFSET)
        .i(Opcode::Addl, -12)
        .i(Opcode::Storef, REG_NOTE_OFFSET)
        .i(Opcode::Jump, START);
    a.prog
}

fn generate_updown(octaves: i32) -> Program {
    const INIT_UP: i32 = 0;
    const START_UP: i32 = 1;
    const UP_LOOP: i32 = 2;
    const TRANS_UP: i32 = 3;
    const INIT_DOWN: i32 = 4;
    const START_DOWN: i32 = 5;
    const DOWN_LOOP: i32 = 6;
    const TRANS_DOWN: i32 = 7;
    const OCT_COUNT: i32 = 0;

    let mut a = Asm::new();
    a.label(INIT_UP)
        .i(Opcode::Snapshot, 0)
        .i(Opcode::Loadl, 0)
        .i(Opcode::Storef, REG_NOTE_OFFSET)
        .i(Opcode::Loadl, octaves)
        .i(Opcode::Storef, OCT_COUNT)
        .label(START_UP)
        .i(Opcode::FindLowestNote, INIT_UP)
        .i(Opcode::PlayNoteAndWait, 0)
        .i(Opcode::Snapshot, 0)
        .label(UP_LOOP)
        .i(Opcode::FindHigherNote, TRANS_UP)
        .i(Opcode::PlayNoteAndWait, 0)
        .i(Opcode::Jump, UP_LOOP)
        .label(TRANS_UP)
        .i(Opcode::Loadf, OCT_COUNT)
        .i(Opcode::Subl, 1)
        .i(Opcode::Storef, OCT_COUNT)
        .i(Opcode::Jz, INIT_DOWN)
        .i(Opcode::Loadf, REG_NOTE_OFFSET)
        .i(Opcode::Addl, 12)
        .i(Opcode::Storef, REG_NOTE_OFFSET)
        .i(Opcode::Jump, START_UP)
        .label(INIT_DOWN)
        .i(Opcode::Loadl, octaves)
        .i(Opcode::Storef, OCT_COUNT)
        .i(Opcode::Subl, 1)
        .i(Opcode::Mull, 12)
        .i(Opcode::Storef, REG_NOTE_OFFSET)
        .label(START_DOWN)
        .i(Opcode::FindHighestNote, INIT_UP)
        .i(Opcode::PlayNoteAndWait, 0)
        .label(DOWN_LOOP)
        .i(Opcode::FindLowerNote, TRANS_DOWN)
        .i(Opcode::PlayNoteAndWait, 0)
        .i(Opcode::Jump, DOWN_LOOP)
        .label(TRANS_DOWN)
        .i(Opcode::Loadf, OCT_COUNT)
        .i(Opcode::Subl, 1)
        .i(Opcode::Storef, OCT_COUNT)
        .i(Opcode::Jz, INIT_UP)
        .i(Opcode::Loadf, REG_NOTE_OFFSET)
        .i(Opcode::Addl, -12)
        .i(Opcode::Storef, REG_NOTE_OFFSET)
        .i(Opcode::Jump, START_DOWN);
    a.prog
}

fn generate_random(octaves: i32) -> Program {
    const INIT: i32 = 0;
    const TRANS: i32 = 0;

    let mut a = Asm::new();
    a.label(INIT).i(Opcode::Snapshot, 0);
    if octaves > 1 {
        a.i(Opcode::Rand, octaves).i(Opcode::Mull, 12).i(Opcode::Storef, TRANS);
    } else {
        a.i(Opcode::Loadl, 0).i(Opcode::Storef, TRANS);
    }
    a.i(Opcode::FindRandomNote, INIT)
        .i(Opcode::Addf, TRANS)
        .i(Opcode::PlayNoteAndWait, 0)
        .i(Opcode::Jump, INIT);
    a.prog
}

fn generate_note_order(octaves: i32) -> Program {
    const INIT: i32 = 0;
    const START: i32 = 1;
    const UP_LOOP: i32 = 2;
    const TRANS: i32 = 3;
    const OCT_COUNT: i32 = 0;

    let mut a = Asm::new();
    a.label(INIT)
        .i(Opcode::Snapshot, 0)
        .i(Opcode::Loadl, 0)
        .i(Opcode::Storef, REG_NOTE_OFFSET)
        .i(Opcode::Loadl, octaves)
        .i(Opcode::Storef, OCT_COUNT)
        .label(START)
        .i(Opcode::FindOldestNote, INIT)
        .i(Opcode::PlayNoteAndWait, 0)
        .i(Opcode::Snapshot, 0)
        .label(UP_LOOP)
        .i(Opcode::FindNewerNote, TRANS)
        .i(Opcode::PlayNoteAndWait, 0)
        .i(Opcode::Jump, UP_LOOP)
        .label(TRANS)
        .i(Opcode::Loadf, OCT_COUNT)
        .i(Opcode::Subl, 1)
        .i(Opcode::Storef, OCT_COUNT)
        .i(Opcode::Jz, INIT)
        .i(Opcode::Loadf, REG_NOTE_OFFSET)
        .i(Opcode::Addl, 12)
        .i(Opcode::Storef, REG_NOTE_OFFSET)
        .i(Opcode::Jump, START);
    a.prog
}

fn generate_updown_norepeat(octaves: i32) -> Program {
    const INIT_UP: i32 = 0;
    const START_UP: i32 = 2;
    const UP_LOOP: i32 = 3;
    const TRANS_UP: i32 = 4;
    const INIT_DOWN: i32 = 5;
    const START_DOWN: i32 = 6;
    const DOWN_LOOP: i32 = 7;
    const TRANS_DOWN: i32 = 8;
    const END_LOOP: i32 = 9;
    const OCT_COUNT: i32 = 0;
    const LOOPING: i32 = 1;
    const LAST_OCT_NOTE: i32 = 2;
    let _ = LAST_OCT_NOTE;

    let mut a = Asm::new();
    a.i(Opcode::Loadl, 0).i(Opcode::Storef, LOOPING);
    a.label(INIT_UP)
        .i(Opcode::Snapshot, 0)
        .i(Opcode::Loadl, 0)
        .i(Opcode::Storef, REG_NOTE_OFFSET)
        .i(Opcode::Loadl, octaves)
        .i(Opcode::Storef, OCT_COUNT)
        .i(Opcode::Loadf, LOOPING)
        .i(Opcode::Jz, START_UP)
        .i(Opcode::FindLowestNote, INIT_UP)
        .i(Opcode::Jump, UP_LOOP)
        .label(START_UP)
        .i(Opcode::FindLowestNote, INIT_UP)
        .i(Opcode::PlayNoteAndWait, 0)
        .i(Opcode::Snapshot, 0)
        .label(UP_LOOP)
        .i(Opcode::FindHigherNote, TRANS_UP)
        .i(Opcode::PlayNoteAndWait, 0)
        .i(Opcode::Jump, UP_LOOP)
        .label(TRANS_UP)
        .i(Opcode::Loadf, OCT_COUNT)
        .i(Opcode::Subl, 1)
        .i(Opcode::Storef, OCT_COUNT)
        .i(Opcode::Jz, INIT_DOWN)
        .i(Opcode::Loadf, REG_NOTE_OFFSET)
        .i(Opcode::Addl, 12)
        .i(Opcode::Storef, REG_NOTE_OFFSET)
        .i(Opcode::Jump, START_UP)
        .label(INIT_DOWN)
        .i(Opcode::Loadl, octaves)
        .i(Opcode::Storef, OCT_COUNT)
        .i(Opcode::Subl, 1)
        .i(Opcode::Mull, 12)
        .i(Opcode::Storef, REG_NOTE_OFFSET)
        .i(Opcode::FindHighestNote, INIT_UP)
        .i(Opcode::Jump, DOWN_LOOP)
        .label(START_DOWN)
        .i(Opcode::FindHighestNote, INIT_UP)
        .i(Opcode::PlayNoteAndWait, 0)
        .label(DOWN_LOOP)
        .i(Opcode::FindLowerNote, TRANS_DOWN)
        .i(Opcode::PlayNoteAndWait, 0)
        .i(Opcode::Jump, DOWN_LOOP)
        .label(TRANS_DOWN)
        .i(Opcode::Loadf, OCT_COUNT)
        .i(Opcode::Subl, 1)
        .i(Opcode::Storef, OCT_COUNT)
        .i(Opcode::Jz, END_LOOP)
        .i(Opcode::Loadf, REG_NOTE_OFFSET)
        .i(Opcode::Addl, -12)
        .i(Opcode::Storef, REG_NOTE_OFFSET)
        .i(Opcode::Jump, START_DOWN)
        .label(END_LOOP)
        .i(Opcode::Loadl, 1)
        .i(Opcode::Storef, LOOPING)
        .i(Opcode::Jump, INIT_UP);
    // unreachable STORE_DOWN label slot kept numerically distinct from START_UP (1)
    let _ = START_DOWN;
    a.prog
}

fn generate_repeat(notes: i32, rests: i32) -> Program {
    const INIT: i32 = 0;
    const NOTE: i32 = 1;
    const PLAY_NOTE_LOOP: i32 = 2;
    const PLAY_WAIT: i32 = 3;
    const REST: i32 = 4;
    const NOTES_COUNT: i32 = 0;
    const RESTS_COUNT: i32 = 1;

    let mut a = Asm::new();
    a.label(INIT)
        .i(Opcode::Snapshot, 0)
        .i(Opcode::Loadl, notes)
        .i(Opcode::Storef, NOTES_COUNT)
        .i(Opcode::Loadl, rests)
        .i(Opcode::Storef, RESTS_COUNT)
        .label(NOTE)
        .i(Opcode::Loadf, NOTES_COUNT)
        .i(Opcode::Jz, REST)
        .i(Opcode::Subl, 1)
        .i(Opcode::Storef, NOTES_COUNT)
        .i(Opcode::FindLowestNote, INIT)
        .i(Opcode::PlayNote, 0)
        .i(Opcode::Snapshot, 0)
        .label(PLAY_NOTE_LOOP)
        .i(Opcode::FindHigherNote, PLAY_WAIT)
        .i(Opcode::PlayNote, 0)
        .i(Opcode::Jump, PLAY_NOTE_LOOP)
        .label(PLAY_WAIT)
        .i(Opcode::Wait, 0)
        .i(Opcode::Jump, NOTE)
        .label(REST)
        .i(Opcode::Loadf, RESTS_COUNT)
        .i(Opcode::Jz, INIT)
        .i(Opcode::Subl, 1)
        .i(Opcode::Storef, RESTS_COUNT)
        .i(Opcode::Wait, 0)
        .i(Opcode::Jump, REST);
    a.prog
}

fn generate_up_low(octaves: i32) -> Program {
    const INIT: i32 = 0;
    const START: i32 = 1;
    const UP_LOOP: i32 = 2;
    const TRANS: i32 = 3;
    const OCT_COUNT: i32 = 0;
    const LAST_NOTE: i32 = 1;

    let mut a = Asm::new();
    a.label(INIT)
        .i(Opcode::Snapshot, 0)
        .i(Opcode::Loadl, 0)
        .i(Opcode::Storef, REG_NOTE_OFFSET)
        .i(Opcode::Loadl, octaves)
        .i(Opcode::Storef, OCT_COUNT)
        .label(START)
        .i(Opcode::FindLowestNote, INIT)
        .i(Opcode::Storef, LAST_NOTE)
        .i(Opcode::PlayNoteAndWait, 0)
        .i(Opcode::Snapshot, 0)
        .label(UP_LOOP)
        .i(Opcode::Loadf, LAST_NOTE)
        .i(Opcode::FindHigherNote, TRANS)
        .i(Opcode::Storef, LAST_NOTE)
        .i(Opcode::PlayNoteAndWait, 0)
        .i(Opcode::FindHigherNote, TRANS)
        .i(Opcode::FindLowestNote, INIT)
        .i(Opcode::PlayNoteAndWait, 0)
        .i(Opcode::Loadf, LAST_NOTE)
        .i(Opcode::Jump, UP_LOOP)
        .label(TRANS)
        .i(Opcode::Loadf, OCT_COUNT)
        .i(Opcode::Subl, 1)
        .i(Opcode::Storef, OCT_COUNT)
        .i(Opcode::Jz, INIT)
        .i(Opcode::Loadf, REG_NOTE_OFFSET)
        .i(Opcode::Addl, 12)
        .i(Opcode::Storef, REG_NOTE_OFFSET)
        .i(Opcode::Jump, START);
    a.prog
}

fn generate_down_high(octaves: i32) -> Program {
    const INIT: i32 = 0;
    const START: i32 = 1;
    const DOWN_LOOP: i32 = 2;
    const TRANS: i32 = 3;
    const OCT_COUNT: i32 = 0;
    const LAST_NOTE: i32 = 1;

    let mut a = Asm::new();
    a.label(INIT)
        .i(Opcode::Snapshot, 0)
        .i(Opcode::Loadl, octaves)
        .i(Opcode::Storef, OCT_COUNT)
        .i(Opcode::Subl, 1)
        .i(Opcode::Mull, 12)
        .i(Opcode::Storef, REG_NOTE_OFFSET)
        .label(START)
        .i(Opcode::FindHighestNote, INIT)
        .i(Opcode::Storef, LAST_NOTE)
        .i(Opcode::PlayNoteAndWait, 0)
        .i(Opcode::Snapshot, 0)
        .label(DOWN_LOOP)
        .i(Opcode::Loadf, LAST_NOTE)
        .i(Opcode::FindLowerNote, TRANS)
        .i(Opcode::Storef, LAST_NOTE)
        .i(Opcode::PlayNoteAndWait, 0)
        .i(Opcode::FindLowerNote, TRANS)
        .i(Opcode::FindHighestNote, INIT)
        .i(Opcode::PlayNoteAndWait, 0)
        .i(Opcode::Loadf, LAST_NOTE)
        .i(Opcode::Jump, DOWN_LOOP)
        .label(TRANS)
        .i(Opcode::Loadf, OCT_COUNT)
        .i(Opcode::Subl, 1)
        .i(Opcode::Storef, OCT_COUNT)
        .i(Opcode::Jz, INIT)
        .i(Opcode::Loadf, REG_NOTE_OFFSET)
        .i(Opcode::Addl, -12)
        .i(Opcode::Storef, REG_NOTE_OFFSET)
        .i(Opcode::Jump, START);
    a.prog
}

/// Generate the bytecode program for a stored arp type. Grounded on
/// `arp_progs_load`'s dispatch table.
pub fn generate(ty: ArpType) -> Program {
    match ty {
        ArpType::Up1 => generate_up(1),
        ArpType::Up2 => generate_up(2),
        ArpType::Up3 => generate_up(3),
        ArpType::Up4 => generate_up(4),
        ArpType::Down1 => generate_down(1),
        ArpType::Down2 => generate_down(2),
        ArpType::Down3 => generate_down(3),
        ArpType::Down4 => generate_down(4),
        ArpType::UpDown1 => generate_updown(1),
        ArpType::UpDown2 => generate_updown(2),
        ArpType::UpDown3 => generate_updown(3),
        ArpType::UpDown4 => generate_updown(4),
        ArpType::Random1 => generate_random(1),
        ArpType::Random2 => generate_random(2),
        ArpType::Random3 => generate_random(3),
        ArpType::Random4 => generate_random(4),
        ArpType::NoteOrder1 => generate_note_order(1),
        ArpType::NoteOrder2 => generate_note_order(2),
        ArpType::NoteOrder3 => generate_note_order(3),
        ArpType::NoteOrder4 => generate_note_order(4),
        ArpType::UpDown1Nr => generate_updown_norepeat(1),
        ArpType::UpDown2Nr => generate_updown_norepeat(2),
        ArpType::UpDown3Nr => generate_updown_norepeat(3),
        ArpType::UpDown4Nr => generate_updown_norepeat(4),
        ArpType::Repeat1_0 => generate_repeat(1, 0),
        ArpType::Repeat1_1 => generate_repeat(1, 1),
        ArpType::Repeat2_1 => generate_repeat(2, 1),
        ArpType::Repeat3_1 => generate_repeat(3, 1),
        ArpType::Repeat4_1 => generate_repeat(4, 1),
        ArpType::UpLow1 => generate_up_low(1),
        ArpType::UpLow2 => generate_up_low(2),
        ArpType::UpLow3 => generate_up_low(3),
        ArpType::UpLow4 => generate_up_low(4),
        ArpType::DownHigh1 => generate_down_high(1),
        ArpType::DownHigh2 => generate_down_high(2),
        ArpType::DownHigh3 => generate_down_high(3),
        ArpType::DownHigh4 => generate_down_high(4),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_program_has_instructions_and_fits_in_rom() {
        for ty in ArpType::ALL {
            let prog = generate(ty);
            assert!(!prog.is_empty(), "{} produced an empty program", ty.name());
            assert!(prog.len() <= ARP_PROG_MAX_LEN);
        }
    }

    #[test]
    fn every_jump_target_resolves_to_a_label_in_the_same_program() {
        for ty in ArpType::ALL {
            let prog = generate(ty);
            let labels: heapless::Vec<i32, ARP_PROG_MAX_LEN> =
                prog.iter().filter(|ins| ins.op == Opcode::Label).map(|ins| ins.arg).collect();
            for ins in prog.iter() {
                let is_jump = matches!(
                    ins.op,
                    Opcode::Jump
                        | Opcode::Jz
                        | Opcode::FindLowestNote
                        | Opcode::FindHighestNote
                        | Opcode::FindLowerNote
                        | Opcode::FindHigherNote
                        | Opcode::FindOldestNote
                        | Opcode::FindNewestNote
                        | Opcode::FindOlderNote
                        | Opcode::FindNewerNote
                        | Opcode::FindRandomNote
                );
                if is_jump {
                    assert!(
                        labels.contains(&ins.arg),
                        "{}: jump target {} has no label",
                        ty.name(),
                        ins.arg
                    );
                }
            }
        }
    }

    #[test]
    fn type_index_round_trips_through_all() {
        for (i, ty) in ArpType::ALL.iter().enumerate() {
            assert_eq!(ty.index(), i);
        }
    }
}
