//! The MIDI message model: a wire-level carrier (what travels through a port
//! queue, SysEx included) plus the closed set of physical/logical ports.
//!
//! Grounded on the reference firmware's `struct midi_msg` (port + len + status
//! + two data bytes) in `midi_stream.h`/`midi_utils.h`.
//!
//! Decoded channel messages are exposed as `midi_types::MidiMessage` (the
//! type the rest of the engine and `embedded-midi` already speak), since that
//! type cannot carry SysEx fragments on its own.

use midi_types::{Channel, Control, MidiMessage, Note, Program, QuarterFrame, Value7, Value14};

/// A physical or logical MIDI endpoint. A closed enumeration, as in the
/// reference firmware's `MIDI_MAX_PORTS` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Port {
    DinIn1 = 0,
    DinIn2,
    DinOut1,
    DinOut2,
    UsbDeviceIn1,
    UsbDeviceIn2,
    UsbDeviceIn3,
    UsbDeviceIn4,
    UsbDeviceOut1,
    UsbDeviceOut2,
    UsbDeviceOut3,
    UsbHostIn,
    UsbHostOut,
    CvOut,
    SysexIn,
}

/// Number of ports in the closed enumeration.
pub const PORT_COUNT: usize = 15;

impl Port {
    pub const ALL: [Port; PORT_COUNT] = [
        Port::DinIn1,
        Port::DinIn2,
        Port::DinOut1,
        Port::DinOut2,
        Port::UsbDeviceIn1,
        Port::UsbDeviceIn2,
        Port::UsbDeviceIn3,
        Port::UsbDeviceIn4,
        Port::UsbDeviceOut1,
        Port::UsbDeviceOut2,
        Port::UsbDeviceOut3,
        Port::UsbHostIn,
        Port::UsbHostOut,
        Port::CvOut,
        Port::SysexIn,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }
}

impl TryFrom<u8> for Port {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if (value as usize) < PORT_COUNT {
            Ok(Port::ALL[value as usize])
        } else {
            Err(())
        }
    }
}

/// Raw status-byte constants, shared by the parser and the message encoders.
pub mod status {
    pub const SYSEX_START: u8 = 0xF0;
    pub const MTC_QFRAME: u8 = 0xF1;
    pub const SONG_POSITION: u8 = 0xF2;
    pub const SONG_SELECT: u8 = 0xF3;
    pub const TUNE_REQUEST: u8 = 0xF6;
    pub const SYSEX_END: u8 = 0xF7;
    pub const TIMING_CLOCK: u8 = 0xF8;
    pub const CLOCK_START: u8 = 0xFA;
    pub const CLOCK_CONTINUE: u8 = 0xFB;
    pub const CLOCK_STOP: u8 = 0xFC;
    pub const ACTIVE_SENSING: u8 = 0xFE;
    pub const SYSTEM_RESET: u8 = 0xFF;
}

/// A wire-level MIDI carrier: up to 3 bytes tagged with the port they arrived
/// on or are destined for. SysEx payload bytes are smuggled through the
/// `status`/`data0`/`data1` fields exactly as the reference firmware does;
/// `len` tells a consumer how many of those fields hold meaningful data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Message {
    pub port: Port,
    pub len: u8,
    pub status: u8,
    pub data0: u8,
    pub data1: u8,
}

impl Message {
    pub fn one_byte(port: Port, status: u8) -> Self {
        Message { port, len: 1, status, data0: 0, data1: 0 }
    }

    pub fn two_byte(port: Port, status: u8, data0: u8) -> Self {
        Message { port, len: 2, status, data0, data1: 0 }
    }

    pub fn three_byte(port: Port, status: u8, data0: u8, data1: u8) -> Self {
        Message { port, len: 3, status, data0, data1 }
    }

    /// Render this carrier back to its raw bytes, `len` of them.
    pub fn as_bytes(&self) -> [u8; 3] {
        [self.status, self.data0, self.data1]
    }

    /// True iff this carrier holds part of a SysEx payload (identified by the
    /// fact that its status byte does not carry a recognizable MIDI status,
    /// i.e. it was stored by the SysEx chunker rather than a channel/system
    /// encoder). Callers reassembling SysEx track this via the parser state
    /// instead of inspecting carriers after the fact; this helper exists for
    /// diagnostics and tests.
    pub fn is_sysex_terminator(&self) -> bool {
        self.as_bytes()[..self.len as usize].contains(&status::SYSEX_END)
    }

    /// Decode this carrier into a `midi_types::MidiMessage`, if it is a
    /// complete channel or system message (not a SysEx fragment).
    pub fn decode(&self) -> Option<MidiMessage> {
        let stat = self.status & 0xF0;
        let chan = Channel::from(self.status & 0x0F);
        match stat {
            0x80 => Some(MidiMessage::NoteOff(chan, Note::from(self.data0), Value7::from(self.data1))),
            0x90 => {
                if self.data1 == 0 {
                    Some(MidiMessage::NoteOff(chan, Note::from(self.data0), Value7::from(0x40)))
                } else {
                    Some(MidiMessage::NoteOn(chan, Note::from(self.data0), Value7::from(self.data1)))
                }
            }
            0xA0 => Some(MidiMessage::KeyPressure(chan, Note::from(self.data0), Value7::from(self.data1))),
            0xB0 => Some(MidiMessage::ControlChange(chan, Control::from(self.data0), Value7::from(self.data1))),
            0xC0 => Some(MidiMessage::ProgramChange(chan, Program::from(self.data0))),
            0xD0 => Some(MidiMessage::ChannelPressure(chan, Value7::from(self.data0))),
            0xE0 => Some(MidiMessage::PitchBendChange(chan, Value14::from((self.data0, self.data1)))),
            0xF0 => match self.status {
                status::MTC_QFRAME => Some(MidiMessage::QuarterFrame(QuarterFrame::from(self.data0))),
                status::SONG_POSITION => Some(MidiMessage::SongPositionPointer(Value14::from((self.data0, self.data1)))),
                status::SONG_SELECT => Some(MidiMessage::SongSelect(Value7::from(self.data0))),
                status::TUNE_REQUEST => Some(MidiMessage::TuneRequest),
                status::TIMING_CLOCK => Some(MidiMessage::TimingClock),
                status::CLOCK_START => Some(MidiMessage::Start),
                status::CLOCK_CONTINUE => Some(MidiMessage::Continue),
                status::CLOCK_STOP => Some(MidiMessage::Stop),
                status::ACTIVE_SENSING => Some(MidiMessage::ActiveSensing),
                status::SYSTEM_RESET => Some(MidiMessage::Reset),
                _ => None,
            },
            _ => None,
        }
    }

    /// Encode a decoded channel/system message into a carrier for `port`.
    pub fn encode(port: Port, message: &MidiMessage) -> Self {
        match *message {
            MidiMessage::NoteOff(chan, note, velocity) => {
                Message::three_byte(port, 0x80 | u8::from(chan), note.into(), velocity.into())
            }
            MidiMessage::NoteOn(chan, note, velocity) => {
                Message::three_byte(port, 0x90 | u8::from(chan), note.into(), velocity.into())
            }
            MidiMessage::KeyPressure(chan, note, value) => {
                Message::three_byte(port, 0xA0 | u8::from(chan), note.into(), value.into())
            }
            MidiMessage::ControlChange(chan, control, value) => {
                Message::three_byte(port, 0xB0 | u8::from(chan), control.into(), value.into())
            }
            MidiMessage::ProgramChange(chan, program) => {
                Message::two_byte(port, 0xC0 | u8::from(chan), program.into())
            }
            MidiMessage::ChannelPressure(chan, value) => {
                Message::two_byte(port, 0xD0 | u8::from(chan), value.into())
            }
            MidiMessage::PitchBendChange(chan, value) => {
                let (lsb, msb): (u8, u8) = value.into();
                Message::three_byte(port, 0xE0 | u8::from(chan), lsb, msb)
            }
            MidiMessage::QuarterFrame(value) => Message::two_byte(port, status::MTC_QFRAME, value.into()),
            MidiMessage::SongPositionPointer(value) => {
                let (lsb, msb): (u8, u8) = value.into();
                Message::three_byte(port, status::SONG_POSITION, lsb, msb)
            }
            MidiMessage::SongSelect(value) => Message::two_byte(port, status::SONG_SELECT, value.into()),
            MidiMessage::TuneRequest => Message::one_byte(port, status::TUNE_REQUEST),
            MidiMessage::TimingClock => Message::one_byte(port, status::TIMING_CLOCK),
            MidiMessage::Start => Message::one_byte(port, status::CLOCK_START),
            MidiMessage::Continue => Message::one_byte(port, status::CLOCK_CONTINUE),
            MidiMessage::Stop => Message::one_byte(port, status::CLOCK_STOP),
            MidiMessage::ActiveSensing => Message::one_byte(port, status::ACTIVE_SENSING),
            MidiMessage::Reset => Message::one_byte(port, status::SYSTEM_RESET),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn note_on_round_trips_through_decode() {
        let msg = Message::three_byte(Port::DinIn1, 0x90, 60, 64);
        assert_eq!(
            msg.decode(),
            Some(MidiMessage::NoteOn(Channel::C1, Note::from(60), Value7::from(64)))
        );
    }

    #[test]
    fn note_on_velocity_zero_decodes_as_note_off() {
        let msg = Message::three_byte(Port::DinIn1, 0x90, 60, 0);
        assert_eq!(
            msg.decode(),
            Some(MidiMessage::NoteOff(Channel::C1, Note::from(60), Value7::from(0x40)))
        );
    }

    #[test]
    fn encode_then_decode_preserves_program_change() {
        let original = MidiMessage::ProgramChange(Channel::C5, Program::from(12));
        let msg = Message::encode(Port::DinOut1, &original);
        assert_eq!(msg.decode(), Some(original));
    }

    #[test]
    fn port_round_trips_through_index() {
        for port in Port::ALL {
            assert_eq!(Port::try_from(port.index() as u8), Ok(port));
        }
        assert_eq!(Port::try_from(200), Err(()));
    }
}
