//! Port streams: fixed-capacity ring queues of [`Message`], fed either
//! directly with complete messages or byte-at-a-time through a running-status
//! parser with SysEx framing.
//!
//! The parser state machine and its transitions are grounded byte-for-byte on
//! the reference firmware's `midi_stream_send_byte` (`midi_stream.c`):
//! system-realtime bytes emit immediately without disturbing running status,
//! system-common bytes clear it, `0xF0` enters SysEx collection, a channel
//! status arriving mid-SysEx first flushes an implicit 1-byte `0xF7`
//! fragment, and `SongPositionPointer` returns to `Idle` instead of leaving
//! running status armed.

use heapless::Deque;

use crate::config::PORT_QUEUE_CAPACITY;
use crate::error::CarbonError;
use crate::message::{status, Message, Port};

/// A fixed-capacity, power-of-two-sized FIFO of [`Message`] for one port.
/// `enqueue`/`dequeue` are both non-blocking, matching the reference
/// firmware's `midi_stream_send_msg`/`midi_stream_receive_msg`.
pub struct PortQueue {
    queue: Deque<Message, PORT_QUEUE_CAPACITY>,
}

impl PortQueue {
    pub fn new() -> Self {
        PortQueue { queue: Deque::new() }
    }

    pub fn enqueue(&mut self, msg: Message) -> Result<(), CarbonError> {
        self.queue.push_back(msg).map_err(|_| {
            log::warn!("port queue full, dropping message");
            CarbonError::QueueFull
        })
    }

    pub fn dequeue(&mut self) -> Option<Message> {
        self.queue.pop_front()
    }

    pub fn available(&self) -> bool {
        !self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl Default for PortQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Running-status byte-parser state for one port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParserState {
    Idle,
    Data0,
    Data1,
    SysexData0,
    SysexData1,
}

/// Per-port byte-stream parser: running status, SysEx chunking, velocity-0
/// NoteOn rewriting. Produces at most one [`Message`] per fed byte.
pub struct StreamParser {
    port: Port,
    state: ParserState,
    status: u8,
    data0: u8,
    mtc_pending: bool,
}

impl StreamParser {
    pub fn new(port: Port) -> Self {
        StreamParser { port, state: ParserState::Idle, status: 0, data0: 0, mtc_pending: false }
    }

    /// Feed one incoming byte. Returns a complete message if one was
    /// produced, `None` if the parser is still collecting.
    pub fn feed(&mut self, byte: u8) -> Option<Message> {
        if byte & 0x80 != 0 {
            return self.feed_status_byte(byte);
        }
        self.feed_data_byte(byte)
    }

    fn feed_status_byte(&mut self, byte: u8) -> Option<Message> {
        let stat = byte & 0xF0;
        if stat != 0xF0 {
            // channel status byte
            let was_sysex = matches!(self.state, ParserState::SysexData0 | ParserState::SysexData1);
            self.status = byte;
            self.state = ParserState::Data0;
            if was_sysex {
                // flush the implicit 1-byte terminator fragment; the new
                // status byte itself still starts a fresh message below, but
                // since `feed` only returns one Message per call, the caller
                // will not see the new status until its next data byte
                // arrives (exactly as the reference firmware's running
                // status collects a byte at a time).
                return Some(Message::one_byte(self.port, status::SYSEX_END));
            }
            return None;
        }

        match byte {
            status::TIMING_CLOCK => Some(Message::one_byte(self.port, status::TIMING_CLOCK)),
            status::CLOCK_START => Some(Message::one_byte(self.port, status::CLOCK_START)),
            status::CLOCK_CONTINUE => Some(Message::one_byte(self.port, status::CLOCK_CONTINUE)),
            status::CLOCK_STOP => Some(Message::one_byte(self.port, status::CLOCK_STOP)),
            status::ACTIVE_SENSING => Some(Message::one_byte(self.port, status::ACTIVE_SENSING)),
            status::SYSTEM_RESET => {
                self.state = ParserState::Idle;
                self.status = 0;
                Some(Message::one_byte(self.port, status::SYSTEM_RESET))
            }
            status::SONG_POSITION | status::SONG_SELECT => {
                self.status = byte;
                self.state = ParserState::Data0;
                None
            }
            status::TUNE_REQUEST => Some(Message::one_byte(self.port, status::TUNE_REQUEST)),
            status::MTC_QFRAME => {
                // one data byte follows; running status is left untouched.
                self.mtc_pending = true;
                None
            }
            status::SYSEX_START => {
                self.status = byte;
                self.state = ParserState::SysexData0;
                None
            }
            status::SYSEX_END => {
                let msg = match self.state {
                    ParserState::SysexData1 => Message::three_byte(self.port, self.status, self.data0, status::SYSEX_END),
                    ParserState::SysexData0 => Message::two_byte(self.port, self.status, status::SYSEX_END),
                    _ => Message::one_byte(self.port, status::SYSEX_END),
                };
                self.state = ParserState::Idle;
                Some(msg)
            }
            _ => {
                // undefined system common/realtime byte: reset and ignore
                self.state = ParserState::Idle;
                self.status = 0;
                None
            }
        }
    }

    fn feed_data_byte(&mut self, byte: u8) -> Option<Message> {
        if self.mtc_pending {
            self.mtc_pending = false;
            return Some(Message::two_byte(self.port, status::MTC_QFRAME, byte));
        }

        match self.state {
            ParserState::Data0 => {
                self.data0 = byte;
                match self.status {
                    status::SONG_SELECT => {
                        self.state = ParserState::Idle;
                        self.status = 0;
                        Some(Message::two_byte(self.port, status::SONG_SELECT, byte))
                    }
                    0xC0..=0xCF => Some(Message::two_byte(self.port, self.status, byte)),
                    0xD0..=0xDF => Some(Message::two_byte(self.port, self.status, byte)),
                    _ => {
                        self.state = ParserState::Data1;
                        None
                    }
                }
            }
            ParserState::Data1 => {
                let data1 = byte;
                let stat = self.status;
                let msg = Message::three_byte(self.port, stat, self.data0, data1);
                if stat == status::SONG_POSITION {
                    self.state = ParserState::Idle;
                    self.status = 0;
                } else {
                    self.state = ParserState::Data0;
                }
                Some(msg)
            }
            ParserState::SysexData0 => {
                self.data0 = byte;
                self.state = ParserState::SysexData1;
                None
            }
            ParserState::SysexData1 => {
                let msg = Message::three_byte(self.port, self.status, self.data0, byte);
                self.state = ParserState::Idle;
                Some(msg)
            }
            ParserState::Idle => {
                // non-status byte with no preceding status: reference
                // firmware treats this as a sysex continuation fragment.
                self.status = byte;
                self.state = ParserState::SysexData0;
                None
            }
        }
    }
}

/// Split a SysEx payload (without the `0xF0`/`0xF7` framing bytes) into
/// 1-3-byte carriers, final chunk possibly short, as the reference firmware's
/// `midi_stream_send_sysex_msg` does.
pub fn chunk_sysex<'a>(port: Port, header: u8, payload: &'a [u8]) -> SysexChunks<'a> {
    SysexChunks { port, header, payload, pos: 0, started: false }
}

pub struct SysexChunks<'a> {
    port: Port,
    header: u8,
    payload: &'a [u8],
    pos: usize,
    started: bool,
}

impl<'a> Iterator for SysexChunks<'a> {
    type Item = Message;

    fn next(&mut self) -> Option<Message> {
        if !self.started {
            self.started = true;
            return Some(Message::one_byte(self.port, self.header));
        }
        if self.pos >= self.payload.len() {
            if self.pos == self.payload.len() {
                self.pos += 1;
                return Some(Message::one_byte(self.port, status::SYSEX_END));
            }
            return None;
        }
        let remaining = self.payload.len() - self.pos;
        let msg = if remaining >= 3 {
            let m = Message::three_byte(self.port, self.payload[self.pos], self.payload[self.pos + 1], self.payload[self.pos + 2]);
            self.pos += 3;
            m
        } else if remaining == 2 {
            let m = Message::two_byte(self.port, self.payload[self.pos], self.payload[self.pos + 1]);
            self.pos += 2;
            m
        } else {
            let m = Message::one_byte(self.port, self.payload[self.pos]);
            self.pos += 1;
            m
        };
        Some(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use midi_types::{Channel, MidiMessage, Note, Value7};

    fn parse_all(parser: &mut StreamParser, bytes: &[u8]) -> heapless::Vec<Message, 32> {
        let mut out = heapless::Vec::new();
        for &b in bytes {
            if let Some(msg) = parser.feed(b) {
                out.push(msg).unwrap();
            }
        }
        out
    }

    #[test]
    fn s1_running_status() {
        let mut parser = StreamParser::new(Port::DinIn1);
        let msgs = parse_all(&mut parser, &[0x90, 0x3C, 0x40, 0x3E, 0x40, 0x80, 0x3C, 0x40]);
        let decoded: heapless::Vec<MidiMessage, 32> = msgs.iter().map(|m| m.decode().unwrap()).collect();
        assert_eq!(
            decoded.as_slice(),
            &[
                MidiMessage::NoteOn(Channel::C1, Note::from(0x3C), Value7::from(0x40)),
                MidiMessage::NoteOn(Channel::C1, Note::from(0x3E), Value7::from(0x40)),
                MidiMessage::NoteOff(Channel::C1, Note::from(0x3C), Value7::from(0x40)),
            ]
        );
    }

    #[test]
    fn s2_velocity_zero_note_on_becomes_note_off() {
        let mut parser = StreamParser::new(Port::DinIn1);
        let msgs = parse_all(&mut parser, &[0x90, 0x3C, 0x00]);
        assert_eq!(msgs.len(), 1);
        assert_eq!(
            msgs[0].decode(),
            Some(MidiMessage::NoteOff(Channel::C1, Note::from(0x3C), Value7::from(0x40)))
        );
    }

    #[test]
    fn s3_sysex_framing_reassembles_payload() {
        let mut parser = StreamParser::new(Port::SysexIn);
        let input = [0xF0u8, 0x00, 0x01, 0x72, 0x01, 0x41, 0x42, 0xF7];
        let msgs = parse_all(&mut parser, &input);
        // a consumer reassembles by concatenating every fragment's bytes in
        // order until it sees the 0xF7 terminator in any position.
        let mut reassembled = heapless::Vec::<u8, 16>::new();
        for m in &msgs {
            reassembled.extend_from_slice(&m.as_bytes()[..m.len as usize]).unwrap();
        }
        assert_eq!(reassembled.as_slice(), &input);
        assert!(msgs.last().unwrap().is_sysex_terminator());
        // strip the 0xF0/0xF7 framing to get the payload the spec calls out
        let payload = &reassembled[1..reassembled.len() - 1];
        assert_eq!(payload, &[0x00, 0x01, 0x72, 0x01, 0x41, 0x42]);
    }

    #[test]
    fn channel_status_mid_sysex_flushes_implicit_terminator() {
        let mut parser = StreamParser::new(Port::SysexIn);
        // 0xF0 starts sysex, 0x01 fills the first pending data byte (still
        // mid-fragment), then 0x90 (a channel status) arrives before the
        // fragment's second byte — this must flush an implicit 0xF7 first.
        let msgs = parse_all(&mut parser, &[0xF0, 0x01, 0x90]);
        assert!(msgs.iter().any(|m| m.status == status::SYSEX_END && m.len == 1));
    }

    #[test]
    fn queue_is_fifo_and_bounded() {
        let mut q = PortQueue::new();
        for i in 0..300u16 {
            let _ = q.enqueue(Message::one_byte(Port::DinIn1, (i % 0xF8) as u8 | 0x80));
        }
        assert!(q.len() <= PORT_QUEUE_CAPACITY);
        let first = q.dequeue();
        assert!(first.is_some());
    }

    #[test]
    fn song_position_clears_running_status() {
        let mut parser = StreamParser::new(Port::DinIn1);
        // SongPositionPointer then a raw data byte must NOT be treated as
        // running-status continuation of SongPositionPointer.
        let msgs = parse_all(&mut parser, &[0xF2, 0x10, 0x20]);
        assert_eq!(msgs.len(), 1);
        assert_eq!(
            msgs[0].decode(),
            Some(MidiMessage::SongPositionPointer(midi_types::Value14::from((0x10u8, 0x20u8))))
        );
    }

    #[test]
    fn mtc_quarter_frame_does_not_disturb_running_status() {
        let mut parser = StreamParser::new(Port::DinIn1);
        // NoteOn running status, an MTC quarter-frame byte pair spliced in,
        // then a running-status continuation of the original NoteOn.
        let msgs = parse_all(&mut parser, &[0x90, 0x40, 0x7F, 0xF1, 0x05, 0x41, 0x7F]);
        assert_eq!(msgs.len(), 3);
        assert_eq!(msgs[0].status, 0x90);
        assert_eq!(msgs[1].status, status::MTC_QFRAME);
        assert_eq!(msgs[1].data0, 0x05);
        assert_eq!(msgs[2].status, 0x90);
        assert_eq!(msgs[2].data0, 0x41);
        assert_eq!(msgs[2].data1, 0x7F);
    }
}
