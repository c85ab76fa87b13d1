//! Device initialisation: GPIO/clock/UART bring-up and the adapter types that
//! satisfy `carbon_core`'s boundary traits. The DIN MIDI UART is wired to a
//! real peripheral and exposed a byte at a time, the boundary
//! `carbon_core::stream::StreamParser` consumes; the analog, panel and
//! display adapters are stubs (no real driver), since concrete CV/panel/
//! display hardware is out of scope here (see `SPEC_FULL.md` 1.1) and only
//! the wiring shape is demonstrated.

use embedded_hal::serial::{Read, Write};
use nb;
use rp2040_hal::rosc::{Enabled, RingOscillator};
use rp_pico::{
    hal::{
        clocks::{self, Clock as _},
        gpio::{pin::bank0::{Gpio0, Gpio1}, FunctionUart, Pin},
        pac,
        sio::Sio,
        timer::{monotonic::Monotonic, Alarm0},
        uart::{DataBits, Reader, StopBits, UartConfig, UartPeripheral, Writer},
        Timer, Watchdog,
    },
    Pins, XOSC_CRYSTAL_FREQ,
};
use fugit::RateExtU32;

use carbon_core::error::CarbonError;
use carbon_core::external::{AnalogOut, ByteTransport, Display, PanelEvent, PanelInput, SongStore};
use carbon_core::message::Port;

type MidiUartPins = (Pin<Gpio0, FunctionUart>, Pin<Gpio1, FunctionUart>);

/// The DIN MIDI UART's receive half, exposed byte-at-a-time.
pub struct MidiIn(Reader<pac::UART0, MidiUartPins>);

/// The DIN MIDI UART's transmit half, exposed byte-at-a-time.
pub struct MidiOut(Writer<pac::UART0, MidiUartPins>);

impl ByteTransport for MidiIn {
    fn port(&self) -> Port {
        Port::DinIn1
    }

    fn read_byte(&mut self) -> Option<u8> {
        self.0.read().ok()
    }

    fn write_byte(&mut self, _byte: u8) -> Result<(), CarbonError> {
        Err(CarbonError::InvalidPort)
    }
}

impl ByteTransport for MidiOut {
    fn port(&self) -> Port {
        Port::DinOut1
    }

    fn read_byte(&mut self) -> Option<u8> {
        None
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), CarbonError> {
        nb::block!(self.0.write(byte)).map_err(|_| CarbonError::QueueFull)
    }
}

/// No CV/gate hardware wired up; every call is a no-op.
#[derive(Default)]
pub struct StubAnalogOut;

impl AnalogOut for StubAnalogOut {
    fn set_cv(&mut self, _index: usize, _code: u16) {}
    fn set_gate(&mut self, _index: usize, _high: bool) {}
    fn pulse_clock(&mut self) {}
    fn pulse_reset(&mut self) {}
}

/// No front panel wired up; never produces events.
#[derive(Default)]
pub struct StubPanelInput;

impl PanelInput for StubPanelInput {
    fn poll(&mut self) -> Option<PanelEvent> {
        None
    }
}

/// No display wired up; text writes are discarded.
#[derive(Default)]
pub struct StubDisplay;

impl Display for StubDisplay {
    fn clear(&mut self) {}
    fn write_line(&mut self, _row: u8, _text: &str) {}
    fn flush(&mut self) {}
}

/// No persistent storage wired up; load always reports an empty slot.
#[derive(Default)]
pub struct StubSongStore;

impl SongStore for StubSongStore {
    fn load(&mut self, _slot: u8, _buf: &mut [u8]) -> Result<usize, CarbonError> {
        Err(CarbonError::SongLoadError)
    }

    fn save(&mut self, _slot: u8, _data: &[u8]) -> Result<(), CarbonError> {
        Err(CarbonError::SongSaveError)
    }
}

pub fn setup(mut pac: pac::Peripherals) -> (MidiIn, MidiOut, RingOscillator<Enabled>, Monotonic<Alarm0>) {
    let sio = Sio::new(pac.SIO);
    let pins = Pins::new(pac.IO_BANK0, pac.PADS_BANK0, sio.gpio_bank0, &mut pac.RESETS);

    let mut watchdog = Watchdog::new(pac.WATCHDOG);
    let clocks = clocks::init_clocks_and_plls(
        XOSC_CRYSTAL_FREQ,
        pac.XOSC,
        pac.CLOCKS,
        pac.PLL_SYS,
        pac.PLL_USB,
        &mut pac.RESETS,
        &mut watchdog,
    )
    .ok()
    .unwrap();

    let uart_pins = (pins.gpio0.into_mode::<FunctionUart>(), pins.gpio1.into_mode::<FunctionUart>());
    let uart = UartPeripheral::new(pac.UART0, uart_pins, &mut pac.RESETS)
        .enable(
            UartConfig::new(31_250u32.Hz(), DataBits::Eight, None, StopBits::One),
            clocks.peripheral_clock.freq(),
        )
        .unwrap();
    let (rx, tx) = uart.split();

    let rosc = RingOscillator::new(pac.ROSC).initialize();

    let mut timer = Timer::new(pac.TIMER, &mut pac.RESETS);
    let alarm = timer.alarm_0().unwrap();
    let monotonic = Monotonic::new(timer, alarm);

    (MidiIn(rx), MidiOut(tx), rosc, monotonic)
}
