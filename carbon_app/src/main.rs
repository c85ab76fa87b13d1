#![no_std]
#![no_main]

mod peripherals;

use panic_probe as _;

// RTIC app module; responsible for interfacing with the hardware and
// feeding bytes/ticks into `carbon_core`. Task layout follows the
// reference firmware's application shell: a high-priority hardware task
// bound to the MIDI UART interrupt, a self-rescheduling realtime-cadence
// task, and a lower-priority panel task.
#[rtic::app(
    device = rp_pico::hal::pac,
    peripherals = true,
    dispatchers = [USBCTRL_IRQ, DMA_IRQ_0, DMA_IRQ_1]
)]
mod app {
    use defmt::{self, debug, error, info, trace};
    use defmt_rtt as _;
    use fugit::MicrosDurationU64;

    use carbon_core::clock::{Clock, ClockSink, ClockSource};
    use carbon_core::config::TASK_US;
    use carbon_core::control::{self, ControlEvent};
    use carbon_core::engine::{Engine, EngineSink};
    use carbon_core::external::ByteTransport;
    use carbon_core::message::{Message, Port};
    use carbon_core::outproc::OutProc;
    use carbon_core::random::HostRandom;
    use carbon_core::song::Song;
    use carbon_core::stream::StreamParser;

    use crate::peripherals::{self, MidiIn, MidiOut, StubAnalogOut, StubDisplay, StubPanelInput};

    const TASK_PERIOD: MicrosDurationU64 = MicrosDurationU64::micros(TASK_US);

    #[monotonic(binds = TIMER_IRQ_0, default = true)]
    type TimerMonotonic = rp_pico::hal::timer::monotonic::Monotonic<rp_pico::hal::timer::Alarm0>;

    /// Collects the messages a tick produces so the realtime task can hand
    /// them to `midi_send`, one spawn per message, mirroring the reference
    /// firmware's immediate-dispatch pattern.
    struct SpawnSink;

    impl EngineSink for SpawnSink {
        fn send(&mut self, msg: Message) {
            if midi_send::spawn(msg).is_err() {
                error!("could not spawn midi_send");
            }
        }
    }

    /// Tracks the clock callbacks for one `timer_task` call so the following
    /// `engine.run_tick` sees the real tick count and beat-crossing flag
    /// instead of a hardcoded `(0, false)`.
    #[derive(Default)]
    struct TickDriver {
        tick_count: u32,
        beat_cross: bool,
    }

    impl ClockSink for TickDriver {
        fn on_tick(&mut self, tick_count: u32) {
            trace!("[clock] tick={}", tick_count);
            self.tick_count = tick_count;
        }

        fn on_beat(&mut self, tick_count: u32) {
            self.tick_count = tick_count;
            self.beat_cross = true;
        }

        fn on_run_state_changed(&mut self, running: bool) {
            info!("[clock] run_state={}", running);
        }
    }

    #[shared]
    struct Shared {
        clock: Clock,
        engine: Engine,
    }

    #[local]
    struct Local {
        midi_in: MidiIn,
        midi_out: MidiOut,
        stream_parser: StreamParser,
        out_proc: OutProc,
        rng: HostRandom,
        analog_out: StubAnalogOut,
        panel_input: StubPanelInput,
        display: StubDisplay,
    }

    #[init]
    fn init(ctx: init::Context) -> (Shared, Local, init::Monotonics) {
        info!("[init] carbon starting");

        let (midi_in, midi_out, _rosc, monotonic_timer) = peripherals::setup(ctx.device);

        let mut clock = Clock::new();
        clock.set_source(ClockSource::Internal);
        clock.set_tempo_bpm(120.0);

        let engine = Engine::new(Song::default());

        realtime_tick::spawn().expect("realtime_tick::spawn should succeed");

        info!("[init] complete");

        (
            Shared { clock, engine },
            Local {
                midi_in,
                midi_out,
                stream_parser: StreamParser::new(Port::DinIn1),
                out_proc: OutProc::new(),
                rng: HostRandom::default(),
                analog_out: StubAnalogOut::default(),
                panel_input: StubPanelInput::default(),
                display: StubDisplay::default(),
            },
            init::Monotonics(monotonic_timer),
        )
    }

    /// Handle MIDI input. Feeds raw bytes into the port-stream parser and,
    /// once a full message resolves, hands it either to the remote-control
    /// decoder (control channels) or to the engine's live-note router
    /// (keyboard channels).
    #[task(
        binds = UART0_IRQ,
        priority = 4,
        shared = [engine],
        local = [midi_in, stream_parser]
    )]
    fn uart0_irq(mut ctx: uart0_irq::Context) {
        while let Some(byte) = ctx.local.midi_in.read_byte() {
            if let Some(msg) = ctx.local.stream_parser.feed(byte) {
                let chan = msg.status & 0x0F;
                let status = msg.status & 0xF0;
                let is_note_on = status == 0x90;
                if chan < control::CHAN_OMNI {
                    ctx.shared.engine.lock(|engine| {
                        let mut sink = SpawnSink;
                        if is_note_on {
                            engine.handle_live_note_on(msg.data0, msg.data1, &mut sink);
                        } else if status == 0x80 {
                            engine.handle_live_note_off(msg.data0, &mut sink);
                        }
                    });
                } else if let Some(event) = control::decode(chan, is_note_on, msg.data0, msg.data1) {
                    ctx.shared.engine.lock(|engine| apply_control_event(engine, event));
                }
            }
        }
    }

    fn apply_control_event(engine: &mut Engine, event: ControlEvent) {
        match event {
            ControlEvent::Run => engine.set_run_state(true),
            ControlEvent::Stop => engine.set_run_state(false),
            ControlEvent::TriggerScene(scene) => engine.request_scene(scene),
            _ => debug!("[control] unhandled event"),
        }
    }

    /// Send one MIDI message. A task so higher-priority work can interrupt it.
    #[task(priority = 3, capacity = 64, local = [midi_out])]
    fn midi_send(ctx: midi_send::Context, message: Message) {
        let bytes = message.as_bytes();
        for &byte in &bytes[..message.len as usize] {
            if ctx.local.midi_out.write_byte(byte).is_err() {
                error!("midi_out write failed");
                break;
            }
        }
    }

    /// The realtime cadence: clock tick, engine tick, output processing,
    /// rescheduled every `TASK_US` microseconds.
    #[task(priority = 2, shared = [clock, engine], local = [out_proc, rng])]
    fn realtime_tick(ctx: realtime_tick::Context) {
        let realtime_tick::SharedResources { mut clock, mut engine } = ctx.shared;
        let mut driver = TickDriver::default();

        clock.lock(|clock| {
            clock.timer_task(&mut driver);
        });

        let mut sink = SpawnSink;
        engine.lock(|engine| {
            engine.run_tick(driver.tick_count, driver.beat_cross, &mut sink, ctx.local.rng);
        });

        realtime_tick::spawn_after(TASK_PERIOD).expect("realtime_tick::spawn_after should succeed");
    }

    /// Poll the front panel (stubbed) on a lower-priority cadence; placeholder
    /// for the real panel-to-control wiring a concrete device would add.
    #[task(priority = 1, local = [panel_input, display])]
    fn panel_poll(ctx: panel_poll::Context) {
        use carbon_core::external::{Display as _, PanelInput as _};
        if ctx.local.panel_input.poll().is_some() {
            ctx.local.display.flush();
        }
    }

    #[idle]
    fn idle(_: idle::Context) -> ! {
        loop {
            cortex_m::asm::nop();
        }
    }
}
