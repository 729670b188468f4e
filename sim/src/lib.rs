//! `vonsim-sim`: the `Simulator` facade (§6) over a `vonsim-core` CPU/bus
//! pair, loading programs assembled by `vonsim-asm`, exposing a pull-based
//! `SimulatorEvent` stream, and forwarding the device pokes a front end
//! drives interactively (`clock.tick()`, `f10.press()`, `keyboard.feed()`,
//! `switches.toggle()`, `printer.print()`/`clear()`, `screen.clear()`).
//!
//! Stays alive between calls and answers device pokes one at a time, since
//! this instruction set's interrupts and `INT 6` console read are
//! inherently interactive rather than run-to-completion.

pub mod devices;
pub mod events;
pub mod snapshot;

use vonsim_core::bus::Bus;
use vonsim_core::cpu::Core;
use vonsim_core::devices::{Clock, Switches, F10};
use vonsim_core::handshake::HANDSHAKE_PIC_LINE;
use vonsim_core::memory::{DataInit, Storage};
use vonsim_core::value::Word;

pub use devices::{DeviceConfig, Devices};
pub use events::EventStream;
pub use snapshot::ComputerState;
pub use vonsim_asm::error::Error as CompileError;
pub use vonsim_asm::resolve::Program;

/// What `load_program` takes: source text, the RAM-init policy (§4.6) and
/// which devices a front end should render for this exercise.
pub struct LoadRequest<'a> {
    pub source: &'a str,
    pub data_init: DataInit,
    pub devices: Vec<DeviceConfig>,
}

pub struct Simulator {
    core: Core,
    bus: Bus,
    devices: Devices,
    program: Option<Program>,
    visible_devices: Vec<DeviceConfig>,
}

impl Simulator {
    pub fn new() -> Simulator {
        Simulator {
            core: Core::new(),
            bus: Bus::new(DataInit::Clean),
            devices: Devices::new(),
            program: None,
            visible_devices: Vec::new(),
        }
    }

    /// Assembles `request.source` and, on success, replaces the whole
    /// machine state atomically: a failed compile never disturbs whatever
    /// program was previously loaded and running.
    pub fn load_program(&mut self, request: LoadRequest) -> Result<&Program, Vec<CompileError>> {
        let program = vonsim_asm::compile(request.source)?;

        let mut bus = Bus::new(request.data_init);
        bus.ram.load_image(program.image.iter().enumerate().map(|(i, b)| (i as u16, b)));

        self.bus = bus;
        self.core = Core::new();
        self.core.regs.ip = program.entry;
        self.devices.reset();
        self.visible_devices = request.devices;
        self.program = Some(program);
        Ok(self.program.as_ref().unwrap())
    }

    pub fn computer_state(&self) -> ComputerState {
        snapshot::capture(&self.core, &self.bus, &self.devices, &self.visible_devices)
    }

    /// Hands back a fresh event stream over the currently loaded program.
    /// Each call resumes from wherever the CPU last left off; dropping the
    /// stream mid-run (the consumer's `ExitReason::Cancelled`, per
    /// `vonsim_core::error`) simply stops pulling more events.
    pub fn start_cpu(&mut self) -> EventStream {
        EventStream::new(&mut self.core, &mut self.bus, &mut self.devices)
    }

    // -- device pokes ------------------------------------------------------

    pub fn clock_tick(&mut self) {
        let mut timer = self.bus.timer.borrow_mut();
        let mut pic = self.bus.pic.borrow_mut();
        Clock::tick(&mut timer, &mut pic);
    }

    pub fn f10_press(&mut self) {
        let mut pic = self.bus.pic.borrow_mut();
        F10::press(&mut pic);
    }

    pub fn keyboard_feed(&mut self, byte: vonsim_core::value::Byte) {
        self.devices.keyboard.feed(byte);
    }

    pub fn switches_toggle(&mut self, index: u8) {
        let mut pio = self.bus.pio.borrow_mut();
        Switches::toggle(&mut pio, index);
    }

    /// Returns `true` if the print actually consumed a latched byte.
    pub fn printer_print(&mut self) -> bool {
        let raise = {
            let mut handshake = self.bus.handshake.borrow_mut();
            self.devices.printer.print(&mut handshake)
        };
        if raise {
            self.bus.pic.borrow_mut().request(HANDSHAKE_PIC_LINE);
        }
        raise
    }

    pub fn printer_clear(&mut self) {
        self.devices.printer.clear();
    }

    pub fn screen_clear(&mut self) {
        self.devices.screen.clear();
    }

    pub fn ip(&self) -> Word {
        self.core.regs.ip
    }
}

impl Default for Simulator {
    fn default() -> Simulator {
        Simulator::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn request(source: &'static str) -> LoadRequest<'static> {
        LoadRequest { source, data_init: DataInit::Clean, devices: vec![DeviceConfig::PioSwitchesLeds] }
    }

    #[test]
    fn loads_and_runs_hello_counter() {
        let mut sim = Simulator::new();
        let source = "\
            ORG 2000h\n\
            counter: DB 0\n\
            MOV AL, counter\n\
            ADD AL, 1\n\
            MOV counter, AL\n\
            HLT\n\
            END\n";
        sim.load_program(request(source)).expect("should assemble");
        let events: Vec<_> = sim.start_cpu().collect();
        assert!(matches!(events.last(), Some(vonsim_core::events::SimulatorEvent::Halted)));
        let state = sim.computer_state();
        assert_eq!(state.memory[0x2000], 1);
    }

    #[test]
    fn loop_and_stack_scenario() {
        // Pushes 1, 2, 3 then pops into AX, BX, CX: last pushed pops first.
        let mut sim = Simulator::new();
        let source = "\
            ORG 2000h\n\
            MOV CX, 1\n\
            PUSH CX\n\
            MOV CX, 2\n\
            PUSH CX\n\
            MOV CX, 3\n\
            PUSH CX\n\
            POP AX\n\
            POP BX\n\
            POP CX\n\
            HLT\n\
            END\n";
        sim.load_program(request(source)).expect("should assemble");
        let initial_sp = sim.core.regs.word(vonsim_core::isa::WordRegister::SP).unsigned();
        let events: Vec<_> = sim.start_cpu().collect();
        assert!(matches!(events.last(), Some(vonsim_core::events::SimulatorEvent::Halted)));
        let state = sim.computer_state();
        assert_eq!(state.registers.ax, 3);
        assert_eq!(state.registers.bx, 2);
        assert_eq!(state.registers.cx, 1);
        assert_eq!(state.registers.sp, initial_sp);
    }

    #[test]
    fn reload_replaces_state_atomically() {
        let mut sim = Simulator::new();
        sim.load_program(request("ORG 2000h\nHLT\nEND\n")).unwrap();
        sim.clock_tick();
        let bad = sim.load_program(request("THIS IS NOT VALID\n"));
        assert!(bad.is_err());
        // Still holding the first program's state, not a half-reset one.
        assert_eq!(sim.ip().unsigned(), 0x2000);
    }

    #[test]
    fn console_read_suspends_and_resumes() {
        let mut sim = Simulator::new();
        let source = "\
            ORG 2000h\n\
            buf: DB 0\n\
            MOV BX, OFFSET buf\n\
            INT 6\n\
            HLT\n\
            END\n";
        sim.load_program(request(source)).unwrap();
        let mut stream = sim.start_cpu();
        let mut saw_request = false;
        let mut halted = false;
        while let Some(event) = stream.next() {
            match event {
                vonsim_core::events::SimulatorEvent::ConsoleReadRequest => {
                    saw_request = true;
                    stream.provide_console_byte(vonsim_core::value::Byte::new(b'Q'));
                }
                vonsim_core::events::SimulatorEvent::Halted => halted = true,
                _ => {}
            }
        }
        assert!(saw_request);
        assert!(halted);
    }
}
