//! The pull-based event stream `Simulator::start_cpu` hands back.
//!
//! An explicit state machine implementing `Iterator<Item = SimulatorEvent>`,
//! favoring explicit continuations over native generators: `INT 6` suspends
//! `Core::step` rather than blocking a thread, and `next()` returns `None`
//! until the consumer supplies the awaited byte through
//! `provide_console_byte`, at which point iteration resumes exactly where
//! it left off.

use std::collections::VecDeque;

use vonsim_core::bus::Bus;
use vonsim_core::cpu::{Core, StepOutcome};
use vonsim_core::events::SimulatorEvent;
use vonsim_core::value::Byte;

use crate::devices::Devices;

pub struct EventStream<'a> {
    core: &'a mut Core,
    bus: &'a mut Bus,
    devices: &'a mut Devices,
    queue: VecDeque<SimulatorEvent>,
    awaiting_console: bool,
    done: bool,
}

impl<'a> EventStream<'a> {
    pub(crate) fn new(core: &'a mut Core, bus: &'a mut Bus, devices: &'a mut Devices) -> EventStream<'a> {
        EventStream {
            core,
            bus,
            devices,
            queue: VecDeque::new(),
            awaiting_console: false,
            done: false,
        }
    }

    /// Whether the stream is blocked on `INT 6` and waiting for this to be
    /// called before it will produce any more events.
    pub fn is_awaiting_console(&self) -> bool {
        self.awaiting_console
    }

    /// Resumes a stream suspended by `ConsoleReadRequest`. A no-op if the
    /// stream isn't actually waiting.
    pub fn provide_console_byte(&mut self, byte: Byte) {
        if self.awaiting_console {
            self.awaiting_console = false;
            self.pump(Some(byte));
        }
    }

    fn pump(&mut self, console_byte: Option<Byte>) {
        match self.core.step(self.bus, console_byte) {
            StepOutcome::Running(events) => self.queue.extend(events),
            StepOutcome::AwaitingConsole(events) => {
                self.queue.extend(events);
                self.awaiting_console = true;
            }
            StepOutcome::Halted(events) => {
                self.queue.extend(events);
                self.done = true;
            }
            StepOutcome::Fatal { events, error } => {
                self.queue.extend(events);
                self.queue.push_back(SimulatorEvent::Error {
                    code: error.code(),
                    message: error.to_string(),
                });
                self.done = true;
            }
        }
    }
}

impl<'a> Iterator for EventStream<'a> {
    type Item = SimulatorEvent;

    fn next(&mut self) -> Option<SimulatorEvent> {
        loop {
            if let Some(event) = self.queue.pop_front() {
                if let SimulatorEvent::ConsoleWrite { value } = &event {
                    self.devices.screen.write(*value);
                }
                return Some(event);
            }
            if self.done || self.awaiting_console {
                return None;
            }
            self.pump(None);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use vonsim_core::memory::{DataInit, Storage};
    use vonsim_core::value::Word;

    /// `HLT` at address 0, entry point 0.
    fn halt_bus() -> Bus {
        let mut bus = Bus::new(DataInit::Clean);
        let opcode = vonsim_core::isa::zeroary_opcode(vonsim_core::isa::ZeroaryMnemonic::HLT);
        bus.write_byte(0, Byte::new(opcode));
        bus
    }

    #[test]
    fn drains_to_halted_event() {
        let mut core = Core::new();
        core.regs.ip = Word::new(0);
        let mut bus = halt_bus();
        let mut devices = Devices::new();
        let stream = EventStream::new(&mut core, &mut bus, &mut devices);
        let events: Vec<_> = stream.collect();
        assert!(matches!(events.last(), Some(SimulatorEvent::Halted)));
    }

    #[test]
    fn console_write_events_land_in_screen() {
        let mut core = Core::new();
        core.regs.ip = Word::new(0);
        let mut bus = halt_bus();
        let mut devices = Devices::new();
        {
            let mut stream = EventStream::new(&mut core, &mut bus, &mut devices);
            stream.queue.push_back(SimulatorEvent::ConsoleWrite { value: Byte::new(b'A') });
            stream.next();
        }
        assert_eq!(devices.screen.contents(), "A");
    }
}
