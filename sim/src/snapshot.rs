//! The JSON-facing view of a running machine: `Simulator::computer_state`'s
//! return value, the `getComputerState()` half of the facade (§6).

use vonsim_core::bus::Bus;
use vonsim_core::cpu::Core;
use vonsim_core::isa::WordRegister;
use vonsim_core::registers::Flags;

use crate::devices::{DeviceConfig, Devices};

#[derive(Clone, Copy, serde::Serialize)]
pub struct Registers {
    pub ax: u16,
    pub cx: u16,
    pub dx: u16,
    pub bx: u16,
    pub sp: u16,
    pub ip: u16,
}

#[derive(Clone, serde::Serialize)]
pub struct ComputerState {
    pub registers: Registers,
    pub flags: Flags,
    /// The full `RAM_SIZE` image, byte for byte.
    pub memory: Vec<u8>,
    pub screen: String,
    pub printer: String,
    pub keyboard_pending: Option<u8>,
    pub leds: u8,
    pub switches: u8,
    pub devices: Vec<DeviceConfig>,
}

pub fn capture(core: &Core, bus: &Bus, devices: &Devices, visible: &[DeviceConfig]) -> ComputerState {
    let pio = bus.pio.borrow();
    ComputerState {
        registers: Registers {
            ax: core.regs.word(WordRegister::AX).unsigned(),
            cx: core.regs.word(WordRegister::CX).unsigned(),
            dx: core.regs.word(WordRegister::DX).unsigned(),
            bx: core.regs.word(WordRegister::BX).unsigned(),
            sp: core.regs.word(WordRegister::SP).unsigned(),
            ip: core.regs.ip.unsigned(),
        },
        flags: core.regs.flags,
        memory: bus.ram.as_slice().to_vec(),
        screen: devices.screen.contents().to_string(),
        printer: devices.printer.contents().to_string(),
        keyboard_pending: devices.keyboard.peek().map(|b| b.unsigned()),
        leds: vonsim_core::devices::Leds::state(&pio),
        switches: pio.port_a(),
        devices: visible.to_vec(),
    }
}
