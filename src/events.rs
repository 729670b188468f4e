//! The structured event payloads emitted while the CPU runs.
//!
//! `vonsim_sim::events::EventStream` is the pull-based iterator that paces
//! these for a consumer; this module only defines what gets emitted. Keeping
//! the type here (rather than in `vonsim-sim`) lets every layer that can
//! produce an event -- the CPU cycle, the memory/IO bus, the PIC -- share one
//! vocabulary instead of each crate inventing its own.

use crate::isa::WordRegister;
use crate::value::{Byte, Word};

#[derive(Clone, Copy, PartialEq, Eq, Debug, serde::Serialize)]
pub enum Phase {
    Fetching,
    FetchingOperands,
    Executing,
    Writeback,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Cpu,
    Memory,
    Pic,
    Pio,
    Timer,
    Handshake,
    Console,
}

/// One register write observed during a cycle, named by its word register
/// (byte-register writes are reported through their parent).
#[derive(Clone, Copy, PartialEq, Eq, Debug, serde::Serialize)]
pub struct RegisterWrite {
    pub register: WordRegister,
    pub value: Word,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, serde::Serialize)]
pub enum MemoryAccessKind {
    Read,
    Write,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, serde::Serialize)]
pub struct MemoryAccess {
    pub kind: MemoryAccessKind,
    pub address: Word,
    pub value: Byte,
}

#[derive(Clone, Debug, serde::Serialize)]
#[serde(tag = "kind")]
pub enum SimulatorEvent {
    /// A new instruction's fetch phase began at the given address.
    CycleStart { address: Word },
    /// The opcode byte was decoded; `mnemonic` is a human label, not a
    /// machine-readable tag (kept loose since the decode step already knows
    /// which mnemonic enum variant applies, but event consumers only want a
    /// name to display).
    Decode { opcode: Byte, mnemonic: &'static str },
    CycleUpdate { phase: Phase },
    RegisterWrite(RegisterWrite),
    Memory(MemoryAccess),
    IoUnmappedRead { port: Byte },
    IoUnmappedWrite { port: Byte, value: Byte },
    IoRead { port: Byte, value: Byte },
    IoWrite { port: Byte, value: Byte },
    InterruptDispatch { id: Byte, vector: Word, hardware: bool },
    Breakpoint,
    ConsoleReadRequest,
    ConsoleRead { value: Byte },
    ConsoleWrite { value: Byte },
    Halted,
    /// A recoverable-at-the-event-stream-level but fatal-to-the-run error.
    Error { code: &'static str, message: String },
}

impl SimulatorEvent {
    pub fn source(&self) -> Source {
        match self {
            SimulatorEvent::CycleStart { .. }
            | SimulatorEvent::Decode { .. }
            | SimulatorEvent::CycleUpdate { .. }
            | SimulatorEvent::RegisterWrite(_)
            | SimulatorEvent::Breakpoint
            | SimulatorEvent::Halted
            | SimulatorEvent::Error { .. } => Source::Cpu,
            SimulatorEvent::Memory(_) => Source::Memory,
            SimulatorEvent::IoUnmappedRead { .. } | SimulatorEvent::IoUnmappedWrite { .. } => {
                Source::Memory
            }
            SimulatorEvent::IoRead { .. } | SimulatorEvent::IoWrite { .. } => Source::Pio,
            SimulatorEvent::InterruptDispatch { .. } => Source::Pic,
            SimulatorEvent::ConsoleReadRequest
            | SimulatorEvent::ConsoleRead { .. }
            | SimulatorEvent::ConsoleWrite { .. } => Source::Console,
        }
    }
}
