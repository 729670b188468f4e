//! Runtime (post-assembly) error and exit-reason types: hand-rolled enums
//! with manual `Display` impls rather than a `thiserror` derive.

use std::fmt;

/// Why a run stopped, successfully or not.
#[derive(Clone, Copy, PartialEq, Eq, Debug, serde::Serialize)]
#[serde(tag = "reason")]
pub enum ExitReason {
    /// `INT 0` / `HLT`.
    Halted,
    /// The consumer dropped the event stream at an instruction boundary.
    Cancelled,
}

/// A runtime error: something the `Program` itself cannot prevent at
/// compile time (an address resolver guarantees layout fits in RAM, but it
/// cannot guarantee a `MOV [BX], AL` executed with a garbage `BX` stays in
/// range).
#[derive(Clone, Copy, PartialEq, Eq, Debug, serde::Serialize)]
#[serde(tag = "code")]
pub enum RuntimeError {
    BadMemoryAccess { address: u16 },
    StackOverflow,
    StackUnderflow,
    ReservedInterrupt { id: u8 },
    InvalidOpcode { byte: u8 },
}

impl RuntimeError {
    pub fn code(&self) -> &'static str {
        match self {
            RuntimeError::BadMemoryAccess { .. } => "bad-memory-access",
            RuntimeError::StackOverflow => "stack-overflow",
            RuntimeError::StackUnderflow => "stack-underflow",
            RuntimeError::ReservedInterrupt { .. } => "reserved-interrupt",
            RuntimeError::InvalidOpcode { .. } => "invalid-opcode",
        }
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RuntimeError::BadMemoryAccess { address } => {
                write!(f, "memory access out of range at {:#06x}", address)
            }
            RuntimeError::StackOverflow => write!(f, "stack pointer underflowed past 0000h"),
            RuntimeError::StackUnderflow => write!(f, "stack pointer exceeded top of memory"),
            RuntimeError::ReservedInterrupt { id } => {
                write!(f, "interrupt vector {} is reserved for CPU-managed interrupts", id)
            }
            RuntimeError::InvalidOpcode { byte } => write!(f, "invalid opcode byte {:#04x}", byte),
        }
    }
}

impl std::error::Error for RuntimeError {}
