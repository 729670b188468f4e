//! The handshake controller: a strobe-based byte handoff to the printer.
//!
//! No grounding-repo counterpart; built from scratch. Mounted at
//! `40h`-`41h`: `DATA STATE`, where `STATE` bit 0 is `busy` and bit 1 is the
//! interrupt-enable flag (a two-bit encoding of "ready/strobe/interrupt
//! enable" per §4.8; `busy` plays the role of strobe/ready here since the
//! controller has exactly one in-flight byte at a time).

use crate::memory::io::IoPort;
use crate::value::Byte;

const PORT_DATA: u8 = 0;
const PORT_STATE: u8 = 1;

const STATE_BUSY: u8 = 1 << 0;
const STATE_INTERRUPT_ENABLE: u8 = 1 << 1;

/// The PIC line the handshake controller is wired to. Fixed by this
/// design, recorded in `DESIGN.md`.
pub const HANDSHAKE_PIC_LINE: u8 = 2;

pub struct Handshake {
    data: u8,
    state: u8,
}

impl Handshake {
    pub fn new() -> Handshake {
        Handshake { data: 0, state: 0 }
    }

    pub fn is_busy(&self) -> bool {
        self.state & STATE_BUSY != 0
    }

    pub fn interrupt_enabled(&self) -> bool {
        self.state & STATE_INTERRUPT_ENABLE != 0
    }

    pub fn latched_byte(&self) -> u8 {
        self.data
    }

    /// The external "printer done" poke: clears `busy`. Returns `true` if
    /// the caller should now raise `HANDSHAKE_PIC_LINE`.
    pub fn printer_done(&mut self) -> bool {
        let was_busy = self.is_busy();
        self.state &= !STATE_BUSY;
        was_busy && self.interrupt_enabled()
    }
}

impl Default for Handshake {
    fn default() -> Handshake {
        Handshake::new()
    }
}

impl IoPort for Handshake {
    fn read(&mut self, port: u8) -> Byte {
        Byte::new(match port {
            PORT_DATA => self.data,
            PORT_STATE => self.state,
            _ => 0,
        })
    }

    fn write(&mut self, port: u8, value: Byte) {
        match port {
            PORT_DATA => {
                if !self.is_busy() {
                    self.data = value.unsigned();
                    self.state |= STATE_BUSY;
                }
            }
            PORT_STATE => {
                // Only the interrupt-enable bit is CPU-writable; busy is
                // controller-owned.
                let enable = value.unsigned() & STATE_INTERRUPT_ENABLE;
                self.state = (self.state & STATE_BUSY) | enable;
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn write_latches_and_sets_busy() {
        let mut hs = Handshake::new();
        hs.write(PORT_DATA, Byte::new(0x41));
        assert!(hs.is_busy());
        assert_eq!(hs.latched_byte(), 0x41);
    }

    #[test]
    fn write_while_busy_is_ignored() {
        let mut hs = Handshake::new();
        hs.write(PORT_DATA, Byte::new(0x41));
        hs.write(PORT_DATA, Byte::new(0x42));
        assert_eq!(hs.latched_byte(), 0x41);
    }

    #[test]
    fn printer_done_clears_busy_and_signals_if_enabled() {
        let mut hs = Handshake::new();
        hs.write(PORT_STATE, Byte::new(STATE_INTERRUPT_ENABLE));
        hs.write(PORT_DATA, Byte::new(0x41));
        assert!(hs.printer_done());
        assert!(!hs.is_busy());
    }

    #[test]
    fn printer_done_without_interrupt_enable_does_not_signal() {
        let mut hs = Handshake::new();
        hs.write(PORT_DATA, Byte::new(0x41));
        assert!(!hs.printer_done());
    }
}
