//! The programmable interrupt controller: eight request lines, each with a
//! mask bit, a pending bit, and a configurable vector (the ID used to index
//! the interrupt vector table).
//!
//! Built in this crate's register-file style -- plain fields behind
//! getter/setter methods, same shape as `RegisterFile` in `registers.rs`.
//!
//! Port layout within its `10h`-`17h` mount (`memory::io`): `IMR IRR ISR
//! EOI` at `10h-13h`, then an indirect pair `INT_SELECT`/`INT_VALUE` at
//! `14h-15h` used to read or write one of the eight per-line vector
//! registers -- eight individually-addressable byte registers don't fit in
//! the four ports the map table leaves for them, so access is indirected
//! the way a real 8259's ICW/OCW sequencing multiplexes more state than it
//! has ports, a choice recorded in `DESIGN.md`.

use crate::memory::io::IoPort;
use crate::value::Byte;

const PORT_IMR: u8 = 0;
const PORT_IRR: u8 = 1;
const PORT_ISR: u8 = 2;
const PORT_EOI: u8 = 3;
const PORT_INT_SELECT: u8 = 4;
const PORT_INT_VALUE: u8 = 5;

const EOI_CODE: u8 = 0x20;

pub type ReservedCheck = fn(u8) -> bool;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Update {
    /// Nothing to dispatch this instruction boundary.
    None,
    /// Dispatch interrupt `id` (already cleared from IRR, set in ISR).
    Dispatch { line: u8, id: Byte },
    /// The configured vector for an otherwise-dispatchable line is reserved.
    ReservedInterrupt { line: u8, id: Byte },
}

pub struct Pic {
    imr: u8,
    irr: u8,
    isr: u8,
    eoi: u8,
    vectors: [u8; 8],
    selected_line: u8,
    reserved: ReservedCheck,
}

impl Pic {
    pub fn new() -> Pic {
        Pic::with_reserved_check(crate::isa::is_reserved_interrupt)
    }

    /// `reserved` decides, for a configured vector byte, whether dispatch to
    /// it is illegal. Defaults to `isa::is_reserved_interrupt` (IDs `0..8`).
    pub fn with_reserved_check(reserved: ReservedCheck) -> Pic {
        Pic {
            imr: 0xFF,
            irr: 0,
            isr: 0,
            eoi: 0,
            vectors: [0; 8],
            selected_line: 0,
            reserved,
        }
    }

    pub fn request(&mut self, line: u8) {
        self.irr |= 1 << line;
    }

    pub fn cancel(&mut self, line: u8) {
        self.irr &= !(1 << line);
    }

    pub fn set_vector(&mut self, line: u8, id: u8) {
        self.vectors[line as usize] = id;
    }

    pub fn vector(&self, line: u8) -> u8 {
        self.vectors[line as usize]
    }

    pub fn interrupts_enabled_mask(&self) -> u8 {
        self.imr
    }

    /// Runs the priority-resolution algorithm for one instruction boundary.
    /// `interrupt_flag` is the CPU's `IF`; it gates hardware dispatch the
    /// same way it gates every hardware line, independent of the PIC's own
    /// mask bits.
    pub fn update(&mut self, interrupt_flag: bool) -> Update {
        if self.isr != 0 && self.eoi == EOI_CODE {
            self.isr = 0;
            self.eoi = 0;
            return Update::None;
        }
        if self.isr != 0 || !interrupt_flag {
            return Update::None;
        }
        let ready = self.irr & !self.imr;
        if ready == 0 {
            return Update::None;
        }
        let line = ready.trailing_zeros() as u8;
        let id = self.vectors[line as usize];
        if (self.reserved)(id) {
            return Update::ReservedInterrupt {
                line,
                id: Byte::new(id),
            };
        }
        self.irr &= !(1 << line);
        self.isr |= 1 << line;
        self.eoi = 0;
        Update::Dispatch {
            line,
            id: Byte::new(id),
        }
    }
}

impl Default for Pic {
    fn default() -> Pic {
        Pic::new()
    }
}

impl IoPort for Pic {
    fn read(&mut self, port: u8) -> Byte {
        Byte::new(match port {
            PORT_IMR => self.imr,
            PORT_IRR => self.irr,
            PORT_ISR => self.isr,
            PORT_EOI => self.eoi,
            PORT_INT_SELECT => self.selected_line,
            PORT_INT_VALUE => self.vectors[(self.selected_line & 0x07) as usize],
            _ => 0,
        })
    }

    fn write(&mut self, port: u8, value: Byte) {
        let v = value.unsigned();
        match port {
            PORT_IMR => self.imr = v,
            PORT_IRR => self.irr = v,
            PORT_ISR => self.isr = v,
            PORT_EOI => self.eoi = v,
            PORT_INT_SELECT => self.selected_line = v & 0x07,
            PORT_INT_VALUE => self.vectors[(self.selected_line & 0x07) as usize] = v,
            _ => {}
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn dispatches_lowest_unmasked_line() {
        let mut pic = Pic::new();
        pic.set_vector(3, 0x50);
        pic.set_vector(1, 0x40);
        pic.write(PORT_IMR, Byte::new(0x00));
        pic.request(3);
        pic.request(1);
        assert_eq!(
            pic.update(true),
            Update::Dispatch {
                line: 1,
                id: Byte::new(0x40)
            }
        );
        assert_eq!(pic.isr, 0b0000_0010);
        assert_eq!(pic.irr, 0b0000_1000);
    }

    #[test]
    fn masked_line_is_skipped() {
        let mut pic = Pic::new();
        pic.set_vector(0, 0x40);
        pic.write(PORT_IMR, Byte::new(0b1111_1110));
        pic.request(0);
        assert_eq!(pic.update(true), Update::None);
    }

    #[test]
    fn isr_blocks_further_dispatch_until_eoi() {
        let mut pic = Pic::new();
        pic.set_vector(0, 0x40);
        pic.write(PORT_IMR, Byte::new(0));
        pic.request(0);
        assert!(matches!(pic.update(true), Update::Dispatch { .. }));
        pic.request(1);
        pic.set_vector(1, 0x41);
        assert_eq!(pic.update(true), Update::None);
        pic.write(PORT_EOI, Byte::new(EOI_CODE));
        assert_eq!(pic.update(true), Update::None); // this call clears ISR
        assert_eq!(pic.isr, 0);
        assert!(matches!(pic.update(true), Update::Dispatch { .. }));
    }

    #[test]
    fn if_zero_blocks_dispatch() {
        let mut pic = Pic::new();
        pic.write(PORT_IMR, Byte::new(0));
        pic.request(0);
        assert_eq!(pic.update(false), Update::None);
    }

    #[test]
    fn reserved_vector_is_fatal() {
        let mut pic = Pic::new();
        pic.write(PORT_IMR, Byte::new(0));
        pic.set_vector(0, 3); // reserved: INT 3 is CPU-managed
        pic.request(0);
        assert_eq!(
            pic.update(true),
            Update::ReservedInterrupt {
                line: 0,
                id: Byte::new(3)
            }
        );
    }

    #[test]
    fn indirect_vector_access_round_trips() {
        let mut pic = Pic::new();
        pic.write(PORT_INT_SELECT, Byte::new(5));
        pic.write(PORT_INT_VALUE, Byte::new(0x99));
        assert_eq!(pic.vector(5), 0x99);
        assert_eq!(pic.read(PORT_INT_VALUE), Byte::new(0x99));
    }
}
