//! The parallel I/O chip: two bidirectional 8-bit ports (`PA`/`PB`) each
//! with a direction register (`CA`/`CB`) deciding, bit by bit, whether the
//! CPU drives that bit (output, direction bit = 1) or an external device
//! does (input, direction bit = 0).
//!
//! No grounding-repo counterpart; built from scratch in the same
//! register-file style as `pic.rs`. Mounted at `30h`-`33h`: `PA PB CA CB`.

use crate::memory::io::IoPort;
use crate::value::Byte;

const PORT_PA: u8 = 0;
const PORT_PB: u8 = 1;
const PORT_CA: u8 = 2;
const PORT_CB: u8 = 3;

#[derive(Clone, Copy, Default, Debug)]
struct Port {
    /// Bits last driven by the CPU (meaningful only where `direction` is output).
    output: u8,
    /// Bits last driven by an external device (meaningful only where
    /// `direction` is input).
    input: u8,
    /// 1 = CPU-driven output bit, 0 = externally-driven input bit.
    direction: u8,
}

impl Port {
    fn read(&self) -> u8 {
        (self.output & self.direction) | (self.input & !self.direction)
    }

    fn cpu_write(&mut self, value: u8) {
        self.output = (self.output & !self.direction) | (value & self.direction);
    }

    fn external_write(&mut self, value: u8) {
        self.input = (self.input & self.direction) | (value & !self.direction);
    }
}

pub struct Pio {
    a: Port,
    b: Port,
}

impl Pio {
    pub fn new() -> Pio {
        Pio {
            a: Port::default(),
            b: Port::default(),
        }
    }

    pub fn port_a(&self) -> u8 {
        self.a.read()
    }

    pub fn port_b(&self) -> u8 {
        self.b.read()
    }

    /// Drives the externally-owned (input-configured) bits of `PA`, e.g.
    /// toggling a switch.
    pub fn drive_a(&mut self, value: u8) {
        self.a.external_write(value);
    }

    pub fn drive_b(&mut self, value: u8) {
        self.b.external_write(value);
    }
}

impl Default for Pio {
    fn default() -> Pio {
        Pio::new()
    }
}

impl IoPort for Pio {
    fn read(&mut self, port: u8) -> Byte {
        Byte::new(match port {
            PORT_PA => self.a.read(),
            PORT_PB => self.b.read(),
            PORT_CA => self.a.direction,
            PORT_CB => self.b.direction,
            _ => 0,
        })
    }

    fn write(&mut self, port: u8, value: Byte) {
        let v = value.unsigned();
        match port {
            PORT_PA => self.a.cpu_write(v),
            PORT_PB => self.b.cpu_write(v),
            PORT_CA => self.a.direction = v,
            PORT_CB => self.b.direction = v,
            _ => {}
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn output_bits_follow_cpu_writes() {
        let mut pio = Pio::new();
        pio.write(PORT_CA, Byte::new(0b1111_0000)); // high nibble output
        pio.write(PORT_PA, Byte::new(0b1010_1010));
        assert_eq!(pio.port_a(), 0b1010_0000);
    }

    #[test]
    fn input_bits_follow_external_drive() {
        let mut pio = Pio::new();
        pio.write(PORT_CA, Byte::new(0b1111_0000)); // low nibble input
        pio.drive_a(0b0000_1111);
        assert_eq!(pio.port_a(), 0b0000_1111);
    }

    #[test]
    fn cpu_write_does_not_affect_input_bits() {
        let mut pio = Pio::new();
        pio.write(PORT_CA, Byte::new(0b0000_1111)); // low nibble output, high nibble input
        pio.drive_a(0b1010_0000);
        pio.write(PORT_PA, Byte::new(0b0000_1111));
        assert_eq!(pio.port_a(), 0b1010_1111);
        pio.write(PORT_PA, Byte::new(0b1111_1111));
        assert_eq!(pio.port_a(), 0b1010_1111);
    }
}
