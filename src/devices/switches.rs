//! Toggle switches, wired onto `PIO` port A's input-configured bits.

use crate::pio::Pio;

pub struct Switches;

impl Switches {
    /// Flips switch `index` (0-7). Only has effect on bits `CA` has
    /// configured as input; an output-configured bit silently ignores the
    /// toggle, same as real hardware wired the wrong way.
    pub fn toggle(pio: &mut Pio, index: u8) {
        let mask = 1u8 << (index & 0x07);
        let current = pio.port_a();
        pio.drive_a(current ^ mask);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn toggle_flips_input_bit() {
        let mut pio = Pio::new();
        // CA defaults to all-input (0), so all of PA is switch-driven.
        assert_eq!(pio.port_a(), 0);
        Switches::toggle(&mut pio, 2);
        assert_eq!(pio.port_a(), 0b0000_0100);
        Switches::toggle(&mut pio, 2);
        assert_eq!(pio.port_a(), 0);
    }
}
