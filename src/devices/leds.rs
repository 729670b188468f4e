//! LEDs: a read-only view onto `PIO` port B's output-configured bits.

use crate::pio::Pio;

pub struct Leds;

impl Leds {
    pub fn state(pio: &Pio) -> u8 {
        pio.port_b()
    }
}
