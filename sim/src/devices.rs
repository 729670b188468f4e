//! The external devices `Simulator` owns outright: `Keyboard`, `Screen` and
//! `Printer` hold state the bus's chips don't (byte latches, text buffers).
//! `Clock`, `F10`, `Switches` and `Leds` are stateless facades over chips the
//! `Bus` already owns, so `Simulator`'s pokes for those reach straight into
//! `bus.pic`/`bus.pio`/`bus.timer` instead of going through this struct.

use vonsim_core::devices::{Keyboard, Printer, Screen};

/// Which devices a loaded program wants visible, echoed back verbatim in
/// `getComputerState()` so a front end knows what to render. `vonsim-core`'s
/// chips (`Pic`, `Pio`, `Timer`, `Handshake`) are always mounted on the bus
/// regardless of this choice -- it is a display hint, not a wiring switch,
/// the same way a real VonSim exercise always has all four chips present but
/// only some are connected to anything in a given circuit diagram.
#[derive(Clone, Copy, PartialEq, Eq, Debug, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceConfig {
    PioSwitchesLeds,
    PioPrinter,
    HandshakePrinter,
}

#[derive(Default)]
pub struct Devices {
    pub keyboard: Keyboard,
    pub screen: Screen,
    pub printer: Printer,
}

impl Devices {
    pub fn new() -> Devices {
        Devices::default()
    }

    pub fn reset(&mut self) {
        self.keyboard = Keyboard::new();
        self.screen = Screen::new();
        self.printer = Printer::new();
    }
}
