//! The timer: a free-running counter compared against a target, raising a
//! fixed PIC line when they match.
//!
//! No grounding-repo counterpart; built from scratch. Mounted at
//! `20h`-`23h`: `CONT COMP CONTROL`, where `CONTROL` bit 0 is the enable
//! flag (the map table leaves a byte of slack here; `src/pic.rs` documents
//! the same kind of invented-but-consistent choice for its own layout).

use crate::memory::io::IoPort;
use crate::value::Byte;

const PORT_CONT: u8 = 0;
const PORT_COMP: u8 = 1;
const PORT_CONTROL: u8 = 2;

/// The PIC line the timer is wired to. Fixed by this design (§4.8 leaves
/// line assignment unspecified), recorded in `DESIGN.md`.
pub const TIMER_PIC_LINE: u8 = 1;

pub struct Timer {
    cont: u8,
    comp: u8,
    enabled: bool,
}

impl Timer {
    pub fn new() -> Timer {
        Timer {
            cont: 0,
            comp: 0,
            enabled: false,
        }
    }

    /// Advances the counter by one tick. Returns `true` if it now matches
    /// `COMP` and the timer is enabled -- the caller is responsible for
    /// raising `TIMER_PIC_LINE` on the PIC.
    pub fn tick(&mut self) -> bool {
        self.cont = self.cont.wrapping_add(1);
        self.enabled && self.cont == self.comp
    }
}

impl Default for Timer {
    fn default() -> Timer {
        Timer::new()
    }
}

impl IoPort for Timer {
    fn read(&mut self, port: u8) -> Byte {
        Byte::new(match port {
            PORT_CONT => self.cont,
            PORT_COMP => self.comp,
            PORT_CONTROL => self.enabled as u8,
            _ => 0,
        })
    }

    fn write(&mut self, port: u8, value: Byte) {
        let v = value.unsigned();
        match port {
            PORT_CONT => self.cont = v,
            PORT_COMP => self.comp = v,
            PORT_CONTROL => self.enabled = v & 1 != 0,
            _ => {}
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fires_only_when_enabled_and_matching() {
        let mut timer = Timer::new();
        timer.write(PORT_COMP, Byte::new(3));
        assert!(!timer.tick()); // disabled
        timer.write(PORT_CONTROL, Byte::new(1));
        timer.write(PORT_CONT, Byte::new(0));
        assert!(!timer.tick());
        assert!(!timer.tick());
        assert!(timer.tick());
    }

    #[test]
    fn counter_wraps_mod_256() {
        let mut timer = Timer::new();
        timer.write(PORT_CONT, Byte::new(255));
        timer.tick();
        assert_eq!(timer.read(PORT_CONT), Byte::new(0));
    }
}
