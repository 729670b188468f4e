//! The small family of external devices the simulator façade pokes:
//! switches, LEDs, keyboard, screen, printer, clock, and the F10 button.
//!
//! None of these have a grounding-repo counterpart. Most are thin,
//! stateless facades over `Pio`/`Handshake`/`Timer`/`Pic`, matching how the
//! spec describes them as views onto those chips rather than independent
//! state machines; `Keyboard`, `Screen`, and `Printer` hold the byte/text
//! buffers the chips themselves don't model.

pub mod clock;
pub mod f10;
pub mod keyboard;
pub mod leds;
pub mod printer;
pub mod screen;
pub mod switches;

pub use clock::Clock;
pub use f10::F10;
pub use keyboard::Keyboard;
pub use leds::Leds;
pub use printer::Printer;
pub use screen::Screen;
pub use switches::Switches;
