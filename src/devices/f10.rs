//! The F10 button: a single PIC line with no other state.

use crate::pic::Pic;

/// The PIC line F10 is wired to. Fixed by this design, recorded in
/// `DESIGN.md`.
pub const F10_PIC_LINE: u8 = 0;

pub struct F10;

impl F10 {
    /// The external `f10.press()` poke.
    pub fn press(pic: &mut Pic) {
        pic.request(F10_PIC_LINE);
    }
}
