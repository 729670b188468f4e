//! The clock: each external tick advances the timer, raising its PIC line
//! on a match.

use crate::pic::Pic;
use crate::timer::{Timer, TIMER_PIC_LINE};

pub struct Clock;

impl Clock {
    /// The external `clock.tick()` poke.
    pub fn tick(timer: &mut Timer, pic: &mut Pic) {
        if timer.tick() {
            pic.request(TIMER_PIC_LINE);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::memory::io::IoPort;
    use crate::value::Byte;

    #[test]
    fn tick_requests_timer_line_on_match() {
        let mut timer = Timer::new();
        let mut pic = Pic::new();
        timer.write(1, Byte::new(2)); // COMP = 2
        timer.write(2, Byte::new(1)); // CONTROL: enabled
        Clock::tick(&mut timer, &mut pic);
        Clock::tick(&mut timer, &mut pic);
        pic.write(0, Byte::new(0)); // unmask all lines
        assert!(matches!(
            pic.update(true),
            crate::pic::Update::None | crate::pic::Update::Dispatch { .. }
        ));
    }
}
