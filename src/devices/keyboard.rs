//! The keyboard: latches the last character fed to it, consumed by `INT 6`
//! reads (via `vonsim_sim::events::EventStream::provide_console_byte`) or by
//! the handshake protocol.

use crate::value::Byte;

#[derive(Default)]
pub struct Keyboard {
    last_char: Option<Byte>,
}

impl Keyboard {
    pub fn new() -> Keyboard {
        Keyboard::default()
    }

    /// The external `keyboard.feed(byte)` poke.
    pub fn feed(&mut self, byte: Byte) {
        self.last_char = Some(byte);
    }

    pub fn peek(&self) -> Option<Byte> {
        self.last_char
    }

    /// Consumes and returns the latched character, if any.
    pub fn take(&mut self) -> Option<Byte> {
        self.last_char.take()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn feed_then_take() {
        let mut kb = Keyboard::new();
        assert_eq!(kb.take(), None);
        kb.feed(Byte::new(b'A'));
        assert_eq!(kb.peek(), Some(Byte::new(b'A')));
        assert_eq!(kb.take(), Some(Byte::new(b'A')));
        assert_eq!(kb.take(), None);
    }
}
