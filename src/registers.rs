//! CPU register file: `AX CX DX BX SP IP IR MAR MBR` plus the flags word.
//!
//! Byte-register halves (`AL/AH`, ...) are views into the same storage as
//! their parent word register, following the 8088's own aliasing rather than
//! keeping two copies in sync by hand.

use crate::isa::{ByteRegister, WordRegister};
use crate::value::{Byte, Word};

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, serde::Serialize)]
pub struct Flags {
    pub carry: bool,
    pub zero: bool,
    pub sign: bool,
    pub overflow: bool,
    pub interrupt: bool,
}

impl Flags {
    /// Recomputes `zero`/`sign` from a just-produced word result. Callers
    /// are responsible for `carry`/`overflow`, which depend on the specific
    /// operation, not just its result.
    pub fn set_from_word_result(&mut self, result: Word) {
        self.zero = result.unsigned() == 0;
        self.sign = result.bit(15);
    }

    pub fn set_from_byte_result(&mut self, result: Byte) {
        self.zero = result.unsigned() == 0;
        self.sign = result.bit(7);
    }
}

#[derive(Clone, Debug, Default)]
pub struct RegisterFile {
    ax: Word,
    cx: Word,
    dx: Word,
    bx: Word,
    sp: Word,
    /// Instruction pointer.
    pub ip: Word,
    /// Instruction register: the opcode byte currently being decoded.
    pub ir: Byte,
    /// Memory address register: the address of the operand currently in flight.
    pub mar: Word,
    /// Memory buffer register: the operand byte/word currently in flight.
    pub mbr: Word,
    pub flags: Flags,
}

impl RegisterFile {
    pub fn new() -> RegisterFile {
        RegisterFile::default()
    }

    pub fn word(&self, reg: WordRegister) -> Word {
        match reg {
            WordRegister::AX => self.ax,
            WordRegister::CX => self.cx,
            WordRegister::DX => self.dx,
            WordRegister::BX => self.bx,
            WordRegister::SP => self.sp,
        }
    }

    pub fn set_word(&mut self, reg: WordRegister, value: Word) {
        match reg {
            WordRegister::AX => self.ax = value,
            WordRegister::CX => self.cx = value,
            WordRegister::DX => self.dx = value,
            WordRegister::BX => self.bx = value,
            WordRegister::SP => self.sp = value,
        }
    }

    pub fn byte(&self, reg: ByteRegister) -> Byte {
        let parent = self.word(reg.parent());
        if reg.is_high_half() {
            parent.high()
        } else {
            parent.low()
        }
    }

    pub fn set_byte(&mut self, reg: ByteRegister, value: Byte) {
        let parent = reg.parent();
        let current = self.word(parent);
        let updated = if reg.is_high_half() {
            current.with_high(value)
        } else {
            current.with_low(value)
        };
        self.set_word(parent, updated);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn byte_halves_alias_parent_word() {
        let mut regs = RegisterFile::new();
        regs.set_word(WordRegister::AX, Word::new(0x1234));
        assert_eq!(regs.byte(ByteRegister::AL).unsigned(), 0x34);
        assert_eq!(regs.byte(ByteRegister::AH).unsigned(), 0x12);

        regs.set_byte(ByteRegister::AL, Byte::new(0xFF));
        assert_eq!(regs.word(WordRegister::AX), Word::new(0x12FF));

        regs.set_byte(ByteRegister::AH, Byte::new(0x00));
        assert_eq!(regs.word(WordRegister::AX), Word::new(0x00FF));
    }

    #[test]
    fn flags_from_results() {
        let mut flags = Flags::default();
        flags.set_from_word_result(Word::new(0));
        assert!(flags.zero);
        assert!(!flags.sign);

        flags.set_from_word_result(Word::new(0x8000));
        assert!(!flags.zero);
        assert!(flags.sign);
    }
}
