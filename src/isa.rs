//! The byte-exact instruction encoding shared by the assembler (which emits
//! it) and the CPU core (which decodes it).
//!
//! Putting this table in `vonsim-core` rather than duplicating it in the
//! assembler, and having the assembler depend on this crate for it, keeps
//! one authoritative definition of "what a byte means" shared by both ends
//! of the pipe, so they cannot silently drift apart.
//!
//! The concrete opcode byte values are this project's own internal,
//! self-consistent encoding (see `DESIGN.md`): every instruction class has
//! a fixed length and a five-bit group plus size/mode bits, but the exact
//! values are not drawn from any external reference table.

use crate::value::{Byte, Word};
use num_derive::{FromPrimitive, ToPrimitive};
use util::{EnumFromStr, ParseEnumError};
use util_derive::EnumFromStr;

/// An 8-bit register half: `AL, CL, DL, BL, AH, CH, DH, BH`, in that index order.
#[derive(Clone, Copy, PartialEq, Eq, Debug, FromPrimitive, ToPrimitive, EnumFromStr)]
pub enum ByteRegister {
    AL,
    CL,
    DL,
    BL,
    AH,
    CH,
    DH,
    BH,
}

/// A 16-bit register: `AX, CX, DX, BX, SP`, in that index order.
#[derive(Clone, Copy, PartialEq, Eq, Debug, FromPrimitive, ToPrimitive, EnumFromStr)]
pub enum WordRegister {
    AX,
    CX,
    DX,
    BX,
    SP,
}

impl ByteRegister {
    pub fn index(self) -> u8 {
        num_traits::ToPrimitive::to_u8(&self).unwrap()
    }

    pub fn from_index(index: u8) -> Option<ByteRegister> {
        num_traits::FromPrimitive::from_u8(index)
    }

    /// The word register this half belongs to (`AL`/`AH` -> `AX`, ...).
    pub fn parent(self) -> WordRegister {
        match self {
            ByteRegister::AL | ByteRegister::AH => WordRegister::AX,
            ByteRegister::CL | ByteRegister::CH => WordRegister::CX,
            ByteRegister::DL | ByteRegister::DH => WordRegister::DX,
            ByteRegister::BL | ByteRegister::BH => WordRegister::BX,
        }
    }

    pub fn is_high_half(self) -> bool {
        matches!(
            self,
            ByteRegister::AH | ByteRegister::CH | ByteRegister::DH | ByteRegister::BH
        )
    }
}

impl WordRegister {
    pub fn index(self) -> u8 {
        num_traits::ToPrimitive::to_u8(&self).unwrap()
    }

    pub fn from_index(index: u8) -> Option<WordRegister> {
        num_traits::FromPrimitive::from_u8(index)
    }
}

/// Either half of a register operand, as written in assembly (`AL` vs `AX`).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AnyRegister {
    Byte(ByteRegister),
    Word(WordRegister),
}

impl AnyRegister {
    pub fn is_word(self) -> bool {
        matches!(self, AnyRegister::Word(_))
    }
}

/// Binary-class mnemonics (`MOV ADD ADC SUB SBB AND OR XOR CMP`).
#[derive(Clone, Copy, PartialEq, Eq, Debug, FromPrimitive, ToPrimitive, EnumFromStr)]
pub enum BinaryMnemonic {
    MOV,
    ADD,
    ADC,
    SUB,
    SBB,
    AND,
    OR,
    XOR,
    CMP,
}

/// Unary-class mnemonics (`INC DEC NEG NOT`).
#[derive(Clone, Copy, PartialEq, Eq, Debug, FromPrimitive, ToPrimitive, EnumFromStr)]
pub enum UnaryMnemonic {
    INC,
    DEC,
    NEG,
    NOT,
}

/// Stack-class mnemonics (`PUSH POP`).
#[derive(Clone, Copy, PartialEq, Eq, Debug, FromPrimitive, ToPrimitive, EnumFromStr)]
pub enum StackMnemonic {
    PUSH,
    POP,
}

/// Zeroary-class mnemonics.
#[derive(Clone, Copy, PartialEq, Eq, Debug, FromPrimitive, ToPrimitive, EnumFromStr)]
pub enum ZeroaryMnemonic {
    HLT,
    NOP,
    IRET,
    RET,
    CLI,
    STI,
    PUSHF,
    POPF,
}

/// Jump-class mnemonics: unconditional `JMP`, the eight flag-predicate
/// conditionals, and `CALL` (same 3-byte shape: opcode + word address).
#[derive(Clone, Copy, PartialEq, Eq, Debug, FromPrimitive, ToPrimitive, EnumFromStr)]
pub enum JumpMnemonic {
    JMP,
    JC,
    JNC,
    JZ,
    JNZ,
    JS,
    JNS,
    JO,
    JNO,
    CALL,
}

impl JumpMnemonic {
    /// `None` for `JMP`/`CALL` (unconditional); `Some` for the eight `Jcc`.
    pub fn condition(self) -> Option<JumpCondition> {
        match self {
            JumpMnemonic::JC => Some(JumpCondition::Carry),
            JumpMnemonic::JNC => Some(JumpCondition::NotCarry),
            JumpMnemonic::JZ => Some(JumpCondition::Zero),
            JumpMnemonic::JNZ => Some(JumpCondition::NotZero),
            JumpMnemonic::JS => Some(JumpCondition::Sign),
            JumpMnemonic::JNS => Some(JumpCondition::NotSign),
            JumpMnemonic::JO => Some(JumpCondition::Overflow),
            JumpMnemonic::JNO => Some(JumpCondition::NotOverflow),
            JumpMnemonic::JMP | JumpMnemonic::CALL => None,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum JumpCondition {
    Carry,
    NotCarry,
    Zero,
    NotZero,
    Sign,
    NotSign,
    Overflow,
    NotOverflow,
}

/// `IN`/`OUT`.
#[derive(Clone, Copy, PartialEq, Eq, Debug, FromPrimitive, ToPrimitive, EnumFromStr)]
pub enum IoMnemonic {
    IN,
    OUT,
}

/// The addressing-mode shape of a `Binary`-class instruction's operand pair,
/// independent of which mnemonic, size, or concrete register/address/value
/// is involved. Drives both the opcode byte offset and which trailing bytes
/// follow it.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BinaryMode {
    /// `reg, reg`
    RegReg,
    /// `reg, [BX]` or `[BX], reg` (direction carried in the mode byte)
    RegIndirect,
    /// `reg, [addr]` or `[addr], reg` (direction carried in the mode byte)
    RegDirect,
    /// `reg, imm`
    RegImm,
    /// `[BX], imm`
    MemIndirectImm,
    /// `[addr], imm`
    MemDirectImm,
}

const BINARY_MODE_COUNT: u8 = 6;
const BINARY_SIZE_COUNT: u8 = 2;
const BINARY_BASE: u8 = 0x00;
const UNARY_BASE: u8 = BINARY_BASE + 9 * BINARY_MODE_COUNT * BINARY_SIZE_COUNT; // 0x6C
const UNARY_BLOCK: u8 = 17; // 8 byte-regs + 5 word-regs + indirect(2) + direct(2)
const STACK_BASE: u8 = UNARY_BASE + 4 * UNARY_BLOCK; // 0xB0
const ZEROARY_BASE: u8 = STACK_BASE + 2 * 5; // 0xBA
const JUMP_BASE: u8 = ZEROARY_BASE + 8; // 0xC2
const INT_OPCODE: u8 = JUMP_BASE + 10; // 0xCC
const IO_BASE: u8 = INT_OPCODE + 1; // 0xCD

fn mode_index(mode: BinaryMode) -> u8 {
    match mode {
        BinaryMode::RegReg => 0,
        BinaryMode::RegIndirect => 1,
        BinaryMode::RegDirect => 2,
        BinaryMode::RegImm => 3,
        BinaryMode::MemIndirectImm => 4,
        BinaryMode::MemDirectImm => 5,
    }
}

fn mode_from_index(index: u8) -> Option<BinaryMode> {
    Some(match index {
        0 => BinaryMode::RegReg,
        1 => BinaryMode::RegIndirect,
        2 => BinaryMode::RegDirect,
        3 => BinaryMode::RegImm,
        4 => BinaryMode::MemIndirectImm,
        5 => BinaryMode::MemDirectImm,
        _ => return None,
    })
}

/// Opcode byte for a `Binary`-class instruction.
pub fn binary_opcode(mnemonic: BinaryMnemonic, mode: BinaryMode, is_word: bool) -> u8 {
    let m = num_traits::ToPrimitive::to_u8(&mnemonic).unwrap();
    BINARY_BASE + m * BINARY_MODE_COUNT * BINARY_SIZE_COUNT + mode_index(mode) * BINARY_SIZE_COUNT + is_word as u8
}

/// Decodes a `Binary`-class opcode byte back into mnemonic/mode/size, or
/// `None` if the byte is not in the binary-class range.
pub fn decode_binary_opcode(byte: u8) -> Option<(BinaryMnemonic, BinaryMode, bool)> {
    if byte >= UNARY_BASE {
        return None;
    }
    let block = BINARY_MODE_COUNT * BINARY_SIZE_COUNT;
    let m = byte / block;
    let rest = byte % block;
    let mode = mode_from_index(rest / BINARY_SIZE_COUNT)?;
    let is_word = (rest % BINARY_SIZE_COUNT) != 0;
    let mnemonic = num_traits::FromPrimitive::from_u8(m)?;
    Some((mnemonic, mode, is_word))
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum UnaryMode {
    Reg(AnyRegister),
    Indirect { is_word: bool },
    Direct { is_word: bool },
}

pub fn unary_opcode(mnemonic: UnaryMnemonic, mode: UnaryMode) -> u8 {
    let m = num_traits::ToPrimitive::to_u8(&mnemonic).unwrap();
    let offset = match mode {
        UnaryMode::Reg(AnyRegister::Byte(r)) => r.index(),
        UnaryMode::Reg(AnyRegister::Word(r)) => 8 + r.index(),
        UnaryMode::Indirect { is_word: false } => 13,
        UnaryMode::Indirect { is_word: true } => 14,
        UnaryMode::Direct { is_word: false } => 15,
        UnaryMode::Direct { is_word: true } => 16,
    };
    UNARY_BASE + m * UNARY_BLOCK + offset
}

pub fn decode_unary_opcode(byte: u8) -> Option<(UnaryMnemonic, UnaryMode)> {
    if byte < UNARY_BASE || byte >= STACK_BASE {
        return None;
    }
    let rel = byte - UNARY_BASE;
    let m = rel / UNARY_BLOCK;
    let offset = rel % UNARY_BLOCK;
    let mnemonic = num_traits::FromPrimitive::from_u8(m)?;
    let mode = match offset {
        0..=7 => UnaryMode::Reg(AnyRegister::Byte(ByteRegister::from_index(offset)?)),
        8..=12 => UnaryMode::Reg(AnyRegister::Word(WordRegister::from_index(offset - 8)?)),
        13 => UnaryMode::Indirect { is_word: false },
        14 => UnaryMode::Indirect { is_word: true },
        15 => UnaryMode::Direct { is_word: false },
        16 => UnaryMode::Direct { is_word: true },
        _ => return None,
    };
    Some((mnemonic, mode))
}

pub fn stack_opcode(mnemonic: StackMnemonic, reg: WordRegister) -> u8 {
    let m = num_traits::ToPrimitive::to_u8(&mnemonic).unwrap();
    STACK_BASE + m * 5 + reg.index()
}

pub fn decode_stack_opcode(byte: u8) -> Option<(StackMnemonic, WordRegister)> {
    if byte < STACK_BASE || byte >= ZEROARY_BASE {
        return None;
    }
    let rel = byte - STACK_BASE;
    let mnemonic = num_traits::FromPrimitive::from_u8(rel / 5)?;
    let reg = WordRegister::from_index(rel % 5)?;
    Some((mnemonic, reg))
}

pub fn zeroary_opcode(mnemonic: ZeroaryMnemonic) -> u8 {
    ZEROARY_BASE + num_traits::ToPrimitive::to_u8(&mnemonic).unwrap()
}

pub fn decode_zeroary_opcode(byte: u8) -> Option<ZeroaryMnemonic> {
    if byte < ZEROARY_BASE || byte >= JUMP_BASE {
        return None;
    }
    num_traits::FromPrimitive::from_u8(byte - ZEROARY_BASE)
}

pub fn jump_opcode(mnemonic: JumpMnemonic) -> u8 {
    JUMP_BASE + num_traits::ToPrimitive::to_u8(&mnemonic).unwrap()
}

pub fn decode_jump_opcode(byte: u8) -> Option<JumpMnemonic> {
    if byte < JUMP_BASE || byte >= INT_OPCODE {
        return None;
    }
    num_traits::FromPrimitive::from_u8(byte - JUMP_BASE)
}

pub fn int_opcode() -> u8 {
    INT_OPCODE
}

pub fn io_opcode(mnemonic: IoMnemonic, is_word: bool, port_is_dx: bool) -> u8 {
    let m = num_traits::ToPrimitive::to_u8(&mnemonic).unwrap();
    IO_BASE + m * 4 + (is_word as u8) * 2 + port_is_dx as u8
}

pub fn decode_io_opcode(byte: u8) -> Option<(IoMnemonic, bool, bool)> {
    if byte < IO_BASE {
        return None;
    }
    let rel = byte - IO_BASE;
    if rel >= 8 {
        return None;
    }
    let mnemonic = num_traits::FromPrimitive::from_u8(rel / 4)?;
    let is_word = (rel / 2) % 2 != 0;
    let port_is_dx = rel % 2 != 0;
    Some((mnemonic, is_word, port_is_dx))
}

/// The mode byte that follows a `Binary`-class opcode in `RegReg`,
/// `RegIndirect`, `RegDirect`, or `RegImm` mode.
///
/// `MemIndirectImm`/`MemDirectImm` carry no register and need no mode byte.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ModeByte {
    /// The register named first in the `BinaryMode`'s description.
    pub reg: u8,
    /// For `RegReg`: the second register. Ignored otherwise.
    pub reg2: u8,
    /// `true` when the register operand is the *source* rather than the
    /// destination (`MOV [addr], reg` vs `MOV reg, [addr]`).
    pub reg_is_source: bool,
}

impl ModeByte {
    pub fn encode(self) -> Byte {
        let mut b = 0u8;
        b |= self.reg << 5;
        b |= (self.reg_is_source as u8) << 4;
        b |= self.reg2 & 0x07;
        Byte::new(b)
    }

    pub fn decode(byte: Byte) -> ModeByte {
        let b = byte.unsigned();
        ModeByte {
            reg: (b >> 5) & 0x07,
            reg_is_source: (b >> 4) & 1 != 0,
            reg2: b & 0x07,
        }
    }
}

/// Every instruction shape this ISA defines, tagged with its class. The
/// assembler's encoder builds instructions class by class; the CPU core
/// decodes a raw opcode byte back into one of these with `decode_opcode`,
/// so the two never disagree about what a byte means.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Decoded {
    Binary(BinaryMnemonic, BinaryMode, bool),
    Unary(UnaryMnemonic, UnaryMode),
    Stack(StackMnemonic, WordRegister),
    Zeroary(ZeroaryMnemonic),
    Jump(JumpMnemonic),
    Int,
    Io(IoMnemonic, bool, bool),
}

pub fn decode_opcode(byte: u8) -> Option<Decoded> {
    if let Some((m, mode, w)) = decode_binary_opcode(byte) {
        return Some(Decoded::Binary(m, mode, w));
    }
    if let Some((m, mode)) = decode_unary_opcode(byte) {
        return Some(Decoded::Unary(m, mode));
    }
    if let Some((m, r)) = decode_stack_opcode(byte) {
        return Some(Decoded::Stack(m, r));
    }
    if let Some(m) = decode_zeroary_opcode(byte) {
        return Some(Decoded::Zeroary(m));
    }
    if let Some(m) = decode_jump_opcode(byte) {
        return Some(Decoded::Jump(m));
    }
    if byte == int_opcode() {
        return Some(Decoded::Int);
    }
    if let Some((m, w, dx)) = decode_io_opcode(byte) {
        return Some(Decoded::Io(m, w, dx));
    }
    None
}

pub const INTERRUPT_COUNT: u16 = 256;

/// Interrupt IDs reserved for CPU-managed special semantics (`INT 0/3/6/7`)
/// and treated as illegal hardware-interrupt vectors by the PIC (§4.7,
/// §9 Open Questions: this workspace resolves the ambiguity by following
/// the `app/`-semantics reading named there).
pub fn is_reserved_interrupt(id: u8) -> bool {
    id < 8
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn binary_opcode_round_trips() {
        for &m in &[
            BinaryMnemonic::MOV,
            BinaryMnemonic::ADD,
            BinaryMnemonic::CMP,
        ] {
            for &mode in &[
                BinaryMode::RegReg,
                BinaryMode::RegIndirect,
                BinaryMode::RegDirect,
                BinaryMode::RegImm,
                BinaryMode::MemIndirectImm,
                BinaryMode::MemDirectImm,
            ] {
                for &is_word in &[false, true] {
                    let byte = binary_opcode(m, mode, is_word);
                    assert_eq!(decode_binary_opcode(byte), Some((m, mode, is_word)));
                }
            }
        }
    }

    #[test]
    fn unary_opcode_round_trips() {
        let cases = [
            UnaryMode::Reg(AnyRegister::Byte(ByteRegister::AL)),
            UnaryMode::Reg(AnyRegister::Word(WordRegister::SP)),
            UnaryMode::Indirect { is_word: false },
            UnaryMode::Indirect { is_word: true },
            UnaryMode::Direct { is_word: false },
            UnaryMode::Direct { is_word: true },
        ];
        for &mode in &cases {
            let byte = unary_opcode(UnaryMnemonic::NEG, mode);
            assert_eq!(decode_unary_opcode(byte), Some((UnaryMnemonic::NEG, mode)));
        }
    }

    #[test]
    fn opcode_ranges_are_disjoint() {
        assert!(UNARY_BASE > BINARY_BASE);
        assert!(STACK_BASE > UNARY_BASE);
        assert!(ZEROARY_BASE > STACK_BASE);
        assert!(JUMP_BASE > ZEROARY_BASE);
        assert!(INT_OPCODE > JUMP_BASE);
        assert!(IO_BASE > INT_OPCODE);
        // All values must fit in a u8.
        assert!((IO_BASE as u16 + 8) <= 256);
    }

    #[test]
    fn jump_condition_mapping() {
        assert_eq!(JumpMnemonic::JMP.condition(), None);
        assert_eq!(JumpMnemonic::CALL.condition(), None);
        assert_eq!(JumpMnemonic::JZ.condition(), Some(JumpCondition::Zero));
    }

    #[test]
    fn io_opcode_round_trips() {
        for &mnemonic in &[IoMnemonic::IN, IoMnemonic::OUT] {
            for &is_word in &[false, true] {
                for &dx in &[false, true] {
                    let byte = io_opcode(mnemonic, is_word, dx);
                    assert_eq!(decode_io_opcode(byte), Some((mnemonic, is_word, dx)));
                }
            }
        }
    }

    #[test]
    fn byte_register_parent() {
        assert_eq!(ByteRegister::AL.parent(), WordRegister::AX);
        assert_eq!(ByteRegister::BH.parent(), WordRegister::BX);
        assert!(ByteRegister::AH.is_high_half());
        assert!(!ByteRegister::AL.is_high_half());
    }
}
