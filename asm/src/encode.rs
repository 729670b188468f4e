//! Turns a fully-resolved instruction (every label already a concrete
//! address, every expression already a concrete number) into its byte
//! encoding, via `vonsim_core::isa`'s opcode tables -- the one encoding
//! definition the CPU core also decodes against, so assembler and
//! simulator can never silently disagree about what a byte means.

use vonsim_core::isa::{
    self, AnyRegister, BinaryMnemonic, IoMnemonic, JumpMnemonic, ModeByte, StackMnemonic,
    UnaryMnemonic, WordRegister, ZeroaryMnemonic,
};
use vonsim_core::value::{Byte, Word};

#[derive(Clone, Debug)]
pub enum ResolvedBinaryMode {
    RegReg { dst: AnyRegister, src: AnyRegister },
    RegIndirect { reg: AnyRegister, reg_is_source: bool },
    RegDirect { reg: AnyRegister, reg_is_source: bool, addr: Word },
    RegImm { reg: AnyRegister, imm: i64 },
    MemIndirectImm { imm: i64 },
    MemDirectImm { addr: Word, imm: i64 },
}

#[derive(Clone, Debug)]
pub enum ResolvedUnaryMode {
    Reg(AnyRegister),
    Indirect { is_word: bool },
    Direct { is_word: bool, addr: Word },
}

#[derive(Clone, Debug)]
pub enum ResolvedIoPort {
    Imm(Byte),
    Dx,
}

#[derive(Clone, Debug)]
pub enum ResolvedInstr {
    Binary { mnemonic: BinaryMnemonic, mode: ResolvedBinaryMode, is_word: bool },
    Unary { mnemonic: UnaryMnemonic, mode: ResolvedUnaryMode },
    Stack { mnemonic: StackMnemonic, reg: WordRegister },
    Zeroary(ZeroaryMnemonic),
    Jump { mnemonic: JumpMnemonic, target: Word },
    Int { vector: Byte },
    Io { mnemonic: IoMnemonic, is_word: bool, port: ResolvedIoPort },
}

fn register_index(reg: AnyRegister) -> u8 {
    match reg {
        AnyRegister::Byte(r) => r.index(),
        AnyRegister::Word(r) => r.index(),
    }
}

/// `imm` is already range-checked by the resolver against the operation's
/// width; this just picks out the right two's-complement bit pattern.
fn push_imm(bytes: &mut Vec<u8>, imm: i64, is_word: bool) {
    if is_word {
        let w = Word::new(imm as u16);
        bytes.push(w.low().unsigned());
        bytes.push(w.high().unsigned());
    } else {
        bytes.push(Byte::new(imm as u8).unsigned());
    }
}

fn push_addr(bytes: &mut Vec<u8>, addr: Word) {
    bytes.push(addr.low().unsigned());
    bytes.push(addr.high().unsigned());
}

pub fn encode(instr: &ResolvedInstr) -> Vec<u8> {
    let mut bytes = Vec::new();
    match instr {
        ResolvedInstr::Binary { mnemonic, mode, is_word } => match mode {
            ResolvedBinaryMode::RegReg { dst, src } => {
                bytes.push(isa::binary_opcode(*mnemonic, isa::BinaryMode::RegReg, *is_word));
                let mb = ModeByte { reg: register_index(*dst), reg2: register_index(*src), reg_is_source: false };
                bytes.push(mb.encode().unsigned());
            }
            ResolvedBinaryMode::RegIndirect { reg, reg_is_source } => {
                bytes.push(isa::binary_opcode(*mnemonic, isa::BinaryMode::RegIndirect, *is_word));
                let mb = ModeByte { reg: register_index(*reg), reg2: 0, reg_is_source: *reg_is_source };
                bytes.push(mb.encode().unsigned());
            }
            ResolvedBinaryMode::RegDirect { reg, reg_is_source, addr } => {
                bytes.push(isa::binary_opcode(*mnemonic, isa::BinaryMode::RegDirect, *is_word));
                let mb = ModeByte { reg: register_index(*reg), reg2: 0, reg_is_source: *reg_is_source };
                bytes.push(mb.encode().unsigned());
                push_addr(&mut bytes, *addr);
            }
            ResolvedBinaryMode::RegImm { reg, imm } => {
                bytes.push(isa::binary_opcode(*mnemonic, isa::BinaryMode::RegImm, *is_word));
                let mb = ModeByte { reg: register_index(*reg), reg2: 0, reg_is_source: false };
                bytes.push(mb.encode().unsigned());
                push_imm(&mut bytes, *imm, *is_word);
            }
            ResolvedBinaryMode::MemIndirectImm { imm } => {
                bytes.push(isa::binary_opcode(*mnemonic, isa::BinaryMode::MemIndirectImm, *is_word));
                push_imm(&mut bytes, *imm, *is_word);
            }
            ResolvedBinaryMode::MemDirectImm { addr, imm } => {
                bytes.push(isa::binary_opcode(*mnemonic, isa::BinaryMode::MemDirectImm, *is_word));
                push_addr(&mut bytes, *addr);
                push_imm(&mut bytes, *imm, *is_word);
            }
        },
        ResolvedInstr::Unary { mnemonic, mode } => match mode {
            ResolvedUnaryMode::Reg(reg) => {
                bytes.push(isa::unary_opcode(*mnemonic, isa::UnaryMode::Reg(*reg)));
            }
            ResolvedUnaryMode::Indirect { is_word } => {
                bytes.push(isa::unary_opcode(*mnemonic, isa::UnaryMode::Indirect { is_word: *is_word }));
            }
            ResolvedUnaryMode::Direct { is_word, addr } => {
                bytes.push(isa::unary_opcode(*mnemonic, isa::UnaryMode::Direct { is_word: *is_word }));
                push_addr(&mut bytes, *addr);
            }
        },
        ResolvedInstr::Stack { mnemonic, reg } => {
            bytes.push(isa::stack_opcode(*mnemonic, *reg));
        }
        ResolvedInstr::Zeroary(mnemonic) => {
            bytes.push(isa::zeroary_opcode(*mnemonic));
        }
        ResolvedInstr::Jump { mnemonic, target } => {
            bytes.push(isa::jump_opcode(*mnemonic));
            push_addr(&mut bytes, *target);
        }
        ResolvedInstr::Int { vector } => {
            bytes.push(isa::int_opcode());
            bytes.push(vector.unsigned());
        }
        ResolvedInstr::Io { mnemonic, is_word, port } => match port {
            ResolvedIoPort::Dx => {
                bytes.push(isa::io_opcode(*mnemonic, *is_word, true));
            }
            ResolvedIoPort::Imm(p) => {
                bytes.push(isa::io_opcode(*mnemonic, *is_word, false));
                bytes.push(p.unsigned());
            }
        },
    }
    bytes
}
