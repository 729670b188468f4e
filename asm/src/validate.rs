//! Per-instruction-class operand legality, the table from the operand
//! grammar the parser produced down to an addressing-mode shape the encoder
//! can turn into bytes once labels resolve to addresses. Registers and
//! explicit `BYTE PTR`/`WORD PTR` hints are settled here; anything that
//! depends on a label's final address is deferred as an `Expr` for the
//! resolver to evaluate once the whole file has been laid out.

use std::collections::HashMap;

use util::EnumFromStr;
use vonsim_core::isa::{
    AnyRegister, BinaryMnemonic, IoMnemonic, JumpMnemonic, StackMnemonic, UnaryMnemonic,
    WordRegister, ZeroaryMnemonic,
};

use crate::ast::{DataWidth, Expr, Operand, SizeHint};
use crate::error::{Error, Position, ValidateError};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum LabelKind {
    Data(DataWidth),
    Instruction,
    Equ,
}

pub type LabelKinds = HashMap<String, LabelKind>;

#[derive(Clone, Debug)]
pub enum ValidatedBinaryMode {
    RegReg { dst: AnyRegister, src: AnyRegister },
    RegIndirect { reg: AnyRegister, reg_is_source: bool },
    RegDirect { reg: AnyRegister, reg_is_source: bool, addr: Expr },
    RegImm { reg: AnyRegister, imm: Expr },
    MemIndirectImm { is_word: bool, imm: Expr },
    MemDirectImm { is_word: bool, addr: Expr, imm: Expr },
}

#[derive(Clone, Debug)]
pub enum ValidatedUnaryMode {
    Reg(AnyRegister),
    Indirect { is_word: bool },
    Direct { is_word: bool, addr: Expr },
}

#[derive(Clone, Debug)]
pub enum IoPort {
    Imm(Expr),
    Dx,
}

#[derive(Clone, Debug)]
pub enum ValidatedInstr {
    Binary { mnemonic: BinaryMnemonic, mode: ValidatedBinaryMode, is_word: bool },
    Unary { mnemonic: UnaryMnemonic, mode: ValidatedUnaryMode },
    Stack { mnemonic: StackMnemonic, reg: WordRegister },
    Zeroary(ZeroaryMnemonic),
    Jump { mnemonic: JumpMnemonic, target: Expr },
    Int { vector: Expr },
    Io { mnemonic: IoMnemonic, is_word: bool, port: IoPort },
}

impl ValidatedInstr {
    /// Byte length of the encoded instruction. Depends only on the
    /// addressing-mode shape, never on a label's resolved value, so the
    /// resolver can use it to lay out addresses before any label is known.
    pub fn encoded_length(&self) -> u16 {
        match self {
            ValidatedInstr::Binary { mode, is_word, .. } => match mode {
                ValidatedBinaryMode::RegReg { .. } => 2,
                ValidatedBinaryMode::RegIndirect { .. } => 2,
                ValidatedBinaryMode::RegDirect { .. } => 4,
                ValidatedBinaryMode::RegImm { .. } => 2 + if *is_word { 2 } else { 1 },
                ValidatedBinaryMode::MemIndirectImm { .. } => 1 + if *is_word { 2 } else { 1 },
                ValidatedBinaryMode::MemDirectImm { .. } => 3 + if *is_word { 2 } else { 1 },
            },
            ValidatedInstr::Unary { mode, .. } => match mode {
                ValidatedUnaryMode::Reg(_) => 1,
                ValidatedUnaryMode::Indirect { .. } => 1,
                ValidatedUnaryMode::Direct { .. } => 3,
            },
            ValidatedInstr::Stack { .. } => 1,
            ValidatedInstr::Zeroary(_) => 1,
            ValidatedInstr::Jump { .. } => 3,
            ValidatedInstr::Int { .. } => 2,
            ValidatedInstr::Io { port, .. } => 1 + matches!(port, IoPort::Imm(_)) as u16,
        }
    }
}

fn label_kind<'a>(kinds: &'a LabelKinds, name: &str) -> Option<&'a LabelKind> {
    kinds.get(name)
}

/// A bare identifier operand is memory-direct addressing unless it names an
/// `EQU` constant, in which case it behaves like the constant's value.
fn bare_label_as_memory_direct(name: &str, kinds: &LabelKinds) -> bool {
    !matches!(label_kind(kinds, name), Some(LabelKind::Equ))
}

fn memory_expr(op: &Operand, kinds: &LabelKinds) -> Option<Expr> {
    match op {
        Operand::Bracket { indirect: false, expr: Some(e), .. } => Some(e.clone()),
        Operand::BareLabel(name) if bare_label_as_memory_direct(name, kinds) => {
            Some(Expr::Label { name: name.clone(), offset: true })
        }
        _ => None,
    }
}

fn is_indirect(op: &Operand) -> bool {
    matches!(op, Operand::Bracket { indirect: true, .. })
}

fn as_register(op: &Operand) -> Option<AnyRegister> {
    match op {
        Operand::Register(r) => Some(*r),
        _ => None,
    }
}

fn immediate_expr(op: &Operand, kinds: &LabelKinds) -> Option<Expr> {
    match op {
        Operand::Immediate(e) => Some(e.clone()),
        Operand::BareLabel(name) if !bare_label_as_memory_direct(name, kinds) => {
            Some(Expr::Label { name: name.clone(), offset: false })
        }
        _ => None,
    }
}

fn operand_size_hint(op: &Operand) -> SizeHint {
    match op {
        Operand::Bracket { size, .. } => *size,
        _ => SizeHint::Auto,
    }
}

pub fn validate_instruction(
    mnemonic_text: &str,
    operands: &[Operand],
    kinds: &LabelKinds,
    position: Position,
) -> Result<ValidatedInstr, Error> {
    let err = |e: ValidateError| Error::validate(e, position);

    if let Ok(m) = BinaryMnemonic::from_str(mnemonic_text) {
        return validate_binary(m, operands, kinds, position);
    }
    if let Ok(m) = UnaryMnemonic::from_str(mnemonic_text) {
        return validate_unary(m, operands, kinds, position);
    }
    if let Ok(m) = StackMnemonic::from_str(mnemonic_text) {
        if operands.len() != 1 {
            return Err(err(ValidateError::ExpectsImmediate));
        }
        let reg = match as_register(&operands[0]) {
            Some(AnyRegister::Word(r)) => r,
            _ => return Err(err(ValidateError::SizeMismatch)),
        };
        return Ok(ValidatedInstr::Stack { mnemonic: m, reg });
    }
    if let Ok(m) = ZeroaryMnemonic::from_str(mnemonic_text) {
        if !operands.is_empty() {
            return Err(err(ValidateError::SizeMismatch));
        }
        return Ok(ValidatedInstr::Zeroary(m));
    }
    if let Ok(m) = JumpMnemonic::from_str(mnemonic_text) {
        if operands.len() != 1 {
            return Err(err(ValidateError::ExpectsImmediate));
        }
        let target = match &operands[0] {
            Operand::BareLabel(name) => Expr::Label { name: name.clone(), offset: true },
            Operand::Immediate(e) => e.clone(),
            _ => return Err(err(ValidateError::UnknownSize)),
        };
        return Ok(ValidatedInstr::Jump { mnemonic: m, target });
    }
    if mnemonic_text == "INT" {
        if operands.len() != 1 {
            return Err(err(ValidateError::ExpectsImmediate));
        }
        let vector = match immediate_expr(&operands[0], kinds) {
            Some(e) => e,
            None => match &operands[0] {
                Operand::BareLabel(name) => {
                    return Err(err(ValidateError::LabelShouldBeANumber(name.clone())))
                }
                _ => return Err(err(ValidateError::ExpectsImmediate)),
            },
        };
        return Ok(ValidatedInstr::Int { vector });
    }
    if let Ok(m) = IoMnemonic::from_str(mnemonic_text) {
        return validate_io(m, operands, kinds, position);
    }

    Err(err(ValidateError::UnknownSize))
}

fn resolve_operand_width(
    reg: Option<AnyRegister>,
    hint: SizeHint,
    position: Position,
) -> Result<bool, Error> {
    match (reg, hint) {
        (Some(r), SizeHint::Auto) => Ok(r.is_word()),
        (Some(r), SizeHint::Byte) => {
            if r.is_word() {
                Err(Error::validate(ValidateError::SizeMismatch, position))
            } else {
                Ok(false)
            }
        }
        (Some(r), SizeHint::Word) => {
            if !r.is_word() {
                Err(Error::validate(ValidateError::SizeMismatch, position))
            } else {
                Ok(true)
            }
        }
        (None, SizeHint::Byte) => Ok(false),
        (None, SizeHint::Word) => Ok(true),
        (None, SizeHint::Auto) => Err(Error::validate(ValidateError::UnknownSize, position)),
    }
}

fn validate_binary(
    mnemonic: BinaryMnemonic,
    operands: &[Operand],
    kinds: &LabelKinds,
    position: Position,
) -> Result<ValidatedInstr, Error> {
    let err = |e: ValidateError| Error::validate(e, position);
    if operands.len() != 2 {
        return Err(err(ValidateError::SizeMismatch));
    }
    let (dst, src) = (&operands[0], &operands[1]);

    let dst_reg = as_register(dst);
    let src_reg = as_register(src);
    let dst_mem = memory_expr(dst, kinds);
    let src_mem = memory_expr(src, kinds);
    let dst_indirect = is_indirect(dst);
    let src_indirect = is_indirect(src);

    if (dst_mem.is_some() || dst_indirect) && (src_mem.is_some() || src_indirect) {
        return Err(err(ValidateError::DoubleMemoryAccess));
    }

    if let (Some(d), Some(s)) = (dst_reg, src_reg) {
        if d.is_word() != s.is_word() {
            return Err(err(ValidateError::SizeMismatch));
        }
        let is_word = d.is_word();
        return Ok(ValidatedInstr::Binary {
            mnemonic,
            mode: ValidatedBinaryMode::RegReg { dst: d, src: s },
            is_word,
        });
    }

    if let Some(d) = dst_reg {
        if src_indirect {
            return Ok(ValidatedInstr::Binary {
                mnemonic,
                is_word: d.is_word(),
                mode: ValidatedBinaryMode::RegIndirect { reg: d, reg_is_source: false },
            });
        }
        if let Some(addr) = src_mem {
            return Ok(ValidatedInstr::Binary {
                mnemonic,
                is_word: d.is_word(),
                mode: ValidatedBinaryMode::RegDirect { reg: d, reg_is_source: false, addr },
            });
        }
        if let Some(imm) = immediate_expr(src, kinds) {
            return Ok(ValidatedInstr::Binary {
                mnemonic,
                is_word: d.is_word(),
                mode: ValidatedBinaryMode::RegImm { reg: d, imm },
            });
        }
        return Err(err(ValidateError::UnknownSize));
    }

    if let Some(s) = src_reg {
        if dst_indirect {
            return Ok(ValidatedInstr::Binary {
                mnemonic,
                is_word: s.is_word(),
                mode: ValidatedBinaryMode::RegIndirect { reg: s, reg_is_source: true },
            });
        }
        if let Some(addr) = dst_mem {
            if matches!(dst, Operand::BareLabel(name) if matches!(label_kind(kinds, name), Some(LabelKind::Equ)))
            {
                let name = match dst {
                    Operand::BareLabel(n) => n.clone(),
                    _ => unreachable!(),
                };
                return Err(err(ValidateError::LabelShouldBeWritable(name)));
            }
            return Ok(ValidatedInstr::Binary {
                mnemonic,
                is_word: s.is_word(),
                mode: ValidatedBinaryMode::RegDirect { reg: s, reg_is_source: true, addr },
            });
        }
        return Err(err(ValidateError::DestinationCannotBeImmediate));
    }

    // Neither operand is a register: memory <-> immediate.
    if dst_indirect {
        let imm = immediate_expr(src, kinds).ok_or_else(|| err(ValidateError::ExpectsImmediate))?;
        let is_word = match resolve_operand_width(None, operand_size_hint(dst), position) {
            Ok(w) => w,
            Err(e) => return Err(e),
        };
        return Ok(ValidatedInstr::Binary {
            mnemonic,
            is_word,
            mode: ValidatedBinaryMode::MemIndirectImm { is_word, imm },
        });
    }
    if let Some(addr) = dst_mem {
        if let Operand::BareLabel(name) = dst {
            if matches!(label_kind(kinds, name), Some(LabelKind::Equ)) {
                return Err(err(ValidateError::LabelShouldBeWritable(name.clone())));
            }
        }
        let imm = immediate_expr(src, kinds).ok_or_else(|| err(ValidateError::ExpectsImmediate))?;
        let hint = match dst {
            Operand::BareLabel(name) => match label_kind(kinds, name) {
                Some(LabelKind::Data(DataWidth::Byte)) => SizeHint::Byte,
                Some(LabelKind::Data(DataWidth::Word)) => SizeHint::Word,
                _ => operand_size_hint(dst),
            },
            _ => operand_size_hint(dst),
        };
        let is_word = resolve_operand_width(None, hint, position)?;
        return Ok(ValidatedInstr::Binary {
            mnemonic,
            is_word,
            mode: ValidatedBinaryMode::MemDirectImm { is_word, addr, imm },
        });
    }

    Err(err(ValidateError::DestinationCannotBeImmediate))
}

fn validate_unary(
    mnemonic: UnaryMnemonic,
    operands: &[Operand],
    kinds: &LabelKinds,
    position: Position,
) -> Result<ValidatedInstr, Error> {
    let err = |e: ValidateError| Error::validate(e, position);
    if operands.len() != 1 {
        return Err(err(ValidateError::SizeMismatch));
    }
    let op = &operands[0];
    if let Some(reg) = as_register(op) {
        return Ok(ValidatedInstr::Unary { mnemonic, mode: ValidatedUnaryMode::Reg(reg) });
    }
    if is_indirect(op) {
        let is_word = resolve_operand_width(None, operand_size_hint(op), position)?;
        return Ok(ValidatedInstr::Unary { mnemonic, mode: ValidatedUnaryMode::Indirect { is_word } });
    }
    if let Some(addr) = memory_expr(op, kinds) {
        let hint = match op {
            Operand::BareLabel(name) => match label_kind(kinds, name) {
                Some(LabelKind::Data(DataWidth::Byte)) => SizeHint::Byte,
                Some(LabelKind::Data(DataWidth::Word)) => SizeHint::Word,
                _ => operand_size_hint(op),
            },
            _ => operand_size_hint(op),
        };
        let is_word = resolve_operand_width(None, hint, position)?;
        return Ok(ValidatedInstr::Unary { mnemonic, mode: ValidatedUnaryMode::Direct { is_word, addr } });
    }
    Err(err(ValidateError::UnknownSize))
}

fn validate_io(
    mnemonic: IoMnemonic,
    operands: &[Operand],
    kinds: &LabelKinds,
    position: Position,
) -> Result<ValidatedInstr, Error> {
    let err = |e: ValidateError| Error::validate(e, position);
    if operands.len() != 2 {
        return Err(err(ValidateError::ExpectsImmediate));
    }
    // `IN acc, port` / `OUT port, acc`: the accumulator side tells us the width.
    let (acc, port_operand) = match mnemonic {
        IoMnemonic::IN => (&operands[0], &operands[1]),
        IoMnemonic::OUT => (&operands[1], &operands[0]),
    };
    let is_word = match as_register(acc) {
        Some(AnyRegister::Word(WordRegister::AX)) => true,
        Some(AnyRegister::Byte(vonsim_core::isa::ByteRegister::AL)) => false,
        _ => return Err(err(ValidateError::SizeMismatch)),
    };
    let port = if let Some(AnyRegister::Word(WordRegister::DX)) = as_register(port_operand) {
        IoPort::Dx
    } else if let Some(e) = immediate_expr(port_operand, kinds) {
        IoPort::Imm(e)
    } else if let Operand::BareLabel(name) = port_operand {
        return Err(err(ValidateError::LabelShouldBeANumber(name.clone())));
    } else {
        return Err(err(ValidateError::ExpectsImmediate));
    };
    Ok(ValidatedInstr::Io { mnemonic, is_word, port })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser;

    fn validate_source(src: &str) -> Result<ValidatedInstr, Error> {
        let (tokens, _) = Lexer::new(src).tokenize();
        let (statements, _) = parser::parse(tokens);
        match &statements[0].stmt {
            crate::ast::Stmt::Instruction { mnemonic, operands, position, .. } => {
                validate_instruction(mnemonic, operands, &HashMap::new(), *position)
            }
            other => panic!("expected an instruction, got {:?}", other),
        }
    }

    #[test]
    fn mov_reg_reg_is_word_sized() {
        let v = validate_source("MOV AX, BX\n").unwrap();
        assert!(matches!(v, ValidatedInstr::Binary { is_word: true, .. }));
    }

    #[test]
    fn mov_reg_reg_size_mismatch() {
        let e = validate_source("MOV AX, BL\n").unwrap_err();
        assert_eq!(e.code(), "size-mismatch");
    }

    #[test]
    fn double_memory_access_is_rejected() {
        let e = validate_source("MOV [BX], [BX]\n").unwrap_err();
        assert_eq!(e.code(), "double-memory-access");
    }

    #[test]
    fn indirect_without_size_hint_is_unknown_size() {
        let e = validate_source("INC [BX]\n").unwrap_err();
        assert_eq!(e.code(), "unknown-size");
    }

    #[test]
    fn mem_imm_requires_size_hint() {
        let v = validate_source("MOV WORD PTR [BX], 5\n").unwrap();
        assert!(matches!(v, ValidatedInstr::Binary {
            mode: ValidatedBinaryMode::MemIndirectImm { is_word: true, .. }, ..
        }));
    }

    #[test]
    fn jmp_takes_a_bare_label() {
        let v = validate_source("JMP LOOP\n").unwrap();
        assert!(matches!(v, ValidatedInstr::Jump { .. }));
    }
}
