//! The address resolver: two passes over the validated statement list,
//! first laying out every `ORG`/`DB`/`DW`/instruction in source order to
//! learn every label's address, then evaluating every expression that
//! depended on one of those addresses and handing the result to the
//! encoder. `EQU` constants are solved first, by Kahn's topological peel
//! over the dependency graph among `EQU` labels themselves, so a cycle is
//! reported once instead of as an endless "label not found".

use std::collections::HashMap;

use vonsim_core::memory::RAM_SIZE;
use vonsim_core::value::{Byte, Word};

use crate::ast::{BinaryOp, DataValue, DataWidth, Expr, Statement, Stmt, UnaryOp};
use crate::encode::{self, ResolvedBinaryMode, ResolvedInstr, ResolvedIoPort, ResolvedUnaryMode};
use crate::error::{Error, Position, ResolveError, ValidateError};
use crate::source_map::SourceMap;
use crate::validate::{self, IoPort, LabelKind, LabelKinds, ValidatedBinaryMode, ValidatedInstr, ValidatedUnaryMode};

#[derive(serde::Serialize)]
pub struct Program {
    /// The address the CPU's `IP` starts at: the first instruction statement
    /// laid out, wherever its `ORG` segment happens to put it (a segment can
    /// hold data before its first instruction, so this is not simply the
    /// first `ORG`'s value).
    pub entry: Word,
    /// A full `RAM_SIZE` preload image; everything not written by the
    /// program is zero.
    pub image: Vec<u8>,
    pub source_map: SourceMap,
    pub labels: HashMap<String, u16>,
}

fn collect_label_kinds(statements: &[Statement]) -> LabelKinds {
    let mut kinds = HashMap::new();
    for st in statements {
        match &st.stmt {
            Stmt::Equ { label, .. } => {
                kinds.insert(label.clone(), LabelKind::Equ);
            }
            Stmt::Data { label: Some(name), width, .. } => {
                kinds.insert(name.clone(), LabelKind::Data(*width));
            }
            Stmt::Instruction { label: Some(name), .. } => {
                kinds.insert(name.clone(), LabelKind::Instruction);
            }
            _ => {}
        }
    }
    kinds
}

fn eval_expr(
    expr: &Expr,
    equ: &HashMap<String, i64>,
    addresses: Option<&HashMap<String, u16>>,
) -> Result<i64, ResolveError> {
    match expr {
        Expr::Number(n) => Ok(*n),
        Expr::Label { name, .. } => {
            if let Some(v) = equ.get(name) {
                return Ok(*v);
            }
            if let Some(addrs) = addresses {
                if let Some(a) = addrs.get(name) {
                    return Ok(*a as i64);
                }
            }
            Err(ResolveError::LabelNotFound(name.clone()))
        }
        Expr::Unary { op, expr } => {
            let v = eval_expr(expr, equ, addresses)?;
            Ok(match op {
                UnaryOp::Pos => v,
                UnaryOp::Neg => -v,
            })
        }
        Expr::Binary { op, left, right } => {
            let l = eval_expr(left, equ, addresses)?;
            let r = eval_expr(right, equ, addresses)?;
            Ok(match op {
                BinaryOp::Add => l + r,
                BinaryOp::Sub => l - r,
                BinaryOp::Mul => l * r,
            })
        }
    }
}

/// Kahn's-algorithm peel: repeatedly evaluate every `EQU` whose expression
/// no longer references an unresolved `EQU`. Whatever is left when a full
/// pass makes no progress is a cycle.
fn solve_equ(statements: &[Statement]) -> Result<HashMap<String, i64>, Vec<Error>> {
    let mut raw: HashMap<String, (&Expr, Position)> = HashMap::new();
    for st in statements {
        if let Stmt::Equ { label, expr } = &st.stmt {
            raw.insert(label.clone(), (expr, st.position));
        }
    }

    let mut resolved: HashMap<String, i64> = HashMap::new();
    let mut remaining: Vec<String> = raw.keys().cloned().collect();
    loop {
        let mut progressed = false;
        let mut next_remaining = Vec::new();
        for name in remaining {
            let (expr, _) = raw[&name];
            match eval_expr(expr, &resolved, None) {
                Ok(v) => {
                    resolved.insert(name, v);
                    progressed = true;
                }
                Err(_) => next_remaining.push(name),
            }
        }
        remaining = next_remaining;
        if remaining.is_empty() || !progressed {
            break;
        }
    }

    if remaining.is_empty() {
        Ok(resolved)
    } else {
        let position = raw[&remaining[0]].1;
        Err(vec![Error::resolve(ResolveError::LabelUndefinedChain(remaining), position)])
    }
}

fn data_value_len(width: DataWidth, value: &DataValue) -> u16 {
    match value {
        DataValue::Str(s) => s.len() as u16,
        _ => match width {
            DataWidth::Byte => 1,
            DataWidth::Word => 2,
        },
    }
}

fn mark_occupied(occupied: &mut [bool], addr: u16, len: u16) -> Option<u16> {
    for off in 0..len {
        let a = addr.wrapping_add(off) as usize;
        if occupied[a] {
            return Some(a as u16);
        }
        occupied[a] = true;
    }
    None
}

pub fn resolve(statements: &[Statement]) -> Result<Program, Vec<Error>> {
    let mut errors = Vec::new();
    let kinds = collect_label_kinds(statements);

    let equ_values = match solve_equ(statements) {
        Ok(v) => v,
        Err(mut e) => {
            errors.append(&mut e);
            HashMap::new()
        }
    };

    let mut validated: HashMap<usize, ValidatedInstr> = HashMap::new();
    for (i, st) in statements.iter().enumerate() {
        if let Stmt::Instruction { mnemonic, operands, position, .. } = &st.stmt {
            match validate::validate_instruction(mnemonic, operands, &kinds, *position) {
                Ok(v) => {
                    validated.insert(i, v);
                }
                Err(e) => errors.push(e),
            }
        }
        if let Stmt::Data { width: DataWidth::Word, values, .. } = &st.stmt {
            for v in values {
                if let DataValue::Str(_) = v {
                    errors.push(Error::validate(ValidateError::SizeMismatch, st.position));
                }
            }
        }
    }

    let mut cursor: Option<u16> = None;
    let mut occupied = vec![false; RAM_SIZE];
    let mut labels: HashMap<String, u16> = HashMap::new();
    let mut entry: Option<u16> = None;
    let mut missing_org_reported = false;
    let mut instr_placements: Vec<(u16, usize, Position)> = Vec::new();
    let mut data_placements: Vec<(u16, DataWidth, Vec<DataValue>, Position)> = Vec::new();

    for (i, st) in statements.iter().enumerate() {
        match &st.stmt {
            Stmt::Org(expr) => match eval_expr(expr, &equ_values, None) {
                Ok(v) if (0..=0xFFFF).contains(&v) => {
                    cursor = Some(v as u16);
                }
                Ok(v) => errors.push(Error::resolve(ResolveError::ValueOutOfRange { value: v, bits: 16 }, st.position)),
                Err(e) => errors.push(Error::resolve(e, st.position)),
            },
            Stmt::End => break,
            Stmt::Equ { .. } => {}
            Stmt::Data { label, width, values } => {
                let len: u16 = values.iter().map(|v| data_value_len(*width, v)).sum();
                match cursor {
                    None => {
                        if !missing_org_reported {
                            errors.push(Error::resolve(ResolveError::MissingOrg, st.position));
                            missing_org_reported = true;
                        }
                    }
                    Some(addr) => {
                        if let Some(name) = label {
                            labels.insert(name.clone(), addr);
                        }
                        if addr as u32 + len as u32 > RAM_SIZE as u32 {
                            errors.push(Error::resolve(ResolveError::InstructionOutOfRange, st.position));
                        } else if let Some(a) = mark_occupied(&mut occupied, addr, len) {
                            errors.push(Error::resolve(ResolveError::OccupiedAddress { address: a }, st.position));
                        } else {
                            data_placements.push((addr, *width, values.clone(), st.position));
                        }
                        cursor = Some(addr.wrapping_add(len));
                    }
                }
            }
            Stmt::Instruction { label, position, .. } => {
                let len = validated.get(&i).map(|v| v.encoded_length());
                match (cursor, len) {
                    (None, _) => {
                        if !missing_org_reported {
                            errors.push(Error::resolve(ResolveError::MissingOrg, *position));
                            missing_org_reported = true;
                        }
                    }
                    (Some(_), None) => {}
                    (Some(addr), Some(len)) => {
                        if let Some(name) = label {
                            labels.insert(name.clone(), addr);
                        }
                        if addr as u32 + len as u32 > RAM_SIZE as u32 {
                            errors.push(Error::resolve(ResolveError::InstructionOutOfRange, *position));
                        } else if let Some(a) = mark_occupied(&mut occupied, addr, len) {
                            errors.push(Error::resolve(ResolveError::OccupiedAddress { address: a }, *position));
                        } else {
                            entry.get_or_insert(addr);
                            instr_placements.push((addr, i, *position));
                        }
                        cursor = Some(addr.wrapping_add(len));
                    }
                }
            }
        }
    }

    let mut image = vec![0u8; RAM_SIZE];
    let mut source_map = SourceMap::new();

    for (addr, width, values, position) in &data_placements {
        let mut offset = *addr;
        let unit = match width {
            DataWidth::Byte => 1,
            DataWidth::Word => 2,
        };
        for value in values {
            match value {
                DataValue::Unassigned => offset = offset.wrapping_add(unit),
                DataValue::Str(s) => {
                    for b in s.bytes() {
                        image[offset as usize] = b;
                        offset = offset.wrapping_add(1);
                    }
                }
                DataValue::Expr(e) => {
                    match eval_expr(e, &equ_values, Some(&labels)) {
                        Ok(v) => write_data_word(&mut image, offset, *width, v, &mut errors, *position),
                        Err(e) => errors.push(Error::resolve(e, *position)),
                    }
                    offset = offset.wrapping_add(unit);
                }
            }
        }
        source_map.push(*addr, offset.wrapping_sub(*addr), *position);
    }

    for (addr, stmt_index, position) in &instr_placements {
        let v = &validated[stmt_index];
        match resolve_instr(v, &equ_values, &labels) {
            Ok(resolved) => {
                let bytes = encode::encode(&resolved);
                for (off, b) in bytes.iter().enumerate() {
                    image[*addr as usize + off] = *b;
                }
                source_map.push(*addr, bytes.len() as u16, *position);
            }
            Err(e) => errors.push(Error::resolve(e, *position)),
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(Program { entry: Word::new(entry.unwrap_or(0)), image, source_map, labels })
}

fn write_data_word(
    image: &mut [u8],
    offset: u16,
    width: DataWidth,
    value: i64,
    errors: &mut Vec<Error>,
    position: Position,
) {
    let bits: u32 = match width {
        DataWidth::Byte => 8,
        DataWidth::Word => 16,
    };
    let span = 1i64 << bits;
    if value < -(span / 2) || value >= span {
        errors.push(Error::resolve(ResolveError::ValueOutOfRange { value, bits }, position));
        return;
    }
    let unsigned = if value < 0 { (value + span) as u32 } else { value as u32 };
    match width {
        DataWidth::Byte => image[offset as usize] = unsigned as u8,
        DataWidth::Word => {
            image[offset as usize] = (unsigned & 0xFF) as u8;
            image[offset as usize + 1] = ((unsigned >> 8) & 0xFF) as u8;
        }
    }
}

fn eval_addr(e: &Expr, equ: &HashMap<String, i64>, labels: &HashMap<String, u16>) -> Result<Word, ResolveError> {
    let v = eval_expr(e, equ, Some(labels))?;
    if !(0..=0xFFFF).contains(&v) {
        return Err(ResolveError::ValueOutOfRange { value: v, bits: 16 });
    }
    Ok(Word::new(v as u16))
}

fn eval_byte(e: &Expr, equ: &HashMap<String, i64>, labels: &HashMap<String, u16>) -> Result<Byte, ResolveError> {
    let v = eval_expr(e, equ, Some(labels))?;
    if !(0..=0xFF).contains(&v) {
        return Err(ResolveError::ValueOutOfRange { value: v, bits: 8 });
    }
    Ok(Byte::new(v as u8))
}

/// An immediate operand's legal range is the same dual unsigned/signed
/// domain `Byte::from_i32`/`Word::from_i32` accept (`-128..=255` for a
/// byte, `-32768..=65535` for a word): the encoder stores whichever
/// bit pattern the value implies.
fn eval_imm(
    e: &Expr,
    equ: &HashMap<String, i64>,
    labels: &HashMap<String, u16>,
    is_word: bool,
) -> Result<i64, ResolveError> {
    let v = eval_expr(e, equ, Some(labels))?;
    let (lo, hi, bits) = if is_word { (-0x8000, 0xFFFF, 16) } else { (-0x80, 0xFF, 8) };
    if v < lo || v > hi {
        return Err(ResolveError::ValueOutOfRange { value: v, bits });
    }
    Ok(v)
}

fn resolve_instr(
    v: &ValidatedInstr,
    equ: &HashMap<String, i64>,
    labels: &HashMap<String, u16>,
) -> Result<ResolvedInstr, ResolveError> {
    Ok(match v {
        ValidatedInstr::Binary { mnemonic, mode, is_word } => {
            let mode = match mode {
                ValidatedBinaryMode::RegReg { dst, src } => ResolvedBinaryMode::RegReg { dst: *dst, src: *src },
                ValidatedBinaryMode::RegIndirect { reg, reg_is_source } => {
                    ResolvedBinaryMode::RegIndirect { reg: *reg, reg_is_source: *reg_is_source }
                }
                ValidatedBinaryMode::RegDirect { reg, reg_is_source, addr } => ResolvedBinaryMode::RegDirect {
                    reg: *reg,
                    reg_is_source: *reg_is_source,
                    addr: eval_addr(addr, equ, labels)?,
                },
                ValidatedBinaryMode::RegImm { reg, imm } => {
                    ResolvedBinaryMode::RegImm { reg: *reg, imm: eval_imm(imm, equ, labels, *is_word)? }
                }
                ValidatedBinaryMode::MemIndirectImm { imm, .. } => {
                    ResolvedBinaryMode::MemIndirectImm { imm: eval_imm(imm, equ, labels, *is_word)? }
                }
                ValidatedBinaryMode::MemDirectImm { addr, imm, .. } => ResolvedBinaryMode::MemDirectImm {
                    addr: eval_addr(addr, equ, labels)?,
                    imm: eval_imm(imm, equ, labels, *is_word)?,
                },
            };
            ResolvedInstr::Binary { mnemonic: *mnemonic, mode, is_word: *is_word }
        }
        ValidatedInstr::Unary { mnemonic, mode } => {
            let mode = match mode {
                ValidatedUnaryMode::Reg(r) => ResolvedUnaryMode::Reg(*r),
                ValidatedUnaryMode::Indirect { is_word } => ResolvedUnaryMode::Indirect { is_word: *is_word },
                ValidatedUnaryMode::Direct { is_word, addr } => {
                    ResolvedUnaryMode::Direct { is_word: *is_word, addr: eval_addr(addr, equ, labels)? }
                }
            };
            ResolvedInstr::Unary { mnemonic: *mnemonic, mode }
        }
        ValidatedInstr::Stack { mnemonic, reg } => ResolvedInstr::Stack { mnemonic: *mnemonic, reg: *reg },
        ValidatedInstr::Zeroary(m) => ResolvedInstr::Zeroary(*m),
        ValidatedInstr::Jump { mnemonic, target } => {
            ResolvedInstr::Jump { mnemonic: *mnemonic, target: eval_addr(target, equ, labels)? }
        }
        ValidatedInstr::Int { vector } => ResolvedInstr::Int { vector: eval_byte(vector, equ, labels)? },
        ValidatedInstr::Io { mnemonic, is_word, port } => {
            let port = match port {
                IoPort::Dx => ResolvedIoPort::Dx,
                IoPort::Imm(e) => ResolvedIoPort::Imm(eval_byte(e, equ, labels)?),
            };
            ResolvedInstr::Io { mnemonic: *mnemonic, is_word: *is_word, port }
        }
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser;

    fn assemble(src: &str) -> Result<Program, Vec<Error>> {
        let (tokens, lex_errors) = Lexer::new(src).tokenize();
        assert!(lex_errors.is_empty(), "{:?}", lex_errors);
        let (statements, parse_errors) = parser::parse(tokens);
        assert!(parse_errors.is_empty(), "{:?}", parse_errors);
        resolve(&statements)
    }

    #[test]
    fn org_and_simple_mov_round_trips_through_the_image() {
        let program = assemble("ORG 2000h\nMOV AX, 5\nHLT\nEND\n").unwrap();
        assert_eq!(program.entry, Word::new(0x2000));
        assert_ne!(program.image[0x2000], 0);
    }

    #[test]
    fn entry_is_first_instruction_not_first_org() {
        // Data segment at 1000h, code segment at 2000h: entry must land on
        // the first instruction, not on the data segment's ORG.
        let program = assemble("ORG 1000h\nX: DB 0\nORG 2000h\nMOV AL, X\nINC AL\nMOV X, AL\nHLT\nEND\n").unwrap();
        assert_eq!(program.entry, Word::new(0x2000));
        assert_eq!(program.labels["X"], 0x1000);
    }

    #[test]
    fn entry_skips_leading_data_within_one_org() {
        let program = assemble("ORG 2000h\nX: DB 0\nMOV AL, X\nHLT\nEND\n").unwrap();
        assert_eq!(program.entry, Word::new(0x2001));
    }

    #[test]
    fn missing_org_is_reported() {
        let errors = assemble("NOP\nEND\n").unwrap_err();
        assert!(errors.iter().any(|e| e.code() == "missing-org"));
    }

    #[test]
    fn data_label_referenced_by_an_instruction_resolves() {
        let program = assemble("ORG 2000h\nMOV AX, X\nHLT\nX: DW 10\nEND\n").unwrap();
        assert_eq!(program.labels["X"], 0x2005);
    }

    #[test]
    fn top_of_memory_boundary() {
        assemble("ORG 3FFEh\nDW 0\nEND\n").unwrap();
        let errors = assemble("ORG 3FFFh\nDW 0\nEND\n").unwrap_err();
        assert!(errors.iter().any(|e| e.code() == "instruction-out-of-range"));
    }

    #[test]
    fn equ_cycle_is_reported_once() {
        let errors = assemble("A EQU B\nB EQU A\nORG 2000h\nEND\n").unwrap_err();
        assert!(errors.iter().any(|e| e.code() == "label-undefined-chain"));
    }

    #[test]
    fn equ_constant_feeds_org() {
        let program = assemble("BASE EQU 2000h\nORG BASE\nHLT\nEND\n").unwrap();
        assert_eq!(program.entry, Word::new(0x2000));
    }

    #[test]
    fn overlapping_org_reports_occupied_address() {
        let errors = assemble("ORG 2000h\nDW 1\nORG 2000h\nDW 2\nEND\n").unwrap_err();
        assert!(errors.iter().any(|e| e.code() == "occupied-address"));
    }
}
