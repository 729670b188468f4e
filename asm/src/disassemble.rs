//! The inverse of `encode`: turns a byte image back into assembly text.
//! Exists for the round-trip testable property
//! (`assemble(source) == assemble(disassemble(assemble(source)))`), not as
//! a general-purpose disassembler -- it never recovers original labels,
//! only numeric addresses, so the byte image it reassembles to is
//! guaranteed identical even though the text looks different.

use vonsim_core::isa::{self, AnyRegister, BinaryMode, Decoded, ModeByte, UnaryMode};
use vonsim_core::value::Word;

fn register_name(reg: AnyRegister) -> String {
    match reg {
        AnyRegister::Byte(r) => format!("{:?}", r),
        AnyRegister::Word(r) => format!("{:?}", r),
    }
}

fn read_word(image: &[u8], addr: u16) -> Word {
    Word::from_bytes(image[addr as usize].into(), image[addr.wrapping_add(1) as usize].into())
}

/// Disassembles one instruction starting at `addr`. Returns the assembly
/// text and the number of bytes consumed, or `None` if `addr` does not
/// hold a valid opcode.
pub fn disassemble_one(image: &[u8], addr: u16) -> Option<(String, u16)> {
    let opcode = image[addr as usize];
    let decoded = isa::decode_opcode(opcode)?;
    Some(match decoded {
        Decoded::Binary(mnemonic, mode, is_word) => {
            let size = if is_word { "WORD" } else { "BYTE" };
            match mode {
                BinaryMode::RegReg => {
                    let mb = ModeByte::decode(image[addr as usize + 1].into());
                    let dst = decode_reg(mb.reg, is_word);
                    let src = decode_reg(mb.reg2, is_word);
                    (format!("{:?} {}, {}", mnemonic, register_name(dst), register_name(src)), 2)
                }
                BinaryMode::RegIndirect => {
                    let mb = ModeByte::decode(image[addr as usize + 1].into());
                    let reg = decode_reg(mb.reg, is_word);
                    let text = if mb.reg_is_source {
                        format!("{:?} {} PTR [BX], {}", mnemonic, size, register_name(reg))
                    } else {
                        format!("{:?} {}, {} PTR [BX]", mnemonic, register_name(reg), size)
                    };
                    (text, 2)
                }
                BinaryMode::RegDirect => {
                    let mb = ModeByte::decode(image[addr as usize + 1].into());
                    let reg = decode_reg(mb.reg, is_word);
                    let target = read_word(image, addr + 2);
                    let text = if mb.reg_is_source {
                        format!("{:?} {} PTR [{}], {}", mnemonic, size, target, register_name(reg))
                    } else {
                        format!("{:?} {}, {} PTR [{}]", mnemonic, register_name(reg), size, target)
                    };
                    (text, 4)
                }
                BinaryMode::RegImm => {
                    let mb = ModeByte::decode(image[addr as usize + 1].into());
                    let reg = decode_reg(mb.reg, is_word);
                    let (imm, len) = read_imm(image, addr + 2, is_word);
                    (format!("{:?} {}, {}", mnemonic, register_name(reg), imm), 2 + len)
                }
                BinaryMode::MemIndirectImm => {
                    let (imm, len) = read_imm(image, addr + 1, is_word);
                    (format!("{:?} {} PTR [BX], {}", mnemonic, size, imm), 1 + len)
                }
                BinaryMode::MemDirectImm => {
                    let target = read_word(image, addr + 1);
                    let (imm, len) = read_imm(image, addr + 3, is_word);
                    (format!("{:?} {} PTR [{}], {}", mnemonic, size, target, imm), 3 + len)
                }
            }
        }
        Decoded::Unary(mnemonic, mode) => match mode {
            UnaryMode::Reg(reg) => (format!("{:?} {}", mnemonic, register_name(reg)), 1),
            UnaryMode::Indirect { is_word } => {
                let size = if is_word { "WORD" } else { "BYTE" };
                (format!("{:?} {} PTR [BX]", mnemonic, size), 1)
            }
            UnaryMode::Direct { is_word } => {
                let size = if is_word { "WORD" } else { "BYTE" };
                let target = read_word(image, addr + 1);
                (format!("{:?} {} PTR [{}]", mnemonic, size, target), 3)
            }
        },
        Decoded::Stack(mnemonic, reg) => (format!("{:?} {:?}", mnemonic, reg), 1),
        Decoded::Zeroary(mnemonic) => (format!("{:?}", mnemonic), 1),
        Decoded::Jump(mnemonic) => {
            let target = read_word(image, addr + 1);
            (format!("{:?} {}", mnemonic, target), 3)
        }
        Decoded::Int => {
            let vector = image[addr as usize + 1];
            (format!("INT {}", vector), 2)
        }
        Decoded::Io(mnemonic, is_word, port_is_dx) => {
            let acc = if is_word { "AX" } else { "AL" };
            if port_is_dx {
                match mnemonic {
                    isa::IoMnemonic::IN => (format!("IN {}, DX", acc), 1),
                    isa::IoMnemonic::OUT => (format!("OUT DX, {}", acc), 1),
                }
            } else {
                let port = image[addr as usize + 1];
                match mnemonic {
                    isa::IoMnemonic::IN => (format!("IN {}, {}", acc, port), 2),
                    isa::IoMnemonic::OUT => (format!("OUT {}, {}", port, acc), 2),
                }
            }
        }
    })
}

fn decode_reg(index: u8, is_word: bool) -> AnyRegister {
    if is_word {
        AnyRegister::Word(isa::WordRegister::from_index(index).expect("valid register index"))
    } else {
        AnyRegister::Byte(isa::ByteRegister::from_index(index).expect("valid register index"))
    }
}

fn read_imm(image: &[u8], addr: u16, is_word: bool) -> (i64, u16) {
    if is_word {
        (read_word(image, addr).unsigned() as i64, 2)
    } else {
        (image[addr as usize] as i64, 1)
    }
}

/// Disassembles every instruction in `[start, end)`, one per line. Stops
/// early (without error) at the first byte that isn't a valid opcode,
/// since that is almost always the start of a data segment.
pub fn disassemble(image: &[u8], start: u16, end: u16) -> String {
    let mut lines = Vec::new();
    let mut addr = start;
    while addr < end {
        match disassemble_one(image, addr) {
            Some((text, len)) => {
                lines.push(format!("{:04X}h: {}", addr, text));
                addr = addr.wrapping_add(len);
            }
            None => break,
        }
    }
    lines.join("\n")
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser;
    use crate::resolve;

    #[test]
    fn disassembles_a_reg_reg_mov() {
        let (tokens, _) = Lexer::new("ORG 2000h\nMOV AX, BX\nHLT\nEND\n").tokenize();
        let (statements, _) = parser::parse(tokens);
        let program = resolve::resolve(&statements).unwrap();
        let (text, len) = disassemble_one(&program.image, 0x2000).unwrap();
        assert_eq!(text, "MOV AX, BX");
        assert_eq!(len, 2);
    }

    #[test]
    fn disassembles_an_immediate_mov() {
        let (tokens, _) = Lexer::new("ORG 2000h\nMOV AL, 5\nHLT\nEND\n").tokenize();
        let (statements, _) = parser::parse(tokens);
        let program = resolve::resolve(&statements).unwrap();
        let (text, _) = disassemble_one(&program.image, 0x2000).unwrap();
        assert_eq!(text, "MOV AL, 5");
    }
}
