//! The instruction decode/execute state machine.
//!
//! `Core::step` runs the explicit four-phase cycle (`fetching ->
//! fetching-operands -> executing -> writeback`) this instruction set
//! requires, with every phase transition and register/memory touch
//! reported as a `SimulatorEvent` instead of silently applied.

pub mod alu;

use crate::bus::Bus;
use crate::error::RuntimeError;
use crate::events::{MemoryAccess, MemoryAccessKind, Phase, RegisterWrite, SimulatorEvent};
use crate::isa::{
    self, AnyRegister, BinaryMnemonic, BinaryMode, ByteRegister, Decoded, IoMnemonic,
    JumpCondition, JumpMnemonic, ModeByte, StackMnemonic, UnaryMnemonic, UnaryMode, WordRegister,
    ZeroaryMnemonic,
};
use crate::memory::io::Access;
use crate::memory::{Storage, RAM_SIZE};
use crate::pic;
use crate::registers::RegisterFile;
use crate::value::{Byte, Word};

/// What the CPU is waiting on across a suspended `step()` call. `INT 6`
/// leaves the flags-push half of its atomic sequence already committed to
/// the stack and records where the byte still needs to go; the next
/// `step()` call supplies it and finishes the sequence, rather than
/// re-running the instruction from scratch.
#[derive(Clone, Copy, Debug)]
enum Pending {
    ConsoleRead { target: Word },
}

pub struct Core {
    pub regs: RegisterFile,
    pending: Option<Pending>,
}

#[derive(Debug)]
pub enum StepOutcome {
    Running(Vec<SimulatorEvent>),
    AwaitingConsole(Vec<SimulatorEvent>),
    Halted(Vec<SimulatorEvent>),
    Fatal {
        events: Vec<SimulatorEvent>,
        error: RuntimeError,
    },
}

enum ExecOutcome {
    Continue,
    Halt,
    AwaitConsole,
}

enum Dest {
    Reg(AnyRegister),
    Mem(Word),
}

impl Core {
    pub fn new() -> Core {
        Core {
            regs: RegisterFile::new(),
            pending: None,
        }
    }

    /// Runs one instruction (or resumes one suspended on console input, or
    /// services a pending hardware interrupt) and returns every event it
    /// produced along the way. `console_byte` is consulted only when a
    /// previous call returned `AwaitingConsole`.
    pub fn step(&mut self, bus: &mut Bus, console_byte: Option<Byte>) -> StepOutcome {
        let mut events = Vec::new();

        if let Some(Pending::ConsoleRead { target }) = self.pending {
            return match console_byte {
                None => StepOutcome::AwaitingConsole(events),
                Some(byte) => {
                    self.pending = None;
                    if let Err(error) = self.write_mem_byte(bus, &mut events, target, byte) {
                        return StepOutcome::Fatal { events, error };
                    }
                    events.push(SimulatorEvent::ConsoleRead { value: byte });
                    match self.pop_word(bus, &mut events) {
                        Ok(flags_word) => {
                            self.set_flags_from_word(flags_word);
                            StepOutcome::Running(events)
                        }
                        Err(error) => StepOutcome::Fatal { events, error },
                    }
                }
            };
        }

        match bus.pic_update(self.regs.flags.interrupt) {
            pic::Update::Dispatch { id, .. } => {
                return match self.dispatch_interrupt(bus, &mut events, id, true) {
                    Ok(()) => StepOutcome::Running(events),
                    Err(error) => StepOutcome::Fatal { events, error },
                };
            }
            pic::Update::ReservedInterrupt { id, .. } => {
                return StepOutcome::Fatal {
                    events,
                    error: RuntimeError::ReservedInterrupt { id: id.unsigned() },
                };
            }
            pic::Update::None => {}
        }

        events.push(SimulatorEvent::CycleStart {
            address: self.regs.ip,
        });
        events.push(SimulatorEvent::CycleUpdate {
            phase: Phase::Fetching,
        });

        let opcode = match self.fetch_byte(bus, &mut events) {
            Ok(byte) => byte,
            Err(error) => return StepOutcome::Fatal { events, error },
        };
        let decoded = match isa::decode_opcode(opcode.unsigned()) {
            Some(decoded) => decoded,
            None => {
                return StepOutcome::Fatal {
                    events,
                    error: RuntimeError::InvalidOpcode {
                        byte: opcode.unsigned(),
                    },
                }
            }
        };
        events.push(SimulatorEvent::Decode {
            opcode,
            mnemonic: decoded_name(&decoded),
        });
        events.push(SimulatorEvent::CycleUpdate {
            phase: Phase::FetchingOperands,
        });
        events.push(SimulatorEvent::CycleUpdate {
            phase: Phase::Executing,
        });

        let result = self.execute(bus, &mut events, decoded);

        events.push(SimulatorEvent::CycleUpdate {
            phase: Phase::Writeback,
        });

        match result {
            Ok(ExecOutcome::Continue) => StepOutcome::Running(events),
            Ok(ExecOutcome::Halt) => {
                events.push(SimulatorEvent::Halted);
                StepOutcome::Halted(events)
            }
            Ok(ExecOutcome::AwaitConsole) => StepOutcome::AwaitingConsole(events),
            Err(error) => StepOutcome::Fatal { events, error },
        }
    }

    fn execute(
        &mut self,
        bus: &mut Bus,
        events: &mut Vec<SimulatorEvent>,
        decoded: Decoded,
    ) -> Result<ExecOutcome, RuntimeError> {
        match decoded {
            Decoded::Binary(m, mode, is_word) => {
                self.exec_binary(bus, events, m, mode, is_word)?;
                Ok(ExecOutcome::Continue)
            }
            Decoded::Unary(m, mode) => {
                self.exec_unary(bus, events, m, mode)?;
                Ok(ExecOutcome::Continue)
            }
            Decoded::Stack(m, reg) => {
                self.exec_stack(bus, events, m, reg)?;
                Ok(ExecOutcome::Continue)
            }
            Decoded::Zeroary(m) => self.exec_zeroary(bus, events, m),
            Decoded::Jump(m) => {
                self.exec_jump(bus, events, m)?;
                Ok(ExecOutcome::Continue)
            }
            Decoded::Int => self.exec_int(bus, events),
            Decoded::Io(m, is_word, port_is_dx) => {
                self.exec_io(bus, events, m, is_word, port_is_dx)?;
                Ok(ExecOutcome::Continue)
            }
        }
    }

    // -- fetch / memory / stack helpers --------------------------------

    fn fetch_byte(
        &mut self,
        bus: &mut Bus,
        events: &mut Vec<SimulatorEvent>,
    ) -> Result<Byte, RuntimeError> {
        let address = self.regs.ip;
        let value = self.read_mem_byte(bus, events, address)?;
        self.regs.ip = address.wrapping_add(1);
        Ok(value)
    }

    fn fetch_word(
        &mut self,
        bus: &mut Bus,
        events: &mut Vec<SimulatorEvent>,
    ) -> Result<Word, RuntimeError> {
        let low = self.fetch_byte(bus, events)?;
        let high = self.fetch_byte(bus, events)?;
        Ok(Word::from_bytes(low, high))
    }

    fn fetch_immediate(
        &mut self,
        bus: &mut Bus,
        events: &mut Vec<SimulatorEvent>,
        is_word: bool,
    ) -> Result<u16, RuntimeError> {
        if is_word {
            Ok(self.fetch_word(bus, events)?.unsigned())
        } else {
            Ok(self.fetch_byte(bus, events)?.unsigned() as u16)
        }
    }

    fn read_mem_byte(
        &self,
        bus: &Bus,
        events: &mut Vec<SimulatorEvent>,
        address: Word,
    ) -> Result<Byte, RuntimeError> {
        let value = bus.read_byte(address.unsigned()).ok_or(RuntimeError::BadMemoryAccess {
            address: address.unsigned(),
        })?;
        events.push(SimulatorEvent::Memory(MemoryAccess {
            kind: MemoryAccessKind::Read,
            address,
            value,
        }));
        Ok(value)
    }

    fn write_mem_byte(
        &self,
        bus: &mut Bus,
        events: &mut Vec<SimulatorEvent>,
        address: Word,
        value: Byte,
    ) -> Result<(), RuntimeError> {
        if !bus.write_byte(address.unsigned(), value) {
            return Err(RuntimeError::BadMemoryAccess {
                address: address.unsigned(),
            });
        }
        events.push(SimulatorEvent::Memory(MemoryAccess {
            kind: MemoryAccessKind::Write,
            address,
            value,
        }));
        Ok(())
    }

    fn read_mem_word(
        &self,
        bus: &Bus,
        events: &mut Vec<SimulatorEvent>,
        address: Word,
    ) -> Result<Word, RuntimeError> {
        let low = self.read_mem_byte(bus, events, address)?;
        let high_addr = address.wrapping_add(1);
        let high = self.read_mem_byte(bus, events, high_addr)?;
        Ok(Word::from_bytes(low, high))
    }

    fn write_mem_word(
        &self,
        bus: &mut Bus,
        events: &mut Vec<SimulatorEvent>,
        address: Word,
        value: Word,
    ) -> Result<(), RuntimeError> {
        self.write_mem_byte(bus, events, address, value.low())?;
        self.write_mem_byte(bus, events, address.wrapping_add(1), value.high())
    }

    fn push_word(
        &mut self,
        bus: &mut Bus,
        events: &mut Vec<SimulatorEvent>,
        value: Word,
    ) -> Result<(), RuntimeError> {
        if self.regs.word(WordRegister::SP).unsigned() < 2 {
            return Err(RuntimeError::StackOverflow);
        }
        let new_sp = self.regs.word(WordRegister::SP).wrapping_sub(2);
        self.write_mem_word(bus, events, new_sp, value)?;
        self.regs.set_word(WordRegister::SP, new_sp);
        Ok(())
    }

    fn pop_word(
        &mut self,
        bus: &mut Bus,
        events: &mut Vec<SimulatorEvent>,
    ) -> Result<Word, RuntimeError> {
        let sp = self.regs.word(WordRegister::SP);
        if sp.unsigned() as usize + 2 > RAM_SIZE {
            return Err(RuntimeError::StackUnderflow);
        }
        let value = self.read_mem_word(bus, events, sp)?;
        self.regs.set_word(WordRegister::SP, sp.wrapping_add(2));
        Ok(value)
    }

    // -- register helpers ------------------------------------------------

    fn any_register(&self, index: u8, is_word: bool) -> Result<AnyRegister, RuntimeError> {
        if is_word {
            WordRegister::from_index(index)
                .map(AnyRegister::Word)
                .ok_or(RuntimeError::InvalidOpcode { byte: index })
        } else {
            ByteRegister::from_index(index)
                .map(AnyRegister::Byte)
                .ok_or(RuntimeError::InvalidOpcode { byte: index })
        }
    }

    fn read_register_value(&self, reg: AnyRegister) -> u16 {
        match reg {
            AnyRegister::Byte(r) => self.regs.byte(r).unsigned() as u16,
            AnyRegister::Word(r) => self.regs.word(r).unsigned(),
        }
    }

    fn write_register_value(&mut self, events: &mut Vec<SimulatorEvent>, reg: AnyRegister, value: u16) {
        match reg {
            AnyRegister::Byte(r) => self.set_byte_reg(events, r, Byte::new(value as u8)),
            AnyRegister::Word(r) => self.set_word_reg(events, r, Word::new(value)),
        }
    }

    fn set_word_reg(&mut self, events: &mut Vec<SimulatorEvent>, reg: WordRegister, value: Word) {
        self.regs.set_word(reg, value);
        events.push(SimulatorEvent::RegisterWrite(RegisterWrite {
            register: reg,
            value,
        }));
    }

    fn set_byte_reg(&mut self, events: &mut Vec<SimulatorEvent>, reg: ByteRegister, value: Byte) {
        self.regs.set_byte(reg, value);
        let parent = reg.parent();
        events.push(SimulatorEvent::RegisterWrite(RegisterWrite {
            register: parent,
            value: self.regs.word(parent),
        }));
    }

    fn read_dest(
        &self,
        bus: &Bus,
        events: &mut Vec<SimulatorEvent>,
        dest: &Dest,
        is_word: bool,
    ) -> Result<u16, RuntimeError> {
        match dest {
            Dest::Reg(r) => Ok(self.read_register_value(*r)),
            Dest::Mem(addr) => {
                if is_word {
                    Ok(self.read_mem_word(bus, events, *addr)?.unsigned())
                } else {
                    Ok(self.read_mem_byte(bus, events, *addr)?.unsigned() as u16)
                }
            }
        }
    }

    fn write_dest(
        &mut self,
        bus: &mut Bus,
        events: &mut Vec<SimulatorEvent>,
        dest: &Dest,
        is_word: bool,
        value: u16,
    ) -> Result<(), RuntimeError> {
        match dest {
            Dest::Reg(r) => {
                self.write_register_value(events, *r, value);
                Ok(())
            }
            Dest::Mem(addr) => {
                if is_word {
                    self.write_mem_word(bus, events, *addr, Word::new(value))
                } else {
                    self.write_mem_byte(bus, events, *addr, Byte::new(value as u8))
                }
            }
        }
    }

    // -- flags word (used by PUSHF/POPF/IRET/INT, not otherwise observable) --

    fn flags_to_word(&self) -> Word {
        let f = &self.regs.flags;
        let mut bits = 0u16;
        if f.carry {
            bits |= 1 << 0;
        }
        if f.zero {
            bits |= 1 << 1;
        }
        if f.sign {
            bits |= 1 << 2;
        }
        if f.overflow {
            bits |= 1 << 3;
        }
        if f.interrupt {
            bits |= 1 << 4;
        }
        Word::new(bits)
    }

    fn set_flags_from_word(&mut self, word: Word) {
        let bits = word.unsigned();
        let f = &mut self.regs.flags;
        f.carry = bits & (1 << 0) != 0;
        f.zero = bits & (1 << 1) != 0;
        f.sign = bits & (1 << 2) != 0;
        f.overflow = bits & (1 << 3) != 0;
        f.interrupt = bits & (1 << 4) != 0;
    }

    // -- instruction classes ----------------------------------------------

    fn exec_binary(
        &mut self,
        bus: &mut Bus,
        events: &mut Vec<SimulatorEvent>,
        mnemonic: BinaryMnemonic,
        mode: BinaryMode,
        is_word: bool,
    ) -> Result<(), RuntimeError> {
        let (dest, right) = self.resolve_binary_operands(bus, events, mode, is_word)?;

        if mnemonic == BinaryMnemonic::MOV {
            return self.write_dest(bus, events, &dest, is_word, right);
        }

        let left = self.read_dest(bus, events, &dest, is_word)?;
        let (result, carry, overflow) = self.alu_binary(mnemonic, left, right, is_word);

        if is_word {
            self.regs.flags.set_from_word_result(Word::new(result));
        } else {
            self.regs.flags.set_from_byte_result(Byte::new(result as u8));
        }
        self.regs.flags.carry = carry;
        self.regs.flags.overflow = overflow;

        if mnemonic != BinaryMnemonic::CMP {
            self.write_dest(bus, events, &dest, is_word, result)?;
        }
        Ok(())
    }

    fn resolve_binary_operands(
        &mut self,
        bus: &mut Bus,
        events: &mut Vec<SimulatorEvent>,
        mode: BinaryMode,
        is_word: bool,
    ) -> Result<(Dest, u16), RuntimeError> {
        Ok(match mode {
            BinaryMode::RegReg => {
                let mb = ModeByte::decode(self.fetch_byte(bus, events)?);
                let dest_reg = self.any_register(mb.reg, is_word)?;
                let src_reg = self.any_register(mb.reg2, is_word)?;
                (Dest::Reg(dest_reg), self.read_register_value(src_reg))
            }
            BinaryMode::RegIndirect => {
                let mb = ModeByte::decode(self.fetch_byte(bus, events)?);
                let reg = self.any_register(mb.reg, is_word)?;
                let addr = self.regs.word(WordRegister::BX);
                self.resolve_reg_mem(bus, events, reg, addr, mb.reg_is_source, is_word)?
            }
            BinaryMode::RegDirect => {
                let mb = ModeByte::decode(self.fetch_byte(bus, events)?);
                let reg = self.any_register(mb.reg, is_word)?;
                let addr = self.fetch_word(bus, events)?;
                self.resolve_reg_mem(bus, events, reg, addr, mb.reg_is_source, is_word)?
            }
            BinaryMode::RegImm => {
                let mb = ModeByte::decode(self.fetch_byte(bus, events)?);
                let dest_reg = self.any_register(mb.reg, is_word)?;
                let imm = self.fetch_immediate(bus, events, is_word)?;
                (Dest::Reg(dest_reg), imm)
            }
            BinaryMode::MemIndirectImm => {
                let addr = self.regs.word(WordRegister::BX);
                let imm = self.fetch_immediate(bus, events, is_word)?;
                (Dest::Mem(addr), imm)
            }
            BinaryMode::MemDirectImm => {
                let addr = self.fetch_word(bus, events)?;
                let imm = self.fetch_immediate(bus, events, is_word)?;
                (Dest::Mem(addr), imm)
            }
        })
    }

    /// Shared by `RegIndirect`/`RegDirect`: `reg_is_source` means the
    /// memory operand is the destination (`op [addr], reg`); otherwise the
    /// register is (`op reg, [addr]`).
    fn resolve_reg_mem(
        &self,
        bus: &Bus,
        events: &mut Vec<SimulatorEvent>,
        reg: AnyRegister,
        addr: Word,
        reg_is_source: bool,
        is_word: bool,
    ) -> Result<(Dest, u16), RuntimeError> {
        if reg_is_source {
            Ok((Dest::Mem(addr), self.read_register_value(reg)))
        } else {
            let mem_value = if is_word {
                self.read_mem_word(bus, events, addr)?.unsigned()
            } else {
                self.read_mem_byte(bus, events, addr)?.unsigned() as u16
            };
            Ok((Dest::Reg(reg), mem_value))
        }
    }

    fn alu_binary(&self, mnemonic: BinaryMnemonic, left: u16, right: u16, is_word: bool) -> (u16, bool, bool) {
        if is_word {
            let (l, r) = (Word::new(left), Word::new(right));
            let (result, carry, overflow) = match mnemonic {
                BinaryMnemonic::ADD => alu::word::add(l, r, false),
                BinaryMnemonic::ADC => alu::word::add(l, r, self.regs.flags.carry),
                BinaryMnemonic::SUB | BinaryMnemonic::CMP => alu::word::sub(l, r, false),
                BinaryMnemonic::SBB => alu::word::sub(l, r, self.regs.flags.carry),
                BinaryMnemonic::AND => (alu::word::and(l, r), false, false),
                BinaryMnemonic::OR => (alu::word::or(l, r), false, false),
                BinaryMnemonic::XOR => (alu::word::xor(l, r), false, false),
                BinaryMnemonic::MOV => unreachable!("MOV short-circuits before alu_binary"),
            };
            (result.unsigned(), carry, overflow)
        } else {
            let (l, r) = (Byte::new(left as u8), Byte::new(right as u8));
            let (result, carry, overflow) = match mnemonic {
                BinaryMnemonic::ADD => alu::byte::add(l, r, false),
                BinaryMnemonic::ADC => alu::byte::add(l, r, self.regs.flags.carry),
                BinaryMnemonic::SUB | BinaryMnemonic::CMP => alu::byte::sub(l, r, false),
                BinaryMnemonic::SBB => alu::byte::sub(l, r, self.regs.flags.carry),
                BinaryMnemonic::AND => (alu::byte::and(l, r), false, false),
                BinaryMnemonic::OR => (alu::byte::or(l, r), false, false),
                BinaryMnemonic::XOR => (alu::byte::xor(l, r), false, false),
                BinaryMnemonic::MOV => unreachable!("MOV short-circuits before alu_binary"),
            };
            (result.unsigned() as u16, carry, overflow)
        }
    }

    fn exec_unary(
        &mut self,
        bus: &mut Bus,
        events: &mut Vec<SimulatorEvent>,
        mnemonic: UnaryMnemonic,
        mode: UnaryMode,
    ) -> Result<(), RuntimeError> {
        let is_word = matches!(
            mode,
            UnaryMode::Reg(AnyRegister::Word(_))
                | UnaryMode::Indirect { is_word: true }
                | UnaryMode::Direct { is_word: true }
        );
        let dest = match mode {
            UnaryMode::Reg(r) => Dest::Reg(r),
            UnaryMode::Indirect { .. } => Dest::Mem(self.regs.word(WordRegister::BX)),
            UnaryMode::Direct { .. } => Dest::Mem(self.fetch_word(bus, events)?),
        };

        let current = self.read_dest(bus, events, &dest, is_word)?;
        let (result, carry, overflow) = if is_word {
            let v = Word::new(current);
            let (r, c, o) = match mnemonic {
                UnaryMnemonic::INC => alu::word::add(v, Word::new(1), false),
                UnaryMnemonic::DEC => alu::word::sub(v, Word::new(1), false),
                UnaryMnemonic::NEG => alu::word::neg(v),
                UnaryMnemonic::NOT => (alu::word::not(v), false, false),
            };
            (r.unsigned(), c, o)
        } else {
            let v = Byte::new(current as u8);
            let (r, c, o) = match mnemonic {
                UnaryMnemonic::INC => alu::byte::add(v, Byte::new(1), false),
                UnaryMnemonic::DEC => alu::byte::sub(v, Byte::new(1), false),
                UnaryMnemonic::NEG => alu::byte::neg(v),
                UnaryMnemonic::NOT => (alu::byte::not(v), false, false),
            };
            (r.unsigned() as u16, c, o)
        };

        if is_word {
            self.regs.flags.set_from_word_result(Word::new(result));
        } else {
            self.regs.flags.set_from_byte_result(Byte::new(result as u8));
        }
        self.regs.flags.overflow = overflow;
        // INC/DEC preserve CF (§4.5); NEG/NOT set it normally.
        if !matches!(mnemonic, UnaryMnemonic::INC | UnaryMnemonic::DEC) {
            self.regs.flags.carry = carry;
        }

        self.write_dest(bus, events, &dest, is_word, result)
    }

    fn exec_stack(
        &mut self,
        bus: &mut Bus,
        events: &mut Vec<SimulatorEvent>,
        mnemonic: StackMnemonic,
        reg: WordRegister,
    ) -> Result<(), RuntimeError> {
        match mnemonic {
            StackMnemonic::PUSH => {
                let value = self.regs.word(reg);
                self.push_word(bus, events, value)
            }
            StackMnemonic::POP => {
                let value = self.pop_word(bus, events)?;
                self.set_word_reg(events, reg, value);
                Ok(())
            }
        }
    }

    fn exec_zeroary(
        &mut self,
        bus: &mut Bus,
        events: &mut Vec<SimulatorEvent>,
        mnemonic: ZeroaryMnemonic,
    ) -> Result<ExecOutcome, RuntimeError> {
        match mnemonic {
            ZeroaryMnemonic::HLT => Ok(ExecOutcome::Halt),
            ZeroaryMnemonic::NOP => Ok(ExecOutcome::Continue),
            ZeroaryMnemonic::IRET => {
                let ip = self.pop_word(bus, events)?;
                let flags_word = self.pop_word(bus, events)?;
                self.regs.ip = ip;
                self.set_flags_from_word(flags_word);
                Ok(ExecOutcome::Continue)
            }
            ZeroaryMnemonic::RET => {
                self.regs.ip = self.pop_word(bus, events)?;
                Ok(ExecOutcome::Continue)
            }
            ZeroaryMnemonic::CLI => {
                self.regs.flags.interrupt = false;
                Ok(ExecOutcome::Continue)
            }
            ZeroaryMnemonic::STI => {
                self.regs.flags.interrupt = true;
                Ok(ExecOutcome::Continue)
            }
            ZeroaryMnemonic::PUSHF => {
                let word = self.flags_to_word();
                self.push_word(bus, events, word)?;
                Ok(ExecOutcome::Continue)
            }
            ZeroaryMnemonic::POPF => {
                let word = self.pop_word(bus, events)?;
                self.set_flags_from_word(word);
                Ok(ExecOutcome::Continue)
            }
        }
    }

    fn exec_jump(
        &mut self,
        bus: &mut Bus,
        events: &mut Vec<SimulatorEvent>,
        mnemonic: JumpMnemonic,
    ) -> Result<(), RuntimeError> {
        let target = self.fetch_word(bus, events)?;
        match mnemonic {
            JumpMnemonic::CALL => {
                let return_address = self.regs.ip;
                self.push_word(bus, events, return_address)?;
                self.regs.ip = target;
            }
            JumpMnemonic::JMP => self.regs.ip = target,
            _ => {
                let condition = mnemonic.condition().expect("non-JMP/CALL jump has a condition");
                if self.evaluate_condition(condition) {
                    self.regs.ip = target;
                }
            }
        }
        Ok(())
    }

    fn evaluate_condition(&self, condition: JumpCondition) -> bool {
        let f = &self.regs.flags;
        match condition {
            JumpCondition::Carry => f.carry,
            JumpCondition::NotCarry => !f.carry,
            JumpCondition::Zero => f.zero,
            JumpCondition::NotZero => !f.zero,
            JumpCondition::Sign => f.sign,
            JumpCondition::NotSign => !f.sign,
            JumpCondition::Overflow => f.overflow,
            JumpCondition::NotOverflow => !f.overflow,
        }
    }

    fn exec_int(&mut self, bus: &mut Bus, events: &mut Vec<SimulatorEvent>) -> Result<ExecOutcome, RuntimeError> {
        let id = self.fetch_byte(bus, events)?;
        match id.unsigned() {
            0 => Ok(ExecOutcome::Halt),
            3 => {
                events.push(SimulatorEvent::Breakpoint);
                Ok(ExecOutcome::Continue)
            }
            6 => {
                let flags_word = self.flags_to_word();
                self.push_word(bus, events, flags_word)?;
                self.regs.flags.interrupt = false;
                let target = self.regs.word(WordRegister::BX);
                events.push(SimulatorEvent::ConsoleReadRequest);
                self.pending = Some(Pending::ConsoleRead { target });
                Ok(ExecOutcome::AwaitConsole)
            }
            7 => {
                let flags_word = self.flags_to_word();
                self.push_word(bus, events, flags_word)?;
                self.regs.flags.interrupt = false;
                let count = self.regs.byte(ByteRegister::AL).unsigned();
                let base = self.regs.word(WordRegister::BX);
                for offset in 0..count as u16 {
                    let address = base.wrapping_add(offset);
                    let byte = self.read_mem_byte(bus, events, address)?;
                    events.push(SimulatorEvent::ConsoleWrite { value: byte });
                }
                let restored = self.pop_word(bus, events)?;
                self.set_flags_from_word(restored);
                Ok(ExecOutcome::Continue)
            }
            n => {
                self.dispatch_interrupt(bus, events, Byte::new(n), false)?;
                Ok(ExecOutcome::Continue)
            }
        }
    }

    fn dispatch_interrupt(
        &mut self,
        bus: &mut Bus,
        events: &mut Vec<SimulatorEvent>,
        id: Byte,
        hardware: bool,
    ) -> Result<(), RuntimeError> {
        let flags_word = self.flags_to_word();
        self.push_word(bus, events, flags_word)?;
        self.regs.flags.interrupt = false;
        let return_address = self.regs.ip;
        self.push_word(bus, events, return_address)?;
        let vector_address = Word::new(id.unsigned() as u16 * 4);
        let vector = self.read_mem_word(bus, events, vector_address)?;
        self.regs.ip = vector;
        events.push(SimulatorEvent::InterruptDispatch { id, vector, hardware });
        Ok(())
    }

    fn exec_io(
        &mut self,
        bus: &mut Bus,
        events: &mut Vec<SimulatorEvent>,
        mnemonic: IoMnemonic,
        is_word: bool,
        port_is_dx: bool,
    ) -> Result<(), RuntimeError> {
        let port = if port_is_dx {
            self.regs.word(WordRegister::DX).low().unsigned()
        } else {
            self.fetch_byte(bus, events)?.unsigned()
        };

        match mnemonic {
            IoMnemonic::IN => {
                if is_word {
                    let low = self.io_read_byte(bus, events, port);
                    let high = self.io_read_byte(bus, events, port.wrapping_add(1));
                    let value = Word::from_bytes(low, high);
                    self.set_word_reg(events, WordRegister::AX, value);
                } else {
                    let value = self.io_read_byte(bus, events, port);
                    self.set_byte_reg(events, ByteRegister::AL, value);
                }
            }
            IoMnemonic::OUT => {
                if is_word {
                    let value = self.regs.word(WordRegister::AX);
                    self.io_write_byte(bus, events, port, value.low());
                    self.io_write_byte(bus, events, port.wrapping_add(1), value.high());
                } else {
                    let value = self.regs.byte(ByteRegister::AL);
                    self.io_write_byte(bus, events, port, value);
                }
            }
        }
        Ok(())
    }

    fn io_read_byte(&self, bus: &mut Bus, events: &mut Vec<SimulatorEvent>, port: u8) -> Byte {
        match bus.io_read(port) {
            Access::Mapped(value) => {
                events.push(SimulatorEvent::IoRead {
                    port: Byte::new(port),
                    value,
                });
                value
            }
            Access::Unmapped => {
                events.push(SimulatorEvent::IoUnmappedRead { port: Byte::new(port) });
                Byte::ZERO
            }
        }
    }

    fn io_write_byte(&self, bus: &mut Bus, events: &mut Vec<SimulatorEvent>, port: u8, value: Byte) {
        if bus.io_write(port, value) {
            events.push(SimulatorEvent::IoWrite {
                port: Byte::new(port),
                value,
            });
        } else {
            events.push(SimulatorEvent::IoUnmappedWrite {
                port: Byte::new(port),
                value,
            });
        }
    }
}

impl Default for Core {
    fn default() -> Core {
        Core::new()
    }
}

fn decoded_name(decoded: &Decoded) -> &'static str {
    match decoded {
        Decoded::Binary(m, _, _) => match m {
            BinaryMnemonic::MOV => "MOV",
            BinaryMnemonic::ADD => "ADD",
            BinaryMnemonic::ADC => "ADC",
            BinaryMnemonic::SUB => "SUB",
            BinaryMnemonic::SBB => "SBB",
            BinaryMnemonic::AND => "AND",
            BinaryMnemonic::OR => "OR",
            BinaryMnemonic::XOR => "XOR",
            BinaryMnemonic::CMP => "CMP",
        },
        Decoded::Unary(m, _) => match m {
            UnaryMnemonic::INC => "INC",
            UnaryMnemonic::DEC => "DEC",
            UnaryMnemonic::NEG => "NEG",
            UnaryMnemonic::NOT => "NOT",
        },
        Decoded::Stack(m, _) => match m {
            StackMnemonic::PUSH => "PUSH",
            StackMnemonic::POP => "POP",
        },
        Decoded::Zeroary(m) => match m {
            ZeroaryMnemonic::HLT => "HLT",
            ZeroaryMnemonic::NOP => "NOP",
            ZeroaryMnemonic::IRET => "IRET",
            ZeroaryMnemonic::RET => "RET",
            ZeroaryMnemonic::CLI => "CLI",
            ZeroaryMnemonic::STI => "STI",
            ZeroaryMnemonic::PUSHF => "PUSHF",
            ZeroaryMnemonic::POPF => "POPF",
        },
        Decoded::Jump(m) => match m {
            JumpMnemonic::JMP => "JMP",
            JumpMnemonic::JC => "JC",
            JumpMnemonic::JNC => "JNC",
            JumpMnemonic::JZ => "JZ",
            JumpMnemonic::JNZ => "JNZ",
            JumpMnemonic::JS => "JS",
            JumpMnemonic::JNS => "JNS",
            JumpMnemonic::JO => "JO",
            JumpMnemonic::JNO => "JNO",
            JumpMnemonic::CALL => "CALL",
        },
        Decoded::Int => "INT",
        Decoded::Io(m, _, _) => match m {
            IoMnemonic::IN => "IN",
            IoMnemonic::OUT => "OUT",
        },
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::memory::DataInit;

    fn new_bus() -> Bus {
        Bus::new(DataInit::Clean)
    }

    fn run_until_halt(core: &mut Core, bus: &mut Bus) -> Vec<SimulatorEvent> {
        let mut all = Vec::new();
        loop {
            match core.step(bus, None) {
                StepOutcome::Running(events) => all.extend(events),
                StepOutcome::Halted(events) => {
                    all.extend(events);
                    return all;
                }
                StepOutcome::AwaitingConsole(_) => panic!("unexpected console wait"),
                StepOutcome::Fatal { error, .. } => panic!("fatal: {}", error),
            }
        }
    }

    #[test]
    fn hello_counter_scenario() {
        // ORG 1000h; X: DB 0 -> byte at 1000h
        // ORG 2000h; MOV AL, X; INC AL; MOV X, AL; HLT
        let mut bus = new_bus();
        bus.write_byte(0x1000, Byte::new(0));

        let mut code = Vec::new();
        // MOV AL, [1000h]  (RegDirect, reg is dest => reg_is_source=false)
        code.push(isa::binary_opcode(BinaryMnemonic::MOV, BinaryMode::RegDirect, false));
        code.push(
            ModeByte {
                reg: ByteRegister::AL.index(),
                reg2: 0,
                reg_is_source: false,
            }
            .encode()
            .unsigned(),
        );
        code.extend_from_slice(&0x1000u16.to_le_bytes());
        // INC AL
        code.push(isa::unary_opcode(
            UnaryMnemonic::INC,
            UnaryMode::Reg(AnyRegister::Byte(ByteRegister::AL)),
        ));
        // MOV [1000h], AL  (reg_is_source=true: mem is dest)
        code.push(isa::binary_opcode(BinaryMnemonic::MOV, BinaryMode::RegDirect, false));
        code.push(
            ModeByte {
                reg: ByteRegister::AL.index(),
                reg2: 0,
                reg_is_source: true,
            }
            .encode()
            .unsigned(),
        );
        code.extend_from_slice(&0x1000u16.to_le_bytes());
        // HLT
        code.push(isa::zeroary_opcode(ZeroaryMnemonic::HLT));

        for (i, &byte) in code.iter().enumerate() {
            bus.write_byte(0x2000 + i as u16, Byte::new(byte));
        }

        let mut core = Core::new();
        core.regs.ip = Word::new(0x2000);
        run_until_halt(&mut core, &mut bus);

        assert_eq!(bus.read_byte(0x1000), Some(Byte::new(1)));
    }

    #[test]
    fn carry_flag_scenario() {
        // MOV AL, 0FFh; ADD AL, 1; HLT
        let mut bus = new_bus();
        let mut code = vec![
            isa::binary_opcode(BinaryMnemonic::MOV, BinaryMode::RegImm, false),
            ModeByte {
                reg: ByteRegister::AL.index(),
                reg2: 0,
                reg_is_source: false,
            }
            .encode()
            .unsigned(),
            0xFF,
            isa::binary_opcode(BinaryMnemonic::ADD, BinaryMode::RegImm, false),
            ModeByte {
                reg: ByteRegister::AL.index(),
                reg2: 0,
                reg_is_source: false,
            }
            .encode()
            .unsigned(),
            0x01,
        ];
        code.push(isa::zeroary_opcode(ZeroaryMnemonic::HLT));
        for (i, &byte) in code.iter().enumerate() {
            bus.write_byte(i as u16, Byte::new(byte));
        }

        let mut core = Core::new();
        run_until_halt(&mut core, &mut bus);

        assert_eq!(core.regs.byte(ByteRegister::AL), Byte::new(0x00));
        assert!(core.regs.flags.zero);
        assert!(core.regs.flags.carry);
        assert!(!core.regs.flags.overflow);
        assert!(!core.regs.flags.sign);
    }

    #[test]
    fn signed_overflow_scenario() {
        // MOV AL, 7Fh; ADD AL, 1; HLT
        let mut bus = new_bus();
        let mut code = vec![
            isa::binary_opcode(BinaryMnemonic::MOV, BinaryMode::RegImm, false),
            ModeByte {
                reg: ByteRegister::AL.index(),
                reg2: 0,
                reg_is_source: false,
            }
            .encode()
            .unsigned(),
            0x7F,
            isa::binary_opcode(BinaryMnemonic::ADD, BinaryMode::RegImm, false),
            ModeByte {
                reg: ByteRegister::AL.index(),
                reg2: 0,
                reg_is_source: false,
            }
            .encode()
            .unsigned(),
            0x01,
        ];
        code.push(isa::zeroary_opcode(ZeroaryMnemonic::HLT));
        for (i, &byte) in code.iter().enumerate() {
            bus.write_byte(i as u16, Byte::new(byte));
        }

        let mut core = Core::new();
        run_until_halt(&mut core, &mut bus);

        assert_eq!(core.regs.byte(ByteRegister::AL), Byte::new(0x80));
        assert!(!core.regs.flags.carry);
        assert!(core.regs.flags.overflow);
        assert!(core.regs.flags.sign);
    }

    #[test]
    fn stack_push_pop_round_trip() {
        let mut bus = new_bus();
        let mut core = Core::new();
        core.regs.set_word(WordRegister::SP, Word::new(0x3000));
        core.regs.set_word(WordRegister::AX, Word::new(1));
        core.regs.set_word(WordRegister::BX, Word::new(2));
        core.regs.set_word(WordRegister::DX, Word::new(3));

        let mut events = Vec::new();
        core.push_word(&mut bus, &mut events, Word::new(1)).unwrap();
        core.push_word(&mut bus, &mut events, Word::new(2)).unwrap();
        core.push_word(&mut bus, &mut events, Word::new(3)).unwrap();

        let c = core.pop_word(&mut bus, &mut events).unwrap();
        let b = core.pop_word(&mut bus, &mut events).unwrap();
        let a = core.pop_word(&mut bus, &mut events).unwrap();

        assert_eq!((a, b, c), (Word::new(1), Word::new(2), Word::new(3)));
        assert_eq!(core.regs.word(WordRegister::SP), Word::new(0x3000));
    }

    #[test]
    fn int6_console_read_suspends_and_resumes() {
        let mut bus = new_bus();
        let mut code = vec![isa::int_opcode(), 6];
        code.push(isa::zeroary_opcode(ZeroaryMnemonic::HLT));
        for (i, &byte) in code.iter().enumerate() {
            bus.write_byte(i as u16, Byte::new(byte));
        }

        let mut core = Core::new();
        core.regs.set_word(WordRegister::SP, Word::new(0x3000));
        core.regs.set_word(WordRegister::BX, Word::new(0x1000));

        match core.step(&mut bus, None) {
            StepOutcome::AwaitingConsole(_) => {}
            other => panic!("expected AwaitingConsole, got {:?}", other),
        }
        // Calling again with no byte yet must still be suspended.
        match core.step(&mut bus, None) {
            StepOutcome::AwaitingConsole(_) => {}
            other => panic!("expected AwaitingConsole, got {:?}", other),
        }
        match core.step(&mut bus, Some(Byte::new(b'A'))) {
            StepOutcome::Running(_) => {}
            other => panic!("expected Running, got {:?}", other),
        }
        assert_eq!(bus.read_byte(0x1000), Some(Byte::new(b'A')));

        match core.step(&mut bus, None) {
            StepOutcome::Halted(_) => {}
            other => panic!("expected Halted, got {:?}", other),
        }
    }

    #[test]
    fn pic_dispatch_scenario() {
        // Loop at the ISR: HLT as a stand-in body, then IRET isn't reached
        // here -- the important assertion is that a hardware interrupt
        // diverts IP to the vector's target with flags/IP pushed.
        let mut bus = new_bus();
        // Interrupt id 8 is the first non-reserved vector (0..8 are
        // CPU-managed); its IVT slot lives at word address 8*4 = 20h.
        bus.write_word(0x20, Word::new(0x5000));
        bus.write_byte(0x5000, Byte::new(isa::zeroary_opcode(ZeroaryMnemonic::NOP)));

        bus.pic.borrow_mut().set_vector(0, 8);
        use crate::memory::io::IoPort;
        bus.pic.borrow_mut().write(0, Byte::new(0)); // unmask all lines
        bus.pic.borrow_mut().request(0);

        let mut core = Core::new();
        core.regs.ip = Word::new(0x2000);
        core.regs.flags.interrupt = true;
        core.regs.set_word(WordRegister::SP, Word::new(0x3000));

        let events = match core.step(&mut bus, None) {
            StepOutcome::Running(events) => events,
            other => panic!("expected Running (interrupt dispatch), got {:?}", other),
        };

        assert_eq!(core.regs.ip, Word::new(0x5000));
        assert!(events
            .iter()
            .any(|e| matches!(e, SimulatorEvent::InterruptDispatch { hardware: true, .. })));
    }
}
