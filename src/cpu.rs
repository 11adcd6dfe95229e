//! A small micro-stepping 6502 core.
//!
//! Only enough of the instruction set is decoded to run simple hand-entered
//! programs: immediate/absolute loads and stores, ADC/SBC, both JMP forms,
//! register transfers, increments and the flag instructions. Anything else is
//! treated as a single byte NOP. Decimal mode and interrupts are not modelled.
use crate::engine::{Engine, EngineState, Registers, StatusFlags};
use crate::memory::MemoryMap;
use log::debug;
use std::collections::TryReserveError;

/// hardware vector locations, each holding a little-endian address
pub const NMI_VECTOR_ADDR: u16 = 0xfffa;
pub const RESET_VECTOR_ADDR: u16 = 0xfffc;
pub const IRQ_VECTOR_ADDR: u16 = 0xfffe;

// opcodes the monitor writes into memory itself
pub const LDA_IMM: u8 = 0xa9;
pub const ADC_IMM: u8 = 0x69;
pub const NOP: u8 = 0xea;
pub const JMP_ABS: u8 = 0x4c;
pub const JMP_IND: u8 = 0x6c;

// micro-steps; indices into engine::CYCLE_NAMES
const FETCH: usize = 0;
const OPER_LO: usize = 1;
const OPER_HI: usize = 2;
const PTR_LO: usize = 3;
const PTR_HI: usize = 4;
const EXECUTE: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AddrMode {
    Implied,
    Immediate,
    Absolute,
    Indirect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Nop,
    Lda,
    Ldx,
    Ldy,
    Sta,
    Stx,
    Sty,
    Adc,
    Sbc,
    Jmp,
    Inx,
    Iny,
    Dex,
    Dey,
    Tax,
    Tay,
    Txa,
    Tya,
    Clc,
    Sec,
    Cli,
    Sei,
    Cld,
    Sed,
    Clv,
}

fn decode(opcode: u8) -> Option<(Op, AddrMode)> {
    use AddrMode::*;
    let decoded = match opcode {
        NOP => (Op::Nop, Implied),
        LDA_IMM => (Op::Lda, Immediate),
        0xad => (Op::Lda, Absolute),
        0xa2 => (Op::Ldx, Immediate),
        0xae => (Op::Ldx, Absolute),
        0xa0 => (Op::Ldy, Immediate),
        0xac => (Op::Ldy, Absolute),
        0x8d => (Op::Sta, Absolute),
        0x8e => (Op::Stx, Absolute),
        0x8c => (Op::Sty, Absolute),
        ADC_IMM => (Op::Adc, Immediate),
        0x6d => (Op::Adc, Absolute),
        0xe9 => (Op::Sbc, Immediate),
        0xed => (Op::Sbc, Absolute),
        JMP_ABS => (Op::Jmp, Absolute),
        JMP_IND => (Op::Jmp, Indirect),
        0xe8 => (Op::Inx, Implied),
        0xc8 => (Op::Iny, Implied),
        0xca => (Op::Dex, Implied),
        0x88 => (Op::Dey, Implied),
        0xaa => (Op::Tax, Implied),
        0xa8 => (Op::Tay, Implied),
        0x8a => (Op::Txa, Implied),
        0x98 => (Op::Tya, Implied),
        0x18 => (Op::Clc, Implied),
        0x38 => (Op::Sec, Implied),
        0x58 => (Op::Cli, Implied),
        0x78 => (Op::Sei, Implied),
        0xd8 => (Op::Cld, Implied),
        0xf8 => (Op::Sed, Implied),
        0xb8 => (Op::Clv, Implied),
        _ => return None,
    };
    Some(decoded)
}

pub struct Mos6502 {
    state: EngineState,
    op: Op,
    mode: AddrMode,
    operand: u16,
    pointer: u16,
}

impl Mos6502 {
    pub fn try_new() -> Result<Self, TryReserveError> {
        Ok(Mos6502 {
            state: EngineState::try_new()?,
            op: Op::Nop,
            mode: AddrMode::Implied,
            operand: 0,
            pointer: 0,
        })
    }

    fn fetch_pc_byte(&mut self) -> u8 {
        let pc = self.state.regs.pc;
        self.state.regs.pc = pc.wrapping_add(1);
        self.state.mem.read_byte(pc)
    }

    fn operand_value(&self) -> u8 {
        match self.mode {
            AddrMode::Immediate => self.operand as u8,
            AddrMode::Absolute => self.state.mem.read_byte(self.operand),
            _ => 0,
        }
    }

    fn adc(&mut self, value: u8) {
        let r = &mut self.state.regs;
        let sum = r.a as u16 + value as u16 + r.flags.c as u16;
        let result = sum as u8;
        r.flags.v = (!(r.a ^ value) & (r.a ^ result) & 0x80) != 0;
        r.flags.c = sum > 0xff;
        r.a = result;
        r.flags.set_nz(result);
    }

    fn execute(&mut self) {
        let value = self.operand_value();
        let target = self.operand;
        let regs = &mut self.state.regs;
        match self.op {
            Op::Nop => {}
            Op::Lda => {
                regs.a = value;
                regs.flags.set_nz(value);
            }
            Op::Ldx => {
                regs.x = value;
                regs.flags.set_nz(value);
            }
            Op::Ldy => {
                regs.y = value;
                regs.flags.set_nz(value);
            }
            Op::Sta => {
                let a = regs.a;
                self.state.mem.write_byte(target, a);
            }
            Op::Stx => {
                let x = regs.x;
                self.state.mem.write_byte(target, x);
            }
            Op::Sty => {
                let y = regs.y;
                self.state.mem.write_byte(target, y);
            }
            Op::Adc => self.adc(value),
            Op::Sbc => self.adc(!value),
            Op::Jmp => regs.pc = target,
            Op::Inx => {
                regs.x = regs.x.wrapping_add(1);
                regs.flags.set_nz(regs.x);
            }
            Op::Iny => {
                regs.y = regs.y.wrapping_add(1);
                regs.flags.set_nz(regs.y);
            }
            Op::Dex => {
                regs.x = regs.x.wrapping_sub(1);
                regs.flags.set_nz(regs.x);
            }
            Op::Dey => {
                regs.y = regs.y.wrapping_sub(1);
                regs.flags.set_nz(regs.y);
            }
            Op::Tax => {
                regs.x = regs.a;
                regs.flags.set_nz(regs.x);
            }
            Op::Tay => {
                regs.y = regs.a;
                regs.flags.set_nz(regs.y);
            }
            Op::Txa => {
                regs.a = regs.x;
                regs.flags.set_nz(regs.a);
            }
            Op::Tya => {
                regs.a = regs.y;
                regs.flags.set_nz(regs.a);
            }
            Op::Clc => regs.flags.c = false,
            Op::Sec => regs.flags.c = true,
            Op::Cli => regs.flags.i = false,
            Op::Sei => regs.flags.i = true,
            Op::Cld => regs.flags.d = false,
            Op::Sed => regs.flags.d = true,
            Op::Clv => regs.flags.v = false,
        }
    }
}

impl Engine for Mos6502 {
    fn reset(&mut self) {
        let pc = self.state.mem.get_word(RESET_VECTOR_ADDR);
        self.state.regs = Registers {
            sp: 0xfd,
            pc,
            flags: StatusFlags {
                i: true,
                ..StatusFlags::default()
            },
            ..Registers::default()
        };
        self.state.cycle = FETCH;
        self.state.instr_ptr = pc;
        self.op = Op::Nop;
        self.mode = AddrMode::Implied;
    }

    fn step(&mut self) {
        self.state.cycle = match self.state.cycle {
            FETCH => {
                self.state.instr_ptr = self.state.regs.pc;
                let opcode = self.fetch_pc_byte();
                let (op, mode) = decode(opcode).unwrap_or_else(|| {
                    debug!(
                        "opcode 0x{:02X} at 0x{:04X} not implemented, treating as NOP",
                        opcode, self.state.instr_ptr
                    );
                    (Op::Nop, AddrMode::Implied)
                });
                self.op = op;
                self.mode = mode;
                self.operand = 0;
                match mode {
                    AddrMode::Implied => EXECUTE,
                    _ => OPER_LO,
                }
            }
            OPER_LO => {
                self.operand = self.fetch_pc_byte() as u16;
                match self.mode {
                    AddrMode::Immediate => EXECUTE,
                    _ => OPER_HI,
                }
            }
            OPER_HI => {
                self.operand |= (self.fetch_pc_byte() as u16) << 8;
                match self.mode {
                    AddrMode::Indirect => PTR_LO,
                    _ => EXECUTE,
                }
            }
            PTR_LO => {
                self.pointer = self.state.mem.read_byte(self.operand) as u16;
                PTR_HI
            }
            PTR_HI => {
                // the pointer's high byte never crosses a page
                let hi_addr = (self.operand & 0xff00) | (self.operand.wrapping_add(1) & 0x00ff);
                self.pointer |= (self.state.mem.read_byte(hi_addr) as u16) << 8;
                self.operand = self.pointer;
                EXECUTE
            }
            _ => {
                self.execute();
                FETCH
            }
        };
    }

    fn state(&self) -> &EngineState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut EngineState {
        &mut self.state
    }
}
