/// # engine
///
/// The CPU engine is driven one micro-step at a time. Everything the monitor
/// shows about it lives in [`EngineState`]:
///  a, x, y   8bit accumulator and index registers
///  sp        8bit stack pointer (the stack lives in page 0x01)
///  pc        16bit program counter
///  flags     n v - b d i z c
///  mem       the whole 64K address space
///  cycle     which phase of the current instruction runs next
///  instr_ptr address of the instruction being executed; pc runs ahead of it
///            while operands are fetched
use crate::memory::AddressSpace;
use std::collections::TryReserveError;

/// Individual processor status bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusFlags {
    pub n: bool,
    pub v: bool,
    pub b: bool,
    pub d: bool,
    pub i: bool,
    pub z: bool,
    pub c: bool,
}

impl StatusFlags {
    /// set n and z from a result
    pub fn set_nz(&mut self, value: u8) {
        self.n = value & 0x80 != 0;
        self.z = value == 0;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Registers {
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub sp: u8,
    pub pc: u16,
    pub flags: StatusFlags,
}

/// Display names of the micro-steps, indexed by [`EngineState::cycle`].
pub const CYCLE_NAMES: [&str; 6] = ["FETCH", "OPER_LO", "OPER_HI", "PTR_LO", "PTR_HI", "EXECUTE"];

pub struct EngineState {
    pub regs: Registers,
    pub mem: AddressSpace,
    pub cycle: usize,
    pub instr_ptr: u16,
}

impl EngineState {
    pub fn try_new() -> Result<Self, TryReserveError> {
        Ok(EngineState {
            regs: Registers::default(),
            mem: AddressSpace::try_new()?,
            cycle: 0,
            instr_ptr: 0,
        })
    }

    pub fn cycle_name(&self) -> &'static str {
        CYCLE_NAMES.get(self.cycle).copied().unwrap_or("?")
    }
}

/// An opaque stepping primitive. The monitor never looks inside an
/// instruction; it only resets, steps, and inspects or edits the state.
pub trait Engine: Send {
    /// reinitialise registers and load the program counter from the reset
    /// vector mirror
    fn reset(&mut self);

    /// run exactly one micro-step
    fn step(&mut self);

    fn state(&self) -> &EngineState;

    fn state_mut(&mut self) -> &mut EngineState;
}
