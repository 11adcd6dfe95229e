use crate::cpu::{IRQ_VECTOR_ADDR, NMI_VECTOR_ADDR, RESET_VECTOR_ADDR};
use crate::memory::{MemoryMap, ADDRESS_SPACE_LEN};
use crate::text;

/// The three interrupt/reset vectors the monitor lets you edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vector {
    Reset,
    Nmi,
    Irq,
}

impl Vector {
    pub const ALL: [Vector; 3] = [Vector::Reset, Vector::Nmi, Vector::Irq];

    pub fn default_value(self) -> u16 {
        match self {
            Vector::Reset => 0x8000,
            Vector::Nmi => 0x0200,
            Vector::Irq => 0x0300,
        }
    }

    /// where the two little-endian bytes of this vector live
    pub fn mirror_addr(self) -> u16 {
        match self {
            Vector::Reset => RESET_VECTOR_ADDR,
            Vector::Nmi => NMI_VECTOR_ADDR,
            Vector::Irq => IRQ_VECTOR_ADDR,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Vector::Reset => "Reset Vector",
            Vector::Nmi => "NMI Vector",
            Vector::Irq => "IRQ Vector",
        }
    }

    /// value to store for text typed into this vector's field: 0 and
    /// anything beyond the address space fall back to the default
    pub fn value_from_text(self, input: &str) -> u16 {
        match text::parse_hex(input) {
            0 => self.default_value(),
            v if v > (ADDRESS_SPACE_LEN - 1) as u64 => self.default_value(),
            v => v as u16,
        }
    }
}

/// Vector values as last set through the monitor. Each successful `set`
/// writes the mirror bytes too, so the two always agree afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VectorSet {
    reset: u16,
    nmi: u16,
    irq: u16,
}

impl Default for VectorSet {
    fn default() -> Self {
        VectorSet {
            reset: Vector::Reset.default_value(),
            nmi: Vector::Nmi.default_value(),
            irq: Vector::Irq.default_value(),
        }
    }
}

impl VectorSet {
    pub fn get(&self, v: Vector) -> u16 {
        match v {
            Vector::Reset => self.reset,
            Vector::Nmi => self.nmi,
            Vector::Irq => self.irq,
        }
    }

    pub fn set(&mut self, v: Vector, value: u16, mem: &mut impl MemoryMap) {
        match v {
            Vector::Reset => self.reset = value,
            Vector::Nmi => self.nmi = value,
            Vector::Irq => self.irq = value,
        }
        mem.set_word(v.mirror_addr(), value);
    }

    /// apply field text, substituting the default where needed; returns the
    /// value stored
    pub fn set_from_text(&mut self, v: Vector, input: &str, mem: &mut impl MemoryMap) -> u16 {
        let value = v.value_from_text(input);
        self.set(v, value, mem);
        value
    }

    pub fn restore_defaults(&mut self, mem: &mut impl MemoryMap) {
        for v in Vector::ALL {
            self.set(v, v.default_value(), mem);
        }
    }

    /// take a vector's value from its mirror bytes as they are in memory
    pub fn reload(&mut self, v: Vector, mem: &impl MemoryMap) {
        let value = mem.get_word(v.mirror_addr());
        match v {
            Vector::Reset => self.reset = value,
            Vector::Nmi => self.nmi = value,
            Vector::Irq => self.irq = value,
        }
    }
}
