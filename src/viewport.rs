//! The memory viewport: a rows x cols window onto the address space.
//!
//! Invariant: `base + rows * cols <= ADDRESS_SPACE_LEN` after every change.
use crate::control::Machine;
use crate::engine::Engine;
use crate::memory::{MemoryMap, ADDRESS_SPACE_LEN};
use crate::text;
use log::debug;

pub const MAX_ROWS: usize = 30;
pub const MAX_COLS: usize = 16;
const PAGE: usize = 0x100;

/// How a cell is marked when drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Highlight {
    None,
    ProgramCounter,
    ActiveInstruction,
}

/// The program counter wins when both land on the same cell.
pub fn highlight(addr: u16, pc: u16, instr_ptr: u16) -> Highlight {
    if addr == pc {
        Highlight::ProgramCounter
    } else if addr == instr_ptr {
        Highlight::ActiveInstruction
    } else {
        Highlight::None
    }
}

/// Base address that keeps `instr_addr` in view while execution runs.
///
/// Start at the page holding the instruction and move forward by rows + cols
/// until it falls inside the window. The stride never exceeds the window
/// size, so the instruction can't be stepped over, and the result is pulled
/// back if the window would run off the end of memory.
pub fn follow_base(rows: usize, cols: usize, instr_addr: u16) -> u16 {
    let span = rows * cols;
    let stride = (rows + cols).min(span).max(1);
    let p = instr_addr as usize;
    let mut base = p & !(PAGE - 1);
    while !(base <= p && p < base + span) {
        base += stride;
    }
    base.min(ADDRESS_SPACE_LEN - span) as u16
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    base: usize,
    rows: usize,
    cols: usize,
}

impl Default for Viewport {
    fn default() -> Self {
        Viewport {
            base: 0x8000,
            rows: 16,
            cols: 16,
        }
    }
}

impl Viewport {
    /// out of range geometry is clamped, then the base
    pub fn new(rows: usize, cols: usize, base: u16) -> Self {
        let mut v = Viewport {
            base: base as usize,
            rows: rows.clamp(1, MAX_ROWS),
            cols: cols.clamp(1, MAX_COLS),
        };
        v.clamp_base();
        v
    }

    pub fn base(&self) -> u16 {
        self.base as u16
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn span(&self) -> usize {
        self.rows * self.cols
    }

    fn max_base(&self) -> usize {
        ADDRESS_SPACE_LEN - self.span()
    }

    fn clamp_base(&mut self) {
        self.base = self.base.min(self.max_base());
    }

    /// rows text; values outside 1..=30 are ignored
    pub fn set_rows_text(&mut self, input: &str) {
        match text::parse_decimal(input) as usize {
            r @ 1..=MAX_ROWS => self.rows = r,
            r => debug!("ignoring row count {}", r),
        }
        self.clamp_base();
    }

    /// cols text; values outside 1..=16 are ignored
    pub fn set_cols_text(&mut self, input: &str) {
        match text::parse_decimal(input) as usize {
            c @ 1..=MAX_COLS => self.cols = c,
            c => debug!("ignoring column count {}", c),
        }
        self.clamp_base();
    }

    /// hex base address, pulled back so the window stays in memory
    pub fn set_base_text(&mut self, input: &str) {
        let requested = text::parse_hex(input);
        self.base = requested.min(self.max_base() as u64) as usize;
    }

    /// Page through memory: snap to the current page, move `notches` whole
    /// pages, and clamp to the valid range.
    pub fn scroll(&mut self, notches: i32) {
        let page = (self.base & !(PAGE - 1)) as i64;
        let target = page + notches as i64 * PAGE as i64;
        self.base = target.clamp(0, self.max_base() as i64) as usize;
    }

    /// recompute the base from the active-instruction address
    pub fn follow(&mut self, instr_addr: u16) {
        self.base = follow_base(self.rows, self.cols, instr_addr) as usize;
    }

    pub fn address_of(&self, row: usize, col: usize) -> u16 {
        (self.base + row * self.cols + col) as u16
    }

    /// the visible bytes, one row at a time
    pub fn read_window<'m>(&self, mem: &'m impl MemoryMap) -> &'m [u8] {
        mem.get_ro_slice(self.base(), self.span())
    }

    /// Write hex text into a cell. Values over 0xFF store 0. Returns the
    /// byte written, or `None` if execution could step.
    pub fn write_cell<E: Engine>(
        &self,
        machine: &Machine<E>,
        row: usize,
        col: usize,
        input: &str,
    ) -> Option<u8> {
        let addr = self.address_of(row.min(self.rows - 1), col.min(self.cols - 1));
        let value = match text::parse_hex(input) {
            v if v > 0xff => 0,
            v => v as u8,
        };
        machine.edit(|st| {
            st.mem.write_byte(addr, value);
            value
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::Mos6502;

    fn holds(v: &Viewport) -> bool {
        v.base as usize + v.span() <= ADDRESS_SPACE_LEN
    }

    #[test]
    fn test_follow_keeps_instruction_in_view() {
        for rows in 1..=MAX_ROWS {
            for cols in 1..=MAX_COLS {
                for p in (0..=0xffffu32).step_by(97).chain([0xff, 0xffff, 0xfe00]) {
                    let p = p as u16;
                    let b = follow_base(rows, cols, p) as usize;
                    let span = rows * cols;
                    assert!(b <= p as usize && (p as usize) < b + span, "{rows}x{cols} @ {p:04X}");
                    assert!(b + span <= ADDRESS_SPACE_LEN);
                }
            }
        }
    }

    #[test]
    fn test_follow_page_start() {
        assert_eq!(follow_base(16, 16, 0x8002), 0x8000);
        // 0x80F0 is past the first 4x16 window; advance by 20 at a time
        assert_eq!(follow_base(4, 16, 0x80f0), 0x80b4);
    }

    #[test]
    fn test_base_text_clamped() {
        let mut v = Viewport::default();
        v.set_base_text("FFF0");
        assert_eq!(v.base(), 0xff00);
        v.set_base_text("1234");
        assert_eq!(v.base(), 0x1234);
        assert!(holds(&v));
    }

    #[test]
    fn test_geometry_text() {
        let mut v = Viewport::new(16, 16, 0xff00);
        v.set_rows_text("31");
        assert_eq!(v.rows(), 16);
        v.set_rows_text("0");
        assert_eq!(v.rows(), 16);
        v.set_cols_text("17");
        assert_eq!(v.cols(), 16);
        v.set_cols_text("8");
        assert_eq!(v.cols(), 8);
        v.set_rows_text("30");
        assert_eq!(v.rows(), 30);
        assert_eq!(v.base(), 0xff00);
        v.set_cols_text("16");
        assert!(holds(&v));
        assert_eq!(v.base() as usize, ADDRESS_SPACE_LEN - 480);
    }

    #[test]
    fn test_scroll_bounds() {
        let mut v = Viewport::default();
        v.scroll(1);
        assert_eq!(v.base(), 0x8100);
        v.scroll(-2);
        assert_eq!(v.base(), 0x7f00);
        v.scroll(-1000);
        assert_eq!(v.base(), 0);
        v.scroll(1000);
        assert_eq!(v.base(), 0xff00);
        assert!(holds(&v));
    }

    #[test]
    fn test_repeated_scroll_keeps_advancing() {
        let mut v = Viewport::new(16, 16, 0x1234);
        v.scroll(1);
        assert_eq!(v.base(), 0x1300);
        for _ in 0..0xeb {
            let before = v.base();
            v.scroll(1);
            assert_eq!(v.base(), before + 0x100);
        }
        assert_eq!(v.base(), 0xfe00);
        v.scroll(1);
        assert_eq!(v.base(), 0xff00);
        v.scroll(1);
        assert_eq!(v.base(), 0xff00);
    }

    #[test]
    fn test_new_clamps_everything() {
        let v = Viewport::new(99, 0, 0xffff);
        assert_eq!((v.rows(), v.cols()), (30, 1));
        assert!(holds(&v));
    }

    #[test]
    fn test_cell_round_trip() {
        let m = Machine::new(Mos6502::try_new().unwrap());
        m.control.halt();
        let v = Viewport::default();
        assert_eq!(v.write_cell(&m, 1, 2, "3F"), Some(0x3f));
        assert_eq!(m.inspect(|st| st.mem.read_byte(0x8012)), 0x3f);
        assert_eq!(v.write_cell(&m, 1, 2, "1FF"), Some(0x00));
        assert_eq!(m.inspect(|st| st.mem.read_byte(0x8012)), 0x00);
    }

    #[test]
    fn test_cell_write_refused_while_running() {
        let m = Machine::new(Mos6502::try_new().unwrap());
        m.control.start_toggle();
        let v = Viewport::default();
        assert_eq!(v.write_cell(&m, 0, 0, "12"), None);
        assert_eq!(m.inspect(|st| st.mem.read_byte(0x8000)), 0);
    }

    #[test]
    fn test_highlight_precedence() {
        assert_eq!(highlight(0x10, 0x10, 0x10), Highlight::ProgramCounter);
        assert_eq!(highlight(0x10, 0x11, 0x10), Highlight::ActiveInstruction);
        assert_eq!(highlight(0x12, 0x11, 0x10), Highlight::None);
    }
}
