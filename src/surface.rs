//! The control surface: everything the operator can see and change.
//!
//! It runs on the main thread once per screen refresh, owns the transient
//! editor state, and talks to the execution controller only through the
//! shared [`Machine`].
use crate::control::{interval_from_millis, Machine, Mode};
use crate::display::Display;
use crate::engine::{Engine, Registers};
use crate::input::{Input, InputEvent, Key};
use crate::program::ProgramManager;
use crate::settings::MonitorSettings;
use crate::vectors::Vector;
use crate::viewport::{highlight, Highlight, Viewport};
use log::{debug, info, warn};
use spin_sleep::LoopHelper;
use std::io;
use std::sync::Arc;

/// longest text an edit field accepts
const MAX_FIELD_LEN: usize = 10;

/// Editable fields, in focus order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Interval,
    Vector(Vector),
    Rows,
    Cols,
    Base,
    Memory,
}

const FOCUS_ORDER: [Field; 8] = [
    Field::Interval,
    Field::Vector(Vector::Reset),
    Field::Vector(Vector::Nmi),
    Field::Vector(Vector::Irq),
    Field::Rows,
    Field::Cols,
    Field::Base,
    Field::Memory,
];

pub struct CpuView {
    pub regs: Registers,
    pub cycle_name: &'static str,
    pub instr_ptr: u16,
}

pub struct MemoryCell {
    pub addr: u16,
    pub value: u8,
    pub highlight: Highlight,
}

pub struct MemoryView {
    pub base: u16,
    pub rows: usize,
    pub cols: usize,
    /// row-major, rows * cols long
    pub cells: Vec<MemoryCell>,
    /// base is tracking execution rather than the operator
    pub following: bool,
}

/// Everything needed to draw one frame, taken from a single engine lock.
pub struct Screen {
    pub mode: Mode,
    pub interval_ms: u64,
    pub steps: u64,
    pub cpu: CpuView,
    pub vectors: [(Vector, u16); 3],
    pub memory: Option<MemoryView>,
    pub focus: Field,
    pub cursor: (usize, usize),
    pub edit: Option<String>,
    pub show_settings: bool,
    pub show_help: bool,
    pub fps: Option<f64>,
    pub test_image: String,
    pub message: Option<String>,
}

pub struct ControlSurface<E: Engine> {
    machine: Arc<Machine<E>>,
    programs: ProgramManager,
    viewport: Viewport,
    focus: Field,
    cursor: (usize, usize),
    edit: Option<String>,
    show_memory: bool,
    show_settings: bool,
    show_help: bool,
    message: Option<String>,
    fps: Option<f64>,
    quit: bool,
}

impl<E: Engine> ControlSurface<E> {
    /// Set up from saved settings and install the default vectors and demo
    /// program.
    pub fn new(machine: Arc<Machine<E>>, settings: &MonitorSettings) -> Self {
        machine
            .control
            .set_interval_us(interval_from_millis(settings.interval_ms));
        let mut programs = ProgramManager::new(settings.test_image.clone());
        programs.load_default(&machine);
        ControlSurface {
            machine,
            programs,
            viewport: Viewport::new(settings.rows, settings.cols, settings.base),
            focus: Field::Memory,
            cursor: (0, 0),
            edit: None,
            show_memory: settings.show_memory,
            show_settings: settings.show_settings,
            show_help: settings.show_help,
            message: None,
            fps: None,
            quit: false,
        }
    }

    pub fn machine(&self) -> &Arc<Machine<E>> {
        &self.machine
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn programs(&self) -> &ProgramManager {
        &self.programs
    }

    pub fn quit_requested(&self) -> bool {
        self.quit
    }

    pub fn set_fps(&mut self, fps: f64) {
        self.fps = Some(fps);
    }

    /// copy what should survive a restart into `settings`
    pub fn store_settings(&self, settings: &mut MonitorSettings) {
        settings.interval_ms = self.machine.control.interval_us() / 1000;
        settings.rows = self.viewport.rows();
        settings.cols = self.viewport.cols();
        settings.base = self.viewport.base();
        settings.show_memory = self.show_memory;
        settings.show_settings = self.show_settings;
        settings.show_help = self.show_help;
        settings.test_image = self.programs.test_image().to_path_buf();
    }

    pub fn handle(&mut self, event: InputEvent) {
        match event {
            InputEvent::Interrupt => self.quit = true,
            InputEvent::Scroll(notches) => self.scroll(notches),
            InputEvent::Key(key) if self.edit.is_some() => self.edit_key(key),
            InputEvent::Key(key) => self.command_key(key),
        }
    }

    fn command_key(&mut self, key: Key) {
        match key {
            Key::Char('s') | Key::Char(' ') => self.start_toggle(),
            Key::Char('p') => self.pause(),
            Key::Char('n') => self.step(),
            Key::Char('r') => self.reset_cpu(),
            Key::Char('c') => self.clear_memory(),
            Key::Char('d') => self.load_default(),
            Key::Char('t') => self.load_test(),
            Key::Char('m') => self.show_memory = !self.show_memory,
            Key::Char('g') => self.show_settings = !self.show_settings,
            Key::Char('h') | Key::Char('?') => self.show_help = !self.show_help,
            Key::Char('q') | Key::Esc => self.quit = true,
            Key::Tab => self.move_focus(1),
            Key::BackTab => self.move_focus(FOCUS_ORDER.len() - 1),
            Key::Enter => self.begin_edit(),
            Key::Up => self.move_cursor(-1, 0),
            Key::Down => self.move_cursor(1, 0),
            Key::Left => self.move_cursor(0, -1),
            Key::Right => self.move_cursor(0, 1),
            Key::PageUp => self.scroll(-1),
            Key::PageDown => self.scroll(1),
            _ => {}
        }
    }

    fn edit_key(&mut self, key: Key) {
        let Some(buf) = self.edit.as_mut() else {
            return;
        };
        match key {
            Key::Char(c) if buf.len() < MAX_FIELD_LEN => buf.push(c),
            Key::Backspace => {
                buf.pop();
            }
            Key::Esc => self.edit = None,
            Key::Enter => self.commit_edit(),
            _ => {}
        }
    }

    pub fn start_toggle(&mut self) {
        let s = self.machine.control.start_toggle();
        info!("start/pause: now {}", s.mode().label());
    }

    pub fn pause(&mut self) {
        self.machine.control.pause();
    }

    pub fn step(&mut self) {
        self.machine.control.step();
    }

    pub fn reset_cpu(&mut self) {
        self.programs.reset_cpu(&self.machine);
        self.message = None;
    }

    pub fn clear_memory(&mut self) {
        self.programs.clear_memory(&self.machine);
    }

    pub fn load_default(&mut self) {
        self.programs.load_default(&self.machine);
        self.message = None;
    }

    pub fn load_test(&mut self) {
        self.message = Some(match self.programs.load_test(&self.machine) {
            Ok(()) => format!(
                "{} loaded, reset vector set to 0x{:04X}",
                self.programs.test_image().display(),
                self.programs.vectors().get(Vector::Reset)
            ),
            Err(e) => e.to_string(),
        });
    }

    fn move_focus(&mut self, by: usize) {
        let i = FOCUS_ORDER
            .iter()
            .position(|f| *f == self.focus)
            .unwrap_or(0);
        self.focus = FOCUS_ORDER[(i + by) % FOCUS_ORDER.len()];
    }

    fn clamp_cursor(&mut self) {
        self.cursor.0 = self.cursor.0.min(self.viewport.rows() - 1);
        self.cursor.1 = self.cursor.1.min(self.viewport.cols() - 1);
    }

    fn move_cursor(&mut self, drow: isize, dcol: isize) {
        if self.focus != Field::Memory {
            return;
        }
        self.cursor.0 = self.cursor.0.saturating_add_signed(drow);
        self.cursor.1 = self.cursor.1.saturating_add_signed(dcol);
        self.clamp_cursor();
    }

    /// manual paging; the base belongs to execution while running
    fn scroll(&mut self, notches: i32) {
        if self.machine.control.mode() == Mode::Running {
            return;
        }
        self.viewport.scroll(notches);
    }

    fn begin_edit(&mut self) {
        match self.focus {
            Field::Memory if !self.show_memory => return,
            Field::Memory | Field::Vector(_) => {
                // engine state only changes while nothing can step
                self.machine.control.freeze();
            }
            Field::Base if self.machine.control.mode() == Mode::Running => {
                self.message = Some("base address follows execution while running".into());
                return;
            }
            _ => {}
        }
        self.edit = Some(String::new());
    }

    fn commit_edit(&mut self) {
        let Some(text) = self.edit.take() else {
            return;
        };
        match self.focus {
            Field::Interval => {
                let us = self.machine.control.set_interval_text(&text);
                info!("pacing interval now {} us", us);
            }
            Field::Vector(v) => match self.programs.edit_vector(&self.machine, v, &text) {
                Some(value) => info!("{} = 0x{:04X}", v.label(), value),
                None => {
                    warn!("{} edit refused while executing", v.label());
                    self.message = Some(format!("{} not changed: pause first", v.label()));
                }
            },
            Field::Rows => {
                self.viewport.set_rows_text(&text);
                self.clamp_cursor();
            }
            Field::Cols => {
                self.viewport.set_cols_text(&text);
                self.clamp_cursor();
            }
            Field::Base => {
                if self.machine.control.mode() != Mode::Running {
                    self.viewport.set_base_text(&text);
                }
            }
            Field::Memory => {
                let (row, col) = self.cursor;
                if self
                    .viewport
                    .write_cell(&self.machine, row, col, &text)
                    .is_none()
                {
                    warn!("memory edit refused while executing");
                    self.message = Some("memory not changed: pause first".into());
                }
            }
        }
    }

    /// Drive the screen at `refresh_rate` frames per second until the
    /// operator quits.
    pub fn run(
        &mut self,
        display: &mut impl Display,
        input: &mut impl Input,
        refresh_rate: f64,
    ) -> Result<(), io::Error> {
        let mut loop_helper = LoopHelper::builder()
            .report_interval_s(0.5)
            .build_with_target_rate(refresh_rate);
        while !self.quit {
            loop_helper.loop_start();
            for event in input.poll_events()? {
                self.handle(event);
            }
            if self.quit {
                break;
            }
            if let Some(fps) = loop_helper.report_rate() {
                debug!("refresh rate {:.1} fps", fps);
                self.set_fps(fps);
            }
            display.draw(&self.refresh())?;
            loop_helper.loop_sleep();
        }
        Ok(())
    }

    /// Build the next frame. While running the viewport base is recomputed
    /// from the active-instruction address; highlights always come from the
    /// state read here.
    pub fn refresh(&mut self) -> Screen {
        let control = &self.machine.control;
        let mode = control.mode();
        let following = mode == Mode::Running;
        let show_memory = self.show_memory;
        let viewport = &mut self.viewport;

        let (cpu, memory) = self.machine.inspect(|st| {
            if following {
                viewport.follow(st.instr_ptr);
            }
            let cpu = CpuView {
                regs: st.regs,
                cycle_name: st.cycle_name(),
                instr_ptr: st.instr_ptr,
            };
            let memory = show_memory.then(|| {
                let base = viewport.base();
                let cells = viewport
                    .read_window(&st.mem)
                    .iter()
                    .enumerate()
                    .map(|(i, &value)| {
                        let addr = base.wrapping_add(i as u16);
                        MemoryCell {
                            addr,
                            value,
                            highlight: highlight(addr, st.regs.pc, st.instr_ptr),
                        }
                    })
                    .collect();
                MemoryView {
                    base,
                    rows: viewport.rows(),
                    cols: viewport.cols(),
                    cells,
                    following,
                }
            });
            (cpu, memory)
        });

        let vectors = Vector::ALL.map(|v| (v, self.programs.vectors().get(v)));
        Screen {
            mode,
            interval_ms: control.interval_us() / 1000,
            steps: control.steps_taken(),
            cpu,
            vectors,
            memory,
            focus: self.focus,
            cursor: self.cursor,
            edit: self.edit.clone(),
            show_settings: self.show_settings,
            show_help: self.show_help,
            fps: self.fps,
            test_image: self.programs.test_image().display().to_string(),
            message: self.message.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::ExecState;
    use crate::controller::step_once;
    use crate::cpu::Mos6502;
    use crate::input::DummyInput;
    use crate::memory::MemoryMap;

    fn surface() -> ControlSurface<Mos6502> {
        let machine = Arc::new(Machine::new(Mos6502::try_new().unwrap()));
        ControlSurface::new(machine, &MonitorSettings::default())
    }

    fn key(k: Key) -> InputEvent {
        InputEvent::Key(k)
    }

    fn feed(s: &mut ControlSurface<Mos6502>, events: &[InputEvent]) {
        let mut input = DummyInput::new(events);
        for e in input.poll_events().unwrap() {
            s.handle(e);
        }
    }

    fn type_field(s: &mut ControlSurface<Mos6502>, text: &str) {
        feed(s, &[key(Key::Enter)]);
        feed(s, &DummyInput::typed(text));
        feed(s, &[key(Key::Enter)]);
    }

    #[test]
    fn test_fresh_start() {
        let mut s = surface();
        let screen = s.refresh();
        assert_eq!(screen.mode, Mode::Stepping);
        assert_eq!(screen.interval_ms, 17);
        assert_eq!(
            screen.vectors,
            [(Vector::Reset, 0x8000), (Vector::Nmi, 0x0200), (Vector::Irq, 0x0300)]
        );
        let mem = screen.memory.unwrap();
        assert_eq!(mem.base, 0x8000);
        assert_eq!(mem.cells.len(), 256);
        assert_eq!(mem.cells[0].value, crate::cpu::LDA_IMM);
    }

    #[test]
    fn test_start_toggle_keys() {
        let mut s = surface();
        feed(&mut s, &[key(Key::Char('s'))]);
        assert_eq!(s.machine().control.mode(), Mode::Running);
        feed(&mut s, &[key(Key::Char('s'))]);
        assert_eq!(s.machine().control.mode(), Mode::Stepping);
        feed(&mut s, &[key(Key::Char('n'))]);
        assert_eq!(s.machine().control.exec_state(), ExecState::StepPending);
    }

    #[test]
    fn test_cell_edit_freezes_running() {
        let mut s = surface();
        feed(&mut s, &[key(Key::Char('s')), key(Key::Down), key(Key::Right)]);
        type_field(&mut s, "3F");
        assert_eq!(s.machine().control.exec_state(), ExecState::Halted);
        let base = s.viewport().base();
        assert_eq!(
            s.machine().inspect(|st| st.mem.read_byte(base + 17)),
            0x3f
        );
        type_field(&mut s, "1FF");
        assert_eq!(s.machine().inspect(|st| st.mem.read_byte(base + 17)), 0);
    }

    #[test]
    fn test_start_key_is_text_while_editing() {
        let mut s = surface();
        feed(&mut s, &[key(Key::Enter), key(Key::Char('s'))]);
        assert_eq!(s.machine().control.mode(), Mode::Stepping);
        feed(&mut s, &[key(Key::Esc)]);
        assert_eq!(s.machine().inspect(|st| st.mem.read_byte(0x8000)), crate::cpu::LDA_IMM);
        assert!(!s.quit_requested());
    }

    #[test]
    fn test_vector_and_interval_fields() {
        let mut s = surface();
        // Memory -> Interval -> Reset
        feed(&mut s, &[key(Key::Tab)]);
        type_field(&mut s, "0");
        assert_eq!(s.machine().control.interval_us(), 17_000);
        type_field(&mut s, "250");
        assert_eq!(s.machine().control.interval_us(), 250_000);
        feed(&mut s, &[key(Key::Tab)]);
        type_field(&mut s, "C000");
        assert_eq!(s.programs().vectors().get(Vector::Reset), 0xc000);
        assert_eq!(s.machine().inspect(|st| st.mem.get_word(0xfffc)), 0xc000);
        type_field(&mut s, "12345");
        assert_eq!(s.programs().vectors().get(Vector::Reset), 0x8000);
    }

    #[test]
    fn test_running_view_follows_instruction() {
        let mut s = surface();
        s.reset_cpu();
        // shrink the window so the jump to 0xA000 has to move it
        feed(&mut s, &[key(Key::BackTab), key(Key::BackTab), key(Key::BackTab)]);
        type_field(&mut s, "2");
        assert_eq!(s.viewport().rows(), 2);
        feed(&mut s, &[key(Key::Char('s'))]);
        for _ in 0..40 {
            step_once(s.machine());
            let screen = s.refresh();
            let mem = screen.memory.unwrap();
            let p = screen.cpu.instr_ptr as usize;
            let base = mem.base as usize;
            assert!(base <= p && p < base + mem.rows * mem.cols);
            assert!(mem.following);
            let marked: Vec<_> = mem
                .cells
                .iter()
                .filter(|c| c.highlight == Highlight::ActiveInstruction)
                .map(|c| c.addr)
                .collect();
            if screen.cpu.regs.pc != screen.cpu.instr_ptr {
                assert_eq!(marked, vec![screen.cpu.instr_ptr]);
            }
        }
    }

    #[test]
    fn test_base_locked_while_running() {
        let mut s = surface();
        feed(&mut s, &[key(Key::Char('s')), key(Key::BackTab)]);
        feed(&mut s, &[key(Key::Enter)]);
        assert!(s.edit.is_none());
        feed(&mut s, &[InputEvent::Scroll(3)]);
        assert_eq!(s.viewport().base(), 0x8000);
        feed(&mut s, &[key(Key::Char('p')), InputEvent::Scroll(1)]);
        assert_eq!(s.viewport().base(), 0x8100);
        type_field(&mut s, "FFFF");
        assert_eq!(s.viewport().base(), 0xff00);
    }

    #[test]
    fn test_load_test_failure_reported() {
        let machine = Arc::new(Machine::new(Mos6502::try_new().unwrap()));
        let settings = MonitorSettings {
            test_image: "/nonexistent/test.bin".into(),
            ..MonitorSettings::default()
        };
        let mut s = ControlSurface::new(machine, &settings);
        feed(&mut s, &[key(Key::Char('t'))]);
        let screen = s.refresh();
        assert!(screen.message.unwrap().contains("/nonexistent/test.bin"));
        assert_eq!(screen.vectors[0], (Vector::Reset, 0x8000));
    }

    #[test]
    fn test_clear_and_toggles() {
        let mut s = surface();
        feed(&mut s, &[key(Key::Char('c'))]);
        assert_eq!(s.machine().control.mode(), Mode::Halted);
        assert!(s.refresh().memory.unwrap().cells.iter().all(|c| c.value == 0));
        feed(&mut s, &[key(Key::Char('m')), key(Key::Char('g')), key(Key::Char('h'))]);
        let screen = s.refresh();
        assert!(screen.memory.is_none());
        assert!(screen.show_settings);
        assert!(!screen.show_help);
        feed(&mut s, &[key(Key::Char('q'))]);
        assert!(s.quit_requested());
    }

    #[test]
    fn test_run_until_quit() -> Result<(), io::Error> {
        let mut s = surface();
        let mut display = crate::display::DummyDisplay::new();
        let mut input = DummyInput::new(&[key(Key::Char('s')), key(Key::Char('q'))]);
        s.run(&mut display, &mut input, 200.0)?;
        assert!(s.quit_requested());
        assert_eq!(display.frames, 0);
        assert_eq!(s.machine().control.mode(), Mode::Running);
        Ok(())
    }

    #[test]
    fn test_saved_interval_follows_millis_rule() {
        for (saved, expected) in [(700_000, 1_000_000), (0, 17_000), (250, 250_000)] {
            let machine = Arc::new(Machine::new(Mos6502::try_new().unwrap()));
            let settings = MonitorSettings {
                interval_ms: saved,
                ..MonitorSettings::default()
            };
            ControlSurface::new(Arc::clone(&machine), &settings);
            assert_eq!(machine.control.interval_us(), expected, "saved {saved} ms");
        }
    }

    #[test]
    fn test_store_settings() {
        let mut s = surface();
        feed(&mut s, &[key(Key::Char('m'))]);
        let mut out = MonitorSettings::default();
        s.store_settings(&mut out);
        assert!(!out.show_memory);
        assert_eq!(out.interval_ms, 17);
        assert_eq!(out.base, 0x8000);
    }
}
