//! Shared control state between the control surface and the execution
//! controller.
//!
//! All flags are atomics and every change of execution state goes through a
//! compare-and-swap transition on [`ControlState`]. The engine itself sits
//! behind a mutex in [`Machine`]; writes into it are gated on the execution
//! state, reads are not.
//!
//! Reads still take the engine mutex, so a screen refresh can wait for at
//! most one micro-step in progress. In exchange a snapshot never shows half a
//! step. The surface never waits on the pacing interval itself, which the
//! controller sleeps through without the lock.
use crate::engine::{Engine, EngineState};
use crate::text;
use log::debug;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

pub const DEFAULT_INTERVAL_US: u64 = 17_000;
/// an interval of 0 ms means this
const ZERO_INTERVAL_MS: u64 = 17;
/// anything over ten minutes snaps to one second
const MAX_INTERVAL_MS: u64 = 10 * 60 * 1000;
const OVERLONG_INTERVAL_MS: u64 = 1000;

/// Fine-grained execution state. `Stepping` is idle and waiting for the next
/// step request; `StepPending` will execute exactly one step and fall back to
/// `Stepping`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExecState {
    Halted = 0,
    Stepping = 1,
    StepPending = 2,
    Running = 3,
}

impl ExecState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => ExecState::Halted,
            1 => ExecState::Stepping,
            2 => ExecState::StepPending,
            _ => ExecState::Running,
        }
    }

    pub fn mode(self) -> Mode {
        match self {
            ExecState::Halted => Mode::Halted,
            ExecState::Stepping | ExecState::StepPending => Mode::Stepping,
            ExecState::Running => Mode::Running,
        }
    }

    /// would the controller execute a step in this state
    pub fn steps(self) -> bool {
        matches!(self, ExecState::StepPending | ExecState::Running)
    }
}

/// Execution mode as shown to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Halted,
    Stepping,
    Running,
}

impl Mode {
    pub fn label(self) -> &'static str {
        match self {
            Mode::Halted => "Paused",
            Mode::Stepping => "Stepping",
            Mode::Running => "Running",
        }
    }
}

/// Effective pacing interval in microseconds for text typed into the
/// milliseconds field.
pub fn interval_from_millis_text(text: &str) -> u64 {
    interval_from_millis(text::parse_decimal(text))
}

/// Effective pacing interval in microseconds for a millisecond value.
pub fn interval_from_millis(ms: u64) -> u64 {
    let ms = match ms {
        0 => ZERO_INTERVAL_MS,
        ms if ms > MAX_INTERVAL_MS => OVERLONG_INTERVAL_MS,
        ms => ms,
    };
    ms * 1000
}

pub struct ControlState {
    state: AtomicU8,
    interval_us: AtomicU64,
    steps: AtomicU64,
}

impl Default for ControlState {
    fn default() -> Self {
        ControlState {
            state: AtomicU8::new(ExecState::Stepping as u8),
            interval_us: AtomicU64::new(DEFAULT_INTERVAL_US),
            steps: AtomicU64::new(0),
        }
    }
}

impl ControlState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exec_state(&self) -> ExecState {
        ExecState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn mode(&self) -> Mode {
        self.exec_state().mode()
    }

    fn store(&self, s: ExecState) {
        self.state.store(s as u8, Ordering::Release);
    }

    /// apply `f` atomically; returns the state that was stored
    fn transition(&self, f: impl Fn(ExecState) -> ExecState) -> ExecState {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            let prev = ExecState::from_u8(current);
            let next = f(prev);
            match self.state.compare_exchange_weak(
                current,
                next as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    debug!("control: {:?} -> {:?}", prev, next);
                    return next;
                }
                Err(actual) => current = actual,
            }
        }
    }

    /// Start/Pause button: anything that would step goes back to idle
    /// stepping, anything idle starts running
    pub fn start_toggle(&self) -> ExecState {
        self.transition(|s| match s {
            ExecState::Running | ExecState::StepPending => ExecState::Stepping,
            ExecState::Halted | ExecState::Stepping => ExecState::Running,
        })
    }

    /// clear the run flag, keeping the stepping mode if it was set
    pub fn pause(&self) -> ExecState {
        self.transition(|s| match s {
            ExecState::Running => ExecState::Halted,
            ExecState::StepPending => ExecState::Stepping,
            other => other,
        })
    }

    /// request exactly one step
    pub fn step(&self) {
        self.store(ExecState::StepPending);
    }

    pub fn halt(&self) {
        self.store(ExecState::Halted);
    }

    pub fn arm_stepping(&self) {
        self.store(ExecState::Stepping);
    }

    /// back to idle stepping with the counter zeroed
    pub fn reset(&self) {
        self.store(ExecState::Stepping);
        self.steps.store(0, Ordering::Release);
    }

    /// Freeze execution so the engine can be edited. Returns whether edits
    /// are now permitted.
    pub fn freeze(&self) -> bool {
        !self.pause().steps()
    }

    /// direct edits of engine state are only allowed while nothing will step
    pub fn edits_permitted(&self) -> bool {
        !self.exec_state().steps()
    }

    /// controller side: should a step run now
    pub fn begin_step(&self) -> bool {
        self.exec_state().steps()
    }

    /// controller side: count the step and drop a pending single step back
    /// to idle
    pub fn finish_step(&self) {
        self.steps.fetch_add(1, Ordering::AcqRel);
        let _ = self.state.compare_exchange(
            ExecState::StepPending as u8,
            ExecState::Stepping as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    pub fn steps_taken(&self) -> u64 {
        self.steps.load(Ordering::Acquire)
    }

    pub fn interval_us(&self) -> u64 {
        self.interval_us.load(Ordering::Acquire)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_micros(self.interval_us())
    }

    pub fn set_interval_us(&self, us: u64) {
        let us = if us == 0 { DEFAULT_INTERVAL_US } else { us };
        self.interval_us.store(us, Ordering::Release);
    }

    /// apply text from the milliseconds field; returns the interval in µs
    pub fn set_interval_text(&self, text: &str) -> u64 {
        let us = interval_from_millis_text(text);
        self.set_interval_us(us);
        us
    }
}

/// The engine plus its control state, shared between threads.
pub struct Machine<E: Engine> {
    engine: Mutex<E>,
    pub control: ControlState,
}

impl<E: Engine> Machine<E> {
    pub fn new(engine: E) -> Self {
        Machine {
            engine: Mutex::new(engine),
            control: ControlState::new(),
        }
    }

    /// a step that panicked mid-way still leaves usable state behind
    pub(crate) fn lock(&self) -> MutexGuard<'_, E> {
        self.engine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// read engine state regardless of execution mode
    pub fn inspect<R>(&self, f: impl FnOnce(&EngineState) -> R) -> R {
        f(self.lock().state())
    }

    /// Write engine state. Returns `None` without touching anything when
    /// execution could step.
    pub fn edit<R>(&self, f: impl FnOnce(&mut EngineState) -> R) -> Option<R> {
        let mut engine = self.lock();
        if !self.control.edits_permitted() {
            return None;
        }
        Some(f(engine.state_mut()))
    }

    /// Reset CPU: idle stepping, counter zeroed, engine reset. All three
    /// happen under the engine lock, so a step already in flight finishes
    /// and is counted before the counter is cleared.
    pub fn reset(&self) {
        let mut engine = self.lock();
        self.control.reset();
        engine.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::Mos6502;
    use crate::memory::MemoryMap;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_interval_text() {
        assert_eq!(interval_from_millis_text("0"), 17_000);
        assert_eq!(interval_from_millis_text(""), 17_000);
        assert_eq!(interval_from_millis_text("600000"), 600_000_000);
        assert_eq!(interval_from_millis_text("600001"), 1_000_000);
        assert_eq!(interval_from_millis_text("250"), 250_000);
        assert_eq!(interval_from_millis_text("1"), 1_000);
    }

    #[test]
    fn test_initial_state() {
        let c = ControlState::new();
        assert_eq!(c.exec_state(), ExecState::Stepping);
        assert_eq!(c.interval_us(), DEFAULT_INTERVAL_US);
        assert_eq!(c.steps_taken(), 0);
        assert!(c.edits_permitted());
    }

    #[test]
    fn test_start_toggle_from_stepping() {
        let c = ControlState::new();
        assert_eq!(c.start_toggle(), ExecState::Running);
        assert_eq!(c.mode(), Mode::Running);
        assert_eq!(c.start_toggle(), ExecState::Stepping);
        assert_eq!(c.mode(), Mode::Stepping);
    }

    #[test]
    fn test_pause_keeps_stepping() {
        let c = ControlState::new();
        c.start_toggle();
        assert_eq!(c.pause(), ExecState::Halted);
        c.step();
        assert_eq!(c.pause(), ExecState::Stepping);
        assert_eq!(c.pause(), ExecState::Stepping);
    }

    #[test]
    fn test_single_step_falls_back_to_idle() {
        let c = ControlState::new();
        c.step();
        assert!(c.begin_step());
        assert!(!c.edits_permitted());
        c.finish_step();
        assert_eq!(c.exec_state(), ExecState::Stepping);
        assert_eq!(c.steps_taken(), 1);
        assert!(!c.begin_step());
    }

    #[test]
    fn test_finish_step_keeps_running() {
        let c = ControlState::new();
        c.start_toggle();
        c.finish_step();
        assert_eq!(c.exec_state(), ExecState::Running);
    }

    #[test]
    fn test_reset_zeroes_counter() {
        let c = ControlState::new();
        c.start_toggle();
        c.finish_step();
        c.finish_step();
        c.reset();
        assert_eq!(c.steps_taken(), 0);
        assert_eq!(c.exec_state(), ExecState::Stepping);
    }

    #[test]
    fn test_edit_gated_on_mode() {
        let m = Machine::new(Mos6502::try_new().unwrap());
        m.control.start_toggle();
        assert!(m.edit(|s| s.mem.write_byte(0x10, 1)).is_none());
        assert_eq!(m.inspect(|s| s.mem.read_byte(0x10)), 0);
        assert!(m.control.freeze());
        assert!(m.edit(|s| s.mem.write_byte(0x10, 1)).is_some());
        assert_eq!(m.inspect(|s| s.mem.read_byte(0x10)), 1);
    }

    #[test]
    fn test_interval_millis_rule() {
        assert_eq!(interval_from_millis(0), 17_000);
        assert_eq!(interval_from_millis(700_000), 1_000_000);
        assert_eq!(interval_from_millis(40), 40_000);
    }

    #[test]
    fn test_toggle_result_is_what_was_stored() {
        let c = Arc::new(ControlState::new());
        let finisher = {
            let c = Arc::clone(&c);
            thread::spawn(move || {
                for _ in 0..20_000 {
                    c.finish_step();
                }
            })
        };
        for _ in 0..5_000 {
            c.step();
            // the other thread may turn StepPending into Stepping at any
            // point, but never touches Stepping or Running
            let stored = c.start_toggle();
            assert_eq!(stored, c.exec_state());
            assert_ne!(stored, ExecState::StepPending);
        }
        finisher.join().unwrap();
        assert_eq!(c.steps_taken(), 20_000);
    }

    struct SlowEngine(Mos6502);

    impl Engine for SlowEngine {
        fn reset(&mut self) {
            self.0.reset();
        }
        fn step(&mut self) {
            thread::sleep(Duration::from_millis(200));
            self.0.step();
        }
        fn state(&self) -> &EngineState {
            self.0.state()
        }
        fn state_mut(&mut self) -> &mut EngineState {
            self.0.state_mut()
        }
    }

    #[test]
    fn test_reset_waits_for_step_in_flight() {
        let m = Arc::new(Machine::new(SlowEngine(Mos6502::try_new().unwrap())));
        m.control.start_toggle();
        let stepper = {
            let m = Arc::clone(&m);
            thread::spawn(move || crate::controller::step_once(&m))
        };
        thread::sleep(Duration::from_millis(50));
        m.reset();
        assert!(stepper.join().unwrap());
        assert_eq!(m.control.steps_taken(), 0);
        assert_eq!(m.control.exec_state(), ExecState::Stepping);
        assert_eq!(m.inspect(|st| st.cycle_name()), "FETCH");
    }

    #[test]
    fn test_zero_interval_never_stored() {
        let c = ControlState::new();
        c.set_interval_us(0);
        assert_eq!(c.interval_us(), DEFAULT_INTERVAL_US);
    }
}
