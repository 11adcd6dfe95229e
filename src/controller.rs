//! The execution controller: a dedicated thread that paces the engine.
//!
//! Every iteration waits half the pacing interval, runs at most one engine
//! step, then waits the other half. The waits are on a shutdown channel, so
//! cancelling interrupts them straight away and the owner can join promptly.
use crate::control::Machine;
use crate::engine::Engine;
use log::{debug, info, trace};
use std::io;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Receiving end of the cancellation channel.
pub struct ShutdownToken(Receiver<()>);

impl ShutdownToken {
    /// Wait for `d`. Returns false if shutdown was requested in the meantime.
    pub fn wait(&self, d: Duration) -> bool {
        match self.0.recv_timeout(d) {
            Err(RecvTimeoutError::Timeout) => true,
            Ok(()) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }
}

pub struct ShutdownTrigger(Sender<()>);

impl ShutdownTrigger {
    pub fn trigger(self) {
        // a closed channel means the controller has already gone
        let _ = self.0.send(());
    }
}

pub fn shutdown_channel() -> (ShutdownTrigger, ShutdownToken) {
    let (tx, rx) = mpsc::channel();
    (ShutdownTrigger(tx), ShutdownToken(rx))
}

/// One controller iteration's worth of stepping. The execution state is
/// checked while the engine lock is held so an edit can never interleave
/// with a step that was already decided.
pub fn step_once<E: Engine>(machine: &Machine<E>) -> bool {
    let mut engine = machine.lock();
    if !machine.control.begin_step() {
        return false;
    }
    engine.step();
    machine.control.finish_step();
    let s = engine.state();
    trace!(
        "step {}: pc=0x{:04X} instr=0x{:04X} cycle={}",
        machine.control.steps_taken(),
        s.regs.pc,
        s.instr_ptr,
        s.cycle_name()
    );
    true
}

fn run<E: Engine>(machine: Arc<Machine<E>>, token: ShutdownToken) {
    info!("execution controller started");
    loop {
        let half = machine.control.interval() / 2;
        if !token.wait(half) {
            break;
        }
        step_once(&machine);
        if !token.wait(half) {
            break;
        }
    }
    info!("execution controller stopped");
}

/// Owner's handle on the controller thread.
pub struct ControllerHandle {
    trigger: ShutdownTrigger,
    thread: JoinHandle<()>,
}

impl ControllerHandle {
    pub fn spawn<E: Engine + 'static>(machine: Arc<Machine<E>>) -> Result<Self, io::Error> {
        let (trigger, token) = shutdown_channel();
        let thread = thread::Builder::new()
            .name("cpu".into())
            .spawn(move || run(machine, token))?;
        Ok(ControllerHandle { trigger, thread })
    }

    /// cancel the pacing wait and join; the engine is not touched after this
    /// returns
    pub fn shutdown(self) -> thread::Result<()> {
        debug!("stopping execution controller");
        self.trigger.trigger();
        self.thread.join()
    }
}
