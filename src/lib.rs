//! # m6502-monitor
//!
//! Interactive monitor for a byte-addressable CPU with a 64K address space.
//! Run it, pause it, single-step it, and poke at memory and the reset/NMI/IRQ
//! vectors while it goes.
//!
//! ## Design
//!
//! * the engine is an opaque stepping primitive; the monitor never decodes
//!   instructions itself
//! * one thread paces execution, the main thread owns the screen
//! * execution state is a single atomic, changed only by compare-and-swap
//! * engine writes are refused unless nothing can step; reads always work
//!
//! Model
//!
//! main
//!  |-- settings + command line
//!  |-- Machine(engine, control state)      shared, Arc
//!  |-- controller thread
//!  |    `-- loop { wait half; step if Running/StepPending; wait half }
//!  `-- UI loop (LoopHelper paced)
//!       |-- input events -> ControlSurface
//!       |-- ControlSurface -> Screen snapshot (one engine lock)
//!       `-- Display.draw(Screen)
pub mod cli;
pub mod control;
pub mod controller;
pub mod cpu;
pub mod display;
pub mod engine;
pub mod error;
pub mod input;
pub mod memory;
pub mod program;
pub mod settings;
pub mod surface;
pub mod text;
pub mod vectors;
pub mod viewport;
