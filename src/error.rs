use std::collections::TryReserveError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Why a program image could not be loaded. Nothing is applied when any of
/// these is returned.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("binary file size: {actual} bytes, which is not equal to {expected} bytes")]
    WrongSize { actual: u64, expected: usize },
    #[error("binary read failed, read {read} bytes out of {expected} bytes")]
    ShortRead { read: usize, expected: usize },
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings file: {0}")]
    Io(#[from] io::Error),
    #[error("settings format: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures that stop the program before or while it runs.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("could not allocate the engine: {0}")]
    EngineAlloc(#[from] TryReserveError),
    #[error("could not set up the execution thread: {0}")]
    ControllerSpawn(#[source] io::Error),
    #[error("terminal: {0}")]
    Terminal(#[source] io::Error),
}

impl StartupError {
    pub fn exit_code(&self) -> i32 {
        match self {
            StartupError::EngineAlloc(_) => 1,
            StartupError::ControllerSpawn(_) => 2,
            StartupError::Terminal(_) => 3,
        }
    }
}
