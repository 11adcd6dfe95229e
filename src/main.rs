use clap::Parser;
use env_logger::{Env, Target};
use log::{error, info, warn};
use std::fs::File;
use std::process;
use std::sync::Arc;

use m6502_monitor::cli::Cli;
use m6502_monitor::control::Machine;
use m6502_monitor::controller::ControllerHandle;
use m6502_monitor::cpu::Mos6502;
use m6502_monitor::display::TermDisplay;
use m6502_monitor::error::StartupError;
use m6502_monitor::input::StdinInput;
use m6502_monitor::settings::MonitorSettings;
use m6502_monitor::surface::ControlSurface;

fn init_logging(cli: &Cli) {
    // stderr is under the full-screen display, so only log there on request
    let default_filter = if cli.log_file.is_some() { "info" } else { "off" };
    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or(default_filter));
    if let Some(path) = &cli.log_file {
        match File::create(path) {
            Ok(f) => {
                builder.target(Target::Pipe(Box::new(f)));
            }
            Err(e) => eprintln!("cannot open log file {}: {}", path.display(), e),
        }
    }
    builder.init();
}

fn run(cli: &Cli) -> Result<(), StartupError> {
    let settings_path = cli.settings_path();
    let mut settings = MonitorSettings::load(&settings_path);
    cli.apply(&mut settings);

    let machine = Arc::new(Machine::new(Mos6502::try_new()?));
    let mut surface = ControlSurface::new(Arc::clone(&machine), &settings);
    let controller =
        ControllerHandle::spawn(Arc::clone(&machine)).map_err(StartupError::ControllerSpawn)?;

    let outcome = TermDisplay::new(settings_path.display().to_string()).and_then(|mut display| {
        let mut input = StdinInput::new();
        surface.run(&mut display, &mut input, cli.refresh_rate)
    });

    if controller.shutdown().is_err() {
        error!("execution controller panicked");
    }
    outcome.map_err(StartupError::Terminal)?;

    if !cli.no_save {
        surface.store_settings(&mut settings);
        if let Err(e) = settings.save(&settings_path) {
            warn!("could not save settings to {}: {}", settings_path.display(), e);
        }
    }
    info!("bye");
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli);
    if let Err(e) = run(&cli) {
        error!("{}", e);
        eprintln!("m6502-monitor: {}", e);
        process::exit(e.exit_code());
    }
}
