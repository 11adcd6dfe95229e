use crate::settings::MonitorSettings;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "m6502-monitor",
    about = "Interactive 6502 monitor: run, pause, step and edit a live CPU",
    version
)]
pub struct Cli {
    /// 64K binary image used by Load Test
    #[arg(short = 'i', long)]
    pub image: Option<PathBuf>,

    /// Pacing interval per step in milliseconds
    #[arg(short = 'I', long)]
    pub interval: Option<String>,

    /// Memory view rows (1-30)
    #[arg(short = 'r', long)]
    pub rows: Option<String>,

    /// Memory view columns (1-16)
    #[arg(short = 'c', long)]
    pub cols: Option<String>,

    /// Screen refresh rate in Hz
    #[arg(long, default_value_t = 60.0)]
    pub refresh_rate: f64,

    /// Write log output to this file instead of stderr
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Settings file (default: $XDG_CONFIG_HOME/m6502-monitor/settings.json)
    #[arg(long)]
    pub settings: Option<PathBuf>,

    /// Don't write settings back on exit
    #[arg(long)]
    pub no_save: bool,
}

impl Cli {
    pub fn settings_path(&self) -> PathBuf {
        self.settings
            .clone()
            .unwrap_or_else(MonitorSettings::default_path)
    }

    /// Overlay command line values on loaded settings. Numbers go through
    /// the same lenient parsing as the on-screen fields.
    pub fn apply(&self, settings: &mut MonitorSettings) {
        if let Some(image) = &self.image {
            settings.test_image = image.clone();
        }
        if let Some(interval) = &self.interval {
            settings.interval_ms = crate::control::interval_from_millis_text(interval) / 1000;
        }
        if let Some(rows) = &self.rows {
            settings.rows = crate::text::parse_decimal(rows) as usize;
        }
        if let Some(cols) = &self.cols {
            settings.cols = crate::text::parse_decimal(cols) as usize;
        }
    }
}
