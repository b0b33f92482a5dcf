// src/args.rs
use std::path::PathBuf;

use clap::Parser;

use crate::config::SessionConfig;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Multi-channel serial sensor logger", long_about = None)]
pub struct Args {
    /// JSON session config; flags below override it
    #[clap(short, long)]
    pub config: Option<PathBuf>,
    /// Serial ports to activate, assigned to device slots in order
    #[clap(short, long)]
    pub port: Vec<String>,
    /// Channels (1-based) to enable on every activated port
    #[clap(long, value_delimiter = ',', default_value = "1")]
    pub channels: Vec<usize>,
    /// Play back a captured text log as if it came from a board on slot 1
    #[clap(long, conflicts_with = "port")]
    pub replay: Option<PathBuf>,
    /// Synthesize values for channels without live data
    #[clap(short, long)]
    pub test_mode: bool,
    /// Seconds to run before stopping
    #[clap(short, long, default_value_t = 10.0)]
    pub duration: f64,
    /// Record rows while running
    #[clap(short, long)]
    pub record: bool,
    /// Write the recording here on exit (implies --record)
    #[clap(long)]
    pub csv: Option<PathBuf>,
    /// Render the last display refresh as PNG on exit
    #[clap(long)]
    pub plot: Option<PathBuf>,
    /// Ring buffer capacity override
    #[clap(long)]
    pub ring_capacity: Option<usize>,
    /// Tick period override in milliseconds
    #[clap(long)]
    pub tick_ms: Option<u64>,
    /// List available serial ports and exit
    #[clap(long)]
    pub list_ports: bool,
    /// More log output (-v debug, -vv trace)
    #[clap(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }

    pub fn apply_overrides(&self, config: &mut SessionConfig) {
        if self.test_mode {
            config.test_mode = true;
        }
        if let Some(capacity) = self.ring_capacity {
            config.ring_capacity = capacity;
        }
        if let Some(ms) = self.tick_ms {
            config.tick_period_ms = ms;
        }
    }

    pub fn recording(&self) -> bool {
        self.record || self.csv.is_some()
    }
}
