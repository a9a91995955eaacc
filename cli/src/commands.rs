pub mod list;
pub mod once;
pub mod watch;

use std::collections::HashMap;
use std::time::Duration;

use clap::Parser;
use lookout_common::config::Config;

#[derive(Parser, Debug)]
#[command(name = "lookout")]
#[command(about = "Continuous, pluggable network topology discovery.")]
#[command(version)]
pub struct CommandLine {
    /// Also run intrusive plugins (active scanning)
    #[arg(long)]
    pub intrusive: bool,

    /// Seconds between two probe cycles of a plugin
    #[arg(long, value_name = "SECS", default_value_t = 60, value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: u64,

    /// Per-plugin interval, repeatable
    #[arg(long = "plugin-interval", value_name = "PLUGIN=SECS", value_parser = parse_override)]
    pub plugin_intervals: Vec<(String, u64)>,

    /// Skip a plugin by name, repeatable
    #[arg(short = 'x', long, value_name = "PLUGIN")]
    pub exclude: Vec<String>,

    /// Show the available plugins and exit
    #[arg(short, long, conflicts_with = "once")]
    pub list: bool,

    /// Probe every eligible plugin once, print the facts and exit
    #[arg(long)]
    pub once: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl CommandLine {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn config(&self) -> Config {
        let interval_overrides: HashMap<String, Duration> = self
            .plugin_intervals
            .iter()
            .map(|(plugin, secs)| (plugin.clone(), Duration::from_secs(*secs)))
            .collect();

        Config {
            loop_interval: Duration::from_secs(self.interval),
            allow_intrusive: self.intrusive,
            exclude: self.exclude.clone(),
            interval_overrides,
            ..Config::default()
        }
    }
}

fn parse_override(raw: &str) -> Result<(String, u64), String> {
    let (plugin, secs) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected PLUGIN=SECS, got '{raw}'"))?;
    let secs: u64 = secs
        .trim()
        .parse()
        .map_err(|e| format!("invalid interval '{secs}': {e}"))?;
    if secs == 0 {
        return Err(String::from("interval must be greater than zero"));
    }
    Ok((plugin.trim().to_string(), secs))
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
