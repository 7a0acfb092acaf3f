// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Command-line options. Every option overrides the matching config key.

use std::path::PathBuf;

use clap::{crate_authors, crate_description, crate_name, crate_version, ArgAction, Parser};
use log::LevelFilter;
use skyspy_client::DisplayUnits;

use crate::config::AppConfig;

/// CLI options
#[derive(Debug, Parser)]
#[command(name = crate_name!(), about = crate_description!())]
#[command(version = crate_version!(), author = crate_authors!())]
pub struct Opts {
    /// Configuration file (defaults to the per-user config location).
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,
    /// Feed base URL, e.g. http://sensor.local:8080/
    #[arg(short = 'u', long)]
    pub url: Option<String>,
    /// Poll interval in milliseconds.
    #[arg(short = 'i', long)]
    pub interval_ms: Option<u64>,
    /// Display units: metric, imperial or nautical.
    #[arg(long)]
    pub units: Option<DisplayUnits>,
    /// Show every entity regardless of altitude.
    #[arg(long)]
    pub no_filter: bool,
    /// Print table rows as JSON lines instead of text.
    #[arg(long)]
    pub json: bool,
    /// Write the effective configuration back to the config file.
    #[arg(long)]
    pub save_config: bool,
    /// Verbose mode (-v debug, -vv trace).
    #[arg(short = 'v', long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Opts {
    /// Log level from the verbosity count.
    pub fn log_level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }

    /// Apply command-line overrides on top of the loaded configuration.
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(url) = &self.url {
            config.feed_url.clone_from(url);
        }
        if let Some(interval) = self.interval_ms {
            config.refresh_interval_ms = interval;
        }
        if let Some(units) = self.units {
            config.display_units = units;
        }
        if self.no_filter {
            config.altitude_filter_enabled = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides() {
        let opts = Opts::parse_from([
            "skyspy-dashboard",
            "--url",
            "http://sensor/",
            "--interval-ms",
            "500",
            "--units",
            "nautical",
            "--no-filter",
            "-vv",
        ]);
        let mut config = AppConfig::default();
        opts.apply(&mut config);

        assert_eq!(config.feed_url, "http://sensor/");
        assert_eq!(config.refresh_interval_ms, 500);
        assert_eq!(config.display_units, DisplayUnits::Nautical);
        assert!(!config.altitude_filter_enabled);
        assert_eq!(opts.log_level(), LevelFilter::Trace);
    }

    #[test]
    fn test_no_flags_keep_config() {
        let opts = Opts::parse_from(["skyspy-dashboard"]);
        let mut config = AppConfig::default();
        opts.apply(&mut config);
        assert_eq!(config, AppConfig::default());
        assert_eq!(opts.log_level(), LevelFilter::Info);
    }

    #[test]
    fn test_bad_units_rejected() {
        assert!(Opts::try_parse_from(["skyspy-dashboard", "--units", "furlongs"]).is_err());
    }
}
