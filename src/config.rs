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

//! Application configuration management.
//!
//! Persistent settings in TOML via `confy`. Missing keys fall back to the
//! defaults below, so older files keep loading as fields are added.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use skyspy_client::poll::PollerConfig;
use skyspy_client::tracker::{AltitudeFilter, TrackerConfig};
use skyspy_client::DisplayUnits;

const APP_NAME: &str = "skyspy-dashboard";
const CONFIG_NAME: &str = "config";

/// Default feed base URL
pub const DEFAULT_FEED_URL: &str = "http://localhost:8080/";

/// Application configuration stored in TOML format
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AppConfig {
    /// Configuration schema version for migrations
    #[serde(default = "default_config_version")]
    pub config_version: u32,

    /// Base URL of the SkyAware-style feed server
    #[serde(default = "default_feed_url")]
    pub feed_url: String,

    /// Poll interval in milliseconds
    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,

    /// Aircraft request timeout in milliseconds
    #[serde(default = "default_aircraft_timeout_ms")]
    pub aircraft_timeout_ms: u64,

    /// Activity request timeout in milliseconds
    #[serde(default = "default_activity_timeout_ms")]
    pub activity_timeout_ms: u64,

    /// Unit system for display: metric, imperial or nautical
    #[serde(default)]
    pub display_units: DisplayUnits,

    /// Map center used until a site or drone is known (lat)
    #[serde(default = "default_center_lat")]
    pub default_center_lat: f64,

    /// Map center used until a site or drone is known (lon)
    #[serde(default = "default_center_lon")]
    pub default_center_lon: f64,

    /// Default map zoom level
    #[serde(default = "default_zoom")]
    pub default_zoom: f32,

    /// Hide entities outside the altitude band from the listing
    #[serde(default = "default_true")]
    pub altitude_filter_enabled: bool,

    /// Lower edge of the altitude band in feet
    #[serde(default = "default_min_altitude")]
    pub min_altitude_ft: f64,

    /// Upper edge of the altitude band in feet
    #[serde(default = "default_max_altitude")]
    pub max_altitude_ft: f64,

    /// Draw dashed lines from drones to their pilots
    #[serde(default = "default_true")]
    pub show_pilot_lines: bool,

    /// Show the drone count in the title line
    #[serde(default = "default_true")]
    pub count_in_title: bool,

    /// Poll the sensor activity log
    #[serde(default = "default_true")]
    pub show_activity: bool,

    /// Retained activity lines
    #[serde(default = "default_activity_max_lines")]
    pub activity_max_lines: usize,

    /// Name shown in the title line
    #[serde(default = "default_page_name")]
    pub page_name: String,
}

// Default value functions for serde
fn default_config_version() -> u32 {
    1 // Current schema version
}

fn default_feed_url() -> String {
    DEFAULT_FEED_URL.to_string()
}

fn default_refresh_interval_ms() -> u64 {
    1000
}

fn default_aircraft_timeout_ms() -> u64 {
    5000
}

fn default_activity_timeout_ms() -> u64 {
    3000
}

fn default_center_lat() -> f64 {
    25.78
}

fn default_center_lon() -> f64 {
    -80.155
}

fn default_zoom() -> f32 {
    15.0
}

fn default_true() -> bool {
    true
}

fn default_min_altitude() -> f64 {
    -200.0
}

fn default_max_altitude() -> f64 {
    2000.0
}

fn default_activity_max_lines() -> usize {
    80
}

fn default_page_name() -> String {
    "SKY-SPY-Aware".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config_version: default_config_version(),
            feed_url: default_feed_url(),
            refresh_interval_ms: default_refresh_interval_ms(),
            aircraft_timeout_ms: default_aircraft_timeout_ms(),
            activity_timeout_ms: default_activity_timeout_ms(),
            display_units: DisplayUnits::default(),
            default_center_lat: default_center_lat(),
            default_center_lon: default_center_lon(),
            default_zoom: default_zoom(),
            altitude_filter_enabled: true,
            min_altitude_ft: default_min_altitude(),
            max_altitude_ft: default_max_altitude(),
            show_pilot_lines: true,
            count_in_title: true,
            show_activity: true,
            activity_max_lines: default_activity_max_lines(),
            page_name: default_page_name(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default location, creating it if absent
    pub fn load() -> Result<Self, confy::ConfyError> {
        confy::load(APP_NAME, CONFIG_NAME)
    }

    /// Load configuration from an explicit file
    pub fn load_path(path: &Path) -> Result<Self, confy::ConfyError> {
        confy::load_path(path)
    }

    /// Save configuration to disk, to `path` when given
    pub fn save(&self, path: Option<&Path>) -> Result<(), confy::ConfyError> {
        match path {
            Some(path) => confy::store_path(path, self),
            None => confy::store(APP_NAME, CONFIG_NAME, self),
        }
    }

    /// Get the config file path for display to user
    pub fn get_config_path() -> Result<std::path::PathBuf, confy::ConfyError> {
        confy::get_configuration_file_path(APP_NAME, CONFIG_NAME)
    }

    /// Altitude band for the listing, inactive when disabled
    pub fn altitude_filter(&self) -> AltitudeFilter {
        if self.altitude_filter_enabled {
            AltitudeFilter::new(self.min_altitude_ft, self.max_altitude_ft)
        } else {
            AltitudeFilter::default()
        }
    }

    /// Default map center as (longitude, latitude)
    pub fn default_center(&self) -> (f64, f64) {
        (self.default_center_lon, self.default_center_lat)
    }

    pub fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig {
            filter: self.altitude_filter(),
            pilot_lines: self.show_pilot_lines,
            ..Default::default()
        }
    }

    pub fn poller_config(&self) -> PollerConfig {
        PollerConfig {
            interval: Duration::from_millis(self.refresh_interval_ms.max(100)),
            aircraft_timeout: Duration::from_millis(self.aircraft_timeout_ms),
            activity_timeout: Duration::from_millis(self.activity_timeout_ms),
            poll_activity: self.show_activity,
            activity_max_lines: self.activity_max_lines,
            ..Default::default()
        }
    }
}
