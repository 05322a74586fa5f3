use serde::{Deserialize, Serialize};

use crate::{
    clock::ClockSettings,
    schedule::{Event, Schedule},
};

pub const DEFAULT_DEVICE_ADDRESS: &str = "10.0.3.61";
pub const DEFAULT_UTC_OFFSET_SECONDS: i64 = -8 * 3600;
pub const MAX_UTC_OFFSET_HOURS: i64 = 12;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub tick_interval_ms: u64,
    pub poll_interval_ms: u64,
    pub request_timeout_ms: u64,
    pub connectivity_url: String,
    pub connectivity_timeout_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1_000,
            poll_interval_ms: 4_000,
            request_timeout_ms: 5_000,
            connectivity_url: "http://clients3.google.com/generate_204".to_string(),
            connectivity_timeout_ms: 3_000,
        }
    }
}

impl SchedulerConfig {
    pub fn sanitize(&mut self) {
        self.tick_interval_ms = self.tick_interval_ms.clamp(100, 60_000);
        self.poll_interval_ms = self.poll_interval_ms.max(self.tick_interval_ms);
        self.request_timeout_ms = self.request_timeout_ms.clamp(100, 60_000);
        self.connectivity_timeout_ms = self.connectivity_timeout_ms.clamp(100, 60_000);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerConfig {
    #[serde(rename = "ptzCameraIP")]
    pub device_address: String,
    #[serde(rename = "utcOffsetInSeconds")]
    pub utc_offset_seconds: i64,
    #[serde(rename = "daylightSavingTime")]
    pub daylight_saving: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            device_address: DEFAULT_DEVICE_ADDRESS.to_string(),
            utc_offset_seconds: DEFAULT_UTC_OFFSET_SECONDS,
            daylight_saving: false,
        }
    }
}

impl ControllerConfig {
    pub fn sanitize(&mut self) {
        let limit = MAX_UTC_OFFSET_HOURS * 3600;
        self.utc_offset_seconds = self.utc_offset_seconds.clamp(-limit, limit);
        self.device_address = self.device_address.trim().to_string();
    }

    pub fn clock(&self) -> ClockSettings {
        ClockSettings {
            utc_offset_seconds: self.utc_offset_seconds,
            daylight_saving: self.daylight_saving,
        }
    }

    pub fn utc_offset_hours(&self) -> i64 {
        self.utc_offset_seconds / 3600
    }
}

/// The whole settings document. Every store mutation rewrites it in full.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    #[serde(flatten)]
    pub config: ControllerConfig,
    pub events: Schedule,
}

impl PersistedState {
    pub fn sanitize(&mut self) {
        self.config.sanitize();
    }

    pub fn from_json(raw: &[u8]) -> serde_json::Result<Self> {
        let document: PersistedDocument = serde_json::from_slice(raw)?;
        let mut state = Self::from(document);
        state.sanitize();
        Ok(state)
    }
}

// Lenient on read: any key may be missing and falls back to its default.
#[derive(Deserialize)]
struct PersistedDocument {
    #[serde(rename = "ptzCameraIP")]
    device_address: Option<String>,
    #[serde(rename = "utcOffsetInSeconds")]
    utc_offset_seconds: Option<i64>,
    #[serde(rename = "daylightSavingTime")]
    daylight_saving: Option<bool>,
    #[serde(default)]
    events: Vec<Event>,
}

impl From<PersistedDocument> for PersistedState {
    fn from(document: PersistedDocument) -> Self {
        let defaults = ControllerConfig::default();
        Self {
            config: ControllerConfig {
                device_address: document.device_address.unwrap_or(defaults.device_address),
                utc_offset_seconds: document
                    .utc_offset_seconds
                    .unwrap_or(defaults.utc_offset_seconds),
                daylight_saving: document.daylight_saving.unwrap_or(defaults.daylight_saving),
            },
            events: Schedule::new(document.events),
        }
    }
}
