use serde::Serialize;

use crate::device::ActualState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DesiredState {
    Streaming,
    Idle,
    Unset,
}

impl DesiredState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Streaming => "STREAMING",
            Self::Idle => "IDLE",
            Self::Unset => "UNSET",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ControllerStatus {
    #[serde(rename = "timeSynced")]
    pub time_synced: bool,
    #[serde(rename = "currentDate")]
    pub current_date: String,
    #[serde(rename = "currentTime")]
    pub current_time: String,
    #[serde(rename = "desiredState")]
    pub desired_state: DesiredState,
    #[serde(rename = "actualState")]
    pub actual_state: ActualState,
    #[serde(rename = "deviceAddress")]
    pub device_address: String,
    #[serde(rename = "utcOffsetSeconds")]
    pub utc_offset_seconds: i64,
    #[serde(rename = "daylightSaving")]
    pub daylight_saving: bool,
    #[serde(rename = "eventCount")]
    pub event_count: usize,
    #[serde(rename = "lastPollAgeMs")]
    pub last_poll_age_ms: Option<u64>,
}
