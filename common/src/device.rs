use serde::Serialize;
use thiserror::Error;

pub const STATUS_PATH: &str = "/cgi-bin/get_rtmp_status";
pub const STATUS_MARKER: &str = "status=";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceCommand {
    StartStream,
    StopStream,
    /// Recall of preset 0, sent once at boot.
    RecallHomePreset,
}

impl DeviceCommand {
    pub fn path(self) -> &'static str {
        match self {
            Self::StartStream => "/cgi-bin/rtmp_ctrl?cmd=start",
            Self::StopStream => "/cgi-bin/rtmp_ctrl?cmd=stop",
            Self::RecallHomePreset => "/cgi-bin/aw_ptz?cmd=%23R00&res=1",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::StartStream => "start",
            Self::StopStream => "stop",
            Self::RecallHomePreset => "preset-recall",
        }
    }
}

/// Whether a control request got any HTTP response at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Delivered,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActualState {
    Streaming,
    Idle,
    Unknown,
}

impl ActualState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Streaming => "STREAMING",
            Self::Idle => "IDLE",
            Self::Unknown => "UNKNOWN",
        }
    }

    pub fn from_status_code(code: i64) -> Self {
        if code == 1 {
            Self::Streaming
        } else {
            Self::Idle
        }
    }

    pub fn from_status_body(body: &str) -> Self {
        parse_status_body(body)
            .map(Self::from_status_code)
            .unwrap_or(Self::Unknown)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StatusParseError {
    #[error("status marker not found")]
    MarkerMissing,
    #[error("status value is not numeric: {0:?}")]
    NotNumeric(String),
}

/// Reads the integer that follows the first `status=` in a response body.
/// Leading whitespace and a sign are accepted; parsing stops at the first non-digit.
pub fn parse_status_body(body: &str) -> Result<i64, StatusParseError> {
    let start = body
        .find(STATUS_MARKER)
        .ok_or(StatusParseError::MarkerMissing)?
        + STATUS_MARKER.len();
    let rest = body[start..].trim_start();

    let sign_len = usize::from(rest.starts_with(['-', '+']));
    let digits_len = rest[sign_len..]
        .bytes()
        .take_while(u8::is_ascii_digit)
        .count();
    if digits_len == 0 {
        return Err(StatusParseError::NotNumeric(
            rest.chars().take(16).collect(),
        ));
    }

    rest[..sign_len + digits_len]
        .parse::<i64>()
        .map_err(|_| StatusParseError::NotNumeric(rest[..sign_len + digits_len].to_string()))
}
