pub mod clock;
pub mod config;
pub mod device;
pub mod engine;
pub mod schedule;
pub mod types;

pub use clock::{adjusted_epoch, CalendarDate, ClockSettings, LocalStamp, TimeOfDay};
pub use config::{ControllerConfig, PersistedState, SchedulerConfig};
pub use device::{
    parse_status_body, ActualState, DeviceCommand, DispatchOutcome, StatusParseError,
    STATUS_MARKER, STATUS_PATH,
};
pub use engine::{EngineAction, StreamEngine, Trigger};
pub use schedule::{Event, Schedule};
pub use types::{ControllerStatus, DesiredState};
