use serde::{Deserialize, Serialize};

use crate::clock::LocalStamp;

/// One streaming window as entered by the operator. Fields are kept verbatim;
/// text that is not a zero-padded date or `HH:MM` simply never matches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    #[serde(default)]
    pub date: String,
    #[serde(rename = "startTime", default)]
    pub start_time: String,
    #[serde(rename = "stopTime", default)]
    pub stop_time: String,
}

impl Event {
    pub fn new(
        date: impl Into<String>,
        start_time: impl Into<String>,
        stop_time: impl Into<String>,
    ) -> Self {
        Self {
            date: date.into(),
            start_time: start_time.into(),
            stop_time: stop_time.into(),
        }
    }

    pub fn starts_at(&self, now: &LocalStamp) -> bool {
        now.date.matches(&self.date) && now.time.matches(&self.start_time)
    }

    /// Stop matching only looks at the time of day; the event date is not consulted.
    pub fn stops_at(&self, now: &LocalStamp) -> bool {
        now.time.matches(&self.stop_time)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schedule {
    events: Vec<Event>,
}

impl Schedule {
    pub fn new(events: Vec<Event>) -> Self {
        Self { events }
    }

    pub fn list(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn append(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn replace_all(&mut self, events: Vec<Event>) {
        self.events = events;
    }

    /// Returns the removed event, or `None` if `index` is out of range.
    pub fn remove_at(&mut self, index: usize) -> Option<Event> {
        if index < self.events.len() {
            Some(self.events.remove(index))
        } else {
            None
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }
}
