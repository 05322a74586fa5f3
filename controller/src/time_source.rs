use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;

// 2020-01-01T00:00:00Z. A clock reading earlier than this has not been set.
const MIN_SYNCED_EPOCH: i64 = 1_577_836_800;

pub trait TimeSource: Send + Sync {
    /// Current epoch seconds. May be meaningless before the first sync.
    fn epoch_seconds(&self) -> i64;

    /// Whether the current reading can be trusted.
    fn is_synced(&self) -> bool;
}

/// Operating system clock, kept in sync externally (NTP daemon, RTC).
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn epoch_seconds(&self) -> i64 {
        Utc::now().timestamp()
    }

    fn is_synced(&self) -> bool {
        self.epoch_seconds() >= MIN_SYNCED_EPOCH
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeReading {
    pub epoch_seconds: i64,
    pub synced_once: bool,
}

/// Wraps a time source and latches whether it has ever reported a synced time.
pub struct TimeKeeper {
    source: Box<dyn TimeSource>,
    synced_once: AtomicBool,
}

impl TimeKeeper {
    pub fn new(source: impl TimeSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            synced_once: AtomicBool::new(false),
        }
    }

    pub fn read(&self) -> TimeReading {
        if self.source.is_synced() {
            self.synced_once.store(true, Ordering::Relaxed);
        }
        TimeReading {
            epoch_seconds: self.source.epoch_seconds(),
            synced_once: self.synced_once.load(Ordering::Relaxed),
        }
    }
}
