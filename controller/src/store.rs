use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use ptz_scheduler_common::{ControllerConfig, Event, PersistedState, Schedule};
use tracing::{info, warn};

use crate::error::StoreError;

pub const SETTINGS_FILE: &str = "settings.json";

/// Bulk update submitted by the settings form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsUpdate {
    pub events: Vec<Event>,
    pub device_address: Option<String>,
    pub utc_offset_seconds: Option<i64>,
    pub daylight_saving: bool,
}

/// Owns the schedule and controller config and rewrites the settings file after
/// every mutation. A failed write is returned to the caller but the in-memory
/// change stays applied.
#[derive(Debug)]
pub struct ScheduleStore {
    path: PathBuf,
    state: PersistedState,
}

impl ScheduleStore {
    /// Never fails: a missing or unreadable file starts the store from defaults.
    pub async fn load(path: PathBuf) -> Self {
        let state = match read_state(&path).await {
            Ok(Some(state)) => {
                info!(
                    "loaded {} event(s) from {}",
                    state.events.len(),
                    path.display()
                );
                state
            }
            Ok(None) => {
                info!("no settings at {}, using defaults", path.display());
                PersistedState::default()
            }
            Err(err) => {
                warn!("failed to load settings, using defaults: {err}");
                PersistedState::default()
            }
        };

        Self { path, state }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.state.config
    }

    pub fn schedule(&self) -> &Schedule {
        &self.state.events
    }

    pub fn list(&self) -> &[Event] {
        self.state.events.list()
    }

    pub async fn append(&mut self, event: Event) -> Result<(), StoreError> {
        self.state.events.append(event);
        self.persist().await
    }

    pub async fn replace_all(&mut self, events: Vec<Event>) -> Result<(), StoreError> {
        self.state.events.replace_all(events);
        self.persist().await
    }

    /// Out-of-range indices leave the schedule untouched; the document is still rewritten.
    pub async fn remove_at(&mut self, index: usize) -> Result<Option<Event>, StoreError> {
        let removed = self.state.events.remove_at(index);
        if removed.is_none() {
            warn!(
                "ignoring delete of event {index}, schedule has {}",
                self.state.events.len()
            );
        }
        self.persist().await?;
        Ok(removed)
    }

    pub async fn set_device_address(&mut self, address: String) -> Result<(), StoreError> {
        self.state.config.device_address = address;
        self.state.sanitize();
        self.persist().await
    }

    pub async fn set_offset(&mut self, utc_offset_seconds: i64) -> Result<(), StoreError> {
        self.state.config.utc_offset_seconds = utc_offset_seconds;
        self.state.sanitize();
        self.persist().await
    }

    pub async fn set_dst(&mut self, daylight_saving: bool) -> Result<(), StoreError> {
        self.state.config.daylight_saving = daylight_saving;
        self.persist().await
    }

    /// Bulk form submit. Every field goes through its own operation, so each one
    /// rewrites the file; later fields are still applied after a failed write and
    /// the first failure is returned.
    pub async fn apply_settings(&mut self, update: SettingsUpdate) -> Result<(), StoreError> {
        let mut results = vec![self.replace_all(update.events).await];
        if let Some(address) = update.device_address {
            results.push(self.set_device_address(address).await);
        }
        if let Some(offset) = update.utc_offset_seconds {
            results.push(self.set_offset(offset).await);
        }
        results.push(self.set_dst(update.daylight_saving).await);
        results.into_iter().collect()
    }

    /// Rewrites the settings file from the in-memory state.
    pub async fn persist(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| StoreError::Write {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        let payload = serde_json::to_vec_pretty(&self.state)?;
        tokio::fs::write(&self.path, payload)
            .await
            .map_err(|source| StoreError::Write {
                path: self.path.clone(),
                source,
            })?;
        Ok(())
    }
}

async fn read_state(path: &Path) -> Result<Option<PersistedState>, StoreError> {
    match tokio::fs::read(path).await {
        Ok(raw) => Ok(Some(PersistedState::from_json(&raw)?)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(source) => Err(StoreError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}
