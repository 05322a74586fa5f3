use std::{
    net::SocketAddr,
    path::PathBuf,
    sync::{Arc, OnceLock},
    time::{Duration, Instant},
};

use anyhow::Context;
use ptz_scheduler_common::{
    ControllerStatus, DeviceCommand, DispatchOutcome, EngineAction, SchedulerConfig,
    StreamEngine, Trigger,
};
use tokio::{net::TcpListener, sync::Mutex, time::MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::{
    dispatch::{DeviceClient, HttpDeviceClient},
    probe::ConnectivityProbe,
    store::{ScheduleStore, SETTINGS_FILE},
    time_source::{SystemClock, TimeKeeper},
    web,
};

/// Everything the control loop and the web handlers share. Only the control
/// loop sends stream commands.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Mutex<ScheduleStore>>,
    pub engine: Arc<Mutex<StreamEngine>>,
    pub device: Arc<dyn DeviceClient>,
    pub clock: Arc<TimeKeeper>,
    pub probe: Arc<ConnectivityProbe>,
    pub config: Arc<SchedulerConfig>,
}

impl AppState {
    pub fn new(
        store: ScheduleStore,
        device: Arc<dyn DeviceClient>,
        clock: TimeKeeper,
        probe: ConnectivityProbe,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            engine: Arc::new(Mutex::new(StreamEngine::new(&config))),
            device,
            clock: Arc::new(clock),
            probe: Arc::new(probe),
            config: Arc::new(config),
        }
    }
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let data_dir = std::env::var("PTZ_SCHEDULER_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./.ptz-scheduler"));
    let config = scheduler_config_from_env();

    let store = ScheduleStore::load(data_dir.join(SETTINGS_FILE)).await;
    info!("settings file: {}", store.path().display());
    let device = HttpDeviceClient::new(Duration::from_millis(config.request_timeout_ms))?;
    let probe = ConnectivityProbe::new(
        config.connectivity_url.clone(),
        Duration::from_millis(config.connectivity_timeout_ms),
    )?;

    let app_state = AppState::new(
        store,
        Arc::new(device),
        TimeKeeper::new(SystemClock),
        probe,
        config,
    );

    spawn_control_loop(app_state.clone());

    let app = web::router(app_state);

    let port = std::env::var("PTZ_SCHEDULER_HTTP_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind scheduler server at {addr}"))?;

    info!("scheduler listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

fn scheduler_config_from_env() -> SchedulerConfig {
    let mut config = SchedulerConfig::default();
    if let Some(value) = env_u64("PTZ_SCHEDULER_POLL_INTERVAL_MS") {
        config.poll_interval_ms = value;
    }
    if let Some(value) = env_u64("PTZ_SCHEDULER_REQUEST_TIMEOUT_MS") {
        config.request_timeout_ms = value;
    }
    config.sanitize();
    config
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

fn spawn_control_loop(app_state: AppState) {
    tokio::spawn(async move {
        recall_home_preset(&app_state).await;

        let mut interval =
            tokio::time::interval(Duration::from_millis(app_state.config.tick_interval_ms));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            run_tick(&app_state, monotonic_ms()).await;
        }
    });
}

async fn recall_home_preset(app_state: &AppState) {
    let address = app_state.store.lock().await.config().device_address.clone();
    info!("recalling home preset on {address}");
    match app_state
        .device
        .send_command(&address, DeviceCommand::RecallHomePreset)
        .await
    {
        DispatchOutcome::Delivered => info!("home preset recall delivered"),
        DispatchOutcome::Failed => warn!("home preset recall not delivered"),
    }
}

/// One pass of the control loop: match the schedule against the adjusted clock,
/// then poll and repair if the poll interval has elapsed. Device calls inside a
/// pass run one after another.
pub async fn run_tick(app_state: &AppState, now_ms: u64) {
    let reading = app_state.clock.read();

    let (schedule, config) = {
        let store = app_state.store.lock().await;
        (store.schedule().clone(), store.config().clone())
    };
    let now = config.clock().local_stamp(reading.epoch_seconds);

    let actions = {
        let mut engine = app_state.engine.lock().await;
        engine.evaluate_schedule(&schedule, &now, now_ms)
    };
    for action in &actions {
        info!(
            "schedule match at {} {}: sending {}",
            now.date,
            now.time,
            action.command().as_str()
        );
    }
    execute_engine_actions(app_state, &config.device_address, actions).await;

    let poll_due = app_state.engine.lock().await.poll_due(now_ms);
    if !poll_due {
        return;
    }

    let actual = app_state.device.poll_status(&config.device_address).await;
    let (desired, repairs) = {
        let mut engine = app_state.engine.lock().await;
        let repairs = engine.record_poll(actual, now_ms);
        (engine.desired(), repairs)
    };
    debug!(
        "poll: desired {} actual {}",
        desired.as_str(),
        actual.as_str()
    );
    execute_engine_actions(app_state, &config.device_address, repairs).await;
}

async fn execute_engine_actions(app_state: &AppState, address: &str, actions: Vec<EngineAction>) {
    for action in actions {
        let command = action.command();
        if action.trigger() == Trigger::Repair {
            info!("device has not converged, resending {}", command.as_str());
        }
        if app_state.device.send_command(address, command).await == DispatchOutcome::Failed {
            warn!(
                "{} not delivered to {address}, will retry on a later poll",
                command.as_str()
            );
        }
    }
}

pub async fn build_status(app_state: &AppState, now_ms: u64) -> ControllerStatus {
    let reading = app_state.clock.read();
    let (config, event_count) = {
        let store = app_state.store.lock().await;
        (store.config().clone(), store.schedule().len())
    };
    let now = config.clock().local_stamp(reading.epoch_seconds);
    let engine = app_state.engine.lock().await;

    ControllerStatus {
        time_synced: reading.synced_once,
        current_date: now.date.to_string(),
        current_time: now.time.to_string(),
        desired_state: engine.desired(),
        actual_state: engine.actual(),
        device_address: config.device_address,
        utc_offset_seconds: config.utc_offset_seconds,
        daylight_saving: config.daylight_saving,
        event_count,
        last_poll_age_ms: engine.last_poll_age_ms(now_ms),
    }
}

pub fn monotonic_ms() -> u64 {
    static START: OnceLock<Instant> = OnceLock::new();
    START
        .get_or_init(Instant::now)
        .elapsed()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}
