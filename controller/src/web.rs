use std::collections::HashMap;

use axum::{
    extract::{rejection::FormRejection, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Form, Json, Router,
};
use ptz_scheduler_common::{config::MAX_UTC_OFFSET_HOURS, ActualState, ControllerStatus, Event};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

use crate::{
    error::StoreError,
    host::{build_status, monotonic_ms, AppState},
    store::SettingsUpdate,
};

#[derive(Debug, Serialize)]
struct StatusView {
    #[serde(flatten)]
    status: ControllerStatus,
    #[serde(rename = "internetConnected")]
    internet_connected: bool,
}

pub fn router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(handle_index))
        .route(
            "/updateSettings",
            get(handle_update_settings).post(handle_update_settings),
        )
        .route("/updateDST", get(handle_update_dst).post(handle_update_dst))
        .route("/addEvent", get(handle_add_event).post(handle_add_event))
        .route(
            "/deleteEvent",
            get(handle_delete_event).post(handle_delete_event),
        )
        .route("/api/status", get(handle_get_status))
        .route("/api/schedule", get(handle_get_schedule))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

async fn handle_index(State(state): State<AppState>) -> impl IntoResponse {
    let internet_connected = state.probe.check().await;
    let status = build_status(&state, monotonic_ms()).await;
    let events = state.store.lock().await.list().to_vec();

    Html(render_page(&status, &events, internet_connected))
}

async fn handle_update_settings(
    State(state): State<AppState>,
    form: Result<Form<HashMap<String, String>>, FormRejection>,
) -> Response {
    let update = settings_from_form(&form_fields(form));
    let result = state.store.lock().await.apply_settings(update).await;
    log_persist_failure("settings update", result);
    redirect_home()
}

async fn handle_update_dst(
    State(state): State<AppState>,
    form: Result<Form<HashMap<String, String>>, FormRejection>,
) -> Response {
    let form = form_fields(form);
    let result = state.store.lock().await.set_dst(dst_checked(&form)).await;
    log_persist_failure("dst update", result);
    redirect_home()
}

async fn handle_add_event(State(state): State<AppState>) -> Response {
    let result = state.store.lock().await.append(Event::default()).await;
    log_persist_failure("event append", result);
    redirect_home()
}

async fn handle_delete_event(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let index = params
        .get("index")
        .and_then(|value| value.trim().parse::<usize>().ok());

    let mut store = state.store.lock().await;
    let result = match index {
        Some(index) => store.remove_at(index).await.map(|_| ()),
        None => {
            warn!("ignoring delete with missing or invalid index");
            store.persist().await
        }
    };
    drop(store);

    log_persist_failure("event delete", result);
    redirect_home()
}

async fn handle_get_status(State(state): State<AppState>) -> impl IntoResponse {
    let internet_connected = state.probe.check().await;
    let status = build_status(&state, monotonic_ms()).await;
    Json(StatusView {
        status,
        internet_connected,
    })
}

async fn handle_get_schedule(State(state): State<AppState>) -> impl IntoResponse {
    let events = state.store.lock().await.list().to_vec();
    Json(events)
}

/// Events are read from `startDate{i}`/`startTime{i}`/`stopTime{i}` for consecutive
/// `i` starting at 0, stopping at the first missing `startDate{i}`.
fn settings_from_form(form: &HashMap<String, String>) -> SettingsUpdate {
    let field = |name: String| form.get(&name).cloned().unwrap_or_default();

    let mut events = Vec::new();
    while let Some(date) = form.get(&format!("startDate{}", events.len())) {
        let i = events.len();
        events.push(Event {
            date: date.clone(),
            start_time: field(format!("startTime{i}")),
            stop_time: field(format!("stopTime{i}")),
        });
    }

    let utc_offset_seconds = form.get("timezone").and_then(|value| {
        match value.trim().parse::<i64>() {
            Ok(hours) => Some(hours.clamp(-MAX_UTC_OFFSET_HOURS, MAX_UTC_OFFSET_HOURS) * 3600),
            Err(_) => {
                warn!("ignoring invalid timezone value {value:?}");
                None
            }
        }
    });

    SettingsUpdate {
        events,
        device_address: form.get("ip").cloned(),
        utc_offset_seconds,
        daylight_saving: dst_checked(form),
    }
}

/// A body that is not form encoded reads as an empty form, so an unchecked
/// DST box still clears the flag.
fn form_fields(
    form: Result<Form<HashMap<String, String>>, FormRejection>,
) -> HashMap<String, String> {
    match form {
        Ok(Form(fields)) => fields,
        Err(rejection) => {
            debug!("treating unreadable form body as empty: {rejection}");
            HashMap::new()
        }
    }
}

fn dst_checked(form: &HashMap<String, String>) -> bool {
    form.get("dst").is_some_and(|value| value == "on")
}

fn log_persist_failure(what: &str, result: Result<(), StoreError>) {
    if let Err(err) = result {
        warn!("failed to persist {what}: {err}");
    }
}

fn redirect_home() -> Response {
    (StatusCode::FOUND, [(header::LOCATION, "/")]).into_response()
}

fn render_page(status: &ControllerStatus, events: &[Event], internet_connected: bool) -> String {
    let mut page = String::with_capacity(8 * 1024);
    let yes_no = |flag: bool| if flag { "Yes" } else { "No" };

    page.push_str("<html><body>");
    page.push_str("<h1>PTZ Stream Scheduler</h1>");
    page.push_str(&format!(
        "<p>Internet Connected: {}</p><p>NTP Updated: {}</p>\
         <p>Current Date: {}</p><p>Current Time: {}</p>",
        yes_no(internet_connected),
        yes_no(status.time_synced),
        status.current_date,
        status.current_time,
    ));

    page.push_str("<form action='/updateSettings' method='post' id='settingsForm'>");
    for (i, event) in events.iter().enumerate() {
        page.push_str(&format!(
            "<div id='event{i}'><h2>Event {n}</h2>\
             <label for='startDate{i}'>Start Date (YYYY-MM-DD):</label><br>\
             <input type='text' id='startDate{i}' name='startDate{i}' value='{date}'><br><br>\
             <label for='startTime{i}'>Start Time (HH:MM):</label><br>\
             <input type='text' id='startTime{i}' name='startTime{i}' value='{start}'><br><br>\
             <label for='stopTime{i}'>Stop Time (HH:MM):</label><br>\
             <input type='text' id='stopTime{i}' name='stopTime{i}' value='{stop}'><br><br>\
             <button type='button' onclick='deleteEvent({i})'>Delete Event</button><br><br></div>",
            n = i + 1,
            date = escape(&event.date),
            start = escape(&event.start_time),
            stop = escape(&event.stop_time),
        ));
    }
    page.push_str("<button type='button' onclick='addEvent()'>Add Event</button><br><br>");

    page.push_str(&format!(
        "<label for='ip'>PTZ Camera IP:</label><br>\
         <input type='text' id='ip' name='ip' value='{}'><br><br>",
        escape(&status.device_address)
    ));

    page.push_str("<label for='timezone'>Select Timezone:</label><br><select id='timezone' name='timezone'>");
    let selected_hours = status.utc_offset_seconds / 3600;
    for hours in -MAX_UTC_OFFSET_HOURS..=MAX_UTC_OFFSET_HOURS {
        let selected = if hours == selected_hours { " selected" } else { "" };
        page.push_str(&format!(
            "<option value='{hours}'{selected}>{}</option>",
            timezone_label(hours)
        ));
    }
    page.push_str("</select><br><br>");

    page.push_str(&format!(
        "<label for='dst'>Daylight Saving Time (+1hr):</label><br>\
         <input type='checkbox' id='dst' name='dst' {} onchange='updateDST()'><br><br>",
        if status.daylight_saving { "checked" } else { "" }
    ));
    page.push_str("<input type='submit' value='Update Settings'></form>");

    page.push_str("<h2>Current Settings</h2>");
    for (i, event) in events.iter().enumerate() {
        page.push_str(&format!(
            "<p>Event {}:</p><p>Start Date: {}</p><p>Start Time: {}</p><p>Stop Time: {}</p>",
            i + 1,
            escape(&event.date),
            escape(&event.start_time),
            escape(&event.stop_time),
        ));
    }
    let ptz = if status.actual_state == ActualState::Unknown {
        "Not Connected"
    } else {
        "Connected"
    };
    let stream = if status.actual_state == ActualState::Streaming {
        "During Stream"
    } else {
        "Stream Suspended"
    };
    page.push_str(&format!(
        "<p>PTZ Camera IP: {}</p><p>PTZ: {ptz}</p><p>Stream Status: {stream}</p>\
         <p>Scheduled State: {}</p>",
        escape(&status.device_address),
        status.desired_state.as_str(),
    ));

    page.push_str(
        "<script>\
         function submitTo(action) {\
           var form = document.getElementById('settingsForm');\
           form.action = action;\
           form.submit();\
         }\
         function addEvent() { submitTo('/addEvent'); }\
         function deleteEvent(index) { submitTo('/deleteEvent?index=' + index); }\
         function updateDST() { submitTo('/updateDST'); }\
         </script>",
    );
    page.push_str("</body></html>");
    page
}

fn timezone_label(hours: i64) -> String {
    match hours {
        0 => "GMT".to_string(),
        -8 => "PST (GMT-8)".to_string(),
        -7 => "MST (GMT-7)".to_string(),
        -6 => "CST (GMT-6)".to_string(),
        -5 => "EST (GMT-5)".to_string(),
        h if h > 0 => format!("GMT+{h}"),
        h => format!("GMT{h}"),
    }
}

fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '\'' => escaped.push_str("&#39;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
