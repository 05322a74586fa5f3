use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use ptz_scheduler_common::{
    parse_status_body, ActualState, DeviceCommand, DispatchOutcome, STATUS_PATH,
};
use tracing::{debug, warn};

/// Transport to the camera. Calls never retry; the control loop tries again on
/// its next pass.
#[async_trait]
pub trait DeviceClient: Send + Sync {
    async fn send_command(&self, address: &str, command: DeviceCommand) -> DispatchOutcome;

    async fn poll_status(&self, address: &str) -> ActualState;
}

pub struct HttpDeviceClient {
    client: reqwest::Client,
}

impl HttpDeviceClient {
    pub fn new(request_timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .context("failed to build device http client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl DeviceClient for HttpDeviceClient {
    async fn send_command(&self, address: &str, command: DeviceCommand) -> DispatchOutcome {
        let url = device_url(address, command.path());
        match self.client.get(&url).send().await {
            Ok(response) => {
                debug!(
                    "{} delivered to {url} ({})",
                    command.as_str(),
                    response.status()
                );
                DispatchOutcome::Delivered
            }
            Err(err) => {
                warn!("{} request to {url} failed: {err}", command.as_str());
                DispatchOutcome::Failed
            }
        }
    }

    async fn poll_status(&self, address: &str) -> ActualState {
        let url = device_url(address, STATUS_PATH);
        let body = match self.client.get(&url).send().await {
            Ok(response) => response.text().await,
            Err(err) => Err(err),
        };

        match body {
            Ok(body) => match parse_status_body(&body) {
                Ok(code) => ActualState::from_status_code(code),
                Err(err) => {
                    warn!("unexpected status response from {url}: {err}");
                    ActualState::Unknown
                }
            },
            Err(err) => {
                warn!("status poll to {url} failed: {err}");
                ActualState::Unknown
            }
        }
    }
}

/// Accepts a bare host or IP as well as a full base URL.
pub fn device_url(address: &str, path: &str) -> String {
    let address = address.trim().trim_end_matches('/');
    if address.starts_with("http://") || address.starts_with("https://") {
        format!("{address}{path}")
    } else {
        format!("http://{address}{path}")
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use std::{collections::VecDeque, sync::Mutex};

    use super::*;

    /// Records commands and replays scripted poll results; `Unknown` once the script runs out.
    #[derive(Default)]
    pub struct FakeDevice {
        pub sent: Mutex<Vec<(String, DeviceCommand)>>,
        pub statuses: Mutex<VecDeque<ActualState>>,
        pub polls: Mutex<usize>,
        pub unreachable: bool,
    }

    impl FakeDevice {
        pub fn with_statuses(statuses: impl IntoIterator<Item = ActualState>) -> Self {
            Self {
                statuses: Mutex::new(statuses.into_iter().collect()),
                ..Self::default()
            }
        }

        pub fn commands(&self) -> Vec<DeviceCommand> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .map(|(_, command)| *command)
                .collect()
        }

        pub fn poll_count(&self) -> usize {
            *self.polls.lock().unwrap()
        }
    }

    #[async_trait]
    impl DeviceClient for FakeDevice {
        async fn send_command(&self, address: &str, command: DeviceCommand) -> DispatchOutcome {
            self.sent
                .lock()
                .unwrap()
                .push((address.to_string(), command));
            if self.unreachable {
                DispatchOutcome::Failed
            } else {
                DispatchOutcome::Delivered
            }
        }

        async fn poll_status(&self, _address: &str) -> ActualState {
            *self.polls.lock().unwrap() += 1;
            self.statuses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(ActualState::Unknown)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        net::SocketAddr,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
    };

    use axum::{extract::Query, http::StatusCode, routing::get, Router};
    use pretty_assertions::assert_eq;
    use tokio::net::TcpListener;

    use super::*;

    async fn spawn_camera(status_body: &'static str) -> (SocketAddr, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        let app = Router::new()
            .route(
                "/cgi-bin/rtmp_ctrl",
                get(move |Query(params): Query<HashMap<String, String>>| {
                    let counter = counter.clone();
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        // Real cameras sometimes answer control requests with errors.
                        match params.get("cmd").map(String::as_str) {
                            Some("start") => (StatusCode::OK, "ok"),
                            _ => (StatusCode::INTERNAL_SERVER_ERROR, "busy"),
                        }
                    }
                }),
            )
            .route("/cgi-bin/get_rtmp_status", get(move || async move { status_body }));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (addr, hits)
    }

    async fn closed_port() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        addr
    }

    fn client() -> HttpDeviceClient {
        HttpDeviceClient::new(Duration::from_secs(2)).unwrap()
    }

    #[test]
    fn builds_urls_from_bare_and_full_addresses() {
        assert_eq!(
            device_url("10.0.3.61", STATUS_PATH),
            "http://10.0.3.61/cgi-bin/get_rtmp_status"
        );
        assert_eq!(
            device_url("http://cam.local:8080/", DeviceCommand::StartStream.path()),
            "http://cam.local:8080/cgi-bin/rtmp_ctrl?cmd=start"
        );
        assert_eq!(
            device_url(" 10.0.3.61 ", DeviceCommand::StopStream.path()),
            "http://10.0.3.61/cgi-bin/rtmp_ctrl?cmd=stop"
        );
    }

    #[tokio::test]
    async fn any_http_response_counts_as_delivered() {
        let (addr, hits) = spawn_camera("status=1").await;
        let address = addr.to_string();
        let client = client();

        assert_eq!(
            client.send_command(&address, DeviceCommand::StartStream).await,
            DispatchOutcome::Delivered
        );
        assert_eq!(
            client.send_command(&address, DeviceCommand::StopStream).await,
            DispatchOutcome::Delivered
        );
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn refused_connection_is_failed() {
        let address = closed_port().await.to_string();
        assert_eq!(
            client().send_command(&address, DeviceCommand::StartStream).await,
            DispatchOutcome::Failed
        );
    }

    #[tokio::test]
    async fn poll_maps_status_body() {
        let (streaming, _) = spawn_camera("rtmp\nstatus=1\n").await;
        let (idle, _) = spawn_camera("status=0").await;
        let (garbage, _) = spawn_camera("<html>not found</html>").await;
        let client = client();

        assert_eq!(
            client.poll_status(&streaming.to_string()).await,
            ActualState::Streaming
        );
        assert_eq!(client.poll_status(&idle.to_string()).await, ActualState::Idle);
        assert_eq!(
            client.poll_status(&garbage.to_string()).await,
            ActualState::Unknown
        );
    }

    #[tokio::test]
    async fn poll_of_unreachable_device_is_unknown() {
        let address = closed_port().await.to_string();
        assert_eq!(client().poll_status(&address).await, ActualState::Unknown);
    }
}
