use crate::error::{Error, ErrorKind};
use crate::storage::Storage;
use crate::USER_AGENT;
use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use url::Url;

/// The body of a POST to the `/view` endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewRequest {
    pub function: String,
    pub type_arguments: Vec<String>,
    pub arguments: Vec<Value>,
}

/// Something that can evaluate view functions. The HTTP gateway is the real
/// one; tests substitute their own.
#[async_trait]
pub trait ViewSource: Send + Sync {
    async fn view(&self, request: &ViewRequest) -> Result<Vec<Value>, Error>;
}

/// The error body a node returns alongside a non-success status
#[derive(Debug, Clone, Deserialize)]
struct NodeError {
    message: String,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    vm_error_code: Option<u64>,
}

/// Settings for the gateway, normally read from storage
#[derive(Debug, Clone)]
pub struct ViewGatewayConfig {
    pub rest_url: String,
    pub connect_timeout: Duration,
    pub timeout: Duration,
    pub max_requests: usize,
    pub exclusion_on_rate_limit: Duration,
    pub set_user_agent: bool,
    pub offline: bool,
}

impl ViewGatewayConfig {
    pub fn from_storage(storage: &Storage) -> ViewGatewayConfig {
        ViewGatewayConfig {
            rest_url: storage.read_setting_rest_url(),
            connect_timeout: Duration::from_secs(storage.read_setting_view_connect_timeout_sec()),
            timeout: Duration::from_secs(storage.read_setting_view_timeout_sec()),
            max_requests: storage.read_setting_view_max_requests().max(1) as usize,
            exclusion_on_rate_limit: Duration::from_secs(
                storage.read_setting_view_exclusion_on_rate_limit_secs(),
            ),
            set_user_agent: storage.read_setting_set_user_agent(),
            offline: storage.read_setting_offline(),
        }
    }
}

/// Issues view calls against the node's REST API.
///
/// Concurrency is capped by a semaphore. After the node answers 429, every
/// request waits out a penalty period before being sent.
#[derive(Debug)]
pub struct ViewGateway {
    client: Client,
    view_url: Url,
    permits: Semaphore,
    penalty_until: Mutex<Option<Instant>>,
    exclusion_on_rate_limit: Duration,
    set_user_agent: bool,
    offline: AtomicBool,

    in_flight: AtomicUsize,
    completed: AtomicUsize,
    failed: AtomicUsize,
    bytes_read: AtomicUsize,
}

impl ViewGateway {
    pub fn new(config: ViewGatewayConfig) -> Result<ViewGateway, Error> {
        let client = Client::builder()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .connect_timeout(config.connect_timeout)
            .timeout(config.timeout)
            .build()?;

        Ok(ViewGateway {
            client,
            view_url: view_url(&config.rest_url)?,
            permits: Semaphore::new(config.max_requests.max(1)),
            penalty_until: Mutex::new(None),
            exclusion_on_rate_limit: config.exclusion_on_rate_limit,
            set_user_agent: config.set_user_agent,
            offline: AtomicBool::new(config.offline),
            in_flight: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            bytes_read: AtomicUsize::new(0),
        })
    }

    pub fn view_url(&self) -> &Url {
        &self.view_url
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::Relaxed);
    }

    pub fn stats(&self) -> String {
        format!(
            "view: {} in flight, {} ok, {} failed, {} bytes{}",
            self.in_flight.load(Ordering::Relaxed),
            self.completed.load(Ordering::Relaxed),
            self.failed.load(Ordering::Relaxed),
            self.bytes_read.load(Ordering::Relaxed),
            if self.sinbinned() { ", rate limited" } else { "" }
        )
    }

    pub fn num_requests_in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Whether requests are currently held off after a 429
    pub fn sinbinned(&self) -> bool {
        matches!(*self.penalty_until.lock(), Some(until) if until > Instant::now())
    }

    fn sinbin(&self, duration: Duration) {
        let until = Instant::now() + duration;
        let mut penalty = self.penalty_until.lock();
        // Never shorten an existing penalty
        if penalty.map(|p| p < until).unwrap_or(true) {
            *penalty = Some(until);
        }
        tracing::info!(
            target: "view",
            "Rate limited; holding off view requests for {}s",
            duration.as_secs()
        );
    }

    async fn wait_out_penalty(&self) {
        let until = *self.penalty_until.lock();
        if let Some(until) = until {
            if until > Instant::now() {
                tokio::time::sleep_until(until).await;
            }
        }
    }

    async fn send(&self, request: &ViewRequest) -> Result<Vec<Value>, Error> {
        if self.offline.load(Ordering::Relaxed) {
            return Err(ErrorKind::Offline.into());
        }

        self.wait_out_penalty().await;

        let Ok(_permit) = self.permits.acquire().await else {
            return Err(ErrorKind::ShuttingDown.into());
        };

        let mut req = self.client.post(self.view_url.as_str()).json(request);
        if self.set_user_agent {
            req = req.header("User-Agent", USER_AGENT);
        }

        let response = req.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        self.bytes_read.fetch_add(bytes.len(), Ordering::Relaxed);

        if status == StatusCode::TOO_MANY_REQUESTS {
            self.sinbin(self.exclusion_on_rate_limit);
            return Err(ErrorKind::ViewStatus(status).into());
        }

        if !status.is_success() {
            return Err(rejection(status, &bytes));
        }

        let values: Vec<Value> = serde_json::from_slice(&bytes)?;
        Ok(values)
    }
}

#[async_trait]
impl ViewSource for ViewGateway {
    async fn view(&self, request: &ViewRequest) -> Result<Vec<Value>, Error> {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        let result = self.send(request).await;
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
        match &result {
            Ok(_) => {
                self.completed.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(target: "view", "VIEW {} failed: {}", request.function, e);
            }
        }
        result
    }
}

/// `{rest_url}/view`
pub fn view_url(rest_url: &str) -> Result<Url, Error> {
    Ok(Url::parse(&format!("{}/view", rest_url.trim_end_matches('/')))?)
}

// A node error body becomes ViewRejected. Anything else keeps just the status.
fn rejection(status: StatusCode, body: &[u8]) -> Error {
    match serde_json::from_slice::<NodeError>(body) {
        Ok(node_error) => {
            let message = match (node_error.error_code, node_error.vm_error_code) {
                (Some(code), Some(vm)) => format!("{} [{} vm:{}]", node_error.message, code, vm),
                (Some(code), None) => format!("{} [{}]", node_error.message, code),
                _ => node_error.message,
            };
            ErrorKind::ViewRejected {
                status: status.as_u16(),
                message,
            }
            .into()
        }
        Err(_) => ErrorKind::ViewStatus(status).into(),
    }
}
