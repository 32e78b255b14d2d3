use std::fmt;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use reqwest::blocking::Client;
use serde::Serialize;
use url::Url;
use uuid::Uuid;

use crate::transport::callback::Callback;
use crate::transport::client::CoreClient;
use crate::transport::constants::{
    BATCH_PATH, DEFAULT_BATCH_SIZE, DEFAULT_INTERVAL, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_QUEUE_CAPACITY, DEFAULT_REQUEST_TIMEOUT, LOG_TARGET,
};
use crate::transport::error::{
    client_closed, internal_error, invalid_argument, network_error, queue_full, TransportError,
    TransportResult,
};
use crate::transport::message::Message;
use crate::util::RetryBackoff;

/// Settings for a [`BatchingClient`].
#[derive(Clone)]
pub struct CoreConfig {
    endpoint: String,
    callback: Option<Arc<dyn Callback>>,
    verbose: bool,
    interval: Duration,
    batch_size: usize,
    queue_capacity: usize,
    max_attempts: u32,
    timeout: Duration,
    backoff: RetryBackoff,
}

impl fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoreConfig")
            .field("endpoint", &self.endpoint)
            .field("callback", &self.callback.is_some())
            .field("verbose", &self.verbose)
            .field("interval", &self.interval)
            .field("batch_size", &self.batch_size)
            .field("queue_capacity", &self.queue_capacity)
            .field("max_attempts", &self.max_attempts)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl CoreConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            callback: None,
            verbose: false,
            interval: DEFAULT_INTERVAL,
            batch_size: DEFAULT_BATCH_SIZE,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            timeout: DEFAULT_REQUEST_TIMEOUT,
            backoff: RetryBackoff::default(),
        }
    }

    pub fn with_callback(mut self, callback: Arc<dyn Callback>) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Maximum time a message waits in the buffer before a flush.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Number of buffered messages that triggers an immediate flush.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Number of messages that may wait for the flush thread. Messages enqueued while the queue
    /// is full are reported as failures and dropped.
    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry_backoff(mut self, backoff: RetryBackoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn batch_url(&self) -> TransportResult<Url> {
        let mut url = Url::parse(&self.endpoint).map_err(|err| {
            invalid_argument(format!("invalid analytics endpoint `{}`: {err}", self.endpoint))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid_argument(format!(
                "analytics endpoint `{}` must use http or https",
                self.endpoint
            )));
        }
        // Only the path changes; query and fragment are kept as configured.
        url.path_segments_mut()
            .map_err(|_| {
                invalid_argument(format!("analytics endpoint `{}` has no path", self.endpoint))
            })?
            .pop_if_empty()
            .extend(BATCH_PATH.split('/'));
        Ok(url)
    }
}

/// Transport that buffers messages and delivers them in batches from a background thread.
///
/// A batch is sent when `batch_size` messages are buffered or `interval` has elapsed since the
/// previous flush, whichever comes first. Failed requests are retried with exponential backoff,
/// after which every message in the batch is reported to the callback.
pub struct BatchingClient {
    endpoint: String,
    callback: Option<Arc<dyn Callback>>,
    sender: Mutex<Option<SyncSender<Message>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for BatchingClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchingClient")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl BatchingClient {
    pub fn new(config: CoreConfig) -> TransportResult<Self> {
        let batch_url = config.batch_url()?;
        if config.interval.is_zero() {
            return Err(invalid_argument("flush interval must be greater than zero"));
        }
        if config.batch_size == 0 {
            return Err(invalid_argument("batch size must be greater than zero"));
        }
        if config.queue_capacity == 0 {
            return Err(invalid_argument("queue capacity must be greater than zero"));
        }

        let (sender, receiver) = mpsc::sync_channel(config.queue_capacity);
        let (ready_tx, ready_rx) = mpsc::sync_channel::<TransportResult<()>>(1);
        let settings = WorkerSettings {
            batch_url,
            callback: config.callback.clone(),
            verbose: config.verbose,
            interval: config.interval,
            batch_size: config.batch_size,
            max_attempts: config.max_attempts.max(1),
            timeout: config.timeout,
            backoff: config.backoff,
        };

        // The blocking HTTP client owns an internal runtime, so it is built and dropped on the
        // flush thread. That keeps construction safe from inside an async runtime.
        let handle = thread::Builder::new()
            .name("cf-analytics-flush".to_string())
            .spawn(move || match settings.build_worker() {
                Ok(worker) => {
                    let _ = ready_tx.send(Ok(()));
                    worker.run(receiver);
                }
                Err(err) => {
                    let _ = ready_tx.send(Err(err));
                }
            })
            .map_err(|err| internal_error(format!("failed to spawn flush thread: {err}")))?;

        let ready = ready_rx
            .recv()
            .unwrap_or_else(|_| Err(internal_error("analytics flush thread exited during startup")));
        if let Err(err) = ready {
            let _ = handle.join();
            return Err(err);
        }

        Ok(Self {
            endpoint: config.endpoint,
            callback: config.callback,
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(handle)),
        })
    }
}

impl CoreClient for BatchingClient {
    fn enqueue(&self, mut message: Message) -> TransportResult<()> {
        message.validate()?;
        message.fill_defaults(|| Uuid::now_v7().to_string(), Utc::now());

        let guard = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        let sender = guard.as_ref().ok_or_else(client_closed)?;
        match sender.try_send(message) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(message)) => {
                let err = queue_full();
                if let Some(callback) = &self.callback {
                    callback.failure(&message, &err);
                }
                Err(err)
            }
            Err(TrySendError::Disconnected(_)) => {
                Err(internal_error("analytics flush thread is no longer running"))
            }
        }
    }

    fn endpoint_url(&self) -> &str {
        &self.endpoint
    }

    fn close(&self) -> TransportResult<()> {
        // Dropping the sender disconnects the channel; the worker drains and exits.
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if sender.is_none() {
            return Err(client_closed());
        }
        drop(sender);

        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match handle {
            Some(handle) => handle
                .join()
                .map_err(|_| internal_error("analytics flush thread panicked")),
            None => Ok(()),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchPayload<'a> {
    batch: &'a [Message],
    sent_at: DateTime<Utc>,
}

struct WorkerSettings {
    batch_url: Url,
    callback: Option<Arc<dyn Callback>>,
    verbose: bool,
    interval: Duration,
    batch_size: usize,
    max_attempts: u32,
    timeout: Duration,
    backoff: RetryBackoff,
}

impl WorkerSettings {
    fn build_worker(self) -> TransportResult<Worker> {
        let http = Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|err| internal_error(format!("failed to build HTTP client: {err}")))?;

        Ok(Worker {
            http,
            batch_url: self.batch_url,
            callback: self.callback,
            verbose: self.verbose,
            interval: self.interval,
            batch_size: self.batch_size,
            max_attempts: self.max_attempts,
            backoff: self.backoff,
            buffer: Vec::with_capacity(self.batch_size),
        })
    }
}

struct Worker {
    http: Client,
    batch_url: Url,
    callback: Option<Arc<dyn Callback>>,
    verbose: bool,
    interval: Duration,
    batch_size: usize,
    max_attempts: u32,
    backoff: RetryBackoff,
    buffer: Vec<Message>,
}

impl Worker {
    fn run(mut self, receiver: Receiver<Message>) {
        let mut deadline = Instant::now() + self.interval;
        loop {
            let wait = deadline.saturating_duration_since(Instant::now());
            match receiver.recv_timeout(wait) {
                Ok(message) => {
                    self.buffer.push(message);
                    if self.buffer.len() >= self.batch_size {
                        self.flush();
                        deadline = Instant::now() + self.interval;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    self.flush();
                    deadline = Instant::now() + self.interval;
                }
                Err(RecvTimeoutError::Disconnected) => {
                    self.flush();
                    break;
                }
            }
        }
        if self.verbose {
            log::debug!(target: LOG_TARGET, "flush thread stopped");
        }
    }

    fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let batch = std::mem::take(&mut self.buffer);
        if self.verbose {
            log::debug!(
                target: LOG_TARGET,
                "sending batch of {} messages to {}",
                batch.len(),
                self.batch_url
            );
        }

        match self.send_with_retry(&batch) {
            Ok(()) => {
                if let Some(callback) = &self.callback {
                    batch.iter().for_each(|message| callback.success(message));
                }
            }
            Err(err) => {
                if self.verbose {
                    log::debug!(target: LOG_TARGET, "dropping batch of {}: {err}", batch.len());
                }
                if let Some(callback) = &self.callback {
                    batch
                        .iter()
                        .for_each(|message| callback.failure(message, &err));
                }
            }
        }
    }

    fn send_with_retry(&self, batch: &[Message]) -> Result<(), TransportError> {
        let mut attempt = 0;
        loop {
            match self.send(batch) {
                Ok(()) => return Ok(()),
                Err(err) => {
                    attempt += 1;
                    if attempt >= self.max_attempts {
                        return Err(err);
                    }
                    if self.verbose {
                        log::debug!(
                            target: LOG_TARGET,
                            "batch delivery attempt {attempt} failed: {err}"
                        );
                    }
                    thread::sleep(self.backoff.delay(attempt - 1));
                }
            }
        }
    }

    fn send(&self, batch: &[Message]) -> TransportResult<()> {
        let payload = BatchPayload {
            batch,
            sent_at: Utc::now(),
        };
        let response = self
            .http
            .post(self.batch_url.clone())
            .json(&payload)
            .send()
            .map_err(|err| network_error(format!("failed to send analytics batch: {err}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response
            .text()
            .unwrap_or_else(|_| "<unavailable response body>".to_string());
        Err(network_error(format!(
            "analytics batch request failed with status {status}. Response: {body}"
        )))
    }
}
