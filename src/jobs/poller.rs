//! # Async Job Poller
//!
//! Wraps an operation that either answers immediately or hands back a job id.
//! Job ids are polled on a fixed interval until the job reaches a terminal
//! status.
//!
//! Each `execute()` claims a generation. `reset()` and any later `execute()`
//! cancel the polls of earlier generations, and results from a superseded
//! generation are dropped instead of overwriting newer state.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::JobPollConfig;
use crate::error::{ClientError, OPERATION_FAILED};
use crate::models::{AsyncJob, CreateDigitalTwinResponse, JobStatus};

/// Source of job status reports, e.g. `GET /api/jobs/{id}/status`.
#[async_trait]
pub trait JobStatusSource: Send + Sync {
    async fn job_status(&self, job_id: &str) -> Result<AsyncJob, ClientError>;
}

/// What the wrapped operation returned
#[derive(Debug, Clone, PartialEq)]
pub enum OperationOutcome<T> {
    /// Finished synchronously
    Ready(Option<T>),
    /// Accepted as a server job; poll this id
    Job(String),
}

impl<T> From<CreateDigitalTwinResponse> for OperationOutcome<T> {
    fn from(response: CreateDigitalTwinResponse) -> Self {
        OperationOutcome::Job(response.job_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationStatus {
    Idle,
    Loading,
    Success,
    Error,
}

/// Observable state of one operation
#[derive(Debug, Clone, PartialEq)]
pub struct OperationState<T> {
    pub data: Option<T>,
    pub loading: bool,
    pub error: Option<String>,
    pub progress: u8,
}

impl<T> Default for OperationState<T> {
    fn default() -> Self {
        Self {
            data: None,
            loading: false,
            error: None,
            progress: 0,
        }
    }
}

impl<T> OperationState<T> {
    fn started() -> Self {
        Self {
            loading: true,
            ..Self::default()
        }
    }

    pub fn status(&self) -> OperationStatus {
        if self.loading {
            OperationStatus::Loading
        } else if self.error.is_some() {
            OperationStatus::Error
        } else if self.progress == 100 || self.data.is_some() {
            OperationStatus::Success
        } else {
            OperationStatus::Idle
        }
    }
}

/// Polling cadence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    /// `None` polls until a terminal status
    pub max_attempts: Option<u32>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::from(&JobPollConfig::default())
    }
}

impl From<&JobPollConfig> for PollPolicy {
    fn from(config: &JobPollConfig) -> Self {
        Self {
            interval: config.interval(),
            max_attempts: config.max_attempts,
        }
    }
}

pub type OperationFuture<T> =
    Pin<Box<dyn Future<Output = Result<OperationOutcome<T>, ClientError>> + Send>>;
type OperationFn<A, T> = dyn Fn(A) -> OperationFuture<T> + Send + Sync;
type SuccessCallback<T> = dyn Fn(Option<&T>) + Send + Sync;
type ErrorCallback = dyn Fn(&str) + Send + Sync;

#[derive(Debug, Clone)]
struct Slot<T> {
    generation: u64,
    state: OperationState<T>,
}

struct Inner<A, T> {
    operation: Box<OperationFn<A, T>>,
    jobs: Arc<dyn JobStatusSource>,
    policy: PollPolicy,
    slot: watch::Sender<Slot<T>>,
    /// Cancels the polls of the current generation; guarded together with the generation bump
    cancel: Mutex<CancellationToken>,
    on_success: Option<Box<SuccessCallback<T>>>,
    on_error: Option<Box<ErrorCallback>>,
}

/// Generic operation wrapper with job polling. Clones share state.
pub struct AsyncOperation<A, T> {
    inner: Arc<Inner<A, T>>,
}

impl<A, T> Clone for AsyncOperation<A, T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

pub struct AsyncOperationBuilder<A, T> {
    operation: Box<OperationFn<A, T>>,
    jobs: Arc<dyn JobStatusSource>,
    policy: PollPolicy,
    on_success: Option<Box<SuccessCallback<T>>>,
    on_error: Option<Box<ErrorCallback>>,
}

impl<A, T> AsyncOperationBuilder<A, T>
where
    A: Send + 'static,
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    pub fn poll_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn on_success(mut self, callback: impl Fn(Option<&T>) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Box::new(callback));
        self
    }

    pub fn on_error(mut self, callback: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Box::new(callback));
        self
    }

    pub fn build(self) -> AsyncOperation<A, T> {
        let (slot, _rx) = watch::channel(Slot {
            generation: 0,
            state: OperationState::default(),
        });

        AsyncOperation {
            inner: Arc::new(Inner {
                operation: self.operation,
                jobs: self.jobs,
                policy: self.policy,
                slot,
                cancel: Mutex::new(CancellationToken::new()),
                on_success: self.on_success,
                on_error: self.on_error,
            }),
        }
    }
}

impl<A, T> AsyncOperation<A, T>
where
    A: Send + 'static,
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    pub fn builder<F, Fut>(operation: F, jobs: Arc<dyn JobStatusSource>) -> AsyncOperationBuilder<A, T>
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<OperationOutcome<T>, ClientError>> + Send + 'static,
    {
        AsyncOperationBuilder {
            operation: Box::new(move |args| Box::pin(operation(args)) as OperationFuture<T>),
            jobs,
            policy: PollPolicy::default(),
            on_success: None,
            on_error: None,
        }
    }

    pub fn state(&self) -> OperationState<T> {
        self.inner.slot.borrow().state.clone()
    }

    pub fn subscribe(&self) -> OperationWatcher<T> {
        OperationWatcher {
            rx: self.inner.slot.subscribe(),
        }
    }

    /// Wait until the current run is no longer loading.
    pub async fn settled(&self) -> OperationState<T> {
        self.subscribe().settled().await
    }

    /// Run the operation. Returns once the operation answered; job polling
    /// continues in the background.
    #[instrument(skip_all)]
    pub async fn execute(&self, args: A) {
        let (generation, token) = self.inner.start();

        match (self.inner.operation)(args).await {
            Err(err) => {
                warn!(error = %err, "Operation failed to start");
                self.inner.fail(generation, err.user_message());
            }
            Ok(OperationOutcome::Ready(data)) => {
                self.inner.succeed(generation, data);
            }
            Ok(OperationOutcome::Job(job_id)) => {
                info!(%job_id, generation, "Polling job status");
                let inner = Arc::clone(&self.inner);
                tokio::spawn(async move {
                    inner.poll(generation, job_id, token).await;
                });
            }
        }
    }

    /// Return to idle and stop any in-flight poll.
    pub fn reset(&self) {
        let mut cancel = self
            .inner
            .cancel
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());
        cancel.cancel();
        *cancel = CancellationToken::new();
        self.inner.slot.send_modify(|slot| {
            slot.generation += 1;
            slot.state = OperationState::default();
        });
    }
}

impl<A, T> Inner<A, T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Claim a new generation, cancelling the previous one's polls.
    fn start(&self) -> (u64, CancellationToken) {
        let mut cancel = self
            .cancel
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());
        cancel.cancel();
        let token = CancellationToken::new();
        *cancel = token.clone();

        let mut generation = 0;
        self.slot.send_modify(|slot| {
            slot.generation += 1;
            generation = slot.generation;
            slot.state = OperationState::started();
        });
        (generation, token)
    }

    /// Mutate state if `generation` is still current.
    fn apply(&self, generation: u64, update: impl FnOnce(&mut OperationState<T>)) -> bool {
        self.slot.send_if_modified(|slot| {
            if slot.generation != generation {
                return false;
            }
            update(&mut slot.state);
            true
        })
    }

    fn succeed(&self, generation: u64, data: Option<T>) {
        let delivered = data.clone();
        let applied = self.apply(generation, |state| {
            state.data = delivered;
            state.loading = false;
            state.error = None;
            state.progress = 100;
        });

        if !applied {
            debug!(generation, "Dropping result of superseded operation");
            return;
        }
        if let Some(callback) = &self.on_success {
            callback(data.as_ref());
        }
    }

    fn fail(&self, generation: u64, message: String) {
        let delivered = message.clone();
        let applied = self.apply(generation, |state| {
            state.loading = false;
            state.error = Some(delivered);
        });

        if !applied {
            debug!(generation, "Dropping failure of superseded operation");
            return;
        }
        if let Some(callback) = &self.on_error {
            callback(&message);
        }
    }

    async fn poll(&self, generation: u64, job_id: String, token: CancellationToken) {
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            counter!("job_poll_attempts_total").increment(1);

            let report = tokio::select! {
                _ = token.cancelled() => {
                    debug!(%job_id, "Polling cancelled");
                    return;
                }
                report = self.jobs.job_status(&job_id) => report,
            };

            let job = match report {
                Ok(job) => job,
                Err(err) => {
                    warn!(%job_id, error = %err, "Job status request failed");
                    self.fail(generation, err.user_message());
                    return;
                }
            };

            match job.status {
                JobStatus::Completed => {
                    let data = match job.result.map(serde_json::from_value::<T>).transpose() {
                        Ok(data) => data,
                        Err(err) => {
                            self.fail(generation, ClientError::from(err).user_message());
                            return;
                        }
                    };
                    info!(%job_id, attempts, "Job completed");
                    self.succeed(generation, data);
                    return;
                }
                JobStatus::Failed => {
                    let message = job
                        .error
                        .filter(|message| !message.is_empty())
                        .unwrap_or_else(|| OPERATION_FAILED.to_string());
                    info!(%job_id, attempts, error = %message, "Job failed");
                    self.fail(generation, message);
                    return;
                }
                JobStatus::Pending | JobStatus::Running => {
                    let progress = job.progress;
                    if !self.apply(generation, |state| state.progress = progress) {
                        debug!(%job_id, "Operation superseded; stopping poll");
                        return;
                    }

                    if let Some(max_attempts) = self.policy.max_attempts
                        && attempts >= max_attempts
                    {
                        let err = ClientError::PollLimitReached {
                            job_id: job_id.clone(),
                            attempts,
                        };
                        warn!(%job_id, attempts, "Giving up on job");
                        self.fail(generation, err.user_message());
                        return;
                    }

                    tokio::select! {
                        _ = token.cancelled() => {
                            debug!(%job_id, "Polling cancelled");
                            return;
                        }
                        _ = sleep(self.policy.interval) => {}
                    }
                }
            }
        }
    }
}

/// Read side of an [`AsyncOperation`].
pub struct OperationWatcher<T> {
    rx: watch::Receiver<Slot<T>>,
}

impl<T: Clone> OperationWatcher<T> {
    pub fn current(&self) -> OperationState<T> {
        self.rx.borrow().state.clone()
    }

    /// Next state change, or `None` once the operation is dropped.
    pub async fn changed(&mut self) -> Option<OperationState<T>> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().state.clone())
    }

    /// First non-loading state, or the last published one if the operation is
    /// dropped before it settles.
    pub async fn settled(&mut self) -> OperationState<T> {
        let settled = match self.rx.wait_for(|slot| !slot.state.loading).await {
            Ok(slot) => Some(slot.state.clone()),
            Err(_) => None,
        };
        settled.unwrap_or_else(|| self.rx.borrow().state.clone())
    }
}
