use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio::time::{Instant, sleep, sleep_until, timeout};

use super::{Oracle, OracleError, OracleRequest, OracleResponse};
use crate::config::OracleConfig;
use crate::core::cancel::CancelFlag;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueSettings {
    pub concurrency: usize,
    pub max_attempts: u32,
    pub timeout: Duration,
    /// Minimum gap between the starts of two calls.
    pub min_interval: Duration,
    /// First retry delay; doubles on every further attempt.
    pub backoff: Duration,
}

impl From<&OracleConfig> for QueueSettings {
    fn from(config: &OracleConfig) -> Self {
        Self {
            concurrency: config.concurrency.max(1),
            max_attempts: config.max_attempts.max(1),
            timeout: Duration::from_millis(config.timeout_ms),
            min_interval: Duration::from_millis(config.min_interval_ms),
            backoff: Duration::from_millis(config.backoff_ms),
        }
    }
}

/// Result of one request after all attempts.
#[derive(Debug, Clone, PartialEq)]
pub enum OracleOutcome {
    Answered(OracleResponse),
    Unresolved(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OracleStats {
    /// Calls started, retries included.
    pub attempted: usize,
    pub succeeded: usize,
    /// Calls the service answered, with or without an error status.
    pub responded: usize,
}

impl OracleStats {
    /// Calls were made and the service never answered any of them.
    pub fn unreachable(&self) -> bool {
        self.attempted > 0 && self.responded == 0
    }
}

/// Runs oracle requests with bounded concurrency, a minimum interval
/// between call starts, per-call timeouts and exponential backoff.
pub struct OracleQueue {
    oracle: Arc<dyn Oracle>,
    settings: QueueSettings,
    semaphore: Arc<Semaphore>,
    next_start: Mutex<Instant>,
    attempted: AtomicUsize,
    succeeded: AtomicUsize,
    responded: AtomicUsize,
}

impl OracleQueue {
    pub fn new(oracle: Arc<dyn Oracle>, settings: QueueSettings) -> Self {
        Self {
            oracle,
            semaphore: Arc::new(Semaphore::new(settings.concurrency.max(1))),
            settings,
            next_start: Mutex::new(Instant::now()),
            attempted: AtomicUsize::new(0),
            succeeded: AtomicUsize::new(0),
            responded: AtomicUsize::new(0),
        }
    }

    pub fn oracle_name(&self) -> &'static str {
        self.oracle.name()
    }

    pub fn stats(&self) -> OracleStats {
        OracleStats {
            attempted: self.attempted.load(Ordering::SeqCst),
            succeeded: self.succeeded.load(Ordering::SeqCst),
            responded: self.responded.load(Ordering::SeqCst),
        }
    }

    /// Run every request. Outcomes come back in request order. Requests not
    /// yet started when `cancel` is raised are left unresolved.
    pub async fn run_all(
        self: &Arc<Self>,
        requests: Vec<OracleRequest>,
        cancel: &CancelFlag,
    ) -> Vec<OracleOutcome> {
        let total = requests.len();
        let mut tasks = JoinSet::new();
        for (i, request) in requests.into_iter().enumerate() {
            let queue = Arc::clone(self);
            let cancel = cancel.clone();
            tasks.spawn(async move { (i, queue.submit(&request, &cancel).await) });
        }

        let mut outcomes: Vec<Option<OracleOutcome>> = vec![None; total];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((i, outcome)) => outcomes[i] = Some(outcome),
                Err(e) => tracing::error!(error = %e, "oracle task failed"),
            }
        }

        outcomes
            .into_iter()
            .map(|o| o.unwrap_or_else(|| OracleOutcome::Unresolved("oracle task failed".to_string())))
            .collect()
    }

    /// Run one request through the queue.
    pub async fn submit(&self, request: &OracleRequest, cancel: &CancelFlag) -> OracleOutcome {
        let Ok(_permit) = self.semaphore.acquire().await else {
            return OracleOutcome::Unresolved("oracle queue closed".to_string());
        };

        let mut last_error = None;
        for attempt in 1..=self.settings.max_attempts {
            if cancel.is_cancelled() {
                return OracleOutcome::Unresolved("cancelled".to_string());
            }
            if attempt > 1 {
                let delay = self.settings.backoff * 2u32.saturating_pow(attempt - 2);
                sleep(delay).await;
            }
            self.wait_for_slot().await;
            self.attempted.fetch_add(1, Ordering::SeqCst);

            let result = match timeout(self.settings.timeout, self.oracle.consult(request)).await {
                Ok(result) => result,
                Err(_) => Err(OracleError::Timeout(self.settings.timeout)),
            };

            if result.as_ref().is_ok() || result.as_ref().is_err_and(OracleError::is_response) {
                self.responded.fetch_add(1, Ordering::SeqCst);
            }
            match result {
                Ok(response) => {
                    self.succeeded.fetch_add(1, Ordering::SeqCst);
                    return OracleOutcome::Answered(response);
                }
                Err(e) => {
                    tracing::warn!(
                        candidate = %request.candidate,
                        attempt,
                        max_attempts = self.settings.max_attempts,
                        error = %e,
                        "oracle call failed"
                    );
                    let retryable = e.is_retryable();
                    last_error = Some(e);
                    if !retryable {
                        break;
                    }
                }
            }
        }

        OracleOutcome::Unresolved(
            last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no attempt made".to_string()),
        )
    }

    /// Reserve the next call start, sleeping until it is due.
    async fn wait_for_slot(&self) {
        let start = {
            let mut next = self.next_start.lock().await;
            let start = (*next).max(Instant::now());
            *next = start + self.settings.min_interval;
            start
        };
        sleep_until(start).await;
    }
}
