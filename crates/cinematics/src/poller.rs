//! Submit-then-poll completion primitive shared by every external
//! generation call.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{GenerationError, GenerationResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Created,
    InProgress,
    Completed,
    Failed,
}

/// One output of a finished task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedAsset {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub download_url: String,
}

impl GeneratedAsset {
    /// Preferred fetch location: the download url, else the plain url.
    pub fn fetch_url(&self) -> &str {
        if self.download_url.is_empty() {
            &self.url
        } else {
            &self.download_url
        }
    }
}

/// Snapshot of a task as reported by one poll response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationTask {
    pub id: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub result_assets: Vec<GeneratedAsset>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Anything whose tasks can be polled by id.
#[async_trait]
pub trait TaskStatusSource: Send + Sync {
    async fn poll_task(&self, task_id: &str) -> GenerationResult<GenerationTask>;
}

/// Backoff configuration for [`TaskPoller`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: f64,
    pub delay_cap: Duration,
    /// Overall wall-clock budget; `None` relies on the attempt budget alone.
    pub deadline: Option<Duration>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_attempts: 30,
            base_delay: Duration::from_secs(1),
            multiplier: 1.5,
            delay_cap: Duration::from_secs(10),
            deadline: None,
        }
    }
}

impl PollConfig {
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Wait inserted after attempt `k` (0-based): `min(base * multiplier^k, cap)`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay.as_secs_f64();
        let cap = self.delay_cap.as_secs_f64();
        let raw = base * self.multiplier.max(1.0).powi(attempt.min(i32::MAX as u32) as i32);
        if !raw.is_finite() || raw >= cap {
            self.delay_cap
        } else {
            Duration::from_secs_f64(raw)
        }
    }

    /// Upper bound on time spent sleeping across the whole attempt budget.
    pub fn worst_case_wait(&self) -> Duration {
        (0..self.max_attempts.saturating_sub(1))
            .map(|k| self.backoff_delay(k))
            .sum()
    }
}

#[derive(Debug, Clone, Default)]
pub struct TaskPoller {
    config: PollConfig,
    cancel: Option<CancellationToken>,
}

impl TaskPoller {
    pub fn new(config: PollConfig) -> Self {
        Self {
            config,
            cancel: None,
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Poll `task_id` until it completes with assets, fails, or the attempt
    /// budget runs out.
    ///
    /// A `FAILED` status is returned immediately. A failing status check is
    /// retried on the same schedule, except on the last attempt where it
    /// becomes [`GenerationError::TaskPollingExhausted`].
    pub async fn wait_for_assets<S>(
        &self,
        source: &S,
        task_id: &str,
    ) -> GenerationResult<Vec<GeneratedAsset>>
    where
        S: TaskStatusSource + ?Sized,
    {
        let started = Instant::now();
        let max_attempts = self.config.max_attempts.max(1);

        for attempt in 0..max_attempts {
            let is_last = attempt + 1 == max_attempts;

            match source.poll_task(task_id).await {
                Ok(task) => match task.status {
                    TaskStatus::Completed if !task.result_assets.is_empty() => {
                        debug!(task_id, attempt, "task completed");
                        return Ok(task.result_assets);
                    }
                    TaskStatus::Failed => {
                        return Err(GenerationError::TaskFailed {
                            task_id: task_id.to_string(),
                            reason: task.error.unwrap_or_else(|| "Unknown error".to_string()),
                        });
                    }
                    status => debug!(task_id, attempt, ?status, "task not ready"),
                },
                Err(err) => {
                    if is_last {
                        return Err(GenerationError::TaskPollingExhausted {
                            task_id: task_id.to_string(),
                            attempts: max_attempts,
                            last_error: err.to_string(),
                        });
                    }
                    warn!(task_id, attempt = attempt + 1, error = %err, "poll attempt failed");
                }
            }

            if is_last {
                break;
            }

            let delay = self.config.backoff_delay(attempt);
            if let Some(deadline) = self.config.deadline {
                if started.elapsed() + delay > deadline {
                    return Err(GenerationError::TaskTimeout {
                        task_id: task_id.to_string(),
                        attempts: attempt + 1,
                    });
                }
            }
            self.pause(task_id, delay).await?;
        }

        Err(GenerationError::TaskTimeout {
            task_id: task_id.to_string(),
            attempts: max_attempts,
        })
    }

    async fn pause(&self, task_id: &str, delay: Duration) -> GenerationResult<()> {
        match &self.cancel {
            Some(token) => {
                tokio::select! {
                    _ = token.cancelled() => Err(GenerationError::Cancelled(task_id.to_string())),
                    _ = sleep(delay) => Ok(()),
                }
            }
            None => {
                sleep(delay).await;
                Ok(())
            }
        }
    }
}
