//! Durable job queue for downstream POS/payment work.
//!
//! Webhook handlers enqueue; a single in-process worker drains. Pending
//! jobs persist to `jobs.json` under the state path so a restart resumes
//! where it left off. Delivery is at-least-once — the downstream
//! submissions are idempotent via deterministic identifiers, so a replay
//! after a crash between process and persist is harmless.
//!
//! The broker boundary stays thin by design: `process` is where a real
//! deployment talks to the POS/payment provider.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

use vg_domain::config::JobsConfig;
use vg_domain::error::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Job types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobKind {
    /// Submit a recorded order to the POS provider.
    PosSubmit { tenant_id: String, order_id: String },
    /// Generate a payment link for an order.
    PaymentLink { tenant_id: String, order_id: String },
    /// Post-call bookkeeping for a voice-transport event.
    PostCallSync {
        tenant_id: String,
        call_id: String,
        event: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub job_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub attempts: u32,
    #[serde(flatten)]
    pub kind: JobKind,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Queue
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct JobQueue {
    jobs_path: PathBuf,
    pending: Mutex<VecDeque<Job>>,
    notify: Notify,
    max_attempts: u32,
    retry_delay: Duration,
}

impl JobQueue {
    /// Load or create the queue at `state_path/jobs.json`.
    pub fn new(state_path: &Path, cfg: &JobsConfig) -> Result<Self> {
        std::fs::create_dir_all(state_path).map_err(Error::Io)?;

        let jobs_path = state_path.join("jobs.json");
        let pending: VecDeque<Job> = if jobs_path.exists() {
            let raw = std::fs::read_to_string(&jobs_path).map_err(Error::Io)?;
            serde_json::from_str(&raw).unwrap_or_default()
        } else {
            VecDeque::new()
        };

        tracing::info!(
            pending = pending.len(),
            path = %jobs_path.display(),
            "job queue loaded"
        );

        Ok(Self {
            jobs_path,
            pending: Mutex::new(pending),
            notify: Notify::new(),
            max_attempts: cfg.max_attempts,
            retry_delay: Duration::from_secs(cfg.retry_delay_secs),
        })
    }

    /// Append a job, persist, and wake the worker. Returns the job id.
    pub fn enqueue(&self, kind: JobKind) -> String {
        let job_id = format!("job_{}", uuid::Uuid::new_v4());
        let job = Job {
            job_id: job_id.clone(),
            created_at: Utc::now(),
            attempts: 0,
            kind,
        };
        self.pending.lock().push_back(job);
        if let Err(e) = self.persist() {
            tracing::error!(error = %e, "failed to persist job queue");
        }
        self.notify.notify_one();
        job_id
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Spawn the worker loop. Call once at startup.
    pub fn spawn_worker(self: &Arc<Self>) {
        let queue = self.clone();
        tokio::spawn(async move {
            queue.run_worker().await;
        });
    }

    async fn run_worker(self: Arc<Self>) {
        loop {
            let job = self.pending.lock().pop_front();
            let Some(mut job) = job else {
                // Register before re-checking so an enqueue landing in
                // between is not lost.
                let mut notified = pin!(self.notify.notified());
                notified.as_mut().enable();
                if self.pending.lock().is_empty() {
                    notified.await;
                }
                continue;
            };

            job.attempts += 1;
            match self.process(&job).await {
                Ok(()) => {
                    if let Err(e) = self.persist() {
                        tracing::error!(error = %e, "failed to persist job queue");
                    }
                }
                Err(e) if job.attempts >= self.max_attempts => {
                    tracing::error!(
                        job_id = %job.job_id,
                        attempts = job.attempts,
                        error = %e,
                        "job exhausted its attempts; dropping"
                    );
                    if let Err(e) = self.persist() {
                        tracing::error!(error = %e, "failed to persist job queue");
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        job_id = %job.job_id,
                        attempts = job.attempts,
                        error = %e,
                        "job failed; retrying"
                    );
                    self.pending.lock().push_back(job);
                    if let Err(e) = self.persist() {
                        tracing::error!(error = %e, "failed to persist job queue");
                    }
                    tokio::time::sleep(self.retry_delay).await;
                }
            }
        }
    }

    /// Execute one job. The POS/payment submission itself lives beyond
    /// this repository's boundary; here it is acknowledged and logged.
    async fn process(&self, job: &Job) -> Result<()> {
        match &job.kind {
            JobKind::PosSubmit {
                tenant_id,
                order_id,
            } => {
                tracing::info!(job_id = %job.job_id, %tenant_id, %order_id, "POS submission handled");
            }
            JobKind::PaymentLink {
                tenant_id,
                order_id,
            } => {
                tracing::info!(job_id = %job.job_id, %tenant_id, %order_id, "payment link handled");
            }
            JobKind::PostCallSync {
                tenant_id,
                call_id,
                event,
            } => {
                tracing::info!(
                    job_id = %job.job_id,
                    %tenant_id,
                    %call_id,
                    %event,
                    "post-call sync handled"
                );
            }
        }
        Ok(())
    }

    fn persist(&self) -> Result<()> {
        let snapshot: Vec<Job> = self.pending.lock().iter().cloned().collect();
        let raw = serde_json::to_string_pretty(&snapshot)?;
        std::fs::write(&self.jobs_path, raw).map_err(Error::Io)
    }
}
