//! The job manager: submission, idempotency, workers, deadlines.
//!
//! `submit` hashes the sanitised image and converges duplicate submissions
//! onto one execution through the fingerprint index's compare-and-set.
//! Workers consume a bounded queue; queue overflow surfaces as
//! `RATE_LIMIT` instead of unbounded buffering. Each job runs under a
//! wall-clock deadline; on expiry the job fails with `TIMEOUT` and its
//! fingerprint is released so a resubmission can retry.

use std::sync::Arc;
use std::time::Duration;

use image::DynamicImage;
use sha2::{Digest, Sha256};
use tokio::sync::{mpsc, watch, Mutex};
use uuid::Uuid;

use deckscan_core::types::{Job, JobState};
use deckscan_core::{ErrorCode, ExportFormat, Result, ScanConfig, ScanError};
use deckscan_pipeline::ScanPipeline;
use deckscan_preprocess::sanitize;

use crate::store::JobStore;

/// Interval of the background TTL sweep.
const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Outcome of a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOutcome {
    /// Job to poll.
    pub job_id: String,
    /// True when an existing (in-flight or completed) job was returned
    /// instead of new work being enqueued.
    pub cached: bool,
}

struct WorkItem {
    job_id: String,
    decoded: DynamicImage,
}

/// Accepts submissions and drives jobs to a terminal state.
pub struct JobManager {
    config: Arc<ScanConfig>,
    store: Arc<dyn JobStore>,
    queue: mpsc::Sender<WorkItem>,
}

impl JobManager {
    /// Start the manager: spawns the configured number of workers and the
    /// TTL sweeper.
    #[must_use]
    pub fn start(
        config: ScanConfig,
        pipeline: Arc<ScanPipeline>,
        store: Arc<dyn JobStore>,
    ) -> Arc<Self> {
        let config = Arc::new(config);
        let (tx, rx) = mpsc::channel::<WorkItem>(config.max_queue_depth.max(1));
        let rx = Arc::new(Mutex::new(rx));

        for worker_id in 0..config.workers.max(1) {
            tokio::spawn(worker_loop(
                worker_id,
                Arc::clone(&rx),
                Arc::clone(&pipeline),
                Arc::clone(&store),
                Arc::clone(&config),
            ));
        }

        let sweeper_store = Arc::clone(&store);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
            loop {
                ticker.tick().await;
                if let Err(err) = sweeper_store.sweep_expired().await {
                    log::warn!("TTL sweep failed: {err}");
                }
            }
        });

        Arc::new(Self {
            config,
            store,
            queue: tx,
        })
    }

    /// Submit image bytes for scanning.
    ///
    /// # Errors
    ///
    /// `BAD_IMAGE` for boundary rejections, `RATE_LIMIT` when the queue is
    /// full, store faults otherwise.
    pub async fn submit(&self, image_bytes: &[u8]) -> Result<SubmitOutcome> {
        let (sanitized, decoded) = sanitize(image_bytes, &self.config)?;
        let fingerprint = fingerprint_hex(&sanitized.png);
        let fingerprint_ttl = Duration::from_secs(self.config.fingerprint_ttl_s);

        // Two passes cover the race where the winner of the first CAS is
        // evicted between our lookup and our insert.
        for _ in 0..2 {
            match self.store.lookup_fingerprint(&fingerprint).await? {
                Some(existing_id) => {
                    if let Some(job) = self.store.get_job(&existing_id).await? {
                        log::debug!(
                            "fingerprint {} already mapped to {} ({:?})",
                            &fingerprint[..8],
                            existing_id,
                            job.state
                        );
                        return Ok(SubmitOutcome {
                            job_id: existing_id,
                            cached: true,
                        });
                    }
                    // Tombstone: the result was evicted. Recompute under a
                    // fresh job id, guarded by CAS against other recomputers.
                    let job = Job::queued(Uuid::new_v4().to_string(), fingerprint.clone());
                    self.store.put_job(&job, None).await?;
                    if self
                        .store
                        .replace_fingerprint(&fingerprint, &existing_id, &job.id, fingerprint_ttl)
                        .await?
                    {
                        return self.enqueue(job, decoded).await;
                    }
                    self.store.remove_job(&job.id).await?;
                }
                None => {
                    let job = Job::queued(Uuid::new_v4().to_string(), fingerprint.clone());
                    self.store.put_job(&job, None).await?;
                    if self
                        .store
                        .insert_fingerprint(&fingerprint, &job.id, fingerprint_ttl)
                        .await?
                    {
                        return self.enqueue(job, decoded).await;
                    }
                    // Lost the race; surface the winner on the next pass.
                    self.store.remove_job(&job.id).await?;
                }
            }
        }
        Err(ScanError::Store(
            "fingerprint index churned during submit".to_string(),
        ))
    }

    async fn enqueue(&self, job: Job, decoded: DynamicImage) -> Result<SubmitOutcome> {
        let job_id = job.id.clone();
        let item = WorkItem {
            job_id: job_id.clone(),
            decoded,
        };
        match self.queue.try_send(item) {
            Ok(()) => Ok(SubmitOutcome {
                job_id,
                cached: false,
            }),
            Err(_) => {
                log::warn!("job queue full; refusing submission");
                self.store.remove_fingerprint(&job.fingerprint).await?;
                self.store.remove_job(&job_id).await?;
                Err(ScanError::RateLimit("job queue is full".to_string()))
            }
        }
    }

    /// Snapshot a job for status polling.
    ///
    /// # Errors
    ///
    /// Store faults only; an unknown id yields `Ok(None)`.
    pub async fn status(&self, job_id: &str) -> Result<Option<Job>> {
        self.store.get_job(job_id).await
    }

    /// Export a completed job's deck.
    ///
    /// # Errors
    ///
    /// `EXPORT_INVALID` when the job is unknown or not completed; exporter
    /// errors pass through.
    pub async fn export(&self, job_id: &str, format: ExportFormat) -> Result<String> {
        let job = self
            .store
            .get_job(job_id)
            .await?
            .ok_or_else(|| ScanError::ExportInvalid(format!("unknown job {job_id}")))?;
        let report = match (&job.state, &job.result) {
            (JobState::Completed, Some(report)) => report,
            _ => {
                return Err(ScanError::ExportInvalid(format!(
                    "job {job_id} is not completed"
                )))
            }
        };
        deckscan_core::export_deck(&report.deck, format)
    }
}

/// SHA-256 of the sanitised bytes, hex-encoded. The idempotency key.
#[must_use]
pub fn fingerprint_hex(sanitized_png: &[u8]) -> String {
    let digest = Sha256::digest(sanitized_png);
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

async fn worker_loop(
    worker_id: usize,
    rx: Arc<Mutex<mpsc::Receiver<WorkItem>>>,
    pipeline: Arc<ScanPipeline>,
    store: Arc<dyn JobStore>,
    config: Arc<ScanConfig>,
) {
    loop {
        let item = {
            let mut rx = rx.lock().await;
            rx.recv().await
        };
        let Some(item) = item else {
            log::debug!("worker {worker_id} shutting down: queue closed");
            return;
        };
        run_job(&pipeline, &store, &config, item).await;
    }
}

/// Drive one job from `queued` to a terminal state.
async fn run_job(
    pipeline: &ScanPipeline,
    store: &Arc<dyn JobStore>,
    config: &ScanConfig,
    item: WorkItem,
) {
    let job_id = item.job_id;
    let Ok(Some(mut job)) = store.get_job(&job_id).await else {
        log::warn!("job {job_id} vanished before processing");
        return;
    };
    job.start();
    if store.put_job(&job, None).await.is_err() {
        return;
    }

    // Progress flows through a watch channel so the blocking pipeline can
    // report without awaiting the store.
    let (progress_tx, mut progress_rx) = watch::channel(0u8);
    let updater = {
        let store_jobs = Arc::clone(store);
        let id = job_id.clone();
        tokio::spawn(async move {
            while progress_rx.changed().await.is_ok() {
                let progress = *progress_rx.borrow();
                if let Ok(Some(mut job)) = store_jobs.get_job(&id).await {
                    if job.state == JobState::Processing {
                        job.advance_progress(progress);
                        let _ = store_jobs.put_job(&job, None).await;
                    }
                }
            }
        })
    };

    let deadline = Duration::from_secs(config.job_deadline_s);
    let report_progress = move |p: u8| {
        let _ = progress_tx.send(p);
    };
    let scan = pipeline.scan_image(&item.decoded, &job_id, &report_progress);
    let result = tokio::time::timeout(deadline, scan).await;

    // Stop the updater before the terminal write so the two writers never
    // interleave on the job record.
    updater.abort();
    let _ = updater.await;

    let Ok(Some(mut job)) = store.get_job(&job_id).await else {
        return;
    };
    let job_ttl = Some(Duration::from_secs(config.job_ttl_s));

    match result {
        Ok(Ok(report)) => {
            job.complete(report);
            if let Err(err) = store.put_job(&job, job_ttl).await {
                log::error!("failed to persist completed job {job_id}: {err}");
            }
            log::info!("job {job_id} completed");
        }
        Ok(Err(err)) => {
            log::warn!("job {job_id} failed: {err}");
            job.fail(err.code(), err.to_string());
            let _ = store.put_job(&job, job_ttl).await;
            // Release the fingerprint so a resubmission can retry.
            let _ = store.remove_fingerprint(&job.fingerprint).await;
        }
        Err(_) => {
            log::warn!("job {job_id} exceeded {}s deadline", config.job_deadline_s);
            job.fail(
                ErrorCode::Timeout,
                format!("job exceeded deadline of {}s", config.job_deadline_s),
            );
            let _ = store.put_job(&job, job_ttl).await;
            let _ = store.remove_fingerprint(&job.fingerprint).await;
        }
    }
}
