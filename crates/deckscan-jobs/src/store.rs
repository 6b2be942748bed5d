//! Job storage contract and the bundled in-memory implementation.
//!
//! The store holds two keyspaces: job records (single writer, the owning
//! worker) and the fingerprint index (shared; writes go through
//! compare-and-set so racing submitters of identical bytes converge on one
//! execution).

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

use deckscan_core::types::Job;
use deckscan_core::{Result, ScanError};

/// Key-value store with TTL and compare-and-set, scoped to job execution.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Fetch a job snapshot; `None` when absent or expired.
    async fn get_job(&self, job_id: &str) -> Result<Option<Job>>;

    /// Write a job record. `ttl: None` means no expiry (in-flight jobs).
    async fn put_job(&self, job: &Job, ttl: Option<Duration>) -> Result<()>;

    /// Delete a job record.
    async fn remove_job(&self, job_id: &str) -> Result<()>;

    /// Current job id for a fingerprint; `None` when absent or expired.
    async fn lookup_fingerprint(&self, fingerprint: &str) -> Result<Option<String>>;

    /// Insert `fingerprint -> job_id` iff the key is absent. Returns
    /// whether the insert won.
    async fn insert_fingerprint(
        &self,
        fingerprint: &str,
        job_id: &str,
        ttl: Duration,
    ) -> Result<bool>;

    /// Swap the mapping iff it still points at `expected_job_id`
    /// (tombstone replacement). Returns whether the swap won.
    async fn replace_fingerprint(
        &self,
        fingerprint: &str,
        expected_job_id: &str,
        job_id: &str,
        ttl: Duration,
    ) -> Result<bool>;

    /// Drop the mapping, releasing the fingerprint for resubmission.
    async fn remove_fingerprint(&self, fingerprint: &str) -> Result<()>;

    /// Evict expired entries eagerly. Reads already apply lazy expiry;
    /// the sweep keeps memory bounded between reads.
    async fn sweep_expired(&self) -> Result<()>;
}

struct Entry<T> {
    value: T,
    expires_at: Option<Instant>,
}

impl<T> Entry<T> {
    fn live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// In-process [`JobStore`] over tokio `RwLock`ed maps.
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<String, Entry<Job>>>,
    fingerprints: RwLock<HashMap<String, Entry<String>>>,
}

impl MemoryJobStore {
    /// Fresh empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn get_job(&self, job_id: &str) -> Result<Option<Job>> {
        let now = Instant::now();
        let jobs = self.jobs.read().await;
        Ok(jobs
            .get(job_id)
            .filter(|e| e.live(now))
            .map(|e| e.value.clone()))
    }

    async fn put_job(&self, job: &Job, ttl: Option<Duration>) -> Result<()> {
        let mut jobs = self.jobs.write().await;
        let stale = jobs.get(&job.id).is_some_and(|e| {
            e.live(Instant::now()) && e.value.revision > job.revision
        });
        if stale {
            return Err(ScanError::Store(format!(
                "stale write to job {} rejected",
                job.id
            )));
        }
        jobs.insert(
            job.id.clone(),
            Entry {
                value: job.clone(),
                expires_at: ttl.map(|t| Instant::now() + t),
            },
        );
        Ok(())
    }

    async fn remove_job(&self, job_id: &str) -> Result<()> {
        self.jobs.write().await.remove(job_id);
        Ok(())
    }

    async fn lookup_fingerprint(&self, fingerprint: &str) -> Result<Option<String>> {
        let now = Instant::now();
        let fingerprints = self.fingerprints.read().await;
        Ok(fingerprints
            .get(fingerprint)
            .filter(|e| e.live(now))
            .map(|e| e.value.clone()))
    }

    async fn insert_fingerprint(
        &self,
        fingerprint: &str,
        job_id: &str,
        ttl: Duration,
    ) -> Result<bool> {
        let now = Instant::now();
        let mut fingerprints = self.fingerprints.write().await;
        if fingerprints.get(fingerprint).is_some_and(|e| e.live(now)) {
            return Ok(false);
        }
        fingerprints.insert(
            fingerprint.to_string(),
            Entry {
                value: job_id.to_string(),
                expires_at: Some(now + ttl),
            },
        );
        Ok(true)
    }

    async fn replace_fingerprint(
        &self,
        fingerprint: &str,
        expected_job_id: &str,
        job_id: &str,
        ttl: Duration,
    ) -> Result<bool> {
        let now = Instant::now();
        let mut fingerprints = self.fingerprints.write().await;
        let current = fingerprints.get(fingerprint).filter(|e| e.live(now));
        if current.map(|e| e.value.as_str()) != Some(expected_job_id) {
            return Ok(false);
        }
        fingerprints.insert(
            fingerprint.to_string(),
            Entry {
                value: job_id.to_string(),
                expires_at: Some(now + ttl),
            },
        );
        Ok(true)
    }

    async fn remove_fingerprint(&self, fingerprint: &str) -> Result<()> {
        self.fingerprints.write().await.remove(fingerprint);
        Ok(())
    }

    async fn sweep_expired(&self) -> Result<()> {
        let now = Instant::now();
        self.jobs.write().await.retain(|_, e| e.live(now));
        self.fingerprints.write().await.retain(|_, e| e.live(now));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(id: &str) -> Job {
        Job::queued(id.to_string(), format!("fp-{id}"))
    }

    #[tokio::test]
    async fn job_round_trip() {
        let store = MemoryJobStore::new();
        store.put_job(&job("a"), None).await.unwrap();
        assert!(store.get_job("a").await.unwrap().is_some());
        store.remove_job("a").await.unwrap();
        assert!(store.get_job("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn stale_writes_are_rejected() {
        let store = MemoryJobStore::new();
        let mut fresh = job("a");
        fresh.start();
        store.put_job(&fresh, None).await.unwrap();
        let stale = job("a");
        assert!(store.put_job(&stale, None).await.is_err());
    }

    #[tokio::test]
    async fn fingerprint_cas_admits_one_winner() {
        let store = MemoryJobStore::new();
        let ttl = Duration::from_secs(60);
        assert!(store.insert_fingerprint("fp", "job-1", ttl).await.unwrap());
        assert!(!store.insert_fingerprint("fp", "job-2", ttl).await.unwrap());
        assert_eq!(
            store.lookup_fingerprint("fp").await.unwrap().as_deref(),
            Some("job-1")
        );
    }

    #[tokio::test]
    async fn replace_requires_expected_value() {
        let store = MemoryJobStore::new();
        let ttl = Duration::from_secs(60);
        store.insert_fingerprint("fp", "old", ttl).await.unwrap();
        assert!(!store
            .replace_fingerprint("fp", "wrong", "new", ttl)
            .await
            .unwrap());
        assert!(store
            .replace_fingerprint("fp", "old", "new", ttl)
            .await
            .unwrap());
        assert_eq!(
            store.lookup_fingerprint("fp").await.unwrap().as_deref(),
            Some("new")
        );
    }

    #[tokio::test]
    async fn ttl_expires_entries() {
        let store = MemoryJobStore::new();
        store
            .insert_fingerprint("fp", "job-1", Duration::from_millis(10))
            .await
            .unwrap();
        store
            .put_job(&job("a"), Some(Duration::from_millis(10)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(25)).await;
        assert!(store.lookup_fingerprint("fp").await.unwrap().is_none());
        assert!(store.get_job("a").await.unwrap().is_none());
        // Expired key is free for a new insert.
        assert!(store
            .insert_fingerprint("fp", "job-2", Duration::from_secs(60))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn sweep_drops_expired_entries() {
        let store = MemoryJobStore::new();
        store
            .put_job(&job("a"), Some(Duration::from_millis(5)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(15)).await;
        store.sweep_expired().await.unwrap();
        assert!(store.jobs.read().await.is_empty());
    }
}
