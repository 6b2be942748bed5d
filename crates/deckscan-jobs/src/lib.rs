//! # deckscan-jobs
//!
//! The asynchronous execution substrate around the scan pipeline: job
//! lifecycle, content-addressed idempotency, bounded queueing with
//! backpressure, per-job deadlines, and TTL-bounded persistence.

mod manager;
mod store;

pub use manager::{fingerprint_hex, JobManager, SubmitOutcome};
pub use store::{JobStore, MemoryJobStore};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_stable_hex_sha256() {
        let fp = fingerprint_hex(b"deckscan");
        assert_eq!(fp.len(), 64);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(fp, fingerprint_hex(b"deckscan"));
        assert_ne!(fp, fingerprint_hex(b"deckscan!"));
    }
}
