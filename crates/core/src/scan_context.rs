//! Per-scan cancellation and inactivity tracking.
//!
//! Adapted from a process-global cancellation-version counter pattern down
//! to one flag per scan, since cancellation here is always scoped to a
//! single `scan_id` rather than the whole process.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Outcome of a cooperative checkpoint call inside the traversal driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointResult {
    Ok,
    Cancelled,
}

/// Shared state one running scan carries through the traversal driver and
/// matchers. Cheap to clone (an `Arc` inside) and `Sync`, so a `&ScanContext`
/// can be read from `rayon` worker threads when `workers_per_scan > 1`.
#[derive(Clone)]
pub struct ScanContext {
    pub scan_id: String,
    cancelled: Arc<AtomicBool>,
    last_activity: Arc<Mutex<Instant>>,
    inactive_threshold: Duration,
}

impl ScanContext {
    pub fn new(scan_id: String, inactive_threshold: Duration) -> Self {
        ScanContext {
            scan_id,
            cancelled: Arc::new(AtomicBool::new(false)),
            last_activity: Arc::new(Mutex::new(Instant::now())),
            inactive_threshold,
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Called before processing each directory or file. Records activity and
    /// reports whether the caller should keep going.
    pub async fn checkpoint(&self, _reason: &str) -> CheckpointResult {
        if self.is_cancelled() {
            return CheckpointResult::Cancelled;
        }
        *self.last_activity.lock().await = Instant::now();
        CheckpointResult::Ok
    }

    /// `true` once no checkpoint has landed for longer than the configured
    /// inactivity threshold. The coordinator polls this to self-abort a scan
    /// whose worker has stalled or died without reporting back.
    pub async fn is_inactive(&self) -> bool {
        self.last_activity.lock().await.elapsed() >= self.inactive_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn checkpoint_reports_ok_until_cancelled() {
        let ctx = ScanContext::new("s1".into(), Duration::from_secs(600));
        assert_eq!(ctx.checkpoint("dir").await, CheckpointResult::Ok);
        ctx.cancel();
        assert_eq!(ctx.checkpoint("dir").await, CheckpointResult::Cancelled);
    }

    #[tokio::test]
    async fn inactive_after_threshold_elapses() {
        let ctx = ScanContext::new("s1".into(), Duration::from_millis(10));
        assert!(!ctx.is_inactive().await);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(ctx.is_inactive().await);
    }

    #[tokio::test]
    async fn checkpoint_resets_inactivity() {
        let ctx = ScanContext::new("s1".into(), Duration::from_millis(30));
        tokio::time::sleep(Duration::from_millis(20)).await;
        ctx.checkpoint("dir").await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!ctx.is_inactive().await);
    }
}
