//! Job monitor: admission ceiling, active-job registry and consumer lifecycle

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::types::{JobHandle, JobId, StatusReport, StatusSnapshot};

/// Capacity held by one job from admission until its cleanup finishes
#[derive(Debug)]
pub struct AdmissionSlot {
    _permit: OwnedSemaphorePermit,
    active: Arc<AtomicUsize>,
}

impl Drop for AdmissionSlot {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

enum Lifecycle {
    Stopped,
    Running {
        stop: CancellationToken,
        consumer: JoinHandle<()>,
    },
}

/// Owns the ceiling, the registry of active jobs and the consumer task
pub struct JobMonitor {
    ceiling: usize,
    permits: Arc<Semaphore>,
    active: Arc<AtomicUsize>,
    next_id: AtomicU64,
    jobs: Mutex<HashMap<JobId, Arc<JobHandle>>>,
    lifecycle: tokio::sync::Mutex<Lifecycle>,
}

impl JobMonitor {
    pub fn new(ceiling: usize) -> Self {
        let ceiling = ceiling.max(1);
        Self {
            ceiling,
            permits: Arc::new(Semaphore::new(ceiling)),
            active: Arc::new(AtomicUsize::new(0)),
            next_id: AtomicU64::new(1),
            jobs: Mutex::new(HashMap::new()),
            lifecycle: tokio::sync::Mutex::new(Lifecycle::Stopped),
        }
    }

    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// Jobs admitted and not yet cleaned up
    pub fn active_count(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn next_job_id(&self) -> JobId {
        JobId(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Wait until a job may be admitted
    pub async fn acquire_slot(&self) -> Result<AdmissionSlot> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| Error::InvalidState("admission is closed".to_string()))?;
        self.active.fetch_add(1, Ordering::SeqCst);
        Ok(AdmissionSlot {
            _permit: permit,
            active: self.active.clone(),
        })
    }

    pub fn add_job(&self, job: Arc<JobHandle>) {
        let mut jobs = self.jobs.lock();
        jobs.insert(job.id(), job);
    }

    /// Deregister a job; returns None if it was not registered
    pub fn remove_job(&self, id: JobId) -> Option<Arc<JobHandle>> {
        let mut jobs = self.jobs.lock();
        jobs.remove(&id)
    }

    pub fn get_job(&self, id: JobId) -> Option<Arc<JobHandle>> {
        self.jobs.lock().get(&id).cloned()
    }

    /// Snapshots of every registered job, ordered by id
    pub fn snapshots(&self) -> Vec<StatusSnapshot> {
        let jobs: Vec<Arc<JobHandle>> = self.jobs.lock().values().cloned().collect();
        let mut rows: Vec<StatusSnapshot> = jobs.iter().map(|job| job.snapshot()).collect();
        rows.sort_by_key(|row| row.job_id);
        rows
    }

    pub fn render_status_report(&self) -> StatusReport {
        StatusReport {
            generated_at: Utc::now(),
            ceiling: self.ceiling,
            active: self.active_count(),
            rows: self.snapshots(),
        }
    }

    /// Mark a job ABORTED and cancel its token
    pub fn abort_job(&self, id: JobId) -> Result<()> {
        let job = self.get_job(id).ok_or(Error::JobNotFound(id.0))?;
        if !job.abort() {
            return Err(Error::InvalidState(format!(
                "job {} already finished as {}",
                id,
                job.status()
            )));
        }
        tracing::info!("Job {} abort requested", id);
        Ok(())
    }

    /// Non-terminal jobs past their declared max run time
    pub fn overdue_jobs(&self) -> Vec<Arc<JobHandle>> {
        let jobs: Vec<Arc<JobHandle>> = self.jobs.lock().values().cloned().collect();
        jobs.into_iter()
            .filter(|job| !job.status().is_terminal() && job.is_overdue())
            .collect()
    }

    /// Start the consumer task; `consumer` receives the stop token
    pub async fn start<F, Fut>(&self, consumer: F) -> Result<()>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut lifecycle = self.lifecycle.lock().await;
        if matches!(*lifecycle, Lifecycle::Running { .. }) {
            return Err(Error::InvalidState("monitor is already running".to_string()));
        }
        let stop = CancellationToken::new();
        let consumer = tokio::spawn(consumer(stop.clone()));
        *lifecycle = Lifecycle::Running { stop, consumer };
        tracing::info!("Job monitor started (ceiling {})", self.ceiling);
        Ok(())
    }

    /// Signal the consumer to stop and wait for it; running jobs continue
    pub async fn stop(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock().await;
        match std::mem::replace(&mut *lifecycle, Lifecycle::Stopped) {
            Lifecycle::Stopped => Err(Error::InvalidState("monitor is not running".to_string())),
            Lifecycle::Running { stop, consumer } => {
                stop.cancel();
                if let Err(e) = consumer.await {
                    tracing::error!("Consumer task ended abnormally: {}", e);
                }
                tracing::info!("Job monitor stopped; {} job(s) still active", self.active_count());
                Ok(())
            }
        }
    }

    pub async fn is_running(&self) -> bool {
        matches!(*self.lifecycle.lock().await, Lifecycle::Running { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::JobStatus;
    use std::time::Duration;

    #[test]
    fn test_job_ids_are_monotonic() {
        let monitor = JobMonitor::new(2);
        let a = monitor.next_job_id();
        let b = monitor.next_job_id();
        assert!(b > a);
    }

    #[tokio::test]
    async fn test_ceiling_admits_n_then_waits() {
        let monitor = JobMonitor::new(2);
        let first = monitor.acquire_slot().await.unwrap();
        let _second = monitor.acquire_slot().await.unwrap();
        assert_eq!(monitor.active_count(), 2);

        let blocked = tokio::time::timeout(Duration::from_millis(50), monitor.acquire_slot()).await;
        assert!(blocked.is_err());

        drop(first);
        assert_eq!(monitor.active_count(), 1);
        let third = tokio::time::timeout(Duration::from_millis(500), monitor.acquire_slot()).await;
        assert!(third.is_ok());
        assert_eq!(monitor.active_count(), 2);
    }

    #[test]
    fn test_abort_job() {
        let monitor = JobMonitor::new(1);
        let job = Arc::new(JobHandle::new(JobId(5), Duration::from_secs(60)));
        monitor.add_job(job.clone());

        monitor.abort_job(JobId(5)).unwrap();
        assert_eq!(job.status(), JobStatus::Aborted);
        assert!(matches!(monitor.abort_job(JobId(5)), Err(Error::InvalidState(_))));
        assert!(matches!(monitor.abort_job(JobId(99)), Err(Error::JobNotFound(99))));
    }

    #[test]
    fn test_remove_job_exactly_once() {
        let monitor = JobMonitor::new(1);
        monitor.add_job(Arc::new(JobHandle::new(JobId(1), Duration::from_secs(60))));
        assert!(monitor.remove_job(JobId(1)).is_some());
        assert!(monitor.remove_job(JobId(1)).is_none());
    }

    #[test]
    fn test_status_report_lists_jobs_in_id_order() {
        let monitor = JobMonitor::new(3);
        for id in [3, 1, 2] {
            monitor.add_job(Arc::new(JobHandle::new(JobId(id), Duration::from_secs(60))));
        }
        let report = monitor.render_status_report();
        let ids: Vec<u64> = report.rows.iter().map(|r| r.job_id.0).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(report.ceiling, 3);
    }

    #[test]
    fn test_overdue_jobs_skip_terminal() {
        let monitor = JobMonitor::new(2);
        let late = Arc::new(JobHandle::new(JobId(1), Duration::from_millis(1)));
        let done = Arc::new(JobHandle::new(JobId(2), Duration::from_millis(1)));
        done.finish(JobStatus::Failed);
        monitor.add_job(late);
        monitor.add_job(done);
        std::thread::sleep(Duration::from_millis(5));

        let overdue = monitor.overdue_jobs();
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].id(), JobId(1));
    }

    #[tokio::test]
    async fn test_start_stop_lifecycle() {
        let monitor = JobMonitor::new(1);
        assert!(matches!(monitor.stop().await, Err(Error::InvalidState(_))));

        monitor
            .start(|stop| async move { stop.cancelled().await })
            .await
            .unwrap();
        assert!(monitor.is_running().await);
        assert!(monitor.start(|_| async {}).await.is_err());

        monitor.stop().await.unwrap();
        assert!(!monitor.is_running().await);
    }
}
