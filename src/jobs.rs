//! Background job dispatch and result polling
//!
//! Each submitted image runs on its own worker thread so the caller returns
//! immediately with a job id. Results land in a [`JobStore`] the caller
//! provides, which keeps concurrent runs from sharing any process-wide state.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::thread::{self, JoinHandle};

use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;

use crate::engine::{run_with_cancel, CancelToken, RunConfig};
use crate::wire::RunResult;

/// Job lookup and reporting errors
#[derive(Debug, Error)]
pub enum JobError {
    #[error("unknown job: {0}")]
    UnknownJob(String),
    #[error("job {id} failed: {message}")]
    Failed { id: String, message: String },
    #[error("failed to serialize result: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("job store lock poisoned")]
    Poisoned,
}

/// State of a submitted job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Done(RunResult),
    Failed(String),
}

/// Storage for job results, shared between the dispatcher and its workers.
pub trait JobStore: Send + Sync {
    fn set(&self, id: &str, status: JobStatus) -> Result<(), JobError>;
    fn get(&self, id: &str) -> Result<Option<JobStatus>, JobError>;
}

/// In-process job store.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<String, JobStatus>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl JobStore for MemoryJobStore {
    fn set(&self, id: &str, status: JobStatus) -> Result<(), JobError> {
        let mut jobs = self.jobs.write().map_err(|_| JobError::Poisoned)?;
        jobs.insert(id.to_string(), status);
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<JobStatus>, JobError> {
        let jobs = self.jobs.read().map_err(|_| JobError::Poisoned)?;
        Ok(jobs.get(id).cloned())
    }
}

/// A running job.
#[derive(Debug)]
pub struct JobHandle {
    pub id: String,
    cancel: CancelToken,
    worker: JoinHandle<()>,
}

impl JobHandle {
    /// Ask the run to stop before its next pass.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Block until the worker has recorded its result.
    pub fn wait(self) {
        if self.worker.join().is_err() {
            error!("Worker for job {} panicked", self.id);
        }
    }
}

/// Dispatches engine runs onto background threads.
#[derive(Clone)]
pub struct JobRunner {
    store: Arc<dyn JobStore>,
}

impl JobRunner {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    /// Start processing `image_bytes` and return at once.
    pub fn submit(&self, image_bytes: Vec<u8>, config: RunConfig) -> Result<JobHandle, JobError> {
        let id = Uuid::new_v4().to_string();
        self.store.set(&id, JobStatus::Pending)?;

        let cancel = CancelToken::new();
        let store = Arc::clone(&self.store);
        let job_id = id.clone();
        let token = cancel.clone();
        let worker = thread::spawn(move || {
            let status = match run_with_cancel(&image_bytes, &config, Some(token)) {
                Ok(result) => JobStatus::Done(result),
                Err(e) => JobStatus::Failed(e.to_string()),
            };
            if let JobStatus::Failed(message) = &status {
                error!("Job {} failed: {}", job_id, message);
            } else {
                info!("Job {} finished", job_id);
            }
            if let Err(e) = store.set(&job_id, status) {
                error!("Could not record result of job {}: {}", job_id, e);
            }
        });

        info!("Submitted job {}", id);
        Ok(JobHandle { id, cancel, worker })
    }

    /// The job's result in wire format, or `None` while it is still running.
    pub fn poll(&self, id: &str) -> Result<Option<String>, JobError> {
        match self.store.get(id)? {
            None => Err(JobError::UnknownJob(id.to_string())),
            Some(JobStatus::Pending) => Ok(None),
            Some(JobStatus::Done(result)) => Ok(Some(result.to_wire_json()?)),
            Some(JobStatus::Failed(message)) => Err(JobError::Failed { id: id.to_string(), message }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputNaming;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;
    use std::path::Path;
    use tempfile::tempdir;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = RgbaImage::from_fn(width, height, |x, y| Rgba([x as u8, y as u8, 0, 255]));
        let mut bytes = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(image).write_to(&mut bytes, ImageFormat::Png).unwrap();
        bytes.into_inner()
    }

    fn config(dir: &Path, name: &str) -> RunConfig {
        let mut config = RunConfig::new(OutputNaming::for_input(Path::new(name), Some(dir)));
        config.auto = true;
        config.rng_seed = Some(1);
        config
    }

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryJobStore::new();
        assert_eq!(store.get("a").unwrap(), None);
        store.set("a", JobStatus::Pending).unwrap();
        assert_eq!(store.get("a").unwrap(), Some(JobStatus::Pending));
    }

    #[test]
    fn test_poll_unknown_job() {
        let runner = JobRunner::new(Arc::new(MemoryJobStore::new()));
        assert!(matches!(runner.poll("nope"), Err(JobError::UnknownJob(_))));
    }

    #[test]
    fn test_submit_and_poll() {
        let dir = tempdir().unwrap();
        let runner = JobRunner::new(Arc::new(MemoryJobStore::new()));
        let handle = runner.submit(png_bytes(16, 16), config(dir.path(), "job.png")).unwrap();
        let id = handle.id.clone();
        handle.wait();

        let json = runner.poll(&id).unwrap().unwrap();
        assert_eq!(json, r#"{"gif": "job.gif", "frames": []}"#);
        assert!(dir.path().join("job.gif").exists());
    }

    #[test]
    fn test_concurrent_jobs_are_independent() {
        let dir = tempdir().unwrap();
        let runner = JobRunner::new(Arc::new(MemoryJobStore::new()));
        let a = runner.submit(png_bytes(16, 16), config(dir.path(), "a.png")).unwrap();
        let b = runner.submit(png_bytes(8, 8), config(dir.path(), "b.png")).unwrap();
        assert_ne!(a.id, b.id);
        let (id_a, id_b) = (a.id.clone(), b.id.clone());
        a.wait();
        b.wait();

        assert!(runner.poll(&id_a).unwrap().unwrap().contains("a.gif"));
        assert!(runner.poll(&id_b).unwrap().unwrap().contains("b.gif"));
    }

    #[test]
    fn test_failed_job_reports_error() {
        let dir = tempdir().unwrap();
        let runner = JobRunner::new(Arc::new(MemoryJobStore::new()));
        let handle = runner.submit(b"garbage".to_vec(), config(dir.path(), "bad.png")).unwrap();
        let id = handle.id.clone();
        handle.wait();
        assert!(matches!(runner.poll(&id), Err(JobError::Failed { .. })));
    }
}
