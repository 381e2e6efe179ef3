//! Engine assembly and polling helpers

use std::sync::Arc;
use std::time::Duration;

use rampart_adapters::{AdapterRegistry, ToolAdapter};
use rampart_core::domain::{Scan, ScanId, ScanRepository};
use rampart_core::infrastructure::InMemoryScanRepository;
use rampart_orchestrator::{
    InMemoryJobStore, JobId, JobQueue, JobQueueSettings, JobStatusView, JobStore,
    JobWorkerContext, ScanExecutor, ScanJobService, ScanWorkflow, spawn_job_worker_pool,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Queue settings with a short backoff so retries finish quickly
pub fn fast_settings() -> JobQueueSettings {
    JobQueueSettings {
        backoff_base: Duration::from_millis(10),
        ..JobQueueSettings::default()
    }
}

/// In-memory engine wired the same way as the binary
pub struct Harness {
    pub repository: Arc<dyn ScanRepository>,
    pub store: Arc<dyn JobStore>,
    pub queue: Arc<JobQueue>,
    pub workflow: ScanWorkflow,
    pub executor: Arc<ScanExecutor>,
    pub service: ScanJobService,
}

impl Harness {
    pub fn new(adapters: Vec<Arc<dyn ToolAdapter>>, settings: JobQueueSettings) -> Self {
        Self::with_store(adapters, settings, Arc::new(InMemoryJobStore::new()))
    }

    pub fn with_store(
        adapters: Vec<Arc<dyn ToolAdapter>>,
        settings: JobQueueSettings,
        store: Arc<dyn JobStore>,
    ) -> Self {
        let repository: Arc<dyn ScanRepository> = Arc::new(InMemoryScanRepository::new());
        let queue = Arc::new(JobQueue::new(store.clone(), settings));

        let mut registry = AdapterRegistry::new();
        for adapter in adapters {
            registry.register(adapter);
        }

        let workflow = ScanWorkflow::new(repository.clone());
        let executor = Arc::new(ScanExecutor::new(
            Arc::new(registry),
            repository.clone(),
            workflow.clone(),
            4,
        ));
        let service = ScanJobService::new(repository.clone(), queue.clone(), workflow.clone());

        Self {
            repository,
            store,
            queue,
            workflow,
            executor,
            service,
        }
    }

    /// Start a worker pool; cancel the token and await the handle to stop it.
    pub fn spawn_workers(&self, concurrency: usize) -> (CancellationToken, JoinHandle<()>) {
        let shutdown = CancellationToken::new();
        let context = JobWorkerContext {
            queue: self.queue.clone(),
            executor: self.executor.clone(),
            workflow: self.workflow.clone(),
        };
        let handle = spawn_job_worker_pool(context, concurrency, shutdown.clone());
        (shutdown, handle)
    }

    /// Poll until the scan is terminal or `timeout` passes.
    pub async fn wait_for_terminal(&self, id: ScanId, timeout: Duration) -> Scan {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let scan = self
                .repository
                .find_scan(id)
                .await
                .expect("repository read")
                .expect("scan exists");
            if scan.is_terminal() {
                return scan;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "scan {} still {} after {:?}",
                id,
                scan.status,
                timeout
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Poll until the job is completed or failed.
    pub async fn wait_for_job(&self, id: JobId, timeout: Duration) -> JobStatusView {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let status = self.queue.get_status(id).await.expect("job retained");
            if status.state.is_terminal() {
                return status;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "job {} still {} after {:?}",
                id,
                status.state,
                timeout
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}
