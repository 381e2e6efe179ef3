//! Engine setup and wiring

use std::sync::Arc;
use std::time::Duration;

use rampart_adapters::AdapterRegistry;
use rampart_core::Config;
use rampart_core::domain::ScanRepository;
use rampart_core::infrastructure::{Database, DatabaseError, SqlxScanRepository};
use rampart_orchestrator::{
    JobQueue, JobQueueError, JobStore, JobWorkerContext, ReconciliationSweep, ScanExecutor,
    ScanJobService, ScanWorkflow, SqlxJobStore, spawn_job_worker_pool,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::workers::spawn_reconciliation_worker;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Database setup failed: {0}")]
    Database(#[from] DatabaseError),

    #[error("Job recovery failed: {0}")]
    Queue(#[from] JobQueueError),
}

/// Fully wired engine. Nothing runs until [`Engine::start`] is called.
pub struct Engine {
    config: Config,
    repository: Arc<dyn ScanRepository>,
    queue: Arc<JobQueue>,
    registry: Arc<AdapterRegistry>,
    workflow: ScanWorkflow,
    executor: Arc<ScanExecutor>,
    service: ScanJobService,
    shutdown_token: CancellationToken,
}

/// Background tasks started by [`Engine::start`]
pub struct EngineHandle {
    workers: JoinHandle<()>,
    reconciliation: Option<JoinHandle<()>>,
}

impl EngineHandle {
    /// Wait for the worker pool to drain, up to `timeout`. Returns `false`
    /// when jobs were still running at the deadline.
    pub async fn join(self, timeout: Duration) -> bool {
        let drained = match tokio::time::timeout(timeout, self.workers).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                tracing::error!("Job worker pool task failed: {}", e);
                true
            }
            Err(_) => {
                tracing::warn!("Shutdown timeout reached with jobs still in flight");
                false
            }
        };

        if let Some(reconciliation) = self.reconciliation
            && let Err(e) = reconciliation.await
        {
            tracing::error!("Reconciliation worker task failed: {}", e);
        }

        drained
    }
}

impl Engine {
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Submission and status interface
    pub fn service(&self) -> &ScanJobService {
        &self.service
    }

    pub fn queue(&self) -> &Arc<JobQueue> {
        &self.queue
    }

    pub fn repository(&self) -> &Arc<dyn ScanRepository> {
        &self.repository
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Re-queue jobs interrupted by the previous run, then start the worker
    /// pool and the reconciliation sweep.
    pub async fn start(&self) -> Result<EngineHandle, EngineError> {
        self.queue.recover().await?;

        let missing = self.registry.probe_availability();
        if !missing.is_empty() {
            tracing::warn!(
                fallback_mode = %self.config.adapters.fallback_mode,
                "{} tool binaries missing; their scans use the fallback policy",
                missing.len()
            );
        }

        let context = JobWorkerContext {
            queue: self.queue.clone(),
            executor: self.executor.clone(),
            workflow: self.workflow.clone(),
        };
        let workers = spawn_job_worker_pool(
            context,
            self.config.queue.concurrency,
            self.shutdown_token.clone(),
        );

        let sweep = ReconciliationSweep::new(
            self.repository.clone(),
            self.queue.clone(),
            Duration::from_secs(self.config.reconciliation.stale_after_seconds),
        );
        let reconciliation = spawn_reconciliation_worker(
            sweep,
            &self.config.reconciliation,
            self.shutdown_token.clone(),
        );

        Ok(EngineHandle {
            workers,
            reconciliation,
        })
    }
}

/// Connect the database and build the engine with the process-backed adapters.
pub async fn create_engine(config: Config) -> Result<Engine, EngineError> {
    let registry = AdapterRegistry::from_config(&config.adapters);
    create_engine_with_registry(config, registry).await
}

/// Same as [`create_engine`] with a caller-provided adapter registry.
pub async fn create_engine_with_registry(
    config: Config,
    registry: AdapterRegistry,
) -> Result<Engine, EngineError> {
    let database = Database::connect(&config.database).await?;
    let pool = database.pool();

    let repository: Arc<dyn ScanRepository> = Arc::new(SqlxScanRepository::new(pool.clone()));
    let store: Arc<dyn JobStore> = Arc::new(SqlxJobStore::new(pool));
    let queue = Arc::new(JobQueue::new(store, (&config.queue).into()));

    let registry = Arc::new(registry);
    let workflow = ScanWorkflow::new(repository.clone());
    let executor = Arc::new(ScanExecutor::new(
        registry.clone(),
        repository.clone(),
        workflow.clone(),
        config.orchestrator.classification_concurrency,
    ));
    let service = ScanJobService::new(repository.clone(), queue.clone(), workflow.clone());

    tracing::info!(
        concurrency = config.queue.concurrency,
        max_attempts = config.queue.max_attempts,
        fallback_mode = %config.adapters.fallback_mode,
        "Scan engine initialized"
    );

    Ok(Engine {
        config,
        repository,
        queue,
        registry,
        workflow,
        executor,
        service,
        shutdown_token: CancellationToken::new(),
    })
}
