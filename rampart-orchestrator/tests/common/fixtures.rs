//! Test adapters and scan fixtures

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rampart_adapters::{AdapterError, AdapterRun, ToolAdapter};
use rampart_core::domain::{RawFinding, Scan, ScanId, ScanOptions, ScanType, Tool};
use rampart_orchestrator::{InMemoryJobStore, Job, JobId, JobState, JobStore, JobStoreError};
use tokio::sync::Mutex;

/// Adapter returning a fixed finding list after an optional delay
pub struct FixedAdapter {
    tool: Tool,
    findings: Vec<RawFinding>,
    delay: Duration,
    running: AtomicUsize,
    peak: AtomicUsize,
}

impl FixedAdapter {
    pub fn new(tool: Tool, findings: Vec<RawFinding>) -> Self {
        Self {
            tool,
            findings,
            delay: Duration::ZERO,
            running: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn empty(tool: Tool) -> Self {
        Self::new(tool, Vec::new())
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Highest number of overlapping `execute` calls seen so far
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToolAdapter for FixedAdapter {
    fn tool(&self) -> Tool {
        self.tool
    }

    async fn execute(
        &self,
        _target: &str,
        _options: &ScanOptions,
    ) -> Result<AdapterRun, AdapterError> {
        let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.running.fetch_sub(1, Ordering::SeqCst);
        Ok(self.findings.clone().into())
    }
}

/// Adapter whose tool always exits non-zero; records when it was called
pub struct FailingAdapter {
    tool: Tool,
    calls: Mutex<Vec<Instant>>,
}

impl FailingAdapter {
    pub fn new(tool: Tool) -> Self {
        Self {
            tool,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub async fn calls(&self) -> Vec<Instant> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl ToolAdapter for FailingAdapter {
    fn tool(&self) -> Tool {
        self.tool
    }

    async fn execute(
        &self,
        _target: &str,
        _options: &ScanOptions,
    ) -> Result<AdapterRun, AdapterError> {
        self.calls.lock().await.push(Instant::now());
        Err(tool_failure())
    }
}

/// Adapter that fails its first `failures` calls, then returns its findings
pub struct FlakyAdapter {
    tool: Tool,
    findings: Vec<RawFinding>,
    failures: usize,
    calls: AtomicUsize,
}

impl FlakyAdapter {
    pub fn new(tool: Tool, failures: usize, findings: Vec<RawFinding>) -> Self {
        Self {
            tool,
            findings,
            failures,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToolAdapter for FlakyAdapter {
    fn tool(&self) -> Tool {
        self.tool
    }

    async fn execute(
        &self,
        _target: &str,
        _options: &ScanOptions,
    ) -> Result<AdapterRun, AdapterError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(tool_failure());
        }
        Ok(self.findings.clone().into())
    }
}

fn tool_failure() -> AdapterError {
    AdapterError::NonZeroExit {
        binary: "tool".to_string(),
        status: "exit status: 1".to_string(),
        stderr: "QUITTING!".to_string(),
    }
}

/// Job store rejecting the next `failures` writes of jobs entering `state`
pub struct FlakyJobStore {
    inner: InMemoryJobStore,
    state: JobState,
    failures: AtomicUsize,
}

impl FlakyJobStore {
    pub fn new(state: JobState, failures: usize) -> Self {
        Self {
            inner: InMemoryJobStore::new(),
            state,
            failures: AtomicUsize::new(failures),
        }
    }

    pub fn remaining_failures(&self) -> usize {
        self.failures.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobStore for FlakyJobStore {
    async fn save_job(&self, job: &Job) -> Result<(), JobStoreError> {
        let reject = job.state == self.state
            && self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
        if reject {
            return Err(JobStoreError::Database("database is locked".to_string()));
        }
        self.inner.save_job(job).await
    }

    async fn delete_job(&self, id: JobId) -> Result<(), JobStoreError> {
        self.inner.delete_job(id).await
    }

    async fn load_unfinished(&self) -> Result<Vec<Job>, JobStoreError> {
        self.inner.load_unfinished().await
    }

    async fn load_for_scan(&self, scan_id: ScanId) -> Result<Vec<Job>, JobStoreError> {
        self.inner.load_for_scan(scan_id).await
    }
}

pub fn ssh_port() -> RawFinding {
    RawFinding::new("open_port", "Open port 22/tcp (ssh)")
        .with_port(22)
        .with_protocol("tcp")
        .with_service("ssh")
        .with_raw_output(serde_json::json!({"port": 22, "service": "ssh"}))
}

pub fn http_port() -> RawFinding {
    RawFinding::new("open_port", "Open port 80/tcp (http)")
        .with_port(80)
        .with_protocol("tcp")
        .with_service("http")
        .with_raw_output(serde_json::json!({"port": 80, "service": "http"}))
}

/// Live tools for a combined scan: two open ports, nothing from the web tools
pub fn combined_adapters() -> Vec<Arc<dyn ToolAdapter>> {
    vec![
        Arc::new(FixedAdapter::new(
            Tool::PortScanner,
            vec![ssh_port(), http_port()],
        )),
        Arc::new(FixedAdapter::empty(Tool::WebVulnScanner)),
        Arc::new(FixedAdapter::empty(Tool::SqlInjectionTester)),
    ]
}

pub fn port_scan(target: &str) -> Scan {
    Scan::new(target, ScanType::PortScan, ScanOptions::new())
}
