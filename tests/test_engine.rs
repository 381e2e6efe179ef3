//! End-to-end tests for the wired engine on a SQLite file

mod common;

use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use rampart::cli::Cli;
use rampart::create_engine_with_registry;
use rampart_core::domain::{RiskLevel, Scan, ScanOptions, ScanStatus, ScanType};
use rampart_orchestrator::{JobCounts, JobOptions, JobState};

use common::{config, registry, wait_for_terminal};

#[tokio::test]
async fn test_engine_processes_submitted_scan() {
    let dir = tempfile::tempdir().unwrap();
    let engine = create_engine_with_registry(config(dir.path()), registry())
        .await
        .unwrap();
    let handle = engine.start().await.unwrap();

    let scan = Scan::new("10.0.0.5", ScanType::PortScan, ScanOptions::new());
    let (scan, job_id) = engine
        .service()
        .submit_scan(scan, JobOptions::default())
        .await
        .unwrap();

    let finished = wait_for_terminal(engine.repository(), scan.id, Duration::from_secs(10)).await;
    assert_eq!(finished.status, ScanStatus::Complete);
    assert_eq!(finished.progress.value(), 100);

    let findings = engine.service().list_findings(scan.id).await.unwrap();
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].port, Some(22));
    assert_eq!(findings[0].risk_level, RiskLevel::Medium);

    let job = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let job = engine.service().get_job_status(job_id).await.unwrap();
            if job.state == JobState::Completed {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(job.result.unwrap()["findings_persisted"], 1);

    engine.shutdown_token().cancel();
    assert!(handle.join(Duration::from_secs(5)).await);
}

#[tokio::test]
async fn test_queued_scan_runs_after_restart() {
    let dir = tempfile::tempdir().unwrap();

    // Submitted while no workers are running
    let scan_id = {
        let engine = create_engine_with_registry(config(dir.path()), registry())
            .await
            .unwrap();
        let scan = Scan::new("10.0.0.6", ScanType::PortScan, ScanOptions::new());
        let (scan, _) = engine
            .service()
            .submit_scan(scan, JobOptions::default())
            .await
            .unwrap();
        scan.id
    };

    let engine = create_engine_with_registry(config(dir.path()), registry())
        .await
        .unwrap();
    let handle = engine.start().await.unwrap();

    let finished = wait_for_terminal(engine.repository(), scan_id, Duration::from_secs(10)).await;
    assert_eq!(finished.status, ScanStatus::Complete);
    assert_eq!(engine.service().list_findings(scan_id).await.unwrap().len(), 1);

    engine.shutdown_token().cancel();
    handle.join(Duration::from_secs(5)).await;
}

#[tokio::test]
async fn test_reconciliation_resumes_orphaned_running_scan() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(dir.path());
    config.reconciliation.enabled = true;
    config.reconciliation.interval_seconds = 1;
    config.reconciliation.stale_after_seconds = 60;

    let engine = create_engine_with_registry(config, registry())
        .await
        .unwrap();

    // Running scan whose worker vanished without leaving a job behind
    let mut scan = Scan::new("10.0.0.7", ScanType::PortScan, ScanOptions::new());
    engine.repository().create_scan(&scan).await.unwrap();
    scan.transition(ScanStatus::Running).unwrap();
    scan.claimed_at = Some(Utc::now() - chrono::Duration::minutes(10));
    engine
        .repository()
        .update_scan(&scan, ScanStatus::Pending)
        .await
        .unwrap();

    let handle = engine.start().await.unwrap();

    let finished = wait_for_terminal(engine.repository(), scan.id, Duration::from_secs(10)).await;
    assert_eq!(finished.status, ScanStatus::Complete);

    engine.shutdown_token().cancel();
    handle.join(Duration::from_secs(5)).await;
}

#[tokio::test]
async fn test_status_reads_job_stored_by_another_engine() {
    let dir = tempfile::tempdir().unwrap();

    let scan_id = {
        let engine = create_engine_with_registry(config(dir.path()), registry())
            .await
            .unwrap();
        let scan = Scan::new("10.0.0.8", ScanType::PortScan, ScanOptions::new());
        let (scan, _) = engine
            .service()
            .submit_scan(scan, JobOptions::default())
            .await
            .unwrap();
        scan.id
    };

    // A fresh engine that never started its queue
    let engine = create_engine_with_registry(config(dir.path()), registry())
        .await
        .unwrap();
    assert_eq!(engine.queue().counts().await, JobCounts::default());

    let job = engine
        .service()
        .find_scan_job_status(scan_id)
        .await
        .unwrap()
        .expect("job read from the store");
    assert_eq!(job.scan_id, scan_id);
    assert_eq!(job.state, JobState::Waiting);
    assert_eq!(job.attempts, 0);
    assert_eq!(job.payload.target, "10.0.0.8");

    // Reading does not load or re-queue anything
    assert_eq!(engine.queue().counts().await, JobCounts::default());

    let scan_arg = scan_id.to_string();
    let cli = Cli::try_parse_from(["rampart", "--format", "json", "status", scan_arg.as_str()])
        .unwrap();
    cli.execute(config(dir.path())).await.unwrap();
}
