//! Integration tests for the scan repositories (SQLite and in-memory)

use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use rampart_core::config::DatabaseConfig;
use rampart_core::domain::{
    Finding, Progress, RiskLevel, Scan, ScanId, ScanOptions, ScanRepository,
    ScanRepositoryError, ScanStatus, ScanType, Tool,
};
use rampart_core::infrastructure::{Database, InMemoryScanRepository, SqlxScanRepository};

async fn sqlite_repository() -> SqlxScanRepository {
    let config = DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        ..DatabaseConfig::default()
    };
    let database = Database::connect(&config)
        .await
        .expect("in-memory database should open");
    SqlxScanRepository::new(database.pool())
}

async fn all_repositories() -> Vec<(&'static str, Arc<dyn ScanRepository>)> {
    let memory: Arc<dyn ScanRepository> = Arc::new(InMemoryScanRepository::new());
    let sqlite: Arc<dyn ScanRepository> = Arc::new(sqlite_repository().await);
    vec![("memory", memory), ("sqlite", sqlite)]
}

fn finding_for(scan: &Scan, title: &str) -> Finding {
    Finding {
        id: Uuid::new_v4(),
        scan_id: scan.id,
        tool: Tool::PortScanner,
        vulnerability_type: "open_port".to_string(),
        risk_level: RiskLevel::Medium,
        title: title.to_string(),
        description: "SSH service exposed".to_string(),
        fix_suggestion: "Restrict access".to_string(),
        score: 6.4,
        cve_id: None,
        affected_component: None,
        port: Some(22),
        service: Some("ssh".to_string()),
        raw_output: serde_json::json!({"port": 22}),
        classification_metadata: serde_json::json!({"confidence": 0.65}),
        created_at: Utc::now(),
    }
}

#[tokio::test]
async fn test_create_and_find_scan_round_trip() {
    for (name, repo) in all_repositories().await {
        let scan = Scan::new(
            "example.com",
            ScanType::Combined,
            ScanOptions::new().with("ports", "1-1024"),
        )
        .with_user("user-1");
        repo.create_scan(&scan).await.unwrap();

        let stored = repo.find_scan(scan.id).await.unwrap().expect(name);
        assert_eq!(stored.id, scan.id, "{name}");
        assert_eq!(stored.scan_type, ScanType::Combined, "{name}");
        assert_eq!(stored.status, ScanStatus::Pending, "{name}");
        assert_eq!(stored.options, scan.options, "{name}");
        assert_eq!(stored.user_id.as_deref(), Some("user-1"), "{name}");

        assert!(matches!(
            repo.create_scan(&scan).await,
            Err(ScanRepositoryError::AlreadyExists { .. })
        ));
    }
}

#[tokio::test]
async fn test_update_is_conditional_on_expected_status() {
    for (name, repo) in all_repositories().await {
        let mut scan = Scan::new("example.com", ScanType::PortScan, ScanOptions::new());
        repo.create_scan(&scan).await.unwrap();

        scan.transition(ScanStatus::Running).unwrap();
        repo.update_scan(&scan, ScanStatus::Pending).await.unwrap();

        // A second writer still believing the scan is pending must lose
        let err = repo.update_scan(&scan, ScanStatus::Pending).await.unwrap_err();
        assert!(
            matches!(
                err,
                ScanRepositoryError::StatusConflict {
                    actual: ScanStatus::Running,
                    ..
                }
            ),
            "{name}: {err}"
        );

        let stored = repo.find_scan(scan.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ScanStatus::Running, "{name}");
        assert!(stored.started_at.is_some(), "{name}");
    }
}

#[tokio::test]
async fn test_progress_never_decreases_and_freezes_when_terminal() {
    for (name, repo) in all_repositories().await {
        let mut scan = Scan::new("example.com", ScanType::Combined, ScanOptions::new());
        repo.create_scan(&scan).await.unwrap();
        scan.transition(ScanStatus::Running).unwrap();
        repo.update_scan(&scan, ScanStatus::Pending).await.unwrap();

        let raised = repo.record_progress(scan.id, Progress::new(40)).await.unwrap();
        assert_eq!(raised.value(), 40, "{name}");
        let lowered = repo.record_progress(scan.id, Progress::new(20)).await.unwrap();
        assert_eq!(lowered.value(), 40, "{name}");

        scan.transition(ScanStatus::Error).unwrap();
        scan.error_message = Some("boom".to_string());
        repo.update_scan(&scan, ScanStatus::Running).await.unwrap();
        let frozen = repo.record_progress(scan.id, Progress::new(80)).await.unwrap();
        assert_eq!(frozen.value(), 40, "{name}");

        let stored = repo.find_scan(scan.id).await.unwrap().unwrap();
        assert_eq!(stored.error_message.as_deref(), Some("boom"), "{name}");
    }
}

#[tokio::test]
async fn test_findings_are_listed_in_insertion_order() {
    for (name, repo) in all_repositories().await {
        let scan = Scan::new("example.com", ScanType::PortScan, ScanOptions::new());
        repo.create_scan(&scan).await.unwrap();

        for title in ["first", "second", "third"] {
            repo.insert_finding(&finding_for(&scan, title)).await.unwrap();
        }

        let titles: Vec<String> = repo
            .list_findings(scan.id)
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.title)
            .collect();
        assert_eq!(titles, vec!["first", "second", "third"], "{name}");
    }
}

#[tokio::test]
async fn test_stage_markers_and_clearing_stage_findings() {
    for (name, repo) in all_repositories().await {
        let scan = Scan::new("example.com", ScanType::Combined, ScanOptions::new());
        repo.create_scan(&scan).await.unwrap();
        assert!(repo.completed_stages(scan.id).await.unwrap().is_empty(), "{name}");

        repo.insert_finding(&finding_for(&scan, "open ssh")).await.unwrap();
        let mut banner = finding_for(&scan, "server banner");
        banner.tool = Tool::WebVulnScanner;
        repo.insert_finding(&banner).await.unwrap();

        repo.mark_stage_complete(scan.id, Tool::PortScanner).await.unwrap();
        repo.mark_stage_complete(scan.id, Tool::PortScanner).await.unwrap();
        assert_eq!(
            repo.completed_stages(scan.id).await.unwrap(),
            vec![Tool::PortScanner],
            "{name}"
        );

        let removed = repo
            .clear_stage_findings(scan.id, Tool::WebVulnScanner)
            .await
            .unwrap();
        assert_eq!(removed, 1, "{name}");
        let findings = repo.list_findings(scan.id).await.unwrap();
        assert_eq!(findings.len(), 1, "{name}");
        assert_eq!(findings[0].tool, Tool::PortScanner, "{name}");

        assert!(
            matches!(
                repo.mark_stage_complete(ScanId::generate(), Tool::PortScanner).await,
                Err(ScanRepositoryError::NotFound(_))
            ),
            "{name}"
        );
    }
}

#[tokio::test]
async fn test_running_scan_cannot_be_deleted() {
    for (name, repo) in all_repositories().await {
        let mut scan = Scan::new("example.com", ScanType::PortScan, ScanOptions::new());
        repo.create_scan(&scan).await.unwrap();
        scan.transition(ScanStatus::Running).unwrap();
        repo.update_scan(&scan, ScanStatus::Pending).await.unwrap();

        assert!(
            matches!(
                repo.delete_scan(scan.id).await,
                Err(ScanRepositoryError::ScanRunning(_))
            ),
            "{name}"
        );
    }
}

#[tokio::test]
async fn test_delete_cascades_to_findings() {
    for (name, repo) in all_repositories().await {
        let mut scan = Scan::new("example.com", ScanType::PortScan, ScanOptions::new());
        repo.create_scan(&scan).await.unwrap();
        repo.insert_finding(&finding_for(&scan, "open ssh")).await.unwrap();

        scan.transition(ScanStatus::Running).unwrap();
        repo.update_scan(&scan, ScanStatus::Pending).await.unwrap();
        scan.transition(ScanStatus::Complete).unwrap();
        repo.update_scan(&scan, ScanStatus::Running).await.unwrap();

        repo.delete_scan(scan.id).await.unwrap();
        assert!(repo.find_scan(scan.id).await.unwrap().is_none(), "{name}");
        assert!(repo.list_findings(scan.id).await.unwrap().is_empty(), "{name}");
        assert!(matches!(
            repo.delete_scan(scan.id).await,
            Err(ScanRepositoryError::NotFound(_))
        ));
    }
}

#[tokio::test]
async fn test_find_stale_running_uses_claim_marker() {
    for (name, repo) in all_repositories().await {
        let mut stale = Scan::new("stale.example.com", ScanType::PortScan, ScanOptions::new());
        let mut fresh = Scan::new("fresh.example.com", ScanType::PortScan, ScanOptions::new());
        repo.create_scan(&stale).await.unwrap();
        repo.create_scan(&fresh).await.unwrap();

        stale.transition(ScanStatus::Running).unwrap();
        stale.claimed_at = Some(Utc::now() - Duration::hours(2));
        repo.update_scan(&stale, ScanStatus::Pending).await.unwrap();

        fresh.transition(ScanStatus::Running).unwrap();
        repo.update_scan(&fresh, ScanStatus::Pending).await.unwrap();

        let found = repo
            .find_stale_running(Utc::now() - Duration::hours(1))
            .await
            .unwrap();
        let ids: Vec<_> = found.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![stale.id], "{name}");
    }
}

#[tokio::test]
async fn test_sqlite_file_database_persists_across_pools() {
    let dir = tempfile::tempdir().unwrap();
    let config = DatabaseConfig {
        url: format!("sqlite://{}", dir.path().join("rampart.db").display()),
        ..DatabaseConfig::default()
    };

    let scan = Scan::new("example.com", ScanType::WebVuln, ScanOptions::new());
    {
        let database = Database::connect(&config).await.unwrap();
        let repo = SqlxScanRepository::new(database.pool());
        repo.create_scan(&scan).await.unwrap();
        database.pool().close().await;
    }

    let database = Database::connect(&config).await.unwrap();
    let repo = SqlxScanRepository::new(database.pool());
    let stored = repo.find_scan(scan.id).await.unwrap().unwrap();
    assert_eq!(stored.target, "example.com");
    assert_eq!(stored.scan_type, ScanType::WebVuln);
}
