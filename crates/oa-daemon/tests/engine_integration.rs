//! Engine integration tests
//!
//! Drives the coordinator end to end with an in-memory registry, an
//! in-memory audit sink and a scripted command executor.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use oa_core::audit::RevocationAuditEntry;
use oa_core::command::{CommandOutput, CommandSpec};
use oa_core::config::AdminConfig;
use oa_core::error::{
    AuditError, ExecError, IssuanceError, RegistryError, RevocationError, SourceError,
};
use oa_core::outcome::StepStatus;
use oa_core::traits::{AuditSink, CommandExecutor, RegistryStore, StatusSource};
use oa_core::types::{ClientName, ClientRecord, ClientStatus, StatusUpdate};
use oa_daemon::audit::MemoryAuditSink;
use oa_daemon::registry::{MemoryRegistry, SqliteRegistry};
use oa_daemon::{AdminState, Coordinator};

/// Executor that records every command and fails those matching a rule
#[derive(Default)]
struct ScriptedExecutor {
    calls: Mutex<Vec<CommandSpec>>,
    fail_when: Mutex<Option<Box<dyn Fn(&CommandSpec) -> bool + Send + Sync>>>,
}

impl ScriptedExecutor {
    fn failing(rule: impl Fn(&CommandSpec) -> bool + Send + Sync + 'static) -> Self {
        let executor = Self::default();
        *executor.fail_when.lock().unwrap() = Some(Box::new(rule));
        executor
    }

    fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandExecutor for ScriptedExecutor {
    async fn run(&self, command: &CommandSpec) -> Result<CommandOutput, ExecError> {
        self.calls.lock().unwrap().push(command.clone());
        let fails = self
            .fail_when
            .lock()
            .unwrap()
            .as_ref()
            .map_or(false, |rule| rule(command));
        if fails {
            return Err(ExecError::NonZeroExit {
                command: command.to_string(),
                code: Some(1),
                stdout: String::new(),
                stderr: "scripted failure".to_string(),
            });
        }
        Ok(CommandOutput {
            stdout: format!("ran {}", command.program),
            stderr: String::new(),
            exit_code: Some(0),
        })
    }
}

/// Status source serving a fixed report
struct StaticSource(Mutex<String>);

impl StaticSource {
    fn new(report: &str) -> Self {
        Self(Mutex::new(report.to_string()))
    }

    fn set(&self, report: &str) {
        *self.0.lock().unwrap() = report.to_string();
    }
}

#[async_trait]
impl StatusSource for StaticSource {
    async fn read_current_report(&self) -> Result<String, SourceError> {
        Ok(self.0.lock().unwrap().clone())
    }
}

/// Audit sink that always fails
struct BrokenAudit;

#[async_trait]
impl AuditSink for BrokenAudit {
    async fn append(&self, _entry: &RevocationAuditEntry) -> Result<(), AuditError> {
        Err(AuditError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "read-only",
        )))
    }
}

struct Harness {
    coordinator: Coordinator,
    registry: Arc<dyn RegistryStore>,
    executor: Arc<ScriptedExecutor>,
    audit: Arc<MemoryAuditSink>,
    source: Arc<StaticSource>,
}

fn harness_with(
    registry: Arc<dyn RegistryStore>,
    executor: ScriptedExecutor,
    audit: Option<Arc<dyn AuditSink>>,
) -> Harness {
    let executor = Arc::new(executor);
    let memory_audit = Arc::new(MemoryAuditSink::new());
    let source = Arc::new(StaticSource::new(""));
    let state = AdminState::with_parts(
        AdminConfig::default(),
        Arc::clone(&registry),
        executor.clone(),
        audit.unwrap_or_else(|| memory_audit.clone() as Arc<dyn AuditSink>),
        source.clone(),
    );
    Harness {
        coordinator: Coordinator::new(state),
        registry,
        executor,
        audit: memory_audit,
        source,
    }
}

fn harness(executor: ScriptedExecutor) -> Harness {
    harness_with(Arc::new(MemoryRegistry::new()), executor, None)
}

fn report(rows: &[(&str, u64, u64)]) -> String {
    let mut text = String::from(
        "OpenVPN CLIENT LIST\n\
         Updated,2024-03-01 12:00:00\n\
         Common Name,Real Address,Bytes Received,Bytes Sent,Connected Since\n",
    );
    for (name, rx, tx) in rows {
        text.push_str(&format!(
            "{},203.0.113.7:51234,{},{},2024-03-01 11:58:02\n",
            name, rx, tx
        ));
    }
    text.push_str(
        "ROUTING TABLE\n\
         Virtual Address,Common Name,Real Address,Last Ref\n\
         GLOBAL STATS\n\
         Max bcast/mcast queue length,0\n\
         END\n",
    );
    text
}

async fn register(registry: &Arc<dyn RegistryStore>, names: &[&str]) {
    for name in names {
        registry
            .insert(&ClientName::parse(*name).unwrap())
            .await
            .unwrap();
    }
}

async fn records(registry: &Arc<dyn RegistryStore>) -> Vec<ClientRecord> {
    registry.list_all().await.unwrap()
}

#[tokio::test]
async fn test_revoke_unknown_is_not_found_without_audit() {
    let h = harness(ScriptedExecutor::default());

    let err = h.coordinator.revoke("unknown").await.unwrap_err();
    assert!(matches!(err, RevocationError::NotFound(ref n) if n == "unknown"));
    assert!(h.audit.entries().is_empty());
    assert!(h.executor.calls().is_empty());
}

#[tokio::test]
async fn test_revoke_invalid_name_runs_nothing() {
    let h = harness(ScriptedExecutor::default());
    let err = h.coordinator.revoke("alice; rm -rf /").await.unwrap_err();
    assert!(matches!(err, RevocationError::InvalidName(_)));
    assert!(h.executor.calls().is_empty());
    assert!(h.audit.entries().is_empty());
}

#[tokio::test]
async fn test_revoke_continues_after_first_step_fails() {
    let h = harness(ScriptedExecutor::failing(|c| {
        c.args.iter().any(|a| a == "revoke")
    }));
    register(&h.registry, &["alice", "bob"]).await;

    let outcome = h.coordinator.revoke("alice").await.unwrap();
    assert!(outcome.removed);
    assert_eq!(outcome.steps.len(), 10);
    assert_eq!(outcome.steps[0].status, StepStatus::Failed);
    assert!(outcome.steps[1..].iter().all(|s| s.status == StepStatus::Succeeded));
    assert!(!outcome.is_complete());

    // Steps 1-9 went to the executor in order
    let calls = h.executor.calls();
    assert_eq!(calls.len(), 9);
    assert!(calls[1].args.iter().any(|a| a == "gen-crl"));

    let entries = h.audit.entries();
    assert_eq!(entries.len(), 10);
    assert_eq!(
        entries.iter().map(|e| e.step).collect::<Vec<_>>(),
        (1..=10).collect::<Vec<_>>()
    );
    assert_eq!(entries[0].status, StepStatus::Failed);
    assert_eq!(entries[0].stderr, "scripted failure");
    assert!(entries.iter().all(|e| e.client_name == "alice"));

    assert!(h.registry.get_by_name("alice").await.unwrap().is_none());
    assert!(h.registry.get_by_name("bob").await.unwrap().is_some());
}

#[tokio::test]
async fn test_revoke_all_steps_fail_still_deletes() {
    let h = harness(ScriptedExecutor::failing(|_| true));
    register(&h.registry, &["alice"]).await;

    let outcome = h.coordinator.revoke("alice").await.unwrap();
    assert!(outcome.removed);
    assert_eq!(outcome.failed_steps().count(), 9);
    assert_eq!(outcome.steps[9].status, StepStatus::Succeeded);
    assert_eq!(outcome.steps[9].command, "registry delete alice");
    assert!(!outcome.steps[9].command.contains("DELETE FROM"));
}

#[tokio::test]
async fn test_revoke_survives_broken_audit_sink() {
    let h = harness_with(
        Arc::new(MemoryRegistry::new()),
        ScriptedExecutor::default(),
        Some(Arc::new(BrokenAudit)),
    );
    register(&h.registry, &["alice"]).await;

    let outcome = h.coordinator.revoke("alice").await.unwrap();
    assert!(outcome.is_complete());
    assert_eq!(h.executor.calls().len(), 9);
}

/// Registry whose delete either removes nothing or errors
struct StubbornRegistry {
    inner: MemoryRegistry,
    delete_error: bool,
}

#[async_trait]
impl RegistryStore for StubbornRegistry {
    async fn get_by_name(&self, name: &str) -> Result<Option<ClientRecord>, RegistryError> {
        self.inner.get_by_name(name).await
    }
    async fn list_all(&self) -> Result<Vec<ClientRecord>, RegistryError> {
        self.inner.list_all().await
    }
    async fn upsert_status(&self, update: &StatusUpdate) -> Result<u64, RegistryError> {
        self.inner.upsert_status(update).await
    }
    async fn reset_all_connected(&self) -> Result<u64, RegistryError> {
        self.inner.reset_all_connected().await
    }
    async fn insert(&self, name: &ClientName) -> Result<ClientRecord, RegistryError> {
        self.inner.insert(name).await
    }
    async fn delete_by_name(&self, _name: &str) -> Result<u64, RegistryError> {
        if self.delete_error {
            Err(RegistryError::Database("database is locked".to_string()))
        } else {
            Ok(0)
        }
    }
}

#[tokio::test]
async fn test_revoke_zero_rows_is_warning_not_error() {
    let registry: Arc<dyn RegistryStore> = Arc::new(StubbornRegistry {
        inner: MemoryRegistry::new(),
        delete_error: false,
    });
    let h = harness_with(registry, ScriptedExecutor::default(), None);
    register(&h.registry, &["alice"]).await;

    let outcome = h.coordinator.revoke("alice").await.unwrap();
    assert!(!outcome.removed);
    assert_eq!(outcome.steps[9].status, StepStatus::Warning);
    assert_eq!(h.audit.entries()[9].status, StepStatus::Warning);
}

#[tokio::test]
async fn test_revoke_delete_failure_is_distinct() {
    let registry: Arc<dyn RegistryStore> = Arc::new(StubbornRegistry {
        inner: MemoryRegistry::new(),
        delete_error: true,
    });
    let h = harness_with(registry, ScriptedExecutor::default(), None);
    register(&h.registry, &["alice"]).await;

    match h.coordinator.revoke("alice").await {
        Err(RevocationError::DatabaseDeleteFailed { name, outcome, .. }) => {
            assert_eq!(name, "alice");
            assert!(!outcome.removed);
            assert_eq!(outcome.steps.len(), 10);
            assert_eq!(outcome.steps[9].status, StepStatus::Failed);
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(h.audit.entries().len(), 10);
}

#[tokio::test]
async fn test_issue_bad_name_touches_nothing() {
    let h = harness(ScriptedExecutor::default());

    let err = h.coordinator.issue("bad name").await.unwrap_err();
    assert!(matches!(err, IssuanceError::InvalidName(_)));
    assert!(h.executor.calls().is_empty());
    assert!(records(&h.registry).await.is_empty());
}

#[tokio::test]
async fn test_issue_creates_disconnected_record() {
    let h = harness(ScriptedExecutor::default());

    let outcome = h.coordinator.issue("alice").await.unwrap();
    assert_eq!(outcome.record.name, "alice");
    assert_eq!(outcome.record.status, ClientStatus::Disconnected);

    let calls = h.executor.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].args, vec!["--batch", "build-client-full", "alice", "nopass"]);
}

#[tokio::test]
async fn test_issue_duplicate_runs_nothing() {
    let h = harness(ScriptedExecutor::default());
    register(&h.registry, &["alice"]).await;

    let err = h.coordinator.issue("alice").await.unwrap_err();
    assert!(matches!(err, IssuanceError::DuplicateName(_)));
    assert!(h.executor.calls().is_empty());
}

#[tokio::test]
async fn test_issue_failure_creates_no_record() {
    let h = harness(ScriptedExecutor::failing(|_| true));

    let err = h.coordinator.issue("alice").await.unwrap_err();
    match err {
        IssuanceError::Execution(e) => assert_eq!(e.stderr(), "scripted failure"),
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(records(&h.registry).await.is_empty());
}

#[tokio::test]
async fn test_reconcile_tracks_report() {
    let h = harness(ScriptedExecutor::default());
    register(&h.registry, &["alice", "bob", "carol"]).await;

    h.source.set(&report(&[("alice", 1024, 2048), ("bob", 1, 2)]));
    let result = h.coordinator.reconcile_now().await;
    assert_eq!(result.updated, 2);
    assert!(result.is_clean());

    let stats = h.coordinator.traffic_stats().await.unwrap();
    assert_eq!(stats.clients, 3);
    assert_eq!(stats.connected, 2);
    assert_eq!(stats.bytes_received, 1025);
    assert_eq!(stats.bytes_sent, 2050);

    h.source.set(&report(&[("carol", 7, 8)]));
    h.coordinator.reconcile_now().await;

    for record in records(&h.registry).await {
        let expected = if record.name == "carol" {
            ClientStatus::Connected
        } else {
            ClientStatus::Disconnected
        };
        assert_eq!(record.status, expected, "{}", record.name);
    }
}

#[tokio::test]
async fn test_reconcile_idempotent_on_sqlite() {
    let registry: Arc<dyn RegistryStore> = Arc::new(SqliteRegistry::open_in_memory().await.unwrap());
    let h = harness_with(registry, ScriptedExecutor::default(), None);
    register(&h.registry, &["alice", "bob"]).await;
    h.source.set(&report(&[("alice", 10, 20), ("ghost", 1, 1)]));

    let first = h.coordinator.reconcile_now().await;
    assert_eq!(first.orphaned, vec!["ghost".to_string()]);
    let once = records(&h.registry).await;

    h.coordinator.reconcile_now().await;
    let twice = records(&h.registry).await;
    assert_eq!(once, twice);

    let alice = twice.iter().find(|r| r.name == "alice").unwrap();
    assert_eq!(alice.status, ClientStatus::Connected);
    assert_eq!(
        alice.last_connected.as_deref(),
        Some("2024-03-01T11:58:02+00:00")
    );
    assert_eq!(twice.len(), 2);
}

#[tokio::test]
async fn test_issue_then_revoke_round_trip_on_sqlite() {
    let registry: Arc<dyn RegistryStore> = Arc::new(SqliteRegistry::open_in_memory().await.unwrap());
    let h = harness_with(registry, ScriptedExecutor::default(), None);

    h.coordinator.issue("alice").await.unwrap();
    assert_eq!(h.coordinator.list_clients().await.unwrap().len(), 1);

    let outcome = h.coordinator.revoke("alice").await.unwrap();
    assert!(outcome.is_complete());
    assert!(h.coordinator.list_clients().await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_background_task_reconciles_on_start() {
    let h = harness(ScriptedExecutor::default());
    register(&h.registry, &["alice"]).await;
    h.source.set(&report(&[("alice", 5, 5)]));

    assert!(h.coordinator.start().await);
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let alice = h.registry.get_by_name("alice").await.unwrap().unwrap();
    assert_eq!(alice.status, ClientStatus::Connected);

    h.source.set(&report(&[]));
    tokio::time::sleep(h.coordinator.state().config.reconcile_interval).await;
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let alice = h.registry.get_by_name("alice").await.unwrap().unwrap();
    assert_eq!(alice.status, ClientStatus::Disconnected);

    assert!(h.coordinator.stop().await);
}
