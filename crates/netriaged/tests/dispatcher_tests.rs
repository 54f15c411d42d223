//! Integration tests for the capture dispatcher.
//!
//! Jobs run against the fake executor over a temporary scope tree, so
//! idempotency, host exclusivity and retry bounds are checked end to end.

use netriage_common::{FailureKind, JobStatus, RawOutcome, Scope, TriageError};
use netriaged::catalog::ScopeCatalog;
use netriaged::config::{CaptureConfig, ScopesConfig};
use netriaged::dispatcher::CaptureDispatcher;
use netriaged::executor::FakeDeviceExecutor;
use netriaged::raw_log::RawLogWriter;
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const DEVICES_YAML: &str = "devices:
  - name: B-ASBR-1
    device_type: cisco_ios
  - name: C-ASBR-1
    device_type: cisco_xr
";

const BGP_SUMMARY: &str = "RP/0/RP0/CPU0:C-ASBR-1#show bgp summary
BGP router identifier 10.0.0.12, local AS number 65002

Neighbor        Spk    AS MsgRcvd MsgSent   TblVer  InQ OutQ  Up/Down  St/PfxRcd
100.64.231.1      0 65001    1234    1230       42    0    0 02:13:45         12
";

const BFD_SESSION: &str = "RP/0/RP0/CPU0:C-ASBR-1#show bfd session
Interface           Dest Addr           Local det time(int*mult)      State
                                    Echo             Async   H/W   NPU
------------------- --------------- ---------------- ---------------- ----------
Gi0/0/0/0           100.64.231.1    0s(0s*0)         450ms(150ms*3)   UP
                                                                 No    n/a
";

const WAIT: Duration = Duration::from_secs(10);

struct Harness {
    _dir: TempDir,
    catalog: ScopeCatalog,
    dispatcher: CaptureDispatcher,
    fake: FakeDeviceExecutor,
}

fn scope() -> Scope {
    Scope::new("configs.5", "task-18.bfd")
}

fn commands(list: &[&str]) -> Vec<String> {
    list.iter().map(|c| c.to_string()).collect()
}

fn harness(fake: FakeDeviceExecutor, config: CaptureConfig) -> Harness {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("configs.5/task-18.bfd")).unwrap();
    fs::write(dir.path().join("configs.5/devices.yaml"), DEVICES_YAML).unwrap();

    let catalog = ScopeCatalog::new(&ScopesConfig {
        repo_root: dir.path().to_path_buf(),
        ..ScopesConfig::default()
    });
    let dispatcher = CaptureDispatcher::new(
        catalog.clone(),
        Arc::new(fake.clone()),
        RawLogWriter::new(catalog.clone()),
        config,
    );
    Harness {
        _dir: dir,
        catalog,
        dispatcher,
        fake,
    }
}

fn healthy_fake() -> FakeDeviceExecutor {
    FakeDeviceExecutor::new()
        .with_output("C-ASBR-1", "show bgp summary", BGP_SUMMARY)
        .with_output("C-ASBR-1", "show bfd session", BFD_SESSION)
}

fn fast_retries() -> CaptureConfig {
    CaptureConfig {
        max_attempts: 3,
        backoff_base_ms: 1,
        ..CaptureConfig::default()
    }
}

// ============================================================================
// Idempotency
// ============================================================================

#[tokio::test]
async fn test_same_fingerprint_returns_same_job() {
    let h = harness(healthy_fake(), CaptureConfig::default());
    let cmds = commands(&["show bgp summary", "show bfd session"]);

    let first = h.dispatcher.submit(&scope(), "C-ASBR-1", &cmds).unwrap();
    let second = h.dispatcher.submit(&scope(), "c-asbr-1", &cmds).unwrap();
    assert_eq!(first.job_id, second.job_id);

    let job = h.dispatcher.wait(&first.job_id, WAIT).await.unwrap();
    assert_eq!(job.status, JobStatus::Succeeded);
    assert_eq!(h.fake.run_count("C-ASBR-1"), 2);

    // Reordered and re-spaced commands hit the cached job too
    let again = h
        .dispatcher
        .submit(&scope(), "C-ASBR-1", &commands(&["show  bfd session", "show bgp summary"]))
        .unwrap();
    assert_eq!(again.job_id, first.job_id);
    assert_eq!(again.status, JobStatus::Succeeded);
    assert_eq!(h.fake.run_count("C-ASBR-1"), 2);
    assert_eq!(h.dispatcher.job_count(), 1);
}

// ============================================================================
// Host exclusivity
// ============================================================================

#[tokio::test]
async fn test_one_session_per_host() {
    let fake = healthy_fake().with_delay(Duration::from_millis(50));
    let h = harness(fake, CaptureConfig::default());

    let a = h
        .dispatcher
        .submit(&scope(), "C-ASBR-1", &commands(&["show bgp summary"]))
        .unwrap();
    let b = h
        .dispatcher
        .submit(&scope(), "C-ASBR-1", &commands(&["show bfd session"]))
        .unwrap();
    let c = h
        .dispatcher
        .submit(&scope(), "B-ASBR-1", &commands(&["show ip bgp summary"]))
        .unwrap();
    assert_ne!(a.job_id, b.job_id);

    for id in [&a.job_id, &b.job_id, &c.job_id] {
        let job = h.dispatcher.wait(id, WAIT).await.unwrap();
        assert!(job.status.is_terminal());
    }
    assert_eq!(h.fake.max_concurrency("C-ASBR-1"), 1);
    assert_eq!(h.fake.connect_count("C-ASBR-1"), 2);
}

// ============================================================================
// Partial failure
// ============================================================================

#[tokio::test]
async fn test_partial_command_failure_still_succeeds() {
    let fake = healthy_fake().with_output(
        "C-ASBR-1",
        "show bgp sumary",
        "show bgp sumary\n        ^\n% Invalid input detected at '^' marker.\n",
    );
    let h = harness(fake, CaptureConfig::default());
    let cmds = commands(&["show bgp summary", "show bfd session", "show bgp sumary"]);

    let resp = h.dispatcher.submit(&scope(), "C-ASBR-1", &cmds).unwrap();
    let job = h.dispatcher.wait(&resp.job_id, WAIT).await.unwrap();

    assert_eq!(job.status, JobStatus::Succeeded);
    assert_eq!(job.raw_logs.len(), 3);
    assert_eq!(job.batches.len(), 2);
    assert!(job.failure.is_none());

    let failed: Vec<_> = job.failed_raw_logs().collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].command, "show bgp sumary");
    match &failed[0].outcome {
        RawOutcome::Failed { reason } => assert!(reason.contains("% Invalid input")),
        other => panic!("unexpected outcome {:?}", other),
    }

    // Every fact points back at a successful raw log of this job
    for fact in job.facts() {
        let raw = job
            .raw_logs
            .iter()
            .find(|r| r.id == fact.provenance.raw_log_id)
            .unwrap();
        assert!(raw.is_success());
        assert_eq!(fact.provenance.job_id, job.job_id);
    }
}

#[tokio::test]
async fn test_all_commands_failing_fails_the_job() {
    let fake = FakeDeviceExecutor::new()
        .with_command_error("C-ASBR-1", "show bgp summary", "% Invalid input detected");
    let h = harness(fake, CaptureConfig::default());

    let resp = h
        .dispatcher
        .submit(&scope(), "C-ASBR-1", &commands(&["show bgp summary"]))
        .unwrap();
    let job = h.dispatcher.wait(&resp.job_id, WAIT).await.unwrap();

    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.failure.unwrap().kind, FailureKind::AllCommandsFailed);
    assert!(job.batches.is_empty());
}

// ============================================================================
// Retry bounds
// ============================================================================

#[tokio::test]
async fn test_transport_retries_are_bounded() {
    let fake = healthy_fake().fail_connects("C-ASBR-1", 100);
    let h = harness(fake, fast_retries());

    let resp = h
        .dispatcher
        .submit(&scope(), "C-ASBR-1", &commands(&["show bgp summary"]))
        .unwrap();
    let job = h.dispatcher.wait(&resp.job_id, WAIT).await.unwrap();

    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.failure.as_ref().unwrap().kind, FailureKind::Transport);
    assert_eq!(job.attempts.len(), 3);
    assert_eq!(h.fake.connect_count("C-ASBR-1"), 3);
    assert!(job.raw_logs.is_empty());
}

#[tokio::test]
async fn test_transport_recovers_on_later_attempt() {
    let fake = healthy_fake().fail_connects("C-ASBR-1", 1);
    let h = harness(fake, fast_retries());

    let resp = h
        .dispatcher
        .submit(&scope(), "C-ASBR-1", &commands(&["show bfd session"]))
        .unwrap();
    let job = h.dispatcher.wait(&resp.job_id, WAIT).await.unwrap();

    assert_eq!(job.status, JobStatus::Succeeded);
    assert_eq!(job.attempts.len(), 2);
    assert!(job.raw_logs.iter().all(|r| r.attempt == 2));
}

#[tokio::test]
async fn test_failed_fingerprint_resubmits_within_bound() {
    let fake = healthy_fake().fail_connects("C-ASBR-1", 100);
    let config = CaptureConfig {
        max_resubmits: 1,
        ..fast_retries()
    };
    let h = harness(fake, config);
    let cmds = commands(&["show bgp summary"]);

    let first = h.dispatcher.submit(&scope(), "C-ASBR-1", &cmds).unwrap();
    h.dispatcher.wait(&first.job_id, WAIT).await.unwrap();

    let second = h.dispatcher.submit(&scope(), "C-ASBR-1", &cmds).unwrap();
    assert_ne!(second.job_id, first.job_id);
    let job = h.dispatcher.wait(&second.job_id, WAIT).await.unwrap();
    assert_eq!(job.retry_of.as_deref(), Some(first.job_id.as_str()));
    assert_eq!(job.status, JobStatus::Failed);

    // Bound reached: the latest failed job comes back unchanged
    let third = h.dispatcher.submit(&scope(), "C-ASBR-1", &cmds).unwrap();
    assert_eq!(third.job_id, second.job_id);
    assert_eq!(third.status, JobStatus::Failed);
    assert_eq!(h.fake.connect_count("C-ASBR-1"), 6);
}

#[tokio::test]
async fn test_explicit_retry_rules() {
    let h = harness(healthy_fake(), CaptureConfig::default());
    let resp = h
        .dispatcher
        .submit(&scope(), "C-ASBR-1", &commands(&["show bgp summary"]))
        .unwrap();
    h.dispatcher.wait(&resp.job_id, WAIT).await.unwrap();

    let err = h.dispatcher.retry(&resp.job_id).unwrap_err();
    assert!(matches!(err, TriageError::InvalidCommand(_)));

    let err = h.dispatcher.retry("no-such-job").unwrap_err();
    assert!(matches!(err, TriageError::UnknownJob(_)));
}

// ============================================================================
// Validation
// ============================================================================

#[tokio::test]
async fn test_submit_validation_errors() {
    let h = harness(healthy_fake(), CaptureConfig::default());

    let err = h
        .dispatcher
        .submit(&scope(), "C-ASBR-1", &commands(&["configure terminal"]))
        .unwrap_err();
    assert!(matches!(err, TriageError::InvalidCommand(_)));

    let err = h
        .dispatcher
        .submit(&scope(), "Z-PE-9", &commands(&["show version"]))
        .unwrap_err();
    assert!(matches!(err, TriageError::InvalidHost(_)));

    let err = h
        .dispatcher
        .submit(
            &Scope::new("configs.5", "task-404"),
            "C-ASBR-1",
            &commands(&["show version"]),
        )
        .unwrap_err();
    assert!(matches!(err, TriageError::InvalidScope(_)));

    let err = h
        .dispatcher
        .submit(&Scope::new("..", "etc"), "C-ASBR-1", &commands(&["show version"]))
        .unwrap_err();
    assert!(matches!(err, TriageError::InvalidScope(_)));

    assert_eq!(h.dispatcher.job_count(), 0);
    assert_eq!(h.fake.connect_count("C-ASBR-1"), 0);
}

// ============================================================================
// Timeouts and persistence
// ============================================================================

#[tokio::test]
async fn test_hanging_command_times_out() {
    let fake = FakeDeviceExecutor::new().with_hang("C-ASBR-1", "show bgp summary");
    let config = CaptureConfig {
        command_timeout_secs: 1,
        ..CaptureConfig::default()
    };
    let h = harness(fake, config);

    let resp = h
        .dispatcher
        .submit(&scope(), "C-ASBR-1", &commands(&["show bgp summary"]))
        .unwrap();

    let err = h
        .dispatcher
        .wait(&resp.job_id, Duration::from_millis(100))
        .await
        .unwrap_err();
    assert!(matches!(err, TriageError::Timeout(_)));

    let job = h.dispatcher.wait(&resp.job_id, WAIT).await.unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    match &job.raw_logs[0].outcome {
        RawOutcome::Failed { reason } => assert!(reason.contains("timed out")),
        other => panic!("unexpected outcome {:?}", other),
    }
}

#[tokio::test]
async fn test_raw_logs_persisted_per_host() {
    let h = harness(healthy_fake(), CaptureConfig::default());
    let resp = h
        .dispatcher
        .submit(&scope(), "C-ASBR-1", &commands(&["show bgp summary", "show bfd session"]))
        .unwrap();
    let job = h.dispatcher.wait(&resp.job_id, WAIT).await.unwrap();

    let writer = RawLogWriter::new(h.catalog.clone());
    let stored = writer.read_all(&scope(), "C-ASBR-1").await.unwrap();
    assert_eq!(stored.len(), job.raw_logs.len());
    assert_eq!(stored[0].id, job.raw_logs[0].id);

    let show_log = fs::read_to_string(writer.show_log_path(&scope(), "C-ASBR-1")).unwrap();
    assert!(show_log.contains("show bfd session"));
}
