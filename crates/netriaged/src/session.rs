//! Triage session manager - the per-incident state machine.
//!
//! ```text
//! Created -> AwaitingInput -> Dispatching -> Analyzing -> AwaitingInput ... -> Closed
//! ```
//!
//! Each session sits behind its own async mutex, so ingests on one session
//! serialize while different sessions proceed independently. The manager
//! reads capture results only through dispatcher snapshots.
//!
//! A caller that goes away mid-ingest drops the round. The session guard
//! then puts the session back to `AwaitingInput`; the dispatched job keeps
//! running and a repeat request picks it up from the fingerprint cache.

use crate::assist::{DiagnosisAssist, NarrativeRequest};
use crate::catalog::ScopeCatalog;
use crate::config::SessionConfig;
use crate::dispatcher::CaptureDispatcher;
use crate::findings::{contradiction, summarize, FindingsBook};
use crate::history::{HistoryEvent, TrialHistory};
use crate::intent::{
    protocol_tech, CaptureTarget, Intent, IntentResolver, RuleIntentResolver, SessionView, Symptom,
};
use crate::trusted::TrustedCatalog;
use chrono::{DateTime, Utc};
use netriage_common::commands::{is_read_only, normalize_command};
use netriage_common::parsers::extract;
use netriage_common::rpc::{DispatchSummary, IngestResponse, RawExcerpt, StartResponse};
use netriage_common::showlog::FAILED_MARKER;
use netriage_common::{
    CaptureJob, CloseReason, CommandFamily, Device, FindingDelta, JobStatus, Protocol, RawLog,
    RawOutcome, Scope, SessionSnapshot, SessionState, TriageError, TriageResult, Turn, TurnAction,
};
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

struct Session {
    id: String,
    scope: Scope,
    devices: Vec<Device>,
    state: SessionState,
    turns: Vec<Turn>,
    book: FindingsBook,
    created_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
    close_reason: Option<CloseReason>,
    closed_at: Option<DateTime<Utc>>,
}

impl Session {
    fn transition(&mut self, next: SessionState) -> TriageResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(TriageError::Internal(format!(
                "session {} cannot move from {} to {}",
                self.id, self.state, next
            )));
        }
        debug!("  Session {}: {} -> {}", self.id, self.state, next);
        self.state = next;
        Ok(())
    }

    fn host_names(&self) -> Vec<String> {
        self.devices.iter().map(|d| d.name.clone()).collect()
    }

    fn device(&self, host: &str) -> Option<&Device> {
        self.devices.iter().find(|d| d.name == host)
    }

    fn push_turn(
        &mut self,
        user_text: &str,
        action: TurnAction,
        prompt: &str,
        deltas: &[FindingDelta],
        at: DateTime<Utc>,
    ) {
        let seq = self.turns.len() as u32 + 1;
        self.turns.push(Turn {
            seq,
            user_text: user_text.to_string(),
            action,
            prompt: prompt.to_string(),
            findings_changed: deltas.iter().map(|d| d.finding.key()).collect(),
            at,
        });
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id.clone(),
            scope: self.scope.clone(),
            hosts: self.host_names(),
            state: self.state,
            turns: self.turns.clone(),
            findings: self.book.all(),
            created_at: self.created_at,
            last_activity: self.last_activity,
            close_reason: self.close_reason,
        }
    }

    fn response(&self, prompt: String) -> IngestResponse {
        IngestResponse {
            session_id: self.id.clone(),
            state: self.state,
            findings_delta: Vec::new(),
            prompt,
            dispatched: Vec::new(),
            suggested_commands: Vec::new(),
            raw_excerpts: Vec::new(),
            narrative: None,
        }
    }
}

/// A session plus the view served while someone holds it.
struct SessionSlot {
    session: Mutex<Session>,
    settled: StdMutex<SessionSnapshot>,
}

impl SessionSlot {
    fn new(session: Session) -> Self {
        Self {
            settled: StdMutex::new(session.snapshot()),
            session: Mutex::new(session),
        }
    }

    async fn acquire(&self) -> SessionGuard<'_> {
        SessionGuard {
            session: self.session.lock().await,
            settled: &self.settled,
        }
    }

    fn try_acquire(&self) -> Option<SessionGuard<'_>> {
        self.session.try_lock().ok().map(|session| SessionGuard {
            session,
            settled: &self.settled,
        })
    }

    /// The view as of the last release.
    fn settled(&self) -> SessionSnapshot {
        self.settled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Exclusive hold on a session. Released mid-round, it returns the session
/// to `AwaitingInput`. Every release refreshes the settled view.
struct SessionGuard<'a> {
    session: MutexGuard<'a, Session>,
    settled: &'a StdMutex<SessionSnapshot>,
}

impl Deref for SessionGuard<'_> {
    type Target = Session;

    fn deref(&self) -> &Session {
        &self.session
    }
}

impl DerefMut for SessionGuard<'_> {
    fn deref_mut(&mut self) -> &mut Session {
        &mut self.session
    }
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        let state = self.session.state;
        if matches!(state, SessionState::Dispatching | SessionState::Analyzing)
            && self.session.transition(SessionState::AwaitingInput).is_ok()
        {
            warn!(
                "  Session {}: round interrupted while {}, awaiting input again",
                self.session.id, state
            );
        }
        let snapshot = self.session.snapshot();
        *self.settled.lock().unwrap_or_else(PoisonError::into_inner) = snapshot;
    }
}

/// Sessions closed and dropped by one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub closed: usize,
    pub dropped: usize,
}

/// Collected results of one capture round.
#[derive(Default)]
struct Round {
    deltas: Vec<FindingDelta>,
    dispatched: Vec<DispatchSummary>,
    excerpts: Vec<RawExcerpt>,
    command_failures: Vec<String>,
}

pub struct TriageSessionManager {
    catalog: ScopeCatalog,
    dispatcher: CaptureDispatcher,
    trusted: Arc<TrustedCatalog>,
    resolver: Arc<dyn IntentResolver>,
    assist: Option<Arc<dyn DiagnosisAssist>>,
    assist_timeout: Duration,
    history: TrialHistory,
    config: SessionConfig,
    sessions: RwLock<HashMap<String, Arc<SessionSlot>>>,
}

impl TriageSessionManager {
    pub fn new(
        catalog: ScopeCatalog,
        dispatcher: CaptureDispatcher,
        trusted: Arc<TrustedCatalog>,
        history: TrialHistory,
        config: SessionConfig,
    ) -> Self {
        Self {
            catalog,
            dispatcher,
            resolver: Arc::new(RuleIntentResolver::new(Arc::clone(&trusted))),
            trusted,
            assist: None,
            assist_timeout: Duration::from_secs(8),
            history,
            config,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn IntentResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_assist(mut self, assist: Arc<dyn DiagnosisAssist>, timeout: Duration) -> Self {
        self.assist = Some(assist);
        self.assist_timeout = timeout;
        self
    }

    /// Open a session over hosts of one scope.
    pub async fn start(&self, scope: &Scope, hosts: &[String]) -> TriageResult<StartResponse> {
        let inventory = self.catalog.resolve(scope)?;
        if hosts.is_empty() {
            return Err(TriageError::InvalidHost(
                "at least one host is required".to_string(),
            ));
        }

        let mut devices: Vec<Device> = Vec::new();
        for host in hosts {
            let device = inventory.find(host).cloned().ok_or_else(|| {
                TriageError::InvalidHost(format!("{} is not in the {} inventory", host, scope))
            })?;
            if !devices.iter().any(|d| d.name == device.name) {
                devices.push(device);
            }
        }

        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4().simple().to_string(),
            scope: scope.clone(),
            devices,
            state: SessionState::Created,
            turns: Vec::new(),
            book: FindingsBook::new(),
            created_at: now,
            last_activity: now,
            close_reason: None,
            closed_at: None,
        };
        let session_id = session.id.clone();
        let host_names = session.host_names();

        self.sessions
            .write()
            .await
            .insert(session_id.clone(), Arc::new(SessionSlot::new(session)));

        self.history
            .record(
                scope,
                &session_id,
                HistoryEvent::Start {
                    hosts: host_names.clone(),
                },
            )
            .await;
        info!("  Session {} started on {} for {}", session_id, scope, host_names.join(", "));

        Ok(StartResponse {
            session_id,
            ttl_min: self.config.ttl_min,
            hosts: host_names,
            scope: scope.clone(),
        })
    }

    async fn lookup(&self, session_id: &str) -> TriageResult<Arc<SessionSlot>> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| TriageError::UnknownSession(session_id.to_string()))
    }

    /// Process one operator utterance.
    pub async fn ingest(&self, session_id: &str, text: &str) -> TriageResult<IngestResponse> {
        let deadline = Instant::now() + self.config.ingest_timeout();
        let slot = self.lookup(session_id).await?;
        let mut guard = tokio::time::timeout_at(deadline, slot.acquire())
            .await
            .map_err(|_| TriageError::Timeout(format!("session {} is busy", session_id)))?;
        let session = &mut *guard;

        if session.state.is_closed() {
            return Err(TriageError::SessionClosed(session_id.to_string()));
        }

        let now = Utc::now();
        if session.state == SessionState::Created {
            session.transition(SessionState::AwaitingInput)?;
        }
        session.last_activity = now;

        let view = SessionView {
            state: session.state,
            devices: &session.devices,
            findings: &session.book,
        };
        let intent = self.resolver.resolve(text, &view);

        match intent {
            Intent::Close => self.close_locked(session, text, CloseReason::Operator).await,
            Intent::Clarify {
                question,
                suggestions,
            } => {
                session.transition(SessionState::AwaitingInput)?;
                session.push_turn(text, TurnAction::Clarify, &question, &[], now);
                self.history
                    .record(
                        &session.scope,
                        &session.id,
                        HistoryEvent::Clarify {
                            user_text: text.to_string(),
                            question: question.clone(),
                        },
                    )
                    .await;

                let mut response = session.response(question);
                response.suggested_commands = suggestions;
                Ok(response)
            }
            Intent::Capture {
                targets,
                symptoms,
                protocols,
            } => {
                self.capture(session, text, targets, symptoms, protocols, deadline)
                    .await
            }
        }
    }

    async fn close_locked(
        &self,
        session: &mut Session,
        text: &str,
        reason: CloseReason,
    ) -> TriageResult<IngestResponse> {
        session.transition(SessionState::Closed)?;
        let now = Utc::now();
        session.close_reason = Some(reason);
        session.closed_at = Some(now);

        let prompt = format!("Session closed with {} findings.", session.book.len());
        session.push_turn(text, TurnAction::Close, &prompt, &[], now);
        self.history
            .record(&session.scope, &session.id, HistoryEvent::Close { reason })
            .await;
        info!("  Session {} closed by operator", session.id);

        Ok(session.response(prompt))
    }

    async fn capture(
        &self,
        session: &mut Session,
        text: &str,
        targets: Vec<CaptureTarget>,
        symptoms: Vec<Symptom>,
        protocols: Vec<Protocol>,
        deadline: Instant,
    ) -> TriageResult<IngestResponse> {
        session.transition(SessionState::Dispatching)?;
        let now = Utc::now();
        let mut round = Round::default();

        let mut pending = Vec::new();
        for target in &targets {
            self.history
                .record(
                    &session.scope,
                    &session.id,
                    HistoryEvent::Proposal {
                        host: target.host.clone(),
                        commands: target.commands.clone(),
                        user_text: text.to_string(),
                    },
                )
                .await;
            match self
                .dispatcher
                .submit(&session.scope, &target.host, &target.commands)
            {
                Ok(resp) => pending.push((target, resp.job_id)),
                Err(e) => {
                    warn!("  Session {}: capture on {} rejected: {}", session.id, target.host, e);
                    round
                        .deltas
                        .push(session.book.mark_unavailable(&target.host, &e.to_string(), now));
                }
            }
        }

        for (target, job_id) in pending {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.dispatcher.wait(&job_id, remaining).await {
                Ok(job) => {
                    self.record_dispatch(session, &job.host, &job_id, job.status)
                        .await;
                    round.dispatched.push(DispatchSummary {
                        host: job.host.clone(),
                        commands: job.commands.clone(),
                        job_id,
                        status: job.status,
                    });
                    self.absorb_job(session, &job, &mut round, now);
                }
                Err(e) => {
                    let status = self
                        .dispatcher
                        .get(&job_id)
                        .map(|j| j.status)
                        .unwrap_or(JobStatus::Running);
                    self.record_dispatch(session, &target.host, &job_id, status)
                        .await;
                    round.dispatched.push(DispatchSummary {
                        host: target.host.clone(),
                        commands: target.commands.clone(),
                        job_id,
                        status,
                    });
                    let reason = format!("{}; the job keeps running and a repeat request reuses it", e);
                    round
                        .deltas
                        .push(session.book.mark_unavailable(&target.host, &reason, now));
                }
            }
        }

        session.transition(SessionState::Analyzing)?;

        let hosts: Vec<String> = targets.iter().map(|t| t.host.clone()).collect();
        let contra = contradiction(&symptoms, &protocols, &hosts, &session.book);

        let mut prompt = summarize(&round.deltas);
        if !round.command_failures.is_empty() {
            prompt.push_str("\nCommands that failed: ");
            prompt.push_str(&round.command_failures.join("; "));
        }
        let mut suggested = Vec::new();
        if let Some(c) = &contra {
            prompt = format!("{}\n\n{}", c, prompt);
            suggested = self.follow_ups(session, &targets, &protocols);
        }

        let narrative = self.narrate(session, text, &hosts, contra).await;

        session.transition(SessionState::AwaitingInput)?;
        session.push_turn(text, TurnAction::Capture, &prompt, &round.deltas, now);
        info!(
            "  Session {}: {} jobs, {} finding changes",
            session.id,
            round.dispatched.len(),
            round.deltas.len()
        );

        let mut response = session.response(prompt);
        response.findings_delta = round.deltas;
        response.dispatched = round.dispatched;
        response.suggested_commands = suggested;
        response.raw_excerpts = round.excerpts;
        response.narrative = narrative;
        Ok(response)
    }

    async fn record_dispatch(&self, session: &Session, host: &str, job_id: &str, status: JobStatus) {
        self.history
            .record(
                &session.scope,
                &session.id,
                HistoryEvent::Dispatch {
                    host: host.to_string(),
                    job_id: job_id.to_string(),
                    status: format!("{:?}", status).to_lowercase(),
                },
            )
            .await;
    }

    /// Fold a terminal job into the session's findings.
    fn absorb_job(&self, session: &mut Session, job: &CaptureJob, round: &mut Round, now: DateTime<Utc>) {
        if job.status != JobStatus::Succeeded {
            let reason = job
                .failure
                .as_ref()
                .map(|f| f.message.clone())
                .unwrap_or_else(|| "capture failed".to_string());
            round
                .deltas
                .push(session.book.mark_unavailable(&job.host, &reason, now));
            return;
        }

        if let Some(delta) = session.book.clear_unavailable(&job.host, now) {
            round.deltas.push(delta);
        }

        for batch in &job.batches {
            round
                .deltas
                .extend(session.book.merge_batch(&job.host, batch, now));

            if batch.low_confidence {
                let output = job
                    .raw_logs
                    .iter()
                    .find(|r| r.id == batch.raw_log_id)
                    .and_then(|r| r.output());
                if let Some(output) = output {
                    round.excerpts.push(RawExcerpt {
                        host: job.host.clone(),
                        command: batch.command.clone(),
                        text: output.chars().take(self.config.max_excerpt_chars).collect(),
                    });
                }
            }
        }

        let final_attempt = job.attempts.last().map(|a| a.number);
        for raw in job.failed_raw_logs() {
            if Some(raw.attempt) == final_attempt {
                let reason = match &raw.outcome {
                    RawOutcome::Failed { reason } => reason.as_str(),
                    RawOutcome::Captured { .. } => "",
                };
                round
                    .command_failures
                    .push(format!("{} on {} ({})", raw.command, job.host, reason));
            }
        }
    }

    /// Trusted commands for the implicated protocols not yet run this round.
    fn follow_ups(&self, session: &Session, targets: &[CaptureTarget], protocols: &[Protocol]) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for target in targets {
            let Some(device) = session.device(&target.host) else {
                continue;
            };
            for protocol in protocols {
                for cmd in self.trusted.commands_for(device.platform(), protocol_tech(*protocol)) {
                    if !target.commands.contains(&cmd) && !out.contains(&cmd) {
                        out.push(cmd);
                    }
                }
            }
        }
        out
    }

    async fn narrate(
        &self,
        session: &Session,
        text: &str,
        hosts: &[String],
        contra: Option<String>,
    ) -> Option<String> {
        let assist = self.assist.as_ref()?;
        let request = NarrativeRequest {
            user_text: text.to_string(),
            hosts: hosts.to_vec(),
            findings: session.book.all().into_iter().map(|f| f.statement).collect(),
            contradiction: contra,
        };
        match tokio::time::timeout(self.assist_timeout, assist.narrate(&request)).await {
            Ok(Ok(narrative)) => Some(narrative),
            Ok(Err(e)) => {
                warn!("  Diagnosis assist failed: {}", e);
                None
            }
            Err(_) => {
                warn!(
                    "  Diagnosis assist timed out after {}s",
                    self.assist_timeout.as_secs()
                );
                None
            }
        }
    }

    /// Re-read the latest show-log section of `command` on `host` and fold
    /// it into the session's findings. The section also goes to the session
    /// transcript.
    pub async fn analyze_command(
        &self,
        session_id: &str,
        host: &str,
        command: &str,
    ) -> TriageResult<IngestResponse> {
        let deadline = Instant::now() + self.config.ingest_timeout();
        let slot = self.lookup(session_id).await?;
        let mut guard = tokio::time::timeout_at(deadline, slot.acquire())
            .await
            .map_err(|_| TriageError::Timeout(format!("session {} is busy", session_id)))?;
        let session = &mut *guard;

        if session.state.is_closed() {
            return Err(TriageError::SessionClosed(session_id.to_string()));
        }
        let device = session
            .devices
            .iter()
            .find(|d| d.name.eq_ignore_ascii_case(host.trim()))
            .cloned()
            .ok_or_else(|| {
                TriageError::InvalidHost(format!("{} is not part of session {}", host, session_id))
            })?;
        let command = command.split_whitespace().collect::<Vec<_>>().join(" ");
        if !is_read_only(&command) {
            return Err(TriageError::InvalidCommand(format!(
                "'{}' is not a plain show command",
                command
            )));
        }

        let section = self
            .dispatcher
            .raw_logs()
            .latest_section(&session.scope, &device.name, &command)
            .await
            .map_err(|e| TriageError::Internal(format!("{:#}", e)))?
            .ok_or_else(|| {
                TriageError::NotCaptured(format!("'{}' on {} has no show-log section", command, device.name))
            })?;

        let now = Utc::now();
        if session.state == SessionState::Created {
            session.transition(SessionState::AwaitingInput)?;
        }
        session.last_activity = now;
        session.transition(SessionState::Analyzing)?;

        self.history
            .append_transcript(&session.scope, &session.id, &device.name, &command, &section)
            .await;

        let mut deltas = Vec::new();
        let mut excerpts = Vec::new();
        let prompt = match section.strip_prefix(FAILED_MARKER) {
            Some(reason) => format!(
                "The last capture of '{}' on {} failed: {}",
                command,
                device.name,
                reason.trim()
            ),
            None => {
                let raw = RawLog {
                    id: format!("showlog-{}", Uuid::new_v4().simple()),
                    job_id: "show-log".to_string(),
                    attempt: 0,
                    scope: session.scope.clone(),
                    host: device.name.clone(),
                    command: command.clone(),
                    captured_at: now,
                    outcome: RawOutcome::Captured {
                        output: section.clone(),
                    },
                };
                let batch = extract(&raw);
                deltas = session.book.merge_batch(&device.name, &batch, now);
                if batch.low_confidence {
                    excerpts.push(RawExcerpt {
                        host: device.name.clone(),
                        command: command.clone(),
                        text: section.chars().take(self.config.max_excerpt_chars).collect(),
                    });
                }
                summarize(&deltas)
            }
        };

        let wanted = normalize_command(&command);
        let follow_ups: Vec<String> = match CommandFamily::classify(&command).protocol() {
            Some(protocol) => self
                .trusted
                .commands_for(device.platform(), protocol_tech(protocol))
                .into_iter()
                .filter(|c| normalize_command(c) != wanted)
                .collect(),
            None => Vec::new(),
        };

        self.history
            .record(
                &session.scope,
                &session.id,
                HistoryEvent::Analyze {
                    host: device.name.clone(),
                    command: command.clone(),
                    follow_ups: follow_ups.clone(),
                },
            )
            .await;

        session.transition(SessionState::AwaitingInput)?;
        session.push_turn(&command, TurnAction::Analyze, &prompt, &deltas, now);
        info!(
            "  Session {}: analyzed '{}' on {}, {} finding changes",
            session.id,
            command,
            device.name,
            deltas.len()
        );

        let mut response = session.response(prompt);
        response.findings_delta = deltas;
        response.suggested_commands = follow_ups;
        response.raw_excerpts = excerpts;
        Ok(response)
    }

    /// Close a session outside the ingest path.
    pub async fn close(&self, session_id: &str, reason: CloseReason) -> TriageResult<SessionSnapshot> {
        let slot = self.lookup(session_id).await?;
        let mut session = slot.acquire().await;
        if session.state.is_closed() {
            return Err(TriageError::SessionClosed(session_id.to_string()));
        }
        session.transition(SessionState::Closed)?;
        session.close_reason = Some(reason);
        session.closed_at = Some(Utc::now());
        self.history
            .record(&session.scope, session_id, HistoryEvent::Close { reason })
            .await;
        info!("  Session {} closed ({:?})", session_id, reason);
        Ok(session.snapshot())
    }

    /// Current view of a session. While an ingest holds the session, the
    /// view as of its last settled turn is returned instead of waiting.
    pub async fn snapshot(&self, session_id: &str) -> TriageResult<SessionSnapshot> {
        let slot = self.lookup(session_id).await?;
        let snapshot = match slot.try_acquire() {
            Some(session) => session.snapshot(),
            None => slot.settled(),
        };
        Ok(snapshot)
    }

    /// Close idle sessions and drop closed ones past retention. Sessions
    /// busy with an ingest are skipped.
    pub async fn sweep_idle(&self, now: DateTime<Utc>) -> SweepReport {
        let slots: Vec<(String, Arc<SessionSlot>)> = self
            .sessions
            .read()
            .await
            .iter()
            .map(|(id, h)| (id.clone(), Arc::clone(h)))
            .collect();

        let mut report = SweepReport::default();
        let mut expired = Vec::new();
        for (id, slot) in slots {
            let Some(mut session) = slot.try_acquire() else {
                continue;
            };

            if let Some(closed_at) = session.closed_at {
                if now - closed_at > self.config.retention() {
                    expired.push(id);
                }
                continue;
            }

            if now - session.last_activity > self.config.idle_ttl() {
                if session.transition(SessionState::Closed).is_err() {
                    continue;
                }
                session.close_reason = Some(CloseReason::IdleTimeout);
                session.closed_at = Some(now);
                self.history
                    .record(
                        &session.scope,
                        &id,
                        HistoryEvent::Close {
                            reason: CloseReason::IdleTimeout,
                        },
                    )
                    .await;
                info!("  Session {} closed after idle timeout", id);
                report.closed += 1;
            }
        }

        if !expired.is_empty() {
            let mut sessions = self.sessions.write().await;
            for id in &expired {
                sessions.remove(id);
            }
            report.dropped = expired.len();
            debug!("  Dropped {} expired sessions", report.dropped);
        }
        report
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
