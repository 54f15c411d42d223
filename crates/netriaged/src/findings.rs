//! Findings - session-level statements folded from facts.
//!
//! Merge rules per key `(host, protocol, subject)`:
//!
//! | prior          | incoming               | result                       |
//! |----------------|------------------------|------------------------------|
//! | none           | one state              | `Observed`, delta `Added`    |
//! | same state     | same state             | fact ids refreshed, no delta |
//! | state A        | state B                | `Changed{from: A}`, delta    |
//! | any            | several states at once | `Conflicting`, delta         |
//!
//! A failed or timed-out capture becomes a `CaptureUnavailable` finding for
//! the host. The next successful capture from that host removes it.

use crate::intent::Symptom;
use chrono::{DateTime, Utc};
use netriage_common::{
    DeltaChange, Fact, FactBatch, Finding, FindingDelta, FindingKey, FindingKind, FindingStatus,
    Protocol, StateLabel,
};
use std::collections::BTreeMap;

const UNAVAILABLE_SUBJECT: &str = "capture";

#[derive(Debug, Clone, Default)]
pub struct FindingsBook {
    findings: BTreeMap<FindingKey, Finding>,
}

impl FindingsBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.findings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn get(&self, key: &FindingKey) -> Option<&Finding> {
        self.findings.get(key)
    }

    /// Key order: host, protocol, subject.
    pub fn all(&self) -> Vec<Finding> {
        self.findings.values().cloned().collect()
    }

    /// State findings for the given hosts and protocols.
    pub fn state_findings<'a>(
        &'a self,
        hosts: &'a [String],
        protocols: &'a [Protocol],
    ) -> impl Iterator<Item = &'a Finding> + 'a {
        self.findings.values().filter(move |f| {
            f.kind == FindingKind::State
                && hosts.contains(&f.host)
                && protocols.contains(&f.protocol)
        })
    }

    /// Fold one batch of facts captured from `host`.
    pub fn merge_batch(&mut self, host: &str, batch: &FactBatch, now: DateTime<Utc>) -> Vec<FindingDelta> {
        let mut grouped: BTreeMap<FindingKey, Vec<&Fact>> = BTreeMap::new();
        for fact in &batch.facts {
            let key = FindingKey {
                host: host.to_string(),
                protocol: fact.protocol,
                subject: fact.subject.clone(),
            };
            grouped.entry(key).or_default().push(fact);
        }

        let mut deltas = Vec::new();
        for (key, facts) in grouped {
            let mut states: Vec<StateLabel> = Vec::new();
            for f in &facts {
                if !states.contains(&f.state) {
                    states.push(f.state);
                }
            }
            let ids: Vec<String> = facts.iter().map(|f| f.id.clone()).collect();
            // the last fact of the batch is the freshest reading
            let latest = facts[facts.len() - 1];

            if let Some(delta) = self.apply(key, latest, states, ids, now) {
                deltas.push(delta);
            }
        }
        deltas
    }

    fn apply(
        &mut self,
        key: FindingKey,
        latest: &Fact,
        states: Vec<StateLabel>,
        ids: Vec<String>,
        now: DateTime<Utc>,
    ) -> Option<FindingDelta> {
        let conflicting = states.len() > 1;
        let state = if conflicting { StateLabel::Unknown } else { latest.state };
        let statement = if conflicting {
            format!(
                "{} reports conflicting states: {}",
                describe_subject(&key.host, latest),
                states.iter().map(|s| s.to_string()).collect::<Vec<_>>().join(", ")
            )
        } else {
            statement(&key.host, latest)
        };

        if !self.findings.contains_key(&key) {
            let status = if conflicting {
                FindingStatus::Conflicting { states }
            } else {
                FindingStatus::Observed
            };
            let finding = Finding {
                host: key.host.clone(),
                protocol: key.protocol,
                subject: key.subject.clone(),
                statement,
                state,
                status,
                kind: FindingKind::State,
                fact_ids: ids,
                revision: 1,
                updated_at: now,
            };
            let change = if conflicting {
                DeltaChange::Conflict
            } else {
                DeltaChange::Added
            };
            self.findings.insert(key, finding.clone());
            return Some(FindingDelta { change, finding });
        }

        let existing = self.findings.get_mut(&key)?;
        let was_conflicting = matches!(existing.status, FindingStatus::Conflicting { .. });
        if !conflicting && !was_conflicting && existing.state == state {
            for id in ids {
                if !existing.fact_ids.contains(&id) {
                    existing.fact_ids.push(id);
                }
            }
            existing.statement = statement;
            existing.updated_at = now;
            return None;
        }

        let change = if conflicting {
            existing.status = FindingStatus::Conflicting { states };
            DeltaChange::Conflict
        } else {
            existing.status = FindingStatus::Changed {
                from: existing.state,
            };
            DeltaChange::Changed
        };
        existing.state = state;
        existing.statement = statement;
        existing.fact_ids = ids;
        existing.revision += 1;
        existing.updated_at = now;

        Some(FindingDelta {
            change,
            finding: existing.clone(),
        })
    }

    /// Record that a host could not be captured.
    pub fn mark_unavailable(&mut self, host: &str, reason: &str, now: DateTime<Utc>) -> FindingDelta {
        let key = FindingKey {
            host: host.to_string(),
            protocol: Protocol::Platform,
            subject: UNAVAILABLE_SUBJECT.to_string(),
        };
        let statement = format!("Capture from {} unavailable: {}", host, reason);

        let finding = match self.findings.get_mut(&key) {
            Some(existing) => {
                existing.statement = statement;
                existing.revision += 1;
                existing.updated_at = now;
                existing.clone()
            }
            None => {
                let finding = Finding {
                    host: host.to_string(),
                    protocol: Protocol::Platform,
                    subject: UNAVAILABLE_SUBJECT.to_string(),
                    statement,
                    state: StateLabel::Unknown,
                    status: FindingStatus::Observed,
                    kind: FindingKind::CaptureUnavailable,
                    fact_ids: Vec::new(),
                    revision: 1,
                    updated_at: now,
                };
                self.findings.insert(key, finding.clone());
                finding
            }
        };

        FindingDelta {
            change: DeltaChange::Unavailable,
            finding,
        }
    }

    /// Drop the host's `CaptureUnavailable` finding after it answered again.
    pub fn clear_unavailable(&mut self, host: &str, now: DateTime<Utc>) -> Option<FindingDelta> {
        let key = FindingKey {
            host: host.to_string(),
            protocol: Protocol::Platform,
            subject: UNAVAILABLE_SUBJECT.to_string(),
        };
        let mut finding = self.findings.remove(&key)?;
        finding.statement = format!("Capture from {} recovered", host);
        finding.revision += 1;
        finding.updated_at = now;
        Some(FindingDelta {
            change: DeltaChange::Recovered,
            finding,
        })
    }
}

/// Human statement for a single-state fact.
pub fn statement(host: &str, fact: &Fact) -> String {
    match fact.protocol {
        Protocol::Bfd => format!("BFD to {} is {}", bfd_peer(fact), fact.state),
        Protocol::Bgp if fact.attr("network").is_some() => {
            format!("BGP path {} is {}", fact.subject, fact.state)
        }
        Protocol::Bgp => match fact.attr("prefixes_received") {
            Some(n) => format!(
                "BGP neighbor {} is {} ({} prefixes received)",
                fact.subject, fact.state, n
            ),
            None => format!("BGP neighbor {} is {}", fact.subject, fact.state),
        },
        Protocol::Mpls => format!("MPLS forwarding for {} is {}", fact.subject, fact.state),
        Protocol::Srv6 => format!("SRv6 locator {} is {}", fact.subject, fact.state),
        Protocol::Interface => format!("Interface {} on {} is {}", fact.subject, host, fact.state),
        Protocol::Platform => format!("{} uptime is {}", host, fact.raw_state),
    }
}

fn describe_subject(host: &str, fact: &Fact) -> String {
    match fact.protocol {
        Protocol::Bfd => format!("BFD to {}", bfd_peer(fact)),
        p => format!("{} {} on {}", p, fact.subject, host),
    }
}

fn bfd_peer(fact: &Fact) -> &str {
    fact.attr("peer")
        .or_else(|| fact.subject.rsplit('→').next())
        .unwrap_or(fact.subject.as_str())
}

/// Symptom reported but every implicated state is healthy. Returns the
/// prompt text, or `None` when findings agree with the symptom or nothing
/// was captured for the implicated protocols.
pub fn contradiction(
    symptoms: &[Symptom],
    protocols: &[Protocol],
    hosts: &[String],
    book: &FindingsBook,
) -> Option<String> {
    if symptoms.is_empty() {
        return None;
    }
    let relevant: Vec<&Finding> = book.state_findings(hosts, protocols).collect();
    if relevant.is_empty() || !relevant.iter().all(|f| f.state.is_healthy()) {
        return None;
    }

    let symptom = symptoms
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(" and ");
    let protos = protocols
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join("/");
    let evidence = relevant
        .iter()
        .map(|f| f.statement.as_str())
        .collect::<Vec<_>>()
        .join("; ");

    Some(format!(
        "You reported {} {} on {}, but every captured {} state is healthy right now: {}. \
         The problem may be intermittent. The suggested commands show session history \
         and detail; run them or describe when the issue was last seen.",
        protos,
        symptom,
        hosts.join(", "),
        protos,
        evidence
    ))
}

/// Prompt summarizing one ingest's deltas.
pub fn summarize(deltas: &[FindingDelta]) -> String {
    if deltas.is_empty() {
        return "No change in findings since the last capture. What else are you seeing?"
            .to_string();
    }

    let mut lines = Vec::new();
    for d in deltas {
        let f = &d.finding;
        let line = match (&d.change, &f.status) {
            (DeltaChange::Changed, FindingStatus::Changed { from }) => {
                format!("- {} (was {})", f.statement, from)
            }
            (DeltaChange::Unavailable, _) => format!("- {}", f.statement),
            (DeltaChange::Conflict, _) => format!("- {} (needs a re-check)", f.statement),
            _ => format!("- {}", f.statement),
        };
        lines.push(line);
    }

    let unhealthy = deltas
        .iter()
        .filter(|d| d.finding.kind == FindingKind::State && !d.finding.state.is_healthy())
        .count();
    let tail = if unhealthy > 0 {
        format!("{} finding(s) are not healthy. Which one should I dig into?", unhealthy)
    } else {
        "What next?".to_string()
    };

    format!("{}\n{}", lines.join("\n"), tail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use netriage_common::{CommandFamily, Provenance};

    fn fact(id: &str, protocol: Protocol, subject: &str, state: StateLabel) -> Fact {
        let mut attributes = BTreeMap::new();
        if protocol == Protocol::Bfd {
            if let Some(peer) = subject.split('→').nth(1) {
                attributes.insert("peer".to_string(), peer.to_string());
            }
        }
        Fact {
            id: id.to_string(),
            protocol,
            subject: subject.to_string(),
            attributes,
            state,
            raw_state: state.to_string().to_uppercase(),
            provenance: Provenance {
                raw_log_id: id.split('#').next().unwrap_or(id).to_string(),
                job_id: "job-1".to_string(),
                host: "C-ASBR-1".to_string(),
                command: "show bfd session".to_string(),
            },
        }
    }

    fn batch(facts: Vec<Fact>) -> FactBatch {
        FactBatch {
            raw_log_id: "raw-1".to_string(),
            command: "show bfd session".to_string(),
            family: CommandFamily::BfdSession,
            facts,
            unparsed_residue: 0,
            low_confidence: false,
        }
    }

    const SUBJECT: &str = "Gi0/0/0/0→100.64.231.1";

    #[test]
    fn test_new_fact_is_added() {
        let mut book = FindingsBook::new();
        let deltas = book.merge_batch(
            "C-ASBR-1",
            &batch(vec![fact("raw-1#0", Protocol::Bfd, SUBJECT, StateLabel::Up)]),
            Utc::now(),
        );
        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].change, DeltaChange::Added);
        assert_eq!(deltas[0].finding.statement, "BFD to 100.64.231.1 is Up");
    }

    #[test]
    fn test_same_state_refreshes_without_delta() {
        let mut book = FindingsBook::new();
        book.merge_batch(
            "C-ASBR-1",
            &batch(vec![fact("raw-1#0", Protocol::Bfd, SUBJECT, StateLabel::Up)]),
            Utc::now(),
        );
        let deltas = book.merge_batch(
            "C-ASBR-1",
            &batch(vec![fact("raw-2#0", Protocol::Bfd, SUBJECT, StateLabel::Up)]),
            Utc::now(),
        );
        assert!(deltas.is_empty());
        let all = book.all();
        assert_eq!(all[0].fact_ids, vec!["raw-1#0".to_string(), "raw-2#0".to_string()]);
        assert_eq!(all[0].revision, 1);
    }

    #[test]
    fn test_state_change_reports_previous() {
        let mut book = FindingsBook::new();
        book.merge_batch(
            "C-ASBR-1",
            &batch(vec![fact("raw-1#0", Protocol::Bfd, SUBJECT, StateLabel::Up)]),
            Utc::now(),
        );
        let deltas = book.merge_batch(
            "C-ASBR-1",
            &batch(vec![fact("raw-2#0", Protocol::Bfd, SUBJECT, StateLabel::Down)]),
            Utc::now(),
        );
        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].change, DeltaChange::Changed);
        assert_eq!(
            deltas[0].finding.status,
            FindingStatus::Changed {
                from: StateLabel::Up
            }
        );
        assert_eq!(deltas[0].finding.revision, 2);
    }

    #[test]
    fn test_conflicting_states_in_one_batch() {
        let mut book = FindingsBook::new();
        let deltas = book.merge_batch(
            "C-ASBR-1",
            &batch(vec![
                fact("raw-1#0", Protocol::Bfd, SUBJECT, StateLabel::Up),
                fact("raw-1#1", Protocol::Bfd, SUBJECT, StateLabel::Down),
            ]),
            Utc::now(),
        );
        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].change, DeltaChange::Conflict);
        assert_eq!(
            deltas[0].finding.status,
            FindingStatus::Conflicting {
                states: vec![StateLabel::Up, StateLabel::Down]
            }
        );
    }

    #[test]
    fn test_unavailable_finding() {
        let mut book = FindingsBook::new();
        let delta = book.mark_unavailable("B-ASBR-1", "connection refused", Utc::now());
        assert_eq!(delta.change, DeltaChange::Unavailable);
        assert_eq!(delta.finding.kind, FindingKind::CaptureUnavailable);
        assert!(delta.finding.statement.contains("B-ASBR-1"));
    }

    #[test]
    fn test_unavailable_clears_on_recovery() {
        let mut book = FindingsBook::new();
        let now = Utc::now();
        assert!(book.clear_unavailable("C-ASBR-1", now).is_none());

        book.mark_unavailable("C-ASBR-1", "connection refused", now);
        book.mark_unavailable("B-ASBR-1", "connection refused", now);
        let delta = book.clear_unavailable("C-ASBR-1", now).unwrap();
        assert_eq!(delta.change, DeltaChange::Recovered);
        assert_eq!(delta.finding.statement, "Capture from C-ASBR-1 recovered");
        assert_eq!(delta.finding.revision, 2);

        let left: Vec<String> = book.all().into_iter().map(|f| f.host).collect();
        assert_eq!(left, vec!["B-ASBR-1".to_string()]);
        assert!(summarize(&[delta]).contains("- Capture from C-ASBR-1 recovered"));
    }

    #[test]
    fn test_contradiction_when_all_healthy() {
        let mut book = FindingsBook::new();
        book.merge_batch(
            "C-ASBR-1",
            &batch(vec![fact("raw-1#0", Protocol::Bfd, SUBJECT, StateLabel::Up)]),
            Utc::now(),
        );
        let hosts = vec!["C-ASBR-1".to_string()];
        let text = contradiction(
            &[Symptom::Flapping],
            &[Protocol::Bgp, Protocol::Bfd],
            &hosts,
            &book,
        )
        .unwrap();
        assert!(text.contains("flapping"));
        assert!(text.contains("BFD to 100.64.231.1 is Up"));

        assert!(contradiction(&[], &[Protocol::Bfd], &hosts, &book).is_none());
    }

    #[test]
    fn test_no_contradiction_when_something_is_down() {
        let mut book = FindingsBook::new();
        book.merge_batch(
            "C-ASBR-1",
            &batch(vec![
                fact("raw-1#0", Protocol::Bfd, SUBJECT, StateLabel::Up),
                fact("raw-1#1", Protocol::Bfd, "Gi0/0/0/1→100.64.231.5", StateLabel::Down),
            ]),
            Utc::now(),
        );
        let hosts = vec!["C-ASBR-1".to_string()];
        assert!(contradiction(&[Symptom::Down], &[Protocol::Bfd], &hosts, &book).is_none());
    }
}
