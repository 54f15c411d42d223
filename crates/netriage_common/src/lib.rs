//! Shared types for netriage: data model, command families, fact extractors
//! and the HTTP wire format.

pub mod capture;
pub mod commands;
pub mod error;
pub mod facts;
pub mod parsers;
pub mod rpc;
pub mod scope;
pub mod session;
pub mod showlog;

pub use capture::{
    fingerprint, AttemptOutcome, CaptureAttempt, CaptureJob, FailureKind, JobFailure, JobStatus,
    RawLog, RawLogRef, RawOutcome,
};
pub use commands::CommandFamily;
pub use error::{ErrorKind, TriageError, TriageResult};
pub use facts::{Fact, FactBatch, Protocol, Provenance, StateLabel};
pub use scope::{Device, Platform, Scope};
pub use session::{
    CloseReason, DeltaChange, Finding, FindingDelta, FindingKey, FindingKind, FindingStatus,
    SessionSnapshot, SessionState, Turn, TurnAction,
};

/// Crate version, reported by `/health`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// System-wide config file
pub const CONFIG_PATH: &str = "/etc/netriage/config.toml";

/// Fallback config file under the state directory
pub const STATE_CONFIG_PATH: &str = "/var/lib/netriage/config.toml";

/// Default HTTP listen address
pub const DEFAULT_LISTEN: &str = "127.0.0.1:7860";
