//! Training job lifecycle state machine.
//!
//! The periodic monitor sweep feeds each candidate job through
//! [`evaluate`], a pure decision function, and then applies the returned
//! [`SweepAction`] through its stores and gateways. Keeping the decision
//! side-effect-free makes every timeout rule testable without a clock,
//! database, or remote service.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// TrainingStatus
// ---------------------------------------------------------------------------

/// Local lifecycle status of a training job.
///
/// Transitions are forward-only: `Pending -> Submitted ->
/// {Processing | Failed} -> {InReview | Failed}`. `InReview`, `Approved`
/// and `Failed` are terminal from this core's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrainingStatus {
    Pending,
    Submitted,
    Processing,
    InReview,
    Approved,
    Failed,
}

impl TrainingStatus {
    /// String representation for the model-version status column.
    pub fn as_str(&self) -> &'static str {
        match self {
            TrainingStatus::Pending => "pending",
            TrainingStatus::Submitted => "submitted",
            TrainingStatus::Processing => "processing",
            TrainingStatus::InReview => "in_review",
            TrainingStatus::Approved => "approved",
            TrainingStatus::Failed => "failed",
        }
    }

    /// Parse from the status column. Returns `None` for unknown values
    /// so the sweep can skip rows it does not understand.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TrainingStatus::Pending),
            "submitted" => Some(TrainingStatus::Submitted),
            "processing" => Some(TrainingStatus::Processing),
            "in_review" => Some(TrainingStatus::InReview),
            "approved" => Some(TrainingStatus::Approved),
            "failed" => Some(TrainingStatus::Failed),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// JobEventKind
// ---------------------------------------------------------------------------

/// Lifecycle event types reported by the remote job service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobEventKind {
    Initialized,
    Claimed,
    Updated,
    Succeeded,
    Failed,
    Rejected,
    LateRejected,
    Deleted,
    Expired,
}

impl JobEventKind {
    /// Parse a wire event type string. Returns `None` for event types
    /// this core does not act on.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Initialized" => Some(JobEventKind::Initialized),
            "Claimed" => Some(JobEventKind::Claimed),
            "Updated" => Some(JobEventKind::Updated),
            "Succeeded" => Some(JobEventKind::Succeeded),
            "Failed" => Some(JobEventKind::Failed),
            "Rejected" => Some(JobEventKind::Rejected),
            "LateRejected" => Some(JobEventKind::LateRejected),
            "Deleted" => Some(JobEventKind::Deleted),
            "Expired" => Some(JobEventKind::Expired),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Sweep decision
// ---------------------------------------------------------------------------

/// Per-state timeouts applied by the sweep.
#[derive(Debug, Clone)]
pub struct SweepThresholds {
    /// How long a job may sit in `Rejected` before it is failed.
    pub rejected_for: Duration,
    /// Quiet time after which a `Submitted` job triggers a queue check.
    pub submitted_stale: Duration,
    /// Quiet time after which a `Processing` job is considered stuck.
    pub processing_stale: Duration,
}

impl Default for SweepThresholds {
    fn default() -> Self {
        Self {
            rejected_for: Duration::hours(4),
            submitted_stale: Duration::minutes(10),
            processing_stale: Duration::minutes(20),
        }
    }
}

/// Why a job is being transitioned to `Failed`.
///
/// Carried into the refund reason so the ledger records why the charge
/// was reversed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailReason {
    RemoteFailed,
    RemoteDeleted,
    RemoteExpired,
    RejectedTooLong,
    NoProgress,
    /// The remote reported success but no output artifacts exist.
    MissingArtifacts,
    /// The job hit the configured cap on submission attempts.
    AttemptsExhausted,
}

impl FailReason {
    /// Human-readable refund reason.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailReason::RemoteFailed => "Training job failed remotely",
            FailReason::RemoteDeleted => "Training job was deleted remotely",
            FailReason::RemoteExpired => "Training job expired remotely",
            FailReason::RejectedTooLong => "Training job rejected for too long",
            FailReason::NoProgress => "Training job stopped reporting progress",
            FailReason::MissingArtifacts => "Training job produced no output artifacts",
            FailReason::AttemptsExhausted => "Training job exhausted its submission attempts",
        }
    }
}

/// What the sweep should do with one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepAction {
    /// No remote job recorded — create a fresh submission attempt.
    Resubmit,
    /// Remote reports success — verify output artifacts, then move to
    /// review (or fail if the artifacts are missing).
    VerifyOutputs,
    /// Transition to `Failed` and refund the associated transaction.
    Fail(FailReason),
    /// `Submitted` job went quiet — ask the remote queue whether it is
    /// actually assigned; resubmit if it is not.
    CheckQueue,
    /// Nothing to do this sweep.
    NoAction,
}

/// Point-in-time view of one training job, as read by the sweep.
#[derive(Debug, Clone)]
pub struct SweepContext {
    pub status: TrainingStatus,
    /// Whether a remote job ID has been recorded for this attempt.
    pub has_job_id: bool,
    /// Most recent remote event, if the fetch succeeded and any exist.
    pub latest_event: Option<JobEventKind>,
    /// Timestamp of the latest event, or the submission time when no
    /// event has been seen yet.
    pub last_activity: Timestamp,
}

/// Decide what to do with one training job this sweep.
pub fn evaluate(ctx: &SweepContext, thresholds: &SweepThresholds, now: Timestamp) -> SweepAction {
    if !ctx.has_job_id {
        return SweepAction::Resubmit;
    }

    let quiet_for = now - ctx.last_activity;

    match ctx.latest_event {
        Some(JobEventKind::Succeeded) => return SweepAction::VerifyOutputs,
        Some(JobEventKind::Failed) => return SweepAction::Fail(FailReason::RemoteFailed),
        Some(JobEventKind::Deleted) => return SweepAction::Fail(FailReason::RemoteDeleted),
        Some(JobEventKind::Expired) => return SweepAction::Fail(FailReason::RemoteExpired),
        Some(JobEventKind::Rejected | JobEventKind::LateRejected) => {
            if quiet_for > thresholds.rejected_for {
                return SweepAction::Fail(FailReason::RejectedTooLong);
            }
            // Otherwise rejected is equivalent to still-processing;
            // fall through to the staleness rules.
        }
        _ => {}
    }

    match ctx.status {
        TrainingStatus::Submitted if quiet_for > thresholds.submitted_stale => {
            SweepAction::CheckQueue
        }
        TrainingStatus::Processing if quiet_for > thresholds.processing_stale => {
            SweepAction::Fail(FailReason::NoProgress)
        }
        _ => SweepAction::NoAction,
    }
}
