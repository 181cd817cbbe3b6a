//! Domain view of a generation request.
//!
//! The remote service owns the canonical state; everything here is a
//! point-in-time reconstruction built from a remote response, never
//! persisted locally.

use atelier_core::params::GenerationParams;
use atelier_core::resource::ModelType;
use atelier_core::types::{DbId, Timestamp};
use serde::Serialize;

/// Remote lifecycle status of a generation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RequestStatus {
    Pending,
    Processing,
    Succeeded,
    Cancelled,
    Error,
}

impl RequestStatus {
    /// Map a remote status label to the internal enum.
    ///
    /// Unknown labels map to `Pending` — a label this core does not
    /// recognise is always some pre-terminal state.
    pub fn from_remote(label: &str) -> Self {
        match label {
            "Claimed" | "Processing" => RequestStatus::Processing,
            "Succeeded" => RequestStatus::Succeeded,
            "Cancelled" | "Deleted" => RequestStatus::Cancelled,
            "Failed" | "Expired" => RequestStatus::Error,
            _ => RequestStatus::Pending,
        }
    }
}

/// A resource as attached to one request, with display name resolved.
#[derive(Debug, Clone, Serialize)]
pub struct RequestResource {
    pub id: DbId,
    pub name: String,
    pub model_type: ModelType,
    /// Per-use strength for additional networks; `None` for the
    /// checkpoint itself.
    pub strength: Option<f64>,
}

/// One submitted image job, reconstructed for display.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationRequest {
    /// Remote-assigned job ID.
    pub id: String,
    pub user_id: DbId,
    pub created_at: Timestamp,
    pub status: RequestStatus,
    pub queue_position: Option<i32>,
    pub estimated_completion: Option<Timestamp>,
    /// Parameters with injected safety fragments stripped back out.
    pub params: GenerationParams,
    pub resources: Vec<RequestResource>,
    /// Whether alternative providers are available, from the global
    /// feature toggle.
    pub alternatives_available: bool,
}

/// One resource reference in a submission.
#[derive(Debug, Clone)]
pub struct ResourceInput {
    pub id: DbId,
    /// Requested strength; clamped into the resource's bounds.
    pub strength: Option<f64>,
}

/// Input to [`crate::orchestrate::GenerationOrchestrator::submit`].
#[derive(Debug, Clone)]
pub struct SubmitGenerationRequest {
    pub user_id: DbId,
    /// Moderators bypass the generation-enabled switch.
    pub is_moderator: bool,
    pub resources: Vec<ResourceInput>,
    pub params: GenerationParams,
    /// Number of images to generate.
    pub quantity: u32,
}
