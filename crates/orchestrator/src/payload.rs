//! Wire types for the remote job service.
//!
//! Jobs are submitted as a `$type`-discriminated JSON union; each job
//! kind gets its own strongly-typed payload struct rather than an
//! untyped blob.

use std::collections::BTreeMap;

use atelier_core::training::JobEventKind;
use atelier_core::types::Timestamp;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Submission payloads
// ---------------------------------------------------------------------------

/// The discriminated job payload union sent to `POST /jobs`.
///
/// The wire union also defines `prepareModel`, `blobGet` and
/// `blobDelete` discriminators; this client never submits those, so
/// they are left unmodelled.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "$type")]
pub enum JobPayload {
    #[serde(rename = "textToImage")]
    TextToImage(TextToImagePayload),

    #[serde(rename = "imageResourceTraining")]
    ImageResourceTraining(TrainingPayload),

    #[serde(rename = "copyAsset")]
    CopyAsset(CopyAssetPayload),

    #[serde(rename = "clearAssets")]
    ClearAssets(ClearAssetsPayload),
}

/// One image-generation job.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextToImagePayload {
    /// Checkpoint resource reference (e.g. `"@resource:1234"`).
    pub model: String,
    pub params: TextToImageParams,
    pub quantity: u32,
    /// Secondary resources keyed by resource reference.
    pub additional_networks: BTreeMap<String, AdditionalNetwork>,
    /// Opaque correlation metadata echoed back by the service.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, serde_json::Value>,
}

/// Generation parameters in the remote service's vocabulary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextToImageParams {
    pub prompt: String,
    pub negative_prompt: String,
    /// Scheduler name (already mapped from the UI sampler name).
    pub scheduler: String,
    pub steps: u32,
    pub cfg_scale: f64,
    pub width: u32,
    pub height: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    pub clip_skip: u32,
    pub base_model: String,
}

/// One model fine-tuning job.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingPayload {
    /// Model file reference being trained.
    pub model: String,
    /// URI of the packaged training data.
    pub training_data: String,
    /// Trainer parameters, opaque to this core.
    pub params: serde_json::Value,
    /// Host called back when the job completes asynchronously.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, serde_json::Value>,
}

/// Copy one output asset of a finished job to a destination URI.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyAssetPayload {
    pub job_id: String,
    pub asset_name: String,
    pub destination_uri: String,
}

/// Delete all stored assets of a job.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearAssetsPayload {
    pub job_id: String,
}

/// An additional network (LoRA, embedding) attached to a generation job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdditionalNetwork {
    /// Network kind: `"lora"` or `"embed"`.
    #[serde(rename = "type")]
    pub network_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strength: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger_word: Option<String>,
}

/// Build the resource reference string used as additional-network key
/// and checkpoint model reference.
pub fn resource_ref(version_id: atelier_core::types::DbId) -> String {
    format!("@resource:{version_id}")
}

/// Parse a resource reference string back into its version ID.
pub fn parse_resource_ref(reference: &str) -> Option<atelier_core::types::DbId> {
    reference.strip_prefix("@resource:")?.parse().ok()
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Response body of `POST /jobs`.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitJobsResponse {
    pub jobs: Vec<JobHandle>,
}

/// One accepted job from a submission response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobHandle {
    pub job_id: String,
    /// Inline result for synchronous job kinds (e.g. `copyAsset`).
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub queue_position: Option<i32>,
    #[serde(default)]
    pub estimated_completion_date: Option<Timestamp>,
}

/// Snapshot of a job from `GET /jobs/{id}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    pub job_id: String,
    /// Service providers the job has been assigned to. Empty means the
    /// job is not actually being worked on.
    #[serde(default)]
    pub service_providers: BTreeMap<String, serde_json::Value>,
}

impl JobSnapshot {
    /// Whether the job has been picked up by at least one provider.
    pub fn is_assigned(&self) -> bool {
        !self.service_providers.is_empty()
    }
}

/// One lifecycle event from `GET /jobs/{id}/events`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub date_time: Timestamp,
}

impl JobEvent {
    /// Parse the wire event type into the kinds the sweep acts on.
    pub fn kind(&self) -> Option<JobEventKind> {
        JobEventKind::from_str(&self.event_type)
    }
}

/// Result blob of a `copyAsset` job.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyAssetResult {
    pub found: bool,
    #[serde(default)]
    pub file_size: Option<u64>,
}

/// Body of `PUT /jobs/{id}` used to taint (cancel) a job.
#[derive(Debug, Clone, Serialize)]
pub struct TaintJobRequest {
    pub reason: String,
    pub context: String,
}
