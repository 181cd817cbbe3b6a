//! Row models for model files and their training-results metadata blob.
//!
//! The training pointers this core owns (remote job ID, ledger
//! transaction ID, submission time, status history) live inside the
//! `model_files.metadata` JSONB column under the `training_results`
//! key. The column belongs to the model-publishing flows; this core
//! only touches that one key.

use atelier_core::training::TrainingStatus;
use atelier_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// JSONB key under which training results are stored.
pub const TRAINING_RESULTS_KEY: &str = "training_results";

/// A row from the `model_files` table.
#[derive(Debug, Clone, FromRow)]
pub struct ModelFileRow {
    pub id: DbId,
    pub model_version_id: DbId,
    /// URI of the packaged training data.
    pub url: String,
    pub metadata: serde_json::Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ModelFileRow {
    /// Parse the training-results blob out of the metadata column.
    pub fn training_results(&self) -> Option<TrainingResults> {
        let value = self.metadata.get(TRAINING_RESULTS_KEY)?;
        serde_json::from_value(value.clone()).ok()
    }
}

/// Training pointers persisted in the model-file metadata blob.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingResults {
    /// Remote job ID of the current submission attempt.
    pub job_id: Option<String>,
    /// Ledger transaction ID of the debit backing this attempt.
    pub transaction_id: Option<String>,
    /// When the current attempt was submitted.
    pub submitted_at: Option<Timestamp>,
    /// How many submission attempts have been made.
    #[serde(default)]
    pub attempts: u32,
    /// Status transitions in order, for manual intervention.
    #[serde(default)]
    pub history: Vec<TrainingHistoryEntry>,
}

impl TrainingResults {
    /// Append a status transition to the history.
    pub fn push_history(&mut self, time: Timestamp, status: TrainingStatus) {
        self.history.push(TrainingHistoryEntry { time, status });
    }
}

/// One entry in the training status history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingHistoryEntry {
    pub time: Timestamp,
    pub status: TrainingStatus,
}

/// A sweep candidate: model file joined with its version's training
/// status.
#[derive(Debug, Clone, FromRow)]
pub struct TrainingJobRow {
    pub id: DbId,
    pub model_version_id: DbId,
    pub url: String,
    pub metadata: serde_json::Value,
    pub training_status: String,
    pub updated_at: Timestamp,
}

impl TrainingJobRow {
    /// Parse the training-results blob out of the metadata column.
    pub fn training_results(&self) -> Option<TrainingResults> {
        let value = self.metadata.get(TRAINING_RESULTS_KEY)?;
        serde_json::from_value(value.clone()).ok()
    }

    /// Parse the joined training status column.
    pub fn status(&self) -> Option<TrainingStatus> {
        TrainingStatus::from_str(&self.training_status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn training_results_round_trip_through_metadata() {
        let mut results = TrainingResults {
            job_id: Some("job-1".into()),
            transaction_id: Some("tx-1".into()),
            submitted_at: Some(Utc::now()),
            attempts: 1,
            history: vec![],
        };
        results.push_history(Utc::now(), TrainingStatus::Submitted);

        let metadata = serde_json::json!({
            TRAINING_RESULTS_KEY: serde_json::to_value(&results).unwrap(),
            "other_key": {"left": "alone"},
        });
        let row = ModelFileRow {
            id: 1,
            model_version_id: 2,
            url: "s3://training/data.zip".into(),
            metadata,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let parsed = row.training_results().unwrap();
        assert_eq!(parsed.job_id.as_deref(), Some("job-1"));
        assert_eq!(parsed.history.len(), 1);
        assert_eq!(parsed.history[0].status, TrainingStatus::Submitted);
    }

    #[test]
    fn missing_blob_parses_to_none() {
        let row = ModelFileRow {
            id: 1,
            model_version_id: 2,
            url: "s3://training/data.zip".into(),
            metadata: serde_json::json!({}),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(row.training_results().is_none());
    }
}
