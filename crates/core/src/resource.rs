//! Domain model for reusable generation resources (checkpoints, LoRAs,
//! embeddings) as cached by the resource resolver.

use serde::{Deserialize, Serialize};

use crate::types::DbId;

// ---------------------------------------------------------------------------
// ModelType
// ---------------------------------------------------------------------------

/// Kind of model artifact a resource describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelType {
    Checkpoint,
    Lora,
    TextualInversion,
    Vae,
    Other,
}

impl ModelType {
    /// String representation for database storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelType::Checkpoint => "checkpoint",
            ModelType::Lora => "lora",
            ModelType::TextualInversion => "textual_inversion",
            ModelType::Vae => "vae",
            ModelType::Other => "other",
        }
    }

    /// Parse from a string, defaulting to `Other` for unknown values.
    pub fn from_str(s: &str) -> Self {
        match s {
            "checkpoint" => ModelType::Checkpoint,
            "lora" => ModelType::Lora,
            "textual_inversion" => ModelType::TextualInversion,
            "vae" => ModelType::Vae,
            _ => ModelType::Other,
        }
    }
}

// ---------------------------------------------------------------------------
// Availability
// ---------------------------------------------------------------------------

/// Who may attach a resource to a generation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Availability {
    Public,
    Private,
}

impl Availability {
    /// String representation for database storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Availability::Public => "public",
            Availability::Private => "private",
        }
    }

    /// Parse from a string, defaulting to `Private` for unknown values.
    ///
    /// Unknown values default closed: an availability we cannot
    /// interpret must not be treated as publicly usable.
    pub fn from_str(s: &str) -> Self {
        match s {
            "public" => Availability::Public,
            _ => Availability::Private,
        }
    }
}

// ---------------------------------------------------------------------------
// Resource
// ---------------------------------------------------------------------------

/// Per-use strength bounds carried by some resources.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrengthSettings {
    pub min_strength: f64,
    pub max_strength: f64,
}

/// One version of a reusable model artifact, as resolved from the
/// source-of-truth store. Immutable per version; never mutated by the
/// orchestration core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    /// Version ID (the identifier jobs reference).
    pub id: DbId,
    /// Parent model ID.
    pub model_id: DbId,
    /// Human-readable name, used when formatting responses.
    pub name: String,
    pub model_type: ModelType,
    /// Base model family string, e.g. `"SD1"` or `"SDXL"`.
    pub base_model: String,
    /// Trigger words baked into the artifact, in training order.
    pub trained_words: Vec<String>,
    /// Whether the generation service can actually load this resource.
    pub covered: bool,
    pub availability: Availability,
    /// Flagged as depicting a real person of interest.
    pub poi: bool,
    pub settings: Option<StrengthSettings>,
}

impl Resource {
    /// Clamp a requested strength into this resource's allowed bounds.
    ///
    /// Resources without explicit settings accept any strength.
    pub fn clamp_strength(&self, strength: f64) -> f64 {
        match &self.settings {
            Some(s) => strength.clamp(s.min_strength, s.max_strength),
            None => strength,
        }
    }
}

/// Whether a base model family string is part of the SDXL generation.
///
/// Safe-negative injection is skipped for SDXL-family checkpoints, which
/// do not carry the SD1-era embeddings the injection references.
pub fn is_sdxl_family(base_model: &str) -> bool {
    base_model.starts_with("SDXL") || base_model == "Pony"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_type_round_trips_through_strings() {
        for mt in [
            ModelType::Checkpoint,
            ModelType::Lora,
            ModelType::TextualInversion,
            ModelType::Vae,
            ModelType::Other,
        ] {
            assert_eq!(ModelType::from_str(mt.as_str()), mt);
        }
    }

    #[test]
    fn unknown_model_type_defaults_to_other() {
        assert_eq!(ModelType::from_str("hypernetwork"), ModelType::Other);
    }

    #[test]
    fn unknown_availability_defaults_to_private() {
        assert_eq!(Availability::from_str("unlisted"), Availability::Private);
    }

    #[test]
    fn clamp_strength_respects_bounds() {
        let resource = Resource {
            id: 1,
            model_id: 1,
            name: "test".into(),
            model_type: ModelType::Lora,
            base_model: "SD1".into(),
            trained_words: vec![],
            covered: true,
            availability: Availability::Public,
            poi: false,
            settings: Some(StrengthSettings {
                min_strength: -1.0,
                max_strength: 2.0,
            }),
        };
        assert_eq!(resource.clamp_strength(5.0), 2.0);
        assert_eq!(resource.clamp_strength(-3.0), -1.0);
        assert_eq!(resource.clamp_strength(0.8), 0.8);
    }

    #[test]
    fn sdxl_family_detection() {
        assert!(is_sdxl_family("SDXL"));
        assert!(is_sdxl_family("SDXL Turbo"));
        assert!(is_sdxl_family("Pony"));
        assert!(!is_sdxl_family("SD1"));
        assert!(!is_sdxl_family("SD2"));
    }
}
