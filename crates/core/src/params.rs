//! Generation parameter tables and validation.
//!
//! The remote service speaks scheduler names, not UI sampler names, and
//! expects explicit pixel dimensions rather than aspect-ratio keys.
//! Both mappings are fixed tables; anything outside them is rejected
//! before submission.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::resource::is_sdxl_family;

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

/// Minimum number of resources attached to a generation job.
pub const MIN_RESOURCES: usize = 1;
/// Maximum number of resources attached to a generation job.
pub const MAX_RESOURCES: usize = 10;
/// Maximum sampling steps accepted for a single image.
pub const MAX_STEPS: u32 = 100;
/// Inclusive CFG scale bounds.
pub const MIN_CFG_SCALE: f64 = 1.0;
pub const MAX_CFG_SCALE: f64 = 30.0;
/// Inclusive clip-skip bounds.
pub const MIN_CLIP_SKIP: u32 = 1;
pub const MAX_CLIP_SKIP: u32 = 4;
/// Maximum images per job.
pub const MAX_QUANTITY: u32 = 10;

// ---------------------------------------------------------------------------
// Sampler -> scheduler mapping
// ---------------------------------------------------------------------------

/// UI sampler names mapped to the scheduler identifiers the remote
/// service understands.
pub const SAMPLER_SCHEDULERS: &[(&str, &str)] = &[
    ("Euler a", "EulerA"),
    ("Euler", "Euler"),
    ("LMS", "LMS"),
    ("Heun", "Heun"),
    ("DPM2", "DPM2"),
    ("DPM2 a", "DPM2A"),
    ("DPM++ 2S a", "DPM2SA"),
    ("DPM++ 2M", "DPM2M"),
    ("DPM++ SDE", "DPMSDE"),
    ("DPM fast", "DPMFast"),
    ("DPM adaptive", "DPMAdaptive"),
    ("LMS Karras", "LMSKarras"),
    ("DPM2 Karras", "DPM2Karras"),
    ("DPM2 a Karras", "DPM2AKarras"),
    ("DPM++ 2S a Karras", "DPM2SAKarras"),
    ("DPM++ 2M Karras", "DPM2MKarras"),
    ("DPM++ SDE Karras", "DPMSDEKarras"),
    ("DDIM", "DDIM"),
    ("PLMS", "PLMS"),
    ("UniPC", "UniPC"),
];

/// Look up the remote scheduler name for a UI sampler name.
pub fn scheduler_for_sampler(sampler: &str) -> Option<&'static str> {
    SAMPLER_SCHEDULERS
        .iter()
        .find(|(name, _)| *name == sampler)
        .map(|(_, scheduler)| *scheduler)
}

/// Reverse lookup: UI sampler name for a remote scheduler name.
///
/// Used when reconstructing a request for display from a raw remote
/// response.
pub fn sampler_for_scheduler(scheduler: &str) -> Option<&'static str> {
    SAMPLER_SCHEDULERS
        .iter()
        .find(|(_, name)| *name == scheduler)
        .map(|(sampler, _)| *sampler)
}

// ---------------------------------------------------------------------------
// Aspect ratios
// ---------------------------------------------------------------------------

/// Aspect-ratio keys mapped to pixel dimensions per base-model family.
///
/// Key `"0"` is landscape, `"1"` square, `"2"` portrait. SDXL-family
/// checkpoints use the higher native resolution grid.
const ASPECT_RATIOS_SD1: &[(&str, (u32, u32))] =
    &[("0", (768, 512)), ("1", (512, 512)), ("2", (512, 768))];

const ASPECT_RATIOS_SDXL: &[(&str, (u32, u32))] =
    &[("0", (1216, 832)), ("1", (1024, 1024)), ("2", (832, 1216))];

/// Resolve an aspect-ratio key into `(width, height)` for a base model.
pub fn dimensions(aspect_ratio: &str, base_model: &str) -> Option<(u32, u32)> {
    let table = if is_sdxl_family(base_model) {
        ASPECT_RATIOS_SDXL
    } else {
        ASPECT_RATIOS_SD1
    };
    table
        .iter()
        .find(|(key, _)| *key == aspect_ratio)
        .map(|(_, dims)| *dims)
}

// ---------------------------------------------------------------------------
// GenerationParams
// ---------------------------------------------------------------------------

/// User-supplied generation parameters for one image job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationParams {
    pub prompt: String,
    #[serde(default)]
    pub negative_prompt: String,
    pub sampler: String,
    pub steps: u32,
    pub cfg_scale: f64,
    /// Aspect-ratio key into the dimensions table (`"0"`, `"1"`, `"2"`).
    pub aspect_ratio: String,
    pub seed: Option<i64>,
    pub clip_skip: u32,
    pub base_model: String,
    /// Explicit NSFW flag from the user; `None` means unspecified.
    pub nsfw: Option<bool>,
}

/// Validate user-supplied generation parameters.
pub fn validate(params: &GenerationParams, quantity: u32) -> Result<(), CoreError> {
    if params.prompt.trim().is_empty() {
        return Err(CoreError::Validation(
            "Prompt must not be empty".to_string(),
        ));
    }
    if params.steps == 0 || params.steps > MAX_STEPS {
        return Err(CoreError::Validation(format!(
            "Steps must be between 1 and {MAX_STEPS} (got {})",
            params.steps
        )));
    }
    if !(MIN_CFG_SCALE..=MAX_CFG_SCALE).contains(&params.cfg_scale) {
        return Err(CoreError::Validation(format!(
            "CFG scale must be between {MIN_CFG_SCALE} and {MAX_CFG_SCALE} (got {})",
            params.cfg_scale
        )));
    }
    if !(MIN_CLIP_SKIP..=MAX_CLIP_SKIP).contains(&params.clip_skip) {
        return Err(CoreError::Validation(format!(
            "Clip skip must be between {MIN_CLIP_SKIP} and {MAX_CLIP_SKIP} (got {})",
            params.clip_skip
        )));
    }
    if quantity == 0 || quantity > MAX_QUANTITY {
        return Err(CoreError::Validation(format!(
            "Quantity must be between 1 and {MAX_QUANTITY} (got {quantity})"
        )));
    }
    if scheduler_for_sampler(&params.sampler).is_none() {
        return Err(CoreError::Validation(format!(
            "Unknown sampler '{}'",
            params.sampler
        )));
    }
    if dimensions(&params.aspect_ratio, &params.base_model).is_none() {
        return Err(CoreError::Validation(format!(
            "Unknown aspect ratio '{}'",
            params.aspect_ratio
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_params() -> GenerationParams {
        GenerationParams {
            prompt: "a painting of a lighthouse".to_string(),
            negative_prompt: String::new(),
            sampler: "Euler a".to_string(),
            steps: 20,
            cfg_scale: 7.0,
            aspect_ratio: "1".to_string(),
            seed: None,
            clip_skip: 1,
            base_model: "SD1".to_string(),
            nsfw: None,
        }
    }

    #[test]
    fn scheduler_lookup_known_and_unknown() {
        assert_eq!(scheduler_for_sampler("Euler a"), Some("EulerA"));
        assert_eq!(scheduler_for_sampler("DPM++ 2M Karras"), Some("DPM2MKarras"));
        assert_eq!(scheduler_for_sampler("Bogus"), None);
    }

    #[test]
    fn scheduler_mapping_is_reversible() {
        for (sampler, scheduler) in SAMPLER_SCHEDULERS {
            assert_eq!(sampler_for_scheduler(scheduler), Some(*sampler));
        }
    }

    #[test]
    fn square_aspect_ratio_is_512_for_sd1() {
        assert_eq!(dimensions("1", "SD1"), Some((512, 512)));
    }

    #[test]
    fn sdxl_uses_native_resolution_grid() {
        assert_eq!(dimensions("1", "SDXL"), Some((1024, 1024)));
        assert_eq!(dimensions("2", "SDXL"), Some((832, 1216)));
    }

    #[test]
    fn unknown_aspect_ratio_is_none() {
        assert_eq!(dimensions("3", "SD1"), None);
    }

    #[test]
    fn validate_accepts_valid_params() {
        assert!(validate(&valid_params(), 4).is_ok());
    }

    #[test]
    fn validate_rejects_empty_prompt() {
        let mut params = valid_params();
        params.prompt = "   ".to_string();
        assert!(validate(&params, 1).is_err());
    }

    #[test]
    fn validate_rejects_out_of_range_steps() {
        let mut params = valid_params();
        params.steps = 0;
        assert!(validate(&params, 1).is_err());
        params.steps = MAX_STEPS + 1;
        assert!(validate(&params, 1).is_err());
    }

    #[test]
    fn validate_rejects_unknown_sampler() {
        let mut params = valid_params();
        params.sampler = "Midjourney".to_string();
        assert!(validate(&params, 1).is_err());
    }

    #[test]
    fn validate_rejects_zero_quantity() {
        assert!(validate(&valid_params(), 0).is_err());
    }
}
