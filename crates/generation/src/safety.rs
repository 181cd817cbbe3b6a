//! The safety pipeline: moderation, heuristics, and safety-net
//! injection.
//!
//! The external moderation call fails open on transport errors —
//! availability wins over strictness there — while a *flagged* verdict
//! is fail-closed at the business layer: the caller must reject the
//! request before any debit occurs.

use std::sync::Arc;

use atelier_core::prompt_safety::{
    classify, prepend_trigger, resolve_nsfw, InjectedResource, MINOR_NEGATIVES, MINOR_POSITIVES,
    SAFE_NEGATIVES,
};
use atelier_core::resource::{is_sdxl_family, Resource};

use crate::flags::FeatureFlags;
use crate::moderation::Moderator;

/// Everything the submission flow needs to know after safety
/// evaluation.
#[derive(Debug, Clone)]
pub struct SafetyOutcome {
    /// The moderation service flagged the prompt; the caller must
    /// reject before debiting.
    pub moderation_flagged: bool,
    /// Categories that tripped, for the rejection message.
    pub moderation_categories: Vec<String>,
    /// Effective NSFW flag for the job.
    pub nsfw: bool,
    /// Positive prompt with any safety-net triggers prepended.
    pub positive_prompt: String,
    /// Negative prompt with any safety-net triggers prepended.
    pub negative_prompt: String,
    /// Safety-net resources to attach as additional networks.
    pub injected: Vec<InjectedResource>,
}

/// Validates and augments prompts before submission.
pub struct SafetyPipeline {
    moderator: Arc<dyn Moderator>,
    flags: Arc<dyn FeatureFlags>,
}

impl SafetyPipeline {
    pub fn new(moderator: Arc<dyn Moderator>, flags: Arc<dyn FeatureFlags>) -> Self {
        Self { moderator, flags }
    }

    /// Evaluate a prompt pair against moderation and the local
    /// heuristics, and inject safety-net resources where required.
    pub async fn evaluate(
        &self,
        prompt: &str,
        negative_prompt: &str,
        user_nsfw: Option<bool>,
        resources: &[Resource],
        base_model: &str,
    ) -> SafetyOutcome {
        // 1. External moderation, fail-open on transport error.
        let verdict = match self.moderator.check(prompt).await {
            Ok(verdict) => verdict,
            Err(e) => {
                tracing::warn!(error = %e, "Moderation call failed; continuing unflagged");
                Default::default()
            }
        };

        // 2. Local heuristics; a poi-flagged resource triggers the POI
        //    signal even when the prompt text does not.
        let mut signals = classify(prompt);
        if resources.iter().any(|r| r.poi) {
            signals.poi = true;
        }

        let nsfw = resolve_nsfw(user_nsfw, &signals);

        let mut positive_prompt = prompt.to_string();
        let mut negative_prompt = negative_prompt.to_string();
        let mut injected: Vec<InjectedResource> = Vec::new();

        // 3. Safe negatives for non-NSFW jobs on SD1-era checkpoints.
        if !nsfw && !is_sdxl_family(base_model) {
            for resource in SAFE_NEGATIVES {
                negative_prompt = prepend_trigger(resource.trigger_word, &negative_prompt);
                injected.push(*resource);
            }
        }

        // 4. Minor safety net: heuristic NSFW with minor-adjacent terms
        //    gets both prompts reinforced, behind the feature flag.
        if signals.nsfw && signals.minor && self.flags.minor_safety_net() {
            for resource in MINOR_POSITIVES {
                positive_prompt = prepend_trigger(resource.trigger_word, &positive_prompt);
                injected.push(*resource);
            }
            for resource in MINOR_NEGATIVES {
                negative_prompt = prepend_trigger(resource.trigger_word, &negative_prompt);
                injected.push(*resource);
            }
        }

        SafetyOutcome {
            moderation_flagged: verdict.flagged,
            moderation_categories: verdict.categories,
            nsfw,
            positive_prompt,
            negative_prompt,
            injected,
        }
    }
}
