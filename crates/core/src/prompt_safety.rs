//! Prompt-safety heuristics and safety-net injection tables.
//!
//! A local classifier scans prompt text for three independent signals
//! (NSFW terms, person-of-interest terms, minor-reference terms). The
//! signals drive the effective NSFW flag and decide which safety-net
//! resources get silently injected into the prompts sent to the remote
//! service. Injection is reversible: [`strip_injected`] removes every
//! known trigger word so reconstructed requests never show them.

use std::sync::LazyLock;

use regex::Regex;

use crate::types::DbId;

// ---------------------------------------------------------------------------
// Heuristic term lists
// ---------------------------------------------------------------------------

const NSFW_PATTERN: &str =
    r"(?i)\b(nude|naked|nsfw|topless|explicit|porn|erotic|hentai|nipples?|genitals?|sex|lewd)\b";

/// Honorific-plus-name constructions and direct real-person references.
const POI_PATTERN: &str =
    r"(?i)\b(president|senator|prime minister|pope|celebrity|celebrities|real person|actress|politician)\b";

const MINOR_PATTERN: &str = r"(?i)\b(child|children|kid|kids|toddler|infant|baby|minor|underage|loli|shota|teen|teenager|preteen|schoolgirl|schoolboy)\b";

/// Age constructions like `12yo`, `15 year old`, `9-years-old`.
const MINOR_AGE_PATTERN: &str = r"(?i)\b(1[0-7]|[1-9])[ -]?(yo|y/o|years?[ -]old)\b";

static NSFW_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(NSFW_PATTERN).expect("valid regex"));
static POI_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(POI_PATTERN).expect("valid regex"));
static MINOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(MINOR_PATTERN).expect("valid regex"));
static MINOR_AGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(MINOR_AGE_PATTERN).expect("valid regex"));

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Independent safety signals detected in prompt text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PromptSignals {
    /// Prompt contains NSFW terms.
    pub nsfw: bool,
    /// Prompt references a person of interest.
    pub poi: bool,
    /// Prompt references a minor.
    pub minor: bool,
}

/// Run the heuristic classifier over raw prompt text.
pub fn classify(text: &str) -> PromptSignals {
    PromptSignals {
        nsfw: NSFW_RE.is_match(text),
        poi: POI_RE.is_match(text),
        minor: MINOR_RE.is_match(text) || MINOR_AGE_RE.is_match(text),
    }
}

/// Resolve the effective NSFW flag for a job.
///
/// The explicit user flag defaults to `true` when unset and is OR-ed
/// with the heuristic. A POI or minor signal forces the flag to `false`
/// regardless of intent: safety overrides the user.
pub fn resolve_nsfw(user_flag: Option<bool>, signals: &PromptSignals) -> bool {
    if signals.poi || signals.minor {
        return false;
    }
    user_flag.unwrap_or(true) || signals.nsfw
}

// ---------------------------------------------------------------------------
// Safety-net injection tables
// ---------------------------------------------------------------------------

/// A resource and trigger word silently added to a prompt to bias the
/// remote model away from unsafe output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InjectedResource {
    /// Version ID of the embedding-style resource to attach.
    pub version_id: DbId,
    /// Trigger word to prepend to the prompt text.
    pub trigger_word: &'static str,
}

/// Negative-prompt resources injected for non-NSFW, non-SDXL jobs.
pub const SAFE_NEGATIVES: &[InjectedResource] = &[InjectedResource {
    version_id: 106_916,
    trigger_word: "bad_concepts_neg",
}];

/// Positive-prompt resources injected when the minor safety net fires.
pub const MINOR_POSITIVES: &[InjectedResource] = &[InjectedResource {
    version_id: 250_708,
    trigger_word: "youth_guard_pos",
}];

/// Negative-prompt resources injected when the minor safety net fires.
pub const MINOR_NEGATIVES: &[InjectedResource] = &[InjectedResource {
    version_id: 250_712,
    trigger_word: "youth_guard_neg",
}];

/// Whether a resource version ID belongs to the injection tables.
pub fn is_injected_resource(version_id: DbId) -> bool {
    SAFE_NEGATIVES
        .iter()
        .chain(MINOR_POSITIVES)
        .chain(MINOR_NEGATIVES)
        .any(|r| r.version_id == version_id)
}

/// Prepend a trigger word to a (possibly empty) prompt fragment.
pub fn prepend_trigger(trigger_word: &str, prompt: &str) -> String {
    if prompt.trim().is_empty() {
        trigger_word.to_string()
    } else {
        format!("{trigger_word}, {prompt}")
    }
}

/// Remove every known injected trigger word from prompt text.
///
/// The inverse of injection: splits on commas, drops fragments that are
/// exactly an injected trigger word, and rejoins the rest.
pub fn strip_injected(text: &str) -> String {
    text.split(',')
        .map(str::trim)
        .filter(|fragment| {
            !fragment.is_empty()
                && !SAFE_NEGATIVES
                    .iter()
                    .chain(MINOR_POSITIVES)
                    .chain(MINOR_NEGATIVES)
                    .any(|r| r.trigger_word == *fragment)
        })
        .collect::<Vec<_>>()
        .join(", ")
}
