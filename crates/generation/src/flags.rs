//! Feature-flag accessor interface.
//!
//! Flags are read through a trait rather than module-level globals so
//! every component receives its configuration provider explicitly.

/// Global toggles consulted by the submission flow.
pub trait FeatureFlags: Send + Sync {
    /// Master switch for image generation. Moderators bypass it.
    fn generation_enabled(&self) -> bool;

    /// Whether the minor safety net injects additional trigger
    /// resources into both prompts.
    fn minor_safety_net(&self) -> bool;

    /// Whether generation jobs are charged against the ledger. When
    /// off, every job costs zero and never touches the ledger.
    fn charging_enabled(&self) -> bool;

    /// Surfaced on formatted requests so the UI can offer alternative
    /// providers.
    fn alternatives_available(&self) -> bool;
}

/// Environment-backed flags, read once at startup.
#[derive(Debug, Clone)]
pub struct EnvFlags {
    generation_enabled: bool,
    minor_safety_net: bool,
    charging_enabled: bool,
    alternatives_available: bool,
}

impl EnvFlags {
    /// Load flags from environment variables.
    ///
    /// | Env Var                  | Default |
    /// |--------------------------|---------|
    /// | `GENERATION_ENABLED`     | `true`  |
    /// | `MINOR_SAFETY_NET`       | `true`  |
    /// | `GENERATION_CHARGING`    | `true`  |
    /// | `ALTERNATIVES_AVAILABLE` | `false` |
    pub fn from_env() -> Self {
        Self {
            generation_enabled: env_bool("GENERATION_ENABLED", true),
            minor_safety_net: env_bool("MINOR_SAFETY_NET", true),
            charging_enabled: env_bool("GENERATION_CHARGING", true),
            alternatives_available: env_bool("ALTERNATIVES_AVAILABLE", false),
        }
    }
}

impl FeatureFlags for EnvFlags {
    fn generation_enabled(&self) -> bool {
        self.generation_enabled
    }

    fn minor_safety_net(&self) -> bool {
        self.minor_safety_net
    }

    fn charging_enabled(&self) -> bool {
        self.charging_enabled
    }

    fn alternatives_available(&self) -> bool {
        self.alternatives_available
    }
}

fn env_bool(name: &str, default: bool) -> bool {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
