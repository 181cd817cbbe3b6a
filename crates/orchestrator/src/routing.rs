//! Timestamp-based endpoint routing.
//!
//! Jobs submitted inside a configured time window are served by an
//! alternate deployment of the job service. The routing decision is a
//! pure function of the submission timestamp and must be recomputed on
//! every call — the same job can be polled both inside and outside the
//! window over its lifetime, so caching the choice at submission time
//! would send later polls to the wrong deployment.

use atelier_core::types::Timestamp;

/// One deployment of the remote job service.
#[derive(Debug, Clone)]
pub struct Endpoint {
    /// Base URL, e.g. `https://jobs.example.com`.
    pub base_url: String,
    /// Bearer token for this deployment.
    pub token: String,
}

/// Alternate deployment active for a bounded submission-time window.
#[derive(Debug, Clone)]
pub struct AlternateWindow {
    pub endpoint: Endpoint,
    /// Inclusive start of the submission-time window.
    pub from: Timestamp,
    /// Exclusive end of the submission-time window.
    pub until: Timestamp,
}

/// Full routing configuration: primary endpoint plus optional window.
#[derive(Debug, Clone)]
pub struct RoutingConfig {
    pub primary: Endpoint,
    pub alternate: Option<AlternateWindow>,
}

impl RoutingConfig {
    /// Load routing configuration from environment variables.
    ///
    /// | Env Var                     | Required | Notes                      |
    /// |-----------------------------|----------|----------------------------|
    /// | `ORCHESTRATOR_ENDPOINT`     | yes      | primary base URL           |
    /// | `ORCHESTRATOR_TOKEN`        | yes      | primary bearer token       |
    /// | `ORCHESTRATOR_ALT_ENDPOINT` | no       | alternate base URL         |
    /// | `ORCHESTRATOR_ALT_TOKEN`    | no       | alternate bearer token     |
    /// | `ORCHESTRATOR_ALT_FROM`     | no       | RFC 3339 window start      |
    /// | `ORCHESTRATOR_ALT_UNTIL`    | no       | RFC 3339 window end        |
    ///
    /// The alternate endpoint is only configured when all four of its
    /// variables are present and parseable.
    pub fn from_env() -> Self {
        let primary = Endpoint {
            base_url: std::env::var("ORCHESTRATOR_ENDPOINT")
                .expect("ORCHESTRATOR_ENDPOINT must be set"),
            token: std::env::var("ORCHESTRATOR_TOKEN").expect("ORCHESTRATOR_TOKEN must be set"),
        };

        let alternate = match (
            std::env::var("ORCHESTRATOR_ALT_ENDPOINT").ok(),
            std::env::var("ORCHESTRATOR_ALT_TOKEN").ok(),
            std::env::var("ORCHESTRATOR_ALT_FROM")
                .ok()
                .and_then(|v| v.parse::<Timestamp>().ok()),
            std::env::var("ORCHESTRATOR_ALT_UNTIL")
                .ok()
                .and_then(|v| v.parse::<Timestamp>().ok()),
        ) {
            (Some(base_url), Some(token), Some(from), Some(until)) => Some(AlternateWindow {
                endpoint: Endpoint { base_url, token },
                from,
                until,
            }),
            _ => None,
        };

        Self { primary, alternate }
    }
}

/// Choose the endpoint serving a job from its submission timestamp.
///
/// Pure and computed fresh per call; never cache the result.
pub fn choose_endpoint(submitted_at: Timestamp, config: &RoutingConfig) -> &Endpoint {
    match &config.alternate {
        Some(window) if submitted_at >= window.from && submitted_at < window.until => {
            &window.endpoint
        }
        _ => &config.primary,
    }
}
