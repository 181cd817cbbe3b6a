//! The generation submission flow.
//!
//! Gates a request through the feature switch, quota limiter, resource
//! validation, access checks, and the safety pipeline; debits the
//! ledger; submits to the remote job service; and reverse-maps the
//! response into the domain request model. The debit and the remote
//! call form a saga: any post-debit failure triggers a compensating
//! refund before the error is surfaced.

use std::collections::BTreeMap;
use std::sync::Arc;

use atelier_core::cost::generation_cost;
use atelier_core::error::CoreError;
use atelier_core::params::{
    self, dimensions, scheduler_for_sampler, GenerationParams, MAX_RESOURCES, MIN_RESOURCES,
};
use atelier_core::prompt_safety::strip_injected;
use atelier_core::resource::{Availability, ModelType, Resource};
use atelier_core::types::{DbId, Timestamp};
use atelier_ledger::{DebitRequest, LedgerService, TransactionType};
use atelier_orchestrator::api::OrchestratorError;
use atelier_orchestrator::gateway::JobGateway;
use atelier_orchestrator::payload::{
    resource_ref, AdditionalNetwork, JobHandle, TextToImageParams, TextToImagePayload,
};
use chrono::Utc;

use crate::flags::FeatureFlags;
use crate::limiter::QuotaLimiter;
use crate::request::{GenerationRequest, RequestResource, RequestStatus, SubmitGenerationRequest};
use crate::resolver::ResourceResolver;
use crate::safety::{SafetyOutcome, SafetyPipeline};
use crate::stores::AccessChecker;

/// Errors surfaced by the submission flow.
///
/// Everything except `SubmissionFailed`, `RemoteRateLimited`, and
/// `Internal` occurs before any side effect and needs no cleanup.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("Image generation is currently disabled")]
    Disabled,

    #[error("Generation quota exceeded; try again later")]
    RateLimited {
        /// Earliest time the quota window rolls over, if known.
        retry_after: Option<Timestamp>,
    },

    #[error("Invalid parameters: {0}")]
    InvalidInput(#[from] CoreError),

    #[error("Invalid resource set: {0}")]
    InvalidResourceSet(String),

    #[error("Access denied to one or more private resources")]
    AccessDenied,

    #[error("Prompt rejected by moderation")]
    ModerationRejected { categories: Vec<String> },

    #[error("Insufficient funds")]
    InsufficientFunds,

    /// The remote service rate-limited the submission (HTTP 429).
    /// Distinct from the internal quota limit.
    #[error("The job service rate limited the submission")]
    RemoteRateLimited,

    #[error("Job submission failed")]
    SubmissionFailed(#[source] OrchestratorError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Static configuration for the submission flow.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// Ledger account generation charges flow into.
    pub platform_account_id: i64,
}

impl GenerationConfig {
    /// Load from `PLATFORM_ACCOUNT_ID` (default 0).
    pub fn from_env() -> Self {
        Self {
            platform_account_id: std::env::var("PLATFORM_ACCOUNT_ID")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
        }
    }
}

/// Composes the resolver, safety pipeline, limiter, ledger, and job
/// gateway into the submit-and-format flow.
pub struct GenerationOrchestrator {
    flags: Arc<dyn FeatureFlags>,
    resolver: ResourceResolver,
    safety: SafetyPipeline,
    limiter: QuotaLimiter,
    ledger: Arc<dyn LedgerService>,
    gateway: Arc<dyn JobGateway>,
    access: Arc<dyn AccessChecker>,
    config: GenerationConfig,
}

impl GenerationOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        flags: Arc<dyn FeatureFlags>,
        resolver: ResourceResolver,
        safety: SafetyPipeline,
        limiter: QuotaLimiter,
        ledger: Arc<dyn LedgerService>,
        gateway: Arc<dyn JobGateway>,
        access: Arc<dyn AccessChecker>,
        config: GenerationConfig,
    ) -> Self {
        Self {
            flags,
            resolver,
            safety,
            limiter,
            ledger,
            gateway,
            access,
            config,
        }
    }

    /// Submit an image-generation request.
    pub async fn submit(
        &self,
        request: SubmitGenerationRequest,
    ) -> Result<GenerationRequest, GenerationError> {
        // Global switch; moderators bypass.
        if !self.flags.generation_enabled() && !request.is_moderator {
            return Err(GenerationError::Disabled);
        }

        // Quota gate, before any heavier work.
        if self.limiter.has_exceeded_limit(request.user_id).await? {
            return Err(GenerationError::RateLimited {
                retry_after: self.limiter.retry_estimate(request.user_id),
            });
        }

        params::validate(&request.params, request.quantity)?;

        let resources = self.validate_resources(&request).await?;
        let checkpoint = self.require_single_checkpoint(&resources)?;

        // Safety pipeline; a flagged verdict rejects before any debit.
        let outcome = self
            .safety
            .evaluate(
                &request.params.prompt,
                &request.params.negative_prompt,
                request.params.nsfw,
                &resources,
                &request.params.base_model,
            )
            .await;
        if outcome.moderation_flagged {
            return Err(GenerationError::ModerationRejected {
                categories: outcome.moderation_categories,
            });
        }

        let (width, height) = dimensions(&request.params.aspect_ratio, &request.params.base_model)
            .ok_or_else(|| {
                CoreError::Validation(format!(
                    "Unknown aspect ratio '{}'",
                    request.params.aspect_ratio
                ))
            })?;

        // Cost is deterministic from the parameters; zero-cost jobs
        // never touch the ledger.
        let cost = if self.flags.charging_enabled() {
            generation_cost(
                width,
                height,
                request.params.steps,
                request.quantity,
                &request.params.base_model,
            )
        } else {
            0
        };
        let transaction_id = if cost > 0 {
            Some(self.debit(&request, cost).await?)
        } else {
            None
        };

        let payload = build_payload(&request, &resources, checkpoint, &outcome, width, height)?;
        let submitted_at = Utc::now();

        let handle = match self.gateway.submit_text_to_image(payload, submitted_at).await {
            Ok(handle) => handle,
            Err(e) => {
                // Saga compensation: the debit happened, the job did
                // not. Refund whether the remote said 429 or 500.
                if let Some(transaction_id) = &transaction_id {
                    self.refund_after_failure(transaction_id, &e).await;
                }
                return Err(match e {
                    OrchestratorError::RateLimited => GenerationError::RemoteRateLimited,
                    other => GenerationError::SubmissionFailed(other),
                });
            }
        };

        tracing::info!(
            user_id = request.user_id,
            job_id = %handle.job_id,
            quantity = request.quantity,
            cost,
            "Generation job submitted"
        );
        self.limiter.increment(request.user_id, i64::from(request.quantity));

        Ok(self.format_request(&request, &resources, &outcome, handle, submitted_at))
    }

    /// Read-through status of a previously submitted request.
    ///
    /// Maps the latest remote lifecycle event onto the internal status
    /// enum; a job with no events yet is still pending. `submitted_at`
    /// keys the endpoint routing, so it must be the original
    /// submission time.
    pub async fn fetch_status(
        &self,
        job_id: &str,
        submitted_at: Timestamp,
    ) -> Result<RequestStatus, GenerationError> {
        let event = self
            .gateway
            .latest_event(job_id, submitted_at)
            .await
            .map_err(|e| match e {
                OrchestratorError::RateLimited => GenerationError::RemoteRateLimited,
                other => GenerationError::Internal(anyhow::Error::new(other)),
            })?;
        Ok(event
            .map(|e| RequestStatus::from_remote(&e.event_type))
            .unwrap_or(RequestStatus::Pending))
    }

    // ---- validation ----

    /// Resolve and validate the attached resources: count bounds, full
    /// resolution, generation coverage, and private-resource access.
    async fn validate_resources(
        &self,
        request: &SubmitGenerationRequest,
    ) -> Result<Vec<Resource>, GenerationError> {
        let count = request.resources.len();
        if !(MIN_RESOURCES..=MAX_RESOURCES).contains(&count) {
            return Err(GenerationError::InvalidResourceSet(format!(
                "Expected between {MIN_RESOURCES} and {MAX_RESOURCES} resources, got {count}"
            )));
        }

        let ids: Vec<DbId> = request.resources.iter().map(|r| r.id).collect();
        let resolved = self.resolver.resolve(&ids).await?;

        let mut unique_ids = ids.clone();
        unique_ids.sort_unstable();
        unique_ids.dedup();
        if resolved.len() != unique_ids.len() {
            let missing: Vec<DbId> = unique_ids
                .iter()
                .filter(|id| !resolved.iter().any(|r| r.id == **id))
                .copied()
                .collect();
            return Err(GenerationError::InvalidResourceSet(format!(
                "Unknown resources: {missing:?}"
            )));
        }

        // The coverage invariant: never submit a resource the remote
        // service cannot load.
        if let Some(uncovered) = resolved.iter().find(|r| !r.covered) {
            return Err(GenerationError::InvalidResourceSet(format!(
                "Resource {} ({}) has no generation coverage",
                uncovered.id, uncovered.name
            )));
        }

        let private_ids: Vec<DbId> = resolved
            .iter()
            .filter(|r| r.availability == Availability::Private)
            .map(|r| r.id)
            .collect();
        if !private_ids.is_empty() {
            let granted = self
                .access
                .accessible_ids(request.user_id, &private_ids)
                .await?;
            if private_ids.iter().any(|id| !granted.contains(id)) {
                return Err(GenerationError::AccessDenied);
            }
        }

        Ok(resolved)
    }

    fn require_single_checkpoint<'a>(
        &self,
        resources: &'a [Resource],
    ) -> Result<&'a Resource, GenerationError> {
        let mut checkpoints = resources
            .iter()
            .filter(|r| r.model_type == ModelType::Checkpoint);
        match (checkpoints.next(), checkpoints.next()) {
            (Some(checkpoint), None) => Ok(checkpoint),
            (None, _) => Err(GenerationError::InvalidResourceSet(
                "A checkpoint resource is required".to_string(),
            )),
            (Some(_), Some(_)) => Err(GenerationError::InvalidResourceSet(
                "Only one checkpoint resource is allowed".to_string(),
            )),
        }
    }

    // ---- ledger ----

    async fn debit(
        &self,
        request: &SubmitGenerationRequest,
        cost: u64,
    ) -> Result<String, GenerationError> {
        let debit = DebitRequest {
            from_account_id: request.user_id,
            to_account_id: self.config.platform_account_id,
            amount: cost,
            transaction_type: TransactionType::Generation,
            details: format!("Image generation ({} images)", request.quantity),
        };
        self.ledger.debit(debit).await.map_err(|e| match e {
            atelier_ledger::LedgerError::InsufficientFunds => GenerationError::InsufficientFunds,
            other => GenerationError::Internal(anyhow::Error::new(other)),
        })
    }

    /// Issue the compensating refund after a failed remote submission.
    ///
    /// A refund failure is logged for reconciliation but never changes
    /// the error the caller sees.
    async fn refund_after_failure(&self, transaction_id: &str, cause: &OrchestratorError) {
        let reason = format!("Generation job submission failed: {cause}");
        if let Err(refund_err) = self.ledger.refund(transaction_id, &reason).await {
            tracing::error!(
                transaction_id,
                error = %refund_err,
                "Refund after failed submission could not be completed"
            );
        }
    }

    // ---- response formatting ----

    /// Reverse-map the remote response into the domain request model:
    /// strip injected prompt fragments, hydrate resource names, and
    /// surface the alternatives toggle.
    fn format_request(
        &self,
        request: &SubmitGenerationRequest,
        resources: &[Resource],
        outcome: &SafetyOutcome,
        handle: JobHandle,
        created_at: Timestamp,
    ) -> GenerationRequest {
        let request_resources = request
            .resources
            .iter()
            .filter_map(|input| {
                let resource = resources.iter().find(|r| r.id == input.id)?;
                Some(RequestResource {
                    id: resource.id,
                    name: resource.name.clone(),
                    model_type: resource.model_type,
                    strength: match resource.model_type {
                        ModelType::Checkpoint => None,
                        _ => input.strength.map(|s| resource.clamp_strength(s)),
                    },
                })
            })
            .collect();

        let params = GenerationParams {
            prompt: strip_injected(&outcome.positive_prompt),
            negative_prompt: strip_injected(&outcome.negative_prompt),
            nsfw: Some(outcome.nsfw),
            ..request.params.clone()
        };

        GenerationRequest {
            id: handle.job_id,
            user_id: request.user_id,
            created_at,
            status: RequestStatus::Pending,
            queue_position: handle.queue_position,
            estimated_completion: handle.estimated_completion_date,
            params,
            resources: request_resources,
            alternatives_available: self.flags.alternatives_available(),
        }
    }
}

/// Build the remote payload: checkpoint reference, user additional
/// networks with clamped strengths, injected safety resources, and the
/// mapped generation parameters.
fn build_payload(
    request: &SubmitGenerationRequest,
    resources: &[Resource],
    checkpoint: &Resource,
    outcome: &SafetyOutcome,
    width: u32,
    height: u32,
) -> Result<TextToImagePayload, GenerationError> {
    let scheduler = scheduler_for_sampler(&request.params.sampler).ok_or_else(|| {
        CoreError::Validation(format!("Unknown sampler '{}'", request.params.sampler))
    })?;

    let mut additional_networks = BTreeMap::new();
    for input in &request.resources {
        let Some(resource) = resources.iter().find(|r| r.id == input.id) else {
            continue;
        };
        if resource.model_type == ModelType::Checkpoint {
            continue;
        }
        additional_networks.insert(
            resource_ref(resource.id),
            AdditionalNetwork {
                network_type: network_type_for(resource.model_type).to_string(),
                strength: input.strength.map(|s| resource.clamp_strength(s)),
                trigger_word: None,
            },
        );
    }
    for injected in &outcome.injected {
        additional_networks.insert(
            resource_ref(injected.version_id),
            AdditionalNetwork {
                network_type: "embed".to_string(),
                strength: None,
                trigger_word: Some(injected.trigger_word.to_string()),
            },
        );
    }

    let mut properties = BTreeMap::new();
    properties.insert("userId".to_string(), serde_json::json!(request.user_id));

    Ok(TextToImagePayload {
        model: resource_ref(checkpoint.id),
        params: TextToImageParams {
            prompt: outcome.positive_prompt.clone(),
            negative_prompt: outcome.negative_prompt.clone(),
            scheduler: scheduler.to_string(),
            steps: request.params.steps,
            cfg_scale: request.params.cfg_scale,
            width,
            height,
            seed: request.params.seed,
            clip_skip: request.params.clip_skip,
            base_model: request.params.base_model.clone(),
        },
        quantity: request.quantity,
        additional_networks,
        properties,
    })
}

/// Additional-network kind for a resource type.
fn network_type_for(model_type: ModelType) -> &'static str {
    match model_type {
        ModelType::TextualInversion => "embed",
        _ => "lora",
    }
}
