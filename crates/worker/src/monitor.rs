//! Training job lifecycle monitor.
//!
//! A periodic sweep over jobs stuck in `Submitted` or `Processing`:
//! each candidate's latest remote event is fetched, the pure decision
//! function in `atelier_core::training` picks an action, and the
//! monitor applies it. Remote calls are individually bounded by a
//! timeout, while state writes and refunds always run to completion;
//! writes land before refunds, refunds are de-duplicated by
//! transaction ID within a sweep, and one job's failure never aborts
//! the rest.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use atelier_core::training::{evaluate, FailReason, SweepAction, SweepContext, SweepThresholds, TrainingStatus};
use atelier_ledger::LedgerService;
use atelier_orchestrator::api::OrchestratorError;
use atelier_orchestrator::gateway::JobGateway;
use atelier_orchestrator::payload::{resource_ref, TrainingPayload};
use chrono::Utc;
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::store::{TrainingJob, TrainingStore};

/// Candidates must have been quiet this long before a sweep looks at
/// them; keeps freshly-written jobs out of the very next sweep.
const CANDIDATE_QUIET_MINUTES: i64 = 5;

/// Monitor tuning knobs.
///
/// | Variable                     | Default | Meaning                           |
/// |------------------------------|---------|-----------------------------------|
/// | `MONITOR_SWEEP_INTERVAL_SECS`| 600     | Seconds between sweeps            |
/// | `MONITOR_REMOTE_TIMEOUT_SECS`| 60      | Timeout per remote read/submit    |
/// | `MONITOR_CONCURRENCY`        | 8       | Jobs evaluated in parallel        |
/// | `MAX_TRAINING_ATTEMPTS`      | 3       | Submission attempts before giving up |
/// | `TRAINING_CALLBACK_URL`      | unset   | Callback passed on resubmission   |
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub sweep_interval: Duration,
    pub thresholds: SweepThresholds,
    pub remote_timeout: Duration,
    pub concurrency: usize,
    pub max_attempts: u32,
    pub callback_url: Option<String>,
}

impl MonitorConfig {
    pub fn from_env() -> Self {
        Self {
            sweep_interval: Duration::from_secs(env_u64("MONITOR_SWEEP_INTERVAL_SECS", 600)),
            thresholds: SweepThresholds::default(),
            remote_timeout: Duration::from_secs(env_u64("MONITOR_REMOTE_TIMEOUT_SECS", 60)),
            concurrency: env_u64("MONITOR_CONCURRENCY", 8) as usize,
            max_attempts: env_u64("MAX_TRAINING_ATTEMPTS", 3) as u32,
            callback_url: std::env::var("TRAINING_CALLBACK_URL").ok(),
        }
    }
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// What one sweep did, for the interval log line.
#[derive(Debug, Default, Clone, Copy)]
pub struct SweepStats {
    pub examined: usize,
    pub resubmitted: usize,
    pub advanced: usize,
    pub failed: usize,
    pub refunded: usize,
    pub errors: usize,
}

/// Result of applying one sweep action.
enum Outcome {
    Unchanged,
    Resubmitted,
    Advanced,
    Failed { refunded: bool },
}

pub struct Monitor {
    store: Arc<dyn TrainingStore>,
    gateway: Arc<dyn JobGateway>,
    ledger: Arc<dyn LedgerService>,
    config: MonitorConfig,
}

/// Run the monitor loop until `cancel` is triggered.
pub async fn run(monitor: Arc<Monitor>, cancel: CancellationToken) {
    tracing::info!(
        interval_secs = monitor.config.sweep_interval.as_secs(),
        concurrency = monitor.config.concurrency,
        "Training lifecycle monitor started"
    );

    let mut interval = tokio::time::interval(monitor.config.sweep_interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Training lifecycle monitor stopping");
                break;
            }
            _ = interval.tick() => {
                let stats = monitor.sweep().await;
                if stats.examined > 0 {
                    tracing::info!(
                        examined = stats.examined,
                        resubmitted = stats.resubmitted,
                        advanced = stats.advanced,
                        failed = stats.failed,
                        refunded = stats.refunded,
                        errors = stats.errors,
                        "Sweep finished"
                    );
                } else {
                    tracing::debug!("Sweep found no candidates");
                }
            }
        }
    }
}

impl Monitor {
    pub fn new(
        store: Arc<dyn TrainingStore>,
        gateway: Arc<dyn JobGateway>,
        ledger: Arc<dyn LedgerService>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            store,
            gateway,
            ledger,
            config,
        }
    }

    /// Execute one sweep over the current candidates.
    pub async fn sweep(&self) -> SweepStats {
        let since = Utc::now() - chrono::Duration::minutes(CANDIDATE_QUIET_MINUTES);
        let jobs = match self.store.list_candidates(since).await {
            Ok(jobs) => jobs,
            Err(e) => {
                tracing::error!(error = %e, "Sweep could not list candidates");
                return SweepStats::default();
            }
        };

        let stats = Mutex::new(SweepStats {
            examined: jobs.len(),
            ..Default::default()
        });
        // Transactions already refunded this sweep; several files can
        // share one debit.
        let refunded = Mutex::new(HashSet::new());

        futures::stream::iter(jobs)
            .for_each_concurrent(self.config.concurrency, |job| {
                let stats = &stats;
                let refunded = &refunded;
                async move {
                    let evaluated = self.sweep_job(&job, refunded).await;
                    let mut stats = stats.lock().await;
                    match evaluated {
                        Ok(Outcome::Unchanged) => {}
                        Ok(Outcome::Resubmitted) => stats.resubmitted += 1,
                        Ok(Outcome::Advanced) => stats.advanced += 1,
                        Ok(Outcome::Failed { refunded }) => {
                            stats.failed += 1;
                            if refunded {
                                stats.refunded += 1;
                            }
                        }
                        Err(e) => {
                            stats.errors += 1;
                            tracing::warn!(
                                file_id = job.file_id,
                                error = %e,
                                "Sweep skipped job after error; will retry next sweep"
                            );
                        }
                    }
                }
            })
            .await;

        stats.into_inner()
    }

    /// Bound a remote call by the configured timeout. A timed-out call
    /// is a transient error like any other remote failure.
    ///
    /// Only reads and submissions go through here. The apply-action
    /// path (state writes, refunds) must never sit inside a cancellable
    /// timeout: dropping it between the status transition and the
    /// refund would strand the money with no reconciliation trace.
    async fn remote<T>(
        &self,
        call: impl std::future::Future<Output = Result<T, OrchestratorError>>,
    ) -> anyhow::Result<T> {
        match tokio::time::timeout(self.config.remote_timeout, call).await {
            Ok(result) => Ok(result?),
            Err(_) => anyhow::bail!(
                "remote call timed out after {}s",
                self.config.remote_timeout.as_secs()
            ),
        }
    }

    /// Evaluate and apply the action for one job.
    async fn sweep_job(
        &self,
        job: &TrainingJob,
        refunded: &Mutex<HashSet<String>>,
    ) -> anyhow::Result<Outcome> {
        let submitted_at = job.results.submitted_at.unwrap_or(job.updated_at);

        // An event-fetch failure or timeout propagates as an error,
        // leaving the job untouched for the next sweep.
        let latest_event = match &job.results.job_id {
            Some(job_id) => {
                self.remote(self.gateway.latest_event(job_id, submitted_at))
                    .await?
            }
            None => None,
        };
        let last_activity = latest_event
            .as_ref()
            .map(|e| e.date_time)
            .unwrap_or(submitted_at);

        let ctx = SweepContext {
            status: job.status,
            has_job_id: job.results.job_id.is_some(),
            latest_event: latest_event.as_ref().and_then(|e| e.kind()),
            last_activity,
        };

        match evaluate(&ctx, &self.config.thresholds, Utc::now()) {
            SweepAction::NoAction => Ok(Outcome::Unchanged),
            SweepAction::Resubmit => self.resubmit(job, refunded).await,
            SweepAction::VerifyOutputs => self.verify_outputs(job, refunded).await,
            SweepAction::Fail(reason) => self.fail(job, reason, refunded).await,
            SweepAction::CheckQueue => self.check_queue(job, submitted_at, refunded).await,
        }
    }

    /// A `Submitted` job went quiet: if the remote queue never assigned
    /// it to a provider, submit a fresh attempt.
    async fn check_queue(
        &self,
        job: &TrainingJob,
        submitted_at: atelier_core::types::Timestamp,
        refunded: &Mutex<HashSet<String>>,
    ) -> anyhow::Result<Outcome> {
        let Some(job_id) = &job.results.job_id else {
            return self.resubmit(job, refunded).await;
        };
        let snapshot = self.remote(self.gateway.get_job(job_id, submitted_at)).await?;
        if snapshot.is_assigned() {
            tracing::debug!(file_id = job.file_id, %job_id, "Quiet job is still queued");
            return Ok(Outcome::Unchanged);
        }
        tracing::info!(file_id = job.file_id, %job_id, "Quiet job was never assigned; resubmitting");
        self.resubmit(job, refunded).await
    }

    /// Submit a fresh training attempt and record the new pointers.
    ///
    /// Attempts are capped: once the counter reaches the configured
    /// maximum the job fails (with refund) instead of cycling through
    /// the queue forever.
    async fn resubmit(
        &self,
        job: &TrainingJob,
        refunded: &Mutex<HashSet<String>>,
    ) -> anyhow::Result<Outcome> {
        if job.results.attempts >= self.config.max_attempts {
            tracing::warn!(
                file_id = job.file_id,
                attempts = job.results.attempts,
                "Training job hit the attempt cap"
            );
            return self.fail(job, FailReason::AttemptsExhausted, refunded).await;
        }

        let mut properties = std::collections::BTreeMap::new();
        properties.insert("modelFileId".to_string(), serde_json::json!(job.file_id));
        properties.insert(
            "attempt".to_string(),
            serde_json::json!(job.results.attempts + 1),
        );
        let payload = TrainingPayload {
            model: resource_ref(job.model_version_id),
            training_data: job.training_data_url.clone(),
            params: job.params.clone(),
            callback_url: self.config.callback_url.clone(),
            properties,
        };

        let submitted_at = Utc::now();
        let handle = self
            .remote(self.gateway.submit_training(payload, submitted_at))
            .await?;

        let mut results = job.results.clone();
        results.job_id = Some(handle.job_id.clone());
        results.submitted_at = Some(submitted_at);
        results.attempts += 1;
        results.push_history(submitted_at, TrainingStatus::Submitted);
        self.store
            .update(job, TrainingStatus::Submitted, &results)
            .await?;

        tracing::info!(
            file_id = job.file_id,
            job_id = %handle.job_id,
            attempt = results.attempts,
            "Training job resubmitted"
        );
        Ok(Outcome::Resubmitted)
    }

    /// The remote reported success: move to review if artifacts exist,
    /// fail otherwise.
    async fn verify_outputs(
        &self,
        job: &TrainingJob,
        refunded: &Mutex<HashSet<String>>,
    ) -> anyhow::Result<Outcome> {
        if !self.store.has_artifacts(job.file_id).await? {
            return self.fail(job, FailReason::MissingArtifacts, refunded).await;
        }

        let now = Utc::now();
        let mut results = job.results.clone();
        results.push_history(now, TrainingStatus::InReview);
        self.store
            .update(job, TrainingStatus::InReview, &results)
            .await?;

        tracing::info!(file_id = job.file_id, "Training job moved to review");
        Ok(Outcome::Advanced)
    }

    /// Transition to `Failed`, then refund the backing debit.
    ///
    /// The state write comes first: if it fails, the job stays a
    /// candidate and no money moves. A refund failure is logged for
    /// reconciliation; the transition stands either way.
    async fn fail(
        &self,
        job: &TrainingJob,
        reason: FailReason,
        refunded: &Mutex<HashSet<String>>,
    ) -> anyhow::Result<Outcome> {
        let now = Utc::now();
        let mut results = job.results.clone();
        results.push_history(now, TrainingStatus::Failed);
        self.store
            .update(job, TrainingStatus::Failed, &results)
            .await?;

        tracing::info!(
            file_id = job.file_id,
            reason = reason.as_str(),
            "Training job failed"
        );

        let mut did_refund = false;
        if let Some(transaction_id) = &job.results.transaction_id {
            let first_claim = refunded.lock().await.insert(transaction_id.clone());
            if first_claim {
                match self.ledger.refund(transaction_id, reason.as_str()).await {
                    Ok(()) => did_refund = true,
                    Err(e) => {
                        tracing::error!(
                            file_id = job.file_id,
                            transaction_id,
                            error = %e,
                            "Refund for failed training job could not be completed"
                        );
                    }
                }
            }
        }
        Ok(Outcome::Failed {
            refunded: did_refund,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;

    use atelier_core::types::{DbId, Timestamp};
    use atelier_db::models::TrainingResults;
    use atelier_ledger::{DebitRequest, LedgerError};
    use atelier_orchestrator::api::OrchestratorError;
    use atelier_orchestrator::payload::{
        JobEvent, JobHandle, JobSnapshot, TextToImagePayload,
    };

    // ---- fakes ----

    #[derive(Default)]
    struct FakeStore {
        jobs: Vec<TrainingJob>,
        artifacts: HashSet<DbId>,
        updates: StdMutex<Vec<(DbId, TrainingStatus, TrainingResults)>>,
    }

    impl FakeStore {
        fn updates(&self) -> Vec<(DbId, TrainingStatus, TrainingResults)> {
            self.updates.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TrainingStore for FakeStore {
        async fn list_candidates(&self, _since: Timestamp) -> anyhow::Result<Vec<TrainingJob>> {
            Ok(self.jobs.clone())
        }

        async fn update(
            &self,
            job: &TrainingJob,
            status: TrainingStatus,
            results: &TrainingResults,
        ) -> anyhow::Result<()> {
            self.updates
                .lock()
                .unwrap()
                .push((job.file_id, status, results.clone()));
            Ok(())
        }

        async fn has_artifacts(&self, file_id: DbId) -> anyhow::Result<bool> {
            Ok(self.artifacts.contains(&file_id))
        }
    }

    #[derive(Default)]
    struct FakeGateway {
        events: HashMap<String, JobEvent>,
        failing_events: HashSet<String>,
        hanging_events: HashSet<String>,
        assigned: HashSet<String>,
        submissions: StdMutex<Vec<TrainingPayload>>,
    }

    impl FakeGateway {
        fn submissions(&self) -> Vec<TrainingPayload> {
            self.submissions.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl JobGateway for FakeGateway {
        async fn submit_text_to_image(
            &self,
            _payload: TextToImagePayload,
            _submitted_at: Timestamp,
        ) -> Result<JobHandle, OrchestratorError> {
            unimplemented!("not used by monitor tests")
        }

        async fn submit_training(
            &self,
            payload: TrainingPayload,
            _submitted_at: Timestamp,
        ) -> Result<JobHandle, OrchestratorError> {
            let mut submissions = self.submissions.lock().unwrap();
            submissions.push(payload);
            Ok(JobHandle {
                job_id: format!("resubmit-{}", submissions.len()),
                result: None,
                queue_position: None,
                estimated_completion_date: None,
            })
        }

        async fn get_job(
            &self,
            job_id: &str,
            _submitted_at: Timestamp,
        ) -> Result<JobSnapshot, OrchestratorError> {
            let mut service_providers = std::collections::BTreeMap::new();
            if self.assigned.contains(job_id) {
                service_providers
                    .insert("provider-1".to_string(), serde_json::json!({}));
            }
            Ok(JobSnapshot {
                job_id: job_id.to_string(),
                service_providers,
            })
        }

        async fn latest_event(
            &self,
            job_id: &str,
            _submitted_at: Timestamp,
        ) -> Result<Option<JobEvent>, OrchestratorError> {
            if self.failing_events.contains(job_id) {
                return Err(OrchestratorError::Api {
                    status: 500,
                    body: "event store is down".into(),
                });
            }
            if self.hanging_events.contains(job_id) {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            Ok(self.events.get(job_id).cloned())
        }

        async fn taint_job(
            &self,
            _job_id: &str,
            _reason: &str,
            _context: &str,
            _submitted_at: Timestamp,
        ) -> Result<(), OrchestratorError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeLedger {
        refund_delay: Option<Duration>,
        refunds: StdMutex<Vec<(String, String)>>,
    }

    impl FakeLedger {
        fn refunds(&self) -> Vec<(String, String)> {
            self.refunds.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LedgerService for FakeLedger {
        async fn debit(&self, _request: DebitRequest) -> Result<String, LedgerError> {
            unimplemented!("not used by monitor tests")
        }

        async fn refund(&self, transaction_id: &str, reason: &str) -> Result<(), LedgerError> {
            if let Some(delay) = self.refund_delay {
                tokio::time::sleep(delay).await;
            }
            self.refunds
                .lock()
                .unwrap()
                .push((transaction_id.to_string(), reason.to_string()));
            Ok(())
        }
    }

    // ---- fixtures ----

    fn job(
        file_id: DbId,
        status: TrainingStatus,
        job_id: Option<&str>,
        quiet_minutes: i64,
    ) -> TrainingJob {
        let then = Utc::now() - chrono::Duration::minutes(quiet_minutes);
        TrainingJob {
            file_id,
            model_version_id: file_id * 10,
            training_data_url: "s3://training/data.zip".into(),
            params: serde_json::json!({"epochs": 10}),
            status,
            results: TrainingResults {
                job_id: job_id.map(str::to_string),
                transaction_id: Some("tx-1".into()),
                submitted_at: Some(then),
                attempts: 1,
                history: vec![],
            },
            updated_at: then,
        }
    }

    fn event(kind: &str, minutes_ago: i64) -> JobEvent {
        JobEvent {
            event_type: kind.to_string(),
            date_time: Utc::now() - chrono::Duration::minutes(minutes_ago),
        }
    }

    fn test_config() -> MonitorConfig {
        MonitorConfig {
            sweep_interval: Duration::from_secs(600),
            thresholds: SweepThresholds::default(),
            remote_timeout: Duration::from_secs(5),
            concurrency: 4,
            max_attempts: 3,
            callback_url: None,
        }
    }

    struct Harness {
        monitor: Monitor,
        store: Arc<FakeStore>,
        gateway: Arc<FakeGateway>,
        ledger: Arc<FakeLedger>,
    }

    fn harness(store: FakeStore, gateway: FakeGateway) -> Harness {
        harness_with(store, gateway, FakeLedger::default(), test_config())
    }

    fn harness_with(
        store: FakeStore,
        gateway: FakeGateway,
        ledger: FakeLedger,
        config: MonitorConfig,
    ) -> Harness {
        let store = Arc::new(store);
        let gateway = Arc::new(gateway);
        let ledger = Arc::new(ledger);
        let monitor = Monitor::new(store.clone(), gateway.clone(), ledger.clone(), config);
        Harness {
            monitor,
            store,
            gateway,
            ledger,
        }
    }

    // ---- tests ----

    #[tokio::test]
    async fn stale_processing_job_fails_and_refunds_once() {
        let store = FakeStore {
            jobs: vec![job(1, TrainingStatus::Processing, Some("j1"), 25)],
            ..Default::default()
        };
        let h = harness(store, FakeGateway::default());

        let stats = h.monitor.sweep().await;
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.refunded, 1);

        let updates = h.store.updates();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].1, TrainingStatus::Failed);
        assert_eq!(updates[0].2.history.len(), 1);

        let refunds = h.ledger.refunds();
        assert_eq!(refunds.len(), 1);
        assert_eq!(refunds[0].0, "tx-1");
        assert!(refunds[0].1.contains("stopped reporting progress"));
    }

    #[tokio::test]
    async fn active_processing_job_is_left_alone() {
        let mut gateway = FakeGateway::default();
        gateway.events.insert("j1".into(), event("Updated", 5));
        let store = FakeStore {
            jobs: vec![job(1, TrainingStatus::Processing, Some("j1"), 25)],
            ..Default::default()
        };
        let h = harness(store, gateway);

        let stats = h.monitor.sweep().await;
        assert_eq!(stats.examined, 1);
        assert_eq!(stats.failed, 0);
        assert!(h.store.updates().is_empty());
        assert!(h.ledger.refunds().is_empty());
    }

    #[tokio::test]
    async fn succeeded_job_with_artifacts_moves_to_review() {
        let mut gateway = FakeGateway::default();
        gateway.events.insert("j1".into(), event("Succeeded", 1));
        let mut store = FakeStore {
            jobs: vec![job(1, TrainingStatus::Processing, Some("j1"), 25)],
            ..Default::default()
        };
        store.artifacts.insert(1);
        let h = harness(store, gateway);

        let stats = h.monitor.sweep().await;
        assert_eq!(stats.advanced, 1);
        assert_eq!(h.store.updates()[0].1, TrainingStatus::InReview);
        assert!(h.ledger.refunds().is_empty());
    }

    #[tokio::test]
    async fn succeeded_job_without_artifacts_fails_and_refunds() {
        let mut gateway = FakeGateway::default();
        gateway.events.insert("j1".into(), event("Succeeded", 1));
        let store = FakeStore {
            jobs: vec![job(1, TrainingStatus::Processing, Some("j1"), 25)],
            ..Default::default()
        };
        let h = harness(store, gateway);

        let stats = h.monitor.sweep().await;
        assert_eq!(stats.failed, 1);
        assert_eq!(h.store.updates()[0].1, TrainingStatus::Failed);
        let refunds = h.ledger.refunds();
        assert_eq!(refunds.len(), 1);
        assert!(refunds[0].1.contains("no output artifacts"));
    }

    #[tokio::test]
    async fn remote_failure_event_fails_the_job() {
        let mut gateway = FakeGateway::default();
        gateway.events.insert("j1".into(), event("Failed", 1));
        let store = FakeStore {
            jobs: vec![job(1, TrainingStatus::Processing, Some("j1"), 6)],
            ..Default::default()
        };
        let h = harness(store, gateway);

        let stats = h.monitor.sweep().await;
        assert_eq!(stats.failed, 1);
        assert!(h.ledger.refunds()[0].1.contains("failed remotely"));
    }

    #[tokio::test]
    async fn missing_job_id_triggers_resubmission() {
        let store = FakeStore {
            jobs: vec![job(1, TrainingStatus::Submitted, None, 15)],
            ..Default::default()
        };
        let h = harness(store, FakeGateway::default());

        let stats = h.monitor.sweep().await;
        assert_eq!(stats.resubmitted, 1);

        let submissions = h.gateway.submissions();
        assert_eq!(submissions.len(), 1);
        assert_eq!(submissions[0].model, "@resource:10");
        assert_eq!(submissions[0].training_data, "s3://training/data.zip");

        let updates = h.store.updates();
        assert_eq!(updates[0].1, TrainingStatus::Submitted);
        assert_eq!(updates[0].2.attempts, 2);
        assert_eq!(updates[0].2.job_id.as_deref(), Some("resubmit-1"));
        assert!(h.ledger.refunds().is_empty());
    }

    #[tokio::test]
    async fn quiet_submitted_job_still_queued_is_left_alone() {
        let mut gateway = FakeGateway::default();
        gateway.assigned.insert("j1".into());
        let store = FakeStore {
            jobs: vec![job(1, TrainingStatus::Submitted, Some("j1"), 15)],
            ..Default::default()
        };
        let h = harness(store, gateway);

        let stats = h.monitor.sweep().await;
        assert_eq!(stats.resubmitted, 0);
        assert!(h.gateway.submissions().is_empty());
        assert!(h.store.updates().is_empty());
    }

    #[tokio::test]
    async fn quiet_submitted_job_never_assigned_is_resubmitted() {
        let store = FakeStore {
            jobs: vec![job(1, TrainingStatus::Submitted, Some("j1"), 15)],
            ..Default::default()
        };
        let h = harness(store, FakeGateway::default());

        let stats = h.monitor.sweep().await;
        assert_eq!(stats.resubmitted, 1);
        let updates = h.store.updates();
        assert_eq!(updates[0].2.attempts, 2);
    }

    #[tokio::test]
    async fn event_fetch_failure_leaves_the_job_untouched() {
        let mut gateway = FakeGateway::default();
        gateway.failing_events.insert("j1".into());
        let store = FakeStore {
            jobs: vec![job(1, TrainingStatus::Processing, Some("j1"), 25)],
            ..Default::default()
        };
        let h = harness(store, gateway);

        let stats = h.monitor.sweep().await;
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.failed, 0);
        assert!(h.store.updates().is_empty());
        assert!(h.ledger.refunds().is_empty());
    }

    #[tokio::test]
    async fn one_bad_job_does_not_block_the_rest() {
        let mut gateway = FakeGateway::default();
        gateway.failing_events.insert("j1".into());
        let store = FakeStore {
            jobs: vec![
                job(1, TrainingStatus::Processing, Some("j1"), 25),
                job(2, TrainingStatus::Processing, Some("j2"), 25),
            ],
            ..Default::default()
        };
        let h = harness(store, gateway);

        let stats = h.monitor.sweep().await;
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.failed, 1);
        let updates = h.store.updates();
        assert_matches!(updates.as_slice(), [(2, TrainingStatus::Failed, _)]);
    }

    #[tokio::test]
    async fn shared_transaction_is_refunded_once_per_sweep() {
        // Two files from the same submission share one debit.
        let store = FakeStore {
            jobs: vec![
                job(1, TrainingStatus::Processing, Some("j1"), 25),
                job(2, TrainingStatus::Processing, Some("j2"), 25),
            ],
            ..Default::default()
        };
        let h = harness(store, FakeGateway::default());

        let stats = h.monitor.sweep().await;
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.refunded, 1);
        assert_eq!(h.ledger.refunds().len(), 1);
    }

    #[tokio::test]
    async fn recently_rejected_job_is_not_failed_early() {
        let mut gateway = FakeGateway::default();
        gateway.events.insert("j1".into(), event("Rejected", 5));
        let store = FakeStore {
            jobs: vec![job(1, TrainingStatus::Processing, Some("j1"), 5)],
            ..Default::default()
        };
        let h = harness(store, gateway);

        let stats = h.monitor.sweep().await;
        assert_eq!(stats.failed, 0);
        assert!(h.store.updates().is_empty());
    }

    #[tokio::test]
    async fn long_rejected_job_fails_with_rejection_reason() {
        let mut gateway = FakeGateway::default();
        gateway.events.insert("j1".into(), event("Rejected", 5 * 60));
        let store = FakeStore {
            jobs: vec![job(1, TrainingStatus::Processing, Some("j1"), 5 * 60)],
            ..Default::default()
        };
        let h = harness(store, gateway);

        let stats = h.monitor.sweep().await;
        assert_eq!(stats.failed, 1);
        assert!(h.ledger.refunds()[0].1.contains("rejected for too long"));
    }

    #[tokio::test]
    async fn slow_refund_outliving_the_remote_timeout_still_lands() {
        // The remote timeout must never cancel the apply-action path:
        // once the Failed transition is written, the refund has to run
        // to completion even if it is slower than the timeout.
        let store = FakeStore {
            jobs: vec![job(1, TrainingStatus::Processing, Some("j1"), 25)],
            ..Default::default()
        };
        let ledger = FakeLedger {
            refund_delay: Some(Duration::from_millis(200)),
            ..Default::default()
        };
        let mut config = test_config();
        config.remote_timeout = Duration::from_millis(50);
        let h = harness_with(store, FakeGateway::default(), ledger, config);

        let stats = h.monitor.sweep().await;
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.refunded, 1);
        assert_eq!(stats.errors, 0);
        assert_eq!(h.store.updates()[0].1, TrainingStatus::Failed);
        assert_eq!(h.ledger.refunds().len(), 1);
    }

    #[tokio::test]
    async fn hung_event_fetch_times_out_and_leaves_the_job_untouched() {
        let mut gateway = FakeGateway::default();
        gateway.hanging_events.insert("j1".into());
        let store = FakeStore {
            jobs: vec![job(1, TrainingStatus::Processing, Some("j1"), 25)],
            ..Default::default()
        };
        let mut config = test_config();
        config.remote_timeout = Duration::from_millis(50);
        let h = harness_with(store, gateway, FakeLedger::default(), config);

        let stats = h.monitor.sweep().await;
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.failed, 0);
        assert!(h.store.updates().is_empty());
        assert!(h.ledger.refunds().is_empty());
    }

    #[tokio::test]
    async fn attempt_cap_fails_the_job_instead_of_resubmitting() {
        let mut stuck = job(1, TrainingStatus::Submitted, None, 15);
        stuck.results.attempts = 3;
        let store = FakeStore {
            jobs: vec![stuck],
            ..Default::default()
        };
        let h = harness(store, FakeGateway::default());

        let stats = h.monitor.sweep().await;
        assert_eq!(stats.resubmitted, 0);
        assert_eq!(stats.failed, 1);
        assert!(h.gateway.submissions().is_empty());
        assert_eq!(h.store.updates()[0].1, TrainingStatus::Failed);
        let refunds = h.ledger.refunds();
        assert_eq!(refunds.len(), 1);
        assert!(refunds[0].1.contains("exhausted its submission attempts"));
    }
}
