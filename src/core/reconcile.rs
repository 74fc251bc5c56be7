use crate::core::classifier::BounceClassifier;
use crate::domain::model::{
    BounceNotification, Classification, FailureKind, JobState, RunOutcome, RunStatus, SkipReason,
};
use crate::domain::ports::{
    AccountDirectory, BounceSource, DirectoryUnit, ReconcileConfig, SourceConnector,
};
use crate::utils::error::Result;
use std::collections::HashSet;

/// Tracks the job state machine and logs every transition.
struct Lifecycle {
    state: JobState,
}

impl Lifecycle {
    fn new() -> Self {
        Self {
            state: JobState::Idle,
        }
    }

    fn advance(&mut self, next: JobState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "illegal job transition {} -> {}",
            self.state,
            next
        );
        tracing::debug!(from = %self.state, to = %next, "Job state transition");
        self.state = next;
    }
}

/// Pulls outstanding bounces from the provider, deactivates accounts whose
/// address hard-bounced and clears processed entries upstream.
///
/// Runs must be serialised by the caller. Two overlapping runs stay correct
/// because deactivation is idempotent, but they duplicate logs and
/// acknowledgments.
pub struct ReconciliationJob<C, S, D>
where
    C: ReconcileConfig,
    S: SourceConnector,
    D: AccountDirectory,
{
    config: C,
    connector: S,
    directory: D,
    classifier: BounceClassifier,
}

impl<C, S, D> ReconciliationJob<C, S, D>
where
    C: ReconcileConfig,
    S: SourceConnector,
    D: AccountDirectory,
{
    pub fn new(config: C, connector: S, directory: D) -> Self {
        let classifier = BounceClassifier::with_additional(config.additional_indicators());
        Self {
            config,
            connector,
            directory,
            classifier,
        }
    }

    pub fn classifier(&self) -> &BounceClassifier {
        &self.classifier
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    /// Executes one reconciliation pass. Expected conditions (missing
    /// credential, unavailable client, fetch failure) are reported through
    /// the returned status, never as an error.
    pub async fn run(&self) -> RunStatus {
        let mut lifecycle = Lifecycle::new();

        lifecycle.advance(JobState::Guarding);
        let source = match self.guard() {
            Ok(source) => source,
            Err(reason) => {
                lifecycle.advance(JobState::Skipped);
                return RunStatus::Skipped(reason);
            }
        };

        lifecycle.advance(JobState::Fetching);
        tracing::info!("Fetching outstanding bounces from provider...");
        let bounces = match source.fetch(self.config.fetch_limit()).await {
            Ok(bounces) => bounces,
            Err(e) => {
                // 尚未寫入任何資料，直接結束
                tracing::error!("❌ Failed to fetch bounces from provider: {}", e);
                lifecycle.advance(JobState::Failed);
                return RunStatus::Failed {
                    kind: FailureKind::SourceUnavailable,
                    message: e.to_string(),
                };
            }
        };

        if bounces.is_empty() {
            tracing::info!("No bounces found.");
            lifecycle.advance(JobState::Completed);
            return RunStatus::Completed(RunOutcome::default());
        }
        tracing::info!("Fetched {} bounces", bounces.len());

        lifecycle.advance(JobState::Processing);
        let (mut outcome, pending_acks) = match self.apply(&bounces) {
            Ok(applied) => applied,
            Err(e) => {
                tracing::error!(
                    "❌ Account directory failure, all deactivations from this run were rolled back: {}",
                    e
                );
                lifecycle.advance(JobState::Failed);
                return RunStatus::Failed {
                    kind: FailureKind::Directory,
                    message: e.to_string(),
                };
            }
        };

        self.acknowledge_all(&source, &pending_acks, &mut outcome)
            .await;

        lifecycle.advance(JobState::Completed);
        tracing::info!(
            examined = outcome.examined_count,
            deactivated = outcome.deactivated_count,
            hard = outcome.hard_count,
            soft = outcome.soft_count,
            duplicates = outcome.duplicate_count,
            acknowledged = outcome.acknowledged_count,
            acknowledge_failures = outcome.acknowledge_failures.len(),
            "✅ Bounce reconciliation complete. Deactivated {} accounts.",
            outcome.deactivated_count
        );

        RunStatus::Completed(outcome)
    }

    fn guard(&self) -> std::result::Result<S::Source, SkipReason> {
        let Some(credential) = self.config.credential() else {
            tracing::info!("No provider API key configured. Exiting.");
            return Err(SkipReason::MissingCredential);
        };

        self.connector.connect(credential).map_err(|e| {
            tracing::warn!("Provider client unavailable: {}. Exiting.", e);
            SkipReason::ClientUnavailable(e.to_string())
        })
    }

    /// Classifies every bounce and applies all deactivations in one directory
    /// unit. Returns the counters and the addresses to acknowledge once the
    /// unit is committed.
    fn apply(&self, bounces: &[BounceNotification]) -> Result<(RunOutcome, Vec<String>)> {
        let unit = self.directory.begin()?;
        let policy = self.config.acknowledge_policy();

        let mut outcome = RunOutcome::default();
        let mut seen = HashSet::new();
        let mut pending_acks = Vec::new();

        for bounce in bounces {
            let address = bounce.normalized_address();
            if address.is_empty() {
                tracing::debug!("Skipping bounce without an address");
                continue;
            }
            if !seen.insert(address.clone()) {
                tracing::debug!("Skipping duplicate bounce for {}", address);
                outcome.duplicate_count += 1;
                continue;
            }
            outcome.examined_count += 1;

            let classification = self.classifier.classify(bounce);
            match classification {
                Classification::Hard => {
                    outcome.hard_count += 1;
                    outcome.deactivated_count += deactivate_matches(&unit, &address, bounce)?;
                }
                Classification::Soft => {
                    outcome.soft_count += 1;
                    tracing::debug!(
                        "Skipped soft bounce for {}: [{}] {}",
                        address,
                        bounce.status_code.as_deref().unwrap_or(""),
                        bounce.reason
                    );
                }
            }

            if policy.should_acknowledge(classification) {
                pending_acks.push(address);
            }
        }

        unit.commit()?;
        Ok((outcome, pending_acks))
    }

    async fn acknowledge_all(
        &self,
        source: &S::Source,
        addresses: &[String],
        outcome: &mut RunOutcome,
    ) {
        for address in addresses {
            match source.acknowledge(address).await {
                Ok(()) => outcome.acknowledged_count += 1,
                Err(e) => {
                    tracing::warn!("Failed to clear bounce for {} from provider: {}", address, e);
                    outcome.acknowledge_failures.push(address.clone());
                }
            }
        }
    }
}

fn deactivate_matches<U: DirectoryUnit>(
    unit: &U,
    address: &str,
    bounce: &BounceNotification,
) -> Result<usize> {
    let accounts = unit.find_active(address)?;
    if accounts.is_empty() {
        tracing::debug!("No active accounts for hard-bounced address {}", address);
        return Ok(0);
    }

    let ids: Vec<i64> = accounts.iter().map(|account| account.id).collect();
    let changed = unit.deactivate_all(&ids)?;

    let status = bounce.status_code.as_deref().unwrap_or("");
    for account in &accounts {
        tracing::info!(
            username = %account.username,
            status = status,
            reason = %bounce.reason,
            "Deactivated account {} due to hard bounce: [{}] {}",
            account.username,
            status,
            bounce.reason
        );
    }

    Ok(changed)
}
