use futures_util::stream::{self, StreamExt};
use std::sync::Arc;

use crate::application::dto::avatar_dto::{SweepReport, VerifyOutcome};
use crate::application::errors::{ApplicationError, AvatarWarning};
use crate::application::services::deadline::with_deadline;
use crate::domain::clock::Clock;
use crate::domain::models::config::OperationTimeouts;
use crate::domain::models::profile::AvatarPointerUpdate;
use crate::domain::repositories::profile_repository::ProfilePointerRepository;
use crate::domain::repositories::reachability_probe::ReachabilityProbe;

const SWEEP_CONCURRENCY: usize = 8;

/// Clears profile pointers whose object no longer resolves. Never deletes objects.
pub struct AvatarLinkVerifier {
    profile_repository: Arc<dyn ProfilePointerRepository>,
    probe: Arc<dyn ReachabilityProbe>,
    clock: Arc<dyn Clock>,
    timeouts: OperationTimeouts,
    probe_retries: u32,
}

impl AvatarLinkVerifier {
    pub fn new(
        profile_repository: Arc<dyn ProfilePointerRepository>,
        probe: Arc<dyn ReachabilityProbe>,
        clock: Arc<dyn Clock>,
        timeouts: OperationTimeouts,
        probe_retries: u32,
    ) -> Self {
        Self {
            profile_repository,
            probe,
            clock,
            timeouts,
            probe_retries,
        }
    }

    pub async fn verify(&self, user_id: &str) -> Result<VerifyOutcome, ApplicationError> {
        let Some(url) = self.current_url(user_id).await? else {
            return Ok(VerifyOutcome::Ok);
        };

        let failure = match self.probe_with_retries(&url).await {
            Ok(()) => return Ok(VerifyOutcome::Ok),
            Err(warning) => warning,
        };
        tracing::warn!("Avatar of {} is unreachable: {}", user_id, failure);

        // An upload may have replaced the pointer while we were probing
        if self.current_url(user_id).await?.as_deref() != Some(url.as_str()) {
            tracing::debug!("Pointer of {} changed during verification", user_id);
            return Ok(VerifyOutcome::Ok);
        }

        with_deadline(
            self.timeouts.profile(),
            "pointer clear",
            self.profile_repository
                .update_pointer(user_id, &AvatarPointerUpdate::clear(self.clock.now())),
        )
        .await
        .map_err(|e| {
            tracing::error!("Failed to clear avatar pointer of {}: {}", user_id, e);
            ApplicationError::PointerUpdateFailed {
                key: None,
                url: Some(url.clone()),
                message: e.to_string(),
            }
        })?;

        tracing::info!("Cleared unreachable avatar pointer of {}: {}", user_id, url);
        Ok(VerifyOutcome::Cleared)
    }

    /// Verify every known profile. Per-user failures become warnings.
    pub async fn verify_all(&self) -> Result<SweepReport, ApplicationError> {
        let user_ids = with_deadline(
            self.timeouts.profile(),
            "profile listing",
            self.profile_repository.list_user_ids(),
        )
        .await
        .map_err(|e| ApplicationError::ProfileReadFailed(e.to_string()))?;

        let outcomes: Vec<(String, Result<VerifyOutcome, ApplicationError>)> =
            stream::iter(user_ids)
                .map(|user_id| async move {
                    let outcome = self.verify(&user_id).await;
                    (user_id, outcome)
                })
                .buffer_unordered(SWEEP_CONCURRENCY)
                .collect()
                .await;

        let mut report = SweepReport {
            checked: outcomes.len(),
            ..SweepReport::default()
        };
        for (user_id, outcome) in outcomes {
            match outcome {
                Ok(VerifyOutcome::Ok) => {}
                Ok(VerifyOutcome::Cleared) => report.cleared.push(user_id),
                Err(e) => report.warnings.push(AvatarWarning::VerifyFailed {
                    user_id,
                    message: e.to_string(),
                }),
            }
        }
        report.cleared.sort();

        tracing::info!(
            "Link health sweep checked {} profiles, cleared {}",
            report.checked,
            report.cleared.len()
        );
        Ok(report)
    }

    async fn current_url(&self, user_id: &str) -> Result<Option<String>, ApplicationError> {
        let pointer = with_deadline(
            self.timeouts.profile(),
            "profile read",
            self.profile_repository.get_pointer(user_id),
        )
        .await
        .map_err(|e| ApplicationError::ProfileReadFailed(e.to_string()))?;

        Ok(pointer.avatar_url)
    }

    async fn probe_with_retries(&self, url: &str) -> Result<(), AvatarWarning> {
        let mut last_error = None;
        for attempt in 0..=self.probe_retries {
            match with_deadline(self.timeouts.probe(), "probe", self.probe.probe(url)).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::debug!("Probe attempt {} for {} failed: {}", attempt + 1, url, e);
                    last_error = Some(e);
                }
            }
        }

        Err(AvatarWarning::ProbeFailed {
            url: url.to_string(),
            message: last_error.map(|e| e.to_string()).unwrap_or_default(),
        })
    }
}
