//! Plan executor for applying access plans.
//!
//! Phases run strictly one after another: public flags, grants, revokes.
//! The first fatal error stops the pass; writes already issued are not
//! rolled back.

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::platform::{Platform, VisibilityFilter};

use super::plan::{AccessPlan, PlannedAction};

/// Executor for access plans.
pub struct PlanExecutor<'a, P: Platform + ?Sized> {
    /// Platform to write to.
    platform: &'a P,
}

/// Counts of what an apply did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    /// Plans whose public flag was changed.
    pub public_changes: usize,
    /// Grants created.
    pub granted: usize,
    /// Grants that already existed.
    pub already_granted: usize,
    /// Grants deleted.
    pub revoked: usize,
    /// Grants that were already gone.
    pub already_revoked: usize,
}

impl ApplyReport {
    /// Number of writes that changed platform state.
    #[must_use]
    pub const fn changes(&self) -> usize {
        self.public_changes + self.granted + self.revoked
    }
}

impl<'a, P: Platform + ?Sized> PlanExecutor<'a, P> {
    /// Creates a new plan executor.
    #[must_use]
    pub const fn new(platform: &'a P) -> Self {
        Self { platform }
    }

    /// Executes an access plan.
    ///
    /// # Errors
    ///
    /// Returns the first platform error that is neither a duplicate grant
    /// nor an already deleted grant, unmodified.
    pub async fn execute(&self, plan: &AccessPlan) -> Result<ApplyReport> {
        info!(
            "Applying access plan for broker {} with {} actions",
            plan.broker,
            plan.action_count()
        );

        let mut report = ApplyReport::default();

        let public: Vec<(&PlannedAction, bool)> = plan.public_changes().collect();
        for (done, (action, public_flag)) in public.iter().enumerate() {
            if let Err(err) = self
                .platform
                .set_public(&action.plan, &action.service_id, *public_flag)
                .await
            {
                error!(
                    "Public flag update failed at {action}: {done} of {} applied",
                    public.len()
                );
                return Err(err);
            }
            report.public_changes += 1;
        }

        let grants: Vec<(&PlannedAction, &str)> = plan.grants().collect();
        for (done, (action, org)) in grants.iter().enumerate() {
            if let Err(err) = self.grant(action, org, &mut report).await {
                error!("Grant failed at {action}: {done} of {} applied", grants.len());
                return Err(err);
            }
        }

        let revokes: Vec<(&PlannedAction, &str)> = plan.revokes().collect();
        for (done, (action, org)) in revokes.iter().enumerate() {
            if let Err(err) = self.revoke(action, org, &mut report).await {
                error!("Revoke failed at {action}: {done} of {} applied", revokes.len());
                return Err(err);
            }
        }

        info!(
            "Applied: {} public changes, {} granted ({} already), {} revoked ({} already gone)",
            report.public_changes,
            report.granted,
            report.already_granted,
            report.revoked,
            report.already_revoked
        );

        Ok(report)
    }

    async fn grant(
        &self,
        action: &PlannedAction,
        org: &str,
        report: &mut ApplyReport,
    ) -> Result<()> {
        match self.platform.create(&action.plan.id, org).await {
            Ok(visibility) => {
                debug!("Granted {action} as {}", visibility.id);
                report.granted += 1;
                Ok(())
            }
            Err(err) if err.is_conflict() => {
                info!(
                    "Skipping grant of plan {} of {} to org {org}: already granted",
                    action.plan.name, action.service
                );
                report.already_granted += 1;
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    async fn revoke(
        &self,
        action: &PlannedAction,
        org: &str,
        report: &mut ApplyReport,
    ) -> Result<()> {
        let filter = VisibilityFilter::for_plan_and_org(&action.plan.id, org);

        let Some(visibility) = self.platform.search(&filter).await?.into_iter().next() else {
            debug!("Nothing to revoke for {action}");
            report.already_revoked += 1;
            return Ok(());
        };

        match self.platform.delete(&visibility.id).await {
            Ok(()) => {
                debug!("Revoked {action}");
                report.revoked += 1;
                Ok(())
            }
            Err(err) if err.is_not_found() => {
                warn!("Visibility {} vanished before it could be deleted", visibility.id);
                report.already_revoked += 1;
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}
