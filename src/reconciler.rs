//! Reconciler for broker plan access.
//!
//! A pass fetches a fresh catalog snapshot, normalizes what is currently
//! granted, expands both sides into tuples, diffs them and applies the
//! resulting plan. Nothing is carried over between passes.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::access::{AccessDeclaration, AccessTuple, Expander, Normalizer};
use crate::config::ConfigHasher;
use crate::error::{ReconcileError, Result};
use crate::planner::{AccessDiff, AccessPlan, ApplyReport, DiffEngine, PlanExecutor};
use crate::platform::{CatalogSnapshot, Platform};

/// Reconciler for the plan access of one broker.
pub struct Reconciler<'a, P: Platform + ?Sized> {
    /// Platform collaborators.
    platform: &'a P,
    /// Broker name or GUID.
    broker: &'a str,
    /// Declaration hasher.
    hasher: ConfigHasher,
}

/// Everything computed for a pass before any write.
#[derive(Debug, Clone)]
pub struct PreparedPass {
    /// Snapshot the pass is based on.
    pub snapshot: CatalogSnapshot,
    /// Observed access in compact form.
    pub observed: Vec<AccessDeclaration>,
    /// Tuple diff.
    pub diff: AccessDiff,
    /// Writes to issue.
    pub plan: AccessPlan,
}

/// Result of a reconciliation run.
#[derive(Debug, Serialize)]
pub struct ReconciliationResult {
    /// Broker name.
    pub broker: String,
    /// Hash of the desired declarations.
    pub config_hash: String,
    /// Number of tuples that had to be granted.
    pub to_create: usize,
    /// Number of tuples that had to be revoked.
    pub to_delete: usize,
    /// What the apply did.
    pub report: ApplyReport,
}

/// Report of drift detection.
#[derive(Debug, Serialize)]
pub struct DriftReport {
    /// Whether drift was detected.
    pub has_drift: bool,
    /// Tuples declared but not granted.
    pub to_create: Vec<AccessTuple>,
    /// Tuples granted but not declared.
    pub to_delete: Vec<AccessTuple>,
    /// Plans whose public flag differs from the declarations.
    pub public_changes: usize,
    /// Observed access in compact form.
    pub observed: Vec<AccessDeclaration>,
}

impl<'a, P: Platform + ?Sized> Reconciler<'a, P> {
    /// Creates a new reconciler for a broker.
    #[must_use]
    pub const fn new(platform: &'a P, broker: &'a str) -> Self {
        Self {
            platform,
            broker,
            hasher: ConfigHasher::new(),
        }
    }

    /// Returns the observed access of the broker in compact form.
    ///
    /// # Errors
    ///
    /// Returns an error if the broker is unknown or a platform call fails.
    pub async fn observed(&self) -> Result<Vec<AccessDeclaration>> {
        let snapshot = self.snapshot().await?;
        Normalizer::new(&snapshot, self.platform).normalize().await
    }

    /// Computes everything a pass would do, without writing.
    ///
    /// # Errors
    ///
    /// Returns `ServiceNotFound` or `PlanNotFound` for declarations that do
    /// not match the catalog, or the first platform error.
    pub async fn prepare(&self, desired: &[AccessDeclaration]) -> Result<PreparedPass> {
        let snapshot = self.snapshot().await?;
        let expander = Expander::new(&snapshot);

        let desired_tuples = expander.expand_all(desired)?;
        debug!("Desired access expands to {} tuples", desired_tuples.len());

        let normalizer = Normalizer::new(&snapshot, self.platform);
        let observed = normalizer.normalize().await?;
        let observed_tuples = normalizer.observed_tuples(&observed).await?;
        debug!("Observed access expands to {} tuples", observed_tuples.len());

        let diff = DiffEngine::diff(&observed_tuples, &desired_tuples);
        let config_hash = self.hasher.hash_declarations(desired);
        let plan = AccessPlan::build(&snapshot, desired, &diff, &config_hash)?;

        Ok(PreparedPass {
            snapshot,
            observed,
            diff,
            plan,
        })
    }

    /// Computes the access plan without applying it.
    ///
    /// # Errors
    ///
    /// Same as [`Reconciler::prepare`].
    pub async fn plan(&self, desired: &[AccessDeclaration]) -> Result<AccessPlan> {
        Ok(self.prepare(desired).await?.plan)
    }

    /// Reconciles the broker's plan access with the desired declarations.
    ///
    /// The full plan is computed before the first write, so catalog errors
    /// abort the pass with the platform untouched.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error encountered, unmodified.
    pub async fn reconcile_access(
        &self,
        desired: &[AccessDeclaration],
    ) -> Result<ReconciliationResult> {
        info!("Starting access reconciliation for broker {}", self.broker);

        let pass = self.prepare(desired).await?;
        self.apply(pass).await
    }

    /// Reconciles only if the pass still matches a plan approved earlier.
    ///
    /// The platform is re-read first. If anything changed since `approved`
    /// was computed, the pass is aborted before the first write.
    ///
    /// # Errors
    ///
    /// Returns `Aborted` if the fresh plan differs from `approved`, otherwise
    /// the same errors as [`Reconciler::reconcile_access`].
    pub async fn reconcile_approved(
        &self,
        desired: &[AccessDeclaration],
        approved: &AccessPlan,
    ) -> Result<ReconciliationResult> {
        info!("Starting approved access reconciliation for broker {}", self.broker);

        let pass = self.prepare(desired).await?;
        if !pass.plan.same_actions(approved) {
            warn!(
                "Plan for broker {} changed: {} actions approved, {} now required",
                self.broker,
                approved.action_count(),
                pass.plan.action_count()
            );
            return Err(ReconcileError::Aborted {
                reason: String::from("platform changed since the plan was approved"),
            }
            .into());
        }

        self.apply(pass).await
    }

    /// Checks for drift without applying changes.
    ///
    /// # Errors
    ///
    /// Same as [`Reconciler::prepare`].
    pub async fn check_drift(&self, desired: &[AccessDeclaration]) -> Result<DriftReport> {
        info!("Checking access drift for broker {}", self.broker);

        let pass = self.prepare(desired).await?;

        Ok(DriftReport {
            has_drift: !pass.plan.is_empty(),
            public_changes: pass.plan.public_change_count(),
            to_create: pass.diff.to_create.into_iter().collect(),
            to_delete: pass.diff.to_delete.into_iter().collect(),
            observed: pass.observed,
        })
    }

    async fn apply(&self, pass: PreparedPass) -> Result<ReconciliationResult> {
        info!(
            "Diff: {} to create, {} to delete, {} public flag changes",
            pass.diff.to_create.len(),
            pass.diff.to_delete.len(),
            pass.plan.public_change_count()
        );

        let report = if pass.plan.is_empty() {
            info!("No changes required - access is converged");
            ApplyReport::default()
        } else {
            PlanExecutor::new(self.platform).execute(&pass.plan).await?
        };

        Ok(ReconciliationResult {
            broker: pass.snapshot.broker.name,
            config_hash: pass.plan.config_hash,
            to_create: pass.diff.to_create.len(),
            to_delete: pass.diff.to_delete.len(),
            report,
        })
    }

    async fn snapshot(&self) -> Result<CatalogSnapshot> {
        CatalogSnapshot::fetch(self.platform, self.broker).await
    }
}

impl DriftReport {
    /// Returns true if the access is converged (no drift).
    #[must_use]
    pub const fn is_converged(&self) -> bool {
        !self.has_drift
    }
}

impl std::fmt::Display for DriftReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if !self.has_drift {
            return write!(f, "No drift detected - access is converged");
        }

        writeln!(f, "Drift detected:")?;
        for tuple in &self.to_create {
            writeln!(f, "  + {tuple}")?;
        }
        for tuple in &self.to_delete {
            writeln!(f, "  - {tuple}")?;
        }
        if self.public_changes > 0 {
            writeln!(f, "  ~ {} public flag changes", self.public_changes)?;
        }
        Ok(())
    }
}

impl std::fmt::Display for ReconciliationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Reconciliation of {} successful:", self.broker)?;
        writeln!(f, "  Public flags changed: {}", self.report.public_changes)?;
        writeln!(
            f,
            "  Granted: {} ({} already granted)",
            self.report.granted, self.report.already_granted
        )?;
        writeln!(
            f,
            "  Revoked: {} ({} already gone)",
            self.report.revoked, self.report.already_revoked
        )
    }
}
