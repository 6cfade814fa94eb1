//! Observed-state normalization.
//!
//! Reads the public flags from the snapshot and the grants from the
//! visibility store, and folds them back into compact declarations.

use std::collections::{BTreeSet, HashSet};
use tracing::{debug, info};

use crate::error::Result;
use crate::platform::{CatalogSnapshot, ServiceOffering, ServicePlan, VisibilityFilter, VisibilityStore};

use super::expand::Expander;
use super::model::{AccessDeclaration, AccessTuple};

/// Produces the compact declared form of what is currently granted.
pub struct Normalizer<'a, V: VisibilityStore + ?Sized> {
    snapshot: &'a CatalogSnapshot,
    store: &'a V,
}

impl<'a, V: VisibilityStore + ?Sized> Normalizer<'a, V> {
    /// Creates a normalizer over a snapshot and a visibility store.
    #[must_use]
    pub const fn new(snapshot: &'a CatalogSnapshot, store: &'a V) -> Self {
        Self { snapshot, store }
    }

    /// Normalizes the observed access of every service in the snapshot.
    ///
    /// # Errors
    ///
    /// Returns the first visibility store error encountered.
    pub async fn normalize(&self) -> Result<Vec<AccessDeclaration>> {
        info!(
            "Normalizing observed access for broker {}",
            self.snapshot.broker.name
        );

        let mut declarations = Vec::new();
        for service in &self.snapshot.services {
            declarations.extend(self.normalize_service(service).await?);
        }

        let mut seen = HashSet::new();
        declarations.retain(|d| seen.insert(d.clone()));

        debug!("Observed {} declarations", declarations.len());
        Ok(declarations)
    }

    /// Expands observed declarations into the tuples currently granted.
    ///
    /// Observed `Public` has two origins. A service with a public-flagged
    /// plan is read back from its visibility records, so grants lingering
    /// under the flag can still be revoked. A service whose every plan is
    /// granted in every organization denotes all those grants.
    ///
    /// # Errors
    ///
    /// Returns a catalog error for declarations absent from the snapshot, or
    /// the first visibility store error.
    pub async fn observed_tuples(
        &self,
        observed: &[AccessDeclaration],
    ) -> Result<BTreeSet<AccessTuple>> {
        let expander = Expander::new(self.snapshot);
        let mut tuples = BTreeSet::new();

        for declaration in observed {
            if !declaration.is_public() {
                tuples.extend(expander.expand(declaration)?);
                continue;
            }

            let service = self.snapshot.resolve_service(declaration.service())?;
            if service.has_public_plan() {
                tuples.extend(self.granted_tuples(service).await?);
            } else {
                for plan in &service.plans {
                    tuples.extend(
                        self.snapshot
                            .organizations
                            .iter()
                            .map(|org| AccessTuple::new(&service.label, &plan.name, &org.id)),
                    );
                }
            }
        }

        Ok(tuples)
    }

    async fn granted_tuples(&self, service: &ServiceOffering) -> Result<Vec<AccessTuple>> {
        let mut tuples = Vec::new();
        for plan in &service.plans {
            for visibility in self.store.search(&VisibilityFilter::for_plan(&plan.id)).await? {
                tuples.push(AccessTuple::new(&service.label, &plan.name, &visibility.org_id));
            }
        }
        if !tuples.is_empty() {
            debug!(
                "Service {} is public with {} lingering grants",
                service.label,
                tuples.len()
            );
        }
        Ok(tuples)
    }

    async fn normalize_service(&self, service: &ServiceOffering) -> Result<Vec<AccessDeclaration>> {
        // One public plan is taken as the whole service being open.
        if service.has_public_plan() {
            debug!("Service {} has a public plan", service.label);
            return Ok(vec![Self::public(service)]);
        }

        let mut in_all_orgs = Vec::new();
        let mut explicit = Vec::new();

        for plan in &service.plans {
            if self.is_plan_in_all_orgs(plan).await? {
                in_all_orgs.push(AccessDeclaration::PlanInAllOrgs {
                    service: service.label.clone(),
                    plan: plan.name.clone(),
                });
                continue;
            }

            for visibility in self.store.search(&VisibilityFilter::for_plan(&plan.id)).await? {
                explicit.push(AccessDeclaration::PlanInOrg {
                    service: service.label.clone(),
                    plan: plan.name.clone(),
                    org: visibility.org_id,
                });
            }
        }

        if in_all_orgs.len() == service.plans.len() {
            debug!("Every plan of {} is granted everywhere", service.label);
            return Ok(vec![Self::public(service)]);
        }

        let mut declarations = in_all_orgs;
        declarations.extend(compact_by_org(&explicit, service.plans.len()));
        Ok(declarations)
    }

    /// True if the plan has a grant in every organization of the snapshot.
    async fn is_plan_in_all_orgs(&self, plan: &ServicePlan) -> Result<bool> {
        for org in &self.snapshot.organizations {
            let filter = VisibilityFilter::for_plan_and_org(&plan.id, &org.id);
            if self.store.search(&filter).await?.is_empty() {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn public(service: &ServiceOffering) -> AccessDeclaration {
        AccessDeclaration::Public {
            service: service.label.clone(),
        }
    }
}

/// Collapses organizations granted every plan into one all-plans record.
///
/// Collapsed records come first, followed by the explicit records left as-is.
/// Bookkeeping is keyed by `(org, plan)`, so an org covering several plans
/// yields one collapsed record per plan; the caller's dedup folds those.
fn compact_by_org(explicit: &[AccessDeclaration], plan_count: usize) -> Vec<AccessDeclaration> {
    let mut collapsed = Vec::new();
    let mut kept = Vec::new();
    let mut seen: HashSet<(&str, &str)> = HashSet::new();

    for declaration in explicit {
        let AccessDeclaration::PlanInOrg { service, plan, org } = declaration else {
            kept.push(declaration.clone());
            continue;
        };

        if seen.contains(&(org.as_str(), plan.as_str())) {
            continue;
        }

        let grants_in_org = explicit
            .iter()
            .filter(|d| d.org() == Some(org.as_str()))
            .count();

        if grants_in_org == plan_count {
            collapsed.push(AccessDeclaration::AllPlansInOrg {
                service: service.clone(),
                org: org.clone(),
            });
            seen.insert((org.as_str(), plan.as_str()));
            continue;
        }

        kept.push(declaration.clone());
    }

    collapsed.extend(kept);
    collapsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AccessError, PlatformError};
    use crate::platform::memory::InMemoryPlatform;
    use crate::platform::PlanVisibility;
    use async_trait::async_trait;
    use mockall::mock;

    mock! {
        Store {}

        #[async_trait]
        impl VisibilityStore for Store {
            async fn search(&self, filter: &VisibilityFilter) -> Result<Vec<PlanVisibility>>;
            async fn create(&self, plan_id: &str, org_id: &str) -> Result<PlanVisibility>;
            async fn delete(&self, visibility_id: &str) -> Result<()>;
        }
    }

    async fn observe(platform: &InMemoryPlatform) -> Vec<AccessDeclaration> {
        let snapshot = CatalogSnapshot::fetch(platform, "my-broker")
            .await
            .expect("snapshot should be fetched");
        Normalizer::new(&snapshot, platform)
            .normalize()
            .await
            .expect("normalization should succeed")
    }

    fn decl(service: &str, plan: Option<&str>, org: Option<&str>) -> AccessDeclaration {
        AccessDeclaration::from_parts(service, plan, org)
    }

    #[tokio::test]
    async fn test_plan_in_all_orgs_and_partial_plan() {
        let platform = InMemoryPlatform::new("my-broker")
            .with_service("S", &["p1", "p2"])
            .with_orgs(&["o1", "o2"])
            .with_grant("S", "p1", "o1")
            .with_grant("S", "p1", "o2")
            .with_grant("S", "p2", "o1");

        let observed = observe(&platform).await;

        assert_eq!(
            observed,
            vec![decl("S", Some("p1"), None), decl("S", Some("p2"), Some("o1"))]
        );
    }

    #[tokio::test]
    async fn test_public_plan_short_circuits_service() {
        let platform = InMemoryPlatform::new("my-broker")
            .with_service("S", &["p1", "p2"])
            .with_orgs(&["o1", "o2"])
            .with_public("S", "p2")
            .with_grant("S", "p1", "o1");

        let observed = observe(&platform).await;

        assert_eq!(observed, vec![decl("S", None, None)]);
    }

    #[tokio::test]
    async fn test_every_plan_everywhere_is_public() {
        let platform = InMemoryPlatform::new("my-broker")
            .with_service("S", &["p1"])
            .with_orgs(&["o1", "o2"])
            .with_grant("S", "p1", "o1")
            .with_grant("S", "p1", "o2");

        let observed = observe(&platform).await;

        assert_eq!(observed, vec![decl("S", None, None)]);
    }

    #[tokio::test]
    async fn test_org_with_every_plan_collapses() {
        let platform = InMemoryPlatform::new("my-broker")
            .with_service("S", &["p1", "p2"])
            .with_orgs(&["o1", "o2", "o3"])
            .with_grant("S", "p1", "o1")
            .with_grant("S", "p2", "o1")
            .with_grant("S", "p1", "o2");

        let observed = observe(&platform).await;

        assert_eq!(
            observed,
            vec![decl("S", None, Some("o1")), decl("S", Some("p1"), Some("o2"))]
        );
    }

    #[tokio::test]
    async fn test_no_grants_observes_nothing() {
        let platform = InMemoryPlatform::new("my-broker")
            .with_service("S", &["p1", "p2"])
            .with_orgs(&["o1"]);

        assert!(observe(&platform).await.is_empty());
    }

    #[test]
    fn test_compaction_emits_collapsed_record_per_plan_key() {
        let explicit = vec![
            decl("S", Some("p1"), Some("o1")),
            decl("S", Some("p2"), Some("o1")),
        ];

        let compacted = compact_by_org(&explicit, 2);

        assert_eq!(
            compacted,
            vec![decl("S", None, Some("o1")), decl("S", None, Some("o1"))]
        );
    }

    #[tokio::test]
    async fn test_search_error_is_propagated() {
        let platform = InMemoryPlatform::new("my-broker")
            .with_service("S", &["p1"])
            .with_orgs(&["o1"]);
        let snapshot = CatalogSnapshot::fetch(&platform, "my-broker")
            .await
            .expect("snapshot should be fetched");

        let mut store = MockStore::new();
        store
            .expect_search()
            .returning(|_| Err(PlatformError::network("connection reset").into()));

        let result = Normalizer::new(&snapshot, &store).normalize().await;
        assert!(matches!(
            result,
            Err(AccessError::Platform(PlatformError::NetworkError { .. }))
        ));
    }

    async fn tuples_of(platform: &InMemoryPlatform) -> Vec<String> {
        let snapshot = CatalogSnapshot::fetch(platform, "my-broker")
            .await
            .expect("snapshot should be fetched");
        let normalizer = Normalizer::new(&snapshot, platform);
        let observed = normalizer.normalize().await.expect("normalization should succeed");
        normalizer
            .observed_tuples(&observed)
            .await
            .expect("observed tuples")
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    #[tokio::test]
    async fn test_all_orgs_public_denotes_every_grant() {
        let platform = InMemoryPlatform::new("my-broker")
            .with_service("S", &["p1", "p2"])
            .with_orgs(&["o1"])
            .with_grant("S", "p1", "o1")
            .with_grant("S", "p2", "o1");

        assert_eq!(observe(&platform).await, vec![decl("S", None, None)]);
        assert_eq!(tuples_of(&platform).await, vec!["S:p1@o1", "S:p2@o1"]);
    }

    #[tokio::test]
    async fn test_flag_public_reads_lingering_grants() {
        let platform = InMemoryPlatform::new("my-broker")
            .with_service("S", &["p1", "p2"])
            .with_orgs(&["o1", "o2"])
            .with_public("S", "p1")
            .with_grant("S", "p2", "o2");

        assert_eq!(observe(&platform).await, vec![decl("S", None, None)]);
        assert_eq!(tuples_of(&platform).await, vec!["S:p2@o2"]);
    }

    #[tokio::test]
    async fn test_flag_public_without_grants_has_no_tuples() {
        let platform = InMemoryPlatform::new("my-broker")
            .with_service("S", &["p1"])
            .with_orgs(&["o1"])
            .with_public("S", "p1");

        assert!(tuples_of(&platform).await.is_empty());
    }

    #[tokio::test]
    async fn test_non_public_tuples_follow_expansion() {
        let platform = InMemoryPlatform::new("my-broker")
            .with_service("S", &["p1", "p2"])
            .with_orgs(&["o1", "o2"])
            .with_grant("S", "p1", "o1")
            .with_grant("S", "p1", "o2")
            .with_grant("S", "p2", "o1");

        assert_eq!(tuples_of(&platform).await, vec!["S:p1@o1", "S:p1@o2", "S:p2@o1"]);
    }
}
