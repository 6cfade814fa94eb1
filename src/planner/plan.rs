//! Access plan types and construction.
//!
//! A plan is the full list of writes a pass will issue, built before any
//! of them runs: public flag changes first, then grants, then revokes.

use chrono::{DateTime, Utc};

use crate::access::{AccessDeclaration, AccessTuple};
use crate::error::{CatalogError, Result};
use crate::platform::{CatalogSnapshot, ServiceOffering, ServicePlan};

use super::diff::AccessDiff;

/// A complete access plan.
#[derive(Debug, Clone)]
pub struct AccessPlan {
    /// When the plan was created.
    pub created_at: DateTime<Utc>,
    /// Hash of the desired declarations this plan is based on.
    pub config_hash: String,
    /// Broker name.
    pub broker: String,
    /// Planned actions in execution order.
    pub actions: Vec<PlannedAction>,
}

/// A single planned write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedAction {
    /// Action type, carrying the organization for grants and revokes.
    pub action_type: ActionType,
    /// Service label.
    pub service: String,
    /// Service GUID.
    pub service_id: String,
    /// Target plan.
    pub plan: ServicePlan,
    /// Reason for this action.
    pub reason: String,
}

/// Types of actions in a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionType {
    /// Make a plan visible to every organization.
    SetPublic,
    /// Restrict a plan to its visibility records.
    SetPrivate,
    /// Grant a plan to an organization.
    Grant {
        /// Organization GUID.
        org: String,
    },
    /// Revoke a plan from an organization.
    Revoke {
        /// Organization GUID.
        org: String,
    },
}

impl AccessPlan {
    /// Builds a plan from the desired declarations and the tuple diff.
    ///
    /// Public flags follow the last declaration naming each service: a
    /// public declaration opens every plan, any other closes every plan.
    /// Plans already carrying the target flag are left alone. Services
    /// without a declaration keep their flags.
    ///
    /// # Errors
    ///
    /// Returns `ServiceNotFound` or `PlanNotFound` if a declaration or tuple
    /// refers to something absent from the snapshot.
    pub fn build(
        snapshot: &CatalogSnapshot,
        desired: &[AccessDeclaration],
        diff: &AccessDiff,
        config_hash: &str,
    ) -> Result<Self> {
        let mut targets: Vec<(&ServiceOffering, bool)> = Vec::new();
        for declaration in desired {
            let service = snapshot.resolve_service(declaration.service())?;
            let public = declaration.is_public();
            match targets.iter_mut().find(|(s, _)| s.id == service.id) {
                Some(target) => target.1 = public,
                None => targets.push((service, public)),
            }
        }

        let mut actions = Vec::new();

        for (service, public) in targets {
            for plan in service.plans.iter().filter(|p| p.public != public) {
                let (action_type, reason) = if public {
                    (ActionType::SetPublic, "service declared public")
                } else {
                    (ActionType::SetPrivate, "service declared with plan or org access")
                };
                actions.push(PlannedAction {
                    action_type,
                    service: service.label.clone(),
                    service_id: service.id.clone(),
                    plan: plan.clone(),
                    reason: String::from(reason),
                });
            }
        }

        for tuple in &diff.to_create {
            actions.push(Self::tuple_action(
                snapshot,
                tuple,
                ActionType::Grant {
                    org: tuple.org.clone(),
                },
                "declared but not granted",
            )?);
        }

        for tuple in &diff.to_delete {
            actions.push(Self::tuple_action(
                snapshot,
                tuple,
                ActionType::Revoke {
                    org: tuple.org.clone(),
                },
                "granted but not declared",
            )?);
        }

        Ok(Self {
            created_at: Utc::now(),
            config_hash: config_hash.to_string(),
            broker: snapshot.broker.name.clone(),
            actions,
        })
    }

    fn tuple_action(
        snapshot: &CatalogSnapshot,
        tuple: &AccessTuple,
        action_type: ActionType,
        reason: &str,
    ) -> Result<PlannedAction> {
        let service = snapshot.resolve_service(&tuple.service)?;
        let plan = service
            .find_plan(&tuple.plan)
            .ok_or_else(|| CatalogError::PlanNotFound {
                plan: tuple.plan.clone(),
                service: service.label.clone(),
            })?;

        Ok(PlannedAction {
            action_type,
            service: service.label.clone(),
            service_id: service.id.clone(),
            plan: plan.clone(),
            reason: reason.to_string(),
        })
    }

    /// Returns true if the plan is empty (no changes).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Returns the number of actions.
    #[must_use]
    pub fn action_count(&self) -> usize {
        self.actions.len()
    }

    /// Returns true if both plans issue the same writes in the same order.
    #[must_use]
    pub fn same_actions(&self, other: &Self) -> bool {
        self.actions == other.actions
    }

    /// Public flag changes with their target flag, in plan order.
    pub fn public_changes(&self) -> impl Iterator<Item = (&PlannedAction, bool)> {
        self.actions.iter().filter_map(|a| match a.action_type {
            ActionType::SetPublic => Some((a, true)),
            ActionType::SetPrivate => Some((a, false)),
            ActionType::Grant { .. } | ActionType::Revoke { .. } => None,
        })
    }

    /// Grants with their organization, in plan order.
    pub fn grants(&self) -> impl Iterator<Item = (&PlannedAction, &str)> {
        self.actions.iter().filter_map(|a| match &a.action_type {
            ActionType::Grant { org } => Some((a, org.as_str())),
            _ => None,
        })
    }

    /// Revokes with their organization, in plan order.
    pub fn revokes(&self) -> impl Iterator<Item = (&PlannedAction, &str)> {
        self.actions.iter().filter_map(|a| match &a.action_type {
            ActionType::Revoke { org } => Some((a, org.as_str())),
            _ => None,
        })
    }

    /// Returns the number of public flag changes.
    #[must_use]
    pub fn public_change_count(&self) -> usize {
        self.public_changes().count()
    }

    /// Returns the number of grants.
    #[must_use]
    pub fn grant_count(&self) -> usize {
        self.grants().count()
    }

    /// Returns the number of revokes.
    #[must_use]
    pub fn revoke_count(&self) -> usize {
        self.revokes().count()
    }
}

impl ActionType {
    /// The organization a grant or revoke targets.
    #[must_use]
    pub fn org(&self) -> Option<&str> {
        match self {
            Self::Grant { org } | Self::Revoke { org } => Some(org),
            Self::SetPublic | Self::SetPrivate => None,
        }
    }
}

impl PlannedAction {
    /// Returns a human-readable description of the action.
    #[must_use]
    pub fn description(&self) -> String {
        match &self.action_type {
            ActionType::SetPublic => {
                format!("Make plan '{}' of '{}' public", self.plan.name, self.service)
            }
            ActionType::SetPrivate => {
                format!("Make plan '{}' of '{}' private", self.plan.name, self.service)
            }
            ActionType::Grant { org } => format!(
                "Grant plan '{}' of '{}' to org {org}",
                self.plan.name, self.service
            ),
            ActionType::Revoke { org } => format!(
                "Revoke plan '{}' of '{}' from org {org}",
                self.plan.name, self.service
            ),
        }
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::SetPublic => "public",
            Self::SetPrivate => "private",
            Self::Grant { .. } => "grant",
            Self::Revoke { .. } => "revoke",
        };
        write!(f, "{s}")
    }
}

impl std::fmt::Display for PlannedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}:{}", self.action_type, self.service, self.plan.name)?;
        if let Some(org) = self.action_type.org() {
            write!(f, "@{org}")?;
        }
        if !self.reason.is_empty() {
            write!(f, " ({})", self.reason)?;
        }
        Ok(())
    }
}

impl std::fmt::Display for AccessPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.actions.is_empty() {
            return write!(f, "No changes required");
        }

        writeln!(
            f,
            "Access plan for broker {} ({} actions):",
            self.broker,
            self.actions.len()
        )?;
        for (i, action) in self.actions.iter().enumerate() {
            writeln!(f, "  {}. {action}", i + 1)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AccessError;
    use crate::platform::{Organization, ServiceBroker};
    use std::collections::BTreeSet;

    fn snapshot(public: bool) -> CatalogSnapshot {
        let plan = |name: &str| ServicePlan {
            id: format!("plan-{name}"),
            name: name.to_string(),
            public,
            service_id: String::from("svc-db"),
        };

        CatalogSnapshot::new(
            ServiceBroker {
                id: String::from("broker-guid"),
                name: String::from("my-broker"),
                url: String::from("https://broker.example.com"),
                username: String::from("broker-user"),
            },
            vec![ServiceOffering {
                id: String::from("svc-db"),
                label: String::from("db"),
                plans: vec![plan("small"), plan("large")],
            }],
            vec![Organization {
                id: String::from("org-a"),
                name: String::from("a"),
            }],
        )
    }

    fn diff(create: &[(&str, &str, &str)], delete: &[(&str, &str, &str)]) -> AccessDiff {
        let set = |items: &[(&str, &str, &str)]| -> BTreeSet<AccessTuple> {
            items
                .iter()
                .map(|(s, p, o)| AccessTuple::new(s, p, o))
                .collect()
        };
        AccessDiff {
            to_create: set(create),
            to_delete: set(delete),
        }
    }

    #[test]
    fn test_plan_orders_public_then_grants_then_revokes() {
        let snapshot = snapshot(true);
        let desired = [AccessDeclaration::from_parts("db", Some("small"), Some("org-a"))];

        let plan = AccessPlan::build(
            &snapshot,
            &desired,
            &diff(&[("db", "small", "org-a")], &[("db", "large", "org-a")]),
            "abc",
        )
        .expect("plan should build");

        let types: Vec<ActionType> = plan.actions.iter().map(|a| a.action_type.clone()).collect();
        assert_eq!(
            types,
            vec![
                ActionType::SetPrivate,
                ActionType::SetPrivate,
                ActionType::Grant {
                    org: String::from("org-a")
                },
                ActionType::Revoke {
                    org: String::from("org-a")
                }
            ]
        );
        assert_eq!(plan.public_change_count(), 2);
        assert_eq!(plan.grant_count(), 1);
        assert_eq!(plan.revoke_count(), 1);
        assert_eq!(plan.actions[2].plan.id, "plan-small");
    }

    #[test]
    fn test_matching_public_flags_are_skipped() {
        let snapshot = snapshot(true);
        let desired = [AccessDeclaration::from_parts("db", None, None)];

        let plan = AccessPlan::build(&snapshot, &desired, &AccessDiff::default(), "abc")
            .expect("plan should build");

        assert!(plan.is_empty());
        assert_eq!(plan.to_string(), "No changes required");
    }

    #[test]
    fn test_last_declaration_wins_for_public_flag() {
        let snapshot = snapshot(false);
        let desired = [
            AccessDeclaration::from_parts("db", Some("small"), None),
            AccessDeclaration::from_parts("db", None, None),
        ];

        let plan = AccessPlan::build(&snapshot, &desired, &AccessDiff::default(), "abc")
            .expect("plan should build");

        assert_eq!(plan.action_count(), 2);
        assert!(plan
            .actions
            .iter()
            .all(|a| a.action_type == ActionType::SetPublic));
    }

    #[test]
    fn test_unknown_service_fails() {
        let snapshot = snapshot(false);
        let desired = [AccessDeclaration::from_parts("queue", None, None)];

        let result = AccessPlan::build(&snapshot, &desired, &AccessDiff::default(), "abc");
        assert!(matches!(
            result,
            Err(AccessError::Catalog(CatalogError::ServiceNotFound { .. }))
        ));
    }

    #[test]
    fn test_grants_and_revokes_carry_their_org() {
        let snapshot = snapshot(false);
        let plan = AccessPlan::build(
            &snapshot,
            &[],
            &diff(&[("db", "small", "org-a")], &[("db", "large", "org-b")]),
            "abc",
        )
        .expect("plan should build");

        let grants: Vec<(&str, &str)> = plan
            .grants()
            .map(|(a, org)| (a.plan.name.as_str(), org))
            .collect();
        let revokes: Vec<(&str, &str)> = plan
            .revokes()
            .map(|(a, org)| (a.plan.name.as_str(), org))
            .collect();

        assert_eq!(grants, vec![("small", "org-a")]);
        assert_eq!(revokes, vec![("large", "org-b")]);
        assert_eq!(plan.public_changes().count(), 0);
        assert!(plan.actions.iter().all(|a| a.action_type.org().is_some()));
    }

    #[test]
    fn test_same_actions_ignores_timestamp_and_hash() {
        let snapshot = snapshot(false);
        let changes = diff(&[("db", "small", "org-a")], &[]);

        let first = AccessPlan::build(&snapshot, &[], &changes, "abc").expect("plan should build");
        let second = AccessPlan::build(&snapshot, &[], &changes, "def").expect("plan should build");
        let other = AccessPlan::build(&snapshot, &[], &diff(&[], &[]), "abc")
            .expect("plan should build");

        assert!(first.same_actions(&second));
        assert!(!first.same_actions(&other));
    }

    #[test]
    fn test_action_display() {
        let snapshot = snapshot(false);
        let plan = AccessPlan::build(
            &snapshot,
            &[],
            &diff(&[("db", "small", "org-a")], &[]),
            "abc",
        )
        .expect("plan should build");

        assert_eq!(
            plan.actions[0].to_string(),
            "grant db:small@org-a (declared but not granted)"
        );
        assert_eq!(
            plan.actions[0].description(),
            "Grant plan 'small' of 'db' to org org-a"
        );
    }
}
