//! Platform resource types.
//!
//! These are the control plane resources the reconciler reads and writes,
//! decoupled from the wire format of the Cloud Controller API.

use serde::{Deserialize, Serialize};

/// A registered service broker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceBroker {
    /// Broker GUID.
    pub id: String,
    /// Broker name.
    pub name: String,
    /// Broker URL.
    pub url: String,
    /// Basic auth username the platform uses to call the broker.
    #[serde(default)]
    pub username: String,
}

/// Endpoint and credentials a broker is registered with.
#[derive(Clone, PartialEq, Eq)]
pub struct BrokerRegistration {
    /// Broker name.
    pub name: String,
    /// Broker URL.
    pub url: String,
    /// Basic auth username.
    pub username: String,
    /// Basic auth password.
    pub password: String,
}

impl BrokerRegistration {
    /// Returns true if the registered broker no longer matches.
    ///
    /// The password cannot be read back, so it is never compared.
    #[must_use]
    pub fn differs_from(&self, broker: &ServiceBroker) -> bool {
        self.name != broker.name || self.url != broker.url || self.username != broker.username
    }
}

impl std::fmt::Debug for BrokerRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerRegistration")
            .field("name", &self.name)
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// An organization known to the platform.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Organization {
    /// Organization GUID.
    pub id: String,
    /// Organization name.
    pub name: String,
}

/// A plan offered by a service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServicePlan {
    /// Plan GUID.
    pub id: String,
    /// Plan name.
    pub name: String,
    /// Whether every organization can use the plan without a visibility record.
    pub public: bool,
    /// GUID of the owning service.
    pub service_id: String,
}

/// A service offered by a broker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceOffering {
    /// Service GUID.
    pub id: String,
    /// Service label.
    pub label: String,
    /// Plans of the service, in catalog order.
    #[serde(default)]
    pub plans: Vec<ServicePlan>,
}

/// A grant of one plan to one organization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlanVisibility {
    /// Visibility GUID.
    pub id: String,
    /// GUID of the granted plan.
    pub plan_id: String,
    /// GUID of the organization.
    pub org_id: String,
}

/// Search filter for plan visibilities.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisibilityFilter {
    /// Restrict to one plan.
    pub plan_id: Option<String>,
    /// Restrict to one organization.
    pub org_id: Option<String>,
}

impl ServiceOffering {
    /// Finds a plan of this service by name or GUID.
    ///
    /// Plans whose back-reference points to a different service never match.
    #[must_use]
    pub fn find_plan(&self, name_or_id: &str) -> Option<&ServicePlan> {
        self.plans.iter().find(|plan| {
            (plan.name == name_or_id || plan.id == name_or_id) && plan.service_id == self.id
        })
    }

    /// Returns true if at least one plan is public.
    #[must_use]
    pub fn has_public_plan(&self) -> bool {
        self.plans.iter().any(|plan| plan.public)
    }
}

impl VisibilityFilter {
    /// Filter matching every visibility of a plan.
    #[must_use]
    pub fn for_plan(plan_id: &str) -> Self {
        Self {
            plan_id: Some(plan_id.to_string()),
            org_id: None,
        }
    }

    /// Filter matching the visibility of a plan in one organization.
    #[must_use]
    pub fn for_plan_and_org(plan_id: &str, org_id: &str) -> Self {
        Self {
            plan_id: Some(plan_id.to_string()),
            org_id: Some(org_id.to_string()),
        }
    }

    /// Returns true if the visibility passes this filter.
    #[must_use]
    pub fn matches(&self, visibility: &PlanVisibility) -> bool {
        self.plan_id.as_deref().is_none_or(|p| p == visibility.plan_id)
            && self.org_id.as_deref().is_none_or(|o| o == visibility.org_id)
    }
}
