//! Collaborator traits for the control plane.
//!
//! The reconciler only talks to the platform through these traits, so a
//! pass can run against the Cloud Controller client or an in-memory fixture.

use async_trait::async_trait;

use crate::error::Result;

use super::types::{
    BrokerRegistration, Organization, PlanVisibility, ServiceBroker, ServiceOffering, ServicePlan,
    VisibilityFilter,
};

/// Read access to brokers and their catalogs.
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    /// Finds a broker by name or GUID.
    ///
    /// Returns `None` if no such broker is registered.
    async fn find_broker(&self, name_or_id: &str) -> Result<Option<ServiceBroker>>;

    /// Lists the services of a broker. Plans are not populated.
    async fn list_services(&self, broker_id: &str) -> Result<Vec<ServiceOffering>>;

    /// Lists the plans belonging to any of the given services.
    async fn list_plans(&self, service_ids: &[String]) -> Result<Vec<ServicePlan>>;
}

/// Read access to the organizations of the platform.
#[async_trait]
pub trait OrgDirectory: Send + Sync {
    /// Lists organizations, stopping after `page_limit` entries (0 = all).
    async fn list_organizations(&self, page_limit: u32) -> Result<Vec<Organization>>;
}

/// Plan visibility records.
#[async_trait]
pub trait VisibilityStore: Send + Sync {
    /// Searches visibilities matching the filter.
    async fn search(&self, filter: &VisibilityFilter) -> Result<Vec<PlanVisibility>>;

    /// Grants a plan to an organization.
    ///
    /// Fails with a conflict if the grant already exists.
    async fn create(&self, plan_id: &str, org_id: &str) -> Result<PlanVisibility>;

    /// Deletes a visibility by GUID.
    ///
    /// Fails with not-found if it no longer exists.
    async fn delete(&self, visibility_id: &str) -> Result<()>;
}

/// Write access to the public flag of plans.
#[async_trait]
pub trait PlanStore: Send + Sync {
    /// Sets the public flag of a plan.
    async fn set_public(&self, plan: &ServicePlan, service_id: &str, public: bool) -> Result<()>;
}

/// Registration of service brokers.
#[async_trait]
pub trait BrokerRegistry: Send + Sync {
    /// Registers a new broker.
    async fn register_broker(&self, registration: &BrokerRegistration) -> Result<ServiceBroker>;

    /// Updates the endpoint and credentials of a registered broker.
    ///
    /// The platform refetches the broker catalog as part of the update.
    async fn update_broker(
        &self,
        broker_id: &str,
        registration: &BrokerRegistration,
    ) -> Result<ServiceBroker>;

    /// Deletes a broker by GUID.
    ///
    /// Fails with not-found if it no longer exists.
    async fn delete_broker(&self, broker_id: &str) -> Result<()>;
}

/// Everything a reconciliation pass needs from the platform.
pub trait Platform: CatalogProvider + OrgDirectory + VisibilityStore + PlanStore {}

impl<T> Platform for T where T: CatalogProvider + OrgDirectory + VisibilityStore + PlanStore + ?Sized {}
