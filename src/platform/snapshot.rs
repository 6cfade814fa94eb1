//! Per-pass snapshot of a broker catalog and the organization directory.
//!
//! A snapshot is fetched once at the start of a reconciliation pass and
//! treated as immutable until the pass ends. Public flags changed during the
//! pass are not reflected back into it.

use tracing::{debug, info};

use crate::error::{CatalogError, Result};

use super::store::{CatalogProvider, OrgDirectory};
use super::types::{Organization, ServiceBroker, ServiceOffering};

/// Read-only view of a broker catalog and the known organizations.
#[derive(Debug, Clone)]
pub struct CatalogSnapshot {
    /// The broker the catalog belongs to.
    pub broker: ServiceBroker,
    /// Services with their plans, in catalog order.
    pub services: Vec<ServiceOffering>,
    /// Every organization known when the snapshot was taken.
    pub organizations: Vec<Organization>,
}

impl CatalogSnapshot {
    /// Creates a snapshot from already fetched parts.
    #[must_use]
    pub const fn new(
        broker: ServiceBroker,
        services: Vec<ServiceOffering>,
        organizations: Vec<Organization>,
    ) -> Self {
        Self {
            broker,
            services,
            organizations,
        }
    }

    /// Fetches a fresh snapshot for the broker named `broker_ref` (name or GUID).
    ///
    /// The whole organization directory is listed: plan-only declarations
    /// and the all-orgs check both range over every organization.
    ///
    /// # Errors
    ///
    /// Returns `BrokerNotFound` if the broker is not registered, or the first
    /// platform error encountered.
    pub async fn fetch<P>(platform: &P, broker_ref: &str) -> Result<Self>
    where
        P: CatalogProvider + OrgDirectory + ?Sized,
    {
        info!("Fetching catalog snapshot for broker: {broker_ref}");

        let broker = platform
            .find_broker(broker_ref)
            .await?
            .ok_or_else(|| CatalogError::BrokerNotFound {
                broker: broker_ref.to_string(),
            })?;

        let mut services = platform.list_services(&broker.id).await?;
        for service in &mut services {
            service.plans = platform.list_plans(&[service.id.clone()]).await?;
            debug!("Service {} has {} plans", service.label, service.plans.len());
        }

        let organizations = platform.list_organizations(0).await?;

        debug!(
            "Snapshot for {}: {} services, {} organizations",
            broker.name,
            services.len(),
            organizations.len()
        );

        Ok(Self::new(broker, services, organizations))
    }

    /// Finds a service by label or GUID.
    #[must_use]
    pub fn find_service(&self, label_or_id: &str) -> Option<&ServiceOffering> {
        self.services
            .iter()
            .find(|s| s.label == label_or_id || s.id == label_or_id)
    }

    /// Resolves a service by label or GUID.
    ///
    /// # Errors
    ///
    /// Returns `ServiceNotFound` if the broker does not offer the service.
    pub fn resolve_service(&self, label_or_id: &str) -> Result<&ServiceOffering> {
        self.find_service(label_or_id).ok_or_else(|| {
            CatalogError::ServiceNotFound {
                service: label_or_id.to_string(),
                broker: self.broker.name.clone(),
            }
            .into()
        })
    }

    /// Number of plans across every service.
    #[must_use]
    pub fn plan_count(&self) -> usize {
        self.services.iter().map(|s| s.plans.len()).sum()
    }
}
