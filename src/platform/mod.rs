//! Cloud Controller integration.
//!
//! This module contains the platform resource types, the collaborator
//! traits the reconciler depends on, the per-pass catalog snapshot and the
//! HTTP client for the Cloud Foundry v2 API.

mod client;
#[cfg(test)]
pub(crate) mod memory;
mod snapshot;
mod store;
mod types;

pub use client::{CloudControllerClient, DEFAULT_TIMEOUT_SECS};
pub use snapshot::CatalogSnapshot;
pub use store::{
    BrokerRegistry, CatalogProvider, OrgDirectory, Platform, PlanStore, VisibilityStore,
};
pub use types::{
    BrokerRegistration, Organization, PlanVisibility, ServiceBroker, ServiceOffering, ServicePlan,
    VisibilityFilter,
};
