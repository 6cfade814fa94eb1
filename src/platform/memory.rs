//! In-memory platform used as a fixture by the engine tests.

use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{PlatformError, Result};

use super::store::{BrokerRegistry, CatalogProvider, OrgDirectory, PlanStore, VisibilityStore};
use super::types::{
    BrokerRegistration, Organization, PlanVisibility, ServiceBroker, ServiceOffering, ServicePlan,
    VisibilityFilter,
};

/// Platform fixture backed by plain collections.
#[derive(Debug)]
pub struct InMemoryPlatform {
    broker: Mutex<Option<ServiceBroker>>,
    password: Mutex<Option<String>>,
    services: Mutex<Vec<ServiceOffering>>,
    organizations: Vec<Organization>,
    visibilities: Mutex<Vec<PlanVisibility>>,
    next_id: AtomicUsize,
    writes: AtomicUsize,
}

impl InMemoryPlatform {
    pub fn new(broker_name: &str) -> Self {
        Self {
            broker: Mutex::new(Some(ServiceBroker {
                id: format!("{broker_name}-guid"),
                name: broker_name.to_string(),
                url: format!("https://{broker_name}.example.com"),
                username: String::from("broker-user"),
            })),
            password: Mutex::new(None),
            services: Mutex::new(Vec::new()),
            organizations: Vec::new(),
            visibilities: Mutex::new(Vec::new()),
            next_id: AtomicUsize::new(1),
            writes: AtomicUsize::new(0),
        }
    }

    pub fn without_broker(self) -> Self {
        *self.broker.lock().expect("lock") = None;
        self
    }

    pub fn broker(&self) -> Option<ServiceBroker> {
        self.broker.lock().expect("lock").clone()
    }

    pub fn broker_password(&self) -> Option<String> {
        self.password.lock().expect("lock").clone()
    }

    fn broker_id(&self) -> Option<String> {
        self.broker.lock().expect("lock").as_ref().map(|b| b.id.clone())
    }

    pub fn service_id(label: &str) -> String {
        format!("{label}-guid")
    }

    pub fn plan_id(label: &str, plan: &str) -> String {
        format!("{label}-{plan}-guid")
    }

    pub fn with_service(self, label: &str, plans: &[&str]) -> Self {
        let service_id = Self::service_id(label);
        let plans = plans
            .iter()
            .map(|name| ServicePlan {
                id: Self::plan_id(label, name),
                name: (*name).to_string(),
                public: false,
                service_id: service_id.clone(),
            })
            .collect();
        self.services.lock().expect("lock").push(ServiceOffering {
            id: service_id,
            label: label.to_string(),
            plans,
        });
        self
    }

    pub fn with_orgs(mut self, org_ids: &[&str]) -> Self {
        self.organizations = org_ids
            .iter()
            .map(|id| Organization {
                id: (*id).to_string(),
                name: format!("{id}-name"),
            })
            .collect();
        self
    }

    pub fn with_public(self, label: &str, plan: &str) -> Self {
        let plan_id = Self::plan_id(label, plan);
        for service in self.services.lock().expect("lock").iter_mut() {
            for candidate in &mut service.plans {
                if candidate.id == plan_id {
                    candidate.public = true;
                }
            }
        }
        self
    }

    pub fn with_grant(self, label: &str, plan: &str, org_id: &str) -> Self {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.visibilities.lock().expect("lock").push(PlanVisibility {
            id: format!("vis-{id}"),
            plan_id: Self::plan_id(label, plan),
            org_id: org_id.to_string(),
        });
        self
    }

    pub fn has_grant(&self, label: &str, plan: &str, org_id: &str) -> bool {
        let filter = VisibilityFilter::for_plan_and_org(&Self::plan_id(label, plan), org_id);
        self.visibilities
            .lock()
            .expect("lock")
            .iter()
            .any(|v| filter.matches(v))
    }

    pub fn grant_count(&self) -> usize {
        self.visibilities.lock().expect("lock").len()
    }

    pub fn is_public(&self, label: &str, plan: &str) -> bool {
        let plan_id = Self::plan_id(label, plan);
        self.services
            .lock()
            .expect("lock")
            .iter()
            .flat_map(|s| s.plans.iter())
            .any(|p| p.id == plan_id && p.public)
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CatalogProvider for InMemoryPlatform {
    async fn find_broker(&self, name_or_id: &str) -> Result<Option<ServiceBroker>> {
        Ok(self
            .broker()
            .filter(|b| b.name == name_or_id || b.id == name_or_id))
    }

    async fn list_services(&self, broker_id: &str) -> Result<Vec<ServiceOffering>> {
        if self.broker_id().as_deref() != Some(broker_id) {
            return Ok(Vec::new());
        }
        Ok(self
            .services
            .lock()
            .expect("lock")
            .iter()
            .map(|s| ServiceOffering {
                id: s.id.clone(),
                label: s.label.clone(),
                plans: Vec::new(),
            })
            .collect())
    }

    async fn list_plans(&self, service_ids: &[String]) -> Result<Vec<ServicePlan>> {
        Ok(self
            .services
            .lock()
            .expect("lock")
            .iter()
            .filter(|s| service_ids.contains(&s.id))
            .flat_map(|s| s.plans.iter().cloned())
            .collect())
    }
}

#[async_trait]
impl OrgDirectory for InMemoryPlatform {
    async fn list_organizations(&self, page_limit: u32) -> Result<Vec<Organization>> {
        let limit = usize::try_from(page_limit).unwrap_or(usize::MAX);
        let orgs = self.organizations.iter().cloned();
        Ok(if limit == 0 {
            orgs.collect()
        } else {
            orgs.take(limit).collect()
        })
    }
}

#[async_trait]
impl VisibilityStore for InMemoryPlatform {
    async fn search(&self, filter: &VisibilityFilter) -> Result<Vec<PlanVisibility>> {
        Ok(self
            .visibilities
            .lock()
            .expect("lock")
            .iter()
            .filter(|v| filter.matches(v))
            .cloned()
            .collect())
    }

    async fn create(&self, plan_id: &str, org_id: &str) -> Result<PlanVisibility> {
        let mut visibilities = self.visibilities.lock().expect("lock");
        if visibilities
            .iter()
            .any(|v| v.plan_id == plan_id && v.org_id == org_id)
        {
            return Err(PlatformError::Conflict {
                message: String::from(
                    "This combination of ServicePlan and Organization is already taken",
                ),
            }
            .into());
        }

        self.writes.fetch_add(1, Ordering::SeqCst);
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let visibility = PlanVisibility {
            id: format!("vis-{id}"),
            plan_id: plan_id.to_string(),
            org_id: org_id.to_string(),
        };
        visibilities.push(visibility.clone());
        Ok(visibility)
    }

    async fn delete(&self, visibility_id: &str) -> Result<()> {
        let mut visibilities = self.visibilities.lock().expect("lock");
        let before = visibilities.len();
        visibilities.retain(|v| v.id != visibility_id);
        if visibilities.len() == before {
            return Err(PlatformError::NotFound {
                resource: visibility_id.to_string(),
            }
            .into());
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl BrokerRegistry for InMemoryPlatform {
    async fn register_broker(&self, registration: &BrokerRegistration) -> Result<ServiceBroker> {
        let mut broker = self.broker.lock().expect("lock");
        if broker.as_ref().is_some_and(|b| b.name == registration.name) {
            return Err(PlatformError::api_error(
                400,
                Some(270_002),
                "The service broker name is taken",
            )
            .into());
        }

        self.writes.fetch_add(1, Ordering::SeqCst);
        let registered = ServiceBroker {
            id: format!("{}-guid", registration.name),
            name: registration.name.clone(),
            url: registration.url.clone(),
            username: registration.username.clone(),
        };
        *broker = Some(registered.clone());
        *self.password.lock().expect("lock") = Some(registration.password.clone());
        Ok(registered)
    }

    async fn update_broker(
        &self,
        broker_id: &str,
        registration: &BrokerRegistration,
    ) -> Result<ServiceBroker> {
        let mut broker = self.broker.lock().expect("lock");
        let Some(existing) = broker.as_mut().filter(|b| b.id == broker_id) else {
            return Err(PlatformError::NotFound {
                resource: broker_id.to_string(),
            }
            .into());
        };

        self.writes.fetch_add(1, Ordering::SeqCst);
        existing.name.clone_from(&registration.name);
        existing.url.clone_from(&registration.url);
        existing.username.clone_from(&registration.username);
        *self.password.lock().expect("lock") = Some(registration.password.clone());
        Ok(existing.clone())
    }

    async fn delete_broker(&self, broker_id: &str) -> Result<()> {
        let mut broker = self.broker.lock().expect("lock");
        if broker.as_ref().is_none_or(|b| b.id != broker_id) {
            return Err(PlatformError::NotFound {
                resource: broker_id.to_string(),
            }
            .into());
        }

        self.writes.fetch_add(1, Ordering::SeqCst);
        *broker = None;
        Ok(())
    }
}

#[async_trait]
impl PlanStore for InMemoryPlatform {
    async fn set_public(&self, plan: &ServicePlan, service_id: &str, public: bool) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        for service in self.services.lock().expect("lock").iter_mut() {
            if service.id != service_id {
                continue;
            }
            for candidate in &mut service.plans {
                if candidate.id == plan.id {
                    candidate.public = public;
                }
            }
        }
        Ok(())
    }
}
