//! Broker registration.
//!
//! Makes sure the broker whose access is reconciled is registered with the
//! configured endpoint and credentials, and removes it on request.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::platform::{BrokerRegistration, BrokerRegistry, CatalogProvider, ServiceBroker};

/// Registers, updates and deletes a service broker.
pub struct BrokerRegistrar<'a, R: CatalogProvider + BrokerRegistry + ?Sized> {
    /// Platform holding the registration.
    platform: &'a R,
}

/// What [`BrokerRegistrar::ensure`] did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "broker", rename_all = "lowercase")]
pub enum RegistrationOutcome {
    /// The broker was not registered and has been created.
    Created(ServiceBroker),
    /// The registration was stale and has been updated.
    Updated(ServiceBroker),
    /// The registration already matched.
    Unchanged(ServiceBroker),
}

impl RegistrationOutcome {
    /// The broker as registered after the call.
    #[must_use]
    pub const fn broker(&self) -> &ServiceBroker {
        match self {
            Self::Created(broker) | Self::Updated(broker) | Self::Unchanged(broker) => broker,
        }
    }

    /// Returns true if the platform was written to.
    #[must_use]
    pub const fn is_change(&self) -> bool {
        !matches!(self, Self::Unchanged(_))
    }
}

impl std::fmt::Display for RegistrationOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let verb = match self {
            Self::Created(_) => "registered",
            Self::Updated(_) => "updated",
            Self::Unchanged(_) => "unchanged",
        };
        let broker = self.broker();
        write!(f, "Broker {} {verb} ({}, {})", broker.name, broker.id, broker.url)
    }
}

impl<'a, R: CatalogProvider + BrokerRegistry + ?Sized> BrokerRegistrar<'a, R> {
    /// Creates a new registrar.
    #[must_use]
    pub const fn new(platform: &'a R) -> Self {
        Self { platform }
    }

    /// Registers the broker, or updates it if its name, URL or username drifted.
    ///
    /// `lookup` is the broker name or GUID to look for. The password cannot
    /// be read back from the platform; pass `force` to push it anyway.
    ///
    /// # Errors
    ///
    /// Returns the first platform error, unmodified.
    pub async fn ensure(
        &self,
        lookup: &str,
        registration: &BrokerRegistration,
        force: bool,
    ) -> Result<RegistrationOutcome> {
        info!("Ensuring broker {} is registered at {}", registration.name, registration.url);

        let Some(existing) = self.platform.find_broker(lookup).await? else {
            let broker = self.platform.register_broker(registration).await?;
            return Ok(RegistrationOutcome::Created(broker));
        };

        if !force && !registration.differs_from(&existing) {
            debug!("Broker {} is up to date", existing.name);
            return Ok(RegistrationOutcome::Unchanged(existing));
        }

        let broker = self.platform.update_broker(&existing.id, registration).await?;
        Ok(RegistrationOutcome::Updated(broker))
    }

    /// Deletes the broker named `lookup` (name or GUID).
    ///
    /// Returns `false` if no such broker was registered.
    ///
    /// # Errors
    ///
    /// Returns the first platform error other than a vanished broker.
    pub async fn unregister(&self, lookup: &str) -> Result<bool> {
        let Some(existing) = self.platform.find_broker(lookup).await? else {
            info!("Broker {lookup} is not registered, nothing to delete");
            return Ok(false);
        };

        match self.platform.delete_broker(&existing.id).await {
            Ok(()) => Ok(true),
            Err(err) if err.is_not_found() => {
                warn!("Broker {} vanished before it could be deleted", existing.id);
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }
}
