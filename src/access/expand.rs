//! Expansion of compact declarations into concrete tuples.

use std::collections::BTreeSet;
use tracing::debug;

use crate::error::{CatalogError, Result};
use crate::platform::{CatalogSnapshot, ServiceOffering, ServicePlan};

use super::model::{AccessDeclaration, AccessTuple};

/// Expands declarations against a catalog snapshot.
///
/// Expansion is a pure function of the declaration and the snapshot.
/// Tuples always carry the catalog's service label and plan name, so a
/// declaration written with GUIDs compares equal to one written with names.
#[derive(Debug, Clone, Copy)]
pub struct Expander<'a> {
    snapshot: &'a CatalogSnapshot,
}

impl<'a> Expander<'a> {
    /// Creates an expander over a snapshot.
    #[must_use]
    pub const fn new(snapshot: &'a CatalogSnapshot) -> Self {
        Self { snapshot }
    }

    /// Expands one declaration into the set of tuples it denotes.
    ///
    /// A public declaration denotes no tuples: it is applied through the
    /// plan public flag instead of visibility records.
    ///
    /// # Errors
    ///
    /// Returns `ServiceNotFound` or `PlanNotFound` if the declaration names
    /// something absent from the catalog.
    pub fn expand(&self, declaration: &AccessDeclaration) -> Result<BTreeSet<AccessTuple>> {
        let service = self.snapshot.resolve_service(declaration.service())?;

        let tuples = match declaration {
            AccessDeclaration::Public { .. } => {
                debug!("{declaration} is handled by the public flag, no tuples");
                BTreeSet::new()
            }
            AccessDeclaration::AllPlansInOrg { org, .. } => service
                .plans
                .iter()
                .map(|plan| AccessTuple::new(&service.label, &plan.name, org))
                .collect(),
            AccessDeclaration::PlanInAllOrgs { plan, .. } => {
                let plan = Self::resolve_plan(service, plan)?;
                self.snapshot
                    .organizations
                    .iter()
                    .map(|org| AccessTuple::new(&service.label, &plan.name, &org.id))
                    .collect()
            }
            AccessDeclaration::PlanInOrg { plan, org, .. } => {
                let plan = Self::resolve_plan(service, plan)?;
                BTreeSet::from([AccessTuple::new(&service.label, &plan.name, org)])
            }
        };

        Ok(tuples)
    }

    /// Expands every declaration and unions the results.
    ///
    /// # Errors
    ///
    /// Returns the first expansion error encountered.
    pub fn expand_all(&self, declarations: &[AccessDeclaration]) -> Result<BTreeSet<AccessTuple>> {
        let mut tuples = BTreeSet::new();
        for declaration in declarations {
            tuples.extend(self.expand(declaration)?);
        }
        Ok(tuples)
    }

    fn resolve_plan<'s>(service: &'s ServiceOffering, plan: &str) -> Result<&'s ServicePlan> {
        service.find_plan(plan).ok_or_else(|| {
            CatalogError::PlanNotFound {
                plan: plan.to_string(),
                service: service.label.clone(),
            }
            .into()
        })
    }
}
