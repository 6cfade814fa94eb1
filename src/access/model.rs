//! Access declarations and tuples.
//!
//! A declaration is the compact form a user writes (or the normalizer
//! produces). A tuple is the fully concrete form diffs are computed on.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw `{service, plan?, org_id?}` entry as it appears in configuration files.
///
/// Empty strings are treated as absent when converted to a declaration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct AccessEntry {
    /// Service label or GUID.
    pub service: String,

    /// Optional plan name or GUID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,

    /// Optional organization GUID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_id: Option<String>,
}

/// Desired or observed access to a service, in compact form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "AccessEntry", into = "AccessEntry")]
pub enum AccessDeclaration {
    /// Every plan of the service is public.
    Public {
        /// Service label or GUID.
        service: String,
    },

    /// Every plan of the service is granted to one organization.
    AllPlansInOrg {
        /// Service label or GUID.
        service: String,
        /// Organization GUID.
        org: String,
    },

    /// One plan is granted to every known organization.
    PlanInAllOrgs {
        /// Service label or GUID.
        service: String,
        /// Plan name or GUID.
        plan: String,
    },

    /// One plan is granted to one organization.
    PlanInOrg {
        /// Service label or GUID.
        service: String,
        /// Plan name or GUID.
        plan: String,
        /// Organization GUID.
        org: String,
    },
}

/// A fully concrete `(service, plan, org)` grant.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccessTuple {
    /// Service label.
    pub service: String,
    /// Plan name.
    pub plan: String,
    /// Organization GUID.
    pub org: String,
}

impl AccessDeclaration {
    /// Builds a declaration from optional parts. Empty strings count as absent.
    #[must_use]
    pub fn from_parts(service: &str, plan: Option<&str>, org: Option<&str>) -> Self {
        let service = service.to_string();
        let plan = plan.filter(|p| !p.is_empty()).map(str::to_string);
        let org = org.filter(|o| !o.is_empty()).map(str::to_string);

        match (plan, org) {
            (None, None) => Self::Public { service },
            (None, Some(org)) => Self::AllPlansInOrg { service, org },
            (Some(plan), None) => Self::PlanInAllOrgs { service, plan },
            (Some(plan), Some(org)) => Self::PlanInOrg { service, plan, org },
        }
    }

    /// The referenced service.
    #[must_use]
    pub fn service(&self) -> &str {
        match self {
            Self::Public { service }
            | Self::AllPlansInOrg { service, .. }
            | Self::PlanInAllOrgs { service, .. }
            | Self::PlanInOrg { service, .. } => service,
        }
    }

    /// The referenced plan, if any.
    #[must_use]
    pub fn plan(&self) -> Option<&str> {
        match self {
            Self::PlanInAllOrgs { plan, .. } | Self::PlanInOrg { plan, .. } => Some(plan),
            Self::Public { .. } | Self::AllPlansInOrg { .. } => None,
        }
    }

    /// The referenced organization, if any.
    #[must_use]
    pub fn org(&self) -> Option<&str> {
        match self {
            Self::AllPlansInOrg { org, .. } | Self::PlanInOrg { org, .. } => Some(org),
            Self::Public { .. } | Self::PlanInAllOrgs { .. } => None,
        }
    }

    /// Returns true if this declaration opens the whole service to everyone.
    #[must_use]
    pub const fn is_public(&self) -> bool {
        matches!(self, Self::Public { .. })
    }
}

impl From<AccessEntry> for AccessDeclaration {
    fn from(entry: AccessEntry) -> Self {
        Self::from_parts(&entry.service, entry.plan.as_deref(), entry.org_id.as_deref())
    }
}

impl From<AccessDeclaration> for AccessEntry {
    fn from(declaration: AccessDeclaration) -> Self {
        Self {
            service: declaration.service().to_string(),
            plan: declaration.plan().map(str::to_string),
            org_id: declaration.org().map(str::to_string),
        }
    }
}

impl fmt::Display for AccessDeclaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Public { service } => write!(f, "{service} (public)"),
            Self::AllPlansInOrg { service, org } => write!(f, "{service}:*@{org}"),
            Self::PlanInAllOrgs { service, plan } => write!(f, "{service}:{plan}@*"),
            Self::PlanInOrg { service, plan, org } => write!(f, "{service}:{plan}@{org}"),
        }
    }
}

impl AccessTuple {
    /// Creates a new tuple.
    #[must_use]
    pub fn new(service: &str, plan: &str, org: &str) -> Self {
        Self {
            service: service.to_string(),
            plan: plan.to_string(),
            org: org.to_string(),
        }
    }
}

impl fmt::Display for AccessTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}@{}", self.service, self.plan, self.org)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_parts_selects_variant() {
        assert!(AccessDeclaration::from_parts("db", None, None).is_public());
        assert_eq!(
            AccessDeclaration::from_parts("db", Some(""), Some("org-a")),
            AccessDeclaration::AllPlansInOrg {
                service: String::from("db"),
                org: String::from("org-a"),
            }
        );
        assert_eq!(
            AccessDeclaration::from_parts("db", Some("small"), Some("")),
            AccessDeclaration::PlanInAllOrgs {
                service: String::from("db"),
                plan: String::from("small"),
            }
        );
    }

    #[test]
    fn test_yaml_entries() {
        let yaml = r"
- service: db
- service: db
  plan: small
- service: db
  org_id: org-a
- service: db
  plan: small
  org_id: org-a
";
        let declarations: Vec<AccessDeclaration> =
            serde_yaml::from_str(yaml).expect("entries should parse");

        assert!(declarations[0].is_public());
        assert_eq!(declarations[1].plan(), Some("small"));
        assert_eq!(declarations[1].org(), None);
        assert_eq!(declarations[2].org(), Some("org-a"));
        assert_eq!(declarations[3].to_string(), "db:small@org-a");
    }

    #[test]
    fn test_serialize_omits_absent_fields() {
        let json = serde_json::to_value(AccessDeclaration::from_parts("db", Some("small"), None))
            .expect("declaration should serialize");
        assert_eq!(json, serde_json::json!({ "service": "db", "plan": "small" }));
    }

    #[test]
    fn test_tuple_ordering() {
        let a = AccessTuple::new("db", "large", "org-b");
        let b = AccessTuple::new("db", "small", "org-a");
        assert!(a < b);
        assert_eq!(b.to_string(), "db:small@org-a");
    }
}
