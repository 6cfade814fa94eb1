//! Cloud Controller API client implementation.
//!
//! This module provides the HTTP client for the Cloud Foundry v2 API. It
//! implements every collaborator trait used by the reconciler. Requests are
//! issued once: retry and backoff policy belongs to the caller.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url, header};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, trace};

use crate::error::{AccessError, PlatformError, Result};

use super::store::{BrokerRegistry, CatalogProvider, OrgDirectory, PlanStore, VisibilityStore};
use super::types::{
    BrokerRegistration, Organization, PlanVisibility, ServiceBroker, ServiceOffering, ServicePlan,
    VisibilityFilter,
};

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Page size requested from paginated endpoints.
const RESULTS_PER_PAGE: u32 = 100;

/// Cloud Controller error code for a duplicate plan visibility.
const VISIBILITY_ALREADY_EXISTS_CODE: u32 = 260_002;

/// Cloud Controller API client.
#[derive(Debug, Clone)]
pub struct CloudControllerClient {
    /// HTTP client.
    client: Client,
    /// API endpoint, without trailing slash.
    api: String,
    /// OAuth bearer token.
    token: String,
}

/// Paginated list envelope.
#[derive(Debug, Deserialize)]
struct Page<T> {
    next_url: Option<String>,
    resources: Vec<Resource<T>>,
}

/// Single resource envelope.
#[derive(Debug, Deserialize)]
struct Resource<T> {
    metadata: Metadata,
    entity: T,
}

#[derive(Debug, Deserialize)]
struct Metadata {
    guid: String,
}

#[derive(Debug, Deserialize)]
struct BrokerEntity {
    name: String,
    broker_url: String,
    #[serde(default)]
    auth_username: String,
}

/// Body of broker create and update requests.
#[derive(Serialize)]
struct BrokerRequest<'a> {
    name: &'a str,
    broker_url: &'a str,
    auth_username: &'a str,
    auth_password: &'a str,
}

impl<'a> From<&'a BrokerRegistration> for BrokerRequest<'a> {
    fn from(registration: &'a BrokerRegistration) -> Self {
        Self {
            name: &registration.name,
            broker_url: &registration.url,
            auth_username: &registration.username,
            auth_password: &registration.password,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ServiceEntity {
    label: String,
}

#[derive(Debug, Deserialize)]
struct PlanEntity {
    name: String,
    #[serde(default)]
    public: bool,
    service_guid: String,
}

#[derive(Debug, Deserialize)]
struct OrgEntity {
    name: String,
}

#[derive(Debug, Deserialize, Serialize)]
struct VisibilityEntity {
    service_plan_guid: String,
    organization_guid: String,
}

#[derive(Debug, Serialize)]
struct PlanUpdate {
    public: bool,
}

/// Error body returned by the Cloud Controller.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: Option<u32>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    error_code: String,
}

impl CloudControllerClient {
    /// Creates a new client with default settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(api: &str, token: &str) -> Result<Self> {
        Self::with_options(api, token, DEFAULT_TIMEOUT_SECS, false)
    }

    /// Creates a client with a custom timeout and TLS verification setting.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_options(
        api: &str,
        token: &str,
        timeout_secs: u64,
        skip_ssl_validation: bool,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .danger_accept_invalid_certs(skip_ssl_validation)
            .build()
            .map_err(|e| PlatformError::network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api: api.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    /// Returns the API endpoint this client talks to.
    #[must_use]
    pub fn api(&self) -> &str {
        &self.api
    }

    /// Builds an absolute URL for a path and query parameters.
    fn url(&self, path: &str, params: &[(&str, String)]) -> Result<Url> {
        let base = format!("{}{path}", self.api);
        let url = if params.is_empty() {
            Url::parse(&base)
        } else {
            Url::parse_with_params(&base, params)
        };
        url.map_err(|e| PlatformError::invalid_response(format!("Invalid URL {base}: {e}")).into())
    }

    /// Starts an authenticated request.
    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        trace!("{method} {url}");
        self.client
            .request(method, url)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.token))
            .header(header::ACCEPT, "application/json")
    }

    /// Sends a request and maps non-success statuses to platform errors.
    async fn send(&self, request: RequestBuilder, resource: &str) -> Result<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| PlatformError::network(format!("Request failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(PlatformError::AuthenticationFailed {
                message: format!("{status} on {resource}"),
            }
            .into());
        }

        if status == StatusCode::NOT_FOUND {
            return Err(PlatformError::NotFound {
                resource: resource.to_string(),
            }
            .into());
        }

        let body = response.text().await.unwrap_or_default();
        Err(Self::classify_error(status.as_u16(), &body))
    }

    /// Maps a Cloud Controller error body to a platform error.
    fn classify_error(status: u16, body: &str) -> AccessError {
        match serde_json::from_str::<ErrorBody>(body) {
            Ok(err) => {
                if err.code == Some(VISIBILITY_ALREADY_EXISTS_CODE)
                    || err.description.contains("is already taken")
                {
                    return PlatformError::Conflict {
                        message: err.description,
                    }
                    .into();
                }
                let message = if err.error_code.is_empty() {
                    err.description
                } else {
                    format!("{}: {}", err.error_code, err.description)
                };
                PlatformError::api_error(status, err.code, message).into()
            }
            Err(_) => PlatformError::api_error(status, None, body).into(),
        }
    }

    /// Decodes a JSON response body.
    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
        response
            .json()
            .await
            .map_err(|e| PlatformError::invalid_response(format!("Failed to parse response: {e}")).into())
    }

    /// Fetches every page of a list endpoint, stopping after `limit` resources (0 = all).
    async fn list<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
        limit: usize,
    ) -> Result<Vec<Resource<T>>> {
        let mut params = params.to_vec();
        params.push(("results-per-page", RESULTS_PER_PAGE.to_string()));

        let mut url = self.url(path, &params)?;
        let mut resources = Vec::new();

        loop {
            let response = self.send(self.request(Method::GET, url), path).await?;
            let page: Page<T> = Self::decode(response).await?;
            resources.extend(page.resources);

            if limit > 0 && resources.len() >= limit {
                resources.truncate(limit);
                break;
            }

            match page.next_url {
                Some(next) => url = self.url(&next, &[])?,
                None => break,
            }
        }

        debug!("Fetched {} resources from {path}", resources.len());
        Ok(resources)
    }

    fn to_broker(resource: Resource<BrokerEntity>) -> ServiceBroker {
        ServiceBroker {
            id: resource.metadata.guid,
            name: resource.entity.name,
            url: resource.entity.broker_url,
            username: resource.entity.auth_username,
        }
    }

    fn to_visibility(resource: Resource<VisibilityEntity>) -> PlanVisibility {
        PlanVisibility {
            id: resource.metadata.guid,
            plan_id: resource.entity.service_plan_guid,
            org_id: resource.entity.organization_guid,
        }
    }
}

#[async_trait]
impl CatalogProvider for CloudControllerClient {
    async fn find_broker(&self, name_or_id: &str) -> Result<Option<ServiceBroker>> {
        let by_name: Vec<Resource<BrokerEntity>> = self
            .list(
                "/v2/service_brokers",
                &[("q", format!("name:{name_or_id}"))],
                1,
            )
            .await?;
        if let Some(broker) = by_name.into_iter().next() {
            return Ok(Some(Self::to_broker(broker)));
        }

        let path = format!("/v2/service_brokers/{name_or_id}");
        match self.send(self.request(Method::GET, self.url(&path, &[])?), &path).await {
            Ok(response) => Ok(Some(Self::to_broker(Self::decode(response).await?))),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn list_services(&self, broker_id: &str) -> Result<Vec<ServiceOffering>> {
        let services: Vec<Resource<ServiceEntity>> = self
            .list(
                "/v2/services",
                &[("q", format!("service_broker_guid:{broker_id}"))],
                0,
            )
            .await?;

        Ok(services
            .into_iter()
            .map(|r| ServiceOffering {
                id: r.metadata.guid,
                label: r.entity.label,
                plans: Vec::new(),
            })
            .collect())
    }

    async fn list_plans(&self, service_ids: &[String]) -> Result<Vec<ServicePlan>> {
        if service_ids.is_empty() {
            return Ok(Vec::new());
        }

        let plans: Vec<Resource<PlanEntity>> = self
            .list(
                "/v2/service_plans",
                &[("q", format!("service_guid IN {}", service_ids.join(",")))],
                0,
            )
            .await?;

        Ok(plans
            .into_iter()
            .map(|r| ServicePlan {
                id: r.metadata.guid,
                name: r.entity.name,
                public: r.entity.public,
                service_id: r.entity.service_guid,
            })
            .collect())
    }
}

#[async_trait]
impl OrgDirectory for CloudControllerClient {
    async fn list_organizations(&self, page_limit: u32) -> Result<Vec<Organization>> {
        let limit = usize::try_from(page_limit).unwrap_or(usize::MAX);
        let orgs: Vec<Resource<OrgEntity>> = self
            .list(
                "/v2/organizations",
                &[("order-direction", String::from("asc"))],
                limit,
            )
            .await?;

        Ok(orgs
            .into_iter()
            .map(|r| Organization {
                id: r.metadata.guid,
                name: r.entity.name,
            })
            .collect())
    }
}

#[async_trait]
impl VisibilityStore for CloudControllerClient {
    async fn search(&self, filter: &VisibilityFilter) -> Result<Vec<PlanVisibility>> {
        let mut params = Vec::new();
        if let Some(plan_id) = &filter.plan_id {
            params.push(("q", format!("service_plan_guid:{plan_id}")));
        }
        if let Some(org_id) = &filter.org_id {
            params.push(("q", format!("organization_guid:{org_id}")));
        }

        let visibilities: Vec<Resource<VisibilityEntity>> = self
            .list("/v2/service_plan_visibilities", &params, 0)
            .await?;

        Ok(visibilities.into_iter().map(Self::to_visibility).collect())
    }

    async fn create(&self, plan_id: &str, org_id: &str) -> Result<PlanVisibility> {
        let path = "/v2/service_plan_visibilities";
        let body = VisibilityEntity {
            service_plan_guid: plan_id.to_string(),
            organization_guid: org_id.to_string(),
        };

        let request = self.request(Method::POST, self.url(path, &[])?).json(&body);
        let response = self.send(request, path).await?;
        Ok(Self::to_visibility(Self::decode(response).await?))
    }

    async fn delete(&self, visibility_id: &str) -> Result<()> {
        let path = format!("/v2/service_plan_visibilities/{visibility_id}");
        let request = self.request(Method::DELETE, self.url(&path, &[])?);
        self.send(request, &path).await?;
        Ok(())
    }
}

#[async_trait]
impl BrokerRegistry for CloudControllerClient {
    async fn register_broker(&self, registration: &BrokerRegistration) -> Result<ServiceBroker> {
        let path = "/v2/service_brokers";
        let request = self
            .request(Method::POST, self.url(path, &[])?)
            .json(&BrokerRequest::from(registration));
        let response = self.send(request, path).await?;

        let broker = Self::to_broker(Self::decode(response).await?);
        info!("Registered broker {} as {}", broker.name, broker.id);
        Ok(broker)
    }

    async fn update_broker(
        &self,
        broker_id: &str,
        registration: &BrokerRegistration,
    ) -> Result<ServiceBroker> {
        let path = format!("/v2/service_brokers/{broker_id}");
        let request = self
            .request(Method::PUT, self.url(&path, &[])?)
            .json(&BrokerRequest::from(registration));
        let response = self.send(request, &path).await?;

        let broker = Self::to_broker(Self::decode(response).await?);
        info!("Updated broker {} ({})", broker.name, broker.id);
        Ok(broker)
    }

    async fn delete_broker(&self, broker_id: &str) -> Result<()> {
        let path = format!("/v2/service_brokers/{broker_id}");
        let request = self.request(Method::DELETE, self.url(&path, &[])?);
        self.send(request, &path).await?;
        info!("Deleted broker {broker_id}");
        Ok(())
    }
}

#[async_trait]
impl PlanStore for CloudControllerClient {
    async fn set_public(&self, plan: &ServicePlan, service_id: &str, public: bool) -> Result<()> {
        let path = format!("/v2/service_plans/{}", plan.id);
        let body = PlanUpdate { public };

        let request = self.request(Method::PUT, self.url(&path, &[])?).json(&body);
        self.send(request, &path).await?;
        debug!("Plan {} of service {service_id} public={public}", plan.name);
        Ok(())
    }
}
