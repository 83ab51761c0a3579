//! Workflow service client implementation

use lost_items_core::config::{Secret, WorkflowServerConfig};
use lost_items_core::environment::WorkflowClient;
use lost_items_core::error::{WorkflowError, WorkflowResult};
use lost_items_core::model::PurchaseRequest;
use reqwest::{Client, Response, StatusCode};
use std::fmt;
use std::future::Future;

/// Collection path of purchase requests, relative to the base URL.
pub const PURCHASE_REQUESTS_PATH: &str = "/purchase-requests";

/// Workflow service client using HTTP basic auth
#[derive(Clone)]
pub struct WorkflowHttpClient {
    client: Client,
    base_url: String,
    username: String,
    password: Secret,
}

impl WorkflowHttpClient {
    /// Create a new client with explicit credentials
    #[must_use]
    pub fn new(base_url: &str, username: &str, password: Secret) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            username: username.to_string(),
            password,
        }
    }

    /// Create a client from the `[workflow_server]` configuration section.
    #[must_use]
    pub fn from_config(config: &WorkflowServerConfig) -> Self {
        Self::new(&config.base_url, &config.username, config.password.clone())
    }

    /// Submit a purchase request.
    ///
    /// The catalog item carried by `request` is copied onto the saved request.
    ///
    /// # Errors
    ///
    /// Returns errors for network failures, refused requests, or undecodable
    /// responses.
    pub async fn submit_request(&self, request: &PurchaseRequest) -> WorkflowResult<PurchaseRequest> {
        let response = self
            .client
            .post(format!("{}{PURCHASE_REQUESTS_PATH}", self.base_url))
            .basic_auth(&self.username, Some(self.password.expose()))
            .json(request)
            .send()
            .await
            .map_err(|e| WorkflowError::RequestFailed(e.to_string()))?;

        let saved = decode(response).await?;
        tracing::debug!(%saved, "Submitted purchase request");
        Ok(saved.with_catalog_item_from(request))
    }

    /// Load a purchase request by key; `None` when the service does not know it.
    ///
    /// # Errors
    ///
    /// Returns errors for network failures, statuses other than success and
    /// `404`, or undecodable responses.
    pub async fn purchase_request(&self, key: &str) -> WorkflowResult<Option<PurchaseRequest>> {
        let response = self
            .client
            .get(format!("{}{PURCHASE_REQUESTS_PATH}/{key}", self.base_url))
            .basic_auth(&self.username, Some(self.password.expose()))
            .send()
            .await
            .map_err(|e| WorkflowError::RequestFailed(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            tracing::warn!(key, "Purchase request not found");
            return Ok(None);
        }
        let loaded = decode(response).await?;
        tracing::debug!(%loaded, "Loaded purchase request");
        Ok(Some(loaded))
    }
}

async fn decode(response: Response) -> WorkflowResult<PurchaseRequest> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(WorkflowError::UnexpectedStatus {
            status: status.as_u16(),
            body,
        });
    }
    response
        .json::<PurchaseRequest>()
        .await
        .map_err(|e| WorkflowError::DecodeFailed(e.to_string()))
}

impl fmt::Debug for WorkflowHttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowHttpClient")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &self.password)
            .finish_non_exhaustive()
    }
}

impl WorkflowClient for WorkflowHttpClient {
    fn submit(
        &self,
        request: &PurchaseRequest,
    ) -> impl Future<Output = WorkflowResult<PurchaseRequest>> + Send {
        self.submit_request(request)
    }

    fn get_by_key(
        &self,
        key: &str,
    ) -> impl Future<Output = WorkflowResult<Option<PurchaseRequest>>> + Send {
        self.purchase_request(key)
    }
}
