//! Okapi gateway client implementation

use lost_items_core::config::{FolioConfig, Secret};
use lost_items_core::environment::CatalogClient;
use lost_items_core::error::{CatalogError, CatalogResult};
use lost_items_core::query::CqlQuery;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use tokio::sync::RwLock;

/// Login endpoint, relative to the gateway base URL.
pub const LOGIN_PATH: &str = "/authn/login";

/// Header naming the tenant on every request.
pub const TENANT_HEADER: &str = "x-okapi-tenant";

/// Header carrying the session token, in login responses and in requests.
pub const TOKEN_HEADER: &str = "x-okapi-token";

#[derive(Serialize)]
struct Credentials<'a> {
    username: &'a str,
    password: &'a str,
    tenant: &'a str,
}

/// FOLIO client with session handling
pub struct FolioClient {
    client: Client,
    base_url: String,
    tenant: String,
    username: String,
    password: Secret,
    token: RwLock<Option<String>>,
}

impl FolioClient {
    /// Create a client. No request is made until the first call.
    #[must_use]
    pub fn new(base_url: &str, tenant: &str, username: &str, password: Secret) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            tenant: tenant.to_string(),
            username: username.to_string(),
            password,
            token: RwLock::new(None),
        }
    }

    /// Create a client from the `[folio]` configuration section.
    #[must_use]
    pub fn from_config(config: &FolioConfig) -> Self {
        Self::new(
            &config.okapi_base_url,
            &config.tenant_id,
            &config.username,
            config.password.clone(),
        )
    }

    /// Log in and remember the session token.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::AuthenticationFailed` when the gateway refuses
    /// the credentials or answers without a token, and
    /// `CatalogError::RequestFailed` when it cannot be reached.
    pub async fn login(&self) -> CatalogResult<String> {
        let response = self
            .client
            .post(self.url(LOGIN_PATH))
            .header(TENANT_HEADER, &self.tenant)
            .json(&Credentials {
                username: &self.username,
                password: self.password.expose(),
                tenant: &self.tenant,
            })
            .send()
            .await
            .map_err(|e| CatalogError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CatalogError::AuthenticationFailed(format!(
                "status {}: {body}",
                status.as_u16()
            )));
        }

        let token = response
            .headers()
            .get(TOKEN_HEADER)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                CatalogError::AuthenticationFailed(format!("login response carried no {TOKEN_HEADER}"))
            })?;

        *self.token.write().await = Some(token.clone());
        tracing::debug!(tenant = %self.tenant, "Logged in to FOLIO");
        Ok(token)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn session_token(&self) -> CatalogResult<String> {
        let cached = self.token.read().await.clone();
        match cached {
            Some(token) => Ok(token),
            None => self.login().await,
        }
    }

    /// Send a request with the session headers, renewing the session once on `401`.
    async fn execute<F>(&self, path: &str, build: F) -> CatalogResult<Response>
    where
        F: Fn(&Client) -> RequestBuilder + Sync,
    {
        let token = self.session_token().await?;
        let response = self.send(&build, &token).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        tracing::info!(path, "FOLIO session rejected, logging in again");
        let token = self.login().await?;
        self.send(&build, &token).await
    }

    async fn send<F>(&self, build: &F, token: &str) -> CatalogResult<Response>
    where
        F: Fn(&Client) -> RequestBuilder + Sync,
    {
        build(&self.client)
            .header(TENANT_HEADER, &self.tenant)
            .header(TOKEN_HEADER, token)
            .send()
            .await
            .map_err(|e| CatalogError::RequestFailed(e.to_string()))
    }

    async fn fetch(
        &self,
        path: &str,
        query: Option<&CqlQuery>,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> CatalogResult<Value> {
        let url = self.url(path);
        let mut params: Vec<(&str, String)> = Vec::with_capacity(3);
        if let Some(query) = query {
            params.push(("query", query.as_str().to_string()));
        }
        if let Some(limit) = limit {
            params.push(("limit", limit.to_string()));
        }
        if let Some(offset) = offset {
            params.push(("offset", offset.to_string()));
        }

        let response = self
            .execute(path, |client| client.get(&url).query(&params))
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CatalogError::UnexpectedStatus {
                path: path.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        response
            .json::<Value>()
            .await
            .map_err(|e| CatalogError::DecodeFailed(format!("{path}: {e}")))
    }

    async fn update(&self, path: &str, body: &Value) -> CatalogResult<bool> {
        let url = self.url(path);
        let response = self
            .execute(path, |client| client.put(&url).json(body))
            .await?;

        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(true);
        }
        let text = response.text().await.unwrap_or_default();
        tracing::warn!(path, status = status.as_u16(), body = %text, "FOLIO did not accept update");
        Ok(false)
    }
}

impl fmt::Debug for FolioClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FolioClient")
            .field("base_url", &self.base_url)
            .field("tenant", &self.tenant)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl CatalogClient for FolioClient {
    fn get(
        &self,
        path: &str,
        query: Option<&CqlQuery>,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> impl Future<Output = CatalogResult<Value>> + Send {
        self.fetch(path, query, limit, offset)
    }

    fn put(&self, path: &str, body: &Value) -> impl Future<Output = CatalogResult<bool>> + Send {
        self.update(path, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = FolioClient::new(
            "https://okapi.example.edu/",
            "diku",
            "svc-lost-items",
            Secret::new("pw".to_string()),
        );
        assert_eq!(client.base_url, "https://okapi.example.edu");
        assert_eq!(client.url("/inventory/items"), "https://okapi.example.edu/inventory/items");
    }

    #[test]
    fn test_debug_hides_credentials() {
        let client = FolioClient::new("http://localhost", "diku", "svc", Secret::new("hunter2".to_string()));
        let rendered = format!("{client:?}");
        assert!(rendered.contains("diku"));
        assert!(!rendered.contains("hunter2"));
    }
}
