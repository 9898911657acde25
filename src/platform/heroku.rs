//! Heroku Platform API v3 client for SSL endpoints.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};
use url::Url;

use super::client::{EndpointRecord, PlatformClient};
use super::error::{PlatformError, Result};
use crate::config::PlatformConfig;
use crate::domain::{AppRef, EndpointId, SecretString};

const ACCEPT_V3: &str = "application/vnd.heroku+json; version=3";
const RESOURCE: &str = "ssl-endpoints";

/// Request body for create and update
#[derive(Serialize)]
struct EndpointBody<'a> {
    certificate_chain: &'a str,
    private_key: &'a str,
}

/// Error body returned by the platform for non-success responses
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    id: Option<String>,
    message: Option<String>,
}

/// Authenticated client for the Heroku SSL endpoint resource
#[derive(Debug, Clone)]
pub struct HerokuPlatformClient {
    client: Client,
    base_url: Url,
    api_key: SecretString,
}

impl HerokuPlatformClient {
    /// Build a client from validated platform configuration.
    pub fn new(config: &PlatformConfig) -> Result<Self> {
        let base_url = Url::parse(&config.api_url).map_err(|e| {
            PlatformError::config(format!("invalid API URL '{}': {}", config.api_url, e))
        })?;

        if base_url.cannot_be_a_base() {
            return Err(PlatformError::config(format!(
                "API URL '{}' cannot be used as a base URL",
                config.api_url
            )));
        }

        if config.api_key.is_blank() {
            return Err(PlatformError::config("API key is required"));
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_V3));

        let client = Client::builder()
            .default_headers(headers)
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| PlatformError::config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client, base_url, api_key: config.api_key.clone() })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `<base>/apps/<app>/ssl-endpoints[/<id>]`, each segment percent-encoded.
    fn endpoint_url(&self, app: &AppRef, id: Option<&EndpointId>) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| PlatformError::config("API URL cannot be used as a base URL"))?;
            segments.pop_if_empty().extend(["apps", app.as_str(), RESOURCE]);
            if let Some(id) = id {
                segments.push(id.as_str());
            }
        }
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(self.api_key.expose_secret())
    }

    async fn send(&self, request: RequestBuilder, resource: &Url) -> Result<Response> {
        let response = self.authorize(request).send().await?;
        let status = response.status();
        debug!(url = %resource, status = status.as_u16(), "Platform API response");

        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::NOT_FOUND {
            return Err(PlatformError::not_found(resource.path()));
        }

        let text = response.text().await.unwrap_or_default();
        trace!(body = %text, "Platform API error body");

        Err(match serde_json::from_str::<ApiErrorBody>(&text) {
            Ok(body) => PlatformError::api(
                status.as_u16(),
                body.id,
                body.message.unwrap_or_else(|| status.to_string()),
            ),
            Err(_) if text.trim().is_empty() => {
                PlatformError::api(status.as_u16(), None, status.to_string())
            }
            Err(_) => PlatformError::api(status.as_u16(), None, text),
        })
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| {
            PlatformError::decode(format!("unexpected certificate endpoint payload: {}", e))
        })
    }
}

#[async_trait]
impl PlatformClient for HerokuPlatformClient {
    async fn create_endpoint(
        &self,
        app: &AppRef,
        chain: &str,
        key: &SecretString,
    ) -> Result<EndpointRecord> {
        let url = self.endpoint_url(app, None)?;
        let body = EndpointBody { certificate_chain: chain, private_key: key.expose_secret() };

        let response = self.send(self.client.post(url.clone()).json(&body), &url).await?;
        Self::decode(response).await
    }

    async fn get_endpoint(&self, app: &AppRef, id: &EndpointId) -> Result<EndpointRecord> {
        let url = self.endpoint_url(app, Some(id))?;
        let response = self.send(self.client.get(url.clone()), &url).await?;
        Self::decode(response).await
    }

    async fn update_endpoint(
        &self,
        app: &AppRef,
        id: &EndpointId,
        chain: &str,
        key: &SecretString,
    ) -> Result<EndpointRecord> {
        let url = self.endpoint_url(app, Some(id))?;
        let body = EndpointBody { certificate_chain: chain, private_key: key.expose_secret() };

        let response = self.send(self.client.patch(url.clone()).json(&body), &url).await?;
        Self::decode(response).await
    }

    async fn delete_endpoint(&self, app: &AppRef, id: &EndpointId) -> Result<()> {
        let url = self.endpoint_url(app, Some(id))?;
        self.send(self.client.delete(url.clone()), &url).await?;
        Ok(())
    }

    async fn list_endpoints(&self, app: &AppRef) -> Result<Vec<EndpointRecord>> {
        let url = self.endpoint_url(app, None)?;
        let response = self.send(self.client.get(url.clone()), &url).await?;
        Self::decode(response).await
    }
}
