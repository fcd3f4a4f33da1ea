//! HttpPlatformClient - Platform REST API over reqwest

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::json;
use shared::{CompanyId, PlatformConfig};
use tracing::debug;

use crate::client::{PlatformClient, PlatformResult};
use crate::error::PlatformError;
use crate::types::{Actor, ActorPayload, EmbeddingJob, ItemList, PlatformEntity, ResidencyConfig};

/// Client for the Platform API
///
/// Every request carries the API key as a bearer token and the app id in
/// `X-App-Id`.
#[derive(Debug, Clone)]
pub struct HttpPlatformClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    app_id: String,
}

impl HttpPlatformClient {
    /// Create a client from configuration; fails when no base URL is set
    pub fn new(config: &PlatformConfig) -> PlatformResult<Self> {
        let base_url = config
            .base_url
            .as_deref()
            .map(|u| u.trim().trim_end_matches('/'))
            .filter(|u| !u.is_empty())
            .ok_or(PlatformError::NotConfigured)?
            .to_string();

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| PlatformError::Connection(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            api_key: config.api_key.clone(),
            app_id: config.app_id.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn company_url(&self, company: &CompanyId, path: &str) -> String {
        format!("{}/api/v1/companies/{}{}", self.base_url, company, path)
    }

    fn request(&self, method: Method, url: String) -> RequestBuilder {
        debug!(%method, %url, "platform request");
        let builder = self.client.request(method, url).header("X-App-Id", &self.app_id);
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> PlatformResult<Response> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        debug!(status = status.as_u16(), "platform request failed");
        Err(PlatformError::from_status(status.as_u16(), body))
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> PlatformResult<T> {
        response
            .json::<T>()
            .await
            .map_err(|e| PlatformError::Decode(e.to_string()))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: String) -> PlatformResult<T> {
        let response = self.send(self.request(Method::GET, url)).await?;
        Self::decode(response).await
    }
}

/// Treat 404 as absence
fn optional<T>(result: PlatformResult<T>) -> PlatformResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(PlatformError::NotFound) => Ok(None),
        Err(e) => Err(e),
    }
}

#[async_trait]
impl PlatformClient for HttpPlatformClient {
    async fn residency_config(&self, company: &CompanyId) -> PlatformResult<Option<ResidencyConfig>> {
        let url = self.company_url(company, &format!("/apps/{}/residency", self.app_id));
        optional(self.get_json(url).await)
    }

    async fn list_actors(&self, company: &CompanyId, actor_type: Option<&str>) -> PlatformResult<Vec<Actor>> {
        let mut builder = self.request(Method::GET, self.company_url(company, "/actors"));
        if let Some(t) = actor_type {
            builder = builder.query(&[("type", t)]);
        }
        let list: ItemList<Actor> = Self::decode(self.send(builder).await?).await?;
        Ok(list.items)
    }

    async fn get_actor(&self, company: &CompanyId, id: &str) -> PlatformResult<Option<Actor>> {
        optional(self.get_json(self.company_url(company, &format!("/actors/{id}"))).await)
    }

    async fn create_actor(&self, company: &CompanyId, payload: &ActorPayload) -> PlatformResult<Actor> {
        let builder = self
            .request(Method::POST, self.company_url(company, "/actors"))
            .json(payload);
        Self::decode(self.send(builder).await?).await
    }

    async fn update_actor(&self, company: &CompanyId, id: &str, payload: &ActorPayload) -> PlatformResult<Actor> {
        let builder = self
            .request(Method::PATCH, self.company_url(company, &format!("/actors/{id}")))
            .json(payload);
        Self::decode(self.send(builder).await?).await
    }

    async fn delete_actor(&self, company: &CompanyId, id: &str) -> PlatformResult<()> {
        let builder = self.request(Method::DELETE, self.company_url(company, &format!("/actors/{id}")));
        self.send(builder).await?;
        Ok(())
    }

    async fn list_entities(&self, company: &CompanyId) -> PlatformResult<Vec<PlatformEntity>> {
        let list: ItemList<PlatformEntity> = self.get_json(self.company_url(company, "/entities")).await?;
        Ok(list.items)
    }

    async fn get_entity(&self, company: &CompanyId, id: &str) -> PlatformResult<Option<PlatformEntity>> {
        optional(self.get_json(self.company_url(company, &format!("/entities/{id}"))).await)
    }

    async fn request_embedding(
        &self,
        company: &CompanyId,
        actor_id: &str,
        image_ref: &str,
    ) -> PlatformResult<EmbeddingJob> {
        let builder = self
            .request(Method::POST, self.company_url(company, &format!("/actors/{actor_id}/embeddings")))
            .json(&json!({ "imageRef": image_ref }));
        Self::decode(self.send(builder).await?).await
    }

    async fn health(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        match self.request(Method::GET, url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_base_url() {
        let config = PlatformConfig::default();
        assert_eq!(HttpPlatformClient::new(&config).unwrap_err(), PlatformError::NotConfigured);
    }

    #[test]
    fn test_trims_trailing_slash() {
        let config = PlatformConfig {
            base_url: Some("http://platform.local/".to_string()),
            ..Default::default()
        };
        let client = HttpPlatformClient::new(&config).unwrap();
        assert_eq!(client.base_url(), "http://platform.local");
        assert_eq!(
            client.company_url(&CompanyId::new("acme"), "/actors"),
            "http://platform.local/api/v1/companies/acme/actors"
        );
    }
}
