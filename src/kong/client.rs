//! HTTP implementation of [`GatewayClient`] on top of reqwest.

use super::{
    AdminApiError, Connector, Consumer, GatewayClient, Page, Plugin, PluginScope, Route, Service,
};
use crate::instance::Instance;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// Page size requested from list endpoints.
const PAGE_SIZE: usize = 1000;

/// Kong Admin API client bound to one instance.
#[derive(Debug, Clone)]
pub struct AdminClient {
    client: Client,
    base_url: Url,
}

impl AdminClient {
    /// Build a client for the instance, attaching its auth header (if any)
    /// and the user agent to every request.
    pub fn new(
        instance: &Instance,
        timeout: Duration,
        user_agent: &str,
    ) -> Result<Self, AdminApiError> {
        let base_url = Url::parse(&instance.base_url).map_err(|e| {
            AdminApiError::InvalidClient(format!("base URL '{}': {}", instance.base_url, e))
        })?;
        if !matches!(base_url.scheme(), "http" | "https") || base_url.cannot_be_a_base() {
            return Err(AdminApiError::InvalidClient(format!(
                "base URL '{}' must use http or https",
                instance.base_url
            )));
        }

        let mut headers = HeaderMap::new();
        if let Some((key, value)) = instance.auth_header() {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| AdminApiError::InvalidClient(format!("header '{}': {}", key, e)))?;
            let mut value = HeaderValue::from_str(value)
                .map_err(|e| AdminApiError::InvalidClient(format!("header '{}': {}", key, e)))?;
            value.set_sensitive(true);
            headers.insert(name, value);
        }

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .default_headers(headers)
            .build()
            .map_err(|e| AdminApiError::InvalidClient(e.to_string()))?;

        Ok(Self { client, base_url })
    }

    /// Endpoint under the base URL. Each segment is percent-encoded on its
    /// own, so `/`, `?` and `#` inside an id stay part of that id.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, AdminApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                AdminApiError::InvalidClient(format!(
                    "base URL '{}' cannot be a base",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Send a request and map transport failures and non-2xx statuses.
    async fn send(
        &self,
        request: RequestBuilder,
        resource: &str,
    ) -> Result<Response, AdminApiError> {
        let response = request
            .send()
            .await
            .map_err(|e| AdminApiError::Transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(AdminApiError::NotFound(resource.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AdminApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, AdminApiError> {
        response
            .json::<T>()
            .await
            .map_err(|e| AdminApiError::Decode(e.to_string()))
    }

    async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, AdminApiError> {
        let resource = resource(segments);
        let request = self.client.get(self.endpoint(segments)?);
        Self::decode(self.send(request, &resource).await?).await
    }

    /// Follow Kong's `offset` cursor until the last page.
    async fn list_all<T: DeserializeOwned>(
        &self,
        segments: &[&str],
    ) -> Result<Vec<T>, AdminApiError> {
        let resource = resource(segments);
        let url = self.endpoint(segments)?;
        let mut items = Vec::new();
        let mut offset: Option<String> = None;

        loop {
            let mut query = vec![("size", PAGE_SIZE.to_string())];
            if let Some(cursor) = &offset {
                query.push(("offset", cursor.clone()));
            }

            let request = self.client.get(url.clone()).query(&query);
            let page: Page<T> = Self::decode(self.send(request, &resource).await?).await?;
            debug!(path = %resource, items = page.data.len(), "Fetched page");
            items.extend(page.data);

            match page.offset {
                Some(next) if !next.is_empty() => offset = Some(next),
                _ => break,
            }
        }

        Ok(items)
    }
}

/// Unencoded path, for error messages and logs.
fn resource(segments: &[&str]) -> String {
    format!("/{}", segments.join("/"))
}

#[async_trait]
impl GatewayClient for AdminClient {
    #[instrument(skip(self))]
    async fn find_service(&self, id_or_name: &str) -> Result<Service, AdminApiError> {
        self.get(&["services", id_or_name]).await
    }

    #[instrument(skip(self))]
    async fn find_route(
        &self,
        service_id: &str,
        id_or_name: &str,
    ) -> Result<Route, AdminApiError> {
        self.get(&["services", service_id, "routes", id_or_name])
            .await
    }

    #[instrument(skip(self))]
    async fn find_consumer(&self, id_or_name: &str) -> Result<Consumer, AdminApiError> {
        self.get(&["consumers", id_or_name]).await
    }

    async fn list_services(&self) -> Result<Vec<Service>, AdminApiError> {
        self.list_all(&["services"]).await
    }

    async fn list_routes_for_service(
        &self,
        service_id: &str,
    ) -> Result<Vec<Route>, AdminApiError> {
        self.list_all(&["services", service_id, "routes"]).await
    }

    #[instrument(skip(self, plugin), fields(plugin = %plugin.name))]
    async fn create_plugin(
        &self,
        scope: PluginScope<'_>,
        plugin: &Plugin,
    ) -> Result<Plugin, AdminApiError> {
        let (collection, owner) = scope.owner();
        let url = self.endpoint(&[collection, owner, "plugins"])?;
        let request = self.client.post(url).json(plugin);
        Self::decode(self.send(request, &scope.plugins_path()).await?).await
    }

    #[instrument(skip(self))]
    async fn update_plugin(
        &self,
        scope: PluginScope<'_>,
        plugin_id: &str,
        enabled: bool,
    ) -> Result<Plugin, AdminApiError> {
        let (collection, owner) = scope.owner();
        let url = self.endpoint(&[collection, owner, "plugins", plugin_id])?;
        let request = self
            .client
            .patch(url)
            .json(&json!({ "enabled": enabled }));
        let resource = format!("{}/{}", scope.plugins_path(), plugin_id);
        Self::decode(self.send(request, &resource).await?).await
    }

    #[instrument(skip(self))]
    async fn delete_plugin(
        &self,
        scope: PluginScope<'_>,
        plugin_id: &str,
    ) -> Result<(), AdminApiError> {
        let (collection, owner) = scope.owner();
        let url = self.endpoint(&[collection, owner, "plugins", plugin_id])?;
        let resource = format!("{}/{}", scope.plugins_path(), plugin_id);
        self.send(self.client.delete(url), &resource).await?;
        Ok(())
    }
}

/// Hands out an [`AdminClient`] per instance.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    timeout: Duration,
    user_agent: String,
}

impl HttpConnector {
    pub fn new(timeout: Duration, user_agent: impl Into<String>) -> Self {
        Self {
            timeout,
            user_agent: user_agent.into(),
        }
    }
}

impl Default for HttpConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(30), "kong-chaos")
    }
}

impl Connector for HttpConnector {
    fn connect(&self, instance: &Instance) -> Result<Arc<dyn GatewayClient>, AdminApiError> {
        let client = AdminClient::new(instance, self.timeout, &self.user_agent)?;
        Ok(Arc::new(client))
    }
}
