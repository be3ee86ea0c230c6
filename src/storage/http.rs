//! HTTP Connector
//!
//! Forwards records to a collector service over a small REST API:
//!
//! | call                       | request                                        |
//! |----------------------------|------------------------------------------------|
//! | write resource             | `PUT /resources/{urn}`                         |
//! | write secondary attribute  | `PUT /resources/{urn}/attributes/{type}`       |
//! | read / delete resource     | `GET` / `DELETE /resources/{urn}`              |
//! | reconcile a scope          | `POST /scopes/reconcile`                       |
//! | read everything            | `GET /records?pageToken=..` (paginated)        |
//!
//! Urns are percent-encoded into the path.

use super::StorageConnector;
use crate::error::ConnectorError;
use crate::model::{
    AttributeHandle, KeepSet, ResourceHandle, ResourceRecord, Scope, SecondaryAttributeRecord,
    StoredRecord,
};
use crate::urn::Urn;
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Truncate a response body and drop control characters before logging it
fn sanitize_for_log(body: &str) -> String {
    let total = body.chars().count();
    let truncated: String = body.chars().take(MAX_LOG_BODY_LENGTH).collect();
    let truncated = if total > MAX_LOG_BODY_LENGTH {
        format!("{}... [truncated, {} bytes total]", truncated, body.len())
    } else {
        truncated
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

#[derive(Debug, Serialize)]
struct ReconcileRequest<'a> {
    service: &'a str,
    resource_type: &'a str,
    region: &'a str,
    account_id: &'a str,
    urns_to_keep: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RecordPage {
    #[serde(default)]
    records: Vec<StoredRecord>,
    #[serde(default, rename = "nextPageToken")]
    next_page_token: Option<String>,
}

/// Connector for a collector HTTP API
#[derive(Debug, Clone)]
pub struct HttpConnector {
    client: Client,
    base: Url,
}

impl HttpConnector {
    pub fn new(base_url: &str) -> Result<Self, ConnectorError> {
        // Url::join drops the last path segment unless it ends in a slash
        let mut base = Url::parse(base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let client = Client::builder()
            .user_agent(concat!("cloudsweep/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self { client, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn url(&self, path: &str) -> Result<Url, ConnectorError> {
        Ok(self.base.join(path)?)
    }

    fn resource_path(urn: &Urn) -> String {
        format!("resources/{}", urlencoding::encode(&urn.to_string()))
    }

    /// Send a request; `Ok(None)` means 404
    async fn send(&self, request: RequestBuilder) -> Result<Option<String>, ConnectorError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            tracing::error!("Storage API error: {} - {}", status, sanitize_for_log(&body));
            return Err(ConnectorError::Status(status.as_u16()));
        }
        Ok(Some(body))
    }

    /// Like `send`, but a 404 is an error too
    async fn send_expecting(&self, request: RequestBuilder) -> Result<String, ConnectorError> {
        self.send(request)
            .await?
            .ok_or(ConnectorError::Status(StatusCode::NOT_FOUND.as_u16()))
    }

    async fn fetch_page(&self, page_token: Option<&str>) -> Result<RecordPage, ConnectorError> {
        let mut url = self.url("records")?;
        if let Some(token) = page_token {
            url.query_pairs_mut().append_pair("pageToken", token);
        }
        tracing::debug!("GET {}", url);

        let body = self.send_expecting(self.client.get(url)).await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl StorageConnector for HttpConnector {
    fn name(&self) -> &str {
        "http"
    }

    async fn write_resource(&self, urn: &Urn, resource: &ResourceHandle) -> Result<(), ConnectorError> {
        let url = self.url(&Self::resource_path(urn))?;
        tracing::debug!("PUT {}", url);

        let record = ResourceRecord::new(urn, resource);
        self.send_expecting(self.client.put(url).json(&record)).await?;
        Ok(())
    }

    async fn write_secondary_attribute(
        &self,
        urn: &Urn,
        attribute: &AttributeHandle,
        attribute_type: &str,
    ) -> Result<(), ConnectorError> {
        let path = format!(
            "{}/attributes/{}",
            Self::resource_path(urn),
            urlencoding::encode(attribute_type)
        );
        let url = self.url(&path)?;
        tracing::debug!("PUT {}", url);

        let record = SecondaryAttributeRecord::new(urn, attribute, attribute_type);
        self.send_expecting(self.client.put(url).json(&record)).await?;
        Ok(())
    }

    async fn delete_resources_not_in(
        &self,
        scope: &Scope,
        account_id: &str,
        urns_to_keep: &KeepSet,
    ) -> Result<(), ConnectorError> {
        let url = self.url("scopes/reconcile")?;
        tracing::debug!("POST {} ({})", url, scope);

        let mut keep: Vec<String> = urns_to_keep
            .iter()
            .filter(|urn| scope.contains(urn, account_id))
            .map(Urn::to_string)
            .collect();
        keep.sort();

        let request = ReconcileRequest {
            service: &scope.service,
            resource_type: &scope.resource_type,
            region: &scope.region,
            account_id,
            urns_to_keep: keep,
        };
        self.send_expecting(self.client.post(url).json(&request)).await?;
        Ok(())
    }

    async fn read_resource(&self, urn: &Urn) -> Result<Option<ResourceRecord>, ConnectorError> {
        let url = self.url(&Self::resource_path(urn))?;
        tracing::debug!("GET {}", url);

        match self.send(self.client.get(url)).await? {
            Some(body) => Ok(Some(serde_json::from_str(&body)?)),
            None => Ok(None),
        }
    }

    async fn delete_resource(&self, urn: &Urn) -> Result<(), ConnectorError> {
        let url = self.url(&Self::resource_path(urn))?;
        tracing::debug!("DELETE {}", url);

        // Already gone counts as deleted
        self.send(self.client.delete(url)).await?;
        Ok(())
    }

    fn read_all(&self) -> BoxStream<'_, Result<StoredRecord, ConnectorError>> {
        // State: Some(token) while pages remain, None once the last page is read
        stream::try_unfold(Some(None::<String>), move |state: Option<Option<String>>| async move {
            let Some(token) = state else {
                return Ok::<_, ConnectorError>(None);
            };
            let page: RecordPage = self.fetch_page(token.as_deref()).await?;
            let next = page.next_page_token.map(Some);
            Ok(Some((page.records, next)))
        })
        .map_ok(|records| stream::iter(records.into_iter().map(Ok::<_, ConnectorError>)))
        .try_flatten()
        .boxed()
    }
}
