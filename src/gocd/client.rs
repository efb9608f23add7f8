use log::debug;
use reqwest::header::{ACCEPT, ETAG, IF_MATCH};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use url::Url;

use crate::config::Credentials;
use crate::error::{ReconcileError, Result};

use super::types::{Fetched, GroupDocument, GroupsIndex};

// API generations this tool speaks, per resource kind.
const PIPELINE_ACCEPT: &str = "application/vnd.go.cd.v3+json";
const GROUP_ACCEPT: &str = "application/vnd.go.cd.v2+json";

/// Client for the GoCD admin API.
///
/// Every fetch surfaces the resource's ETag and every mutating call is a
/// single conditional request; there is no retry and no caching. A stale
/// `If-Match` token comes back as `ConcurrencyConflict` for the caller to
/// surface, never to swallow.
pub struct GoCdClient {
    client: Client,
    base_url: Url,
    credentials: Credentials,
}

impl GoCdClient {
    pub fn new(
        base_url: &str,
        credentials: Credentials,
        insecure_skip_verify: bool,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("pipewright/", env!("CARGO_PKG_VERSION")))
            .danger_accept_invalid_certs(insecure_skip_verify)
            .build()
            .map_err(|e| ReconcileError::Config(format!("Failed to create HTTP client: {e}")))?;

        let base_url = Url::parse(base_url)
            .map_err(|e| ReconcileError::Config(format!("Invalid base URL: {e}")))?;

        Ok(Self {
            client,
            base_url,
            credentials,
        })
    }

    /// Probe the pipeline resource. `None` means it does not exist.
    pub async fn fetch_pipeline(&self, name: &str) -> Result<Option<Fetched<Value>>> {
        let response = self
            .request(Method::GET, &format!("/go/api/admin/pipelines/{name}"))?
            .header(ACCEPT, PIPELINE_ACCEPT)
            .send()
            .await?;
        debug!("<-- {} fetch pipeline {name}", response.status());

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let etag = etag_of(&response)?;
                let document = response.json().await?;
                Ok(Some(Fetched { document, etag }))
            }
            _ => Err(server_error(response).await),
        }
    }

    pub async fn create_pipeline(&self, name: &str, document: &Value) -> Result<()> {
        let response = self
            .request(Method::POST, "/go/api/admin/pipelines")?
            .header(ACCEPT, PIPELINE_ACCEPT)
            .json(document)
            .send()
            .await?;
        debug!("<-- {} create pipeline {name}", response.status());

        match response.status() {
            // the platform reports a duplicate name as 409 or 422 depending
            // on the API generation
            StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
                Err(ReconcileError::PipelineExists(name.to_string()))
            }
            status if status.is_success() => Ok(()),
            _ => Err(server_error(response).await),
        }
    }

    pub async fn update_pipeline(&self, name: &str, document: &Value, etag: &str) -> Result<()> {
        let response = self
            .request(Method::PUT, &format!("/go/api/admin/pipelines/{name}"))?
            .header(ACCEPT, PIPELINE_ACCEPT)
            .header(IF_MATCH, etag)
            .json(document)
            .send()
            .await?;
        debug!("<-- {} update pipeline {name}", response.status());

        match response.status() {
            StatusCode::PRECONDITION_FAILED => Err(ReconcileError::ConcurrencyConflict {
                resource: format!("pipeline {name}"),
            }),
            status if status.is_success() => Ok(()),
            _ => Err(server_error(response).await),
        }
    }

    /// Idempotent delete: `false` means the resource was already gone.
    pub async fn delete_pipeline(&self, name: &str) -> Result<bool> {
        let response = self
            .request(Method::DELETE, &format!("/go/api/admin/pipelines/{name}"))?
            .header(ACCEPT, PIPELINE_ACCEPT)
            .send()
            .await?;
        debug!("<-- {} delete pipeline {name}", response.status());

        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            _ => Err(server_error(response).await),
        }
    }

    pub async fn fetch_groups(&self) -> Result<Vec<GroupDocument>> {
        let response = self
            .request(Method::GET, "/go/api/admin/environments")?
            .header(ACCEPT, GROUP_ACCEPT)
            .send()
            .await?;
        debug!("<-- {} fetch groups", response.status());

        if !response.status().is_success() {
            return Err(server_error(response).await);
        }
        let index: GroupsIndex = response.json().await?;
        Ok(index.into_groups())
    }

    pub async fn fetch_group(&self, name: &str) -> Result<Fetched<GroupDocument>> {
        let response = self
            .request(Method::GET, &format!("/go/api/admin/environments/{name}"))?
            .header(ACCEPT, GROUP_ACCEPT)
            .send()
            .await?;
        debug!("<-- {} fetch group {name}", response.status());

        match response.status() {
            StatusCode::NOT_FOUND => Err(ReconcileError::NotFound(format!("group {name}"))),
            status if status.is_success() => {
                let etag = etag_of(&response)?;
                let document = response.json().await?;
                Ok(Fetched { document, etag })
            }
            _ => Err(server_error(response).await),
        }
    }

    pub async fn update_group(&self, document: &GroupDocument, etag: &str) -> Result<()> {
        let name = &document.name;
        let response = self
            .request(Method::PUT, &format!("/go/api/admin/environments/{name}"))?
            .header(ACCEPT, GROUP_ACCEPT)
            .header(IF_MATCH, etag)
            .json(document)
            .send()
            .await?;
        debug!("<-- {} update group {name}", response.status());

        match response.status() {
            StatusCode::PRECONDITION_FAILED => Err(ReconcileError::ConcurrencyConflict {
                resource: format!("group {name}"),
            }),
            status if status.is_success() => Ok(()),
            _ => Err(server_error(response).await),
        }
    }

    /// Pipelines are created and updated in a paused state; resume them.
    pub async fn unpause(&self, name: &str) -> Result<()> {
        let response = self
            .request(Method::POST, &format!("/go/api/pipelines/{name}/unpause"))?
            .header("Confirm", "true")
            .send()
            .await?;
        debug!("<-- {} unpause {name}", response.status());

        if !response.status().is_success() {
            return Err(server_error(response).await);
        }
        Ok(())
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| ReconcileError::Config(format!("Invalid endpoint {path}: {e}")))?;
        debug!("--> {method} {url}");
        Ok(self
            .client
            .request(method, url)
            .basic_auth(&self.credentials.login, Some(&self.credentials.password)))
    }
}

fn etag_of(response: &Response) -> Result<String> {
    response
        .headers()
        .get(ETAG)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| ReconcileError::RemoteServer {
            status: response.status().as_u16(),
            body: "response missing ETag header".to_string(),
        })
}

async fn server_error(response: Response) -> ReconcileError {
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "unable to read error response".to_string());
    ReconcileError::RemoteServer { status, body }
}
