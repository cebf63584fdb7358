use std::time::Duration;

use reqwest::{Client, Response, Url};
use serde::Serialize;
use tracing::debug;

use super::error::ClientError;
use super::{ProjectController, StatusFetcher};
use crate::config::MonitorConfig;
use crate::status::StatusSnapshot;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
struct FixRequest<'a> {
    user: &'a str,
}

/// Talks to the build server's JSON API.
///
/// `GET  {server}/projects/{name}/status` returns a [`StatusSnapshot`];
/// control commands are `POST {server}/projects/{name}/{action}`.
#[derive(Debug, Clone)]
pub struct HttpProjectClient {
    client: Client,
    base_url: Url,
}

impl HttpProjectClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        Self::with_timeouts(base_url, DEFAULT_CONNECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Build a client using the server URL and timeouts from config.
    pub fn from_config(config: &MonitorConfig) -> Result<Self, ClientError> {
        Self::with_timeouts(
            &config.server_url,
            Duration::from_secs(config.connect_timeout_secs),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn with_timeouts(
        base_url: &str,
        connect_timeout: Duration,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let base_url =
            Url::parse(base_url).map_err(|e| ClientError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(base_url.to_string()));
        }
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(timeout)
            .build()?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `{base}/projects/{project}/{action}`, with the project name encoded
    /// as a single path segment.
    fn endpoint(&self, project: &str, action: &str) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(["projects", project, action]);
        Ok(url)
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        project: &str,
        action: &str,
        body: Option<&B>,
    ) -> Result<(), ClientError> {
        let url = self.endpoint(project, action)?;
        debug!(%url, "sending control command");

        let mut request = self.client.post(url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await?;
        check_status(project, response).await?;
        Ok(())
    }
}

async fn check_status(project: &str, response: Response) -> Result<Response, ClientError> {
    let status = response.status();

    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(ClientError::NotFound(project.to_string()));
    }

    if !status.is_success() {
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown error".to_string());
        return Err(ClientError::Api {
            status: status.as_u16(),
            message,
        });
    }

    Ok(response)
}

impl StatusFetcher for HttpProjectClient {
    type Error = ClientError;

    async fn fetch_status(&self, project: &str) -> Result<StatusSnapshot, ClientError> {
        let url = self.endpoint(project, "status")?;
        debug!(%url, "fetching project status");

        let response = self.client.get(url).send().await?;
        let response = check_status(project, response).await?;
        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| ClientError::Decode(e.to_string()))
    }
}

impl ProjectController for HttpProjectClient {
    type Error = ClientError;

    async fn force_build(&self, project: &str) -> Result<(), ClientError> {
        self.post::<()>(project, "force", None).await
    }

    async fn abort_build(&self, project: &str) -> Result<(), ClientError> {
        self.post::<()>(project, "abort", None).await
    }

    async fn fix_build(&self, project: &str, user: &str) -> Result<(), ClientError> {
        self.post(project, "fix", Some(&FixRequest { user })).await
    }

    async fn stop_project(&self, project: &str) -> Result<(), ClientError> {
        self.post::<()>(project, "stop", None).await
    }

    async fn start_project(&self, project: &str) -> Result<(), ClientError> {
        self.post::<()>(project, "start", None).await
    }

    async fn cancel_pending_request(&self, project: &str) -> Result<(), ClientError> {
        self.post::<()>(project, "cancel-pending", None).await
    }
}
