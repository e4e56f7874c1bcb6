//! HTTP transport for `colsync-server`.

use super::Transport;
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use async_trait::async_trait;
use colsync_engine::{DownloadBatch, DownloadQuery, Error, SeqNo, UploadAck, UploadRequest};
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::Deserialize;
use tracing::debug;

/// Error body returned by the server.
#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Talks to a sync server over HTTP with JSON bodies.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: Url,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: &str) -> Result<Self> {
        let base_url =
            Url::parse(base_url).map_err(|e| ClientError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(base_url.to_string()));
        }
        Ok(Self { client, base_url })
    }

    /// Build a transport with the configured request timeout.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Self::with_client(client, &config.url)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `{base}/partitions/{partition}/{action}` with the partition encoded
    /// as a single path segment.
    fn endpoint(&self, partition: &str, action: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(["partitions", partition, action]);
        Ok(url)
    }

    /// Send a request, reporting an unreachable or unresponsive service as
    /// [`Error::Disconnected`].
    async fn send(request: RequestBuilder) -> Result<Response> {
        let response = request.send().await.map_err(|e| {
            if e.is_connect() || e.is_timeout() {
                ClientError::Engine(Error::Disconnected(e.to_string()))
            } else {
                ClientError::Transport(e)
            }
        })?;
        Self::check(response).await
    }

    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .map(|body| body.error)
            .unwrap_or(text);
        Err(ClientError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn upload(&self, partition: &str, request: &UploadRequest) -> Result<UploadAck> {
        let url = self.endpoint(partition, "upload")?;
        debug!(%url, operations = request.operations.len(), "Uploading");
        let response = Self::send(self.client.post(url).json(request)).await?;
        Ok(response.json().await?)
    }

    async fn download(
        &self,
        partition: &str,
        since: SeqNo,
        limit: Option<usize>,
    ) -> Result<DownloadBatch> {
        let url = self.endpoint(partition, "download")?;
        debug!(%url, since, "Downloading");
        let response =
            Self::send(self.client.get(url).query(&DownloadQuery { since, limit })).await?;
        Ok(response.json().await?)
    }
}
