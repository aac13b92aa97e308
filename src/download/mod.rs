pub mod resolve;
pub mod video;

use std::time::Duration;

use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::Response;
use tracing::debug;
use url::Url;

use crate::{error::FetchError, options::Options};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; rv:78.0) Gecko/20100101 Firefox/78.0";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared HTTP client handed to every stage of a download session.
///
/// Cloning is cheap; clones share the same connection pool.
#[derive(Clone)]
pub struct DownloadClient {
    client: reqwest::Client,
}

impl DownloadClient {
    pub fn new(options: &Options) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(options.request_timeout)
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self { client })
    }

    async fn send(
        &self,
        url: &Url,
        request: reqwest::RequestBuilder,
    ) -> Result<Response, FetchError> {
        let response = request.send().await.map_err(|source| FetchError::Network {
            url: url.to_string(),
            source,
        })?;

        let status = response.status();
        debug!(%url, %status, "response received");
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status,
            });
        }

        Ok(response)
    }

    pub async fn head(&self, url: &Url) -> Result<HeaderMap, FetchError> {
        let response = self.send(url, self.client.head(url.as_str())).await?;

        Ok(response.headers().clone())
    }

    pub async fn download(&self, url: &Url) -> Result<Bytes, FetchError> {
        self.download_header(url, &HeaderMap::new()).await
    }

    pub async fn download_header(
        &self,
        url: &Url,
        headers: &HeaderMap,
    ) -> Result<Bytes, FetchError> {
        let request = self.client.get(url.as_str()).headers(headers.to_owned());
        let response = self.send(url, request).await?;

        response.bytes().await.map_err(|source| FetchError::Read {
            url: url.to_string(),
            source,
        })
    }
}
