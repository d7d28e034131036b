use crate::{Error, Result};
use async_trait::async_trait;
use url::Url;

/// What the protocol layer sees of HTTP: a status code and a body. The
/// agent interprets both; the transport never does.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Send bytes, get a status code and bytes back. Implementations carry
/// the connection pool, TLS and whatever else lives below the protocol.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(&self, path: &str, body: Vec<u8>) -> Result<TransportResponse>;
    async fn get(&self, path: &str) -> Result<TransportResponse>;
}

/// The bundled transport: reqwest against a fixed base URL.
pub struct ReqwestTransport {
    base_url: Url,
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(base_url: &str) -> Result<Self> {
        // a trailing slash keeps Url::join from eating the last segment
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        let base_url = Url::parse(&normalized)
            .map_err(|err| Error::Transport(format!("invalid base url {}: {}", base_url, err)))?;
        Ok(ReqwestTransport {
            base_url,
            client: reqwest::Client::new(),
        })
    }

    fn resolve(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|err| Error::Transport(format!("invalid request path {}: {}", path, err)))
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn post(&self, path: &str, body: Vec<u8>) -> Result<TransportResponse> {
        let response = self
            .client
            .post(self.resolve(path)?)
            .header(reqwest::header::CONTENT_TYPE, "application/cbor")
            .body(body)
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();
        Ok(TransportResponse { status, body })
    }

    async fn get(&self, path: &str) -> Result<TransportResponse> {
        let response = self.client.get(self.resolve(path)?).send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();
        Ok(TransportResponse { status, body })
    }
}
