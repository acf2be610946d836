// ABOUTME: Minimal HTTP/1.1 client over hyper for probes and the proxy admin API.
// ABOUTME: One connection per request, every request bounded by a timeout.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper_util::rt::TokioIo;
use serde::de::DeserializeOwned;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("invalid URL {0}: only http://host:port[/path] is supported")]
    InvalidUrl(String),

    #[error("cannot connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("request to {address}{path} failed: {source}")]
    Request {
        address: String,
        path: String,
        #[source]
        source: hyper::Error,
    },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("request to {address}{path} timed out after {timeout:?}")]
    Timeout {
        address: String,
        path: String,
        timeout: Duration,
    },

    #[error("JSON error: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, HttpError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Split `http://host:port/base` into (`host:port`, `/base`).
pub fn split_url(url: &str) -> Result<(String, String), HttpError> {
    let rest = url
        .strip_prefix("http://")
        .ok_or_else(|| HttpError::InvalidUrl(url.to_string()))?;
    let (authority, path) = match rest.find('/') {
        Some(i) => (&rest[..i], &rest[i..]),
        None => (rest, ""),
    };
    if authority.is_empty() {
        return Err(HttpError::InvalidUrl(url.to_string()));
    }
    let address = if authority.contains(':') {
        authority.to_string()
    } else {
        format!("{authority}:80")
    };
    Ok((address, path.trim_end_matches('/').to_string()))
}

#[derive(Debug, Clone)]
pub struct HttpClient {
    timeout: Duration,
}

impl HttpClient {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub async fn get(&self, address: &str, path: &str) -> Result<HttpResponse, HttpError> {
        self.send("GET", address, path, None).await
    }

    pub async fn patch_json<T: serde::Serialize>(
        &self,
        address: &str,
        path: &str,
        body: &T,
    ) -> Result<HttpResponse, HttpError> {
        let body = serde_json::to_vec(body)?;
        self.send("PATCH", address, path, Some(body)).await
    }

    async fn send(
        &self,
        method: &str,
        address: &str,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> Result<HttpResponse, HttpError> {
        let request = self.request(method, address, path, body);
        match tokio::time::timeout(self.timeout, request).await {
            Ok(result) => result,
            Err(_) => Err(HttpError::Timeout {
                address: address.to_string(),
                path: path.to_string(),
                timeout: self.timeout,
            }),
        }
    }

    async fn request(
        &self,
        method: &str,
        address: &str,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> Result<HttpResponse, HttpError> {
        let request_err = |source| HttpError::Request {
            address: address.to_string(),
            path: path.to_string(),
            source,
        };

        let stream = tokio::net::TcpStream::connect(address)
            .await
            .map_err(|source| HttpError::Connect {
                address: address.to_string(),
                source,
            })?;

        let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
            .await
            .map_err(request_err)?;

        tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::debug!("http connection closed: {}", e);
            }
        });

        let mut builder = hyper::Request::builder()
            .method(method)
            .uri(if path.is_empty() { "/" } else { path })
            .header("host", address)
            .header("user-agent", concat!("releasegate/", env!("CARGO_PKG_VERSION")));
        if body.is_some() {
            builder = builder.header("content-type", "application/json");
        }
        let req = builder
            .body(Full::new(Bytes::from(body.unwrap_or_default())))
            .map_err(|e| HttpError::InvalidRequest(e.to_string()))?;

        let resp = sender.send_request(req).await.map_err(request_err)?;
        let status = resp.status().as_u16();
        let body = resp
            .into_body()
            .collect()
            .await
            .map_err(request_err)?
            .to_bytes();

        tracing::debug!(%method, %address, %path, status, "http response");
        Ok(HttpResponse { status, body })
    }
}
