//! The HTTP collaborator.
//!
//! The [`Transport`] trait is all the client needs: `get`, `post` and
//! `post_with_headers`, each returning the response bytes. A streaming
//! `post` is handed the [`Dialect`] to decode with and returns the
//! already-flattened text instead of the raw event stream.
//!
//! [`HttpTransport`] is the `reqwest` implementation. Tests substitute an
//! in-process fake.

use super::retry::{RetryConfig, with_retry};
use super::streaming::{Dialect, StreamDecoder};
use crate::config::ClientConfig;
use crate::error::TransportError;
use futures::future::BoxFuture;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Header name → value, in a stable order.
pub type Headers = BTreeMap<String, String>;

/// Future returned by every [`Transport`] call.
pub type TransportFuture<'a> = BoxFuture<'a, Result<Vec<u8>, TransportError>>;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const CONTENT_TYPE_JSON: &str = "application/json";

pub trait Transport: Send + Sync {
    fn get<'a>(&'a self, url: &'a str) -> TransportFuture<'a>;

    /// POST a JSON body. With `stream` set, the response is decoded with
    /// that dialect and the flattened text is returned.
    fn post<'a>(&'a self, url: &'a str, body: Vec<u8>, stream: Option<Dialect>)
    -> TransportFuture<'a>;

    /// POST with caller-supplied headers (multipart uploads, third-party APIs).
    fn post_with_headers<'a>(
        &'a self,
        url: &'a str,
        body: Vec<u8>,
        headers: Headers,
    ) -> TransportFuture<'a>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn get<'a>(&'a self, url: &'a str) -> TransportFuture<'a> {
        (**self).get(url)
    }

    fn post<'a>(
        &'a self,
        url: &'a str,
        body: Vec<u8>,
        stream: Option<Dialect>,
    ) -> TransportFuture<'a> {
        (**self).post(url, body, stream)
    }

    fn post_with_headers<'a>(
        &'a self,
        url: &'a str,
        body: Vec<u8>,
        headers: Headers,
    ) -> TransportFuture<'a> {
        (**self).post_with_headers(url, body, headers)
    }
}

// ── reqwest implementation ─────────────────────────────────────────

/// [`Transport`] over `reqwest`.
pub struct HttpTransport {
    client: reqwest::Client,
    auth_header: String,
    auth_value: String,
    custom_headers: Headers,
    retry: RetryConfig,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| TransportError::Other(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            auth_header: config.auth_header.clone(),
            auth_value: format!("{}{}", config.auth_token_prefix, config.api_key),
            custom_headers: config.custom_headers.clone(),
            retry: RetryConfig::default(),
        })
    }

    /// Retry transient failures on non-streaming calls.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    fn is_reserved(&self, name: &str) -> bool {
        name.eq_ignore_ascii_case(&self.auth_header)
            || name.eq_ignore_ascii_case("user-agent")
            || name.eq_ignore_ascii_case("content-type")
    }

    /// Configured custom headers, minus any that would shadow a standard one.
    fn apply_custom(&self, mut req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        for (name, value) in &self.custom_headers {
            if self.is_reserved(name) {
                debug!(header = %name, "ignoring custom header that overrides a standard one");
                continue;
            }
            req = req.header(name.as_str(), value.as_str());
        }
        req
    }

    fn standard(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        self.apply_custom(req)
            .header(self.auth_header.as_str(), self.auth_value.as_str())
            .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE_JSON)
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<reqwest::Response, TransportError> {
        let start = Instant::now();
        let resp = req
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let status = resp.status();
        debug!(
            "HTTP {} in {:.1}s",
            status,
            start.elapsed().as_secs_f64()
        );
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TransportError::Http {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }

    async fn read_body(&self, req: reqwest::RequestBuilder) -> Result<Vec<u8>, TransportError> {
        let resp = self.send(req).await?;
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| TransportError::Request(format!("failed to read response: {e}")))?;
        Ok(bytes.to_vec())
    }

    async fn read_stream(
        &self,
        req: reqwest::RequestBuilder,
        dialect: Dialect,
    ) -> Result<Vec<u8>, TransportError> {
        let mut resp = self.send(req).await?;
        let mut decoder = StreamDecoder::new(dialect);

        // Incremental reads so long replies don't hit a single-body timeout.
        while let Some(chunk) = resp
            .chunk()
            .await
            .map_err(|e| TransportError::Request(format!("failed to read streaming chunk: {e}")))?
        {
            decoder.feed_bytes(&chunk);
            if decoder.is_done() {
                break;
            }
        }

        let output = decoder.finish();
        debug!("stream completed ({} bytes decoded)", output.len());
        Ok(output.into_bytes())
    }
}

impl Transport for HttpTransport {
    fn get<'a>(&'a self, url: &'a str) -> TransportFuture<'a> {
        Box::pin(async move {
            with_retry(&self.retry, || self.read_body(self.standard(self.client.get(url)))).await
        })
    }

    fn post<'a>(
        &'a self,
        url: &'a str,
        body: Vec<u8>,
        stream: Option<Dialect>,
    ) -> TransportFuture<'a> {
        Box::pin(async move {
            match stream {
                Some(dialect) => {
                    let req = self.standard(self.client.post(url)).body(body);
                    self.read_stream(req, dialect).await
                }
                None => {
                    with_retry(&self.retry, || {
                        self.read_body(self.standard(self.client.post(url)).body(body.clone()))
                    })
                    .await
                }
            }
        })
    }

    fn post_with_headers<'a>(
        &'a self,
        url: &'a str,
        body: Vec<u8>,
        headers: Headers,
    ) -> TransportFuture<'a> {
        Box::pin(async move {
            with_retry(&self.retry, || {
                let mut req = self.apply_custom(self.client.post(url));
                for (name, value) in &headers {
                    req = req.header(name.as_str(), value.as_str());
                }
                self.read_body(req.body(body.clone()))
            })
            .await
        })
    }
}
