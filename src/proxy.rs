// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Streaming proxy transfer.
//!
//! Fetches one upstream URL and relays the response to the client without
//! buffering the body: chunks are forwarded as they arrive, so memory use is
//! bounded by the transfer buffers rather than the asset size.
//!
//! The upstream status is forwarded verbatim. A 404 from the asset host is
//! the client's 404; only transport failures (DNS, connect, timeout) become
//! a 502.
//!
//! The upstream body lives inside [`TransferBody`]. Dropping it, whether the
//! stream finished, upstream broke mid-body or the client hung up, releases
//! the upstream connection and logs how the transfer ended.

use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::{Body, Bytes};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use futures_util::Stream;
use reqwest::Url;

use crate::errors::ProxyError;

/// Header carrying the exact upstream URL that was fetched.
pub const BACKEND_URL: HeaderName = HeaderName::from_static("backend-url");

/// Upstream headers relayed to the client alongside the body.
const FORWARDED_HEADERS: [HeaderName; 3] = [CONTENT_TYPE, CONTENT_LENGTH, CONTENT_DISPOSITION];

type ByteStream = Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>;

/// Relays release assets from the download host.
#[derive(Debug, Clone)]
pub struct AssetProxy {
    /// Shared HTTP client with pooled connections.
    client: reqwest::Client,
}

impl AssetProxy {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Fetch `url` once and return the upstream response ready to relay.
    ///
    /// The same `Url` is sent upstream and reported in `Backend-Url`.
    /// Fails only when no upstream response arrives at all.
    pub async fn fetch(&self, url: Url) -> Result<ProxyOutcome, ProxyError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| ProxyError::fetch(url.as_str(), e))?;

        let status = response.status();
        if status == StatusCode::OK {
            tracing::info!(url = %url, "download");
        } else {
            tracing::warn!(url = %url, status = %status, "upstream error");
        }

        let mut headers = HeaderMap::new();
        for name in FORWARDED_HEADERS {
            if let Some(value) = response.headers().get(&name) {
                headers.insert(name, value.clone());
            }
        }

        let body = TransferBody::new(url.to_string(), Box::pin(response.bytes_stream()));

        Ok(ProxyOutcome {
            url: url.to_string(),
            status,
            headers,
            body,
        })
    }
}

/// An upstream response in flight to the client.
pub struct ProxyOutcome {
    /// The URL fetched, as sent upstream.
    pub url: String,
    /// Upstream status, forwarded verbatim.
    pub status: StatusCode,
    /// Forwarded upstream headers.
    pub headers: HeaderMap,
    /// Upstream body, not yet read.
    pub body: TransferBody,
}

impl IntoResponse for ProxyOutcome {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from_stream(self.body));
        *response.status_mut() = self.status;

        let headers = response.headers_mut();
        headers.extend(self.headers);
        // `Url` serializes to ASCII, so this only fails on a malformed URL we never build.
        if let Ok(value) = HeaderValue::from_str(&self.url) {
            headers.insert(BACKEND_URL, value);
        }

        response
    }
}

/// Byte stream that counts what it relays and logs the outcome when dropped.
pub struct TransferBody {
    url: String,
    inner: ByteStream,
    bytes: u64,
    finished: bool,
}

impl TransferBody {
    fn new(url: String, inner: ByteStream) -> Self {
        Self {
            url,
            inner,
            bytes: 0,
            finished: false,
        }
    }
}

impl Stream for TransferBody {
    type Item = reqwest::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match this.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                this.bytes += chunk.len() as u64;
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => {
                tracing::error!(url = %this.url, bytes = this.bytes, error = %e, "upstream body failed");
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                this.finished = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for TransferBody {
    fn drop(&mut self) {
        if self.finished {
            tracing::debug!(url = %self.url, bytes = self.bytes, "transfer complete");
        } else {
            tracing::warn!(url = %self.url, bytes = self.bytes, "transfer aborted");
        }
    }
}
