use crate::decoder::{decode_body, ContentEncoding};
use crate::extractor::RequestBlock;
use crate::utils::Result;

use anyhow::Context;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, CONTENT_ENCODING, CONTENT_TYPE},
    Certificate, Client, StatusCode,
};
use std::collections::HashMap;
use std::fmt::Debug;

const JSON_CONTENT_TYPE: &str = "application/json";

pub trait HttpConnectionProfile {
    fn host(&self) -> &str;
    fn insecure(&self) -> bool;
    fn ca_cert(&self) -> Option<&str>;
    fn headers(&self) -> &HashMap<String, String>;
}

#[derive(Debug)]
pub struct HttpResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: String,
}

impl HttpResponse {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

/// Sends request blocks to the search endpoint of one log store.
pub struct HttpClient {
    client: Client,
    host: String,
}

impl Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("host", &self.host)
            .finish()
    }
}

impl HttpClient {
    pub fn new(profile: &impl HttpConnectionProfile) -> Result<Self> {
        Ok(HttpClient {
            client: Self::build_client(profile)?,
            host: profile.host().trim_end_matches('/').to_string(),
        })
    }

    pub fn search_url(&self, block: &RequestBlock) -> String {
        format!("{}{}", self.host, block.search_path())
    }

    /// Posts the block body to `<host>/<target>/_search`.
    ///
    /// The head line's method is not used: every block is a search, so it
    /// always goes out as a POST. A body that is not valid JSON is rejected
    /// before anything is sent.
    pub async fn search(&self, block: &RequestBlock) -> Result<HttpResponse> {
        block
            .body_json()
            .context("Invalid request body, expected JSON")?;

        let url = self.search_url(block);
        tracing::debug!("{} {} (sent as POST)", block.method(), url);

        let res = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .body(block.body_text().to_string())
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", url))?;

        let status = res.status();
        let headers = res.headers().clone();
        let body_bytes = res.bytes().await?;
        let encoding = ContentEncoding::from_header(
            headers
                .get(CONTENT_ENCODING)
                .and_then(|v| v.to_str().ok()),
        );
        let body = decode_body(&body_bytes, encoding)?;
        tracing::debug!("{} returned {} ({} bytes)", url, status, body.len());

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }

    fn build_client(profile: &impl HttpConnectionProfile) -> Result<Client> {
        let insecure_access = profile.insecure();
        let mut cli_builder = Client::builder()
            .danger_accept_invalid_certs(insecure_access)
            .danger_accept_invalid_hostnames(insecure_access);

        if let Some(ca_cert) = profile.ca_cert() {
            let ca_cert = shellexpand::tilde(ca_cert).to_string();
            let pem = std::fs::read(&ca_cert)
                .with_context(|| format!("Failed to read CA certificate {}", ca_cert))?;
            let cert = Certificate::from_pem(&pem)?;
            cli_builder = cli_builder.use_rustls_tls().add_root_certificate(cert);
        }

        if !profile.headers().is_empty() {
            let headers = profile
                .headers()
                .iter()
                .map(|(key, value)| -> Result<(HeaderName, HeaderValue)> {
                    let name = HeaderName::from_bytes(key.as_bytes())
                        .with_context(|| format!("Invalid header name: {}", key))?;
                    let value = HeaderValue::from_str(value)
                        .with_context(|| format!("Invalid value for header {}", key))?;
                    Ok((name, value))
                })
                .collect::<Result<HeaderMap>>()?;
            cli_builder = cli_builder.default_headers(headers);
        }

        Ok(cli_builder.build()?)
    }
}
