//! HTTP plumbing for model endpoints.

use reqwest::{Client, RequestBuilder};
use tracing::debug;

use crate::client::ClientError;
use crate::options::TransportOptions;

/// Build a configured HTTP client from transport options.
pub fn build_http_client(transport_options: &TransportOptions) -> Result<Client, ClientError> {
    let mut builder = Client::builder();

    match transport_options {
        TransportOptions::Http { timeout, proxy, .. } => {
            if let Some(t) = timeout {
                builder = builder.timeout(*t);
            }
            if let Some(proxy_url) = proxy {
                let proxy = reqwest::Proxy::all(proxy_url)
                    .map_err(|e| ClientError::Config(format!("invalid proxy {}: {}", proxy_url, e)))?;
                builder = builder.proxy(proxy);
            }
        }
    }

    Ok(builder.build()?)
}

/// Apply the extra headers configured in the transport options.
pub fn add_extra_headers(
    mut request: RequestBuilder,
    transport_options: &TransportOptions,
) -> RequestBuilder {
    let TransportOptions::Http { headers, .. } = transport_options;
    for (key, value) in headers.iter().flatten() {
        request = request.header(key, value);
    }
    request
}

pub trait RequestBuilderExt {
    /// Set a JSON body, logging it at debug level.
    fn json_logged<T: serde::Serialize + ?Sized>(self, json: &T) -> Self;
}

impl RequestBuilderExt for RequestBuilder {
    fn json_logged<T: serde::Serialize + ?Sized>(self, json: &T) -> Self {
        if let Ok(body) = serde_json::to_string_pretty(json) {
            debug!("Model request body ({} bytes):\n{}", body.len(), body);
        }
        self.json(json)
    }
}

#[async_trait::async_trait]
pub trait ResponseExt {
    async fn text_logged(self) -> Result<String, ClientError>;

    async fn json_logged<T: serde::de::DeserializeOwned>(self) -> Result<T, ClientError>;
}

#[async_trait::async_trait]
impl ResponseExt for reqwest::Response {
    async fn text_logged(self) -> Result<String, ClientError> {
        let text = self.text().await?;
        debug!("Model response ({} bytes):\n{}", text.len(), text);
        Ok(text)
    }

    async fn json_logged<T: serde::de::DeserializeOwned>(self) -> Result<T, ClientError> {
        let text = self.text_logged().await?;
        Ok(serde_json::from_str(&text)?)
    }
}
