//! One-shot HTTP calls: get, set and invoke
//!
//! These go over plain HTTP(S) with Basic credentials, independent of the
//! subscription socket. The server never answers a set with a response, so
//! [`HttpClient::set_value`] gives up waiting after a short, bounded delay
//! and treats that as success.

use url::Url;

use crate::codec::strip_sys;
use crate::config::ServerConfig;
use crate::error::{Result, ServerError};

/// Convert `sys://Home/...` to `http(s)://host:port/sys/Home/...`
pub fn url_from_sys_uri(config: &ServerConfig, sys_uri: &str) -> String {
    format!("{}/sys/{}", config.base_url(), strip_sys(sys_uri))
}

/// Stateless one-shot client
#[derive(Debug, Clone, Default)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a property value: `GET <location>!<property>`
    pub async fn get_value(&self, config: &ServerConfig, location: &str, property: &str) -> Result<String> {
        let url = parse_url(format!("{}!{}", url_from_sys_uri(config, location), property))?;
        tracing::debug!("GetValue: {}", url);

        let response = self
            .client
            .get(url)
            .basic_auth(&config.username, Some(&config.password))
            .timeout(config.request_timeout)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.text().await?)
    }

    /// Write a property value: `POST <location>?e?<property>` with the value as body
    ///
    /// Returns once the server answers or `set_response_timeout` elapses,
    /// whichever comes first. The request keeps running in the background
    /// after the wait is abandoned, bounded by `request_timeout`.
    pub async fn set_value(
        &self,
        config: &ServerConfig,
        location: &str,
        property: &str,
        value: &str,
    ) -> Result<()> {
        let url = parse_url(format!("{}?e?{}", url_from_sys_uri(config, location), property))?;
        tracing::debug!("SetValue: {}: {}", url, value);

        let request = self
            .client
            .post(url)
            .basic_auth(&config.username, Some(&config.password))
            .timeout(config.request_timeout)
            .body(value.to_string());

        let send = tokio::spawn(async move {
            let result = request.send().await.and_then(|r| r.error_for_status());
            if let Err(e) = &result {
                tracing::debug!("SetValue request ended with error: {}", e);
            }
            result.map(|_| ())
        });

        match tokio::time::timeout(config.set_response_timeout, send).await {
            Ok(Ok(result)) => result.map_err(ServerError::from),
            Ok(Err(join_error)) => {
                tracing::warn!("SetValue request task failed: {}", join_error);
                Ok(())
            }
            Err(_) => {
                tracing::trace!(
                    "SetValue: no response within {:?}, not waiting further",
                    config.set_response_timeout
                );
                Ok(())
            }
        }
    }

    /// Invoke a method: `GET <location>?d??<method>`
    pub async fn invoke_method(&self, config: &ServerConfig, location: &str, method: &str) -> Result<String> {
        let url = parse_url(format!("{}?d??{}", url_from_sys_uri(config, location), method))?;
        tracing::debug!("InvokeMethod: {}", url);

        let response = self
            .client
            .get(url)
            .basic_auth(&config.username, Some(&config.password))
            .timeout(config.request_timeout)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.text().await?)
    }
}

fn parse_url(raw: String) -> Result<Url> {
    Url::parse(&raw).map_err(|e| ServerError::InvalidLocation(format!("{}: {}", raw, e)))
}
