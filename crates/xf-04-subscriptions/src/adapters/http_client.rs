//! REST client for the RIC subscription service.
//!
//! ```text
//! POST   {base}/subscriptions          201 {"subscriptionId": 7}
//! DELETE {base}/subscriptions/{id}     204
//! ```
//!
//! Refused connections and timeouts are retried here, `connect_attempts`
//! times. Any HTTP error status is a definitive rejection.

use crate::domain::{ClientError, LocalId, RemoteId, SubscriptionRequest};
use crate::ports::outbound::SubscriptionClient;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use shared_types::{Endpoint, TransactionId};
use std::time::Duration;
use tracing::{debug, warn};

/// HTTP client settings.
#[derive(Clone, Debug)]
pub struct HttpClientConfig {
    /// Base URL including the API prefix, e.g. `http://submgr:8088/ric/v1`.
    pub base_url: String,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    /// Total attempts when the service cannot be reached.
    pub connect_attempts: u32,
    pub connect_retry_delay: Duration,
    /// Where the service should send notifications, `name:port`. Sent with
    /// every create request.
    pub client_endpoint: Option<String>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://service-ricplt-submgr-http.ricplt:8088/ric/v1".to_string(),
            request_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(2),
            connect_attempts: 3,
            connect_retry_delay: Duration::from_millis(200),
            client_endpoint: None,
        }
    }
}

impl HttpClientConfig {
    /// Base URL for a subscription service reached through `endpoint`'s
    /// control port.
    #[must_use]
    pub fn base_url_for(endpoint: &Endpoint) -> String {
        format!("http://{}:{}/ric/v1", endpoint.host, endpoint.control_port)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateBody<'a> {
    #[serde(flatten)]
    request: &'a SubscriptionRequest,
    transaction_id: &'a TransactionId,
    local_id: LocalId,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_endpoint: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateResponse {
    #[serde(default)]
    subscription_id: Option<u64>,
}

/// [`SubscriptionClient`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpSubscriptionClient {
    client: Client,
    config: HttpClientConfig,
}

impl HttpSubscriptionClient {
    /// # Errors
    /// `Protocol` if the HTTP client cannot be built.
    pub fn new(config: HttpClientConfig) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| ClientError::Protocol(e.to_string()))?;
        Ok(Self { client, config })
    }

    #[must_use]
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Send the request built by `build`, retrying while the service cannot
    /// be reached.
    async fn send<F>(&self, build: F) -> Result<reqwest::Response, ClientError>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let attempts = self.config.connect_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match build().send().await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_connect() || e.is_timeout() => {
                    if attempt >= attempts {
                        return Err(ClientError::Unreachable {
                            attempts: attempt,
                            message: e.to_string(),
                        });
                    }
                    debug!(attempt = attempt, error = %e, "Subscription service unreachable, retrying");
                    tokio::time::sleep(self.config.connect_retry_delay).await;
                }
                Err(e) => return Err(ClientError::Protocol(e.to_string())),
            }
        }
    }

    async fn rejection(response: reqwest::Response) -> ClientError {
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        warn!(status = status, message = %message, "Subscription service rejected request");
        ClientError::Rejected { status, message }
    }
}

#[async_trait]
impl SubscriptionClient for HttpSubscriptionClient {
    async fn create(
        &self,
        local_id: LocalId,
        transaction_id: &TransactionId,
        request: &SubscriptionRequest,
    ) -> Result<Option<RemoteId>, ClientError> {
        let body = CreateBody {
            request,
            transaction_id,
            local_id,
            client_endpoint: self.config.client_endpoint.as_deref(),
        };
        let url = self.url("/subscriptions");
        let response = self.send(|| self.client.post(&url).json(&body)).await?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(Self::rejection(response).await);
        }
        if !status.is_success() {
            return Err(ClientError::Protocol(format!("unexpected status {status}")));
        }

        let accepted: CreateResponse = if status == StatusCode::NO_CONTENT {
            CreateResponse {
                subscription_id: None,
            }
        } else {
            response
                .json()
                .await
                .map_err(|e| ClientError::Protocol(e.to_string()))?
        };
        debug!(local_id = %local_id, remote_id = ?accepted.subscription_id, "Create accepted");
        Ok(accepted.subscription_id.map(RemoteId))
    }

    async fn delete(
        &self,
        local_id: LocalId,
        transaction_id: &TransactionId,
        remote_id: RemoteId,
    ) -> Result<(), ClientError> {
        let url = self.url(&format!("/subscriptions/{remote_id}"));
        let response = self
            .send(|| {
                self.client
                    .delete(&url)
                    .header("X-Transaction-Id", transaction_id.as_str())
            })
            .await?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(Self::rejection(response).await);
        }
        if !status.is_success() {
            return Err(ClientError::Protocol(format!("unexpected status {status}")));
        }
        debug!(local_id = %local_id, remote_id = %remote_id, "Delete accepted");
        Ok(())
    }
}
