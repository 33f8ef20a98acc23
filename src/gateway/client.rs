use std::time::Duration;

use reqwest::Client;

use super::error::GatewayError;
use super::types::{Action, Payload, RemoteReply, WebhookRequest};

pub const WEBHOOK_URL: &str = "https://weebkarasek.farolbase.com/webhook/paranaappgrana";

/// Sends one action to the remote service and returns its reply.
///
/// Exactly one request/response exchange per call; no retries.
#[allow(async_fn_in_trait)]
pub trait RemoteGateway {
    async fn send(&self, action: Action, payload: &Payload) -> Result<RemoteReply, GatewayError>;
}

/// HTTP implementation of [`RemoteGateway`] posting JSON to a webhook.
pub struct WebhookClient {
    client: Client,
    base_url: String,
}

impl WebhookClient {
    pub fn new() -> Result<Self, GatewayError> {
        Self::with_base_url(WEBHOOK_URL.to_string())
    }

    /// Create a client pointing at a custom webhook URL (useful for testing).
    pub fn with_base_url(base_url: String) -> Result<Self, GatewayError> {
        Self::with_timeouts(base_url, Duration::from_secs(10), None)
    }

    /// `request_timeout` of `None` leaves an outstanding call unbounded.
    pub fn with_timeouts(
        base_url: String,
        connect_timeout: Duration,
        request_timeout: Option<Duration>,
    ) -> Result<Self, GatewayError> {
        let mut builder = Client::builder().connect_timeout(connect_timeout);
        if let Some(timeout) = request_timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            base_url,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl RemoteGateway for WebhookClient {
    async fn send(&self, action: Action, payload: &Payload) -> Result<RemoteReply, GatewayError> {
        let body = WebhookRequest { action, payload };
        tracing::debug!(%action, url = %self.base_url, "posting to webhook");

        let response = self
            .client
            .post(&self.base_url)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(%action, status = status.as_u16(), "webhook returned failure status");
            return Err(GatewayError::Http {
                status: status.as_u16(),
            });
        }

        let text = response.text().await?;
        let reply = serde_json::from_str::<RemoteReply>(&text)?;
        Ok(reply)
    }
}
