// Order submission (`POST {api_base}/orders/`)

use async_trait::async_trait;
use log::{info, warn};
use std::time::Duration;
use url::Url;

use super::{join_url, ApiError};
use crate::models::requests::OrderRequest;
use crate::models::responses::{ErrorBody, OrderReceipt};
use crate::utils::logging::mask_email;

/// Creates an order on the backend. Production uses `HttpOrderClient`; tests use stubs.
#[async_trait]
pub trait OrderSubmitter: Send + Sync {
    async fn create_order(&self, order: &OrderRequest) -> Result<OrderReceipt, ApiError>;
}

pub struct HttpOrderClient {
    client: reqwest::Client,
    base: Url,
}

impl HttpOrderClient {
    /// `api_base_url` may carry trailing slashes; they are ignored.
    pub fn new(api_base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let trimmed = api_base_url.trim().trim_end_matches('/');
        let base = Url::parse(trimmed)
            .map_err(|e| anyhow::anyhow!("Invalid API base URL '{}': {}", api_base_url, e))?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base })
    }

    pub fn orders_url(&self) -> Result<Url, ApiError> {
        join_url(&self.base, "orders/")
    }
}

#[async_trait]
impl OrderSubmitter for HttpOrderClient {
    async fn create_order(&self, order: &OrderRequest) -> Result<OrderReceipt, ApiError> {
        let url = self.orders_url()?;
        info!(
            "[PHASE: submit] [STEP: create_order] POST {} (customer: {}, variant: {:?}, period: {:?})",
            url,
            mask_email(&order.email),
            order.plan_variant,
            order.plan_period
        );

        // Not retried: order creation is not idempotent.
        let resp = self
            .client
            .post(url.clone())
            .json(order)
            .send()
            .await
            .map_err(|source| ApiError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = resp.status();
        if !status.is_success() {
            let reason = status.canonical_reason().unwrap_or("Unknown error").to_string();
            let detail = resp
                .json::<ErrorBody>()
                .await
                .ok()
                .and_then(|b| b.detail_text())
                .unwrap_or(reason);
            warn!(
                "[PHASE: submit] [STEP: create_order] Order API error {}: {}",
                status.as_u16(),
                detail
            );
            return Err(ApiError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                detail,
            });
        }

        let receipt = resp
            .json::<OrderReceipt>()
            .await
            .map_err(|e| ApiError::InvalidResponse {
                url: url.to_string(),
                reason: format!("order creation failed: {}", e),
            })?;

        info!(
            "[PHASE: submit] [STEP: create_order] Order created: {}",
            receipt.order_id
        );
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orders_url_ignores_trailing_slashes() {
        let client =
            HttpOrderClient::new("https://api.fitplan.example/v1///", Duration::from_secs(5))
                .expect("client");
        assert_eq!(
            client.orders_url().expect("url").as_str(),
            "https://api.fitplan.example/v1/orders/"
        );
    }

    #[test]
    fn rejects_unparsable_base() {
        assert!(HttpOrderClient::new("not a url", Duration::from_secs(5)).is_err());
    }
}
