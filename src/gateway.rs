use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AppConfig;

/// One entry of the purchase manifest sent to the payment provider.
/// `unit_price` is in minor currency units, like every price in the system.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PreferenceItem {
    pub title: String,
    pub quantity: i32,
    pub unit_price: i64,
    pub currency_id: String,
}

/// Redirect targets the provider calls back after the payer finishes.
#[derive(Debug, Clone, Serialize)]
pub struct BackUrls {
    pub success: String,
    pub failure: String,
    pub pending: String,
}

impl BackUrls {
    /// The three callbacks are fixed paths under one configured base.
    pub fn from_base(base: &str) -> Self {
        Self {
            success: format!("{base}/success"),
            failure: format!("{base}/failure"),
            pending: format!("{base}/pending"),
        }
    }
}

/// A created payment preference: the provider-side id and the redirect
/// link the payer must follow.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentPreference {
    pub id: String,
    pub init_point: String,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("gateway rejected the preference: status {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_preference(
        &self,
        items: &[PreferenceItem],
        back_urls: &BackUrls,
    ) -> Result<PaymentPreference, GatewayError>;
}

#[derive(Serialize)]
struct CreatePreferenceBody<'a> {
    items: &'a [PreferenceItem],
    back_urls: &'a BackUrls,
    auto_return: &'static str,
}

/// Checkout-Pro style HTTP gateway. The client is built once at startup with
/// a bounded timeout; a timed-out call surfaces as a `GatewayError`.
pub struct CheckoutProGateway {
    client: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl CheckoutProGateway {
    pub fn new(config: &AppConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.gateway_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.gateway_base_url.trim_end_matches('/').to_string(),
            access_token: config.gateway_access_token.clone(),
        })
    }
}

#[async_trait]
impl PaymentGateway for CheckoutProGateway {
    async fn create_preference(
        &self,
        items: &[PreferenceItem],
        back_urls: &BackUrls,
    ) -> Result<PaymentPreference, GatewayError> {
        let url = format!("{}/checkout/preferences", self.base_url);
        let body = CreatePreferenceBody {
            items,
            back_urls,
            auto_return: "approved",
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let preference = response.json::<PaymentPreference>().await?;
        Ok(preference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn back_urls_share_one_base() {
        let urls = BackUrls::from_base("https://shop.example/cart");
        assert_eq!(urls.success, "https://shop.example/cart/success");
        assert_eq!(urls.failure, "https://shop.example/cart/failure");
        assert_eq!(urls.pending, "https://shop.example/cart/pending");
    }
}
