use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

use crate::{
    config::WhatsAppConfig,
    error::{AppError, Result},
    notifications::{Notification, NotificationChannel, OutboundMessage},
};

/// Sends plain-text messages through an HTTP WhatsApp gateway.
pub struct WhatsAppChannel {
    client: reqwest::Client,
    config: WhatsAppConfig,
}

#[derive(Serialize)]
struct GatewayRequest<'a> {
    target: &'a str,
    message: &'a str,
    #[serde(rename = "countryCode")]
    country_code: &'a str,
}

impl WhatsAppChannel {
    pub fn new(config: Option<WhatsAppConfig>) -> Result<Option<Self>> {
        let Some(config) = config.filter(|c| c.enabled) else {
            return Ok(None);
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::External(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Some(Self { client, config }))
    }
}

#[async_trait]
impl NotificationChannel for WhatsAppChannel {
    fn name(&self) -> &str {
        "whatsapp"
    }

    fn format(&self, notification: &Notification) -> Option<OutboundMessage> {
        let recipient = normalize_phone(&notification.booking.customer_phone, &self.config.country_code)?;
        Some(OutboundMessage {
            recipient,
            subject: notification.subject(),
            body: format!("*{}*\n\n{}", notification.subject(), notification.body()),
        })
    }

    async fn send(&self, message: &OutboundMessage) -> Result<()> {
        let request = GatewayRequest {
            target: &message.recipient,
            message: &message.body,
            country_code: &self.config.country_code,
        };

        let response = self
            .client
            .post(&self.config.api_url)
            .header(reqwest::header::AUTHORIZATION, &self.config.token)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::NotificationDeliveryFailed(format!("gateway request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::NotificationDeliveryFailed(format!(
                "gateway returned {}: {}",
                status, body
            )));
        }

        tracing::debug!("WhatsApp message sent to {}", message.recipient);
        Ok(())
    }
}

/// Digits only, in international form without the `+`.
///
/// A leading `0` is replaced by `country_code`; a number that does not
/// already start with the country code gets it prepended. Returns `None`
/// when no digits remain.
pub fn normalize_phone(phone: &str, country_code: &str) -> Option<String> {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }

    if let Some(rest) = digits.strip_prefix('0') {
        return Some(format!("{}{}", country_code, rest));
    }
    if digits.starts_with(country_code) {
        return Some(digits);
    }
    Some(format!("{}{}", country_code, digits))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_leading_zero() {
        assert_eq!(normalize_phone("081234567890", "62").as_deref(), Some("6281234567890"));
    }

    #[test]
    fn test_normalize_strips_formatting() {
        assert_eq!(normalize_phone("+62 812-3456-7890", "62").as_deref(), Some("6281234567890"));
        assert_eq!(normalize_phone("(0812) 3456 7890", "62").as_deref(), Some("6281234567890"));
    }

    #[test]
    fn test_normalize_prefixes_missing_country_code() {
        assert_eq!(normalize_phone("81234567890", "62").as_deref(), Some("6281234567890"));
    }

    #[test]
    fn test_normalize_empty() {
        assert_eq!(normalize_phone("", "62"), None);
        assert_eq!(normalize_phone("n/a", "62"), None);
    }

    #[test]
    fn test_disabled_config_builds_nothing() {
        let config = WhatsAppConfig {
            enabled: false,
            api_url: "http://localhost".to_string(),
            token: "t".to_string(),
            country_code: "62".to_string(),
            timeout_secs: 1,
        };
        assert!(WhatsAppChannel::new(Some(config)).unwrap().is_none());
        assert!(WhatsAppChannel::new(None).unwrap().is_none());
    }
}
