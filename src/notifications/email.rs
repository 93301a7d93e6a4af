use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::{
    config::EmailConfig,
    error::{AppError, Result},
    notifications::{Notification, NotificationChannel, OutboundMessage},
};

pub struct EmailChannel {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl EmailChannel {
    pub fn new(config: Option<EmailConfig>) -> Result<Option<Self>> {
        let Some(config) = config.filter(|c| c.enabled) else {
            return Ok(None);
        };

        let credentials = Credentials::new(config.username.clone(), config.password.clone());
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|e| AppError::External(format!("SMTP relay error: {}", e)))?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Some(Self {
            mailer,
            from_address: config.from_address,
        }))
    }
}

#[async_trait]
impl NotificationChannel for EmailChannel {
    fn name(&self) -> &str {
        "email"
    }

    fn format(&self, notification: &Notification) -> Option<OutboundMessage> {
        let recipient = notification.booking.customer_email.clone()?;
        Some(OutboundMessage {
            recipient,
            subject: notification.subject(),
            body: notification.body(),
        })
    }

    async fn send(&self, message: &OutboundMessage) -> Result<()> {
        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|e| AppError::NotificationDeliveryFailed(format!("Invalid from address: {}", e)))?,
            )
            .to(message
                .recipient
                .parse()
                .map_err(|e| AppError::NotificationDeliveryFailed(format!("Invalid to address: {}", e)))?)
            .subject(message.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(message.body.clone())
            .map_err(|e| AppError::NotificationDeliveryFailed(format!("Failed to build email: {}", e)))?;

        self.mailer
            .send(email)
            .await
            .map_err(|e| AppError::NotificationDeliveryFailed(format!("Failed to send email: {}", e)))?;

        tracing::debug!("Email sent to {}", message.recipient);
        Ok(())
    }
}
