use crate::config::EmailConfig;
use crate::database::reservation_repository::Reservation;
use crate::services::templates::access_ticket_html;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncFileTransport, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Invalid mailbox address: {0}")]
    InvalidAddress(String),
    #[error("Failed to build message: {0}")]
    MessageBuild(String),
    #[error("Mail transport failed: {0}")]
    Transport(String),
}

/// Sends the access ticket for a persisted reservation. One email per
/// call; the reservation itself is never written here, so a retry can
/// not duplicate state.
#[async_trait]
pub trait AccessTicketSender: Send + Sync {
    async fn send_access_ticket(&self, reservation: &Reservation) -> Result<(), NotificationError>;
}

enum MailTransport {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    File(AsyncFileTransport<Tokio1Executor>),
    Disabled,
}

pub struct EmailNotificationService {
    transport: MailTransport,
    from_email: String,
    from_name: String,
}

impl EmailNotificationService {
    pub fn new(config: &EmailConfig) -> Result<Self, NotificationError> {
        let transport = if !config.enabled {
            MailTransport::Disabled
        } else if let Some(dir) = &config.file_transport_dir {
            // Development transport: messages land as files instead of
            // going out over SMTP.
            let dir = Path::new(dir);
            if !dir.exists() {
                std::fs::create_dir_all(dir)
                    .map_err(|e| NotificationError::Transport(e.to_string()))?;
            }
            MailTransport::File(AsyncFileTransport::<Tokio1Executor>::new(dir))
        } else {
            let builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
                .map_err(|e| NotificationError::Transport(e.to_string()))?
                .port(config.smtp_port)
                .credentials(Credentials::new(
                    config.smtp_username.clone(),
                    config.smtp_password.clone(),
                ));
            MailTransport::Smtp(builder.build())
        };

        Ok(Self {
            transport,
            from_email: config.from_email.clone(),
            from_name: config.from_name.clone(),
        })
    }
}

#[async_trait]
impl AccessTicketSender for EmailNotificationService {
    async fn send_access_ticket(&self, reservation: &Reservation) -> Result<(), NotificationError> {
        let from = format!("{} <{}>", self.from_name, self.from_email)
            .parse::<Mailbox>()
            .map_err(|e| NotificationError::InvalidAddress(e.to_string()))?;
        let to = format!("{} <{}>", reservation.user_name, reservation.user_email)
            .parse::<Mailbox>()
            .map_err(|e| NotificationError::InvalidAddress(e.to_string()))?;

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject("Confirmation de réservation ToiletPass")
            .header(ContentType::TEXT_HTML)
            .body(access_ticket_html(reservation))
            .map_err(|e| NotificationError::MessageBuild(e.to_string()))?;

        match &self.transport {
            MailTransport::Smtp(smtp) => {
                smtp.send(message)
                    .await
                    .map_err(|e| NotificationError::Transport(e.to_string()))?;
            }
            MailTransport::File(file) => {
                file.send(message)
                    .await
                    .map_err(|e| NotificationError::Transport(e.to_string()))?;
            }
            MailTransport::Disabled => {
                warn!(
                    reservation_id = %reservation.id,
                    "email disabled, skipping access ticket"
                );
                return Ok(());
            }
        }

        info!(
            reservation_id = %reservation.id,
            to = %reservation.user_email,
            "access ticket sent"
        );

        Ok(())
    }
}
