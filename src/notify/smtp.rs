//! SMTP notifier — outbound scheduling emails via lettre.

use async_trait::async_trait;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use tracing::info;

use crate::config::SmtpConfig;
use crate::error::NotifyError;
use crate::notify::{Invite, Notifier, invite_body, invite_subject};

/// SMTP transport for scheduling emails.
pub struct SmtpNotifier {
    config: SmtpConfig,
}

impl SmtpNotifier {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    fn send_email(&self, invite: &Invite) -> Result<(), NotifyError> {
        let creds = Credentials::new(
            self.config.username.clone(),
            self.config.password.clone(),
        );

        let transport = SmtpTransport::relay(&self.config.host)
            .map_err(|e| NotifyError::Send(format!("SMTP relay error: {e}")))?
            .port(self.config.port)
            .credentials(creds)
            .build();

        let email = Message::builder()
            .from(self.config.from_address.parse().map_err(|e| {
                NotifyError::Send(format!("Invalid from address: {e}"))
            })?)
            .to(invite.candidate_email.parse().map_err(|e| {
                NotifyError::Send(format!("Invalid recipient address: {e}"))
            })?)
            .subject(invite_subject(invite))
            .body(invite_body(invite))
            .map_err(|e| NotifyError::Send(format!("Failed to build email: {e}")))?;

        transport.send(&email).map_err(classify_smtp_error)?;
        info!(to = %invite.candidate_email, round = %invite.round_name, "Email sent");
        Ok(())
    }
}

/// Map an SMTP failure onto the notifier taxonomy. Transient 4yz
/// responses and quota/rate-limit phrasings mean the server is pushing
/// back on volume; everything else is an ordinary send failure.
fn classify_smtp_error(e: lettre::transport::smtp::Error) -> NotifyError {
    use lettre::transport::smtp::response::Severity;

    let transient = e
        .status()
        .map(|code| code.severity == Severity::TransientNegativeCompletion)
        .unwrap_or(false);
    let message = e.to_string();
    let lowered = message.to_ascii_lowercase();
    if transient
        || lowered.contains("quota")
        || lowered.contains("rate limit")
        || lowered.contains("too many")
    {
        NotifyError::QuotaExceeded
    } else {
        NotifyError::Send(message)
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, invite: &Invite) -> Result<(), NotifyError> {
        self.send_email(invite)
    }
}
