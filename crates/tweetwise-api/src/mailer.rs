use anyhow::{Context, Result};
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

/// Outbound mail for password resets. Without SMTP configuration the
/// reset link is logged instead of sent, so local development needs no
/// mail server.
pub struct Mailer {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from: Mailbox,
}

impl Mailer {
    pub fn new(
        smtp_host: Option<&str>,
        smtp_username: Option<&str>,
        smtp_password: Option<&str>,
        from: &str,
    ) -> Result<Self> {
        let from: Mailbox = from.parse().context("Invalid SMTP_FROM address")?;

        let transport = match smtp_host {
            Some(host) => {
                let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(host)
                    .context("Invalid SMTP host")?;
                if let (Some(user), Some(pass)) = (smtp_username, smtp_password) {
                    builder = builder.credentials(Credentials::new(user.into(), pass.into()));
                }
                Some(builder.build())
            }
            None => None,
        };

        Ok(Self { transport, from })
    }

    pub async fn send_password_reset(&self, to: &str, reset_link: &str) -> Result<()> {
        let Some(transport) = &self.transport else {
            info!(to, reset_link, "SMTP not configured, logging reset link");
            return Ok(());
        };

        let message = Message::builder()
            .from(self.from.clone())
            .to(to.parse().context("Invalid recipient address")?)
            .subject("Reset your TweetWise password")
            .body(format!(
                "A password reset was requested for your TweetWise account.\n\n\
                 Reset it here (the link expires in one hour):\n{reset_link}\n\n\
                 If you did not request this, you can ignore this message."
            ))
            .context("Failed to build reset message")?;

        transport
            .send(message)
            .await
            .context("Failed to send reset message")?;
        Ok(())
    }
}
