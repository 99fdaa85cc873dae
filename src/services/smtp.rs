use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use secrecy::ExposeSecret;

use crate::config::Config;
use crate::error::AppError;
use crate::services::email::{MailTransport, OutgoingMail};

/// lettre による SMTP 配送
#[derive(Clone)]
pub struct SmtpTransport {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpTransport {
    /// SMTP_HOST が設定されていれば STARTTLS のリレーを構築
    pub fn from_config(config: &Config) -> Result<Option<Self>, AppError> {
        let Some(host) = &config.smtp_host else {
            return Ok(None);
        };

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .map_err(|e| AppError::Mail(format!("smtp relay error: {e}")))?
            .port(config.smtp_port);

        if let (Some(username), Some(password)) = (&config.smtp_username, &config.smtp_password) {
            builder = builder.credentials(Credentials::new(
                username.expose_secret().clone(),
                password.expose_secret().clone(),
            ));
        }

        tracing::info!(host = %host, port = %config.smtp_port, "SMTP 配送を初期化");

        Ok(Some(Self {
            mailer: builder.build(),
        }))
    }
}

#[async_trait]
impl MailTransport for SmtpTransport {
    async fn deliver(&self, mail: OutgoingMail) -> Result<(), AppError> {
        let from = mail
            .from
            .parse()
            .map_err(|e| AppError::Mail(format!("invalid sender: {e}")))?;
        let to = mail
            .to
            .parse()
            .map_err(|e| AppError::Mail(format!("invalid recipient: {e}")))?;

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(mail.subject.as_str())
            .header(ContentType::TEXT_PLAIN)
            .body(mail.body)
            .map_err(|e| AppError::Mail(format!("message build error: {e}")))?;

        self.mailer
            .send(message)
            .await
            .map_err(|e| AppError::Mail(e.to_string()))?;

        tracing::info!(to = %mail.to, subject = %mail.subject, "メール送信完了");
        Ok(())
    }
}
