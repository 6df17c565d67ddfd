use crate::config::{AppConfig, MailConfig};
use async_trait::async_trait;
use lettre::{
    message::MultiPart, transport::smtp::authentication::Credentials, AsyncSmtpTransport,
    AsyncTransport, Message, Tokio1Executor,
};
use std::env;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("Failed to build email message: {0}")]
    MessageBuild(String),
    #[error("Failed to send email: {0}")]
    SendFailed(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

#[async_trait]
pub trait EmailService: Send + Sync {
    async fn send_confirmation_email(&self, to_email: &str, token: &str) -> Result<(), EmailError>;
}

pub const CONFIRMATION_SUBJECT: &str = "Whitelist application received";

pub fn confirmation_link(base_url: &str, token: &str) -> String {
    format!("{}/whitelist/confirm_email?token={}", base_url, token)
}

/// Plain text and HTML bodies of the confirmation email.
pub struct ConfirmationEmail {
    pub text: String,
    pub html: String,
}

impl ConfirmationEmail {
    pub fn new(link: &str, support_email: &str) -> Self {
        let support_text = if support_email.is_empty() {
            String::new()
        } else {
            format!("For inquiries and support please contact {}", support_email)
        };
        let support_html = if support_email.is_empty() {
            String::new()
        } else {
            format!(
                r#"<p style="color: #666; font-size: 14px;">For inquiries and support please contact <a href="mailto:{0}">{0}</a></p>"#,
                support_email
            )
        };

        let text = format!(
            "Your whitelist submission is well received.\n\n\
             To finish the whitelist application process please confirm your email by following the link\n\
             {}\n\n\
             This link will expire in 7 days.\n\n\
             {}",
            link, support_text
        );

        let html = format!(
            r#"
<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
</head>
<body style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;">
    <h3 style="color: purple;">Your whitelist submission is well received.</h3>
    <p>To finish the whitelist application process please confirm your email by clicking the link below:</p>
    <p style="word-break: break-all;"><a href="{0}">{0}</a></p>
    <p style="color: #999; font-size: 12px;">This link will expire in 7 days.</p>
    {1}
</body>
</html>
"#,
            link, support_html
        );

        Self { text, html }
    }
}

pub struct MockEmailService {
    base_url: String,
}

impl MockEmailService {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl EmailService for MockEmailService {
    async fn send_confirmation_email(&self, to_email: &str, token: &str) -> Result<(), EmailError> {
        let link = confirmation_link(&self.base_url, token);
        tracing::info!("📧 [MOCK EMAIL] Confirmation email to: {}", to_email);
        tracing::info!("   Subject: {}", CONFIRMATION_SUBJECT);
        tracing::info!("   Confirmation link: {}", link);
        tracing::info!("   ---");
        Ok(())
    }
}

pub struct SmtpEmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    mail: MailConfig,
    base_url: String,
}

impl SmtpEmailService {
    pub fn new(mail: MailConfig, base_url: impl Into<String>) -> Result<Self, EmailError> {
        let smtp_host = env::var("SMTP_HOST")
            .map_err(|_| EmailError::ConfigError("SMTP_HOST not set".to_string()))?;
        let smtp_port = env::var("SMTP_PORT")
            .unwrap_or_else(|_| "587".to_string())
            .parse::<u16>()
            .map_err(|_| EmailError::ConfigError("Invalid SMTP_PORT".to_string()))?;
        let smtp_username = env::var("SMTP_USERNAME")
            .map_err(|_| EmailError::ConfigError("SMTP_USERNAME not set".to_string()))?;
        let smtp_password = env::var("SMTP_PASSWORD")
            .map_err(|_| EmailError::ConfigError("SMTP_PASSWORD not set".to_string()))?;

        let encryption = env::var("SMTP_ENCRYPTION").unwrap_or_else(|_| "starttls".to_string());

        let credentials = Credentials::new(smtp_username, smtp_password);

        let mailer = match encryption.to_lowercase().as_str() {
            "tls" => AsyncSmtpTransport::<Tokio1Executor>::relay(&smtp_host)
                .map_err(|e| EmailError::ConfigError(format!("SMTP relay error: {}", e)))?
                .port(smtp_port)
                .credentials(credentials)
                .build(),
            "starttls" => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp_host)
                .map_err(|e| EmailError::ConfigError(format!("SMTP starttls error: {}", e)))?
                .port(smtp_port)
                .credentials(credentials)
                .build(),
            "none" => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&smtp_host)
                .port(smtp_port)
                .credentials(credentials)
                .build(),
            _ => {
                return Err(EmailError::ConfigError(format!(
                    "Invalid SMTP_ENCRYPTION value: {}. Use 'tls', 'starttls', or 'none'",
                    encryption
                )))
            }
        };

        Ok(Self {
            mailer,
            mail,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl EmailService for SmtpEmailService {
    async fn send_confirmation_email(&self, to_email: &str, token: &str) -> Result<(), EmailError> {
        let link = confirmation_link(&self.base_url, token);
        let content = ConfirmationEmail::new(&link, &self.mail.support_email);

        let mut builder = Message::builder()
            .from(
                self.mail
                    .no_reply_email
                    .parse()
                    .map_err(|e| EmailError::MessageBuild(format!("Invalid from address: {}", e)))?,
            )
            .to(to_email
                .parse()
                .map_err(|e| EmailError::MessageBuild(format!("Invalid to address: {}", e)))?)
            .subject(CONFIRMATION_SUBJECT);

        if let Some(reply_to) = &self.mail.reply_email {
            builder = builder.reply_to(reply_to.parse().map_err(|e| {
                EmailError::MessageBuild(format!("Invalid reply-to address: {}", e))
            })?);
        }

        let email = builder
            .multipart(MultiPart::alternative_plain_html(content.text, content.html))
            .map_err(|e| EmailError::MessageBuild(e.to_string()))?;

        self.mailer
            .send(email)
            .await
            .map_err(|e| EmailError::SendFailed(e.to_string()))?;

        Ok(())
    }
}

pub fn create_email_service(config: &AppConfig) -> Arc<dyn EmailService> {
    if env::var("SMTP_HOST").is_ok() {
        match SmtpEmailService::new(config.mail.clone(), config.base_url.clone()) {
            Ok(service) => {
                tracing::info!("Using SMTP email service");
                Arc::new(service)
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to initialize SMTP email service: {}. Falling back to mock service",
                    e
                );
                Arc::new(MockEmailService::new(config.base_url.clone()))
            }
        }
    } else {
        tracing::info!(
            "SMTP not configured. Using mock email service (emails will be logged to console)"
        );
        Arc::new(MockEmailService::new(config.base_url.clone()))
    }
}
