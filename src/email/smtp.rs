//! SMTP email provider implementation using lettre

use super::provider::{EmailProvider, EmailProviderError};
use crate::config::SmtpConfig;
use crate::domain::{EmailMessage, EmailSendResult};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

/// SMTP-based email provider
pub struct SmtpEmailProvider {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_email: String,
    from_name: Option<String>,
}

impl SmtpEmailProvider {
    /// Create a new SMTP provider from configuration
    pub fn from_config(config: &SmtpConfig) -> Result<Self, EmailProviderError> {
        let mut builder = if config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .map_err(|e| EmailProviderError::InvalidConfiguration(e.to_string()))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        };

        builder = builder.port(config.port);

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            let credentials = Credentials::new(username.clone(), password.clone());
            builder = builder.credentials(credentials);
        }

        Ok(Self {
            transport: builder.build(),
            from_email: config.from_email.clone(),
            from_name: config.from_name.clone(),
        })
    }

    fn build_from_mailbox(&self) -> Result<Mailbox, EmailProviderError> {
        let mailbox = if let Some(name) = &self.from_name {
            format!("{} <{}>", name, self.from_email)
        } else {
            self.from_email.clone()
        };

        mailbox.parse().map_err(|e| {
            EmailProviderError::InvalidConfiguration(format!("Invalid from address: {}", e))
        })
    }
}

#[async_trait]
impl EmailProvider for SmtpEmailProvider {
    async fn send(&self, message: &EmailMessage) -> Result<EmailSendResult, EmailProviderError> {
        let from = self.build_from_mailbox()?;

        let mut to_list = Vec::new();
        for addr in &message.to {
            let mailbox: Mailbox = if let Some(name) = &addr.name {
                format!("{} <{}>", name, addr.email)
            } else {
                addr.email.clone()
            }
            .parse()
            .map_err(|e| {
                EmailProviderError::InvalidConfiguration(format!("Invalid to address: {}", e))
            })?;
            to_list.push(mailbox);
        }

        if to_list.is_empty() {
            return Err(EmailProviderError::InvalidConfiguration(
                "No recipients specified".to_string(),
            ));
        }

        let mut email_builder = Message::builder().from(from).subject(&message.subject);
        for to in to_list {
            email_builder = email_builder.to(to);
        }

        // Multipart alternative when a text body is provided
        let email = if let Some(text_body) = &message.text_body {
            email_builder
                .multipart(
                    MultiPart::alternative()
                        .singlepart(
                            SinglePart::builder()
                                .header(ContentType::TEXT_PLAIN)
                                .body(text_body.clone()),
                        )
                        .singlepart(
                            SinglePart::builder()
                                .header(ContentType::TEXT_HTML)
                                .body(message.html_body.clone()),
                        ),
                )
                .map_err(|e| EmailProviderError::SendFailed(e.to_string()))?
        } else {
            email_builder
                .header(ContentType::TEXT_HTML)
                .body(message.html_body.clone())
                .map_err(|e| EmailProviderError::SendFailed(e.to_string()))?
        };

        let response = self
            .transport
            .send(email)
            .await
            .map_err(|e| EmailProviderError::SendFailed(e.to_string()))?;

        Ok(EmailSendResult::success(Some(
            response.message().collect::<Vec<_>>().join(" "),
        )))
    }

    async fn test_connection(&self) -> Result<(), EmailProviderError> {
        let ok = self
            .transport
            .test_connection()
            .await
            .map_err(|e| EmailProviderError::ConnectionError(e.to_string()))?;

        if ok {
            Ok(())
        } else {
            Err(EmailProviderError::ConnectionError(
                "SMTP connection test failed".to_string(),
            ))
        }
    }

    fn provider_name(&self) -> &'static str {
        "smtp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> SmtpConfig {
        SmtpConfig {
            host: "smtp.example.com".to_string(),
            port: 587,
            username: Some("mailer".to_string()),
            password: Some("secret".to_string()),
            use_tls: true,
            from_email: "no-reply@assure.example".to_string(),
            from_name: Some("Assure".to_string()),
        }
    }

    #[test]
    fn test_from_config() {
        let provider = SmtpEmailProvider::from_config(&test_config()).unwrap();
        assert_eq!(provider.provider_name(), "smtp");
    }

    #[test]
    fn test_from_mailbox_includes_name() {
        let provider = SmtpEmailProvider::from_config(&test_config()).unwrap();
        let mailbox = provider.build_from_mailbox().unwrap();
        assert_eq!(mailbox.to_string(), "Assure <no-reply@assure.example>");
    }
}
