use analysis_core::{AnalysisError, ReportRenderer, ValuationReport};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::templates::ReportTemplate;
use crate::{NotificationConfig, NotificationError, SmtpTls};

/// Sends the scan report as an HTML e-mail.
pub struct EmailReportRenderer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Vec<Mailbox>,
}

impl EmailReportRenderer {
    pub fn new(config: &NotificationConfig) -> Result<Self, NotificationError> {
        let host = config
            .smtp_host
            .as_deref()
            .ok_or_else(|| NotificationError::Config("SMTP_HOST not set".into()))?;
        let from_addr = config
            .smtp_from
            .as_deref()
            .ok_or_else(|| NotificationError::Config("SMTP_FROM_ADDRESS not set".into()))?;

        let from: Mailbox = from_addr
            .parse()
            .map_err(|e| NotificationError::Config(format!("Invalid from address: {}", e)))?;

        let to: Vec<Mailbox> = config
            .smtp_to
            .iter()
            .filter_map(|addr| match addr.parse() {
                Ok(mailbox) => Some(mailbox),
                Err(e) => {
                    tracing::warn!("Ignoring invalid recipient {}: {}", addr, e);
                    None
                }
            })
            .collect();

        if to.is_empty() {
            return Err(NotificationError::Config(
                "No valid NOTIFICATION_EMAIL_TO addresses".into(),
            ));
        }

        let mut builder = match config.smtp_tls {
            SmtpTls::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(host),
            SmtpTls::StartTls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host),
            SmtpTls::None => Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(
                host,
            )),
        }
        .map_err(|e| NotificationError::Smtp(format!("SMTP transport error: {}", e)))?;

        builder = builder.port(config.smtp_port);

        if let (Some(user), Some(pass)) = (&config.smtp_username, &config.smtp_password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        tracing::info!("Email report enabled (SMTP {} -> {} recipients)", host, to.len());

        Ok(Self {
            transport: builder.build(),
            from,
            to,
        })
    }

    async fn send(&self, report: &ValuationReport) -> Result<(), NotificationError> {
        let html_body = ReportTemplate::html(report);

        for recipient in &self.to {
            let email = Message::builder()
                .from(self.from.clone())
                .to(recipient.clone())
                .subject(&report.title)
                .header(ContentType::TEXT_HTML)
                .body(html_body.clone())
                .map_err(|e| NotificationError::Smtp(format!("Failed to build email: {}", e)))?;

            self.transport
                .send(email)
                .await
                .map_err(|e| NotificationError::Smtp(format!("Failed to send email: {}", e)))?;
        }

        Ok(())
    }
}

#[async_trait]
impl ReportRenderer for EmailReportRenderer {
    async fn render(&self, report: &ValuationReport) -> Result<(), AnalysisError> {
        self.send(report).await?;
        tracing::info!("Sent '{}' ({} rows) to {} recipients", report.title, report.rows.len(), self.to.len());
        Ok(())
    }

    fn name(&self) -> &str {
        "smtp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(to: Vec<&str>) -> NotificationConfig {
        NotificationConfig {
            smtp_host: Some("smtp.example.com".to_string()),
            smtp_port: 587,
            smtp_username: None,
            smtp_password: None,
            smtp_from: Some("Valuation Bot <bot@example.com>".to_string()),
            smtp_to: to.into_iter().map(String::from).collect(),
            smtp_tls: SmtpTls::StartTls,
        }
    }

    #[tokio::test]
    async fn test_rejects_missing_recipients() {
        let err = EmailReportRenderer::new(&config(vec!["not an address"])).err().unwrap();
        assert!(matches!(err, NotificationError::Config(_)));
    }

    #[tokio::test]
    async fn test_builds_with_valid_settings() {
        let renderer = EmailReportRenderer::new(&config(vec!["me@example.com", "bogus"])).unwrap();
        assert_eq!(renderer.to.len(), 1);
        assert_eq!(renderer.name(), "smtp");
    }

    #[test]
    fn test_missing_host_is_config_error() {
        let mut cfg = config(vec!["me@example.com"]);
        cfg.smtp_host = None;
        assert!(matches!(
            EmailReportRenderer::new(&cfg).err().unwrap(),
            NotificationError::Config(_)
        ));
    }
}
