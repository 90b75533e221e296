mod smtp;
mod table;
mod templates;

pub use smtp::EmailReportRenderer;
pub use table::TableRenderer;
pub use templates::ReportTemplate;

use analysis_core::AnalysisError;

/// Errors from the notification system.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("SMTP error: {0}")]
    Smtp(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Output error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<NotificationError> for AnalysisError {
    fn from(err: NotificationError) -> Self {
        match err {
            NotificationError::Config(msg) => AnalysisError::Config(msg),
            other => AnalysisError::Render(other.to_string()),
        }
    }
}

/// SMTP settings for the e-mail report.
#[derive(Debug, Clone)]
pub struct NotificationConfig {
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub smtp_from: Option<String>,
    pub smtp_to: Vec<String>,
    pub smtp_tls: SmtpTls,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SmtpTls {
    #[default]
    StartTls,
    Tls,
    None,
}

impl SmtpTls {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "tls" | "ssl" => SmtpTls::Tls,
            "none" => SmtpTls::None,
            _ => SmtpTls::StartTls,
        }
    }
}

fn split_recipients(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            smtp_host: None,
            smtp_port: 587,
            smtp_username: None,
            smtp_password: None,
            smtp_from: None,
            smtp_to: Vec::new(),
            smtp_tls: SmtpTls::default(),
        }
    }
}

impl NotificationConfig {
    /// Load from environment variables.
    pub fn from_env() -> Self {
        let non_empty = |key: &str| std::env::var(key).ok().filter(|s| !s.is_empty());

        Self {
            smtp_host: non_empty("SMTP_HOST"),
            smtp_port: std::env::var("SMTP_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(587),
            smtp_username: non_empty("SMTP_USERNAME"),
            smtp_password: non_empty("SMTP_PASSWORD"),
            smtp_from: non_empty("SMTP_FROM_ADDRESS"),
            smtp_to: split_recipients(&std::env::var("NOTIFICATION_EMAIL_TO").unwrap_or_default()),
            smtp_tls: SmtpTls::parse(&std::env::var("SMTP_TLS").unwrap_or_default()),
        }
    }

    pub fn is_email_configured(&self) -> bool {
        self.smtp_host.is_some() && self.smtp_from.is_some() && !self.smtp_to.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tls_parsing() {
        assert_eq!(SmtpTls::parse("tls"), SmtpTls::Tls);
        assert_eq!(SmtpTls::parse("SSL"), SmtpTls::Tls);
        assert_eq!(SmtpTls::parse("none"), SmtpTls::None);
        assert_eq!(SmtpTls::parse(""), SmtpTls::StartTls);
    }

    #[test]
    fn test_recipient_list() {
        assert_eq!(
            split_recipients("a@example.com, b@example.com,,"),
            vec!["a@example.com", "b@example.com"]
        );
        assert!(split_recipients("").is_empty());
    }

    #[test]
    fn test_email_requires_host_sender_and_recipient() {
        let mut config = NotificationConfig {
            smtp_host: Some("smtp.example.com".to_string()),
            smtp_port: 465,
            smtp_username: None,
            smtp_password: None,
            smtp_from: Some("bot@example.com".to_string()),
            smtp_to: vec![],
            smtp_tls: SmtpTls::Tls,
        };
        assert!(!config.is_email_configured());
        config.smtp_to.push("me@example.com".to_string());
        assert!(config.is_email_configured());
    }

    #[test]
    fn test_error_bridge() {
        let err: AnalysisError = NotificationError::Smtp("refused".to_string()).into();
        assert!(matches!(err, AnalysisError::Render(_)));
        let err: AnalysisError = NotificationError::Config("no host".to_string()).into();
        assert!(matches!(err, AnalysisError::Config(_)));
    }
}
