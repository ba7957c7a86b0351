//! Outgoing transactional email.
//!
//! Every send is a no-op (logged) when SMTP is not configured, so the API
//! behaves the same in development without a mail relay.

use common::{
    env_config::MailConfig,
    error::{AppError, Res},
};
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, MultiPart, SinglePart, header::ContentType},
    transport::smtp::authentication::Credentials,
};

pub mod templates;

use templates::Email;

pub struct Mailer {
    config: MailConfig,
    frontend_url: String,
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
}

impl Mailer {
    /// Builds the SMTP transport (and its connection pool) once for the
    /// lifetime of the mailer. An unusable relay leaves mail disabled.
    pub fn new(config: MailConfig, frontend_url: &str) -> Self {
        let transport = match build_transport(&config) {
            Ok(transport) => transport,
            Err(e) => {
                log::error!("Failed to create SMTP transport: {}", e);
                None
            }
        };
        Self {
            config,
            frontend_url: frontend_url.trim_end_matches('/').to_string(),
            transport,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.transport.is_some()
    }

    pub async fn send_verification(&self, to: &str, first_name: &str, token: &str) -> Res<()> {
        let url = format!("{}/verify-email/{}", self.frontend_url, token);
        self.send(to, templates::verification(first_name, &url)).await
    }

    pub async fn send_password_reset(&self, to: &str, first_name: &str, token: &str) -> Res<()> {
        let url = format!("{}/reset-password/{}", self.frontend_url, token);
        self.send(to, templates::password_reset(first_name, &url))
            .await
    }

    pub async fn send_enrollment_confirmation(
        &self,
        to: &str,
        first_name: &str,
        course_title: &str,
        course_slug: &str,
    ) -> Res<()> {
        let url = format!("{}/learn/{}", self.frontend_url, course_slug);
        self.send(to, templates::enrollment(first_name, course_title, &url))
            .await
    }

    pub async fn send_payment_receipt(
        &self,
        to: &str,
        first_name: &str,
        course_title: &str,
        invoice_number: &str,
        amount: i64,
        currency: &str,
    ) -> Res<()> {
        self.send(
            to,
            templates::receipt(first_name, course_title, invoice_number, amount, currency),
        )
        .await
    }

    async fn send(&self, to_email: &str, email: Email) -> Res<()> {
        let (Some(transport), Some(from_address)) = (&self.transport, &self.config.from_address)
        else {
            log::warn!(
                "Email not configured, skipping \"{}\" to {}",
                email.subject,
                to_email
            );
            return Ok(());
        };

        let from: Mailbox = format!("{} <{}>", self.config.from_name, from_address)
            .parse()
            .map_err(|e| AppError::Mail(format!("Invalid from address: {}", e)))?;
        let to: Mailbox = to_email
            .parse()
            .map_err(|e| AppError::Mail(format!("Invalid recipient {}: {}", to_email, e)))?;

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(email.subject.as_str())
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(email.text),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(email.html),
                    ),
            )
            .map_err(|e| AppError::Mail(e.to_string()))?;

        transport
            .send(message)
            .await
            .map_err(|e| AppError::Mail(e.to_string()))?;

        log::info!("Email \"{}\" sent to {}", email.subject, to_email);
        Ok(())
    }
}

fn build_transport(config: &MailConfig) -> Res<Option<AsyncSmtpTransport<Tokio1Executor>>> {
    let (Some(smtp_host), Some(_)) = (&config.smtp_host, &config.from_address) else {
        return Ok(None);
    };

    let builder = if config.smtp_tls {
        AsyncSmtpTransport::<Tokio1Executor>::relay(smtp_host)
            .map_err(|e| AppError::Mail(e.to_string()))?
    } else {
        AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(smtp_host)
    }
    .port(config.smtp_port);

    let builder = match (&config.smtp_username, &config.smtp_password) {
        (Some(username), Some(password)) => {
            builder.credentials(Credentials::new(username.clone(), password.clone()))
        }
        _ => builder,
    };

    Ok(Some(builder.build()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unconfigured() -> MailConfig {
        MailConfig {
            smtp_host: None,
            smtp_port: 587,
            smtp_username: None,
            smtp_password: None,
            smtp_tls: true,
            from_address: None,
            from_name: "SkillUp Maroc".to_string(),
        }
    }

    #[test]
    fn unconfigured_mailer_is_disabled() {
        let mailer = Mailer::new(unconfigured(), "http://localhost:5173/");
        assert!(!mailer.is_enabled());
        assert_eq!(mailer.frontend_url, "http://localhost:5173");
    }

    #[tokio::test]
    async fn configured_mailer_keeps_one_transport() {
        let config = MailConfig {
            smtp_host: Some("localhost".to_string()),
            smtp_tls: false,
            from_address: Some("noreply@skillup.ma".to_string()),
            ..unconfigured()
        };
        let mailer = Mailer::new(config, "http://localhost:5173");
        assert!(mailer.is_enabled());
        assert!(mailer.transport.is_some());
    }

    #[test]
    fn sender_is_required_for_a_transport() {
        let config = MailConfig {
            smtp_host: Some("localhost".to_string()),
            ..unconfigured()
        };
        assert!(build_transport(&config).unwrap().is_none());
    }

    #[tokio::test]
    async fn unconfigured_send_is_skipped() {
        let mailer = Mailer::new(unconfigured(), "http://localhost:5173");
        assert!(mailer
            .send_verification("amine@example.ma", "Amine", "abc")
            .await
            .is_ok());
    }
}
