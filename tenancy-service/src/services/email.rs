use lettre::{
    message::{
        header::{ContentType, Header, HeaderName, HeaderValue},
        Mailbox, MultiPart, SinglePart,
    },
    transport::smtp::authentication::Credentials,
    Message, SmtpTransport, Transport,
};
use async_trait::async_trait;
use service_core::error::AppError;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::SmtpConfig;

/// Content of an invitation mail.
#[derive(Debug, Clone)]
pub struct InvitationEmail {
    pub organization_name: String,
    pub inviter_name: String,
    pub accept_url: String,
}

#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send_invitation_email(
        &self,
        to_email: &str,
        invitation: &InvitationEmail,
    ) -> Result<(), AppError>;

    async fn send_verification_email(
        &self,
        to_email: &str,
        verification_token: &str,
        base_url: &str,
    ) -> Result<(), AppError>;

    async fn send_password_reset_email(
        &self,
        to_email: &str,
        reset_token: &str,
        base_url: &str,
    ) -> Result<(), AppError>;
}

pub fn verification_link(base_url: &str, token: &str) -> String {
    format!("{}/account/verify?token={}", base_url, token)
}

pub fn password_reset_link(base_url: &str, token: &str) -> String {
    format!("{}/account/password-reset/confirm?token={}", base_url, token)
}

/// Keeps out-of-office and delivery-report robots from answering invitations.
#[derive(Debug, Clone)]
struct AutoResponseSuppress;

const AUTO_RESPONSE_SUPPRESS_VALUE: &str = "OOF, DR, RN, NRN, AutoReply";

impl Header for AutoResponseSuppress {
    fn name() -> HeaderName {
        HeaderName::new_from_ascii_str("X-Auto-Response-Suppress")
    }

    fn parse(_: &str) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        Ok(Self)
    }

    fn display(&self) -> HeaderValue {
        HeaderValue::new(Self::name(), AUTO_RESPONSE_SUPPRESS_VALUE.to_string())
    }
}

#[derive(Clone)]
pub struct EmailService {
    mailer: SmtpTransport,
    sender: Mailbox,
}

impl EmailService {
    pub fn new(config: &SmtpConfig) -> Result<Self, AppError> {
        let mut builder = SmtpTransport::starttls_relay(&config.host)
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!("Invalid SMTP host: {}", e)))?
            .port(config.port)
            .timeout(Some(Duration::from_secs(10)));

        if !config.user.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.user.clone(),
                config.password.clone(),
            ));
        }

        let address = config.sender_address.parse().map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!(
                "Invalid MAIL_SENDER_ADDRESS '{}': {}",
                config.sender_address,
                e
            ))
        })?;

        tracing::info!(host = %config.host, port = config.port, "Email service initialized with SMTP relay");

        Ok(Self {
            mailer: builder.build(),
            sender: Mailbox::new(Some(config.sender_name.clone()), address),
        })
    }

    async fn send_email(
        &self,
        to_email: &str,
        subject: &str,
        plain_body: String,
        html_body: String,
        suppress_auto_responses: bool,
    ) -> Result<(), AppError> {
        let to: Mailbox = to_email
            .parse()
            .map_err(|e: lettre::address::AddressError| AppError::BadRequest(e.into()))?;

        let mut builder = Message::builder()
            .from(self.sender.clone())
            .to(to)
            .subject(subject);
        if suppress_auto_responses {
            builder = builder.header(AutoResponseSuppress);
        }

        let email = builder.multipart(
            MultiPart::alternative()
                .singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_PLAIN)
                        .body(plain_body),
                )
                .singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_HTML)
                        .body(html_body),
                ),
        )?;

        // SmtpTransport blocks.
        let mailer = self.mailer.clone();
        let result = tokio::task::spawn_blocking(move || mailer.send(&email))
            .await
            .map_err(|e| AppError::InternalError(e.into()))?;

        match result {
            Ok(_) => {
                tracing::info!(to = %to_email, subject = %subject, "Email sent successfully");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, to = %to_email, "Failed to send email");
                Err(AppError::EmailError(e.to_string()))
            }
        }
    }
}

#[async_trait]
impl EmailProvider for EmailService {
    async fn send_invitation_email(
        &self,
        to_email: &str,
        invitation: &InvitationEmail,
    ) -> Result<(), AppError> {
        let subject = format!(
            "{} invites you to join {}",
            invitation.inviter_name, invitation.organization_name
        );

        let html_body = format!(
            r###"<html>
    <body style="font-family: Arial, sans-serif;">
        <h2>You have been invited</h2>
        <p>{inviter} invites you to join the organization <strong>{organization}</strong>.</p>
        <p>
            <a href="{url}" style="background-color: #4CAF50; color: white; padding: 14px 20px; text-decoration: none; border-radius: 4px;">
                Accept invitation
            </a>
        </p>
        <p style="color: #666; font-size: 12px;">If you did not expect this invitation, you can ignore this email.</p>
    </body>
</html>
"###,
            inviter = invitation.inviter_name,
            organization = invitation.organization_name,
            url = invitation.accept_url,
        );

        let plain_body = format!(
            "You have been invited\n\n{} invites you to join the organization {}.\n\nAccept the invitation here:\n{}\n\nIf you did not expect this invitation, you can ignore this email.",
            invitation.inviter_name, invitation.organization_name, invitation.accept_url
        );

        self.send_email(to_email, &subject, plain_body, html_body, true)
            .await
    }

    async fn send_verification_email(
        &self,
        to_email: &str,
        verification_token: &str,
        base_url: &str,
    ) -> Result<(), AppError> {
        let link = verification_link(base_url, verification_token);

        let html_body = format!(
            r###"<html>
    <body style="font-family: Arial, sans-serif;">
        <h2>Please verify your email</h2>
        <p>
            <a href="{}" style="background-color: #4CAF50; color: white; padding: 14px 20px; text-decoration: none; border-radius: 4px;">
                Verify Email
            </a>
        </p>
        <p style="color: #666; font-size: 12px;">This link will expire in 24 hours.</p>
    </body>
</html>
"###,
            link
        );

        let plain_body = format!(
            "Please verify your email\n\nVisit the following link to verify your email address:\n\n{}\n\nThis link will expire in 24 hours.",
            link
        );

        self.send_email(to_email, "Verify Your Email Address", plain_body, html_body, false)
            .await
    }

    async fn send_password_reset_email(
        &self,
        to_email: &str,
        reset_token: &str,
        base_url: &str,
    ) -> Result<(), AppError> {
        let link = password_reset_link(base_url, reset_token);

        let html_body = format!(
            r###"<html>
    <body style="font-family: Arial, sans-serif;">
        <h2>Password Reset Request</h2>
        <p>We received a request to reset your password.</p>
        <p>
            <a href="{}" style="background-color: #2196F3; color: white; padding: 14px 20px; text-decoration: none; border-radius: 4px;">
                Reset Password
            </a>
        </p>
        <p style="color: #666; font-size: 12px;">This link will expire in 1 hour. If you didn't request this, please ignore this email.</p>
    </body>
</html>
"###,
            link
        );

        let plain_body = format!(
            "Password Reset Request\n\nVisit the following link to set a new password:\n\n{}\n\nThis link will expire in 1 hour. If you didn't request this, please ignore this email.",
            link
        );

        self.send_email(to_email, "Reset Your Password", plain_body, html_body, false)
            .await
    }
}

/// A mail the mock would have sent.
#[derive(Debug, Clone, PartialEq)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    /// The actionable link of the mail.
    pub link: String,
}

/// Records mail instead of sending it. Used without SMTP and in tests.
#[derive(Clone, Default)]
pub struct MockEmailService {
    sent: Arc<Mutex<Vec<SentEmail>>>,
}

impl MockEmailService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }

    pub fn last_sent_to(&self, to_email: &str) -> Option<SentEmail> {
        self.sent().into_iter().rev().find(|mail| mail.to == to_email)
    }

    fn record(&self, to: &str, subject: &str, link: String) -> Result<(), AppError> {
        tracing::info!(to = %to, subject = %subject, link = %link, "Email recorded (no SMTP configured)");
        self.sent
            .lock()
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("Mock mailer poisoned: {}", e)))?
            .push(SentEmail {
                to: to.to_string(),
                subject: subject.to_string(),
                link,
            });
        Ok(())
    }
}

#[async_trait]
impl EmailProvider for MockEmailService {
    async fn send_invitation_email(
        &self,
        to_email: &str,
        invitation: &InvitationEmail,
    ) -> Result<(), AppError> {
        let subject = format!(
            "{} invites you to join {}",
            invitation.inviter_name, invitation.organization_name
        );
        self.record(to_email, &subject, invitation.accept_url.clone())
    }

    async fn send_verification_email(
        &self,
        to_email: &str,
        verification_token: &str,
        base_url: &str,
    ) -> Result<(), AppError> {
        self.record(
            to_email,
            "Verify Your Email Address",
            verification_link(base_url, verification_token),
        )
    }

    async fn send_password_reset_email(
        &self,
        to_email: &str,
        reset_token: &str,
        base_url: &str,
    ) -> Result<(), AppError> {
        self.record(
            to_email,
            "Reset Your Password",
            password_reset_link(base_url, reset_token),
        )
    }
}
