use async_trait::async_trait;
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials, Message,
    SmtpTransport, Transport,
};
use std::time::Duration;

use crate::services::error::ServiceError;
use crate::utils::codes::ChallengeCode;

#[async_trait]
pub trait EmailProvider: Send + Sync {
    /// Deliver a confirmation code for a pending admin action.
    async fn send_challenge_code(
        &self,
        to_email: &str,
        code: &ChallengeCode,
        action_description: &str,
        ttl_minutes: i64,
    ) -> Result<(), ServiceError>;

    /// Invite a waitlisted user to join.
    async fn send_waitlist_invite(
        &self,
        to_email: &str,
        display_name: Option<&str>,
    ) -> Result<(), ServiceError>;

    /// Welcome a freshly promoted user.
    async fn send_welcome(
        &self,
        to_email: &str,
        display_name: Option<&str>,
    ) -> Result<(), ServiceError>;
}

#[derive(Clone)]
pub struct SmtpEmailService {
    mailer: SmtpTransport,
    from_email: String,
}

impl SmtpEmailService {
    pub fn new(config: &crate::config::SmtpConfig) -> Result<Self, ServiceError> {
        let creds = Credentials::new(config.username.clone(), config.password.clone());

        let mailer = SmtpTransport::relay(&config.host)
            .map_err(|e| ServiceError::InternalString(e.to_string()))?
            .credentials(creds)
            .port(587)
            .timeout(Some(Duration::from_secs(10)))
            .build();

        tracing::info!(host = %config.host, "Email service initialized");

        Ok(Self {
            mailer,
            from_email: config.from_email.clone(),
        })
    }

    async fn send_email(
        &self,
        to_email: &str,
        subject: &str,
        plain_body: &str,
        html_body: &str,
    ) -> Result<(), ServiceError> {
        let email = Message::builder()
            .from(self.from_email.parse().map_err(
                |e: lettre::address::AddressError| ServiceError::Internal(e.into()),
            )?)
            .to(to_email.parse().map_err(
                |e: lettre::address::AddressError| ServiceError::Internal(e.into()),
            )?)
            .subject(subject)
            .multipart(
                lettre::message::MultiPart::alternative()
                    .singlepart(
                        lettre::message::SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(plain_body.to_string()),
                    )
                    .singlepart(
                        lettre::message::SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )
            .map_err(|e| ServiceError::Internal(e.into()))?;

        // Send email in blocking thread pool to avoid blocking async runtime
        let mailer = self.mailer.clone();
        let result = tokio::task::spawn_blocking(move || mailer.send(&email))
            .await
            .map_err(|e| ServiceError::Internal(e.into()))?;

        match result {
            Ok(_) => {
                tracing::info!(
                    to = %to_email,
                    subject = %subject,
                    "Email sent successfully"
                );
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    error = %e.to_string(),
                    to = %to_email,
                    "Failed to send email"
                );
                Err(ServiceError::EmailError(e.to_string()))
            }
        }
    }
}

#[async_trait]
impl EmailProvider for SmtpEmailService {
    async fn send_challenge_code(
        &self,
        to_email: &str,
        code: &ChallengeCode,
        action_description: &str,
        ttl_minutes: i64,
    ) -> Result<(), ServiceError> {
        let html_body = format!(
            r###"<html>
                <body style="font-family: Arial, sans-serif;">
                    <h2>Confirmation required</h2>
                    <p>You asked to {}. Enter this code to confirm:</p>
                    <p style="font-size: 28px; letter-spacing: 6px; font-weight: bold;">{}</p>
                    <p style="color: #666; font-size: 12px;">
                        This code expires in {} minutes and can be used once.
                        If you did not request this, contact the platform team.
                    </p>
                </body>
            </html>
            "###,
            action_description,
            code.as_str(),
            ttl_minutes
        );

        let plain_body = format!(
            "Confirmation required\n\nYou asked to {}. Enter this code to confirm: {}\n\nThis code expires in {} minutes and can be used once. If you did not request this, contact the platform team.",
            action_description,
            code.as_str(),
            ttl_minutes
        );

        self.send_email(to_email, "Your admin confirmation code", &plain_body, &html_body)
            .await
    }

    async fn send_waitlist_invite(
        &self,
        to_email: &str,
        display_name: Option<&str>,
    ) -> Result<(), ServiceError> {
        let greeting = match display_name {
            Some(name) => format!("Hi {},", name),
            None => "Hi,".to_string(),
        };

        let html_body = format!(
            r###"<html>
                <body style="font-family: Arial, sans-serif;">
                    <h2>You're off the waitlist</h2>
                    <p>{}</p>
                    <p>Good news: a spot has opened up for you. Keep an eye on your inbox,
                    your account will be activated shortly.</p>
                </body>
            </html>
            "###,
            greeting
        );

        let plain_body = format!(
            "{}\n\nGood news: a spot has opened up for you. Keep an eye on your inbox, your account will be activated shortly.",
            greeting
        );

        self.send_email(to_email, "You're off the waitlist", &plain_body, &html_body)
            .await
    }

    async fn send_welcome(
        &self,
        to_email: &str,
        display_name: Option<&str>,
    ) -> Result<(), ServiceError> {
        let greeting = match display_name {
            Some(name) => format!("Welcome, {}!", name),
            None => "Welcome!".to_string(),
        };

        let html_body = format!(
            r###"<html>
                <body style="font-family: Arial, sans-serif;">
                    <h2>{}</h2>
                    <p>Your account is now active. You can sign in right away.</p>
                </body>
            </html>
            "###,
            greeting
        );

        let plain_body = format!("{}\n\nYour account is now active. You can sign in right away.", greeting);

        self.send_email(to_email, "Your account is ready", &plain_body, &html_body)
            .await
    }
}

/// A recorded outgoing email.
#[derive(Debug, Clone)]
pub struct SentEmail {
    pub to_email: String,
    pub subject: String,
    pub code: Option<String>,
}

pub struct MockEmailService {
    pub sent: std::sync::Mutex<Vec<SentEmail>>,
    fail_sends: std::sync::atomic::AtomicBool,
}

impl Default for MockEmailService {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEmailService {
    pub fn new() -> Self {
        Self {
            sent: std::sync::Mutex::new(Vec::new()),
            fail_sends: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Make subsequent sends fail, to exercise the fallback path.
    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends
            .store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    /// The most recently delivered confirmation code, if any.
    pub fn last_code(&self) -> Option<String> {
        self.sent
            .lock()
            .ok()?
            .iter()
            .rev()
            .find_map(|email| email.code.clone())
    }

    fn record(&self, email: SentEmail) -> Result<(), ServiceError> {
        if self.fail_sends.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(ServiceError::EmailError(
                "Mock email delivery failed".to_string(),
            ));
        }
        self.sent
            .lock()
            .map_err(|e| ServiceError::InternalString(format!("Mock email mutex poisoned: {}", e)))?
            .push(email);
        Ok(())
    }
}

#[async_trait]
impl EmailProvider for MockEmailService {
    async fn send_challenge_code(
        &self,
        to_email: &str,
        code: &ChallengeCode,
        _action_description: &str,
        _ttl_minutes: i64,
    ) -> Result<(), ServiceError> {
        self.record(SentEmail {
            to_email: to_email.to_string(),
            subject: "Your admin confirmation code".to_string(),
            code: Some(code.as_str().to_string()),
        })
    }

    async fn send_waitlist_invite(
        &self,
        to_email: &str,
        _display_name: Option<&str>,
    ) -> Result<(), ServiceError> {
        self.record(SentEmail {
            to_email: to_email.to_string(),
            subject: "You're off the waitlist".to_string(),
            code: None,
        })
    }

    async fn send_welcome(
        &self,
        to_email: &str,
        _display_name: Option<&str>,
    ) -> Result<(), ServiceError> {
        self.record(SentEmail {
            to_email: to_email.to_string(),
            subject: "Your account is ready".to_string(),
            code: None,
        })
    }
}
