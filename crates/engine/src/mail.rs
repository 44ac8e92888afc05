//! Mail delivery collaborator.
//!
//! The engine only ever needs one message shape: the verification code sent
//! during registration. Delivery is behind the [`Mailer`] trait so the server
//! can run with a real SMTP relay ([`SmtpMailer`]), without one
//! ([`LogMailer`]), or with a capture buffer in tests ([`MemoryMailer`]).
//!
//! The registration flow commits its pending row only after the mailer
//! accepted the message, so `send_verification_code` returning `Ok` is the
//! engine's definition of "sent".

use std::{
    future::Future,
    pin::Pin,
    sync::{
        Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::header::ContentType,
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use rand::Rng;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),
    #[error("failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),
    #[error("invalid email address: {0}")]
    InvalidAddress(String),
    #[error("mail delivery unavailable: {0}")]
    Unavailable(String),
}

pub type MailFuture<'a> = Pin<Box<dyn Future<Output = Result<(), MailError>> + Send + 'a>>;

pub trait Mailer: Send + Sync {
    /// Delivers the verification code to `to`. `Ok` means the transport
    /// accepted the message.
    fn send_verification_code<'a>(&'a self, to: &'a str, code: &'a str) -> MailFuture<'a>;
}

/// SMTP configuration for [`SmtpMailer`].
#[derive(Clone, Debug)]
pub struct MailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub from_address: String,
}

/// Mailer backed by an SMTP relay (STARTTLS).
pub struct SmtpMailer {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl SmtpMailer {
    pub fn new(config: &MailConfig) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.clone(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer,
            from_address: config.from_address.clone(),
        })
    }
}

impl Mailer for SmtpMailer {
    fn send_verification_code<'a>(&'a self, to: &'a str, code: &'a str) -> MailFuture<'a> {
        Box::pin(async move {
            let email = Message::builder()
                .from(
                    self.from_address
                        .parse()
                        .map_err(|_| MailError::InvalidAddress(self.from_address.clone()))?,
                )
                .to(to
                    .parse()
                    .map_err(|_| MailError::InvalidAddress(to.to_string()))?)
                .subject("Your wall verification code")
                .header(ContentType::TEXT_PLAIN)
                .body(format!(
                    "Your verification code is {code}.\n\n\
                     Enter it in the app to finish creating your account."
                ))?;

            self.mailer.send(email).await?;
            tracing::info!(to = %to, "verification mail sent");
            Ok(())
        })
    }
}

/// Mailer for deployments without an SMTP relay: the code is only logged.
#[derive(Debug, Default)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send_verification_code<'a>(&'a self, to: &'a str, code: &'a str) -> MailFuture<'a> {
        Box::pin(async move {
            tracing::info!(to = %to, code = %code, "mail disabled; verification code logged");
            Ok(())
        })
    }
}

/// In-memory mailer used by tests and local development.
#[derive(Debug, Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<(String, String)>>,
    fail: AtomicBool,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent sends fail, to exercise mail-failure paths.
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn sent_count(&self) -> usize {
        match self.sent.lock() {
            Ok(sent) => sent.len(),
            Err(_) => 0,
        }
    }

    /// Latest code delivered to `email`, if any.
    pub fn last_code_for(&self, email: &str) -> Option<String> {
        let sent = self.sent.lock().ok()?;
        sent.iter()
            .rev()
            .find(|(to, _)| to == email)
            .map(|(_, code)| code.clone())
    }
}

impl Mailer for MemoryMailer {
    fn send_verification_code<'a>(&'a self, to: &'a str, code: &'a str) -> MailFuture<'a> {
        Box::pin(async move {
            if self.fail.load(Ordering::SeqCst) {
                return Err(MailError::Unavailable("mailer set to fail".to_string()));
            }
            if let Ok(mut sent) = self.sent.lock() {
                sent.push((to.to_string(), code.to_string()));
            }
            Ok(())
        })
    }
}

/// Generate a 4-digit numeric verification code.
///
/// Deliberately low entropy: the code gates a single pending registration
/// and is not a secret token.
pub(crate) fn generate_verification_code() -> String {
    let code: u32 = rand::rng().random_range(1000..10_000);
    code.to_string()
}
