use std::{sync::Arc, time::Duration};

use sea_orm::DatabaseConnection;

use crate::{
    EngineError, ResultEngine,
    mail::{LogMailer, Mailer},
};

mod access;
mod drafts;
mod entitlements;
mod plans;
mod reconciliation;
mod registration;
mod sessions;
mod users;

pub use entitlements::Entitlements;
pub use reconciliation::ReconciliationReport;

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result: $crate::ResultEngine<_> = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

pub struct Engine {
    database: DatabaseConnection,
    mailer: Arc<dyn Mailer>,
    mail_timeout: Duration,
    code_ttl: Option<Duration>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("database", &self.database)
            .field("mail_timeout", &self.mail_timeout)
            .field("code_ttl", &self.code_ttl)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }
}

fn normalize_required_name(value: &str, label: &str) -> ResultEngine<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::InvalidValue(format!(
            "{label} must not be empty"
        )));
    }
    Ok(trimmed.to_string())
}

/// The builder for `Engine`
pub struct EngineBuilder {
    database: DatabaseConnection,
    mailer: Option<Arc<dyn Mailer>>,
    mail_timeout: Duration,
    code_ttl: Option<Duration>,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self {
            database: DatabaseConnection::default(),
            mailer: None,
            mail_timeout: Duration::from_secs(10),
            code_ttl: None,
        }
    }
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Mail collaborator used for verification codes. Defaults to
    /// [`LogMailer`] (codes logged, nothing sent).
    pub fn mailer(mut self, mailer: Arc<dyn Mailer>) -> EngineBuilder {
        self.mailer = Some(mailer);
        self
    }

    /// Upper bound on a single mail-send attempt.
    pub fn mail_timeout(mut self, timeout: Duration) -> EngineBuilder {
        self.mail_timeout = timeout;
        self
    }

    /// Verification code time-to-live. `None` (the default) keeps codes
    /// valid until replaced by a resend.
    pub fn code_ttl(mut self, ttl: Option<Duration>) -> EngineBuilder {
        self.code_ttl = ttl;
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        Ok(Engine {
            database: self.database,
            mailer: self.mailer.unwrap_or_else(|| Arc::new(LogMailer)),
            mail_timeout: self.mail_timeout,
            code_ttl: self.code_ttl,
        })
    }
}
