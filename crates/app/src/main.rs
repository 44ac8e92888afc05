use std::{sync::Arc, time::Duration};

use migration::{Migrator, MigratorTrait};
use settings::Database;

mod settings;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let settings = settings::Settings::new()?;
    let mut tasks = tokio::task::JoinSet::new();

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "murale={level},server={level},engine={level}",
            level = settings.app.level
        ))
        .init();

    if let Some(server) = settings.server {
        let mail = settings.mail;
        let registration = settings.registration;
        tasks.spawn(async move {
            tracing::info!("Found server settings...");
            let db = match parse_database(&server.database).await {
                Ok(db) => db,
                Err(err) => {
                    tracing::error!("failed to initialize database: {err}");
                    return;
                }
            };

            let mut builder = engine::Engine::builder().database(db.clone());
            match &mail {
                Some(mail) => {
                    let config = engine::MailConfig {
                        smtp_host: mail.smtp_host.clone(),
                        smtp_port: mail.smtp_port,
                        smtp_username: mail.smtp_username.clone(),
                        smtp_password: mail.smtp_password.clone(),
                        from_address: mail.from_address.clone(),
                    };
                    let mailer = match engine::SmtpMailer::new(&config) {
                        Ok(mailer) => mailer,
                        Err(err) => {
                            tracing::error!("failed to initialize SMTP mailer: {err}");
                            return;
                        }
                    };
                    builder = builder.mailer(Arc::new(mailer));
                    if let Some(secs) = mail.timeout_secs {
                        builder = builder.mail_timeout(Duration::from_secs(secs));
                    }
                }
                None => {
                    tracing::info!("No mail settings found, verification codes are logged only");
                }
            }
            if let Some(registration) = &registration
                && let Some(minutes) = registration.code_ttl_minutes
            {
                builder = builder.code_ttl(Some(Duration::from_secs(minutes * 60)));
            }

            let engine = match builder.build().await {
                Ok(engine) => engine,
                Err(err) => {
                    tracing::error!("failed to build engine from database: {err}");
                    return;
                }
            };

            let bind = server.bind.unwrap_or_else(|| "127.0.0.1".to_string());
            let addr = format!("{}:{}", bind, server.port);
            let listener = match tokio::net::TcpListener::bind(addr).await {
                Ok(listener) => listener,
                Err(err) => {
                    tracing::error!("failed to bind server listener: {err}");
                    return;
                }
            };
            if let Err(err) = server::run_with_listener(engine, db, listener).await {
                tracing::error!("server failed: {err}");
            }
        });
    }

    while tasks.join_next().await.is_some() {
        tasks.shutdown().await;
    }

    Ok(())
}

async fn parse_database(
    config: &settings::Database,
) -> Result<sea_orm::DatabaseConnection, Box<dyn std::error::Error + Send + Sync>> {
    let url = match config {
        Database::Memory => String::from("sqlite::memory"),
        Database::Sqlite(path) => format!("sqlite:{}?mode=rwc", path),
    };

    let database = sea_orm::Database::connect(url).await?;
    Migrator::up(&database, None).await?;
    Ok(database)
}
