use crate::config::GatelinkConfig;
use anyhow::{Context, Result, ensure};
use gatelink_access::Gateway;
use gatelink_link::{SerialBackend, SystemSerial};
use gatelink_storage::{
    AccessLog, AccessLogRepository, Database, RfidToken, SqliteAccessLogRepository,
    SqliteTokenRepository, SqliteUserRepository, TokenRepository, User, UserRepository,
};
use std::sync::Arc;
use tracing::{info, warn};

async fn open_database(config: &GatelinkConfig) -> Result<Database> {
    Database::new(config.database.to_database_config())
        .await
        .with_context(|| format!("failed to open database {}", config.database.path))
}

/// Run the gateway until Ctrl-C, then shut down with the configured grace.
pub async fn run(config: &GatelinkConfig) -> Result<()> {
    ensure!(
        !config.link.port_name.is_empty(),
        "no serial port configured (use --port or [link] port_name)"
    );

    let db = open_database(config).await?;
    db.health_check().await.context("database health check failed")?;

    let gateway = Gateway::start(
        Arc::new(SystemSerial::new()),
        config.gateway(),
        SqliteTokenRepository::new(db.pool().clone()),
        SqliteAccessLogRepository::new(db.pool().clone()),
    )
    .await
    .context("failed to start gateway")?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for interrupt")?;
    info!("Interrupt received");

    let failures = gateway.shutdown(config.shutdown_grace()).await?;
    for failure in &failures {
        warn!(
            code = failure.code.as_deref().unwrap_or("-"),
            error = %failure.error,
            "Access log entry lost"
        );
    }

    db.close().await;
    Ok(())
}

pub fn ports() -> Result<()> {
    let ports = SystemSerial::new()
        .available_ports()
        .context("failed to enumerate serial ports")?;

    if ports.is_empty() {
        println!("No serial ports found");
    }
    for port in ports {
        println!("{port}");
    }
    Ok(())
}

pub async fn logs(config: &GatelinkConfig, limit: i64, code: Option<&str>, json: bool) -> Result<()> {
    let db = open_database(config).await?;
    let repo = SqliteAccessLogRepository::new(db.pool().clone());

    let entries = match code {
        Some(code) => repo.find_by_code(code, limit).await?,
        None => repo.recent(limit).await?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        for entry in &entries {
            println!("{}", format_entry(entry));
        }
    }

    db.close().await;
    Ok(())
}

fn format_entry(entry: &AccessLog) -> String {
    format!(
        "{}  {:<12}  {:<14}  {}",
        entry.access_time.format("%Y-%m-%d %H:%M:%S%.3f"),
        entry.access_status,
        entry.rfid_code,
        entry
            .denied_reason
            .as_deref()
            .or(entry.owner_name.as_deref())
            .unwrap_or("-"),
    )
}

pub async fn enroll(
    config: &GatelinkConfig,
    code: &str,
    owner: Option<&str>,
    active: bool,
) -> Result<()> {
    let db = open_database(config).await?;
    let users = SqliteUserRepository::new(db.pool().clone());
    let tokens = SqliteTokenRepository::new(db.pool().clone());

    let user_id = match owner {
        Some(name) => Some(users.create(&User::new(name)).await?),
        None => None,
    };

    let mut token = RfidToken::new(code, user_id);
    if !active {
        token = token.inactive();
    }
    let id = tokens
        .create(&token)
        .await
        .with_context(|| format!("failed to register token {code}"))?;

    println!("Registered token {code} (id {id})");
    db.close().await;
    Ok(())
}
