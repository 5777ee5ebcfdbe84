//! `courier` - deliver one message from the command line.
//!
//! ```text
//! courier < message.json          send, print the DeliveryResult as JSON
//! courier set <key> <value>       store a transport setting
//! courier get <key>               print a stored setting
//! courier unset <key>             remove a stored setting
//! courier log [limit]             print recent delivery log entries
//! ```
//!
//! The database lives at `$COURIER_DATABASE`, or `courier/courier.db` in the
//! platform data directory.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, bail};
use courier_core::config::keys;
use courier_core::{
    ConfigResolver, DeliveryLog, DeliveryLogRepository, HttpApiProvider, HttpProviderConfig,
    Mailer, OutboundMessage, SettingsRepository, SmtpTransport,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_LIMIT: u32 = 20;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "courier=info,courier_core=info,courier_smtp=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let database = database_path()?;
    let args: Vec<String> = std::env::args().skip(1).collect();

    match args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        [] => send(&database).await,
        ["set", key, value] => set(&database, key, value).await,
        ["get", key] => get(&database, key).await,
        ["unset", key] => unset(&database, key).await,
        ["log"] => log(&database, DEFAULT_LOG_LIMIT).await,
        ["log", limit] => {
            let limit = limit
                .parse()
                .with_context(|| format!("invalid limit {limit:?}"))?;
            log(&database, limit).await
        }
        _ => bail!("usage: courier [set <key> <value> | get <key> | unset <key> | log [limit]] < message.json"),
    }
}

async fn send(database: &str) -> anyhow::Result<ExitCode> {
    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .context("failed to read message from stdin")?;
    let message: OutboundMessage =
        serde_json::from_str(&input).context("stdin is not a valid message document")?;

    let settings = SettingsRepository::new(database)
        .await
        .context("failed to open settings store")?;
    let log = DeliveryLogRepository::new(database)
        .await
        .context("failed to open delivery log")?;

    let mailer = Mailer::new(
        ConfigResolver::new(settings),
        SmtpTransport::rustls().context("failed to set up TLS")?,
        HttpApiProvider::new(HttpProviderConfig::default()),
        DeliveryLog::new(log),
    );

    let result = mailer.send(&message).await.context("message rejected")?;
    println!("{}", serde_json::to_string(&result)?);

    Ok(if result.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn settings_store(database: &str, key: &str) -> anyhow::Result<SettingsRepository> {
    if !keys::ALL.contains(&key) {
        bail!("unknown setting {key:?}; expected one of {}", keys::ALL.join(", "));
    }
    SettingsRepository::new(database)
        .await
        .context("failed to open settings store")
}

async fn set(database: &str, key: &str, value: &str) -> anyhow::Result<ExitCode> {
    settings_store(database, key).await?.set(key, value).await?;
    tracing::info!(key, "Setting stored");
    Ok(ExitCode::SUCCESS)
}

async fn get(database: &str, key: &str) -> anyhow::Result<ExitCode> {
    match settings_store(database, key).await?.get(key).await? {
        Some(_) if key == keys::PASSWORD => println!("<redacted>"),
        Some(value) => println!("{value}"),
        None => return Ok(ExitCode::FAILURE),
    }
    Ok(ExitCode::SUCCESS)
}

async fn unset(database: &str, key: &str) -> anyhow::Result<ExitCode> {
    settings_store(database, key).await?.delete(key).await?;
    tracing::info!(key, "Setting removed");
    Ok(ExitCode::SUCCESS)
}

async fn log(database: &str, limit: u32) -> anyhow::Result<ExitCode> {
    let log = DeliveryLogRepository::new(database)
        .await
        .context("failed to open delivery log")?;
    for entry in log.recent(limit).await? {
        println!("{}", serde_json::to_string(&entry)?);
    }
    Ok(ExitCode::SUCCESS)
}

fn database_path() -> anyhow::Result<String> {
    if let Some(path) = std::env::var_os("COURIER_DATABASE") {
        return path
            .into_string()
            .map_err(|_| anyhow::anyhow!("COURIER_DATABASE is not valid UTF-8"));
    }

    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("courier");
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create {}", data_dir.display()))?;

    let path = data_dir.join("courier.db");
    path.to_str()
        .map(str::to_string)
        .with_context(|| format!("database path {} is not valid UTF-8", path.display()))
}
