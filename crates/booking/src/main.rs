use std::path::PathBuf;

use anyhow::Result;
use booking::{Config, Database, Row, Store, Value};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Booking - inspect and edit the booking assistant's data
#[derive(Parser, Debug)]
#[command(name = "booking")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Connection string; a postgres:// URL selects remote mode
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Directory holding the embedded snapshot
    #[arg(long, env = "DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print every row returned by a query
    Query {
        sql: String,
        /// Positional parameters, parsed as JSON scalars (bare words are text)
        #[arg(allow_negative_numbers = true)]
        params: Vec<String>,
    },
    /// Print the first row returned by a query
    One {
        sql: String,
        #[arg(allow_negative_numbers = true)]
        params: Vec<String>,
    },
    /// Run a statement and wait for the server to acknowledge it
    Exec {
        sql: String,
        #[arg(allow_negative_numbers = true)]
        params: Vec<String>,
    },
    /// Reload every cached table from the server
    Refresh,
    /// Show the backend and the state of each cached table
    Status,
}

#[derive(Serialize)]
struct StatusReport {
    mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    snapshot: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tables: Vec<TableReport>,
}

#[derive(Serialize)]
struct TableReport {
    table: String,
    state: &'static str,
    rows: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays valid JSON.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "booking=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = Config::from_env();
    if let Some(url) = cli.database_url {
        config.database_url = Some(url);
    }
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }

    let db = Database::connect(&config).await?;
    let outcome = run(&db, cli.command).await;
    db.close().await;
    outcome
}

async fn run(db: &Database, command: Command) -> Result<()> {
    match command {
        Command::Query { sql, params } => {
            let rows = db.fetch_all_async(&sql, &parse_params(&params)).await?;
            print_json(&rows)?;
        }
        Command::One { sql, params } => {
            let row: Option<Row> = db.fetch_one_async(&sql, &parse_params(&params)).await?;
            print_json(&row)?;
        }
        Command::Exec { sql, params } => {
            db.execute_async(&sql, &parse_params(&params)).await?;
            db.flush().await;
            tracing::info!("Statement applied");
        }
        Command::Refresh => {
            db.force_cache_refresh().await?;
            tracing::info!("Cache refreshed");
        }
        Command::Status => {
            let tables = db
                .cache_status()
                .unwrap_or_default()
                .into_iter()
                .map(|s| TableReport {
                    table: s.table,
                    state: s.state.as_str(),
                    rows: s.rows,
                })
                .collect();
            let report = StatusReport {
                mode: db.mode().to_string(),
                snapshot: match db {
                    Database::Embedded(store) => {
                        store.snapshot_path().map(|p| p.display().to_string())
                    }
                    Database::Remote(_) => None,
                },
                tables,
            };
            print_json(&report)?;
        }
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_params(raw: &[String]) -> Vec<Value> {
    raw.iter().map(|p| parse_param(p)).collect()
}

/// `42` is an integer, `1.5` a real, `true` is 1, `null` is NULL, `"42"` is
/// text. Anything that is not a JSON scalar is taken as literal text.
fn parse_param(raw: &str) -> Value {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Null) => Value::Null,
        Ok(serde_json::Value::Bool(b)) => Value::from(b),
        Ok(serde_json::Value::Number(n)) => match n.as_i64() {
            Some(i) => Value::Integer(i),
            None => n
                .as_f64()
                .map(Value::Real)
                .unwrap_or_else(|| Value::Text(raw.to_string())),
        },
        Ok(serde_json::Value::String(s)) => Value::Text(s),
        _ => Value::Text(raw.to_string()),
    }
}
