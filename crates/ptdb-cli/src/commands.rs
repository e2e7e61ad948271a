use std::path::PathBuf;

use anyhow::Context;
use colored::Colorize;
use ptdb_store::{Database, DbConfig, Digest, OpenRegistry};
use ptdb_types::{DocumentInfo, Value, ROOT};
use serde_json::json;
use tracing::debug;

use crate::cli::*;

/// Result of one command, rendered afterwards in the requested format.
#[derive(Debug, PartialEq)]
pub enum Outcome {
    Value(Option<Value>),
    Unset { path: String, removed: bool },
    Info {
        file: PathBuf,
        info: DocumentInfo,
        digest: Option<Digest>,
        records: usize,
    },
}

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => DbConfig::load(path)
            .with_context(|| format!("could not load config {}", path.display()))?,
        None => DbConfig::default(),
    };
    let db = Database::new(&cli.database, OpenRegistry::new(), config)
        .context("invalid database settings")?;
    let outcome = execute(&db, cli.command).await?;

    match cli.format {
        OutputFormat::Text => println!("{}", render_text(&outcome)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&render_json(&outcome))?),
    }
    Ok(())
}

/// Load `db`, run `command` against it and close it again. The database
/// is closed even when the command fails.
pub async fn execute(db: &Database, command: Command) -> anyhow::Result<Outcome> {
    db.load()
        .await
        .with_context(|| format!("could not load {}", db.file_path().display()))?;
    debug!(path = %db.file_path().display(), "database loaded for command");
    let outcome = apply(db, command).await;
    if let Err(e) = &outcome {
        debug!(error = %e, "command failed, closing anyway");
    }
    db.close()
        .await
        .with_context(|| format!("could not close {}", db.file_path().display()))?;
    outcome
}

async fn apply(db: &Database, command: Command) -> anyhow::Result<Outcome> {
    let outcome = match command {
        Command::Get(args) => Outcome::Value(
            db.read(args.path.as_str())
                .await
                .with_context(|| format!("could not read {}", args.path))?,
        ),
        Command::Set(args) => Outcome::Value(Some(
            db.write(args.path.as_str(), parse_value(&args.value))
                .await
                .with_context(|| format!("could not write {}", args.path))?,
        )),
        Command::Push(args) => Outcome::Value(Some(Value::Array(
            db.push(args.path.as_str(), parse_value(&args.value))
                .await
                .with_context(|| format!("could not push onto {}", args.path))?,
        ))),
        Command::Unshift(args) => Outcome::Value(Some(Value::Array(
            db.unshift(args.path.as_str(), parse_value(&args.value))
                .await
                .with_context(|| format!("could not unshift onto {}", args.path))?,
        ))),
        Command::Pop(args) => Outcome::Value(
            db.pop(args.path.as_str())
                .await
                .with_context(|| format!("could not pop from {}", args.path))?,
        ),
        Command::Shift(args) => Outcome::Value(
            db.shift(args.path.as_str())
                .await
                .with_context(|| format!("could not shift from {}", args.path))?,
        ),
        Command::Unset(args) => {
            let removed = db
                .unset(args.path.as_str())
                .await
                .with_context(|| format!("could not unset {}", args.path))?;
            Outcome::Unset { path: args.path, removed }
        }
        Command::Info => {
            let records = match db.read(ROOT).await? {
                Some(Value::Object(map)) => map.len(),
                _ => 0,
            };
            Outcome::Info {
                file: db.file_path().to_path_buf(),
                info: db.info().await?,
                digest: db.digest().await,
                records,
            }
        }
    };
    Ok(outcome)
}

/// Interpret a command-line value as JSON, falling back to a plain string.
pub fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_owned()))
}

pub fn render_json(outcome: &Outcome) -> Value {
    match outcome {
        Outcome::Value(value) => value.clone().unwrap_or(Value::Null),
        Outcome::Unset { path, removed } => json!({ "path": path, "removed": removed }),
        Outcome::Info { file, info, digest, records } => json!({
            "file": file.display().to_string(),
            "created": info.created,
            "modified": info.modified,
            "digest": digest.map(|d| d.to_hex()),
            "records": records,
        }),
    }
}

pub fn render_text(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Value(Some(Value::String(s))) => s.clone(),
        Outcome::Value(Some(value)) => {
            serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
        }
        Outcome::Value(None) => "(not set)".dimmed().to_string(),
        Outcome::Unset { path, removed: true } => format!("{} Removed {}", "✓".green(), path.bold()),
        Outcome::Unset { path, removed: false } => format!("{} was not set", path.bold()),
        Outcome::Info { file, info, digest, records } => {
            let digest = digest.map_or_else(|| "-".to_string(), |d| d.to_hex());
            [
                format!("Database: {}", file.display().to_string().bold()),
                format!("  Records:  {records}"),
                format!("  Created:  {}", info.created),
                format!("  Modified: {}", info.modified),
                format!("  Digest:   {}", digest.cyan()),
            ]
            .join("\n")
        }
    }
}
