//! groupstore - command-line access to an entity collection
//!
//! Opens `<base-dir>/var/entities.db` (creating `var/` if needed) and runs a
//! single CRUD command against it. Entities are printed as JSON on stdout.
//!
//! Exit codes: 0 success, 2 entity not found, 3 identity conflict, 1 anything else.

mod fields;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use groupstore_core::{Config, EntityId, ListOrder, Record, Store};
use std::path::PathBuf;
use std::process::ExitCode;

use crate::fields::FieldArgs;

#[derive(Parser)]
#[command(name = "groupstore")]
#[command(about = "Add, read, update and delete entities in a local store")]
#[command(version)]
struct Args {
    /// Directory holding `var/` (defaults to the current directory)
    #[arg(long, global = true, value_name = "DIR")]
    base_dir: Option<PathBuf>,

    /// Config file (defaults to `<base-dir>/groupstore.toml` when present)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Add an entity; an id is assigned unless one is given
    Add {
        #[command(flatten)]
        fields: FieldArgs,
    },
    /// Print one entity
    Get { id: i64 },
    /// Replace the fields of an existing entity
    Update {
        id: i64,
        #[command(flatten)]
        fields: FieldArgs,
    },
    /// Delete an entity
    Delete { id: i64 },
    /// Print all entities as a JSON array
    List {
        /// inserted, id, or updated
        #[arg(long, default_value = "inserted", value_parser = parse_order)]
        order: ListOrder,
    },
    /// Print the number of stored entities
    Count,
}

fn parse_order(s: &str) -> std::result::Result<ListOrder, String> {
    ListOrder::parse(s)
        .ok_or_else(|| format!("unknown order {:?} (expected inserted, id, or updated)", s))
}

fn main() -> ExitCode {
    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {:#}", err);
            exit_code(&err)
        }
    }
}

fn run(args: Args) -> Result<()> {
    let base_dir = match args.base_dir {
        Some(dir) => dir,
        None => std::env::current_dir().context("failed to resolve current directory")?,
    };

    let config = match &args.config {
        Some(path) => Config::load_from(path),
        None => Config::load(&base_dir),
    }
    .context("failed to load configuration")?;

    let _log_guard = groupstore_core::logging::init(&config.logging, &base_dir)
        .context("failed to initialize logging")?;

    tracing::info!(base_dir = %base_dir.display(), "groupstore starting");

    let store: Store = Store::open_with(&base_dir, &config.store).context("failed to open store")?;

    let output = match args.command {
        Command::Add { fields } => {
            let record = fields.into_record().context("invalid entity")?;
            let added = store.add(record).context("failed to add entity")?;
            serde_json::to_value(added)?
        }
        Command::Get { id } => {
            let record = store
                .get(EntityId(id))
                .with_context(|| format!("failed to get entity {}", id))?;
            serde_json::to_value(record)?
        }
        Command::Update { id, fields } => {
            let mut record = fields.into_record().context("invalid entity")?;
            record.id = Some(EntityId(id));
            store
                .update(&record)
                .with_context(|| format!("failed to update entity {}", id))?;
            serde_json::to_value(record)?
        }
        Command::Delete { id } => {
            store
                .delete(EntityId(id))
                .with_context(|| format!("failed to delete entity {}", id))?;
            serde_json::json!({ "deleted": id })
        }
        Command::List { order } => {
            let records: Vec<Record> = store.list_by(order).context("failed to list entities")?;
            serde_json::to_value(records)?
        }
        Command::Count => serde_json::json!(store.count().context("failed to count entities")?),
    };

    let rendered = if args.pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    println!("{}", rendered);

    Ok(())
}

fn exit_code(err: &anyhow::Error) -> ExitCode {
    match err.downcast_ref::<groupstore_core::Error>() {
        Some(e) if e.is_not_found() => ExitCode::from(2),
        Some(e) if e.is_conflict() => ExitCode::from(3),
        _ => ExitCode::FAILURE,
    }
}
