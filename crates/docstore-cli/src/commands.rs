use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use colored::Colorize;
use serde_json::Value;
use tracing::debug;

use docstore::{Actor, DocumentStore, Entity, EntitySet, Payload, Query, Settings, WriteOptions};

use crate::cli::*;

/// Database file used when neither `--db` nor the settings file names one.
const DEFAULT_DB: &str = "docstore.db";

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let settings = resolve_settings(cli.config.as_deref(), cli.db.clone())?;
    debug!(db = ?settings.database.path, prefix = %settings.database.table_prefix, "opening store");
    let store = Arc::new(DocumentStore::open(&settings).context("opening document store")?);
    let out = Output { format: cli.format };
    match cli.command {
        Command::Init => cmd_init(&settings, &out),
        Command::Put(args) => cmd_put(&store, args, &out),
        Command::Get(args) => {
            let found = store.object_by_uuid(&args.uuid)?;
            out.one(&args.uuid, found)
        }
        Command::Iri(args) => {
            let found = store.object_by_iri(&args.iri)?;
            out.one(&args.iri, found)
        }
        Command::Query(args) => cmd_query(&store, args, &out),
        Command::Delete(args) => cmd_delete(&store, args, &out),
        Command::MarkDirty => {
            let n = store.mark_all_dirty()?;
            out.count("marked", n, format!("{} {} documents marked dirty", "✓".green(), n.to_string().bold()))
        }
        Command::Pending(args) => cmd_pending(&store, args, &out),
        Command::Reindex(args) => cmd_reindex(&store, args, &out),
    }
}

/// Settings from `config` if given, with `db` overriding the database file.
pub fn resolve_settings(config: Option<&Path>, db: Option<PathBuf>) -> anyhow::Result<Settings> {
    let mut settings = match config {
        Some(path) => Settings::load(path)
            .with_context(|| format!("reading settings from {}", path.display()))?,
        None => Settings::default(),
    };
    if let Some(db) = db {
        settings.database.path = Some(db);
    }
    if settings.database.path.is_none() {
        settings.database.path = Some(PathBuf::from(DEFAULT_DB));
    }
    Ok(settings)
}

fn cmd_init(settings: &Settings, out: &Output) -> anyhow::Result<()> {
    let path = settings
        .database
        .path
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    match out.format {
        OutputFormat::Json => out.json(&serde_json::json!({ "initialized": path })),
        OutputFormat::Text => {
            println!("{} Initialized document store in {}", "✓".green().bold(), path.bold());
            if !settings.database.table_prefix.is_empty() {
                println!("  Table prefix: {}", settings.database.table_prefix.cyan());
            }
            if let Some(root) = &settings.store.mirror_root {
                println!("  Mirror: {}", root.display().to_string().cyan());
            }
            Ok(())
        }
    }
}

fn cmd_put(store: &Arc<DocumentStore>, args: PutArgs, out: &Output) -> anyhow::Result<()> {
    let payload = parse_payload(&args.json)?;
    let actor = args
        .actor
        .as_deref()
        .map(Actor::parse)
        .transpose()
        .context("parsing --actor")?;
    let options = WriteOptions {
        lazy: args.lazy,
        owner: args.owner,
    };
    let written = store.write(payload, actor.as_ref(), &options)?;
    match out.format {
        OutputFormat::Json => out.json(&Value::Object(written)),
        OutputFormat::Text => {
            let uuid = written.get("uuid").and_then(Value::as_str).unwrap_or_default();
            let state = if args.lazy { "stored (index pending)" } else { "stored" };
            println!("{} {} {}", "✓".green().bold(), uuid.yellow(), state);
            Ok(())
        }
    }
}

/// A JSON object from the command line.
pub fn parse_payload(text: &str) -> anyhow::Result<Payload> {
    let value: Value = serde_json::from_str(text).context("document is not valid JSON")?;
    match value {
        Value::Object(map) => Ok(map),
        other => anyhow::bail!("document must be a JSON object, got {}", type_name(&other)),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

pub fn build_query(args: &QueryArgs) -> Query {
    let mut query = Query::new().offset(args.offset).limit(args.limit);
    if let Some(uuid) = &args.uuid {
        query = query.uuid(uuid.as_str());
    }
    for kind in &args.kind {
        query = query.kind(kind.as_str());
    }
    if let Some(realm) = &args.realm {
        query = query.realm(realm.as_str());
    }
    if let Some(tag) = &args.tag {
        query = query.tag(tag.as_str());
    }
    if let Some(iri) = &args.iri {
        query = query.iri(iri.as_str());
    }
    for tag in args.tags.iter().filter(|t| !t.trim().is_empty()) {
        query = query.with_tag(tag.as_str());
    }
    if let Some(order) = &args.order {
        query = query.order(order);
    }
    query
}

fn cmd_query(store: &Arc<DocumentStore>, args: QueryArgs, out: &Output) -> anyhow::Result<()> {
    let mut set = store.query(&build_query(&args))?;
    let mut found = Vec::new();
    while let Some(entity) = set.next_entity()? {
        found.push(entity);
    }
    match out.format {
        OutputFormat::Json => {
            let documents: Vec<Value> = found.iter().map(|e| Value::Object(e.to_payload())).collect();
            out.json(&serde_json::json!({ "total": set.total(), "documents": documents }))
        }
        OutputFormat::Text => {
            for entity in &found {
                println!("{}", summary_line(entity));
            }
            println!(
                "{} of {} matching documents",
                found.len().to_string().bold(),
                set.total().to_string().bold()
            );
            Ok(())
        }
    }
}

fn cmd_delete(store: &Arc<DocumentStore>, args: DeleteArgs, out: &Output) -> anyhow::Result<()> {
    let removed = store.delete_by_uuid(&args.uuid)?;
    match out.format {
        OutputFormat::Json => out.json(&serde_json::json!({ "uuid": args.uuid, "deleted": removed })),
        OutputFormat::Text => {
            if removed {
                println!("{} Deleted {}", "✓".green().bold(), args.uuid.yellow());
            } else {
                println!("{} No document {}", "✗".red().bold(), args.uuid.yellow());
            }
            Ok(())
        }
    }
}

fn cmd_pending(store: &Arc<DocumentStore>, args: PendingArgs, out: &Output) -> anyhow::Result<()> {
    let pending = store.pending_dirty(args.limit)?;
    match out.format {
        OutputFormat::Json => out.json(&serde_json::json!({ "pending": pending })),
        OutputFormat::Text => {
            if pending.is_empty() {
                println!("{} Index up to date.", "✓".green());
            }
            for uuid in &pending {
                println!("  {} {}", "dirty:".yellow(), uuid);
            }
            Ok(())
        }
    }
}

fn cmd_reindex(store: &Arc<DocumentStore>, args: ReindexArgs, out: &Output) -> anyhow::Result<()> {
    match args.uuid {
        Some(uuid) => {
            if !store.update_object_with_uuid(&uuid)? {
                anyhow::bail!("no document {uuid}");
            }
            out.count("reindexed", 1, format!("{} Reindexed {}", "✓".green().bold(), uuid.yellow()))
        }
        None => {
            let n = store.reindex_pending(args.batch)?;
            out.count("reindexed", n, format!("{} Reindexed {} documents", "✓".green().bold(), n.to_string().bold()))
        }
    }
}

fn summary_line(entity: &Entity) -> String {
    let uuid = entity.uuid().unwrap_or("-");
    let kind = entity.get_raw("kind").and_then(Value::as_str).unwrap_or("-");
    let modified = entity
        .modified()
        .map(|t| t.to_string())
        .unwrap_or_default();
    format!("{}  {}  {}", uuid.yellow(), kind.cyan(), modified.dimmed())
}

struct Output {
    format: OutputFormat,
}

impl Output {
    fn json(&self, value: &Value) -> anyhow::Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }

    fn one(&self, key: &str, entity: Option<Entity>) -> anyhow::Result<()> {
        let Some(entity) = entity else {
            anyhow::bail!("no document {key}");
        };
        let payload = Value::Object(entity.to_payload());
        match self.format {
            OutputFormat::Json => self.json(&payload),
            OutputFormat::Text => {
                println!("{}", summary_line(&entity));
                println!("{}", serde_json::to_string_pretty(&payload)?);
                Ok(())
            }
        }
    }

    fn count(&self, field: &str, n: usize, text: String) -> anyhow::Result<()> {
        match self.format {
            OutputFormat::Json => {
                let mut map = serde_json::Map::new();
                map.insert(field.to_string(), n.into());
                self.json(&Value::Object(map))
            }
            OutputFormat::Text => {
                println!("{text}");
                Ok(())
            }
        }
    }
}
