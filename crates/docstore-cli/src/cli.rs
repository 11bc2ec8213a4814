use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "docstore",
    about = "Schemaless document store on SQLite",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// TOML settings file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Database file, overriding the settings file
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create the document and index tables
    Init,
    /// Write a document given as JSON
    Put(PutArgs),
    /// Show the document with a uuid
    Get(GetArgs),
    /// Show the document carrying an IRI
    Iri(IriArgs),
    /// List documents matching criteria
    Query(QueryArgs),
    /// Delete a document and its index rows
    Delete(DeleteArgs),
    /// Flag every document for reindexing
    MarkDirty,
    /// List documents waiting for reindexing
    Pending(PendingArgs),
    /// Rebuild index rows for one document or all pending ones
    Reindex(ReindexArgs),
}

#[derive(Args)]
pub struct PutArgs {
    pub json: String,
    /// Writer as scheme:uuid
    #[arg(long)]
    pub actor: Option<String>,
    #[arg(long)]
    pub owner: Option<String>,
    /// Leave the document dirty instead of indexing it now
    #[arg(long)]
    pub lazy: bool,
}

#[derive(Args)]
pub struct GetArgs {
    pub uuid: String,
}

#[derive(Args)]
pub struct IriArgs {
    pub iri: String,
}

#[derive(Args)]
pub struct QueryArgs {
    #[arg(long)]
    pub uuid: Option<String>,
    #[arg(long)]
    pub kind: Vec<String>,
    #[arg(long)]
    pub realm: Option<String>,
    #[arg(long)]
    pub tag: Option<String>,
    #[arg(long)]
    pub iri: Option<String>,
    /// Comma-separated tags that must all be present
    #[arg(long, value_delimiter = ',')]
    pub tags: Vec<String>,
    /// Sort keys, e.g. `-created`
    #[arg(long, allow_hyphen_values = true)]
    pub order: Option<String>,
    #[arg(long, default_value = "0")]
    pub offset: u64,
    #[arg(short = 'n', long, default_value = "0")]
    pub limit: u64,
}

#[derive(Args)]
pub struct DeleteArgs {
    pub uuid: String,
}

#[derive(Args)]
pub struct PendingArgs {
    #[arg(short = 'n', long, default_value = "10")]
    pub limit: usize,
}

#[derive(Args)]
pub struct ReindexArgs {
    #[arg(long)]
    pub uuid: Option<String>,
    #[arg(long, default_value = "100")]
    pub batch: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_init() {
        let cli = Cli::try_parse_from(["docstore", "init"]).unwrap();
        assert!(matches!(cli.command, Command::Init));
        assert!(cli.db.is_none());
    }

    #[test]
    fn parse_put() {
        let cli = Cli::try_parse_from([
            "docstore",
            "put",
            r#"{"kind":"note"}"#,
            "--actor",
            "local:0b3b6c9e-6b1e-4b9c-8a4e-2d1f0c9a7e55",
            "--lazy",
        ])
        .unwrap();
        if let Command::Put(args) = cli.command {
            assert_eq!(args.json, r#"{"kind":"note"}"#);
            assert!(args.lazy);
            assert!(args.actor.is_some());
            assert!(args.owner.is_none());
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_query_repeats_kind_and_splits_tags() {
        let cli = Cli::try_parse_from([
            "docstore", "query", "--kind", "note", "--kind", "task", "--tags", "a,b", "-n", "5",
        ])
        .unwrap();
        if let Command::Query(args) = cli.command {
            assert_eq!(args.kind, vec!["note", "task"]);
            assert_eq!(args.tags, vec!["a", "b"]);
            assert_eq!(args.limit, 5);
            assert_eq!(args.offset, 0);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_query_descending_order() {
        let cli = Cli::try_parse_from(["docstore", "query", "--order", "-created"]).unwrap();
        if let Command::Query(args) = cli.command {
            assert_eq!(args.order.as_deref(), Some("-created"));
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_pending_default_limit() {
        let cli = Cli::try_parse_from(["docstore", "pending"]).unwrap();
        if let Command::Pending(args) = cli.command {
            assert_eq!(args.limit, 10);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_reindex_one() {
        let cli = Cli::try_parse_from(["docstore", "reindex", "--uuid", "abc"]).unwrap();
        if let Command::Reindex(args) = cli.command {
            assert_eq!(args.uuid.as_deref(), Some("abc"));
            assert_eq!(args.batch, 100);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_mark_dirty() {
        let cli = Cli::try_parse_from(["docstore", "mark-dirty"]).unwrap();
        assert!(matches!(cli.command, Command::MarkDirty));
    }

    #[test]
    fn parse_global_flags_after_command() {
        let cli = Cli::try_parse_from([
            "docstore", "get", "u", "--db", "docs.db", "--format", "json", "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.format, OutputFormat::Json));
        assert_eq!(cli.db, Some(PathBuf::from("docs.db")));
    }

    #[test]
    fn put_requires_json() {
        assert!(Cli::try_parse_from(["docstore", "put"]).is_err());
    }
}
