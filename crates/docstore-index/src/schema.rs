//! Table setup for the primary and index tables.

use docstore_db::{Database, DbResult};
use docstore_types::TableNames;
use tracing::info;

/// Create the four tables and their lookup indexes if they do not exist.
///
/// Idempotent: safe to run at every start-up.
pub fn ensure_schema(db: &dyn Database, tables: &TableNames) -> DbResult<()> {
    let objects = db.table(&tables.objects);
    let base = db.table(&tables.base);
    let iri = db.table(&tables.iri);
    let tags = db.table(&tables.tags);
    let ix = |table: &str, suffix: &str| db.table(&format!("{table}_{suffix}"));

    let ddl = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {objects} (
            "uuid" TEXT NOT NULL PRIMARY KEY,
            "data" TEXT NOT NULL,
            "created" TEXT NOT NULL,
            "creator_scheme" TEXT,
            "creator_uuid" TEXT,
            "modified" TEXT NOT NULL,
            "modifier_scheme" TEXT,
            "modifier_uuid" TEXT,
            "owner" TEXT,
            "dirty" INTEGER NOT NULL DEFAULT 1
        );
        CREATE INDEX IF NOT EXISTS {objects_created} ON {objects} ("created");
        CREATE INDEX IF NOT EXISTS {objects_dirty} ON {objects} ("dirty");

        CREATE TABLE IF NOT EXISTS {base} (
            "uuid" TEXT NOT NULL PRIMARY KEY,
            "kind" TEXT,
            "realm" TEXT,
            "tag" TEXT
        );
        CREATE INDEX IF NOT EXISTS {base_kind} ON {base} ("kind");
        CREATE INDEX IF NOT EXISTS {base_realm} ON {base} ("realm");
        CREATE INDEX IF NOT EXISTS {base_tag} ON {base} ("tag");

        CREATE TABLE IF NOT EXISTS {tags} (
            "uuid" TEXT NOT NULL,
            "tag" TEXT NOT NULL,
            PRIMARY KEY ("uuid", "tag")
        );
        CREATE INDEX IF NOT EXISTS {tags_tag} ON {tags} ("tag");

        CREATE TABLE IF NOT EXISTS {iri} (
            "uuid" TEXT NOT NULL,
            "iri" TEXT NOT NULL,
            PRIMARY KEY ("uuid", "iri")
        );
        CREATE INDEX IF NOT EXISTS {iri_iri} ON {iri} ("iri");
        "#,
        objects_created = ix(&tables.objects, "created"),
        objects_dirty = ix(&tables.objects, "dirty"),
        base_kind = ix(&tables.base, "kind"),
        base_realm = ix(&tables.base, "realm"),
        base_tag = ix(&tables.base, "tag"),
        tags_tag = ix(&tables.tags, "tag"),
        iri_iri = ix(&tables.iri, "iri"),
    );
    db.execute_batch(&ddl)?;
    info!(objects = %tables.objects, "schema ready");
    Ok(())
}
