//! Query criteria and their compilation to a relational statement.
//!
//! Criteria combine with AND. Each tag in `tags` adds its own join against
//! the tag table, so a document must carry every listed tag. Results are
//! grouped by document so no document appears twice.

use std::fmt;

use serde_json::Value;

use docstore_db::{Database, SqlValue};
use docstore_index::clean_tag;
use docstore_types::{Payload, TableNames};

use crate::error::QueryError;

/// Something a query ignored rather than failing on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueryWarning {
    UnsupportedKey(String),
    UnknownOrder(String),
}

impl fmt::Display for QueryWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedKey(key) => write!(f, "unsupported query key {key:?} ignored"),
            Self::UnknownOrder(key) => write!(f, "unknown order key {key:?} ignored"),
        }
    }
}

/// Structured query criteria.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Query {
    pub uuid: Option<String>,
    /// Any of these kinds.
    pub kinds: Vec<String>,
    pub tag: Option<String>,
    pub realm: Option<String>,
    pub iri: Option<String>,
    /// All of these tags.
    pub tags: Vec<String>,
    /// Order keys; a leading `-` means ascending.
    pub order: Vec<String>,
    pub offset: u64,
    /// Zero means no limit.
    pub limit: u64,
    /// Criteria keys that were present but not understood.
    pub unsupported: Vec<String>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn uuid(mut self, uuid: impl Into<String>) -> Self {
        self.uuid = Some(uuid.into());
        self
    }

    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.kinds.push(kind.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn realm(mut self, realm: impl Into<String>) -> Self {
        self.realm = Some(realm.into());
        self
    }

    pub fn iri(mut self, iri: impl Into<String>) -> Self {
        self.iri = Some(iri.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn order(mut self, keys: &str) -> Self {
        self.order.extend(split_list(keys));
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    /// Build a query from a criteria mapping.
    ///
    /// Null values count as absent. Keys outside the recognized set are
    /// kept in [`Query::unsupported`] and reported as warnings on compile.
    pub fn from_criteria(criteria: &Payload) -> Result<Self, QueryError> {
        let mut query = Self::default();
        for (key, value) in criteria {
            if value.is_null() {
                continue;
            }
            match key.as_str() {
                "uuid" => query.uuid = Some(scalar(key, value)?),
                "tag" => query.tag = Some(scalar(key, value)?),
                "realm" => query.realm = Some(scalar(key, value)?),
                "iri" => query.iri = Some(scalar(key, value)?),
                "kind" => {
                    query.kinds = match value {
                        Value::Array(items) => items
                            .iter()
                            .map(|item| scalar(key, item))
                            .collect::<Result<_, _>>()?,
                        other => vec![scalar(key, other)?],
                    };
                    if query.kinds.is_empty() {
                        return Err(QueryError::invalid(key, "empty kind list"));
                    }
                }
                "tags" => query.tags = list(key, value)?,
                "order" => query.order = list(key, value)?,
                "offset" => query.offset = count(key, value)?,
                "limit" => query.limit = count(key, value)?,
                _ => query.unsupported.push(key.clone()),
            }
        }
        Ok(query)
    }

    /// Compile against `db`'s dialect and the given table names.
    pub fn compile(&self, db: &dyn Database, tables: &TableNames) -> CompiledQuery {
        let q = |ident: &str| db.quote_ident(ident);
        let col = |alias: &str, column: &str| format!("{}.{}", q(alias), q(column));
        let obj_uuid = col("obj", "uuid");

        let mut warnings: Vec<QueryWarning> = self
            .unsupported
            .iter()
            .cloned()
            .map(QueryWarning::UnsupportedKey)
            .collect();

        let mut joins = Vec::new();
        let mut conditions = Vec::new();
        let mut params = Vec::new();

        if let Some(uuid) = &self.uuid {
            conditions.push(format!("{obj_uuid} = ?"));
            params.push(SqlValue::from(uuid));
        }

        // a tag that cleans to nothing still filters; no indexed tag is empty
        let tag = self.tag.as_deref().map(|t| clean_tag(t).unwrap_or_default());
        if !self.kinds.is_empty() || tag.is_some() || self.realm.is_some() {
            joins.push(format!(
                "INNER JOIN {} {} ON {} = {obj_uuid}",
                db.table(&tables.base),
                q("base"),
                col("base", "uuid")
            ));
        }
        match self.kinds.as_slice() {
            [] => {}
            [kind] => {
                conditions.push(format!("{} = ?", col("base", "kind")));
                params.push(SqlValue::from(kind));
            }
            kinds => {
                let marks = vec!["?"; kinds.len()].join(", ");
                conditions.push(format!("{} IN ({marks})", col("base", "kind")));
                params.extend(kinds.iter().map(SqlValue::from));
            }
        }
        if let Some(tag) = tag {
            conditions.push(format!("{} = ?", col("base", "tag")));
            params.push(SqlValue::from(tag));
        }
        if let Some(realm) = &self.realm {
            conditions.push(format!("{} = ?", col("base", "realm")));
            params.push(SqlValue::from(realm));
        }

        if let Some(iri) = &self.iri {
            joins.push(format!(
                "INNER JOIN {} {} ON {} = {obj_uuid}",
                db.table(&tables.iri),
                q("iri"),
                col("iri", "uuid")
            ));
            conditions.push(format!("{} = ?", col("iri", "iri")));
            params.push(SqlValue::from(iri));
        }

        let mut required: Vec<String> = Vec::new();
        for tag in self.tags.iter().filter_map(|t| clean_tag(t)) {
            if !required.contains(&tag) {
                required.push(tag);
            }
        }
        for (i, tag) in required.into_iter().enumerate() {
            let alias = format!("t{}", i + 1);
            joins.push(format!(
                "INNER JOIN {} {} ON {} = {obj_uuid}",
                db.table(&tables.tags),
                q(&alias),
                col(&alias, "uuid")
            ));
            conditions.push(format!("{} = ?", col(&alias, "tag")));
            params.push(SqlValue::from(tag));
        }

        let mut order = Vec::new();
        for key in &self.order {
            let (column, direction) = match key.strip_prefix('-') {
                Some(rest) => (rest, "ASC"),
                None => (key.as_str(), "DESC"),
            };
            match column {
                "created" => order.push(format!("{} {direction}", col("obj", "created"))),
                _ => warnings.push(QueryWarning::UnknownOrder(key.clone())),
            }
        }

        let mut body = format!("FROM {} {}", db.table(&tables.objects), q("obj"));
        for join in &joins {
            body.push(' ');
            body.push_str(join);
        }
        if !conditions.is_empty() {
            body.push_str(" WHERE ");
            body.push_str(&conditions.join(" AND "));
        }
        body.push_str(&format!(" GROUP BY {obj_uuid}"));

        let mut sql = format!("SELECT {}.* {body}", q("obj"));
        if !order.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&order.join(", "));
        }
        if self.limit > 0 {
            sql.push_str(&format!(" LIMIT {}", self.limit));
            if self.offset > 0 {
                sql.push_str(&format!(" OFFSET {}", self.offset));
            }
        }
        let count_sql = format!(
            "SELECT COUNT(*) AS {} FROM (SELECT {obj_uuid} {body}) {}",
            q("total"),
            q("matched")
        );

        CompiledQuery {
            sql,
            count_sql,
            params,
            warnings,
            offset: self.offset,
            limit: self.limit,
        }
    }
}

/// A compiled query: the row statement, a statement counting every match
/// regardless of offset and limit, and the parameters both bind.
#[derive(Clone, Debug, PartialEq)]
pub struct CompiledQuery {
    pub sql: String,
    pub count_sql: String,
    pub params: Vec<SqlValue>,
    pub warnings: Vec<QueryWarning>,
    pub offset: u64,
    pub limit: u64,
}

pub(crate) fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}

fn scalar(key: &str, value: &Value) -> Result<String, QueryError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(QueryError::invalid(
            key,
            format!("expected text, got {}", kind_name(other)),
        )),
    }
}

/// A sequence of scalars, or one string separated by commas or spaces.
fn list(key: &str, value: &Value) -> Result<Vec<String>, QueryError> {
    match value {
        Value::Array(items) => items.iter().map(|item| scalar(key, item)).collect(),
        Value::String(s) => Ok(split_list(s)),
        other => Err(QueryError::invalid(
            key,
            format!("expected a list, got {}", kind_name(other)),
        )),
    }
}

fn split_list(text: &str) -> Vec<String> {
    text.split([',', ' '])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn count(key: &str, value: &Value) -> Result<u64, QueryError> {
    let parsed = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| QueryError::invalid(key, "expected a non-negative integer"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use docstore_db::SqliteDatabase;
    use proptest::prelude::*;
    use serde_json::json;

    fn criteria(value: Value) -> Payload {
        value.as_object().cloned().unwrap()
    }

    fn compile(query: &Query) -> CompiledQuery {
        let db = SqliteDatabase::open_in_memory().unwrap();
        query.compile(&db, &TableNames::default())
    }

    #[test]
    fn empty_criteria_select_everything() {
        let compiled = compile(&Query::from_criteria(&Payload::new()).unwrap());
        assert_eq!(
            compiled.sql,
            r#"SELECT "obj".* FROM "object" "obj" GROUP BY "obj"."uuid""#
        );
        assert!(compiled.params.is_empty());
        assert!(compiled.warnings.is_empty());
    }

    #[test]
    fn parses_every_recognized_key() {
        let query = Query::from_criteria(&criteria(json!({
            "uuid": "u1",
            "kind": ["a", "b"],
            "tag": "Lead",
            "realm": "r",
            "iri": "urn:x",
            "tags": "one, two three",
            "order": "-created",
            "offset": "5",
            "limit": 10
        })))
        .unwrap();
        assert_eq!(query.uuid.as_deref(), Some("u1"));
        assert_eq!(query.kinds, vec!["a", "b"]);
        assert_eq!(query.tags, vec!["one", "two", "three"]);
        assert_eq!(query.order, vec!["-created"]);
        assert_eq!((query.offset, query.limit), (5, 10));
        assert!(query.unsupported.is_empty());
    }

    #[test]
    fn single_kind_string_is_one_kind() {
        let query = Query::from_criteria(&criteria(json!({ "kind": "article" }))).unwrap();
        assert_eq!(query.kinds, vec!["article"]);
        let compiled = compile(&query);
        assert!(compiled.sql.contains(r#""base"."kind" = ?"#));
        assert_eq!(compiled.params, vec![SqlValue::from("article")]);
    }

    #[test]
    fn kind_list_becomes_membership_test() {
        let compiled = compile(&Query::new().kind("a").kind("b"));
        assert!(compiled.sql.contains(r#""base"."kind" IN (?, ?)"#));
        assert_eq!(compiled.params.len(), 2);
    }

    #[test]
    fn one_join_per_required_tag() {
        let compiled = compile(&Query::new().with_tag("x").with_tag("Y").with_tag("x"));
        assert!(compiled.sql.contains(r#"INNER JOIN "object_tags" "t1""#));
        assert!(compiled.sql.contains(r#"INNER JOIN "object_tags" "t2""#));
        assert!(!compiled.sql.contains(r#""t3""#));
        assert_eq!(
            compiled.params,
            vec![SqlValue::from("x"), SqlValue::from("y")]
        );
    }

    #[test]
    fn base_tag_is_cleaned() {
        let compiled = compile(&Query::new().tag("  Lead "));
        assert_eq!(compiled.params, vec![SqlValue::from("lead")]);
    }

    #[test]
    fn blank_base_tag_still_filters() {
        let compiled = compile(&Query::from_criteria(&criteria(json!({ "tag": "  " }))).unwrap());
        assert!(compiled.sql.contains(r#"INNER JOIN "object_base" "base""#));
        assert!(compiled.sql.contains(r#""base"."tag" = ?"#));
        assert_eq!(compiled.params, vec![SqlValue::from("")]);
    }

    #[test]
    fn order_and_window() {
        let compiled = compile(&Query::new().order("created").limit(5).offset(10));
        assert!(compiled
            .sql
            .ends_with(r#"ORDER BY "obj"."created" DESC LIMIT 5 OFFSET 10"#));

        let compiled = compile(&Query::new().order("-created"));
        assert!(compiled.sql.ends_with(r#"ORDER BY "obj"."created" ASC"#));
    }

    #[test]
    fn offset_without_limit_is_ignored() {
        let compiled = compile(&Query::new().offset(3));
        assert!(!compiled.sql.contains("OFFSET"));
        assert_eq!(compiled.offset, 3);
    }

    #[test]
    fn unknown_keys_and_orders_warn() {
        let query = Query::from_criteria(&criteria(json!({
            "colour": "red",
            "order": ["modified", "-created"]
        })))
        .unwrap();
        let compiled = compile(&query);
        assert_eq!(
            compiled.warnings,
            vec![
                QueryWarning::UnsupportedKey("colour".into()),
                QueryWarning::UnknownOrder("modified".into()),
            ]
        );
        assert!(compiled.sql.ends_with(r#"ORDER BY "obj"."created" ASC"#));
    }

    #[test]
    fn malformed_values_fail() {
        for bad in [
            json!({ "uuid": {} }),
            json!({ "kind": [] }),
            json!({ "kind": [["nested"]] }),
            json!({ "tags": true }),
            json!({ "limit": -1 }),
            json!({ "offset": "many" }),
        ] {
            assert!(Query::from_criteria(&criteria(bad.clone())).is_err(), "{bad}");
        }
    }

    #[test]
    fn null_values_are_absent() {
        let query = Query::from_criteria(&criteria(json!({ "kind": null, "limit": null }))).unwrap();
        assert_eq!(query, Query::default());
    }

    #[test]
    fn count_statement_shares_parameters() {
        let db = SqliteDatabase::open_in_memory().unwrap();
        docstore_index::ensure_schema(&db, &TableNames::default()).unwrap();
        let compiled = Query::new().kind("a").with_tag("t").limit(1).compile(&db, &TableNames::default());
        let row = db.row(&compiled.count_sql, &compiled.params).unwrap().unwrap();
        assert_eq!(row.integer("total"), Some(0));
        let cursor = db.query(&compiled.sql, &compiled.params).unwrap();
        assert_eq!(cursor.total(), 0);
    }

    #[test]
    fn prefixed_tables_are_used() {
        let db = SqliteDatabase::open_in_memory().unwrap().with_prefix("app_");
        let compiled = Query::new().iri("urn:x").compile(&db, &TableNames::default());
        assert!(compiled.sql.contains(r#"FROM "app_object" "obj""#));
        assert!(compiled.sql.contains(r#"INNER JOIN "app_object_iri" "iri""#));
    }

    proptest! {
        #[test]
        fn one_tag_join_per_distinct_clean_tag(tags in proptest::collection::vec("[ A-Za-z]{0,6}", 0..10)) {
            let mut query = Query::new();
            for tag in &tags {
                query = query.with_tag(tag.as_str());
            }
            let compiled = compile(&query);
            let mut distinct: Vec<String> = tags.iter().filter_map(|t| clean_tag(t)).collect();
            distinct.sort();
            distinct.dedup();
            prop_assert_eq!(compiled.params.len(), distinct.len());
            prop_assert_eq!(compiled.sql.matches('?').count(), compiled.params.len());
            prop_assert_eq!(compiled.sql.matches("INNER JOIN").count(), distinct.len());
        }
    }
}
