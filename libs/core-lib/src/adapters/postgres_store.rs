use crate::store::{is_safe_identifier, as_text, Filter, FilterOp, SelectQuery, Table};
use crate::{CoreError, TableStore};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use tracing::info;

/// PostgreSQL implementation of the TableStore port using sqlx.
///
/// Rows cross the boundary as JSON: reads use `to_jsonb`, writes go through
/// `jsonb_populate_record`, so the Rust side never maps columns by hand.
/// Filters compare the column's text form, matching the REST adapter.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the bundled schema migrations.
    pub async fn migrate(&self) -> Result<(), CoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(CoreError::infra)?;
        info!("Database migrations applied.");
        Ok(())
    }
}

fn column(name: &str) -> Result<&str, CoreError> {
    if is_safe_identifier(name) {
        Ok(name)
    } else {
        Err(CoreError::Validation(format!("Invalid column name: {}", name)))
    }
}

fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

/// Renders WHERE conditions on alias `t`. Bind values start at `$first_param`.
fn where_clause(filters: &[Filter], first_param: usize) -> Result<(String, Vec<Option<String>>), CoreError> {
    let mut conditions = Vec::with_capacity(filters.len());
    let mut binds = Vec::with_capacity(filters.len());
    for filter in filters {
        let col = column(&filter.column)?;
        match &filter.op {
            FilterOp::Eq(Value::Null) => conditions.push(format!("t.{} IS NULL", col)),
            FilterOp::Eq(value) => {
                binds.push(as_text(value));
                conditions.push(format!("t.{}::text = ${}", col, first_param + binds.len() - 1));
            }
            FilterOp::Search(term) => {
                binds.push(Some(format!("%{}%", escape_like(term))));
                conditions.push(format!("t.{}::text ILIKE ${}", col, first_param + binds.len() - 1));
            }
        }
    }
    let clause = if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    };
    Ok((clause, binds))
}

fn map_write_error(table: Table, err: sqlx::Error) -> CoreError {
    if let Some(db) = err.as_database_error() {
        if db.code().as_deref() == Some("23505") {
            return CoreError::AlreadyExists(format!("{} row already exists", table));
        }
    }
    CoreError::infra(err)
}

#[async_trait]
impl TableStore for PostgresStore {
    async fn select(&self, table: Table, query: &SelectQuery) -> Result<Vec<Value>, CoreError> {
        let (clause, binds) = where_clause(&query.filters, 1)?;
        let mut sql = format!("SELECT to_jsonb(t) FROM {} AS t{}", table, clause);
        if let Some(order) = &query.order {
            sql.push_str(&format!(
                " ORDER BY t.{} {}",
                column(&order.column)?,
                if order.descending { "DESC" } else { "ASC" }
            ));
        }
        if let Some(limit) = query.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let mut q = sqlx::query_scalar::<_, Value>(&sql);
        for bind in binds {
            q = q.bind(bind);
        }
        q.fetch_all(&self.pool).await.map_err(CoreError::infra)
    }

    async fn insert(&self, table: Table, row: Value) -> Result<Value, CoreError> {
        let Value::Object(map) = &row else {
            return Err(CoreError::Validation("Rows must be JSON objects".into()));
        };
        for key in map.keys() {
            column(key)?;
        }
        let sql = format!(
            "INSERT INTO {table} AS t SELECT * FROM jsonb_populate_record(NULL::{table}, $1) RETURNING to_jsonb(t)"
        );
        sqlx::query_scalar::<_, Value>(&sql)
            .bind(&row)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_write_error(table, e))
    }

    async fn update(&self, table: Table, filters: &[Filter], patch: Value) -> Result<Vec<Value>, CoreError> {
        let Value::Object(map) = &patch else {
            return Err(CoreError::Validation("Patch must be a JSON object".into()));
        };
        if map.is_empty() {
            return Ok(Vec::new());
        }
        let assignments = map
            .keys()
            .map(|key| column(key).map(|c| format!("{c} = p.{c}")))
            .collect::<Result<Vec<_>, _>>()?
            .join(", ");
        let (clause, binds) = where_clause(filters, 2)?;
        let sql = format!(
            "UPDATE {table} AS t SET {assignments} FROM jsonb_populate_record(NULL::{table}, $1) AS p{clause} RETURNING to_jsonb(t)"
        );

        let mut q = sqlx::query_scalar::<_, Value>(&sql).bind(&patch);
        for bind in binds {
            q = q.bind(bind);
        }
        q.fetch_all(&self.pool)
            .await
            .map_err(|e| map_write_error(table, e))
    }
}
