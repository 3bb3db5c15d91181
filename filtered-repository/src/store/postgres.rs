//! PostgreSQL store over a sqlx pool

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query as SqlxQuery;
use sqlx::{Column, PgPool, Postgres, Row, TypeInfo};

use super::{Store, StoreResult};
use crate::config::DatabaseConfig;
use crate::database::create_pool;
use crate::error::{StoreError, StoreOperation};
use crate::query::{sql, Dialect, Query};
use crate::value::{Record, Value};

/// Store that renders statements to PostgreSQL and runs them on a pool
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool from configuration, retrying as configured
    pub async fn connect(config: &DatabaseConfig) -> StoreResult<Self> {
        create_pool(config).await.map(Self::new)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn bind_values<'q>(
    mut query: SqlxQuery<'q, Postgres, PgArguments>,
    binds: &'q [Value],
) -> SqlxQuery<'q, Postgres, PgArguments> {
    for value in binds {
        query = match value {
            Value::Null => query.bind(None::<String>),
            Value::Bool(b) => query.bind(*b),
            Value::Integer(n) => query.bind(*n),
            Value::Float(n) => query.bind(*n),
            Value::Timestamp(ts) => query.bind(*ts),
            Value::Text(s) => query.bind(s.as_str()),
        };
    }
    query
}

/// Decode a row by inspecting each column's declared type
fn decode_row(row: &PgRow) -> Result<Record, sqlx::Error> {
    let mut record = Record::new();
    for column in row.columns() {
        let i = column.ordinal();
        let value = match column.type_info().name() {
            "BOOL" => row.try_get::<Option<bool>, _>(i)?.map(Value::Bool),
            "INT2" => row
                .try_get::<Option<i16>, _>(i)?
                .map(|n| Value::Integer(n.into())),
            "INT4" => row
                .try_get::<Option<i32>, _>(i)?
                .map(|n| Value::Integer(n.into())),
            "INT8" => row.try_get::<Option<i64>, _>(i)?.map(Value::Integer),
            "FLOAT4" => row
                .try_get::<Option<f32>, _>(i)?
                .map(|n| Value::Float(n.into())),
            "FLOAT8" => row.try_get::<Option<f64>, _>(i)?.map(Value::Float),
            "TIMESTAMPTZ" => row
                .try_get::<Option<DateTime<Utc>>, _>(i)?
                .map(Value::Timestamp),
            "TIMESTAMP" => row
                .try_get::<Option<NaiveDateTime>, _>(i)?
                .map(|ts| Value::Timestamp(ts.and_utc())),
            "UUID" => row
                .try_get::<Option<uuid::Uuid>, _>(i)?
                .map(|id| Value::Text(id.to_string())),
            "JSON" | "JSONB" => row
                .try_get::<Option<serde_json::Value>, _>(i)?
                .map(|json| Value::Text(json.to_string())),
            // TEXT, VARCHAR, BPCHAR, NAME; anything else surfaces as a decode error
            _ => row.try_get::<Option<String>, _>(i)?.map(Value::Text),
        };
        record.insert(column.name(), value.unwrap_or(Value::Null));
    }
    Ok(record)
}

fn store_error(err: sqlx::Error, operation: StoreOperation, table: &str) -> StoreError {
    StoreError::from(err)
        .with_operation(operation)
        .add_context(table.to_string())
}

#[async_trait]
impl Store for PgStore {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn fetch_rows(&self, query: &Query) -> StoreResult<Vec<Record>> {
        let rendered = sql::render(query, Dialect::Postgres);
        let table = query.table();

        let rows = bind_values(sqlx::query(&rendered.sql), &rendered.binds)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| store_error(e, StoreOperation::Query, table))?;

        rows.iter()
            .map(decode_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| store_error(e, StoreOperation::Query, table))
    }

    async fn fetch_count(&self, query: &Query) -> StoreResult<u64> {
        let rendered = sql::render(query, Dialect::Postgres);
        let table = query.table();

        let row = bind_values(sqlx::query(&rendered.sql), &rendered.binds)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| store_error(e, StoreOperation::Query, table))?;
        let total: i64 = row
            .try_get("total")
            .map_err(|e| store_error(e, StoreOperation::Query, table))?;

        Ok(u64::try_from(total).unwrap_or(0))
    }

    async fn insert(&self, query: &Query) -> StoreResult<Option<i64>> {
        let rendered = sql::render(query, Dialect::Postgres);
        let table = query.table();
        let statement = bind_values(sqlx::query(&rendered.sql), &rendered.binds);

        let Query::Insert {
            returning: Some(key),
            ..
        } = query
        else {
            statement
                .execute(&self.pool)
                .await
                .map_err(|e| store_error(e, StoreOperation::Insert, table))?;
            return Ok(None);
        };

        let first = statement
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_error(e, StoreOperation::Insert, table))?;

        match first {
            Some(row) => {
                let record =
                    decode_row(&row).map_err(|e| store_error(e, StoreOperation::Insert, table))?;
                Ok(record.get_i64(key))
            }
            None => Ok(None),
        }
    }

    async fn execute(&self, query: &Query) -> StoreResult<u64> {
        let rendered = sql::render(query, Dialect::Postgres);

        let result = bind_values(sqlx::query(&rendered.sql), &rendered.binds)
            .execute(&self.pool)
            .await
            .map_err(|e| store_error(e, StoreOperation::Update, query.table()))?;

        Ok(result.rows_affected())
    }
}
