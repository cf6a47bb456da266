// used for the record store
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Number, Value};
use tracing::debug;

use crate::error::{Result, RuleError};
use crate::settings::{ConnectionParams, StoreKind};
use crate::store::{Connector, Record, RecordStore};

lazy_static! {
    // record kinds and field names end up inside SQL text, so only plain identifiers pass
    static ref IDENTIFIER: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
}

// ------------- Connector -------------
/// Opens SQLite databases; any other store kind fails to initialize.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteConnector;

#[async_trait]
impl Connector for SqliteConnector {
    async fn connect(&self, params: &ConnectionParams) -> Result<Arc<dyn RecordStore>> {
        if params.kind != StoreKind::Sqlite {
            return Err(RuleError::StoreInitialization(format!(
                "no connector for store kind '{}'",
                params.kind
            )));
        }
        let params = params.clone();
        // opening and bootstrapping touch the file system
        let store = tokio::task::spawn_blocking(move || SqliteStore::open(&params))
            .await
            .map_err(|e| RuleError::StoreInitialization(e.to_string()))??;
        let store: Arc<dyn RecordStore> = Arc::new(store);
        Ok(store)
    }
}

// ------------- Store -------------
pub struct SqliteStore {
    connection: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open(params: &ConnectionParams) -> Result<Self> {
        let initialization = |e: rusqlite::Error| RuleError::StoreInitialization(e.to_string());
        let connection = if params.database == ":memory:" {
            Connection::open_in_memory().map_err(initialization)?
        } else {
            Connection::open(&params.database).map_err(initialization)?
        };
        if let Some(entities) = &params.entities {
            let script = std::fs::read_to_string(entities).map_err(|e| {
                RuleError::StoreInitialization(format!("could not read entities '{entities}': {e}"))
            })?;
            connection.execute_batch(&script).map_err(initialization)?;
        }
        debug!(database = %params.database, "opened sqlite record store");
        Ok(Self::from_connection(connection))
    }
    pub fn from_connection(connection: Connection) -> Self {
        Self {
            connection: Arc::new(Mutex::new(connection)),
        }
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn find_one(
        &self,
        record_kind: &str,
        field_name: &str,
        field_value: &Value,
    ) -> Result<Option<Record>> {
        for identifier in [record_kind, field_name] {
            if !IDENTIFIER.is_match(identifier) {
                return Err(RuleError::StoreQuery(format!(
                    "'{identifier}' is not a valid record kind or field name"
                )));
            }
        }
        let sql = format!("select * from \"{record_kind}\" where \"{field_name}\" = ?1 limit 1");
        let parameter = to_sql(field_value);
        let connection = Arc::clone(&self.connection);
        tokio::task::spawn_blocking(move || -> Result<Option<Record>> {
            let connection = connection.lock().map_err(|e| RuleError::Lock(e.to_string()))?;
            let mut statement = connection.prepare(&sql)?;
            let columns: Vec<String> = statement
                .column_names()
                .into_iter()
                .map(String::from)
                .collect();
            let record = statement
                .query_row([parameter], |row| {
                    let mut record = Record::new();
                    for (i, column) in columns.iter().enumerate() {
                        record.insert(column.clone(), from_sql(row.get_ref(i)?));
                    }
                    Ok(record)
                })
                .optional()?;
            Ok(record)
        })
        .await
        .map_err(|e| RuleError::StoreQuery(e.to_string()))?
    }
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(*b as i64),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Array(bytes.iter().map(|b| Value::from(*b)).collect()),
    }
}
