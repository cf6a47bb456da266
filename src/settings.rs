use std::fmt;
use std::path::Path;

// config lets connection parameters come from a file and the environment
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    Sqlite,
    Postgres,
    Mysql,
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StoreKind::Sqlite => write!(f, "sqlite"),
            StoreKind::Postgres => write!(f, "postgres"),
            StoreKind::Mysql => write!(f, "mysql"),
        }
    }
}

fn default_database() -> String {
    String::from(":memory:")
}

// ------------- ConnectionParams -------------
/// Where the record store lives. Only the connector interprets these.
#[derive(Clone, PartialEq, Deserialize)]
pub struct ConnectionParams {
    #[serde(rename = "type", default)]
    pub kind: StoreKind,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_database")]
    pub database: String,
    /// Script describing the record kinds, run right after connecting.
    #[serde(default)]
    pub entities: Option<String>,
}

impl ConnectionParams {
    pub fn sqlite(database: impl Into<String>) -> Self {
        Self {
            kind: StoreKind::Sqlite,
            host: None,
            port: None,
            username: None,
            password: None,
            database: database.into(),
            entities: None,
        }
    }
    pub fn with_entities(mut self, entities: impl Into<String>) -> Self {
        self.entities = Some(entities.into());
        self
    }

    /// Loads `fieldrule.{toml,json,yaml}` from the working directory when
    /// present, then `DB_*` environment variables on top.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Like [`ConnectionParams::load`], with an extra file layered between the
    /// default file and the environment.
    pub fn load_from(file: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder().add_source(File::with_name("fieldrule").required(false));
        if let Some(path) = file {
            builder = builder.add_source(File::from(path));
        }
        let settings = builder
            .add_source(Environment::with_prefix("DB").try_parsing(true))
            .build()?;
        Ok(settings.try_deserialize()?)
    }
}

impl Default for ConnectionParams {
    fn default() -> Self {
        Self::sqlite(default_database())
    }
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("kind", &self.kind)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("database", &self.database)
            .field("entities", &self.entities)
            .finish()
    }
}
