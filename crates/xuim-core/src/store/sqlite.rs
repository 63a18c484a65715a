// # SQLite Store
//
// sqlx-backed implementation of PanelStore over the panel's database.
//
// ## Schema
//
// The tables are owned by the panel; only these columns are touched:
//
// ```text
// inbounds(id, remark, port, settings)
// client_traffics(email, down, up, all_time)
// ```
//
// ## Transactions
//
// Each `begin()` takes a pooled connection and issues `BEGIN`. sqlx rolls
// the transaction back when it is dropped without `commit()`, so an error
// anywhere in an engine leaves the database untouched.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, Transaction};

use crate::Error;
use crate::config::StoreConfig;
use crate::model::{InboundRow, InboundScope, InboundSummary, TrafficCounters, TrafficEntry};
use crate::traits::store::{PanelStore, StoreTransaction};

type InboundTuple = (i64, Option<String>, Option<i64>, Option<String>);
type TrafficTuple = (String, Option<i64>, Option<i64>, Option<i64>);

const SELECT_INBOUNDS: &str = "SELECT id, remark, port, settings FROM inbounds ORDER BY id";
const SELECT_INBOUND_BY_ID: &str =
    "SELECT id, remark, port, settings FROM inbounds WHERE id = ? ORDER BY id";
const SELECT_INBOUNDS_BY_PORT: &str =
    "SELECT id, remark, port, settings FROM inbounds WHERE port = ? ORDER BY id";
const SELECT_TRAFFIC: &str =
    "SELECT email, down, up, all_time FROM client_traffics WHERE email = ? LIMIT 1";

/// Tables created by [`SqliteStore::create_schema`]
///
/// A minimal subset of the panel's schema for fixtures and development
/// databases. Never needed against a real panel database.
const SCHEMA: [&str; 2] = [
    "CREATE TABLE IF NOT EXISTS inbounds (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        remark TEXT,
        port INTEGER,
        settings TEXT
    )",
    "CREATE TABLE IF NOT EXISTS client_traffics (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        email TEXT,
        down INTEGER DEFAULT 0,
        up INTEGER DEFAULT 0,
        all_time INTEGER DEFAULT 0
    )",
];

fn to_inbound((id, remark, port, settings): InboundTuple) -> InboundRow {
    InboundRow {
        id,
        remark,
        port: port.unwrap_or_default(),
        settings: settings.unwrap_or_default(),
    }
}

fn to_traffic((email, down, up, all_time): TrafficTuple) -> TrafficEntry {
    TrafficEntry::new(
        email,
        TrafficCounters {
            down: down.unwrap_or_default(),
            up: up.unwrap_or_default(),
            all_time: all_time.unwrap_or_default(),
        },
    )
}

/// SQLite store over the panel database
///
/// # Example
///
/// ```rust,no_run
/// use xuim_core::store::SqliteStore;
/// use xuim_core::traits::PanelStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = SqliteStore::open("/etc/x-ui/x-ui.db").await?;
///     for inbound in store.list_inbounds().await? {
///         println!("{} {}", inbound.id, inbound.port);
///     }
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open an existing database with default settings
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        Self::connect(&StoreConfig::Sqlite {
            path: path.as_ref().to_path_buf(),
            busy_timeout_secs: 5,
            max_connections: 1,
            create_if_missing: false,
        })
        .await
    }

    /// Connect using a store configuration
    ///
    /// Fails with [`Error::Connection`] if the database cannot be opened.
    pub async fn connect(config: &StoreConfig) -> Result<Self, Error> {
        config.validate()?;

        let StoreConfig::Sqlite {
            path,
            busy_timeout_secs,
            max_connections,
            create_if_missing,
        } = config
        else {
            return Err(Error::config(format!(
                "SqliteStore cannot be built from a {} store config",
                config.type_name()
            )));
        };

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(*create_if_missing)
            .busy_timeout(Duration::from_secs(*busy_timeout_secs));

        let pool = SqlitePoolOptions::new()
            .max_connections(*max_connections)
            .connect_with(options)
            .await
            .map_err(|e| Error::connection(format!("'{}': {}", path.display(), e)))?;

        tracing::debug!("Opened SQLite store at {}", path.display());

        Ok(Self { pool })
    }

    /// Create the `inbounds` and `client_traffics` tables if missing
    pub async fn create_schema(&self) -> Result<(), Error> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Underlying connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl PanelStore for SqliteStore {
    async fn list_inbounds(&self) -> Result<Vec<InboundSummary>, Error> {
        let rows = sqlx::query_as::<_, (i64, Option<String>, Option<i64>)>(
            "SELECT id, remark, port FROM inbounds ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, remark, port)| InboundSummary {
                id,
                remark,
                port: port.unwrap_or_default(),
            })
            .collect())
    }

    async fn fetch_inbounds(&self, scope: InboundScope) -> Result<Vec<InboundRow>, Error> {
        let rows = match scope {
            InboundScope::All => {
                sqlx::query_as::<_, InboundTuple>(SELECT_INBOUNDS)
                    .fetch_all(&self.pool)
                    .await?
            }
            InboundScope::Inbound(id) => {
                sqlx::query_as::<_, InboundTuple>(SELECT_INBOUND_BY_ID)
                    .bind(id)
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        Ok(rows.into_iter().map(to_inbound).collect())
    }

    async fn get_traffic(&self, email: &str) -> Result<Option<TrafficEntry>, Error> {
        let row = sqlx::query_as::<_, TrafficTuple>(SELECT_TRAFFIC)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(to_traffic))
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, Error> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(SqliteTransaction { tx }))
    }

    fn store_name(&self) -> &'static str {
        "sqlite"
    }

    async fn close(&self) {
        self.pool.close().await;
        tracing::debug!("Closed SQLite store");
    }
}

/// Open SQLite transaction
struct SqliteTransaction {
    tx: Transaction<'static, Sqlite>,
}

#[async_trait]
impl StoreTransaction for SqliteTransaction {
    async fn fetch_inbounds(&mut self, scope: InboundScope) -> Result<Vec<InboundRow>, Error> {
        let rows = match scope {
            InboundScope::All => {
                sqlx::query_as::<_, InboundTuple>(SELECT_INBOUNDS)
                    .fetch_all(&mut *self.tx)
                    .await?
            }
            InboundScope::Inbound(id) => {
                sqlx::query_as::<_, InboundTuple>(SELECT_INBOUND_BY_ID)
                    .bind(id)
                    .fetch_all(&mut *self.tx)
                    .await?
            }
        };
        Ok(rows.into_iter().map(to_inbound).collect())
    }

    async fn fetch_inbounds_by_port(&mut self, port: i64) -> Result<Vec<InboundRow>, Error> {
        let rows = sqlx::query_as::<_, InboundTuple>(SELECT_INBOUNDS_BY_PORT)
            .bind(port)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(rows.into_iter().map(to_inbound).collect())
    }

    async fn get_traffic(&mut self, email: &str) -> Result<Option<TrafficEntry>, Error> {
        let row = sqlx::query_as::<_, TrafficTuple>(SELECT_TRAFFIC)
            .bind(email)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.map(to_traffic))
    }

    async fn update_settings(&mut self, inbound_id: i64, settings: &str) -> Result<(), Error> {
        let result = sqlx::query("UPDATE inbounds SET settings = ? WHERE id = ?")
            .bind(settings)
            .bind(inbound_id)
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::store(format!("inbound {} not found", inbound_id)));
        }
        Ok(())
    }

    async fn insert_traffic(&mut self, entry: &TrafficEntry) -> Result<(), Error> {
        sqlx::query("INSERT INTO client_traffics (email, down, up, all_time) VALUES (?, ?, ?, ?)")
            .bind(&entry.email)
            .bind(entry.counters.down)
            .bind(entry.counters.up)
            .bind(entry.counters.all_time)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn update_traffic(&mut self, entry: &TrafficEntry) -> Result<(), Error> {
        let result =
            sqlx::query("UPDATE client_traffics SET down = ?, up = ?, all_time = ? WHERE email = ?")
                .bind(entry.counters.down)
                .bind(entry.counters.up)
                .bind(entry.counters.all_time)
                .bind(&entry.email)
                .execute(&mut *self.tx)
                .await?;

        if result.rows_affected() == 0 {
            return Err(Error::store(format!("no traffic row for {}", entry.email)));
        }
        Ok(())
    }

    async fn delete_traffic(&mut self, email: &str) -> Result<u64, Error> {
        let result = sqlx::query("DELETE FROM client_traffics WHERE email = ?")
            .bind(email)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> Result<(), Error> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), Error> {
        self.tx.rollback().await?;
        Ok(())
    }
}
