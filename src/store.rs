//! PostgreSQL persistence for pipeline output.
//!
//! A [`Store`] owns exactly one connection for its whole life. There is no
//! pool, no reconnection, and no migration: [`Store::create_table`] always
//! drops and recreates its table with one `TEXT` column per frame column plus
//! a synthetic `indice SERIAL PRIMARY KEY`.
//!
//! Identifiers are double-quoted with [`quote_ident`]; values only ever travel
//! as bound `$n` parameters.
//!
//! # Failure policy
//!
//! - A connection failure at construction is logged and leaves the store
//!   without a connection. Every method then returns
//!   [`StoreError::NotConnected`].
//! - Database errors inside `create_table`, `insert_into_table` and
//!   `execute_query` are logged and swallowed.
//! - Programmer errors (empty query, frame without columns) are returned.

use crate::error::StoreError;
use crate::models::Frame;
use crate::utils::normalize_column;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::Connection;
use std::env;
use tracing::{error, info, instrument, warn};

pub const DEFAULT_SCHEMA: &str = "public";

/// Connection parameters. Unset fields fall back to libpq-style defaults.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub user: Option<String>,
    pub password: Option<String>,
    pub host: Option<String>,
    pub database: Option<String>,
    pub port: Option<u16>,
    pub schema: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            user: None,
            password: None,
            host: None,
            database: None,
            port: None,
            schema: DEFAULT_SCHEMA.to_string(),
        }
    }
}

impl DbConfig {
    /// Default connection from `DB_USER`, `DB_PASSWORD`, `DB_HOST`, `DB_NAME`
    /// and `DB_PORT`. An unparsable port is logged and ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let port = lookup("DB_PORT").and_then(|p| match p.parse::<u16>() {
            Ok(port) => Some(port),
            Err(e) => {
                warn!(value = %p, error = %e, "Ignoring invalid DB_PORT");
                None
            }
        });
        Self {
            user: lookup("DB_USER"),
            password: lookup("DB_PASSWORD"),
            host: lookup("DB_HOST"),
            database: lookup("DB_NAME"),
            port,
            schema: DEFAULT_SCHEMA.to_string(),
        }
    }

    pub fn with_schema(mut self, schema: &str) -> Self {
        self.schema = schema.to_string();
        self
    }

    fn connect_options(&self) -> PgConnectOptions {
        let mut opts = PgConnectOptions::new().options([("client_encoding", "utf8")]);
        if let Some(host) = &self.host {
            opts = opts.host(host);
        }
        if let Some(port) = self.port {
            opts = opts.port(port);
        }
        if let Some(user) = &self.user {
            opts = opts.username(user);
        }
        if let Some(password) = &self.password {
            opts = opts.password(password);
        }
        if let Some(database) = &self.database {
            opts = opts.database(database);
        }
        opts
    }
}

/// Double-quote a SQL identifier, doubling any embedded quote.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Thin wrapper around a single PostgreSQL connection.
#[derive(Debug)]
pub struct Store {
    schema: String,
    conn: Option<PgConnection>,
}

impl Store {
    /// Open the store's connection. Never fails: a connection error is logged
    /// and the store is returned without a connection.
    #[instrument(level = "info", skip_all, fields(host = ?config.host, database = ?config.database, schema = %config.schema))]
    pub async fn connect(config: DbConfig) -> Self {
        let conn = match PgConnection::connect_with(&config.connect_options()).await {
            Ok(conn) => {
                info!("Database connection established");
                Some(conn)
            }
            Err(e) => {
                error!(error = %e, "Failed to connect to PostgreSQL");
                None
            }
        };
        Self {
            schema: config.schema,
            conn,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    fn conn(&mut self) -> Result<&mut PgConnection, StoreError> {
        self.conn.as_mut().ok_or(StoreError::NotConnected)
    }

    fn qualified(&self, table: &str) -> String {
        format!("{}.{}", quote_ident(&self.schema), quote_ident(table))
    }

    /// Whether `table` exists in the configured schema.
    #[instrument(level = "debug", skip(self))]
    pub async fn table_exists(&mut self, table: &str) -> Result<bool, StoreError> {
        let schema = self.schema.clone();
        let conn = self.conn()?;
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT FROM information_schema.tables WHERE table_schema = $1 AND table_name = $2)",
        )
        .bind(schema)
        .bind(table)
        .fetch_one(&mut *conn)
        .await?;
        Ok(exists)
    }

    /// Drop `table` if present, recreate it from the frame's columns, and
    /// insert every row in order.
    ///
    /// With `adjust`, column names go through [`normalize_column`] first.
    /// Database errors are logged and swallowed; nothing is committed unless
    /// the whole sequence succeeds.
    #[instrument(level = "info", skip(self, frame), fields(rows = frame.len(), columns = frame.columns().len()))]
    pub async fn create_table(&mut self, table: &str, frame: &Frame, adjust: bool) -> Result<(), StoreError> {
        if frame.columns().is_empty() {
            return Err(StoreError::InvalidArgument(format!(
                "frame for table '{table}' has no columns"
            )));
        }
        info!("Frame has {} rows and {} columns before create_table", frame.len(), frame.columns().len());

        let frame = if adjust {
            frame.map_columns(normalize_column)
        } else {
            frame.clone()
        };
        let qualified = self.qualified(table);
        let conn = self.conn()?;

        match recreate_and_fill(conn, &qualified, &frame).await {
            Ok(()) => info!(table = %qualified, rows = frame.len(), "Table created"),
            Err(e) => error!(table = %qualified, error = %e, "Failed to create or recreate table"),
        }
        Ok(())
    }

    /// Append the frame's rows to an existing table, committing once.
    ///
    /// If the table does not exist nothing is inserted and no error is
    /// returned. Database errors are logged and swallowed.
    #[instrument(level = "info", skip(self, frame), fields(rows = frame.len()))]
    pub async fn insert_into_table(&mut self, table: &str, frame: &Frame, adjust: bool) -> Result<(), StoreError> {
        let frame = if adjust {
            frame.map_columns(normalize_column)
        } else {
            frame.clone()
        };

        if !self.table_exists(table).await? {
            warn!(table, "Table does not exist; nothing inserted");
            return Ok(());
        }

        let qualified = self.qualified(table);
        let conn = self.conn()?;
        match insert_rows(conn, &qualified, &frame).await {
            Ok(()) => info!(table = %qualified, rows = frame.len(), "Rows inserted"),
            Err(e) => error!(table = %qualified, error = %e, "Failed to insert rows"),
        }
        Ok(())
    }

    /// Run an arbitrary SQL string (several statements allowed) and commit.
    ///
    /// An empty or blank query is rejected before the connection is touched.
    #[instrument(level = "info", skip_all)]
    pub async fn execute_query(&mut self, query: &str) -> Result<(), StoreError> {
        if query.trim().is_empty() {
            return Err(StoreError::InvalidArgument(
                "query is empty".to_string(),
            ));
        }

        let conn = self.conn()?;
        match sqlx::raw_sql(query).execute(&mut *conn).await {
            Ok(_) => info!("Query executed successfully"),
            Err(e) => error!(error = %e, "Failed to execute query"),
        }
        Ok(())
    }
}

async fn recreate_and_fill(conn: &mut PgConnection, qualified: &str, frame: &Frame) -> Result<(), sqlx::Error> {
    let mut tx = conn.begin().await?;

    sqlx::query(&format!("DROP TABLE IF EXISTS {qualified}"))
        .execute(&mut *tx)
        .await?;
    sqlx::query(&format!("CREATE TABLE {qualified} (indice SERIAL PRIMARY KEY)"))
        .execute(&mut *tx)
        .await?;
    for column in frame.columns() {
        sqlx::query(&format!(
            "ALTER TABLE {qualified} ADD COLUMN {} TEXT",
            quote_ident(column)
        ))
        .execute(&mut *tx)
        .await?;
    }

    let insert = insert_statement(qualified, frame.columns());
    for row in frame.rows() {
        let mut query = sqlx::query(&insert);
        for cell in row {
            query = query.bind(cell.as_deref());
        }
        query.execute(&mut *tx).await?;
    }

    tx.commit().await
}

async fn insert_rows(conn: &mut PgConnection, qualified: &str, frame: &Frame) -> Result<(), sqlx::Error> {
    let mut tx = conn.begin().await?;

    let insert = insert_statement(qualified, frame.columns());
    for row in frame.rows() {
        let mut query = sqlx::query(&insert);
        for cell in row {
            query = query.bind(cell.as_deref());
        }
        query.execute(&mut *tx).await?;
    }

    tx.commit().await
}

/// `INSERT INTO t ("a", "b") VALUES ($1, $2)` for the given columns.
fn insert_statement(qualified: &str, columns: &[String]) -> String {
    let names = columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = (1..=columns.len())
        .map(|i| format!("${i}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("INSERT INTO {qualified} ({names}) VALUES ({placeholders})")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn disconnected() -> Store {
        Store {
            schema: DEFAULT_SCHEMA.to_string(),
            conn: None,
        }
    }

    fn frame(columns: &[&str], rows: &[&[&str]]) -> Frame {
        let mut frame = Frame::new(columns.iter().copied());
        for row in rows {
            frame
                .push_row(row.iter().map(|c| Some(c.to_string())).collect())
                .unwrap();
        }
        frame
    }

    fn lookup_in(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_db_config_from_env_vars() {
        let config = DbConfig::from_lookup(lookup_in(&[
            ("DB_USER", "airflow"),
            ("DB_PASSWORD", "segredo"),
            ("DB_HOST", "db.internal"),
            ("DB_NAME", "noticias"),
            ("DB_PORT", "5433"),
        ]));
        assert_eq!(config.user.as_deref(), Some("airflow"));
        assert_eq!(config.password.as_deref(), Some("segredo"));
        assert_eq!(config.host.as_deref(), Some("db.internal"));
        assert_eq!(config.database.as_deref(), Some("noticias"));
        assert_eq!(config.port, Some(5433));
        assert_eq!(config.schema, DEFAULT_SCHEMA);
    }

    #[test]
    fn test_db_config_invalid_port_is_ignored() {
        let config = DbConfig::from_lookup(lookup_in(&[("DB_HOST", "localhost"), ("DB_PORT", "not-a-port")]));
        assert_eq!(config.host.as_deref(), Some("localhost"));
        assert_eq!(config.port, None);

        let config = DbConfig::from_lookup(lookup_in(&[("DB_PORT", "70000")]));
        assert_eq!(config.port, None);
    }

    #[test]
    fn test_db_config_unset_vars() {
        let config = DbConfig::from_lookup(lookup_in(&[])).with_schema("staging");
        assert!(config.user.is_none());
        assert!(config.password.is_none());
        assert!(config.host.is_none());
        assert!(config.database.is_none());
        assert!(config.port.is_none());
        assert_eq!(config.schema, "staging");
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("news"), "\"news\"");
        assert_eq!(quote_ident("Título"), "\"Título\"");
        assert_eq!(quote_ident("a\"; DROP TABLE x; --"), "\"a\"\"; DROP TABLE x; --\"");
    }

    #[test]
    fn test_insert_statement() {
        let sql = insert_statement(
            "\"public\".\"news\"",
            &["title".to_string(), "source".to_string()],
        );
        assert_eq!(
            sql,
            "INSERT INTO \"public\".\"news\" (\"title\", \"source\") VALUES ($1, $2)"
        );
    }

    #[test]
    fn test_qualified_name() {
        let store = disconnected();
        assert_eq!(store.qualified("trends"), "\"public\".\"trends\"");
    }

    #[tokio::test]
    async fn test_execute_empty_query_is_invalid_argument() {
        // A store without a connection would answer NotConnected if the
        // connection were touched; InvalidArgument proves it was not.
        let mut store = disconnected();
        let err = store.execute_query("").await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument(_)));

        let err = store.execute_query("   \n").await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_disconnected_store_reports_not_connected() {
        let mut store = disconnected();
        assert!(!store.is_connected());
        assert!(matches!(
            store.table_exists("news").await,
            Err(StoreError::NotConnected)
        ));
        assert!(matches!(
            store.execute_query("SELECT 1").await,
            Err(StoreError::NotConnected)
        ));
        let f = frame(&["a"], &[&["1"]]);
        assert!(matches!(
            store.create_table("t", &f, true).await,
            Err(StoreError::NotConnected)
        ));
        assert!(matches!(
            store.insert_into_table("t", &f, true).await,
            Err(StoreError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_create_table_rejects_frame_without_columns() {
        let mut store = disconnected();
        let empty = Frame::new(Vec::<String>::new());
        let err = store.create_table("t", &empty, true).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_connect_failure_leaves_store_disconnected() {
        let config = DbConfig {
            host: Some("127.0.0.1".to_string()),
            port: Some(9),
            user: Some("nobody".to_string()),
            password: Some("nothing".to_string()),
            database: Some("none".to_string()),
            ..Default::default()
        };
        let store = Store::connect(config).await;
        assert!(!store.is_connected());
        assert_eq!(store.schema(), DEFAULT_SCHEMA);
    }

    mod postgres {
        //! Run against a throwaway PostgreSQL container.
        //!
        //! ```bash
        //! cargo test -- --ignored
        //! ```

        use super::*;
        use testcontainers::core::{ContainerPort, WaitFor};
        use testcontainers::runners::AsyncRunner;
        use testcontainers::{ContainerAsync, GenericImage, ImageExt};

        async fn setup_store() -> (Store, ContainerAsync<GenericImage>) {
            let container = GenericImage::new("postgres", "16-alpine")
                .with_exposed_port(ContainerPort::Tcp(5432))
                .with_wait_for(WaitFor::message_on_stderr(
                    "database system is ready to accept connections",
                ))
                .with_env_var("POSTGRES_PASSWORD", "postgres")
                .with_env_var("POSTGRES_DB", "postgres")
                .start()
                .await
                .expect("Failed to start PostgreSQL container");

            let host = container.get_host().await.expect("Failed to get host");
            let port = container
                .get_host_port_ipv4(5432)
                .await
                .expect("Failed to get port");

            let config = DbConfig {
                user: Some("postgres".to_string()),
                password: Some("postgres".to_string()),
                host: Some(host.to_string()),
                database: Some("postgres".to_string()),
                port: Some(port),
                ..Default::default()
            };

            // The server restarts once after initdb; retry until it stays up
            const MAX_RETRIES: u32 = 30;
            for _ in 0..MAX_RETRIES {
                let store = Store::connect(config.clone()).await;
                if store.is_connected() {
                    return (store, container);
                }
                tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            }
            panic!("Failed to connect to database after {MAX_RETRIES} retries");
        }

        async fn row_count(store: &mut Store, table: &str) -> i64 {
            let sql = format!("SELECT COUNT(*) FROM {}", store.qualified(table));
            let conn = store.conn().unwrap();
            sqlx::query_scalar(&sql).fetch_one(&mut *conn).await.unwrap()
        }

        #[tokio::test]
        #[ignore = "requires Docker"]
        async fn test_create_table_then_exists() {
            let (mut store, _container) = setup_store().await;

            assert!(!store.table_exists("trending_searches").await.unwrap());
            let f = frame(&["Term", "Rank"], &[&["eleições", "1"], &["futebol", "2"]]);
            store.create_table("trending_searches", &f, true).await.unwrap();

            assert!(store.table_exists("trending_searches").await.unwrap());
            assert_eq!(row_count(&mut store, "trending_searches").await, 2);
        }

        #[tokio::test]
        #[ignore = "requires Docker"]
        async fn test_create_table_twice_recreates() {
            let (mut store, _container) = setup_store().await;

            let first = frame(&["term"], &[&["a"], &["b"], &["c"]]);
            let second = frame(&["term"], &[&["d"]]);
            store.create_table("trends", &first, true).await.unwrap();
            store.create_table("trends", &second, true).await.unwrap();

            assert_eq!(row_count(&mut store, "trends").await, 1);
        }

        #[tokio::test]
        #[ignore = "requires Docker"]
        async fn test_create_table_keeps_row_order_and_nulls() {
            let (mut store, _container) = setup_store().await;

            let mut f = Frame::new(["title", "source"]);
            f.push_row(vec![Some("first".into()), None]).unwrap();
            f.push_row(vec![Some("second".into()), Some("G1".into())]).unwrap();
            store.create_table("news", &f, false).await.unwrap();

            let conn = store.conn().unwrap();
            let rows: Vec<(i32, String, Option<String>)> =
                sqlx::query_as("SELECT indice, title, source FROM \"public\".\"news\" ORDER BY indice")
                    .fetch_all(&mut *conn)
                    .await
                    .unwrap();
            assert_eq!(
                rows,
                vec![
                    (1, "first".to_string(), None),
                    (2, "second".to_string(), Some("G1".to_string())),
                ]
            );
        }

        #[tokio::test]
        #[ignore = "requires Docker"]
        async fn test_insert_into_missing_table_is_noop() {
            let (mut store, _container) = setup_store().await;

            let f = frame(&["term"], &[&["x"]]);
            store.insert_into_table("missing", &f, true).await.unwrap();
            assert!(!store.table_exists("missing").await.unwrap());
        }

        #[tokio::test]
        #[ignore = "requires Docker"]
        async fn test_insert_into_existing_table_appends() {
            let (mut store, _container) = setup_store().await;

            let f = frame(&["Generated At", "article"], &[&["2026-10-17", "texto"]]);
            store.create_table("articles", &f, true).await.unwrap();
            store.insert_into_table("articles", &f, true).await.unwrap();
            store.insert_into_table("articles", &f, true).await.unwrap();

            assert_eq!(row_count(&mut store, "articles").await, 3);
        }

        #[tokio::test]
        #[ignore = "requires Docker"]
        async fn test_database_errors_are_swallowed() {
            let (mut store, _container) = setup_store().await;

            store.execute_query("SELECT * FROM does_not_exist").await.unwrap();

            // unknown column: insert fails, error swallowed, nothing committed
            store
                .create_table("t", &frame(&["a"], &[&["1"]]), true)
                .await
                .unwrap();
            store
                .insert_into_table("t", &frame(&["b"], &[&["2"]]), true)
                .await
                .unwrap();
            assert_eq!(row_count(&mut store, "t").await, 1);
        }

        #[tokio::test]
        #[ignore = "requires Docker"]
        async fn test_execute_query_commits() {
            let (mut store, _container) = setup_store().await;

            store
                .execute_query("CREATE SCHEMA IF NOT EXISTS press; CREATE TABLE press.notes (body TEXT)")
                .await
                .unwrap();

            let mut store_in_schema = Store {
                schema: "press".to_string(),
                conn: store.conn.take(),
            };
            assert!(store_in_schema.table_exists("notes").await.unwrap());
        }
    }
}
