//! SQLite-backed sink.
//!
//! Inserts the summary row into an existing table with a single `INSERT`.
//! The table is never created or altered here.

use super::Sink;
use crate::error::SinkError;
use crate::models::Insertable;
use rusqlite::{params, Connection, InterruptHandle};
use std::path::Path;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Schema-qualified table name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    schema: String,
    table: String,
}

impl TableRef {
    /// Build a table reference, rejecting empty names.
    pub fn new(schema: &str, table: &str) -> Result<Self, SinkError> {
        let schema = schema.trim();
        let table = table.trim();

        if table.is_empty() {
            return Err(SinkError::InvalidTable("table name is empty".to_string()));
        }
        if schema.is_empty() {
            return Err(SinkError::InvalidTable("schema name is empty".to_string()));
        }

        Ok(Self {
            schema: schema.to_string(),
            table: table.to_string(),
        })
    }

    /// `"schema"."table"` with embedded quotes doubled.
    pub fn quoted(&self) -> String {
        format!("{}.{}", quote_ident(&self.schema), quote_ident(&self.table))
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn insert_sql(table: &TableRef) -> String {
    let placeholders: Vec<String> = (1..=Insertable::COLUMNS.len())
        .map(|i| format!("?{}", i))
        .collect();

    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table.quoted(),
        Insertable::COLUMNS.join(", "),
        placeholders.join(", ")
    )
}

/// Sink writing one row per invocation to a SQLite table.
///
/// Each row is inserted inside its own transaction. A write that is
/// cancelled or times out before its commit starts is rolled back.
pub struct SqliteSink {
    conn: Arc<Mutex<Connection>>,
    interrupt: Arc<InterruptHandle>,
    table: TableRef,
}

impl SqliteSink {
    /// Open (or create) the database file at `path`.
    pub fn open(path: &Path, table: TableRef) -> Result<Self, SinkError> {
        let conn = Connection::open(path)?;
        info!("Opened database: {}", path.display());
        Self::from_connection(Arc::new(Mutex::new(conn)), table)
    }

    /// Wrap an existing connection.
    pub fn from_connection(
        conn: Arc<Mutex<Connection>>,
        table: TableRef,
    ) -> Result<Self, SinkError> {
        let interrupt = conn
            .lock()
            .map_err(|e| SinkError::Lock(e.to_string()))?
            .get_interrupt_handle();

        Ok(Self {
            conn,
            interrupt: Arc::new(interrupt),
            table,
        })
    }

    async fn insert(
        &mut self,
        record: &Insertable,
        limit: Option<Duration>,
    ) -> Result<(), SinkError> {
        let run_identifier = record.run_identifier;
        let ticket = WriteTicket::new(Arc::clone(&self.interrupt));
        let state = Arc::clone(&ticket.state);
        let conn = Arc::clone(&self.conn);
        let table = self.table.clone();
        let record = record.clone();

        let mut task = tokio::task::spawn_blocking(move || {
            let result = conn
                .lock()
                .map_err(|e| SinkError::Lock(e.to_string()))
                .and_then(|conn| insert_unless_cancelled(&conn, &table, &record, &state));
            state.store(FINISHED, Ordering::SeqCst);
            result
        });

        let joined = match limit {
            None => (&mut task).await,
            Some(limit) => match tokio::time::timeout(limit, &mut task).await {
                Ok(joined) => joined,
                Err(_) if ticket.cancel() => {
                    warn!("Write of run {} timed out, rolled back", run_identifier);
                    return Err(SinkError::Timeout(limit));
                }
                // The commit already started; report its real outcome.
                Err(_) => task.await,
            },
        };
        joined.map_err(|e| SinkError::Interrupted(e.to_string()))??;

        info!("Inserted run {} into {}", run_identifier, self.table.quoted());
        Ok(())
    }
}

const PENDING: u8 = 0;
const RUNNING: u8 = 1;
const COMMITTING: u8 = 2;
const CANCELLED: u8 = 3;
const FINISHED: u8 = 4;

/// Cancellation handle shared between a write future and its blocking task.
///
/// Dropping the ticket cancels the write unless its commit already started.
struct WriteTicket {
    state: Arc<AtomicU8>,
    interrupt: Arc<InterruptHandle>,
}

impl WriteTicket {
    fn new(interrupt: Arc<InterruptHandle>) -> Self {
        Self {
            state: Arc::new(AtomicU8::new(PENDING)),
            interrupt,
        }
    }

    /// Returns `true` when the write will leave no row behind.
    fn cancel(&self) -> bool {
        loop {
            match self.state.load(Ordering::SeqCst) {
                PENDING => {
                    if self.swap_state(PENDING, CANCELLED) {
                        return true;
                    }
                }
                RUNNING => {
                    if self.swap_state(RUNNING, CANCELLED) {
                        self.interrupt.interrupt();
                        return true;
                    }
                }
                CANCELLED => return true,
                _ => return false,
            }
        }
    }

    fn swap_state(&self, from: u8, to: u8) -> bool {
        self.state
            .compare_exchange(from, to, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

impl Drop for WriteTicket {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn insert_row(conn: &Connection, table: &TableRef, record: &Insertable) -> Result<(), SinkError> {
    let sql = insert_sql(table);
    debug!("Executing: {}", sql);

    conn.execute(
        &sql,
        params![
            record.run_identifier,
            record.execution_mode,
            record.execution_type.to_string(),
            record.workflow_name,
            record.status.to_string(),
            record.items_processed,
            record.items_new,
            record.items_duplicates,
            record.items_updated,
            record.event_summary,
            record.full_details,
        ],
    )?;

    Ok(())
}

fn insert_unless_cancelled(
    conn: &Connection,
    table: &TableRef,
    record: &Insertable,
    state: &AtomicU8,
) -> Result<(), SinkError> {
    if state
        .compare_exchange(PENDING, RUNNING, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return Err(SinkError::Interrupted("write cancelled".to_string()));
    }

    let tx = conn.unchecked_transaction()?;
    insert_row(&tx, table, record)?;

    // Dropping `tx` rolls the insert back.
    if state
        .compare_exchange(RUNNING, COMMITTING, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return Err(SinkError::Interrupted(
            "write cancelled before commit".to_string(),
        ));
    }

    tx.commit()?;
    Ok(())
}

impl Sink for SqliteSink {
    async fn write(&mut self, record: &Insertable) -> Result<(), SinkError> {
        self.insert(record, None).await
    }

    async fn write_within(
        &mut self,
        record: &Insertable,
        limit: Duration,
    ) -> Result<(), SinkError> {
        self.insert(record, Some(limit)).await
    }
}
