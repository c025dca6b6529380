use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};

use super::models::*;

/// Async-safe handle to the order database.
///
/// Wraps `OrderDb` behind `Arc<Mutex>` and runs all access on tokio's
/// blocking thread pool via `spawn_blocking`, keeping synchronous SQLite
/// I/O off the async worker threads.
#[derive(Clone)]
pub struct DbHandle {
    inner: Arc<std::sync::Mutex<OrderDb>>,
}

impl DbHandle {
    pub fn new(db: OrderDb) -> Self {
        Self {
            inner: Arc::new(std::sync::Mutex::new(db)),
        }
    }

    /// Run a closure with access to the database on a blocking thread.
    /// All data passed into `f` must be owned (`'static`).
    pub async fn call<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&OrderDb) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let db = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let guard = db.lock().map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))?;
            f(&guard)
        })
        .await
        .context("DB task panicked")?
    }

    /// Acquire the database mutex synchronously. For startup and tests only.
    pub fn lock_sync(&self) -> Result<std::sync::MutexGuard<'_, OrderDb>> {
        self.inner
            .lock()
            .map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))
    }
}

pub struct OrderDb {
    conn: Connection,
}

impl OrderDb {
    /// Open (or create) a SQLite database at the given path and run migrations.
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).context("Failed to open SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Create an in-memory SQLite database (for testing).
    pub fn new_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    #[cfg(test)]
    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }

    fn init(&self) -> Result<()> {
        self.run_migrations().context("Failed to run migrations")?;
        Ok(())
    }

    fn run_migrations(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS status_history (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    order_id INTEGER NOT NULL,
                    department TEXT NOT NULL,
                    comment TEXT,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS machines (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    machine_name TEXT NOT NULL,
                    status TEXT NOT NULL DEFAULT '',
                    date_added TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS communications (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    department TEXT NOT NULL,
                    message TEXT NOT NULL,
                    date TEXT NOT NULL,
                    time TEXT NOT NULL,
                    priority TEXT NOT NULL DEFAULT '',
                    is_read INTEGER NOT NULL DEFAULT 0
                );

                CREATE TABLE IF NOT EXISTS order_rows (
                    order_id INTEGER NOT NULL,
                    row_id TEXT NOT NULL,
                    position INTEGER NOT NULL,
                    fields TEXT NOT NULL DEFAULT '{}',
                    PRIMARY KEY (order_id, position)
                );

                CREATE INDEX IF NOT EXISTS idx_status_history_order
                    ON status_history(order_id, department, id);
                ",
            )
            .context("Failed to create tables")?;
        Ok(())
    }

    // ── Status history (selection ledger) ─────────────────────────────

    /// Append one event. Events are never updated or deleted afterwards.
    pub fn append_event(
        &self,
        order_id: i64,
        department: Department,
        comment: Option<&str>,
    ) -> Result<SelectionEvent> {
        self.conn
            .execute(
                "INSERT INTO status_history (order_id, department, comment) VALUES (?1, ?2, ?3)",
                params![order_id, department.as_str(), comment],
            )
            .context("Failed to insert status history event")?;
        let id = self.conn.last_insert_rowid();
        self.get_event(id)?
            .context("Status history event not found after insert")
    }

    pub fn get_event(&self, id: i64) -> Result<Option<SelectionEvent>> {
        self.conn
            .query_row(
                "SELECT id, order_id, department, comment, created_at
                 FROM status_history WHERE id = ?1",
                params![id],
                EventRow::from_row,
            )
            .optional()
            .context("Failed to query status history event")?
            .map(EventRow::into_event)
            .transpose()
    }

    /// All events of an order in insertion order.
    pub fn list_events(&self, order_id: i64) -> Result<Vec<SelectionEvent>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, order_id, department, comment, created_at
                 FROM status_history WHERE order_id = ?1 ORDER BY id",
            )
            .context("Failed to prepare list_events")?;
        let rows = stmt
            .query_map(params![order_id], EventRow::from_row)
            .context("Failed to query status history")?;
        let mut events = Vec::new();
        for row in rows {
            let r = row.context("Failed to read status history row")?;
            events.push(r.into_event()?);
        }
        Ok(events)
    }

    /// The most recently appended event of `department` for `order_id`
    /// that `filter` accepts. `instr` keeps the marker check case-sensitive.
    pub fn latest_event(
        &self,
        order_id: i64,
        department: Department,
        filter: EventFilter,
    ) -> Result<Option<SelectionEvent>> {
        let marker = match filter {
            EventFilter::SelectionOnly => Some(EventFilter::SELECTION_MARKER),
            EventFilter::AnyComment => None,
        };
        self.conn
            .query_row(
                "SELECT id, order_id, department, comment, created_at
                 FROM status_history
                 WHERE order_id = ?1 AND department = ?2 AND comment IS NOT NULL
                   AND (?3 IS NULL OR instr(comment, ?3) > 0)
                 ORDER BY id DESC LIMIT 1",
                params![order_id, department.as_str(), marker],
                EventRow::from_row,
            )
            .optional()
            .context("Failed to query latest status history event")?
            .map(EventRow::into_event)
            .transpose()
    }

    // ── Machines ──────────────────────────────────────────────────────

    pub fn create_machine(
        &self,
        machine_name: &str,
        status: &str,
        date_added: &str,
    ) -> Result<Machine> {
        self.conn
            .execute(
                "INSERT INTO machines (machine_name, status, date_added) VALUES (?1, ?2, ?3)",
                params![machine_name, status, date_added],
            )
            .context("Failed to insert machine")?;
        let id = self.conn.last_insert_rowid();
        self.get_machine(id)?.context("Machine not found after insert")
    }

    pub fn list_machines(&self) -> Result<Vec<Machine>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, machine_name, status, date_added FROM machines ORDER BY id")
            .context("Failed to prepare list_machines")?;
        let rows = stmt
            .query_map([], machine_from_row)
            .context("Failed to query machines")?;
        let mut machines = Vec::new();
        for row in rows {
            machines.push(row.context("Failed to read machine row")?);
        }
        Ok(machines)
    }

    pub fn get_machine(&self, id: i64) -> Result<Option<Machine>> {
        self.conn
            .query_row(
                "SELECT id, machine_name, status, date_added FROM machines WHERE id = ?1",
                params![id],
                machine_from_row,
            )
            .optional()
            .context("Failed to query machine")
    }

    /// Returns `None` when no machine has this id.
    pub fn update_machine(
        &self,
        id: i64,
        machine_name: &str,
        status: &str,
    ) -> Result<Option<Machine>> {
        let changed = self
            .conn
            .execute(
                "UPDATE machines SET machine_name = ?1, status = ?2 WHERE id = ?3",
                params![machine_name, status, id],
            )
            .context("Failed to update machine")?;
        if changed == 0 {
            return Ok(None);
        }
        self.get_machine(id)
    }

    pub fn delete_machine(&self, id: i64) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM machines WHERE id = ?1", params![id])
            .context("Failed to delete machine")?;
        Ok(deleted > 0)
    }

    // ── Communications ────────────────────────────────────────────────

    pub fn create_communication(
        &self,
        department: Department,
        message: &str,
        priority: &str,
        date: &str,
        time: &str,
    ) -> Result<Communication> {
        self.conn
            .execute(
                "INSERT INTO communications (department, message, date, time, priority, is_read)
                 VALUES (?1, ?2, ?3, ?4, ?5, 0)",
                params![department.as_str(), message, date, time, priority],
            )
            .context("Failed to insert communication")?;
        let id = self.conn.last_insert_rowid();
        self.get_communication(id)?
            .context("Communication not found after insert")
    }

    pub fn list_communications(&self) -> Result<Vec<Communication>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, department, message, date, time, priority, is_read
                 FROM communications ORDER BY id",
            )
            .context("Failed to prepare list_communications")?;
        let rows = stmt
            .query_map([], CommunicationRow::from_row)
            .context("Failed to query communications")?;
        let mut communications = Vec::new();
        for row in rows {
            let r = row.context("Failed to read communication row")?;
            communications.push(r.into_communication()?);
        }
        Ok(communications)
    }

    pub fn get_communication(&self, id: i64) -> Result<Option<Communication>> {
        self.conn
            .query_row(
                "SELECT id, department, message, date, time, priority, is_read
                 FROM communications WHERE id = ?1",
                params![id],
                CommunicationRow::from_row,
            )
            .optional()
            .context("Failed to query communication")?
            .map(CommunicationRow::into_communication)
            .transpose()
    }

    /// Returns `None` when no communication has this id.
    pub fn mark_communication_read(&self, id: i64) -> Result<Option<Communication>> {
        let changed = self
            .conn
            .execute("UPDATE communications SET is_read = 1 WHERE id = ?1", params![id])
            .context("Failed to mark communication as read")?;
        if changed == 0 {
            return Ok(None);
        }
        self.get_communication(id)
    }

    // ── Order rows ────────────────────────────────────────────────────

    /// Replace all candidate rows of an order. Positions follow slice order.
    pub fn replace_order_rows(
        &self,
        order_id: i64,
        rows: &[(String, serde_json::Value)],
    ) -> Result<Vec<OrderRow>> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        tx.execute("DELETE FROM order_rows WHERE order_id = ?1", params![order_id])
            .context("Failed to clear order rows")?;
        for (position, (row_id, fields)) in rows.iter().enumerate() {
            let fields = serde_json::to_string(fields).context("Failed to serialize row fields")?;
            tx.execute(
                "INSERT INTO order_rows (order_id, row_id, position, fields)
                 VALUES (?1, ?2, ?3, ?4)",
                params![order_id, row_id, position as i64, fields],
            )
            .context("Failed to insert order row")?;
        }
        tx.commit().context("Failed to commit order rows")?;
        self.list_order_rows(order_id)
    }

    pub fn list_order_rows(&self, order_id: i64) -> Result<Vec<OrderRow>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT order_id, row_id, position, fields
                 FROM order_rows WHERE order_id = ?1 ORDER BY position",
            )
            .context("Failed to prepare list_order_rows")?;
        let rows = stmt
            .query_map(params![order_id], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .context("Failed to query order rows")?;
        let mut order_rows = Vec::new();
        for row in rows {
            let (order_id, row_id, position, fields) = row.context("Failed to read order row")?;
            let fields = serde_json::from_str(&fields)
                .map_err(|e| anyhow::anyhow!("corrupt order row fields JSON '{}': {}", fields, e))?;
            order_rows.push(OrderRow {
                order_id,
                row_id,
                position,
                fields,
            });
        }
        Ok(order_rows)
    }
}

// ── Internal row helpers ──────────────────────────────────────────────

/// Intermediate row struct for reading status history before converting
/// the department string into its typed value.
struct EventRow {
    id: i64,
    order_id: i64,
    department: String,
    comment: Option<String>,
    created_at: String,
}

impl EventRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            order_id: row.get(1)?,
            department: row.get(2)?,
            comment: row.get(3)?,
            created_at: row.get(4)?,
        })
    }

    fn into_event(self) -> Result<SelectionEvent> {
        let department = Department::from_str(&self.department)
            .map_err(|e| anyhow::anyhow!(e))
            .context("Failed to parse status history department")?;
        Ok(SelectionEvent {
            id: self.id,
            order_id: self.order_id,
            department,
            comment: self.comment,
            created_at: self.created_at,
        })
    }
}

struct CommunicationRow {
    id: i64,
    department: String,
    message: String,
    date: String,
    time: String,
    priority: String,
    is_read: i64,
}

impl CommunicationRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            department: row.get(1)?,
            message: row.get(2)?,
            date: row.get(3)?,
            time: row.get(4)?,
            priority: row.get(5)?,
            is_read: row.get(6)?,
        })
    }

    fn into_communication(self) -> Result<Communication> {
        let department = Department::from_str(&self.department)
            .map_err(|e| anyhow::anyhow!(e))
            .context("Failed to parse communication department")?;
        Ok(Communication {
            id: self.id,
            department,
            message: self.message,
            date: self.date,
            time: self.time,
            priority: self.priority,
            is_read: self.is_read != 0,
        })
    }
}

fn machine_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Machine> {
    Ok(Machine {
        id: row.get(0)?,
        machine_name: row.get(1)?,
        status: row.get(2)?,
        date_added: row.get(3)?,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────
