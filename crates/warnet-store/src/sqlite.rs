//! SQLite-based store implementation

use chrono::{DateTime, Local};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, warn};
use warnet_api::{Customer, CustomerStatus, SessionRecord, SessionStatus};
use warnet_util::{CustomerId, SessionRowId};

use crate::{ActiveSessionRow, ActivityEntry, ActivityEvent, Store, StoreResult};

/// SQLite-based store
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a store at the given path
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS customers (
                id             INTEGER PRIMARY KEY AUTOINCREMENT,
                name           TEXT NOT NULL,
                balance        INTEGER NOT NULL DEFAULT 0,
                time_remaining INTEGER NOT NULL DEFAULT 0,
                status         TEXT NOT NULL DEFAULT 'inactive'
            );

            CREATE TABLE IF NOT EXISTS sessions (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                customer_id INTEGER NOT NULL,
                start_time  TEXT NOT NULL,
                end_time    TEXT,
                status      TEXT NOT NULL
            );

            -- Activity journal (append-only)
            CREATE TABLE IF NOT EXISTS activity_log (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp  TEXT NOT NULL,
                event_json TEXT NOT NULL
            );

            -- Indexes
            CREATE INDEX IF NOT EXISTS idx_sessions_customer_status
                ON sessions(customer_id, status);
            CREATE INDEX IF NOT EXISTS idx_activity_timestamp
                ON activity_log(timestamp);
            "#,
        )?;

        debug!("Store schema initialized");
        Ok(())
    }
}

fn customer_status_str(status: CustomerStatus) -> &'static str {
    match status {
        CustomerStatus::Active => "active",
        CustomerStatus::Inactive => "inactive",
    }
}

fn parse_customer_status(s: &str) -> CustomerStatus {
    match s {
        "active" => CustomerStatus::Active,
        "inactive" => CustomerStatus::Inactive,
        other => {
            warn!(status = other, "Unknown customer status, treating as inactive");
            CustomerStatus::Inactive
        }
    }
}

fn session_status_str(status: SessionStatus) -> &'static str {
    match status {
        SessionStatus::Active => "active",
        SessionStatus::Completed => "completed",
        SessionStatus::Cancelled => "cancelled",
    }
}

fn parse_session_status(s: &str) -> SessionStatus {
    match s {
        "active" => SessionStatus::Active,
        "completed" => SessionStatus::Completed,
        "cancelled" => SessionStatus::Cancelled,
        other => {
            warn!(status = other, "Unknown session status, treating as cancelled");
            SessionStatus::Cancelled
        }
    }
}

fn parse_timestamp(s: &str) -> DateTime<Local> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Local))
        .unwrap_or_else(|_| {
            warn!(value = s, "Unparseable timestamp in store, substituting now");
            warnet_util::now()
        })
}

impl Store for SqliteStore {
    fn insert_customer(
        &self,
        name: &str,
        balance: i64,
        time_remaining: i64,
    ) -> StoreResult<CustomerId> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "INSERT INTO customers (name, balance, time_remaining, status)
             VALUES (?, ?, ?, 'inactive')",
            params![name, balance, time_remaining],
        )?;

        let id = CustomerId::new(conn.last_insert_rowid());
        debug!(customer_id = %id, name, "Customer inserted");
        Ok(id)
    }

    fn get_customer(&self, id: CustomerId) -> StoreResult<Option<Customer>> {
        let conn = self.conn.lock().unwrap();

        let customer = conn
            .query_row(
                "SELECT id, name, balance, time_remaining, status
                 FROM customers WHERE id = ?",
                [id.as_i64()],
                |row| {
                    let status: String = row.get(4)?;
                    Ok(Customer {
                        id: CustomerId::new(row.get(0)?),
                        name: row.get(1)?,
                        balance: row.get(2)?,
                        time_remaining: row.get(3)?,
                        status: parse_customer_status(&status),
                    })
                },
            )
            .optional()?;

        Ok(customer)
    }

    fn update_customer_funds(
        &self,
        id: CustomerId,
        balance: i64,
        time_remaining: i64,
    ) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "UPDATE customers SET balance = ?, time_remaining = ? WHERE id = ?",
            params![balance, time_remaining, id.as_i64()],
        )?;

        debug!(customer_id = %id, balance, time_remaining, "Customer funds updated");
        Ok(())
    }

    fn update_time_remaining(&self, id: CustomerId, time_remaining: i64) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "UPDATE customers SET time_remaining = ? WHERE id = ?",
            params![time_remaining, id.as_i64()],
        )?;

        Ok(())
    }

    fn update_balance(&self, id: CustomerId, balance: i64) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "UPDATE customers SET balance = ? WHERE id = ?",
            params![balance, id.as_i64()],
        )?;

        Ok(())
    }

    fn set_customer_status(&self, id: CustomerId, status: CustomerStatus) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "UPDATE customers SET status = ? WHERE id = ?",
            params![customer_status_str(status), id.as_i64()],
        )?;

        debug!(customer_id = %id, status = ?status, "Customer status updated");
        Ok(())
    }

    fn create_session(
        &self,
        customer_id: CustomerId,
        start_time: DateTime<Local>,
    ) -> StoreResult<SessionRowId> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "INSERT INTO sessions (customer_id, start_time, status)
             VALUES (?, ?, 'active')",
            params![customer_id.as_i64(), start_time.to_rfc3339()],
        )?;

        let id = SessionRowId::new(conn.last_insert_rowid());
        debug!(session_id = %id, customer_id = %customer_id, "Session row created");
        Ok(id)
    }

    fn close_latest_active_session(
        &self,
        customer_id: CustomerId,
        end_time: DateTime<Local>,
        status: SessionStatus,
    ) -> StoreResult<Option<SessionRowId>> {
        let conn = self.conn.lock().unwrap();

        let row_id: Option<i64> = conn
            .query_row(
                "SELECT id FROM sessions
                 WHERE customer_id = ? AND status = 'active'
                 ORDER BY id DESC LIMIT 1",
                [customer_id.as_i64()],
                |row| row.get(0),
            )
            .optional()?;

        let Some(row_id) = row_id else {
            return Ok(None);
        };

        conn.execute(
            "UPDATE sessions SET end_time = ?, status = ? WHERE id = ?",
            params![end_time.to_rfc3339(), session_status_str(status), row_id],
        )?;

        debug!(
            session_id = row_id,
            customer_id = %customer_id,
            status = ?status,
            "Session row closed"
        );
        Ok(Some(SessionRowId::new(row_id)))
    }

    fn close_session(
        &self,
        id: SessionRowId,
        end_time: DateTime<Local>,
        status: SessionStatus,
    ) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "UPDATE sessions SET end_time = ?, status = ? WHERE id = ?",
            params![end_time.to_rfc3339(), session_status_str(status), id.as_i64()],
        )?;

        Ok(())
    }

    fn get_session(&self, id: SessionRowId) -> StoreResult<Option<SessionRecord>> {
        let conn = self.conn.lock().unwrap();

        let session = conn
            .query_row(
                "SELECT id, customer_id, start_time, end_time, status
                 FROM sessions WHERE id = ?",
                [id.as_i64()],
                |row| {
                    let start: String = row.get(2)?;
                    let end: Option<String> = row.get(3)?;
                    let status: String = row.get(4)?;
                    Ok(SessionRecord {
                        id: SessionRowId::new(row.get(0)?),
                        customer_id: CustomerId::new(row.get(1)?),
                        start_time: parse_timestamp(&start),
                        end_time: end.as_deref().map(parse_timestamp),
                        status: parse_session_status(&status),
                    })
                },
            )
            .optional()?;

        Ok(session)
    }

    fn active_sessions(&self) -> StoreResult<Vec<ActiveSessionRow>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(
            "SELECT s.id, s.customer_id, s.start_time, s.end_time, s.status,
                    c.id, c.name, c.balance, c.time_remaining, c.status
             FROM sessions s
             LEFT JOIN customers c ON c.id = s.customer_id
             WHERE s.status = 'active'
             ORDER BY s.id",
        )?;

        let rows = stmt.query_map([], |row| {
            let start: String = row.get(2)?;
            let end: Option<String> = row.get(3)?;
            let session_status: String = row.get(4)?;

            let session = SessionRecord {
                id: SessionRowId::new(row.get(0)?),
                customer_id: CustomerId::new(row.get(1)?),
                start_time: parse_timestamp(&start),
                end_time: end.as_deref().map(parse_timestamp),
                status: parse_session_status(&session_status),
            };

            let customer = match row.get::<_, Option<i64>>(5)? {
                Some(customer_id) => {
                    let status: String = row.get(9)?;
                    Some(Customer {
                        id: CustomerId::new(customer_id),
                        name: row.get(6)?,
                        balance: row.get(7)?,
                        time_remaining: row.get(8)?,
                        status: parse_customer_status(&status),
                    })
                }
                None => None,
            };

            Ok(ActiveSessionRow { session, customer })
        })?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }

        Ok(result)
    }

    fn append_activity(&self, mut entry: ActivityEntry) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        let event_json = serde_json::to_string(&entry.event)?;

        conn.execute(
            "INSERT INTO activity_log (timestamp, event_json) VALUES (?, ?)",
            params![entry.timestamp.to_rfc3339(), event_json],
        )?;

        entry.id = conn.last_insert_rowid();
        debug!(entry_id = entry.id, "Activity entry appended");

        Ok(())
    }

    fn recent_activity(&self, limit: usize) -> StoreResult<Vec<ActivityEntry>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(
            "SELECT id, timestamp, event_json FROM activity_log ORDER BY id DESC LIMIT ?",
        )?;

        let rows = stmt.query_map([limit], |row| {
            let id: i64 = row.get(0)?;
            let timestamp: String = row.get(1)?;
            let event_json: String = row.get(2)?;
            Ok((id, timestamp, event_json))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (id, timestamp, event_json) = row?;
            let event: ActivityEvent = serde_json::from_str(&event_json)?;

            entries.push(ActivityEntry {
                id,
                timestamp: parse_timestamp(&timestamp),
                event,
            });
        }

        Ok(entries)
    }

    fn is_healthy(&self) -> bool {
        match self.conn.lock() {
            Ok(conn) => conn.query_row("SELECT 1", [], |_| Ok(())).is_ok(),
            Err(_) => {
                warn!("Store lock poisoned");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warnet_api::EndReason;

    #[test]
    fn test_in_memory_store() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(store.is_healthy());
    }

    #[test]
    fn test_customer_round_trip() {
        let store = SqliteStore::in_memory().unwrap();

        let id = store.insert_customer("Budi", 25_000, 1800).unwrap();
        let customer = store.get_customer(id).unwrap().unwrap();

        assert_eq!(customer.name, "Budi");
        assert_eq!(customer.balance, 25_000);
        assert_eq!(customer.time_remaining, 1800);
        assert_eq!(customer.status, CustomerStatus::Inactive);

        assert!(store.get_customer(CustomerId::new(999)).unwrap().is_none());
    }

    #[test]
    fn test_funds_and_status_updates() {
        let store = SqliteStore::in_memory().unwrap();
        let id = store.insert_customer("Sari", 10_000, 0).unwrap();

        store.update_customer_funds(id, 0, 3600).unwrap();
        store.set_customer_status(id, CustomerStatus::Active).unwrap();

        let customer = store.get_customer(id).unwrap().unwrap();
        assert_eq!(customer.balance, 0);
        assert_eq!(customer.time_remaining, 3600);
        assert_eq!(customer.status, CustomerStatus::Active);

        store.update_balance(id, 50_000).unwrap();
        store.update_time_remaining(id, 1200).unwrap();

        let customer = store.get_customer(id).unwrap().unwrap();
        assert_eq!(customer.balance, 50_000);
        assert_eq!(customer.time_remaining, 1200);
    }

    #[test]
    fn test_session_lifecycle() {
        let store = SqliteStore::in_memory().unwrap();
        let customer_id = store.insert_customer("Budi", 0, 3600).unwrap();

        let start = warnet_util::now();
        let session_id = store.create_session(customer_id, start).unwrap();

        let session = store.get_session(session_id).unwrap().unwrap();
        assert_eq!(session.customer_id, customer_id);
        assert_eq!(session.status, SessionStatus::Active);
        assert!(session.end_time.is_none());

        let end = warnet_util::now();
        let closed = store
            .close_latest_active_session(customer_id, end, SessionStatus::Completed)
            .unwrap();
        assert_eq!(closed, Some(session_id));

        let session = store.get_session(session_id).unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Completed);
        assert!(session.end_time.is_some());

        // Nothing left to close: idempotent termination sees None.
        let closed = store
            .close_latest_active_session(customer_id, end, SessionStatus::Cancelled)
            .unwrap();
        assert!(closed.is_none());
    }

    #[test]
    fn test_close_latest_picks_most_recent_row() {
        let store = SqliteStore::in_memory().unwrap();
        let customer_id = store.insert_customer("Budi", 0, 3600).unwrap();

        let first = store.create_session(customer_id, warnet_util::now()).unwrap();
        let second = store.create_session(customer_id, warnet_util::now()).unwrap();

        let closed = store
            .close_latest_active_session(
                customer_id,
                warnet_util::now(),
                SessionStatus::Cancelled,
            )
            .unwrap();
        assert_eq!(closed, Some(second));

        // The older stray row is still open.
        let first_row = store.get_session(first).unwrap().unwrap();
        assert_eq!(first_row.status, SessionStatus::Active);
    }

    #[test]
    fn test_active_sessions_surfaces_orphans() {
        let store = SqliteStore::in_memory().unwrap();
        let customer_id = store.insert_customer("Budi", 0, 3600).unwrap();

        store.create_session(customer_id, warnet_util::now()).unwrap();
        // Session pointing at a customer that was deleted elsewhere.
        store
            .create_session(CustomerId::new(404), warnet_util::now())
            .unwrap();

        let rows = store.active_sessions().unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].customer.is_some());
        assert!(rows[1].customer.is_none());
    }

    #[test]
    fn test_activity_log() {
        let store = SqliteStore::in_memory().unwrap();

        store
            .append_activity(ActivityEntry::new(ActivityEvent::DaemonStarted))
            .unwrap();
        store
            .append_activity(ActivityEntry::new(ActivityEvent::SessionEnded {
                customer_id: CustomerId::new(1),
                session_id: Some(SessionRowId::new(1)),
                reason: EndReason::UserLogout,
                time_remaining: 120,
            }))
            .unwrap();

        let entries = store.recent_activity(10).unwrap();
        assert_eq!(entries.len(), 2);
        // Newest first
        assert!(matches!(entries[0].event, ActivityEvent::SessionEnded { .. }));
        assert!(matches!(entries[1].event, ActivityEvent::DaemonStarted));
    }

    #[test]
    fn test_on_disk_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("warnetd.db");

        let id = {
            let store = SqliteStore::open(&path).unwrap();
            store.insert_customer("Budi", 10_000, 0).unwrap()
        };

        // Reopen and verify persistence.
        let store = SqliteStore::open(&path).unwrap();
        let customer = store.get_customer(id).unwrap().unwrap();
        assert_eq!(customer.name, "Budi");
    }
}
