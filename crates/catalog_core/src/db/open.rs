//! Store handle bootstrap and teardown.
//!
//! # Responsibility
//! - Open file or in-memory catalog stores.
//! - Configure connection pragmas and SQL functions required by search.
//! - Trigger schema migrations before returning a usable handle.
//! - Release the handle exactly once.
//!
//! # Invariants
//! - Returned handles have `foreign_keys=ON`.
//! - Returned handles have migrations fully applied.
//! - `fold_case` is registered on every returned handle.

use super::migrations::apply_migrations;
use super::{DbError, DbResult};
use log::{error, info};
use rusqlite::functions::FunctionFlags;
use rusqlite::Connection;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Store address that selects a private in-memory database.
pub const MEMORY_ADDRESS: &str = ":memory:";

/// Name of the Unicode-aware lowercase SQL function used by search filters.
pub const FOLD_CASE_FN: &str = "fold_case";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Owned, shareable handle to the catalog store.
///
/// In-flight operations on one handle are serialized by a mutex held for
/// the duration of each operation.
#[derive(Debug)]
pub struct CatalogStore {
    conn: Mutex<Connection>,
    mode: &'static str,
}

impl CatalogStore {
    /// Locks the underlying connection for one unit of work.
    pub fn lock(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| DbError::LockPoisoned)
    }

    /// Releases all resources held by this handle.
    ///
    /// # Side effects
    /// - Emits `db_close` logging events with duration and status.
    pub fn close(self) -> DbResult<()> {
        let started_at = Instant::now();
        let mode = self.mode;
        // A poisoned lock only means a caller panicked mid-operation; any open
        // transaction was rolled back when its guard dropped.
        let conn = self.conn.into_inner().unwrap_or_else(PoisonError::into_inner);
        match conn.close() {
            Ok(()) => {
                info!(
                    "event=db_close module=db status=ok mode={} duration_ms={}",
                    mode,
                    started_at.elapsed().as_millis()
                );
                Ok(())
            }
            Err((_conn, err)) => {
                error!(
                    "event=db_close module=db status=error mode={} duration_ms={} error_code=db_close_failed error={}",
                    mode,
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err.into())
            }
        }
    }
}

/// Opens the catalog store at `address` and applies all pending migrations.
///
/// `address` is a filesystem path, or [`MEMORY_ADDRESS`] for an in-memory
/// store. No retries are performed.
///
/// # Side effects
/// - Performs connection bootstrap and migration checks.
/// - Emits `db_open` logging events with duration and status.
pub fn open_store(address: &str) -> DbResult<CatalogStore> {
    if address == MEMORY_ADDRESS {
        return open_store_in_memory();
    }
    open_with("file", || Connection::open(address))
}

/// Opens an in-memory catalog store and applies all pending migrations.
///
/// # Side effects
/// - Performs connection bootstrap and migration checks.
/// - Emits `db_open` logging events with duration and status.
pub fn open_store_in_memory() -> DbResult<CatalogStore> {
    open_with("memory", Connection::open_in_memory)
}

fn open_with(
    mode: &'static str,
    connect: impl FnOnce() -> rusqlite::Result<Connection>,
) -> DbResult<CatalogStore> {
    let started_at = Instant::now();
    info!("event=db_open module=db status=start mode={mode}");

    let mut conn = match connect() {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={} duration_ms={} error_code=db_open_failed error={}",
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
    };

    match bootstrap_connection(&mut conn) {
        Ok(()) => {
            info!(
                "event=db_open module=db status=ok mode={} duration_ms={}",
                mode,
                started_at.elapsed().as_millis()
            );
            Ok(CatalogStore {
                conn: Mutex::new(conn),
                mode,
            })
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={} duration_ms={} error_code=db_bootstrap_failed error={}",
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn bootstrap_connection(conn: &mut Connection) -> DbResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    register_fold_case(conn)?;
    apply_migrations(conn)?;
    Ok(())
}

/// Case-folds `text` for substring matching.
///
/// Lowercases with Unicode rules, then maps final sigma to medial sigma so
/// that a word-final `Σ` in either operand matches the same letter anywhere
/// else.
pub fn fold_case(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|ch| if ch == 'ς' { 'σ' } else { ch })
        .collect()
}

// SQLite's built-in lower() only folds ASCII.
fn register_fold_case(conn: &Connection) -> DbResult<()> {
    conn.create_scalar_function(
        FOLD_CASE_FN,
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let value = ctx.get::<Option<String>>(0)?;
            Ok(value.as_deref().map(fold_case))
        },
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{fold_case, open_store, open_store_in_memory, MEMORY_ADDRESS};

    #[test]
    fn fold_case_lowercases_non_ascii_text() {
        let store = open_store_in_memory().unwrap();
        let folded: String = store
            .lock()
            .unwrap()
            .query_row("SELECT fold_case('ÉCOLE Ünter');", [], |row| row.get(0))
            .unwrap();
        assert_eq!(folded, "école ünter");
    }

    #[test]
    fn fold_case_treats_final_sigma_as_medial_sigma() {
        assert_eq!(fold_case("ΟΔΟΣ"), "οδοσ");
        assert_eq!(fold_case("οδος"), "οδοσ");
        assert_eq!(fold_case("ΟΔΟΣΤΡΩΜΑ"), "οδοστρωμα");

        let store = open_store_in_memory().unwrap();
        let hit: i64 = store
            .lock()
            .unwrap()
            .query_row(
                "SELECT instr(fold_case('ΟΔΟΣΤΡΩΜΑ'), fold_case('ΟΔΟΣ')) > 0;",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(hit, 1);
    }

    #[test]
    fn fold_case_passes_null_through() {
        let store = open_store_in_memory().unwrap();
        let folded: Option<String> = store
            .lock()
            .unwrap()
            .query_row("SELECT fold_case(NULL);", [], |row| row.get(0))
            .unwrap();
        assert!(folded.is_none());
    }

    #[test]
    fn memory_address_opens_in_memory_store() {
        let store = open_store(MEMORY_ADDRESS).unwrap();
        let enabled: i64 = store
            .lock()
            .unwrap()
            .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
            .unwrap();
        assert_eq!(enabled, 1);
        store.close().unwrap();
    }
}
