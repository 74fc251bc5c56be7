use crate::domain::model::Account;
use crate::domain::ports::{AccountDirectory, DirectoryUnit};
use crate::utils::error::{BounceError, Result};
use rusqlite::functions::FunctionFlags;
use rusqlite::{params, params_from_iter, Connection, OpenFlags, Transaction};
use std::cell::OnceCell;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Minimal shape of the account table this job reads and updates.
pub const ACCOUNTS_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS accounts (
    id        INTEGER PRIMARY KEY,
    username  TEXT NOT NULL UNIQUE,
    email     TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1
);
"#;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite `lower()` only folds ASCII; addresses are compared with full
/// Unicode lowercase, the same fold used for incoming bounces.
fn register_fold_case(conn: &Connection) -> Result<()> {
    conn.create_scalar_function(
        "fold_case",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| Ok(ctx.get::<String>(0)?.to_lowercase()),
    )?;
    Ok(())
}

/// SQLite-backed account directory.
///
/// The database is owned by the account service; this type never creates it.
/// The connection is opened on the first [`AccountDirectory::begin`] so a run
/// that is skipped during guarding never touches the file.
pub struct SqliteDirectory {
    path: Option<PathBuf>,
    conn: OnceCell<Connection>,
}

impl SqliteDirectory {
    pub fn open(path: impl AsRef<Path>) -> Self {
        Self {
            path: Some(path.as_ref().to_path_buf()),
            conn: OnceCell::new(),
        }
    }

    /// In-memory directory with the schema applied, for tests and local bootstrapping.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        register_fold_case(&conn)?;
        conn.execute_batch(ACCOUNTS_SCHEMA)?;
        let cell = OnceCell::new();
        let _ = cell.set(conn);
        Ok(Self { path: None, conn: cell })
    }

    fn connection(&self) -> Result<&Connection> {
        if let Some(conn) = self.conn.get() {
            return Ok(conn);
        }

        let path = self.path.as_ref().ok_or_else(|| BounceError::DirectoryError {
            message: "no database path configured".to_string(),
        })?;
        let conn = Self::connect(path)?;
        let _ = self.conn.set(conn);
        self.conn.get().ok_or_else(|| BounceError::DirectoryError {
            message: "account database connection was not initialised".to_string(),
        })
    }

    fn connect(path: &Path) -> Result<Connection> {
        tracing::debug!("Opening account database at {}", path.display());
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| BounceError::DirectoryError {
            message: format!("cannot open {}: {}", path.display(), e),
        })?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        register_fold_case(&conn)?;

        // 確認資料表欄位存在
        conn.prepare("SELECT id, username, email, is_active FROM accounts LIMIT 0")
            .map_err(|e| BounceError::DirectoryError {
                message: format!("unexpected accounts schema in {}: {}", path.display(), e),
            })?;

        Ok(conn)
    }

    #[cfg(test)]
    pub(crate) fn seed(&self, username: &str, email: &str, active: bool) -> i64 {
        let conn = self.connection().unwrap();
        conn.execute(
            "INSERT INTO accounts (username, email, is_active) VALUES (?1, ?2, ?3)",
            params![username, email, active],
        )
        .unwrap();
        conn.last_insert_rowid()
    }

    #[cfg(test)]
    pub(crate) fn is_active(&self, username: &str) -> bool {
        self.connection()
            .unwrap()
            .query_row(
                "SELECT is_active FROM accounts WHERE username = ?1",
                params![username],
                |row| row.get(0),
            )
            .unwrap()
    }

    #[cfg(test)]
    pub(crate) fn execute_batch(&self, sql: &str) {
        self.connection().unwrap().execute_batch(sql).unwrap();
    }
}

impl AccountDirectory for SqliteDirectory {
    type Unit<'a> = SqliteUnit<'a>;

    fn begin(&self) -> Result<SqliteUnit<'_>> {
        let tx = self.connection()?.unchecked_transaction()?;
        Ok(SqliteUnit { tx })
    }
}

pub struct SqliteUnit<'conn> {
    tx: Transaction<'conn>,
}

impl DirectoryUnit for SqliteUnit<'_> {
    fn find_active(&self, normalized_address: &str) -> Result<Vec<Account>> {
        let mut stmt = self.tx.prepare_cached(
            "SELECT id, username, email, is_active FROM accounts
             WHERE is_active = 1 AND fold_case(email) = ?1
             ORDER BY id",
        )?;

        let rows = stmt.query_map(params![normalized_address], |row| {
            Ok(Account {
                id: row.get(0)?,
                username: row.get(1)?,
                address: row.get(2)?,
                active: row.get(3)?,
            })
        })?;

        let accounts = rows.collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(accounts)
    }

    fn deactivate_all(&self, ids: &[i64]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "UPDATE accounts SET is_active = 0 WHERE is_active = 1 AND id IN ({})",
            placeholders
        );
        let changed = self.tx.execute(&sql, params_from_iter(ids.iter()))?;
        Ok(changed)
    }

    fn commit(self) -> Result<()> {
        self.tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_active_is_case_insensitive_and_skips_inactive() {
        let directory = SqliteDirectory::in_memory().unwrap();
        directory.seed("userA", "A@X.com", true);
        directory.seed("userB", "a@x.com", true);
        directory.seed("userC", "a@x.com", false);
        directory.seed("other", "b@x.com", true);

        let unit = directory.begin().unwrap();
        let accounts = unit.find_active("a@x.com").unwrap();

        let usernames: Vec<&str> = accounts.iter().map(|a| a.username.as_str()).collect();
        assert_eq!(usernames, vec!["userA", "userB"]);
        assert!(accounts.iter().all(|a| a.active));
    }

    #[test]
    fn test_find_active_folds_non_ascii_case() {
        let directory = SqliteDirectory::in_memory().unwrap();
        directory.seed("unicode", "Ünïcode@Example.com", true);

        let bounce = crate::domain::model::BounceNotification::new(
            "ÜNÏCODE@example.COM",
            "user unknown",
            Some("5.1.1"),
        );
        let unit = directory.begin().unwrap();
        let accounts = unit.find_active(&bounce.normalized_address()).unwrap();

        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].username, "unicode");
    }

    #[test]
    fn test_file_backed_directory_folds_non_ascii_case() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("accounts.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(ACCOUNTS_SCHEMA).unwrap();
            conn.execute(
                "INSERT INTO accounts (username, email, is_active) VALUES ('émile', 'Émile@X.com', 1)",
                [],
            )
            .unwrap();
        }

        let directory = SqliteDirectory::open(&path);
        let unit = directory.begin().unwrap();
        let accounts = unit.find_active("émile@x.com").unwrap();

        assert_eq!(accounts.len(), 1);
        assert_eq!(unit.deactivate_all(&[accounts[0].id]).unwrap(), 1);
    }

    #[test]
    fn test_deactivate_all_counts_only_changed_rows() {
        let directory = SqliteDirectory::in_memory().unwrap();
        let a = directory.seed("userA", "a@x.com", true);
        let c = directory.seed("userC", "a@x.com", false);

        let unit = directory.begin().unwrap();
        assert_eq!(unit.deactivate_all(&[a, c]).unwrap(), 1);
        assert_eq!(unit.deactivate_all(&[a]).unwrap(), 0);
        assert_eq!(unit.deactivate_all(&[]).unwrap(), 0);
        unit.commit().unwrap();

        assert!(!directory.is_active("userA"));
        assert!(!directory.is_active("userC"));
    }

    #[test]
    fn test_dropping_unit_rolls_back() {
        let directory = SqliteDirectory::in_memory().unwrap();
        let a = directory.seed("userA", "a@x.com", true);

        {
            let unit = directory.begin().unwrap();
            assert_eq!(unit.deactivate_all(&[a]).unwrap(), 1);
        }

        assert!(directory.is_active("userA"));
    }

    #[test]
    fn test_open_missing_database_fails_on_begin() {
        let dir = tempfile::TempDir::new().unwrap();
        let directory = SqliteDirectory::open(dir.path().join("missing.db"));

        match directory.begin() {
            Err(BounceError::DirectoryError { message }) => assert!(message.contains("cannot open")),
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("missing database must not be created"),
        }
        assert!(!dir.path().join("missing.db").exists());
    }

    #[test]
    fn test_open_rejects_foreign_schema() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("other.db");
        Connection::open(&path)
            .unwrap()
            .execute_batch("CREATE TABLE users (id INTEGER PRIMARY KEY, mail TEXT);")
            .unwrap();

        let directory = SqliteDirectory::open(&path);
        assert!(matches!(
            directory.begin(),
            Err(BounceError::DirectoryError { .. })
        ));
    }
}
