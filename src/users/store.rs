use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use super::types::{Role, UserRow, UserRowUpdate, UserTable};
use crate::core::errors::ApiError;

/// File-backed user table. Every mutation is a read-modify-write performed
/// while holding an exclusive lock on `<table>.lock`.
///
/// All methods are blocking: they wait on `flock` and do synchronous file
/// I/O. Async callers should go through `tokio::task::spawn_blocking`.
#[derive(Debug, Clone)]
pub struct UserStore {
    path: PathBuf,
    lock_path: PathBuf,
}

impl UserStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut lock_name = path.as_os_str().to_os_string();
        lock_name.push(".lock");
        Self {
            path,
            lock_path: PathBuf::from(lock_name),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the table from disk. A missing file is an empty table.
    pub fn load(&self) -> Result<UserTable, ApiError> {
        read_table(&self.path)
    }

    /// Replaces the whole table under the lock.
    pub fn save(&self, table: &UserTable) -> Result<(), ApiError> {
        let _guard = TableLock::acquire(&self.lock_path)?;
        write_table(&self.path, table)
    }

    /// Applies `mutate` to the freshly read table and writes it back, all
    /// while the lock is held.
    pub fn update<T, F>(&self, mutate: F) -> Result<T, ApiError>
    where
        F: FnOnce(&mut UserTable) -> Result<T, ApiError>,
    {
        let _guard = TableLock::acquire(&self.lock_path)?;
        let mut table = read_table(&self.path)?;
        let result = mutate(&mut table)?;
        write_table(&self.path, &table)?;
        Ok(result)
    }

    pub fn add_usage(&self, user_id: &str, tokens: u64) -> Result<u64, ApiError> {
        self.update(|table| {
            let record = table.get_mut(user_id).ok_or(ApiError::UnknownUser)?;
            record.used_tokens = record.used_tokens.saturating_add(tokens);
            Ok(record.used_tokens)
        })
    }

    /// Dashboard rows for every non-admin account.
    pub fn list_rows(&self) -> Result<Vec<UserRow>, ApiError> {
        let table = self.load()?;
        Ok(table
            .iter()
            .filter(|(_, record)| record.role != Role::Admin)
            .map(|(user_id, record)| UserRow::from_record(user_id, record))
            .collect())
    }

    /// Writes edited `active` / `max_tokens` cells back. Identifiers that are
    /// no longer in the table are skipped. Returns how many rows were applied.
    pub fn apply_row_updates(&self, rows: &[UserRowUpdate]) -> Result<usize, ApiError> {
        self.update(|table| {
            let mut applied = 0;
            for row in rows {
                match table.get_mut(&row.user_id) {
                    Some(record) => {
                        record.active = row.active;
                        record.max_tokens = row.max_tokens;
                        applied += 1;
                    }
                    None => {
                        tracing::warn!(user_id = %row.user_id, "Skipping update for unknown user");
                    }
                }
            }
            Ok(applied)
        })
    }
}

struct TableLock {
    file: File,
}

impl TableLock {
    fn acquire(path: &Path) -> Result<Self, ApiError> {
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)
            .map_err(ApiError::internal)?;
        file.lock_exclusive().map_err(ApiError::internal)?;
        Ok(Self { file })
    }
}

impl Drop for TableLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

fn read_table(path: &Path) -> Result<UserTable, ApiError> {
    if !path.exists() {
        return Ok(UserTable::new());
    }
    let contents = fs::read_to_string(path).map_err(ApiError::internal)?;
    if contents.trim().is_empty() {
        return Ok(UserTable::new());
    }
    serde_json::from_str(&contents).map_err(|err| {
        ApiError::Internal(format!("Invalid user table {}: {}", path.display(), err))
    })
}

fn write_table(path: &Path, table: &UserTable) -> Result<(), ApiError> {
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let payload = serde_json::to_string_pretty(table).map_err(ApiError::internal)?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, payload).map_err(ApiError::internal)?;
    fs::rename(&tmp_path, path).map_err(ApiError::internal)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::types::UserRecord;
    use serde_json::json;
    use std::sync::Arc;

    fn seeded_store(dir: &Path) -> UserStore {
        let store = UserStore::new(dir.join("users.json"));
        let mut table = UserTable::new();
        table.insert(
            "admin-ranger-001".to_string(),
            UserRecord::new("t0".to_string(), Role::Admin, 128_000),
        );
        table.insert(
            "brave-fox-512".to_string(),
            UserRecord::new("t1".to_string(), Role::User, 128_000),
        );
        table.insert(
            "happy-otter-204".to_string(),
            UserRecord::new("t2".to_string(), Role::User, 100),
        );
        store.save(&table).unwrap();
        store
    }

    #[test]
    fn missing_file_is_an_empty_table() {
        let dir = tempfile::tempdir().unwrap();
        let store = UserStore::new(dir.path().join("users.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn list_rows_hides_admins() {
        let dir = tempfile::tempdir().unwrap();
        let store = seeded_store(dir.path());

        let rows = store.list_rows().unwrap();

        let ids: Vec<&str> = rows.iter().map(|row| row.user_id.as_str()).collect();
        assert_eq!(ids, vec!["brave-fox-512", "happy-otter-204"]);
    }

    #[test]
    fn apply_row_updates_persists_edits_and_skips_unknown_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = seeded_store(dir.path());
        let rows: Vec<UserRowUpdate> = serde_json::from_value(json!([
            { "user_id": "brave-fox-512", "active": "false", "max_tokens": 50 },
            { "user_id": "ghost-alien-999", "active": true, "max_tokens": 10 }
        ]))
        .unwrap();

        let applied = store.apply_row_updates(&rows).unwrap();

        assert_eq!(applied, 1);
        let table = store.load().unwrap();
        let fox = &table["brave-fox-512"];
        assert!(!fox.active);
        assert_eq!(fox.max_tokens, 50);
        assert!(!table.contains_key("ghost-alien-999"));
        assert_eq!(table["happy-otter-204"].max_tokens, 100);
    }

    #[test]
    fn add_usage_accumulates() {
        let dir = tempfile::tempdir().unwrap();
        let store = seeded_store(dir.path());

        store.add_usage("happy-otter-204", 12).unwrap();
        let total = store.add_usage("happy-otter-204", 30).unwrap();

        assert_eq!(total, 42);
        assert_eq!(store.load().unwrap()["happy-otter-204"].used_tokens, 42);
        assert!(matches!(
            store.add_usage("ghost-alien-999", 1),
            Err(ApiError::UnknownUser)
        ));
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(seeded_store(dir.path()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for _ in 0..5 {
                        store.add_usage("brave-fox-512", 1).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.load().unwrap()["brave-fox-512"].used_tokens, 40);
    }
}
